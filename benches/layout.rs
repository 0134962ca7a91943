use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use reaction_layout::config::LayoutConfig;
use reaction_layout::ir::{DiagramBuilder, EntityShape, ReactionDiagram, ReactionKind, RoleKind};
use reaction_layout::layout::compute_layout;
use reaction_layout::text_metrics::ApproximateMetrics;
use std::hint::black_box;

const ROLES: [RoleKind; 5] = RoleKind::ALL;

/// A reaction whose participants are spread over `depth` nested
/// compartments plus `siblings` side compartments, `per_compartment`
/// participants each, cycling through the role kinds.
fn synthetic_reaction(depth: usize, siblings: usize, per_compartment: usize) -> ReactionDiagram {
    let mut builder = DiagramBuilder::new();
    let mut compartments = Vec::new();
    let mut parent = builder.root();
    for level in 0..depth {
        parent = builder
            .compartment(format!("level {level}"), parent)
            .expect("parent exists");
        compartments.push(parent);
    }
    for idx in 0..siblings {
        let sibling = builder
            .compartment(format!("side {idx}"), builder.root())
            .expect("root exists");
        compartments.push(sibling);
    }

    let mut next = 0usize;
    for compartment in &compartments {
        for _ in 0..per_compartment {
            let entity = builder
                .entity(format!("E{next}"), EntityShape::Protein, *compartment)
                .expect("compartment exists");
            builder
                .role(entity, ROLES[next % ROLES.len()], 1 + (next % 3) as u32)
                .expect("entity exists");
            next += 1;
        }
    }
    builder
        .reaction("R", ReactionKind::Transition, compartments.first().copied())
        .expect("single reaction");
    builder.build().expect("valid diagram")
}

fn bench_layout(c: &mut Criterion) {
    let mut group = c.benchmark_group("layout");
    let config = LayoutConfig::default();
    let metrics = ApproximateMetrics::from_config(&config);
    for (name, depth, siblings, per_compartment) in [
        ("single", 1, 0, 3),
        ("nested", 3, 0, 4),
        ("siblings", 1, 3, 3),
        ("crowded", 2, 4, 6),
    ] {
        let diagram = synthetic_reaction(depth, siblings, per_compartment);
        group.bench_with_input(BenchmarkId::from_parameter(name), &diagram, |b, diagram| {
            b.iter(|| {
                let mut diagram = diagram.clone();
                compute_layout(black_box(&mut diagram), &metrics, &config);
                black_box(diagram.bounds);
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_layout);
criterion_main!(benches);
