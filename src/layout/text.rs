use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect, Segment};
use crate::ir::{EntityShape, ReactionDiagram};
use crate::text_metrics::{TextMeasure, TextSize};

/// Height of the glyph drawn for an entity of `shape`.
fn shape_height(shape: EntityShape, config: &LayoutConfig) -> f32 {
    if shape.is_chemical() {
        config.chemical_height
    } else if shape.is_gene() {
        config.gene_height
    } else {
        config.entity_height
    }
}

pub(super) fn measure_label(text: &str, measure: &dyn TextMeasure, config: &LayoutConfig) -> TextSize {
    measure.measure(text, config.font_size)
}

/// Gives every glyph its size at the origin. Positions are assigned later,
/// once the grid is sized; connectors from an earlier run are discarded.
pub(super) fn size_glyphs(
    diagram: &mut ReactionDiagram,
    measure: &dyn TextMeasure,
    config: &LayoutConfig,
) {
    for entity in &mut diagram.entities {
        let label = measure_label(&entity.name, measure, config);
        let width = config
            .entity_min_width
            .max(label.width + 2.0 * config.entity_padding_x);
        let height = shape_height(entity.shape, config).max(label.height);
        entity.bounds = Rect::new(0.0, 0.0, width, height);
        entity.connectors.clear();

        let slots = entity.attachments.len() as f32 + 1.0;
        for (idx, attachment) in entity.attachments.iter_mut().enumerate() {
            let x = width * (idx as f32 + 1.0) / slots;
            attachment.bounds = Rect::centered_at(
                Point::new(x, 0.0),
                config.attachment_size,
                config.attachment_size,
            );
        }
    }

    let size = config.reaction_size;
    let mid = size / 2.0;
    diagram.reaction.bounds = Rect::new(0.0, 0.0, size, size);
    diagram.reaction.backbone = vec![
        Segment::new(Point::new(0.0, mid), Point::new(-config.backbone_length, mid)),
        Segment::new(
            Point::new(size, mid),
            Point::new(size + config.backbone_length, mid),
        ),
    ];

    for compartment in &mut diagram.compartments {
        compartment.bounds = Rect::default();
        compartment.label_bounds = if compartment.synthetic {
            Rect::default()
        } else {
            let label = measure_label(&compartment.name, measure, config);
            Rect::new(0.0, 0.0, label.width, label.height)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DiagramBuilder, ReactionKind, RoleKind};
    use crate::text_metrics::ApproximateMetrics;

    #[test]
    fn short_names_use_the_minimum_width() {
        let mut builder = DiagramBuilder::new();
        let root = builder.root();
        let atp = builder.entity("ATP", EntityShape::Chemical, root).unwrap();
        builder.role(atp, RoleKind::Input, 1).unwrap();
        let long = builder
            .entity(
                "phosphatidylinositol 3,4,5-trisphosphate",
                EntityShape::Protein,
                root,
            )
            .unwrap();
        builder.role(long, RoleKind::Output, 1).unwrap();
        builder.attachment(long, "p-S473").unwrap();
        builder.attachment(long, "p-T308").unwrap();
        builder.reaction("r", ReactionKind::Transition, None).unwrap();
        let mut diagram = builder.build().unwrap();

        let config = LayoutConfig::default();
        size_glyphs(&mut diagram, &ApproximateMetrics::default(), &config);

        let atp = diagram.entity(atp);
        assert_eq!(atp.bounds.width, config.entity_min_width);
        assert_eq!(atp.bounds.height, config.chemical_height);

        let long = diagram.entity(long);
        assert!(long.bounds.width > config.entity_min_width);
        let xs: Vec<f32> = long.attachments.iter().map(|a| a.bounds.center().x).collect();
        assert!((xs[0] - long.bounds.width / 3.0).abs() < 1e-3);
        assert!((xs[1] - 2.0 * long.bounds.width / 3.0).abs() < 1e-3);
        assert!(long.full_bounds().y < 0.0, "attachments straddle the top border");

        assert_eq!(diagram.reaction.extent().width, 12.0 + 40.0);
        assert_eq!(diagram.reaction.input_tip(), Point::new(-20.0, 6.0));
    }
}
