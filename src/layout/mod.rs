mod boxes;
mod compaction;
mod compartments;
mod div;
mod grid;
mod group;
mod place;
mod routing;
mod sizing;
mod text;

use crate::config::LayoutConfig;
use crate::ir::ReactionDiagram;
use crate::text_metrics::{self, TextMeasure};

use boxes::Arrangement;

/// Positions every glyph, connector and compartment of `diagram` in place
/// and sets [`ReactionDiagram::bounds`], normalized to start at the origin.
///
/// Layout never fails: arrangements that cannot honour every placement
/// rule degrade (and log a warning) instead of erroring.
pub fn compute_layout(diagram: &mut ReactionDiagram, measure: &dyn TextMeasure, config: &LayoutConfig) {
    diagram.restore_synthetic_root();
    if diagram.reaction.compartment.is_none() {
        let root = diagram.root();
        diagram.move_reaction_to(root);
    }

    text::size_glyphs(diagram, measure, config);
    let mut arrangement = arrange_grid(diagram, config);
    let (rows, cols) = sizing::size_tracks(&arrangement, diagram, config);
    sizing::center_divs(&mut arrangement, diagram, &rows, &cols, config);
    routing::route_connectors(diagram, config);
    compartments::fit_compartments(diagram, config);
    diagram.drop_synthetic_root();

    let bounds = compartments::diagram_bounds(diagram);
    compartments::normalize(diagram, bounds);
    log::debug!(
        "laid out `{}` on a {}x{} grid ({:.1} x {:.1} of tracks), final size {:.1} x {:.1}",
        diagram.reaction.name,
        rows.sizes.len(),
        cols.sizes.len(),
        cols.total(),
        rows.total(),
        diagram.bounds.width,
        diagram.bounds.height
    );
}

/// [`compute_layout`] with the default configuration and system font metrics.
pub fn compute_layout_default(diagram: &mut ReactionDiagram) {
    compute_layout(diagram, text_metrics::system_metrics(), &LayoutConfig::default());
}

/// Box tree placement followed by the grid clean-up passes.
fn arrange_grid(diagram: &mut ReactionDiagram, config: &LayoutConfig) -> Arrangement {
    let mut arrangement = boxes::arrange(diagram, config);
    compaction::remove_empty_lines(&mut arrangement.grid);
    compaction::separate_reaction_axis(&mut arrangement, diagram);
    compaction::separate_bands(&mut arrangement, diagram);
    compaction::compact(&mut arrangement, diagram);
    compaction::remove_empty_lines(&mut arrangement.grid);
    arrangement
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{CompartmentId, DiagramBuilder, EntityShape, ReactionKind, RoleKind};
    use crate::text_metrics::ApproximateMetrics;

    fn participant(builder: &mut DiagramBuilder, name: &str, compartment: CompartmentId, kinds: &[RoleKind]) {
        let id = builder
            .entity(name, EntityShape::Protein, compartment)
            .unwrap();
        for kind in kinds {
            builder.role(id, *kind, 1).unwrap();
        }
    }

    fn arranged(diagram: &mut ReactionDiagram) -> Arrangement {
        let config = LayoutConfig::default();
        text::size_glyphs(diagram, &ApproximateMetrics::default(), &config);
        arrange_grid(diagram, &config)
    }

    fn cells_with(arrangement: &Arrangement, kind: RoleKind) -> Vec<(usize, usize)> {
        arrangement
            .grid
            .occupied()
            .filter(|(_, _, id)| arrangement.divs[**id].roles.contains(&kind))
            .map(|(r, c, _)| (r, c))
            .collect()
    }

    #[test]
    fn single_compartment_keeps_bands_next_to_the_reaction() {
        let mut builder = DiagramBuilder::new();
        let cytosol = builder.compartment("cytosol", builder.root()).unwrap();
        participant(&mut builder, "glucose", cytosol, &[RoleKind::Input]);
        participant(&mut builder, "G6P", cytosol, &[RoleKind::Output]);
        participant(&mut builder, "hexokinase", cytosol, &[RoleKind::Catalyst]);
        builder
            .reaction("phosphorylation", ReactionKind::Transition, Some(cytosol))
            .unwrap();
        let mut diagram = builder.build().unwrap();

        let arrangement = arranged(&mut diagram);
        let (rr, rc) = arrangement.reaction_cell().unwrap();
        assert_eq!(arrangement.grid.cols(), 3);
        assert_eq!((rr, rc), (1, 1));
        assert_eq!(cells_with(&arrangement, RoleKind::Input), vec![(1, 0)]);
        assert_eq!(cells_with(&arrangement, RoleKind::Output), vec![(1, 2)]);
        assert_eq!(cells_with(&arrangement, RoleKind::Catalyst), vec![(0, 1)]);
    }

    #[test]
    fn reaction_axis_separates_opposite_bands() {
        let mut builder = DiagramBuilder::new();
        let root = builder.root();
        let outer = builder.compartment("outer", root).unwrap();
        let inner = builder.compartment("inner", outer).unwrap();
        let side = builder.compartment("side", root).unwrap();
        participant(&mut builder, "a", inner, &[RoleKind::Input]);
        participant(&mut builder, "b", outer, &[RoleKind::Input]);
        participant(&mut builder, "c", side, &[RoleKind::Output]);
        participant(&mut builder, "d", outer, &[RoleKind::Catalyst]);
        participant(&mut builder, "e", inner, &[RoleKind::PositiveRegulator]);
        participant(&mut builder, "f", side, &[RoleKind::NegativeRegulator]);
        participant(&mut builder, "g", root, &[RoleKind::Output]);
        builder
            .reaction("r", ReactionKind::Transition, Some(inner))
            .unwrap();
        let mut diagram = builder.build().unwrap();

        let arrangement = arranged(&mut diagram);
        let (rr, rc) = arrangement.reaction_cell().unwrap();
        assert!(cells_with(&arrangement, RoleKind::Input).iter().all(|(_, c)| *c < rc));
        assert!(cells_with(&arrangement, RoleKind::Output).iter().all(|(_, c)| *c > rc));
        assert!(cells_with(&arrangement, RoleKind::Catalyst).iter().all(|(r, _)| *r < rr));
        let regulators: Vec<_> = cells_with(&arrangement, RoleKind::PositiveRegulator)
            .into_iter()
            .chain(cells_with(&arrangement, RoleKind::NegativeRegulator))
            .collect();
        assert!(regulators.iter().all(|(r, _)| *r > rr));
        assert!(compaction::is_valid(&arrangement.grid, &arrangement.divs, &diagram));
    }

    #[test]
    fn every_div_sits_in_its_compartment_or_a_descendant_cell() {
        let mut builder = DiagramBuilder::new();
        let root = builder.root();
        let outer = builder.compartment("outer", root).unwrap();
        let inner = builder.compartment("inner", outer).unwrap();
        participant(&mut builder, "in", inner, &[RoleKind::Input]);
        participant(&mut builder, "cat", inner, &[RoleKind::Catalyst]);
        participant(&mut builder, "out", outer, &[RoleKind::Output]);
        participant(&mut builder, "in 2", outer, &[RoleKind::Input]);
        builder
            .reaction("r", ReactionKind::Transition, Some(inner))
            .unwrap();
        let mut diagram = builder.build().unwrap();

        let arrangement = arranged(&mut diagram);
        let owners = compaction::assignment_grid(&arrangement.grid, &arrangement.divs, &diagram)
            .expect("compartments do not overlap");
        for (r, c, id) in arrangement.grid.occupied() {
            let owner = owners.get(r, c).copied().expect("occupied cells are owned");
            assert!(diagram.is_ancestor_or_self(owner, arrangement.divs[*id].compartment));
        }
    }

    #[test]
    fn layout_can_run_twice() {
        let mut builder = DiagramBuilder::new();
        let cytosol = builder.compartment("cytosol", builder.root()).unwrap();
        participant(&mut builder, "x", cytosol, &[RoleKind::Input]);
        participant(&mut builder, "y", cytosol, &[RoleKind::Output]);
        builder
            .reaction("r", ReactionKind::Transition, Some(cytosol))
            .unwrap();
        let mut diagram = builder.build().unwrap();
        let metrics = ApproximateMetrics::default();
        let config = LayoutConfig::default();

        compute_layout(&mut diagram, &metrics, &config);
        let first: Vec<_> = diagram.entities.iter().map(|e| e.bounds).collect();
        compute_layout(&mut diagram, &metrics, &config);
        let second: Vec<_> = diagram.entities.iter().map(|e| e.bounds).collect();
        assert_eq!(first, second);
        assert_eq!(diagram.entities[0].connectors.len(), 1);
        assert_eq!(diagram.compartments().count(), 1);
    }
}
