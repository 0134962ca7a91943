use crate::config::LayoutConfig;
use crate::geometry::{Point, Rect, union_all};
use crate::ir::{CompartmentId, Pointer, ReactionDiagram, RoleKind};

/// Highest point a connector of `pointer` reaches above its entity.
fn connector_top(diagram: &ReactionDiagram, entity: usize, pointer: Pointer) -> Option<f32> {
    diagram.entities[entity]
        .connectors
        .iter()
        .filter(|connector| connector.pointer == pointer)
        .filter_map(|connector| connector.bounds())
        .map(|bounds| bounds.y)
        .reduce(f32::min)
}

fn owns_catalyst(diagram: &ReactionDiagram, id: CompartmentId) -> bool {
    diagram
        .compartment(id)
        .entities
        .iter()
        .any(|entity| diagram.entity(*entity).has_role(RoleKind::Catalyst))
}

/// Bounds of every compartment, children first: its content inflated by
/// the padding, then enlarged to fit the name label. Compartments owning a
/// catalyst carry the label on top, the others at the bottom.
pub(super) fn fit_compartments(diagram: &mut ReactionDiagram, config: &LayoutConfig) {
    let holder = diagram.reaction_compartment();
    let reaction = diagram
        .reaction
        .extent()
        .inflate(config.reaction_padding, config.reaction_padding);
    let pad = config.compartment_padding;
    let label_pad = config.compartment_label_padding;

    for id in diagram.post_order() {
        let compartment = diagram.compartment(id);
        let mut rects: Vec<Rect> = compartment
            .children
            .iter()
            .map(|child| diagram.compartment(*child).bounds)
            .collect();
        for entity in &compartment.entities {
            let glyph = diagram.entity(*entity);
            let mut bounds = glyph.full_bounds();
            if glyph.is_input_catalyst()
                && let Some(top) = connector_top(diagram, entity.0, Pointer::Catalyst)
            {
                bounds = bounds.union_point(Point::new(bounds.center().x, top));
            }
            rects.push(bounds);
        }
        if id == holder {
            rects.push(reaction);
        }
        let Some(content) = union_all(rects) else {
            continue;
        };
        let mut bounds = content.inflate(pad, pad);
        if compartment.synthetic {
            diagram.compartment_mut(id).bounds = bounds;
            continue;
        }

        let label = compartment.label_bounds;
        let needed = label.width + 2.0 * label_pad;
        if bounds.width < needed {
            bounds.x -= (needed - bounds.width) / 2.0;
            bounds.width = needed;
        }
        let room = label.height + label_pad;
        let label_y = if owns_catalyst(diagram, id) {
            bounds.y -= room;
            bounds.height += room;
            bounds.y + label_pad
        } else {
            bounds.height += room;
            bounds.bottom() - label_pad - label.height
        };
        let label_x = if label.width > bounds.width / 2.0 {
            bounds.center().x - label.width / 2.0
        } else {
            bounds.right() - label_pad - label.width
        };

        let compartment = diagram.compartment_mut(id);
        compartment.bounds = bounds;
        compartment.label_bounds = Rect::new(label_x, label_y, label.width, label.height);
    }
}

/// Union of everything drawn: compartments, glyphs, connectors and the
/// reaction with its backbone.
pub(super) fn diagram_bounds(diagram: &ReactionDiagram) -> Rect {
    let compartments = diagram
        .compartments()
        .flat_map(|compartment| [compartment.bounds, compartment.label_bounds]);
    let entities = diagram.entities.iter().flat_map(|entity| {
        std::iter::once(entity.full_bounds())
            .chain(entity.connectors.iter().filter_map(|connector| connector.bounds()))
    });
    union_all(
        compartments
            .chain(entities)
            .chain(std::iter::once(diagram.reaction.extent())),
    )
    .unwrap_or_default()
}

/// Moves everything so that `bounds` starts at the origin.
pub(super) fn normalize(diagram: &mut ReactionDiagram, bounds: Rect) {
    let (dx, dy) = (-bounds.x, -bounds.y);
    for entity in &mut diagram.entities {
        entity.translate(dx, dy);
    }
    for compartment in diagram.compartments.iter_mut().filter(|c| !c.synthetic) {
        compartment.translate(dx, dy);
    }
    diagram.reaction.translate(dx, dy);
    diagram.bounds = Rect::new(0.0, 0.0, bounds.width, bounds.height);
}
