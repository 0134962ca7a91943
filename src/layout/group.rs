use crate::geometry::{Point, Rect};
use crate::ir::{EntityId, ReactionDiagram};

use super::div::Orientation;

/// Size of a leaf group once its glyphs are laid out with `gap` between them.
pub(super) fn group_size(
    diagram: &ReactionDiagram,
    glyphs: &[EntityId],
    orientation: Orientation,
    gap: f32,
) -> (f32, f32) {
    let sizes = glyphs.iter().map(|id| {
        let bounds = diagram.entity(*id).full_bounds();
        (bounds.width, bounds.height)
    });
    let spacing = gap * glyphs.len().saturating_sub(1) as f32;
    match orientation {
        Orientation::Horizontal => {
            let (width, height) = sizes.fold((0.0f32, 0.0f32), |(w, h), (gw, gh)| (w + gw, h.max(gh)));
            (width + spacing, height)
        }
        Orientation::Vertical => {
            let (width, height) = sizes.fold((0.0f32, 0.0f32), |(w, h), (gw, gh)| (w.max(gw), h + gh));
            (width, height + spacing)
        }
    }
}

/// Moves the group's glyphs into a row or column centred on `center` and
/// returns the bounds they cover.
pub(super) fn place_group(
    diagram: &mut ReactionDiagram,
    glyphs: &[EntityId],
    orientation: Orientation,
    gap: f32,
    center: Point,
) -> Rect {
    let (width, height) = group_size(diagram, glyphs, orientation, gap);
    let area = Rect::centered_at(center, width, height);
    let mut cursor = match orientation {
        Orientation::Horizontal => area.x,
        Orientation::Vertical => area.y,
    };
    for id in glyphs {
        let entity = diagram.entity_mut(*id);
        let full = entity.full_bounds();
        let target = match orientation {
            Orientation::Horizontal => Point::new(cursor + full.width / 2.0, center.y),
            Orientation::Vertical => Point::new(center.x, cursor + full.height / 2.0),
        };
        let current = full.center();
        entity.translate(target.x - current.x, target.y - current.y);
        cursor += gap
            + match orientation {
                Orientation::Horizontal => full.width,
                Orientation::Vertical => full.height,
            };
    }
    area
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{DiagramBuilder, EntityShape, ReactionKind, RoleKind};

    fn diagram_with(widths: &[f32]) -> (ReactionDiagram, Vec<EntityId>) {
        let mut builder = DiagramBuilder::new();
        let root = builder.root();
        let mut ids = Vec::new();
        for (idx, _) in widths.iter().enumerate() {
            let id = builder
                .entity(format!("e{idx}"), EntityShape::Protein, root)
                .unwrap();
            builder.role(id, RoleKind::Input, 1).unwrap();
            ids.push(id);
        }
        builder.reaction("r", ReactionKind::Transition, None).unwrap();
        let mut diagram = builder.build().unwrap();
        for (id, width) in ids.iter().zip(widths) {
            diagram.entity_mut(*id).bounds = Rect::new(0.0, 0.0, *width, 20.0);
        }
        (diagram, ids)
    }

    #[test]
    fn vertical_group_stacks_with_gap() {
        let (mut diagram, ids) = diagram_with(&[40.0, 80.0]);
        let (w, h) = group_size(&diagram, &ids, Orientation::Vertical, 10.0);
        assert_eq!((w, h), (80.0, 50.0));

        let area = place_group(
            &mut diagram,
            &ids,
            Orientation::Vertical,
            10.0,
            Point::new(100.0, 100.0),
        );
        assert_eq!(area, Rect::new(60.0, 75.0, 80.0, 50.0));
        let first = diagram.entity(ids[0]).bounds;
        let second = diagram.entity(ids[1]).bounds;
        assert_eq!(first, Rect::new(80.0, 75.0, 40.0, 20.0));
        assert_eq!(second.y - first.bottom(), 10.0);
        assert_eq!(second.center().x, 100.0);
    }

    #[test]
    fn horizontal_group_keeps_input_order() {
        let (mut diagram, ids) = diagram_with(&[30.0, 30.0, 30.0]);
        place_group(
            &mut diagram,
            &ids,
            Orientation::Horizontal,
            5.0,
            Point::new(0.0, 0.0),
        );
        let xs: Vec<f32> = ids.iter().map(|id| diagram.entity(*id).bounds.x).collect();
        assert_eq!(xs, vec![-50.0, -15.0, 20.0]);
    }
}
