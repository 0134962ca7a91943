use std::collections::BTreeSet;
use std::ops::{Index, IndexMut};

use crate::geometry::{Point, Rect};
use crate::ir::{CompartmentId, EntityId, ReactionDiagram, RoleKind};

use super::group;
use super::place::{Place, PlaceSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct DivId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Orientation {
    /// Glyphs side by side in one row.
    Horizontal,
    /// Glyphs stacked in one column.
    Vertical,
}

impl Orientation {
    pub(crate) fn of_band(band: Place) -> Orientation {
        match band {
            Place::Top | Place::Bottom => Orientation::Horizontal,
            Place::Left | Place::Right | Place::Center => Orientation::Vertical,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub(crate) struct Padding {
    pub(crate) left: f32,
    pub(crate) right: f32,
    pub(crate) top: f32,
    pub(crate) bottom: f32,
}

impl Padding {
    pub(crate) fn uniform(value: f32) -> Self {
        Self {
            left: value,
            right: value,
            top: value,
            bottom: value,
        }
    }
}

/// Rows and columns of the global grid reserved for one compartment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Frame {
    pub(crate) row: usize,
    pub(crate) col: usize,
    pub(crate) rows: usize,
    pub(crate) cols: usize,
}

impl Frame {
    pub(crate) fn last_row(&self) -> usize {
        self.row + self.rows.max(1) - 1
    }

    pub(crate) fn last_col(&self) -> usize {
        self.col + self.cols.max(1) - 1
    }

    pub(crate) fn contains(&self, row: usize, col: usize) -> bool {
        row >= self.row && row <= self.last_row() && col >= self.col && col <= self.last_col()
    }

    /// Accounts for `count` rows inserted before `at`. The owner of the
    /// insertion always grows; other frames grow when the new rows land
    /// strictly inside them and shift when they land before them.
    pub(crate) fn insert_rows(&mut self, at: usize, count: usize, owner: bool) {
        if owner || (at > self.row && at <= self.last_row()) {
            self.rows += count;
        } else if at <= self.row {
            self.row += count;
        }
    }

    pub(crate) fn insert_cols(&mut self, at: usize, count: usize, owner: bool) {
        if owner || (at > self.col && at <= self.last_col()) {
            self.cols += count;
        } else if at <= self.col {
            self.col += count;
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct BoxNode {
    pub(crate) frame: Frame,
    /// Cell the compartment's contents gather around.
    pub(crate) axis: (usize, usize),
    pub(crate) children: Vec<DivId>,
    /// Groups and the reaction owned directly by this compartment.
    pub(crate) members: Vec<DivId>,
}

#[derive(Debug, Clone)]
pub(crate) struct Group {
    pub(crate) orientation: Orientation,
    pub(crate) band: Place,
    pub(crate) glyphs: Vec<EntityId>,
}

#[derive(Debug, Clone)]
pub(crate) enum DivKind {
    Box(BoxNode),
    Group(Group),
    Reaction,
}

#[derive(Debug, Clone)]
pub(crate) struct Div {
    pub(crate) kind: DivKind,
    pub(crate) compartment: CompartmentId,
    pub(crate) busy: PlaceSet,
    pub(crate) roles: BTreeSet<RoleKind>,
    pub(crate) padding: Padding,
    /// Size is known once glyphs are measured; position once centred.
    pub(crate) bounds: Rect,
}

impl Div {
    pub(crate) fn as_box(&self) -> Option<&BoxNode> {
        match &self.kind {
            DivKind::Box(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn as_box_mut(&mut self) -> Option<&mut BoxNode> {
        match &mut self.kind {
            DivKind::Box(node) => Some(node),
            _ => None,
        }
    }

    pub(crate) fn is_reaction(&self) -> bool {
        matches!(self.kind, DivKind::Reaction)
    }

    /// Group whose glyphs run along a row (catalysts, regulators).
    pub(crate) fn is_horizontal_band(&self) -> bool {
        matches!(&self.kind, DivKind::Group(group) if group.orientation == Orientation::Horizontal)
    }

    /// Group whose glyphs run down a column (inputs, outputs).
    pub(crate) fn is_vertical_band(&self) -> bool {
        matches!(&self.kind, DivKind::Group(group) if group.orientation == Orientation::Vertical)
    }

    /// The band a group was created for, `None` for anything else.
    pub(crate) fn band(&self) -> Option<Place> {
        match &self.kind {
            DivKind::Group(group) => Some(group.band),
            _ => None,
        }
    }

    pub(crate) fn shares_row_band(&self, other: &Div) -> bool {
        self.busy
            .intersection(&other.busy)
            .any(|place| place.is_row_exclusive())
    }

    pub(crate) fn shares_column_band(&self, other: &Div) -> bool {
        self.busy
            .intersection(&other.busy)
            .any(|place| place.is_column_exclusive())
    }

    pub(crate) fn padded_width(&self) -> f32 {
        self.bounds.width + self.padding.left + self.padding.right
    }

    pub(crate) fn padded_height(&self) -> f32 {
        self.bounds.height + self.padding.top + self.padding.bottom
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct DivArena {
    divs: Vec<Div>,
}

impl DivArena {
    pub(crate) fn push(&mut self, div: Div) -> DivId {
        let id = DivId(self.divs.len());
        self.divs.push(div);
        id
    }

    pub(crate) fn len(&self) -> usize {
        self.divs.len()
    }

    /// Moves the div's glyphs so that its content is centred on `center`.
    pub(crate) fn center_on(
        &mut self,
        id: DivId,
        diagram: &mut ReactionDiagram,
        center: Point,
        gap: f32,
    ) {
        let div = &mut self.divs[id.0];
        match &div.kind {
            DivKind::Group(group) => {
                div.bounds = group::place_group(diagram, &group.glyphs, group.orientation, gap, center);
            }
            DivKind::Reaction => {
                let current = diagram.reaction.extent().center();
                diagram
                    .reaction
                    .translate(center.x - current.x, center.y - current.y);
                div.bounds.move_center_to(center);
            }
            DivKind::Box(_) => {
                unreachable!("compartment boxes never occupy a grid cell")
            }
        }
    }
}

impl Index<DivId> for DivArena {
    type Output = Div;

    fn index(&self, id: DivId) -> &Div {
        &self.divs[id.0]
    }
}

impl IndexMut<DivId> for DivArena {
    fn index_mut(&mut self, id: DivId) -> &mut Div {
        &mut self.divs[id.0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_frame_grows_and_later_frames_shift() {
        let mut owner = Frame {
            row: 2,
            col: 0,
            rows: 3,
            cols: 3,
        };
        let mut below = Frame {
            row: 6,
            col: 0,
            rows: 3,
            cols: 3,
        };
        let mut around = Frame {
            row: 0,
            col: 0,
            rows: 10,
            cols: 3,
        };
        let mut above = Frame {
            row: 0,
            col: 0,
            rows: 2,
            cols: 3,
        };
        for (frame, is_owner) in [
            (&mut owner, true),
            (&mut below, false),
            (&mut around, false),
            (&mut above, false),
        ] {
            frame.insert_rows(2, 1, is_owner);
        }
        assert_eq!((owner.row, owner.rows), (2, 4));
        assert_eq!((below.row, below.rows), (7, 3));
        assert_eq!((around.row, around.rows), (0, 11));
        assert_eq!((above.row, above.rows), (0, 2));
    }

    #[test]
    fn frame_contains_its_cells_only() {
        let frame = Frame {
            row: 1,
            col: 1,
            rows: 3,
            cols: 3,
        };
        assert!(frame.contains(1, 1));
        assert!(frame.contains(3, 3));
        assert!(!frame.contains(4, 2));
        assert!(!frame.contains(0, 2));
    }

    #[test]
    fn band_sharing_uses_exclusive_sides() {
        let group = |busy: &[Place]| Div {
            kind: DivKind::Reaction,
            compartment: CompartmentId(0),
            busy: busy.iter().copied().collect(),
            roles: BTreeSet::new(),
            padding: Padding::default(),
            bounds: Rect::default(),
        };
        let inputs = group(&[Place::Left]);
        let input_catalysts = group(&[Place::Left, Place::Top]);
        let catalysts = group(&[Place::Top]);
        assert!(inputs.shares_row_band(&input_catalysts));
        assert!(!inputs.shares_column_band(&input_catalysts));
        assert!(catalysts.shares_column_band(&input_catalysts));
        assert!(!catalysts.shares_row_band(&inputs));
    }
}
