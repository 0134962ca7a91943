// Grid clean-up after the box tree is flattened. Every change is tried on a
// clone and kept only while compartments stay nested rectangles.

use std::collections::{BTreeMap, BTreeSet};

use crate::ir::{CompartmentId, ReactionDiagram};

use super::boxes::{Arrangement, on_side};
use super::div::{DivArena, DivId};
use super::grid::Grid;
use super::place::{Place, SIDES};

/// Inclusive rectangle of grid cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CellRect {
    pub(crate) top: usize,
    pub(crate) bottom: usize,
    pub(crate) left: usize,
    pub(crate) right: usize,
}

impl CellRect {
    fn cell(row: usize, col: usize) -> Self {
        Self {
            top: row,
            bottom: row,
            left: col,
            right: col,
        }
    }

    fn include(&mut self, row: usize, col: usize) {
        self.top = self.top.min(row);
        self.bottom = self.bottom.max(row);
        self.left = self.left.min(col);
        self.right = self.right.max(col);
    }
}

/// Bounding cell rectangle of every compartment that holds a div, directly
/// or through a nested compartment.
pub(crate) fn content_rects(
    grid: &Grid<DivId>,
    divs: &DivArena,
    diagram: &ReactionDiagram,
) -> BTreeMap<CompartmentId, CellRect> {
    let mut rects: BTreeMap<CompartmentId, CellRect> = BTreeMap::new();
    for (row, col, id) in grid.occupied() {
        let mut current = Some(divs[*id].compartment);
        while let Some(compartment) = current {
            rects
                .entry(compartment)
                .and_modify(|rect| rect.include(row, col))
                .or_insert_with(|| CellRect::cell(row, col));
            current = diagram.compartment(compartment).parent;
        }
    }
    rects
}

/// Deepest compartment claiming each cell, or `None` when two unrelated
/// compartments claim the same cell.
pub(crate) fn assignment_grid(
    grid: &Grid<DivId>,
    divs: &DivArena,
    diagram: &ReactionDiagram,
) -> Option<Grid<CompartmentId>> {
    let rects = content_rects(grid, divs, diagram);
    let mut owners: Grid<CompartmentId> = Grid::new(grid.rows(), grid.cols());
    for compartment in diagram.post_order() {
        let Some(rect) = rects.get(&compartment) else {
            continue;
        };
        for row in rect.top..=rect.bottom {
            for col in rect.left..=rect.right {
                match owners.get(row, col) {
                    None => owners.set(row, col, Some(compartment)),
                    Some(owner) if diagram.is_ancestor_or_self(compartment, *owner) => {}
                    Some(_) => return None,
                }
            }
        }
    }
    Some(owners)
}

/// Compartments form nested, non-overlapping rectangles and every div sits
/// in a cell owned by its own compartment or an ancestor of it.
pub(crate) fn is_valid(grid: &Grid<DivId>, divs: &DivArena, diagram: &ReactionDiagram) -> bool {
    let Some(owners) = assignment_grid(grid, divs, diagram) else {
        return false;
    };
    grid.occupied().all(|(row, col, id)| {
        owners
            .get(row, col)
            .is_some_and(|owner| diagram.is_ancestor_or_self(*owner, divs[*id].compartment))
    })
}

/// Drops every empty row and column, one contiguous run at a time.
pub(super) fn remove_empty_lines(grid: &mut Grid<DivId>) {
    let mut row = grid.rows();
    while row > 0 {
        let end = row;
        while row > 0 && grid.is_row_empty(row - 1) {
            row -= 1;
        }
        if row < end {
            grid.remove_rows(row, end - row);
        } else {
            row -= 1;
        }
    }
    let mut col = grid.cols();
    while col > 0 {
        let end = col;
        while col > 0 && grid.is_col_empty(col - 1) {
            col -= 1;
        }
        if col < end {
            grid.remove_cols(col, end - col);
        } else {
            col -= 1;
        }
    }
}

/// Keeps a single same-side group on the reaction's row and column; the
/// others move into a fresh line next to their cell.
pub(super) fn separate_reaction_axis(arrangement: &mut Arrangement, diagram: &ReactionDiagram) {
    let mut skipped: BTreeSet<DivId> = BTreeSet::new();
    loop {
        let Some(axis) = arrangement.reaction_cell() else {
            return;
        };
        let Some((id, side, cell)) = axis_surplus(arrangement, axis, &skipped) else {
            return;
        };
        let moved = match side {
            Place::Left | Place::Right => shift_into_new_row(arrangement, diagram, id, cell),
            _ => shift_into_new_col(arrangement, diagram, id, cell),
        };
        if !moved {
            log::debug!("cannot move {side:?} group off the reaction axis; leaving it shared");
            skipped.insert(id);
        }
    }
}

/// Farthest group of a side holding more than one group on the reaction axis.
fn axis_surplus(
    arrangement: &Arrangement,
    axis: (usize, usize),
    skipped: &BTreeSet<DivId>,
) -> Option<(DivId, Place, (usize, usize))> {
    for side in SIDES {
        let mut on_axis: Vec<((usize, usize), DivId)> = arrangement
            .grid
            .occupied()
            .filter(|(r, c, id)| {
                let in_line = match side {
                    Place::Left | Place::Right => *r == axis.0,
                    _ => *c == axis.1,
                };
                in_line
                    && on_side(side, (*r, *c), axis)
                    && arrangement.divs[**id].busy.contains(&side)
            })
            .map(|(r, c, id)| ((r, c), *id))
            .collect();
        if on_axis.len() < 2 {
            continue;
        }
        on_axis.sort_by_key(|(cell, _)| cell.0.abs_diff(axis.0) + cell.1.abs_diff(axis.1));
        if let Some((cell, id)) = on_axis
            .iter()
            .skip(1)
            .rev()
            .find(|(_, id)| !skipped.contains(id))
        {
            return Some((*id, side, *cell));
        }
    }
    None
}

fn shift_into_new_row(
    arrangement: &mut Arrangement,
    diagram: &ReactionDiagram,
    id: DivId,
    (row, col): (usize, usize),
) -> bool {
    // Above first, then below.
    for (insert_at, from, to) in [(row, row + 1, row), (row + 1, row, row + 1)] {
        let mut trial = arrangement.grid.clone();
        trial.insert_rows(insert_at, 1);
        trial.take(from, col);
        trial.set(to, col, Some(id));
        if is_valid(&trial, &arrangement.divs, diagram) {
            arrangement.grid = trial;
            return true;
        }
    }
    false
}

fn shift_into_new_col(
    arrangement: &mut Arrangement,
    diagram: &ReactionDiagram,
    id: DivId,
    (row, col): (usize, usize),
) -> bool {
    for (insert_at, from, to) in [(col, col + 1, col), (col + 1, col, col + 1)] {
        let mut trial = arrangement.grid.clone();
        trial.insert_cols(insert_at, 1);
        trial.take(row, from);
        trial.set(row, to, Some(id));
        if is_valid(&trial, &arrangement.divs, diagram) {
            arrangement.grid = trial;
            return true;
        }
    }
    false
}

/// Row groups (catalysts, regulators) and column groups (inputs, outputs)
/// never share a line: catalysts move up, regulators down, inputs left and
/// outputs right, each into a line of its own.
pub(super) fn separate_bands(arrangement: &mut Arrangement, diagram: &ReactionDiagram) {
    let mut skipped: BTreeSet<DivId> = BTreeSet::new();
    loop {
        if let Some((id, band, cell)) = mixed_row(arrangement, &skipped) {
            let moved = if band == Place::Top {
                shift_into_new_row_at(arrangement, diagram, id, cell, cell.0)
            } else {
                shift_into_new_row_at(arrangement, diagram, id, cell, cell.0 + 1)
            };
            if !moved {
                skipped.insert(id);
            }
            continue;
        }
        if let Some((id, band, cell)) = mixed_col(arrangement, &skipped) {
            let moved = if band == Place::Left {
                shift_into_new_col_at(arrangement, diagram, id, cell, cell.1)
            } else {
                shift_into_new_col_at(arrangement, diagram, id, cell, cell.1 + 1)
            };
            if !moved {
                skipped.insert(id);
            }
            continue;
        }
        return;
    }
}

/// A row group sharing its row with a column group.
fn mixed_row(arrangement: &Arrangement, skipped: &BTreeSet<DivId>) -> Option<(DivId, Place, (usize, usize))> {
    let divs = &arrangement.divs;
    (0..arrangement.grid.rows()).find_map(|row| {
        let line = arrangement.grid.row(row);
        let has_column_group = line.iter().flatten().any(|id| divs[*id].is_vertical_band());
        if !has_column_group {
            return None;
        }
        line.iter().enumerate().find_map(|(col, cell)| {
            let id = (*cell)?;
            let div = &divs[id];
            if div.is_horizontal_band() && !skipped.contains(&id) {
                Some((id, div.band()?, (row, col)))
            } else {
                None
            }
        })
    })
}

fn mixed_col(arrangement: &Arrangement, skipped: &BTreeSet<DivId>) -> Option<(DivId, Place, (usize, usize))> {
    let divs = &arrangement.divs;
    (0..arrangement.grid.cols()).find_map(|col| {
        let line = arrangement.grid.col(col);
        let has_row_group = line.iter().flatten().any(|id| divs[*id].is_horizontal_band());
        if !has_row_group {
            return None;
        }
        line.iter().enumerate().find_map(|(row, cell)| {
            let id = (*cell)?;
            let div = &divs[id];
            if div.is_vertical_band() && !skipped.contains(&id) {
                Some((id, div.band()?, (row, col)))
            } else {
                None
            }
        })
    })
}

fn shift_into_new_row_at(
    arrangement: &mut Arrangement,
    diagram: &ReactionDiagram,
    id: DivId,
    (row, col): (usize, usize),
    insert_at: usize,
) -> bool {
    let mut trial = arrangement.grid.clone();
    trial.insert_rows(insert_at, 1);
    let from = if insert_at <= row { row + 1 } else { row };
    trial.take(from, col);
    trial.set(insert_at, col, Some(id));
    if is_valid(&trial, &arrangement.divs, diagram) {
        arrangement.grid = trial;
        true
    } else {
        false
    }
}

fn shift_into_new_col_at(
    arrangement: &mut Arrangement,
    diagram: &ReactionDiagram,
    id: DivId,
    (row, col): (usize, usize),
    insert_at: usize,
) -> bool {
    let mut trial = arrangement.grid.clone();
    trial.insert_cols(insert_at, 1);
    let from = if insert_at <= col { col + 1 } else { col };
    trial.take(row, from);
    trial.set(row, insert_at, Some(id));
    if is_valid(&trial, &arrangement.divs, diagram) {
        arrangement.grid = trial;
        true
    } else {
        false
    }
}

/// Slides divs one cell at a time towards the reaction's row and column
/// until no direction moves anything.
pub(super) fn compact(arrangement: &mut Arrangement, diagram: &ReactionDiagram) {
    loop {
        let mut moved = false;
        for direction in SIDES {
            while compact_step(arrangement, diagram, direction) {
                moved = true;
            }
        }
        if !moved {
            return;
        }
    }
}

/// One pass moving every eligible div a single cell in `direction`,
/// nearest to the reaction axis first.
fn compact_step(arrangement: &mut Arrangement, diagram: &ReactionDiagram, direction: Place) -> bool {
    let Some(axis) = arrangement.reaction_cell() else {
        return false;
    };
    let mut movers: Vec<(usize, usize, DivId)> = arrangement
        .grid
        .occupied()
        .filter(|(_, _, id)| !arrangement.divs[**id].is_reaction())
        .filter(|(r, c, _)| match direction {
            Place::Left => *c > axis.1,
            Place::Right => *c < axis.1,
            Place::Top => *r > axis.0,
            Place::Bottom => *r < axis.0,
            Place::Center => false,
        })
        .map(|(r, c, id)| (r, c, *id))
        .collect();
    movers.sort_by_key(|(r, c, _)| match direction {
        Place::Left | Place::Right => c.abs_diff(axis.1),
        _ => r.abs_diff(axis.0),
    });

    let mut moved = false;
    for (row, col, id) in movers {
        let target = match direction {
            Place::Left => (row, col - 1),
            Place::Right => (row, col + 1),
            Place::Top => (row - 1, col),
            _ => (row + 1, col),
        };
        if try_move(arrangement, diagram, id, (row, col), target, axis) {
            moved = true;
        }
    }
    moved
}

fn try_move(
    arrangement: &mut Arrangement,
    diagram: &ReactionDiagram,
    id: DivId,
    from: (usize, usize),
    to: (usize, usize),
    axis: (usize, usize),
) -> bool {
    if !arrangement.grid.is_empty_at(to.0, to.1) {
        return false;
    }
    let div = &arrangement.divs[id];

    // A group never crosses the reaction axis it started on the right side of.
    let crosses = div
        .busy
        .iter()
        .any(|side| on_side(*side, from, axis) && !on_side(*side, to, axis));
    if crosses {
        return false;
    }

    let conflict = arrangement.grid.occupied().any(|(r, c, other)| {
        *other != id
            && ((to.0 != from.0 && r == to.0 && div.shares_row_band(&arrangement.divs[*other]))
                || (to.1 != from.1 && c == to.1 && div.shares_column_band(&arrangement.divs[*other])))
    });
    if conflict {
        return false;
    }

    let mut trial = arrangement.grid.clone();
    trial.take(from.0, from.1);
    trial.set(to.0, to.1, Some(id));
    if is_valid(&trial, &arrangement.divs, diagram) {
        arrangement.grid = trial;
        true
    } else {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::ir::{DiagramBuilder, EntityShape, ReactionKind, RoleKind};
    use crate::layout::div::{Div, DivKind, Group, Orientation, Padding};
    use crate::layout::place::PlaceSet;

    struct Fixture {
        diagram: ReactionDiagram,
        inner: CompartmentId,
        other: CompartmentId,
    }

    fn fixture() -> Fixture {
        let mut builder = DiagramBuilder::new();
        let root = builder.root();
        let inner = builder.compartment("inner", root).unwrap();
        let other = builder.compartment("other", root).unwrap();
        for (name, compartment) in [("a", inner), ("b", other), ("c", root)] {
            let id = builder
                .entity(name, EntityShape::Protein, compartment)
                .unwrap();
            builder.role(id, RoleKind::Input, 1).unwrap();
        }
        builder.reaction("r", ReactionKind::Transition, None).unwrap();
        Fixture {
            diagram: builder.build().unwrap(),
            inner,
            other,
        }
    }

    fn group(compartment: CompartmentId, band: Place) -> Div {
        Div {
            kind: DivKind::Group(Group {
                orientation: Orientation::of_band(band),
                band,
                glyphs: Vec::new(),
            }),
            compartment,
            busy: PlaceSet::from([band]),
            roles: BTreeSet::new(),
            padding: Padding::default(),
            bounds: Rect::default(),
        }
    }

    fn reaction(compartment: CompartmentId) -> Div {
        Div {
            kind: DivKind::Reaction,
            compartment,
            busy: PlaceSet::from([Place::Center]),
            roles: BTreeSet::new(),
            padding: Padding::default(),
            bounds: Rect::default(),
        }
    }

    #[test]
    fn nested_rectangles_are_valid() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let a = divs.push(group(f.inner, Place::Left));
        let b = divs.push(group(root, Place::Left));
        let mut grid = Grid::new(3, 3);
        grid.set(1, 1, Some(a));
        grid.set(0, 0, Some(b));
        assert!(is_valid(&grid, &divs, &f.diagram));

        let owners = assignment_grid(&grid, &divs, &f.diagram).unwrap();
        assert_eq!(owners.get(1, 1), Some(&f.inner));
        assert_eq!(owners.get(0, 1), Some(&root));
    }

    #[test]
    fn overlapping_siblings_are_invalid() {
        let f = fixture();
        let mut divs = DivArena::default();
        let a1 = divs.push(group(f.inner, Place::Left));
        let a2 = divs.push(group(f.inner, Place::Top));
        let b = divs.push(group(f.other, Place::Left));
        let mut grid = Grid::new(3, 3);
        grid.set(0, 0, Some(a1));
        grid.set(2, 2, Some(a2));
        grid.set(1, 1, Some(b));
        assert!(!is_valid(&grid, &divs, &f.diagram));
    }

    #[test]
    fn parent_div_inside_child_rect_is_invalid() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let a1 = divs.push(group(f.inner, Place::Left));
        let a2 = divs.push(group(f.inner, Place::Top));
        let outer = divs.push(group(root, Place::Left));
        let mut grid = Grid::new(3, 3);
        grid.set(0, 0, Some(a1));
        grid.set(2, 2, Some(a2));
        grid.set(1, 1, Some(outer));
        assert!(!is_valid(&grid, &divs, &f.diagram));
    }

    #[test]
    fn empty_lines_are_removed() {
        let mut grid: Grid<DivId> = Grid::new(5, 5);
        grid.set(1, 3, Some(DivId(0)));
        grid.set(3, 1, Some(DivId(1)));
        remove_empty_lines(&mut grid);
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
        assert_eq!(grid.position_of(&DivId(0)), Some((0, 1)));

        let mut grid: Grid<DivId> = Grid::new(8, 8);
        grid.set(3, 3, Some(DivId(0)));
        grid.set(4, 6, Some(DivId(1)));
        remove_empty_lines(&mut grid);
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
        assert_eq!(grid.position_of(&DivId(1)), Some((1, 1)));
    }

    #[test]
    fn compaction_pulls_groups_towards_the_reaction() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let r = divs.push(reaction(root));
        let input = divs.push(group(root, Place::Left));
        let output = divs.push(group(root, Place::Right));
        let mut grid = Grid::new(5, 7);
        grid.set(2, 3, Some(r));
        grid.set(0, 0, Some(input));
        grid.set(4, 6, Some(output));
        let mut arrangement = Arrangement {
            grid,
            divs,
            reaction: r,
        };
        compact(&mut arrangement, &f.diagram);
        assert_eq!(arrangement.grid.position_of(&input), Some((2, 2)));
        assert_eq!(arrangement.grid.position_of(&output), Some((2, 4)));
    }

    #[test]
    fn compaction_keeps_one_input_per_row() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let r = divs.push(reaction(root));
        let near = divs.push(group(root, Place::Left));
        let far = divs.push(group(f.inner, Place::Left));
        let mut grid = Grid::new(3, 4);
        grid.set(1, 3, Some(r));
        grid.set(1, 2, Some(near));
        grid.set(0, 0, Some(far));
        let mut arrangement = Arrangement {
            grid,
            divs,
            reaction: r,
        };
        compact(&mut arrangement, &f.diagram);
        assert_eq!(arrangement.grid.position_of(&near), Some((1, 2)));
        assert_eq!(arrangement.grid.position_of(&far), Some((0, 2)));
    }

    #[test]
    fn duplicate_inputs_on_the_reaction_row_are_split() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let r = divs.push(reaction(root));
        let near = divs.push(group(root, Place::Left));
        let far = divs.push(group(root, Place::Left));
        let mut grid = Grid::new(1, 3);
        grid.set(0, 0, Some(far));
        grid.set(0, 1, Some(near));
        grid.set(0, 2, Some(r));
        let mut arrangement = Arrangement {
            grid,
            divs,
            reaction: r,
        };
        separate_reaction_axis(&mut arrangement, &f.diagram);
        assert_eq!(arrangement.grid.rows(), 2);
        assert_eq!(arrangement.grid.position_of(&far), Some((0, 0)));
        assert_eq!(arrangement.reaction_cell(), Some((1, 2)));
        assert_eq!(arrangement.grid.position_of(&near), Some((1, 1)));
    }

    #[test]
    fn catalysts_leave_rows_shared_with_inputs() {
        let f = fixture();
        let root = f.diagram.root();
        let mut divs = DivArena::default();
        let r = divs.push(reaction(root));
        let input = divs.push(group(root, Place::Left));
        let catalyst = divs.push(group(root, Place::Top));
        let mut grid = Grid::new(2, 3);
        grid.set(0, 0, Some(input));
        grid.set(0, 1, Some(catalyst));
        grid.set(1, 1, Some(r));
        let mut arrangement = Arrangement {
            grid,
            divs,
            reaction: r,
        };
        separate_bands(&mut arrangement, &f.diagram);
        assert_eq!(arrangement.grid.position_of(&catalyst), Some((0, 1)));
        assert_eq!(arrangement.grid.position_of(&input), Some((1, 0)));
        assert_eq!(arrangement.reaction_cell(), Some((2, 1)));
    }
}
