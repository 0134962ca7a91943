use crate::config::LayoutConfig;
use crate::geometry::Point;
use crate::ir::{ReactionDiagram, RoleKind};

use super::boxes::Arrangement;
use super::compaction;

/// Sizes of the rows (or columns) of the final grid plus the extra room
/// reserved before and after each of them.
#[derive(Debug, Clone, PartialEq)]
pub(super) struct Tracks {
    pub(super) sizes: Vec<f32>,
    pub(super) lead: Vec<f32>,
    pub(super) trail: Vec<f32>,
}

impl Tracks {
    fn new(count: usize, min: f32) -> Self {
        Self {
            sizes: vec![min; count],
            lead: vec![0.0; count],
            trail: vec![0.0; count],
        }
    }

    /// Centre coordinate of every track, laid out from zero.
    pub(super) fn centers(&self) -> Vec<f32> {
        let mut cursor = 0.0;
        self.sizes
            .iter()
            .zip(self.lead.iter().zip(&self.trail))
            .map(|(size, (lead, trail))| {
                let center = cursor + lead + size / 2.0;
                cursor += lead + size + trail;
                center
            })
            .collect()
    }

    pub(super) fn total(&self) -> f32 {
        self.sizes.iter().chain(&self.lead).chain(&self.trail).sum()
    }

    /// Extent from the start of track `from` to the end of track `to`.
    fn span(&self, from: usize, to: usize) -> f32 {
        (from..=to)
            .map(|idx| {
                let lead = if idx > from { self.lead[idx] } else { 0.0 };
                let trail = if idx < to { self.trail[idx] } else { 0.0 };
                self.sizes[idx] + lead + trail
            })
            .sum()
    }
}

/// Row and column sizes for the compacted grid: the largest div per line,
/// padding and label room per compartment, and the gap around the reaction.
pub(super) fn size_tracks(
    arrangement: &Arrangement,
    diagram: &ReactionDiagram,
    config: &LayoutConfig,
) -> (Tracks, Tracks) {
    let grid = &arrangement.grid;
    let divs = &arrangement.divs;
    let mut rows = Tracks::new(grid.rows(), config.min_cell);
    let mut cols = Tracks::new(grid.cols(), config.min_cell);
    for (row, col, id) in grid.occupied() {
        let div = &divs[*id];
        rows.sizes[row] = rows.sizes[row].max(div.padded_height());
        cols.sizes[col] = cols.sizes[col].max(div.padded_width());
    }

    let rects = compaction::content_rects(grid, divs, diagram);
    for id in diagram.post_order() {
        let compartment = diagram.compartment(id);
        if compartment.synthetic {
            continue;
        }
        let Some(rect) = rects.get(&id) else {
            continue;
        };

        let label = compartment.label_bounds;
        let needed = label.width + 2.0 * config.compartment_label_padding;
        let available = cols.span(rect.left, rect.right);
        if available > 0.0 && available < needed {
            let scale = needed / available;
            for col in rect.left..=rect.right {
                cols.sizes[col] *= scale;
            }
        }

        let owns = |kind: RoleKind| {
            compartment
                .entities
                .iter()
                .any(|entity| diagram.entity(*entity).has_role(kind))
        };
        let label_room = label.height + config.compartment_label_padding;
        let pad = config.compartment_padding;
        let (top_extra, bottom_extra) = if owns(RoleKind::Catalyst) {
            (label_room, 0.0)
        } else {
            (0.0, label_room)
        };
        let leader_room = if compartment
            .entities
            .iter()
            .any(|entity| diagram.entity(*entity).is_input_catalyst())
        {
            config.rule_gap
        } else {
            0.0
        };
        rows.lead[rect.top] += pad + top_extra + leader_room;
        rows.trail[rect.bottom] += pad + bottom_extra;
        cols.lead[rect.left] += pad;
        cols.trail[rect.right] += pad;
    }

    if let Some(axis) = arrangement.reaction_cell() {
        add_role_gaps(arrangement, axis, &mut rows, &mut cols, config.role_gap);
    }
    (rows, cols)
}

/// Extra room between the reaction and the nearest line holding each role.
fn add_role_gaps(
    arrangement: &Arrangement,
    (axis_row, axis_col): (usize, usize),
    rows: &mut Tracks,
    cols: &mut Tracks,
    gap: f32,
) {
    let line_has = |row: Option<usize>, col: Option<usize>, test: fn(RoleKind) -> bool| {
        arrangement.grid.occupied().any(|(r, c, id)| {
            row.is_none_or(|row| row == r)
                && col.is_none_or(|col| col == c)
                && arrangement.divs[*id].roles.iter().any(|kind| test(*kind))
        })
    };
    let is_catalyst = |kind: RoleKind| kind == RoleKind::Catalyst;
    let is_input = |kind: RoleKind| kind == RoleKind::Input;
    let is_output = |kind: RoleKind| kind == RoleKind::Output;

    if let Some(row) = (0..axis_row).rev().find(|row| line_has(Some(*row), None, is_catalyst)) {
        rows.trail[row] += gap;
    }
    if let Some(row) = (axis_row + 1..rows.sizes.len()).find(|row| line_has(Some(*row), None, RoleKind::is_regulator)) {
        rows.lead[row] += gap;
    }
    if let Some(col) = (0..axis_col).rev().find(|col| line_has(None, Some(*col), is_input)) {
        cols.trail[col] += gap;
    }
    if let Some(col) = (axis_col + 1..cols.sizes.len()).find(|col| line_has(None, Some(*col), is_output)) {
        cols.lead[col] += gap;
    }
}

/// Centres every div on its cell.
pub(super) fn center_divs(
    arrangement: &mut Arrangement,
    diagram: &mut ReactionDiagram,
    rows: &Tracks,
    cols: &Tracks,
    config: &LayoutConfig,
) {
    let row_centers = rows.centers();
    let col_centers = cols.centers();
    let cells: Vec<_> = arrangement
        .grid
        .occupied()
        .map(|(row, col, id)| (row, col, *id))
        .collect();
    for (row, col, id) in cells {
        let center = Point::new(col_centers[col], row_centers[row]);
        arrangement
            .divs
            .center_on(id, diagram, center, config.glyph_gap);
    }
}
