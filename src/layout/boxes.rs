// Nested compartment boxes laid out in one global grid. Every compartment
// owns a frame of rows and columns; its groups are placed inside that frame
// on the side of the reaction their role calls for.

use std::collections::{BTreeMap, BTreeSet};

use crate::config::LayoutConfig;
use crate::geometry::Rect;
use crate::ir::{CompartmentId, EntityId, ReactionDiagram, RoleKind};

use super::compaction;
use super::div::{BoxNode, Div, DivArena, DivId, DivKind, Frame, Group, Orientation, Padding};
use super::grid::Grid;
use super::group;
use super::place::{self, Place, PlaceSet, SIDES};

// ── Box geometry ────────────────────────────────────────────────────
/// A compartment without nested compartments: its reaction axis sits in the
/// middle cell with one ring of band cells around it.
const LEAF_SIZE: usize = 3;
/// Padding rows and columns on each side of a single nested compartment.
const SINGLE_CHILD_MARGIN: usize = 2;
/// Empty ring around side-by-side or stacked nested compartments.
const MULTI_CHILD_MARGIN: usize = 1;
/// Empty line between two sibling compartments.
const SIBLING_SPACER: usize = 1;

/// Leaf groups a compartment can hold, in placement order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Band {
    Inputs,
    InputCatalysts,
    Outputs,
    Catalysts,
    Regulators,
}

impl Band {
    fn of_entity(roles: &[RoleKind]) -> Band {
        if roles.contains(&RoleKind::Input) && roles.contains(&RoleKind::Catalyst) {
            return Band::InputCatalysts;
        }
        match roles.first() {
            Some(RoleKind::Input) => Band::Inputs,
            Some(RoleKind::Output) => Band::Outputs,
            Some(RoleKind::Catalyst) => Band::Catalysts,
            _ => Band::Regulators,
        }
    }

    fn side(self) -> Place {
        match self {
            Band::Inputs | Band::InputCatalysts => Place::Left,
            Band::Outputs => Place::Right,
            Band::Catalysts => Place::Top,
            Band::Regulators => Place::Bottom,
        }
    }
}

/// Whether `cell` lies on `side` of the reaction cell `axis`.
pub(super) fn on_side(side: Place, cell: (usize, usize), axis: (usize, usize)) -> bool {
    match side {
        Place::Left => cell.1 < axis.1,
        Place::Right => cell.1 > axis.1,
        Place::Top => cell.0 < axis.0,
        Place::Bottom => cell.0 > axis.0,
        Place::Center => true,
    }
}

/// Relative layout of one compartment before frames become absolute.
#[derive(Debug, Clone)]
struct Block {
    compartment: CompartmentId,
    rows: usize,
    cols: usize,
    axis: (usize, usize),
    children: Vec<(usize, usize, Block)>,
}

impl Block {
    fn leaf(compartment: CompartmentId) -> Self {
        Self {
            compartment,
            rows: LEAF_SIZE,
            cols: LEAF_SIZE,
            axis: (LEAF_SIZE / 2, LEAF_SIZE / 2),
            children: Vec::new(),
        }
    }

    /// Enlarges the block, keeping its content centred.
    fn grow(&mut self, rows: usize, cols: usize) {
        let dr = rows.saturating_sub(self.rows) / 2;
        let dc = cols.saturating_sub(self.cols) / 2;
        for (row, col, _) in &mut self.children {
            *row += dr;
            *col += dc;
        }
        self.axis = (self.axis.0 + dr, self.axis.1 + dc);
        self.rows = self.rows.max(rows);
        self.cols = self.cols.max(cols);
    }
}

/// Divs laid out in the global grid, ready for compaction.
#[derive(Debug, Clone)]
pub(super) struct Arrangement {
    pub(super) grid: Grid<DivId>,
    pub(super) divs: DivArena,
    pub(super) reaction: DivId,
}

impl Arrangement {
    pub(super) fn reaction_cell(&self) -> Option<(usize, usize)> {
        self.grid.position_of(&self.reaction)
    }
}

pub(super) struct BoxTree {
    divs: DivArena,
    grid: Grid<DivId>,
    boxes: BTreeMap<CompartmentId, DivId>,
    subtree_roles: BTreeMap<CompartmentId, BTreeSet<RoleKind>>,
}

/// Builds the box tree, places the reaction and every leaf group, and
/// returns the flattened grid.
pub(super) fn arrange(diagram: &mut ReactionDiagram, config: &LayoutConfig) -> Arrangement {
    let mut tree = BoxTree::build(diagram, config);
    let reaction = tree.place_reaction(diagram, config);
    tree.place_elements(diagram, config, reaction);
    log::debug!(
        "box tree placed {} divs in a {}x{} grid",
        tree.divs.len(),
        tree.grid.rows(),
        tree.grid.cols()
    );
    Arrangement {
        grid: tree.grid,
        divs: tree.divs,
        reaction,
    }
}

fn collect_subtree_roles(diagram: &ReactionDiagram) -> BTreeMap<CompartmentId, BTreeSet<RoleKind>> {
    let mut out: BTreeMap<CompartmentId, BTreeSet<RoleKind>> = BTreeMap::new();
    for id in diagram.post_order() {
        let compartment = diagram.compartment(id);
        let mut roles: BTreeSet<RoleKind> = compartment
            .entities
            .iter()
            .flat_map(|entity| diagram.entity(*entity).roles.iter().map(|role| role.kind))
            .collect();
        for child in &compartment.children {
            if let Some(child_roles) = out.get(child) {
                roles.extend(child_roles.iter().copied());
            }
        }
        out.insert(id, roles);
    }
    out
}

impl BoxTree {
    pub(super) fn build(diagram: &ReactionDiagram, config: &LayoutConfig) -> Self {
        let mut tree = Self {
            divs: DivArena::default(),
            grid: Grid::new(0, 0),
            boxes: BTreeMap::new(),
            subtree_roles: collect_subtree_roles(diagram),
        };
        let root = diagram.root();
        let block = tree.block(diagram, root);
        let (rows, cols) = (block.rows, block.cols);
        tree.instantiate(diagram, config, block, 0, 0);
        tree.grid = Grid::new(rows, cols);
        tree
    }

    fn roles(&self, compartment: CompartmentId) -> BTreeSet<RoleKind> {
        self.subtree_roles
            .get(&compartment)
            .cloned()
            .unwrap_or_default()
    }

    fn busy(&self, diagram: &ReactionDiagram, compartment: CompartmentId) -> PlaceSet {
        let roles = self.roles(compartment);
        let mut busy = place::places_of_roles(&roles);
        if diagram.is_ancestor_or_self(compartment, diagram.reaction_compartment()) {
            busy.insert(Place::Center);
        }
        busy
    }

    fn block(&self, diagram: &ReactionDiagram, compartment: CompartmentId) -> Block {
        let children = diagram.compartment(compartment).children.clone();
        match children.as_slice() {
            [] => Block::leaf(compartment),
            [only] => {
                let inner = self.block(diagram, *only);
                let m = SINGLE_CHILD_MARGIN;
                Block {
                    compartment,
                    rows: inner.rows + 2 * m,
                    cols: inner.cols + 2 * m,
                    axis: (inner.axis.0 + m, inner.axis.1 + m),
                    children: vec![(m, m, inner)],
                }
            }
            [first, second] => self.pair(diagram, compartment, *first, *second),
            _ => self.stack(diagram, compartment, &children),
        }
    }

    fn pair(
        &self,
        diagram: &ReactionDiagram,
        compartment: CompartmentId,
        first: CompartmentId,
        second: CompartmentId,
    ) -> Block {
        let mut a = self.block(diagram, first);
        let mut b = self.block(diagram, second);
        let side = place::negotiate(&self.busy(diagram, first), &self.busy(diagram, second));
        let m = MULTI_CHILD_MARGIN;
        let a_leads = matches!(side, Place::Left | Place::Top);
        let side_by_side = matches!(side, Place::Left | Place::Right);

        let (rows, cols, children) = if side_by_side {
            let rows = a.rows.max(b.rows);
            a.grow(rows, a.cols);
            b.grow(rows, b.cols);
            let (lead, tail) = if a_leads { (a, b) } else { (b, a) };
            let cols = lead.cols + SIBLING_SPACER + tail.cols;
            let tail_col = m + lead.cols + SIBLING_SPACER;
            (rows, cols, vec![(m, m, lead), (m, tail_col, tail)])
        } else {
            let cols = a.cols.max(b.cols);
            a.grow(a.rows, cols);
            b.grow(b.rows, cols);
            let (lead, tail) = if a_leads { (a, b) } else { (b, a) };
            let rows = lead.rows + SIBLING_SPACER + tail.rows;
            let tail_row = m + lead.rows + SIBLING_SPACER;
            (rows, cols, vec![(m, m, lead), (tail_row, m, tail)])
        };
        let (rows, cols) = (rows + 2 * m, cols + 2 * m);
        Block {
            compartment,
            rows,
            cols,
            axis: (rows / 2, cols / 2),
            children,
        }
    }

    /// More than two nested compartments are stacked top to bottom:
    /// catalysed ones first, then those without negative and without
    /// positive regulators, then the ones with fewer nested compartments.
    fn stack(
        &self,
        diagram: &ReactionDiagram,
        compartment: CompartmentId,
        children: &[CompartmentId],
    ) -> Block {
        let mut ordered = children.to_vec();
        ordered.sort_by_key(|child| {
            let roles = self.roles(*child);
            (
                !roles.contains(&RoleKind::Catalyst),
                roles.contains(&RoleKind::NegativeRegulator),
                roles.contains(&RoleKind::PositiveRegulator),
                diagram.compartment(*child).children.len(),
            )
        });
        let mut blocks: Vec<Block> = ordered
            .iter()
            .map(|child| self.block(diagram, *child))
            .collect();
        let max_rows = blocks.iter().map(|b| b.rows).max().unwrap_or(LEAF_SIZE);
        let max_cols = blocks.iter().map(|b| b.cols).max().unwrap_or(LEAF_SIZE);
        for block in &mut blocks {
            block.grow(max_rows, max_cols);
        }

        let m = MULTI_CHILD_MARGIN;
        let count = blocks.len();
        let rows = count * max_rows + (count - 1) * SIBLING_SPACER + 2 * m;
        let cols = max_cols + 2 * m;
        let children = blocks
            .into_iter()
            .enumerate()
            .map(|(idx, block)| (m + idx * (max_rows + SIBLING_SPACER), m, block))
            .collect();
        Block {
            compartment,
            rows,
            cols,
            axis: (rows / 2, cols / 2),
            children,
        }
    }

    fn instantiate(
        &mut self,
        diagram: &ReactionDiagram,
        config: &LayoutConfig,
        block: Block,
        row: usize,
        col: usize,
    ) -> DivId {
        let compartment = block.compartment;
        let padding = if diagram.compartment(compartment).synthetic {
            Padding::default()
        } else {
            Padding::uniform(config.compartment_padding)
        };
        let node = BoxNode {
            frame: Frame {
                row,
                col,
                rows: block.rows,
                cols: block.cols,
            },
            axis: (row + block.axis.0, col + block.axis.1),
            children: Vec::new(),
            members: Vec::new(),
        };
        let id = self.divs.push(Div {
            kind: DivKind::Box(node),
            compartment,
            busy: self.busy(diagram, compartment),
            roles: self.roles(compartment),
            padding,
            bounds: Rect::default(),
        });
        self.boxes.insert(compartment, id);

        for (child_row, child_col, child) in block.children {
            let child_id = self.instantiate(diagram, config, child, row + child_row, col + child_col);
            if let Some(node) = self.divs[id].as_box_mut() {
                node.children.push(child_id);
            }
        }
        id
    }

    fn node(&self, compartment: CompartmentId) -> Option<&BoxNode> {
        let id = self.boxes.get(&compartment)?;
        self.divs[*id].as_box()
    }

    fn frame(&self, compartment: CompartmentId) -> Option<Frame> {
        self.node(compartment).map(|node| node.frame)
    }

    fn add_member(&mut self, compartment: CompartmentId, member: DivId) {
        if let Some(id) = self.boxes.get(&compartment).copied()
            && let Some(node) = self.divs[id].as_box_mut()
        {
            node.members.push(member);
        }
    }

    /// Inserts rows on behalf of `owner`: the owner and its ancestors grow,
    /// every other frame grows or shifts depending on where the rows land.
    fn insert_rows(&mut self, diagram: &ReactionDiagram, at: usize, count: usize, owner: CompartmentId) {
        self.grid.insert_rows(at, count);
        for (compartment, id) in &self.boxes {
            let is_owner = diagram.is_ancestor_or_self(*compartment, owner);
            if let Some(node) = self.divs[*id].as_box_mut() {
                node.frame.insert_rows(at, count, is_owner);
                if node.axis.0 >= at {
                    node.axis.0 += count;
                }
            }
        }
    }

    fn insert_cols(&mut self, diagram: &ReactionDiagram, at: usize, count: usize, owner: CompartmentId) {
        self.grid.insert_cols(at, count);
        for (compartment, id) in &self.boxes {
            let is_owner = diagram.is_ancestor_or_self(*compartment, owner);
            if let Some(node) = self.divs[*id].as_box_mut() {
                node.frame.insert_cols(at, count, is_owner);
                if node.axis.1 >= at {
                    node.axis.1 += count;
                }
            }
        }
    }

    /// Puts the reaction glyph into the grid and returns its div. A holder
    /// whose single nested compartment is busy on every side hands the
    /// reaction down to that compartment.
    pub(super) fn place_reaction(&mut self, diagram: &mut ReactionDiagram, config: &LayoutConfig) -> DivId {
        let cell = loop {
            let holder = diagram.reaction_compartment();
            let Some(node) = self.node(holder).cloned() else {
                break (0, 0);
            };
            match node.children.as_slice() {
                [] => break node.axis,
                [only] => {
                    let child = &self.divs[*only];
                    let Some(child_node) = child.as_box() else {
                        break node.axis;
                    };
                    match single_child_side(&child.busy) {
                        Some(side) => {
                            if let Some(cell) = beside(child_node.frame, child_node.axis, side) {
                                break cell;
                            }
                            break node.axis;
                        }
                        None => {
                            let inner = child.compartment;
                            log::debug!(
                                "`{}` is busy on every side; moving the reaction inside",
                                diagram.compartment(inner).name
                            );
                            diagram.move_reaction_to(inner);
                            self.divs[*only].busy.insert(Place::Center);
                        }
                    }
                }
                _ => break self.multi_child_cell(&node),
            }
        };

        let holder = diagram.reaction_compartment();
        let extent = diagram.reaction.extent();
        let id = self.divs.push(Div {
            kind: DivKind::Reaction,
            compartment: holder,
            busy: PlaceSet::from([Place::Center]),
            roles: BTreeSet::new(),
            padding: Padding::uniform(config.reaction_padding),
            bounds: Rect::new(0.0, 0.0, extent.width, extent.height),
        });
        self.grid.set(cell.0, cell.1, Some(id));
        self.add_member(holder, id);
        id
    }

    /// Reaction cell for a holder with several nested compartments: next to
    /// one of them, inside the window every nested compartment allows.
    fn multi_child_cell(&self, node: &BoxNode) -> (usize, usize) {
        let frame = node.frame;
        let (mut top, mut bottom) = (frame.row, frame.last_row());
        let (mut left, mut right) = (frame.col, frame.last_col());
        let mut kids = Vec::new();
        for child in &node.children {
            let div = &self.divs[*child];
            let Some(child_node) = div.as_box() else {
                continue;
            };
            let allowed = place::allowed(&div.busy);
            let f = child_node.frame;
            if !allowed.contains(&Place::Left) {
                left = left.max(f.col);
            }
            if !allowed.contains(&Place::Right) {
                right = right.min(f.last_col());
            }
            if !allowed.contains(&Place::Top) {
                top = top.max(f.row);
            }
            if !allowed.contains(&Place::Bottom) {
                bottom = bottom.min(f.last_row());
            }
            kids.push((f, child_node.axis));
        }

        let open = |(r, c): (usize, usize)| {
            frame.contains(r, c)
                && !kids.iter().any(|(f, _)| f.contains(r, c))
                && self.grid.is_empty_at(r, c)
        };
        let usable = |(r, c): (usize, usize)| {
            r >= top && r <= bottom && c >= left && c <= right && open((r, c))
        };
        // Cells beside each nested compartment, in side order.
        let border = || {
            kids.iter().flat_map(|(f, axis)| {
                SIDES
                    .into_iter()
                    .filter_map(move |side| beside(*f, *axis, side))
            })
        };
        if let Some(cell) = border().find(|cell| usable(*cell)) {
            return cell;
        }

        let mid = ((top + bottom) / 2, (left + right) / 2);
        let nearest = (top..=bottom)
            .flat_map(|r| (left..=right).map(move |c| (r, c)))
            .filter(|cell| usable(*cell))
            .min_by_key(|(r, c)| r.abs_diff(mid.0) + c.abs_diff(mid.1));
        if let Some(cell) = nearest {
            return cell;
        }

        log::warn!("no cell satisfies every nested compartment; ignoring their allowances");
        if open(node.axis) {
            return node.axis;
        }
        border()
            .find(|cell| open(*cell))
            .unwrap_or((frame.row, frame.col))
    }

    /// Creates one group per band for every compartment, children first,
    /// and places each of them.
    pub(super) fn place_elements(&mut self, diagram: &ReactionDiagram, config: &LayoutConfig, reaction: DivId) {
        for compartment in diagram.post_order() {
            let mut bands: BTreeMap<Band, Vec<EntityId>> = BTreeMap::new();
            for entity in &diagram.compartment(compartment).entities {
                let kinds: Vec<RoleKind> = diagram
                    .entity(*entity)
                    .roles
                    .iter()
                    .map(|role| role.kind)
                    .collect();
                bands.entry(Band::of_entity(&kinds)).or_default().push(*entity);
            }
            for (band, glyphs) in bands {
                let orientation = Orientation::of_band(band.side());
                let roles: BTreeSet<RoleKind> = glyphs
                    .iter()
                    .flat_map(|id| diagram.entity(*id).roles.iter().map(|role| role.kind))
                    .collect();
                let (width, height) = group::group_size(diagram, &glyphs, orientation, config.glyph_gap);
                let id = self.divs.push(Div {
                    kind: DivKind::Group(Group {
                        orientation,
                        band: band.side(),
                        glyphs,
                    }),
                    compartment,
                    busy: place::places_of_roles(&roles),
                    roles,
                    padding: Padding::uniform(config.glyph_gap / 2.0),
                    bounds: Rect::new(0.0, 0.0, width, height),
                });
                self.add_member(compartment, id);
                self.place_band(diagram, id, band, compartment, reaction);
            }
        }
    }

    fn place_band(
        &mut self,
        diagram: &ReactionDiagram,
        id: DivId,
        band: Band,
        compartment: CompartmentId,
        reaction: DivId,
    ) {
        if let Some(cell) = self.find_band_cell(diagram, id, band, compartment, reaction) {
            self.grid.set(cell.0, cell.1, Some(id));
            return;
        }

        // Open a fresh line on the band's outer edge of the frame.
        let Some(frame) = self.frame(compartment) else {
            return;
        };
        match band.side() {
            Place::Left => self.insert_cols(diagram, frame.col, 1, compartment),
            Place::Right => self.insert_cols(diagram, frame.last_col() + 1, 1, compartment),
            Place::Top => self.insert_rows(diagram, frame.row, 1, compartment),
            _ => self.insert_rows(diagram, frame.last_row() + 1, 1, compartment),
        }
        if let Some(cell) = self.find_band_cell(diagram, id, band, compartment, reaction) {
            self.grid.set(cell.0, cell.1, Some(id));
            return;
        }

        // And a crossing line, so the corner cell is free in both directions.
        let Some(frame) = self.frame(compartment) else {
            return;
        };
        match band.side() {
            Place::Left | Place::Right => self.insert_rows(diagram, frame.row, 1, compartment),
            _ => self.insert_cols(diagram, frame.col, 1, compartment),
        }
        if let Some(cell) = self.find_band_cell(diagram, id, band, compartment, reaction) {
            self.grid.set(cell.0, cell.1, Some(id));
            return;
        }

        log::warn!(
            "no legal {:?} cell in `{}`; placing the group off its side",
            band.side(),
            diagram.compartment(compartment).name
        );
        self.insert_rows(diagram, frame.row, 1, compartment);
        self.insert_cols(diagram, frame.col, 1, compartment);
        if let Some(frame) = self.frame(compartment) {
            self.grid.set(frame.row, frame.col, Some(id));
        }
    }

    /// First acceptable cell for a group, scanning the frame in band order.
    fn find_band_cell(
        &self,
        diagram: &ReactionDiagram,
        id: DivId,
        band: Band,
        compartment: CompartmentId,
        reaction: DivId,
    ) -> Option<(usize, usize)> {
        let node = self.node(compartment)?;
        let frame = node.frame;
        let axis = self.grid.position_of(&reaction).unwrap_or(node.axis);
        let side = band.side();

        let children_busy: PlaceSet = node
            .children
            .iter()
            .flat_map(|child| self.divs[*child].busy.iter().copied())
            .collect();
        let mut cells: Vec<(usize, usize)> = (frame.row..=frame.last_row())
            .flat_map(|r| (frame.col..=frame.last_col()).map(move |c| (r, c)))
            .filter(|cell| on_side(side, *cell, axis))
            .collect();

        match band {
            Band::Inputs | Band::Outputs => {
                // Avoid the rows a nested compartment reaches for.
                let avoid_below = children_busy.contains(&Place::Bottom) && !children_busy.contains(&Place::Top);
                let avoid_above = children_busy.contains(&Place::Top) && !children_busy.contains(&Place::Bottom);
                let edge_first = band == Band::Inputs;
                cells.sort_by_key(|(r, c)| {
                    let wrong_side = (avoid_below && *r > axis.0) || (avoid_above && *r < axis.0);
                    let col_rank = if edge_first { *c } else { usize::MAX - *c };
                    (wrong_side, r.abs_diff(axis.0), *r > axis.0, col_rank)
                });
            }
            Band::InputCatalysts => {
                let top_taken = (frame.col..=frame.last_col()).any(|c| !self.grid.is_empty_at(frame.row, c));
                cells.sort_by_key(|(r, c)| {
                    let row_rank = if top_taken { usize::MAX - *r } else { *r };
                    (row_rank, *c)
                });
            }
            Band::Catalysts | Band::Regulators => {
                let avoid_right = children_busy.contains(&Place::Right) && !children_busy.contains(&Place::Left);
                let avoid_left = children_busy.contains(&Place::Left) && !children_busy.contains(&Place::Right);
                let edge_first = band == Band::Catalysts;
                cells.sort_by_key(|(r, c)| {
                    let wrong_side = (avoid_right && *c > axis.1) || (avoid_left && *c < axis.1);
                    let row_rank = if edge_first { *r } else { usize::MAX - *r };
                    (wrong_side, c.abs_diff(axis.1), *c > axis.1, row_rank)
                });
            }
        }

        cells.into_iter().find(|(r, c)| self.accepts(diagram, id, *r, *c))
    }

    fn accepts(&self, diagram: &ReactionDiagram, id: DivId, row: usize, col: usize) -> bool {
        if !self.grid.is_empty_at(row, col) {
            return false;
        }
        let div = &self.divs[id];
        let conflict = self.grid.occupied().any(|(r, c, other)| {
            (r == row && div.shares_row_band(&self.divs[*other]))
                || (c == col && div.shares_column_band(&self.divs[*other]))
        });
        if conflict {
            return false;
        }
        let mut trial = self.grid.clone();
        trial.set(row, col, Some(id));
        compaction::is_valid(&trial, &self.divs, diagram)
    }
}

/// Side of a lone nested compartment the reaction goes to: opposite one of
/// its busy sides, else the first free one.
fn single_child_side(busy: &PlaceSet) -> Option<Place> {
    SIDES
        .iter()
        .find(|side| busy.contains(*side) && !busy.contains(&side.opposite()))
        .map(|side| side.opposite())
        .or_else(|| {
            [Place::Top, Place::Bottom, Place::Left, Place::Right]
                .into_iter()
                .find(|side| !busy.contains(side))
        })
}

/// Cell adjacent to `frame` on `side`, aligned with `axis`.
fn beside(frame: Frame, axis: (usize, usize), side: Place) -> Option<(usize, usize)> {
    match side {
        Place::Left => Some((axis.0, frame.col.checked_sub(1)?)),
        Place::Right => Some((axis.0, frame.last_col() + 1)),
        Place::Top => Some((frame.row.checked_sub(1)?, axis.1)),
        Place::Bottom => Some((frame.last_row() + 1, axis.1)),
        Place::Center => None,
    }
}
