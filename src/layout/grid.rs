/// Resizable two-dimensional table of optional cells. Writing outside the
/// current extent grows it; reading outside it yields `None`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Grid<T> {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Option<T>>>,
}

impl<T: Clone> Grid<T> {
    pub(crate) fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![None; cols]; rows],
        }
    }

    pub(crate) fn rows(&self) -> usize {
        self.rows
    }

    pub(crate) fn cols(&self) -> usize {
        self.cols
    }

    pub(crate) fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.cells.get(row)?.get(col)?.as_ref()
    }

    pub(crate) fn is_empty_at(&self, row: usize, col: usize) -> bool {
        self.get(row, col).is_none()
    }

    pub(crate) fn set(&mut self, row: usize, col: usize, value: Option<T>) {
        if row >= self.rows || col >= self.cols {
            self.grow(row + 1, col + 1);
        }
        self.cells[row][col] = value;
    }

    pub(crate) fn take(&mut self, row: usize, col: usize) -> Option<T> {
        self.cells.get_mut(row)?.get_mut(col)?.take()
    }

    fn grow(&mut self, rows: usize, cols: usize) {
        let cols = cols.max(self.cols);
        for line in &mut self.cells {
            line.resize(cols, None);
        }
        while self.cells.len() < rows {
            self.cells.push(vec![None; cols]);
        }
        self.rows = self.rows.max(rows);
        self.cols = cols;
    }

    /// Inserts `count` empty rows before `at`; `at == rows()` appends.
    pub(crate) fn insert_rows(&mut self, at: usize, count: usize) {
        let at = at.min(self.rows);
        for _ in 0..count {
            self.cells.insert(at, vec![None; self.cols]);
        }
        self.rows += count;
    }

    pub(crate) fn insert_cols(&mut self, at: usize, count: usize) {
        let at = at.min(self.cols);
        for line in &mut self.cells {
            for _ in 0..count {
                line.insert(at, None);
            }
        }
        self.cols += count;
    }

    /// Removes up to `count` rows starting at `at`; lines past the end are
    /// ignored.
    pub(crate) fn remove_rows(&mut self, at: usize, count: usize) {
        let end = at.saturating_add(count).min(self.rows);
        if at < end {
            self.cells.drain(at..end);
            self.rows -= end - at;
        }
    }

    pub(crate) fn remove_cols(&mut self, at: usize, count: usize) {
        let end = at.saturating_add(count).min(self.cols);
        if at < end {
            for line in &mut self.cells {
                line.drain(at..end);
            }
            self.cols -= end - at;
        }
    }

    pub(crate) fn row(&self, row: usize) -> Vec<Option<T>> {
        self.cells.get(row).cloned().unwrap_or_default()
    }

    pub(crate) fn col(&self, col: usize) -> Vec<Option<T>> {
        self.cells
            .iter()
            .map(|line| line.get(col).cloned().flatten())
            .collect()
    }

    pub(crate) fn is_row_empty(&self, row: usize) -> bool {
        self.cells
            .get(row)
            .is_none_or(|line| line.iter().all(Option::is_none))
    }

    pub(crate) fn is_col_empty(&self, col: usize) -> bool {
        self.cells
            .iter()
            .all(|line| line.get(col).is_none_or(Option::is_none))
    }

    /// Occupied cells in row-major order.
    pub(crate) fn occupied(&self) -> impl Iterator<Item = (usize, usize, &T)> + '_ {
        self.cells.iter().enumerate().flat_map(|(r, line)| {
            line.iter()
                .enumerate()
                .filter_map(move |(c, cell)| cell.as_ref().map(|value| (r, c, value)))
        })
    }
}

impl<T: Clone + PartialEq> Grid<T> {
    pub(crate) fn position_of(&self, value: &T) -> Option<(usize, usize)> {
        self.occupied()
            .find(|(_, _, cell)| *cell == value)
            .map(|(r, c, _)| (r, c))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_grows_the_grid() {
        let mut grid: Grid<u32> = Grid::new(1, 1);
        grid.set(3, 2, Some(7));
        assert_eq!(grid.rows(), 4);
        assert_eq!(grid.cols(), 3);
        assert_eq!(grid.get(3, 2), Some(&7));
        assert_eq!(grid.get(10, 10), None);
    }

    #[test]
    fn insert_shifts_existing_cells() {
        let mut grid: Grid<u32> = Grid::new(2, 2);
        grid.set(1, 1, Some(5));
        grid.insert_rows(1, 2);
        grid.insert_cols(0, 1);
        assert_eq!((grid.rows(), grid.cols()), (4, 3));
        assert_eq!(grid.get(3, 2), Some(&5));
        assert!(grid.is_row_empty(1));
        assert!(grid.is_col_empty(0));
    }

    #[test]
    fn remove_drops_lines() {
        let mut grid: Grid<u32> = Grid::new(3, 3);
        grid.set(2, 2, Some(1));
        grid.remove_rows(0, 1);
        grid.remove_cols(1, 1);
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
        assert_eq!(grid.position_of(&1), Some((1, 1)));
    }

    #[test]
    fn remove_drops_several_lines_and_clamps_at_the_end() {
        let mut grid: Grid<u32> = Grid::new(5, 5);
        grid.set(4, 4, Some(9));
        grid.set(0, 0, Some(1));
        grid.remove_rows(1, 2);
        grid.remove_cols(1, 3);
        assert_eq!((grid.rows(), grid.cols()), (3, 2));
        assert_eq!(grid.position_of(&9), Some((2, 1)));
        assert_eq!(grid.position_of(&1), Some((0, 0)));

        grid.remove_rows(2, 10);
        grid.remove_cols(5, 1);
        assert_eq!((grid.rows(), grid.cols()), (2, 2));
        assert_eq!(grid.position_of(&9), None);
    }

    #[test]
    fn clone_is_independent() {
        let mut grid: Grid<u32> = Grid::new(2, 2);
        grid.set(0, 0, Some(1));
        let mut copy = grid.clone();
        copy.set(0, 0, None);
        copy.set(1, 1, Some(2));
        assert_eq!(grid.get(0, 0), Some(&1));
        assert!(grid.is_empty_at(1, 1));
        assert_eq!(copy.row(1), vec![None, Some(2)]);
        assert_eq!(copy.col(0), vec![None, None]);
    }

    #[test]
    fn occupied_is_row_major() {
        let mut grid: Grid<char> = Grid::new(2, 2);
        grid.set(1, 0, Some('b'));
        grid.set(0, 1, Some('a'));
        let cells: Vec<_> = grid.occupied().map(|(_, _, v)| *v).collect();
        assert_eq!(cells, vec!['a', 'b']);
        assert_eq!(grid.take(0, 1), Some('a'));
        assert!(grid.is_empty_at(0, 1));
    }
}
