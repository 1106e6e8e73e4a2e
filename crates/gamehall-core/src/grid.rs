//! Fixed-size rectangular boards.

use serde::{Deserialize, Serialize};

/// A `(row, col)` board coordinate; serialized as a two-element array
pub type Coord = (usize, usize);

/// Row-major board of optional cells with fixed dimensions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Grid<T> {
    cells: Vec<Vec<Option<T>>>,
}

impl<T: Clone> Grid<T> {
    /// An empty board
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            cells: vec![vec![None; cols]; rows],
        }
    }

    /// Build a board from rows of cells
    pub fn from_rows(cells: Vec<Vec<Option<T>>>) -> Self {
        Self { cells }
    }
}

impl<T> Grid<T> {
    pub fn rows(&self) -> usize {
        self.cells.len()
    }

    pub fn cols(&self) -> usize {
        self.cells.first().map_or(0, Vec::len)
    }

    pub fn in_bounds(&self, (row, col): Coord) -> bool {
        row < self.rows() && col < self.cols()
    }

    /// Signed coordinate check, for walking off the edge
    pub fn offset(&self, (row, col): Coord, dr: isize, dc: isize) -> Option<Coord> {
        let r = row.checked_add_signed(dr)?;
        let c = col.checked_add_signed(dc)?;
        self.in_bounds((r, c)).then_some((r, c))
    }

    pub fn get(&self, (row, col): Coord) -> Option<&T> {
        self.cells.get(row)?.get(col)?.as_ref()
    }

    pub fn is_empty_at(&self, pos: Coord) -> bool {
        self.in_bounds(pos) && self.get(pos).is_none()
    }

    /// Replace a cell, returning its previous contents
    pub fn set(&mut self, (row, col): Coord, value: Option<T>) -> Option<T> {
        std::mem::replace(&mut self.cells[row][col], value)
    }

    /// Orthogonal neighbours inside the board
    pub fn neighbors(&self, pos: Coord) -> impl Iterator<Item = Coord> + '_ {
        [(-1, 0), (1, 0), (0, -1), (0, 1)]
            .into_iter()
            .filter_map(move |(dr, dc)| self.offset(pos, dr, dc))
    }

    /// Every coordinate in row-major order
    pub fn coords(&self) -> impl Iterator<Item = Coord> {
        let cols = self.cols();
        (0..self.rows()).flat_map(move |r| (0..cols).map(move |c| (r, c)))
    }

    pub fn is_full(&self) -> bool {
        self.cells.iter().flatten().all(Option::is_some)
    }

    /// Whether every row has the expected width
    pub fn has_shape(&self, rows: usize, cols: usize) -> bool {
        self.rows() == rows && self.cells.iter().all(|r| r.len() == cols)
    }
}
