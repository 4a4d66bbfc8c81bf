//! Grid: fixed-size board of cells, column-major, y=0 is top.

use crate::cell::{Cell, CellSource};
use std::collections::TryReserveError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GridError {
    #[error("grid dimensions must be non-zero, got {width}x{height}")]
    EmptyDimensions { width: u16, height: u16 },
    #[error("could not allocate grid storage: {0}")]
    Allocation(#[from] TryReserveError),
}

/// A neighbouring cell together with its coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor<'a> {
    pub x: i32,
    pub y: i32,
    pub cell: &'a Cell,
}

/// The four orthogonal neighbours of a cell; `None` past the board edge.
#[derive(Debug, Clone, Copy)]
pub struct Neighbors<'a> {
    pub up: Option<Neighbor<'a>>,
    pub down: Option<Neighbor<'a>>,
    pub left: Option<Neighbor<'a>>,
    pub right: Option<Neighbor<'a>>,
}

impl<'a> Neighbors<'a> {
    /// Neighbours that exist, in up, down, left, right order.
    pub fn iter(self) -> impl Iterator<Item = Neighbor<'a>> {
        [self.up, self.down, self.left, self.right].into_iter().flatten()
    }
}

/// Board of `width × height` cells. Size is fixed for the grid's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Grid {
    width: usize,
    height: usize,
    /// cells[x * height + y]; each column is contiguous, top to bottom.
    cells: Vec<Cell>,
    /// Cached "no cell is falling". Refreshed by the fall animator each tick.
    stable: bool,
}

impl Grid {
    /// Board with every cell drawn from `source`. Pre-existing clusters are left in place.
    pub fn new(width: u16, height: u16, source: &mut impl CellSource) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::EmptyDimensions { width, height });
        }
        let (w, h) = (width as usize, height as usize);
        let mut cells = Vec::new();
        cells.try_reserve_exact(w * h)?;
        cells.extend((0..w * h).map(|_| Cell::new(source.next_type())));
        Ok(Self {
            width: w,
            height: h,
            cells,
            stable: true,
        })
    }

    /// Build a board from literal rows (top row first). Test helper.
    #[cfg(test)]
    pub(crate) fn from_rows(rows: &[&[crate::cell::CellType]]) -> Self {
        let height = rows.len();
        let width = rows.first().map_or(0, |r| r.len());
        let mut cells = Vec::with_capacity(width * height);
        for x in 0..width {
            for row in rows {
                cells.push(Cell::new(row[x]));
            }
        }
        Self {
            width,
            height,
            cells,
            stable: true,
        }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Storage index for (x, y), or `None` when out of bounds. The only bounds check in the crate.
    #[inline]
    fn index(&self, x: i32, y: i32) -> Option<usize> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < self.width && y < self.height).then(|| x * self.height + y)
    }

    #[inline]
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.index(x, y).is_some()
    }

    #[inline]
    pub fn cell_at(&self, x: i32, y: i32) -> Option<&Cell> {
        self.index(x, y).map(|i| &self.cells[i])
    }

    #[cfg(test)]
    pub(crate) fn cell_at_mut(&mut self, x: i32, y: i32) -> Option<&mut Cell> {
        self.index(x, y).map(|i| &mut self.cells[i])
    }

    fn neighbor(&self, x: i32, y: i32) -> Option<Neighbor<'_>> {
        self.cell_at(x, y).map(|cell| Neighbor { x, y, cell })
    }

    /// Orthogonal neighbours only; diagonals never count.
    pub fn neighbors(&self, x: i32, y: i32) -> Neighbors<'_> {
        Neighbors {
            up: self.neighbor(x, y - 1),
            down: self.neighbor(x, y + 1),
            left: self.neighbor(x - 1, y),
            right: self.neighbor(x + 1, y),
        }
    }

    /// Column `x`, top to bottom.
    #[cfg(test)]
    pub(crate) fn column(&self, x: usize) -> Option<&[Cell]> {
        (x < self.width).then(|| &self.cells[x * self.height..(x + 1) * self.height])
    }

    pub(crate) fn column_mut(&mut self, x: usize) -> Option<&mut [Cell]> {
        (x < self.width).then(|| &mut self.cells[x * self.height..(x + 1) * self.height])
    }

    /// Cell kinds of column `x`, top to bottom.
    #[cfg(test)]
    pub(crate) fn column_kinds(&self, x: usize) -> Vec<crate::cell::CellType> {
        self.column(x)
            .map(|col| col.iter().map(|c| c.kind).collect())
            .unwrap_or_default()
    }

    /// Every cell with its (x, y), column by column.
    pub fn iter(&self) -> impl Iterator<Item = ((usize, usize), &Cell)> + '_ {
        let h = self.height;
        self.cells
            .iter()
            .enumerate()
            .map(move |(i, cell)| ((i / h, i % h), cell))
    }

    pub(crate) fn cells_mut(&mut self) -> impl Iterator<Item = &mut Cell> + '_ {
        self.cells.iter_mut()
    }

    /// Last value computed by [`Grid::refresh_stable`].
    #[inline]
    pub fn is_stable(&self) -> bool {
        self.stable
    }

    /// Recompute the stable flag from cell state.
    pub fn refresh_stable(&mut self) -> bool {
        self.stable = !self.cells.iter().any(Cell::is_falling);
        self.stable
    }
}
