//! Cluster selection and removal: flood fill, size gate, column compaction, refill.

use crate::cell::{Cell, CellSource, CellType};
use crate::grid::Grid;
use std::collections::HashSet;
use thiserror::Error;

/// Smallest cluster that can be popped.
pub const MIN_CLUSTER_SIZE: usize = 3;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum PopError {
    #[error("({x}, {y}) is outside the grid")]
    OutOfBounds { x: i32, y: i32 },
    #[error("grid is still settling")]
    Unstable,
    #[error("no gem at ({x}, {y})")]
    EmptyCell { x: i32, y: i32 },
    #[error("cluster of {size} is below the minimum of {}", MIN_CLUSTER_SIZE)]
    TooSmall { size: usize },
}

/// Maximal 4-connected group of same-kind cells reached from a seed.
#[derive(Debug, Clone)]
pub struct Cluster {
    kind: CellType,
    cells: HashSet<(i32, i32)>,
}

impl Cluster {
    pub fn kind(&self) -> CellType {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.cells.contains(&(x, y))
    }

    /// Member positions sorted by (x, y).
    pub fn positions(&self) -> Vec<(i32, i32)> {
        let mut out: Vec<_> = self.cells.iter().copied().collect();
        out.sort_unstable();
        out
    }
}

/// Result of a successful pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Removal {
    pub kind: CellType,
    /// Popped positions, sorted by (x, y), as they were before compaction.
    pub removed: Vec<(i32, i32)>,
}

impl Removal {
    pub fn size(&self) -> usize {
        self.removed.len()
    }
}

/// Flood fill from (x, y) over orthogonal neighbours of the seed's kind.
///
/// Uses an explicit stack and a per-call visited set, so depth never grows
/// with the board. Returns `None` when (x, y) is off the board. The grid is
/// not modified.
pub fn select_contiguous(grid: &Grid, x: i32, y: i32) -> Option<Cluster> {
    let kind = grid.cell_at(x, y)?.kind;
    let mut cells = HashSet::new();
    let mut stack = vec![(x, y)];
    cells.insert((x, y));

    while let Some((cx, cy)) = stack.pop() {
        for n in grid.neighbors(cx, cy).iter() {
            if n.cell.kind == kind && cells.insert((n.x, n.y)) {
                stack.push((n.x, n.y));
            }
        }
    }
    Some(Cluster { kind, cells })
}

/// Pop the cluster under (x, y).
///
/// On success every popped cell is gone, each column's survivors have slid
/// down in their original order, and the emptied top of each column is
/// refilled from `source`. Moved and refilled cells get a fresh fall distance.
/// Any error leaves the grid exactly as it was.
pub fn remove_cluster(
    grid: &mut Grid,
    x: i32,
    y: i32,
    source: &mut impl CellSource,
) -> Result<Removal, PopError> {
    let cluster = select_contiguous(grid, x, y).ok_or(PopError::OutOfBounds { x, y })?;
    if !grid.is_stable() {
        return Err(PopError::Unstable);
    }
    if cluster.kind().is_void() {
        return Err(PopError::EmptyCell { x, y });
    }
    if cluster.len() < MIN_CLUSTER_SIZE {
        return Err(PopError::TooSmall { size: cluster.len() });
    }

    for column_x in 0..grid.width() {
        let Some(column) = grid.column_mut(column_x) else {
            continue;
        };
        let cx = column_x as i32;
        compact_column(column, |row| cluster.contains(cx, row as i32), source);
    }
    grid.refresh_stable();

    Ok(Removal {
        kind: cluster.kind(),
        removed: cluster.positions(),
    })
}

/// Drop removed and empty cells out of one column (top to bottom), slide the
/// survivors to the bottom in order and refill the top. Returns how many
/// cells were refilled.
fn compact_column(
    column: &mut [Cell],
    removed: impl Fn(usize) -> bool,
    source: &mut impl CellSource,
) -> usize {
    let survivors: Vec<(usize, Cell)> = column
        .iter()
        .enumerate()
        .filter(|&(row, cell)| !removed(row) && !cell.kind.is_void())
        .map(|(row, cell)| (row, *cell))
        .collect();
    let gap = column.len() - survivors.len();
    if gap == 0 {
        return 0;
    }

    for (i, (from, mut cell)) in survivors.into_iter().enumerate() {
        let to = gap + i;
        if to > from {
            cell.drop_from(to - from);
        }
        column[to] = cell;
    }
    // Refills all start one gap-height above the board.
    for slot in &mut column[..gap] {
        *slot = Cell::new(source.next_type());
        slot.drop_from(gap);
    }
    gap
}

/// True if some cluster on the board could be popped right now.
pub fn has_removable_cluster(grid: &Grid) -> bool {
    let mut seen = HashSet::new();
    for ((x, y), cell) in grid.iter() {
        let (x, y) = (x as i32, y as i32);
        if cell.kind.is_void() || seen.contains(&(x, y)) {
            continue;
        }
        let Some(cluster) = select_contiguous(grid, x, y) else {
            continue;
        };
        if cluster.len() >= MIN_CLUSTER_SIZE {
            return true;
        }
        seen.extend(cluster.cells);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cell::tests::Scripted;
    use crate::cell::CellType::{Banana as B, Diamond as D, Emerald as E, Grape as G, Ruby as R};

    fn kinds_and_offsets(grid: &Grid) -> Vec<(CellType, f32)> {
        grid.iter().map(|(_, c)| (c.kind, c.fall_offset)).collect()
    }

    #[test]
    fn select_uniform_grid_returns_whole_area() {
        let row: &[CellType] = &[R, R, R, R, R];
        let grid = Grid::from_rows(&[row, row, row, row]);
        assert_eq!(select_contiguous(&grid, 2, 1).unwrap().len(), 20);
    }

    #[test]
    fn select_ignores_diagonals() {
        let grid = Grid::from_rows(&[&[D, E], &[E, D]]);
        let cluster = select_contiguous(&grid, 0, 0).unwrap();
        assert_eq!(cluster.len(), 1);
        assert!(cluster.contains(0, 0));
        assert!(!cluster.contains(1, 1));
    }

    #[test]
    fn select_follows_winding_paths() {
        let grid = Grid::from_rows(&[
            &[D, D, D, E],
            &[E, E, D, E],
            &[D, D, D, E],
            &[D, E, E, E],
        ]);
        assert_eq!(select_contiguous(&grid, 0, 0).unwrap().len(), 8);
        assert_eq!(select_contiguous(&grid, 3, 0).unwrap().len(), 6);
        assert_eq!(select_contiguous(&grid, 0, 1).unwrap().len(), 2);
    }

    #[test]
    fn select_is_repeatable_and_leaves_grid_alone() {
        let grid = Grid::from_rows(&[&[D, D, E], &[G, D, E], &[G, G, B]]);
        let before = grid.clone();
        let first = select_contiguous(&grid, 1, 1).unwrap();
        let second = select_contiguous(&grid, 1, 1).unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first.positions(), second.positions());
        assert_eq!(grid, before);
    }

    #[test]
    fn select_out_of_bounds_is_none() {
        let grid = Grid::from_rows(&[&[D]]);
        assert!(select_contiguous(&grid, 1, 0).is_none());
        assert!(select_contiguous(&grid, 0, -1).is_none());
    }

    #[test]
    fn select_on_large_board_does_not_recurse() {
        let mut source = Scripted::new(&[E]);
        let grid = Grid::new(512, 512, &mut source).unwrap();
        assert_eq!(select_contiguous(&grid, 0, 0).unwrap().len(), 512 * 512);
    }

    #[test]
    fn three_in_a_column_are_replaced_from_above() {
        let mut grid = Grid::from_rows(&[&[D, E, R], &[D, R, E], &[D, E, R]]);
        let mut source = Scripted::new(&[G, B, G]);
        let removal = remove_cluster(&mut grid, 0, 0, &mut source).unwrap();

        assert_eq!(removal.size(), 3);
        assert_eq!(removal.kind, D);
        assert_eq!(grid.column_kinds(0), vec![G, B, G]);
        for cell in grid.column(0).unwrap() {
            assert_eq!(cell.fall_offset, 3.0);
            assert_eq!(cell.fall_velocity, 0.0);
        }
        // Untouched columns stay settled.
        assert_eq!(grid.column_kinds(1), vec![E, R, E]);
        assert!(grid.column(1).unwrap().iter().all(|c| !c.is_falling()));
        assert!(!grid.is_stable());
    }

    #[test]
    fn single_cell_grid_cannot_pop() {
        let mut grid = Grid::from_rows(&[&[R]]);
        let before = grid.clone();
        let err = remove_cluster(&mut grid, 0, 0, &mut Scripted::new(&[D])).unwrap_err();
        assert_eq!(err, PopError::TooSmall { size: 1 });
        assert_eq!(grid, before);
    }

    #[test]
    fn pair_is_below_the_gate() {
        let mut grid = Grid::from_rows(&[&[D, D, E]]);
        let before = kinds_and_offsets(&grid);
        assert_eq!(select_contiguous(&grid, 0, 0).unwrap().len(), 2);
        let err = remove_cluster(&mut grid, 0, 0, &mut Scripted::new(&[R])).unwrap_err();
        assert_eq!(err, PopError::TooSmall { size: 2 });
        assert_eq!(kinds_and_offsets(&grid), before);
    }

    #[test]
    fn out_of_bounds_click_is_rejected() {
        let mut grid = Grid::from_rows(&[&[D, D, D]]);
        let before = grid.clone();
        let err = remove_cluster(&mut grid, 3, 0, &mut Scripted::new(&[R])).unwrap_err();
        assert_eq!(err, PopError::OutOfBounds { x: 3, y: 0 });
        assert_eq!(grid, before);
    }

    #[test]
    fn unstable_grid_is_rejected() {
        let mut grid = Grid::from_rows(&[&[D, D, D], &[E, R, E]]);
        grid.cell_at_mut(0, 1).unwrap().drop_from(1);
        grid.refresh_stable();
        let before = grid.clone();
        let err = remove_cluster(&mut grid, 0, 0, &mut Scripted::new(&[R])).unwrap_err();
        assert_eq!(err, PopError::Unstable);
        assert_eq!(grid, before);
    }

    #[test]
    fn survivors_keep_order_and_fall_by_displacement() {
        // The D at (0,2) is cut off by the G below it and must survive.
        let mut grid = Grid::from_rows(&[
            &[E, B],
            &[R, E],
            &[D, R],
            &[G, E],
            &[D, D],
        ]);
        grid.cell_at_mut(1, 3).unwrap().kind = D;
        let mut source = Scripted::new(&[B, G, R]);
        let removal = remove_cluster(&mut grid, 0, 4, &mut source).unwrap();
        assert_eq!(removal.removed, vec![(0, 4), (1, 3), (1, 4)]);

        // Column 0 lost one cell: E, R, D, G shift down by one under one refill.
        assert_eq!(grid.column_kinds(0), vec![B, E, R, D, G]);
        let offsets: Vec<f32> = grid.column(0).unwrap().iter().map(|c| c.fall_offset).collect();
        assert_eq!(offsets, vec![1.0, 1.0, 1.0, 1.0, 1.0]);

        // Column 1 lost two: B, E, R slide down two under two refills.
        assert_eq!(grid.column_kinds(1), vec![G, R, B, E, R]);
        let offsets: Vec<f32> = grid.column(1).unwrap().iter().map(|c| c.fall_offset).collect();
        assert_eq!(offsets, vec![2.0, 2.0, 2.0, 2.0, 2.0]);
    }

    #[test]
    fn cells_below_the_gap_do_not_move() {
        let mut grid = Grid::from_rows(&[&[E, R], &[D, D], &[G, D]]);
        let mut source = Scripted::new(&[B]);
        remove_cluster(&mut grid, 0, 1, &mut source).unwrap();

        assert_eq!(grid.column_kinds(0), vec![B, E, G]);
        let offsets: Vec<f32> = grid.column(0).unwrap().iter().map(|c| c.fall_offset).collect();
        assert_eq!(offsets, vec![1.0, 1.0, 0.0]);
        assert_eq!(grid.column_kinds(1), vec![B, B, R]);
    }

    #[test]
    fn refill_leaves_no_void() {
        let row: &[CellType] = &[R, R, R, R];
        let mut grid = Grid::from_rows(&[row, row, row]);
        let mut source = Scripted::new(&[D, E, G, B]);
        let removal = remove_cluster(&mut grid, 1, 1, &mut source).unwrap();
        assert_eq!(removal.size(), 12);
        assert!(grid.iter().all(|(_, c)| !c.kind.is_void()));
        assert!(grid.iter().all(|(_, c)| c.fall_offset == 3.0));
    }

    #[test]
    fn void_cell_is_rejected() {
        let mut grid = Grid::from_rows(&[&[D, E], &[D, E], &[D, R]]);
        grid.cell_at_mut(1, 2).unwrap().kind = CellType::Void;
        let before = grid.clone();
        let err = remove_cluster(&mut grid, 1, 2, &mut Scripted::new(&[G])).unwrap_err();
        assert_eq!(err, PopError::EmptyCell { x: 1, y: 2 });
        assert_eq!(grid, before);
    }

    #[test]
    fn void_run_is_rejected_before_the_size_gate() {
        let mut grid = Grid::from_rows(&[&[D, E], &[D, E], &[D, R]]);
        for y in 0..3 {
            grid.cell_at_mut(0, y).unwrap().kind = CellType::Void;
        }
        let before = grid.clone();
        assert_eq!(select_contiguous(&grid, 0, 1).unwrap().len(), 3);
        let err = remove_cluster(&mut grid, 0, 1, &mut Scripted::new(&[G])).unwrap_err();
        assert_eq!(err, PopError::EmptyCell { x: 0, y: 1 });
        assert_eq!(grid, before);
    }

    #[test]
    fn has_removable_cluster_spots_triples() {
        let grid = Grid::from_rows(&[&[D, E, D], &[E, D, E], &[D, E, D]]);
        assert!(!has_removable_cluster(&grid));
        let grid = Grid::from_rows(&[&[D, E, D], &[E, E, R], &[D, G, D]]);
        assert!(has_removable_cluster(&grid));
    }
}
