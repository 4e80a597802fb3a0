//! Grid coordinates and travel direction.

use std::fmt;

// ── Cell ──────────────────────────────────────────────────────────────────────

/// A `(row, col)` position on the tunnel map.
///
/// Ordering is row-major, which gives resource keys and station scans a
/// stable, map-independent order.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Cell {
    pub row: i32,
    pub col: i32,
}

impl Cell {
    #[inline]
    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    /// Overwrite this cell's coordinates in place.
    ///
    /// Wagons are stored as mutable cells and shifted one slot down the chain
    /// on every tile-step; `move_to` is the shift.
    #[inline]
    pub fn move_to(&mut self, target: Cell) {
        self.row = target.row;
        self.col = target.col;
    }

    /// `true` if `other` is one of the four orthogonal neighbours.
    #[inline]
    pub fn is_adjacent(self, other: Cell) -> bool {
        (self.row - other.row).abs() + (self.col - other.col).abs() == 1
    }

    /// The cell displaced by `(d_row, d_col)`.
    #[inline]
    pub fn offset(self, d_row: i32, d_col: i32) -> Cell {
        Cell::new(self.row + d_row, self.col + d_col)
    }
}

impl From<(i32, i32)> for Cell {
    fn from((row, col): (i32, i32)) -> Self {
        Cell::new(row, col)
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.row, self.col)
    }
}

// ── Direction ─────────────────────────────────────────────────────────────────

/// Which way a train walks its route.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    #[inline]
    pub fn flip(self) -> Direction {
        match self {
            Direction::Forward  => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Direction::Forward  => "forward",
            Direction::Backward => "backward",
        })
    }
}
