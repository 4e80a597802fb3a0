//! Validated train routes.
//!
//! A route is the full tile path a train walks in the forward direction;
//! the backward leg walks the same cells in reverse.  Routes are immutable
//! once built and are shared between the resource table and the train
//! thread behind an `Arc`.

use rustc_hash::FxHashSet;

use crate::{Cell, CoreError, CoreResult, Direction};

/// Ordered, contiguous, non-repeating sequence of at least two cells.
#[derive(Clone, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Route {
    cells: Vec<Cell>,
}

impl Route {
    /// Validate and wrap a tile path.
    ///
    /// # Errors
    ///
    /// - [`CoreError::RouteTooShort`] if fewer than two cells.
    /// - [`CoreError::RouteNotContiguous`] if two consecutive cells are not
    ///   orthogonal neighbours.
    /// - [`CoreError::RouteRevisits`] if a cell appears twice.
    pub fn new(cells: Vec<Cell>) -> CoreResult<Route> {
        if cells.len() < 2 {
            return Err(CoreError::RouteTooShort { len: cells.len() });
        }
        for pair in cells.windows(2) {
            if !pair[0].is_adjacent(pair[1]) {
                return Err(CoreError::RouteNotContiguous { from: pair[0], to: pair[1] });
            }
        }
        let mut seen = FxHashSet::with_capacity_and_hasher(cells.len(), Default::default());
        for &cell in &cells {
            if !seen.insert(cell) {
                return Err(CoreError::RouteRevisits(cell));
            }
        }
        Ok(Route { cells })
    }

    /// Expand axis-aligned waypoints into a tile path.
    ///
    /// Each consecutive waypoint pair must share a row or a column; the
    /// straight line between them is filled in tile by tile.  This is line
    /// drawing, not path search: the caller decides where the corners are.
    pub fn from_waypoints(waypoints: &[Cell]) -> CoreResult<Route> {
        let Some((&first, rest)) = waypoints.split_first() else {
            return Err(CoreError::RouteTooShort { len: 0 });
        };

        let mut cells = vec![first];
        let mut at = first;
        for &next in rest {
            if at.row != next.row && at.col != next.col {
                return Err(CoreError::DiagonalWaypoints { from: at, to: next });
            }
            let d_row = (next.row - at.row).signum();
            let d_col = (next.col - at.col).signum();
            while at != next {
                at = at.offset(d_row, d_col);
                cells.push(at);
            }
        }
        Route::new(cells)
    }

    // ── Accessors ─────────────────────────────────────────────────────────

    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always `false`: a valid route has at least two cells.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn start(&self) -> Cell {
        self.cells[0]
    }

    #[inline]
    pub fn end(&self) -> Cell {
        self.cells[self.cells.len() - 1]
    }

    /// Index of `cell` in forward order.
    pub fn position(&self, cell: Cell) -> Option<usize> {
        self.cells.iter().position(|&c| c == cell)
    }

    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.contains(&cell)
    }

    /// First and last cell of a leg walked in `direction`.
    pub fn termini(&self, direction: Direction) -> (Cell, Cell) {
        match direction {
            Direction::Forward  => (self.start(), self.end()),
            Direction::Backward => (self.end(), self.start()),
        }
    }

    /// The cells of one leg, in travel order.
    pub fn oriented(&self, direction: Direction) -> Vec<Cell> {
        match direction {
            Direction::Forward  => self.cells.clone(),
            Direction::Backward => self.cells.iter().rev().copied().collect(),
        }
    }
}
