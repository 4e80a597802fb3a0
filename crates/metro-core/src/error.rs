//! Core error type.
//!
//! Higher crates wrap `CoreError` as one variant of their own enum via
//! `#[from]`, so construction-time validation failures surface unchanged.

use thiserror::Error;

use crate::Cell;

/// Errors raised while building grids and routes.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("map line {line}: unknown tile character {ch:?}")]
    UnknownTile { line: usize, ch: char },

    #[error("map line {line} has width {got}, expected {expected}")]
    RaggedRow {
        line:     usize,
        expected: usize,
        got:      usize,
    },

    #[error("map is empty")]
    EmptyMap,

    #[error("cell {0} is outside the map")]
    OutOfBounds(Cell),

    #[error("route has {len} cell(s); at least 2 are required")]
    RouteTooShort { len: usize },

    #[error("route jumps from {from} to {to}; consecutive cells must be adjacent")]
    RouteNotContiguous { from: Cell, to: Cell },

    #[error("route visits {0} more than once")]
    RouteRevisits(Cell),

    #[error("waypoints {from} and {to} are not on a common row or column")]
    DiagonalWaypoints { from: Cell, to: Cell },
}

/// Shorthand result type for `metro-core`.
pub type CoreResult<T> = Result<T, CoreError>;
