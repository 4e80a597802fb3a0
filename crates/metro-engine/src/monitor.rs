//! The observer lock around the live grid.
//!
//! Train threads take the write side for one tile-step at a time; snapshot
//! readers take the read side.  `parking_lot::RwLock` is task-fair, so a
//! steady stream of readers cannot starve the trains.

use std::fmt;
use std::ops::Deref;

use parking_lot::RwLock;

use metro_core::{Cell, GridMap, TileKind};

pub(crate) struct GridMonitor {
    grid: RwLock<GridMap>,
}

impl GridMonitor {
    pub(crate) fn new(grid: GridMap) -> Self {
        Self { grid: RwLock::new(grid) }
    }

    pub(crate) fn snapshot(&self) -> GridView {
        GridView { grid: self.grid.read().clone() }
    }

    pub(crate) fn field(&self, cell: Cell) -> Option<TileKind> {
        self.grid.read().get(cell)
    }

    /// Run `f` with the grid read-locked.
    pub(crate) fn with_grid<R>(&self, f: impl FnOnce(&GridMap) -> R) -> R {
        f(&self.grid.read())
    }

    /// Run `f` with the grid write-locked.  Only train threads and the
    /// builder call this.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut GridMap) -> R) -> R {
        f(&mut self.grid.write())
    }
}

/// A consistent, owned copy of the grid taken under the read lock.
///
/// Every train appears as a whole: snapshots never see half a tile-step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GridView {
    grid: GridMap,
}

impl GridView {
    pub fn into_inner(self) -> GridMap {
        self.grid
    }
}

impl Deref for GridView {
    type Target = GridMap;

    fn deref(&self) -> &GridMap {
        &self.grid
    }
}

impl fmt::Display for GridView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.grid, f)
    }
}
