//! Resource identity and per-train views.

use std::fmt;

use metro_core::{AgentId, Cell, ResourceId};

/// Canonical, direction-free identity of a shared run: its endpoint pair
/// with `lo <= hi`.
///
/// A crossing has `lo == hi`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct ResourceKey {
    pub lo: Cell,
    pub hi: Cell,
}

impl ResourceKey {
    /// Key for a run with endpoints `a` and `b`, in either order.
    pub fn new(a: Cell, b: Cell) -> Self {
        if a <= b {
            Self { lo: a, hi: b }
        } else {
            Self { lo: b, hi: a }
        }
    }

    #[inline]
    pub fn is_single_cell(self) -> bool {
        self.lo == self.hi
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_single_cell() {
            write!(f, "{}", self.lo)
        } else {
            write!(f, "{}..{}", self.lo, self.hi)
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ResourceKind {
    /// Single shared cell.  Held until the course that took it ends.
    Crossing,
    /// Run of two or more shared cells.  Released as soon as the whole
    /// wagon chain has left it.
    Segment,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ResourceKind::Crossing => "crossing",
            ResourceKind::Segment  => "segment",
        })
    }
}

/// One physical resource in the table.
#[derive(Clone, Debug)]
pub struct Resource {
    pub(crate) id:     ResourceId,
    pub(crate) key:    ResourceKey,
    pub(crate) kind:   ResourceKind,
    /// Sorted, so `contains` is a binary search.
    pub(crate) cells:  Vec<Cell>,
    /// Every train with a view of this resource, ascending.
    pub(crate) owners: Vec<AgentId>,
}

impl Resource {
    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    #[inline]
    pub fn key(&self) -> ResourceKey {
        self.key
    }

    #[inline]
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Covered cells in row-major order.
    #[inline]
    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    #[inline]
    pub fn owners(&self) -> &[AgentId] {
        &self.owners
    }

    #[inline]
    pub fn contains(&self, cell: Cell) -> bool {
        self.cells.binary_search(&cell).is_ok()
    }
}

/// A resource as seen from one train's route.
///
/// `entry` and `exit` follow the train's forward orientation; `first` and
/// `last` are the inclusive route indices of the run.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ResourceView {
    pub resource: ResourceId,
    pub kind:     ResourceKind,
    pub entry:    Cell,
    pub exit:     Cell,
    pub first:    usize,
    pub last:     usize,
}

impl ResourceView {
    /// `true` if route index `index` lies inside this view's run.
    #[inline]
    pub fn spans(&self, index: usize) -> bool {
        (self.first..=self.last).contains(&index)
    }

    #[inline]
    pub fn key(&self) -> ResourceKey {
        ResourceKey::new(self.entry, self.exit)
    }
}
