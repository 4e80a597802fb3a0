//! Engine observer trait for progress reporting and event collection.

use metro_core::{AgentId, Cell, Direction, ResourceId};
use metro_gate::StallReport;

/// Why a train could not proceed immediately.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum BlockReason {
    /// Its destination entrance was held by `occupant`.
    Entrance { cell: Cell, occupant: Option<AgentId> },
    /// A track resource on its next tile was held by `holder`.
    Track { resource: ResourceId, holder: Option<AgentId> },
}

/// Callbacks invoked from train threads at key points in the movement loop.
///
/// All methods have default no-op implementations so implementors only need
/// to override what they care about.  Calls arrive concurrently from every
/// train thread and never while the coordination lock or the grid lock is
/// held, so an observer may call back into the engine (e.g. `snapshot`).
///
/// # Example — course counter
///
/// ```rust,ignore
/// struct Counter(AtomicU64);
///
/// impl EngineObserver for Counter {
///     fn on_course_end(&self, _agent: AgentId, _direction: Direction) {
///         self.0.fetch_add(1, Ordering::Relaxed);
///     }
/// }
/// ```
pub trait EngineObserver: Send + Sync {
    /// A course was granted; `turn` counts grants across all trains.
    fn on_course_begin(&self, _agent: AgentId, _direction: Direction, _turn: u64) {}

    /// The train reached the far terminus and is about to reverse.
    fn on_course_end(&self, _agent: AgentId, _direction: Direction) {}

    /// The head advanced onto `head`.
    fn on_step(&self, _agent: AgentId, _head: Cell) {}

    fn on_blocked(&self, _agent: AgentId, _reason: BlockReason) {}

    /// No train can make progress.  Reported once per stall.
    fn on_stall(&self, _report: &StallReport) {}

    /// The train's thread cleaned up and is about to exit.
    fn on_terminated(&self, _agent: AgentId) {}
}

/// An [`EngineObserver`] that does nothing.
pub struct NoopObserver;

impl EngineObserver for NoopObserver {}
