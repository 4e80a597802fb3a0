//! Always-on counters and the engine-wide status.

use std::sync::atomic::{AtomicU64, Ordering};

use metro_core::AgentId;
use metro_gate::StallReport;

/// What the engine as a whole is doing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineStatus {
    /// At least one train can still make progress (or is paused).
    Running,
    /// Every live train is waiting on another; nothing will change until a
    /// train is terminated.
    NoPossibleMove(StallReport),
    /// Every train has terminated.
    Halted,
}

impl EngineStatus {
    pub fn is_stalled(&self) -> bool {
        matches!(self, EngineStatus::NoPossibleMove(_))
    }
}

/// Lock-free counters updated from train threads.
pub(crate) struct EngineStats {
    courses:        Vec<AtomicU64>,
    steps:          Vec<AtomicU64>,
    entrance_waits: AtomicU64,
    track_waits:    AtomicU64,
    collisions:     AtomicU64,
    stalls:         AtomicU64,
}

impl EngineStats {
    pub(crate) fn new(agents: usize) -> Self {
        Self {
            courses:        (0..agents).map(|_| AtomicU64::new(0)).collect(),
            steps:          (0..agents).map(|_| AtomicU64::new(0)).collect(),
            entrance_waits: AtomicU64::new(0),
            track_waits:    AtomicU64::new(0),
            collisions:     AtomicU64::new(0),
            stalls:         AtomicU64::new(0),
        }
    }

    pub(crate) fn course(&self, agent: AgentId) {
        if let Some(c) = self.courses.get(agent.index()) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn step(&self, agent: AgentId) {
        if let Some(c) = self.steps.get(agent.index()) {
            c.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn entrance_wait(&self) {
        self.entrance_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn track_wait(&self) {
        self.track_waits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn collision(&self, n: u64) {
        self.collisions.fetch_add(n, Ordering::Relaxed);
    }

    pub(crate) fn stall(&self) {
        self.stalls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> StatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            courses:        self.courses.iter().map(load).collect(),
            steps:          self.steps.iter().map(load).collect(),
            entrance_waits: load(&self.entrance_waits),
            track_waits:    load(&self.track_waits),
            collisions:     load(&self.collisions),
            stalls:         load(&self.stalls),
        }
    }
}

/// Point-in-time copy of the engine counters.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    /// Completed courses, indexed by `AgentId`.
    pub courses:        Vec<u64>,
    /// Tile-steps taken, indexed by `AgentId`.
    pub steps:          Vec<u64>,
    /// Times a train found its destination entrance taken.
    pub entrance_waits: u64,
    /// Times a train found a track resource on its next tile taken.
    pub track_waits:    u64,
    /// Tiles painted over another train's marker.  Always zero unless the
    /// locking protocol is broken.
    pub collisions:     u64,
    pub stalls:         u64,
}

impl StatsSnapshot {
    /// Entrance and track waits combined.
    pub fn blocking_events(&self) -> u64 {
        self.entrance_waits + self.track_waits
    }

    pub fn total_courses(&self) -> u64 {
        self.courses.iter().sum()
    }
}
