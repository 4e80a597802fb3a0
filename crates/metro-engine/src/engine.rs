//! `Engine` — the running simulation and its control surface.

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use metro_core::{AgentId, Cell, GridMap, Route, TileKind};
use metro_gate::{Coordinator, GateListener, StallReport};
use metro_track::ResourceTable;

use crate::monitor::{GridMonitor, GridView};
use crate::stats::{EngineStats, EngineStatus, StatsSnapshot};
use crate::train::{AgentPhase, TrainControl};
use crate::{BlockReason, EngineBuilder, EngineError, EngineObserver, EngineResult};

// ── Shared state ──────────────────────────────────────────────────────────────

/// Everything the train threads share.
pub(crate) struct Shared {
    pub(crate) monitor:  GridMonitor,
    pub(crate) table:    ResourceTable,
    pub(crate) gate:     Coordinator,
    pub(crate) stats:    EngineStats,
    pub(crate) observer: Arc<dyn EngineObserver>,
}

impl GateListener for Shared {
    fn on_entrance_blocked(&self, agent: AgentId, entrance: Cell, occupant: Option<AgentId>) {
        self.stats.entrance_wait();
        debug!(target: "metro-engine", %agent, %entrance, "destination taken, parked");
        self.observer.on_blocked(agent, BlockReason::Entrance { cell: entrance, occupant });
    }

    fn on_stall(&self, report: &StallReport) {
        self.stats.stall();
        self.observer.on_stall(report);
    }
}

// ── Engine ────────────────────────────────────────────────────────────────────

/// A set of train threads moving over one grid.
///
/// Dropping the engine terminates and joins every train.
///
/// # Example
///
/// ```rust,ignore
/// let engine = Engine::new(GridMap::metro(), routes)?;
/// engine.resume_all();
/// std::thread::sleep(Duration::from_secs(5));
/// println!("{}", engine.snapshot());
/// engine.shutdown();
/// ```
pub struct Engine {
    pub(crate) shared:   Arc<Shared>,
    pub(crate) routes:   Vec<Arc<Route>>,
    pub(crate) controls: Vec<Arc<TrainControl>>,
    pub(crate) handles:  Mutex<Vec<Option<JoinHandle<()>>>>,
}

impl Engine {
    /// Build with the default [`EngineConfig`](metro_core::EngineConfig):
    /// three wagons, 200 ms pacing, every train paused.
    pub fn new(grid: GridMap, routes: Vec<Route>) -> EngineResult<Engine> {
        EngineBuilder::new(grid, routes).build()
    }

    fn control(&self, agent: AgentId) -> EngineResult<&Arc<TrainControl>> {
        self.controls.get(agent.index()).ok_or(EngineError::UnknownAgent(agent))
    }

    #[inline]
    pub fn agent_count(&self) -> usize {
        self.controls.len()
    }

    pub fn agents(&self) -> impl Iterator<Item = AgentId> + '_ {
        (0..self.controls.len()).map(|i| AgentId(i as u32))
    }

    // ── Control ───────────────────────────────────────────────────────────

    /// Ask `agent` to stop before its next tile-step.  Idempotent.
    pub fn pause(&self, agent: AgentId) -> EngineResult<()> {
        self.control(agent)?.request_pause();
        Ok(())
    }

    /// Let a paused train continue.  A no-op on a train that is not paused.
    pub fn resume(&self, agent: AgentId) -> EngineResult<()> {
        self.control(agent)?.request_resume();
        Ok(())
    }

    pub fn pause_all(&self) {
        for control in &self.controls {
            control.request_pause();
        }
    }

    pub fn resume_all(&self) {
        for control in &self.controls {
            control.request_resume();
        }
    }

    /// Time between `agent`'s tile-steps, from its next step on.
    pub fn set_pacing(&self, agent: AgentId, pacing: Duration) -> EngineResult<()> {
        self.control(agent)?.set_pacing(pacing);
        Ok(())
    }

    /// Stop `agent` and wait for its thread to clean up.
    ///
    /// The train erases itself from the grid, releases its locks and leaves
    /// the coordinator.  Terminating an already-terminated train is a no-op.
    pub fn terminate(&self, agent: AgentId) -> EngineResult<()> {
        self.control(agent)?.terminate();
        self.wake_waiters();
        let handle = self.handles.lock().get_mut(agent.index()).and_then(Option::take);
        if let Some(handle) = handle {
            join(agent, handle);
        }
        Ok(())
    }

    /// Terminate every train and join every thread.
    pub fn shutdown(&self) {
        for control in &self.controls {
            control.terminate();
        }
        self.wake_waiters();
        let handles: Vec<_> = self.handles.lock().iter_mut().map(Option::take).collect();
        let mut joined = 0;
        for (i, handle) in handles.into_iter().enumerate() {
            if let Some(handle) = handle {
                join(AgentId(i as u32), handle);
                joined += 1;
            }
        }
        if joined > 0 {
            info!(target: "metro-engine", trains = joined, "engine shut down");
        }
    }

    /// Notify every condition a train may sleep on, after the cancel flags
    /// are set.
    fn wake_waiters(&self) {
        self.shared.gate.wake_all();
        self.shared.table.wake_all();
    }

    // ── Observation ───────────────────────────────────────────────────────

    /// Consistent copy of the grid, taken under the read lock.
    pub fn snapshot(&self) -> GridView {
        self.shared.monitor.snapshot()
    }

    /// Tile at `cell`, or `None` off the map.
    pub fn field(&self, cell: Cell) -> Option<TileKind> {
        self.shared.monitor.field(cell)
    }

    /// Borrow the live grid under the read lock.  Trains cannot step until
    /// `f` returns, so keep it short.
    pub fn with_grid<R>(&self, f: impl FnOnce(&GridMap) -> R) -> R {
        self.shared.monitor.with_grid(f)
    }

    pub fn status(&self) -> EngineStatus {
        if self.controls.iter().all(|c| c.phase() == AgentPhase::Terminated) {
            return EngineStatus::Halted;
        }
        match self.shared.gate.current_stall() {
            Some(report) => EngineStatus::NoPossibleMove(report),
            None => EngineStatus::Running,
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }

    pub fn phase(&self, agent: AgentId) -> EngineResult<AgentPhase> {
        Ok(self.control(agent)?.phase())
    }

    pub fn resources(&self) -> &ResourceTable {
        &self.shared.table
    }

    pub fn route(&self, agent: AgentId) -> Option<&Route> {
        self.routes.get(agent.index()).map(|r| &**r)
    }

    /// Current admission queue, head first.  Trains mid-course or parked on
    /// an entrance are not in it.
    pub fn admission_order(&self) -> Vec<AgentId> {
        self.shared.gate.queue_snapshot()
    }

    /// Who holds the station entrance at `cell`.
    pub fn entrance_occupant(&self, cell: Cell) -> Option<AgentId> {
        self.shared.gate.occupant(cell)
    }

    /// The entrance `agent` is parked on, waiting for it to free.
    pub fn parked_on(&self, agent: AgentId) -> Option<Cell> {
        self.shared.gate.parked_on(agent)
    }

    /// Courses granted so far, across all trains.
    pub fn courses_granted(&self) -> u64 {
        self.shared.gate.grants()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn join(agent: AgentId, handle: JoinHandle<()>) {
    if handle.join().is_err() {
        warn!(target: "metro-engine", %agent, "train thread panicked");
    }
}
