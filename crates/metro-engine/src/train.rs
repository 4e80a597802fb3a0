//! The per-train movement loop.
//!
//! # State machine
//!
//! ```text
//!            resume                       cancel (any suspension point)
//!   Paused ─────────► Moving ──────────────────────────────► Terminated
//!      ▲                 │
//!      └──── pause ──────┘   (between tile-steps only)
//! ```
//!
//! # One course
//!
//! ```text
//! begin_course(destination)                 coordinator turn + entrance
//! for each target on the leg:
//!     checkpoint                            pause / cancel
//!     acquire track resources on target     ascending ResourceId
//!     step                                  grid write lock
//!     release segments the chain has left
//!     pace                                  cancellable sleep
//! release crossings the chain has left
//! end_course(origin)                        requeue at the tail
//! reverse the chain, flip direction
//! ```

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, info, warn};

use metro_core::{AgentId, Blocker, CancelToken, Cancelled, Cell, Direction, GridMap, ResourceId, Route, TileKind};
use metro_track::ResourceKind;

use crate::engine::Shared;
use crate::{BlockReason, EngineError, EngineResult};

// ── Phase and control ─────────────────────────────────────────────────────────

/// Observable state of one train.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AgentPhase {
    Paused,
    Moving,
    Terminated,
}

struct ControlState {
    pause_requested: bool,
    phase:           AgentPhase,
}

/// The control surface's handle on one train thread.
pub(crate) struct TrainControl {
    state:     Mutex<ControlState>,
    changed:   Condvar,
    pacing_ms: AtomicU64,
    cancel:    CancelToken,
}

impl TrainControl {
    pub(crate) fn new(agent: AgentId, pacing: Duration, start_paused: bool) -> Self {
        Self {
            state: Mutex::new(ControlState {
                pause_requested: start_paused,
                phase:           if start_paused { AgentPhase::Paused } else { AgentPhase::Moving },
            }),
            changed:   Condvar::new(),
            pacing_ms: AtomicU64::new(pacing.as_millis() as u64),
            cancel:    CancelToken::new(agent),
        }
    }

    #[inline]
    pub(crate) fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub(crate) fn phase(&self) -> AgentPhase {
        self.state.lock().phase
    }

    /// Idempotent.
    pub(crate) fn request_pause(&self) {
        self.state.lock().pause_requested = true;
    }

    /// Idempotent; a no-op on a train that is not paused.
    pub(crate) fn request_resume(&self) {
        let mut state = self.state.lock();
        if state.pause_requested {
            state.pause_requested = false;
            self.changed.notify_all();
        }
    }

    pub(crate) fn set_pacing(&self, pacing: Duration) {
        self.pacing_ms.store(pacing.as_millis() as u64, Ordering::Relaxed);
    }

    pub(crate) fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.load(Ordering::Relaxed))
    }

    /// Raise the cancel flag, then notify under the control mutex.
    pub(crate) fn terminate(&self) {
        self.cancel.cancel();
        let _state = self.state.lock();
        self.changed.notify_all();
    }

    /// `true` if a pause is pending; otherwise the train is marked moving.
    fn pause_pending(&self) -> bool {
        let mut state = self.state.lock();
        if !state.pause_requested {
            state.phase = AgentPhase::Moving;
        }
        state.pause_requested
    }

    fn set_phase(&self, phase: AgentPhase) {
        self.state.lock().phase = phase;
    }

    /// Sleep while a pause is requested.
    fn wait_while_paused(&self) -> Result<(), Cancelled> {
        let mut state = self.state.lock();
        state.phase = AgentPhase::Paused;
        while state.pause_requested {
            self.cancel.check()?;
            self.changed.wait(&mut state);
        }
        self.cancel.check()?;
        state.phase = AgentPhase::Moving;
        Ok(())
    }

    /// Sleep for the pacing interval; cancellation cuts it short.
    fn pace(&self) -> Result<(), Cancelled> {
        let deadline = Instant::now() + self.pacing();
        let mut state = self.state.lock();
        loop {
            self.cancel.check()?;
            if self.changed.wait_until(&mut state, deadline).timed_out() {
                return self.cancel.check();
            }
        }
    }
}

// ── Train ─────────────────────────────────────────────────────────────────────

/// State owned by one train thread.
pub(crate) struct Train {
    agent:     AgentId,
    route:     Arc<Route>,
    /// Head first.  Always a contiguous window of the route.
    wagons:    Vec<Cell>,
    direction: Direction,
    held:      BTreeSet<ResourceId>,
    shared:    Arc<Shared>,
    control:   Arc<TrainControl>,
}

impl Train {
    /// `wagons` and `held` come from the builder, which laid the train out
    /// on its start entrance and took the resources under it.
    pub(crate) fn new(
        agent:   AgentId,
        route:   Arc<Route>,
        wagons:  Vec<Cell>,
        held:    BTreeSet<ResourceId>,
        shared:  Arc<Shared>,
        control: Arc<TrainControl>,
    ) -> Self {
        Self {
            agent,
            route,
            wagons,
            direction: Direction::Forward,
            held,
            shared,
            control,
        }
    }

    /// Thread body.  Runs until cancelled, then cleans up.
    pub(crate) fn run(mut self) {
        info!(target: "metro-engine", agent = %self.agent, wagons = self.wagons.len(), "train started");
        match self.drive() {
            Err(EngineError::Cancelled(_)) | Err(EngineError::Gate(metro_gate::GateError::Cancelled(_))) => {
                debug!(target: "metro-engine", agent = %self.agent, "cancelled");
            }
            Err(e) => warn!(target: "metro-engine", agent = %self.agent, "train stopped: {e}"),
            Ok(()) => {}
        }
        self.clean_up();
    }

    fn drive(&mut self) -> EngineResult<()> {
        loop {
            self.checkpoint()?;
            self.run_course()?;
        }
    }

    /// Honour a pending pause or cancellation.  While paused the train keeps
    /// its admission place but is skipped.
    fn checkpoint(&self) -> Result<(), Cancelled> {
        self.control.cancel_token().check()?;
        if !self.control.pause_pending() {
            return Ok(());
        }
        debug!(target: "metro-engine", agent = %self.agent, "paused");
        self.shared.gate.withdraw(self.agent);
        let resumed = self.control.wait_while_paused();
        self.shared.gate.rejoin(self.agent);
        resumed
    }

    fn run_course(&mut self) -> EngineResult<()> {
        let path = self.route.oriented(self.direction);
        let (origin, destination) = self.route.termini(self.direction);

        let grant = self.shared.gate.begin_course(
            self.agent,
            destination,
            self.control.cancel_token(),
            &*self.shared,
        )?;
        debug!(
            target: "metro-engine",
            agent = %self.agent,
            direction = %self.direction,
            turn = grant.turn,
            "course begins"
        );
        self.shared.observer.on_course_begin(self.agent, self.direction, grant.turn);

        for &target in &path[self.wagons.len()..] {
            self.checkpoint()?;
            self.acquire_for(target)?;
            self.step(target);
            self.release_uncovered(true);
            self.control.pace()?;
        }

        self.release_uncovered(false);
        self.shared.gate.end_course(self.agent, origin)?;
        self.shared.stats.course(self.agent);
        self.shared.observer.on_course_end(self.agent, self.direction);
        debug!(target: "metro-engine", agent = %self.agent, %destination, "course complete");

        self.wagons.reverse();
        self.direction = self.direction.flip();
        Ok(())
    }

    /// Take every resource of this train's own views that covers `target`
    /// and is not already held, in ascending id order.
    fn acquire_for(&mut self, target: Cell) -> EngineResult<()> {
        let shared = Arc::clone(&self.shared);
        for id in shared.table.covering(self.agent, target) {
            if self.held.contains(&id) {
                continue;
            }
            let Some(lock) = shared.table.lock(id) else {
                continue;
            };
            if !lock.try_acquire(self.agent) {
                shared.stats.track_wait();
                let holder = lock.holder();
                debug!(target: "metro-engine", agent = %self.agent, resource = %id, "track taken, waiting");
                shared.observer.on_blocked(self.agent, BlockReason::Track { resource: id, holder });

                let blocker: Arc<dyn Blocker> = lock.clone();
                shared.gate.note_track_wait(self.agent, Some(blocker), &*shared);
                let acquired = lock.acquire(self.control.cancel_token());
                shared.gate.note_track_wait(self.agent, None, &*shared);
                acquired?;
            }
            self.held.insert(id);
        }
        Ok(())
    }

    /// One shift-register advance under the grid write lock.
    fn step(&mut self, target: Cell) {
        let agent = self.agent;
        let mine = TileKind::Agent(agent);
        let wagons = &mut self.wagons;

        let collided: Vec<(Cell, AgentId)> = self.shared.monitor.write(|grid| {
            erase(grid, wagons.as_slice(), mine);
            for i in (1..wagons.len()).rev() {
                let ahead = wagons[i - 1];
                wagons[i].move_to(ahead);
            }
            wagons[0].move_to(target);

            let mut collided = Vec::new();
            for &w in wagons.iter() {
                if let Ok(TileKind::Agent(other)) = grid.set(w, mine) {
                    if other != agent {
                        collided.push((w, other));
                    }
                }
            }
            collided
        });

        for &(cell, other) in &collided {
            warn!(target: "metro-engine", %agent, %other, %cell, "collision");
        }
        if !collided.is_empty() {
            self.shared.stats.collision(collided.len() as u64);
        }
        self.shared.stats.step(agent);
        self.shared.observer.on_step(agent, target);
    }

    /// Release held resources no wagon covers any more.  With
    /// `segments_only`, crossings are kept until the course ends.
    fn release_uncovered(&mut self, segments_only: bool) {
        let agent = self.agent;
        let table = &self.shared.table;
        let wagons = &self.wagons;
        self.held.retain(|&id| {
            let Some(resource) = table.resource(id) else {
                return false;
            };
            if segments_only && resource.kind() != ResourceKind::Segment {
                return true;
            }
            if wagons.iter().any(|&w| resource.contains(w)) {
                return true;
            }
            if let Some(lock) = table.lock(id) {
                lock.release(agent);
            }
            false
        });
    }

    /// Erase the footprint, drop every lock and leave the coordinator.
    fn clean_up(&mut self) {
        let agent = self.agent;
        let mine = TileKind::Agent(agent);
        let wagons = &self.wagons;
        self.shared.monitor.write(|grid| erase(grid, wagons, mine));

        for id in std::mem::take(&mut self.held) {
            if let Some(lock) = self.shared.table.lock(id) {
                lock.release(agent);
            }
        }
        self.shared.gate.retire(agent, &*self.shared);
        self.control.set_phase(AgentPhase::Terminated);
        info!(target: "metro-engine", %agent, "train terminated");
        self.shared.observer.on_terminated(agent);
    }
}

/// Clear `mine` from every wagon cell that still shows it.  Wagon cells are
/// route cells, which the builder checked are on the map.
fn erase(grid: &mut GridMap, wagons: &[Cell], mine: TileKind) {
    for &w in wagons {
        if grid.get(w) == Some(mine) {
            let erased = grid.set(w, TileKind::Empty);
            debug_assert!(erased.is_ok(), "wagon off the map at {w}");
        }
    }
}
