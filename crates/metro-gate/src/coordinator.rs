//! `Coordinator` — admission queue and station gate behind one mutex.
//!
//! # Course life cycle
//!
//! ```text
//!   queued ──(head of queue, destination free)──────────────► in course
//!     │                                                          │
//!     └─(head of queue, destination taken)─► parked ─(freed)────►┤
//!                                                                 │
//!   queued ◄──────────────── end_course (origin freed) ◄─────────┘
//! ```
//!
//! A parked train has already used its turn: it signals `turn` so the next
//! train can evaluate, then waits on its destination entrance and claims it
//! directly once it is released.
//!
//! # Stall detection
//!
//! The coordinator records a [`StallReport`] when nothing can change any
//! more on its own: no queued train is eligible, no train is paused, every
//! train in a course is blocked on a track lock another train holds, no
//! parked train's entrance is free, and at least one train is parked or
//! blocked.  The report is cleared by the next grant, course end, or track
//! acquisition.

use std::fmt;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, MutexGuard};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, warn};

use metro_core::{AgentId, Blocker, CancelToken, Cell};

use crate::{AdmissionQueue, GateError, GateResult};

// ── Public types ──────────────────────────────────────────────────────────────

/// Callbacks the coordinator makes while a train is inside one of its
/// methods.  Always invoked with the coordination lock released.
pub trait GateListener {
    /// `agent` reached the head of the queue but `entrance` is taken.
    fn on_entrance_blocked(&self, _agent: AgentId, _entrance: Cell, _occupant: Option<AgentId>) {}

    /// A new stall was detected.
    fn on_stall(&self, _report: &StallReport) {}
}

/// A [`GateListener`] that ignores everything.
pub struct NoListener;

impl GateListener for NoListener {}

/// Who is stuck, and where, when no train can make progress.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct StallReport {
    /// Parked trains and the entrance each is waiting for, by agent.
    pub parked:        Vec<(AgentId, Cell)>,
    /// Trains blocked on a track lock mid-course, ascending.
    pub track_blocked: Vec<AgentId>,
}

impl fmt::Display for StallReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut sep = "";
        for (agent, cell) in &self.parked {
            write!(f, "{sep}{agent} waits for entrance {cell}")?;
            sep = ", ";
        }
        for agent in &self.track_blocked {
            write!(f, "{sep}{agent} waits for track")?;
            sep = ", ";
        }
        Ok(())
    }
}

/// Returned by [`Coordinator::begin_course`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CourseGrant {
    /// Running count of grants across all trains, starting at 1.
    pub turn:   u64,
    /// `true` if the train had to park on its destination entrance.
    pub waited: bool,
}

// ── State ─────────────────────────────────────────────────────────────────────

#[derive(Copy, Clone, Debug)]
struct Slot {
    cell:     Cell,
    occupant: Option<AgentId>,
}

impl Slot {
    #[inline]
    fn admits(&self, agent: AgentId) -> bool {
        self.occupant.is_none_or(|o| o == agent)
    }
}

struct GateState {
    queue:         AdmissionQueue,
    slots:         Vec<Slot>,
    in_course:     FxHashSet<AgentId>,
    /// Parked train → index of the entrance slot it waits for.
    parked:        FxHashMap<AgentId, usize>,
    track_blocked: FxHashMap<AgentId, Arc<dyn Blocker>>,
    idle:          FxHashSet<AgentId>,
    retired:       FxHashSet<AgentId>,
    stall:         Option<StallReport>,
    grants:        u64,
}

impl GateState {
    fn next_eligible(&self) -> Option<AgentId> {
        self.queue.first_eligible(|a| !self.idle.contains(&a))
    }

    /// Give `slot` to `agent` if it is free or already `agent`'s.
    fn claim(&mut self, slot: usize, agent: AgentId) -> bool {
        if !self.slots[slot].admits(agent) {
            return false;
        }
        self.slots[slot].occupant = Some(agent);
        true
    }

    /// Free `slot` if `agent` holds it.
    fn free(&mut self, slot: usize, agent: AgentId) -> bool {
        if self.slots[slot].occupant != Some(agent) {
            return false;
        }
        self.slots[slot].occupant = None;
        self.stall = None;
        true
    }

    /// Record a course for `agent`, which already holds its destination.
    fn grant(&mut self, agent: AgentId, waited: bool) -> CourseGrant {
        self.in_course.insert(agent);
        self.grants += 1;
        self.stall = None;
        CourseGrant { turn: self.grants, waited }
    }

    fn detect_stall(&self) -> Option<StallReport> {
        if !self.idle.is_empty() || self.next_eligible().is_some() {
            return None;
        }
        if self.parked.is_empty() && self.track_blocked.is_empty() {
            return None;
        }
        let stuck_on_track = |a: &AgentId| {
            self.track_blocked.get(a).is_some_and(|b| b.is_blocking(*a))
        };
        if !self.in_course.iter().all(stuck_on_track) {
            return None;
        }
        if self.parked.iter().any(|(&a, &s)| self.slots[s].admits(a)) {
            return None;
        }

        let mut parked: Vec<(AgentId, Cell)> = self
            .parked
            .iter()
            .map(|(&a, &s)| (a, self.slots[s].cell))
            .collect();
        parked.sort_unstable();
        let mut track_blocked: Vec<AgentId> = self.track_blocked.keys().copied().collect();
        track_blocked.sort_unstable();
        Some(StallReport { parked, track_blocked })
    }

    /// Re-evaluate the stall; returns the report only if it is new.
    fn refresh_stall(&mut self) -> Option<StallReport> {
        let now = self.detect_stall();
        let fresh = now.is_some() && self.stall.is_none();
        self.stall = now;
        if fresh {
            let report = self.stall.clone();
            if let Some(r) = &report {
                warn!(target: "metro-gate", "no possible move: {r}");
            }
            report
        } else {
            None
        }
    }

    fn free_slots_of(&mut self, agent: AgentId) -> Vec<usize> {
        let mut freed = Vec::new();
        for (i, slot) in self.slots.iter_mut().enumerate() {
            if slot.occupant == Some(agent) {
                slot.occupant = None;
                freed.push(i);
            }
        }
        freed
    }
}

// ── Coordinator ───────────────────────────────────────────────────────────────

pub struct Coordinator {
    state:     Mutex<GateState>,
    turn:      Condvar,
    /// One condition per entrance slot, all on `state`'s mutex.
    entrances: Vec<Condvar>,
    index:     FxHashMap<Cell, usize>,
}

impl Coordinator {
    /// Create a coordinator for the given station entrances.
    ///
    /// `order` is the initial admission order.  Each `(agent, cell)` in
    /// `occupied` pre-marks an entrance as held, normally the entrance every
    /// train starts on.
    pub fn new(
        entrances: &[Cell],
        order:     impl IntoIterator<Item = AgentId>,
        occupied:  &[(AgentId, Cell)],
    ) -> GateResult<Self> {
        let mut index = FxHashMap::default();
        let mut slots = Vec::with_capacity(entrances.len());
        for &cell in entrances {
            if !index.contains_key(&cell) {
                index.insert(cell, slots.len());
                slots.push(Slot { cell, occupant: None });
            }
        }

        for &(agent, cell) in occupied {
            let &i = index.get(&cell).ok_or(GateError::UnknownEntrance(cell))?;
            if let Some(first) = slots[i].occupant.filter(|&first| first != agent) {
                return Err(GateError::DuplicateOccupant { cell, first, second: agent });
            }
            slots[i].occupant = Some(agent);
        }

        let entrances = (0..slots.len()).map(|_| Condvar::new()).collect();
        Ok(Self {
            state: Mutex::new(GateState {
                queue:         AdmissionQueue::from_order(order),
                slots,
                in_course:     FxHashSet::default(),
                parked:        FxHashMap::default(),
                track_blocked: FxHashMap::default(),
                idle:          FxHashSet::default(),
                retired:       FxHashSet::default(),
                stall:         None,
                grants:        0,
            }),
            turn: Condvar::new(),
            entrances,
            index,
        })
    }

    fn slot_index(&self, cell: Cell) -> GateResult<usize> {
        self.index.get(&cell).copied().ok_or(GateError::UnknownEntrance(cell))
    }

    /// Free `slot` for `agent` and wake the trains waiting on it.
    fn vacate(&self, state: &mut GateState, slot: usize, agent: AgentId) -> bool {
        let freed = state.free(slot, agent);
        if freed {
            self.entrances[slot].notify_all();
        }
        freed
    }

    // ── Station gate ──────────────────────────────────────────────────────

    /// Block until `entrance` is free or already held by `agent`, then mark
    /// it held by `agent`.  Returns whether the call had to wait.
    pub fn reserve(&self, agent: AgentId, entrance: Cell, cancel: &CancelToken) -> GateResult<bool> {
        let slot = self.slot_index(entrance)?;
        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            cancel.check()?;
            if state.claim(slot, agent) {
                return Ok(waited);
            }
            waited = true;
            self.entrances[slot].wait(&mut state);
        }
    }

    /// Free `entrance` if `agent` holds it and wake its waiters.
    pub fn release(&self, agent: AgentId, entrance: Cell) -> GateResult<bool> {
        let slot = self.slot_index(entrance)?;
        let mut state = self.state.lock();
        Ok(self.vacate(&mut state, slot, agent))
    }

    // ── Courses ───────────────────────────────────────────────────────────

    /// Block until `agent` may start a course towards `destination`.
    ///
    /// Waits for the agent's turn (first eligible queue entry), dequeues it
    /// and claims `destination`.  If the destination is taken the agent
    /// parks on it, lets the next train evaluate, and claims it directly
    /// once released.
    pub fn begin_course(
        &self,
        agent:       AgentId,
        destination: Cell,
        cancel:      &CancelToken,
        listener:    &dyn GateListener,
    ) -> GateResult<CourseGrant> {
        let target = self.slot_index(destination)?;
        let mut state = self.state.lock();
        let mut waited = false;
        loop {
            cancel.check()?;
            if state.retired.contains(&agent) {
                return Err(GateError::Retired(agent));
            }

            if let Some(&slot) = state.parked.get(&agent) {
                if state.claim(slot, agent) {
                    state.parked.remove(&agent);
                    let grant = state.grant(agent, waited);
                    debug!(target: "metro-gate", %agent, turn = grant.turn, "parked train claims its entrance");
                    return Ok(grant);
                }
                self.entrances[slot].wait(&mut state);
                continue;
            }

            if !state.queue.contains(agent) {
                return Err(GateError::NotQueued(agent));
            }
            if state.next_eligible() != Some(agent) {
                self.turn.wait(&mut state);
                continue;
            }

            state.queue.remove(agent);
            if state.claim(target, agent) {
                let grant = state.grant(agent, waited);
                self.turn.notify_all();
                debug!(target: "metro-gate", %agent, turn = grant.turn, %destination, "course granted");
                return Ok(grant);
            }

            waited = true;
            state.parked.insert(agent, target);
            self.turn.notify_all();
            let occupant = state.slots[target].occupant;
            debug!(target: "metro-gate", %agent, %destination, "destination taken, parking");
            let stall = state.refresh_stall();
            MutexGuard::unlocked(&mut state, || {
                listener.on_entrance_blocked(agent, destination, occupant);
                if let Some(report) = &stall {
                    listener.on_stall(report);
                }
            });
        }
    }

    /// Finish `agent`'s course: free `origin`, requeue at the tail, and let
    /// the next train evaluate.
    pub fn end_course(&self, agent: AgentId, origin: Cell) -> GateResult<()> {
        let slot = self.slot_index(origin)?;
        let mut state = self.state.lock();
        if !state.in_course.remove(&agent) {
            return Err(GateError::NotInCourse(agent));
        }
        state.track_blocked.remove(&agent);
        self.vacate(&mut state, slot, agent);
        state.queue.push_back(agent);
        state.stall = None;
        self.turn.notify_all();
        Ok(())
    }

    // ── Pause / retire ────────────────────────────────────────────────────

    /// Mark `agent` paused: it keeps its queue place but is skipped.
    pub fn withdraw(&self, agent: AgentId) {
        let mut state = self.state.lock();
        if state.idle.insert(agent) {
            state.stall = None;
            self.turn.notify_all();
        }
    }

    /// Undo [`withdraw`](Self::withdraw).
    pub fn rejoin(&self, agent: AgentId) {
        let mut state = self.state.lock();
        if state.idle.remove(&agent) {
            self.turn.notify_all();
        }
    }

    /// Remove a terminated train from every table and free its entrances.
    pub fn retire(&self, agent: AgentId, listener: &dyn GateListener) {
        let mut state = self.state.lock();
        state.queue.remove(agent);
        state.in_course.remove(&agent);
        state.parked.remove(&agent);
        state.track_blocked.remove(&agent);
        state.idle.remove(&agent);
        state.retired.insert(agent);
        for slot in state.free_slots_of(agent) {
            self.entrances[slot].notify_all();
        }
        self.turn.notify_all();
        debug!(target: "metro-gate", %agent, "retired");

        if let Some(report) = state.refresh_stall() {
            MutexGuard::unlocked(&mut state, || listener.on_stall(&report));
        }
    }

    // ── Track contention ──────────────────────────────────────────────────

    /// Record that `agent` is (with `Some`) or is no longer (with `None`)
    /// waiting on a track lock mid-course.
    pub fn note_track_wait(
        &self,
        agent:    AgentId,
        blocker:  Option<Arc<dyn Blocker>>,
        listener: &dyn GateListener,
    ) {
        let mut state = self.state.lock();
        match blocker {
            Some(blocker) => {
                state.track_blocked.insert(agent, blocker);
                if let Some(report) = state.refresh_stall() {
                    MutexGuard::unlocked(&mut state, || listener.on_stall(&report));
                }
            }
            None => {
                if state.track_blocked.remove(&agent).is_some() {
                    state.stall = None;
                }
            }
        }
    }

    // ── Inspection ────────────────────────────────────────────────────────

    /// The current stall, if the last evaluation found one.
    pub fn current_stall(&self) -> Option<StallReport> {
        self.state.lock().stall.clone()
    }

    /// Who holds `entrance`.  `None` for free or unknown entrances.
    pub fn occupant(&self, entrance: Cell) -> Option<AgentId> {
        let slot = self.index.get(&entrance)?;
        self.state.lock().slots[*slot].occupant
    }

    /// The entrance `agent` is parked on, if any.
    pub fn parked_on(&self, agent: AgentId) -> Option<Cell> {
        let state = self.state.lock();
        state.parked.get(&agent).map(|&s| state.slots[s].cell)
    }

    pub fn queue_snapshot(&self) -> Vec<AgentId> {
        self.state.lock().queue.iter().collect()
    }

    /// Courses granted so far, across all trains.
    pub fn grants(&self) -> u64 {
        self.state.lock().grants
    }

    /// Wake every waiter on every condition so it re-checks its token.
    pub fn wake_all(&self) {
        let _state = self.state.lock();
        self.turn.notify_all();
        for cv in &self.entrances {
            cv.notify_all();
        }
    }
}
