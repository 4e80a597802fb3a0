//! Cancellable single-holder lock guarding one physical resource.
//!
//! Holder identity is the [`AgentId`], not the OS thread, so re-acquiring a
//! lock the train already holds is a no-op and releasing a lock held by
//! someone else does nothing.

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use metro_core::{AgentId, Blocker, CancelToken, Cancelled, ResourceId};

#[derive(Debug)]
pub struct TrackLock {
    id:     ResourceId,
    holder: Mutex<Option<AgentId>>,
    freed:  Condvar,
}

impl TrackLock {
    pub fn new(id: ResourceId) -> Self {
        Self {
            id,
            holder: Mutex::new(None),
            freed:  Condvar::new(),
        }
    }

    #[inline]
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Current holder, if any.  Stale as soon as it is returned.
    pub fn holder(&self) -> Option<AgentId> {
        *self.holder.lock()
    }

    /// Take the lock for `agent` if it is free or already held by `agent`.
    pub fn try_acquire(&self, agent: AgentId) -> bool {
        let mut holder = self.holder.lock();
        match *holder {
            None => {
                *holder = Some(agent);
                true
            }
            Some(h) => h == agent,
        }
    }

    /// Block until the lock is held by the token's agent.
    ///
    /// Returns `Ok(true)` if the call had to wait.  The token is checked
    /// under the lock's mutex before every wait; see
    /// [`metro_core::cancel`] for the wake-up protocol.
    pub fn acquire(&self, cancel: &CancelToken) -> Result<bool, Cancelled> {
        let agent = cancel.agent();
        let mut holder = self.holder.lock();
        let mut waited = false;
        loop {
            cancel.check()?;
            match *holder {
                None => {
                    *holder = Some(agent);
                    return Ok(waited);
                }
                Some(h) if h == agent => return Ok(waited),
                Some(h) => {
                    trace!(target: "metro-track", %agent, resource = %self.id, holder = %h, "waiting for track");
                    waited = true;
                    self.freed.wait(&mut holder);
                }
            }
        }
    }

    /// Release the lock if `agent` holds it.  Returns whether it did.
    pub fn release(&self, agent: AgentId) -> bool {
        let mut holder = self.holder.lock();
        if *holder == Some(agent) {
            *holder = None;
            self.freed.notify_all();
            true
        } else {
            false
        }
    }

    /// Wake every waiter so it can re-check its cancellation token.
    pub fn wake_all(&self) {
        let _holder = self.holder.lock();
        self.freed.notify_all();
    }
}

impl Blocker for TrackLock {
    fn is_blocking(&self, waiter: AgentId) -> bool {
        matches!(self.holder(), Some(h) if h != waiter)
    }
}
