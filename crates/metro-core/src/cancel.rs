//! Cooperative cancellation shared by every blocking primitive.
//!
//! # Protocol
//!
//! A waiter checks its token *while holding* the mutex its condition
//! variable waits on, then waits.  The canceller sets the token first and
//! only then locks the same mutex and notifies.  Either the waiter sees the
//! flag before it sleeps, or it is already asleep when the notification
//! arrives; no wake-up is lost.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::AgentId;

/// Returned by any blocking call interrupted by termination.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Error)]
#[error("{0} was cancelled")]
pub struct Cancelled(pub AgentId);

/// Shared, clonable cancellation flag for one train.
#[derive(Clone, Debug)]
pub struct CancelToken {
    agent: AgentId,
    flag:  Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new(agent: AgentId) -> Self {
        Self {
            agent,
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    #[inline]
    pub fn agent(&self) -> AgentId {
        self.agent
    }

    /// Raise the flag.  Idempotent.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// `Err(Cancelled)` once the flag is raised.
    #[inline]
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled(self.agent))
        } else {
            Ok(())
        }
    }
}

/// Something a train can be blocked on.
///
/// Lets the turn coordinator ask, during stall detection, whether a train
/// that reported itself blocked on a track lock is *still* blocked, without
/// depending on the track crate.
pub trait Blocker: Send + Sync {
    /// `true` while another agent holds whatever `waiter` is waiting for.
    fn is_blocking(&self, waiter: AgentId) -> bool;
}
