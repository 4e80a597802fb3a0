//! `AdmissionQueue` — round-robin order in which trains may begin a course.
//!
//! A train leaves the queue when it is granted a turn and rejoins at the
//! tail when its course ends, so with no contention every train gets exactly
//! one course per rotation.  Paused trains keep their place; the coordinator
//! skips them with [`first_eligible`](AdmissionQueue::first_eligible).

use std::collections::VecDeque;

use metro_core::AgentId;

#[derive(Clone, Debug, Default)]
pub struct AdmissionQueue {
    order: VecDeque<AgentId>,
}

impl AdmissionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue in the given order; later duplicates are dropped.
    pub fn from_order(order: impl IntoIterator<Item = AgentId>) -> Self {
        let mut queue = Self::new();
        for agent in order {
            queue.push_back(agent);
        }
        queue
    }

    /// Append `agent` at the tail.  A train is never queued twice; returns
    /// `false` if it already was.
    pub fn push_back(&mut self, agent: AgentId) -> bool {
        if self.contains(agent) {
            return false;
        }
        self.order.push_back(agent);
        true
    }

    /// Remove `agent` wherever it is.  Returns whether it was queued.
    pub fn remove(&mut self, agent: AgentId) -> bool {
        match self.order.iter().position(|&a| a == agent) {
            Some(i) => {
                self.order.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn contains(&self, agent: AgentId) -> bool {
        self.order.contains(&agent)
    }

    /// First queued train for which `eligible` holds.
    pub fn first_eligible(&self, mut eligible: impl FnMut(AgentId) -> bool) -> Option<AgentId> {
        self.order.iter().copied().find(|&a| eligible(a))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AgentId> + '_ {
        self.order.iter().copied()
    }
}
