//! `metro-gate` — course admission for the metro coordination kernel.
//!
//! # One lock, many conditions
//!
//! The [`Coordinator`] owns the admission queue and the occupancy of every
//! station entrance behind a single `parking_lot::Mutex`.  Waiters sleep on
//! one of several condition variables that all share that mutex:
//!
//! ```text
//!   Mutex<GateState> ─┬─ turn          "the queue head changed"
//!                     ├─ entrance[0]   "entrance 0 was released"
//!                     ├─ entrance[1]
//!                     └─ …
//! ```
//!
//! Because queue and occupancy changes happen under the same guard, a train
//! can never observe "my turn" and "my destination is free" from two
//! different moments.
//!
//! The coordinator is not held while trains move.  Track contention during
//! a course is handled by `metro-track`; the coordinator only learns about
//! it through [`Coordinator::note_track_wait`] so it can recognise a stall.

pub mod admission;
pub mod coordinator;
pub mod error;

#[cfg(test)]
mod tests;

pub use admission::AdmissionQueue;
pub use coordinator::{Coordinator, CourseGrant, GateListener, NoListener, StallReport};
pub use error::{GateError, GateResult};
