//! `metro-track` — physical track resources shared between train routes.
//!
//! # Model
//!
//! Two routes *share* a run of cells when the cells are consecutive in both
//! routes.  A shared run of one cell is a **crossing**; a longer run is a
//! **segment**.  Every physical run is registered once, keyed by its
//! cells, and gets exactly one [`TrackLock`]:
//!
//! ```text
//!   train A  ──►  (2,1) (2,2) (2,3) (2,4)
//!   train B       (2,1) (2,2) (2,3) (2,4)  ◄──
//!                 └──────── R0 ────────┘    ends {(2,1),(2,4)}
//! ```
//!
//! A walks R0 from `(2,1)` to `(2,4)`, B from `(2,4)` to `(2,1)`; both views
//! resolve to `R0` and therefore to the same lock.
//!
//! | Module       | Contents                                         |
//! |--------------|--------------------------------------------------|
//! | [`resource`] | `ResourceKey`, `ResourceKind`, `Resource`, `ResourceView` |
//! | [`table`]    | `ResourceTable` — built once from all routes     |
//! | [`lock`]     | `TrackLock` — cancellable single-holder lock     |

pub mod lock;
pub mod resource;
pub mod table;


pub use lock::TrackLock;
pub use resource::{Resource, ResourceKey, ResourceKind, ResourceView};
pub use table::ResourceTable;
