//! `metro-core` — foundational types for the metro coordination kernel.
//!
//! This crate is a dependency of every other `metro-*` crate.  It has no
//! `metro-*` dependencies and only `thiserror` (plus optional `serde`).
//!
//! # What lives here
//!
//! | Module       | Contents                                                  |
//! |--------------|-----------------------------------------------------------|
//! | [`ids`]      | `AgentId`, `ResourceId`                                   |
//! | [`cell`]     | `Cell`, `Direction`                                       |
//! | [`grid`]     | `TileKind`, `GridMap` (parse, render, station entrances)  |
//! | [`route`]    | `Route` — validated, immutable tile path                  |
//! | [`config`]   | `EngineConfig`                                            |
//! | [`cancel`]   | `CancelToken`, `Cancelled`, `Blocker`                     |
//! | [`error`]    | `CoreError`, `CoreResult`                                 |
//!
//! # Feature flags
//!
//! | Flag    | Effect                                                     |
//! |---------|------------------------------------------------------------|
//! | `serde` | Adds `Serialize`/`Deserialize` to the public value types.  |

pub mod cancel;
pub mod cell;
pub mod config;
pub mod error;
pub mod grid;
pub mod ids;
pub mod route;

#[cfg(test)]
mod tests;

// ── Re-exports ────────────────────────────────────────────────────────────────

pub use cancel::{Blocker, CancelToken, Cancelled};
pub use cell::{Cell, Direction};
pub use config::EngineConfig;
pub use error::{CoreError, CoreResult};
pub use grid::{GridMap, TileKind};
pub use ids::{AgentId, ResourceId};
pub use route::Route;
