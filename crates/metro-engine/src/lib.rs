//! `metro-engine` — thread-per-train movement over a shared tunnel map.
//!
//! # Layers
//!
//! ```text
//!   Engine (control surface)
//!     │  pause / resume / set_pacing / terminate / snapshot / status
//!     ▼
//!   train threads ── begin_course / end_course ──► metro-gate::Coordinator
//!     │          └── acquire / release ─────────► metro-track::TrackLock
//!     ▼
//!   GridMonitor (RwLock<GridMap>) ◄── snapshot readers
//! ```
//!
//! Admission is serialized by the coordinator; once a course is granted the
//! train moves under per-resource track locks only, so trains on disjoint
//! track run in parallel.
//!
//! # Quick-start
//!
//! ```rust,ignore
//! use metro_core::{GridMap, Route};
//! use metro_engine::EngineBuilder;
//!
//! let engine = EngineBuilder::new(GridMap::metro(), routes)
//!     .start_paused(false)
//!     .build()?;
//! std::thread::sleep(std::time::Duration::from_secs(3));
//! println!("{}", engine.snapshot());
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod observer;
pub mod stats;
pub mod train;


pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::{EngineError, EngineResult};
pub use metro_gate::StallReport;
pub use monitor::GridView;
pub use observer::{BlockReason, EngineObserver, NoopObserver};
pub use stats::{EngineStatus, StatsSnapshot};
pub use train::AgentPhase;
