//! Engine configuration.
//!
//! Typically built in code or loaded from a TOML/JSON file by the
//! application crate (with the `serde` feature) and handed to the engine
//! builder.  Per-train overrides (pacing, admission order) live on the
//! builder, not here.

use std::time::Duration;

/// Default number of wagons per train, head included.
pub const DEFAULT_WAGONS: usize = 3;

/// Default pause between single-tile advances, in milliseconds.
pub const DEFAULT_PACING_MS: u64 = 200;

/// Top-level engine configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Wagons per train.  Clamped per train to its route length, so a train
    /// never sticks out past a terminus.
    pub wagons_per_agent: usize,

    /// Pause between tile-steps for trains without a per-train override.
    pub pacing_ms: u64,

    /// Start every train in the `Paused` state.  Trains then sit at their
    /// start entrance until resumed.
    pub start_paused: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            wagons_per_agent: DEFAULT_WAGONS,
            pacing_ms:        DEFAULT_PACING_MS,
            start_paused:     true,
        }
    }
}

impl EngineConfig {
    /// Default pacing as a `Duration`.
    #[inline]
    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}
