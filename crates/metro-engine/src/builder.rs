//! Fluent builder for constructing an [`Engine`].

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::info;

use metro_core::{AgentId, Cell, EngineConfig, GridMap, ResourceId, Route, TileKind};
use metro_gate::Coordinator;
use metro_track::ResourceTable;

use crate::engine::Shared;
use crate::monitor::GridMonitor;
use crate::stats::EngineStats;
use crate::train::{Train, TrainControl};
use crate::{Engine, EngineError, EngineObserver, EngineResult, NoopObserver};

/// Fluent builder for [`Engine`].
///
/// # Required inputs
///
/// - [`GridMap`] — the tunnel map; stations and walls are read from it.
/// - `Vec<Route>` — one route per train; `routes[i]` belongs to
///   `AgentId(i)`.  Both ends must be station entrances.
///
/// # Optional inputs (have defaults)
///
/// | Method                  | Default                             |
/// |-------------------------|-------------------------------------|
/// | `.config(c)`            | `EngineConfig::default()`           |
/// | `.wagons(n)`            | `config.wagons_per_agent` (3)       |
/// | `.pacing(d)`            | `config.pacing_ms` (200 ms)         |
/// | `.pacings(v)`           | `config.pacing_ms` for every train  |
/// | `.start_paused(b)`      | `config.start_paused` (`true`)      |
/// | `.admission_order(v)`   | `A, B, C, …`                        |
/// | `.observer(o)`          | `NoopObserver`                      |
///
/// # Example
///
/// ```rust,ignore
/// let engine = EngineBuilder::new(GridMap::metro(), routes)
///     .pacing(Duration::from_millis(50))
///     .admission_order(vec![AgentId(2), AgentId(0), AgentId(1)])
///     .start_paused(false)
///     .build()?;
/// ```
pub struct EngineBuilder {
    grid:     GridMap,
    routes:   Vec<Route>,
    config:   EngineConfig,
    pacings:  Option<Vec<Duration>>,
    order:    Option<Vec<AgentId>>,
    observer: Option<Arc<dyn EngineObserver>>,
}

impl EngineBuilder {
    /// Create a builder with all required inputs.
    pub fn new(grid: GridMap, routes: Vec<Route>) -> Self {
        Self {
            grid,
            routes,
            config:   EngineConfig::default(),
            pacings:  None,
            order:    None,
            observer: None,
        }
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Wagons per train, head included.  Trains on routes shorter than this
    /// get one wagon per route cell.
    pub fn wagons(mut self, wagons: usize) -> Self {
        self.config.wagons_per_agent = wagons;
        self
    }

    /// Pacing for every train without a per-train override.
    pub fn pacing(mut self, pacing: Duration) -> Self {
        self.config.pacing_ms = pacing.as_millis() as u64;
        self
    }

    /// Per-train pacing (must be length `routes.len()`).
    pub fn pacings(mut self, pacings: Vec<Duration>) -> Self {
        self.pacings = Some(pacings);
        self
    }

    pub fn start_paused(mut self, paused: bool) -> Self {
        self.config.start_paused = paused;
        self
    }

    /// Initial admission queue.  Must list every train exactly once.
    pub fn admission_order(mut self, order: Vec<AgentId>) -> Self {
        self.order = Some(order);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn EngineObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Validate inputs, lay every train out on its start entrance, derive
    /// the resource table, and spawn one thread per train.
    ///
    /// Nothing is spawned unless every check passes.
    pub fn build(self) -> EngineResult<Engine> {
        let count = self.routes.len();

        // ── Validate scalar and per-train inputs ──────────────────────────
        if count == 0 {
            return Err(EngineError::NoAgents);
        }
        let wagons = self.config.wagons_per_agent;
        if wagons == 0 {
            return Err(EngineError::ZeroWagons);
        }

        let pacings = match self.pacings {
            Some(p) => {
                if p.len() != count {
                    return Err(EngineError::AgentCountMismatch {
                        expected: count,
                        got:      p.len(),
                        what:     "pacings",
                    });
                }
                p
            }
            None => vec![self.config.pacing(); count],
        };

        let order = match self.order {
            Some(o) => {
                validate_order(&o, count)?;
                o
            }
            None => (0..count).map(agent).collect(),
        };

        // ── Validate routes against the map ───────────────────────────────
        let mut grid = self.grid;
        let stale: Vec<Cell> = grid
            .iter()
            .filter(|&(_, tile)| matches!(tile, TileKind::Agent(_)))
            .map(|(cell, _)| cell)
            .collect();
        for cell in stale {
            grid.set(cell, TileKind::Empty)?;
        }

        let entrances = grid.station_entrances();
        let mut starts: FxHashMap<Cell, AgentId> = FxHashMap::default();
        for (i, route) in self.routes.iter().enumerate() {
            let agent = agent(i);
            if let Some(&cell) = route.cells().iter().find(|&&c| !grid.is_passable(c)) {
                return Err(EngineError::Impassable { agent, cell });
            }
            for cell in [route.start(), route.end()] {
                if !entrances.contains(&cell) {
                    return Err(EngineError::NotAnEntrance { agent, cell });
                }
            }
            if let Some(&first) = starts.get(&route.start()) {
                return Err(EngineError::DuplicateStart { cell: route.start(), first, second: agent });
            }
            starts.insert(route.start(), agent);
        }

        // ── Initial wagon windows: head on route[n-1], tail on route[0] ───
        let windows: Vec<Vec<Cell>> = self
            .routes
            .iter()
            .map(|r| r.cells()[..wagons.min(r.len())].iter().rev().copied().collect())
            .collect();

        let mut placed: FxHashMap<Cell, AgentId> = FxHashMap::default();
        for (i, window) in windows.iter().enumerate() {
            for &cell in window {
                if let Some(first) = placed.insert(cell, agent(i)) {
                    return Err(EngineError::OverlappingStart { cell, first, second: agent(i) });
                }
            }
        }

        // ── Resources, and the locks under every starting chain ───────────
        let table = ResourceTable::build(&self.routes);
        let mut held: Vec<BTreeSet<ResourceId>> = vec![BTreeSet::new(); count];
        for (i, window) in windows.iter().enumerate() {
            let agent = agent(i);
            for &cell in window {
                for id in table.covering(agent, cell) {
                    let Some(lock) = table.lock(id) else {
                        continue;
                    };
                    if !lock.try_acquire(agent) {
                        return Err(EngineError::ContestedStart {
                            resource: id,
                            first:    lock.holder().unwrap_or(agent),
                            second:   agent,
                        });
                    }
                    held[i].insert(id);
                }
            }
        }

        for (i, window) in windows.iter().enumerate() {
            for &cell in window {
                grid.set(cell, TileKind::Agent(agent(i)))?;
            }
        }

        let occupied: Vec<(AgentId, Cell)> = self
            .routes
            .iter()
            .enumerate()
            .map(|(i, r)| (agent(i), r.start()))
            .collect();
        let gate = Coordinator::new(&entrances, order.iter().copied(), &occupied)?;

        // ── Assemble and spawn ────────────────────────────────────────────
        let observer = self
            .observer
            .unwrap_or_else(|| Arc::new(NoopObserver) as Arc<dyn EngineObserver>);
        let shared = Arc::new(Shared {
            monitor:  GridMonitor::new(grid),
            table,
            gate,
            stats:    EngineStats::new(count),
            observer,
        });
        let start_paused = self.config.start_paused;
        let engine = Engine {
            shared,
            routes:   self.routes.into_iter().map(Arc::new).collect(),
            controls: pacings
                .iter()
                .enumerate()
                .map(|(i, &p)| Arc::new(TrainControl::new(agent(i), p, start_paused)))
                .collect(),
            handles:  Mutex::new(Vec::with_capacity(count)),
        };

        info!(
            target: "metro-engine",
            trains = count,
            resources = engine.shared.table.len(),
            entrances = entrances.len(),
            start_paused,
            "engine built"
        );

        // On a spawn failure `engine` is dropped, which stops the trains
        // already running.
        for (i, (window, held)) in windows.into_iter().zip(held).enumerate() {
            let agent = agent(i);
            let train = Train::new(
                agent,
                Arc::clone(&engine.routes[i]),
                window,
                held,
                Arc::clone(&engine.shared),
                Arc::clone(&engine.controls[i]),
            );
            let handle = thread::Builder::new()
                .name(agent.to_string())
                .spawn(move || train.run())?;
            engine.handles.lock().push(Some(handle));
        }

        Ok(engine)
    }
}

#[inline]
fn agent(i: usize) -> AgentId {
    AgentId(i as u32)
}

fn validate_order(order: &[AgentId], count: usize) -> EngineResult<()> {
    let mut seen = vec![false; count];
    for &a in order {
        let Some(slot) = seen.get_mut(a.index()) else {
            return Err(EngineError::UnknownAgent(a));
        };
        if *slot {
            return Err(EngineError::Config(format!("{a} is listed twice in the admission order")));
        }
        *slot = true;
    }
    if order.len() != count {
        return Err(EngineError::AgentCountMismatch {
            expected: count,
            got:      order.len(),
            what:     "admission order",
        });
    }
    Ok(())
}
