//! `ResourceTable` — every shared run, computed once from all routes.
//!
//! # Algorithm
//!
//! For every ordered pair of distinct trains `(a, b)`, walk `a`'s route
//! once.  A run starts at a cell `b` also visits and extends while the next
//! cell of `a` is the cell before or after the current one in `b`'s route.
//! Requiring adjacency in *both* routes makes the relation symmetric: `a`'s
//! run against `b` and `b`'s run against `a` are the same cell chain, so
//! they meet in the registry under one entry.
//!
//! The registry is keyed by the run's sorted cell chain, not by its
//! endpoints alone: two different paths between the same pair of cells are
//! two physical resources with two locks.
//!
//! Ids are assigned in discovery order (train `a` ascending, then `b`, then
//! route order), which makes them deterministic for a given route set.
//! Acquiring in ascending id order is the global lock order.

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

use metro_core::{AgentId, Cell, ResourceId, Route};

use crate::{Resource, ResourceKey, ResourceKind, ResourceView, TrackLock};

/// One shared run found while walking a route: inclusive route indices.
struct Run {
    first: usize,
    last:  usize,
}

pub struct ResourceTable {
    resources: Vec<Resource>,
    locks:     Vec<Arc<TrackLock>>,
    by_cells:  FxHashMap<Vec<Cell>, ResourceId>,
    /// Indexed by `AgentId`; sorted by route order.
    views:     Vec<Vec<ResourceView>>,
}

impl ResourceTable {
    /// Derive every crossing and segment shared by at least two routes.
    ///
    /// `routes[i]` belongs to `AgentId(i)`.  Routes that never meet produce
    /// no resources.
    pub fn build(routes: &[Route]) -> Self {
        let positions: Vec<FxHashMap<Cell, usize>> = routes
            .iter()
            .map(|r| r.cells().iter().enumerate().map(|(i, &c)| (c, i)).collect())
            .collect();

        let mut table = ResourceTable {
            resources: Vec::new(),
            locks:     Vec::new(),
            by_cells:  FxHashMap::default(),
            views:     vec![Vec::new(); routes.len()],
        };

        for (a, route_a) in routes.iter().enumerate() {
            let mut seen: FxHashSet<ResourceId> = FxHashSet::default();
            for (b, pos_b) in positions.iter().enumerate() {
                if a == b {
                    continue;
                }
                for run in shared_runs(route_a.cells(), pos_b) {
                    let cells = &route_a.cells()[run.first..=run.last];
                    let id = table.register(cells, agent(a), agent(b));
                    if seen.insert(id) {
                        table.views[a].push(ResourceView {
                            resource: id,
                            kind:     table.resources[id.index()].kind,
                            entry:    cells[0],
                            exit:     cells[cells.len() - 1],
                            first:    run.first,
                            last:     run.last,
                        });
                    }
                }
            }
            table.views[a].sort_by_key(|v| (v.first, v.resource));
        }

        debug!(
            target: "metro-track",
            resources = table.resources.len(),
            trains = routes.len(),
            "resource table built"
        );
        table
    }

    /// Look up or create the resource for `cells` and record both owners.
    fn register(&mut self, cells: &[Cell], a: AgentId, b: AgentId) -> ResourceId {
        let mut sorted = cells.to_vec();
        sorted.sort_unstable();
        let id = match self.by_cells.get(&sorted) {
            Some(&id) => id,
            None => {
                let id = ResourceId(self.resources.len() as u32);
                self.resources.push(Resource {
                    id,
                    key:    ResourceKey::new(cells[0], cells[cells.len() - 1]),
                    kind:   if cells.len() == 1 { ResourceKind::Crossing } else { ResourceKind::Segment },
                    cells:  sorted.clone(),
                    owners: Vec::new(),
                });
                self.locks.push(Arc::new(TrackLock::new(id)));
                self.by_cells.insert(sorted, id);
                id
            }
        };
        let owners = &mut self.resources[id.index()].owners;
        for agent in [a, b] {
            if let Err(at) = owners.binary_search(&agent) {
                owners.insert(at, agent);
            }
        }
        id
    }

    // ── Queries ───────────────────────────────────────────────────────────

    #[inline]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn resource(&self, id: ResourceId) -> Option<&Resource> {
        self.resources.get(id.index())
    }

    /// The lock for `id`.  Every view of the same physical run returns the
    /// same `Arc`.
    pub fn lock(&self, id: ResourceId) -> Option<&Arc<TrackLock>> {
        self.locks.get(id.index())
    }

    /// Lowest-id resource with endpoints `{a, b}`, in either order.  Distinct
    /// paths between the same endpoints are separate resources.
    pub fn lookup(&self, a: Cell, b: Cell) -> Option<ResourceId> {
        let key = ResourceKey::new(a, b);
        self.resources.iter().find(|r| r.key == key).map(|r| r.id)
    }

    /// `agent`'s views in route order; empty for unknown agents.
    pub fn views(&self, agent: AgentId) -> &[ResourceView] {
        self.views.get(agent.index()).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resources of `agent`'s own views that contain `cell`, ascending.
    ///
    /// This is what a train must hold before its head enters `cell`.
    pub fn covering(&self, agent: AgentId, cell: Cell) -> Vec<ResourceId> {
        let mut ids: Vec<ResourceId> = self
            .views(agent)
            .iter()
            .filter(|v| self.resources[v.resource.index()].contains(cell))
            .map(|v| v.resource)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Wake every waiter on every lock.
    pub fn wake_all(&self) {
        for lock in &self.locks {
            lock.wake_all();
        }
    }
}

#[inline]
fn agent(i: usize) -> AgentId {
    AgentId(i as u32)
}

/// Maximal runs of `cells` that are also consecutive in the route indexed
/// by `other`.
fn shared_runs(cells: &[Cell], other: &FxHashMap<Cell, usize>) -> Vec<Run> {
    let mut runs = Vec::new();
    let mut i = 0;
    while i < cells.len() {
        let Some(&start_pos) = other.get(&cells[i]) else {
            i += 1;
            continue;
        };
        let first = i;
        let mut pos = start_pos;
        while let Some(&next) = cells.get(i + 1).and_then(|c| other.get(c)) {
            if next.abs_diff(pos) != 1 {
                break;
            }
            pos = next;
            i += 1;
        }
        runs.push(Run { first, last: i });
        i += 1;
    }
    runs
}
