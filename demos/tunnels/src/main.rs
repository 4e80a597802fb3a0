//! tunnels: three trains sharing the metro map.
//!
//! ```text
//! tunnels                   admission order A, B, C
//! tunnels C,A,B             explicit admission order
//! tunnels --shuffle 42      seeded random admission order
//! tunnels --seconds 30      run time (default 12)
//! ```
//!
//! Set `RUST_LOG=debug` to watch every course and every wait.

mod layout;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand::rngs::SmallRng;
use rand::seq::SliceRandom;
use tracing_subscriber::EnvFilter;

use metro_core::{AgentId, Direction, GridMap};
use metro_engine::{BlockReason, EngineBuilder, EngineObserver, EngineStatus, StallReport};

use layout::default_routes;

// ── Constants ─────────────────────────────────────────────────────────────────

const TRAINS:           usize = 3;
const PACING_MS:        u64   = 80;
const SNAPSHOT_EVERY:   Duration = Duration::from_secs(3);
const DEFAULT_RUN_SECS: u64   = 12;

// ── Command line ──────────────────────────────────────────────────────────────

struct Args {
    order:    Vec<AgentId>,
    run_secs: u64,
}

fn parse_args() -> Result<Args> {
    let mut order: Vec<AgentId> = (0..TRAINS as u32).map(AgentId).collect();
    let mut run_secs = DEFAULT_RUN_SECS;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--shuffle" => {
                let seed: u64 = args
                    .next()
                    .context("--shuffle needs a seed")?
                    .parse()
                    .context("--shuffle seed must be an integer")?;
                order.shuffle(&mut SmallRng::seed_from_u64(seed));
            }
            "--seconds" => {
                run_secs = args
                    .next()
                    .context("--seconds needs a value")?
                    .parse()
                    .context("--seconds must be an integer")?;
            }
            labels => order = parse_order(labels)?,
        }
    }
    Ok(Args { order, run_secs })
}

/// `"C,A,B"` → `[AgentId(2), AgentId(0), AgentId(1)]`.  The engine checks
/// that it is a permutation.
fn parse_order(labels: &str) -> Result<Vec<AgentId>> {
    labels
        .split(',')
        .map(|s| {
            let s = s.trim();
            let mut chars = s.chars();
            match (chars.next().and_then(|c| AgentId::from_label(c.to_ascii_uppercase())), chars.next()) {
                (Some(agent), None) => Ok(agent),
                _ => bail!("not a train label: {s:?}"),
            }
        })
        .collect()
}

// ── Observer ──────────────────────────────────────────────────────────────────

/// Prints course boundaries and blocking events as they happen.
#[derive(Default)]
struct Console {
    courses: AtomicU64,
}

impl EngineObserver for Console {
    fn on_course_end(&self, agent: AgentId, direction: Direction) {
        let n = self.courses.fetch_add(1, Ordering::Relaxed) + 1;
        println!("[course {n:>3}] {agent} arrived ({direction})");
    }

    fn on_blocked(&self, agent: AgentId, reason: BlockReason) {
        match reason {
            BlockReason::Entrance { cell, occupant: Some(other) } => {
                println!("             {agent} waits for entrance {cell} held by {other}");
            }
            BlockReason::Entrance { cell, occupant: None } => {
                println!("             {agent} waits for entrance {cell}");
            }
            BlockReason::Track { resource, holder: Some(other) } => {
                println!("             {agent} waits for {resource} held by {other}");
            }
            BlockReason::Track { resource, holder: None } => {
                println!("             {agent} waits for {resource}");
            }
        }
    }

    fn on_stall(&self, report: &StallReport) {
        println!("             no possible move: {report}");
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let args = parse_args()?;
    let labels: Vec<String> = args.order.iter().map(|a| a.label().to_string()).collect();
    println!("=== tunnels — metro coordination kernel ===");
    println!(
        "Trains: {TRAINS}  |  Pacing: {PACING_MS} ms  |  Order: {}  |  Run: {} s",
        labels.join(","),
        args.run_secs
    );
    println!();

    // 1. Map and routes.
    let grid = GridMap::metro();
    let routes = default_routes()?;

    // 2. Build; trains start paused.
    let console = Arc::new(Console::default());
    let engine = EngineBuilder::new(grid, routes)
        .pacing(Duration::from_millis(PACING_MS))
        .admission_order(args.order)
        .observer(console.clone())
        .build()?;

    println!("Resources:");
    for r in engine.resources().resources() {
        let owners: Vec<String> = r.owners().iter().map(|a| a.label().to_string()).collect();
        println!(
            "  {:<4} {:<9} {:<16} {}",
            r.id().to_string(),
            r.kind().to_string(),
            r.key().to_string(),
            owners.join(","),
        );
    }
    println!();
    println!("{}", engine.snapshot());

    // 3. Run.
    let t0 = Instant::now();
    let run_for = Duration::from_secs(args.run_secs);
    engine.resume_all();
    while t0.elapsed() < run_for {
        thread::sleep(SNAPSHOT_EVERY.min(run_for.saturating_sub(t0.elapsed())));
        println!();
        println!("t = {:>5.1} s", t0.elapsed().as_secs_f64());
        println!("{}", engine.snapshot());
        for agent in engine.agents() {
            if let Some(cell) = engine.parked_on(agent) {
                println!("{agent} parked on entrance {cell}");
            }
        }
        if let EngineStatus::NoPossibleMove(report) = engine.status() {
            println!("stalled: {report}");
            break;
        }
    }

    // 4. Stop.
    engine.shutdown();
    let stats = engine.stats();

    // 5. Summary.
    println!();
    println!("Stopped after {:.1} s", t0.elapsed().as_secs_f64());
    println!("{:<10} {:>8} {:>8}", "Train", "Courses", "Steps");
    println!("{}", "-".repeat(28));
    for agent in engine.agents() {
        println!(
            "{:<10} {:>8} {:>8}",
            agent.to_string(),
            stats.courses[agent.index()],
            stats.steps[agent.index()],
        );
    }
    println!();
    println!("courses granted: {}", engine.courses_granted());
    println!("entrance waits : {}", stats.entrance_waits);
    println!("track waits    : {}", stats.track_waits);
    println!("stalls         : {}", stats.stalls);
    println!("collisions     : {}", stats.collisions);

    if stats.collisions > 0 {
        bail!("{} collisions detected", stats.collisions);
    }
    Ok(())
}
