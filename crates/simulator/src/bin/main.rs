//! Mesoscale decomposition simulator CLI
//!
//! Run a seeded workload over a process grid and report crossings and traffic.
//!
//! # Example
//!
//! ```bash
//! # 2x2x1 grid, 300 steps of polymer chains
//! meso-sim --grid 2x2x1 --domain 20,20,10 --workload chains --steps 300
//!
//! # Everything from a file, with the seed overridden
//! meso-sim --config run.toml --seed 7
//! ```

use anyhow::{bail, Context};
use clap::Parser;
use glam::DVec3;
use meso_simulator::{Simulator, SimulatorConfig};
use meso_types::GridShape;
use meso_workload::WorkloadKind;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Mesoscale decomposition simulator
///
/// Runs one SimBox per rank on its own thread. Reproducible when the same
/// seed is used.
#[derive(Parser, Debug)]
#[command(name = "meso-sim")]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML configuration file. Flags below override it.
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Process grid as XxYxZ, e.g. 2x2x1
    #[arg(short = 'g', long, value_parser = parse_grid)]
    grid: Option<GridShape>,

    /// Domain extent as X,Y,Z
    #[arg(long, value_parser = parse_domain)]
    domain: Option<DVec3>,

    /// Number of steps to run
    #[arg(short = 'n', long)]
    steps: Option<u64>,

    /// Workload shape
    #[arg(short = 'w', long, value_parser = parse_kind)]
    workload: Option<WorkloadKind>,

    /// Free beads (gas) or beads per axis (lattice)
    #[arg(short = 'b', long)]
    beads: Option<usize>,

    /// Number of chains (chains workload)
    #[arg(long)]
    chains: Option<usize>,

    /// Random seed for the initial state
    #[arg(long)]
    seed: Option<u64>,

    /// Abort a blocked receive after this many milliseconds
    #[arg(long)]
    wait_deadline_ms: Option<u64>,

    /// Print per-channel network traffic at the end
    #[arg(long)]
    network_analysis: bool,

    /// Print the resolved configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

fn parse_grid(s: &str) -> Result<GridShape, String> {
    let dims: Vec<u32> = s
        .split(['x', 'X'])
        .map(|d| d.trim().parse::<u32>().map_err(|e| format!("{d:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match dims.as_slice() {
        [x, y, z] => Ok(GridShape::new(*x, *y, *z)),
        _ => Err(format!("expected XxYxZ, got {s:?}")),
    }
}

fn parse_domain(s: &str) -> Result<DVec3, String> {
    let extents: Vec<f64> = s
        .split(',')
        .map(|d| d.trim().parse::<f64>().map_err(|e| format!("{d:?}: {e}")))
        .collect::<Result<_, _>>()?;
    match extents.as_slice() {
        [x, y, z] => Ok(DVec3::new(*x, *y, *z)),
        _ => Err(format!("expected X,Y,Z, got {s:?}")),
    }
}

fn parse_kind(s: &str) -> Result<WorkloadKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "gas" => Ok(WorkloadKind::Gas),
        "chains" => Ok(WorkloadKind::Chains),
        "lattice" => Ok(WorkloadKind::Lattice),
        other => Err(format!("unknown workload {other:?} (gas, chains, lattice)")),
    }
}

fn resolve(args: &Args) -> anyhow::Result<SimulatorConfig> {
    let mut config = match &args.config {
        Some(path) => SimulatorConfig::load(path)?,
        None => SimulatorConfig::default(),
    };
    if let Some(grid) = args.grid {
        config.simbox.grid = grid;
    }
    if let Some(domain) = args.domain {
        config.simbox.domain = domain;
    }
    if let Some(steps) = args.steps {
        config.steps = steps;
    }
    if let Some(kind) = args.workload {
        config.workload.kind = kind;
    }
    if let Some(beads) = args.beads {
        config.workload.beads = beads;
    }
    if let Some(chains) = args.chains {
        config.workload.chains = chains;
    }
    if let Some(seed) = args.seed {
        config.workload.seed = seed;
    }
    if args.wait_deadline_ms.is_some() {
        config.wait_deadline_ms = args.wait_deadline_ms;
    }
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,meso_simulator=info")),
        )
        .init();

    let args = Args::parse();
    let config = resolve(&args)?;

    if args.print_config {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("cannot render configuration")?
        );
        return Ok(());
    }

    let topology = config
        .simbox
        .grid
        .topology()
        .context("grid cannot be decomposed")?;
    info!(
        grid = %config.simbox.grid,
        topology = topology.name(),
        steps = config.steps,
        "Starting simulation"
    );

    let simulator = Simulator::new(config)?;
    let expected = simulator.initial_state().bead_count() as u64;
    let report = simulator.run().context("simulation failed")?;
    if report.final_total != expected {
        bail!(
            "bead total drifted from {expected} to {}",
            report.final_total
        );
    }

    println!("\n=== Run ===");
    println!("Steps: {}", report.steps);
    println!("Beads: {}", report.final_total);
    for rank in &report.ranks {
        println!("  P{:<4} {:>8} beads", rank.rank.0, rank.beads.len());
    }

    println!("\n=== Crossings ===");
    println!("{}", report.counters.summary());

    if args.network_analysis {
        println!("\n=== Network ===");
        println!("{}", report.traffic);
    }

    Ok(())
}
