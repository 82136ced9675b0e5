//! Tests for deterministic runs.
//!
//! Ranks run on free threads, yet a run must be a pure function of its
//! configuration and seed: every exchange is matched by source and tag, so
//! thread scheduling never changes what a rank sees.

use glam::DVec3;
use meso_simbox::SimBoxConfig;
use meso_simulation::{RunReport, SimulationConfig, SimulationRunner};
use meso_test_helpers::test_transport_config;
use meso_types::{Bead, GridShape};
use meso_workload::{generate, SoftRepulsion, WorkloadConfig};
use tracing_test::traced_test;

fn run(seed: u64) -> RunReport {
    let simbox = SimBoxConfig::default()
        .with_grid(GridShape::new(2, 2, 1))
        .with_domain(DVec3::new(20.0, 20.0, 10.0));
    let state = generate(&WorkloadConfig::chains(25, 6).with_seed(seed), simbox.domain);
    let config = SimulationConfig::new(simbox)
        .with_steps(25)
        .with_transport(test_transport_config());
    let engine = SoftRepulsion::default().with_damping(4.5).with_dt(0.05);
    SimulationRunner::new(config)
        .run(&state, &engine)
        .expect("run completes")
}

fn sorted(report: &RunReport) -> Vec<Bead> {
    let mut beads: Vec<Bead> = report.beads().cloned().collect();
    beads.sort_by_key(|b| b.id);
    beads
}

#[traced_test]
#[test]
fn test_same_seed_same_trajectory() {
    let first = run(21);
    let second = run(21);

    assert_eq!(sorted(&first), sorted(&second));
    assert_eq!(
        first.counters.total_departures(),
        second.counters.total_departures()
    );
    for (a, b) in first.ranks.iter().zip(&second.ranks) {
        assert_eq!(a.beads.len(), b.beads.len(), "rank {} diverged", a.rank);
    }
}

#[traced_test]
#[test]
fn test_different_seed_different_trajectory() {
    assert_ne!(sorted(&run(21)), sorted(&run(22)));
}
