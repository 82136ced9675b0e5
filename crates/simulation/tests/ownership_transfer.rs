//! Ownership transfer across process boundaries.
//!
//! Single beads moving ballistically make every crossing exact: a bead at
//! global x = 9.95 moving +0.1 per step must end up on the next process at
//! local x = 0.05.

use glam::DVec3;
use meso_metrics::NoopRecorder;
use meso_simbox::{InitialState, SimBoxConfig, StepReport};
use meso_simulation::{SimulationConfig, SimulationRunner};
use meso_test_helpers::{
    assert_conserved, assert_owned_by_position, assert_single_ownership, find_bead, run_simboxes,
    test_transport_config,
};
use meso_types::{Bead, BeadId, BeadKind, GridShape, Pid};
use meso_workload::{generate, Ballistic, SoftRepulsion, WorkloadConfig};
use tracing_test::traced_test;

const EPS: f64 = 1e-9;

fn moving(id: u64, position: DVec3, velocity: DVec3) -> Bead {
    Bead::new(BeadId(id), BeadKind(0), position).with_velocity(velocity)
}

/// Per rank: the step report and the local position of `id`, if held.
fn step_once(config: &SimBoxConfig, state: &InitialState, id: BeadId) -> Vec<(StepReport, Option<DVec3>)> {
    run_simboxes(config, state, |simbox| {
        let report = simbox.step(&Ballistic::new(1.0), &mut NoopRecorder).unwrap();
        let local = simbox.space().and_then(|s| s.get(id)).map(|b| b.position);
        (report, local)
    })
}

fn planar() -> SimBoxConfig {
    SimBoxConfig::default()
        .with_grid(GridShape::new(2, 2, 1))
        .with_domain(DVec3::new(20.0, 20.0, 10.0))
}

fn cubic() -> SimBoxConfig {
    SimBoxConfig::default()
        .with_grid(GridShape::new(2, 2, 2))
        .with_domain(DVec3::splat(20.0))
}

// ═══════════════════════════════════════════════════════════════════════════
// Linear
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_linear_crossing_lands_on_next_process() {
    let config = SimBoxConfig::default();
    let state = InitialState::new(
        vec![moving(0, DVec3::new(9.95, 5.0, 5.0), DVec3::new(0.1, 0.0, 0.0))],
        Vec::new(),
    );

    let results = step_once(&config, &state, BeadId(0));

    let (p0, p1) = (&results[0], &results[1]);
    assert_eq!(p0.0.migration.departed, 1);
    assert_eq!(p1.0.migration.arrived, 1);
    assert!(p0.1.is_none(), "P0 must give the bead up");
    let local = p1.1.expect("P1 must own the bead");
    assert!((local - DVec3::new(0.05, 5.0, 5.0)).length() < EPS, "landed at {local}");
}

#[traced_test]
#[test]
fn test_crossing_the_domain_edge_wraps_to_first_process() {
    let config = SimBoxConfig::default();
    let state = InitialState::new(
        vec![moving(0, DVec3::new(19.95, 5.0, 5.0), DVec3::new(0.1, 0.0, 0.0))],
        Vec::new(),
    );

    let results = step_once(&config, &state, BeadId(0));

    assert!(results[1].1.is_none());
    let local = results[0].1.expect("P0 must own the bead");
    assert!((local - DVec3::new(0.05, 5.0, 5.0)).length() < EPS, "landed at {local}");
}

#[traced_test]
#[test]
fn test_unsplit_axis_wraps_in_place() {
    let config = SimBoxConfig::default();
    let state = InitialState::new(
        vec![moving(0, DVec3::new(5.0, 9.95, 5.0), DVec3::new(0.0, 0.1, 0.0))],
        Vec::new(),
    );

    let results = step_once(&config, &state, BeadId(0));

    let (report, local) = &results[0];
    assert_eq!(report.migration.departed, 0);
    assert_eq!(report.migration.wrapped, 1);
    let local = local.expect("P0 keeps the bead");
    assert!((local - DVec3::new(5.0, 0.05, 5.0)).length() < EPS, "wrapped to {local}");
    assert_eq!(results[1].0.migration.arrived, 0);
}

#[traced_test]
#[test]
fn test_full_lap_returns_to_start() {
    let config = SimBoxConfig::default();
    let start = DVec3::new(1.0, 5.0, 5.0);
    let state = InitialState::new(vec![moving(0, start, DVec3::new(2.0, 0.0, 0.0))], Vec::new());

    let snapshots = run_simboxes(&config, &state, |simbox| {
        for _ in 0..10 {
            simbox.step(&Ballistic::new(1.0), &mut NoopRecorder).unwrap();
        }
        simbox.global_beads()
    });

    let (owner, bead) = find_bead(&snapshots, BeadId(0)).expect("bead survives the lap");
    assert_eq!(owner, Pid(0));
    assert!((bead.position - start).length() < EPS);
    assert!((bead.unwrapped - (start + DVec3::new(20.0, 0.0, 0.0))).length() < EPS);
}

// ═══════════════════════════════════════════════════════════════════════════
// Diagonal exclusivity
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_planar_corner_goes_straight_to_diagonal_neighbour() {
    let state = InitialState::new(
        vec![moving(0, DVec3::new(9.95, 9.95, 5.0), DVec3::new(0.1, 0.1, 0.0))],
        Vec::new(),
    );

    let results = step_once(&planar(), &state, BeadId(0));

    let arrivals: Vec<usize> = results.iter().map(|(r, _)| r.migration.arrived).collect();
    assert_eq!(arrivals, vec![0, 0, 0, 1], "only P3 may receive the bead");
    let local = results[3].1.expect("P3 owns the bead");
    assert!((local - DVec3::new(0.05, 0.05, 5.0)).length() < EPS, "landed at {local}");
}

#[traced_test]
#[test]
fn test_cubic_corners_in_both_directions() {
    let state = InitialState::new(
        vec![
            moving(0, DVec3::splat(9.95), DVec3::splat(0.1)),
            moving(1, DVec3::splat(10.05), DVec3::splat(-0.1)),
        ],
        Vec::new(),
    );

    let snapshots = run_simboxes(&cubic(), &state, |simbox| {
        let report = simbox.step(&Ballistic::new(1.0), &mut NoopRecorder).unwrap();
        (report.migration.arrived, simbox.global_beads())
    });

    let arrivals: Vec<usize> = snapshots.iter().map(|(a, _)| *a).collect();
    assert_eq!(arrivals, vec![1, 0, 0, 0, 0, 0, 0, 1]);
    let beads: Vec<Vec<Bead>> = snapshots.into_iter().map(|(_, b)| b).collect();
    let (owner, bead) = find_bead(&beads, BeadId(0)).unwrap();
    assert_eq!(owner, Pid(7));
    assert!((bead.position - DVec3::splat(10.05)).length() < EPS);
    let (owner, bead) = find_bead(&beads, BeadId(1)).unwrap();
    assert_eq!(owner, Pid(0));
    assert!((bead.position - DVec3::splat(9.95)).length() < EPS);
}

// ═══════════════════════════════════════════════════════════════════════════
// Many beads
// ═══════════════════════════════════════════════════════════════════════════

fn gas_run(simbox: SimBoxConfig, beads: usize, steps: u64) {
    let domain = simbox.domain;
    let config = SimulationConfig::new(simbox)
        .with_steps(steps)
        .with_total_check_interval(5)
        .with_transport(test_transport_config());
    let state = generate(&WorkloadConfig::gas(beads).with_max_speed(2.0).with_seed(7), domain);
    let engine = SoftRepulsion::default().with_dt(0.05).with_max_step(0.5);

    let report = SimulationRunner::new(config.clone())
        .run(&state, &engine)
        .expect("run completes");

    let snapshots = report.snapshots();
    assert_eq!(report.final_total, beads as u64);
    assert_single_ownership(&snapshots);
    assert_conserved(state.beads.iter().map(|b| b.id), &snapshots);
    assert_owned_by_position(&config.simbox, &snapshots);
    assert_eq!(
        report.counters.total_departures(),
        report.counters.total_arrivals()
    );
    assert!(report.counters.total_departures() > 0, "workload too quiet to test crossings");
}

#[traced_test]
#[test]
fn test_linear_gas_conserves_beads() {
    gas_run(SimBoxConfig::default(), 300, 40);
}

#[traced_test]
#[test]
fn test_planar_gas_conserves_beads() {
    gas_run(planar(), 400, 40);
}

#[traced_test]
#[test]
fn test_cubic_gas_conserves_beads() {
    gas_run(cubic(), 600, 30);
}
