//! Distributed forces against a serial reference.
//!
//! After one force sync, every bead must carry the force a single process
//! holding the whole periodic domain would compute: every pair once, every
//! bond once, across process boundaries and periodic images alike.

use glam::DVec3;
use meso_metrics::{NoopRecorder, StepCounters};
use meso_simbox::{ForceReport, InitialState, SimBoxConfig};
use meso_test_helpers::{max_force_error, reference_forces, run_simboxes};
use meso_types::{Bead, BeadId, BeadKind, GridShape};
use meso_workload::{generate, SoftRepulsion, WorkloadConfig};
use tracing_test::traced_test;

const TOLERANCE: f64 = 1e-9;

fn engine() -> SoftRepulsion {
    SoftRepulsion::default().with_damping(4.5)
}

fn check_against_reference(config: SimBoxConfig, state: InitialState) -> Vec<ForceReport> {
    let engine = engine();
    let results = run_simboxes(&config, &state, |simbox| {
        let report = simbox.sync_forces(&engine, &mut NoopRecorder).unwrap();
        (report, simbox.global_beads())
    });
    let beads: Vec<Bead> = results.iter().flat_map(|(_, b)| b.iter().cloned()).collect();
    assert_eq!(beads.len(), state.bead_count());

    let reference = reference_forces(&state.beads, &state.polymers, config.domain, &engine);
    let error = max_force_error(&beads, &reference);
    assert!(error < TOLERANCE, "largest force deviation {error}");

    let total: DVec3 = beads.iter().map(|b| b.force).sum();
    assert!(total.length() < 1e-8, "net force {total}");

    results.into_iter().map(|(r, _)| r).collect()
}

fn mixed_state(domain: DVec3, seed: u64) -> InitialState {
    let mut state = generate(&WorkloadConfig::chains(30, 6).with_seed(seed), domain);
    let gas = generate(&WorkloadConfig::gas(300).with_seed(seed + 1), domain);
    let offset = state.beads.len() as u64;
    state.beads.extend(gas.beads.into_iter().map(|mut b| {
        b.id = BeadId(b.id.0 + offset);
        b
    }));
    state
}

#[traced_test]
#[test]
fn test_linear_forces_match_reference() {
    let config = SimBoxConfig::default();
    let reports = check_against_reference(config.clone(), mixed_state(config.domain, 11));
    for report in &reports {
        assert_eq!(report.missing_bond_partners, 0);
        assert!(report.ghosts > 0);
        assert!(report.images > 0, "unsplit axes must produce self-images");
    }
    // Every reply sent is received by someone.
    let sent: usize = reports.iter().map(|r| r.replies_sent).sum();
    let received: usize = reports.iter().map(|r| r.replies_received).sum();
    assert_eq!(sent, received);
}

#[traced_test]
#[test]
fn test_planar_forces_match_reference() {
    let config = SimBoxConfig::default()
        .with_grid(GridShape::new(2, 2, 1))
        .with_domain(DVec3::new(20.0, 20.0, 10.0));
    check_against_reference(config.clone(), mixed_state(config.domain, 12));
}

#[traced_test]
#[test]
fn test_cubic_forces_match_reference() {
    let config = SimBoxConfig::default()
        .with_grid(GridShape::new(2, 2, 2))
        .with_domain(DVec3::splat(20.0));
    let reports = check_against_reference(config.clone(), mixed_state(config.domain, 13));
    for report in &reports {
        assert_eq!(report.images, 0, "no axis is left unsplit");
    }
}

#[traced_test]
#[test]
fn test_three_processes_on_one_axis() {
    let config = SimBoxConfig::default()
        .with_grid(GridShape::new(3, 1, 1))
        .with_domain(DVec3::new(15.0, 6.0, 6.0))
        .with_cells_per_space([3, 3, 3]);
    check_against_reference(config.clone(), mixed_state(config.domain, 14));
}

#[traced_test]
#[test]
fn test_pair_across_boundary_counted_once() {
    let config = SimBoxConfig::default();
    let state = InitialState::new(
        vec![
            Bead::new(BeadId(0), BeadKind(0), DVec3::new(9.8, 5.0, 5.0)),
            Bead::new(BeadId(1), BeadKind(0), DVec3::new(10.3, 5.0, 5.0)),
        ],
        Vec::new(),
    );
    let engine = SoftRepulsion::default();
    let results = run_simboxes(&config, &state, |simbox| {
        let mut counters = StepCounters::new();
        let report = simbox.sync_forces(&engine, &mut counters).unwrap();
        (report, simbox.global_beads())
    });

    let shared: usize = results.iter().map(|(r, _)| r.shared_pairs).sum();
    assert_eq!(shared, 1);
    // 25 * (1 - 0.5) along the separation.
    let left = &results[0].1[0];
    let right = &results[1].1[0];
    assert!((left.force - DVec3::new(-12.5, 0.0, 0.0)).length() < TOLERANCE);
    assert!((right.force - DVec3::new(12.5, 0.0, 0.0)).length() < TOLERANCE);
}

#[traced_test]
#[test]
fn test_copy_rounded_onto_halo_edge_is_staged() {
    // One ulp below P0's first cell edge; P1 translates it to exactly 12.5.
    let edge = f64::from_bits(2.5f64.to_bits() - 1);
    let config = SimBoxConfig::default();
    let state = InitialState::new(
        vec![
            Bead::new(BeadId(0), BeadKind(0), DVec3::new(edge, 5.0, 5.0)),
            Bead::new(BeadId(1), BeadKind(0), DVec3::new(19.8, 0.2, 5.0)),
            Bead::new(BeadId(2), BeadKind(0), DVec3::new(0.3, edge, 9.9)),
        ],
        Vec::new(),
    );
    let reports = check_against_reference(config, state);
    assert!(reports[1].ghosts >= 1, "P1 must stage the edge bead");
    assert!(reports.iter().all(|r| r.images > 0));
}
