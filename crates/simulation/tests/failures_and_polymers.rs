//! Polymer bookkeeping across owners, and how failures surface.

use glam::DVec3;
use meso_messages::{Capacities, MessageCapacity, MessageKind};
use meso_metrics::NoopRecorder;
use meso_simbox::{Coherence, InitialState, SetupError, SimBox, SimBoxConfig};
use meso_simulation::{RankFailure, RunError, SimulationConfig, SimulationRunner};
use meso_test_helpers::{run_ranks, run_simboxes, test_transport_config};
use meso_types::{Bead, BeadId, BeadKind, GridError, GridShape, Polymer, PolymerId};
use meso_workload::{generate, Ballistic, SoftRepulsion, WorkloadConfig};
use tracing_test::traced_test;

fn moving(id: u64, x: f64, vx: f64) -> Bead {
    Bead::new(BeadId(id), BeadKind(0), DVec3::new(x, 5.0, 5.0)).with_velocity(DVec3::new(vx, 0.0, 0.0))
}

// ═══════════════════════════════════════════════════════════════════════════
// Polymers
// ═══════════════════════════════════════════════════════════════════════════

#[traced_test]
#[test]
fn test_polymer_extends_then_becomes_coherent_again() {
    let pid = PolymerId(1);
    let state = InitialState::new(
        vec![
            moving(0, 9.7, 0.2).with_polymer(pid),
            moving(1, 9.9, 0.2).with_polymer(pid),
        ],
        vec![Polymer::chain(pid, 0, vec![BeadId(0), BeadId(1)], 1.0, 0.2)],
    );

    let per_rank = run_simboxes(&SimBoxConfig::default(), &state, |simbox| {
        let before = simbox.polymers().coherence(pid);
        let engine = Ballistic::new(1.0);
        let first = simbox.step(&engine, &mut NoopRecorder).unwrap();
        let after_one = simbox.polymers().coherence(pid);
        simbox.step(&engine, &mut NoopRecorder).unwrap();
        let after_two = simbox.polymers().coherence(pid);
        (before, after_one, after_two, first.forces.missing_bond_partners)
    });

    // Both members start on P0.
    assert_eq!(per_rank[0].0, Some(Coherence::Coherent));
    assert_eq!(per_rank[1].0, None);
    // Bead 1 crosses first: both sides hold a partial polymer.
    assert_eq!(per_rank[0].1, Some(Coherence::Extended));
    assert_eq!(per_rank[1].1, Some(Coherence::Extended));
    // Bead 0 follows: P1 holds it all and P0 forgets it.
    assert_eq!(per_rank[0].2, None);
    assert_eq!(per_rank[1].2, Some(Coherence::Coherent));
    assert_eq!(per_rank[0].3 + per_rank[1].3, 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// Failures
// ═══════════════════════════════════════════════════════════════════════════

fn tight_relocation() -> SimBoxConfig {
    SimBoxConfig::default().with_capacities(
        Capacities::default().with(MessageKind::Relocation, MessageCapacity::new(1, 64 * 1024)),
    )
}

#[traced_test]
#[test]
fn test_oversized_relocation_fails_without_losing_beads() {
    let state = InitialState::new(
        vec![moving(0, 9.95, 0.1), moving(1, 9.9, 0.2), moving(2, 5.0, 0.0)],
        Vec::new(),
    );

    let per_rank = run_simboxes(&tight_relocation(), &state, |simbox| {
        let result = simbox.step(&Ballistic::new(1.0), &mut NoopRecorder);
        (result.map_err(|e| e.class()), simbox.global_beads(), simbox.step_count())
    });

    let (result, beads, steps) = &per_rank[0];
    assert_eq!(*result, Err("validation"));
    assert_eq!(*steps, 0, "a failed step does not count");
    let mut held: Vec<(BeadId, DVec3)> = beads.iter().map(|b| (b.id, b.position)).collect();
    held.sort_by_key(|(id, _)| *id);
    assert_eq!(
        held,
        vec![
            (BeadId(0), DVec3::new(9.95, 5.0, 5.0)),
            (BeadId(1), DVec3::new(9.9, 5.0, 5.0)),
            (BeadId(2), DVec3::new(5.0, 5.0, 5.0)),
        ],
        "no bead may move or vanish on a rejected step"
    );
    assert!(per_rank[1].0.is_err(), "the peer cannot complete the step either");
}

#[traced_test]
#[test]
fn test_move_wider_than_a_cell_is_an_escape() {
    // Cell width is 2.5; the bead stays inside P0 but skips a cell.
    let state = InitialState::new(vec![moving(0, 5.0, 3.0)], Vec::new());

    let per_rank = run_simboxes(&SimBoxConfig::default(), &state, |simbox| {
        let result = simbox.step(&Ballistic::new(1.0), &mut NoopRecorder);
        result.map_err(|e| (e.class(), e.to_string())).map(|_| ())
    });

    let (class, message) = per_rank[0].clone().unwrap_err();
    assert_eq!(class, "protocol");
    assert!(message.contains("more than one cell width"), "{message}");
}

#[traced_test]
#[test]
fn test_runner_reports_the_root_failure() {
    let config = SimulationConfig::new(tight_relocation())
        .with_steps(20)
        .with_transport(test_transport_config());
    let state = generate(&WorkloadConfig::gas(400).with_max_speed(2.0), config.simbox.domain);
    let engine = SoftRepulsion::default().with_dt(0.2).with_max_step(0.5);

    let error = SimulationRunner::new(config)
        .run(&state, &engine)
        .expect_err("more than one bead crosses a face at once");

    match error {
        RunError::Rank {
            source: RankFailure::Step(step),
            ..
        } => assert_eq!(step.class(), "validation"),
        other => panic!("expected a validation failure, got {other}"),
    }
}

#[traced_test]
#[test]
fn test_grid_that_does_not_tile_the_world_fails_setup() {
    let outcomes = run_ranks(3, |transport| {
        let mut simbox = SimBox::new(transport, SimBoxConfig::default()).unwrap();
        let result = simbox.assemble();
        let mismatch = matches!(
            result,
            Err(SetupError::Grid(GridError::WorldSizeMismatch {
                expected: 2,
                actual: 3,
                ..
            }))
        );
        let again = matches!(simbox.assemble(), Err(SetupError::AssemblyFailed));
        (mismatch, simbox.assembly_failed(), again)
    });

    assert!(outcomes.iter().all(|o| *o == (true, true, true)));
}

#[traced_test]
#[test]
fn test_single_process_grid_rejected() {
    let outcomes = run_ranks(1, |transport| {
        let config = SimBoxConfig::default().with_grid(GridShape::new(1, 1, 1));
        SimBox::new(transport, config).err().map(|e| e.to_string())
    });

    let message = outcomes[0].as_deref().expect("a 1x1x1 grid is not a decomposition");
    assert!(message.contains("no split axis"), "{message}");
}

#[traced_test]
#[test]
fn test_step_before_assembly_is_a_setup_error() {
    let outcomes = run_ranks(2, |transport| {
        let mut simbox = SimBox::new(transport, SimBoxConfig::default()).unwrap();
        simbox
            .step(&Ballistic::new(1.0), &mut NoopRecorder)
            .map_err(|e| e.class())
            .map(|_| ())
    });

    assert!(outcomes.iter().all(|o| *o == Err("setup")));
}
