//! Seeded initial-state generators.
//!
//! Every generator draws from a `ChaCha8Rng` seeded from the configuration,
//! so a given seed reproduces the same state on every rank and every run.

use crate::{WorkloadConfig, WorkloadKind};
use glam::DVec3;
use meso_simbox::InitialState;
use meso_types::{Bead, BeadId, BeadKind, Polymer, PolymerId};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

/// Build the initial state described by `config` inside `domain`.
pub fn generate(config: &WorkloadConfig, domain: DVec3) -> InitialState {
    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let state = match config.kind {
        WorkloadKind::Gas => random_gas(&mut rng, config, domain),
        WorkloadKind::Chains => polymer_chains(&mut rng, config, domain),
        WorkloadKind::Lattice => lattice(&mut rng, config, domain),
    };
    debug!(
        kind = ?config.kind,
        seed = config.seed,
        beads = state.beads.len(),
        polymers = state.polymers.len(),
        "Workload generated"
    );
    state
}

fn random_velocity(rng: &mut ChaCha8Rng, max_speed: f64) -> DVec3 {
    if max_speed <= 0.0 {
        return DVec3::ZERO;
    }
    DVec3::new(
        rng.gen_range(-max_speed..max_speed),
        rng.gen_range(-max_speed..max_speed),
        rng.gen_range(-max_speed..max_speed),
    )
}

fn random_kind(rng: &mut ChaCha8Rng, kinds: u32) -> BeadKind {
    BeadKind(rng.gen_range(0..kinds.max(1)))
}

fn random_gas(rng: &mut ChaCha8Rng, config: &WorkloadConfig, domain: DVec3) -> InitialState {
    let beads = (0..config.beads as u64)
        .map(|i| {
            let position = DVec3::new(
                rng.gen_range(0.0..domain.x),
                rng.gen_range(0.0..domain.y),
                rng.gen_range(0.0..domain.z),
            );
            let kind = random_kind(rng, config.kinds);
            Bead::new(BeadId(i), kind, position)
                .with_velocity(random_velocity(rng, config.max_speed))
        })
        .collect();
    InitialState::new(beads, Vec::new())
}

/// Chains laid out as random walks of `bond_length` steps, wrapped into the
/// domain. `unwrapped` keeps the walk itself.
fn polymer_chains(rng: &mut ChaCha8Rng, config: &WorkloadConfig, domain: DVec3) -> InitialState {
    let mut beads = Vec::with_capacity(config.chains * config.chain_length);
    let mut polymers = Vec::with_capacity(config.chains);
    let mut next_id = 0u64;

    for c in 0..config.chains as u64 {
        let pid = PolymerId(c);
        let kind = random_kind(rng, config.kinds);
        let mut walk = DVec3::new(
            rng.gen_range(0.0..domain.x),
            rng.gen_range(0.0..domain.y),
            rng.gen_range(0.0..domain.z),
        );
        let mut members = Vec::with_capacity(config.chain_length);
        for k in 0..config.chain_length {
            if k > 0 {
                walk += random_unit(rng) * config.bond_length;
            }
            let id = BeadId(next_id);
            next_id += 1;
            let mut bead = Bead::new(id, kind, wrap(walk, domain))
                .with_velocity(random_velocity(rng, config.max_speed))
                .with_polymer(pid);
            bead.unwrapped = walk;
            beads.push(bead);
            members.push(id);
        }
        polymers.push(Polymer::chain(
            pid,
            kind.0,
            members,
            config.bond_spring,
            config.bond_length,
        ));
    }
    InitialState::new(beads, polymers)
}

/// `beads` per axis on cell centres of a regular lattice.
fn lattice(rng: &mut ChaCha8Rng, config: &WorkloadConfig, domain: DVec3) -> InitialState {
    let n = config.beads.max(1);
    let spacing = domain / n as f64;
    let mut beads = Vec::with_capacity(n * n * n);
    for z in 0..n {
        for y in 0..n {
            for x in 0..n {
                let index = DVec3::new(x as f64, y as f64, z as f64);
                let id = BeadId(beads.len() as u64);
                let kind = random_kind(rng, config.kinds);
                beads.push(
                    Bead::new(id, kind, (index + 0.5) * spacing)
                        .with_velocity(random_velocity(rng, config.max_speed)),
                );
            }
        }
    }
    InitialState::new(beads, Vec::new())
}

fn random_unit(rng: &mut ChaCha8Rng) -> DVec3 {
    loop {
        let v = DVec3::new(
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
            rng.gen_range(-1.0..1.0),
        );
        let len = v.length();
        if len > 1e-3 && len <= 1.0 {
            return v / len;
        }
    }
}

fn wrap(position: DVec3, domain: DVec3) -> DVec3 {
    let mut out = DVec3::new(
        position.x.rem_euclid(domain.x),
        position.y.rem_euclid(domain.y),
        position.z.rem_euclid(domain.z),
    );
    for a in 0..3 {
        if out[a] >= domain[a] {
            out[a] = 0.0;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOMAIN: DVec3 = DVec3::new(20.0, 10.0, 10.0);

    fn inside(position: DVec3) -> bool {
        (0..3).all(|a| position[a] >= 0.0 && position[a] < DOMAIN[a])
    }

    #[test]
    fn test_same_seed_same_state() {
        let config = WorkloadConfig::gas(100).with_seed(9);
        assert_eq!(generate(&config, DOMAIN), generate(&config, DOMAIN));
        let other = generate(&config.clone().with_seed(10), DOMAIN);
        assert_ne!(generate(&config, DOMAIN), other);
    }

    #[test]
    fn test_gas_inside_domain_and_valid() {
        let state = generate(&WorkloadConfig::gas(200), DOMAIN);
        assert_eq!(state.bead_count(), 200);
        assert!(state.beads.iter().all(|b| inside(b.position)));
        state.validate().unwrap();
    }

    #[test]
    fn test_chains_are_bonded_walks() {
        let config = WorkloadConfig::chains(5, 6).with_bonds(10.0, 0.5);
        let state = generate(&config, DOMAIN);
        state.validate().unwrap();
        assert_eq!(state.polymers.len(), 5);
        for polymer in &state.polymers {
            assert_eq!(polymer.bonds.len(), 5);
            for bond in &polymer.bonds {
                let head = state.beads.iter().find(|b| b.id == bond.head).unwrap();
                let tail = state.beads.iter().find(|b| b.id == bond.tail).unwrap();
                let step = (head.unwrapped - tail.unwrapped).length();
                assert!((step - 0.5).abs() < 1e-9);
            }
        }
        assert!(state.beads.iter().all(|b| inside(b.position)));
    }

    #[test]
    fn test_lattice_fills_domain() {
        let state = generate(&WorkloadConfig::lattice(4), DOMAIN);
        assert_eq!(state.bead_count(), 64);
        assert_eq!(state.beads[0].position, DVec3::new(2.5, 1.25, 1.25));
        assert!(state.beads.iter().all(|b| inside(b.position)));
    }
}
