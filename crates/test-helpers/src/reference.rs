//! Serial reference forces over the whole periodic domain.
//!
//! Every pair is visited once with the minimum-image separation, so the
//! result is what a single process holding every bead would compute. It is
//! O(N²) and meant for small worlds only.

use glam::DVec3;
use meso_simbox::{Particle, PhysicsEngine};
use meso_types::{Bead, BeadId, Polymer};
use std::collections::{BTreeMap, HashMap};

/// Shortest periodic image of `separation` in a domain of `domain`.
pub fn minimum_image(mut separation: DVec3, domain: DVec3) -> DVec3 {
    for a in 0..3 {
        separation[a] -= domain[a] * (separation[a] / domain[a]).round();
    }
    separation
}

/// Total force on every bead from pairs within the cutoff and every bond.
///
/// Positions are global.
pub fn reference_forces<E: PhysicsEngine>(
    beads: &[Bead],
    polymers: &[Polymer],
    domain: DVec3,
    engine: &E,
) -> BTreeMap<BeadId, DVec3> {
    let mut forces: BTreeMap<BeadId, DVec3> = beads.iter().map(|b| (b.id, DVec3::ZERO)).collect();
    let cutoff_sq = engine.cutoff() * engine.cutoff();

    for (i, a) in beads.iter().enumerate() {
        for b in &beads[i + 1..] {
            let separation = minimum_image(a.position - b.position, domain);
            if separation.length_squared() >= cutoff_sq {
                continue;
            }
            let f = engine.pair_force(&Particle::from(a), &Particle::from(b), separation);
            *forces.entry(a.id).or_default() += f;
            *forces.entry(b.id).or_default() -= f;
        }
    }

    let by_id: HashMap<BeadId, &Bead> = beads.iter().map(|b| (b.id, b)).collect();
    for bond in polymers.iter().flat_map(|p| p.bonds.iter()) {
        let (Some(head), Some(tail)) = (by_id.get(&bond.head), by_id.get(&bond.tail)) else {
            continue;
        };
        let f = engine.bond_force(bond, minimum_image(head.position - tail.position, domain));
        *forces.entry(bond.head).or_default() += f;
        *forces.entry(bond.tail).or_default() -= f;
    }
    forces
}

/// Largest per-bead difference between computed forces and the reference.
///
/// Beads missing from `beads` count as a difference of infinity.
pub fn max_force_error(beads: &[Bead], reference: &BTreeMap<BeadId, DVec3>) -> f64 {
    let computed: HashMap<BeadId, DVec3> = beads.iter().map(|b| (b.id, b.force)).collect();
    reference
        .iter()
        .map(|(id, expected)| match computed.get(id) {
            Some(force) => (*force - *expected).length(),
            None => f64::INFINITY,
        })
        .fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_types::BeadKind;
    use meso_workload::SoftRepulsion;

    #[test]
    fn test_minimum_image_wraps_each_axis() {
        let domain = DVec3::new(20.0, 10.0, 10.0);
        let s = minimum_image(DVec3::new(19.0, -6.0, 4.0), domain);
        assert!((s - DVec3::new(-1.0, 4.0, 4.0)).length() < 1e-12);
    }

    #[test]
    fn test_reference_sums_to_zero() {
        let domain = DVec3::splat(4.0);
        let beads = vec![
            Bead::new(BeadId(0), BeadKind(0), DVec3::new(0.1, 1.0, 1.0)),
            Bead::new(BeadId(1), BeadKind(0), DVec3::new(3.8, 1.2, 1.0)),
            Bead::new(BeadId(2), BeadKind(0), DVec3::new(0.5, 1.1, 0.9)),
        ];
        let forces = reference_forces(&beads, &[], domain, &SoftRepulsion::default());
        let total: DVec3 = forces.values().copied().sum();
        assert!(total.length() < 1e-9);
        // Bead 1 interacts across the periodic boundary.
        assert!(forces[&BeadId(1)].length() > 0.0);
    }
}
