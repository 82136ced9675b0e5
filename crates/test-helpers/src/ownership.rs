//! Assertions over per-rank bead snapshots.
//!
//! Snapshots are the output of [`SimBox::global_beads`], one per rank and
//! ordered by rank.
//!
//! [`SimBox::global_beads`]: meso_simbox::SimBox::global_beads

use glam::DVec3;
use meso_simbox::SimBoxConfig;
use meso_types::{Bead, BeadId, Pid};
use std::collections::{BTreeSet, HashMap};

/// Rank whose Space contains the global position `position`.
pub fn owner_of(config: &SimBoxConfig, position: DVec3) -> Pid {
    let extent = config.space_extent();
    let dims = config.grid.dims();
    let mut k = [0u32; 3];
    for a in 0..3 {
        let cell = (position[a] / extent[a]).floor() as i64;
        k[a] = cell.clamp(0, dims[a] as i64 - 1) as u32;
    }
    Pid(k[0] + dims[0] * (k[1] + dims[1] * k[2]))
}

/// Every bead id is held by exactly one rank.
///
/// # Panics
///
/// Panics naming the first id held twice.
pub fn assert_single_ownership(snapshots: &[Vec<Bead>]) {
    let mut owner: HashMap<BeadId, usize> = HashMap::new();
    for (rank, beads) in snapshots.iter().enumerate() {
        for bead in beads {
            if let Some(first) = owner.insert(bead.id, rank) {
                panic!("{} held by both P{} and P{}", bead.id, first, rank);
            }
        }
    }
}

/// The union of snapshots holds exactly `expected`.
///
/// # Panics
///
/// Panics listing lost or invented ids.
pub fn assert_conserved(expected: impl IntoIterator<Item = BeadId>, snapshots: &[Vec<Bead>]) {
    let expected: BTreeSet<BeadId> = expected.into_iter().collect();
    let held: BTreeSet<BeadId> = snapshots.iter().flatten().map(|b| b.id).collect();
    let lost: Vec<_> = expected.difference(&held).collect();
    let extra: Vec<_> = held.difference(&expected).collect();
    assert!(
        lost.is_empty() && extra.is_empty(),
        "bead set changed: lost {lost:?}, unexpected {extra:?}"
    );
}

/// Every bead sits in the Space of the rank that holds it.
///
/// # Panics
///
/// Panics naming the first misplaced bead.
pub fn assert_owned_by_position(config: &SimBoxConfig, snapshots: &[Vec<Bead>]) {
    for (rank, beads) in snapshots.iter().enumerate() {
        for bead in beads {
            let owner = owner_of(config, bead.position);
            assert_eq!(
                owner.index(),
                rank,
                "{} at {} held by P{} but lies in {}",
                bead.id,
                bead.position,
                rank,
                owner
            );
        }
    }
}

/// Find a bead in any snapshot, with the rank that holds it.
pub fn find_bead(snapshots: &[Vec<Bead>], id: BeadId) -> Option<(Pid, &Bead)> {
    snapshots.iter().enumerate().find_map(|(rank, beads)| {
        beads
            .iter()
            .find(|b| b.id == id)
            .map(|b| (Pid(rank as u32), b))
    })
}
