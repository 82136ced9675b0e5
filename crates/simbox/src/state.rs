//! Initial state handed to every rank at load time.

use crate::SetupError;
use glam::DVec3;
use meso_types::{Bead, BeadId, Polymer, PolymerId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Every bead and polymer of the run, in global coordinates.
///
/// Each rank receives the same state and keeps the beads whose position
/// falls in its own Space.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialState {
    pub beads: Vec<Bead>,
    pub polymers: Vec<Polymer>,
}

impl InitialState {
    /// State with the given beads and polymers.
    pub fn new(beads: Vec<Bead>, polymers: Vec<Polymer>) -> Self {
        Self { beads, polymers }
    }

    /// Number of beads.
    pub fn bead_count(&self) -> usize {
        self.beads.len()
    }

    /// Check ids, finiteness and polymer membership.
    pub fn validate(&self) -> Result<(), SetupError> {
        let mut membership: HashMap<BeadId, Option<PolymerId>> = HashMap::new();
        for bead in &self.beads {
            if !bead.id.is_valid() {
                return Err(SetupError::InvalidInitialState {
                    id: bead.id,
                    reason: "invalid id",
                });
            }
            if !bead.is_finite() {
                return Err(SetupError::InvalidInitialState {
                    id: bead.id,
                    reason: "non-finite component",
                });
            }
            if membership.insert(bead.id, bead.polymer).is_some() {
                return Err(SetupError::InvalidInitialState {
                    id: bead.id,
                    reason: "duplicate id",
                });
            }
        }
        let mut polymers = HashSet::new();
        for polymer in &self.polymers {
            polymers.insert(polymer.id);
            for member in &polymer.members {
                match membership.get(member) {
                    Some(Some(p)) if *p == polymer.id => {}
                    _ => {
                        return Err(SetupError::UnknownPolymerMember {
                            polymer: polymer.id,
                            bead: *member,
                        })
                    }
                }
            }
        }
        for bead in &self.beads {
            if let Some(p) = bead.polymer {
                if !polymers.contains(&p) {
                    return Err(SetupError::InvalidInitialState {
                        id: bead.id,
                        reason: "member of an undeclared polymer",
                    });
                }
            }
        }
        Ok(())
    }
}

/// Fold a global coordinate into `[0, domain)` per axis.
pub(crate) fn wrap_into_domain(position: DVec3, domain: DVec3) -> DVec3 {
    let mut out = position;
    for a in 0..3 {
        let mut v = position[a].rem_euclid(domain[a]);
        if v >= domain[a] {
            v = 0.0;
        }
        out[a] = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_types::{BeadKind, Polymer};

    fn bead(id: u64) -> Bead {
        Bead::new(BeadId(id), BeadKind(0), DVec3::splat(1.0))
    }

    #[test]
    fn test_duplicate_and_non_finite_rejected() {
        let state = InitialState::new(vec![bead(1), bead(1)], vec![]);
        assert!(matches!(
            state.validate(),
            Err(SetupError::InvalidInitialState { reason: "duplicate id", .. })
        ));
        let mut broken = bead(2);
        broken.velocity.y = f64::NAN;
        let state = InitialState::new(vec![broken], vec![]);
        assert!(state.validate().is_err());
    }

    #[test]
    fn test_polymer_membership_checked() {
        let pid = PolymerId(3);
        let beads = vec![bead(1).with_polymer(pid), bead(2).with_polymer(pid)];
        let chain = Polymer::chain(pid, 0, vec![BeadId(1), BeadId(2)], 4.0, 0.5);
        assert!(InitialState::new(beads.clone(), vec![chain]).validate().is_ok());

        let chain = Polymer::chain(pid, 0, vec![BeadId(1), BeadId(9)], 4.0, 0.5);
        assert!(matches!(
            InitialState::new(beads.clone(), vec![chain]).validate(),
            Err(SetupError::UnknownPolymerMember { bead: BeadId(9), .. })
        ));
        assert!(InitialState::new(beads, vec![]).validate().is_err());
    }

    #[test]
    fn test_wrap_into_domain() {
        let domain = DVec3::new(20.0, 10.0, 10.0);
        let wrapped = wrap_into_domain(DVec3::new(-0.5, 10.0, 25.0), domain);
        assert_eq!(wrapped, DVec3::new(19.5, 0.0, 5.0));
        let tiny = wrap_into_domain(DVec3::new(-1e-18, 1.0, 1.0), domain);
        assert!(tiny.x < 20.0);
    }
}
