//! Polymer records: ordered groups of bonded beads.

use crate::{BeadId, PolymerId};
use serde::{Deserialize, Serialize};

/// A harmonic bond between two beads of the same polymer.
///
/// The head is the bead whose owner computes the bond force.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub head: BeadId,
    pub tail: BeadId,
    pub spring: f64,
    pub rest_length: f64,
}

impl Bond {
    /// Create a bond.
    pub fn new(head: BeadId, tail: BeadId, spring: f64, rest_length: f64) -> Self {
        Self {
            head,
            tail,
            spring,
            rest_length,
        }
    }

    /// Whether `id` is either end of the bond.
    pub fn touches(&self, id: BeadId) -> bool {
        self.head == id || self.tail == id
    }
}

/// A composite particle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polymer {
    pub id: PolymerId,
    pub kind: u32,
    pub members: Vec<BeadId>,
    pub bonds: Vec<Bond>,
}

impl Polymer {
    /// Create a polymer with no bonds.
    pub fn new(id: PolymerId, kind: u32, members: Vec<BeadId>) -> Self {
        Self {
            id,
            kind,
            members,
            bonds: Vec::new(),
        }
    }

    /// Create a linear chain bonding each member to the next.
    pub fn chain(
        id: PolymerId,
        kind: u32,
        members: Vec<BeadId>,
        spring: f64,
        rest_length: f64,
    ) -> Self {
        let bonds = members
            .windows(2)
            .map(|pair| Bond::new(pair[0], pair[1], spring, rest_length))
            .collect();
        Self {
            id,
            kind,
            members,
            bonds,
        }
    }

    /// Number of member beads.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Whether the polymer has no members.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Bonds whose head is `id`.
    pub fn bonds_headed_by(&self, id: BeadId) -> impl Iterator<Item = &Bond> {
        self.bonds.iter().filter(move |b| b.head == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chain_bonds_consecutive_members() {
        let members: Vec<BeadId> = (0..4).map(BeadId).collect();
        let polymer = Polymer::chain(PolymerId(7), 1, members, 64.0, 0.5);
        assert_eq!(polymer.bonds.len(), 3);
        assert_eq!(polymer.bonds[1].head, BeadId(1));
        assert_eq!(polymer.bonds[1].tail, BeadId(2));
        assert_eq!(polymer.bonds_headed_by(BeadId(3)).count(), 0);
        assert!(polymer.bonds[2].touches(BeadId(3)));
    }
}
