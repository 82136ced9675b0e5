//! Polymer records held by one rank.
//!
//! A rank keeps the record of every polymer with at least one member in its
//! Space. A polymer whose members are all local is coherent; one with members
//! elsewhere is extended. Records arrive with relocated members and are
//! dropped once the last local member leaves.

use meso_space::Space;
use meso_types::{Bond, Polymer, PolymerId};
use std::collections::HashMap;
use tracing::trace;

/// Whether every member of a polymer is held locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coherence {
    Coherent,
    Extended,
}

#[derive(Debug, Clone)]
struct Tracked {
    polymer: Polymer,
    local_members: usize,
}

/// Polymer records keyed by id.
#[derive(Debug, Clone, Default)]
pub struct PolymerRegistry {
    polymers: HashMap<PolymerId, Tracked>,
}

impl PolymerRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held.
    pub fn len(&self) -> usize {
        self.polymers.len()
    }

    /// Whether no record is held.
    pub fn is_empty(&self) -> bool {
        self.polymers.is_empty()
    }

    /// Record for `id`.
    pub fn get(&self, id: PolymerId) -> Option<&Polymer> {
        self.polymers.get(&id).map(|t| &t.polymer)
    }

    /// Members of `id` held locally, as of the last refresh.
    pub fn local_members(&self, id: PolymerId) -> Option<usize> {
        self.polymers.get(&id).map(|t| t.local_members)
    }

    /// Coherence of `id`, as of the last refresh.
    pub fn coherence(&self, id: PolymerId) -> Option<Coherence> {
        self.polymers.get(&id).map(|t| {
            if t.local_members == t.polymer.len() {
                Coherence::Coherent
            } else {
                Coherence::Extended
            }
        })
    }

    /// Records held, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &Polymer> + '_ {
        self.polymers.values().map(|t| &t.polymer)
    }

    /// Every bond of every record held.
    pub fn bonds(&self) -> impl Iterator<Item = &Bond> + '_ {
        self.iter().flat_map(|p| p.bonds.iter())
    }

    /// Add a record unless one is already held. Counts start at zero until
    /// the next [`refresh`](Self::refresh).
    pub fn insert(&mut self, polymer: Polymer) {
        self.polymers.entry(polymer.id).or_insert(Tracked {
            polymer,
            local_members: 0,
        });
    }

    /// Recount local members of `id`, dropping the record if none remain.
    pub fn refresh(&mut self, id: PolymerId, space: &Space) -> Option<Coherence> {
        let tracked = self.polymers.get_mut(&id)?;
        tracked.local_members = tracked
            .polymer
            .members
            .iter()
            .filter(|m| space.contains(**m))
            .count();
        if tracked.local_members == 0 {
            self.polymers.remove(&id);
            trace!(polymer = %id, "Polymer record dropped");
            return None;
        }
        self.coherence(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;
    use meso_space::SpaceGeometry;
    use meso_types::{Bead, BeadId, BeadKind};

    #[test]
    fn test_coherence_follows_members() {
        let geometry =
            SpaceGeometry::new(DVec3::ZERO, DVec3::splat(10.0), [4, 4, 4], 1.0).unwrap();
        let mut space = Space::new(geometry);
        let pid = PolymerId(1);
        let mut registry = PolymerRegistry::new();
        registry.insert(Polymer::chain(pid, 0, vec![BeadId(1), BeadId(2)], 1.0, 0.5));
        for id in [1, 2] {
            space
                .insert(Bead::new(BeadId(id), BeadKind(0), DVec3::splat(1.0)).with_polymer(pid))
                .unwrap();
        }
        assert_eq!(registry.refresh(pid, &space), Some(Coherence::Coherent));
        space.remove(BeadId(2)).unwrap();
        assert_eq!(registry.refresh(pid, &space), Some(Coherence::Extended));
        assert_eq!(registry.local_members(pid), Some(1));
        space.remove(BeadId(1)).unwrap();
        assert_eq!(registry.refresh(pid, &space), None);
        assert!(registry.is_empty());
    }
}
