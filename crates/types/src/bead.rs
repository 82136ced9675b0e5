//! Bead record.

use crate::{BeadId, BeadKind, PolymerId};
use glam::DVec3;
use serde::{Deserialize, Serialize};

/// A single simulated particle.
///
/// `position` is always expressed in the frame of whichever container holds
/// the bead: global coordinates in an initial state, the owning Space's local
/// frame once loaded. `unwrapped` is global and never wrapped, so it
/// accumulates the true displacement across periodic boundaries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bead {
    pub id: BeadId,
    pub kind: BeadKind,
    pub position: DVec3,
    pub unwrapped: DVec3,
    pub velocity: DVec3,
    pub force: DVec3,
    pub polymer: Option<PolymerId>,
}

impl Bead {
    /// Create a free bead at rest.
    pub fn new(id: BeadId, kind: BeadKind, position: DVec3) -> Self {
        Self {
            id,
            kind,
            position,
            unwrapped: position,
            velocity: DVec3::ZERO,
            force: DVec3::ZERO,
            polymer: None,
        }
    }

    /// Builder: set the velocity.
    pub fn with_velocity(mut self, velocity: DVec3) -> Self {
        self.velocity = velocity;
        self
    }

    /// Builder: attach to a polymer.
    pub fn with_polymer(mut self, polymer: PolymerId) -> Self {
        self.polymer = Some(polymer);
        self
    }

    /// Whether every vector field is finite.
    pub fn is_finite(&self) -> bool {
        self.position.is_finite()
            && self.unwrapped.is_finite()
            && self.velocity.is_finite()
            && self.force.is_finite()
    }
}
