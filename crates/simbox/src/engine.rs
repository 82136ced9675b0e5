//! Boundary to the physics engine.

use glam::DVec3;
use meso_types::{Bead, BeadId, BeadKind, Bond};

/// What a pair interaction may depend on besides the separation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Particle {
    pub id: BeadId,
    pub kind: BeadKind,
    pub velocity: DVec3,
}

impl From<&Bead> for Particle {
    fn from(bead: &Bead) -> Self {
        Self {
            id: bead.id,
            kind: bead.kind,
            velocity: bead.velocity,
        }
    }
}

/// Force laws and integrator driven by the SimBox.
///
/// The SimBox decides which pairs and bonds are evaluated and where the
/// results go; the engine only supplies the numbers. Pair forces must vanish
/// at and beyond [`cutoff`](Self::cutoff).
pub trait PhysicsEngine {
    /// Pair interaction range.
    fn cutoff(&self) -> f64;

    /// Force on `a` from `b`, given `separation = a.position - b.position`.
    ///
    /// The force on `b` is the negation.
    fn pair_force(&self, a: &Particle, b: &Particle, separation: DVec3) -> DVec3;

    /// Force on the bond head, given `separation = head - tail`.
    fn bond_force(&self, bond: &Bond, separation: DVec3) -> DVec3;

    /// Integrate one bead over one step using its accumulated force.
    ///
    /// Must move `position` and `unwrapped` by the same displacement.
    fn advance(&self, bead: &mut Bead);
}
