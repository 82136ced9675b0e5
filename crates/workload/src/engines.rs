//! Reference physics engines.

use glam::DVec3;
use meso_simbox::{Particle, PhysicsEngine};
use meso_types::{Bead, Bond};
use serde::{Deserialize, Serialize};

/// Soft DPD-style repulsion with an optional velocity-dependent damping term
/// and harmonic bonds, integrated with explicit Euler.
///
/// For `r < cutoff` with `w = 1 - r / cutoff`:
///
/// ```text
/// F = repulsion * w * r̂  -  damping * w² * (r̂ · v_ab) * r̂
/// ```
///
/// The damping term has no random partner, so the engine is deterministic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SoftRepulsion {
    pub cutoff: f64,
    pub repulsion: f64,
    pub damping: f64,
    pub mass: f64,
    pub dt: f64,
    /// Per-step displacement limit; zero disables it.
    pub max_step: f64,
}

impl Default for SoftRepulsion {
    fn default() -> Self {
        Self {
            cutoff: 1.0,
            repulsion: 25.0,
            damping: 0.0,
            mass: 1.0,
            dt: 0.01,
            max_step: 0.0,
        }
    }
}

impl SoftRepulsion {
    /// Builder: set the cutoff.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Builder: set the repulsion amplitude.
    pub fn with_repulsion(mut self, repulsion: f64) -> Self {
        self.repulsion = repulsion;
        self
    }

    /// Builder: set the damping coefficient.
    pub fn with_damping(mut self, damping: f64) -> Self {
        self.damping = damping;
        self
    }

    /// Builder: set the time step.
    pub fn with_dt(mut self, dt: f64) -> Self {
        self.dt = dt;
        self
    }

    /// Builder: cap the distance a bead may travel per step.
    pub fn with_max_step(mut self, max_step: f64) -> Self {
        self.max_step = max_step;
        self
    }
}

impl PhysicsEngine for SoftRepulsion {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn pair_force(&self, a: &Particle, b: &Particle, separation: DVec3) -> DVec3 {
        let r = separation.length();
        if r >= self.cutoff || r <= f64::EPSILON {
            return DVec3::ZERO;
        }
        let unit = separation / r;
        let w = 1.0 - r / self.cutoff;
        let mut force = self.repulsion * w * unit;
        if self.damping != 0.0 {
            force -= self.damping * w * w * unit.dot(a.velocity - b.velocity) * unit;
        }
        force
    }

    fn bond_force(&self, bond: &Bond, separation: DVec3) -> DVec3 {
        harmonic(bond, separation)
    }

    fn advance(&self, bead: &mut Bead) {
        bead.velocity += bead.force * (self.dt / self.mass);
        let mut step = bead.velocity * self.dt;
        if self.max_step > 0.0 {
            step = step.clamp_length_max(self.max_step);
        }
        bead.position += step;
        bead.unwrapped += step;
    }
}

/// Beads move in straight lines, `position += velocity * dt`, and feel no
/// force. Bonds still report harmonic forces so bond bookkeeping can be
/// observed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ballistic {
    pub cutoff: f64,
    pub dt: f64,
}

impl Default for Ballistic {
    fn default() -> Self {
        Self {
            cutoff: 1.0,
            dt: 1.0,
        }
    }
}

impl Ballistic {
    /// Engine with the given cutoff and a unit time step.
    pub fn new(cutoff: f64) -> Self {
        Self { cutoff, dt: 1.0 }
    }
}

impl PhysicsEngine for Ballistic {
    fn cutoff(&self) -> f64 {
        self.cutoff
    }

    fn pair_force(&self, _: &Particle, _: &Particle, _: DVec3) -> DVec3 {
        DVec3::ZERO
    }

    fn bond_force(&self, bond: &Bond, separation: DVec3) -> DVec3 {
        harmonic(bond, separation)
    }

    fn advance(&self, bead: &mut Bead) {
        let step = bead.velocity * self.dt;
        bead.position += step;
        bead.unwrapped += step;
    }
}

/// `-k (r - r0) r̂`, zero for coincident ends.
fn harmonic(bond: &Bond, separation: DVec3) -> DVec3 {
    let r = separation.length();
    if r <= f64::EPSILON {
        return DVec3::ZERO;
    }
    -bond.spring * (r - bond.rest_length) * (separation / r)
}
