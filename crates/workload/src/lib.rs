//! Workloads for driving a decomposed simulation.
//!
//! - [`generate`]: seeded initial states (random gas, polymer chains, lattice)
//! - [`SoftRepulsion`] and [`Ballistic`]: reference [`PhysicsEngine`]s
//!
//! [`PhysicsEngine`]: meso_simbox::PhysicsEngine

mod config;
mod engines;
mod generators;

pub use config::{WorkloadConfig, WorkloadKind};
pub use engines::{Ballistic, SoftRepulsion};
pub use generators::generate;
