//! SimBox: one process's share of a spatially decomposed bead simulation.
//!
//! The global periodic domain is cut into a lattice of equal Spaces, one per
//! process. A [`SimBox`] owns one Space and keeps it consistent with its
//! neighbours through two exchanges per step:
//!
//! - **Force sync** ([`SimBox::sync_forces`]): boundary beads are copied into
//!   the neighbours' halos, pair and bond forces are computed over real and
//!   halo cells, and forces accumulated on remote copies are returned to their
//!   owners by id.
//! - **Position sync** ([`SimBox::sync_positions`]): beads are advanced, and
//!   those leaving the Space are handed to exactly one neighbour together with
//!   the polymer records they belong to.
//!
//! The process grid decides the topology:
//!
//! | Grid | Topology | Message directions |
//! |------|----------|--------------------|
//! | one split axis | Linear | 2 faces |
//! | two split axes | Planar | 4 faces, 4 edges |
//! | three split axes | Cubic | 6 faces, 12 edges, 8 corners |
//!
//! Axes the grid does not split wrap onto the Space itself through periodic
//! images, so no message ever travels along them.
//!
//! Physics stays behind [`PhysicsEngine`]; the SimBox only decides which pairs
//! and bonds are evaluated and where the results go.

mod config;
mod discovery;
mod engine;
mod error;
mod exchange;
mod forces;
mod migration;
mod polymers;
mod simbox;
mod state;

pub use config::SimBoxConfig;
pub use engine::{Particle, PhysicsEngine};
pub use error::{ProtocolError, SetupError, StepError};
pub use forces::ForceReport;
pub use migration::MigrationReport;
pub use polymers::{Coherence, PolymerRegistry};
pub use simbox::{SimBox, StepReport, HANDSHAKE_ID, TOTALS_ID};
pub use state::InitialState;
