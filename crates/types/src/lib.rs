//! Core types for the mesoscale decomposition layer.
//!
//! This crate provides the foundational types used throughout the
//! decomposition and boundary-exchange implementation:
//!
//! - **Identifiers**: [`Pid`], [`BeadId`], [`PolymerId`], [`BeadKind`], [`Tag`]
//! - **Process grid**: [`GridShape`], [`GridCoord`], [`NeighbourTable`]
//! - **Directions**: the 26 face/edge/corner offsets and their [`RegionKind`]
//! - **Particles**: [`Bead`], [`Polymer`], [`Bond`]
//!
//! # Design Philosophy
//!
//! This crate is self-contained with minimal dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod bead;
mod direction;
mod grid;
mod identifiers;
mod polymer;

pub use bead::Bead;
pub use direction::{Direction, RegionKind, DIRECTION_COUNT, FORWARD_DIRECTION_COUNT};
pub use grid::{GridCoord, GridError, GridShape, NeighbourTable, TopologyKind};
pub use identifiers::{BeadId, BeadKind, Pid, PolymerId, Tag};
pub use polymer::{Bond, Polymer};

/// Re-exported vector type used for positions, velocities and forces.
pub use glam::DVec3;

/// Axis names, indexed the same way as vector components.
pub const AXES: [char; 3] = ['x', 'y', 'z'];
