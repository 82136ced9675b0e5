//! Spatial layout of one process's share of the simulation domain.
//!
//! A [`Space`] holds the beads a process owns in a slot arena, binned into
//! cells at least one interaction cutoff wide. Around the real cells sits one
//! layer of halo cells (the external wrapper) that receives [`Ghost`] copies
//! of beads owned by neighbours, or periodic images of local beads along axes
//! the process grid does not split.
//!
//! A [`Partition`] splits the real cells into Bulk and 26 [`BorderRegion`]s:
//!
//! | Boundary signature | Region |
//! |--------------------|--------|
//! | one non-zero axis | Face |
//! | two non-zero axes | Edge |
//! | three non-zero axes | Corner |
//!
//! Each region steps through [`RegionPhase`] once per force exchange.

mod geometry;
mod halo;
mod partition;
mod region;
mod space;

pub use geometry::{clamp_into_frame, CellCoord, GeometryError, SpaceGeometry};
pub use halo::{Ghost, GhostOrigin, Halo, ImageOf};
pub use partition::Partition;
pub use region::{BorderRegion, RegionPhase, RegionRole};
pub use space::{Slot, Space, SpaceError};
