//! Pre-send and post-receive payload checks.

use crate::MessageKind;
use glam::DVec3;
use meso_types::{BeadId, Pid, PolymerId};
use thiserror::Error;

/// What a payload is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValidationContext {
    /// Rank running the check.
    pub rank: Pid,
    /// World size, bounding every rank in the payload and envelope.
    pub world_size: usize,
    /// Peer rank of the exchange, if any.
    pub peer: Option<Pid>,
    /// Extent of the frame positions are expressed in.
    ///
    /// When set, every position must lie in `[0, extent)` per axis.
    pub extent: Option<DVec3>,
}

impl ValidationContext {
    /// Context with no peer and no frame extent.
    pub fn new(rank: Pid, world_size: usize) -> Self {
        Self {
            rank,
            world_size,
            peer: None,
            extent: None,
        }
    }

    /// Builder: set the peer rank.
    pub fn with_peer(mut self, peer: Pid) -> Self {
        self.peer = Some(peer);
        self
    }

    /// Builder: set the frame extent.
    pub fn with_extent(mut self, extent: DVec3) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Check a vector is finite and, if an extent is set, inside the frame.
    pub fn check_position(
        &self,
        kind: MessageKind,
        field: &'static str,
        index: usize,
        value: DVec3,
    ) -> Result<(), ValidationError> {
        if !value.is_finite() {
            return Err(ValidationError::NonFinite { kind, field, index });
        }
        if let Some(extent) = self.extent {
            for axis in 0..3 {
                if value[axis] < 0.0 || value[axis] >= extent[axis] {
                    return Err(ValidationError::OutOfFrame {
                        kind,
                        field,
                        index,
                        axis,
                        value: value[axis],
                    });
                }
            }
        }
        Ok(())
    }

    /// Check a vector is finite.
    pub fn check_finite(
        &self,
        kind: MessageKind,
        field: &'static str,
        index: usize,
        value: DVec3,
    ) -> Result<(), ValidationError> {
        if value.is_finite() {
            Ok(())
        } else {
            Err(ValidationError::NonFinite { kind, field, index })
        }
    }

    /// Check a rank is inside the world.
    pub fn check_rank(&self, field: &'static str, pid: Pid) -> Result<(), ValidationError> {
        if pid.index() < self.world_size {
            Ok(())
        } else {
            Err(ValidationError::RankOutOfRange {
                field,
                pid,
                world_size: self.world_size,
            })
        }
    }
}

/// A payload or envelope invariant that does not hold.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("{kind} message holds {count} elements, capacity is {max}")]
    CapacityExceeded {
        kind: MessageKind,
        count: usize,
        max: usize,
    },

    #[error("{kind} message encodes to {bytes} bytes, capacity is {max}")]
    ByteCapacityExceeded {
        kind: MessageKind,
        bytes: usize,
        max: usize,
    },

    #[error("{kind} field {field} has {found} entries, expected {expected}")]
    LengthMismatch {
        kind: MessageKind,
        field: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("{kind} element {index} carries the invalid bead id")]
    InvalidId { kind: MessageKind, index: usize },

    #[error("{kind} element {index} field {field} is not finite")]
    NonFinite {
        kind: MessageKind,
        field: &'static str,
        index: usize,
    },

    #[error("{kind} element {index} field {field} axis {axis} = {value} is outside the frame")]
    OutOfFrame {
        kind: MessageKind,
        field: &'static str,
        index: usize,
        axis: usize,
        value: f64,
    },

    #[error("{bead} belongs to {polymer} but the bundle carries no record for it")]
    MissingPolymer { bead: BeadId, polymer: PolymerId },

    #[error("{field} rank {pid} is outside a world of {world_size}")]
    RankOutOfRange {
        field: &'static str,
        pid: Pid,
        world_size: usize,
    },
}

impl ValidationError {
    /// Name of the field that failed, for diagnostics.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::CapacityExceeded { .. } => "count",
            ValidationError::ByteCapacityExceeded { .. } => "bytes",
            ValidationError::LengthMismatch { field, .. } => *field,
            ValidationError::InvalidId { .. } => "ids",
            ValidationError::NonFinite { field, .. } => *field,
            ValidationError::OutOfFrame { field, .. } => *field,
            ValidationError::MissingPolymer { .. } => "polymers",
            ValidationError::RankOutOfRange { field, .. } => *field,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_position_frame_bounds() {
        let ctx = ValidationContext::new(Pid(0), 2).with_extent(DVec3::splat(10.0));
        let kind = MessageKind::Coordinates;
        assert!(ctx.check_position(kind, "positions", 0, DVec3::ZERO).is_ok());
        let err = ctx
            .check_position(kind, "positions", 3, DVec3::new(1.0, 10.0, 1.0))
            .unwrap_err();
        assert!(matches!(err, ValidationError::OutOfFrame { axis: 1, index: 3, .. }));
        assert_eq!(err.field(), "positions");
        assert!(ctx
            .check_position(kind, "positions", 0, DVec3::new(-0.1, 0.0, 0.0))
            .is_err());
    }

    #[test]
    fn test_non_finite_rejected_without_extent() {
        let ctx = ValidationContext::new(Pid(0), 1);
        let err = ctx
            .check_position(MessageKind::Forces, "forces", 0, DVec3::new(f64::NAN, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, ValidationError::NonFinite { .. }));
    }

    #[test]
    fn test_rank_bounds() {
        let ctx = ValidationContext::new(Pid(0), 4);
        assert!(ctx.check_rank("peer", Pid(3)).is_ok());
        assert!(ctx.check_rank("peer", Pid(4)).is_err());
    }
}
