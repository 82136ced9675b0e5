//! Payload kinds.
//!
//! Each kind carries only the fields it needs. Parallel arrays are used where
//! every element has the same shape; relocation carries whole bead records
//! plus the polymer metadata that travels with them.

mod coordinates;
mod forces;
mod relocation;
mod scalar;

pub use coordinates::CoordinateBundle;
pub use forces::ForceBundle;
pub use relocation::RelocationBundle;
pub use scalar::ScalarAggregate;

use crate::{CodecError, ValidationContext, ValidationError};
use bytes::BytesMut;
use std::fmt;

/// The closed set of message kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MessageKind {
    /// Read-only bead copies for force computation.
    Coordinates,
    /// Per-bead force contributions keyed by id.
    Forces,
    /// Beads and polymer records changing owner.
    Relocation,
    /// Small integer/float vectors for coordination.
    Scalar,
}

impl MessageKind {
    /// Every kind.
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Coordinates,
        MessageKind::Forces,
        MessageKind::Relocation,
        MessageKind::Scalar,
    ];

    /// Canonical string id.
    pub fn name(self) -> &'static str {
        match self {
            MessageKind::Coordinates => "coordinates",
            MessageKind::Forces => "forces",
            MessageKind::Relocation => "relocation",
            MessageKind::Scalar => "scalar",
        }
    }

    pub(crate) fn wire_id(self) -> u8 {
        match self {
            MessageKind::Coordinates => 1,
            MessageKind::Forces => 2,
            MessageKind::Relocation => 3,
            MessageKind::Scalar => 4,
        }
    }

    pub(crate) fn from_wire_id(id: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.wire_id() == id)
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Typed message payload.
///
/// `len` is the element count checked against the capacity and written into
/// the frame header; `decode` receives that count back.
pub trait Payload: Default + Clone + fmt::Debug + Send {
    /// Kind tag written into every frame.
    const KIND: MessageKind;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the payload holds no elements.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every element, keeping allocations.
    fn clear(&mut self);

    /// Append the encoded fields to `buf`.
    fn encode(&self, buf: &mut BytesMut);

    /// Decode `count` elements from the front of `buf`.
    fn decode(count: usize, buf: &mut &[u8]) -> Result<Self, CodecError>;

    /// Check payload invariants.
    fn validate(&self, ctx: &ValidationContext) -> Result<(), ValidationError>;
}

/// Check that a parallel array has the expected length.
pub(crate) fn check_parallel(
    kind: MessageKind,
    field: &'static str,
    expected: usize,
    found: usize,
) -> Result<(), ValidationError> {
    if expected == found {
        Ok(())
    } else {
        Err(ValidationError::LengthMismatch {
            kind,
            field,
            expected,
            found,
        })
    }
}
