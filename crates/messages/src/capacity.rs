//! Capacity model.
//!
//! Every message kind declares a maximum element count and a maximum encoded
//! size. Exceeding either is a validation failure; payloads are never
//! truncated to fit.

use crate::MessageKind;
use serde::{Deserialize, Serialize};

/// Limits for one message kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageCapacity {
    /// Maximum number of payload elements.
    pub max_elements: usize,
    /// Maximum encoded (uncompressed) frame size in bytes.
    pub max_bytes: usize,
}

impl MessageCapacity {
    /// Create a capacity.
    pub const fn new(max_elements: usize, max_bytes: usize) -> Self {
        Self {
            max_elements,
            max_bytes,
        }
    }
}

/// Capacities for every message kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Capacities {
    pub coordinates: MessageCapacity,
    pub forces: MessageCapacity,
    pub relocation: MessageCapacity,
    pub scalar: MessageCapacity,
}

impl Default for Capacities {
    fn default() -> Self {
        Self {
            coordinates: MessageCapacity::new(65_536, 8 * 1024 * 1024),
            forces: MessageCapacity::new(65_536, 4 * 1024 * 1024),
            relocation: MessageCapacity::new(16_384, 8 * 1024 * 1024),
            scalar: MessageCapacity::new(1_024, 64 * 1024),
        }
    }
}

impl Capacities {
    /// Capacity of `kind`.
    pub fn for_kind(&self, kind: MessageKind) -> MessageCapacity {
        match kind {
            MessageKind::Coordinates => self.coordinates,
            MessageKind::Forces => self.forces,
            MessageKind::Relocation => self.relocation,
            MessageKind::Scalar => self.scalar,
        }
    }

    /// Builder: override the capacity of `kind`.
    pub fn with(mut self, kind: MessageKind, capacity: MessageCapacity) -> Self {
        match kind {
            MessageKind::Coordinates => self.coordinates = capacity,
            MessageKind::Forces => self.forces = capacity,
            MessageKind::Relocation => self.relocation = capacity,
            MessageKind::Scalar => self.scalar = capacity,
        }
        self
    }
}
