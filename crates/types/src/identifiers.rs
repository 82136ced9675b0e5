//! Identifier newtypes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Process identifier: the rank of a process in the transport world.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Pid(pub u32);

impl Pid {
    /// The root process used for coordination messages.
    pub const ROOT: Pid = Pid(0);

    /// Index form for addressing per-rank vectors.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "P{}", self.0)
    }
}

/// Globally unique bead identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BeadId(pub u64);

impl BeadId {
    /// Reserved value that never names a live bead.
    pub const INVALID: BeadId = BeadId(u64::MAX);

    /// Whether this id can name a live bead.
    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }
}

impl fmt::Display for BeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "bead#{}", self.0)
    }
}

/// Bead type, as understood by the physics engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct BeadKind(pub u32);

/// Globally unique polymer identifier.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct PolymerId(pub u64);

impl fmt::Display for PolymerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "polymer#{}", self.0)
    }
}

/// Message tag disambiguating concurrent in-flight messages between the same
/// pair of processes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct Tag(pub u32);

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tag:{}", self.0)
    }
}
