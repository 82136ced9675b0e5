//! Transport trait for tagged point-to-point frames.
//!
//! Frames are opaque byte buffers. Encoding, validation and typing happen one
//! layer up in `meso-messages`.

use meso_types::{Pid, Tag};
use std::fmt;
use std::time::Duration;

/// Error returned when a transport operation fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("rank {pid} is outside a world of {world_size} processes")]
    UnknownRank { pid: Pid, world_size: usize },

    #[error("peer {0} disconnected")]
    PeerDisconnected(Pid),

    #[error("no outstanding operation for token {0}")]
    UnknownToken(Token),

    #[error("receive from {from} on {tag} timed out after {waited:?}")]
    Timeout {
        from: Pid,
        tag: Tag,
        waited: Duration,
    },
}

/// Opaque completion handle for a non-blocking operation.
///
/// Each token is valid for exactly one [`Transport::wait`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Token(u64);

impl Token {
    /// Wrap a raw token value. Only transport implementations mint tokens.
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw token value.
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Result of a completed non-blocking operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// A send has been handed to the substrate.
    Sent,
    /// A receive has matched a frame.
    Received(Vec<u8>),
}

/// Point-to-point transport for one process.
///
/// Ordering contract: frames sent from one process to another with the same
/// tag are delivered in send order. Posted receives for the same
/// (sender, tag) pair are matched in posting order. Nothing is guaranteed
/// across different tags.
///
/// Methods take `&self`; implementations use interior mutability. The trait
/// requires `Send` so a transport can move onto the thread that drives its
/// process.
pub trait Transport: Send {
    /// This process's rank.
    fn rank(&self) -> Pid;

    /// Number of processes in the world.
    fn world_size(&self) -> usize;

    /// Blocking send.
    fn send(&self, to: Pid, tag: Tag, frame: Vec<u8>) -> Result<(), TransportError>;

    /// Blocking receive of the next frame from `from` with `tag`.
    fn recv(&self, from: Pid, tag: Tag) -> Result<Vec<u8>, TransportError>;

    /// Start a non-blocking send.
    fn isend(&self, to: Pid, tag: Tag, frame: Vec<u8>) -> Result<Token, TransportError>;

    /// Post a non-blocking receive.
    fn irecv(&self, from: Pid, tag: Tag) -> Result<Token, TransportError>;

    /// Block until the operation identified by `token` completes.
    fn wait(&self, token: Token) -> Result<Completion, TransportError>;

    /// Check that `pid` names a process in this world.
    fn check_rank(&self, pid: Pid) -> Result<(), TransportError> {
        if pid.index() < self.world_size() {
            Ok(())
        } else {
            Err(TransportError::UnknownRank {
                pid,
                world_size: self.world_size(),
            })
        }
    }
}
