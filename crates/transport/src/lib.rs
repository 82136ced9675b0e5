//! Transport boundary for inter-process messaging.
//!
//! This crate contains substrate-independent pieces:
//!
//! - [`Transport`]: rank/world-size queries, blocking and non-blocking
//!   point-to-point send/receive, and completion waits
//! - [`wire`]: LZ4 compress/decompress helpers for message frames
//!
//! Any substrate preserving FIFO order per (sender, receiver, tag) can
//! implement [`Transport`]. The in-process implementation lives in
//! `meso-transport-memory`.

mod traits;
pub mod wire;

pub use traits::{Completion, Token, Transport, TransportError};
pub use wire::{compress, decompress, decompress_bounded, WireError};
