//! In-process transport for running a multi-process world on threads.
//!
//! [`MemoryWorld::connect`] builds one [`MemoryTransport`] per rank. Each
//! endpoint owns a crossbeam inbox; frames are matched to posted receives per
//! (sender, tag) in FIFO order, which is the ordering contract of
//! [`meso_transport::Transport`].
//!
//! [`TrafficAnalyzer`] tracks per-rank and per-tag message volume.

mod traffic;
mod world;

pub use traffic::{RankTraffic, TagTraffic, TrafficAnalyzer, TrafficReport};
pub use world::{MemoryConfig, MemoryTransport, MemoryWorld};
