//! Multi-rank driver for the decomposition layer.
//!
//! Runs one [`SimBox`](meso_simbox::SimBox) per rank, each on its own
//! thread, over an in-memory world. Ranks only meet through the transport,
//! exactly as separate processes would.
//!
//! ```text
//! ┌──────────────────────── SimulationRunner ────────────────────────┐
//! │                                                                  │
//! │   thread P0          thread P1                thread Pn          │
//! │  ┌─────────┐        ┌─────────┐              ┌─────────┐         │
//! │  │ SimBox  │        │ SimBox  │     ...      │ SimBox  │         │
//! │  └────┬────┘        └────┬────┘              └────┬────┘         │
//! │       │                  │                        │              │
//! │  ┌────┴──────────────────┴────────────────────────┴────┐         │
//! │  │        MemoryWorld (tagged FIFO channels)           │         │
//! │  └─────────────────────────────────────────────────────┘         │
//! │                                                                  │
//! │  per step: force sync → position sync → periodic bead total      │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod runner;

pub use config::SimulationConfig;
pub use runner::{RankFailure, RankOutcome, RunError, RunReport, SimulationRunner};
