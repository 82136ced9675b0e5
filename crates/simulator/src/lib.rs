//! Command-line simulator for the decomposition layer.
//!
//! Loads a [`SimulatorConfig`] (TOML, every field optional), generates a
//! seeded initial state with `meso-workload`, and runs it over the
//! in-memory transport with one thread per rank.
//!
//! # Example
//!
//! ```ignore
//! use meso_simulator::{Simulator, SimulatorConfig};
//! use meso_workload::WorkloadConfig;
//!
//! let config = SimulatorConfig::default()
//!     .with_steps(200)
//!     .with_workload(WorkloadConfig::chains(40, 8));
//!
//! let report = Simulator::new(config)?.run()?;
//! println!("{}", report.counters.summary());
//! println!("{}", report.traffic);
//! ```

mod config;
mod runner;

pub use config::SimulatorConfig;
pub use runner::Simulator;
