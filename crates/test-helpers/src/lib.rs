//! Test helpers for the decomposition layer.
//!
//! - [`reference`]: serial O(N²) minimum-image forces to compare distributed
//!   results against
//! - [`ownership`]: single-ownership, conservation and placement assertions
//!   over per-rank snapshots
//! - [`world`]: one SimBox per thread over an in-memory world
//!
//! # Example
//!
//! ```ignore
//! use meso_test_helpers::{ownership, world};
//!
//! let snapshots = world::run_simboxes(&config, &state, |simbox| {
//!     simbox.step(&engine, &mut NoopRecorder).unwrap();
//!     simbox.global_beads()
//! });
//! ownership::assert_single_ownership(&snapshots);
//! ```

pub mod ownership;
pub mod reference;
pub mod world;

pub use ownership::{
    assert_conserved, assert_owned_by_position, assert_single_ownership, find_bead, owner_of,
};
pub use reference::{max_force_error, minimum_image, reference_forces};
pub use world::{run_ranks, run_simboxes, test_transport_config};
