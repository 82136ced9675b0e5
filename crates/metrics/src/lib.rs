//! Metrics for the decomposition layer.
//!
//! Provides a [`MetricsRecorder`] trait with domain-specific hooks and default
//! no-op implementations. Recorders are per-instance: the driver owns one per
//! rank and passes it into every step, so there is no process-wide state.
//!
//! # Usage
//!
//! ```ignore
//! let mut counters = StepCounters::new();
//! simbox.step(&engine, &mut counters)?;
//! println!("{}", counters.summary());
//! ```
//!
//! [`NoopRecorder`] discards everything; [`StepCounters`] keeps per-direction
//! crossing totals, running per-step statistics and diagnostic counts.

mod counters;
mod stats;

pub use counters::{CountersSummary, StepCounters};
pub use stats::RunningStats;

use meso_types::{BeadId, Direction};

// ═══════════════════════════════════════════════════════════════════════
// Trait
// ═══════════════════════════════════════════════════════════════════════

/// Domain-specific metrics recording trait.
///
/// All methods have default no-op implementations so recorders only need
/// to override the metrics they care about.
#[allow(unused_variables)]
pub trait MetricsRecorder {
    // ── Ownership transfer ───────────────────────────────────────────

    /// Record beads sent to the neighbour in `direction`.
    fn record_departures(&mut self, direction: Direction, count: usize) {}

    /// Record beads received that were travelling in `direction`.
    fn record_arrivals(&mut self, direction: Direction, count: usize) {}

    /// Record the totals of one completed position sync.
    fn record_migration(&mut self, step: u64, departed: usize, arrived: usize) {}

    // ── Force exchange ───────────────────────────────────────────────

    /// Record ghosts staged from the neighbour in `direction`.
    fn record_ghosts(&mut self, direction: Direction, count: usize) {}

    /// Record periodic self-images created along single-process axes.
    fn record_self_images(&mut self, count: usize) {}

    /// Record force contributions returned to the neighbour in `direction`.
    fn record_force_replies(&mut self, direction: Direction, count: usize) {}

    /// Record a bond whose tail was found neither locally nor in the halo.
    fn record_missing_bond_partner(&mut self, head: BeadId, tail: BeadId) {}

    // ── Messaging ────────────────────────────────────────────────────

    /// Record a message sent on `channel` with `elements` payload elements.
    fn record_message_sent(&mut self, channel: &'static str, elements: usize) {}
}

/// Recorder that discards every metric.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopRecorder;

impl MetricsRecorder for NoopRecorder {}
