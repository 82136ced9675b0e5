use crate::{MetricsRecorder, RunningStats};
use meso_types::{BeadId, Direction, DIRECTION_COUNT};
use std::collections::BTreeMap;
use std::fmt;

/// Counting recorder kept by the driver, one per rank.
#[derive(Debug, Clone, Default)]
pub struct StepCounters {
    departures: [u64; DIRECTION_COUNT],
    arrivals: [u64; DIRECTION_COUNT],
    ghosts: [u64; DIRECTION_COUNT],
    force_replies: [u64; DIRECTION_COUNT],
    self_images: u64,
    departed_per_step: RunningStats,
    arrived_per_step: RunningStats,
    missing_bond_partners: u64,
    first_missing_bond: Option<(BeadId, BeadId)>,
    messages: BTreeMap<&'static str, (u64, u64)>,
}

impl StepCounters {
    /// Empty counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Beads sent toward `direction`.
    pub fn departures(&self, direction: Direction) -> u64 {
        self.departures[direction.index()]
    }

    /// Beads received travelling in `direction`.
    pub fn arrivals(&self, direction: Direction) -> u64 {
        self.arrivals[direction.index()]
    }

    /// Total beads sent.
    pub fn total_departures(&self) -> u64 {
        self.departures.iter().sum()
    }

    /// Total beads received.
    pub fn total_arrivals(&self) -> u64 {
        self.arrivals.iter().sum()
    }

    /// Net outflow across the boundary facing `direction`.
    ///
    /// Beads leaving through that side travel in `direction`; beads entering
    /// through it travel in the opposite one.
    pub fn net_flux(&self, direction: Direction) -> i64 {
        self.departures(direction) as i64 - self.arrivals(direction.opposite()) as i64
    }

    /// Ghosts staged from `direction`.
    pub fn ghosts(&self, direction: Direction) -> u64 {
        self.ghosts[direction.index()]
    }

    /// Periodic self-images created.
    pub fn self_images(&self) -> u64 {
        self.self_images
    }

    /// Force contributions returned toward `direction`.
    pub fn force_replies(&self, direction: Direction) -> u64 {
        self.force_replies[direction.index()]
    }

    /// Per-step departure statistics.
    pub fn departed_per_step(&self) -> &RunningStats {
        &self.departed_per_step
    }

    /// Per-step arrival statistics.
    pub fn arrived_per_step(&self) -> &RunningStats {
        &self.arrived_per_step
    }

    /// Bonds whose tail could not be found.
    pub fn missing_bond_partners(&self) -> u64 {
        self.missing_bond_partners
    }

    /// (messages, elements) sent on `channel`.
    pub fn messages(&self, channel: &str) -> (u64, u64) {
        self.messages.get(channel).copied().unwrap_or_default()
    }

    /// Fold another rank's counters into these.
    pub fn merge(&mut self, other: &StepCounters) {
        for i in 0..DIRECTION_COUNT {
            self.departures[i] += other.departures[i];
            self.arrivals[i] += other.arrivals[i];
            self.ghosts[i] += other.ghosts[i];
            self.force_replies[i] += other.force_replies[i];
        }
        self.self_images += other.self_images;
        self.departed_per_step.merge(&other.departed_per_step);
        self.arrived_per_step.merge(&other.arrived_per_step);
        self.missing_bond_partners += other.missing_bond_partners;
        if self.first_missing_bond.is_none() {
            self.first_missing_bond = other.first_missing_bond;
        }
        for (channel, (count, elements)) in &other.messages {
            let entry = self.messages.entry(*channel).or_default();
            entry.0 += count;
            entry.1 += elements;
        }
    }

    /// Human-readable summary.
    pub fn summary(&self) -> CountersSummary<'_> {
        CountersSummary(self)
    }
}

impl MetricsRecorder for StepCounters {
    fn record_departures(&mut self, direction: Direction, count: usize) {
        self.departures[direction.index()] += count as u64;
    }

    fn record_arrivals(&mut self, direction: Direction, count: usize) {
        self.arrivals[direction.index()] += count as u64;
    }

    fn record_migration(&mut self, _step: u64, departed: usize, arrived: usize) {
        self.departed_per_step.push(departed as f64);
        self.arrived_per_step.push(arrived as f64);
    }

    fn record_ghosts(&mut self, direction: Direction, count: usize) {
        self.ghosts[direction.index()] += count as u64;
    }

    fn record_self_images(&mut self, count: usize) {
        self.self_images += count as u64;
    }

    fn record_force_replies(&mut self, direction: Direction, count: usize) {
        self.force_replies[direction.index()] += count as u64;
    }

    fn record_missing_bond_partner(&mut self, head: BeadId, tail: BeadId) {
        self.missing_bond_partners += 1;
        self.first_missing_bond.get_or_insert((head, tail));
    }

    fn record_message_sent(&mut self, channel: &'static str, elements: usize) {
        let entry = self.messages.entry(channel).or_default();
        entry.0 += 1;
        entry.1 += elements as u64;
    }
}

/// Display adapter for [`StepCounters`].
pub struct CountersSummary<'a>(&'a StepCounters);

impl fmt::Display for CountersSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let c = self.0;
        writeln!(
            f,
            "crossings: {} departed, {} arrived",
            c.total_departures(),
            c.total_arrivals()
        )?;
        writeln!(
            f,
            "per step: departed mean {:.3} var {:.3}, arrived mean {:.3} var {:.3}",
            c.departed_per_step.mean(),
            c.departed_per_step.variance(),
            c.arrived_per_step.mean(),
            c.arrived_per_step.variance()
        )?;
        for direction in Direction::all() {
            let (out, flux) = (c.departures(direction), c.net_flux(direction));
            if out > 0 || flux != 0 {
                writeln!(f, "  {direction:<7} out {out:>8} net {flux:>+8}")?;
            }
        }
        for (channel, (count, elements)) in &c.messages {
            writeln!(f, "  {channel:<18} {count:>8} msgs {elements:>10} elements")?;
        }
        write!(f, "missing bond partners: {}", c.missing_bond_partners)?;
        if let Some((head, tail)) = c.first_missing_bond {
            write!(f, " (first {head} -> {tail})")?;
        }
        Ok(())
    }
}
