//! Driver configuration.

use meso_simbox::SimBoxConfig;
use meso_transport_memory::MemoryConfig;

/// Configuration for one multi-rank run.
#[derive(Debug, Clone)]
pub struct SimulationConfig {
    /// Shared by every rank.
    pub simbox: SimBoxConfig,

    /// In-memory world settings.
    pub transport: MemoryConfig,

    /// Full steps to run.
    pub steps: u64,

    /// Check the global bead total every this many steps. Zero disables the
    /// periodic check; the final total is always checked.
    pub total_check_interval: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            simbox: SimBoxConfig::default(),
            transport: MemoryConfig::default(),
            steps: 100,
            total_check_interval: 10,
        }
    }
}

impl SimulationConfig {
    /// Configuration around a SimBox configuration.
    pub fn new(simbox: SimBoxConfig) -> Self {
        Self {
            simbox,
            ..Self::default()
        }
    }

    /// Builder: set the number of steps.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Builder: set the conservation check interval.
    pub fn with_total_check_interval(mut self, interval: u64) -> Self {
        self.total_check_interval = interval;
        self
    }

    /// Builder: set the transport settings.
    pub fn with_transport(mut self, transport: MemoryConfig) -> Self {
        self.transport = transport;
        self
    }

    /// Number of ranks the run needs.
    pub fn world_size(&self) -> usize {
        self.simbox.grid.process_count()
    }
}
