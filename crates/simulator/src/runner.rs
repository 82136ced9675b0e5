//! Runs a configured workload to completion.

use crate::SimulatorConfig;
use meso_simbox::InitialState;
use meso_simulation::{RunError, RunReport, SimulationRunner};
use meso_workload::generate;
use tracing::info;

/// Generates the initial state and drives every rank through the run.
pub struct Simulator {
    config: SimulatorConfig,
    state: InitialState,
}

impl Simulator {
    /// Validate the configuration and generate the initial state.
    pub fn new(config: SimulatorConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let state = generate(&config.workload, config.simbox.domain);
        info!(
            kind = ?config.workload.kind,
            seed = config.workload.seed,
            beads = state.bead_count(),
            polymers = state.polymers.len(),
            "Generated initial state"
        );
        Ok(Self { config, state })
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn initial_state(&self) -> &InitialState {
        &self.state
    }

    /// Run every configured step.
    pub fn run(&self) -> Result<RunReport, RunError> {
        SimulationRunner::new(self.config.simulation()).run(&self.state, &self.config.engine)
    }
}
