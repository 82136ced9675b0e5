//! Simulator configuration, loadable from TOML.

use anyhow::{bail, Context};
use glam::DVec3;
use meso_simbox::SimBoxConfig;
use meso_simulation::SimulationConfig;
use meso_transport_memory::MemoryConfig;
use meso_workload::{SoftRepulsion, WorkloadConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Everything one `meso-sim` run needs.
///
/// Every field has a default, so a TOML file only lists what it changes:
///
/// ```toml
/// steps = 500
///
/// [simbox]
/// domain = [20.0, 20.0, 10.0]
/// grid = { x = 2, y = 2, z = 1 }
///
/// [workload]
/// kind = "chains"
/// chains = 40
///
/// [engine]
/// damping = 4.5
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub simbox: SimBoxConfig,
    pub workload: WorkloadConfig,
    pub engine: SoftRepulsion,

    pub steps: u64,

    /// Zero disables the periodic bead-total check.
    pub total_check_interval: u64,

    /// Interval between "still waiting" warnings on a blocked receive.
    pub stall_warning_ms: u64,

    /// Give up on a blocked receive after this long. Unset waits forever.
    pub wait_deadline_ms: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            simbox: SimBoxConfig::default(),
            workload: WorkloadConfig::default(),
            engine: SoftRepulsion::default().with_damping(4.5),
            steps: 100,
            total_check_interval: 10,
            stall_warning_ms: 5_000,
            wait_deadline_ms: None,
        }
    }
}

impl SimulatorConfig {
    /// Parse a TOML document.
    pub fn from_toml(text: &str) -> anyhow::Result<Self> {
        toml::from_str(text).context("invalid simulator configuration")
    }

    /// Read and parse a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        Self::from_toml(&text).with_context(|| format!("in {}", path.display()))
    }

    /// Builder: set the step count.
    pub fn with_steps(mut self, steps: u64) -> Self {
        self.steps = steps;
        self
    }

    /// Builder: set the workload.
    pub fn with_workload(mut self, workload: WorkloadConfig) -> Self {
        self.workload = workload;
        self
    }

    /// Builder: set the SimBox configuration.
    pub fn with_simbox(mut self, simbox: SimBoxConfig) -> Self {
        self.simbox = simbox;
        self
    }

    /// Reject settings no run could complete with.
    pub fn validate(&self) -> anyhow::Result<()> {
        let [cx, cy, cz] = self.simbox.cells_per_space;
        let widths = self.simbox.space_extent() / DVec3::new(cx as f64, cy as f64, cz as f64);
        let narrowest = widths.min_element();
        if self.engine.cutoff > narrowest {
            bail!(
                "engine cutoff {} exceeds the narrowest cell width {narrowest}",
                self.engine.cutoff
            );
        }
        if self.engine.dt <= 0.0 {
            bail!("time step must be positive, got {}", self.engine.dt);
        }
        Ok(())
    }

    /// Settings for the multi-rank runner.
    pub fn simulation(&self) -> SimulationConfig {
        let mut transport =
            MemoryConfig::default().with_stall_warning(Duration::from_millis(self.stall_warning_ms));
        if let Some(ms) = self.wait_deadline_ms {
            transport = transport.with_wait_deadline(Duration::from_millis(ms));
        }
        SimulationConfig::new(self.simbox.clone())
            .with_steps(self.steps)
            .with_total_check_interval(self.total_check_interval)
            .with_transport(transport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_types::GridShape;
    use meso_workload::WorkloadKind;

    #[test]
    fn test_empty_document_is_default() {
        assert_eq!(
            SimulatorConfig::from_toml("").unwrap(),
            SimulatorConfig::default()
        );
    }

    #[test]
    fn test_partial_document() {
        let config = SimulatorConfig::from_toml(
            r#"
            steps = 7
            wait_deadline_ms = 2500

            [simbox.grid]
            x = 2
            y = 2
            z = 1

            [workload]
            kind = "chains"
            chains = 3

            [engine]
            dt = 0.02
            "#,
        )
        .unwrap();

        assert_eq!(config.steps, 7);
        assert_eq!(config.simbox.grid, GridShape::new(2, 2, 1));
        assert_eq!(config.workload.kind, WorkloadKind::Chains);
        assert_eq!(config.workload.chain_length, WorkloadConfig::default().chain_length);
        assert_eq!(config.engine.dt, 0.02);
        assert_eq!(config.engine.repulsion, 25.0);

        let simulation = config.simulation();
        assert_eq!(simulation.steps, 7);
        assert_eq!(
            simulation.transport.wait_deadline,
            Some(Duration::from_millis(2500))
        );
    }

    #[test]
    fn test_no_deadline_unless_configured() {
        let simulation = SimulatorConfig::default().simulation();
        assert_eq!(simulation.transport.wait_deadline, None);
        assert_eq!(simulation.transport.stall_warning, Duration::from_secs(5));
    }

    #[test]
    fn test_unknown_kind_rejected() {
        let result = SimulatorConfig::from_toml("[workload]\nkind = \"plasma\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_cutoff_wider_than_cell_rejected() {
        let mut config = SimulatorConfig::default();
        config.engine.cutoff = 4.0;
        let message = config.validate().unwrap_err().to_string();
        assert!(message.contains("cutoff"), "{message}");
        assert!(SimulatorConfig::default().validate().is_ok());
    }
}
