//! SimBox configuration.

use glam::DVec3;
use meso_messages::Capacities;
use meso_types::GridShape;
use serde::{Deserialize, Serialize};

/// Static configuration shared by every rank of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimBoxConfig {
    /// Process lattice. Must tile the transport world.
    pub grid: GridShape,

    /// Global periodic domain extent.
    pub domain: DVec3,

    /// Real cells per Space along each axis (at least 2).
    pub cells_per_space: [usize; 3],

    /// Interaction cutoff the cell grid is sized for.
    ///
    /// The physics engine's cutoff may not exceed the resulting cell width.
    pub cutoff: f64,

    /// Per-kind message limits.
    pub capacities: Capacities,
}

impl Default for SimBoxConfig {
    fn default() -> Self {
        Self {
            grid: GridShape::new(2, 1, 1),
            domain: DVec3::new(20.0, 10.0, 10.0),
            cells_per_space: [4, 4, 4],
            cutoff: 1.0,
            capacities: Capacities::default(),
        }
    }
}

impl SimBoxConfig {
    /// Builder: set the process grid.
    pub fn with_grid(mut self, grid: GridShape) -> Self {
        self.grid = grid;
        self
    }

    /// Builder: set the domain extent.
    pub fn with_domain(mut self, domain: DVec3) -> Self {
        self.domain = domain;
        self
    }

    /// Builder: set the cells per Space.
    pub fn with_cells_per_space(mut self, cells: [usize; 3]) -> Self {
        self.cells_per_space = cells;
        self
    }

    /// Builder: set the cutoff.
    pub fn with_cutoff(mut self, cutoff: f64) -> Self {
        self.cutoff = cutoff;
        self
    }

    /// Builder: set the message capacities.
    pub fn with_capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Extent of one Space: the domain divided by the grid.
    pub fn space_extent(&self) -> DVec3 {
        let [x, y, z] = self.grid.dims();
        self.domain / DVec3::new(x as f64, y as f64, z as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meso_messages::MessageKind;

    #[test]
    fn test_space_extent() {
        let config = SimBoxConfig::default()
            .with_grid(GridShape::new(2, 2, 1))
            .with_domain(DVec3::new(20.0, 30.0, 10.0));
        assert_eq!(config.space_extent(), DVec3::new(10.0, 15.0, 10.0));
    }

    #[test]
    fn test_toml_overrides() {
        let config: SimBoxConfig = toml::from_str(
            r#"
            domain = [40.0, 20.0, 20.0]
            cells_per_space = [5, 5, 5]

            [grid]
            x = 2
            y = 2
            z = 1

            [capacities.relocation]
            max_elements = 8
            max_bytes = 4096
            "#,
        )
        .unwrap();
        assert_eq!(config.grid, GridShape::new(2, 2, 1));
        assert_eq!(config.cutoff, 1.0);
        assert_eq!(
            config.capacities.for_kind(MessageKind::Relocation).max_elements,
            8
        );
        assert_eq!(config.capacities.forces, Capacities::default().forces);
    }
}
