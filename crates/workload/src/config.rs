//! Workload configuration.

use serde::{Deserialize, Serialize};

/// Shape of the generated initial state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkloadKind {
    /// Free beads at uniformly random positions.
    #[default]
    Gas,
    /// Linear polymer chains, each laid out as a random walk.
    Chains,
    /// Beads on a regular lattice filling the domain.
    Lattice,
}

/// What to generate and how.
///
/// The same seed always yields the same state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadConfig {
    pub kind: WorkloadKind,

    /// Free beads for `Gas`, beads per axis for `Lattice`.
    pub beads: usize,

    /// Number of chains for `Chains`.
    pub chains: usize,

    /// Beads per chain.
    pub chain_length: usize,

    /// Number of bead kinds to draw from.
    pub kinds: u32,

    /// Largest initial speed along any axis.
    pub max_speed: f64,

    /// Harmonic bond constant for chains.
    pub bond_spring: f64,

    /// Bond rest length, also the random-walk step.
    pub bond_length: f64,

    pub seed: u64,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            kind: WorkloadKind::Gas,
            beads: 500,
            chains: 20,
            chain_length: 8,
            kinds: 2,
            max_speed: 0.5,
            bond_spring: 64.0,
            bond_length: 0.5,
            seed: 42,
        }
    }
}

impl WorkloadConfig {
    /// Free beads at random positions.
    pub fn gas(beads: usize) -> Self {
        Self {
            kind: WorkloadKind::Gas,
            beads,
            ..Self::default()
        }
    }

    /// Random-walk chains.
    pub fn chains(chains: usize, chain_length: usize) -> Self {
        Self {
            kind: WorkloadKind::Chains,
            chains,
            chain_length,
            ..Self::default()
        }
    }

    /// A lattice with `per_axis` beads along each axis.
    pub fn lattice(per_axis: usize) -> Self {
        Self {
            kind: WorkloadKind::Lattice,
            beads: per_axis,
            ..Self::default()
        }
    }

    /// Builder: set the seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Builder: set the largest initial speed.
    pub fn with_max_speed(mut self, max_speed: f64) -> Self {
        self.max_speed = max_speed;
        self
    }

    /// Builder: set the number of bead kinds.
    pub fn with_kinds(mut self, kinds: u32) -> Self {
        self.kinds = kinds.max(1);
        self
    }

    /// Builder: set the bond constant and rest length.
    pub fn with_bonds(mut self, spring: f64, length: f64) -> Self {
        self.bond_spring = spring;
        self.bond_length = length;
        self
    }

    /// Total beads the configuration produces.
    pub fn bead_count(&self) -> usize {
        match self.kind {
            WorkloadKind::Gas => self.beads,
            WorkloadKind::Chains => self.chains * self.chain_length,
            WorkloadKind::Lattice => self.beads.pow(3),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bead_count_per_kind() {
        assert_eq!(WorkloadConfig::gas(10).bead_count(), 10);
        assert_eq!(WorkloadConfig::chains(3, 4).bead_count(), 12);
        assert_eq!(WorkloadConfig::lattice(3).bead_count(), 27);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WorkloadConfig = toml::from_str("kind = \"chains\"\nchains = 4\nseed = 7").unwrap();
        assert_eq!(config.kind, WorkloadKind::Chains);
        assert_eq!(config.chains, 4);
        assert_eq!(config.seed, 7);
        assert_eq!(config.chain_length, WorkloadConfig::default().chain_length);
    }
}
