//! Reusable message instances for every message direction.

use crate::SetupError;
use meso_messages::{
    Channel, CoordinateBundle, ForceBundle, Message, MessageRegistry, RelocationBundle,
};
use meso_space::Partition;
use meso_types::{Direction, NeighbourTable, Pid};

/// The six messages exchanged per message direction.
///
/// For direction `M` with neighbour `N = neighbour(M)`:
///
/// | message | peer | tag |
/// |---------|------|-----|
/// | `coordinates_out` | to `N` | ghost coordinates `M` |
/// | `coordinates_in` | from `N` | ghost coordinates `-M` |
/// | `forces_out` | to `N` | ghost forces `-M` |
/// | `forces_in` | from `N` | ghost forces `M` |
/// | `relocation_out` | to `N` | relocation `M` |
/// | `relocation_in` | from `neighbour(-M)` | relocation `M` |
#[derive(Debug)]
pub(crate) struct Lane {
    pub direction: Direction,
    pub neighbour: Pid,
    pub upstream: Pid,
    pub coordinates_out: Message<CoordinateBundle>,
    pub coordinates_in: Message<CoordinateBundle>,
    pub forces_out: Message<ForceBundle>,
    pub forces_in: Message<ForceBundle>,
    pub relocation_out: Message<RelocationBundle>,
    pub relocation_in: Message<RelocationBundle>,
}

#[derive(Debug)]
pub(crate) struct Exchange {
    pub lanes: Vec<Lane>,
}

impl Exchange {
    pub fn build(
        registry: &MessageRegistry,
        partition: &Partition,
        neighbours: &NeighbourTable,
    ) -> Result<Self, SetupError> {
        let mut lanes = Vec::with_capacity(partition.message_directions().len());
        for &m in partition.message_directions() {
            let neighbour = neighbours.get(m).ok_or(SetupError::MissingNeighbour(m))?;
            let upstream = neighbours
                .get(m.opposite())
                .ok_or(SetupError::MissingNeighbour(m.opposite()))?;
            lanes.push(Lane {
                direction: m,
                neighbour,
                upstream,
                coordinates_out: registry.coordinates(Channel::GhostCoordinates.tag(m)),
                coordinates_in: registry.coordinates(Channel::GhostCoordinates.tag(m.opposite())),
                forces_out: registry.forces(Channel::GhostForces.tag(m.opposite())),
                forces_in: registry.forces(Channel::GhostForces.tag(m)),
                relocation_out: registry.relocation(Channel::Relocation.tag(m)),
                relocation_in: registry.relocation(Channel::Relocation.tag(m)),
            });
        }
        Ok(Self { lanes })
    }

    pub fn lane_index(&self, direction: Direction) -> Option<usize> {
        self.lanes.iter().position(|l| l.direction == direction)
    }
}
