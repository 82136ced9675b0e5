//! Bulk plus 26 border regions, built once per assembled Space.

use crate::region::{BorderRegion, RegionPhase, RegionRole};
use crate::{Space, SpaceError, SpaceGeometry};
use meso_types::{Direction, NeighbourTable, DIRECTION_COUNT};
use tracing::debug;

/// Disjoint partition of a Space's real cells.
#[derive(Debug, Clone)]
pub struct Partition {
    bulk: Vec<usize>,
    regions: Vec<BorderRegion>,
    split: [bool; 3],
    message_directions: Vec<Direction>,
}

impl Partition {
    /// Partition `geometry` for a process with the given neighbours.
    ///
    /// `split` marks the axes with more than one process.
    pub fn build(geometry: &SpaceGeometry, neighbours: &NeighbourTable, split: [bool; 3]) -> Self {
        let mut bulk = Vec::new();
        let mut cells = vec![Vec::new(); DIRECTION_COUNT];
        let mut halo_cells = vec![Vec::new(); DIRECTION_COUNT];
        for index in 0..geometry.arena_len() {
            let coord = geometry.coord(index);
            if geometry.is_real(coord) {
                match geometry.boundary_direction(coord) {
                    Some(d) => cells[d.index()].push(index),
                    None => bulk.push(index),
                }
            } else if let Some(d) = geometry.halo_direction(coord) {
                halo_cells[d.index()].push(index);
            }
        }

        let message_directions: Vec<Direction> = Direction::all()
            .filter(|d| d.project(split) == Some(*d))
            .collect();

        let mut regions = Vec::with_capacity(DIRECTION_COUNT);
        for direction in Direction::all() {
            let role = match (direction.project(split), neighbours.get(direction)) {
                (Some(_), Some(neighbour)) => RegionRole::External { neighbour },
                _ => RegionRole::Internal,
            };
            let message = message_directions.contains(&direction);
            let adjacency: Vec<Direction> = if message {
                Direction::all().filter(|d| d.contains(direction)).collect()
            } else {
                vec![direction]
            };
            let slab_cells = adjacency
                .iter()
                .flat_map(|d| cells[d.index()].iter().copied())
                .collect();
            regions.push(BorderRegion {
                direction,
                role,
                cells: std::mem::take(&mut cells[direction.index()]),
                halo_cells: std::mem::take(&mut halo_cells[direction.index()]),
                adjacency,
                slab_cells,
                message,
                phase: RegionPhase::Consumed,
                outgoing: Vec::new(),
            });
        }

        debug!(
            bulk = bulk.len(),
            messages = message_directions.len(),
            external = regions.iter().filter(|r| r.is_external()).count(),
            "Space partitioned"
        );
        Self {
            bulk,
            regions,
            split,
            message_directions,
        }
    }

    /// Bulk cells: real cells touching no boundary.
    pub fn bulk(&self) -> &[usize] {
        &self.bulk
    }

    /// Region for `direction`.
    pub fn region(&self, direction: Direction) -> &BorderRegion {
        &self.regions[direction.index()]
    }

    /// Region for `direction`, mutably.
    pub fn region_mut(&mut self, direction: Direction) -> &mut BorderRegion {
        &mut self.regions[direction.index()]
    }

    /// All 26 regions in direction-index order.
    pub fn regions(&self) -> &[BorderRegion] {
        &self.regions
    }

    /// Axes with more than one process.
    pub fn split_axes(&self) -> [bool; 3] {
        self.split
    }

    /// Axes with a single process, where the Space wraps onto itself.
    pub fn unsplit_axes(&self) -> [bool; 3] {
        self.split.map(|s| !s)
    }

    /// Directions that own a message to a neighbour.
    pub fn message_directions(&self) -> &[Direction] {
        &self.message_directions
    }

    /// Regions whose cells travel with the message of `direction`.
    pub fn slab(&self, direction: Direction) -> &[Direction] {
        self.region(direction).adjacency()
    }

    /// Where a bead with exit signs `signs` must be sent, if anywhere.
    pub fn departure_direction(&self, signs: [i8; 3]) -> Option<Direction> {
        Direction::from_components(signs)?.project(self.split)
    }

    /// Real cells of external regions.
    pub fn external_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .filter(|r| r.is_external())
            .flat_map(|r| r.cells.iter().copied())
    }

    /// Real cells of internal regions and Bulk.
    pub fn internal_cells(&self) -> impl Iterator<Item = usize> + '_ {
        self.regions
            .iter()
            .filter(|r| !r.is_external())
            .flat_map(|r| r.cells.iter().copied())
            .chain(self.bulk.iter().copied())
    }

    // ─── Step phases ────────────────────────────────────────────────────

    /// Clear every region's halo and drop last step's ghosts.
    pub fn clear_external_cells(&mut self, space: &mut Space) -> Result<(), SpaceError> {
        for region in &mut self.regions {
            region.clear_external_cells(space)?;
        }
        space.halo_mut().reset_storage();
        Ok(())
    }

    /// Move every region to `AwaitingPeer` once outgoing data is sent.
    ///
    /// Regions without a message of their own skip collection.
    pub fn open_halos(&mut self, space: &Space) -> Result<(), SpaceError> {
        for region in &mut self.regions {
            if region.phase == RegionPhase::Cleared {
                region.collect_local_boundary_particles(space)?;
                region.remove_stale_external_references();
            }
            region.mark_sent()?;
        }
        Ok(())
    }

    /// Mark every region populated.
    pub fn mark_populated(&mut self) -> Result<(), SpaceError> {
        self.regions.iter_mut().try_for_each(BorderRegion::mark_populated)
    }

    /// Mark every region consumed.
    pub fn mark_consumed(&mut self) -> Result<(), SpaceError> {
        self.regions.iter_mut().try_for_each(BorderRegion::mark_consumed)
    }
}
