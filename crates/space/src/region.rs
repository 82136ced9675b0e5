//! Border regions and their per-step phase machine.

use crate::{Ghost, Slot, Space, SpaceError};
use meso_types::{Direction, Pid, RegionKind};
use std::fmt;

/// Where a region is in the current force step.
///
/// The cycle is `Cleared → Populating → AwaitingPeer → Populated →
/// Consumed`, then back to `Cleared` on the next step. A fresh region starts
/// in `Consumed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegionPhase {
    /// Halo cells emptied for this step.
    Cleared,
    /// Outgoing boundary beads collected.
    Populating,
    /// Outgoing data handed to the transport, halo open for staging.
    AwaitingPeer,
    /// Halo complete; shared forces may be computed.
    Populated,
    /// Shared forces computed.
    Consumed,
}

impl RegionPhase {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RegionPhase::Cleared => "cleared",
            RegionPhase::Populating => "populating",
            RegionPhase::AwaitingPeer => "awaiting-peer",
            RegionPhase::Populated => "populated",
            RegionPhase::Consumed => "consumed",
        }
    }

    fn next(self) -> RegionPhase {
        match self {
            RegionPhase::Cleared => RegionPhase::Populating,
            RegionPhase::Populating => RegionPhase::AwaitingPeer,
            RegionPhase::AwaitingPeer => RegionPhase::Populated,
            RegionPhase::Populated => RegionPhase::Consumed,
            RegionPhase::Consumed => RegionPhase::Cleared,
        }
    }
}

impl fmt::Display for RegionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Whether a region borders another process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionRole {
    /// All non-zero components of the direction lie on single-process axes:
    /// the region only ever faces periodic images of this Space.
    Internal,
    /// The region faces `neighbour`.
    External { neighbour: Pid },
}

/// One of the 26 face, edge or corner regions of a Space.
#[derive(Debug, Clone)]
pub struct BorderRegion {
    pub(crate) direction: Direction,
    pub(crate) role: RegionRole,
    pub(crate) cells: Vec<usize>,
    pub(crate) halo_cells: Vec<usize>,
    pub(crate) adjacency: Vec<Direction>,
    pub(crate) slab_cells: Vec<usize>,
    pub(crate) message: bool,
    pub(crate) phase: RegionPhase,
    pub(crate) outgoing: Vec<Slot>,
}

impl BorderRegion {
    /// Direction naming this region.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Face, edge or corner.
    pub fn kind(&self) -> RegionKind {
        self.direction.region_kind()
    }

    /// Internal or external.
    pub fn role(&self) -> RegionRole {
        self.role
    }

    /// Whether the region faces another process.
    pub fn is_external(&self) -> bool {
        matches!(self.role, RegionRole::External { .. })
    }

    /// Process on the far side, if any.
    pub fn neighbour(&self) -> Option<Pid> {
        match self.role {
            RegionRole::External { neighbour } => Some(neighbour),
            RegionRole::Internal => None,
        }
    }

    /// Whether this region owns a message exchanged with its neighbour.
    pub fn is_message_direction(&self) -> bool {
        self.message
    }

    /// Real cells owned by this region.
    pub fn cells(&self) -> &[usize] {
        &self.cells
    }

    /// Halo cells on this region's side.
    pub fn halo_cells(&self) -> &[usize] {
        &self.halo_cells
    }

    /// Regions whose cells this region collects, itself included.
    pub fn adjacency(&self) -> &[Direction] {
        &self.adjacency
    }

    /// Current phase.
    pub fn phase(&self) -> RegionPhase {
        self.phase
    }

    /// Slots gathered by the last collection, until packaged.
    pub fn outgoing(&self) -> &[Slot] {
        &self.outgoing
    }

    fn advance(&mut self, to: RegionPhase) -> Result<(), SpaceError> {
        if self.phase.next() != to {
            return Err(SpaceError::IllegalTransition {
                direction: self.direction,
                from: self.phase,
                to,
            });
        }
        self.phase = to;
        Ok(())
    }

    // ─── Operations ─────────────────────────────────────────────────────

    /// Empty the halo cells on this region's side. Once per step.
    pub fn clear_external_cells(&mut self, space: &mut Space) -> Result<(), SpaceError> {
        self.advance(RegionPhase::Cleared)?;
        space.halo_mut().clear_cells(&self.halo_cells);
        self.outgoing.clear();
        Ok(())
    }

    /// Gather the beads to send across this region's side.
    ///
    /// For a message-owning region this is the whole slab of cells on its
    /// side; otherwise only the region's own cells.
    pub fn collect_local_boundary_particles(&mut self, space: &Space) -> Result<&[Slot], SpaceError> {
        self.advance(RegionPhase::Populating)?;
        self.outgoing.clear();
        for &cell in &self.slab_cells {
            self.outgoing.extend_from_slice(space.cell_slots(cell));
        }
        Ok(&self.outgoing)
    }

    /// Drop the cached outgoing slots once they are packaged.
    pub fn remove_stale_external_references(&mut self) {
        self.outgoing.clear();
    }

    /// Outgoing data is with the transport; open the halo for staging.
    pub fn mark_sent(&mut self) -> Result<(), SpaceError> {
        self.advance(RegionPhase::AwaitingPeer)
    }

    /// Bin a translated remote copy into this region's halo.
    pub fn stage_external_particle(&mut self, space: &mut Space, ghost: Ghost) -> Result<usize, SpaceError> {
        if self.phase != RegionPhase::AwaitingPeer {
            return Err(SpaceError::StagingClosed {
                direction: self.direction,
                phase: self.phase,
            });
        }
        space.stage_ghost(ghost, self.direction)
    }

    /// Every expected copy has been staged.
    pub fn mark_populated(&mut self) -> Result<(), SpaceError> {
        self.advance(RegionPhase::Populated)
    }

    /// Shared forces against this region's halo have been computed.
    pub fn mark_consumed(&mut self) -> Result<(), SpaceError> {
        self.advance(RegionPhase::Consumed)
    }
}
