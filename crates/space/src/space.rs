//! Bead arena and cell lists for one Space.

use crate::halo::{Ghost, GhostOrigin, Halo, ImageOf};
use crate::{CellCoord, RegionPhase, SpaceGeometry};
use glam::DVec3;
use meso_types::{Bead, BeadId, Direction, Pid};
use std::collections::HashMap;
use thiserror::Error;
use tracing::trace;

/// Position of a bead in the arena. Stable while the bead stays local.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(pub usize);

/// Errors from arena and region operations.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpaceError {
    #[error("{0} is already held in this Space")]
    DuplicateBead(BeadId),

    #[error("{id} at {position} lies outside the Space")]
    OutsideSpace { id: BeadId, position: DVec3 },

    #[error("{0} is not held in this Space")]
    UnknownBead(BeadId),

    #[error("Ghost {id} at {position} lies outside the {side} halo")]
    GhostOutsideRegion {
        id: BeadId,
        side: Direction,
        position: DVec3,
    },

    #[error("Region {direction} cannot move from {from} to {to}")]
    IllegalTransition {
        direction: Direction,
        from: RegionPhase,
        to: RegionPhase,
    },

    #[error("Region {direction} cannot stage ghosts while {phase}")]
    StagingClosed {
        direction: Direction,
        phase: RegionPhase,
    },
}

#[derive(Debug, Clone)]
struct Resident {
    bead: Bead,
    cell: usize,
}

/// The beads owned by one process, binned into cells, plus the halo overlay.
#[derive(Debug, Clone)]
pub struct Space {
    geometry: SpaceGeometry,
    slots: Vec<Option<Resident>>,
    free: Vec<Slot>,
    index: HashMap<BeadId, Slot>,
    cells: Vec<Vec<Slot>>,
    halo: Halo,
}

impl Space {
    /// Empty Space with the given geometry.
    pub fn new(geometry: SpaceGeometry) -> Self {
        let arena_len = geometry.arena_len();
        Self {
            geometry,
            slots: Vec::new(),
            free: Vec::new(),
            index: HashMap::new(),
            cells: vec![Vec::new(); arena_len],
            halo: Halo::new(arena_len),
        }
    }

    /// Geometry of this Space.
    pub fn geometry(&self) -> &SpaceGeometry {
        &self.geometry
    }

    /// Number of beads held.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether no bead is held.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    // ─── Arena ──────────────────────────────────────────────────────────

    /// Insert a bead whose position is in the local frame.
    pub fn insert(&mut self, bead: Bead) -> Result<Slot, SpaceError> {
        if self.index.contains_key(&bead.id) {
            return Err(SpaceError::DuplicateBead(bead.id));
        }
        let coord = self
            .geometry
            .real_cell_of(bead.position)
            .ok_or(SpaceError::OutsideSpace {
                id: bead.id,
                position: bead.position,
            })?;
        let cell = self.geometry.index(coord);
        let id = bead.id;
        let resident = Resident { bead, cell };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.slots[slot.0] = Some(resident);
                slot
            }
            None => {
                self.slots.push(Some(resident));
                Slot(self.slots.len() - 1)
            }
        };
        self.index.insert(id, slot);
        self.cells[cell].push(slot);
        Ok(slot)
    }

    /// Remove a bead, returning it.
    pub fn remove(&mut self, id: BeadId) -> Result<Bead, SpaceError> {
        let slot = self.index.remove(&id).ok_or(SpaceError::UnknownBead(id))?;
        let resident = self.slots[slot.0]
            .take()
            .ok_or(SpaceError::UnknownBead(id))?;
        let list = &mut self.cells[resident.cell];
        if let Some(pos) = list.iter().position(|s| *s == slot) {
            list.swap_remove(pos);
        }
        self.free.push(slot);
        Ok(resident.bead)
    }

    /// Slot of a bead.
    pub fn slot_of(&self, id: BeadId) -> Option<Slot> {
        self.index.get(&id).copied()
    }

    /// Whether a bead is held here.
    pub fn contains(&self, id: BeadId) -> bool {
        self.index.contains_key(&id)
    }

    /// Bead in a slot.
    pub fn bead(&self, slot: Slot) -> Option<&Bead> {
        self.slots.get(slot.0)?.as_ref().map(|r| &r.bead)
    }

    /// Bead in a slot, mutably.
    ///
    /// Moving the bead leaves it in its old cell until [`rebin`](Self::rebin).
    pub fn bead_mut(&mut self, slot: Slot) -> Option<&mut Bead> {
        self.slots.get_mut(slot.0)?.as_mut().map(|r| &mut r.bead)
    }

    /// Bead by id.
    pub fn get(&self, id: BeadId) -> Option<&Bead> {
        self.bead(self.slot_of(id)?)
    }

    /// Every held bead with its slot, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (Slot, &Bead)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (Slot(i), &r.bead)))
    }

    /// Slots binned in an arena cell.
    pub fn cell_slots(&self, cell: usize) -> &[Slot] {
        self.cells.get(cell).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Arena cell a slot is binned in.
    pub fn cell_of_slot(&self, slot: Slot) -> Option<usize> {
        self.slots.get(slot.0)?.as_ref().map(|r| r.cell)
    }

    /// Re-bin every bead from its current position.
    ///
    /// Returns the number of beads that changed cell.
    pub fn rebin(&mut self) -> Result<usize, SpaceError> {
        let mut moved = 0;
        for i in 0..self.slots.len() {
            let Some(resident) = self.slots[i].as_mut() else {
                continue;
            };
            let coord = self
                .geometry
                .real_cell_of(resident.bead.position)
                .ok_or(SpaceError::OutsideSpace {
                    id: resident.bead.id,
                    position: resident.bead.position,
                })?;
            let cell = self.geometry.index(coord);
            if cell == resident.cell {
                continue;
            }
            let old = std::mem::replace(&mut resident.cell, cell);
            let list = &mut self.cells[old];
            if let Some(pos) = list.iter().position(|s| s.0 == i) {
                list.swap_remove(pos);
            }
            self.cells[cell].push(Slot(i));
            moved += 1;
        }
        Ok(moved)
    }

    /// Zero the force on every held bead.
    pub fn zero_forces(&mut self) {
        for resident in self.slots.iter_mut().flatten() {
            resident.bead.force = DVec3::ZERO;
        }
    }

    /// Add to the force on a bead.
    pub fn add_force(&mut self, slot: Slot, force: DVec3) {
        if let Some(bead) = self.bead_mut(slot) {
            bead.force += force;
        }
    }

    // ─── Halo ───────────────────────────────────────────────────────────

    /// The halo overlay.
    pub fn halo(&self) -> &Halo {
        &self.halo
    }

    /// Add to the force on a ghost.
    pub fn add_ghost_force(&mut self, ghost: usize, force: DVec3) {
        self.halo.add_force(ghost, force);
    }

    pub(crate) fn halo_mut(&mut self) -> &mut Halo {
        &mut self.halo
    }

    /// Bin a ghost into the halo cell on `side` under its position.
    ///
    /// Returns the arena cell. Positions not next to `side` are rejected.
    pub(crate) fn stage_ghost(&mut self, mut ghost: Ghost, side: Direction) -> Result<usize, SpaceError> {
        let Some((coord, position)) = self.geometry.halo_cell_of(ghost.position, side) else {
            return Err(SpaceError::GhostOutsideRegion {
                id: ghost.id,
                side,
                position: ghost.position,
            });
        };
        ghost.position = position;
        let cell = self.geometry.index(coord);
        self.halo.push(cell, ghost);
        Ok(cell)
    }

    /// Fill the halo along single-process axes with periodic images.
    ///
    /// Axes are visited in x, y, z order and images made on one axis are
    /// imaged again on the next, so every halo cell reached only through
    /// unsplit axes ends up populated. Returns the number of images created.
    pub fn add_periodic_images(&mut self, unsplit: [bool; 3]) -> Result<usize, SpaceError> {
        let mut created = 0;
        let n = self.geometry.cells();
        let extent = self.geometry.extent();
        for axis in (0..3).filter(|a| unsplit[*a]) {
            let last = n[axis] as i32 - 1;
            // Shift and the halo side the image lands on.
            let shift_for = |c: CellCoord| -> Option<(f64, Direction)> {
                let mut target = c;
                let shift = if c.0[axis] == 0 {
                    target.0[axis] = n[axis] as i32;
                    extent[axis]
                } else if c.0[axis] == last {
                    target.0[axis] = -1;
                    -extent[axis]
                } else {
                    return None;
                };
                self.geometry.halo_direction(target).map(|side| (shift, side))
            };

            let mut images = Vec::new();
            for (slot, bead) in self.iter() {
                let Some(coord) = self.cell_of_slot(slot).map(|i| self.geometry.coord(i)) else {
                    continue;
                };
                if let Some((shift, side)) = shift_for(coord) {
                    let mut position = bead.position;
                    position[axis] += shift;
                    images.push((side, Ghost {
                        id: bead.id,
                        kind: bead.kind,
                        position,
                        velocity: bead.velocity,
                        force: DVec3::ZERO,
                        origin: GhostOrigin::Image(ImageOf::Local(slot)),
                    }));
                }
            }
            for (index, ghost) in self.halo.ghosts().iter().enumerate() {
                let Some(coord) = self.geometry.arena_cell_of(ghost.position) else {
                    continue;
                };
                if let Some((shift, side)) = shift_for(coord) {
                    let mut position = ghost.position;
                    position[axis] += shift;
                    let source = match ghost.origin {
                        GhostOrigin::Remote { .. } => ImageOf::Ghost(index),
                        GhostOrigin::Image(source) => source,
                    };
                    images.push((side, Ghost {
                        id: ghost.id,
                        kind: ghost.kind,
                        position,
                        velocity: ghost.velocity,
                        force: DVec3::ZERO,
                        origin: GhostOrigin::Image(source),
                    }));
                }
            }

            created += images.len();
            for (side, image) in images {
                self.stage_ghost(image, side)?;
            }
        }
        trace!(images = created, "Periodic images added");
        Ok(created)
    }

    /// Move forces accumulated on images to their sources.
    ///
    /// Afterwards only remote ghosts carry force that still has to be
    /// returned to another process.
    pub fn resolve_image_forces(&mut self) {
        let transfers: Vec<(ImageOf, DVec3)> = self
            .halo
            .ghosts()
            .iter()
            .filter_map(|g| match g.origin {
                GhostOrigin::Image(source) if g.force != DVec3::ZERO => Some((source, g.force)),
                _ => None,
            })
            .collect();
        for (source, force) in transfers {
            match source {
                ImageOf::Local(slot) => self.add_force(slot, force),
                ImageOf::Ghost(index) => self.halo.add_force(index, force),
            }
        }
        for ghost in self.halo.ghosts_mut() {
            if matches!(ghost.origin, GhostOrigin::Image(_)) {
                ghost.force = DVec3::ZERO;
            }
        }
    }

    /// Force owed to each remote owner, summed per id, grouped by halo side.
    ///
    /// Only non-zero totals are reported.
    pub fn remote_forces(&self) -> HashMap<Direction, (Pid, Vec<(BeadId, DVec3)>)> {
        let mut sums: HashMap<Direction, (Pid, HashMap<BeadId, DVec3>)> = HashMap::new();
        for ghost in self.halo.ghosts() {
            if let GhostOrigin::Remote { side, owner } = ghost.origin {
                let entry = sums.entry(side).or_insert_with(|| (owner, HashMap::new()));
                *entry.1.entry(ghost.id).or_insert(DVec3::ZERO) += ghost.force;
            }
        }
        sums.into_iter()
            .map(|(side, (owner, forces))| {
                let mut forces: Vec<(BeadId, DVec3)> = forces
                    .into_iter()
                    .filter(|(_, f)| *f != DVec3::ZERO)
                    .collect();
                forces.sort_unstable_by_key(|(id, _)| *id);
                (side, (owner, forces))
            })
            .collect()
    }
}
