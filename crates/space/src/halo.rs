//! External wrapper overlay.
//!
//! Ghosts are non-authoritative copies of beads owned elsewhere (or periodic
//! images of local ones) binned into the halo cells around a Space. The
//! overlay is index based and rebuilt every force step.

use crate::Slot;
use glam::DVec3;
use meso_types::{BeadId, BeadKind, Direction, Pid};
use std::collections::HashMap;

/// Where a ghost's accumulated force must go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GhostOrigin {
    /// Copy of a bead owned by `owner`, received from the neighbour on
    /// `side` of this Space.
    Remote { side: Direction, owner: Pid },
    /// Periodic image of a bead held in this Space.
    Image(ImageOf),
}

/// Source of a periodic image, resolved through chains of images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOf {
    /// A local bead.
    Local(Slot),
    /// A remote ghost, by index in the overlay.
    Ghost(usize),
}

/// A staged copy in a halo cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Ghost {
    pub id: BeadId,
    pub kind: BeadKind,
    pub position: DVec3,
    pub velocity: DVec3,
    pub force: DVec3,
    pub origin: GhostOrigin,
}

impl Ghost {
    /// Remote copy at `position`, already in the local frame.
    pub fn remote(
        id: BeadId,
        kind: BeadKind,
        position: DVec3,
        velocity: DVec3,
        side: Direction,
        owner: Pid,
    ) -> Self {
        Self {
            id,
            kind,
            position,
            velocity,
            force: DVec3::ZERO,
            origin: GhostOrigin::Remote { side, owner },
        }
    }
}

/// Ghost storage and per-cell ghost lists.
#[derive(Debug, Clone, Default)]
pub struct Halo {
    ghosts: Vec<Ghost>,
    cells: Vec<Vec<usize>>,
    by_id: HashMap<BeadId, Vec<usize>>,
}

impl Halo {
    pub(crate) fn new(arena_len: usize) -> Self {
        Self {
            ghosts: Vec::new(),
            cells: vec![Vec::new(); arena_len],
            by_id: HashMap::new(),
        }
    }

    /// Empty the ghost lists of the given cells.
    pub(crate) fn clear_cells(&mut self, cells: &[usize]) {
        for &cell in cells {
            self.cells[cell].clear();
        }
    }

    /// Drop ghost storage once every cell list has been cleared.
    pub(crate) fn reset_storage(&mut self) {
        debug_assert!(self.cells.iter().all(Vec::is_empty));
        self.ghosts.clear();
        self.by_id.clear();
    }

    pub(crate) fn push(&mut self, cell: usize, ghost: Ghost) -> usize {
        let index = self.ghosts.len();
        self.by_id.entry(ghost.id).or_default().push(index);
        self.ghosts.push(ghost);
        self.cells[cell].push(index);
        index
    }

    /// Number of staged ghosts.
    pub fn len(&self) -> usize {
        self.ghosts.len()
    }

    /// Whether nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ghosts.is_empty()
    }

    /// All ghosts, by index.
    pub fn ghosts(&self) -> &[Ghost] {
        &self.ghosts
    }

    pub(crate) fn ghosts_mut(&mut self) -> &mut [Ghost] {
        &mut self.ghosts
    }

    /// Ghost by index.
    pub fn ghost(&self, index: usize) -> Option<&Ghost> {
        self.ghosts.get(index)
    }

    /// Ghost by index, mutably.
    pub fn ghost_mut(&mut self, index: usize) -> Option<&mut Ghost> {
        self.ghosts.get_mut(index)
    }

    /// Ghost indices binned in an arena cell.
    pub fn cell(&self, index: usize) -> &[usize] {
        self.cells.get(index).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every staged copy of `id`.
    pub fn copies_of(&self, id: BeadId) -> &[usize] {
        self.by_id.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Add a ghost's force into another ghost.
    pub(crate) fn add_force(&mut self, index: usize, force: DVec3) {
        if let Some(ghost) = self.ghosts.get_mut(index) {
            ghost.force += force;
        }
    }
}
