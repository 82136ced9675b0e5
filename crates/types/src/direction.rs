//! The 26 nearest-neighbour directions of a cube.
//!
//! Every direction is an offset `(dx, dy, dz)` with components in `{-1, 0, 1}`,
//! excluding the zero offset. The number of non-zero components decides whether
//! the direction names a face (1), an edge (2) or a corner (3).

use std::fmt;

/// Number of neighbour directions in three dimensions.
pub const DIRECTION_COUNT: usize = 26;

/// Number of directions in the forward half shell.
pub const FORWARD_DIRECTION_COUNT: usize = 13;

/// Geometric kind of a boundary region, by the dimension of its extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegionKind {
    /// 2-D slab of cells, one non-zero normal component.
    Face,
    /// 1-D line of cells, two non-zero normal components.
    Edge,
    /// Single cell, three non-zero normal components.
    Corner,
}

impl RegionKind {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            RegionKind::Face => "face",
            RegionKind::Edge => "edge",
            RegionKind::Corner => "corner",
        }
    }
}

/// A unit offset to one of the 26 neighbouring cells or processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Direction {
    components: [i8; 3],
}

impl Direction {
    /// Build a direction from its components.
    ///
    /// Returns `None` for the zero offset or for components outside `{-1, 0, 1}`.
    pub const fn new(dx: i8, dy: i8, dz: i8) -> Option<Self> {
        if dx < -1 || dx > 1 || dy < -1 || dy > 1 || dz < -1 || dz > 1 {
            return None;
        }
        if dx == 0 && dy == 0 && dz == 0 {
            return None;
        }
        Some(Self {
            components: [dx, dy, dz],
        })
    }

    /// Build a direction from a component array.
    pub const fn from_components(components: [i8; 3]) -> Option<Self> {
        Self::new(components[0], components[1], components[2])
    }

    /// All 26 directions, ordered by [`index`](Self::index).
    pub fn all() -> impl Iterator<Item = Direction> {
        (0..DIRECTION_COUNT).filter_map(Direction::from_index)
    }

    /// The 13 forward directions (first non-zero component is positive).
    ///
    /// Visiting only forward neighbours of every cell covers each unordered
    /// cell pair exactly once.
    pub fn forward() -> impl Iterator<Item = Direction> {
        Self::all().filter(|d| d.is_forward())
    }

    /// Dense index in `0..26`.
    pub fn index(self) -> usize {
        let [dx, dy, dz] = self.components;
        let raw = ((dx + 1) * 9 + (dy + 1) * 3 + (dz + 1)) as usize;
        // Raw index 13 is the zero offset.
        if raw < 13 {
            raw
        } else {
            raw - 1
        }
    }

    /// Inverse of [`index`](Self::index).
    pub fn from_index(index: usize) -> Option<Self> {
        if index >= DIRECTION_COUNT {
            return None;
        }
        let raw = if index < 13 { index } else { index + 1 } as i8;
        Self::new(raw / 9 - 1, (raw / 3) % 3 - 1, raw % 3 - 1)
    }

    /// Component along x.
    pub fn dx(self) -> i8 {
        self.components[0]
    }

    /// Component along y.
    pub fn dy(self) -> i8 {
        self.components[1]
    }

    /// Component along z.
    pub fn dz(self) -> i8 {
        self.components[2]
    }

    /// All three components.
    pub fn components(self) -> [i8; 3] {
        self.components
    }

    /// Component along `axis` (0 = x, 1 = y, 2 = z).
    pub fn component(self, axis: usize) -> i8 {
        self.components[axis]
    }

    /// Components as floating point, for translating coordinates.
    pub fn as_dvec3(self) -> glam::DVec3 {
        glam::DVec3::new(
            self.components[0] as f64,
            self.components[1] as f64,
            self.components[2] as f64,
        )
    }

    /// The direction pointing the other way.
    pub fn opposite(self) -> Self {
        let [dx, dy, dz] = self.components;
        Self {
            components: [-dx, -dy, -dz],
        }
    }

    /// Number of non-zero components.
    pub fn rank(self) -> usize {
        self.components.iter().filter(|c| **c != 0).count()
    }

    /// Face, edge or corner.
    pub fn region_kind(self) -> RegionKind {
        match self.rank() {
            1 => RegionKind::Face,
            2 => RegionKind::Edge,
            _ => RegionKind::Corner,
        }
    }

    /// Whether the first non-zero component is positive.
    pub fn is_forward(self) -> bool {
        self.components
            .iter()
            .find(|c| **c != 0)
            .is_some_and(|c| *c > 0)
    }

    /// Whether every non-zero component of `other` agrees with this direction.
    ///
    /// A face direction `+x` is contained in the edge `+x+y` and the corner
    /// `+x+y-z`, but not in `-x+y`.
    pub fn contains(self, other: Direction) -> bool {
        (0..3).all(|a| other.components[a] == 0 || other.components[a] == self.components[a])
    }

    /// Keep only the components on axes where `keep[axis]` is true.
    ///
    /// Returns `None` if nothing remains.
    pub fn project(self, keep: [bool; 3]) -> Option<Direction> {
        let mut components = self.components;
        for (axis, component) in components.iter_mut().enumerate() {
            if !keep[axis] {
                *component = 0;
            }
        }
        Direction::from_components(components)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (axis, c) in self.components.iter().enumerate() {
            match c {
                1 => write!(f, "+{}", crate::AXES[axis])?,
                -1 => write!(f, "-{}", crate::AXES[axis])?,
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_index_roundtrip() {
        for index in 0..DIRECTION_COUNT {
            let direction = Direction::from_index(index).unwrap();
            assert_eq!(direction.index(), index);
        }
        assert!(Direction::from_index(DIRECTION_COUNT).is_none());
    }

    #[test]
    fn test_zero_offset_rejected() {
        assert!(Direction::new(0, 0, 0).is_none());
        assert!(Direction::new(2, 0, 0).is_none());
    }

    #[test]
    fn test_region_kind_counts() {
        let faces = Direction::all()
            .filter(|d| d.region_kind() == RegionKind::Face)
            .count();
        let edges = Direction::all()
            .filter(|d| d.region_kind() == RegionKind::Edge)
            .count();
        let corners = Direction::all()
            .filter(|d| d.region_kind() == RegionKind::Corner)
            .count();
        assert_eq!((faces, edges, corners), (6, 12, 8));
    }

    #[test]
    fn test_forward_half_shell() {
        let forward: HashSet<Direction> = Direction::forward().collect();
        assert_eq!(forward.len(), FORWARD_DIRECTION_COUNT);
        for direction in Direction::all() {
            // Exactly one of each opposite pair is forward
            assert_ne!(
                forward.contains(&direction),
                forward.contains(&direction.opposite())
            );
        }
    }

    #[test]
    fn test_projection() {
        let corner = Direction::new(1, -1, 1).unwrap();
        assert_eq!(
            corner.project([true, false, false]),
            Direction::new(1, 0, 0)
        );
        assert_eq!(corner.project([false, false, false]), None);
        assert!(corner.contains(Direction::new(1, 0, 0).unwrap()));
        assert!(!corner.contains(Direction::new(-1, 0, 0).unwrap()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Direction::new(1, 0, -1).unwrap().to_string(), "+x-z");
    }
}
