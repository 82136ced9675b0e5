//! Logical process grid.
//!
//! Processes are arranged in a `px × py × pz` lattice. A process's grid
//! coordinate maps bijectively to its [`Pid`] with x varying fastest. All axes
//! are periodic: the neighbour beyond the last process on an axis is the first.

use crate::{Direction, Pid, DIRECTION_COUNT};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors from process-grid arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GridError {
    #[error("grid dimension on axis {axis} is zero")]
    ZeroDimension { axis: usize },

    #[error("grid {shape} has {expected} slots but the world has {actual} processes")]
    WorldSizeMismatch {
        shape: GridShape,
        expected: usize,
        actual: usize,
    },

    #[error("{pid} is outside grid {shape}")]
    PidOutOfRange { pid: Pid, shape: GridShape },

    #[error("grid {shape} has no split axis; the single-process path is not a decomposition")]
    NoDecomposition { shape: GridShape },
}

/// Shape of the process lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Position of a process in the lattice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct GridCoord {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

/// Inter-process topology, by the number of axes carrying more than one process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TopologyKind {
    /// One split axis.
    Linear,
    /// Two split axes.
    Planar,
    /// Three split axes.
    Cubic,
}

impl TopologyKind {
    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            TopologyKind::Linear => "linear",
            TopologyKind::Planar => "planar",
            TopologyKind::Cubic => "cubic",
        }
    }
}

impl GridShape {
    /// Create a grid shape.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }

    /// Dimensions as an array.
    pub fn dims(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }

    /// Total number of process slots.
    pub fn process_count(&self) -> usize {
        self.x as usize * self.y as usize * self.z as usize
    }

    /// Axes with more than one process.
    pub fn split_axes(&self) -> [bool; 3] {
        [self.x > 1, self.y > 1, self.z > 1]
    }

    /// Check that every axis has at least one process.
    pub fn validate(&self) -> Result<(), GridError> {
        for (axis, dim) in self.dims().into_iter().enumerate() {
            if dim == 0 {
                return Err(GridError::ZeroDimension { axis });
            }
        }
        Ok(())
    }

    /// Check that this shape tiles a world of `world_size` processes.
    pub fn check_tiles(&self, world_size: usize) -> Result<(), GridError> {
        self.validate()?;
        if self.process_count() != world_size {
            return Err(GridError::WorldSizeMismatch {
                shape: *self,
                expected: self.process_count(),
                actual: world_size,
            });
        }
        Ok(())
    }

    /// Classify the topology of this grid.
    pub fn topology(&self) -> Result<TopologyKind, GridError> {
        match self.split_axes().iter().filter(|s| **s).count() {
            0 => Err(GridError::NoDecomposition { shape: *self }),
            1 => Ok(TopologyKind::Linear),
            2 => Ok(TopologyKind::Planar),
            _ => Ok(TopologyKind::Cubic),
        }
    }

    /// Grid coordinate of a process.
    pub fn coord_of(&self, pid: Pid) -> Result<GridCoord, GridError> {
        if pid.index() >= self.process_count() {
            return Err(GridError::PidOutOfRange { pid, shape: *self });
        }
        let p = pid.0;
        Ok(GridCoord {
            x: p % self.x,
            y: (p / self.x) % self.y,
            z: p / (self.x * self.y),
        })
    }

    /// Process at a grid coordinate.
    pub fn pid_of(&self, coord: GridCoord) -> Pid {
        Pid(coord.x + self.x * (coord.y + self.y * coord.z))
    }

    /// Coordinate one step away in `direction`, wrapping periodically.
    pub fn neighbour_coord(&self, coord: GridCoord, direction: Direction) -> GridCoord {
        let wrap = |value: u32, delta: i8, dim: u32| -> u32 {
            ((value as i64 + delta as i64).rem_euclid(dim as i64)) as u32
        };
        GridCoord {
            x: wrap(coord.x, direction.dx(), self.x),
            y: wrap(coord.y, direction.dy(), self.y),
            z: wrap(coord.z, direction.dz(), self.z),
        }
    }

    /// Build the neighbour table of the process at `coord`.
    pub fn neighbour_table(&self, coord: GridCoord) -> NeighbourTable {
        let me = self.pid_of(coord);
        let mut pids = [None; DIRECTION_COUNT];
        for direction in Direction::all() {
            let pid = self.pid_of(self.neighbour_coord(coord, direction));
            if pid != me {
                pids[direction.index()] = Some(pid);
            }
        }
        NeighbourTable { me, pids }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}x{}", self.x, self.y, self.z)
    }
}

impl fmt::Display for GridCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl GridCoord {
    /// Coordinates as an array.
    pub fn as_array(&self) -> [u32; 3] {
        [self.x, self.y, self.z]
    }
}

/// Pids of the 26 neighbours of one process.
///
/// A direction whose neighbour is the process itself (its non-zero components
/// all lie on axes with a single process) holds `None`: there is no neighbour
/// to exchange messages with in that direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NeighbourTable {
    me: Pid,
    pids: [Option<Pid>; DIRECTION_COUNT],
}

impl NeighbourTable {
    /// The process this table belongs to.
    pub fn me(&self) -> Pid {
        self.me
    }

    /// Neighbour in `direction`, or `None` if there is none.
    pub fn get(&self, direction: Direction) -> Option<Pid> {
        self.pids[direction.index()]
    }

    /// Iterate over directions that have a neighbour.
    pub fn iter(&self) -> impl Iterator<Item = (Direction, Pid)> + '_ {
        Direction::all().filter_map(|d| self.get(d).map(|pid| (d, pid)))
    }

    /// Number of directions with a neighbouring process.
    pub fn external_count(&self) -> usize {
        self.pids.iter().filter(|p| p.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pid_coord_bijection() {
        let shape = GridShape::new(3, 2, 4);
        for p in 0..shape.process_count() as u32 {
            let coord = shape.coord_of(Pid(p)).unwrap();
            assert_eq!(shape.pid_of(coord), Pid(p));
        }
        assert!(shape.coord_of(Pid(24)).is_err());
    }

    #[test]
    fn test_topology_classification() {
        assert_eq!(
            GridShape::new(4, 1, 1).topology(),
            Ok(TopologyKind::Linear)
        );
        assert_eq!(
            GridShape::new(2, 2, 1).topology(),
            Ok(TopologyKind::Planar)
        );
        assert_eq!(GridShape::new(2, 2, 2).topology(), Ok(TopologyKind::Cubic));
        assert!(GridShape::new(1, 1, 1).topology().is_err());
    }

    #[test]
    fn test_tiling_check() {
        let shape = GridShape::new(2, 2, 1);
        assert!(shape.check_tiles(4).is_ok());
        assert!(matches!(
            shape.check_tiles(3),
            Err(GridError::WorldSizeMismatch { expected: 4, actual: 3, .. })
        ));
        assert!(GridShape::new(0, 1, 1).check_tiles(0).is_err());
    }

    #[test]
    fn test_neighbour_wraps_periodically() {
        let shape = GridShape::new(3, 1, 1);
        let last = GridCoord { x: 2, y: 0, z: 0 };
        let plus_x = Direction::new(1, 0, 0).unwrap();
        assert_eq!(shape.neighbour_coord(last, plus_x), GridCoord::default());
    }

    #[test]
    fn test_linear_neighbour_table() {
        let shape = GridShape::new(2, 1, 1);
        let table = shape.neighbour_table(GridCoord::default());
        // Every direction with an x component reaches the other process
        assert_eq!(table.external_count(), 18);
        for (direction, pid) in table.iter() {
            assert_ne!(direction.dx(), 0);
            assert_eq!(pid, Pid(1));
        }
        assert_eq!(table.get(Direction::new(0, 1, 0).unwrap()), None);
    }

    #[test]
    fn test_cubic_neighbour_table_is_full() {
        let shape = GridShape::new(3, 3, 3);
        let table = shape.neighbour_table(GridCoord { x: 1, y: 1, z: 1 });
        assert_eq!(table.external_count(), 26);
    }
}
