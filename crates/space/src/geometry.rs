//! Space geometry: extent, cell grid and frame translation.
//!
//! A Space is the rectangular sub-domain owned by one process. Positions
//! inside it are expressed in a local frame `[0, extent)` per axis. Cells are
//! indexed `0..n` per axis; the external wrapper layer around them is indexed
//! `-1` and `n`. Every cell, real or halo, has a dense index into an
//! `(n + 2)³` arena.

use glam::DVec3;
use meso_types::{Direction, AXES};
use std::fmt;
use thiserror::Error;

/// Errors raised while building a [`SpaceGeometry`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("Space extent along {} must be positive and finite, got {value}", AXES[*axis])]
    BadExtent { axis: usize, value: f64 },

    #[error("Space needs at least 2 cells along {}, got {cells}", AXES[*axis])]
    TooFewCells { axis: usize, cells: usize },

    #[error("Cell width {width} along {} is below the cutoff {cutoff}", AXES[*axis])]
    CellNarrowerThanCutoff { axis: usize, width: f64, cutoff: f64 },

    #[error("Cutoff must be positive and finite, got {0}")]
    BadCutoff(f64),
}

/// Integer cell coordinate, real (`0..n`) or halo (`-1` or `n` on some axis).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellCoord(pub [i32; 3]);

impl CellCoord {
    /// Coordinate one step away in `direction`.
    pub fn offset(self, direction: Direction) -> CellCoord {
        let [x, y, z] = self.0;
        CellCoord([
            x + direction.dx() as i32,
            y + direction.dy() as i32,
            z + direction.dz() as i32,
        ])
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}, {}]", self.0[0], self.0[1], self.0[2])
    }
}

/// Shape of one Space and its cell grid.
#[derive(Debug, Clone, PartialEq)]
pub struct SpaceGeometry {
    origin: DVec3,
    extent: DVec3,
    cells: [usize; 3],
    cell_width: DVec3,
}

impl SpaceGeometry {
    /// Build a geometry for a Space at global `origin` with the given extent.
    pub fn new(
        origin: DVec3,
        extent: DVec3,
        cells: [usize; 3],
        cutoff: f64,
    ) -> Result<Self, GeometryError> {
        if !(cutoff.is_finite() && cutoff > 0.0) {
            return Err(GeometryError::BadCutoff(cutoff));
        }
        let mut cell_width = DVec3::ZERO;
        for axis in 0..3 {
            let value = extent[axis];
            if !(value.is_finite() && value > 0.0) {
                return Err(GeometryError::BadExtent { axis, value });
            }
            if cells[axis] < 2 {
                return Err(GeometryError::TooFewCells {
                    axis,
                    cells: cells[axis],
                });
            }
            let width = value / cells[axis] as f64;
            if width < cutoff {
                return Err(GeometryError::CellNarrowerThanCutoff {
                    axis,
                    width,
                    cutoff,
                });
            }
            cell_width[axis] = width;
        }
        Ok(Self {
            origin,
            extent,
            cells,
            cell_width,
        })
    }

    /// Global position of the local frame's origin.
    pub fn origin(&self) -> DVec3 {
        self.origin
    }

    /// Space length per axis.
    pub fn extent(&self) -> DVec3 {
        self.extent
    }

    /// Real cells per axis.
    pub fn cells(&self) -> [usize; 3] {
        self.cells
    }

    /// Cell width per axis.
    pub fn cell_width(&self) -> DVec3 {
        self.cell_width
    }

    /// Smallest cell width over all axes.
    pub fn min_cell_width(&self) -> f64 {
        self.cell_width.min_element()
    }

    /// Number of cells in the arena, halo included.
    pub fn arena_len(&self) -> usize {
        self.cells.iter().map(|n| n + 2).product()
    }

    /// Number of real cells.
    pub fn real_len(&self) -> usize {
        self.cells.iter().product()
    }

    // ─── Indexing ───────────────────────────────────────────────────────

    /// Dense arena index of a cell. The coordinate must be in `-1..=n`.
    pub fn index(&self, cell: CellCoord) -> usize {
        let [nx, ny, _] = self.cells;
        let [x, y, z] = cell.0;
        let (x, y, z) = ((x + 1) as usize, (y + 1) as usize, (z + 1) as usize);
        (z * (ny + 2) + y) * (nx + 2) + x
    }

    /// Inverse of [`index`](Self::index).
    pub fn coord(&self, index: usize) -> CellCoord {
        let [nx, ny, _] = self.cells;
        let x = index % (nx + 2);
        let y = (index / (nx + 2)) % (ny + 2);
        let z = index / ((nx + 2) * (ny + 2));
        CellCoord([x as i32 - 1, y as i32 - 1, z as i32 - 1])
    }

    /// Whether `cell` lies in the arena at all.
    pub fn in_arena(&self, cell: CellCoord) -> bool {
        (0..3).all(|a| cell.0[a] >= -1 && cell.0[a] <= self.cells[a] as i32)
    }

    /// Whether `cell` is a real cell.
    pub fn is_real(&self, cell: CellCoord) -> bool {
        (0..3).all(|a| cell.0[a] >= 0 && cell.0[a] < self.cells[a] as i32)
    }

    /// All real cells, x fastest.
    pub fn real_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        let [nx, ny, nz] = self.cells;
        (0..nz as i32).flat_map(move |z| {
            (0..ny as i32).flat_map(move |y| (0..nx as i32).map(move |x| CellCoord([x, y, z])))
        })
    }

    /// All halo cells, x fastest.
    pub fn halo_cells(&self) -> impl Iterator<Item = CellCoord> + '_ {
        (0..self.arena_len())
            .map(|i| self.coord(i))
            .filter(|c| !self.is_real(*c))
    }

    // ─── Signatures ─────────────────────────────────────────────────────

    /// Boundary signature of a real cell: per axis `-1` on the low boundary
    /// layer, `+1` on the high one, `0` in between.
    ///
    /// `None` is Bulk.
    pub fn boundary_direction(&self, cell: CellCoord) -> Option<Direction> {
        let mut s = [0i8; 3];
        for (a, component) in s.iter_mut().enumerate() {
            if cell.0[a] == 0 {
                *component = -1;
            } else if cell.0[a] == self.cells[a] as i32 - 1 {
                *component = 1;
            }
        }
        Direction::from_components(s)
    }

    /// Side of the Space a halo cell lies on. `None` for real cells.
    pub fn halo_direction(&self, cell: CellCoord) -> Option<Direction> {
        let mut s = [0i8; 3];
        for (a, component) in s.iter_mut().enumerate() {
            if cell.0[a] < 0 {
                *component = -1;
            } else if cell.0[a] >= self.cells[a] as i32 {
                *component = 1;
            }
        }
        Direction::from_components(s)
    }

    // ─── Binning ────────────────────────────────────────────────────────

    /// Real cell holding a local-frame position, `None` outside `[0, extent)`.
    pub fn real_cell_of(&self, position: DVec3) -> Option<CellCoord> {
        let mut c = [0i32; 3];
        for a in 0..3 {
            let p = position[a];
            if !(p >= 0.0 && p < self.extent[a]) {
                return None;
            }
            let k = (p / self.cell_width[a]).floor() as i64;
            c[a] = k.min(self.cells[a] as i64 - 1) as i32;
        }
        Some(CellCoord(c))
    }

    /// Arena cell holding a local-frame position, halo layer included.
    ///
    /// `None` beyond one cell width outside the Space.
    pub fn arena_cell_of(&self, position: DVec3) -> Option<CellCoord> {
        let mut c = [0i32; 3];
        for a in 0..3 {
            let (p, w, l) = (position[a], self.cell_width[a], self.extent[a]);
            let n = self.cells[a] as i64;
            c[a] = if !p.is_finite() {
                return None;
            } else if p < 0.0 {
                if p < -w {
                    return None;
                }
                -1
            } else if p >= l {
                if p >= l + w {
                    return None;
                }
                n as i32
            } else {
                ((p / w).floor() as i64).min(n - 1) as i32
            };
        }
        Some(CellCoord(c))
    }

    /// Halo cell of a copy staged on `side`, with the position pinned into
    /// that cell's layer.
    ///
    /// Translating a neighbour's boundary coordinate by one extent can round
    /// onto the far edge of the halo layer. Such a coordinate is pulled back
    /// just inside, as [`clamp_into_frame`] does at the frame edge. `None`
    /// when the position is not next to `side` at all.
    pub fn halo_cell_of(&self, position: DVec3, side: Direction) -> Option<(CellCoord, DVec3)> {
        let mut c = [0i32; 3];
        let mut pinned = position;
        for a in 0..3 {
            let (p, w, l) = (position[a], self.cell_width[a], self.extent[a]);
            if !p.is_finite() {
                return None;
            }
            let slack = w * EDGE_SLACK;
            c[a] = match side.component(a) {
                1 => {
                    if p < l - slack || p > l + w + slack {
                        return None;
                    }
                    pinned[a] = p.clamp(l, next_below(l + w));
                    self.cells[a] as i32
                }
                -1 => {
                    if p < -w - slack || p > slack {
                        return None;
                    }
                    pinned[a] = p.clamp(-w, next_below(0.0));
                    -1
                }
                _ => {
                    if !(p >= 0.0 && p < l) {
                        return None;
                    }
                    ((p / w).floor() as i32).min(self.cells[a] as i32 - 1)
                }
            };
        }
        Some((CellCoord(c), pinned))
    }

    // ─── Frames ─────────────────────────────────────────────────────────

    /// Local-frame position of a global one.
    pub fn to_local(&self, global: DVec3) -> DVec3 {
        global - self.origin
    }

    /// Global position of a local-frame one.
    pub fn to_global(&self, local: DVec3) -> DVec3 {
        local + self.origin
    }

    /// Whether a local-frame position lies in `[0, extent)` on every axis.
    pub fn contains(&self, position: DVec3) -> bool {
        (0..3).all(|a| position[a] >= 0.0 && position[a] < self.extent[a])
    }

    /// Position of a neighbour's bead in this Space's frame.
    ///
    /// `side` is the side of this Space the neighbour lies on.
    pub fn from_neighbour_frame(&self, position: DVec3, side: Direction) -> DVec3 {
        position + side.as_dvec3() * self.extent
    }

    /// Exit sign vector of a local-frame position.
    ///
    /// Per axis `-1` below zero, `+1` at or above the extent, `0` inside.
    pub fn exit_signs(&self, position: DVec3) -> [i8; 3] {
        let mut s = [0i8; 3];
        for (a, component) in s.iter_mut().enumerate() {
            if position[a] < 0.0 {
                *component = -1;
            } else if position[a] >= self.extent[a] {
                *component = 1;
            }
        }
        s
    }

    /// First axis along which a move from `from` to `to` covers more than
    /// one cell width, or ends on a non-finite coordinate.
    pub fn escaped(&self, from: DVec3, to: DVec3) -> Option<usize> {
        (0..3).find(|&a| !to[a].is_finite() || (to[a] - from[a]).abs() > self.cell_width[a])
    }

    /// Whether `value` lies past the frame edge by no more than rounding.
    pub fn within_edge_slack(&self, value: f64, axis: usize) -> bool {
        let slack = self.cell_width[axis] * EDGE_SLACK;
        value >= -slack && value < self.extent[axis] + slack
    }

    /// Shift a position by `-s * extent` per axis, landing inside the frame.
    ///
    /// The position must have been classified by [`exit_signs`](Self::exit_signs)
    /// and lie within one cell width of the frame.
    pub fn shift_into_frame(&self, position: DVec3, signs: [i8; 3]) -> DVec3 {
        let mut out = position;
        for a in 0..3 {
            if signs[a] != 0 {
                out[a] = clamp_into_frame(position[a] - signs[a] as f64 * self.extent[a], self.extent[a]);
            }
        }
        out
    }
}

/// Relative tolerance, in cell widths, for coordinates that translation
/// rounding pushed past a layer edge.
const EDGE_SLACK: f64 = 1e-9;

/// Largest finite value below `x`.
fn next_below(x: f64) -> f64 {
    if x > 0.0 {
        f64::from_bits(x.to_bits() - 1)
    } else if x == 0.0 {
        -f64::from_bits(1)
    } else {
        f64::from_bits(x.to_bits() + 1)
    }
}

/// Pull a coordinate that rounding pushed onto the frame edge back inside.
///
/// A tiny negative offset translated by one length can round up to exactly
/// `len`; the largest value below `len` stands in for it.
pub fn clamp_into_frame(value: f64, len: f64) -> f64 {
    if value >= len {
        f64::from_bits(len.to_bits() - 1)
    } else if value < 0.0 {
        0.0
    } else {
        value
    }
}
