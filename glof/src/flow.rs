//! Downstream flow path by steepest descent.
//!
//! The tracer is a local, per-cell greedy walk: from the seed cell it
//! repeatedly moves to the lowest of the 8 neighbours as long as that
//! neighbour is strictly lower. It does not fill sinks or accumulate
//! flow, so it finds a locally steepest path rather than the
//! hydrologically true channel.

use crate::{
    error::{ComputationError, GlofError},
    point::GeoPoint,
    C,
};
use geo::geometry::Coord;
use log::debug;
use raster::Raster;
use serde::Serialize;

/// `(col, row)` offsets in N, NE, E, SE, S, SW, W, NW order.
const NEIGHBORS: [(isize, isize); 8] = [
    (0, -1),
    (1, -1),
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
];

/// Why a flow path ended where it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// No lower neighbour, away from the grid edge.
    LocalMinimum,

    /// No lower neighbour on the grid edge; water would leave the grid.
    Boundary,

    /// The walk hit its step limit.
    StepCap,

    /// DEM unusable; the path is a fixed stand-in.
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FlowPath {
    /// Cell centers (or fallback vertices) as `x = lon, y = lat`.
    points: Vec<Coord<C>>,

    /// Grid cell of each point. Empty for fallback paths.
    cells: Vec<(usize, usize)>,

    termination: Termination,
}

impl FlowPath {
    pub fn builder() -> FlowPathBuilder {
        FlowPathBuilder {
            seed: None,
            max_steps: 1000,
        }
    }

    /// Returns the degraded two point path `[seed, seed + (+delta lon,
    /// -delta lat)]`.
    pub fn fallback(seed: GeoPoint, delta_deg: C) -> Self {
        let start = seed.coord();
        let end = Coord {
            x: start.x + delta_deg,
            y: start.y - delta_deg,
        };
        Self {
            points: vec![start, end],
            cells: Vec::new(),
            termination: Termination::Fallback,
        }
    }

    pub fn points(&self) -> &[Coord<C>] {
        &self.points
    }

    pub fn cells(&self) -> &[(usize, usize)] {
        &self.cells
    }

    pub fn termination(&self) -> Termination {
        self.termination
    }

    pub fn is_fallback(&self) -> bool {
        self.termination == Termination::Fallback
    }

    /// Returns the first point; paths are never empty.
    pub fn start(&self) -> GeoPoint {
        GeoPoint::from(self.points[0])
    }

    pub fn end(&self) -> GeoPoint {
        GeoPoint::from(self.points[self.points.len() - 1])
    }

    /// Returns the number of moves taken.
    pub fn steps(&self) -> usize {
        self.points.len() - 1
    }
}

pub struct FlowPathBuilder {
    /// Where the walk starts (required).
    seed: Option<GeoPoint>,

    /// Maximum number of moves (defaults to 1000).
    max_steps: usize,
}

impl FlowPathBuilder {
    /// Where the walk starts (required).
    #[must_use]
    pub fn seed(mut self, seed: GeoPoint) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Maximum number of moves (defaults to 1000).
    #[must_use]
    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Walks `dem`'s first band downhill from the seed.
    pub fn build(&self, dem: &Raster) -> Result<FlowPath, GlofError> {
        let seed = self.seed.ok_or(GlofError::Builder("seed"))?;
        let mut cell = dem
            .snap(seed.coord())
            .ok_or(ComputationError::Unsnappable)?;
        let mut elevation = elevation(dem, cell);
        if elevation.is_nan() {
            return Err(ComputationError::NoDataSeed(cell).into());
        }

        let mut points = vec![dem.cell_center(cell)];
        let mut cells = vec![cell];
        let mut termination = Termination::StepCap;

        for _ in 0..self.max_steps {
            match lowest_neighbor(dem, cell, elevation) {
                Some((next, next_elevation)) => {
                    cell = next;
                    elevation = next_elevation;
                    points.push(dem.cell_center(cell));
                    cells.push(cell);
                }
                None => {
                    termination = if on_edge(dem, cell) {
                        Termination::Boundary
                    } else {
                        Termination::LocalMinimum
                    };
                    break;
                }
            }
        }

        debug!(
            "flow path; seed: {seed}, steps: {}, end: {cell:?}, termination: {termination:?}",
            points.len() - 1
        );

        Ok(FlowPath {
            points,
            cells,
            termination,
        })
    }
}

/// Returns the mean gradient along a traced path in degrees, using the
/// DEM's pixel size as horizontal scale.
///
/// Returns `None` for fallback paths, and 0 for single cell paths.
pub fn path_slope_degrees(dem: &Raster, path: &FlowPath) -> Option<C> {
    let (first, last) = (path.cells.first()?, path.cells.last()?);
    let (px, py) = dem.pixel_size();
    #[allow(clippy::cast_precision_loss)]
    let run: C = path
        .cells
        .windows(2)
        .map(|w| {
            let dc = w[1].0 as C - w[0].0 as C;
            let dr = w[1].1 as C - w[0].1 as C;
            (dc * px).hypot(dr * py)
        })
        .sum();
    if run == 0.0 {
        return Some(0.0);
    }
    let drop = elevation(dem, *first) - elevation(dem, *last);
    Some(drop.atan2(run).to_degrees())
}

fn elevation(dem: &Raster, cell: (usize, usize)) -> C {
    dem.get(1, cell).unwrap_or(C::NAN)
}

fn on_edge(dem: &Raster, (col, row): (usize, usize)) -> bool {
    let (width, height) = dem.dimensions();
    col == 0 || row == 0 || col + 1 == width || row + 1 == height
}

/// Returns the lowest neighbour strictly below `current`.
///
/// Equal candidates resolve to the nearer (edge-sharing) neighbour,
/// then to `NEIGHBORS` order. NaN neighbours never win.
fn lowest_neighbor(
    dem: &Raster,
    (col, row): (usize, usize),
    current: C,
) -> Option<((usize, usize), C)> {
    let (width, height) = dem.dimensions();
    let mut best: Option<((usize, usize), C, bool)> = None;
    for (dc, dr) in NEIGHBORS {
        let (Some(c), Some(r)) = (col.checked_add_signed(dc), row.checked_add_signed(dr)) else {
            continue;
        };
        if c >= width || r >= height {
            continue;
        }
        let e = elevation(dem, (c, r));
        if !(e < current) {
            continue;
        }
        let cardinal = dc == 0 || dr == 0;
        let better = match best {
            None => true,
            Some((_, best_e, best_cardinal)) => {
                e < best_e || (e == best_e && cardinal && !best_cardinal)
            }
        };
        if better {
            best = Some(((c, r), e, cardinal));
        }
    }
    best.map(|(cell, e, _)| (cell, e))
}
