//! Normalized difference water index.

use crate::{error::InputError, C};
use geo::geometry::Coord;
use raster::Raster;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which bands feed `(positive - negative) / (positive + negative)`.
///
/// Band indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexFormula {
    pub positive_band: usize,
    pub negative_band: usize,
}

impl IndexFormula {
    /// McFeeters NDWI, green over near-infrared, with the band layout
    /// of a 4-band (B, G, R, NIR) product.
    pub const NDWI: Self = Self {
        positive_band: 2,
        negative_band: 4,
    };

    pub fn new(positive_band: usize, negative_band: usize) -> Self {
        Self {
            positive_band,
            negative_band,
        }
    }

    fn check(&self, raster: &Raster) -> Result<(), InputError> {
        if self.positive_band == 0 || self.negative_band == 0 {
            return Err(InputError::InvalidBand);
        }
        let requested = self.positive_band.max(self.negative_band);
        let available = raster.band_count();
        if available < requested {
            return Err(InputError::InsufficientBands {
                requested,
                available,
            });
        }
        Ok(())
    }
}

impl Default for IndexFormula {
    fn default() -> Self {
        Self::NDWI
    }
}

impl fmt::Display for IndexFormula {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (p, n) = (self.positive_band, self.negative_band);
        write!(f, "(b{p} - b{n}) / (b{p} + b{n})")
    }
}

/// A single band index grid and the formula that produced it.
#[derive(Debug)]
pub struct SpectralIndexGrid {
    formula: IndexFormula,
    grid: Raster,
}

impl SpectralIndexGrid {
    /// Wraps an existing single band grid of index values.
    pub fn from_raster(grid: Raster, formula: IndexFormula) -> Self {
        Self { formula, grid }
    }

    pub fn formula(&self) -> IndexFormula {
        self.formula
    }

    pub fn grid(&self) -> &Raster {
        &self.grid
    }

    pub fn into_raster(self) -> Raster {
        self.grid
    }

    /// Returns the index values in row-major order.
    pub fn values(&self) -> Vec<C> {
        // Index grids always have exactly one band.
        self.grid.band(1).unwrap_or_default()
    }

    /// Returns true if the pixel is water. NaN never is.
    pub fn is_water(value: C, threshold: C) -> bool {
        value > threshold
    }
}

/// Returns the element-wise normalized difference of two sample
/// slices. Zero sums yield NaN.
pub fn normalized_difference_values(positive: &[C], negative: &[C]) -> Vec<C> {
    positive
        .par_iter()
        .zip(negative.par_iter())
        .map(|(&p, &n)| normalized_difference(p, n))
        .collect()
}

fn normalized_difference(p: C, n: C) -> C {
    let sum = p + n;
    if sum == 0.0 {
        C::NAN
    } else {
        (p - n) / sum
    }
}

/// Computes `formula` over `raster`.
pub fn compute(raster: &Raster, formula: IndexFormula) -> Result<SpectralIndexGrid, InputError> {
    formula.check(raster)?;
    // `check` guarantees both bands exist.
    let positive = raster
        .band(formula.positive_band)
        .map_err(|_| InputError::InvalidBand)?;
    let negative = raster
        .band(formula.negative_band)
        .map_err(|_| InputError::InvalidBand)?;
    let values = normalized_difference_values(&positive, &negative);
    let grid = raster.derive(values).map_err(|_| InputError::InvalidBand)?;
    Ok(SpectralIndexGrid { formula, grid })
}

/// Returns the water surface area (square projected units) of `index`.
#[allow(clippy::cast_precision_loss)]
pub fn lake_area(index: &SpectralIndexGrid, threshold: C) -> C {
    let water = index
        .values()
        .into_iter()
        .filter(|&v| SpectralIndexGrid::is_water(v, threshold))
        .count();
    water as C * index.grid.pixel_area()
}

/// Returns the world centroid of all water pixels, if any.
#[allow(clippy::cast_precision_loss)]
pub fn water_centroid(index: &SpectralIndexGrid, threshold: C) -> Option<Coord<C>> {
    let width = index.grid.width();
    let (sum, n) = index
        .values()
        .into_iter()
        .enumerate()
        .filter(|&(_, v)| SpectralIndexGrid::is_water(v, threshold))
        .map(|(i, _)| index.grid.cell_center((i % width, i / width)))
        .fold((Coord { x: 0.0, y: 0.0 }, 0_usize), |(acc, n), c| {
            (acc + c, n + 1)
        });
    (n > 0).then(|| sum / n as C)
}

#[cfg(test)]
mod tests {
    use super::{compute, lake_area, normalized_difference_values, water_centroid, IndexFormula};
    use crate::error::InputError;
    use approx::assert_relative_eq;
    use geo::geometry::Coord;
    use raster::{GeoTransform, Raster};

    #[test]
    fn test_zero_over_zero_is_nan() {
        let out = normalized_difference_values(&[10.0, 0.0], &[10.0, 0.0]);
        assert_eq!(out[0], 0.0);
        assert!(out[1].is_nan());
    }

    #[test]
    fn test_compute_from_bands() {
        // Band 1 = green, band 2 = nir.
        let raster = Raster::from_bands(2, 2, vec![vec![30, 10, 0, 5], vec![10, 30, 0, 5]]).unwrap();
        let index = compute(&raster, IndexFormula::new(1, 2)).unwrap();
        let v = index.values();
        assert_relative_eq!(v[0], 0.5);
        assert_relative_eq!(v[1], -0.5);
        assert!(v[2].is_nan());
        assert_relative_eq!(v[3], 0.0);
        assert!(index.grid().is_aligned(&raster));
        assert_eq!(index.formula().to_string(), "(b1 - b2) / (b1 + b2)");
    }

    #[test]
    fn test_insufficient_bands() {
        let raster = Raster::from_bands(1, 1, vec![vec![1.0], vec![2.0], vec![3.0]]).unwrap();
        assert_eq!(
            compute(&raster, IndexFormula::NDWI).unwrap_err(),
            InputError::InsufficientBands {
                requested: 4,
                available: 3
            }
        );
        assert_eq!(
            compute(&raster, IndexFormula::new(0, 1)).unwrap_err(),
            InputError::InvalidBand
        );
    }

    #[test]
    fn test_lake_area_and_centroid() {
        let t = GeoTransform::north_up(Coord { x: 85.0, y: 28.0 }, 0.001, -0.001);
        let raster = Raster::from_bands(2, 2, vec![vec![3.0, 3.0, 1.0, 0.0], vec![1.0, 1.0, 1.0, 0.0]])
            .unwrap()
            .with_transform(t)
            .with_pixel_size((30.0, 30.0));
        let index = compute(&raster, IndexFormula::new(1, 2)).unwrap();
        assert_relative_eq!(lake_area(&index, 0.2), 2.0 * 900.0);
        let c = water_centroid(&index, 0.2).unwrap();
        assert_relative_eq!(c.x, 85.001, epsilon = 1e-12);
        assert_relative_eq!(c.y, 27.9995, epsilon = 1e-12);
        assert_eq!(water_centroid(&index, 0.9), None);
    }
}
