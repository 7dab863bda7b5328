//! Volume gain from lake expansion.
//!
//! This is a coarse proxy: every newly flooded pixel is assumed to
//! have gained `depth_factor` metres of water. It is not a bathymetric
//! model.

use crate::{
    change::{ensure_aligned, ChangeMask},
    error::InputError,
    C,
};
use raster::Raster;

/// Returns `expansion_count * pixel_area * depth_factor`, with pixel
/// area taken from the DEM.
pub fn estimate(dem: &Raster, mask: &ChangeMask, depth_factor: C) -> Result<C, InputError> {
    ensure_aligned(dem, mask.grid())?;
    Ok(volume(mask.expansion_count(), dem.pixel_area(), depth_factor))
}

/// Like [estimate], with pixel area taken from the mask's own grid.
///
/// Used when the DEM is unreadable.
pub fn estimate_from_mask(mask: &ChangeMask, depth_factor: C) -> C {
    volume(mask.expansion_count(), mask.grid().pixel_area(), depth_factor)
}

#[allow(clippy::cast_precision_loss)]
fn volume(pixels: usize, pixel_area: C, depth_factor: C) -> C {
    if pixels == 0 {
        return 0.0;
    }
    (pixels as C * pixel_area * depth_factor).max(0.0)
}

#[cfg(test)]
mod tests {
    use super::{estimate, estimate_from_mask};
    use crate::{
        change::detect_expansion,
        error::InputError,
        index::{IndexFormula, SpectralIndexGrid},
    };
    use geo::geometry::Coord;
    use raster::{GeoTransform, Raster};

    fn transform() -> GeoTransform {
        GeoTransform::north_up(Coord { x: 500_000.0, y: 3_100_000.0 }, 10.0, -10.0)
    }

    fn index(values: Vec<f64>) -> SpectralIndexGrid {
        SpectralIndexGrid::from_raster(
            Raster::from_bands(3, 3, vec![values]).unwrap().with_transform(transform()),
            IndexFormula::NDWI,
        )
    }

    #[test]
    fn test_all_true_mask() {
        let mask = detect_expansion(&index(vec![0.0; 9]), &index(vec![0.9; 9]), 0.2).unwrap();
        let dem = Raster::from_bands(3, 3, vec![vec![4000.0; 9]])
            .unwrap()
            .with_transform(transform());
        assert_eq!(estimate(&dem, &mask, 5.0).unwrap(), 4500.0);
        assert_eq!(estimate_from_mask(&mask, 5.0), 4500.0);
    }

    #[test]
    fn test_no_expansion_is_zero() {
        let mask = detect_expansion(&index(vec![0.5; 9]), &index(vec![0.9; 9]), 0.2).unwrap();
        let dem = Raster::from_bands(3, 3, vec![vec![4000.0; 9]])
            .unwrap()
            .with_transform(transform());
        assert_eq!(estimate(&dem, &mask, 5.0).unwrap(), 0.0);
    }

    #[test]
    fn test_dem_must_align() {
        let mask = detect_expansion(&index(vec![0.0; 9]), &index(vec![0.9; 9]), 0.2).unwrap();
        let dem = Raster::from_bands(3, 3, vec![vec![4000.0; 9]]).unwrap();
        assert!(matches!(
            estimate(&dem, &mask, 5.0),
            Err(InputError::GridMisaligned { .. })
        ));
    }
}
