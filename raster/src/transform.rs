//! Affine pixel-to-world transform.

use crate::C;
use geo::geometry::Coord;

/// GDAL-ordered affine coefficients.
///
/// ```text
/// x = origin_x + col * pixel_width + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// North-up grids have zero rotation terms and a negative
/// `pixel_height`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoTransform {
    pub origin_x: C,
    pub pixel_width: C,
    pub row_rotation: C,
    pub origin_y: C,
    pub col_rotation: C,
    pub pixel_height: C,
}

impl GeoTransform {
    /// Returns a north-up transform with no rotation.
    pub fn north_up(origin: Coord<C>, pixel_width: C, pixel_height: C) -> Self {
        Self {
            origin_x: origin.x,
            pixel_width,
            row_rotation: 0.0,
            origin_y: origin.y,
            col_rotation: 0.0,
            pixel_height,
        }
    }

    pub fn from_gdal(c: [C; 6]) -> Self {
        Self {
            origin_x: c[0],
            pixel_width: c[1],
            row_rotation: c[2],
            origin_y: c[3],
            col_rotation: c[4],
            pixel_height: c[5],
        }
    }

    pub fn to_gdal(&self) -> [C; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Returns the world coordinate of the _center_ of cell `(col, row)`.
    #[allow(clippy::cast_precision_loss)]
    pub fn pixel_to_geo(&self, (col, row): (usize, usize)) -> Coord<C> {
        let col = col as C + 0.5;
        let row = row as C + 0.5;
        Coord {
            x: self.origin_x + col * self.pixel_width + row * self.row_rotation,
            y: self.origin_y + col * self.col_rotation + row * self.pixel_height,
        }
    }

    /// Returns fractional `(col, row)` for a world coordinate, or
    /// `None` if the transform is degenerate.
    pub fn geo_to_pixel(&self, coord: Coord<C>) -> Option<(C, C)> {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < C::EPSILON {
            return None;
        }
        let dx = coord.x - self.origin_x;
        let dy = coord.y - self.origin_y;
        let col = (self.pixel_height * dx - self.row_rotation * dy) / det;
        let row = (-self.col_rotation * dx + self.pixel_width * dy) / det;
        Some((col, row))
    }

    /// Returns the in-bounds cell nearest to `coord`.
    ///
    /// Coordinates outside the grid clamp to the closest edge cell.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn snap(&self, coord: Coord<C>, (width, height): (usize, usize)) -> Option<(usize, usize)> {
        if width == 0 || height == 0 {
            return None;
        }
        let (col, row) = self.geo_to_pixel(coord)?;
        if !col.is_finite() || !row.is_finite() {
            return None;
        }
        let clamp = |v: C, len: usize| v.floor().max(0.0).min((len - 1) as C) as usize;
        Some((clamp(col, width), clamp(row, height)))
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::north_up(Coord { x: 0.0, y: 0.0 }, 1.0, -1.0)
    }
}
