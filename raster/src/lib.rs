//! Georeferenced raster grids.
//!
//! A [Raster] is an immutable, band-sequential grid of samples with an
//! affine [GeoTransform] and a pixel size in projected units. Rasters
//! are read from the native GLRS format (see [codec]) or from SRTM
//! `.hgt` elevation files (see [hgt]).

pub mod codec;
mod error;
pub mod hgt;
mod transform;

pub use crate::{error::RasterError, transform::GeoTransform};
use byteorder::{ByteOrder, LittleEndian as LE};
use geo::geometry::Coord;
use memmap2::Mmap;
use num_traits::AsPrimitive;
use std::mem::size_of;

/// Base floating point type used for all coordinates and samples.
pub type C = f64;

/// How to hold sample data read from disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleMode {
    /// Decode every sample into memory.
    InMem,

    /// Memory map file contents and decode on access.
    MemMap,
}

pub struct Raster {
    /// Number of (columns, rows).
    dimensions: (usize, usize),

    /// Number of bands.
    bands: usize,

    /// Maps (col, row) to world coordinates.
    transform: GeoTransform,

    /// Pixel (x, y) size in projected units.
    ///
    /// Kept apart from `transform` since a grid georeferenced in
    /// degrees still has a metric ground footprint.
    pixel_size: (C, C),

    /// Sample value meaning "no data".
    nodata: Option<C>,

    samples: SampleStore,
}

enum SampleStore {
    InMem(Box<[C]>),
    MemMap { map: Mmap, offset: usize },
}

impl SampleStore {
    fn get_unchecked(&self, index: usize) -> C {
        match self {
            Self::InMem(samples) => samples[index],
            Self::MemMap { map, offset } => {
                let start = offset + index * size_of::<f32>();
                C::from(LE::read_f32(&map[start..start + size_of::<f32>()]))
            }
        }
    }
}

impl Raster {
    /// Returns an in-memory raster from per-band sample vectors.
    ///
    /// Every band must hold exactly `width * height` samples in
    /// row-major order. The transform defaults to a unit north-up
    /// grid at the origin.
    pub fn from_bands<T>(width: usize, height: usize, bands: Vec<Vec<T>>) -> Result<Self, RasterError>
    where
        T: AsPrimitive<C>,
    {
        if width == 0 || height == 0 || bands.is_empty() {
            return Err(RasterError::Empty { width, height });
        }
        let expected = width * height;
        let n_bands = bands.len();
        let mut samples = Vec::with_capacity(expected * n_bands);
        for band in bands {
            if band.len() != expected {
                return Err(RasterError::SampleCount {
                    expected,
                    actual: band.len(),
                });
            }
            samples.extend(band.into_iter().map(AsPrimitive::as_));
        }
        let transform = GeoTransform::default();
        Ok(Self {
            dimensions: (width, height),
            bands: n_bands,
            pixel_size: (transform.pixel_width.abs(), transform.pixel_height.abs()),
            transform,
            nodata: None,
            samples: SampleStore::InMem(samples.into_boxed_slice()),
        })
    }

    /// Returns a single band raster sharing `self`'s georeferencing.
    pub fn derive(&self, samples: Vec<C>) -> Result<Self, RasterError> {
        let (width, height) = self.dimensions;
        Ok(Self::from_bands(width, height, vec![samples])?
            .with_transform(self.transform)
            .with_pixel_size(self.pixel_size))
    }

    /// Sets the transform, and the pixel size to the transform's
    /// cell dimensions.
    #[must_use]
    pub fn with_transform(mut self, transform: GeoTransform) -> Self {
        self.transform = transform;
        self.pixel_size = (transform.pixel_width.abs(), transform.pixel_height.abs());
        self
    }

    /// Overrides the pixel size (projected units).
    #[must_use]
    pub fn with_pixel_size(mut self, pixel_size: (C, C)) -> Self {
        self.pixel_size = pixel_size;
        self
    }

    #[must_use]
    pub fn with_nodata(mut self, nodata: Option<C>) -> Self {
        self.nodata = nodata;
        self
    }

    pub fn width(&self) -> usize {
        self.dimensions.0
    }

    pub fn height(&self) -> usize {
        self.dimensions.1
    }

    /// Returns (columns, rows).
    pub fn dimensions(&self) -> (usize, usize) {
        self.dimensions
    }

    /// Returns the number of samples in one band.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.dimensions.0 * self.dimensions.1
    }

    pub fn band_count(&self) -> usize {
        self.bands
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn pixel_size(&self) -> (C, C) {
        self.pixel_size
    }

    /// Returns the ground area covered by one pixel.
    pub fn pixel_area(&self) -> C {
        (self.pixel_size.0 * self.pixel_size.1).abs()
    }

    pub fn nodata(&self) -> Option<C> {
        self.nodata
    }

    /// Returns true if `other` has the same dimensions and transform.
    pub fn is_aligned(&self, other: &Self) -> bool {
        self.dimensions == other.dimensions && self.transform == other.transform
    }

    /// Returns the sample at 1-based `band` and `(col, row)`.
    ///
    /// No-data samples are returned as NaN.
    pub fn get(&self, band: usize, (col, row): (usize, usize)) -> Option<C> {
        let (width, height) = self.dimensions;
        if band == 0 || band > self.bands || col >= width || row >= height {
            return None;
        }
        Some(self.get_unchecked(band, (col, row)))
    }

    /// Returns every sample of 1-based `band` in row-major order.
    pub fn band(&self, band: usize) -> Result<Vec<C>, RasterError> {
        if band == 0 || band > self.bands {
            return Err(RasterError::Band {
                band,
                count: self.bands,
            });
        }
        let start = (band - 1) * self.len();
        Ok((start..start + self.len())
            .map(|idx| self.mask_nodata(self.samples.get_unchecked(idx)))
            .collect())
    }

    /// Returns the world coordinate of cell `(col, row)`'s center.
    pub fn cell_center(&self, cell: (usize, usize)) -> Coord<C> {
        self.transform.pixel_to_geo(cell)
    }

    /// Returns the in-bounds cell nearest to `coord`.
    pub fn snap(&self, coord: Coord<C>) -> Option<(usize, usize)> {
        self.transform.snap(coord, self.dimensions)
    }
}

/// Private API
impl Raster {
    fn get_unchecked(&self, band: usize, (col, row): (usize, usize)) -> C {
        let idx = (band - 1) * self.len() + row * self.dimensions.0 + col;
        self.mask_nodata(self.samples.get_unchecked(idx))
    }

    fn mask_nodata(&self, sample: C) -> C {
        match self.nodata {
            #[allow(clippy::float_cmp)]
            Some(nodata) if sample == nodata => C::NAN,
            _ => sample,
        }
    }
}

impl std::fmt::Debug for Raster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Raster")
            .field("dimensions", &self.dimensions)
            .field("bands", &self.bands)
            .field("transform", &self.transform)
            .field("pixel_size", &self.pixel_size)
            .field("nodata", &self.nodata)
            .finish_non_exhaustive()
    }
}
