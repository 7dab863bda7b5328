//! SRTM / NASADEM elevation (`.hgt`) ingest.
//!
//! # References
//!
//! 1. [30-Meter SRTM Tile Downloader](https://dwtkns.com/srtm30m)
//! 1. [Archive Team](http://fileformats.archiveteam.org/index.php?title=HGT&oldid=17250)
//! 1. [SRTM Collection User Guide](https://lpdaac.usgs.gov/documents/179/SRTM_User_Guide_V3.pdf)

use crate::{GeoTransform, Raster, RasterError, C};
use byteorder::{BigEndian as BE, ReadBytesExt};
use geo::geometry::Coord;
use log::debug;
use std::{fs::File, io::BufReader, mem::size_of, path::Path};

const ARCSEC_PER_DEG: C = 3600.0;

/// Void marker in SRTM data.
pub const VOID: i16 = -32768;

/// Approximate ground length of one degree of latitude.
pub const METERS_PER_DEG: C = 111_320.0;

/// Returns an elevation raster read from the `.hgt` file at `path`.
///
/// The transform is in degrees (lon, lat). The pixel size is in
/// metres, evaluated at the tile's central latitude.
pub fn load<P: AsRef<Path>>(path: P) -> Result<Raster, RasterError> {
    let (resolution, side) = extract_resolution(&path)?;
    let (cols, rows) = (side, side);
    let sw_corner = parse_sw_corner(&path)?;
    debug!("loading {:?}, {resolution}\" {cols}x{rows}", path.as_ref());

    let mut file = BufReader::new(File::open(&path)?);
    let mut samples = Vec::with_capacity(cols * rows);
    for _ in 0..(cols * rows) {
        samples.push(file.read_i16::<BE>()?);
    }

    let deg_per_sample = C::from(resolution) / ARCSEC_PER_DEG;
    let half = deg_per_sample / 2.0;
    // Samples are centered on whole arcseconds, so the grid's
    // outer edge sits half a sample beyond the tile's integer bounds.
    let origin = Coord {
        x: C::from(sw_corner.x) - half,
        y: C::from(sw_corner.y) + 1.0 + half,
    };
    let center_lat = C::from(sw_corner.y) + 0.5;
    let pixel_size = (
        deg_per_sample * METERS_PER_DEG * center_lat.to_radians().cos(),
        deg_per_sample * METERS_PER_DEG,
    );

    Ok(Raster::from_bands(cols, rows, vec![samples])?
        .with_transform(GeoTransform::north_up(origin, deg_per_sample, -deg_per_sample))
        .with_pixel_size(pixel_size)
        .with_nodata(Some(C::from(VOID))))
}

/// Tile sides, in samples, by arcsecond resolution.
const TILE_SIDES: [(u8, usize); 2] = [(1, 3601), (3, 1201)];

/// Returns the resolution and side length of the square tile at `path`,
/// inferred from the file size.
fn extract_resolution<P: AsRef<Path>>(path: P) -> Result<(u8, usize), RasterError> {
    let len = path.as_ref().metadata()?.len();
    TILE_SIDES
        .into_iter()
        .find(|&(_, side)| (side * side * size_of::<i16>()) as u64 == len)
        .ok_or_else(|| RasterError::HgtLen(len, path.as_ref().to_owned()))
}

/// Parses the integer SW corner out of a `[NS]dd[EW]ddd` file stem.
fn parse_sw_corner<P: AsRef<Path>>(path: P) -> Result<Coord<i16>, RasterError> {
    let corner = path
        .as_ref()
        .file_stem()
        .and_then(std::ffi::OsStr::to_str)
        .filter(|stem| stem.len() == 7 && stem.is_ascii())
        .and_then(|stem| {
            let (lat, lon) = stem.split_at(3);
            Some(Coord {
                x: signed_degrees(lon, 'E', 'W', 180)?,
                y: signed_degrees(lat, 'N', 'S', 90)?,
            })
        });
    corner.ok_or_else(|| RasterError::HgtName(path.as_ref().to_owned()))
}

fn signed_degrees(field: &str, positive: char, negative: char, max: i16) -> Option<i16> {
    let mut chars = field.chars();
    let sign = match chars.next()?.to_ascii_uppercase() {
        c if c == positive => 1,
        c if c == negative => -1,
        _ => return None,
    };
    let digits = chars.as_str();
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let degrees = digits.parse::<i16>().ok().filter(|&d| d <= max)?;
    Some(sign * degrees)
}
