mod buffer;
mod haversine;

pub(crate) use {
    buffer::buffer_path,
    haversine::{destination, distance_km},
};

/// Mean earth radius in kilometres, matching geo's haversine routines.
pub const MEAN_EARTH_RADIUS_KM: crate::C = 6_371.008_8;
