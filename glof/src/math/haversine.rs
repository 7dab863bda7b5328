//! Great-circle helpers on `x = lon, y = lat` degree points.

use super::MEAN_EARTH_RADIUS_KM;
use crate::C;
use geo::{algorithm::HaversineDistance, Point};

/// Returns the great-circle distance between two points in km.
pub fn distance_km(a: Point<C>, b: Point<C>) -> C {
    a.haversine_distance(&b) / 1000.0
}

/// Returns the point `km` away from `origin` along the initial
/// `bearing_deg` (clockwise from north).
pub fn destination(origin: Point<C>, bearing_deg: C, km: C) -> Point<C> {
    let lat1 = origin.y().to_radians();
    let lon1 = origin.x().to_radians();
    let theta = bearing_deg.to_radians();
    let delta = km / MEAN_EARTH_RADIUS_KM;

    let (lat1_sin, lat1_cos) = lat1.sin_cos();
    let (delta_sin, delta_cos) = delta.sin_cos();

    let lat2 = (lat1_sin * delta_cos + lat1_cos * delta_sin * theta.cos()).asin();
    let lon2 = lon1
        + (theta.sin() * delta_sin * lat1_cos).atan2(delta_cos - lat1_sin * lat2.sin());

    // Normalize to [-180, 180).
    let lon2 = (lon2.to_degrees() + 540.0) % 360.0 - 180.0;
    Point::new(lon2, lat2.to_degrees())
}
