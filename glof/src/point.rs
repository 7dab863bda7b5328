use crate::C;
use geo::geometry::{Coord, Point};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// WGS84 location in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: C,
    pub lon: C,
}

impl GeoPoint {
    pub fn new(lat: C, lon: C) -> Self {
        Self { lat, lon }
    }

    /// Returns this location as an `x = lon, y = lat` coordinate.
    pub fn coord(&self) -> Coord<C> {
        Coord {
            x: self.lon,
            y: self.lat,
        }
    }

    pub fn point(&self) -> Point<C> {
        Point(self.coord())
    }
}

impl From<Coord<C>> for GeoPoint {
    fn from(Coord { x, y }: Coord<C>) -> Self {
        Self { lat: y, lon: x }
    }
}

impl From<Point<C>> for GeoPoint {
    fn from(point: Point<C>) -> Self {
        Self::from(point.0)
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lon)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseGeoPointError(String);

impl fmt::Display for ParseGeoPointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "not a valid lat,lon pair: {}", self.0)
    }
}

impl std::error::Error for ParseGeoPointError {}

/// Parses `"lat,lon"`.
impl FromStr for GeoPoint {
    type Err = ParseGeoPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mk_err = || ParseGeoPointError(s.to_owned());
        let (lat_str, lon_str) = s.split_once(',').ok_or_else(mk_err)?;
        let lat = C::from_str(lat_str.trim()).map_err(|_| mk_err())?;
        let lon = C::from_str(lon_str.trim()).map_err(|_| mk_err())?;
        if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
            return Err(mk_err());
        }
        Ok(Self { lat, lon })
    }
}

#[cfg(test)]
mod tests {
    use super::GeoPoint;

    #[test]
    fn test_parse() {
        let p: GeoPoint = "28.0, 85.5".parse().unwrap();
        assert_eq!(p, GeoPoint::new(28.0, 85.5));
        assert_eq!(p.coord().x, 85.5);
        assert!("28.0".parse::<GeoPoint>().is_err());
        assert!("91.0,0".parse::<GeoPoint>().is_err());
        assert!("a,b".parse::<GeoPoint>().is_err());
    }
}
