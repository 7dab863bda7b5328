//! Danger zones and the alerts sent to whoever is inside one.

use crate::{
    config::AlertConfig,
    math::{buffer_path, destination, distance_km},
    notify::NotificationSink,
    point::GeoPoint,
    risk::RiskLevel,
    C,
};
use geo::{
    algorithm::{ConvexHull, Intersects},
    geometry::{Coord, LineString, MultiPolygon, Polygon},
};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Radius comparisons are inclusive to within a millimetre.
const RADIUS_TOLERANCE_KM: C = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub enum DangerZone {
    /// Everything within `width_km` of the path, measured in flat
    /// degrees.
    BufferedPath { path: Vec<Coord<C>>, width_km: C },

    /// Everything within `radius_km` great-circle distance of `center`.
    Radius { center: GeoPoint, radius_km: C },
}

/// Someone who can be alerted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub id: String,
    #[serde(flatten)]
    pub location: GeoPoint,
}

impl Entity {
    pub fn new(id: impl Into<String>, location: GeoPoint) -> Self {
        Self {
            id: id.into(),
            location,
        }
    }
}

/// A [DangerZone] prepared for containment queries.
#[derive(Debug, Clone)]
pub struct Geofence {
    zone: DangerZone,
    /// Buffered geometry in degrees; empty in radius mode.
    buffer: MultiPolygon<C>,
    quadrant_segments: usize,
}

impl Geofence {
    pub fn new(zone: DangerZone, config: &AlertConfig) -> Self {
        let buffer = match &zone {
            DangerZone::BufferedPath { path, width_km } => buffer_path(
                path,
                width_km / config.km_per_degree,
                config.quadrant_segments,
            ),
            DangerZone::Radius { .. } => MultiPolygon::new(vec![]),
        };
        Self {
            zone,
            buffer,
            quadrant_segments: config.quadrant_segments.max(1),
        }
    }

    pub fn zone(&self) -> &DangerZone {
        &self.zone
    }

    /// Returns true if `location` is in the zone, boundary included.
    pub fn contains(&self, location: GeoPoint) -> bool {
        match &self.zone {
            DangerZone::Radius { center, radius_km } => {
                distance_km(center.point(), location.point()) <= radius_km + RADIUS_TOLERANCE_KM
            }
            DangerZone::BufferedPath { .. } => self.buffer.intersects(&location.point()),
        }
    }

    /// Returns a single polygon covering the zone: the convex hull of
    /// the path buffer, or a geodesic disc.
    pub fn polygon(&self) -> Polygon<C> {
        match &self.zone {
            DangerZone::Radius { center, radius_km } => {
                geodesic_disc(*center, *radius_km, self.quadrant_segments)
            }
            DangerZone::BufferedPath { .. } => self.buffer.convex_hull(),
        }
    }

    /// Sends one alert per entity inside the zone and returns how many
    /// matched. Delivery failures are logged and skipped.
    pub fn alert<'a, I>(&self, entities: I, risk: RiskLevel, sink: &dyn NotificationSink) -> usize
    where
        I: IntoIterator<Item = &'a Entity>,
    {
        let (subject, body) = self.message(risk);
        let mut matched = 0;
        for entity in entities {
            if !self.contains(entity.location) {
                continue;
            }
            matched += 1;
            debug!("{} at {} is in danger zone", entity.id, entity.location);
            if let Err(e) = sink.send(&entity.id, subject, &body) {
                warn!("{e}");
            }
        }
        matched
    }

    fn message(&self, risk: RiskLevel) -> (&'static str, String) {
        match &self.zone {
            DangerZone::BufferedPath { width_km, .. } => (
                "GLACIERWATCH SOS: FLOOD RISK ALERT",
                format!(
                    "URGENT: You are located within the predicted flow path of a glacial lake outburst.\n\
                     The danger zone is approximately {width_km}km wide along the flow channel.\n\n\
                     Please evacuate to higher ground immediately.\n\n\
                     Risk Level: {risk}\n"
                ),
            ),
            DangerZone::Radius { radius_km, .. } => (
                "GLACIERWATCH SOS: HIGH RISK DETECTED",
                format!(
                    "URGENT: A high risk of glacial lake outburst has been detected within {radius_km}km of you.\n\
                     Please follow local evacuation protocols and move to higher ground immediately.\n\n\
                     Risk Level: {risk}\n"
                ),
            ),
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn geodesic_disc(center: GeoPoint, radius_km: C, quadrant_segments: usize) -> Polygon<C> {
    let n = 4 * quadrant_segments;
    // Bearings run clockwise; reverse for a CCW exterior.
    let ring: Vec<Coord<C>> = (0..n)
        .rev()
        .map(|i| destination(center.point(), 360.0 * i as C / n as C, radius_km).0)
        .collect();
    Polygon::new(LineString::from(ring), vec![])
}
