//! Analysis parameters.
//!
//! Every knob has a default, so a JSON document only needs the fields
//! it overrides:
//!
//! ```json
//! { "water_threshold": 0.3, "alert": { "mode": "radius", "radius_km": 15.0 } }
//! ```

use crate::{index::IndexFormula, risk::RiskThresholds, C};
use serde::{Deserialize, Serialize};
use std::io::Read;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bands of the normalized difference water index.
    pub index: IndexFormula,

    /// Index value above which a pixel is water.
    pub water_threshold: C,

    /// Assumed mean depth gain of newly flooded pixels (metres).
    pub depth_factor: C,

    /// Maximum number of moves of the flow tracer.
    pub max_steps: usize,

    /// Offset of the fallback flow path's second point (degrees).
    pub fallback_delta_deg: C,

    /// Pinned slope for risk classification (degrees). When unset the
    /// mean gradient along the traced flow path is used.
    pub slope_degrees: Option<C>,

    /// Slope used when the flow path itself is a fallback.
    pub fallback_slope_degrees: C,

    pub risk: RiskThresholds,

    pub alert: AlertConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index: IndexFormula::NDWI,
            water_threshold: 0.2,
            depth_factor: 5.0,
            max_steps: 1000,
            fallback_delta_deg: 0.01,
            slope_degrees: None,
            fallback_slope_degrees: 15.0,
            risk: RiskThresholds::default(),
            alert: AlertConfig::default(),
        }
    }
}

impl Config {
    /// Returns a config parsed from JSON, defaults filling the gaps.
    pub fn from_reader<R: Read>(rdr: R) -> Result<Self, serde_json::Error> {
        serde_json::from_reader(rdr)
    }
}

/// How the danger zone around a hazard is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertMode {
    /// Planar buffer around the flow path.
    BufferedPath,

    /// Great-circle radius around the flow path seed.
    Radius,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    pub mode: AlertMode,

    /// Full width is twice this; each side of the path gets `buffer_km`.
    pub buffer_km: C,

    pub radius_km: C,

    /// Flat-earth scale used to turn kilometres into degrees.
    pub km_per_degree: C,

    /// Segments per quarter circle of buffer caps.
    pub quadrant_segments: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            mode: AlertMode::BufferedPath,
            buffer_km: 2.0,
            radius_km: 10.0,
            km_per_degree: 111.0,
            quadrant_segments: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{AlertMode, Config};

    #[test]
    fn test_partial_json_keeps_defaults() {
        let json = r#"{ "water_threshold": 0.3, "alert": { "mode": "radius", "radius_km": 15.0 } }"#;
        let config = Config::from_reader(json.as_bytes()).unwrap();
        assert_eq!(config.water_threshold, 0.3);
        assert_eq!(config.alert.mode, AlertMode::Radius);
        assert_eq!(config.alert.radius_km, 15.0);
        assert_eq!(config.alert.buffer_km, 2.0);
        assert_eq!(config.depth_factor, 5.0);
        assert_eq!(config.max_steps, 1000);
        assert_eq!(config.index.positive_band, 2);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(Config::from_reader(&b"{}"[..]).unwrap(), Config::default());
    }
}
