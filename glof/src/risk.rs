//! Hazard classification.

use crate::C;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    /// Returns true for levels that trigger geofence alerts.
    pub fn requires_alert(self) -> bool {
        self >= Self::High
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
            Self::Critical => "Critical",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseRiskLevelError(String);

impl fmt::Display for ParseRiskLevelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown risk level {:?}", self.0)
    }
}

impl std::error::Error for ParseRiskLevelError {}

impl FromStr for RiskLevel {
    type Err = ParseRiskLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" => Ok(Self::Low),
            "Medium" => Ok(Self::Medium),
            "High" => Ok(Self::High),
            "Critical" => Ok(Self::Critical),
            other => Err(ParseRiskLevelError(other.to_owned())),
        }
    }
}

/// Threshold table, evaluated top to bottom. All bounds are strict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskThresholds {
    /// Cubic metres.
    pub critical_volume: C,
    /// Degrees; applies together with `critical_volume`.
    pub critical_slope: C,
    pub high_volume: C,
    pub medium_volume: C,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        Self {
            critical_volume: 1_000_000.0,
            critical_slope: 30.0,
            high_volume: 500_000.0,
            medium_volume: 100_000.0,
        }
    }
}

impl RiskThresholds {
    pub fn classify(&self, volume: C, slope_degrees: C) -> RiskLevel {
        if volume > self.critical_volume && slope_degrees > self.critical_slope {
            RiskLevel::Critical
        } else if volume > self.high_volume {
            RiskLevel::High
        } else if volume > self.medium_volume {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Classifies with the default thresholds.
pub fn assess(volume: C, slope_degrees: C) -> RiskLevel {
    RiskThresholds::default().classify(volume, slope_degrees)
}
