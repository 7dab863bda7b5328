//! # Glacial lake outburst hazard analysis
//!
//! `glof` takes two observations of a glacial lake and a DEM of the
//! valley below it, and works out:
//!
//! 1. where the lake grew ([index], [change]),
//! 2. roughly how much water that added ([volume]),
//! 3. where an outburst would run ([flow]),
//! 4. how dangerous that is ([risk]),
//! 5. and who needs to be warned ([geofence]).
//!
//! [pipeline::Orchestrator] runs all of it against pluggable artifact,
//! result and notification backends.

pub mod artifact;
pub mod change;
mod config;
pub mod enhance;
mod error;
pub mod flow;
pub mod geofence;
pub mod index;
mod math;
pub mod notify;
pub mod pipeline;
mod point;
pub mod record;
pub mod risk;
pub mod volume;

pub use {
    crate::{
        config::{AlertConfig, AlertMode, Config},
        error::{AlertDeliveryError, ComputationError, GlofError, InputError, StoreError},
        pipeline::{AnalysisRequest, Orchestrator},
        point::{GeoPoint, ParseGeoPointError},
        risk::RiskLevel,
    },
    geo, raster,
};

pub use raster::C;
