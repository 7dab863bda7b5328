use crate::record::AnalysisId;
use raster::RasterError;
use thiserror::Error;

/// Bad caller input. Always aborts the run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("band {requested} requested, raster has {available}")]
    InsufficientBands { requested: usize, available: usize },

    #[error("band indices are 1-based, got 0")]
    InvalidBand,

    #[error("grids misaligned, {left:?} vs {right:?}")]
    GridMisaligned {
        left: (usize, usize),
        right: (usize, usize),
    },
}

/// Artifact could not be read or written.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("no artifact {0}")]
    NotFound(String),

    #[error("artifact {key} is not a {expected}")]
    Kind { key: String, expected: &'static str },

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Raster(#[from] RasterError),

    #[error("{0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    GeoJson(#[from] geojson::Error),
}

/// Degenerate geometry encountered mid-computation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComputationError {
    #[error("seed cell {0:?} has no elevation")]
    NoDataSeed((usize, usize)),

    #[error("seed does not map onto the grid")]
    Unsnappable,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("alert to {recipient} not delivered, {reason}")]
pub struct AlertDeliveryError {
    pub recipient: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum GlofError {
    #[error("missing required parameter '{0}'")]
    Builder(&'static str),

    #[error("{0}")]
    Input(#[from] InputError),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("{0}")]
    Computation(#[from] ComputationError),

    #[error("unknown analysis {0}")]
    UnknownAnalysis(AnalysisId),
}
