use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterError {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("not a GLRS raster, magic {0:?}")]
    Magic([u8; 4]),

    #[error("unsupported GLRS version {0}")]
    Version(u16),

    #[error("invalid HGT name {0}")]
    HgtName(PathBuf),

    #[error("invalid HGT file len {0} for {1}")]
    HgtLen(u64, PathBuf),

    #[error("expected {expected} samples, got {actual}")]
    SampleCount { expected: usize, actual: usize },

    #[error("band {band} out of range, raster has {count}")]
    Band { band: usize, count: usize },

    #[error("{bands} band {width}x{height} raster exceeds GLRS limits")]
    TooLarge {
        bands: usize,
        width: usize,
        height: usize,
    },

    #[error("empty raster {width}x{height}")]
    Empty { width: usize, height: usize },
}
