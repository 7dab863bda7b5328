use raster::Raster;
use std::sync::Arc;

/// Image enhancement applied to each observation before indexing.
pub trait Enhance: Send + Sync {
    fn enhance(&self, raster: Arc<Raster>) -> Arc<Raster>;
}

/// Returns every raster unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Enhance for Passthrough {
    fn enhance(&self, raster: Arc<Raster>) -> Arc<Raster> {
        raster
    }
}
