//! End-to-end analysis runs.
//!
//! A run walks a record through `Pending -> Computing -> Completed |
//! Failed`, appending a snapshot to the result store after every
//! stage. Bad input (misaligned grids, missing bands) fails the run;
//! unreadable artifacts and degenerate terrain only degrade the
//! affected stage.

use crate::{
    artifact::{flow_path_feature, risk_zone_feature, ArtifactStore},
    change::{self, ChangeMask},
    config::{AlertMode, Config},
    enhance::{Enhance, Passthrough},
    error::GlofError,
    flow::{path_slope_degrees, FlowPath},
    geofence::{DangerZone, Entity, Geofence},
    index::{self, SpectralIndexGrid},
    notify::NotificationSink,
    point::GeoPoint,
    record::{AnalysisId, AnalysisRecord, Inputs, ResultStore, Stage, Status},
    risk::RiskLevel,
    volume, C,
};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use raster::Raster;
use std::sync::{
    mpsc::{self, Receiver},
    Arc,
};

/// What to analyze. Raster fields are artifact keys.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisRequest {
    pub image_1: String,
    pub image_2: String,
    pub dem: String,
    pub date_1: DateTime<Utc>,
    pub date_2: DateTime<Utc>,

    /// Flow tracing start. Defaults to the centroid of the later
    /// observation's water pixels, else the DEM center.
    pub seed: Option<GeoPoint>,
}

impl AnalysisRequest {
    fn inputs(&self) -> Inputs {
        Inputs {
            image_1: self.image_1.clone(),
            image_2: self.image_2.clone(),
            dem: self.dem.clone(),
        }
    }
}

/// Provides the people to check against danger zones.
pub trait EntitySource: Send + Sync {
    fn entities(&self) -> Vec<Entity>;
}

impl EntitySource for Vec<Entity> {
    fn entities(&self) -> Vec<Entity> {
        self.clone()
    }
}

/// A submitted run.
#[derive(Debug)]
pub struct Job {
    id: AnalysisId,
    done: Receiver<Status>,
}

impl Job {
    pub fn id(&self) -> AnalysisId {
        self.id
    }

    /// Blocks until the run reaches a terminal status.
    ///
    /// Returns `None` if the worker went away without reporting.
    pub fn wait(&self) -> Option<Status> {
        self.done.recv().ok()
    }
}

#[derive(Clone)]
pub struct Orchestrator {
    config: Arc<Config>,
    artifacts: Arc<dyn ArtifactStore>,
    results: Arc<dyn ResultStore>,
    sink: Arc<dyn NotificationSink>,
    entities: Arc<dyn EntitySource>,
    enhancer: Arc<dyn Enhance>,
}

pub struct OrchestratorBuilder {
    /// Analysis parameters (defaults to `Config::default()`).
    config: Option<Config>,

    /// Input and output rasters and features (required).
    artifacts: Option<Arc<dyn ArtifactStore>>,

    /// Record history (required).
    results: Option<Arc<dyn ResultStore>>,

    /// Alert transport (required).
    sink: Option<Arc<dyn NotificationSink>>,

    /// People to alert (required).
    entities: Option<Arc<dyn EntitySource>>,

    /// Pre-index enhancement (defaults to `Passthrough`).
    enhancer: Option<Arc<dyn Enhance>>,
}

impl OrchestratorBuilder {
    /// Analysis parameters (defaults to `Config::default()`).
    #[must_use]
    pub fn config(mut self, config: Config) -> Self {
        self.config = Some(config);
        self
    }

    /// Input and output rasters and features (required).
    #[must_use]
    pub fn artifacts(mut self, artifacts: Arc<dyn ArtifactStore>) -> Self {
        self.artifacts = Some(artifacts);
        self
    }

    /// Record history (required).
    #[must_use]
    pub fn results(mut self, results: Arc<dyn ResultStore>) -> Self {
        self.results = Some(results);
        self
    }

    /// Alert transport (required).
    #[must_use]
    pub fn sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// People to alert (required).
    #[must_use]
    pub fn entities(mut self, entities: Arc<dyn EntitySource>) -> Self {
        self.entities = Some(entities);
        self
    }

    /// Pre-index enhancement (defaults to `Passthrough`).
    #[must_use]
    pub fn enhancer(mut self, enhancer: Arc<dyn Enhance>) -> Self {
        self.enhancer = Some(enhancer);
        self
    }

    pub fn build(self) -> Result<Orchestrator, GlofError> {
        Ok(Orchestrator {
            config: Arc::new(self.config.unwrap_or_default()),
            artifacts: self.artifacts.ok_or(GlofError::Builder("artifacts"))?,
            results: self.results.ok_or(GlofError::Builder("results"))?,
            sink: self.sink.ok_or(GlofError::Builder("sink"))?,
            entities: self.entities.ok_or(GlofError::Builder("entities"))?,
            enhancer: self.enhancer.unwrap_or_else(|| Arc::new(Passthrough)),
        })
    }
}

impl Orchestrator {
    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder {
            config: None,
            artifacts: None,
            results: None,
            sink: None,
            entities: None,
            enhancer: None,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs an analysis to completion on the calling thread and returns
    /// its final record.
    pub fn run(&self, request: &AnalysisRequest) -> AnalysisRecord {
        let record = self.open(request);
        self.execute(request, record)
    }

    /// Queues an analysis on the rayon pool and returns immediately.
    ///
    /// The record is already `Pending` in the result store when this
    /// returns.
    pub fn submit(&self, request: AnalysisRequest) -> Job {
        let record = self.open(&request);
        let id = record.id;
        let (tx, done) = mpsc::channel();
        let this = self.clone();
        rayon::spawn(move || {
            let record = this.execute(&request, record);
            // Nobody may be waiting.
            let _ = tx.send(record.status);
        });
        Job { id, done }
    }

    /// Returns the latest snapshot of analysis `id`.
    pub fn record(&self, id: AnalysisId) -> Result<AnalysisRecord, GlofError> {
        self.results
            .latest(id)
            .ok_or(GlofError::UnknownAnalysis(id))
    }
}

/// Private API.
impl Orchestrator {
    fn open(&self, request: &AnalysisRequest) -> AnalysisRecord {
        let id = self.results.next_id();
        let record = AnalysisRecord::new(id, request.inputs(), request.date_1, request.date_2);
        self.results.append(record.clone());
        info!("analysis {id}: pending");
        record
    }

    fn snapshot(&self, record: &mut AnalysisRecord) {
        record.updated_at = Utc::now();
        self.results.append(record.clone());
    }

    fn execute(&self, request: &AnalysisRequest, mut record: AnalysisRecord) -> AnalysisRecord {
        let id = record.id;
        record.status = Status::Computing;
        self.snapshot(&mut record);
        info!("analysis {id}: computing");

        match self.stages(request, &mut record) {
            Ok(()) => {
                record.status = Status::Completed;
                info!(
                    "analysis {id}: completed; risk: {:?}, alerts: {}, degraded: {:?}",
                    record.risk_level, record.alerts_sent, record.degraded
                );
            }
            Err(e) => {
                record.status = Status::Failed;
                record.error = Some(e.to_string());
                warn!("analysis {id}: failed, {e}");
            }
        }
        self.snapshot(&mut record);
        record
    }

    fn stages(&self, request: &AnalysisRequest, record: &mut AnalysisRecord) -> Result<(), GlofError> {
        let id = record.id;
        let config = &*self.config;

        // Index both observations.
        let (ndwi_1, ndwi_2) = (key(id, "ndwi_1.glr"), key(id, "ndwi_2.glr"));
        let (index_1, index_2) = rayon::join(
            || self.index(&request.image_1, &ndwi_1),
            || self.index(&request.image_2, &ndwi_2),
        );
        // Keep whichever side was stored, even if the other failed.
        if let Ok(out) = &index_1 {
            record.artifacts.ndwi_1 = out.key.clone();
        }
        if let Ok(out) = &index_2 {
            record.artifacts.ndwi_2 = out.key.clone();
        }
        let (index_1, index_2) = (index_1?.grid, index_2?.grid);
        if index_1.is_none() || index_2.is_none() {
            record.mark_degraded(Stage::Index);
        }
        record.lake_area_1 = index_1
            .as_ref()
            .map(|grid| index::lake_area(grid, config.water_threshold));
        record.lake_area_2 = index_2
            .as_ref()
            .map(|grid| index::lake_area(grid, config.water_threshold));
        self.snapshot(record);

        // Change.
        let mask = match (&index_1, &index_2) {
            (Some(earlier), Some(later)) => {
                let mask = change::detect_expansion(earlier, later, config.water_threshold)?;
                debug!("analysis {id}: {} expansion pixels", mask.expansion_count());
                match mask.to_raster() {
                    Ok(grid) => record.artifacts.change = self.store(&key(id, "change.glr"), &grid),
                    Err(e) => warn!("analysis {id}: change mask not encodable, {e}"),
                }
                record.artifacts.difference = self.store(&key(id, "difference.glr"), mask.difference());
                Some(mask)
            }
            _ => {
                warn!("analysis {id}: index unavailable, passing change through");
                record.mark_degraded(Stage::Change);
                let change_key = key(id, "change.glr");
                if let Some(ndwi) = &record.artifacts.ndwi_1 {
                    match self.artifacts.copy(ndwi, &change_key) {
                        Ok(()) => record.artifacts.change = Some(change_key),
                        Err(e) => warn!("analysis {id}: change pass-through failed, {e}"),
                    }
                }
                None
            }
        };
        self.snapshot(record);

        // Volume.
        let dem = match self.artifacts.load_raster(&request.dem) {
            Ok(dem) => Some(dem),
            Err(e) => {
                warn!("analysis {id}: DEM {} unreadable, {e}", request.dem);
                None
            }
        };
        record.volume_change = Some(self.volume(record, mask.as_ref(), dem.as_deref())?);
        self.snapshot(record);

        // Flow.
        let seed = request
            .seed
            .or_else(|| default_seed(index_2.as_ref(), dem.as_deref(), config.water_threshold));
        let path = seed.map(|seed| self.trace(record, seed, dem.as_deref()));
        if seed.is_none() {
            warn!("analysis {id}: no seed for flow tracing");
            record.mark_degraded(Stage::Flow);
        }
        if let Some(path) = &path {
            record.artifacts.flow_path = self.store_feature(&key(id, "flow.json"), &flow_path_feature(path));
        }

        // Risk.
        let slope = config.slope_degrees.unwrap_or_else(|| {
            match (&path, dem.as_deref()) {
                (Some(path), Some(dem)) if !path.is_fallback() => {
                    path_slope_degrees(dem, path).unwrap_or(config.fallback_slope_degrees)
                }
                _ => config.fallback_slope_degrees,
            }
        });
        let volume = record.volume_change.unwrap_or(0.0);
        let risk = config.risk.classify(volume, slope);
        record.slope_degrees = Some(slope);
        record.risk_level = Some(risk);
        info!("analysis {id}: volume {volume:.1} m3, slope {slope:.2} deg, risk {risk}");
        self.snapshot(record);

        // Danger zone and alerts.
        let (Some(path), Some(seed)) = (path, seed) else {
            return Ok(());
        };
        let zone = match config.alert.mode {
            AlertMode::BufferedPath => DangerZone::BufferedPath {
                path: path.points().to_vec(),
                width_km: config.alert.buffer_km,
            },
            AlertMode::Radius => DangerZone::Radius {
                center: seed,
                radius_km: config.alert.radius_km,
            },
        };
        let fence = Geofence::new(zone, &config.alert);
        record.artifacts.risk_zone =
            self.store_feature(&key(id, "risk_zone.json"), &risk_zone_feature(&fence.polygon(), risk, id));
        if risk.requires_alert() {
            record.alerts_sent = self.alert(&fence, risk);
            info!("analysis {id}: {} entities alerted", record.alerts_sent);
        }
        Ok(())
    }

    /// Computes and stores one index grid. An unreadable source is
    /// copied to `dst` as is.
    fn index(&self, src: &str, dst: &str) -> Result<IndexOutput, GlofError> {
        let raster = match self.artifacts.load_raster(src) {
            Ok(raster) => raster,
            Err(e) => {
                warn!("{src} unreadable, {e}; passing through");
                let key = match self.artifacts.copy(src, dst) {
                    Ok(()) => Some(dst.to_owned()),
                    Err(e) => {
                        warn!("pass-through of {src} failed, {e}");
                        None
                    }
                };
                return Ok(IndexOutput { grid: None, key });
            }
        };
        let raster = self.enhancer.enhance(raster);
        let grid = index::compute(&raster, self.config.index)?;
        let key = self.store(dst, grid.grid());
        Ok(IndexOutput {
            grid: Some(grid),
            key,
        })
    }

    fn volume(
        &self,
        record: &mut AnalysisRecord,
        mask: Option<&ChangeMask>,
        dem: Option<&Raster>,
    ) -> Result<C, GlofError> {
        let depth_factor = self.config.depth_factor;
        match (mask, dem) {
            (Some(mask), Some(dem)) => Ok(volume::estimate(dem, mask, depth_factor)?),
            (Some(mask), None) => {
                warn!("analysis {}: volume from mask geometry", record.id);
                record.mark_degraded(Stage::Volume);
                Ok(volume::estimate_from_mask(mask, depth_factor))
            }
            (None, _) => {
                record.mark_degraded(Stage::Volume);
                Ok(0.0)
            }
        }
    }

    fn trace(&self, record: &mut AnalysisRecord, seed: GeoPoint, dem: Option<&Raster>) -> FlowPath {
        let config = &*self.config;
        let traced = dem.map(|dem| {
            FlowPath::builder()
                .seed(seed)
                .max_steps(config.max_steps)
                .build(dem)
        });
        match traced {
            Some(Ok(path)) => path,
            Some(Err(e)) => {
                warn!("analysis {}: flow tracing failed, {e}; using fallback", record.id);
                record.mark_degraded(Stage::Flow);
                FlowPath::fallback(seed, config.fallback_delta_deg)
            }
            None => {
                record.mark_degraded(Stage::Flow);
                FlowPath::fallback(seed, config.fallback_delta_deg)
            }
        }
    }

    fn alert(&self, fence: &Geofence, risk: RiskLevel) -> usize {
        let entities = self.entities.entities();
        fence.alert(&entities, risk, &*self.sink)
    }

    fn store(&self, key: &str, raster: &Raster) -> Option<String> {
        match self.artifacts.save_raster(key, raster) {
            Ok(()) => Some(key.to_owned()),
            Err(e) => {
                warn!("saving {key} failed, {e}");
                None
            }
        }
    }

    fn store_feature(&self, key: &str, feature: &geojson::Feature) -> Option<String> {
        match self.artifacts.save_feature(key, feature) {
            Ok(()) => Some(key.to_owned()),
            Err(e) => {
                warn!("saving {key} failed, {e}");
                None
            }
        }
    }
}

struct IndexOutput {
    grid: Option<SpectralIndexGrid>,
    key: Option<String>,
}

fn key(id: AnalysisId, name: &str) -> String {
    format!("analysis_{id}/{name}")
}

fn default_seed(index: Option<&SpectralIndexGrid>, dem: Option<&Raster>, threshold: C) -> Option<GeoPoint> {
    index
        .and_then(|grid| index::water_centroid(grid, threshold))
        .or_else(|| dem.map(|dem| dem.cell_center((dem.width() / 2, dem.height() / 2))))
        .map(GeoPoint::from)
}
