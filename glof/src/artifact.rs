//! Where analysis inputs and outputs live.
//!
//! Artifacts are addressed by opaque string keys. Rasters travel as
//! [Raster]s and vector outputs as GeoJSON [Feature]s.

use crate::{error::StoreError, flow::FlowPath, risk::RiskLevel, record::AnalysisId, C};
use dashmap::DashMap;
use geo::geometry::{LineString, Polygon};
use geojson::{Feature, GeoJson, Geometry, JsonObject, JsonValue};
use log::debug;
use raster::{hgt, Raster, SampleMode};
use std::{
    ffi::OsStr,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::Arc,
};

pub trait ArtifactStore: Send + Sync {
    fn load_raster(&self, key: &str) -> Result<Arc<Raster>, StoreError>;

    fn save_raster(&self, key: &str, raster: &Raster) -> Result<(), StoreError>;

    fn load_feature(&self, key: &str) -> Result<Feature, StoreError>;

    fn save_feature(&self, key: &str, feature: &Feature) -> Result<(), StoreError>;

    /// Duplicates the artifact at `from` under `to`, byte for byte.
    fn copy(&self, from: &str, to: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
enum Stored {
    /// GLRS encoded.
    Raster(Arc<[u8]>),
    Feature(Feature),
}

/// Artifacts held in a concurrent map.
///
/// Rasters are kept GLRS encoded, so they go through the same sample
/// precision as rasters written to disk.
#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    entries: DashMap<String, Stored>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an encoded raster without validating it.
    pub fn insert_bytes(&self, key: &str, bytes: Vec<u8>) {
        self.entries.insert(key.to_owned(), Stored::Raster(bytes.into()));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Returns every key currently stored, sorted.
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        keys.sort_unstable();
        keys
    }

    fn get(&self, key: &str) -> Result<Stored, StoreError> {
        self.entries
            .get(key)
            .map(|e| e.value().clone())
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}

impl ArtifactStore for MemoryArtifacts {
    fn load_raster(&self, key: &str) -> Result<Arc<Raster>, StoreError> {
        match self.get(key)? {
            Stored::Raster(bytes) => Ok(Arc::new(Raster::from_reader(&mut &bytes[..])?)),
            Stored::Feature(_) => Err(StoreError::Kind {
                key: key.to_owned(),
                expected: "raster",
            }),
        }
    }

    fn save_raster(&self, key: &str, raster: &Raster) -> Result<(), StoreError> {
        let bytes = raster.to_bytes()?;
        self.entries
            .insert(key.to_owned(), Stored::Raster(bytes.into()));
        Ok(())
    }

    fn load_feature(&self, key: &str) -> Result<Feature, StoreError> {
        match self.get(key)? {
            Stored::Feature(feature) => Ok(feature),
            Stored::Raster(_) => Err(StoreError::Kind {
                key: key.to_owned(),
                expected: "feature",
            }),
        }
    }

    fn save_feature(&self, key: &str, feature: &Feature) -> Result<(), StoreError> {
        self.entries
            .insert(key.to_owned(), Stored::Feature(feature.clone()));
        Ok(())
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let stored = self.get(from)?;
        self.entries.insert(to.to_owned(), stored);
        Ok(())
    }
}

/// Artifacts stored as files below a root directory.
///
/// Keys are relative paths. Rasters ending in `.hgt` are read as SRTM
/// tiles, everything else as GLRS. Loaded rasters are cached until
/// their key is overwritten.
///
/// Writes go to a sibling file that is then renamed over the key, so a
/// raster already handed out (possibly memory mapped) keeps reading the
/// old contents. The cache is never pruned otherwise.
pub struct DirArtifacts {
    root: PathBuf,

    /// How to load GLRS rasters (in-memory or mapped).
    mode: SampleMode,

    rasters: DashMap<PathBuf, Arc<Raster>>,
}

impl DirArtifacts {
    pub fn new(root: PathBuf, mode: SampleMode) -> Result<Self, StoreError> {
        // Fail early on a bad root.
        if !fs::metadata(&root)?.is_dir() {
            return Err(StoreError::NotFound(root.display().to_string()));
        }
        Ok(Self {
            root,
            mode,
            rasters: DashMap::new(),
        })
    }

    pub fn path(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }

    /// Writes `key` through `write` into a partial file, then moves it
    /// into place.
    fn replace<F>(&self, key: &str, write: F) -> Result<(), StoreError>
    where
        F: FnOnce(&Path) -> Result<(), StoreError>,
    {
        let path = self.path(key);
        let name = path
            .file_name()
            .and_then(OsStr::to_str)
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))?;
        let partial = path.with_file_name(format!(".{name}.partial"));
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        if let Err(e) = write(&partial) {
            let _ = fs::remove_file(&partial);
            return Err(e);
        }
        fs::rename(&partial, &path)?;
        self.rasters.remove(&path);
        Ok(())
    }

    fn read_raster(&self, path: &Path) -> Result<Raster, StoreError> {
        debug!("loading {path:?}");
        let raster = if Some("hgt") == path.extension().and_then(OsStr::to_str) {
            hgt::load(path)?
        } else {
            Raster::open(path, self.mode)?
        };
        Ok(raster)
    }
}

impl ArtifactStore for DirArtifacts {
    fn load_raster(&self, key: &str) -> Result<Arc<Raster>, StoreError> {
        let path = self.path(key);
        self.rasters
            .entry(path.clone())
            .or_try_insert_with(|| self.read_raster(&path).map(Arc::new))
            .map(|r| r.clone())
    }

    fn save_raster(&self, key: &str, raster: &Raster) -> Result<(), StoreError> {
        self.replace(key, |path| Ok(raster.save(path)?))
    }

    fn load_feature(&self, key: &str) -> Result<Feature, StoreError> {
        let path = self.path(key);
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => StoreError::NotFound(key.to_owned()),
            _ => StoreError::Io(e),
        })?;
        match text.parse::<GeoJson>()? {
            GeoJson::Feature(feature) => Ok(feature),
            _ => Err(StoreError::Kind {
                key: key.to_owned(),
                expected: "feature",
            }),
        }
    }

    fn save_feature(&self, key: &str, feature: &Feature) -> Result<(), StoreError> {
        self.replace(key, |path| Ok(fs::write(path, feature.to_string())?))
    }

    fn copy(&self, from: &str, to: &str) -> Result<(), StoreError> {
        let src = self.path(from);
        self.replace(to, |dst| {
            fs::copy(&src, dst)?;
            Ok(())
        })
    }
}

/// Returns the flow path as a LineString feature tagged
/// `{"type": "flow_path"}` or `{"type": "flow_path_fallback"}`.
pub fn flow_path_feature(path: &FlowPath) -> Feature {
    let kind = if path.is_fallback() {
        "flow_path_fallback"
    } else {
        "flow_path"
    };
    let mut line = LineString::from(path.points().to_vec());
    // A one-cell path still needs two positions to be a LineString.
    if line.0.len() == 1 {
        line.0.push(line.0[0]);
    }
    let mut properties = JsonObject::new();
    properties.insert("type".to_owned(), JsonValue::from(kind));
    feature(Geometry::new(geojson::Value::from(&line)), properties)
}

pub fn risk_zone_feature(zone: &Polygon<C>, risk: RiskLevel, id: AnalysisId) -> Feature {
    let mut properties = JsonObject::new();
    properties.insert("risk_level".to_owned(), JsonValue::from(risk.as_str()));
    properties.insert("analysis_id".to_owned(), JsonValue::from(id.get()));
    feature(Geometry::new(geojson::Value::from(zone)), properties)
}

fn feature(geometry: Geometry, properties: JsonObject) -> Feature {
    Feature {
        bbox: None,
        geometry: Some(geometry),
        id: None,
        properties: Some(properties),
        foreign_members: None,
    }
}
