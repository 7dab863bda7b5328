use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use geo::geometry::Coord;
use glof::{
    artifact::{ArtifactStore, MemoryArtifacts},
    geofence::Entity,
    index::IndexFormula,
    notify::MemorySink,
    record::{MemoryResults, ResultStore, Stage, Status},
    AlertMode, AnalysisRequest, Config, GeoPoint, Orchestrator, RiskLevel,
};
use raster::{GeoTransform, Raster};
use std::sync::Arc;

const WATER: (f64, f64) = (30.0, 10.0);
const LAND: (f64, f64) = (10.0, 30.0);

fn transform() -> GeoTransform {
    GeoTransform::north_up(Coord { x: 85.0, y: 28.0 }, 0.001, -0.001)
}

fn grid(width: usize, height: usize, bands: Vec<Vec<f64>>) -> Raster {
    Raster::from_bands(width, height, bands)
        .unwrap()
        .with_transform(transform())
        .with_pixel_size((200.0, 200.0))
}

/// Two band (green, nir) 4x4 image with water at `cells`.
fn image(cells: &[(usize, usize)]) -> Raster {
    let (green, nir): (Vec<f64>, Vec<f64>) = (0..16_usize)
        .map(|i| {
            if cells.contains(&(i % 4, i / 4)) {
                WATER
            } else {
                LAND
            }
        })
        .unzip();
    grid(4, 4, vec![green, nir])
}

/// Flat at 100 m with a 90 m hollow at (2, 2).
fn dem() -> Raster {
    let mut elevation = vec![100.0; 16];
    elevation[2 * 4 + 2] = 90.0;
    grid(4, 4, vec![elevation])
}

fn cell_center((col, row): (usize, usize)) -> GeoPoint {
    GeoPoint::new(28.0 - (row as f64 + 0.5) * 0.001, 85.0 + (col as f64 + 0.5) * 0.001)
}

struct Fixture {
    artifacts: Arc<MemoryArtifacts>,
    results: Arc<MemoryResults>,
    sink: Arc<MemorySink>,
    orchestrator: Orchestrator,
}

impl Fixture {
    fn new(config: Config) -> Self {
        Self::with_sink(config, MemorySink::new())
    }

    fn with_sink(config: Config, sink: MemorySink) -> Self {
        let artifacts = Arc::new(MemoryArtifacts::new());
        artifacts
            .save_raster("img_1.glr", &image(&[(0, 0), (1, 0)]))
            .unwrap();
        artifacts
            .save_raster(
                "img_2.glr",
                &image(&[(0, 0), (1, 0), (2, 0), (0, 1), (1, 1), (2, 1)]),
            )
            .unwrap();
        artifacts.save_raster("dem.glr", &dem()).unwrap();

        let end = cell_center((2, 2));
        let entities = vec![
            Entity::new("at-end", end),
            Entity::new("next-door", GeoPoint::new(end.lat, end.lon + 0.009)),
            Entity::new("far", GeoPoint::new(28.45, 85.0)),
        ];

        let results = Arc::new(MemoryResults::new());
        let sink = Arc::new(sink);
        let orchestrator = Orchestrator::builder()
            .config(config)
            .artifacts(artifacts.clone())
            .results(results.clone())
            .sink(sink.clone())
            .entities(Arc::new(entities))
            .build()
            .unwrap();
        Self {
            artifacts,
            results,
            sink,
            orchestrator,
        }
    }
}

fn config() -> Config {
    Config {
        index: IndexFormula::new(1, 2),
        ..Config::default()
    }
}

fn request() -> AnalysisRequest {
    AnalysisRequest {
        image_1: "img_1.glr".into(),
        image_2: "img_2.glr".into(),
        dem: "dem.glr".into(),
        date_1: Utc.with_ymd_and_hms(2023, 9, 1, 0, 0, 0).unwrap(),
        date_2: Utc.with_ymd_and_hms(2024, 9, 1, 0, 0, 0).unwrap(),
        seed: Some(cell_center((1, 1))),
    }
}

#[test]
fn test_full_run() {
    let fx = Fixture::new(config());
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Completed);
    assert_eq!(record.error, None);
    assert!(record.degraded.is_empty());
    assert_relative_eq!(record.lake_area_1.unwrap(), 2.0 * 40_000.0);
    assert_relative_eq!(record.lake_area_2.unwrap(), 6.0 * 40_000.0);
    assert_relative_eq!(record.volume_change.unwrap(), 800_000.0);
    // 10 m drop over one diagonal cell.
    assert_relative_eq!(
        record.slope_degrees.unwrap(),
        (10.0 / 200.0_f64.hypot(200.0)).atan().to_degrees(),
        epsilon = 1e-9
    );
    assert_eq!(record.risk_level, Some(RiskLevel::High));
    assert_eq!(record.alerts_sent, 2);

    let sent = fx.sink.sent();
    let recipients: Vec<&str> = sent.iter().map(|m| m.recipient.as_str()).collect();
    assert_eq!(recipients, vec!["at-end", "next-door"]);
    assert_eq!(sent[0].subject, "GLACIERWATCH SOS: FLOOD RISK ALERT");

    let id = record.id;
    for (artifact, name) in [
        (&record.artifacts.ndwi_1, "ndwi_1.glr"),
        (&record.artifacts.ndwi_2, "ndwi_2.glr"),
        (&record.artifacts.change, "change.glr"),
        (&record.artifacts.difference, "difference.glr"),
        (&record.artifacts.flow_path, "flow.json"),
        (&record.artifacts.risk_zone, "risk_zone.json"),
    ] {
        let key = format!("analysis_{id}/{name}");
        assert_eq!(artifact.as_deref(), Some(key.as_str()));
        assert!(fx.artifacts.contains(&key), "{key} missing");
    }

    let change = fx.artifacts.load_raster(&format!("analysis_{id}/change.glr")).unwrap();
    assert_eq!(change.band(1).unwrap().iter().filter(|&&v| v == 1.0).count(), 4);

    let flow = fx.artifacts.load_feature(&format!("analysis_{id}/flow.json")).unwrap();
    assert_eq!(flow.property("type").unwrap(), "flow_path");
    let zone = fx.artifacts.load_feature(&format!("analysis_{id}/risk_zone.json")).unwrap();
    assert_eq!(zone.property("risk_level").unwrap(), "High");
    assert_eq!(zone.property("analysis_id").unwrap(), id.get());

    let statuses: Vec<Status> = fx.results.history(id).iter().map(|r| r.status).collect();
    assert_eq!(statuses.first(), Some(&Status::Pending));
    assert_eq!(statuses.last(), Some(&Status::Completed));
    assert!(statuses[1..statuses.len() - 1]
        .iter()
        .all(|s| *s == Status::Computing));
    assert_eq!(fx.orchestrator.record(id).unwrap(), record);
}

#[test]
fn test_pinned_slope_makes_critical() {
    let fx = Fixture::new(Config {
        depth_factor: 10.0,
        slope_degrees: Some(35.0),
        ..config()
    });
    let record = fx.orchestrator.run(&request());
    assert_relative_eq!(record.volume_change.unwrap(), 1_600_000.0);
    assert_eq!(record.slope_degrees, Some(35.0));
    assert_eq!(record.risk_level, Some(RiskLevel::Critical));
    assert_eq!(record.alerts_sent, 2);
}

#[test]
fn test_radius_mode() {
    let mut config = config();
    config.alert.mode = AlertMode::Radius;
    config.alert.radius_km = 0.5;
    let fx = Fixture::new(config);
    let record = fx.orchestrator.run(&request());
    // "at-end" is ~150 m from the seed, "next-door" ~1 km.
    assert_eq!(record.alerts_sent, 1);
    let sent = fx.sink.sent();
    assert_eq!(sent[0].recipient, "at-end");
    assert_eq!(sent[0].subject, "GLACIERWATCH SOS: HIGH RISK DETECTED");
}

#[test]
fn test_low_risk_sends_nothing() {
    let fx = Fixture::new(Config {
        depth_factor: 0.5,
        ..config()
    });
    let record = fx.orchestrator.run(&request());
    assert_eq!(record.status, Status::Completed);
    assert_eq!(record.risk_level, Some(RiskLevel::Low));
    assert_eq!(record.alerts_sent, 0);
    assert!(record.artifacts.risk_zone.is_some());
    assert!(fx.sink.sent().is_empty());
}

#[test]
fn test_misaligned_dem_fails_but_keeps_artifacts() {
    let fx = Fixture::new(config());
    fx.artifacts
        .save_raster("dem.glr", &grid(3, 3, vec![vec![100.0; 9]]))
        .unwrap();
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Failed);
    assert!(record.error.as_deref().unwrap().contains("misaligned"));
    assert_eq!(record.risk_level, None);
    let change = record.artifacts.change.unwrap();
    assert!(fx.artifacts.contains(&change));
    assert!(fx.sink.sent().is_empty());
}

#[test]
fn test_insufficient_bands_fails() {
    let fx = Fixture::new(Config::default());
    let record = fx.orchestrator.run(&request());
    assert_eq!(record.status, Status::Failed);
    assert!(record.error.unwrap().contains("band 4"));
}

#[test]
fn test_failed_run_references_stored_index() {
    let fx = Fixture::new(config());
    fx.artifacts
        .save_raster("img_2.glr", &grid(4, 4, vec![vec![10.0; 16]]))
        .unwrap();
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Failed);
    assert!(record.error.as_deref().unwrap().contains("band 2"));
    let id = record.id;
    let ndwi_1 = format!("analysis_{id}/ndwi_1.glr");
    assert_eq!(record.artifacts.ndwi_1.as_deref(), Some(ndwi_1.as_str()));
    assert!(fx.artifacts.contains(&ndwi_1));
    assert_eq!(record.artifacts.ndwi_2, None);
    assert_eq!(fx.orchestrator.record(id).unwrap(), record);
}

#[test]
fn test_failed_delivery_still_completes() {
    let fx = Fixture::with_sink(config(), MemorySink::new().failing_for("at-end"));
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Completed);
    assert_eq!(record.error, None);
    assert_eq!(record.alerts_sent, 2);
    let sent = fx.sink.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "next-door");
}

#[test]
fn test_nodata_seed_uses_fallback_path() {
    let fx = Fixture::new(config());
    let mut elevation = vec![100.0; 16];
    elevation[2 * 4 + 2] = 90.0;
    elevation[4 + 1] = -9999.0;
    fx.artifacts
        .save_raster(
            "dem.glr",
            &grid(4, 4, vec![elevation]).with_nodata(Some(-9999.0)),
        )
        .unwrap();
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Completed);
    assert!(record.is_degraded(Stage::Flow));
    assert!(!record.is_degraded(Stage::Volume));
    assert_relative_eq!(record.volume_change.unwrap(), 800_000.0);
    assert_eq!(record.slope_degrees, Some(15.0));

    let flow = fx
        .artifacts
        .load_feature(record.artifacts.flow_path.as_deref().unwrap())
        .unwrap();
    assert_eq!(flow.property("type").unwrap(), "flow_path_fallback");
}

#[test]
fn test_unreadable_image_degrades() {
    let fx = Fixture::new(config());
    fx.artifacts.insert_bytes("img_1.glr", b"not a raster".to_vec());
    let record = fx.orchestrator.run(&request());

    assert_eq!(record.status, Status::Completed);
    assert!(record.is_degraded(Stage::Index));
    assert!(record.is_degraded(Stage::Change));
    assert!(record.is_degraded(Stage::Volume));
    assert!(!record.is_degraded(Stage::Flow));
    assert_eq!(record.lake_area_1, None);
    assert_eq!(record.volume_change, Some(0.0));
    assert_eq!(record.risk_level, Some(RiskLevel::Low));

    // Both pass-through copies exist.
    let id = record.id;
    assert!(fx.artifacts.contains(&format!("analysis_{id}/ndwi_1.glr")));
    assert!(fx.artifacts.contains(&format!("analysis_{id}/change.glr")));
}

#[test]
fn test_missing_dem_uses_fallback_path() {
    let fx = Fixture::new(config());
    let mut req = request();
    req.dem = "nowhere.glr".into();
    let record = fx.orchestrator.run(&req);

    assert_eq!(record.status, Status::Completed);
    assert!(record.is_degraded(Stage::Volume));
    assert!(record.is_degraded(Stage::Flow));
    // Pixel area comes from the mask when the DEM is gone.
    assert_relative_eq!(record.volume_change.unwrap(), 800_000.0);
    assert_eq!(record.slope_degrees, Some(15.0));
    assert_eq!(record.risk_level, Some(RiskLevel::High));

    let flow = fx
        .artifacts
        .load_feature(record.artifacts.flow_path.as_deref().unwrap())
        .unwrap();
    assert_eq!(flow.property("type").unwrap(), "flow_path_fallback");
}

#[test]
fn test_seed_defaults_to_water_centroid() {
    let fx = Fixture::new(config());
    let mut req = request();
    req.seed = None;
    let record = fx.orchestrator.run(&req);
    assert_eq!(record.status, Status::Completed);
    assert!(record.artifacts.flow_path.is_some());
    assert!(!record.is_degraded(Stage::Flow));
}

#[test]
fn test_submit() {
    let fx = Fixture::new(config());
    let jobs: Vec<_> = (0..4).map(|_| fx.orchestrator.submit(request())).collect();
    for job in &jobs {
        assert_eq!(job.wait(), Some(Status::Completed));
        let history = fx.results.history(job.id());
        assert_eq!(history[0].status, Status::Pending);
        let record = fx.orchestrator.record(job.id()).unwrap();
        assert_eq!(record.status, Status::Completed);
        assert_eq!(record.risk_level, Some(RiskLevel::High));
    }
    assert_eq!(fx.sink.sent().len(), 8);
}
