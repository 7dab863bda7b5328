//! Analysis records and the append-only store that keeps them.

use crate::{risk::RiskLevel, C};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    sync::atomic::{AtomicU64, Ordering},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisId(u64);

impl AnalysisId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for AnalysisId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Pending,
    Computing,
    Completed,
    Failed,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Pipeline stages that can run in a degraded mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Index,
    Change,
    Volume,
    Flow,
}

/// Artifact keys of the run's inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inputs {
    pub image_1: String,
    pub image_2: String,
    pub dem: String,
}

/// Artifact keys of the run's outputs, filled in as stages complete.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifacts {
    pub ndwi_1: Option<String>,
    pub ndwi_2: Option<String>,
    pub change: Option<String>,
    pub difference: Option<String>,
    pub flow_path: Option<String>,
    pub risk_zone: Option<String>,
}

/// One snapshot of an analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub id: AnalysisId,
    pub inputs: Inputs,
    pub date_1: DateTime<Utc>,
    pub date_2: DateTime<Utc>,

    /// Square metres.
    pub lake_area_1: Option<C>,
    pub lake_area_2: Option<C>,

    /// Cubic metres.
    pub volume_change: Option<C>,
    pub slope_degrees: Option<C>,
    pub risk_level: Option<RiskLevel>,

    pub artifacts: Artifacts,
    pub degraded: Vec<Stage>,
    pub alerts_sent: usize,

    pub status: Status,
    pub error: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn new(id: AnalysisId, inputs: Inputs, date_1: DateTime<Utc>, date_2: DateTime<Utc>) -> Self {
        let now = Utc::now();
        Self {
            id,
            inputs,
            date_1,
            date_2,
            lake_area_1: None,
            lake_area_2: None,
            volume_change: None,
            slope_degrees: None,
            risk_level: None,
            artifacts: Artifacts::default(),
            degraded: Vec::new(),
            alerts_sent: 0,
            status: Status::Pending,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn mark_degraded(&mut self, stage: Stage) {
        if !self.degraded.contains(&stage) {
            self.degraded.push(stage);
        }
    }

    pub fn is_degraded(&self, stage: Stage) -> bool {
        self.degraded.contains(&stage)
    }
}

/// Append-only history of analysis records.
pub trait ResultStore: Send + Sync {
    /// Reserves a fresh identifier.
    fn next_id(&self) -> AnalysisId;

    fn append(&self, record: AnalysisRecord);

    /// Returns the most recent snapshot of `id`.
    fn latest(&self, id: AnalysisId) -> Option<AnalysisRecord>;

    /// Returns every snapshot of `id`, oldest first.
    fn history(&self, id: AnalysisId) -> Vec<AnalysisRecord>;
}

#[derive(Debug)]
pub struct MemoryResults {
    next: AtomicU64,
    records: DashMap<AnalysisId, Vec<AnalysisRecord>>,
}

impl Default for MemoryResults {
    fn default() -> Self {
        Self {
            next: AtomicU64::new(1),
            records: DashMap::new(),
        }
    }
}

impl MemoryResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the latest snapshot of every analysis, newest first.
    pub fn all_latest(&self) -> Vec<AnalysisRecord> {
        let mut all: Vec<AnalysisRecord> = self
            .records
            .iter()
            .filter_map(|e| e.value().last().cloned())
            .collect();
        all.sort_unstable_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }
}

impl ResultStore for MemoryResults {
    fn next_id(&self) -> AnalysisId {
        AnalysisId(self.next.fetch_add(1, Ordering::Relaxed))
    }

    fn append(&self, record: AnalysisRecord) {
        self.records.entry(record.id).or_default().push(record);
    }

    fn latest(&self, id: AnalysisId) -> Option<AnalysisRecord> {
        self.records.get(&id).and_then(|r| r.last().cloned())
    }

    fn history(&self, id: AnalysisId) -> Vec<AnalysisRecord> {
        self.records
            .get(&id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{AnalysisRecord, Inputs, MemoryResults, ResultStore, Stage, Status};
    use chrono::{TimeZone, Utc};

    fn record(store: &MemoryResults) -> AnalysisRecord {
        AnalysisRecord::new(
            store.next_id(),
            Inputs {
                image_1: "a.glr".into(),
                image_2: "b.glr".into(),
                dem: "dem.glr".into(),
            },
            Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap(),
        )
    }

    #[test]
    fn test_append_only_history() {
        let store = MemoryResults::new();
        let mut r = record(&store);
        let other = record(&store);
        assert_ne!(r.id, other.id);

        store.append(r.clone());
        r.status = Status::Computing;
        store.append(r.clone());
        r.mark_degraded(Stage::Flow);
        r.mark_degraded(Stage::Flow);
        r.status = Status::Completed;
        store.append(r.clone());

        let history = store.history(r.id);
        assert_eq!(
            history.iter().map(|r| r.status).collect::<Vec<_>>(),
            vec![Status::Pending, Status::Computing, Status::Completed]
        );
        assert_eq!(store.latest(r.id).unwrap().degraded, vec![Stage::Flow]);
        assert!(store.latest(other.id).is_none());
        assert_eq!(store.all_latest().len(), 1);
    }

    #[test]
    fn test_record_json() {
        let store = MemoryResults::new();
        let mut r = record(&store);
        r.risk_level = Some(crate::risk::RiskLevel::High);
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["id"], 1);
        assert_eq!(json["risk_level"], "High");
        assert_eq!(json["status"], "Pending");
        assert_eq!(json["date_1"], "2023-06-01T00:00:00Z");
    }
}
