use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::models::Source;

/// Per-source counters for one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SourceStats {
    pub fetched: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub errors: u64,
}

/// Counters for one full run, owned by the orchestrator while the run is
/// in flight and finalized when it completes.
#[derive(Debug, Clone)]
pub struct RunStatistics {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub per_source: BTreeMap<Source, SourceStats>,
}

impl RunStatistics {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: None,
            per_source: BTreeMap::new(),
        }
    }

    pub fn source_mut(&mut self, source: Source) -> &mut SourceStats {
        self.per_source.entry(source).or_default()
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn elapsed_seconds(&self) -> f64 {
        let end = self.finished_at.unwrap_or_else(Utc::now);
        (end - self.started_at).num_milliseconds() as f64 / 1000.0
    }

    pub fn total_fetched(&self) -> u64 {
        self.per_source.values().map(|s| s.fetched).sum()
    }

    pub fn total_accepted(&self) -> u64 {
        self.per_source.values().map(|s| s.accepted).sum()
    }

    pub fn total_duplicates(&self) -> u64 {
        self.per_source.values().map(|s| s.duplicates).sum()
    }

    pub fn total_errors(&self) -> u64 {
        self.per_source.values().map(|s| s.errors).sum()
    }
}

impl Default for RunStatistics {
    fn default() -> Self {
        Self::new()
    }
}
