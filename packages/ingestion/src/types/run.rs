//! Per-run accounting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::records::SourceHealth;

/// Counters for one ingestion run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetrics {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: f64,
    pub documents_discovered: u64,
    pub documents_fetched: u64,
    pub documents_ingested: u64,
    pub documents_skipped: u64,
    pub failures: u64,
    pub parse_failures: u64,
    pub storage_bytes_written: u64,
}

impl RunMetrics {
    pub fn started(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            duration_seconds: 0.0,
            documents_discovered: 0,
            documents_fetched: 0,
            documents_ingested: 0,
            documents_skipped: 0,
            failures: 0,
            parse_failures: 0,
            storage_bytes_written: 0,
        }
    }

    /// Stamp the end of the run and derive its duration.
    pub fn finish(&mut self, finished_at: DateTime<Utc>) {
        self.finished_at = Some(finished_at);
        self.duration_seconds = (finished_at - self.started_at)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
    }
}

/// Result of one `run_once` invocation, persisted as a run record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionRunResult {
    pub run_id: String,
    pub metrics: RunMetrics,
    pub source_health: Vec<SourceHealth>,
    pub errors: Vec<String>,
}
