//! Rows persisted by the metadata store.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::document::ProcessingStatus;

/// One tracked document, identified by `(rfmo, source_url)`.
///
/// `latest_version` mirrors the highest version number among the
/// document's version rows (0 while none exist) and `latest_file_hash`
/// the file hash of that version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub rfmo: String,
    pub source_url: String,
    pub document_type: String,
    pub title: Option<String>,
    pub publication_date: Option<NaiveDate>,
    pub latest_version: i64,
    pub latest_file_hash: Option<String>,
    pub status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One immutable snapshot of a document.
///
/// Version numbers are contiguous from 1 per document; rows are
/// append-only and every referenced path exists on disk at commit time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentVersionRecord {
    pub id: String,
    pub document_id: String,
    pub version_number: i64,
    pub file_hash: String,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub metadata_hash: String,
    pub content_hash: String,
    pub status: ProcessingStatus,
    pub stored_path: String,
    pub extracted_text_path: String,
    pub snapshot_html_path: Option<String>,
    pub metadata_path: String,
    pub created_at: DateTime<Utc>,
}

/// Per-adapter reliability record.
///
/// Invariant: `consecutive_failures == 0` exactly when `last_error` is
/// `None`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceHealth {
    pub adapter_name: String,
    pub rfmo: String,
    pub last_success_at: Option<DateTime<Utc>>,
    pub consecutive_failures: i64,
    pub last_error: Option<String>,
}

impl SourceHealth {
    /// Health after a successful listing: failures reset, error cleared.
    pub fn healthy(adapter_name: impl Into<String>, rfmo: impl Into<String>) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            rfmo: rfmo.into(),
            last_success_at: Some(Utc::now()),
            consecutive_failures: 0,
            last_error: None,
        }
    }

    /// Health after a failed listing, building on the previous record if
    /// one exists.
    pub fn demoted(
        adapter_name: impl Into<String>,
        rfmo: impl Into<String>,
        previous: Option<&SourceHealth>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            adapter_name: adapter_name.into(),
            rfmo: rfmo.into(),
            last_success_at: previous.and_then(|h| h.last_success_at),
            consecutive_failures: previous.map(|h| h.consecutive_failures).unwrap_or(0) + 1,
            last_error: Some(error.into()),
        }
    }
}
