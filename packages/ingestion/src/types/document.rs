//! Transient types for a single document's pass through the pipeline.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Category a document was discovered under.
///
/// Closed set; adapters map each category to the index pages that list
/// documents of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentCategory {
    ConservationManagementMeasures,
    RecommendationsResolutions,
    CircularLetters,
    IuuVesselLists,
    QuotaAllocationTables,
    MeetingDecisions,
    Other,
}

impl DocumentCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentCategory::ConservationManagementMeasures => "conservation_management_measures",
            DocumentCategory::RecommendationsResolutions => "recommendations_resolutions",
            DocumentCategory::CircularLetters => "circular_letters",
            DocumentCategory::IuuVesselLists => "iuu_vessel_lists",
            DocumentCategory::QuotaAllocationTables => "quota_allocation_tables",
            DocumentCategory::MeetingDecisions => "meeting_decisions",
            DocumentCategory::Other => "other",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "conservation_management_measures" => {
                Some(DocumentCategory::ConservationManagementMeasures)
            }
            "recommendations_resolutions" => Some(DocumentCategory::RecommendationsResolutions),
            "circular_letters" => Some(DocumentCategory::CircularLetters),
            "iuu_vessel_lists" => Some(DocumentCategory::IuuVesselLists),
            "quota_allocation_tables" => Some(DocumentCategory::QuotaAllocationTables),
            "meeting_decisions" => Some(DocumentCategory::MeetingDecisions),
            "other" => Some(DocumentCategory::Other),
            _ => None,
        }
    }

    /// Categories that represent binding policy output (everything but
    /// meeting records and the catch-all).
    pub fn is_actionable(&self) -> bool {
        matches!(
            self,
            DocumentCategory::ConservationManagementMeasures
                | DocumentCategory::RecommendationsResolutions
                | DocumentCategory::CircularLetters
                | DocumentCategory::IuuVesselLists
                | DocumentCategory::QuotaAllocationTables
        )
    }
}

impl std::fmt::Display for DocumentCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a document sits in its processing lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    Discovered,
    Ingested,
    Failed,
    Skipped,
}

impl ProcessingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProcessingStatus::Discovered => "discovered",
            ProcessingStatus::Ingested => "ingested",
            ProcessingStatus::Failed => "failed",
            ProcessingStatus::Skipped => "skipped",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "discovered" => Some(ProcessingStatus::Discovered),
            "ingested" => Some(ProcessingStatus::Ingested),
            "failed" => Some(ProcessingStatus::Failed),
            "skipped" => Some(ProcessingStatus::Skipped),
            _ => None,
        }
    }
}

impl std::fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the change detector decided to ingest a new version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestReason {
    NewUrl,
    FileHashChanged,
    PageContentChanged,
    MetadataChanged,
}

impl IngestReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestReason::NewUrl => "new_url",
            IngestReason::FileHashChanged => "file_hash_changed",
            IngestReason::PageContentChanged => "page_content_changed",
            IngestReason::MetadataChanged => "metadata_changed",
        }
    }
}

/// Uncommitted pointer to a candidate document found on an index page.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRef {
    pub rfmo: String,
    pub source_url: String,
    pub document_type: DocumentCategory,
    pub index_url: Option<String>,
    pub title_hint: Option<String>,
    pub published_date: Option<NaiveDate>,
    pub document_number: Option<String>,
    pub meeting_reference: Option<String>,
    pub rfmo_region: Option<String>,
    pub discovered_at: DateTime<Utc>,

    /// Free-form adapter metadata, persisted into the sidecar.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl DocumentRef {
    /// Create a ref with the minimal identity fields.
    pub fn new(
        rfmo: impl Into<String>,
        source_url: impl Into<String>,
        document_type: DocumentCategory,
    ) -> Self {
        Self {
            rfmo: rfmo.into(),
            source_url: source_url.into(),
            document_type,
            index_url: None,
            title_hint: None,
            published_date: None,
            document_number: None,
            meeting_reference: None,
            rfmo_region: None,
            discovered_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_title_hint(mut self, hint: impl Into<String>) -> Self {
        self.title_hint = Some(hint.into());
        self
    }

    pub fn with_published_date(mut self, date: NaiveDate) -> Self {
        self.published_date = Some(date);
        self
    }
}

/// Raw bytes and response metadata from one successful fetch.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub source_url: String,
    pub status_code: u16,

    /// Response headers as received. Use [`RawDocument::header`] for
    /// case-insensitive lookup.
    pub headers: BTreeMap<String, String>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
    pub fetched_at: DateTime<Utc>,
}

impl RawDocument {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn etag(&self) -> Option<&str> {
        self.header("etag")
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.header("last-modified")
    }
}

/// Normalized output of metadata extraction plus body parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub title: String,
    pub publication_date: Option<NaiveDate>,
    pub document_category: DocumentCategory,
    pub document_number: Option<String>,
    pub meeting_reference: Option<String>,
    pub rfmo_region: Option<String>,

    /// Whitespace-normalized text extracted from the body.
    pub extracted_text: String,

    /// Original HTML, kept only for HTML bodies.
    pub snapshot_html: Option<String>,

    /// Parser diagnostics; an `error` key marks a parse failure.
    #[serde(default)]
    pub parser_info: BTreeMap<String, String>,
}
