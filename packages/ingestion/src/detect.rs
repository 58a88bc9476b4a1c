//! Change detection.
//!
//! A pure function from the latest persisted version (if any) and the
//! freshly computed hashes to an ingest decision. Cosmetic header drift
//! only surfaces as `metadata_changed` when no content hash moved,
//! keeping version churn tied to real revisions.

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::types::{DocumentVersionRecord, IngestReason};

/// Outcome of evaluating a fetched document against its latest version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeDecision {
    pub should_ingest: bool,
    pub reasons: Vec<IngestReason>,
    pub next_version_number: i64,
}

/// Freshly computed identity of a fetched document.
#[derive(Debug, Clone)]
pub struct VersionCandidate<'a> {
    pub file_hash: &'a str,
    pub content_hash: &'a str,
    pub metadata_hash: &'a str,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
}

/// Decide whether to ingest and which version number comes next.
pub fn evaluate(
    latest: Option<&DocumentVersionRecord>,
    candidate: &VersionCandidate<'_>,
) -> ChangeDecision {
    let Some(latest) = latest else {
        return ChangeDecision {
            should_ingest: true,
            reasons: vec![IngestReason::NewUrl],
            next_version_number: 1,
        };
    };

    let mut reasons = Vec::new();
    if candidate.file_hash != latest.file_hash {
        reasons.push(IngestReason::FileHashChanged);
    }
    if candidate.content_hash != latest.content_hash {
        reasons.push(IngestReason::PageContentChanged);
    }
    if candidate.metadata_hash != latest.metadata_hash {
        reasons.push(IngestReason::MetadataChanged);
    }

    // Header-only drift: no hash moved but the server reports a new
    // validator.
    if reasons.is_empty() {
        let etag_changed =
            candidate.etag.is_some() && candidate.etag != latest.etag.as_deref();
        let last_modified_changed = candidate.last_modified.is_some()
            && candidate.last_modified != latest.last_modified.as_deref();
        if etag_changed || last_modified_changed {
            reasons.push(IngestReason::MetadataChanged);
        }
    }

    let should_ingest = !reasons.is_empty();
    ChangeDecision {
        should_ingest,
        reasons,
        next_version_number: if should_ingest {
            latest.version_number + 1
        } else {
            latest.version_number
        },
    }
}

/// SHA-256 of the raw response bytes.
pub fn file_hash(body: &[u8]) -> String {
    hex_digest(body)
}

/// SHA-256 of the extracted text.
pub fn content_hash(extracted_text: &str) -> String {
    hex_digest(extracted_text.as_bytes())
}

/// Fixed signature tuple behind `metadata_hash`.
///
/// Serialized with stable field order; the hash must be bit-identical
/// across runs for identical inputs.
#[derive(Debug, Clone, Serialize)]
pub struct MetadataSignature<'a> {
    pub source_url: &'a str,
    pub rfmo: &'a str,
    pub document_type: &'a str,
    pub publication_date: Option<String>,
    pub title: &'a str,
    pub document_number: Option<&'a str>,
    pub meeting_reference: Option<&'a str>,
    pub rfmo_region: Option<&'a str>,
    pub etag: Option<&'a str>,
    pub last_modified: Option<&'a str>,
    pub content_type: Option<&'a str>,
}

/// SHA-256 of the deterministic signature serialization.
pub fn metadata_hash(signature: &MetadataSignature<'_>) -> String {
    let encoded = serde_json::to_vec(signature).expect("signature serialization is infallible");
    hex_digest(&encoded)
}

fn hex_digest(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}
