//! Content-addressed artifact store.
//!
//! One directory per document version:
//! `<root>/<rfmo>/<year>/<document_id>/v<N>/` holding the raw bytes, the
//! extracted text, the metadata sidecar and (for HTML) the page
//! snapshot. Version directories are never overwritten; callers hand
//! out fresh version numbers.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use tracing::debug;

use crate::error::StorageError;
use crate::types::{DocumentRef, ParsedDocument, RawDocument};

/// Raw-file extensions accepted straight from the source URL.
const URL_EXTENSIONS: &[&str] = &[".pdf", ".doc", ".docx", ".xls", ".xlsx", ".htm", ".html"];

pub struct ArtifactStore {
    root: PathBuf,
}

/// Paths and size of one persisted version.
#[derive(Debug, Clone)]
pub struct PersistedArtifacts {
    pub raw_path: PathBuf,
    pub extracted_text_path: PathBuf,
    pub snapshot_html_path: Option<PathBuf>,
    pub metadata_path: PathBuf,
    pub bytes_written: u64,
}

/// Everything the store needs to lay down one version.
pub struct VersionArtifacts<'a> {
    pub document_id: &'a str,
    pub version_number: i64,
    pub raw: &'a RawDocument,
    pub parsed: &'a ParsedDocument,
    pub doc_ref: &'a DocumentRef,
    pub file_hash: &'a str,
    pub content_hash: &'a str,
    pub metadata_hash: &'a str,
}

/// Sidecar payload written as `metadata.json`.
#[derive(Debug, Serialize)]
struct SidecarMetadata<'a> {
    rfmo: &'a str,
    source_url: &'a str,
    document_type: &'a str,
    title: &'a str,
    published_date: Option<NaiveDate>,
    document_number: Option<&'a str>,
    meeting_reference: Option<&'a str>,
    rfmo_region: Option<&'a str>,
    document_id: &'a str,
    version_number: i64,
    content_type: Option<&'a str>,
    etag: Option<&'a str>,
    last_modified: Option<&'a str>,
    fetched_at: DateTime<Utc>,
    file_hash: &'a str,
    content_hash: &'a str,
    metadata_hash: &'a str,
    headers: &'a BTreeMap<String, String>,
    parser_info: &'a BTreeMap<String, String>,
    adapter_metadata: &'a BTreeMap<String, String>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write all artifacts for one version and return their paths plus
    /// the number of bytes laid down.
    pub fn persist(
        &self,
        artifacts: &VersionArtifacts<'_>,
    ) -> Result<PersistedArtifacts, StorageError> {
        let year = artifacts
            .parsed
            .publication_date
            .map(|d| d.year())
            .unwrap_or_else(|| Utc::now().year());

        let document_dir = self
            .root
            .join(artifacts.doc_ref.rfmo.to_lowercase())
            .join(year.to_string())
            .join(artifacts.document_id);
        fs::create_dir_all(&document_dir).map_err(|e| StorageError::Io {
            path: document_dir.clone(),
            source: e,
        })?;

        let version_dir = document_dir.join(format!("v{}", artifacts.version_number));
        fs::create_dir(&version_dir).map_err(|e| {
            if e.kind() == std::io::ErrorKind::AlreadyExists {
                StorageError::VersionExists {
                    path: version_dir.clone(),
                }
            } else {
                StorageError::Io {
                    path: version_dir.clone(),
                    source: e,
                }
            }
        })?;

        let mut bytes_written = 0u64;

        let raw_path = version_dir.join(format!(
            "raw{}",
            raw_extension(
                artifacts.raw.content_type.as_deref(),
                &artifacts.doc_ref.source_url
            )
        ));
        bytes_written += write_file(&raw_path, &artifacts.raw.body)?;

        let extracted_text_path = version_dir.join("extracted.txt");
        bytes_written += write_file(
            &extracted_text_path,
            artifacts.parsed.extracted_text.as_bytes(),
        )?;

        let snapshot_html_path = match &artifacts.parsed.snapshot_html {
            Some(snapshot) => {
                let path = version_dir.join("snapshot.html");
                bytes_written += write_file(&path, snapshot.as_bytes())?;
                Some(path)
            }
            None => None,
        };

        let sidecar = SidecarMetadata {
            rfmo: &artifacts.doc_ref.rfmo,
            source_url: &artifacts.doc_ref.source_url,
            document_type: artifacts.parsed.document_category.as_str(),
            title: &artifacts.parsed.title,
            published_date: artifacts.parsed.publication_date,
            document_number: artifacts.parsed.document_number.as_deref(),
            meeting_reference: artifacts.parsed.meeting_reference.as_deref(),
            rfmo_region: artifacts.parsed.rfmo_region.as_deref(),
            document_id: artifacts.document_id,
            version_number: artifacts.version_number,
            content_type: artifacts.raw.content_type.as_deref(),
            etag: artifacts.raw.etag(),
            last_modified: artifacts.raw.last_modified(),
            fetched_at: artifacts.raw.fetched_at,
            file_hash: artifacts.file_hash,
            content_hash: artifacts.content_hash,
            metadata_hash: artifacts.metadata_hash,
            headers: &artifacts.raw.headers,
            parser_info: &artifacts.parsed.parser_info,
            adapter_metadata: &artifacts.doc_ref.metadata,
        };
        let metadata_path = version_dir.join("metadata.json");
        let encoded = serde_json::to_vec_pretty(&sidecar)?;
        bytes_written += write_file(&metadata_path, &encoded)?;

        debug!(
            dir = %version_dir.display(),
            bytes = bytes_written,
            "version artifacts persisted"
        );

        Ok(PersistedArtifacts {
            raw_path,
            extracted_text_path,
            snapshot_html_path,
            metadata_path,
            bytes_written,
        })
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<u64, StorageError> {
    fs::write(path, bytes).map_err(|e| StorageError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(bytes.len() as u64)
}

/// Extension for the raw artifact: content-type first, then the source
/// URL suffix, then `.bin`.
fn raw_extension(content_type: Option<&str>, url: &str) -> &'static str {
    let ct = content_type.unwrap_or("").to_ascii_lowercase();
    if ct.contains("pdf") {
        return ".pdf";
    }
    if ct.contains("html") {
        return ".html";
    }
    if ct.contains("wordprocessingml") || ct.contains("msword") {
        return ".docx";
    }

    let path = url.split(['?', '#']).next().unwrap_or("").to_ascii_lowercase();
    URL_EXTENSIONS
        .iter()
        .find(|ext| path.ends_with(**ext))
        .copied()
        .unwrap_or(".bin")
}
