//! Typed errors for the ingestion pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so the engine can
//! classify per-document failures without string matching.

use std::path::PathBuf;

use thiserror::Error;

/// Index listing failed for an adapter.
///
/// Discovery errors demote the adapter's source health but never fail a
/// run; the engine moves on to the next adapter.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// Every configured index page failed to load.
    #[error("all {count} index pages failed for adapter {adapter}")]
    AllIndexesFailed { adapter: String, count: usize },

    /// Listing failed for an adapter-specific reason.
    #[error("listing failed: {0}")]
    Listing(String),
}

/// A single outbound fetch failed.
#[derive(Debug, Error)]
pub enum FetchError {
    /// URL could not be parsed.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Transport-level failure (connect, timeout, body read).
    #[error("request failed: {url}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Server answered with a non-success status.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// robots.txt forbids this URL for our user-agent. Terminal: the
    /// retry wrapper never re-attempts a robots denial.
    #[error("blocked by robots.txt: {url}")]
    RobotsDisallowed { url: String },

    /// The retry policy gave up; carries the last underlying cause.
    #[error("fetch failed after {attempts} attempts: {url}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    /// Adapter-specific fetch failure.
    #[error("{0}")]
    Other(String),
}

impl FetchError {
    /// Whether the retry wrapper should give up immediately.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FetchError::RobotsDisallowed { .. })
    }
}

/// A parser backend failed on a document body.
///
/// Parse errors are non-fatal: the parse service records them in
/// `parser_info` and yields empty extracted text.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{format} extraction failed: {message}")]
    Backend { format: String, message: String },
}

/// Filesystem failure in the artifact store.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The version directory already exists; version numbers are never
    /// reused.
    #[error("version directory already exists: {path}")]
    VersionExists { path: PathBuf },

    #[error("failed to write {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode metadata sidecar")]
    Encode(#[from] serde_json::Error),
}

/// Database failure in the metadata store.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("corrupt row: {0}")]
    Corrupt(String),

    #[error("failed to encode run payload")]
    Encode(#[from] serde_json::Error),
}

/// Invalid engine configuration; fails a run synchronously at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unknown adapter: {0}")]
    UnknownAdapter(String),
}

/// Umbrella error for the per-document pipeline.
///
/// The engine's per-document block is the one place that catches all of
/// these and folds them into run counters and source health.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}
