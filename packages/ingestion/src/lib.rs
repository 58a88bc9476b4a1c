//! # RFMO ingestion pipeline
//!
//! Periodically discovers, fetches, versions and persists regulatory
//! documents published by Regional Fisheries Management Organizations,
//! and derives actionable alerts from the persisted corpus.
//!
//! ## Architecture
//!
//! ```text
//! LIST → DEDUPE → FETCH → PARSE → HASH → DETECT → PERSIST
//!
//! 1. Adapter scans its category index pages      → DocumentRef
//! 2. Fetch service retries the adapter fetch     → RawDocument
//! 3. Parse service extracts normalized text      → ParsedDocument
//! 4. Change detector compares against the latest persisted version
//! 5. Artifact store + metadata store commit a new immutable version
//! ```
//!
//! The engine owns both stores for writes; the [`alerts::AlertGenerator`]
//! is a read-only consumer of the artifact tree. Adapters own their
//! outbound politeness state (rate limit, robots cache) and nothing
//! else.
//!
//! ## Modules
//!
//! - [`adapters`] - per-RFMO discovery/fetch drivers and the registry
//! - [`fetch`] - bounded-retry fetch wrapper
//! - [`parse`] - content-type dispatch and text extraction
//! - [`detect`] - change detection and hashing
//! - [`artifacts`] - versioned on-disk artifact store
//! - [`store`] - SQLite metadata store
//! - [`engine`] - run orchestration
//! - [`alerts`] - rule-driven alert generation
//! - [`metrics`] - counter registry and Prometheus endpoint
//! - [`scheduler`] - fixed-interval background runner

pub mod adapters;
pub mod alerts;
pub mod artifacts;
pub mod detect;
pub mod engine;
pub mod error;
pub mod fetch;
pub mod metrics;
pub mod parse;
pub mod robots;
pub mod scheduler;
pub mod store;
pub mod types;

mod text;

pub use adapters::{AdapterRegistry, Discovery, HtmlAdapter, RfmoAdapter, DEFAULT_USER_AGENT};
pub use alerts::{Alert, AlertGenerator, AlertSeverity, AlertType};
pub use artifacts::ArtifactStore;
pub use detect::{ChangeDecision, VersionCandidate};
pub use engine::Engine;
pub use error::{
    ConfigError, DiscoveryError, FetchError, IngestError, MetadataError, ParseError, StorageError,
};
pub use fetch::FetchService;
pub use metrics::MetricsRegistry;
pub use parse::{ParseService, PdfTextExtractor};
pub use scheduler::IngestScheduler;
pub use store::MetadataStore;
pub use types::{
    DocumentCategory, DocumentRecord, DocumentRef, DocumentVersionRecord, IngestReason,
    IngestionRunResult, ParsedDocument, ProcessingStatus, RawDocument, RunMetrics, SourceHealth,
};
