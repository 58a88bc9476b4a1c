//! Data model for the ingestion pipeline.
//!
//! Split the way the pipeline uses it: [`document`] holds the transient
//! types that flow through a single document's discovery → fetch → parse
//! pass, [`records`] the rows persisted by the metadata store, [`run`]
//! the per-run accounting.

pub mod document;
pub mod records;
pub mod run;

pub use document::{
    DocumentCategory, DocumentRef, IngestReason, ParsedDocument, ProcessingStatus, RawDocument,
};
pub use records::{DocumentRecord, DocumentVersionRecord, SourceHealth};
pub use run::{IngestionRunResult, RunMetrics};
