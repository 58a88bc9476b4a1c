//! Run orchestration.
//!
//! One `run_once` drives every adapter sequentially: list, dedupe,
//! fetch, parse, hash, decide, persist. Failures stay scoped — a bad
//! document never fails its adapter, a bad listing never fails the run —
//! and the run record is produced even when everything failed.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::{AdapterRegistry, RfmoAdapter};
use crate::artifacts::{ArtifactStore, VersionArtifacts};
use crate::detect::{self, MetadataSignature, VersionCandidate};
use crate::error::{IngestError, MetadataError};
use crate::fetch::FetchService;
use crate::metrics::{self, MetricsRegistry};
use crate::parse::ParseService;
use crate::store::MetadataStore;
use crate::types::{
    DocumentRecord, DocumentRef, DocumentVersionRecord, IngestionRunResult, ProcessingStatus,
    RunMetrics, SourceHealth,
};

pub struct Engine {
    store: MetadataStore,
    artifacts: ArtifactStore,
    parser: ParseService,
    fetcher: FetchService,
    adapters: AdapterRegistry,
    metrics: Arc<MetricsRegistry>,
}

impl Engine {
    /// Engine with the built-in adapter registry and default services.
    pub async fn open(
        db_path: impl AsRef<Path>,
        storage_root: impl AsRef<Path>,
    ) -> Result<Self, MetadataError> {
        let store = MetadataStore::open(db_path).await?;
        Ok(Self::new(
            store,
            ArtifactStore::new(storage_root.as_ref()),
            ParseService::default(),
            FetchService::default(),
            AdapterRegistry::default(),
            Arc::new(MetricsRegistry::new()),
        ))
    }

    pub fn new(
        store: MetadataStore,
        artifacts: ArtifactStore,
        parser: ParseService,
        fetcher: FetchService,
        adapters: AdapterRegistry,
        metrics: Arc<MetricsRegistry>,
    ) -> Self {
        Self {
            store,
            artifacts,
            parser,
            fetcher,
            adapters,
            metrics,
        }
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    pub fn metrics(&self) -> Arc<MetricsRegistry> {
        self.metrics.clone()
    }

    /// Run the full pipeline over the named adapters (all when `None`).
    ///
    /// Only configuration problems (an unknown adapter name) fail the
    /// call; everything downstream is folded into the returned result.
    pub async fn run_once(
        &self,
        adapter_names: Option<&[String]>,
    ) -> Result<IngestionRunResult, IngestError> {
        let adapters: Vec<Arc<dyn RfmoAdapter>> = match adapter_names {
            Some(names) => names
                .iter()
                .map(|name| self.adapters.get(name))
                .collect::<Result<_, _>>()?,
            None => self.adapters.all(),
        };

        let started_at = Utc::now();
        let mut run_metrics = RunMetrics::started(started_at);
        let mut errors: Vec<String> = Vec::new();
        let mut health_snapshots: Vec<SourceHealth> = Vec::new();
        let mut seen_urls: HashSet<String> = HashSet::new();
        let mut filtered_out_total: u64 = 0;

        info!(adapters = adapters.len(), "ingestion run starting");

        for adapter in &adapters {
            let discovery = match adapter.list_documents().await {
                Ok(discovery) => discovery,
                Err(e) => {
                    let message = e.to_string();
                    warn!(adapter = %adapter.name(), error = %message, "listing failed");
                    run_metrics.failures += 1;
                    errors.push(format!("{}: listing failed: {}", adapter.name(), message));

                    let previous = match self.store.source_health(adapter.name()).await {
                        Ok(previous) => previous,
                        Err(e) => {
                            warn!(adapter = %adapter.name(), error = %e, "source health read failed");
                            None
                        }
                    };
                    let health = SourceHealth::demoted(
                        adapter.name(),
                        adapter.rfmo(),
                        previous.as_ref(),
                        message,
                    );
                    if let Err(e) = self.store.upsert_source_health(&health).await {
                        errors.push(format!("{}: source health not saved: {}", adapter.name(), e));
                    }
                    health_snapshots.push(health);
                    continue;
                }
            };

            run_metrics.documents_discovered += discovery.refs.len() as u64;
            filtered_out_total += discovery.links_filtered_out;

            for doc_ref in &discovery.refs {
                if !seen_urls.insert(doc_ref.source_url.clone()) {
                    debug!(url = %doc_ref.source_url, "already handled in this run");
                    continue;
                }

                let record = match self.store.upsert_document_discovered(doc_ref).await {
                    Ok(record) => record,
                    Err(e) => {
                        run_metrics.failures += 1;
                        errors.push(format!(
                            "{}: {}: {}",
                            adapter.name(),
                            doc_ref.source_url,
                            e
                        ));
                        continue;
                    }
                };

                if let Err(e) = self
                    .process_document(adapter.as_ref(), doc_ref, &record, &mut run_metrics)
                    .await
                {
                    run_metrics.failures += 1;
                    errors.push(format!("{}: {}: {}", adapter.name(), doc_ref.source_url, e));
                    if let Err(status_err) = self
                        .store
                        .set_document_status(&record.id, ProcessingStatus::Failed)
                        .await
                    {
                        warn!(url = %doc_ref.source_url, error = %status_err, "failed to mark document failed");
                    }
                }
            }

            let health = SourceHealth::healthy(adapter.name(), adapter.rfmo());
            if let Err(e) = self.store.upsert_source_health(&health).await {
                errors.push(format!("{}: source health not saved: {}", adapter.name(), e));
            }
            health_snapshots.push(health);
        }

        run_metrics.finish(Utc::now());

        // Counters are committed before the run record is persisted.
        self.commit_counters(&run_metrics, filtered_out_total);

        let mut run = IngestionRunResult {
            run_id: Uuid::new_v4().to_string(),
            metrics: run_metrics,
            source_health: health_snapshots,
            errors,
        };

        if let Err(e) = self.store.insert_run(&run).await {
            warn!(error = %e, "run record not persisted");
            run.errors.push(format!("run record not persisted: {e}"));
        }

        info!(
            run_id = %run.run_id,
            discovered = run.metrics.documents_discovered,
            ingested = run.metrics.documents_ingested,
            skipped = run.metrics.documents_skipped,
            failures = run.metrics.failures,
            "ingestion run finished"
        );

        Ok(run)
    }

    /// Fetch, parse, hash and (when changed) persist one document.
    async fn process_document(
        &self,
        adapter: &dyn RfmoAdapter,
        doc_ref: &DocumentRef,
        record: &DocumentRecord,
        run_metrics: &mut RunMetrics,
    ) -> Result<(), IngestError> {
        let raw = self.fetcher.fetch(adapter, doc_ref).await?;
        run_metrics.documents_fetched += 1;

        let content = self.parser.parse(&raw);
        if content.failed() {
            run_metrics.parse_failures += 1;
        }

        let mut parsed = adapter.extract_metadata(&raw, doc_ref);
        parsed.extracted_text = content.extracted_text;
        parsed.snapshot_html = content.snapshot_html;
        parsed.parser_info.extend(content.parser_info);

        let file_hash = detect::file_hash(&raw.body);
        let content_hash = detect::content_hash(&parsed.extracted_text);
        let metadata_hash = detect::metadata_hash(&MetadataSignature {
            source_url: &doc_ref.source_url,
            rfmo: &doc_ref.rfmo,
            document_type: parsed.document_category.as_str(),
            publication_date: parsed.publication_date.map(|d| d.to_string()),
            title: &parsed.title,
            document_number: parsed.document_number.as_deref(),
            meeting_reference: parsed.meeting_reference.as_deref(),
            rfmo_region: parsed.rfmo_region.as_deref(),
            etag: raw.etag(),
            last_modified: raw.last_modified(),
            content_type: raw.content_type.as_deref(),
        });

        let latest = self.store.latest_version(&record.id).await?;
        let decision = detect::evaluate(
            latest.as_ref(),
            &VersionCandidate {
                file_hash: &file_hash,
                content_hash: &content_hash,
                metadata_hash: &metadata_hash,
                etag: raw.etag(),
                last_modified: raw.last_modified(),
            },
        );

        if !decision.should_ingest {
            self.store
                .set_document_status(&record.id, ProcessingStatus::Skipped)
                .await?;
            run_metrics.documents_skipped += 1;
            debug!(url = %doc_ref.source_url, "unchanged, skipped");
            return Ok(());
        }

        let persisted = self.artifacts.persist(&VersionArtifacts {
            document_id: &record.id,
            version_number: decision.next_version_number,
            raw: &raw,
            parsed: &parsed,
            doc_ref,
            file_hash: &file_hash,
            content_hash: &content_hash,
            metadata_hash: &metadata_hash,
        })?;

        let version = DocumentVersionRecord {
            id: Uuid::new_v4().to_string(),
            document_id: record.id.clone(),
            version_number: decision.next_version_number,
            file_hash,
            etag: raw.etag().map(String::from),
            last_modified: raw.last_modified().map(String::from),
            metadata_hash,
            content_hash,
            status: ProcessingStatus::Ingested,
            stored_path: persisted.raw_path.display().to_string(),
            extracted_text_path: persisted.extracted_text_path.display().to_string(),
            snapshot_html_path: persisted
                .snapshot_html_path
                .as_ref()
                .map(|p| p.display().to_string()),
            metadata_path: persisted.metadata_path.display().to_string(),
            created_at: Utc::now(),
        };
        self.store.create_version(&version).await?;

        run_metrics.documents_ingested += 1;
        run_metrics.storage_bytes_written += persisted.bytes_written;

        info!(
            url = %doc_ref.source_url,
            version = decision.next_version_number,
            reasons = ?decision.reasons,
            "document ingested"
        );
        Ok(())
    }

    fn commit_counters(&self, run_metrics: &RunMetrics, filtered_out: u64) {
        self.metrics
            .add(metrics::DOCUMENTS_DISCOVERED, run_metrics.documents_discovered as f64);
        self.metrics
            .add(metrics::DOCUMENTS_FILTERED_OUT, filtered_out as f64);
        self.metrics
            .add(metrics::DOCUMENTS_FETCHED, run_metrics.documents_fetched as f64);
        self.metrics
            .add(metrics::DOCUMENTS_INGESTED, run_metrics.documents_ingested as f64);
        self.metrics
            .add(metrics::DOCUMENTS_SKIPPED, run_metrics.documents_skipped as f64);
        self.metrics.add(metrics::FAILURES, run_metrics.failures as f64);
        self.metrics
            .add(metrics::PARSE_FAILURES, run_metrics.parse_failures as f64);
        self.metrics
            .add(metrics::STORAGE_BYTES, run_metrics.storage_bytes_written as f64);
        self.metrics
            .add(metrics::PROCESSING_SECONDS, run_metrics.duration_seconds);
    }
}
