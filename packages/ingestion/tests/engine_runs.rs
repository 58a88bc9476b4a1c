//! End-to-end runs against a scripted adapter.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};

use rfmo_ingestion::error::{DiscoveryError, FetchError};
use rfmo_ingestion::{
    AdapterRegistry, ArtifactStore, Discovery, DocumentCategory, DocumentRef, Engine, FetchService,
    MetadataStore, MetricsRegistry, ParseService, ParsedDocument, ProcessingStatus, RawDocument,
    RfmoAdapter,
};

#[derive(Clone, Debug)]
struct ScriptedResponse {
    body: Vec<u8>,
    content_type: String,
    headers: Vec<(String, String)>,
}

/// Adapter that replays canned listings and responses.
#[derive(Debug)]
struct ScriptedAdapter {
    name: String,
    rfmo: String,
    refs: Vec<DocumentRef>,
    responses: HashMap<String, ScriptedResponse>,
    listing_error: Option<String>,
}

impl ScriptedAdapter {
    fn new(name: &str, rfmo: &str) -> Self {
        Self {
            name: name.to_string(),
            rfmo: rfmo.to_string(),
            refs: Vec::new(),
            responses: HashMap::new(),
            listing_error: None,
        }
    }

    fn with_document(mut self, doc_ref: DocumentRef, response: ScriptedResponse) -> Self {
        self.responses
            .insert(doc_ref.source_url.clone(), response);
        self.refs.push(doc_ref);
        self
    }

    fn with_unfetchable(mut self, doc_ref: DocumentRef) -> Self {
        self.refs.push(doc_ref);
        self
    }

    fn with_listing_error(mut self, message: &str) -> Self {
        self.listing_error = Some(message.to_string());
        self
    }
}

#[async_trait]
impl RfmoAdapter for ScriptedAdapter {
    fn name(&self) -> &str {
        &self.name
    }

    fn rfmo(&self) -> &str {
        &self.rfmo
    }

    async fn list_documents(&self) -> Result<Discovery, DiscoveryError> {
        match &self.listing_error {
            Some(message) => Err(DiscoveryError::Listing(message.clone())),
            None => Ok(Discovery {
                refs: self.refs.clone(),
                links_scanned: self.refs.len() as u64 + 3,
                links_filtered_out: 3,
            }),
        }
    }

    async fn fetch_document(&self, doc_ref: &DocumentRef) -> Result<RawDocument, FetchError> {
        let Some(response) = self.responses.get(&doc_ref.source_url) else {
            return Err(FetchError::Other(format!(
                "no scripted response for {}",
                doc_ref.source_url
            )));
        };
        Ok(RawDocument {
            source_url: doc_ref.source_url.clone(),
            status_code: 200,
            headers: response
                .headers
                .iter()
                .cloned()
                .collect(),
            content_type: Some(response.content_type.clone()),
            body: response.body.clone(),
            fetched_at: Utc::now(),
        })
    }

    fn extract_metadata(&self, _raw: &RawDocument, doc_ref: &DocumentRef) -> ParsedDocument {
        ParsedDocument {
            title: doc_ref
                .title_hint
                .clone()
                .unwrap_or_else(|| doc_ref.source_url.clone()),
            publication_date: doc_ref.published_date,
            document_category: doc_ref.document_type,
            document_number: doc_ref.document_number.clone(),
            meeting_reference: doc_ref.meeting_reference.clone(),
            rfmo_region: doc_ref.rfmo_region.clone(),
            extracted_text: String::new(),
            snapshot_html: None,
            parser_info: Default::default(),
        }
    }
}

fn html_response(body: &str) -> ScriptedResponse {
    ScriptedResponse {
        body: body.as_bytes().to_vec(),
        content_type: "text/html".to_string(),
        headers: vec![
            ("ETag".to_string(), "etag-a".to_string()),
            (
                "Last-Modified".to_string(),
                "Sat, 20 Jan 2024 12:00:00 GMT".to_string(),
            ),
            ("Content-Type".to_string(), "text/html".to_string()),
        ],
    }
}

fn measure_ref() -> DocumentRef {
    DocumentRef::new(
        "ICCAT",
        "https://example.org/doc1",
        DocumentCategory::ConservationManagementMeasures,
    )
    .with_title_hint("Tropical tuna measure")
    .with_published_date(NaiveDate::from_ymd_opt(2024, 1, 20).unwrap())
}

async fn engine_with(db_path: &Path, storage_root: &Path, adapters: Vec<ScriptedAdapter>) -> Engine {
    let mut registry = AdapterRegistry::empty();
    for adapter in adapters {
        registry.register(Arc::new(adapter));
    }
    Engine::new(
        MetadataStore::open(db_path).await.unwrap(),
        ArtifactStore::new(storage_root),
        ParseService::default(),
        FetchService::new(3, Duration::ZERO),
        registry,
        Arc::new(MetricsRegistry::new()),
    )
}

#[tokio::test]
async fn test_first_ingestion_creates_v1() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let adapter = ScriptedAdapter::new("iccat", "ICCAT")
        .with_document(measure_ref(), html_response("<html><body>measure text</body></html>"));
    let engine = engine_with(&db, &storage, vec![adapter]).await;

    let run = engine.run_once(None).await.unwrap();

    assert_eq!(run.metrics.documents_discovered, 1);
    assert_eq!(run.metrics.documents_fetched, 1);
    assert_eq!(run.metrics.documents_ingested, 1);
    assert_eq!(run.metrics.documents_skipped, 0);
    assert_eq!(run.metrics.failures, 0);
    assert!(run.metrics.storage_bytes_written > 0);
    assert!(run.errors.is_empty());

    let doc = engine
        .store()
        .get_document("ICCAT", "https://example.org/doc1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, ProcessingStatus::Ingested);
    assert_eq!(doc.latest_version, 1);

    let versions = engine.store().list_versions(&doc.id).await.unwrap();
    assert_eq!(versions.len(), 1);
    let version = &versions[0];
    assert_eq!(version.version_number, 1);
    assert_eq!(version.etag.as_deref(), Some("etag-a"));
    assert_eq!(doc.latest_file_hash.as_deref(), Some(version.file_hash.as_str()));

    // Layout: <root>/<rfmo>/<publication year>/<id>/v1/
    let version_dir = storage.join("iccat").join("2024").join(&doc.id).join("v1");
    assert!(version_dir.join("raw.html").exists());
    assert!(version_dir.join("extracted.txt").exists());
    assert!(version_dir.join("metadata.json").exists());
    assert!(version_dir.join("snapshot.html").exists());

    for path in [
        &version.stored_path,
        &version.extracted_text_path,
        &version.metadata_path,
    ] {
        assert!(Path::new(path).exists(), "missing {path}");
    }

    // Source health reflects the clean listing.
    let health = engine.store().source_health("iccat").await.unwrap().unwrap();
    assert_eq!(health.consecutive_failures, 0);
    assert!(health.last_error.is_none());

    // Run record was persisted.
    let stored_run = engine.store().get_run(&run.run_id).await.unwrap().unwrap();
    assert_eq!(stored_run.metrics.documents_ingested, 1);
}

#[tokio::test]
async fn test_second_run_is_idempotent() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");
    let body = "<html><body>measure text</body></html>";

    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT")
            .with_document(measure_ref(), html_response(body))],
    )
    .await;
    engine.run_once(None).await.unwrap();

    // Fresh engine over the same database and bytes.
    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT")
            .with_document(measure_ref(), html_response(body))],
    )
    .await;
    let second = engine.run_once(None).await.unwrap();

    assert_eq!(second.metrics.documents_ingested, 0);
    assert_eq!(second.metrics.documents_skipped, 1);
    assert_eq!(second.metrics.failures, 0);

    let doc = engine
        .store()
        .get_document("ICCAT", "https://example.org/doc1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, ProcessingStatus::Skipped);
    assert_eq!(doc.latest_version, 1);
    assert_eq!(engine.store().list_versions(&doc.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_content_change_creates_v2() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT")
            .with_document(measure_ref(), html_response("<html><body>v1</body></html>"))],
    )
    .await;
    engine.run_once(None).await.unwrap();

    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT").with_document(
            measure_ref(),
            html_response("<html><body>v2 changed</body></html>"),
        )],
    )
    .await;
    let second = engine.run_once(None).await.unwrap();

    assert_eq!(second.metrics.documents_ingested, 1);
    assert_eq!(second.metrics.documents_skipped, 0);

    let doc = engine
        .store()
        .get_document("ICCAT", "https://example.org/doc1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.latest_version, 2);

    let versions = engine.store().list_versions(&doc.id).await.unwrap();
    assert_eq!(
        versions.iter().map(|v| v.version_number).collect::<Vec<_>>(),
        vec![1, 2]
    );
    assert_ne!(versions[0].file_hash, versions[1].file_hash);
    assert_ne!(versions[0].content_hash, versions[1].content_hash);
    assert_eq!(doc.latest_file_hash.as_deref(), Some(versions[1].file_hash.as_str()));

    assert!(storage
        .join("iccat/2024")
        .join(&doc.id)
        .join("v2/raw.html")
        .exists());
}

#[tokio::test]
async fn test_listing_failure_demotes_source_health() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let engine = engine_with(
        &db,
        &storage,
        vec![
            ScriptedAdapter::new("iotc", "IOTC").with_listing_error("index unreachable"),
            ScriptedAdapter::new("iccat", "ICCAT")
                .with_document(measure_ref(), html_response("<html><body>ok</body></html>")),
        ],
    )
    .await;

    let run = engine.run_once(None).await.unwrap();

    // The healthy adapter still ran.
    assert_eq!(run.metrics.documents_ingested, 1);
    assert_eq!(run.metrics.failures, 1);
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].contains("iotc"));
    assert!(run.errors[0].contains("index unreachable"));

    let sick = engine.store().source_health("iotc").await.unwrap().unwrap();
    assert_eq!(sick.consecutive_failures, 1);
    assert_eq!(sick.last_error.as_deref(), Some("index unreachable"));
    assert!(sick.last_success_at.is_none());

    let healthy = engine.store().source_health("iccat").await.unwrap().unwrap();
    assert_eq!(healthy.consecutive_failures, 0);
    assert!(healthy.last_error.is_none());

    // A second failing run keeps counting.
    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iotc", "IOTC").with_listing_error("still down")],
    )
    .await;
    engine.run_once(None).await.unwrap();

    let sick = engine.store().source_health("iotc").await.unwrap().unwrap();
    assert_eq!(sick.consecutive_failures, 2);
    assert_eq!(sick.last_error.as_deref(), Some("still down"));
}

#[tokio::test]
async fn test_unknown_adapter_fails_synchronously() {
    let tmp = tempfile::tempdir().unwrap();
    let engine = engine_with(&tmp.path().join("pipeline.db"), &tmp.path().join("rfmo"), vec![]).await;

    let err = engine
        .run_once(Some(&["nafo".to_string()]))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("unknown adapter"));
}

#[tokio::test]
async fn test_fetch_failure_marks_document_failed() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let broken_ref = DocumentRef::new(
        "IOTC",
        "https://example.org/missing.pdf",
        DocumentCategory::CircularLetters,
    );
    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iotc", "IOTC").with_unfetchable(broken_ref)],
    )
    .await;

    let run = engine.run_once(None).await.unwrap();

    assert_eq!(run.metrics.documents_discovered, 1);
    assert_eq!(run.metrics.documents_fetched, 0);
    assert_eq!(run.metrics.failures, 1);
    assert_eq!(run.errors.len(), 1);
    assert!(run.errors[0].contains("https://example.org/missing.pdf"));

    let doc = engine
        .store()
        .get_document("IOTC", "https://example.org/missing.pdf")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(doc.status, ProcessingStatus::Failed);
    assert_eq!(doc.latest_version, 0);

    // Listing itself succeeded, so the source stays healthy.
    let health = engine.store().source_health("iotc").await.unwrap().unwrap();
    assert_eq!(health.consecutive_failures, 0);
}

#[tokio::test]
async fn test_pdf_without_backend_counts_parse_failure_but_ingests() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let pdf_ref = DocumentRef::new(
        "IOTC",
        "https://example.org/circular.pdf",
        DocumentCategory::CircularLetters,
    )
    .with_published_date(NaiveDate::from_ymd_opt(2026, 2, 1).unwrap());
    let response = ScriptedResponse {
        body: b"%PDF-1.7 fake".to_vec(),
        content_type: "application/pdf".to_string(),
        headers: vec![],
    };
    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iotc", "IOTC").with_document(pdf_ref, response)],
    )
    .await;

    let run = engine.run_once(None).await.unwrap();

    assert_eq!(run.metrics.parse_failures, 1);
    assert_eq!(run.metrics.documents_ingested, 1);
    assert_eq!(run.metrics.failures, 0);

    let doc = engine
        .store()
        .get_document("IOTC", "https://example.org/circular.pdf")
        .await
        .unwrap()
        .unwrap();
    let version = engine.store().latest_version(&doc.id).await.unwrap().unwrap();
    assert!(version.stored_path.ends_with("raw.pdf"));
    assert!(version.snapshot_html_path.is_none());

    let extracted = std::fs::read_to_string(&version.extracted_text_path).unwrap();
    assert!(extracted.is_empty());
}

#[tokio::test]
async fn test_duplicate_url_across_adapters_processed_once() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let engine = engine_with(
        &db,
        &storage,
        vec![
            ScriptedAdapter::new("iccat", "ICCAT")
                .with_document(measure_ref(), html_response("<html><body>a</body></html>")),
            ScriptedAdapter::new("iccat-mirror", "ICCAT")
                .with_document(measure_ref(), html_response("<html><body>a</body></html>")),
        ],
    )
    .await;

    let run = engine.run_once(None).await.unwrap();

    // Both listings count toward discovery, but the URL is handled once.
    assert_eq!(run.metrics.documents_discovered, 2);
    assert_eq!(run.metrics.documents_fetched, 1);
    assert_eq!(run.metrics.documents_ingested, 1);

    let doc = engine
        .store()
        .get_document("ICCAT", "https://example.org/doc1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(engine.store().list_versions(&doc.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_run_counters_reach_metrics_registry() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT")
            .with_document(measure_ref(), html_response("<html><body>ok</body></html>"))],
    )
    .await;
    engine.run_once(None).await.unwrap();

    let metrics = engine.metrics();
    assert_eq!(metrics.get("rfmo_documents_discovered_total"), 1.0);
    assert_eq!(metrics.get("rfmo_documents_ingested_total"), 1.0);
    assert_eq!(metrics.get("rfmo_documents_skipped_total"), 0.0);
    // Scripted listings report three filtered links each.
    assert_eq!(metrics.get("rfmo_documents_filtered_out_total"), 3.0);
    assert!(metrics.get("rfmo_storage_bytes_total") > 0.0);

    let rendered = metrics.render();
    assert!(rendered.contains("rfmo_documents_ingested_total 1"));
}

#[tokio::test]
async fn test_accounting_identity_holds_per_run() {
    let tmp = tempfile::tempdir().unwrap();
    let db = tmp.path().join("pipeline.db");
    let storage = tmp.path().join("rfmo");

    let good = measure_ref();
    let bad = DocumentRef::new(
        "ICCAT",
        "https://example.org/broken",
        DocumentCategory::IuuVesselLists,
    );
    let engine = engine_with(
        &db,
        &storage,
        vec![ScriptedAdapter::new("iccat", "ICCAT")
            .with_document(good, html_response("<html><body>ok</body></html>"))
            .with_unfetchable(bad)],
    )
    .await;

    let run = engine.run_once(None).await.unwrap();
    let m = &run.metrics;

    // No listing failed, so the identity is exact.
    assert_eq!(
        m.documents_ingested + m.documents_skipped + m.failures,
        m.documents_discovered
    );
    assert!(m.finished_at.is_some());
    assert!(m.duration_seconds >= 0.0);
}
