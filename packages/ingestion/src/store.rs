//! Transactional metadata store over SQLite.
//!
//! Holds the document registry, append-only version rows, per-adapter
//! source health and run records. The pool is capped at a single
//! connection: the engine is the only writer in the process and SQLite
//! serializes everything behind it, while WAL keeps the metrics thread's
//! reads cheap.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::MetadataError;
use crate::types::{
    DocumentRecord, DocumentRef, DocumentVersionRecord, IngestionRunResult, ProcessingStatus,
    SourceHealth,
};

pub struct MetadataStore {
    pool: SqlitePool,
}

impl MetadataStore {
    /// Open (or create) the store at `db_path`.
    pub async fn open(db_path: impl AsRef<Path>) -> Result<Self, MetadataError> {
        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::with_options(options).await
    }

    /// In-memory store for tests.
    pub async fn in_memory() -> Result<Self, MetadataError> {
        Self::with_options(SqliteConnectOptions::new().in_memory(true)).await
    }

    async fn with_options(options: SqliteConnectOptions) -> Result<Self, MetadataError> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.run_migrations().await?;
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), MetadataError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                id TEXT PRIMARY KEY,
                rfmo TEXT NOT NULL,
                source_url TEXT NOT NULL,
                document_type TEXT NOT NULL,
                title TEXT,
                publication_date TEXT,
                latest_version INTEGER NOT NULL DEFAULT 0,
                latest_file_hash TEXT,
                status TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                UNIQUE(rfmo, source_url)
            );

            CREATE INDEX IF NOT EXISTS idx_documents_rfmo ON documents(rfmo);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS document_versions (
                id TEXT PRIMARY KEY,
                document_id TEXT NOT NULL,
                version_number INTEGER NOT NULL,
                file_hash TEXT NOT NULL,
                etag TEXT,
                last_modified TEXT,
                metadata_hash TEXT NOT NULL,
                content_hash TEXT NOT NULL,
                status TEXT NOT NULL,
                stored_path TEXT NOT NULL,
                extracted_text_path TEXT NOT NULL,
                snapshot_html_path TEXT,
                metadata_path TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(document_id, version_number)
            );

            CREATE INDEX IF NOT EXISTS idx_document_versions_document
                ON document_versions(document_id, version_number DESC);
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS source_health (
                adapter_name TEXT PRIMARY KEY,
                rfmo TEXT NOT NULL,
                last_success_at TEXT,
                consecutive_failures INTEGER NOT NULL DEFAULT 0,
                last_error TEXT
            );

            CREATE TABLE IF NOT EXISTS ingestion_runs (
                run_id TEXT PRIMARY KEY,
                payload_json TEXT NOT NULL,
                created_at TEXT NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Record a discovery. New URLs insert a fresh document; known URLs
    /// refresh the document type and fill title/date only when unset.
    pub async fn upsert_document_discovered(
        &self,
        doc_ref: &DocumentRef,
    ) -> Result<DocumentRecord, MetadataError> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();

        let row = sqlx::query_as::<_, DocumentRow>(
            r#"
            INSERT INTO documents (
                id, rfmo, source_url, document_type, title, publication_date,
                latest_version, latest_file_hash, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, 0, NULL, 'discovered', ?, ?)
            ON CONFLICT(rfmo, source_url) DO UPDATE SET
                document_type = excluded.document_type,
                title = COALESCE(documents.title, excluded.title),
                publication_date = COALESCE(documents.publication_date, excluded.publication_date),
                updated_at = excluded.updated_at
            RETURNING id, rfmo, source_url, document_type, title, publication_date,
                      latest_version, latest_file_hash, status, created_at, updated_at
            "#,
        )
        .bind(&id)
        .bind(&doc_ref.rfmo)
        .bind(&doc_ref.source_url)
        .bind(doc_ref.document_type.as_str())
        .bind(doc_ref.title_hint.as_deref())
        .bind(doc_ref.published_date.map(|d| d.to_string()))
        .bind(&now)
        .bind(&now)
        .fetch_one(&self.pool)
        .await?;

        row.into_record()
    }

    pub async fn get_document(
        &self,
        rfmo: &str,
        source_url: &str,
    ) -> Result<Option<DocumentRecord>, MetadataError> {
        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT id, rfmo, source_url, document_type, title, publication_date, \
             latest_version, latest_file_hash, status, created_at, updated_at \
             FROM documents WHERE rfmo = ? AND source_url = ?",
        )
        .bind(rfmo)
        .bind(source_url)
        .fetch_optional(&self.pool)
        .await?;

        row.map(DocumentRow::into_record).transpose()
    }

    pub async fn set_document_status(
        &self,
        document_id: &str,
        status: ProcessingStatus,
    ) -> Result<(), MetadataError> {
        sqlx::query("UPDATE documents SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(Utc::now().to_rfc3339())
            .bind(document_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Latest version row for a document, if any.
    pub async fn latest_version(
        &self,
        document_id: &str,
    ) -> Result<Option<DocumentVersionRecord>, MetadataError> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT id, document_id, version_number, file_hash, etag, last_modified, \
             metadata_hash, content_hash, status, stored_path, extracted_text_path, \
             snapshot_html_path, metadata_path, created_at \
             FROM document_versions WHERE document_id = ? \
             ORDER BY version_number DESC LIMIT 1",
        )
        .bind(document_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(VersionRow::into_record).transpose()
    }

    pub async fn list_versions(
        &self,
        document_id: &str,
    ) -> Result<Vec<DocumentVersionRecord>, MetadataError> {
        let rows = sqlx::query_as::<_, VersionRow>(
            "SELECT id, document_id, version_number, file_hash, etag, last_modified, \
             metadata_hash, content_hash, status, stored_path, extracted_text_path, \
             snapshot_html_path, metadata_path, created_at \
             FROM document_versions WHERE document_id = ? \
             ORDER BY version_number ASC",
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(VersionRow::into_record).collect()
    }

    /// Insert a version row and roll the parent document forward to it,
    /// atomically.
    pub async fn create_version(
        &self,
        version: &DocumentVersionRecord,
    ) -> Result<(), MetadataError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO document_versions (
                id, document_id, version_number, file_hash, etag, last_modified,
                metadata_hash, content_hash, status, stored_path,
                extracted_text_path, snapshot_html_path, metadata_path, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&version.id)
        .bind(&version.document_id)
        .bind(version.version_number)
        .bind(&version.file_hash)
        .bind(version.etag.as_deref())
        .bind(version.last_modified.as_deref())
        .bind(&version.metadata_hash)
        .bind(&version.content_hash)
        .bind(version.status.as_str())
        .bind(&version.stored_path)
        .bind(&version.extracted_text_path)
        .bind(version.snapshot_html_path.as_deref())
        .bind(&version.metadata_path)
        .bind(version.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE documents SET latest_version = ?, latest_file_hash = ?, \
             status = ?, updated_at = ? WHERE id = ?",
        )
        .bind(version.version_number)
        .bind(&version.file_hash)
        .bind(version.status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(&version.document_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    pub async fn source_health(
        &self,
        adapter_name: &str,
    ) -> Result<Option<SourceHealth>, MetadataError> {
        let row = sqlx::query_as::<_, HealthRow>(
            "SELECT adapter_name, rfmo, last_success_at, consecutive_failures, last_error \
             FROM source_health WHERE adapter_name = ?",
        )
        .bind(adapter_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(HealthRow::into_record).transpose()
    }

    pub async fn upsert_source_health(&self, health: &SourceHealth) -> Result<(), MetadataError> {
        sqlx::query(
            r#"
            INSERT INTO source_health (
                adapter_name, rfmo, last_success_at, consecutive_failures, last_error
            ) VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(adapter_name) DO UPDATE SET
                rfmo = excluded.rfmo,
                last_success_at = excluded.last_success_at,
                consecutive_failures = excluded.consecutive_failures,
                last_error = excluded.last_error
            "#,
        )
        .bind(&health.adapter_name)
        .bind(&health.rfmo)
        .bind(health.last_success_at.map(|t| t.to_rfc3339()))
        .bind(health.consecutive_failures)
        .bind(health.last_error.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_source_health(&self) -> Result<Vec<SourceHealth>, MetadataError> {
        let rows = sqlx::query_as::<_, HealthRow>(
            "SELECT adapter_name, rfmo, last_success_at, consecutive_failures, last_error \
             FROM source_health ORDER BY adapter_name ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(HealthRow::into_record).collect()
    }

    /// Persist a finished run as a JSON payload.
    pub async fn insert_run(&self, run: &IngestionRunResult) -> Result<(), MetadataError> {
        let payload = serde_json::to_string(run)?;
        sqlx::query("INSERT INTO ingestion_runs (run_id, payload_json, created_at) VALUES (?, ?, ?)")
            .bind(&run.run_id)
            .bind(&payload)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_run(&self, run_id: &str) -> Result<Option<IngestionRunResult>, MetadataError> {
        let payload: Option<(String,)> =
            sqlx::query_as("SELECT payload_json FROM ingestion_runs WHERE run_id = ?")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;

        payload
            .map(|(json,)| serde_json::from_str(&json).map_err(MetadataError::Encode))
            .transpose()
    }

    /// Every stored raw-artifact path, oldest first.
    pub async fn list_storage_paths(&self) -> Result<Vec<String>, MetadataError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT stored_path FROM document_versions ORDER BY created_at ASC, version_number ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|(path,)| path).collect())
    }
}

// Row types for sqlx queries; dates travel as TEXT.

#[derive(Debug, FromRow)]
struct DocumentRow {
    id: String,
    rfmo: String,
    source_url: String,
    document_type: String,
    title: Option<String>,
    publication_date: Option<String>,
    latest_version: i64,
    latest_file_hash: Option<String>,
    status: String,
    created_at: String,
    updated_at: String,
}

impl DocumentRow {
    fn into_record(self) -> Result<DocumentRecord, MetadataError> {
        Ok(DocumentRecord {
            id: self.id,
            rfmo: self.rfmo,
            source_url: self.source_url,
            document_type: self.document_type,
            title: self.title,
            publication_date: parse_opt_date(self.publication_date.as_deref())?,
            latest_version: self.latest_version,
            latest_file_hash: self.latest_file_hash,
            status: parse_status(&self.status)?,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct VersionRow {
    id: String,
    document_id: String,
    version_number: i64,
    file_hash: String,
    etag: Option<String>,
    last_modified: Option<String>,
    metadata_hash: String,
    content_hash: String,
    status: String,
    stored_path: String,
    extracted_text_path: String,
    snapshot_html_path: Option<String>,
    metadata_path: String,
    created_at: String,
}

impl VersionRow {
    fn into_record(self) -> Result<DocumentVersionRecord, MetadataError> {
        Ok(DocumentVersionRecord {
            id: self.id,
            document_id: self.document_id,
            version_number: self.version_number,
            file_hash: self.file_hash,
            etag: self.etag,
            last_modified: self.last_modified,
            metadata_hash: self.metadata_hash,
            content_hash: self.content_hash,
            status: parse_status(&self.status)?,
            stored_path: self.stored_path,
            extracted_text_path: self.extracted_text_path,
            snapshot_html_path: self.snapshot_html_path,
            metadata_path: self.metadata_path,
            created_at: parse_timestamp(&self.created_at)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct HealthRow {
    adapter_name: String,
    rfmo: String,
    last_success_at: Option<String>,
    consecutive_failures: i64,
    last_error: Option<String>,
}

impl HealthRow {
    fn into_record(self) -> Result<SourceHealth, MetadataError> {
        let last_success_at = self
            .last_success_at
            .as_deref()
            .map(parse_timestamp)
            .transpose()?;
        Ok(SourceHealth {
            adapter_name: self.adapter_name,
            rfmo: self.rfmo,
            last_success_at,
            consecutive_failures: self.consecutive_failures,
            last_error: self.last_error,
        })
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, MetadataError> {
    DateTime::parse_from_rfc3339(value)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| MetadataError::Corrupt(format!("invalid timestamp {value:?}: {e}")))
}

fn parse_opt_date(value: Option<&str>) -> Result<Option<NaiveDate>, MetadataError> {
    value
        .map(|v| {
            NaiveDate::parse_from_str(v, "%Y-%m-%d")
                .map_err(|e| MetadataError::Corrupt(format!("invalid date {v:?}: {e}")))
        })
        .transpose()
}

fn parse_status(value: &str) -> Result<ProcessingStatus, MetadataError> {
    ProcessingStatus::parse(value)
        .ok_or_else(|| MetadataError::Corrupt(format!("unknown status {value:?}")))
}
