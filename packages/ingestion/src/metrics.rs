//! In-process run counters and their Prometheus exposition.
//!
//! The registry is an explicitly constructed object shared between the
//! engine (writer) and the metrics endpoint (reader); there is no
//! ambient singleton. Values only ever go up.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;

pub const DOCUMENTS_DISCOVERED: &str = "rfmo_documents_discovered_total";
pub const DOCUMENTS_FILTERED_OUT: &str = "rfmo_documents_filtered_out_total";
pub const DOCUMENTS_FETCHED: &str = "rfmo_documents_fetched_total";
pub const DOCUMENTS_INGESTED: &str = "rfmo_documents_ingested_total";
pub const DOCUMENTS_SKIPPED: &str = "rfmo_documents_skipped_total";
pub const FAILURES: &str = "rfmo_failures_total";
pub const PARSE_FAILURES: &str = "rfmo_parse_failures_total";
pub const STORAGE_BYTES: &str = "rfmo_storage_bytes_total";
pub const PROCESSING_SECONDS: &str = "rfmo_processing_seconds_total";

const COUNTERS: &[&str] = &[
    DOCUMENTS_DISCOVERED,
    DOCUMENTS_FILTERED_OUT,
    DOCUMENTS_FETCHED,
    DOCUMENTS_INGESTED,
    DOCUMENTS_SKIPPED,
    FAILURES,
    PARSE_FAILURES,
    STORAGE_BYTES,
    PROCESSING_SECONDS,
];

/// Mutex-guarded counter map with atomic read/add/set operations.
pub struct MetricsRegistry {
    values: Mutex<BTreeMap<&'static str, f64>>,
}

impl MetricsRegistry {
    /// Registry with every counter present at zero.
    pub fn new() -> Self {
        Self {
            values: Mutex::new(COUNTERS.iter().map(|name| (*name, 0.0)).collect()),
        }
    }

    pub fn add(&self, name: &'static str, delta: f64) {
        let mut values = self.values.lock().expect("metrics lock poisoned");
        *values.entry(name).or_insert(0.0) += delta;
    }

    pub fn set(&self, name: &'static str, value: f64) {
        let mut values = self.values.lock().expect("metrics lock poisoned");
        values.insert(name, value);
    }

    pub fn get(&self, name: &str) -> f64 {
        let values = self.values.lock().expect("metrics lock poisoned");
        values.get(name).copied().unwrap_or(0.0)
    }

    /// Prometheus text format v0.0.4: one `name value` line per counter,
    /// sorted by name.
    pub fn render(&self) -> String {
        let values = self.values.lock().expect("metrics lock poisoned");
        let mut out = String::new();
        for (name, value) in values.iter() {
            if value.fract() == 0.0 {
                out.push_str(&format!("{} {}\n", name, *value as u64));
            } else {
                out.push_str(&format!("{} {}\n", name, value));
            }
        }
        out
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// One-route app: GET `/metrics` renders the registry, anything else is
/// a 404.
pub fn metrics_router(registry: Arc<MetricsRegistry>) -> Router {
    Router::new()
        .route("/metrics", get(render_metrics))
        .with_state(registry)
}

async fn render_metrics(State(registry): State<Arc<MetricsRegistry>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        registry.render(),
    )
}

/// Serve the metrics endpoint until the listener is dropped.
pub async fn serve_metrics(
    registry: Arc<MetricsRegistry>,
    listener: tokio::net::TcpListener,
) -> std::io::Result<()> {
    axum::serve(listener, metrics_router(registry)).await
}
