//! Per-RFMO discovery and fetch drivers.
//!
//! An adapter knows how one RFMO publishes documents: which index pages
//! list them, how to fetch one, and how to pull identifying metadata out
//! of the response. The shared HTML implementation in [`html`] covers
//! all three built-in RFMOs; each is specialized only by its static
//! category → index-URL map in [`catalog`].

pub mod client;
pub mod html;

mod catalog;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConfigError, DiscoveryError, FetchError};
use crate::types::{DocumentRef, ParsedDocument, RawDocument};

pub use catalog::{iccat, iotc, wcpfc};
pub use client::PoliteHttpClient;
pub use html::HtmlAdapter;

/// User-Agent sent with every outbound request unless overridden.
pub const DEFAULT_USER_AGENT: &str = "ocean-watch-rfmo-ingestion/1.0";

/// Output of one discovery pass over an adapter's index pages.
///
/// Carries the scan counters alongside the refs so the engine can feed
/// the filtered-out metric without adapters holding mutable state.
#[derive(Debug, Default)]
pub struct Discovery {
    pub refs: Vec<DocumentRef>,
    pub links_scanned: u64,
    pub links_filtered_out: u64,
}

impl Discovery {
    pub fn from_refs(refs: Vec<DocumentRef>) -> Self {
        Self {
            refs,
            links_scanned: 0,
            links_filtered_out: 0,
        }
    }
}

/// Discovery/fetch/metadata driver for one RFMO.
///
/// Adapters own their outbound network state (rate-limit clock, robots
/// cache) but hold no persistent state; all persistence goes through
/// the engine.
#[async_trait]
pub trait RfmoAdapter: Send + Sync + std::fmt::Debug {
    /// Registry key, e.g. `iccat`.
    fn name(&self) -> &str;

    /// Upstream organization code, e.g. `ICCAT`.
    fn rfmo(&self) -> &str;

    /// Scan the configured index pages for candidate documents.
    async fn list_documents(&self) -> Result<Discovery, DiscoveryError>;

    /// Fetch one candidate's bytes.
    async fn fetch_document(&self, doc_ref: &DocumentRef) -> Result<RawDocument, FetchError>;

    /// Pull identifying metadata from a fetched body, falling back to
    /// the ref's discovery hints.
    fn extract_metadata(&self, raw: &RawDocument, doc_ref: &DocumentRef) -> ParsedDocument;
}

/// Registry of adapters keyed by name.
pub struct AdapterRegistry {
    adapters: HashMap<String, Arc<dyn RfmoAdapter>>,
}

impl AdapterRegistry {
    /// Registry with the built-in ICCAT, WCPFC and IOTC adapters.
    pub fn new(user_agent: &str) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(iccat(user_agent)));
        registry.register(Arc::new(wcpfc(user_agent)));
        registry.register(Arc::new(iotc(user_agent)));
        registry
    }

    pub fn empty() -> Self {
        Self {
            adapters: HashMap::new(),
        }
    }

    pub fn register(&mut self, adapter: Arc<dyn RfmoAdapter>) {
        self.adapters.insert(adapter.name().to_string(), adapter);
    }

    /// Registered adapter names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.adapters.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn get(&self, name: &str) -> Result<Arc<dyn RfmoAdapter>, ConfigError> {
        self.adapters
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownAdapter(name.to_string()))
    }

    /// All adapters in name order.
    pub fn all(&self) -> Vec<Arc<dyn RfmoAdapter>> {
        self.names()
            .into_iter()
            .filter_map(|name| self.adapters.get(&name).cloned())
            .collect()
    }
}

impl Default for AdapterRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_USER_AGENT)
    }
}
