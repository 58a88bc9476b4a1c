//! Bounded-retry wrapper around an adapter fetch.
//!
//! The polite client owned by each adapter already enforces rate limits
//! and robots.txt; this layer only decides how often to re-attempt a
//! failed fetch and how long to wait between attempts.

use std::time::Duration;

use tracing::warn;

use crate::adapters::RfmoAdapter;
use crate::error::FetchError;
use crate::types::{DocumentRef, RawDocument};

/// Retry policy: `attempts` tries with linear backoff
/// `attempt × backoff_base` between them.
#[derive(Debug, Clone)]
pub struct FetchService {
    attempts: u32,
    backoff_base: Duration,
}

impl Default for FetchService {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl FetchService {
    pub fn new(attempts: u32, backoff_base: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            backoff_base,
        }
    }

    /// Fetch one document through the adapter, retrying on failure.
    ///
    /// Robots denials are terminal and returned as-is; anything else is
    /// retried until the budget runs out, then wrapped with the last
    /// cause.
    pub async fn fetch(
        &self,
        adapter: &dyn RfmoAdapter,
        doc_ref: &DocumentRef,
    ) -> Result<RawDocument, FetchError> {
        let mut last_error: Option<FetchError> = None;

        for attempt in 1..=self.attempts {
            match adapter.fetch_document(doc_ref).await {
                Ok(raw) => return Ok(raw),
                Err(e) if e.is_terminal() => return Err(e),
                Err(e) => {
                    warn!(
                        url = %doc_ref.source_url,
                        attempt,
                        max_attempts = self.attempts,
                        error = %e,
                        "fetch attempt failed"
                    );
                    last_error = Some(e);
                    if attempt < self.attempts {
                        tokio::time::sleep(self.backoff_base * attempt).await;
                    }
                }
            }
        }

        Err(FetchError::RetriesExhausted {
            url: doc_ref.source_url.clone(),
            attempts: self.attempts,
            source: Box::new(last_error.expect("at least one attempt ran")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::Discovery;
    use crate::error::DiscoveryError;
    use crate::types::{DocumentCategory, ParsedDocument};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Adapter whose fetch fails a fixed number of times before
    /// succeeding, or always denies via robots.
    #[derive(Debug)]
    struct FlakyAdapter {
        calls: AtomicU32,
        failures_before_success: u32,
        robots_denied: bool,
    }

    impl FlakyAdapter {
        fn failing(failures_before_success: u32) -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success,
                robots_denied: false,
            }
        }

        fn robots_denied() -> Self {
            Self {
                calls: AtomicU32::new(0),
                failures_before_success: u32::MAX,
                robots_denied: true,
            }
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl RfmoAdapter for FlakyAdapter {
        fn name(&self) -> &str {
            "flaky"
        }

        fn rfmo(&self) -> &str {
            "TEST"
        }

        async fn list_documents(&self) -> Result<Discovery, DiscoveryError> {
            Ok(Discovery::default())
        }

        async fn fetch_document(&self, doc_ref: &DocumentRef) -> Result<RawDocument, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.robots_denied {
                return Err(FetchError::RobotsDisallowed {
                    url: doc_ref.source_url.clone(),
                });
            }
            if call < self.failures_before_success {
                return Err(FetchError::Other("connection reset".to_string()));
            }
            Ok(RawDocument {
                source_url: doc_ref.source_url.clone(),
                status_code: 200,
                headers: Default::default(),
                content_type: None,
                body: b"ok".to_vec(),
                fetched_at: Utc::now(),
            })
        }

        fn extract_metadata(&self, _raw: &RawDocument, doc_ref: &DocumentRef) -> ParsedDocument {
            ParsedDocument {
                title: doc_ref.title_hint.clone().unwrap_or_default(),
                publication_date: None,
                document_category: doc_ref.document_type,
                document_number: None,
                meeting_reference: None,
                rfmo_region: None,
                extracted_text: String::new(),
                snapshot_html: None,
                parser_info: Default::default(),
            }
        }
    }

    fn test_ref() -> DocumentRef {
        DocumentRef::new(
            "TEST",
            "https://example.org/doc",
            DocumentCategory::CircularLetters,
        )
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let adapter = FlakyAdapter::failing(2);
        let service = FetchService::new(3, Duration::ZERO);

        let raw = service.fetch(&adapter, &test_ref()).await.unwrap();
        assert_eq!(raw.body, b"ok");
        assert_eq!(adapter.calls(), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_wraps_last_cause() {
        let adapter = FlakyAdapter::failing(10);
        let service = FetchService::new(3, Duration::ZERO);

        let err = service.fetch(&adapter, &test_ref()).await.unwrap_err();
        assert_eq!(adapter.calls(), 3);
        match err {
            FetchError::RetriesExhausted { attempts, source, .. } => {
                assert_eq!(attempts, 3);
                assert!(matches!(*source, FetchError::Other(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_robots_denial_is_not_retried() {
        let adapter = FlakyAdapter::robots_denied();
        let service = FetchService::new(3, Duration::ZERO);

        let err = service.fetch(&adapter, &test_ref()).await.unwrap_err();
        assert_eq!(adapter.calls(), 1);
        assert!(matches!(err, FetchError::RobotsDisallowed { .. }));
    }
}
