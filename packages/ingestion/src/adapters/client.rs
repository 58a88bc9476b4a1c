//! Polite HTTP client shared by the HTML adapters.
//!
//! Every outbound request waits on a per-adapter minimum interval
//! (governor) and checks a lazily-cached per-host robots.txt before it
//! goes out. Robots fetch failures are fail-open: the host is cached as
//! unrestricted.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use governor::{Quota, RateLimiter};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::robots::RobotsPolicy;
use crate::types::RawDocument;

type DirectRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Default pause between two requests by the same adapter.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(250);

/// Default outbound request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct PoliteHttpClient {
    client: reqwest::Client,
    user_agent: String,
    limiter: Arc<DirectRateLimiter>,
    robots: Mutex<HashMap<String, Arc<RobotsPolicy>>>,
    respect_robots: bool,
}

impl PoliteHttpClient {
    pub fn new(user_agent: impl Into<String>) -> Self {
        Self::with_min_interval(user_agent, DEFAULT_MIN_INTERVAL)
    }

    pub fn with_min_interval(user_agent: impl Into<String>, min_interval: Duration) -> Self {
        let quota = Quota::with_period(min_interval.max(Duration::from_millis(1)))
            .expect("minimum request interval must be non-zero");
        Self {
            client: reqwest::Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("failed to build HTTP client"),
            user_agent: user_agent.into(),
            limiter: Arc::new(RateLimiter::direct(quota)),
            robots: Mutex::new(HashMap::new()),
            respect_robots: true,
        }
    }

    /// Disable robots.txt checks (tests and trusted mirrors only).
    pub fn without_robots(mut self) -> Self {
        self.respect_robots = false;
        self
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    /// Fetch one URL, honoring the rate limit and robots policy.
    pub async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        self.limiter.until_ready().await;
        self.check_robots(url).await?;

        debug!(url = %url, "outbound fetch");
        let response = self
            .client
            .get(url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect::<std::collections::BTreeMap<_, _>>();
        let content_type = headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case("content-type"))
            .map(|(_, v)| v.clone());

        let body = response.bytes().await.map_err(|e| FetchError::Http {
            url: url.to_string(),
            source: e,
        })?;

        Ok(RawDocument {
            source_url: url.to_string(),
            status_code: status.as_u16(),
            headers,
            content_type,
            body: body.to_vec(),
            fetched_at: Utc::now(),
        })
    }

    async fn check_robots(&self, url: &str) -> Result<(), FetchError> {
        if !self.respect_robots {
            return Ok(());
        }

        let parsed = Url::parse(url).map_err(|_| FetchError::InvalidUrl {
            url: url.to_string(),
        })?;
        let Some(host) = parsed.host_str() else {
            return Err(FetchError::InvalidUrl {
                url: url.to_string(),
            });
        };
        let origin = match parsed.port() {
            Some(port) => format!("{}://{}:{}", parsed.scheme(), host, port),
            None => format!("{}://{}", parsed.scheme(), host),
        };

        // The lock spans the one-time robots fetch so a host is probed
        // once; the run loop is sequential anyway.
        let mut cache = self.robots.lock().await;
        let policy = match cache.get(&origin) {
            Some(policy) => policy.clone(),
            None => {
                let policy = Arc::new(self.load_robots(&origin).await);
                cache.insert(origin.clone(), policy.clone());
                policy
            }
        };
        drop(cache);

        if policy.allows(&self.user_agent, parsed.path()) {
            Ok(())
        } else {
            Err(FetchError::RobotsDisallowed {
                url: url.to_string(),
            })
        }
    }

    /// Fetch and parse `<origin>/robots.txt`; any failure means "no
    /// restrictions".
    async fn load_robots(&self, origin: &str) -> RobotsPolicy {
        let robots_url = format!("{}/robots.txt", origin);
        let response = self
            .client
            .get(&robots_url)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await;

        match response {
            Ok(resp) if resp.status().is_success() => match resp.text().await {
                Ok(text) => RobotsPolicy::parse(&text),
                Err(e) => {
                    warn!(url = %robots_url, error = %e, "robots.txt body unreadable, failing open");
                    RobotsPolicy::default()
                }
            },
            Ok(resp) => {
                debug!(url = %robots_url, status = %resp.status(), "no robots.txt, failing open");
                RobotsPolicy::default()
            }
            Err(e) => {
                warn!(url = %robots_url, error = %e, "robots.txt fetch failed, failing open");
                RobotsPolicy::default()
            }
        }
    }
}
