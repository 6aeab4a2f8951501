//! reqwest-backed transport for the Fivetran REST API

use super::Transport;
use crate::cache::TtlCache;
use crate::retry::{with_retry, RetryConfig};
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Root of the public Fivetran REST API
pub const DEFAULT_BASE_URL: &str = "https://api.fivetran.com/v1/";
/// Per-request timeout when none is configured
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(40);
/// Wait applied to a 429 that carries no usable Retry-After header
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

const ACCEPT_VALUE: &str = "application/json;version=2";

/// API key/secret pair used for HTTP basic auth
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key)
            .field("api_secret", &"***")
            .finish()
    }
}

/// Everything needed to build an [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub base_url: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    pub retry: RetryConfig,
    /// Upper bound on requests in flight at once; `None` means unbounded
    pub max_concurrent_requests: Option<usize>,
    /// Serve repeated GETs of the same URL from memory for this long.
    /// `None` disables the response cache.
    pub response_cache_ttl: Option<Duration>,
}

impl TransportConfig {
    pub fn new(credentials: Credentials) -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            credentials,
            timeout: DEFAULT_TIMEOUT,
            retry: RetryConfig::default(),
            max_concurrent_requests: None,
            response_cache_ttl: None,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_concurrent_requests(mut self, limit: usize) -> Self {
        self.max_concurrent_requests = Some(limit);
        self
    }

    pub fn with_response_cache(mut self, ttl: Duration) -> Self {
        self.response_cache_ttl = Some(ttl);
        self
    }
}

/// Per-URL response cache.
///
/// Only the map update runs under the cache lock. Requests for the same URL
/// queue on a per-URL slot so one fetch serves them all, while different URLs
/// fetch in parallel.
struct ResponseCache {
    entries: TtlCache<String, Value>,
    in_flight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    ttl: Duration,
}

impl ResponseCache {
    fn new(ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(),
            in_flight: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Register interest in `key`, sharing the slot of any request already
    /// in flight for it
    fn register(&self, key: &str) -> SlotRegistration<'_> {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        let slot = Arc::clone(in_flight.entry(key.to_string()).or_default());
        SlotRegistration {
            in_flight: &self.in_flight,
            key: key.to_string(),
            slot,
        }
    }

    #[cfg(test)]
    fn in_flight_len(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

/// Removes the slot from the in-flight map once no other request shares it
struct SlotRegistration<'a> {
    in_flight: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    key: String,
    slot: Arc<tokio::sync::Mutex<()>>,
}

impl SlotRegistration<'_> {
    async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.slot.lock().await
    }
}

impl Drop for SlotRegistration<'_> {
    fn drop(&mut self) {
        let slot = std::mem::take(&mut self.slot);
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one here
        if Arc::strong_count(&slot) == 2 {
            in_flight.remove(&self.key);
        }
        // Release under the map lock so a concurrent drop sees the new count
        drop(slot);
    }
}

/// HTTP transport with basic auth, rate-limit retries, an optional request
/// limiter and an optional per-URL response cache
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    credentials: Credentials,
    retry: RetryConfig,
    limiter: Option<Semaphore>,
    response_cache: Option<ResponseCache>,
    closed: AtomicBool,
}

impl HttpTransport {
    pub fn new(config: TransportConfig) -> Result<Self> {
        if config.timeout.is_zero() {
            return Err(Error::Config("timeout must be greater than zero".to_string()));
        }
        if config.max_concurrent_requests == Some(0) {
            return Err(Error::Config(
                "max_concurrent_requests must be greater than zero".to_string(),
            ));
        }

        let base_url = parse_base_url(&config.base_url)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(ACCEPT_VALUE));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("fivetran-client/", env!("CARGO_PKG_VERSION"))),
        );

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;

        debug!(
            base_url = %base_url,
            timeout_secs = config.timeout.as_secs_f64(),
            max_concurrent = ?config.max_concurrent_requests,
            cache_ttl_secs = ?config.response_cache_ttl.map(|t| t.as_secs()),
            "Created Fivetran HTTP transport"
        );

        Ok(Self {
            client,
            base_url,
            credentials: config.credentials,
            retry: config.retry,
            limiter: config.max_concurrent_requests.map(Semaphore::new),
            response_cache: config.response_cache_ttl.map(ResponseCache::new),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| Error::InvalidUrl(format!("{}: {}", path, e)))?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    async fn fetch(&self, path: &str, url: &Url, cancel: &CancellationToken) -> Result<Value> {
        with_retry(&self.retry, path, cancel, || self.send(path, url)).await
    }

    async fn fetch_cached(
        &self,
        cache: &ResponseCache,
        path: &str,
        url: &Url,
        cancel: &CancellationToken,
    ) -> Result<Value> {
        let key = url.to_string();
        if let Some(value) = cache.entries.try_get(&key).await {
            debug!(path = %path, "Response cache hit");
            return Ok(value);
        }

        let registration = cache.register(&key);
        let _slot = registration.lock().await;
        if let Some(value) = cache.entries.try_get(&key).await {
            debug!(path = %path, "Response cache hit after wait");
            return Ok(value);
        }

        let value = self.fetch(path, url, cancel).await?;
        cache.entries.insert(key, value.clone(), cache.ttl).await;
        Ok(value)
    }

    async fn send(&self, path: &str, url: &Url) -> Result<Value> {
        let _permit = match self.limiter {
            Some(ref limiter) => Some(limiter.acquire().await.map_err(|_| Error::Closed)?),
            None => None,
        };

        debug!(path = %path, url = %url, "GET");

        let response = self
            .client
            .get(url.clone())
            .basic_auth(&self.credentials.api_key, Some(&self.credentials.api_secret))
            .send()
            .await
            .map_err(|source| Error::Network {
                path: path.to_string(),
                source,
            })?;

        match response.status() {
            status if status.is_success() => {
                let bytes = response.bytes().await.map_err(|source| Error::Network {
                    path: path.to_string(),
                    source,
                })?;
                serde_json::from_slice(&bytes).map_err(|source| Error::Decode {
                    path: path.to_string(),
                    source,
                })
            }
            StatusCode::TOO_MANY_REQUESTS => {
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
                Err(Error::RateLimited {
                    path: path.to_string(),
                    retry_after,
                })
            }
            status => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::Http {
                    path: path.to_string(),
                    status: status.as_u16(),
                    body,
                })
            }
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<Value> {
        if self.is_closed() {
            return Err(Error::Closed);
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled {
                path: path.to_string(),
            });
        }

        let url = self.url(path, query)?;

        let request = async {
            match self.response_cache {
                Some(ref cache) => self.fetch_cached(cache, path, &url, cancel).await,
                None => self.fetch(path, &url, cancel).await,
            }
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::Cancelled { path: path.to_string() }),
            result = request => result,
        }
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(ref limiter) = self.limiter {
            limiter.close();
        }
        info!(base_url = %self.base_url, "Closed Fivetran HTTP transport");
    }
}

/// Parse the API root, making sure relative paths join underneath it
fn parse_base_url(base_url: &str) -> Result<Url> {
    let normalized = if base_url.ends_with('/') {
        base_url.to_string()
    } else {
        format!("{}/", base_url)
    };

    let url =
        Url::parse(&normalized).map_err(|e| Error::InvalidUrl(format!("{}: {}", base_url, e)))?;
    if url.cannot_be_a_base() {
        return Err(Error::InvalidUrl(format!("{} cannot be a base URL", base_url)));
    }
    Ok(url)
}
