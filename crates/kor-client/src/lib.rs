//! Bounded HTTP utilities shared by all signal fetchers.
//!
//! Every upstream call here is a single attempt: a failure degrades the
//! caller to its simulated fallback instead of being retried, so the
//! only retry mechanism in the system stays the job-level one.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use reqwest::StatusCode;
use thiserror::Error;
use tokio::sync::{Mutex, Semaphore};
use tracing::info_span;

pub const CRATE_NAME: &str = "kor-client";

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub global_concurrency: usize,
    pub per_host_concurrency: usize,
    pub token_bucket: Option<TokenBucketConfig>,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            global_concurrency: 16,
            per_host_concurrency: 4,
            token_bucket: Some(TokenBucketConfig {
                capacity: 8,
                refill_every: Duration::from_millis(500),
            }),
        }
    }
}

/// Token-bucket parameters applied independently to each upstream host.
#[derive(Debug, Clone, Copy)]
pub struct TokenBucketConfig {
    pub capacity: u32,
    pub refill_every: Duration,
}

#[derive(Debug)]
pub struct SimpleTokenBucket {
    capacity: u32,
    refill_every: Duration,
    state: Mutex<TokenBucketState>,
}

#[derive(Debug, Clone, Copy)]
struct TokenBucketState {
    tokens: u32,
    last_refill: Instant,
}

impl SimpleTokenBucket {
    pub fn new(capacity: u32, refill_every: Duration) -> Self {
        Self {
            capacity,
            refill_every,
            state: Mutex::new(TokenBucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub async fn take(&self) {
        loop {
            let mut state = self.state.lock().await;
            let elapsed = state.last_refill.elapsed();
            if elapsed >= self.refill_every && self.refill_every.as_millis() > 0 {
                let refills = (elapsed.as_millis() / self.refill_every.as_millis()) as u32;
                state.tokens = state.tokens.saturating_add(refills).min(self.capacity);
                state.last_refill = Instant::now();
            }

            if state.tokens > 0 {
                state.tokens -= 1;
                return;
            }

            let sleep_for = self.refill_every;
            drop(state);
            tokio::time::sleep(sleep_for).await;
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
}

#[derive(Debug, Clone)]
pub struct FetchedJson {
    pub status: StatusCode,
    pub final_url: String,
    pub body: serde_json::Value,
}

/// Shared client with global + per-host concurrency caps and a
/// per-host token bucket. The bucket is process-wide, so concurrent
/// workers in one process cannot jointly exceed an upstream's rate.
#[derive(Debug)]
pub struct HttpClient {
    client: reqwest::Client,
    global_limit: Arc<Semaphore>,
    per_host_limit: usize,
    per_host: Mutex<HashMap<String, Arc<Semaphore>>>,
    bucket_config: Option<TokenBucketConfig>,
    buckets: Mutex<HashMap<String, Arc<SimpleTokenBucket>>>,
}

impl HttpClient {
    pub fn new(config: HttpClientConfig) -> anyhow::Result<Self> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);

        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }

        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            global_limit: Arc::new(Semaphore::new(config.global_concurrency.max(1))),
            per_host_limit: config.per_host_concurrency.max(1),
            per_host: Mutex::new(HashMap::new()),
            bucket_config: config.token_bucket,
            buckets: Mutex::new(HashMap::new()),
        })
    }

    async fn per_host_semaphore(&self, host: &str) -> Arc<Semaphore> {
        let mut map = self.per_host.lock().await;
        map.entry(host.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.per_host_limit)))
            .clone()
    }

    async fn bucket_for(&self, host: &str) -> Option<Arc<SimpleTokenBucket>> {
        let config = self.bucket_config?;
        let mut map = self.buckets.lock().await;
        Some(
            map.entry(host.to_string())
                .or_insert_with(|| {
                    Arc::new(SimpleTokenBucket::new(config.capacity, config.refill_every))
                })
                .clone(),
        )
    }

    /// GET a URL and parse the body as JSON. Single attempt, no retry.
    pub async fn fetch_json(&self, url: &str) -> Result<FetchedJson, FetchError> {
        let host = host_of(url);
        let _global = self.global_limit.acquire().await.expect("semaphore not closed");
        let per_host = self.per_host_semaphore(&host).await;
        let _host_permit = per_host.acquire().await.expect("semaphore not closed");

        if let Some(bucket) = self.bucket_for(&host).await {
            bucket.take().await;
        }

        let span = info_span!("http_fetch", host = %host, url);
        let _guard = span.enter();

        let resp = self.client.get(url).send().await?;
        let status = resp.status();
        let final_url = resp.url().to_string();

        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                status: status.as_u16(),
                url: final_url,
            });
        }

        let body = resp.json::<serde_json::Value>().await?;
        Ok(FetchedJson {
            status,
            final_url,
            body,
        })
    }
}

/// Extract the host portion of a URL for keying limits; falls back to
/// the whole string for anything unparseable.
pub fn host_of(url: &str) -> String {
    url.strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url)
        .split(['/', '?'])
        .next()
        .unwrap_or(url)
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_extraction_handles_paths_and_queries() {
        assert_eq!(host_of("https://api.example.com/v1/search?q=x"), "api.example.com");
        assert_eq!(host_of("http://example.com"), "example.com");
        assert_eq!(host_of("not-a-url"), "not-a-url");
    }

    #[tokio::test]
    async fn token_bucket_deducts_and_refills() {
        let bucket = SimpleTokenBucket::new(2, Duration::from_millis(10));
        bucket.take().await;
        bucket.take().await;
        // Third take must wait for at least one refill interval.
        let started = Instant::now();
        bucket.take().await;
        assert!(started.elapsed() >= Duration::from_millis(5));
    }

    #[tokio::test]
    async fn distinct_hosts_get_distinct_buckets() {
        let client = HttpClient::new(HttpClientConfig::default()).expect("client");
        let a = client.bucket_for("a.example.com").await.expect("bucket");
        let b = client.bucket_for("b.example.com").await.expect("bucket");
        assert!(!Arc::ptr_eq(&a, &b));
        let a2 = client.bucket_for("a.example.com").await.expect("bucket");
        assert!(Arc::ptr_eq(&a, &a2));
    }
}
