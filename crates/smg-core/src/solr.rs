//! Solr pagination client.
//!
//! Issues bounded, offset-based queries against one Solr core through the
//! `select` handler and maps response documents into typed records. Every
//! request runs under the per-source circuit breaker and a bounded retry
//! budget with exponential backoff; cancellation is observed between
//! attempts.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::Deserialize;
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use smg_common::config::SourceSpec;

use crate::breaker::CircuitBreaker;
use crate::error::{Error, Result};
use crate::types::DocumentRecord;

/// Documents available per source when test mode is active
pub const TEST_MODE_DOC_LIMIT: u64 = 10;

/// Default attempts per request, first try included
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default base for exponential backoff
pub const DEFAULT_RETRY_BASE: Duration = Duration::from_secs(1);

const USER_AGENT: &str = concat!("smg/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Retry policy
// ============================================================================

/// Bounded retry budget with exponential backoff
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Policy from `SMG_MAX_RETRIES` / `SMG_RETRY_BASE_MS`, defaults otherwise
    pub fn from_env() -> Self {
        let max_attempts = std::env::var("SMG_MAX_RETRIES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let base_delay = std::env::var("SMG_RETRY_BASE_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(DEFAULT_RETRY_BASE);
        Self::new(max_attempts, base_delay)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Backoff before the next try: `base * 2^attempt`
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES, DEFAULT_RETRY_BASE)
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct SelectResponse {
    response: SelectBody,
}

#[derive(Debug, Deserialize)]
struct SelectBody {
    #[serde(rename = "numFound")]
    num_found: u64,
    #[serde(default)]
    docs: Vec<Map<String, Value>>,
}

#[derive(Debug, Deserialize)]
struct PingResponse {
    #[serde(default)]
    status: String,
}

/// One fetched page.
///
/// `returned` counts rows the store actually sent, dropped records
/// included; pagination offsets advance by this number so a dropped
/// record never skips a row.
#[derive(Debug)]
pub struct Page {
    pub records: Vec<DocumentRecord>,
    pub returned: usize,
    pub skipped: usize,
}

impl Page {
    fn empty() -> Self {
        Self {
            records: Vec::new(),
            returned: 0,
            skipped: 0,
        }
    }
}

// ============================================================================
// Client
// ============================================================================

/// HTTP client for one Solr core
pub struct SolrClient {
    http: reqwest::Client,
    endpoint: String,
    source: String,
    test_mode: bool,
    retry: RetryPolicy,
    breaker: Mutex<CircuitBreaker>,
    cancel: CancellationToken,
}

impl SolrClient {
    /// Build a client for one source with the environment retry policy
    pub fn new(spec: &SourceSpec, cancel: CancellationToken) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(spec.timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::connection(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: spec.endpoint.as_str().trim_end_matches('/').to_string(),
            source: spec.name.clone(),
            test_mode: spec.test_mode,
            retry: RetryPolicy::from_env(),
            breaker: Mutex::new(CircuitBreaker::new(spec.name.clone())),
            cancel,
        })
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Replace the circuit breaker
    pub fn with_breaker(mut self, breaker: CircuitBreaker) -> Self {
        self.breaker = Mutex::new(breaker);
        self
    }

    pub fn is_test_mode(&self) -> bool {
        self.test_mode
    }

    /// Probe `admin/ping` and require `{"status": "OK"}`.
    ///
    /// A reachable store reporting any other status counts as a
    /// connection failure and is retried like one.
    pub async fn health_check(&self) -> Result<()> {
        let query = [("wt", "json".to_string())];

        self.retry_request("health probe", || async {
            let ping: PingResponse = self.get_json("admin/ping", &query).await?;
            if ping.status == "OK" {
                Ok(())
            } else {
                Err(Error::connection(format!(
                    "Store ping returned status '{}'",
                    ping.status
                )))
            }
        })
        .await
    }

    /// Total documents carrying the identifier field.
    ///
    /// The count query is always issued; test mode clamps its result to
    /// [`TEST_MODE_DOC_LIMIT`].
    pub async fn total_documents(&self, id_field: &str) -> Result<u64> {
        let query = [
            ("q", format!("{}:*", id_field)),
            ("rows", "0".to_string()),
            ("wt", "json".to_string()),
        ];

        let response: SelectResponse = self
            .retry_request("count query", || self.get_json("select", &query))
            .await?;
        let count = response.response.num_found;

        if self.test_mode {
            let capped = count.min(TEST_MODE_DOC_LIMIT);
            if capped < count {
                debug!(
                    source = %self.source,
                    actual = count,
                    capped,
                    "Test mode caps document count"
                );
            }
            return Ok(capped);
        }

        Ok(count)
    }

    /// Fetch one page of records ordered by the identifier field.
    ///
    /// In test mode no record beyond global offset
    /// [`TEST_MODE_DOC_LIMIT`] is ever returned: the effective row count
    /// is `min(limit, limit_remaining)`, and a page starting at or past
    /// the cap is answered empty without any network call.
    pub async fn fetch_page(
        &self,
        id_field: &str,
        date_field: &str,
        offset: u64,
        limit: usize,
    ) -> Result<Page> {
        let mut limit = limit;
        if self.test_mode {
            limit = test_mode_rows(offset, limit);
            if limit == 0 {
                debug!(source = %self.source, offset, "Test mode cap reached, empty page");
                return Ok(Page::empty());
            }
        }

        let query = [
            ("q", format!("{}:*", id_field)),
            ("fl", format!("{},{}", id_field, date_field)),
            ("start", offset.to_string()),
            ("rows", limit.to_string()),
            ("sort", format!("{} asc", id_field)),
            ("wt", "json".to_string()),
        ];

        let response: SelectResponse = self
            .retry_request("page fetch", || self.get_json("select", &query))
            .await?;

        let docs = response.response.docs;
        let returned = docs.len();
        let (records, skipped) = self.extract_records(docs, id_field, date_field);

        debug!(
            source = %self.source,
            offset,
            requested = limit,
            returned,
            skipped,
            "Fetched page"
        );

        Ok(Page {
            records,
            returned,
            skipped,
        })
    }

    // ------------------------------------------------------------------
    // Request plumbing
    // ------------------------------------------------------------------

    async fn retry_request<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            if self.cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }

            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        info!(
                            source = %self.source,
                            operation,
                            attempt,
                            "Request succeeded after retry"
                        );
                    }
                    return Ok(value);
                },
                Err(err) if err.is_retryable() && attempt < self.retry.max_attempts => {
                    let delay = self.retry.delay(attempt);
                    warn!(
                        source = %self.source,
                        operation,
                        attempt,
                        max_attempts = self.retry.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "Request failed, will retry"
                    );
                    tokio::select! {
                        _ = self.cancel.cancelled() => return Err(Error::Cancelled),
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
                Err(err) => {
                    if err.is_retryable() {
                        warn!(
                            source = %self.source,
                            operation,
                            attempts = attempt,
                            error = %err,
                            "Retry budget exhausted"
                        );
                    }
                    return Err(err);
                },
            }
        }
    }

    /// One GET against the store, gated by the circuit breaker
    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        self.lock_breaker().check()?;

        let url = format!("{}/{}", self.endpoint, path);
        let result = async {
            let response = self.http.get(&url).query(query).send().await?;
            let response = response.error_for_status()?;
            response.json::<T>().await.map_err(|e| {
                if e.is_decode() {
                    Error::connection(format!("Invalid JSON response from store: {}", e))
                } else {
                    Error::from(e)
                }
            })
        }
        .await;

        match &result {
            Ok(_) => self.lock_breaker().record_success(),
            Err(err) if err.is_retryable() => self.lock_breaker().record_failure(),
            Err(_) => {},
        }

        result
    }

    fn lock_breaker(&self) -> MutexGuard<'_, CircuitBreaker> {
        self.breaker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ------------------------------------------------------------------
    // Record extraction
    // ------------------------------------------------------------------

    fn extract_records(
        &self,
        docs: Vec<Map<String, Value>>,
        id_field: &str,
        date_field: &str,
    ) -> (Vec<DocumentRecord>, usize) {
        let mut records = Vec::with_capacity(docs.len());
        let mut skipped = 0;

        for doc in &docs {
            let Some(id) = doc.get(id_field).and_then(field_to_string) else {
                warn!(
                    source = %self.source,
                    "Dropping record with missing or empty identifier"
                );
                skipped += 1;
                continue;
            };

            let last_modified = doc.get(date_field).and_then(field_to_string).and_then(|raw| {
                let parsed = parse_store_timestamp(&raw);
                if parsed.is_none() {
                    warn!(
                        source = %self.source,
                        id = %id,
                        value = %raw,
                        "Unparsable timestamp, omitting lastmod"
                    );
                }
                parsed
            });

            records.push(DocumentRecord { id, last_modified });
        }

        (records, skipped)
    }
}

/// Effective rows for a test-mode fetch: `max(0, min(limit, cap - offset))`
fn test_mode_rows(offset: u64, limit: usize) -> usize {
    if offset >= TEST_MODE_DOC_LIMIT {
        return 0;
    }
    limit.min((TEST_MODE_DOC_LIMIT - offset) as usize)
}

/// Coerce a document field to a non-empty string.
///
/// Multi-valued fields contribute their first element; numbers render
/// in decimal.
fn field_to_string(value: &Value) -> Option<String> {
    let scalar = match value {
        Value::Array(items) => items.first()?,
        other => other,
    };

    match scalar {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse the timestamp formats stores are known to emit.
///
/// Tried in order: RFC 3339, naive ISO with and without fractional
/// seconds, space-separated datetime, bare date. Naive values are taken
/// as UTC.
pub(crate) fn parse_store_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }

    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc());
    }

    None
}
