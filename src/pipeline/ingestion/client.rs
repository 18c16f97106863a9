use crate::app::ports::{Clock, ExplorerApi, HttpGetResult, HttpTransport};
use crate::config::HttpSettings;
use crate::constants::API_KEY_PARAM;
use crate::error::{EtlError, Result};
use crate::metrics::HttpMetrics;
use crate::pipeline::ingestion::rate_limiter::RateLimiter;
use crate::types::{ApiParams, ApiResponse};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const RETRY_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];
const TOO_MANY_REQUESTS: u16 = 429;
const BODY_SNIPPET_CHARS: usize = 400;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff_factor: Duration,
    pub backoff_max: Duration,
    pub rate_limit_cooldown: Duration,
}

impl RetryPolicy {
    /// Wait before retry number `retry` (1-based): `factor * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(31);
        self.backoff_factor
            .checked_mul(1u32 << exp)
            .unwrap_or(self.backoff_max)
            .min(self.backoff_max)
    }

    fn is_retryable_status(status: u16) -> bool {
        RETRY_STATUSES.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&HttpSettings::default())
    }
}

impl From<&HttpSettings> for RetryPolicy {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            backoff_factor: Duration::from_secs_f64(settings.backoff_factor_secs.max(0.0)),
            backoff_max: Duration::from_secs_f64(settings.backoff_max_secs.max(0.0)),
            rate_limit_cooldown: Duration::from_secs_f64(
                settings.rate_limit_cooldown_secs.max(0.0),
            ),
        }
    }
}

/// Explorer client: every attempt goes through the shared rate limiter, transient
/// failures are retried with exponential backoff, bodies are decoded as JSON.
pub struct ResilientClient {
    base_url: String,
    api_key: String,
    transport: Box<dyn HttpTransport>,
    limiter: Arc<RateLimiter>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
}

impl ResilientClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        transport: Box<dyn HttpTransport>,
        limiter: Arc<RateLimiter>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            transport,
            limiter,
            clock,
            policy,
        }
    }

    fn query(&self, params: &ApiParams) -> Vec<(&str, String)> {
        let mut query: Vec<(&str, String)> = params
            .pairs()
            .iter()
            .map(|(k, v)| (*k, v.clone()))
            .collect();
        query.push((API_KEY_PARAM, self.api_key.clone()));
        query
    }

    fn send(&self, query: &[(&str, String)]) -> Result<HttpGetResult> {
        self.limiter.acquire();
        let t0 = Instant::now();
        let outcome = self.transport.get(&self.base_url, query);
        HttpMetrics::request(t0.elapsed().as_secs_f64());
        outcome
    }

    fn wait_before_retry(&self, retry: u32, status: Option<u16>, retry_after: Option<Duration>) {
        HttpMetrics::retry();
        if status == Some(TOO_MANY_REQUESTS) {
            self.clock.sleep(self.policy.rate_limit_cooldown);
        }
        let mut wait = self.policy.backoff(retry);
        if let Some(hint) = retry_after {
            wait = wait.max(hint);
        }
        if !wait.is_zero() {
            self.clock.sleep(wait);
        }
    }
}

impl ExplorerApi for ResilientClient {
    fn fetch(&self, params: &ApiParams) -> Result<ApiResponse> {
        let query = self.query(params);
        let action = params.get("action").unwrap_or_default();
        let mut retries = 0u32;

        loop {
            let resp = match self.send(&query) {
                Ok(resp) => resp,
                Err(e) if e.is_transient() && retries < self.policy.max_retries => {
                    retries += 1;
                    warn!(action, retry = retries, "transient HTTP failure: {}", e);
                    self.wait_before_retry(retries, None, None);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if (200..300).contains(&resp.status) {
                return decode(&resp.body);
            }

            if RetryPolicy::is_retryable_status(resp.status) && retries < self.policy.max_retries {
                retries += 1;
                warn!(action, status = resp.status, retry = retries, "retryable HTTP status");
                self.wait_before_retry(retries, Some(resp.status), resp.retry_after);
                continue;
            }

            if resp.status == TOO_MANY_REQUESTS {
                self.clock.sleep(self.policy.rate_limit_cooldown);
            }
            return Err(EtlError::Status {
                status: resp.status,
                body: snippet(&resp.body),
            });
        }
    }
}

fn decode(body: &str) -> Result<ApiResponse> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|_| EtlError::NonJson { body: snippet(body) })?;
    let resp = ApiResponse::from_json(value);
    debug!(status = ?resp.status, message = ?resp.message, "decoded explorer response");
    Ok(resp)
}

fn snippet(body: &str) -> String {
    body.chars().take(BODY_SNIPPET_CHARS).collect()
}
