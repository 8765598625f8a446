//! Observability: request metrics and tracing hooks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Counters for the request pipeline, shared by every clone of a client.
#[derive(Debug, Default)]
pub struct Metrics {
    requests: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
    reauthentications: AtomicU64,
    latency_us: AtomicU64,
}

impl Metrics {
    /// Creates zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    fn finish(&self, outcome: &AtomicU64, elapsed: Duration) {
        outcome.fetch_add(1, Ordering::Relaxed);
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.latency_us.fetch_add(micros, Ordering::Relaxed);
    }

    /// Counts a re-authentication that installed a new token future.
    pub fn record_reauthentication(&self) {
        self.reauthentications.fetch_add(1, Ordering::Relaxed);
    }

    /// Re-authentications so far. Coalesced callers are not counted.
    pub fn reauthentications(&self) -> u64 {
        self.reauthentications.load(Ordering::Relaxed)
    }

    /// Reads every counter.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let finished = self.succeeded.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        MetricsSnapshot {
            requests: self.requests.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            reauthentications: self.reauthentications(),
            average_latency: match finished {
                0 => Duration::ZERO,
                n => Duration::from_micros(self.latency_us.load(Ordering::Relaxed) / n),
            },
        }
    }
}

/// Point-in-time copy of [`Metrics`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Exchanges started.
    pub requests: u64,
    /// Exchanges answered with 2xx.
    pub succeeded: u64,
    /// Everything else, including 401s answered by re-authenticating.
    pub failed: u64,
    /// Re-authentications installed.
    pub reauthentications: u64,
    /// Mean latency of finished exchanges.
    pub average_latency: Duration,
}

/// Times one exchange and reports its outcome to [`Metrics`].
pub struct RequestTimer {
    start: Instant,
    metrics: Arc<Metrics>,
}

impl RequestTimer {
    /// Counts the exchange as started.
    pub fn new(metrics: Arc<Metrics>) -> Self {
        metrics.requests.fetch_add(1, Ordering::Relaxed);
        Self {
            start: Instant::now(),
            metrics,
        }
    }

    /// Reports a 2xx.
    pub fn success(self) {
        self.metrics.finish(&self.metrics.succeeded, self.start.elapsed());
    }

    /// Reports any other outcome.
    pub fn failure(self) {
        self.metrics.finish(&self.metrics.failed, self.start.elapsed());
    }

    /// Time since the exchange started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// Tracing hooks for Platform API operations.
pub struct TracingHooks;

impl TracingHooks {
    /// Logs the start of an API request.
    pub fn on_request_start(method: &str, url: &str, attempt: u32) {
        debug!(
            method = %method,
            url = %url,
            attempt = attempt,
            "Platform API request started"
        );
    }

    /// Logs the completion of an API request.
    pub fn on_request_complete(method: &str, url: &str, status: u16, duration: Duration) {
        info!(
            method = %method,
            url = %url,
            status = status,
            duration_ms = duration.as_millis() as u64,
            "Platform API request completed"
        );
    }

    /// Logs a request error.
    pub fn on_request_error(method: &str, url: &str, error: &str) {
        error!(
            method = %method,
            url = %url,
            error = %error,
            "Platform API request failed"
        );
    }

    /// Logs an error body that claimed to be JSON but was not.
    pub fn on_malformed_error_body(url: &str, status: u16, error: &str) {
        warn!(
            url = %url,
            status = status,
            error = %error,
            "Could not parse JSON error body"
        );
    }

    /// Logs local token expiry detection.
    pub fn on_token_expired(expires: i64, attempt: u32) {
        info!(expires = expires, attempt = attempt, "Token expiration detected");
    }

    /// Logs a forced re-authentication request.
    pub fn on_reauthenticate(reason: &str, attempt: u32, installed: bool) {
        warn!(
            reason = %reason,
            attempt = attempt,
            coalesced = !installed,
            "Re-authenticating"
        );
    }

    /// Logs authentication token refresh.
    pub fn on_auth_token_refresh(forced: bool) {
        info!(forced = forced, "Authentication token refreshed");
    }
}

/// Query parameters whose values never reach the logs.
pub const SENSITIVE_QUERY_PARAMS: &[&str] = &["access_token", "api_token"];

/// Redacts sensitive query parameter values in a URL before logging it.
pub fn redact_url(url: &str) -> String {
    let Some((base, query)) = url.split_once('?') else {
        return url.to_string();
    };
    let pairs: Vec<String> = query
        .split('&')
        .map(|pair| match pair.split_once('=') {
            Some((key, _)) if SENSITIVE_QUERY_PARAMS.contains(&key) => {
                format!("{}=[REDACTED]", key)
            }
            _ => pair.to_string(),
        })
        .collect();
    format!("{}?{}", base, pairs.join("&"))
}
