use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{info, warn};

use crate::error::MirrorError;

/// Attempt budget for one page fetch
pub const MAX_ATTEMPTS: u32 = 5;

/// Sleep applied when a 429 carries no usable X-RateLimit-Reset header
const FALLBACK_SLEEP: Duration = Duration::from_secs(60);

/// Classified outcome of a single fetch attempt
pub enum Attempt<T> {
    Ok(T),
    TransportError(String),
    RateLimited { reset: Option<String> },
    BadStatus(u16),
}

/// Bounded retry policy for calls against rate-limited registry APIs
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    /// Run `op` until it succeeds or the attempt budget is spent. A 429
    /// sleeps before consuming its attempt; everything else retries
    /// immediately. Exhaustion is terminal for the caller.
    pub async fn execute<T, F, Fut>(&self, url: &str, mut op: F) -> Result<T, MirrorError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Attempt<T>>,
    {
        let mut last_reason = String::from("no attempts made");

        for _ in 0..self.max_attempts {
            match op().await {
                Attempt::Ok(value) => return Ok(value),
                Attempt::TransportError(reason) => {
                    warn!("Failed to get {url}, retrying: {reason}");
                    last_reason = reason;
                }
                Attempt::RateLimited { reset } => {
                    let sleep = sleep_duration(reset.as_deref(), Utc::now());
                    info!("Rate limited on {url}, sleeping for {sleep:?}");
                    tokio::time::sleep(sleep).await;
                    last_reason = "rate limited (HTTP 429)".to_string();
                }
                Attempt::BadStatus(code) => {
                    warn!("Get {url} failed with {code}, retrying");
                    last_reason = format!("HTTP status {code}");
                }
            }
        }

        Err(MirrorError::RetriesExhausted {
            url: url.to_string(),
            attempts: self.max_attempts,
            reason: last_reason,
        })
    }
}

/// Duration until the X-RateLimit-Reset epoch, clamped to >= 0. Falls back
/// to 60 seconds when the header is missing or unparseable.
pub fn sleep_duration(rate_limit_reset: Option<&str>, now: DateTime<Utc>) -> Duration {
    let Some(raw) = rate_limit_reset else {
        return FALLBACK_SLEEP;
    };
    let Ok(epoch) = raw.trim().parse::<i64>() else {
        return FALLBACK_SLEEP;
    };

    let seconds = epoch - now.timestamp();
    if seconds <= 0 {
        Duration::ZERO
    } else {
        Duration::from_secs(seconds as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_sleep_duration_from_future_reset() {
        let now = Utc::now();
        let reset = (now.timestamp() + 30).to_string();
        assert_eq!(
            sleep_duration(Some(&reset), now),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn test_sleep_duration_past_reset_is_zero() {
        let now = Utc::now();
        let reset = (now.timestamp() - 100).to_string();
        assert_eq!(sleep_duration(Some(&reset), now), Duration::ZERO);
    }

    #[test]
    fn test_sleep_duration_missing_header_falls_back() {
        assert_eq!(sleep_duration(None, Utc::now()), Duration::from_secs(60));
    }

    #[test]
    fn test_sleep_duration_garbage_header_falls_back() {
        assert_eq!(
            sleep_duration(Some("soon"), Utc::now()),
            Duration::from_secs(60)
        );
    }

    #[tokio::test]
    async fn test_transport_errors_exhaust_after_five_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result: Result<(), _> = policy
            .execute("http://example.invalid/tags", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::TransportError("connection refused".to_string()) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 5);
        let err = result.unwrap_err();
        assert!(err.to_string().contains("after 5 attempts"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[tokio::test]
    async fn test_bad_status_exhausts_without_decoding() {
        let policy = RetryPolicy::default();
        let result: Result<(), _> = policy
            .execute("http://example.invalid/tags", || async {
                Attempt::BadStatus(503)
            })
            .await;
        assert!(result.unwrap_err().to_string().contains("HTTP status 503"));
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::default();

        let result = policy
            .execute("http://example.invalid/tags", || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        Attempt::TransportError("timeout".to_string())
                    } else {
                        Attempt::Ok(42)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
