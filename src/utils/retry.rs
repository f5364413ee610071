// Retry logic for the remote message API
// Author: wiredFRONT contributors

use backoff::{backoff::Backoff, ExponentialBackoff};
use std::time::Duration;
use tracing::debug;

/// Parse a `Retry-After` header value given in seconds.
/// Capped at 60 seconds.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    let seconds: f64 = value.trim().parse().ok()?;
    if seconds < 0.0 {
        return None;
    }
    let capped = seconds.min(60.0);
    Some(Duration::from_millis((capped * 1000.0) as u64))
}

/// Create exponential backoff configuration for retries
pub fn create_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        current_interval: Duration::from_millis(250),
        initial_interval: Duration::from_millis(250),
        randomization_factor: 0.3,
        multiplier: 2.0,
        max_interval: Duration::from_secs(10),
        max_elapsed_time: Some(Duration::from_secs(60)),
        ..Default::default()
    }
}

/// Determine if an HTTP status code is retryable
pub fn is_retryable(status: u16) -> bool {
    matches!(status, 408 | 429 | 500 | 502 | 503 | 504)
}

/// A failed attempt: HTTP status (0 for transport errors), body and an
/// optional server-provided delay.
#[derive(Debug, Clone)]
pub struct AttemptError {
    pub status: u16,
    pub body: String,
    pub retry_after: Option<Duration>,
}

/// Execute an operation, retrying transient failures.
/// - Honours the server's `Retry-After` when present
/// - Falls back to exponential backoff
/// - Gives up after `max_attempts`
pub async fn with_retry<F, Fut, T>(
    operation_name: &str,
    max_attempts: u32,
    mut operation: F,
) -> Result<T, AttemptError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, AttemptError>>,
{
    let mut backoff = create_backoff();
    let mut attempt = 0;
    let max_attempts = max_attempts.max(1);

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!("{} succeeded on attempt {}", operation_name, attempt);
                }
                return Ok(result);
            }
            Err(err) => {
                let transient = err.status == 0 || is_retryable(err.status);
                if !transient || attempt >= max_attempts {
                    return Err(err);
                }

                let delay = match err.retry_after {
                    Some(hint) => hint,
                    None => backoff.next_backoff().unwrap_or(Duration::from_secs(10)),
                };
                debug!(
                    "{} failed with {} (attempt {}), retrying after {}ms",
                    operation_name,
                    err.status,
                    attempt,
                    delay.as_millis()
                );

                tokio::time::sleep(delay).await;
            }
        }
    }
}
