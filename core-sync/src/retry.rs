//! Bounded retry for remote calls
//!
//! Every batched mutation and every page fetch of the catalog goes through
//! [`with_retry`]. Transient errors are retried until the attempt budget of the
//! policy is spent; any other error is returned at once.

use bridge_traits::error::Result;
use bridge_traits::http::RetryPolicy;
use std::future::Future;
use tracing::warn;

/// Run `call` until it succeeds, fails permanently, or the attempts run out.
///
/// The error of the last attempt is returned when the budget is exhausted.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_for(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Remote call failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_transient() {
                    warn!(operation, attempts = attempt, error = %e, "Retry budget exhausted");
                }
                return Err(e);
            }
        }
    }
}
