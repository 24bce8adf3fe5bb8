//! Retry with exponential back-off and jitter for provider calls.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (network failures, 5xx). Non-transient errors —
//! including [`ProviderError::QuotaExceeded`] — are returned immediately to
//! protect the per-account call budget.

use std::future::Future;
use std::time::Duration;

use crate::error::ProviderError;

/// Returns `true` for errors worth retrying after a back-off delay.
///
/// **Retriable:** network-level failures (timeout, connection reset) and
/// HTTP 5xx responses.
///
/// **Not retriable:** [`ProviderError::QuotaExceeded`] (hard stop),
/// [`ProviderError::Api`] (application-level, retrying won't fix it),
/// [`ProviderError::Deserialize`] (malformed response).
pub(crate) fn is_retriable(err: &ProviderError) -> bool {
    match err {
        ProviderError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        ProviderError::Api(_)
        | ProviderError::QuotaExceeded(_)
        | ProviderError::Deserialize { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// The wait before the n-th retry is `backoff_base_ms * 2^(n-1)` ± 25 %
/// jitter, capped at 60 s. Non-retriable errors return immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    const MAX_DELAY_MS: u64 = 60_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "transient provider error — retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
