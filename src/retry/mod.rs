//! Bounded retry for fallible async operations.
//!
//! # Responsibilities
//! - Invoke an operation up to `max_attempts` times
//! - Sleep the configured backoff between failed attempts
//! - Surface exhaustion distinctly from a single immediate failure
//!
//! # Design Decisions
//! - Stateless: nothing survives between separate `retry()` calls
//! - Permanent failures short-circuit instead of burning the budget
//! - The returned future is an ordinary future; dropping it cancels the
//!   loop at the next await point

pub mod backoff;

use crate::config::schema::RetryConfig;
use crate::observability::metrics;
use crate::store::ErrorClass;
use std::future::Future;
use thiserror::Error;

/// Terminal outcome of a failed retry loop.
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Every attempt failed; wraps the last underlying failure.
    #[error("operation failed after {attempts} attempts: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// A permanent failure made further attempts pointless.
    #[error("operation aborted on permanent failure at attempt {attempts}: {source}")]
    Aborted {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts actually made.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Exhausted { attempts, .. } | RetryError::Aborted { attempts, .. } => {
                *attempts
            }
        }
    }

    /// Unwrap the underlying store failure.
    pub fn into_source(self) -> E {
        match self {
            RetryError::Exhausted { source, .. } | RetryError::Aborted { source, .. } => source,
        }
    }
}

/// Run `operation` with bounded retries and backoff.
///
/// The operation is invoked up to `config.max_attempts` times. Success at
/// any attempt returns immediately. Transient failures sleep the configured
/// backoff before the next attempt; permanent failures abort at once.
///
/// # Errors
///
/// [`RetryError::Exhausted`] when the budget runs out, wrapping the last
/// failure, or [`RetryError::Aborted`] on the first permanent failure.
pub async fn retry<T, E, F, Fut>(config: &RetryConfig, mut operation: F) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: ErrorClass + std::error::Error + 'static,
{
    // A zero budget would mean never running the operation at all.
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::debug!(attempt, "operation succeeded after retry");
                }
                metrics::record_retry_outcome("success");
                return Ok(value);
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(attempt, error = %e, "permanent failure, not retrying");
                metrics::record_retry_outcome("aborted");
                return Err(RetryError::Aborted {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                if attempt >= max_attempts {
                    tracing::warn!(attempts = attempt, error = %e, "retry budget exhausted");
                    metrics::record_retry_outcome("exhausted");
                    return Err(RetryError::Exhausted {
                        attempts: attempt,
                        source: e,
                    });
                }

                let delay = backoff::delay_for_attempt(config, attempt);
                tracing::debug!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "transient failure, backing off"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
