//! Write-then-poll consistency verification.
//!
//! The caller performs a mutation once, outside this module, then asks
//! [`verify_write`] to confirm the write is externally observable: the
//! supplied read is polled until a predicate over its result holds. An
//! eventually-consistent backend (replica lag, response/schema caching) may
//! return a stale view immediately after a write; this loop turns "the call
//! returned OK" into "I have observed my own write".
//!
//! # Design Decisions
//! - Never reports success without having observed the predicate true, and
//!   never silently treats exhaustion as success
//! - A failed read counts as an unverified attempt; the backend may be
//!   unreachable for the same transient reason the write is not yet visible
//! - Permanent read failures (permission, validation) abort the poll early
//!
//! # Known limitation
//! Concurrent verifications of the same logical key do not share in-flight
//! state; each caller polls independently.

use crate::config::schema::VerifyConfig;
use crate::observability::metrics;
use crate::store::ErrorClass;
use std::future::Future;
use thiserror::Error;

/// Successful verification: the first observed value satisfying the
/// predicate, plus how many polls it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Verified<T> {
    pub value: T,
    pub attempts: u32,
}

/// Failure outcome of [`verify_write`].
#[derive(Debug, Error)]
pub enum VerifyError<E>
where
    E: std::error::Error + 'static,
{
    /// The predicate never held within the polling budget.
    #[error("verification timed out after {attempts} attempts")]
    Timeout {
        attempts: u32,
        /// Last transient read failure, if the final polls could not read.
        last_read_error: Option<E>,
    },

    /// A permanent read failure made further polling pointless.
    #[error("verification read failed permanently at attempt {attempts}: {source}")]
    ReadFailed {
        attempts: u32,
        #[source]
        source: E,
    },
}

/// Poll `read` until `predicate` accepts its result.
///
/// Performs up to `config.max_attempts` reads, sleeping `config.interval_ms`
/// between attempts. Returns the first accepted value and the poll count.
///
/// # Errors
///
/// [`VerifyError::Timeout`] when the budget is exhausted with the predicate
/// never true, or [`VerifyError::ReadFailed`] on a permanent read error.
pub async fn verify_write<T, E, F, Fut, P>(
    config: &VerifyConfig,
    mut read: F,
    mut predicate: P,
) -> Result<Verified<T>, VerifyError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: FnMut(&T) -> bool,
    E: ErrorClass + std::error::Error + 'static,
{
    let max_attempts = config.max_attempts.max(1);
    let mut last_read_error = None;

    for attempt in 1..=max_attempts {
        match read().await {
            Ok(value) => {
                if predicate(&value) {
                    tracing::debug!(attempt, "write verified");
                    metrics::record_verify_outcome("verified");
                    return Ok(Verified {
                        value,
                        attempts: attempt,
                    });
                }
                tracing::debug!(attempt, "observed stale view, polling again");
                last_read_error = None;
            }
            Err(e) if !e.is_retryable() => {
                tracing::warn!(attempt, error = %e, "permanent read failure during verification");
                metrics::record_verify_outcome("read_failed");
                return Err(VerifyError::ReadFailed {
                    attempts: attempt,
                    source: e,
                });
            }
            Err(e) => {
                tracing::debug!(attempt, error = %e, "read failed, counting as unverified attempt");
                last_read_error = Some(e);
            }
        }

        if attempt < max_attempts {
            tokio::time::sleep(config.interval()).await;
        }
    }

    tracing::warn!(
        attempts = max_attempts,
        interval_ms = config.interval_ms,
        "verification timed out, write not observed"
    );
    metrics::record_verify_outcome("timeout");
    Err(VerifyError::Timeout {
        attempts: max_attempts,
        last_read_error,
    })
}
