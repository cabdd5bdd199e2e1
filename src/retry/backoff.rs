//! Backoff delay calculation.

use crate::config::schema::{BackoffStrategy, RetryConfig};
use rand::Rng;
use std::time::Duration;

/// Delay to sleep after `failed_attempts` attempts have failed (1-based).
pub fn delay_for_attempt(config: &RetryConfig, failed_attempts: u32) -> Duration {
    match config.backoff {
        BackoffStrategy::Fixed => Duration::from_millis(config.delay_ms),
        BackoffStrategy::Exponential { max_delay_ms } => {
            exponential(failed_attempts, config.delay_ms, max_delay_ms)
        }
    }
}

/// Exponential backoff with jitter: `base * 2^(attempt-1)`, capped at `max_ms`.
fn exponential(attempt: u32, base_ms: u64, max_ms: u64) -> Duration {
    if attempt == 0 {
        return Duration::from_millis(0);
    }

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    // Up to 10% jitter keeps concurrent callers from retrying in lockstep.
    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay + jitter)
}
