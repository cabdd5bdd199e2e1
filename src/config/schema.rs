//! Configuration schema definitions.
//!
//! This module defines the configuration structure for every resilience
//! primitive. All types derive Serde traits for deserialization from
//! whatever source the embedding application uses.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration covering all resilience primitives.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Bounded-retry settings.
    pub retry: RetryConfig,

    /// Circuit breaker settings.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Write verification (write-then-poll) settings.
    pub verify: VerifyConfig,

    /// Background retry queue settings.
    pub queue: QueueConfig,
}

/// Delay strategy applied between retry attempts.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// Sleep exactly `delay_ms` between attempts.
    #[default]
    Fixed,
    /// Double the delay each attempt, capped at `max_delay_ms`, with jitter.
    Exponential { max_delay_ms: u64 },
}

/// Bounded-retry configuration. Immutable per call.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first). Must be >= 1.
    pub max_attempts: u32,

    /// Delay between failed attempts in milliseconds.
    pub delay_ms: u64,

    /// Backoff strategy applied to `delay_ms`.
    pub backoff: BackoffStrategy,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 200,
            backoff: BackoffStrategy::Fixed,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// Time the circuit stays open before allowing a probe, in milliseconds.
    pub reset_timeout_ms: u64,
}

impl CircuitBreakerConfig {
    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            reset_timeout_ms: 30_000,
        }
    }
}

/// Write verification polling configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct VerifyConfig {
    /// Maximum number of read polls. Must be >= 1.
    pub max_attempts: u32,

    /// Sleep between polls in milliseconds.
    pub interval_ms: u64,
}

impl VerifyConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }
}

impl Default for VerifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval_ms: 300,
        }
    }
}

/// Background retry queue configuration.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct QueueConfig {
    /// Maximum items processed simultaneously.
    pub concurrency: usize,

    /// Total processing attempts per item before dead-lettering.
    pub max_retries: u32,

    /// Delay before a failed item is requeued, in milliseconds.
    pub retry_delay_ms: u64,
}

impl QueueConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            max_retries: 3,
            retry_delay_ms: 500,
        }
    }
}
