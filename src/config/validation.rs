//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempt counts >= 1, concurrency >= 1)
//!
//! # Design Decisions
//! - Returns all validation errors, not just the first
//! - Validation is a pure function: ResilienceConfig -> Result<(), Vec<ValidationError>>
//! - Runs before a config is handed to any component

use crate::config::schema::{BackoffStrategy, ResilienceConfig};
use thiserror::Error;

/// A single semantic problem found in a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    /// Human-readable description of the constraint.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Validate a full resilience config, collecting every violation.
pub fn validate(config: &ResilienceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.retry.max_attempts == 0 {
        errors.push(ValidationError::new(
            "retry.max_attempts",
            "must be at least 1",
        ));
    }
    if let BackoffStrategy::Exponential { max_delay_ms } = config.retry.backoff {
        if max_delay_ms < config.retry.delay_ms {
            errors.push(ValidationError::new(
                "retry.backoff.max_delay_ms",
                "must be >= retry.delay_ms",
            ));
        }
    }

    if config.circuit_breaker.failure_threshold == 0 {
        errors.push(ValidationError::new(
            "circuit_breaker.failure_threshold",
            "must be at least 1",
        ));
    }

    if config.verify.max_attempts == 0 {
        errors.push(ValidationError::new(
            "verify.max_attempts",
            "must be at least 1",
        ));
    }

    if config.queue.concurrency == 0 {
        errors.push(ValidationError::new(
            "queue.concurrency",
            "must be at least 1",
        ));
    }
    if config.queue.max_retries == 0 {
        errors.push(ValidationError::new(
            "queue.max_retries",
            "must be at least 1",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
