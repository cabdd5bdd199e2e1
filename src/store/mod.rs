//! Persistence-boundary types.
//!
//! # Responsibilities
//! - Define the typed error taxonomy produced at the remote-store boundary
//! - Classify failures as transient (retryable) or permanent (not)
//! - Expose the advisory schema-cache refresh interface
//!
//! # Design Decisions
//! - Classification happens once, here, as a structured kind; downstream
//!   code matches on `FailureClass`, never on message substrings
//! - The store call itself stays opaque: orchestration components accept
//!   caller-supplied async closures, not a concrete client

pub mod cache;

use serde::Serialize;
use thiserror::Error;

/// Whether a failure is worth retrying.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    /// Network/timeout-class failure; a later attempt may succeed.
    Transient,
    /// Validation/permission-class failure; retrying cannot help.
    Permanent,
}

/// Classification hook consumed by the retry loop.
///
/// Implemented by [`StoreError`]; callers with their own error types
/// implement it to opt into permanent-failure short-circuiting.
pub trait ErrorClass {
    /// Structured failure kind for this error.
    fn failure_class(&self) -> FailureClass;

    /// Convenience predicate for retry loops.
    fn is_retryable(&self) -> bool {
        self.failure_class() == FailureClass::Transient
    }
}

/// Errors surfaced by the remote persistence client.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Backend unreachable or returned a transport-level failure.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Call exceeded its deadline.
    #[error("store call timed out after {0} ms")]
    Timeout(u64),

    /// Backend shed load; retry after backoff.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// A read returned a view known to lag the latest write.
    #[error("stale read: {0}")]
    StaleRead(String),

    /// Caller lacks permission for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// Payload rejected by backend validation.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Target row/entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Write conflicted with a concurrent mutation.
    #[error("conflict: {0}")]
    Conflict(String),
}

impl ErrorClass for StoreError {
    fn failure_class(&self) -> FailureClass {
        match self {
            StoreError::Unavailable(_)
            | StoreError::Timeout(_)
            | StoreError::RateLimited(_)
            | StoreError::StaleRead(_) => FailureClass::Transient,
            StoreError::PermissionDenied(_)
            | StoreError::Validation(_)
            | StoreError::NotFound(_)
            | StoreError::Conflict(_) => FailureClass::Permanent,
        }
    }
}

/// Result type for store-boundary operations.
pub type StoreResult<T> = Result<T, StoreError>;
