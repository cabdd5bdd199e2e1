//! Resilience primitives for eventually consistent backing stores

pub mod circuit;
pub mod config;
pub mod lifecycle;
pub mod observability;
pub mod queue;
pub mod retry;
pub mod store;
pub mod verify;

pub use circuit::{CircuitBreaker, CircuitError, CircuitSnapshot, CircuitState};
pub use config::schema::ResilienceConfig;
pub use lifecycle::Shutdown;
pub use queue::{Processor, QueueItem, QueueStats, RetryQueue};
pub use retry::{retry, RetryError};
pub use store::{ErrorClass, FailureClass, StoreError};
pub use verify::{verify_write, Verified, VerifyError};
