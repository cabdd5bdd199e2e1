//! Configuration for the resilience primitives.
//!
//! # Design Decisions
//! - Config structs are plain serde data; the application owns loading
//!   (file, env, remote) and hands validated structs to each component
//! - All fields have defaults so a minimal config deserializes cleanly
//! - Validation separates syntactic (serde) from semantic checks

pub mod schema;
pub mod validation;

pub use schema::{
    BackoffStrategy, CircuitBreakerConfig, QueueConfig, ResilienceConfig, RetryConfig,
    VerifyConfig,
};
pub use validation::ValidationError;
