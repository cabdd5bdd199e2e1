//! Observability subsystem.
//!
//! # Design Decisions
//! - Structured logging via `tracing` macros at call sites; installing a
//!   subscriber is the embedding application's job
//! - Metrics go through the `metrics` facade and are cheap atomic updates;
//!   they are advisory and never required for correctness
//! - An optional Prometheus exporter can be installed by applications that
//!   do not already run one

pub mod metrics;
