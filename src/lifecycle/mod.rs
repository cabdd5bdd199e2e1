//! Lifecycle coordination for background work.
//!
//! The retry queue runs detached tasks (the dispatcher, delayed requeues).
//! This module provides the broadcast-based coordinator those tasks watch
//! so that closing a queue, or shutting the application down, stops them
//! cooperatively instead of leaking them.

pub mod shutdown;

pub use shutdown::Shutdown;
