//! Circuit breaker for a degraded persistence backend.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: backend assumed down, calls fail fast
//! - Half-Open: testing if the backend recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failure_count >= failure_threshold
//! Open → Half-Open: next execute() after reset_timeout elapses
//! Half-Open → Closed: probe call succeeds (failure_count reset to 0)
//! Half-Open → Open: probe call fails (failure_count incremented)
//! ```
//!
//! # Design Decisions
//! - One breaker instance per guarded dependency, injected by the caller
//! - Fail fast in Open with a distinct error so callers can tell
//!   "dependency known-bad" from "this one call failed"
//! - Single probe in Half-Open; concurrent calls fail fast meanwhile
//! - A probe whose future is dropped mid-flight releases its slot, so the
//!   next execute() can probe again
//! - State lives behind one mutex, never held across an await

use crate::config::schema::CircuitBreakerConfig;
use crate::observability::metrics;
use serde::Serialize;
use std::future::Future;
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;

/// Circuit state, observable via [`CircuitBreaker::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// Error returned by [`CircuitBreaker::execute`].
#[derive(Debug, Error)]
pub enum CircuitError<E>
where
    E: std::error::Error + 'static,
{
    /// The circuit is open; the operation was not invoked.
    #[error("circuit open, next probe allowed in {retry_in_ms} ms")]
    Open { retry_in_ms: u64 },

    /// The operation ran and failed; wraps the underlying error.
    #[error(transparent)]
    Inner(E),
}

/// Point-in-time view of breaker state, for dashboards and tests.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    /// Milliseconds until the next probe is allowed, when open.
    pub retry_in_ms: Option<u64>,
}

#[derive(Debug)]
struct BreakerInner {
    state: CircuitState,
    failure_count: u32,
    last_failure: Option<Instant>,
    probe_in_flight: bool,
}

/// Releases the half-open probe slot if the probe future is dropped before
/// its outcome is recorded. Disarmed once record_success/record_failure
/// takes over.
struct ProbeGuard<'a> {
    breaker: &'a CircuitBreaker,
    armed: bool,
}

impl Drop for ProbeGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.breaker.lock();
        if inner.state == CircuitState::HalfOpen {
            inner.probe_in_flight = false;
            tracing::debug!("half-open probe abandoned, probe slot released");
        }
    }
}

/// Failure-rate tracker that fails fast while a dependency is degraded.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerInner>,
    on_open: Option<Box<dyn Fn(u32) + Send + Sync>>,
}

impl CircuitBreaker {
    /// Create a breaker in the Closed state.
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                failure_count: 0,
                last_failure: None,
                probe_in_flight: false,
            }),
            on_open: None,
        }
    }

    /// Register an alerting hook, invoked exactly once per Closed→Open
    /// transition with the failure count that tripped the circuit.
    pub fn on_open(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_open = Some(Box::new(hook));
        self
    }

    /// Run `operation` through the breaker.
    ///
    /// While open, fails immediately with [`CircuitError::Open`] without
    /// invoking the operation. The first call after `reset_timeout_ms` is
    /// let through as a half-open probe.
    pub async fn execute<T, E, F, Fut>(&self, operation: F) -> Result<T, CircuitError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + 'static,
    {
        let is_probe = match self.preflight() {
            Ok(is_probe) => is_probe,
            Err(retry_in_ms) => {
                metrics::record_circuit_rejection();
                return Err(CircuitError::Open { retry_in_ms });
            }
        };
        let mut guard = ProbeGuard {
            breaker: self,
            armed: is_probe,
        };

        match operation().await {
            Ok(value) => {
                guard.armed = false;
                self.record_success();
                Ok(value)
            }
            Err(e) => {
                guard.armed = false;
                self.record_failure();
                Err(CircuitError::Inner(e))
            }
        }
    }

    /// Current state. Time-based Open→Half-Open movement happens only on
    /// the next `execute()`, so this reports Open until a probe runs.
    pub fn state(&self) -> CircuitState {
        self.lock().state
    }

    /// Consecutive failure count.
    pub fn failure_count(&self) -> u32 {
        self.lock().failure_count
    }

    /// Snapshot of state, failure count, and time to next probe.
    pub fn snapshot(&self) -> CircuitSnapshot {
        let inner = self.lock();
        let retry_in_ms = match inner.state {
            CircuitState::Open => {
                let elapsed = inner.last_failure.map(|t| t.elapsed()).unwrap_or_default();
                Some(
                    self.config
                        .reset_timeout()
                        .saturating_sub(elapsed)
                        .as_millis() as u64,
                )
            }
            _ => None,
        };
        CircuitSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            retry_in_ms,
        }
    }

    /// Force Closed with a zero failure count. Also clears a probe that was
    /// abandoned mid-flight. Intended for test harnesses and manual recovery.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.state = CircuitState::Closed;
        inner.failure_count = 0;
        inner.last_failure = None;
        inner.probe_in_flight = false;
        tracing::debug!("circuit manually reset");
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BreakerInner> {
        self.inner.lock().expect("circuit breaker mutex poisoned")
    }

    /// Admission check. `Ok(true)` means this call runs as the half-open
    /// probe; `Err` carries milliseconds until the next probe.
    fn preflight(&self) -> Result<bool, u64> {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::Closed => Ok(false),
            CircuitState::Open => {
                let elapsed = inner.last_failure.map(|t| t.elapsed()).unwrap_or_default();
                let reset = self.config.reset_timeout();
                if elapsed >= reset {
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    tracing::info!("circuit half-open, allowing probe");
                    metrics::record_circuit_transition("half_open");
                    Ok(true)
                } else {
                    Err(reset.saturating_sub(elapsed).as_millis() as u64)
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    // Single trial: the in-flight probe decides the outcome.
                    Err(0)
                } else {
                    inner.probe_in_flight = true;
                    Ok(true)
                }
            }
        }
    }

    fn record_success(&self) {
        let mut inner = self.lock();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.last_failure = None;
                inner.probe_in_flight = false;
                tracing::info!("probe succeeded, circuit closed");
                metrics::record_circuit_transition("closed");
            }
            CircuitState::Closed => {
                // Threshold counts consecutive failures.
                inner.failure_count = 0;
            }
            CircuitState::Open => {}
        }
    }

    fn record_failure(&self) {
        let tripped = {
            let mut inner = self.lock();
            inner.failure_count += 1;
            inner.last_failure = Some(Instant::now());
            match inner.state {
                CircuitState::Closed
                    if inner.failure_count >= self.config.failure_threshold =>
                {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        failures = inner.failure_count,
                        reset_timeout_ms = self.config.reset_timeout_ms,
                        "failure threshold reached, circuit opened"
                    );
                    metrics::record_circuit_transition("open");
                    Some(inner.failure_count)
                }
                CircuitState::HalfOpen => {
                    inner.state = CircuitState::Open;
                    inner.probe_in_flight = false;
                    tracing::warn!("probe failed, circuit re-opened");
                    metrics::record_circuit_transition("open");
                    None
                }
                _ => None,
            }
        };

        // Hook runs outside the lock; it may call back into the breaker.
        if let Some(count) = tripped {
            if let Some(hook) = &self.on_open {
                hook(count);
            }
        }
    }
}
