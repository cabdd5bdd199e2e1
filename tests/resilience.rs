//! End-to-end tests for the retry, circuit breaker, and verification flows.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backstop::config::{CircuitBreakerConfig, RetryConfig, VerifyConfig};
use backstop::{retry, verify_write, CircuitBreaker, CircuitError, CircuitState, RetryError, StoreError};

mod common;

fn fast_retry(max_attempts: u32) -> RetryConfig {
    RetryConfig {
        max_attempts,
        delay_ms: 1,
        ..RetryConfig::default()
    }
}

#[tokio::test]
async fn test_retry_recovers_after_transient_failures() {
    common::init_logging();
    let (op, calls) = common::flaky_op(2);

    let result = retry(&fast_retry(3), op).await;

    assert_eq!(result.unwrap(), "done");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_retry_does_not_waste_budget_on_permanent_errors() {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();

    let result: Result<(), _> = retry(&fast_retry(5), move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(StoreError::PermissionDenied("not yours".into())))
    })
    .await;

    match result {
        Err(RetryError::Aborted { attempts, source }) => {
            assert_eq!(attempts, 1);
            assert!(matches!(source, StoreError::PermissionDenied(_)));
        }
        other => panic!("expected abort, got {other:?}"),
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_circuit_opens_then_recovers_through_half_open() {
    let breaker: CircuitBreaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 2,
        reset_timeout_ms: 50,
    });

    for _ in 0..2 {
        let r: Result<(), _> = breaker
            .execute(|| std::future::ready(Err(StoreError::Unavailable("down".into()))))
            .await;
        assert!(r.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Rejected without invoking the operation while open.
    let r: Result<(), CircuitError<StoreError>> = breaker
        .execute(|| std::future::ready(Ok(())))
        .await;
    assert!(matches!(r, Err(CircuitError::Open { .. })));

    tokio::time::sleep(Duration::from_millis(60)).await;

    // First call after the reset timeout runs as the half-open probe.
    let r: Result<&str, CircuitError<StoreError>> = breaker
        .execute(|| std::future::ready(Ok("back")))
        .await;
    assert_eq!(r.unwrap(), "back");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(breaker.failure_count(), 0);
}

#[tokio::test]
async fn test_open_circuit_reports_remaining_cooldown() {
    let breaker: CircuitBreaker = CircuitBreaker::new(CircuitBreakerConfig {
        failure_threshold: 1,
        reset_timeout_ms: 30_000,
    });

    let _: Result<(), _> = breaker
        .execute(|| std::future::ready(Err(StoreError::Timeout(5))))
        .await;

    match breaker
        .execute(|| std::future::ready(Ok::<_, StoreError>(())))
        .await
    {
        Err(CircuitError::Open { retry_in_ms }) => {
            assert!(retry_in_ms > 0 && retry_in_ms <= 30_000);
        }
        other => panic!("expected open rejection, got {other:?}"),
    }
}

#[tokio::test]
async fn test_write_then_verify_converges() {
    // A write that needs one retry, then a read that lags two polls behind.
    let (op, _) = common::flaky_op(1);
    let written = retry(&fast_retry(3), op).await.unwrap();
    assert_eq!(written, "done");

    let reads = Arc::new(AtomicU32::new(0));
    let counter = reads.clone();
    let config = VerifyConfig {
        max_attempts: 5,
        interval_ms: 1,
    };

    let verified = verify_write(
        &config,
        move || {
            let n = counter.fetch_add(1, Ordering::SeqCst);
            std::future::ready(Ok::<_, StoreError>(if n < 2 { "stale" } else { "done" }))
        },
        |value| *value == "done",
    )
    .await
    .unwrap();

    assert_eq!(verified.value, "done");
    assert_eq!(verified.attempts, 3);
}

#[tokio::test]
async fn test_verify_times_out_when_value_never_appears() {
    let config = VerifyConfig {
        max_attempts: 3,
        interval_ms: 1,
    };

    let result = verify_write(
        &config,
        || std::future::ready(Ok::<_, StoreError>("stale")),
        |value| *value == "fresh",
    )
    .await;

    match result {
        Err(backstop::VerifyError::Timeout {
            attempts,
            last_read_error,
        }) => {
            assert_eq!(attempts, 3);
            assert!(last_read_error.is_none());
        }
        other => panic!("expected timeout, got {other:?}"),
    }
}
