//! Shared utilities for integration tests.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use backstop::queue::{Processor, QueueItem, QueueStats, RetryQueue};
use backstop::StoreError;

/// Install a test subscriber once, honoring `RUST_LOG`.
#[allow(dead_code)]
pub fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Operation that fails with `Unavailable` a fixed number of times, then
/// succeeds. Returns the closure plus the shared invocation counter.
#[allow(dead_code)]
pub fn flaky_op(
    failures: u32,
) -> (
    impl FnMut() -> std::future::Ready<Result<&'static str, StoreError>>,
    Arc<AtomicU32>,
) {
    let calls = Arc::new(AtomicU32::new(0));
    let counter = calls.clone();
    let op = move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        if n < failures {
            std::future::ready(Err(StoreError::Unavailable("injected".into())))
        } else {
            std::future::ready(Ok("done"))
        }
    };
    (op, calls)
}

/// Processor that records payloads in completion order and fails the
/// payloads listed in `failing` on every attempt.
#[allow(dead_code)]
pub struct RecordingProcessor {
    pub order: Mutex<Vec<&'static str>>,
    pub failing: Vec<&'static str>,
    pub calls: AtomicU32,
}

#[allow(dead_code)]
impl RecordingProcessor {
    pub fn new() -> Arc<Self> {
        Self::failing_on(Vec::new())
    }

    pub fn failing_on(failing: Vec<&'static str>) -> Arc<Self> {
        Arc::new(Self {
            order: Mutex::new(Vec::new()),
            failing,
            calls: AtomicU32::new(0),
        })
    }

    pub fn completed(&self) -> Vec<&'static str> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl Processor<&'static str> for RecordingProcessor {
    async fn process(&self, item: &QueueItem<&'static str>) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.contains(&item.payload) {
            return Err(StoreError::Unavailable("injected".into()));
        }
        self.order.lock().unwrap().push(item.payload);
        Ok(())
    }
}

/// Poll until the queue is idle, panicking if it never settles.
#[allow(dead_code)]
pub async fn wait_settled(queue: &RetryQueue<&'static str>) -> QueueStats {
    for _ in 0..600 {
        let stats = queue.stats();
        if stats.queued_items == 0 && stats.processing_items == 0 {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("queue did not settle: {:?}", queue.stats());
}
