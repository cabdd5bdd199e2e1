//! Bounded-concurrency priority retry queue.
//!
//! # Responsibilities
//! - Accept prioritized work items and process them in the background
//! - Keep at most `concurrency` items in flight at once
//! - Requeue failed items after a delay, up to `max_retries` attempts
//! - Dead-letter exhausted items exactly once via the registered hook
//!
//! # Ordering
//! Strictly descending by priority; equal priorities preserve insertion
//! order among items that are simultaneously ready. An item requeued after
//! a delayed failure competes with whatever has arrived in the meantime,
//! so no global FIFO guarantee survives a retry cycle.
//!
//! # Design Decisions
//! - Item state is mutated only by the queue's own worker tasks
//! - `pause()`/`resume()` gate dispatch without aborting in-flight items
//! - Dropping or closing the queue stops the dispatcher and abandons
//!   pending delayed requeues cooperatively; in-flight items finish
//! - Terminal item failure is reported only through the dead-letter hook,
//!   never back to the enqueuer. A queue built without a hook logs every
//!   drop loudly, because that work is otherwise invisible.

use crate::config::schema::QueueConfig;
use crate::lifecycle::Shutdown;
use crate::observability::metrics;
use crate::store::{ErrorClass, StoreError};
use async_trait::async_trait;
use serde::Serialize;
use std::cmp::Ordering as CmpOrdering;
use std::collections::BinaryHeap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Notify;
use uuid::Uuid;

/// Caller-supplied handler for queued work.
#[async_trait]
pub trait Processor<T>: Send + Sync {
    /// Process one item. An `Err` counts against the item's retry budget.
    async fn process(&self, item: &QueueItem<T>) -> Result<(), StoreError>;
}

/// Hook invoked exactly once when an item exhausts its retry budget.
pub type DeadLetterHook<T> = Arc<dyn Fn(&StoreError, &QueueItem<T>) + Send + Sync>;

/// A unit of queued work. Mutated only by the queue's worker tasks.
#[derive(Debug, Clone)]
pub struct QueueItem<T> {
    pub id: Uuid,
    pub payload: T,
    pub priority: i32,
    /// Completed processing attempts.
    pub attempts: u32,
    pub max_retries: u32,
    pub created_at: Instant,
}

/// Saturation snapshot, the caller's backpressure signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    /// Items ready to run plus items waiting out a retry delay.
    pub queued_items: usize,
    /// Items currently being processed.
    pub processing_items: usize,
    pub paused: bool,
}

/// Heap entry: priority first, then arrival order for stability.
struct Ready<T> {
    seq: u64,
    item: QueueItem<T>,
}

impl<T> PartialEq for Ready<T> {
    fn eq(&self, other: &Self) -> bool {
        self.item.priority == other.item.priority && self.seq == other.seq
    }
}

impl<T> Eq for Ready<T> {}

impl<T> PartialOrd for Ready<T> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Ready<T> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // Max-heap: higher priority wins, then the earlier sequence number.
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct Shared<T> {
    config: QueueConfig,
    ready: Mutex<BinaryHeap<Ready<T>>>,
    seq: AtomicU64,
    /// Items sleeping out a retry delay before reinsertion.
    delayed: AtomicUsize,
    in_flight: AtomicUsize,
    paused: AtomicBool,
    wake: Notify,
    processor: Arc<dyn Processor<T>>,
    on_dead_letter: Option<DeadLetterHook<T>>,
    shutdown: Shutdown,
}

/// Priority queue with per-item retry and dead-lettering.
pub struct RetryQueue<T> {
    shared: Arc<Shared<T>>,
}

impl<T: Send + Sync + 'static> RetryQueue<T> {
    /// Create a queue without a dead-letter hook.
    ///
    /// Items that exhaust their retries are dropped with only an error log;
    /// prefer [`RetryQueue::with_dead_letter`] anywhere dropped work matters.
    pub fn new(config: QueueConfig, processor: Arc<dyn Processor<T>>) -> Self {
        tracing::warn!(
            "retry queue has no dead-letter hook; exhausted items will be dropped invisibly"
        );
        Self::build(config, processor, None)
    }

    /// Create a queue that reports exhausted items to `hook` exactly once.
    pub fn with_dead_letter(
        config: QueueConfig,
        processor: Arc<dyn Processor<T>>,
        hook: DeadLetterHook<T>,
    ) -> Self {
        Self::build(config, processor, Some(hook))
    }

    fn build(
        config: QueueConfig,
        processor: Arc<dyn Processor<T>>,
        on_dead_letter: Option<DeadLetterHook<T>>,
    ) -> Self {
        let shared = Arc::new(Shared {
            config,
            ready: Mutex::new(BinaryHeap::new()),
            seq: AtomicU64::new(0),
            delayed: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            paused: AtomicBool::new(false),
            wake: Notify::new(),
            processor,
            on_dead_letter,
            shutdown: Shutdown::new(),
        });
        Self::spawn_dispatcher(shared.clone());
        Self { shared }
    }

    /// Add an item. Returns its id for correlation with the dead-letter hook.
    pub fn enqueue(&self, payload: T, priority: i32) -> Uuid {
        let item = QueueItem {
            id: Uuid::new_v4(),
            payload,
            priority,
            attempts: 0,
            max_retries: self.shared.config.max_retries,
            created_at: Instant::now(),
        };
        let id = item.id;
        tracing::debug!(item_id = %id, priority, "item enqueued");
        Self::push_ready(&self.shared, item);
        Self::publish_depth(&self.shared);
        self.shared.wake.notify_one();
        id
    }

    /// Stop pulling new work. In-flight items run to completion.
    pub fn pause(&self) {
        self.shared.paused.store(true, Ordering::SeqCst);
        tracing::debug!("queue paused");
    }

    /// Resume pulling work.
    pub fn resume(&self) {
        self.shared.paused.store(false, Ordering::SeqCst);
        tracing::debug!("queue resumed");
        self.shared.wake.notify_one();
    }

    /// Current saturation snapshot.
    pub fn stats(&self) -> QueueStats {
        let ready = self.lock_ready().len();
        QueueStats {
            queued_items: ready + self.shared.delayed.load(Ordering::SeqCst),
            processing_items: self.shared.in_flight.load(Ordering::SeqCst),
            paused: self.shared.paused.load(Ordering::SeqCst),
        }
    }

    /// Stop the dispatcher and abandon pending delayed requeues.
    ///
    /// In-flight items are not aborted. Also triggered on drop.
    pub fn close(&self) {
        self.shared.shutdown.trigger();
    }

    fn lock_ready(&self) -> std::sync::MutexGuard<'_, BinaryHeap<Ready<T>>> {
        self.shared.ready.lock().expect("queue mutex poisoned")
    }

    fn spawn_dispatcher(shared: Arc<Shared<T>>) {
        let mut rx = shared.shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                Self::dispatch_ready(&shared);
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = rx.recv() => {
                        tracing::debug!("queue dispatcher stopping");
                        break;
                    }
                }
            }
        });
    }

    /// Fill free slots with the highest-priority ready items.
    ///
    /// Only the dispatcher task increments `in_flight`, so the slot check
    /// does not race with itself.
    fn dispatch_ready(shared: &Arc<Shared<T>>) {
        let concurrency = shared.config.concurrency.max(1);
        loop {
            if shared.paused.load(Ordering::SeqCst) {
                break;
            }
            if shared.in_flight.load(Ordering::SeqCst) >= concurrency {
                break;
            }
            // Claim the slot before popping so the item is never invisible
            // to stats() between heap and in-flight accounting.
            shared.in_flight.fetch_add(1, Ordering::SeqCst);
            let next = shared.ready.lock().expect("queue mutex poisoned").pop();
            let Some(ready) = next else {
                shared.in_flight.fetch_sub(1, Ordering::SeqCst);
                break;
            };
            Self::spawn_process(shared.clone(), ready.item);
        }
        Self::publish_depth(shared);
    }

    fn spawn_process(shared: Arc<Shared<T>>, mut item: QueueItem<T>) {
        tokio::spawn(async move {
            match shared.processor.process(&item).await {
                Ok(()) => {
                    tracing::debug!(
                        item_id = %item.id,
                        attempts = item.attempts,
                        "queue item processed"
                    );
                }
                Err(e) => {
                    item.attempts += 1;
                    let retryable = e.is_retryable();
                    if retryable && item.attempts < item.max_retries {
                        tracing::debug!(
                            item_id = %item.id,
                            attempt = item.attempts,
                            error = %e,
                            "queue item failed, scheduling delayed requeue"
                        );
                        Self::schedule_requeue(shared.clone(), item);
                    } else {
                        Self::dead_letter(&shared, e, &item);
                    }
                }
            }
            shared.in_flight.fetch_sub(1, Ordering::SeqCst);
            Self::publish_depth(&shared);
            shared.wake.notify_one();
        });
    }

    /// Reinsert an item after the retry delay, unless shutdown wins.
    fn schedule_requeue(shared: Arc<Shared<T>>, item: QueueItem<T>) {
        shared.delayed.fetch_add(1, Ordering::SeqCst);
        let mut rx = shared.shutdown.subscribe();
        tokio::spawn(async move {
            // Subscribing after trigger would miss the broadcast.
            if shared.shutdown.is_triggered() {
                shared.delayed.fetch_sub(1, Ordering::SeqCst);
                return;
            }
            tokio::select! {
                _ = tokio::time::sleep(shared.config.retry_delay()) => {
                    // Reinsert before dropping the delayed count so the item
                    // is never invisible to stats().
                    Self::push_ready(&shared, item);
                    shared.delayed.fetch_sub(1, Ordering::SeqCst);
                    shared.wake.notify_one();
                }
                _ = rx.recv() => {
                    shared.delayed.fetch_sub(1, Ordering::SeqCst);
                }
            }
        });
    }

    fn dead_letter(shared: &Arc<Shared<T>>, error: StoreError, item: &QueueItem<T>) {
        tracing::warn!(
            item_id = %item.id,
            attempts = item.attempts,
            error = %error,
            "queue item dead-lettered"
        );
        metrics::record_dead_letter();
        match &shared.on_dead_letter {
            Some(hook) => hook(&error, item),
            None => tracing::error!(
                item_id = %item.id,
                "dead-lettered item dropped: no dead-letter hook registered"
            ),
        }
    }

    fn push_ready(shared: &Arc<Shared<T>>, item: QueueItem<T>) {
        let seq = shared.seq.fetch_add(1, Ordering::SeqCst);
        shared
            .ready
            .lock()
            .expect("queue mutex poisoned")
            .push(Ready { seq, item });
    }

    fn publish_depth(shared: &Arc<Shared<T>>) {
        let ready = shared.ready.lock().expect("queue mutex poisoned").len();
        metrics::record_queue_depth(
            ready + shared.delayed.load(Ordering::SeqCst),
            shared.in_flight.load(Ordering::SeqCst),
        );
    }
}

impl<T> Drop for RetryQueue<T> {
    fn drop(&mut self) {
        self.shared.shutdown.trigger();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn item(priority: i32) -> QueueItem<&'static str> {
        QueueItem {
            id: Uuid::new_v4(),
            payload: "x",
            priority,
            attempts: 0,
            max_retries: 3,
            created_at: Instant::now(),
        }
    }

    #[test]
    fn test_heap_orders_by_priority_then_arrival() {
        let mut heap = BinaryHeap::new();
        heap.push(Ready { seq: 0, item: item(1) });
        heap.push(Ready { seq: 1, item: item(5) });
        heap.push(Ready { seq: 2, item: item(3) });
        heap.push(Ready { seq: 3, item: item(5) });

        let order: Vec<(i32, u64)> = std::iter::from_fn(|| heap.pop())
            .map(|r| (r.item.priority, r.seq))
            .collect();

        // Descending priority; the two priority-5 items keep insertion order.
        assert_eq!(order, vec![(5, 1), (5, 3), (3, 2), (1, 0)]);
    }

    struct Recording {
        order: Mutex<Vec<i32>>,
    }

    #[async_trait]
    impl Processor<i32> for Recording {
        async fn process(&self, item: &QueueItem<i32>) -> Result<(), StoreError> {
            self.order.lock().unwrap().push(item.payload);
            Ok(())
        }
    }

    async fn wait_settled(queue: &RetryQueue<i32>) -> QueueStats {
        for _ in 0..400 {
            let stats = queue.stats();
            if stats.queued_items == 0 && stats.processing_items == 0 {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("queue did not settle: {:?}", queue.stats());
    }

    #[tokio::test]
    async fn test_pause_gates_dispatch_and_resume_drains() {
        let processor = Arc::new(Recording {
            order: Mutex::new(Vec::new()),
        });
        let queue = RetryQueue::new(
            QueueConfig {
                concurrency: 1,
                max_retries: 1,
                retry_delay_ms: 10,
            },
            processor.clone(),
        );

        queue.pause();
        queue.enqueue(10, 0);
        queue.enqueue(20, 0);

        tokio::time::sleep(Duration::from_millis(30)).await;
        let stats = queue.stats();
        assert_eq!(stats.queued_items, 2);
        assert_eq!(stats.processing_items, 0);
        assert!(stats.paused);

        queue.resume();
        let stats = wait_settled(&queue).await;
        assert!(!stats.paused);
        assert_eq!(*processor.order.lock().unwrap(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_closed_queue_stops_pulling_work() {
        let processor = Arc::new(Recording {
            order: Mutex::new(Vec::new()),
        });
        let queue = RetryQueue::new(QueueConfig::default(), processor.clone());

        queue.close();
        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.enqueue(1, 0);
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(processor.order.lock().unwrap().is_empty());
    }
}
