//! Advisory schema-cache refresh hint.
//!
//! An eventually-consistent backend may serve responses through a schema or
//! response cache that lags a just-completed write. Implementations of
//! [`SchemaCache`] give such a cache a nudge before verification starts.
//!
//! This is strictly best-effort: correctness belongs to the write verifier,
//! never to cache invalidation. A refresh that fails or does nothing must
//! not affect the caller.

use async_trait::async_trait;
use std::time::Duration;

/// Best-effort, non-blocking cache-refresh hint.
#[async_trait]
pub trait SchemaCache: Send + Sync {
    /// Attempt a refresh. Returns whether the hint was applied.
    ///
    /// Implementations must not return errors; a failed refresh is `false`.
    async fn refresh(&self) -> bool;
}

/// No-op implementation for environments without a refresh technique.
pub struct NoopSchemaCache;

#[async_trait]
impl SchemaCache for NoopSchemaCache {
    async fn refresh(&self) -> bool {
        false
    }
}

/// Refresh by waiting out a fixed settle window.
///
/// Useful where the cache expires on its own and no invalidation endpoint
/// exists: the hint simply gives the backend time to converge.
pub struct SettleDelayCache {
    settle: Duration,
}

impl SettleDelayCache {
    pub fn new(settle: Duration) -> Self {
        Self { settle }
    }
}

#[async_trait]
impl SchemaCache for SettleDelayCache {
    async fn refresh(&self) -> bool {
        tokio::time::sleep(self.settle).await;
        true
    }
}

/// Fire the refresh hint and log the outcome.
///
/// Never fails: callers proceed to verification regardless of the result.
pub async fn hint_refresh(cache: &dyn SchemaCache) -> bool {
    let applied = cache.refresh().await;
    if applied {
        tracing::debug!("schema cache refresh hint applied");
    } else {
        tracing::debug!("schema cache refresh hint skipped or failed");
    }
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_noop_refresh_returns_false() {
        let cache = NoopSchemaCache;
        assert!(!hint_refresh(&cache).await);
    }

    #[tokio::test]
    async fn test_settle_delay_waits_and_succeeds() {
        let cache = SettleDelayCache::new(Duration::from_millis(20));
        let start = Instant::now();
        assert!(hint_refresh(&cache).await);
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}
