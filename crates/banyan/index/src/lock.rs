//! The coarse lock serialising all registry writes.

use crate::error::{IndexError, IndexResult};
use banyan_store::AdvisoryLock;
use std::sync::Arc;
use std::time::Duration;

/// Wrapper over the property store's advisory lock.
///
/// Every state-mutating master-index operation runs inside
/// `acquire -> mutate -> release`, with release taken on all exit paths.
#[derive(Clone)]
pub struct CoarseLock {
    inner: Arc<dyn AdvisoryLock>,
}

impl CoarseLock {
    pub fn new(inner: Arc<dyn AdvisoryLock>) -> Self {
        Self { inner }
    }

    /// Become the single holder or fail.
    ///
    /// A driver-level `false` maps to [`IndexError::LockTimeout`]; driver
    /// errors surface as `lock_acquisition` persistence failures.
    pub async fn acquire(&self, timeout: Duration) -> IndexResult<()> {
        let acquired = self
            .inner
            .try_acquire(timeout)
            .await
            .map_err(|e| IndexError::lock_acquisition(e.to_string()))?;
        if acquired {
            Ok(())
        } else {
            Err(IndexError::LockTimeout(format!(
                "coarse lock not acquired within {}ms",
                timeout.as_millis()
            )))
        }
    }

    /// Release the lock. Failures are logged, not propagated: release runs
    /// in cleanup position where the operation's own result must win.
    pub async fn release(&self) {
        if let Err(error) = self.inner.release().await {
            tracing::warn!(%error, "coarse lock release failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use banyan_store::InMemoryAdvisoryLock;

    #[tokio::test]
    async fn acquire_then_release_allows_reacquisition() {
        let lock = CoarseLock::new(Arc::new(InMemoryAdvisoryLock::new()));
        lock.acquire(Duration::from_millis(50)).await.unwrap();
        lock.release().await;
        lock.acquire(Duration::from_millis(50)).await.unwrap();
        lock.release().await;
    }

    #[tokio::test]
    async fn contended_acquire_times_out() {
        let advisory = Arc::new(InMemoryAdvisoryLock::new());
        let lock = CoarseLock::new(advisory.clone());
        let other = CoarseLock::new(advisory);

        lock.acquire(Duration::from_millis(50)).await.unwrap();
        let result = other.acquire(Duration::from_millis(30)).await;
        assert!(matches!(result, Err(IndexError::LockTimeout(_))));

        lock.release().await;
    }
}
