//! Shared property store contract.
//!
//! The property store holds exactly one load-bearing value per database: the
//! serialized master-index snapshot. Every process connected to the same key
//! observes the same value, and the accompanying advisory lock is the single
//! cross-process serialisation point for writes to it.

use crate::error::StoreResult;
use async_trait::async_trait;
use std::time::Duration;

/// Atomic string-valued key-value storage shared across processes.
#[async_trait]
pub trait PropertyStore: Send + Sync {
    /// Read the value at `key`, if any.
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Atomically replace the value at `key`.
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Delete the value at `key`. Deleting an absent key is a no-op.
    async fn delete(&self, key: &str) -> StoreResult<()>;
}

/// Process-wide advisory mutual exclusion supplied by the property store.
///
/// Acquisition is cooperative: holders are expected to release promptly, and
/// nothing prevents a non-cooperating process from ignoring the lock.
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Attempt to become the single holder, waiting up to `timeout`.
    ///
    /// Returns `Ok(false)` when the window elapses without acquisition;
    /// errors are reserved for backend failures.
    async fn try_acquire(&self, timeout: Duration) -> StoreResult<bool>;

    /// Release a previously acquired hold. Idempotent.
    async fn release(&self) -> StoreResult<()>;
}
