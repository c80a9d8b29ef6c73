//! In-memory implementations of the driver contracts.
//!
//! These are deterministic and test-friendly. Production deployments wire in
//! adapters for a real shared property service and object store; the
//! in-memory variants exist so the coordination kernel and facade can be
//! exercised without any external service.

use crate::error::{StoreError, StoreResult};
use crate::object::{BlobInfo, ObjectStore};
use crate::property::{AdvisoryLock, PropertyStore};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Mutex, RwLock};
use std::time::Duration;
use uuid::Uuid;

const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// In-memory property store.
#[derive(Default)]
pub struct InMemoryPropertyStore {
    values: RwLock<HashMap<String, String>>,
}

impl InMemoryPropertyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PropertyStore for InMemoryPropertyStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let guard = self
            .values
            .read()
            .map_err(|_| StoreError::Backend("property lock poisoned".to_string()))?;
        Ok(guard.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut guard = self
            .values
            .write()
            .map_err(|_| StoreError::Backend("property lock poisoned".to_string()))?;
        guard.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let mut guard = self
            .values
            .write()
            .map_err(|_| StoreError::Backend("property lock poisoned".to_string()))?;
        guard.remove(key);
        Ok(())
    }
}

/// In-memory advisory lock.
///
/// Acquisition polls a held flag; this mirrors the timed `tryLock` semantics
/// of real property services, where acquisition either succeeds within the
/// window or reports failure without partial state.
#[derive(Default)]
pub struct InMemoryAdvisoryLock {
    held: Mutex<bool>,
}

impl InMemoryAdvisoryLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AdvisoryLock for InMemoryAdvisoryLock {
    async fn try_acquire(&self, timeout: Duration) -> StoreResult<bool> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            {
                let mut held = self
                    .held
                    .lock()
                    .map_err(|_| StoreError::Backend("advisory lock poisoned".to_string()))?;
                if !*held {
                    *held = true;
                    return Ok(true);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn release(&self) -> StoreResult<()> {
        let mut held = self
            .held
            .lock()
            .map_err(|_| StoreError::Backend("advisory lock poisoned".to_string()))?;
        *held = false;
        Ok(())
    }
}

struct StoredBlob {
    info: BlobInfo,
    content: String,
}

/// In-memory object store.
///
/// Content is kept serialized so reads exercise the same parse path a real
/// backend would, and tests can inject corrupt bytes through [`put_raw`].
///
/// [`put_raw`]: InMemoryObjectStore::put_raw
#[derive(Default)]
pub struct InMemoryObjectStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store raw, possibly non-JSON bytes under `id`, replacing any existing
    /// blob. Test seam for corruption scenarios.
    pub fn put_raw(&self, id: &str, name: &str, raw: &str) -> StoreResult<()> {
        let mut guard = self
            .blobs
            .write()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        let now = Utc::now();
        guard.insert(
            id.to_string(),
            StoredBlob {
                info: BlobInfo {
                    id: id.to_string(),
                    name: name.to_string(),
                    folder: None,
                    created_at: now,
                    updated_at: now,
                },
                content: raw.to_string(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn create_blob(
        &self,
        name: &str,
        content: &Value,
        folder: Option<&str>,
    ) -> StoreResult<String> {
        let serialized = serde_json::to_string(content)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut guard = self
            .blobs
            .write()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        let id = format!("blob-{}", Uuid::new_v4());
        let now = Utc::now();
        guard.insert(
            id.clone(),
            StoredBlob {
                info: BlobInfo {
                    id: id.clone(),
                    name: name.to_string(),
                    folder: folder.map(str::to_string),
                    created_at: now,
                    updated_at: now,
                },
                content: serialized,
            },
        );
        Ok(id)
    }

    async fn read_blob(&self, id: &str) -> StoreResult<Value> {
        let guard = self
            .blobs
            .read()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        let blob = guard
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("blob {} not found", id)))?;
        serde_json::from_str(&blob.content)
            .map_err(|e| StoreError::Corrupt(format!("blob {} is not valid JSON: {}", id, e)))
    }

    async fn write_blob(&self, id: &str, content: &Value) -> StoreResult<()> {
        let serialized = serde_json::to_string(content)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        let mut guard = self
            .blobs
            .write()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        let blob = guard
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(format!("blob {} not found", id)))?;
        blob.content = serialized;
        blob.info.updated_at = Utc::now();
        Ok(())
    }

    async fn delete_blob(&self, id: &str) -> StoreResult<()> {
        let mut guard = self
            .blobs
            .write()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        guard
            .remove(id)
            .ok_or_else(|| StoreError::NotFound(format!("blob {} not found", id)))?;
        Ok(())
    }

    async fn list_blobs(&self, folder: Option<&str>) -> StoreResult<Vec<BlobInfo>> {
        let guard = self
            .blobs
            .read()
            .map_err(|_| StoreError::Backend("blob lock poisoned".to_string()))?;
        let mut infos = guard
            .values()
            .filter(|blob| match folder {
                Some(folder) => blob.info.folder.as_deref() == Some(folder),
                None => true,
            })
            .map(|blob| blob.info.clone())
            .collect::<Vec<_>>();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(infos)
    }
}
