//! Object store contract.
//!
//! Blobs are whole JSON documents: writes replace the entire blob atomically
//! and reads parse the stored bytes, surfacing parse failures as
//! [`StoreError::Corrupt`](crate::StoreError::Corrupt) so callers can
//! distinguish corruption from absence.

use crate::error::StoreResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Descriptor for a stored blob.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobInfo {
    pub id: String,
    pub name: String,
    pub folder: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Whole-blob JSON storage organised into folders.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Create a new blob and return its opaque identifier.
    async fn create_blob(
        &self,
        name: &str,
        content: &Value,
        folder: Option<&str>,
    ) -> StoreResult<String>;

    /// Read and parse a blob.
    async fn read_blob(&self, id: &str) -> StoreResult<Value>;

    /// Atomically replace a blob's content.
    async fn write_blob(&self, id: &str, content: &Value) -> StoreResult<()>;

    /// Delete a blob.
    async fn delete_blob(&self, id: &str) -> StoreResult<()>;

    /// List blobs, optionally restricted to one folder.
    async fn list_blobs(&self, folder: Option<&str>) -> StoreResult<Vec<BlobInfo>>;
}
