//! In-memory collection handles.

use crate::error::DbResult;
use banyan_index::CollectionMetadata;
use banyan_store::ObjectStore;
use serde_json::Value;
use std::sync::Arc;

/// Handle to one collection: its registry metadata plus the blob holding
/// its documents.
///
/// Document-level queries and updates belong to the layer above; the handle
/// carries what that layer needs to reach the blob and coordinate through
/// the master index.
#[derive(Clone)]
pub struct Collection {
    name: String,
    file_id: String,
    metadata: CollectionMetadata,
    objects: Arc<dyn ObjectStore>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("name", &self.name)
            .field("file_id", &self.file_id)
            .field("document_count", &self.metadata.document_count())
            .finish()
    }
}

impl Collection {
    pub(crate) fn new(
        name: &str,
        file_id: &str,
        metadata: CollectionMetadata,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            name: name.to_string(),
            file_id: file_id.to_string(),
            metadata,
            objects,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Object-store identifier of the collection's blob.
    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    /// Registry metadata as of when this handle was hydrated.
    pub fn metadata(&self) -> &CollectionMetadata {
        &self.metadata
    }

    pub fn document_count(&self) -> u64 {
        self.metadata.document_count()
    }

    /// Read the collection's raw blob content.
    pub async fn read_contents(&self) -> DbResult<Value> {
        Ok(self.objects.read_blob(&self.file_id).await?)
    }
}
