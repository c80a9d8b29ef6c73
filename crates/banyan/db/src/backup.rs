//! Registry backup blobs.
//!
//! A backup is a trimmed projection of the registry written to the object
//! store: enough to re-register every collection after the property value
//! is lost or corrupted, nothing more. Lock leases, tokens, and history are
//! deliberately not carried — they describe in-flight coordination, not
//! durable state.

use crate::error::{DbError, DbResult};
use banyan_index::CollectionMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

fn default_backup_version() -> u32 {
    1
}

/// Backup blob shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistryBackup {
    #[serde(default = "default_backup_version")]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    pub collections: BTreeMap<String, BackupCollection>,
}

/// One collection entry inside a backup. Every field except the document
/// count is optional so that minimal, hand-repaired backups still recover.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupCollection {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub file_id: Option<String>,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_updated: Option<DateTime<Utc>>,
    #[serde(default)]
    pub document_count: u64,
}

impl RegistryBackup {
    /// Project the current registry state into a backup.
    pub fn from_collections(collections: &BTreeMap<String, CollectionMetadata>) -> Self {
        let entries = collections
            .iter()
            .map(|(name, meta)| {
                (
                    name.clone(),
                    BackupCollection {
                        name: Some(meta.name().to_string()),
                        file_id: meta.file_id().map(str::to_string),
                        created: Some(meta.created()),
                        last_updated: Some(meta.last_updated()),
                        document_count: meta.document_count(),
                    },
                )
            })
            .collect();
        Self {
            version: default_backup_version(),
            last_updated: Utc::now(),
            collections: entries,
        }
    }

    /// Validate and decode a backup blob read from the object store.
    pub(crate) fn parse(raw: &Value) -> DbResult<Self> {
        if !raw
            .get("collections")
            .map(Value::is_object)
            .unwrap_or(false)
        {
            return Err(DbError::CorruptedIndex(
                "backup blob is missing its collections mapping".to_string(),
            ));
        }
        serde_json::from_value(raw.clone()).map_err(|e| {
            DbError::CorruptedIndex(format!("backup blob is structurally invalid: {}", e))
        })
    }
}

impl BackupCollection {
    /// Rebuild registry metadata from this backup entry. The registry key
    /// wins over any embedded name; a fresh modification token is issued
    /// because the old one tagged a state that no longer exists.
    pub(crate) fn to_metadata(&self, key: &str) -> DbResult<CollectionMetadata> {
        let mut meta = CollectionMetadata::new(key, self.file_id.clone())?;
        meta.set_document_count(self.document_count);
        if let Some(created) = self.created {
            meta.set_created(created);
        }
        if let Some(last_updated) = self.last_updated {
            meta.set_last_updated(last_updated);
        }
        Ok(meta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn minimal_backup_entries_parse() {
        let raw = json!({
            "collections": {
                "c1": {"fileId": "F1", "documentCount": 4},
                "c2": {"fileId": "F2", "documentCount": 7}
            }
        });
        let backup = RegistryBackup::parse(&raw).unwrap();
        assert_eq!(backup.version, 1);
        assert_eq!(backup.collections.len(), 2);
        assert_eq!(backup.collections["c1"].file_id.as_deref(), Some("F1"));
        assert_eq!(backup.collections["c2"].document_count, 7);
    }

    #[test]
    fn backup_without_collections_mapping_is_corrupt() {
        for raw in [json!({}), json!({"collections": 5}), json!({"collections": null})] {
            assert!(matches!(
                RegistryBackup::parse(&raw),
                Err(DbError::CorruptedIndex(_))
            ));
        }
    }

    #[test]
    fn round_trip_through_registry_metadata() {
        let meta = CollectionMetadata::new("users", Some("blob-1".to_string())).unwrap();
        let mut collections = BTreeMap::new();
        collections.insert("users".to_string(), meta.clone());

        let backup = RegistryBackup::from_collections(&collections);
        let rebuilt = backup.collections["users"].to_metadata("users").unwrap();
        assert_eq!(rebuilt.name(), "users");
        assert_eq!(rebuilt.file_id(), Some("blob-1"));
        assert_eq!(rebuilt.created(), meta.created());
        // Tokens are reissued on recovery.
        assert_ne!(rebuilt.modification_token(), meta.modification_token());
    }

    #[test]
    fn entry_key_wins_over_embedded_name() {
        let raw = json!({
            "collections": {"actual": {"name": "stale", "documentCount": 1}}
        });
        let backup = RegistryBackup::parse(&raw).unwrap();
        let rebuilt = backup.collections["actual"].to_metadata("actual").unwrap();
        assert_eq!(rebuilt.name(), "actual");
    }
}
