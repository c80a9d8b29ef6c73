//! The persisted registry snapshot.

use crate::metadata::CollectionMetadata;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// One bounded-history record of a registry mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub operation: String,
    pub timestamp: DateTime<Utc>,
    pub data: Value,
}

/// The complete registry state for one database, persisted as a single
/// property-store value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub version: u32,
    #[serde(default = "Utc::now")]
    pub last_updated: DateTime<Utc>,
    #[serde(default)]
    pub collections: BTreeMap<String, CollectionMetadata>,
    #[serde(default)]
    pub modification_history: BTreeMap<String, Vec<HistoryEntry>>,
}

impl RegistrySnapshot {
    /// A fresh snapshot with no collections.
    pub fn empty(version: u32) -> Self {
        Self {
            version,
            last_updated: Utc::now(),
            collections: BTreeMap::new(),
            modification_history: BTreeMap::new(),
        }
    }

    /// Append a history entry for `collection`, keeping at most `limit`
    /// entries (newest retained). Entries with an empty collection name are
    /// dropped silently; history must never fail a write.
    pub fn record_history(&mut self, collection: &str, operation: &str, data: Value, limit: usize) {
        let collection = collection.trim();
        if collection.is_empty() {
            tracing::debug!("dropping history entry without a collection name");
            return;
        }
        let entries = self
            .modification_history
            .entry(collection.to_string())
            .or_default();
        entries.push(HistoryEntry {
            operation: operation.trim().to_string(),
            timestamp: Utc::now(),
            data,
        });
        if entries.len() > limit {
            let excess = entries.len() - limit;
            entries.drain(..excess);
        }
    }

    /// Repair structural drift after decoding a snapshot written by an
    /// older or foreign writer: registry keys stay authoritative over the
    /// names embedded in their metadata. Decoded history is preserved.
    pub fn repair(&mut self) {
        let mismatched: Vec<String> = self
            .collections
            .iter()
            .filter(|(key, meta)| key.as_str() != meta.name())
            .map(|(key, _)| key.clone())
            .collect();
        for key in mismatched {
            if let Some(meta) = self.collections.get(&key) {
                tracing::warn!(
                    collection = %key,
                    embedded = %meta.name(),
                    "repairing collection metadata name to match registry key"
                );
                let rebound = meta.with_name(&key);
                self.collections.insert(key, rebound);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn history_is_bounded_newest_last() {
        let mut snapshot = RegistrySnapshot::empty(1);
        for i in 0..10 {
            snapshot.record_history("users", "UPDATE_METADATA", json!({"i": i}), 4);
        }
        let entries = &snapshot.modification_history["users"];
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[0].data, json!({"i": 6}));
        assert_eq!(entries[3].data, json!({"i": 9}));
    }

    #[test]
    fn history_drops_empty_collection_names() {
        let mut snapshot = RegistrySnapshot::empty(1);
        snapshot.record_history("", "ADD_COLLECTION", json!({}), 100);
        snapshot.record_history("  ", "ADD_COLLECTION", json!({}), 100);
        assert!(snapshot.modification_history.is_empty());
    }

    #[test]
    fn repair_rebinds_mismatched_names() {
        let mut snapshot = RegistrySnapshot::empty(1);
        let meta = crate::CollectionMetadata::new("other", None).unwrap();
        snapshot.collections.insert("users".to_string(), meta);

        snapshot.repair();
        assert_eq!(snapshot.collections["users"].name(), "users");
    }

    #[test]
    fn decode_fills_missing_maps() {
        let decoded: RegistrySnapshot =
            serde_json::from_str(r#"{"version": 1, "lastUpdated": "2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(decoded.collections.is_empty());
        assert!(decoded.modification_history.is_empty());
    }
}
