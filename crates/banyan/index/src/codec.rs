//! Snapshot codec for the property-store value.
//!
//! Decoding splits "no property yet" from "parse failed": the former is the
//! normal first-open state, the latter is a corruption the caller must not
//! paper over.

use crate::error::{IndexError, IndexResult};
use crate::snapshot::RegistrySnapshot;
use chrono::Utc;

/// Outcome of decoding the configured property value.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRegistry {
    /// No value stored at the key.
    Empty,
    /// A well-formed snapshot.
    Snapshot(RegistrySnapshot),
}

/// Stateless encode/decode of [`RegistrySnapshot`] to the single string
/// value held in the property store.
pub struct RegistryCodec;

impl RegistryCodec {
    /// Serialize a snapshot, refreshing its `last_updated` stamp.
    pub fn encode(snapshot: &mut RegistrySnapshot) -> IndexResult<String> {
        snapshot.last_updated = Utc::now();
        serde_json::to_string(snapshot).map_err(|e| IndexError::save(e.to_string()))
    }

    /// Decode the raw property value. `None` and blank strings decode to
    /// [`DecodedRegistry::Empty`]; malformed JSON is a load failure.
    pub fn decode(raw: Option<&str>) -> IndexResult<DecodedRegistry> {
        let Some(raw) = raw else {
            return Ok(DecodedRegistry::Empty);
        };
        if raw.trim().is_empty() {
            return Ok(DecodedRegistry::Empty);
        }
        serde_json::from_str(raw)
            .map(DecodedRegistry::Snapshot)
            .map_err(|e| IndexError::load(format!("malformed registry snapshot: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{CollectionMetadata, LockLease};
    use std::time::Duration;

    #[test]
    fn absent_and_blank_values_decode_to_empty() {
        assert_eq!(RegistryCodec::decode(None).unwrap(), DecodedRegistry::Empty);
        assert_eq!(
            RegistryCodec::decode(Some("  ")).unwrap(),
            DecodedRegistry::Empty
        );
    }

    #[test]
    fn malformed_value_is_a_load_failure() {
        let result = RegistryCodec::decode(Some("{broken"));
        assert!(matches!(
            result,
            Err(IndexError::Persistence { op: "load", .. })
        ));
    }

    #[test]
    fn round_trip_preserves_snapshot() {
        let mut snapshot = RegistrySnapshot::empty(1);
        let mut meta = CollectionMetadata::new("users", Some("blob-1".to_string())).unwrap();
        meta.set_document_count(3);
        meta.set_lock_status(Some(LockLease::new("op-1", Duration::from_secs(30))));
        snapshot.collections.insert("users".to_string(), meta);
        snapshot.record_history(
            "users",
            "ADD_COLLECTION",
            serde_json::json!({"fileId": "blob-1"}),
            100,
        );

        // encode refreshes last_updated in place, so the encoded form and
        // the in-memory snapshot agree.
        let encoded = RegistryCodec::encode(&mut snapshot).unwrap();
        match RegistryCodec::decode(Some(&encoded)).unwrap() {
            DecodedRegistry::Snapshot(decoded) => assert_eq!(decoded, snapshot),
            DecodedRegistry::Empty => panic!("expected a snapshot"),
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn round_trip_any_well_formed_snapshot(
                names in prop::collection::btree_set("[a-z]{1,12}", 0..8),
                counts in prop::collection::vec(0u64..10_000, 8),
            ) {
                let mut snapshot = RegistrySnapshot::empty(1);
                for (i, name) in names.iter().enumerate() {
                    let mut meta =
                        CollectionMetadata::new(name.clone(), Some(format!("blob-{i}"))).unwrap();
                    meta.set_document_count(counts[i]);
                    snapshot.collections.insert(name.clone(), meta);
                    snapshot.record_history(
                        name,
                        "ADD_COLLECTION",
                        serde_json::json!({"i": i}),
                        100,
                    );
                }

                let encoded = RegistryCodec::encode(&mut snapshot).unwrap();
                let decoded = RegistryCodec::decode(Some(&encoded)).unwrap();
                prop_assert_eq!(decoded, DecodedRegistry::Snapshot(snapshot));
            }
        }
    }
}
