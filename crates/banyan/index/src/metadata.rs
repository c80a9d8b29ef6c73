//! Per-collection registry metadata.

use crate::error::{IndexError, IndexResult};
use crate::token::generate_modification_token;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Time-bounded, best-effort per-collection exclusion marker.
///
/// A lease is only observed by cooperating clients; the data layer does not
/// enforce it. Expiry is pure wall-clock comparison, no heartbeat.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockLease {
    is_locked: bool,
    locked_by: String,
    locked_at: DateTime<Utc>,
    /// Lease duration in milliseconds.
    lock_timeout: u64,
}

impl LockLease {
    /// Create a live lease held by `locked_by` for `timeout`.
    pub fn new(locked_by: impl Into<String>, timeout: Duration) -> Self {
        Self {
            is_locked: true,
            locked_by: locked_by.into(),
            locked_at: Utc::now(),
            lock_timeout: timeout.as_millis() as u64,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.is_locked
    }

    pub fn locked_by(&self) -> &str {
        &self.locked_by
    }

    pub fn locked_at(&self) -> DateTime<Utc> {
        self.locked_at
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout)
    }

    /// A lease is expired once `now` reaches `locked_at + lock_timeout`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        let deadline = self.locked_at + ChronoDuration::milliseconds(self.lock_timeout as i64);
        now >= deadline
    }
}

/// Registry entry describing one collection.
///
/// The name is the entry's identity and never changes after construction;
/// rebinding under a different registry key goes through [`with_name`],
/// which copies.
///
/// [`with_name`]: CollectionMetadata::with_name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionMetadata {
    name: String,
    #[serde(default)]
    file_id: Option<String>,
    created: DateTime<Utc>,
    last_updated: DateTime<Utc>,
    #[serde(default)]
    document_count: u64,
    modification_token: String,
    #[serde(default)]
    lock_status: Option<LockLease>,
    /// Caller-supplied fields outside the recognised set, kept verbatim.
    #[serde(flatten)]
    extras: Map<String, Value>,
}

impl CollectionMetadata {
    /// Create metadata for a fresh collection.
    pub fn new(name: impl Into<String>, file_id: Option<String>) -> IndexResult<Self> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }
        let now = Utc::now();
        Ok(Self {
            name,
            file_id,
            created: now,
            last_updated: now,
            document_count: 0,
            modification_token: generate_modification_token(),
            lock_status: None,
            extras: Map::new(),
        })
    }

    /// Copy with the name rebound. Used by the master index to keep the
    /// registry key authoritative when callers register metadata carrying a
    /// different name.
    pub fn with_name(&self, name: &str) -> Self {
        let mut copy = self.clone();
        copy.name = name.to_string();
        copy
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn file_id(&self) -> Option<&str> {
        self.file_id.as_deref()
    }

    pub fn created(&self) -> DateTime<Utc> {
        self.created
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn document_count(&self) -> u64 {
        self.document_count
    }

    pub fn modification_token(&self) -> &str {
        &self.modification_token
    }

    pub fn lock_status(&self) -> Option<&LockLease> {
        self.lock_status.as_ref()
    }

    pub fn extra(&self, key: &str) -> Option<&Value> {
        self.extras.get(key)
    }

    pub fn set_file_id(&mut self, file_id: Option<String>) {
        self.file_id = file_id;
    }

    pub fn set_created(&mut self, created: DateTime<Utc>) {
        self.created = created;
    }

    pub fn set_last_updated(&mut self, last_updated: DateTime<Utc>) {
        self.last_updated = last_updated;
    }

    pub fn set_document_count(&mut self, count: u64) {
        self.document_count = count;
    }

    pub fn set_modification_token(&mut self, token: impl Into<String>) {
        self.modification_token = token.into();
    }

    pub fn set_lock_status(&mut self, lease: Option<LockLease>) {
        self.lock_status = lease;
    }

    pub fn set_extra(&mut self, key: impl Into<String>, value: Value) {
        self.extras.insert(key.into(), value);
    }

    /// Refresh `last_updated` to now.
    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_refuses_empty_name() {
        assert!(CollectionMetadata::new("", None).is_err());
        assert!(CollectionMetadata::new("   ", None).is_err());
    }

    #[test]
    fn new_starts_with_valid_token_and_zero_documents() {
        let meta = CollectionMetadata::new("users", Some("blob-1".to_string())).unwrap();
        assert_eq!(meta.name(), "users");
        assert_eq!(meta.file_id(), Some("blob-1"));
        assert_eq!(meta.document_count(), 0);
        assert!(crate::token::validate_modification_token(
            meta.modification_token()
        ));
        assert!(meta.lock_status().is_none());
    }

    #[test]
    fn with_name_rebinds_without_mutating_original() {
        let original = CollectionMetadata::new("users", None).unwrap();
        let rebound = original.with_name("accounts");
        assert_eq!(original.name(), "users");
        assert_eq!(rebound.name(), "accounts");
        assert_eq!(rebound.modification_token(), original.modification_token());
    }

    #[test]
    fn touch_moves_last_updated_forward() {
        let mut meta = CollectionMetadata::new("users", None).unwrap();
        let before = meta.last_updated();
        meta.touch();
        assert!(meta.last_updated() >= before);
    }

    #[test]
    fn lease_expiry_is_wall_clock() {
        let lease = LockLease::new("op-1", Duration::from_millis(500));
        assert!(lease.is_locked());
        assert!(!lease.is_expired(lease.locked_at()));
        assert!(!lease.is_expired(lease.locked_at() + ChronoDuration::milliseconds(499)));
        assert!(lease.is_expired(lease.locked_at() + ChronoDuration::milliseconds(500)));
        assert!(lease.is_expired(lease.locked_at() + ChronoDuration::milliseconds(900)));
    }

    #[test]
    fn metadata_round_trips_through_json() {
        let mut meta = CollectionMetadata::new("users", Some("blob-7".to_string())).unwrap();
        meta.set_document_count(12);
        meta.set_lock_status(Some(LockLease::new("op-9", Duration::from_secs(5))));
        meta.set_extra("custom", serde_json::json!({"a": 1}));

        let encoded = serde_json::to_string(&meta).unwrap();
        let decoded: CollectionMetadata = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, meta);

        // Wire shape keeps the established camelCase field names.
        let raw: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert!(raw.get("documentCount").is_some());
        assert!(raw.get("modificationToken").is_some());
        assert!(raw.get("lockStatus").is_some());
        assert!(raw.get("custom").is_some());
    }
}
