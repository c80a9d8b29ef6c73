//! The master index: process-shared registry of collections.
//!
//! One instance per opened database. The in-memory snapshot mirrors the
//! property-store value; every mutation rewrites the whole value atomically
//! while holding the [`CoarseLock`], then replaces the mirror, so a failed
//! persist leaves the mirror untouched (all-or-nothing per operation).

use crate::codec::{DecodedRegistry, RegistryCodec};
use crate::error::{IndexError, IndexResult};
use crate::lock::CoarseLock;
use crate::metadata::{CollectionMetadata, LockLease};
use crate::snapshot::{HistoryEntry, RegistrySnapshot};
use crate::token::generate_modification_token;
use banyan_store::{AdvisoryLock, PropertyStore};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

/// The only conflict-resolution strategy currently recognised.
pub const LAST_WRITE_WINS: &str = "LAST_WRITE_WINS";

/// Lower bound on the coarse-lock timeout.
pub const MIN_LOCK_TIMEOUT: Duration = Duration::from_millis(500);

const ADD_COLLECTION: &str = "ADD_COLLECTION";
const UPDATE_METADATA: &str = "UPDATE_METADATA";
const REMOVE_COLLECTION: &str = "REMOVE_COLLECTION";
const CONFLICT_RESOLVED: &str = "CONFLICT_RESOLVED";

/// Master index configuration.
#[derive(Debug, Clone)]
pub struct MasterIndexConfig {
    /// Property-store key holding the registry snapshot.
    pub key: String,
    /// Default timeout for coarse-lock acquisition and collection leases.
    pub lock_timeout: Duration,
    /// Snapshot format version written on initialisation.
    pub version: u32,
    /// Maximum history entries retained per collection.
    pub history_limit: usize,
}

impl Default for MasterIndexConfig {
    fn default() -> Self {
        Self {
            key: "BANYAN_MASTER_INDEX".to_string(),
            lock_timeout: Duration::from_secs(30),
            version: 1,
            history_limit: 100,
        }
    }
}

impl MasterIndexConfig {
    pub fn validate(&self) -> IndexResult<()> {
        if self.key.trim().is_empty() {
            return Err(IndexError::Configuration(
                "master index key must not be empty".to_string(),
            ));
        }
        if self.lock_timeout < MIN_LOCK_TIMEOUT {
            return Err(IndexError::Configuration(format!(
                "lock timeout must be at least {}ms",
                MIN_LOCK_TIMEOUT.as_millis()
            )));
        }
        if self.history_limit == 0 {
            return Err(IndexError::Configuration(
                "modification history limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Coordination kernel for one database.
pub struct MasterIndex {
    config: MasterIndexConfig,
    properties: Arc<dyn PropertyStore>,
    coarse: CoarseLock,
    snapshot: RwLock<RegistrySnapshot>,
}

impl MasterIndex {
    /// Open (or first-initialise) the master index at the configured key.
    ///
    /// An absent value initialises and persists an empty snapshot; a stored
    /// snapshot is decoded and shape-repaired. A value that fails to decode
    /// is a load failure, never silently replaced.
    pub async fn open(
        config: MasterIndexConfig,
        properties: Arc<dyn PropertyStore>,
        advisory: Arc<dyn AdvisoryLock>,
    ) -> IndexResult<Self> {
        config.validate()?;
        let coarse = CoarseLock::new(advisory);
        let raw = properties
            .get(&config.key)
            .await
            .map_err(|e| IndexError::load(e.to_string()))?;
        let snapshot = match RegistryCodec::decode(raw.as_deref())? {
            DecodedRegistry::Snapshot(mut snapshot) => {
                snapshot.repair();
                snapshot
            }
            DecodedRegistry::Empty => {
                let mut fresh = RegistrySnapshot::empty(config.version);
                coarse.acquire(config.lock_timeout).await?;
                let outcome = match RegistryCodec::encode(&mut fresh) {
                    Ok(encoded) => properties
                        .set(&config.key, &encoded)
                        .await
                        .map_err(|e| IndexError::save(e.to_string())),
                    Err(e) => Err(e),
                };
                coarse.release().await;
                outcome?;
                tracing::info!(key = %config.key, "initialised empty master index");
                fresh
            }
        };
        Ok(Self {
            config,
            properties,
            coarse,
            snapshot: RwLock::new(snapshot),
        })
    }

    pub fn config(&self) -> &MasterIndexConfig {
        &self.config
    }

    /// True once a snapshot with a version is held.
    pub fn is_initialised(&self) -> bool {
        self.snapshot_read()
            .map(|snapshot| snapshot.version >= 1)
            .unwrap_or(false)
    }

    /// Register one collection. The `name` argument is authoritative:
    /// metadata carrying a different name is rebound by copy.
    pub async fn add_collection(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> IndexResult<CollectionMetadata> {
        Self::validate_collection_name(name)?;
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.add_collection_locked(name, metadata).await;
        self.coarse.release().await;
        result
    }

    async fn add_collection_locked(
        &self,
        name: &str,
        metadata: CollectionMetadata,
    ) -> IndexResult<CollectionMetadata> {
        let mut working = self.snapshot_read()?.clone();
        let normalised = metadata.with_name(name);
        working
            .collections
            .insert(name.to_string(), normalised.clone());
        working.record_history(
            name,
            ADD_COLLECTION,
            serde_json::json!({"name": name, "fileId": normalised.file_id()}),
            self.config.history_limit,
        );
        self.persist(working).await?;
        tracing::info!(collection = %name, "collection registered");
        Ok(normalised)
    }

    /// Register several collections in one critical section. Either every
    /// entry lands in the persisted snapshot or none does.
    pub async fn add_collections(
        &self,
        entries: BTreeMap<String, CollectionMetadata>,
    ) -> IndexResult<Vec<String>> {
        for name in entries.keys() {
            Self::validate_collection_name(name)?;
        }
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.add_collections_locked(entries).await;
        self.coarse.release().await;
        result
    }

    async fn add_collections_locked(
        &self,
        entries: BTreeMap<String, CollectionMetadata>,
    ) -> IndexResult<Vec<String>> {
        let mut working = self.snapshot_read()?.clone();
        let mut registered = Vec::with_capacity(entries.len());
        for (name, metadata) in entries {
            let normalised = metadata.with_name(&name);
            working
                .collections
                .insert(name.clone(), normalised.clone());
            working.record_history(
                &name,
                ADD_COLLECTION,
                serde_json::json!({"name": name.as_str(), "fileId": normalised.file_id()}),
                self.config.history_limit,
            );
            registered.push(name);
        }
        self.persist(working).await?;
        tracing::info!(count = registered.len(), "collections registered in bulk");
        Ok(registered)
    }

    /// Read one collection's metadata. No lock; eventually consistent.
    pub fn get_collection(&self, name: &str) -> IndexResult<Option<CollectionMetadata>> {
        Ok(self.snapshot_read()?.collections.get(name).cloned())
    }

    /// Read all collection metadata. No lock; eventually consistent.
    pub fn get_collections(&self) -> IndexResult<BTreeMap<String, CollectionMetadata>> {
        Ok(self.snapshot_read()?.collections.clone())
    }

    /// Recorded history for one collection, oldest first.
    pub fn get_history(&self, name: &str) -> IndexResult<Vec<HistoryEntry>> {
        Ok(self
            .snapshot_read()?
            .modification_history
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    /// Apply a field-update mapping to one collection's metadata.
    ///
    /// Recognised keys: `documentCount`, `modificationToken`, `lockStatus`,
    /// `lastUpdated`; anything else is kept verbatim as an extra field.
    /// When the caller supplies no `modificationToken`, a fresh one is
    /// generated, so every metadata write moves the optimistic-concurrency
    /// tag.
    pub async fn update_collection_metadata(
        &self,
        name: &str,
        updates: &Value,
    ) -> IndexResult<CollectionMetadata> {
        let fields = updates.as_object().ok_or_else(|| {
            IndexError::InvalidArgument("metadata updates must be an object".to_string())
        })?;
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.update_metadata_locked(name, fields).await;
        self.coarse.release().await;
        result
    }

    async fn update_metadata_locked(
        &self,
        name: &str,
        fields: &Map<String, Value>,
    ) -> IndexResult<CollectionMetadata> {
        let mut working = self.snapshot_read()?.clone();
        let meta = working
            .collections
            .get_mut(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        let mut token_supplied = false;
        let mut last_updated_supplied = false;
        for (key, value) in fields {
            match key.as_str() {
                "documentCount" => {
                    let count = value.as_u64().ok_or_else(|| {
                        IndexError::InvalidArgument(
                            "documentCount must be a non-negative integer".to_string(),
                        )
                    })?;
                    meta.set_document_count(count);
                }
                "modificationToken" => {
                    let token = value.as_str().ok_or_else(|| {
                        IndexError::InvalidArgument(
                            "modificationToken must be a string".to_string(),
                        )
                    })?;
                    meta.set_modification_token(token);
                    token_supplied = true;
                }
                "lockStatus" => {
                    let lease = Self::parse_lock_status(value)?;
                    meta.set_lock_status(lease);
                }
                "lastUpdated" => {
                    let timestamp = Self::parse_timestamp(value).ok_or_else(|| {
                        IndexError::InvalidArgument(format!(
                            "lastUpdated does not parse to a valid timestamp: {}",
                            value
                        ))
                    })?;
                    meta.set_last_updated(timestamp);
                    last_updated_supplied = true;
                }
                other => {
                    meta.set_extra(other, value.clone());
                }
            }
        }
        if !token_supplied {
            meta.set_modification_token(generate_modification_token());
        }
        if !last_updated_supplied {
            meta.touch();
        }
        let updated = meta.clone();

        working.record_history(
            name,
            UPDATE_METADATA,
            Value::Object(fields.clone()),
            self.config.history_limit,
        );
        self.persist(working).await?;
        tracing::debug!(collection = %name, "collection metadata updated");
        Ok(updated)
    }

    /// Remove a collection from the registry. Returns whether an entry was
    /// actually removed; removing an absent collection is not an error.
    pub async fn remove_collection(&self, name: &str) -> IndexResult<bool> {
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.remove_collection_locked(name).await;
        self.coarse.release().await;
        result
    }

    async fn remove_collection_locked(&self, name: &str) -> IndexResult<bool> {
        let mut working = self.snapshot_read()?.clone();
        if working.collections.remove(name).is_none() {
            return Ok(false);
        }
        working.record_history(
            name,
            REMOVE_COLLECTION,
            serde_json::json!({"name": name}),
            self.config.history_limit,
        );
        self.persist(working).await?;
        tracing::info!(collection = %name, "collection removed from registry");
        Ok(true)
    }

    /// Try to take the per-collection lease for `operation_id`.
    ///
    /// Returns `false` while another live lease exists; an expired lease is
    /// replaced. The lease duration defaults to the configured lock timeout.
    pub async fn acquire_collection_lock(
        &self,
        name: &str,
        operation_id: &str,
        timeout: Option<Duration>,
    ) -> IndexResult<bool> {
        if operation_id.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "operation id must not be empty".to_string(),
            ));
        }
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self
            .acquire_collection_lock_locked(
                name,
                operation_id,
                timeout.unwrap_or(self.config.lock_timeout),
            )
            .await;
        self.coarse.release().await;
        result
    }

    async fn acquire_collection_lock_locked(
        &self,
        name: &str,
        operation_id: &str,
        timeout: Duration,
    ) -> IndexResult<bool> {
        let mut working = self.snapshot_read()?.clone();
        let meta = working
            .collections
            .get_mut(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        let now = Utc::now();
        if let Some(lease) = meta.lock_status() {
            if !lease.is_expired(now) {
                return Ok(false);
            }
        }
        meta.set_lock_status(Some(LockLease::new(operation_id, timeout)));
        self.persist(working).await?;
        tracing::debug!(collection = %name, operation = %operation_id, "collection lock acquired");
        Ok(true)
    }

    /// Release the per-collection lease held by `operation_id`.
    ///
    /// Forgiving by design: an absent collection or absent lease reports
    /// success so cleanup paths can call this unconditionally. Only an
    /// owner mismatch reports `false`.
    pub async fn release_collection_lock(
        &self,
        name: &str,
        operation_id: &str,
    ) -> IndexResult<bool> {
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.release_collection_lock_locked(name, operation_id).await;
        self.coarse.release().await;
        result
    }

    async fn release_collection_lock_locked(
        &self,
        name: &str,
        operation_id: &str,
    ) -> IndexResult<bool> {
        let mut working = self.snapshot_read()?.clone();
        let Some(meta) = working.collections.get_mut(name) else {
            return Ok(true);
        };
        let owner_matches = match meta.lock_status() {
            None => return Ok(true),
            Some(lease) => lease.locked_by() == operation_id,
        };
        if !owner_matches {
            return Ok(false);
        }
        meta.set_lock_status(None);
        self.persist(working).await?;
        tracing::debug!(collection = %name, operation = %operation_id, "collection lock released");
        Ok(true)
    }

    /// Read-through probe: reloads the snapshot from the property store,
    /// then reports whether a live (non-expired) lease exists.
    pub async fn is_collection_locked(&self, name: &str) -> IndexResult<bool> {
        self.reload().await?;
        let snapshot = self.snapshot_read()?;
        Ok(snapshot
            .collections
            .get(name)
            .and_then(CollectionMetadata::lock_status)
            .map(|lease| !lease.is_expired(Utc::now()))
            .unwrap_or(false))
    }

    /// Clear every expired lease. Persists once, after the sweep, and only
    /// when something was cleared. Returns the number of leases reaped.
    pub async fn cleanup_expired_locks(&self) -> IndexResult<usize> {
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.cleanup_expired_locks_locked().await;
        self.coarse.release().await;
        result
    }

    async fn cleanup_expired_locks_locked(&self) -> IndexResult<usize> {
        let mut working = self.snapshot_read()?.clone();
        let now = Utc::now();
        let mut reaped = 0usize;
        for (name, meta) in working.collections.iter_mut() {
            let expired_holder = match meta.lock_status() {
                Some(lease) if lease.is_expired(now) => Some(lease.locked_by().to_string()),
                _ => None,
            };
            if let Some(holder) = expired_holder {
                tracing::warn!(collection = %name, holder = %holder, "reaping expired collection lock");
                meta.set_lock_status(None);
                reaped += 1;
            }
        }
        if reaped > 0 {
            self.persist(working).await?;
        }
        Ok(reaped)
    }

    /// True iff the collection exists and its current token differs from
    /// `expected_token`. An absent collection cannot conflict with a token
    /// from a previous life, so it reports `false`.
    pub fn has_conflict(&self, name: &str, expected_token: &str) -> IndexResult<bool> {
        if name.trim().is_empty() || expected_token.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "collection name and expected token must be non-empty".to_string(),
            ));
        }
        let snapshot = self.snapshot_read()?;
        Ok(snapshot
            .collections
            .get(name)
            .map(|meta| meta.modification_token() != expected_token)
            .unwrap_or(false))
    }

    /// Resolve a detected conflict by applying `new_data` and forcing a
    /// fresh token. Only the `LAST_WRITE_WINS` strategy is recognised.
    pub async fn resolve_conflict(
        &self,
        name: &str,
        new_data: &Value,
        strategy: &str,
    ) -> IndexResult<CollectionMetadata> {
        if strategy != LAST_WRITE_WINS {
            return Err(IndexError::Configuration(format!(
                "unknown conflict resolution strategy: {}",
                strategy
            )));
        }
        let fields = new_data.as_object().ok_or_else(|| {
            IndexError::InvalidArgument("conflict resolution data must be an object".to_string())
        })?;
        self.coarse.acquire(self.config.lock_timeout).await?;
        let result = self.resolve_conflict_locked(name, fields, strategy).await;
        self.coarse.release().await;
        result
    }

    async fn resolve_conflict_locked(
        &self,
        name: &str,
        fields: &Map<String, Value>,
        strategy: &str,
    ) -> IndexResult<CollectionMetadata> {
        let mut working = self.snapshot_read()?.clone();
        let meta = working
            .collections
            .get_mut(name)
            .ok_or_else(|| IndexError::CollectionNotFound(name.to_string()))?;

        if let Some(count) = fields.get("documentCount").and_then(Value::as_u64) {
            meta.set_document_count(count);
        }
        if let Some(token) = fields.get("modificationToken").and_then(Value::as_str) {
            meta.set_modification_token(token);
        }
        if let Some(value) = fields.get("lockStatus") {
            meta.set_lock_status(Self::parse_lock_status(value)?);
        }
        // The winning write gets its own tag regardless of what it carried.
        meta.set_modification_token(generate_modification_token());
        meta.touch();
        let resolved = meta.clone();

        working.record_history(
            name,
            CONFLICT_RESOLVED,
            serde_json::json!({"strategy": strategy, "data": Value::Object(fields.clone())}),
            self.config.history_limit,
        );
        self.persist(working).await?;
        tracing::info!(collection = %name, strategy = %strategy, "conflict resolved");
        Ok(resolved)
    }

    fn validate_collection_name(name: &str) -> IndexResult<()> {
        if name.trim().is_empty() {
            return Err(IndexError::InvalidArgument(
                "collection name must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    fn parse_lock_status(value: &Value) -> IndexResult<Option<LockLease>> {
        if value.is_null() {
            return Ok(None);
        }
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| IndexError::InvalidArgument(format!("malformed lockStatus: {}", e)))
    }

    fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
        if let Some(raw) = value.as_str() {
            return DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|parsed| parsed.with_timezone(&Utc));
        }
        value.as_i64().and_then(DateTime::from_timestamp_millis)
    }

    /// Encode and store `working`, then adopt it as the in-memory mirror.
    /// A failed encode or store leaves the mirror untouched.
    async fn persist(&self, mut working: RegistrySnapshot) -> IndexResult<()> {
        let encoded = RegistryCodec::encode(&mut working)?;
        self.properties
            .set(&self.config.key, &encoded)
            .await
            .map_err(|e| IndexError::save(e.to_string()))?;
        *self.snapshot_write()? = working;
        Ok(())
    }

    /// Refresh the in-memory mirror from the property store.
    async fn reload(&self) -> IndexResult<()> {
        let raw = self
            .properties
            .get(&self.config.key)
            .await
            .map_err(|e| IndexError::load(e.to_string()))?;
        match RegistryCodec::decode(raw.as_deref())? {
            DecodedRegistry::Empty => Ok(()),
            DecodedRegistry::Snapshot(mut snapshot) => {
                snapshot.repair();
                *self.snapshot_write()? = snapshot;
                Ok(())
            }
        }
    }

    fn snapshot_read(&self) -> IndexResult<RwLockReadGuard<'_, RegistrySnapshot>> {
        self.snapshot
            .read()
            .map_err(|_| IndexError::load("registry snapshot lock poisoned".to_string()))
    }

    fn snapshot_write(&self) -> IndexResult<RwLockWriteGuard<'_, RegistrySnapshot>> {
        self.snapshot
            .write()
            .map_err(|_| IndexError::save("registry snapshot lock poisoned".to_string()))
    }
}
