//! The database facade.

use crate::backup::RegistryBackup;
use crate::collection::Collection;
use crate::config::DatabaseConfig;
use crate::error::{DbError, DbResult};
use crate::names::{ensure_not_reserved, normalise_collection_name};
use banyan_index::{CollectionMetadata, MasterIndex, MasterIndexConfig};
use banyan_store::{AdvisoryLock, ObjectStore, PropertyStore, StoreError};
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// One logical database over a shared property store and object store.
///
/// The facade owns lifecycle (create, open, recover), the collection-name
/// grammar, and the in-memory collection handles; coordination is delegated
/// to the [`MasterIndex`] it hosts.
pub struct Database {
    config: DatabaseConfig,
    properties: Arc<dyn PropertyStore>,
    advisory: Arc<dyn AdvisoryLock>,
    objects: Arc<dyn ObjectStore>,
    index: RwLock<Option<Arc<MasterIndex>>>,
    handles: RwLock<HashMap<String, Collection>>,
}

impl Database {
    /// Build a database over the given drivers. Validates configuration;
    /// does not touch storage until `create_database` or `initialise`.
    pub fn new(
        config: DatabaseConfig,
        properties: Arc<dyn PropertyStore>,
        advisory: Arc<dyn AdvisoryLock>,
        objects: Arc<dyn ObjectStore>,
    ) -> DbResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            properties,
            advisory,
            objects,
            index: RwLock::new(None),
            handles: RwLock::new(HashMap::new()),
        })
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// The coordination kernel. Available once the database has been
    /// created, initialised, or recovered.
    pub fn master_index(&self) -> DbResult<Arc<MasterIndex>> {
        self.index
            .read()
            .map_err(|_| DbError::Storage("master index handle lock poisoned".to_string()))?
            .clone()
            .ok_or_else(|| {
                DbError::NotInitialised(
                    "call create_database, initialise, or recover_database first".to_string(),
                )
            })
    }

    /// Create a brand-new database at the configured key.
    ///
    /// Refuses when the key already holds any value; use `initialise` to
    /// open an existing database.
    pub async fn create_database(&self) -> DbResult<()> {
        let existing = self.properties.get(&self.config.master_index_key).await?;
        if existing.is_some() {
            return Err(DbError::AlreadyExists(format!(
                "Database already exists at property key '{}'",
                self.config.master_index_key
            )));
        }
        let index = self.open_master_index().await?;
        self.install_index(index)?;
        tracing::info!(key = %self.config.master_index_key, "database created");
        Ok(())
    }

    /// Open an existing database: load the registry and hydrate handles for
    /// every collection with a storage blob.
    ///
    /// Refuses when the key is absent (nothing to open) and propagates a
    /// load failure when the stored value does not decode.
    pub async fn initialise(&self) -> DbResult<()> {
        let raw = self.properties.get(&self.config.master_index_key).await?;
        if raw.is_none() {
            return Err(DbError::NotInitialised(format!(
                "no master index found at property key '{}'",
                self.config.master_index_key
            )));
        }
        let index = self.open_master_index().await?;
        let collections = index.get_collections()?;
        {
            let mut handles = self.handles_write()?;
            handles.clear();
            for (name, meta) in &collections {
                if let Some(file_id) = meta.file_id() {
                    handles.insert(
                        name.clone(),
                        Collection::new(name, file_id, meta.clone(), Arc::clone(&self.objects)),
                    );
                }
            }
        }
        self.install_index(index)?;
        tracing::info!(
            key = %self.config.master_index_key,
            collections = collections.len(),
            "database initialised"
        );

        if self.config.backup_on_initialise && !collections.is_empty() {
            let backup_id = self.backup_registry().await?;
            tracing::info!(blob = %backup_id, "registry backup written");
        }
        Ok(())
    }

    /// Write a backup blob projecting the current registry.
    pub async fn backup_registry(&self) -> DbResult<String> {
        let index = self.master_index()?;
        let backup = RegistryBackup::from_collections(&index.get_collections()?);
        let content = serde_json::to_value(&backup)
            .map_err(|e| DbError::Storage(format!("failed to encode registry backup: {}", e)))?;
        let blob_id = self
            .objects
            .create_blob(
                &format!("{}-backup.json", self.config.master_index_key),
                &content,
                self.config.root_folder_id.as_deref(),
            )
            .await
            .map_err(|e| DbError::Storage(format!("failed to write registry backup: {}", e)))?;
        Ok(blob_id)
    }

    /// Rebuild the registry from a backup blob, replacing whatever the
    /// configured key currently holds. Returns the recovered names.
    pub async fn recover_database(&self, backup_blob_id: &str) -> DbResult<Vec<String>> {
        let raw = self
            .objects
            .read_blob(backup_blob_id)
            .await
            .map_err(|e| match e {
                StoreError::Corrupt(message) => DbError::CorruptedIndex(format!(
                    "backup blob '{}' is not valid JSON: {}",
                    backup_blob_id, message
                )),
                other => DbError::from(other),
            })?;
        let backup = RegistryBackup::parse(&raw)?;

        self.properties.delete(&self.config.master_index_key).await?;
        let index = self.open_master_index().await?;

        let mut entries = BTreeMap::new();
        for (name, entry) in &backup.collections {
            entries.insert(name.clone(), entry.to_metadata(name)?);
        }
        let recovered = index.add_collections(entries).await?;

        {
            let mut handles = self.handles_write()?;
            handles.clear();
            for (name, meta) in index.get_collections()? {
                if let Some(file_id) = meta.file_id() {
                    handles.insert(
                        name.clone(),
                        Collection::new(&name, file_id, meta.clone(), Arc::clone(&self.objects)),
                    );
                }
            }
        }
        self.install_index(index)?;
        tracing::info!(
            count = recovered.len(),
            blob = %backup_blob_id,
            "database recovered from backup"
        );
        Ok(recovered)
    }

    /// Get a handle for `name`, hydrating from the registry when needed.
    /// With `auto_create_collections`, an absent collection is created;
    /// otherwise the error names the original, un-sanitised input.
    pub async fn collection(&self, name: &str) -> DbResult<Collection> {
        let effective = normalise_collection_name(
            name,
            self.config.strip_disallowed_collection_name_characters,
        )?;
        if let Some(handle) = self.handles_read()?.get(&effective) {
            return Ok(handle.clone());
        }
        let index = self.master_index()?;
        if let Some(meta) = index.get_collection(&effective)? {
            let Some(file_id) = meta.file_id() else {
                return Err(DbError::Storage(format!(
                    "collection '{}' is registered without a storage blob",
                    effective
                )));
            };
            let handle = Collection::new(&effective, file_id, meta.clone(), Arc::clone(&self.objects));
            self.handles_write()?
                .insert(effective.clone(), handle.clone());
            return Ok(handle);
        }
        if self.config.auto_create_collections {
            return self.create_collection(name).await;
        }
        Err(DbError::CollectionNotFound(format!(
            "Collection not found: {}",
            name
        )))
    }

    /// Alias for [`collection`](Database::collection).
    pub async fn get_collection(&self, name: &str) -> DbResult<Collection> {
        self.collection(name).await
    }

    /// Create a collection: validate the name, seed an empty document blob,
    /// and register it in the master index.
    pub async fn create_collection(&self, name: &str) -> DbResult<Collection> {
        let effective = normalise_collection_name(
            name,
            self.config.strip_disallowed_collection_name_characters,
        )?;
        ensure_not_reserved(&effective)?;
        let index = self.master_index()?;
        if self.handles_read()?.contains_key(&effective)
            || index.get_collection(&effective)?.is_some()
        {
            let detail = if effective != name {
                format!(
                    "Collection already exists: {} (sanitised from '{}')",
                    effective, name
                )
            } else {
                format!("Collection already exists: {}", effective)
            };
            return Err(DbError::AlreadyExists(detail));
        }

        let seed = serde_json::json!({
            "collection": effective,
            "created": Utc::now(),
            "documents": {}
        });
        let file_id = self
            .objects
            .create_blob(
                &format!("{}.json", effective),
                &seed,
                self.config.root_folder_id.as_deref(),
            )
            .await
            .map_err(|e| {
                DbError::Storage(format!(
                    "failed to create blob for collection '{}': {}",
                    effective, e
                ))
            })?;

        let metadata = CollectionMetadata::new(&effective, Some(file_id.clone()))?;
        let registered = index.add_collection(&effective, metadata).await?;
        let handle = Collection::new(&effective, &file_id, registered, Arc::clone(&self.objects));
        self.handles_write()?
            .insert(effective.clone(), handle.clone());
        tracing::info!(collection = %effective, blob = %file_id, "collection created");
        Ok(handle)
    }

    /// Delete a collection's blob, evict its handle, and remove it from the
    /// registry. Returns whether a registry entry was removed.
    pub async fn drop_collection(&self, name: &str) -> DbResult<bool> {
        let effective = normalise_collection_name(
            name,
            self.config.strip_disallowed_collection_name_characters,
        )?;
        let index = self.master_index()?;
        if let Some(meta) = index.get_collection(&effective)? {
            if let Some(file_id) = meta.file_id() {
                match self.objects.delete_blob(file_id).await {
                    Ok(()) => {}
                    Err(StoreError::NotFound(_)) => {
                        tracing::warn!(collection = %effective, "collection blob already absent");
                    }
                    Err(e) => {
                        return Err(DbError::Storage(format!(
                            "failed to delete blob for collection '{}': {}",
                            effective, e
                        )));
                    }
                }
            }
        }
        self.handles_write()?.remove(&effective);
        let removed = index.remove_collection(&effective).await?;
        if removed {
            tracing::info!(collection = %effective, "collection dropped");
        }
        Ok(removed)
    }

    /// Alias for [`drop_collection`](Database::drop_collection).
    pub async fn delete_collection(&self, name: &str) -> DbResult<bool> {
        self.drop_collection(name).await
    }

    /// Collection names from the registry, the single source of truth.
    pub fn list_collections(&self) -> DbResult<Vec<String>> {
        let index = self.master_index()?;
        Ok(index.get_collections()?.keys().cloned().collect())
    }

    fn index_config(&self) -> MasterIndexConfig {
        MasterIndexConfig {
            key: self.config.master_index_key.clone(),
            lock_timeout: self.config.lock_timeout,
            version: 1,
            history_limit: self.config.modification_history_limit,
        }
    }

    async fn open_master_index(&self) -> DbResult<MasterIndex> {
        Ok(MasterIndex::open(
            self.index_config(),
            Arc::clone(&self.properties),
            Arc::clone(&self.advisory),
        )
        .await?)
    }

    fn install_index(&self, index: MasterIndex) -> DbResult<()> {
        *self
            .index
            .write()
            .map_err(|_| DbError::Storage("master index handle lock poisoned".to_string()))? =
            Some(Arc::new(index));
        Ok(())
    }

    fn handles_read(
        &self,
    ) -> DbResult<std::sync::RwLockReadGuard<'_, HashMap<String, Collection>>> {
        self.handles
            .read()
            .map_err(|_| DbError::Storage("collection handle lock poisoned".to_string()))
    }

    fn handles_write(
        &self,
    ) -> DbResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Collection>>> {
        self.handles
            .write()
            .map_err(|_| DbError::Storage("collection handle lock poisoned".to_string()))
    }
}
