//! Registry recovery from a backup blob.

use banyan_db::{Database, DatabaseConfig, DbError};
use banyan_store::{
    InMemoryAdvisoryLock, InMemoryObjectStore, InMemoryPropertyStore, ObjectStore, PropertyStore,
};
use serde_json::json;
use std::sync::Arc;

struct Stores {
    properties: Arc<InMemoryPropertyStore>,
    advisory: Arc<InMemoryAdvisoryLock>,
    objects: Arc<InMemoryObjectStore>,
}

fn stores() -> Stores {
    Stores {
        properties: Arc::new(InMemoryPropertyStore::new()),
        advisory: Arc::new(InMemoryAdvisoryLock::new()),
        objects: Arc::new(InMemoryObjectStore::new()),
    }
}

fn database(stores: &Stores) -> Database {
    Database::new(
        DatabaseConfig::default(),
        stores.properties.clone(),
        stores.advisory.clone(),
        stores.objects.clone(),
    )
    .unwrap()
}

#[tokio::test]
async fn recover_reregisters_every_backup_entry() {
    let stores = stores();
    let backup_id = stores
        .objects
        .create_blob(
            "backup.json",
            &json!({
                "collections": {
                    "c1": {"fileId": "F1", "documentCount": 4},
                    "c2": {"fileId": "F2", "documentCount": 7}
                }
            }),
            None,
        )
        .await
        .unwrap();

    let db = database(&stores);
    let mut recovered = db.recover_database(&backup_id).await.unwrap();
    recovered.sort();
    assert_eq!(recovered, vec!["c1".to_string(), "c2".to_string()]);

    let mut listed = db.list_collections().unwrap();
    listed.sort();
    assert_eq!(listed, vec!["c1".to_string(), "c2".to_string()]);

    let index = db.master_index().unwrap();
    let c1 = index.get_collection("c1").unwrap().unwrap();
    assert_eq!(c1.file_id(), Some("F1"));
    assert_eq!(c1.document_count(), 4);
    let c2 = index.get_collection("c2").unwrap().unwrap();
    assert_eq!(c2.document_count(), 7);
}

#[tokio::test]
async fn recover_replaces_a_corrupt_registry_value() {
    let stores = stores();
    stores
        .properties
        .set("BANYAN_MASTER_INDEX", "{broken")
        .await
        .unwrap();
    let backup_id = stores
        .objects
        .create_blob(
            "backup.json",
            &json!({"collections": {"users": {"fileId": "F9", "documentCount": 2}}}),
            None,
        )
        .await
        .unwrap();

    let db = database(&stores);
    let recovered = db.recover_database(&backup_id).await.unwrap();
    assert_eq!(recovered, vec!["users".to_string()]);

    // The registry value is whole again.
    let reopened = database(&stores);
    reopened.initialise().await.unwrap();
    assert_eq!(reopened.list_collections().unwrap(), vec!["users".to_string()]);
}

#[tokio::test]
async fn backup_missing_collections_mapping_fails_recovery() {
    let stores = stores();
    let backup_id = stores
        .objects
        .create_blob("backup.json", &json!({"version": 1}), None)
        .await
        .unwrap();

    let db = database(&stores);
    let error = db.recover_database(&backup_id).await.unwrap_err();
    match error {
        DbError::CorruptedIndex(message) => assert!(message.contains("collections")),
        other => panic!("expected CorruptedIndex, got {other:?}"),
    }
}

#[tokio::test]
async fn non_json_backup_blob_fails_recovery() {
    let stores = stores();
    stores
        .objects
        .put_raw("blob-bad", "backup.json", "not json at all")
        .unwrap();

    let db = database(&stores);
    assert!(matches!(
        db.recover_database("blob-bad").await,
        Err(DbError::CorruptedIndex(_))
    ));
}

#[tokio::test]
async fn round_trip_backup_then_recover() {
    let stores = stores();
    {
        let db = database(&stores);
        db.create_database().await.unwrap();
        db.collection("users").await.unwrap();
        db.collection("orders").await.unwrap();
    }

    let db = database(&stores);
    db.initialise().await.unwrap();
    let backup_id = db.backup_registry().await.unwrap();

    // Simulate total loss of the property value.
    stores.properties.delete("BANYAN_MASTER_INDEX").await.unwrap();

    let recovering = database(&stores);
    let mut recovered = recovering.recover_database(&backup_id).await.unwrap();
    recovered.sort();
    assert_eq!(recovered, vec!["orders".to_string(), "users".to_string()]);

    let users = recovering.collection("users").await.unwrap();
    let contents = users.read_contents().await.unwrap();
    assert_eq!(contents["documents"], json!({}));
}
