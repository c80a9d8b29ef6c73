//! Lease and conflict-detection scenarios through the facade's kernel.

use banyan_db::{Database, DatabaseConfig};
use banyan_store::{InMemoryAdvisoryLock, InMemoryObjectStore, InMemoryPropertyStore};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

async fn open_database() -> Database {
    let db = Database::new(
        DatabaseConfig::default(),
        Arc::new(InMemoryPropertyStore::new()),
        Arc::new(InMemoryAdvisoryLock::new()),
        Arc::new(InMemoryObjectStore::new()),
    )
    .unwrap();
    db.create_database().await.unwrap();
    db
}

#[tokio::test]
async fn lease_acquisition_conflict_and_expiry() {
    let db = open_database().await;
    db.collection("users").await.unwrap();
    let index = db.master_index().unwrap();

    assert!(index
        .acquire_collection_lock("users", "op1", Some(Duration::from_millis(50)))
        .await
        .unwrap());
    assert!(!index
        .acquire_collection_lock("users", "op2", Some(Duration::from_millis(50)))
        .await
        .unwrap());
    assert!(index.is_collection_locked("users").await.unwrap());

    // Past the lease window the lock reads as free and becomes claimable.
    tokio::time::sleep(Duration::from_millis(70)).await;
    assert!(!index.is_collection_locked("users").await.unwrap());
    assert!(index
        .acquire_collection_lock("users", "op2", Some(Duration::from_millis(1000)))
        .await
        .unwrap());
    assert!(index.release_collection_lock("users", "op2").await.unwrap());
}

#[tokio::test]
async fn metadata_updates_move_the_modification_token() {
    let db = open_database().await;
    db.collection("users").await.unwrap();
    let index = db.master_index().unwrap();

    let observed = index
        .get_collection("users")
        .unwrap()
        .unwrap()
        .modification_token()
        .to_string();
    assert!(!index.has_conflict("users", &observed).unwrap());

    index
        .update_collection_metadata("users", &json!({"documentCount": 1}))
        .await
        .unwrap();

    assert!(index.has_conflict("users", &observed).unwrap());
    let current = index
        .get_collection("users")
        .unwrap()
        .unwrap()
        .modification_token()
        .to_string();
    assert!(!index.has_conflict("users", &current).unwrap());
}

#[tokio::test]
async fn expired_leases_are_reaped_in_one_sweep() {
    let db = open_database().await;
    db.collection("a").await.unwrap();
    db.collection("b").await.unwrap();
    let index = db.master_index().unwrap();

    index
        .acquire_collection_lock("a", "op1", Some(Duration::from_millis(30)))
        .await
        .unwrap();
    index
        .acquire_collection_lock("b", "op2", Some(Duration::from_millis(30)))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(index.cleanup_expired_locks().await.unwrap(), 2);
    assert_eq!(index.cleanup_expired_locks().await.unwrap(), 0);
}
