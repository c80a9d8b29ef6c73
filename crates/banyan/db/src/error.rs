use banyan_index::IndexError;
use banyan_store::StoreError;
use thiserror::Error;

/// Result type for facade operations.
pub type DbResult<T> = Result<T, DbError>;

/// Facade-level errors.
#[derive(Debug, Error)]
pub enum DbError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("{0}")]
    AlreadyExists(String),

    #[error("database not initialised: {0}")]
    NotInitialised(String),

    #[error("{0}")]
    CollectionNotFound(String),

    #[error("invalid collection name: {0}")]
    InvalidCollectionName(String),

    #[error("corrupted index backup: {0}")]
    CorruptedIndex(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error(transparent)]
    Store(#[from] StoreError),
}
