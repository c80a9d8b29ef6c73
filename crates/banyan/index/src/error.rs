use thiserror::Error;

/// Result type for coordination-kernel operations.
pub type IndexResult<T> = Result<T, IndexError>;

/// Coordination-kernel errors.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(String),

    #[error("lock acquisition timed out: {0}")]
    LockTimeout(String),

    #[error("master index {op} failed: {message}")]
    Persistence { op: &'static str, message: String },
}

impl IndexError {
    pub(crate) fn load(message: impl Into<String>) -> Self {
        IndexError::Persistence {
            op: "load",
            message: message.into(),
        }
    }

    pub(crate) fn save(message: impl Into<String>) -> Self {
        IndexError::Persistence {
            op: "save",
            message: message.into(),
        }
    }

    pub(crate) fn lock_acquisition(message: impl Into<String>) -> Self {
        IndexError::Persistence {
            op: "lock_acquisition",
            message: message.into(),
        }
    }
}
