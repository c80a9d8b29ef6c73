use thiserror::Error;

/// Result type for update-engine operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Update-engine errors.
#[derive(Debug, Error)]
pub enum UpdateError {
    #[error("invalid update: {0}")]
    InvalidQuery(String),
}

impl UpdateError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        UpdateError::InvalidQuery(message.into())
    }
}
