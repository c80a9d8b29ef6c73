//! Database configuration.

use crate::error::{DbError, DbResult};
use banyan_index::MIN_LOCK_TIMEOUT;
use std::time::Duration;

/// Verbosity threshold for the embedding application's log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// Configuration for one [`Database`](crate::Database) instance.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Property-store key holding the master-index snapshot.
    pub master_index_key: String,

    /// Timeout for coarse-lock acquisition; also the default collection
    /// lease duration.
    pub lock_timeout: Duration,

    /// Advisory retry count for higher layers; the facade itself does not
    /// retry.
    pub retry_attempts: u32,

    /// Advisory delay between retries for higher layers.
    pub retry_delay: Duration,

    /// Object-store folder receiving collection blobs and backups.
    pub root_folder_id: Option<String>,

    /// Create collections on first access instead of failing.
    pub auto_create_collections: bool,

    /// Strip disallowed characters from collection names instead of
    /// rejecting them.
    pub strip_disallowed_collection_name_characters: bool,

    /// Write a registry backup blob during `initialise` when at least one
    /// collection exists.
    pub backup_on_initialise: bool,

    /// Maximum modification-history entries retained per collection.
    pub modification_history_limit: usize,

    /// Log verbosity for the embedding application.
    pub log_level: LogLevel,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            master_index_key: "BANYAN_MASTER_INDEX".to_string(),
            lock_timeout: Duration::from_secs(30),
            retry_attempts: 3,
            retry_delay: Duration::from_millis(1000),
            root_folder_id: None,
            auto_create_collections: true,
            strip_disallowed_collection_name_characters: false,
            backup_on_initialise: false,
            modification_history_limit: 100,
            log_level: LogLevel::default(),
        }
    }
}

impl DatabaseConfig {
    pub fn validate(&self) -> DbResult<()> {
        if self.master_index_key.trim().is_empty() {
            return Err(DbError::Configuration(
                "master index key must not be empty".to_string(),
            ));
        }
        if self.lock_timeout < MIN_LOCK_TIMEOUT {
            return Err(DbError::Configuration(format!(
                "lock timeout must be at least {}ms",
                MIN_LOCK_TIMEOUT.as_millis()
            )));
        }
        if self.modification_history_limit == 0 {
            return Err(DbError::Configuration(
                "modification history limit must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(DatabaseConfig::default().validate().is_ok());
    }

    #[test]
    fn short_lock_timeout_is_rejected() {
        let config = DatabaseConfig {
            lock_timeout: Duration::from_millis(499),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DbError::Configuration(_))
        ));
    }

    #[test]
    fn minimum_lock_timeout_is_accepted() {
        let config = DatabaseConfig {
            lock_timeout: Duration::from_millis(500),
            ..DatabaseConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_history_limit_is_rejected() {
        let config = DatabaseConfig {
            modification_history_limit: 0,
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DbError::Configuration(_))
        ));
    }

    #[test]
    fn empty_key_is_rejected() {
        let config = DatabaseConfig {
            master_index_key: "  ".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(DbError::Configuration(_))
        ));
    }
}
