//! Error types for the polymorphic resolver
//!
//! A single error enum covers repository lookup, storage engine failures,
//! declaration problems and (de)serialization of record values.

use crate::config::ConfigError;

/// Result type alias for resolver and repository operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for polymorphic resolution and storage operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrmError {
    /// A declared target kind has no registered repository
    #[error("Repository not found for token '{0}'")]
    RepositoryNotFound(String),

    /// Underlying storage engine failure, propagated unchanged
    #[error("Database error: {0}")]
    Database(String),

    /// Query construction or execution error
    #[error("Query error: {0}")]
    Query(String),

    /// Record not found where one was required
    #[error("Record not found: {0}")]
    NotFound(String),

    /// A record needed a primary key value it does not carry
    #[error("Primary key is missing on record of kind '{0}'")]
    MissingPrimaryKey(String),

    /// Invalid relation declaration or resolver configuration
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl OrmError {
    /// Returns true if this error reports an unmapped repository token
    pub fn is_repository_not_found(&self) -> bool {
        matches!(self, OrmError::RepositoryNotFound(_))
    }
}

impl From<sqlx::Error> for OrmError {
    fn from(err: sqlx::Error) -> Self {
        OrmError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for OrmError {
    fn from(err: serde_json::Error) -> Self {
        OrmError::Serialization(err.to_string())
    }
}

impl From<ConfigError> for OrmError {
    fn from(err: ConfigError) -> Self {
        OrmError::Configuration(err.to_string())
    }
}
