//! Error types for the Gleaner core.

use thiserror::Error;

/// A shared error type for the harvesting components.
///
/// Most failure paths in the core deliberately degrade instead of erroring
/// (store reads fall back to an empty snapshot, malformed records are
/// skipped); this enum covers the few places where a caller must be told
/// that an operation could not proceed.
#[derive(Error, Debug, Clone)]
pub enum HarvestError {
    /// A collection run is already active; only one session may run at a time.
    #[error("collection already in progress")]
    CollectionActive,

    /// A rendered item could not be turned into a valid record.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Configuration error (paths, home directory, malformed settings)
    #[error("configuration error: {0}")]
    Config(String),
}

impl HarvestError {
    /// Creates an InvalidRecord error
    pub fn invalid_record(reason: impl Into<String>) -> Self {
        Self::InvalidRecord(reason.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for HarvestError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for HarvestError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// A type alias for `Result<T, HarvestError>`.
pub type Result<T> = std::result::Result<T, HarvestError>;
