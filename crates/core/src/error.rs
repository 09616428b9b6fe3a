use std::path::PathBuf;

use crate::domain::{CollectionId, GroupId, PhotoId};

/// Batch-level errors. Anything returned as `Err` from a batch operation
/// aborted that batch; per-photo failures travel in the batch report instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("collection not found: {0}")]
    CollectionNotFound(CollectionId),

    #[error("no collection named `{0}`")]
    UnknownCollection(String),

    #[error("collection already exists: {0}")]
    CollectionAlreadyExists(String),

    #[error("photo not found: {0}")]
    PhotoNotFound(PhotoId),

    #[error("group not found: {0}")]
    GroupNotFound(GroupId),

    #[error("folder not found: {}", .0.display())]
    FolderNotFound(PathBuf),

    #[error("not a directory: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("collection {0} already has a clustering pass in progress")]
    CollectionBusy(CollectionId),

    #[error("invalid value for config key `{key}`: {value}")]
    InvalidConfig { key: String, value: String },
}

impl Error {
    /// Whether this error means the persistence layer could not be reached,
    /// which aborts the in-flight batch.
    pub fn is_store_failure(&self) -> bool {
        matches!(self, Self::Database(_) | Self::StoreUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Failure to extract features from a single photo. Never aborts a batch.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ExtractError {
    #[error("cannot decode image: {0}")]
    Decode(String),

    #[error("invalid image geometry {width}x{height}")]
    InvalidGeometry { width: u32, height: u32 },

    #[error("extraction exceeded its time budget of {budget_ms} ms")]
    Timeout { budget_ms: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_failure_classification() {
        assert!(Error::StoreUnavailable("down".into()).is_store_failure());
        assert!(Error::Database(rusqlite::Error::InvalidQuery).is_store_failure());
        assert!(!Error::CollectionBusy(CollectionId(1)).is_store_failure());
        assert!(!Error::PhotoNotFound(PhotoId(3)).is_store_failure());
    }

    #[test]
    fn test_extract_error_display() {
        let err = ExtractError::InvalidGeometry { width: 0, height: 10 };
        assert_eq!(err.to_string(), "invalid image geometry 0x10");
        let err = ExtractError::Timeout { budget_ms: 250 };
        assert!(err.to_string().contains("250 ms"));
    }
}
