use sitemon_common::normalize::InvalidTarget;

/// Errors that can occur within the storage layer.
///
/// Write failures always surface to the caller: silent loss of a check
/// result defeats the purpose of monitoring.
///
/// # Examples
///
/// ```rust
/// use sitemon_storage::StorageError;
///
/// let err = StorageError::InvalidTarget("not a url".to_string());
/// assert!(err.to_string().contains("not a url"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The URL could not be normalized into a target identity. Rejected
    /// before any row is touched.
    #[error("Storage: invalid target URL '{0}'")]
    InvalidTarget(String),

    /// An underlying SQLite error.
    #[error("Storage: SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// JSON serialization failure (archive snapshots).
    #[error("Storage: JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Filesystem error (archive snapshot files, data directory).
    #[error("Storage: I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<InvalidTarget> for StorageError {
    fn from(err: InvalidTarget) -> Self {
        StorageError::InvalidTarget(err.0)
    }
}

/// Convenience `Result` alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
