//! Error types for bucket access.

/// Errors that can occur when talking to the storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Object storage error
    #[error("object storage error: {0}")]
    ObjectStore(#[from] object_store::Error),

    /// Invalid configuration or connection parameters
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object key cannot be represented as a storage path
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    /// Continuation token was not produced by a previous listing
    #[error("invalid continuation token")]
    InvalidContinuationToken,

    /// Bucket does not exist on the backend
    #[error("bucket '{0}' does not exist")]
    BucketNotFound(String),
}

/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
