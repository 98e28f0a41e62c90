//! Error types for muse-billing storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database I/O failed; transient, retried by the caller with backoff.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A unique key already exists (duplicate transaction or order).
    ///
    /// Expected during idempotent duplicate-write races; callers treat it
    /// as a successful no-op, never surface it to the user.
    #[error("conflict: {key}")]
    Conflict {
        /// The key that collided.
        key: String,
    },

    /// Record not found.
    #[error("not found")]
    NotFound,
}
