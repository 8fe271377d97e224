//! Error types for the component store.

use thiserror::Error;

/// Errors raised by the store and the index phase.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The underlying key-value engine failed.
    #[error("store database error: {0}")]
    Database(#[from] heed::Error),

    /// The store was created by an incompatible implementation version.
    #[error("store version {found} does not match implementation version {expected}")]
    VersionMismatch {
        /// Version byte found in the store.
        found: u32,
        /// Version this implementation writes.
        expected: u32,
    },

    /// The store directory or its contents are unreadable.
    #[error("corrupt store: {0}")]
    Corrupt(String),

    /// A write operation was attempted on a read-only handle.
    #[error("store is open read-only")]
    ReadOnly,

    /// A stored value failed to decode.
    #[error(transparent)]
    Component(#[from] hermes_types::ComponentError),

    /// Filesystem error outside the key-value engine.
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
