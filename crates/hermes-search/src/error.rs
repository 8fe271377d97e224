//! Error types for the search indices.

use thiserror::Error;

/// Errors raised by the description and member indices.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The underlying key-value engine failed.
    #[error("search index database error: {0}")]
    Database(#[from] heed::Error),

    /// The index was built by an incompatible implementation version.
    #[error("search index version {found} does not match implementation version {expected}")]
    VersionMismatch {
        /// Version found in the index.
        found: u32,
        /// Version this implementation writes.
        expected: u32,
    },

    /// The index directory or its contents are unreadable.
    #[error("corrupt search index: {0}")]
    Corrupt(String),

    /// Reading from the component store failed during a build.
    #[error(transparent)]
    Store(#[from] hermes_store::StoreError),

    /// A stored record failed to decode.
    #[error(transparent)]
    Component(#[from] hermes_types::ComponentError),

    /// Filesystem error outside the key-value engine.
    #[error("search index I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for search operations.
pub type SearchResult<T> = Result<T, SearchError>;
