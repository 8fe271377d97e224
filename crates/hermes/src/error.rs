//! The unified error surface of the facade.
//!
//! Inner crates raise their own tagged failures; the facade translates them
//! at the boundary so callers see one error vocabulary, matching what the
//! HTTP layer maps onto status codes.

use thiserror::Error;

use hermes_types::SctId;

/// Errors surfaced by the facade.
#[derive(Error, Debug)]
pub enum HermesError {
    /// An identifier failed partition or check-digit verification.
    #[error("invalid identifier {id}: {reason}")]
    InvalidIdentifier {
        /// The offending identifier.
        id: SctId,
        /// What failed.
        reason: String,
    },

    /// A lookup named a component that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// ECL or compositional grammar rejection.
    #[error("parse error at line {line}, column {col}: expected {expected}")]
    Parse {
        /// One-based line.
        line: u32,
        /// One-based column.
        col: u32,
        /// What the parser wanted.
        expected: String,
    },

    /// Grammatically valid but not implemented.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// An argument was out of bounds or flags were mutually exclusive.
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    /// The on-disk data was written by an incompatible version.
    #[error("store version {found} does not match implementation version {expected}")]
    StoreVersionMismatch {
        /// Version found on disk.
        found: u32,
        /// Version this implementation expects.
        expected: u32,
    },

    /// The on-disk data is unreadable.
    #[error("corrupt store: {0}")]
    CorruptStore(String),

    /// A consumed import batch was malformed.
    #[error("import error: {0}")]
    Import(String),

    /// An unexpected failure in the storage or index engines.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result alias for facade operations.
pub type Result<T> = std::result::Result<T, HermesError>;

impl From<hermes_store::StoreError> for HermesError {
    fn from(e: hermes_store::StoreError) -> Self {
        use hermes_store::StoreError;
        match e {
            StoreError::VersionMismatch { found, expected } => {
                HermesError::StoreVersionMismatch { found, expected }
            }
            StoreError::Corrupt(reason) => HermesError::CorruptStore(reason),
            StoreError::ReadOnly => {
                HermesError::InvalidParameter("store is open read-only".to_string())
            }
            StoreError::Component(inner) => HermesError::CorruptStore(inner.to_string()),
            other => HermesError::Internal(other.to_string()),
        }
    }
}

impl From<hermes_search::SearchError> for HermesError {
    fn from(e: hermes_search::SearchError) -> Self {
        use hermes_search::SearchError;
        match e {
            SearchError::VersionMismatch { found, expected } => {
                HermesError::StoreVersionMismatch { found, expected }
            }
            SearchError::Corrupt(reason) => HermesError::CorruptStore(reason),
            SearchError::Store(inner) => inner.into(),
            SearchError::Component(inner) => HermesError::CorruptStore(inner.to_string()),
            other => HermesError::Internal(other.to_string()),
        }
    }
}

impl From<hermes_ecl::EclError> for HermesError {
    fn from(e: hermes_ecl::EclError) -> Self {
        use hermes_ecl::EclError;
        match e {
            EclError::Parse { line, col, expected } => HermesError::Parse { line, col, expected },
            EclError::Unsupported { fragment } => HermesError::Unsupported(fragment),
            EclError::Empty => HermesError::Parse {
                line: 1,
                col: 1,
                expected: "expression".to_string(),
            },
            EclError::Store(inner) => inner.into(),
            EclError::Search(inner) => inner.into(),
        }
    }
}

impl From<hermes_types::ComponentError> for HermesError {
    fn from(e: hermes_types::ComponentError) -> Self {
        use hermes_types::ComponentError;
        match e {
            ComponentError::InvalidPartition { id, partition } => HermesError::InvalidIdentifier {
                id,
                reason: format!("unrecognised partition {partition:02}"),
            },
            ComponentError::CheckDigit(id) => HermesError::InvalidIdentifier {
                id,
                reason: "check digit failure".to_string(),
            },
            ComponentError::NotPositive(id) => HermesError::InvalidIdentifier {
                id,
                reason: "not a positive integer".to_string(),
            },
            other => HermesError::CorruptStore(other.to_string()),
        }
    }
}

impl From<hermes_types::ImportRowError> for HermesError {
    fn from(e: hermes_types::ImportRowError) -> Self {
        HermesError::Import(e.to_string())
    }
}
