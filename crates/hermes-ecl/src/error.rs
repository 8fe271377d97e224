//! Error types for ECL and compositional grammar handling.

use thiserror::Error;

/// Errors raised while parsing or compiling expressions.
#[derive(Error, Debug)]
pub enum EclError {
    /// The grammar rejected the input.
    #[error("parse error at line {line}, column {col}: expected {expected}")]
    Parse {
        /// One-based line of the rejection.
        line: u32,
        /// One-based column of the rejection.
        col: u32,
        /// What the parser was looking for.
        expected: String,
    },

    /// Grammatically valid but not implemented; carries the offending
    /// fragment for diagnosis.
    #[error("unsupported ECL: {fragment}")]
    Unsupported {
        /// Rendering of the AST fragment that cannot be lowered.
        fragment: String,
    },

    /// Empty input.
    #[error("empty expression")]
    Empty,

    /// Realising a sub-expression against the store failed.
    #[error(transparent)]
    Store(#[from] hermes_store::StoreError),

    /// Realising a sub-expression against the search index failed.
    #[error(transparent)]
    Search(#[from] hermes_search::SearchError),
}

impl EclError {
    /// Builds a parse error from a byte offset into the source.
    pub(crate) fn parse_at(source: &str, offset: usize, expected: impl Into<String>) -> Self {
        let consumed = &source[..offset.min(source.len())];
        let line = consumed.matches('\n').count() as u32 + 1;
        let col = match consumed.rfind('\n') {
            Some(pos) => (consumed.len() - pos) as u32,
            None => consumed.len() as u32 + 1,
        };
        EclError::Parse {
            line,
            col,
            expected: expected.into(),
        }
    }
}

/// Result alias for ECL operations.
pub type EclResult<T> = Result<T, EclError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positions_are_positive() {
        let err = EclError::parse_at("<< 404684003", 3, "concept id");
        match err {
            EclError::Parse { line, col, .. } => {
                assert_eq!(line, 1);
                assert_eq!(col, 4);
            }
            _ => panic!("expected parse error"),
        }
    }

    #[test]
    fn test_parse_positions_across_lines() {
        let err = EclError::parse_at("<< 404684003 AND\n  ?? junk", 19, "expression");
        match err {
            EclError::Parse { line, col, .. } => {
                assert_eq!(line, 2);
                assert!(col >= 1);
            }
            _ => panic!("expected parse error"),
        }
    }
}
