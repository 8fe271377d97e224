//! Error types for the component model and codec.

use thiserror::Error;

use crate::SctId;

/// Errors raised by identifier verification and the binary codec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ComponentError {
    /// The identifier's partition digits do not name a component type.
    #[error("invalid identifier {id}: unrecognised partition {partition:02}")]
    InvalidPartition {
        /// The offending identifier.
        id: SctId,
        /// The decoded partition digits.
        partition: u8,
    },

    /// The identifier's Verhoeff check digit does not verify.
    #[error("invalid identifier {0}: check digit failure")]
    CheckDigit(SctId),

    /// The identifier is zero or negative.
    #[error("invalid identifier {0}: not a positive integer")]
    NotPositive(SctId),

    /// The byte slice ended before the value it should contain.
    #[error("truncated encoding at offset {0}")]
    Truncated(usize),

    /// An unknown component or refset variant tag.
    #[error("unknown variant tag {tag:#04x} at offset {offset}")]
    UnknownTag {
        /// The tag byte found.
        tag: u8,
        /// Offset of the tag in the input.
        offset: usize,
    },

    /// A length-prefixed string was not valid UTF-8.
    #[error("invalid UTF-8 in encoded string at offset {0}")]
    InvalidUtf8(usize),

    /// A varint did not terminate within ten bytes.
    #[error("malformed varint at offset {0}")]
    MalformedVarint(usize),

    /// An encoded date was outside the representable calendar range.
    #[error("encoded date out of range at offset {0}")]
    DateOutOfRange(usize),
}

/// Errors raised while consuming a parsed RF2 row.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ImportRowError {
    /// The row's field count does not match the file header.
    #[error("row has {found} fields but the header declares {expected}")]
    FieldCount {
        /// Number of fields declared by the header.
        expected: usize,
        /// Number of fields found in the row.
        found: usize,
    },

    /// A field failed to parse as the declared type.
    #[error("field '{heading}' does not parse as {expected}: '{value}'")]
    FieldValue {
        /// The column heading.
        heading: String,
        /// The declared type.
        expected: &'static str,
        /// The offending cell.
        value: String,
    },
}
