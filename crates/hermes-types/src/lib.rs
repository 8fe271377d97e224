//! # hermes-types
//!
//! Component data model for the Hermes SNOMED CT terminology engine.
//!
//! This crate provides:
//! - **Identifiers**: SNOMED CT identifiers with partition decoding and
//!   Verhoeff check-digit verification
//! - **Components**: the RF2 component structs (concepts, descriptions,
//!   relationships, concrete values, reference set items)
//! - **Binary codec**: a compact, endian-stable encoding of every component
//!   variant, used both by the component store and the search index
//!
//! ## Identifier verification
//!
//! ```rust
//! use hermes_types::sctid;
//!
//! // 24700007 |Multiple sclerosis| is a valid concept identifier
//! assert!(sctid::is_valid(24700007));
//! assert_eq!(sctid::partition(24700007), Some(sctid::Partition::Concept));
//! ```
//!
//! ## Codec round-trip
//!
//! ```rust
//! use hermes_types::{codec, Component, Concept};
//! use chrono::NaiveDate;
//!
//! let concept = Concept {
//!     id: 24700007,
//!     effective_time: NaiveDate::from_ymd_opt(2002, 1, 31).unwrap(),
//!     active: true,
//!     module_id: 900000000000207008,
//!     definition_status_id: 900000000000073002,
//! };
//! let bytes = codec::encode_component(&Component::Concept(concept.clone()));
//! assert_eq!(codec::decode_component(&bytes).unwrap(), Component::Concept(concept));
//! ```

#![warn(missing_docs)]

pub mod codec;
mod concept;
mod description;
mod error;
mod refset;
mod relationship;
pub mod sctid;
pub mod well_known;

pub use concept::Concept;
pub use description::{Description, DescriptionType};
pub use error::{ComponentError, ImportRowError};
pub use refset::{FieldId, FieldValue, RefsetBody, RefsetItem, RefsetKind};
pub use relationship::{ConcreteValue, Relationship};
pub use sctid::Partition;

/// SNOMED CT Identifier type.
///
/// RF2 identifiers are decimal integers of up to 18 digits; they fit a
/// 64-bit signed integer, which is what every RF2 consumer exchanges.
pub type SctId = i64;

/// A component as written through the store's batch writer.
///
/// The one-byte kind tag written by [`codec::encode_component`] makes any
/// encoded component self-describing.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Component {
    /// A concept row.
    Concept(Concept),
    /// A description row.
    Description(Description),
    /// A relationship row.
    Relationship(Relationship),
    /// A concrete-value relationship row.
    ConcreteValue(ConcreteValue),
    /// A reference set member row.
    RefsetItem(RefsetItem),
}

impl Component {
    /// Returns the effective time of the underlying row.
    pub fn effective_time(&self) -> chrono::NaiveDate {
        match self {
            Component::Concept(c) => c.effective_time,
            Component::Description(d) => d.effective_time,
            Component::Relationship(r) => r.effective_time,
            Component::ConcreteValue(v) => v.effective_time,
            Component::RefsetItem(i) => i.effective_time,
        }
    }

    /// Returns the active flag of the underlying row.
    pub fn active(&self) -> bool {
        match self {
            Component::Concept(c) => c.active,
            Component::Description(d) => d.active,
            Component::Relationship(r) => r.active,
            Component::ConcreteValue(v) => v.active,
            Component::RefsetItem(i) => i.active,
        }
    }
}
