//! SNOMED CT concept component.

use chrono::NaiveDate;

use crate::{well_known, SctId};

/// A concept row from an RF2 release.
///
/// RF2 is append-only: a concept identifier may appear under many effective
/// times, and the store keeps the latest-effective row per identifier.
///
/// # Examples
///
/// ```
/// use hermes_types::Concept;
/// use chrono::NaiveDate;
///
/// let concept = Concept {
///     id: 24700007,
///     effective_time: NaiveDate::from_ymd_opt(2002, 1, 31).unwrap(),
///     active: true,
///     module_id: 900000000000207008,
///     definition_status_id: 900000000000073002,
/// };
/// assert!(concept.is_fully_defined());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Concept {
    /// Concept identifier (concept partition, Verhoeff-checked).
    pub id: SctId,
    /// Date this row became effective.
    pub effective_time: NaiveDate,
    /// Whether the concept is active in the release.
    pub active: bool,
    /// Module that owns this row.
    pub module_id: SctId,
    /// Definition status: fully defined or primitive.
    pub definition_status_id: SctId,
}

impl Concept {
    /// True when the concept is sufficiently defined by its relationships.
    pub fn is_fully_defined(&self) -> bool {
        self.definition_status_id == well_known::DEFINED
    }

    /// True when the concept is primitive.
    pub fn is_primitive(&self) -> bool {
        self.definition_status_id == well_known::PRIMITIVE
    }
}
