//! SNOMED CT relationship and concrete-value components.

use chrono::NaiveDate;

use crate::{well_known, SctId};

/// A relationship row from an RF2 release.
///
/// Relationships with `type_id` IS-A form the subsumption spine; everything
/// else is an attribute of the source concept.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Relationship {
    /// Relationship identifier (relationship partition, Verhoeff-checked).
    pub id: SctId,
    /// Date this row became effective.
    pub effective_time: NaiveDate,
    /// Whether the relationship is active.
    pub active: bool,
    /// Module that owns this row.
    pub module_id: SctId,
    /// Source concept.
    pub source_id: SctId,
    /// Destination concept.
    pub destination_id: SctId,
    /// Relationship group; zero means ungrouped.
    pub relationship_group: u32,
    /// Relationship type (the attribute).
    pub type_id: SctId,
    /// Stated or inferred.
    pub characteristic_type_id: SctId,
    /// Modifier; in practice always the existential restriction.
    pub modifier_id: SctId,
}

impl Relationship {
    /// True for IS-A relationships.
    pub fn is_a(&self) -> bool {
        self.type_id == well_known::IS_A
    }
}

/// A concrete-value relationship row.
///
/// The value is the RF2 literal as released: numbers prefixed with `#`,
/// strings quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConcreteValue {
    /// Relationship identifier.
    pub id: SctId,
    /// Date this row became effective.
    pub effective_time: NaiveDate,
    /// Whether the row is active.
    pub active: bool,
    /// Module that owns this row.
    pub module_id: SctId,
    /// Source concept.
    pub source_id: SctId,
    /// The literal value, e.g. `#500` or `"mg"`.
    pub value: String,
    /// Relationship group; zero means ungrouped.
    pub relationship_group: u32,
    /// Relationship type (the attribute).
    pub type_id: SctId,
    /// Stated or inferred.
    pub characteristic_type_id: SctId,
    /// Modifier.
    pub modifier_id: SctId,
}

impl ConcreteValue {
    /// Parses a `#`-prefixed numeric literal, if this value is one.
    pub fn numeric_value(&self) -> Option<f64> {
        self.value.strip_prefix('#').and_then(|v| v.parse().ok())
    }

    /// Returns the unquoted string literal, if this value is one.
    pub fn string_value(&self) -> Option<&str> {
        self.value
            .strip_prefix('"')
            .and_then(|v| v.strip_suffix('"'))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concrete_value_literals() {
        let mut value = ConcreteValue {
            id: 1,
            effective_time: NaiveDate::from_ymd_opt(2021, 1, 31).unwrap(),
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: 322236009,
            value: "#500".to_string(),
            relationship_group: 1,
            type_id: 1142135004,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
            modifier_id: well_known::EXISTENTIAL_MODIFIER,
        };
        assert_eq!(value.numeric_value(), Some(500.0));
        assert_eq!(value.string_value(), None);

        value.value = "\"mg\"".to_string();
        assert_eq!(value.numeric_value(), None);
        assert_eq!(value.string_value(), Some("mg"));
    }
}
