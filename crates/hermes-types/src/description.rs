//! SNOMED CT description component.

use chrono::NaiveDate;

use crate::{well_known, SctId};

/// Classification of a description by its type identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DescriptionType {
    /// Fully specified name, unique per concept and language.
    FullySpecifiedName,
    /// Synonym, the human-facing terms.
    Synonym,
    /// Textual definition.
    Definition,
}

impl DescriptionType {
    /// Resolves a type identifier to its classification.
    pub fn from_id(type_id: SctId) -> Option<Self> {
        match type_id {
            well_known::FULLY_SPECIFIED_NAME => Some(DescriptionType::FullySpecifiedName),
            well_known::SYNONYM => Some(DescriptionType::Synonym),
            well_known::DEFINITION => Some(DescriptionType::Definition),
            _ => None,
        }
    }
}

/// A description row from an RF2 release.
///
/// The `term` is arbitrary UTF-8; most terms are short but textual
/// definitions run to kilobytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Description {
    /// Description identifier (description partition, Verhoeff-checked).
    pub id: SctId,
    /// Date this row became effective.
    pub effective_time: NaiveDate,
    /// Whether the description is active.
    pub active: bool,
    /// Module that owns this row.
    pub module_id: SctId,
    /// The concept this description names.
    pub concept_id: SctId,
    /// ISO 639-1 language code, e.g. `en`.
    pub language_code: String,
    /// Description type identifier.
    pub type_id: SctId,
    /// The term itself.
    pub term: String,
    /// Case significance identifier.
    pub case_significance_id: SctId,
}

impl Description {
    /// Returns the description's classification, if recognised.
    pub fn description_type(&self) -> Option<DescriptionType> {
        DescriptionType::from_id(self.type_id)
    }

    /// True for fully specified names.
    pub fn is_fsn(&self) -> bool {
        self.type_id == well_known::FULLY_SPECIFIED_NAME
    }

    /// True for synonyms.
    pub fn is_synonym(&self) -> bool {
        self.type_id == well_known::SYNONYM
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixture(type_id: SctId) -> Description {
        Description {
            id: 754786011,
            effective_time: NaiveDate::from_ymd_opt(2002, 1, 31).unwrap(),
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id: 73211009,
            language_code: "en".to_string(),
            type_id,
            term: "Diabetes mellitus (disorder)".to_string(),
            case_significance_id: well_known::CASE_INSENSITIVE,
        }
    }

    #[test]
    fn test_description_type_classification() {
        assert!(fixture(well_known::FULLY_SPECIFIED_NAME).is_fsn());
        assert!(fixture(well_known::SYNONYM).is_synonym());
        assert_eq!(
            fixture(well_known::DEFINITION).description_type(),
            Some(DescriptionType::Definition)
        );
        assert_eq!(fixture(12345).description_type(), None);
    }
}
