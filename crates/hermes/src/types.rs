//! API record types and search parameters.

use hermes_types::{Concept, ConcreteValue, Description, Relationship, SctId};
use serde::Serialize;
use std::collections::BTreeMap;

use crate::error::{HermesError, Result};

/// Exclusive upper bound on `max_hits`.
pub const MAX_HITS_LIMIT: usize = 10_000;

/// Options for [`crate::Hermes::open`].
#[derive(Debug, Clone)]
pub struct OpenOptions {
    /// Fallback locale when a request carries no usable accept-language.
    pub default_locale: Option<String>,
    /// Open for queries only; import and index are rejected.
    pub readonly: bool,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            default_locale: None,
            readonly: true,
        }
    }
}

/// One search hit, post locale processing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    /// Matching description.
    pub id: SctId,
    /// The concept it names.
    pub concept_id: SctId,
    /// The matched term.
    pub term: String,
    /// The concept's preferred synonym in the requested locale, when one
    /// was requested and found.
    pub preferred_term: Option<String>,
}

/// A concept expanded with its preferred synonym.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpandedConcept {
    /// The concept.
    pub concept_id: SctId,
    /// Preferred synonym in the requested refsets, when found.
    pub preferred_term: Option<String>,
}

/// Denormalised view of a concept.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtendedConcept {
    /// The concept row.
    pub concept: Concept,
    /// All its descriptions.
    pub descriptions: Vec<Description>,
    /// `{typeId → destination ids}`, IS-A carrying the transitive closure.
    pub parent_relationships: BTreeMap<SctId, Vec<SctId>>,
    /// Direct parent relationship rows.
    pub direct_parent_relationships: Vec<Relationship>,
    /// Concrete values sourced at the concept.
    pub concrete_values: Vec<ConcreteValue>,
    /// Refsets the concept is a member of.
    pub refsets: Vec<SctId>,
}

/// Parameters of [`crate::Hermes::search`].
///
/// # Example
///
/// ```ignore
/// let results = hermes.search(
///     SearchParams::new("mnd")
///         .with_constraint("<64572001")
///         .with_max_hits(5)?,
/// )?;
/// ```
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub(crate) s: String,
    pub(crate) max_hits: usize,
    pub(crate) constraint: Option<String>,
    pub(crate) properties: Vec<(SctId, Vec<SctId>)>,
    pub(crate) concept_refsets: Vec<SctId>,
    pub(crate) fuzzy: u32,
    pub(crate) fallback_fuzzy: u32,
    pub(crate) inactive_concepts: bool,
    pub(crate) inactive_descriptions: bool,
    pub(crate) remove_duplicates: bool,
    pub(crate) show_fsn: bool,
    pub(crate) accept_language: Option<String>,
}

impl SearchParams {
    /// Parameters for a term search; a blank string degenerates to a pure
    /// filter query.
    pub fn new(s: impl Into<String>) -> Self {
        Self {
            s: s.into(),
            max_hits: 200,
            constraint: None,
            properties: Vec::new(),
            concept_refsets: Vec::new(),
            fuzzy: 0,
            fallback_fuzzy: 0,
            inactive_concepts: false,
            inactive_descriptions: false,
            remove_duplicates: false,
            show_fsn: false,
            accept_language: None,
        }
    }

    /// Caps the number of hits; the legal range is `1..=9999`.
    pub fn with_max_hits(mut self, max_hits: usize) -> Result<Self> {
        if max_hits == 0 || max_hits >= MAX_HITS_LIMIT {
            return Err(HermesError::InvalidParameter(format!(
                "max_hits must be greater than 0 and less than {MAX_HITS_LIMIT}, got {max_hits}"
            )));
        }
        self.max_hits = max_hits;
        Ok(self)
    }

    /// Constrains results to an ECL expression.
    pub fn with_constraint(mut self, ecl: impl Into<String>) -> Self {
        self.constraint = Some(ecl.into());
        self
    }

    /// Requires an attribute with a destination in the given set.
    pub fn with_property(mut self, type_id: SctId, values: Vec<SctId>) -> Self {
        self.properties.push((type_id, values));
        self
    }

    /// Requires membership of any of the given refsets.
    pub fn with_concept_refsets(mut self, refsets: Vec<SctId>) -> Self {
        self.concept_refsets = refsets;
        self
    }

    /// Replaces term matching with fuzzy matching at the given distance.
    pub fn with_fuzzy(mut self, distance: u32) -> Self {
        self.fuzzy = distance;
        self
    }

    /// Retries once at this distance when the exact search yields nothing.
    pub fn with_fallback_fuzzy(mut self, distance: u32) -> Self {
        self.fallback_fuzzy = distance;
        self
    }

    /// Includes descriptions of inactive concepts.
    pub fn include_inactive_concepts(mut self) -> Self {
        self.inactive_concepts = true;
        self
    }

    /// Includes inactive descriptions.
    pub fn include_inactive_descriptions(mut self) -> Self {
        self.inactive_descriptions = true;
        self
    }

    /// Elides results sharing `(conceptId, term)`.
    pub fn remove_duplicates(mut self) -> Self {
        self.remove_duplicates = true;
        self
    }

    /// Includes fully specified names in the results.
    pub fn show_fsn(mut self) -> Self {
        self.show_fsn = true;
        self
    }

    /// Locale for preferred-term substitution.
    pub fn with_accept_language(mut self, language: impl Into<String>) -> Self {
        self.accept_language = Some(language.into());
        self
    }
}
