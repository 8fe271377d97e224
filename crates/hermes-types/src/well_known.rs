//! Well-known SNOMED CT concept identifiers.
//!
//! Constants for the metadata concepts the engine relies on: the hierarchy
//! root, description and acceptability types, language and association
//! reference sets, and the reference-set descriptor machinery.

use crate::SctId;

// =============================================================================
// Roots
// =============================================================================

/// SNOMED CT root concept (138875005).
pub const ROOT: SctId = 138875005;

/// IS-A relationship type (116680003); the subsumption spine.
pub const IS_A: SctId = 116680003;

/// Reference set (foundation metadata concept) — ancestor of every
/// installed reference set (900000000000455006).
pub const REFSET_ROOT: SctId = 900000000000455006;

/// Concept model attribute (410662002) — ancestor of every attribute type
/// usable in an ECL refinement.
pub const CONCEPT_MODEL_ATTRIBUTE: SctId = 410662002;

// =============================================================================
// Description types
// =============================================================================

/// Fully specified name description type (900000000000003001).
pub const FULLY_SPECIFIED_NAME: SctId = 900000000000003001;

/// Synonym description type (900000000000013009).
pub const SYNONYM: SctId = 900000000000013009;

/// Definition description type (900000000000550004).
pub const DEFINITION: SctId = 900000000000550004;

// =============================================================================
// Case significance
// =============================================================================

/// Entire term case sensitive (900000000000017005).
pub const ENTIRE_TERM_CASE_SENSITIVE: SctId = 900000000000017005;

/// Entire term case insensitive (900000000000448009).
pub const CASE_INSENSITIVE: SctId = 900000000000448009;

/// Only initial character case insensitive (900000000000020002).
pub const INITIAL_CHARACTER_CASE_INSENSITIVE: SctId = 900000000000020002;

// =============================================================================
// Definition status
// =============================================================================

/// Sufficiently defined by necessary conditions (900000000000073002).
pub const DEFINED: SctId = 900000000000073002;

/// Primitive definition status (900000000000074008).
pub const PRIMITIVE: SctId = 900000000000074008;

// =============================================================================
// Characteristic types and modifiers
// =============================================================================

/// Stated relationship (900000000000010007).
pub const STATED_RELATIONSHIP: SctId = 900000000000010007;

/// Inferred relationship (900000000000011006).
pub const INFERRED_RELATIONSHIP: SctId = 900000000000011006;

/// Existential restriction modifier (900000000000451002).
pub const EXISTENTIAL_MODIFIER: SctId = 900000000000451002;

// =============================================================================
// Modules
// =============================================================================

/// SNOMED CT core module (900000000000207008).
pub const CORE_MODULE: SctId = 900000000000207008;

/// SNOMED CT model component module (900000000000012004).
pub const MODEL_MODULE: SctId = 900000000000012004;

// =============================================================================
// Language reference sets and acceptability
// =============================================================================

/// Preferred acceptability (900000000000548007).
pub const PREFERRED: SctId = 900000000000548007;

/// Acceptable acceptability (900000000000549004).
pub const ACCEPTABLE: SctId = 900000000000549004;

/// Great Britain English language reference set (900000000000508004).
pub const GB_ENGLISH: SctId = 900000000000508004;

/// United States English language reference set (900000000000509007).
pub const US_ENGLISH: SctId = 900000000000509007;

// =============================================================================
// Historical associations
// =============================================================================

/// Historical association reference set root (900000000000522004).
pub const HISTORICAL_ASSOCIATION: SctId = 900000000000522004;

/// SAME AS association reference set (900000000000527005).
pub const SAME_AS: SctId = 900000000000527005;

/// REPLACED BY association reference set (900000000000526001).
pub const REPLACED_BY: SctId = 900000000000526001;

/// POSSIBLY EQUIVALENT TO association reference set (900000000000523009).
pub const POSSIBLY_EQUIVALENT_TO: SctId = 900000000000523009;

/// PARTIALLY EQUIVALENT TO association reference set (1186924009).
pub const PARTIALLY_EQUIVALENT_TO: SctId = 1186924009;

/// WAS A association reference set (900000000000528000).
pub const WAS_A: SctId = 900000000000528000;

/// MOVED TO association reference set (900000000000524003).
pub const MOVED_TO: SctId = 900000000000524003;

// =============================================================================
// Structural reference sets
// =============================================================================

/// Reference set descriptor reference set (900000000000456007).
pub const REFSET_DESCRIPTOR_REFSET: SctId = 900000000000456007;

/// Module dependency reference set (900000000000534007).
pub const MODULE_DEPENDENCY_REFSET: SctId = 900000000000534007;

/// OWL axiom reference set (733073007).
pub const OWL_AXIOM_REFSET: SctId = 733073007;

/// OWL ontology reference set (762103008).
pub const OWL_ONTOLOGY_REFSET: SctId = 762103008;

/// ICD-10 complex map reference set (447562003).
pub const ICD10_COMPLEX_MAP: SctId = 447562003;
