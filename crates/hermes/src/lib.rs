//! # hermes
//!
//! A SNOMED CT terminology engine: ingest RF2 release content into a
//! memory-mapped component store, derive subsumption and search indices,
//! and answer structural, full-text and ECL questions at interactive
//! latency.
//!
//! ## Opening a service
//!
//! ```ignore
//! use hermes::{Hermes, OpenOptions, SearchParams};
//!
//! let hermes = Hermes::open(&path, OpenOptions::default())?;
//!
//! // Structural navigation.
//! assert!(hermes.subsumed_by(24700007, 64572001)?);
//!
//! // Locale-aware terms.
//! let appendicectomy = hermes.preferred_synonym(80146002, "en-GB")?;
//!
//! // Search and ECL expansion.
//! let hits = hermes.search(SearchParams::new("mnd").with_constraint("<64572001"))?;
//! let concepts = hermes.expand_ecl("<<24700007")?;
//! ```
//!
//! ## Building a service
//!
//! ```ignore
//! let mut hermes = Hermes::open(&path, OpenOptions { readonly: false, ..Default::default() })?;
//! hermes.import_batch(&components)?;
//! hermes.index()?;
//! ```
//!
//! The crate is the facade over the `hermes-types`, `hermes-store`,
//! `hermes-search` and `hermes-ecl` layers; HTTP and CLI front ends sit on
//! top of this API.

#![warn(missing_docs)]

mod error;
mod facade;
mod registry;
mod types;

pub use error::{HermesError, Result};
pub use facade::{CancelToken, Hermes, SERVICE_VERSION};
pub use registry::{open_services, shutdown_all};
pub use types::{
    ExpandedConcept, ExtendedConcept, OpenOptions, SearchParams, SearchResult, MAX_HITS_LIMIT,
};

pub use hermes_store::{HistoryProfile, IndexStats, ModuleDependencyReport, StoreStatus};
pub use hermes_types::{
    sctid, well_known, Component, Concept, ConcreteValue, Description, DescriptionType, FieldId,
    Partition, RefsetBody, RefsetItem, RefsetKind, Relationship, SctId,
};
