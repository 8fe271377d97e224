//! # hermes-store
//!
//! The authoritative on-disk substrate of the Hermes terminology engine: a
//! memory-mapped, sorted key-value store holding SNOMED CT components and
//! the derived indices the query layer runs on.
//!
//! ## Buckets
//!
//! The store is one LMDB environment with a fixed set of named databases:
//! primary buckets keyed by component identifier (`concept`, `description`,
//! `relationship`, `concrete-value`, `refset-item`) and derived buckets
//! rebuilt by [`index`] (relationship indices, the transitive IS-A closure,
//! refset membership and reverse-field indices, and the locale caches).
//!
//! ## Lifecycle
//!
//! ```ignore
//! use hermes_store::{index, ComponentStore, OpenMode};
//!
//! let store = ComponentStore::open(&path, OpenMode::ReadWrite)?;
//! store.write_batch(&components)?;
//! index(&store)?;
//! drop(store);
//!
//! let store = ComponentStore::open(&path, OpenMode::ReadOnly)?;
//! let concept = store.concept(24700007)?;
//! ```

#![warn(missing_docs)]

mod error;
pub mod history;
mod indexer;
pub mod keys;
pub mod locale;
mod store;

pub use error::{StoreError, StoreResult};
pub use history::{historical_refsets, with_historical, HistoryProfile};
pub use indexer::{index, module_dependency_report, IndexStats, ModuleDependencyReport};
pub use store::{ComponentStore, OpenMode, StoreStatus, STORE_VERSION};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hermes_types::{
        sctid, well_known, Component, Concept, Description, Partition, RefsetBody, RefsetItem,
        Relationship,
    };
    use uuid::Uuid;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn concept(id: i64) -> Component {
        Component::Concept(Concept {
            id,
            effective_time: date(2020, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        })
    }

    fn is_a(id: i64, source: i64, destination: i64) -> Component {
        Component::Relationship(Relationship {
            id,
            effective_time: date(2020, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: source,
            destination_id: destination,
            relationship_group: 0,
            type_id: well_known::IS_A,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
            modifier_id: well_known::EXISTENTIAL_MODIFIER,
        })
    }

    fn synonym(id: i64, concept_id: i64, term: &str) -> Component {
        Component::Description(Description {
            id,
            effective_time: date(2020, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id,
            language_code: "en".to_string(),
            type_id: well_known::SYNONYM,
            term: term.to_string(),
            case_significance_id: well_known::CASE_INSENSITIVE,
        })
    }

    fn language_member(n: u128, description_id: i64, refset_id: i64, acceptability: i64) -> Component {
        Component::RefsetItem(RefsetItem {
            id: Uuid::from_u128(n),
            effective_time: date(2020, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: description_id,
            body: RefsetBody::Language {
                acceptability_id: acceptability,
            },
        })
    }

    #[test]
    fn test_write_index_and_read_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = ComponentStore::open(&path, OpenMode::ReadWrite).unwrap();

        let root = sctid::synthetic_id(1, Partition::Concept);
        let mid = sctid::synthetic_id(2, Partition::Concept);
        let leaf = sctid::synthetic_id(3, Partition::Concept);
        let d1 = sctid::synthetic_id(10, Partition::Description);
        store
            .write_batch(&[
                concept(root),
                concept(mid),
                concept(leaf),
                is_a(sctid::synthetic_id(100, Partition::Relationship), mid, root),
                is_a(sctid::synthetic_id(101, Partition::Relationship), leaf, mid),
                synonym(d1, leaf, "Leaf concept"),
                language_member(1, d1, well_known::GB_ENGLISH, well_known::PREFERRED),
            ])
            .unwrap();
        index(&store).unwrap();

        assert_eq!(store.concept(leaf).unwrap().unwrap().id, leaf);
        assert_eq!(store.all_parent_ids(leaf).unwrap(), {
            let mut v = vec![root, mid];
            v.sort_unstable();
            v
        });
        assert_eq!(store.all_child_ids(root).unwrap(), {
            let mut v = vec![mid, leaf];
            v.sort_unstable();
            v
        });
        assert_eq!(
            store.preferred_synonym_id(leaf, well_known::GB_ENGLISH).unwrap(),
            Some(d1)
        );
        assert!(store.is_refset_installed(well_known::GB_ENGLISH).unwrap());
        let status = store.status().unwrap();
        assert_eq!(status.concepts, 3);
        assert!(status.indexed);
    }

    #[test]
    fn test_merge_latest_effective_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        let store = ComponentStore::open(&path, OpenMode::ReadWrite).unwrap();
        let id = sctid::synthetic_id(9, Partition::Concept);

        let older = Component::Concept(Concept {
            id,
            effective_time: date(2002, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        });
        let newer = Component::Concept(Concept {
            id,
            effective_time: date(2023, 4, 1),
            active: false,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        });
        // Write out of order: the later effective time must win.
        store.write_batch(&[newer.clone(), older]).unwrap();
        let read = store.concept(id).unwrap().unwrap();
        assert_eq!(read.effective_time, date(2023, 4, 1));
        assert!(!read.active);
    }

    #[test]
    fn test_read_only_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");
        {
            let store = ComponentStore::open(&path, OpenMode::ReadWrite).unwrap();
            store.write_batch(&[concept(sctid::synthetic_id(1, Partition::Concept))]).unwrap();
        }
        let store = ComponentStore::open(&path, OpenMode::ReadOnly).unwrap();
        assert!(matches!(
            store.write_batch(&[concept(sctid::synthetic_id(2, Partition::Concept))]),
            Err(StoreError::ReadOnly)
        ));
    }

    #[test]
    fn test_missing_store_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.db");
        assert!(matches!(
            ComponentStore::open(&path, OpenMode::ReadOnly),
            Err(StoreError::Corrupt(_))
        ));
    }
}
