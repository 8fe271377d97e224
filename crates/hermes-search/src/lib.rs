//! # hermes-search
//!
//! The search subsystem of the Hermes terminology engine: an inverted index
//! over description terms with per-document stored fields and facet posting
//! lists, a second index over refset members, and the composable query
//! primitives the ECL compiler lowers to.
//!
//! ## Queries
//!
//! ```ignore
//! use hermes_search::Query;
//!
//! // Active synonyms of descendants of a concept, matching a prefix.
//! let q = Query::and([
//!     Query::term("mnd"),
//!     Query::DescendantOrSelfOf(64572001),
//!     Query::ActiveConcept(true),
//!     Query::IsFsn(false),
//! ]);
//! let hits = index.query_for_results(&store, &q, &tokens, 10, false)?;
//! ```
//!
//! Closure operators realise against posting lists written at index time;
//! nothing walks the IS-A graph at query time.

#![warn(missing_docs)]

mod document;
mod error;
mod index;
mod members;
mod query;
pub mod tokenizer;

pub use document::DocumentRecord;
pub use error::{SearchError, SearchResult};
pub use index::{BuildStats, SearchIndex, MAX_ATTR_COUNT, SEARCH_VERSION};
pub use members::{MemberFilter, MemberIndex, MemberOp, MEMBERS_VERSION};
pub use query::{AcceptabilityKind, Query, SearchHit};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hermes_store::{index as index_store, ComponentStore, OpenMode};
    use hermes_types::{
        sctid, well_known, Component, Concept, Description, FieldId, Partition, RefsetBody,
        RefsetItem, Relationship,
    };
    use uuid::Uuid;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
    }

    fn concept(id: i64) -> Component {
        Component::Concept(Concept {
            id,
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        })
    }

    fn is_a(id: i64, source: i64, destination: i64) -> Component {
        Component::Relationship(Relationship {
            id,
            effective_time: date(),
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
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id,
            language_code: "en".to_string(),
            type_id: well_known::SYNONYM,
            term: term.to_string(),
            case_significance_id: well_known::CASE_INSENSITIVE,
        })
    }

    fn simple_member(n: u128, refset_id: i64, referenced: i64) -> Component {
        Component::RefsetItem(RefsetItem {
            id: Uuid::from_u128(n),
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: referenced,
            body: RefsetBody::Simple,
        })
    }

    fn map_member(n: u128, refset_id: i64, referenced: i64, target: &str) -> Component {
        Component::RefsetItem(RefsetItem {
            id: Uuid::from_u128(n),
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id,
            referenced_component_id: referenced,
            body: RefsetBody::SimpleMap {
                map_target: target.to_string(),
            },
        })
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ComponentStore,
        index: SearchIndex,
        members: MemberIndex,
        root: i64,
        disease: i64,
        ms: i64,
        mnd: i64,
        refset: i64,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store = ComponentStore::open(&dir.path().join("store.db"), OpenMode::ReadWrite).unwrap();

        let root = sctid::synthetic_id(1, Partition::Concept);
        let disease = sctid::synthetic_id(2, Partition::Concept);
        let ms = sctid::synthetic_id(3, Partition::Concept);
        let mnd = sctid::synthetic_id(4, Partition::Concept);
        let refset = sctid::synthetic_id(5, Partition::Concept);
        let mut rel = 100i64;
        let mut next_rel = || {
            rel += 1;
            sctid::synthetic_id(rel, Partition::Relationship)
        };
        store
            .write_batch(&[
                concept(root),
                concept(disease),
                concept(ms),
                concept(mnd),
                concept(refset),
                is_a(next_rel(), disease, root),
                is_a(next_rel(), ms, disease),
                is_a(next_rel(), mnd, disease),
                synonym(sctid::synthetic_id(10, Partition::Description), root, "SNOMED CT Concept"),
                synonym(sctid::synthetic_id(11, Partition::Description), disease, "Disease"),
                synonym(sctid::synthetic_id(12, Partition::Description), ms, "Multiple sclerosis"),
                synonym(sctid::synthetic_id(13, Partition::Description), mnd, "Motor neuron disease"),
                synonym(sctid::synthetic_id(14, Partition::Description), mnd, "MND - Motor neurone disease"),
                simple_member(1, refset, ms),
                map_member(2, refset, ms, "G35"),
                map_member(3, refset, mnd, "G12.2"),
            ])
            .unwrap();
        index_store(&store).unwrap();

        let index = SearchIndex::build(&store, &dir.path().join("search.db")).unwrap();
        let members = MemberIndex::build(&store, &dir.path().join("members.db")).unwrap();
        Fixture {
            _dir: dir,
            store,
            index,
            members,
            root,
            disease,
            ms,
            mnd,
            refset,
        }
    }

    #[test]
    fn test_descendant_queries() {
        let f = fixture();
        let q = Query::DescendantOrSelfOf(f.disease);
        let concepts = f.index.concept_ids_matching(&f.store, &q).unwrap();
        assert!(concepts.contains(&f.disease));
        assert!(concepts.contains(&f.ms));
        assert!(concepts.contains(&f.mnd));
        assert!(!concepts.contains(&f.root));

        let strict = f
            .index
            .concept_ids_matching(&f.store, &Query::DescendantOf(f.disease))
            .unwrap();
        assert!(!strict.contains(&f.disease));
        assert!(strict.contains(&f.ms));
    }

    #[test]
    fn test_term_prefix_search() {
        let f = fixture();
        let q = Query::and([Query::term("mnd"), Query::DescendantOrSelfOf(f.root)]);
        let hits = f
            .index
            .query_for_results(&f.store, &q, &["mnd".to_string()], 10, false)
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].concept_id, f.mnd);

        let q = Query::term("mot");
        let hits = f
            .index
            .query_for_results(&f.store, &q, &["mot".to_string()], 10, false)
            .unwrap();
        assert!(hits.iter().any(|h| h.term == "Motor neuron disease"));
    }

    #[test]
    fn test_member_of_query() {
        let f = fixture();
        let concepts = f
            .index
            .concept_ids_matching(&f.store, &Query::member_of(f.refset))
            .unwrap();
        assert!(concepts.contains(&f.ms));
        assert!(concepts.contains(&f.mnd));
        assert!(!concepts.contains(&f.disease));
    }

    #[test]
    fn test_boolean_composition() {
        let f = fixture();
        let q = Query::not(
            Query::DescendantOrSelfOf(f.disease),
            Query::ConceptId(f.ms),
        );
        let concepts = f.index.concept_ids_matching(&f.store, &q).unwrap();
        assert!(!concepts.contains(&f.ms));
        assert!(concepts.contains(&f.mnd));
    }

    #[test]
    fn test_results_ordering_and_duplicates() {
        let f = fixture();
        let q = Query::term("motor");
        let hits = f
            .index
            .query_for_results(&f.store, &q, &["motor".to_string()], 10, false)
            .unwrap();
        // The shorter term scores higher.
        assert!(hits.len() >= 2);
        assert_eq!(hits[0].term, "Motor neuron disease");
        assert!(hits[0].score >= hits[1].score);

        let limited = f
            .index
            .query_for_results(&f.store, &q, &["motor".to_string()], 1, false)
            .unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_member_filters() {
        let f = fixture();
        let items = f
            .members
            .members_matching(
                &[f.refset],
                &[MemberFilter::prefix(FieldId::MapTarget, &b"G35"[..])],
            )
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].referenced_component_id, f.ms);

        let ids = f
            .members
            .referenced_ids(&[f.refset], &[MemberFilter::prefix(FieldId::MapTarget, &b"G"[..])])
            .unwrap();
        assert_eq!(ids.len(), 2);
    }

    #[test]
    fn test_fuzzy_query() {
        let f = fixture();
        let q = Query::TermFuzzy {
            tokens: vec!["sclerosos".to_string()],
            distance: 2,
        };
        let concepts = f.index.concept_ids_matching(&f.store, &q).unwrap();
        assert!(concepts.contains(&f.ms));
    }

    #[test]
    fn test_wildcard_query() {
        let f = fixture();
        let q = Query::Wildcard("scler*".to_string());
        let concepts = f.index.concept_ids_matching(&f.store, &q).unwrap();
        assert!(concepts.contains(&f.ms));
    }
}
