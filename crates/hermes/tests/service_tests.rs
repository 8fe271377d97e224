//! End-to-end tests over a synthetic ontology.
//!
//! The fixture loads a miniature release using genuine SNOMED CT
//! identifiers (all Verhoeff-valid), indexes it, and exercises the facade
//! the way the HTTP and CLI front ends do.

use std::sync::mpsc::sync_channel;

use chrono::NaiveDate;
use uuid::Uuid;

use hermes::{
    sctid, well_known, CancelToken, Component, Concept, Description, Hermes, HermesError,
    OpenOptions, Partition, RefsetBody, RefsetItem, Relationship, SearchParams,
};

// Concepts of the miniature ontology.
const ROOT: i64 = 138875005;
const CLINICAL_FINDING: i64 = 404684003;
const DISEASE: i64 = 64572001;
const MS: i64 = 24700007;
const MND: i64 = 37340000;
const RRMS: i64 = 426373005;
const PPMS: i64 = 816984002;
const PROCEDURE: i64 = 71388002;
const APPENDICECTOMY: i64 = 80146002;
const CONTEXT: i64 = 315560000;
const OLD_MS: i64 = 586591000000100;
const ICD_MAP: i64 = 447562003;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn concept(id: i64, active: bool) -> Component {
    Component::Concept(Concept {
        id,
        effective_time: date(2020, 1, 31),
        active,
        module_id: well_known::CORE_MODULE,
        definition_status_id: well_known::PRIMITIVE,
    })
}

fn is_a(n: i64, source: i64, destination: i64) -> Component {
    Component::Relationship(Relationship {
        id: sctid::synthetic_id(n, Partition::Relationship),
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

fn description(n: i64, concept_id: i64, type_id: i64, term: &str) -> (i64, Component) {
    let id = sctid::synthetic_id(n, Partition::Description);
    let component = Component::Description(Description {
        id,
        effective_time: date(2020, 1, 31),
        active: true,
        module_id: well_known::CORE_MODULE,
        concept_id,
        language_code: "en".to_string(),
        type_id,
        term: term.to_string(),
        case_significance_id: well_known::CASE_INSENSITIVE,
    });
    (id, component)
}

fn refset_member(n: u128, refset_id: i64, referenced: i64, body: RefsetBody) -> Component {
    Component::RefsetItem(RefsetItem {
        id: Uuid::from_u128(n),
        effective_time: date(2020, 1, 31),
        active: true,
        module_id: well_known::CORE_MODULE,
        refset_id,
        referenced_component_id: referenced,
        body,
    })
}

fn language(n: u128, description_id: i64, refset_id: i64, acceptability: i64) -> Component {
    refset_member(
        n,
        refset_id,
        description_id,
        RefsetBody::Language {
            acceptability_id: acceptability,
        },
    )
}

fn fixture() -> (tempfile::TempDir, Hermes) {
    let dir = tempfile::tempdir().unwrap();
    let mut hermes = Hermes::open(
        dir.path(),
        OpenOptions {
            default_locale: Some("en-GB".to_string()),
            readonly: false,
        },
    )
    .unwrap();

    let mut batch = vec![
        concept(ROOT, true),
        concept(CLINICAL_FINDING, true),
        concept(DISEASE, true),
        concept(MS, true),
        concept(MND, true),
        concept(RRMS, true),
        concept(PPMS, true),
        concept(PROCEDURE, true),
        concept(APPENDICECTOMY, true),
        concept(CONTEXT, true),
        concept(OLD_MS, false),
        concept(ICD_MAP, true),
        concept(well_known::GB_ENGLISH, true),
        concept(well_known::US_ENGLISH, true),
        concept(well_known::HISTORICAL_ASSOCIATION, true),
        concept(well_known::REPLACED_BY, true),
        is_a(1, CLINICAL_FINDING, ROOT),
        is_a(2, DISEASE, CLINICAL_FINDING),
        is_a(3, MS, DISEASE),
        is_a(4, MND, DISEASE),
        is_a(5, RRMS, MS),
        is_a(6, PPMS, MS),
        is_a(7, PROCEDURE, ROOT),
        is_a(8, APPENDICECTOMY, PROCEDURE),
        is_a(9, CONTEXT, ROOT),
        is_a(10, ICD_MAP, ROOT),
        is_a(11, well_known::HISTORICAL_ASSOCIATION, ROOT),
        is_a(12, well_known::REPLACED_BY, well_known::HISTORICAL_ASSOCIATION),
    ];

    let (_ms_fsn, component) = description(100, MS, well_known::FULLY_SPECIFIED_NAME, "Multiple sclerosis (disorder)");
    batch.push(component);
    let (ms_syn, component) = description(101, MS, well_known::SYNONYM, "Multiple sclerosis");
    batch.push(component);
    let (mnd_syn, component) = description(102, MND, well_known::SYNONYM, "Motor neuron disease");
    batch.push(component);
    let (mnd_acronym, component) =
        description(103, MND, well_known::SYNONYM, "MND - Motor neurone disease");
    batch.push(component);
    let (appx_gb, component) = description(104, APPENDICECTOMY, well_known::SYNONYM, "Appendicectomy");
    batch.push(component);
    let (appx_us, component) = description(105, APPENDICECTOMY, well_known::SYNONYM, "Appendectomy");
    batch.push(component);
    for (n, concept_id, term) in [
        (106, ROOT, "SNOMED CT Concept"),
        (107, CLINICAL_FINDING, "Clinical finding"),
        (108, DISEASE, "Disease"),
        (109, RRMS, "Relapsing remitting multiple sclerosis"),
        (110, PPMS, "Primary progressive multiple sclerosis"),
        (111, PROCEDURE, "Procedure"),
        (112, CONTEXT, "History of clinical finding in subject"),
        (113, OLD_MS, "Multiple sclerosis NOS"),
    ] {
        let (_, component) = description(n, concept_id, well_known::SYNONYM, term);
        batch.push(component);
    }

    // Language acceptability: GB and US mostly agree, appendicectomy does
    // not.
    for (n, description_id, refset, acceptability) in [
        (1, ms_syn, well_known::GB_ENGLISH, well_known::PREFERRED),
        (2, ms_syn, well_known::US_ENGLISH, well_known::PREFERRED),
        (3, mnd_syn, well_known::GB_ENGLISH, well_known::PREFERRED),
        (4, mnd_syn, well_known::US_ENGLISH, well_known::PREFERRED),
        (5, mnd_acronym, well_known::GB_ENGLISH, well_known::ACCEPTABLE),
        (6, appx_gb, well_known::GB_ENGLISH, well_known::PREFERRED),
        (7, appx_us, well_known::US_ENGLISH, well_known::PREFERRED),
        (8, appx_us, well_known::GB_ENGLISH, well_known::ACCEPTABLE),
    ] {
        batch.push(language(n, description_id, refset, acceptability));
    }

    // ICD-10 crossmap for multiple sclerosis.
    batch.push(refset_member(
        100,
        ICD_MAP,
        MS,
        RefsetBody::ComplexMap {
            map_group: 1,
            map_priority: 1,
            map_rule: "TRUE".to_string(),
            map_advice: "ALWAYS G35".to_string(),
            map_target: "G35".to_string(),
            correlation_id: 447561005,
        },
    ));

    // Historical association: the retired UK concept was replaced by MS.
    batch.push(refset_member(
        101,
        well_known::REPLACED_BY,
        OLD_MS,
        RefsetBody::Association {
            target_component_id: MS,
        },
    ));

    // Module dependencies: one satisfiable, one citing a missing version.
    batch.push(Component::RefsetItem(RefsetItem {
        id: Uuid::from_u128(102),
        effective_time: date(2020, 1, 31),
        active: true,
        module_id: well_known::MODEL_MODULE,
        refset_id: well_known::MODULE_DEPENDENCY_REFSET,
        referenced_component_id: well_known::CORE_MODULE,
        body: RefsetBody::ModuleDependency {
            source_effective_time: date(2020, 1, 31),
            target_effective_time: date(2020, 1, 31),
        },
    }));
    batch.push(Component::RefsetItem(RefsetItem {
        id: Uuid::from_u128(103),
        effective_time: date(2020, 1, 31),
        active: true,
        module_id: well_known::CORE_MODULE,
        refset_id: well_known::MODULE_DEPENDENCY_REFSET,
        referenced_component_id: well_known::MODEL_MODULE,
        body: RefsetBody::ModuleDependency {
            source_effective_time: date(2020, 1, 31),
            target_effective_time: date(2019, 7, 31),
        },
    }));

    hermes.import_batch(&batch).unwrap();
    hermes.index().unwrap();
    (dir, hermes)
}

#[test]
fn test_concept_lookup() {
    let (_dir, hermes) = fixture();
    assert_eq!(hermes.concept(MS).unwrap().id, MS);
    assert!(matches!(
        hermes.concept(24700008),
        Err(HermesError::InvalidIdentifier { .. })
    ));
    // Valid identifier, absent concept.
    assert!(matches!(
        hermes.concept(22298006),
        Err(HermesError::NotFound(_))
    ));
}

#[test]
fn test_preferred_synonym_by_locale() {
    let (_dir, hermes) = fixture();
    assert_eq!(
        hermes.preferred_synonym(APPENDICECTOMY, "en-GB").unwrap().unwrap().term,
        "Appendicectomy"
    );
    assert_eq!(
        hermes.preferred_synonym(APPENDICECTOMY, "en-US").unwrap().unwrap().term,
        "Appendectomy"
    );
    // Deterministic: same inputs, same answer.
    let a = hermes.preferred_synonym(MS, "en-GB").unwrap().unwrap();
    let b = hermes.preferred_synonym(MS, "en-GB").unwrap().unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_subsumption() {
    let (_dir, hermes) = fixture();
    // Reflexive.
    assert!(hermes.subsumed_by(MS, MS).unwrap());
    assert!(hermes.subsumed_by(MS, DISEASE).unwrap());
    assert!(hermes.subsumed_by(RRMS, CLINICAL_FINDING).unwrap());
    assert!(!hermes.subsumed_by(MS, PROCEDURE).unwrap());

    // The closure contains the direct parents.
    let parents = hermes.all_parents(MS).unwrap();
    for relationship in hermes.parent_relationships_of_type(MS, well_known::IS_A).unwrap() {
        assert!(parents.contains(&relationship.destination_id));
    }
    assert!(hermes.all_children(DISEASE).unwrap().contains(&RRMS));
}

#[test]
fn test_expand_ecl_descendants() {
    let (_dir, hermes) = fixture();
    let expansion = hermes.expand_ecl("<<24700007").unwrap();
    for expected in [MS, RRMS, PPMS] {
        assert!(expansion.contains(&expected), "missing {expected}");
    }
    let strict = hermes.expand_ecl("<24700007").unwrap();
    assert!(!strict.contains(&MS));
    assert!(strict.contains(&RRMS));
}

#[test]
fn test_intersect_ecl() {
    let (_dir, hermes) = fixture();
    assert_eq!(hermes.intersect_ecl(&[MS], "^447562003").unwrap(), vec![MS]);
    assert_eq!(
        hermes.intersect_ecl(&[CONTEXT, MS], "<64572001").unwrap(),
        vec![MS]
    );

    // Law: intersect equals the intersection with the full expansion.
    let expansion = hermes.expand_ecl("<64572001").unwrap();
    let intersect = hermes.intersect_ecl(&[CONTEXT, MS, MND], "<64572001").unwrap();
    let expected: Vec<i64> = [CONTEXT, MS, MND]
        .into_iter()
        .filter(|id| expansion.contains(id))
        .collect();
    assert_eq!(intersect, {
        let mut e = expected;
        e.sort_unstable();
        e
    });
}

#[test]
fn test_search_with_constraint() {
    let (_dir, hermes) = fixture();
    let results = hermes
        .search(
            SearchParams::new("mnd")
                .with_constraint("<64572001")
                .with_accept_language("en-GB")
                .with_max_hits(5)
                .unwrap(),
        )
        .unwrap();
    assert!(!results.is_empty());
    assert!(results.len() <= 5);
    assert_eq!(results[0].concept_id, MND);
    assert_eq!(results[0].preferred_term.as_deref(), Some("Motor neuron disease"));
}

#[test]
fn test_search_blank_and_bounds() {
    let (_dir, hermes) = fixture();
    // Blank search degenerates to a filter query and must not raise.
    let results = hermes
        .search(SearchParams::new("").with_max_hits(7).unwrap())
        .unwrap();
    assert!(results.len() <= 7);

    assert!(matches!(
        SearchParams::new("x").with_max_hits(0),
        Err(HermesError::InvalidParameter(_))
    ));
    assert!(matches!(
        SearchParams::new("x").with_max_hits(10_000),
        Err(HermesError::InvalidParameter(_))
    ));
    assert!(SearchParams::new("x").with_max_hits(9_999).is_ok());
}

#[test]
fn test_search_fuzzy_fallback() {
    let (_dir, hermes) = fixture();
    let exact = hermes
        .search(SearchParams::new("sclerosos").with_max_hits(10).unwrap())
        .unwrap();
    assert!(exact.is_empty());

    let fuzzy = hermes
        .search(
            SearchParams::new("sclerosos")
                .with_fallback_fuzzy(2)
                .with_max_hits(10)
                .unwrap(),
        )
        .unwrap();
    assert!(fuzzy.iter().any(|r| r.concept_id == MS));
}

#[test]
fn test_search_duplicate_removal() {
    let (_dir, hermes) = fixture();
    let results = hermes
        .search(SearchParams::new("multiple sclerosis").remove_duplicates())
        .unwrap();
    let mut seen = std::collections::HashSet::new();
    for result in &results {
        assert!(seen.insert((result.concept_id, result.term.clone())));
    }
}

#[test]
fn test_reverse_map() {
    let (_dir, hermes) = fixture();
    let items = hermes.reverse_map(ICD_MAP, "G35").unwrap();
    assert!(!items.is_empty());
    for item in &items {
        assert_eq!(item.referenced_component_id, MS);
        match &item.body {
            RefsetBody::ComplexMap { map_target, .. } => assert!(map_target.starts_with("G35")),
            other => panic!("unexpected body {other:?}"),
        }
    }

    let by_prefix = hermes.member_field_prefix(ICD_MAP, "mapTarget", "G3").unwrap();
    assert_eq!(by_prefix.len(), 1);
    assert!(matches!(
        hermes.member_field_prefix(ICD_MAP, "notAField", "x"),
        Err(HermesError::InvalidParameter(_))
    ));
}

#[test]
fn test_with_historical() {
    let (_dir, hermes) = fixture();
    assert!(!hermes.concept(OLD_MS).unwrap().active);

    let closure = hermes.with_historical(&[OLD_MS], None).unwrap();
    assert!(closure.contains(&OLD_MS));
    assert!(closure.contains(&MS));

    // The reverse direction reaches the retired concept from its
    // replacement.
    let closure = hermes.with_historical(&[MS], None).unwrap();
    assert!(closure.contains(&OLD_MS));
}

#[test]
fn test_expand_historic_superset() {
    let (_dir, hermes) = fixture();
    let plain = hermes.expand_ecl("<<24700007").unwrap();
    let historic = hermes.expand_ecl_historic("<<24700007").unwrap();
    for id in &plain {
        assert!(historic.contains(id));
    }
    assert!(historic.contains(&OLD_MS));
    // No duplicates after the append.
    let unique: std::collections::HashSet<&i64> = historic.iter().collect();
    assert_eq!(unique.len(), historic.len());
}

#[test]
fn test_expand_flag_exclusivity() {
    let (_dir, hermes) = fixture();
    assert!(matches!(
        hermes.expand("<<24700007", true, Some(&[well_known::GB_ENGLISH])),
        Err(HermesError::InvalidParameter(_))
    ));
    let preferred = hermes
        .expand("<<24700007", false, Some(&[well_known::GB_ENGLISH]))
        .unwrap();
    let ms = preferred.iter().find(|e| e.concept_id == MS).unwrap();
    assert_eq!(ms.preferred_term.as_deref(), Some("Multiple sclerosis"));
}

#[test]
fn test_ecl_parse_errors() {
    let (_dir, hermes) = fixture();
    match hermes.expand_ecl("<< ???") {
        Err(HermesError::Parse { line, col, .. }) => {
            assert!(line >= 1);
            assert!(col >= 1);
        }
        other => panic!("expected parse error, got {other:?}"),
    }
}

#[test]
fn test_extended_concept() {
    let (_dir, hermes) = fixture();
    let extended = hermes.extended_concept(MS).unwrap();
    assert_eq!(extended.concept.id, MS);
    assert!(extended.descriptions.iter().any(|d| d.term == "Multiple sclerosis"));
    assert!(extended
        .parent_relationships
        .get(&well_known::IS_A)
        .is_some_and(|ancestors| ancestors.contains(&ROOT)));
    assert!(extended.refsets.contains(&ICD_MAP));
    // Served from cache on the second call.
    let again = hermes.extended_concept(MS).unwrap();
    assert_eq!(extended, again);
}

#[test]
fn test_module_dependencies() {
    let (_dir, hermes) = fixture();
    let reports = hermes.module_dependencies().unwrap();
    assert_eq!(reports.len(), 2);
    let valid = reports
        .iter()
        .find(|r| r.module_id == well_known::MODEL_MODULE)
        .unwrap();
    assert!(valid.valid);
    let invalid = reports
        .iter()
        .find(|r| r.module_id == well_known::CORE_MODULE)
        .unwrap();
    assert!(!invalid.valid);
    assert!(invalid.reason.is_some());
}

#[test]
fn test_expand_stream_cancellation() {
    let (_dir, hermes) = fixture();
    let (sender, receiver) = sync_channel(1);
    let token = CancelToken::new();
    token.cancel();
    hermes.expand_ecl_stream("<<138875005", sender, &token).unwrap();
    assert!(receiver.recv().is_err());
}

#[test]
fn test_expand_stream_delivers() {
    let (_dir, hermes) = fixture();
    let (sender, receiver) = sync_channel(64);
    let token = CancelToken::new();
    hermes.expand_ecl_stream("<<24700007", sender, &token).unwrap();
    let collected: Vec<i64> = receiver.iter().collect();
    assert!(collected.contains(&MS));
    assert!(collected.contains(&RRMS));
}

#[test]
fn test_scg_round_trip_and_refresh() {
    let (_dir, hermes) = fixture();
    let source = "80146002 |Appendicectomy|";
    let parsed = hermes.parse_scg(source).unwrap();
    let reparsed = hermes.parse_scg(&parsed.render()).unwrap();
    assert_eq!(parsed, reparsed);

    let refreshed = hermes.refresh_scg_terms("80146002", "en-US").unwrap();
    assert_eq!(refreshed.render(), "80146002 |Appendectomy|");
}

#[test]
fn test_synonyms_filtered_by_refset() {
    let (_dir, hermes) = fixture();
    let all = hermes.synonyms(APPENDICECTOMY, None).unwrap();
    assert_eq!(all.len(), 2);
    let us_only = hermes
        .synonyms(APPENDICECTOMY, Some(&[well_known::US_ENGLISH]))
        .unwrap();
    assert_eq!(us_only.len(), 1);
    assert_eq!(us_only[0].term, "Appendectomy");
}

#[test]
fn test_version_mismatch_refused() {
    let (dir, hermes) = fixture();
    drop(hermes);
    std::fs::write(dir.path().join("version"), "99\n").unwrap();
    assert!(matches!(
        Hermes::open(dir.path(), OpenOptions::default()),
        Err(HermesError::StoreVersionMismatch { found: 99, .. })
    ));
}

#[test]
fn test_search_shows_fsn_only_when_asked() {
    let (_dir, hermes) = fixture();
    let without = hermes
        .search(SearchParams::new("multiple sclerosis disorder"))
        .unwrap();
    assert!(without.is_empty());
    let with = hermes
        .search(SearchParams::new("multiple sclerosis disorder").show_fsn())
        .unwrap();
    assert!(with.iter().any(|r| r.term.contains("(disorder)")));
}
