//! # hermes-ecl
//!
//! SNOMED CT Expression Constraint Language (ECL v2.0) and compositional
//! grammar support for the Hermes terminology engine.
//!
//! This crate provides:
//! - **ECL parser**: ECL constraint strings to a typed AST
//! - **Compiler**: AST lowering to `hermes-search` queries, with staged
//!   realisation for dotted, reverse, member-filter and history forms
//! - **Compositional grammar**: parse/render of postcoordinated
//!   expressions with optional term refresh
//!
//! ## ECL syntax quick reference
//!
//! | Operator | Meaning | Example |
//! |----------|---------|---------|
//! | (none) | Self | `404684003` |
//! | `<` / `<<` | Descendants (or self) | `<< 404684003` |
//! | `<!` / `<<!` | Children (or self) | `<! 404684003` |
//! | `>` / `>>` | Ancestors (or self) | `>> 404684003` |
//! | `^` | Member of refset | `^ 700043003` |
//! | `*` | Any concept | `*` |
//! | `AND` / `OR` / `MINUS` | Set algebra | `<< A MINUS << B` |
//! | `:` | Refinement | `< 19829001 : 116676008 = << 79654002` |
//! | `.` | Attribute values | `< 125605004 . 363698007` |
//! | `{{ … }}` | Filters | `< 64572001 {{ term = "heart" }}` |

#![warn(missing_docs)]

mod ast;
mod compiler;
mod error;
mod parser;
pub mod scg;

pub use ast::{
    Acceptability, AttributeClause, AttributeGroup, Cardinality, ClauseOperator, ClauseValue,
    Comparison, ConcreteLiteral, Constraint, Filter, MemberValue, Refinement, TermMatch,
};
pub use compiler::Compiler;
pub use error::{EclError, EclResult};
pub use parser::parse;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use hermes_search::{MemberIndex, SearchIndex};
    use hermes_store::{index as build_store_index, ComponentStore, OpenMode};
    use hermes_types::{
        sctid, well_known, Component, Concept, Description, Partition, RefsetBody, RefsetItem,
        Relationship,
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

    fn relationship(id: i64, source: i64, type_id: i64, destination: i64) -> Component {
        Component::Relationship(Relationship {
            id,
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: source,
            destination_id: destination,
            relationship_group: 0,
            type_id,
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

    struct Fixture {
        _dir: tempfile::TempDir,
        store: ComponentStore,
        index: SearchIndex,
        members: MemberIndex,
        root: i64,
        disease: i64,
        heart_disease: i64,
        ms: i64,
        site: i64,
        heart: i64,
        refset: i64,
    }

    impl Fixture {
        fn compiler(&self) -> Compiler<'_> {
            Compiler::new(&self.store, &self.index, &self.members)
        }

        fn expand(&self, ecl: &str) -> Vec<i64> {
            let compiler = self.compiler();
            let query = compiler.compile_str(ecl).unwrap();
            let mut ids: Vec<i64> = self
                .index
                .concept_ids_matching(&self.store, &query)
                .unwrap()
                .into_iter()
                .collect();
            ids.sort_unstable();
            ids
        }
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let store =
            ComponentStore::open(&dir.path().join("store.db"), OpenMode::ReadWrite).unwrap();

        let root = sctid::synthetic_id(1, Partition::Concept);
        let disease = sctid::synthetic_id(2, Partition::Concept);
        let heart_disease = sctid::synthetic_id(3, Partition::Concept);
        let ms = sctid::synthetic_id(4, Partition::Concept);
        let site = sctid::synthetic_id(5, Partition::Concept);
        let heart = sctid::synthetic_id(6, Partition::Concept);
        let refset = sctid::synthetic_id(7, Partition::Concept);
        let mut n = 100i64;
        let mut rel = |source, type_id, destination| {
            n += 1;
            relationship(sctid::synthetic_id(n, Partition::Relationship), source, type_id, destination)
        };
        let mut batch = vec![
            concept(root),
            concept(disease),
            concept(heart_disease),
            concept(ms),
            concept(site),
            concept(heart),
            concept(refset),
            rel(disease, well_known::IS_A, root),
            rel(heart_disease, well_known::IS_A, disease),
            rel(ms, well_known::IS_A, disease),
            rel(site, well_known::IS_A, root),
            rel(heart, well_known::IS_A, root),
            rel(refset, well_known::IS_A, root),
            rel(heart_disease, site, heart),
            synonym(sctid::synthetic_id(10, Partition::Description), disease, "Disease"),
            synonym(sctid::synthetic_id(11, Partition::Description), heart_disease, "Heart disease"),
            synonym(sctid::synthetic_id(12, Partition::Description), ms, "Multiple sclerosis"),
            synonym(sctid::synthetic_id(13, Partition::Description), heart, "Heart structure"),
            synonym(sctid::synthetic_id(14, Partition::Description), root, "Root"),
            synonym(sctid::synthetic_id(15, Partition::Description), site, "Finding site"),
            synonym(sctid::synthetic_id(16, Partition::Description), refset, "Example refset"),
        ];
        batch.push(Component::RefsetItem(RefsetItem {
            id: Uuid::from_u128(1),
            effective_time: date(),
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id: refset,
            referenced_component_id: ms,
            body: RefsetBody::SimpleMap {
                map_target: "G35".to_string(),
            },
        }));
        store.write_batch(&batch).unwrap();
        build_store_index(&store).unwrap();

        let index = SearchIndex::build(&store, &dir.path().join("search.db")).unwrap();
        let members = MemberIndex::build(&store, &dir.path().join("members.db")).unwrap();
        Fixture {
            _dir: dir,
            store,
            index,
            members,
            root,
            disease,
            heart_disease,
            ms,
            site,
            heart,
            refset,
        }
    }

    #[test]
    fn test_compile_descendants() {
        let f = fixture();
        assert_eq!(
            f.expand(&format!("<< {}", f.disease)),
            {
                let mut v = vec![f.disease, f.heart_disease, f.ms];
                v.sort_unstable();
                v
            }
        );
        let strict = f.expand(&format!("< {}", f.disease));
        assert!(!strict.contains(&f.disease));
        assert!(strict.contains(&f.ms));
    }

    #[test]
    fn test_compile_boolean_algebra() {
        let f = fixture();
        let minus = f.expand(&format!("<< {} MINUS {}", f.disease, f.ms));
        assert!(!minus.contains(&f.ms));
        assert!(minus.contains(&f.heart_disease));

        let and = f.expand(&format!("<< {} AND << {}", f.disease, f.heart_disease));
        assert_eq!(and, vec![f.heart_disease]);
    }

    #[test]
    fn test_compile_member_of() {
        let f = fixture();
        assert_eq!(f.expand(&format!("^ {}", f.refset)), vec![f.ms]);
    }

    #[test]
    fn test_compile_refinement() {
        let f = fixture();
        let result = f.expand(&format!("<< {} : {} = {}", f.disease, f.site, f.heart));
        assert_eq!(result, vec![f.heart_disease]);

        // Descendant-or-self value.
        let result = f.expand(&format!("<< {} : {} = << {}", f.disease, f.site, f.heart));
        assert_eq!(result, vec![f.heart_disease]);

        // Wildcard value: any concept with the attribute.
        let result = f.expand(&format!("* : {} = *", f.site));
        assert_eq!(result, vec![f.heart_disease]);
    }

    #[test]
    fn test_compile_not_equal_refinement() {
        let f = fixture();
        // The only site attribute points at heart, so != heart is empty.
        let result = f.expand(&format!("<< {} : {} != {}", f.disease, f.site, f.heart));
        assert!(result.is_empty());
        // != root keeps the heart-sited concept.
        let result = f.expand(&format!("<< {} : {} != {}", f.disease, f.site, f.root));
        assert_eq!(result, vec![f.heart_disease]);
    }

    #[test]
    fn test_compile_zero_cardinality() {
        let f = fixture();
        let result = f.expand(&format!("<< {} : [0..0] {} = *", f.disease, f.site));
        assert!(!result.contains(&f.heart_disease));
        assert!(result.contains(&f.ms));
        assert!(result.contains(&f.disease));
    }

    #[test]
    fn test_compile_dotted() {
        let f = fixture();
        let result = f.expand(&format!("<< {} . {}", f.disease, f.site));
        assert_eq!(result, vec![f.heart]);
    }

    #[test]
    fn test_compile_member_filter() {
        let f = fixture();
        let result = f.expand(&format!("^ {} {{{{ M mapTarget = \"G35\" }}}}", f.refset));
        assert_eq!(result, vec![f.ms]);
        let result = f.expand(&format!("^ {} {{{{ M mapTarget = \"XXX\" }}}}", f.refset));
        assert!(result.is_empty());
    }

    #[test]
    fn test_compile_term_filter() {
        let f = fixture();
        let result = f.expand(&format!("<< {} {{{{ term = \"heart\" }}}}", f.disease));
        assert_eq!(result, vec![f.heart_disease]);
    }

    #[test]
    fn test_compile_wildcard() {
        let f = fixture();
        let everything = f.expand("*");
        assert!(everything.contains(&f.root));
        assert!(everything.contains(&f.ms));
    }

    #[test]
    fn test_unsupported_surfaces_fragment() {
        let f = fixture();
        let compiler = f.compiler();
        let err = compiler
            .compile_str(&format!("<< {} : {} >= #2.5", f.disease, f.site))
            .unwrap_err();
        assert!(matches!(err, EclError::Unsupported { .. }));
    }

    #[test]
    fn test_top_and_bottom_of_set() {
        let f = fixture();
        let top = f.expand(&format!("!!> << {}", f.disease));
        assert_eq!(top, vec![f.disease]);
        let bottom = f.expand(&format!("!!< << {}", f.disease));
        assert_eq!(bottom, {
            let mut v = vec![f.heart_disease, f.ms];
            v.sort_unstable();
            v
        });
    }
}
