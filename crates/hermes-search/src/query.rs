//! Composable query primitives over the description index.
//!
//! A [`Query`] is an opaque value built from the constructors below and
//! composed with [`Query::and`], [`Query::or`] and [`Query::not`]. Closure
//! operators realise against the posting lists written at index time (the
//! `parents-isa` facet holds every transitive ancestor), so evaluation
//! never walks the hierarchy.

use hashbrown::HashSet;
use roaring::RoaringBitmap;

use hermes_store::ComponentStore;
use hermes_types::{well_known, SctId};

use crate::index::{
    facet_attribute, facet_attribute_count, facet_flag, facet_id, read_bitmap, SearchIndex,
    FACET_ACCEPTABLE_IN, FACET_ACTIVE_CONCEPT, FACET_ACTIVE_DESCRIPTION, FACET_CONCEPT,
    FACET_CONCEPT_REFSET, FACET_DESCRIPTION_REFSET, FACET_IS_FSN, FACET_IS_SYNONYM,
    FACET_PARENT_ISA, FACET_PREFERRED_IN, FACET_TYPE, MAX_ATTR_COUNT,
};
use crate::error::SearchResult;
use crate::tokenizer::{levenshtein_within, tokenize, wildcard_match, NGRAM_MAX};

/// Which acceptability posting a [`Query::Acceptability`] consults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcceptabilityKind {
    /// The description is the preferred term in the refset.
    PreferredIn,
    /// The description is acceptable in the refset.
    AcceptableIn,
}

/// A composable query over description documents.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    /// Every document.
    All,
    /// No document.
    None,
    /// Conjunction.
    And(Vec<Query>),
    /// Disjunction.
    Or(Vec<Query>),
    /// Difference: matches `include` minus `exclude`.
    Not {
        /// Documents to keep.
        include: Box<Query>,
        /// Documents to remove.
        exclude: Box<Query>,
    },
    /// One description by identifier.
    DescriptionId(SctId),
    /// Documents of one concept.
    ConceptId(SctId),
    /// Documents of any of a set of concepts.
    ConceptIds(Vec<SctId>),
    /// Tokenised prefix search (autocompletion).
    TermPrefix(Vec<String>),
    /// Fuzzy token search within an edit distance.
    TermFuzzy {
        /// Folded query tokens.
        tokens: Vec<String>,
        /// Maximum Levenshtein distance per token.
        distance: u32,
    },
    /// Glob-style wildcard over single tokens.
    Wildcard(String),
    /// Strict descendants of a concept.
    DescendantOf(SctId),
    /// Descendants or the concept itself.
    DescendantOrSelfOf(SctId),
    /// Direct children.
    ChildOf(SctId),
    /// Direct children or self.
    ChildOrSelfOf(SctId),
    /// Strict ancestors.
    AncestorOf(SctId),
    /// Ancestors or self.
    AncestorOrSelfOf(SctId),
    /// Direct parents.
    ParentOf(SctId),
    /// Direct parents or self.
    ParentOrSelfOf(SctId),
    /// Members of any of the given refsets (concept-level membership).
    MemberOfAny(Vec<SctId>),
    /// Description-level refset membership.
    DescriptionRefset(SctId),
    /// Preferred or acceptable in a language refset.
    Acceptability {
        /// Which posting to consult.
        kind: AcceptabilityKind,
        /// The language refset.
        refset_id: SctId,
    },
    /// Concepts holding an attribute with a destination in `values`.
    AttributeInSet {
        /// The attribute (relationship type).
        type_id: SctId,
        /// Accepted destination concepts.
        values: Vec<SctId>,
    },
    /// Concepts holding between `min` and `max` values of an attribute.
    AttributeCount {
        /// The attribute (relationship type).
        type_id: SctId,
        /// Minimum count, inclusive.
        min: u32,
        /// Maximum count, inclusive; `None` is unbounded.
        max: Option<u32>,
    },
    /// Description language-code filter.
    LanguageCode(String),
    /// Description type filter.
    TypeId(SctId),
    /// Active-description filter.
    ActiveDescription(bool),
    /// Active-concept filter.
    ActiveConcept(bool),
    /// Fully-specified-name flag filter.
    IsFsn(bool),
    /// Synonym flag filter.
    IsSynonym(bool),
}

impl Query {
    /// Conjunction of several queries.
    pub fn and(queries: impl IntoIterator<Item = Query>) -> Query {
        let mut queries: Vec<Query> = queries.into_iter().collect();
        match queries.len() {
            0 => Query::All,
            1 => queries.remove(0),
            _ => Query::And(queries),
        }
    }

    /// Disjunction of several queries.
    pub fn or(queries: impl IntoIterator<Item = Query>) -> Query {
        let mut queries: Vec<Query> = queries.into_iter().collect();
        match queries.len() {
            0 => Query::None,
            1 => queries.remove(0),
            _ => Query::Or(queries),
        }
    }

    /// Difference of two queries.
    pub fn not(include: Query, exclude: Query) -> Query {
        Query::Not {
            include: Box::new(include),
            exclude: Box::new(exclude),
        }
    }

    /// The concept itself.
    pub fn self_of(id: SctId) -> Query {
        Query::ConceptId(id)
    }

    /// A fixed set of concepts, as produced by staged realisation.
    pub fn concept_ids(ids: impl IntoIterator<Item = SctId>) -> Query {
        Query::ConceptIds(ids.into_iter().collect())
    }

    /// Tokenised term prefix query over a user-entered string.
    pub fn term(s: &str) -> Query {
        let tokens = tokenize(s);
        if tokens.is_empty() {
            Query::All
        } else {
            Query::TermPrefix(tokens)
        }
    }

    /// Members of a single refset.
    pub fn member_of(refset_id: SctId) -> Query {
        Query::MemberOfAny(vec![refset_id])
    }
}

/// A scored search hit, before locale post-processing.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// Matching description.
    pub description_id: SctId,
    /// Its concept.
    pub concept_id: SctId,
    /// The stored term.
    pub term: String,
    /// Relevance score; higher is better.
    pub score: f32,
}

impl SearchIndex {
    /// Realises a query as a document bitmap.
    pub fn docids_matching(
        &self,
        store: &ComponentStore,
        query: &Query,
    ) -> SearchResult<RoaringBitmap> {
        let rtxn = self.env.read_txn()?;
        self.eval(&rtxn, store, query)
    }

    fn eval(
        &self,
        rtxn: &heed::RoTxn,
        store: &ComponentStore,
        query: &Query,
    ) -> SearchResult<RoaringBitmap> {
        match query {
            Query::All => self.documents_ids(rtxn),
            Query::None => Ok(RoaringBitmap::new()),
            Query::And(queries) => {
                let mut result: Option<RoaringBitmap> = None;
                for q in queries {
                    let bitmap = self.eval(rtxn, store, q)?;
                    result = Some(match result {
                        Some(acc) => acc & bitmap,
                        None => bitmap,
                    });
                    if result.as_ref().is_some_and(RoaringBitmap::is_empty) {
                        break;
                    }
                }
                Ok(result.unwrap_or_default())
            }
            Query::Or(queries) => {
                let mut result = RoaringBitmap::new();
                for q in queries {
                    result |= self.eval(rtxn, store, q)?;
                }
                Ok(result)
            }
            Query::Not { include, exclude } => {
                let include = self.eval(rtxn, store, include)?;
                if include.is_empty() {
                    return Ok(include);
                }
                let exclude = self.eval(rtxn, store, exclude)?;
                Ok(include - exclude)
            }
            Query::DescriptionId(id) => {
                match self.description_docid.get(rtxn, &id.to_be_bytes())? {
                    Some(bytes) => {
                        let docid = u32::from_be_bytes(
                            bytes.try_into().map_err(|_| {
                                crate::error::SearchError::Corrupt("malformed docid".into())
                            })?,
                        );
                        let mut bitmap = RoaringBitmap::new();
                        bitmap.insert(docid);
                        Ok(bitmap)
                    }
                    None => Ok(RoaringBitmap::new()),
                }
            }
            Query::ConceptId(id) => self.facet(rtxn, &facet_id(FACET_CONCEPT, *id)),
            Query::ConceptIds(ids) => {
                let mut result = RoaringBitmap::new();
                for id in ids {
                    result |= self.facet(rtxn, &facet_id(FACET_CONCEPT, *id))?;
                }
                Ok(result)
            }
            Query::TermPrefix(tokens) => self.eval_prefix(rtxn, tokens),
            Query::TermFuzzy { tokens, distance } => self.eval_fuzzy(rtxn, tokens, *distance),
            Query::Wildcard(pattern) => self.eval_wildcard(rtxn, pattern),
            Query::DescendantOf(id) => self.facet(rtxn, &facet_id(FACET_PARENT_ISA, *id)),
            Query::DescendantOrSelfOf(id) => {
                let mut bitmap = self.facet(rtxn, &facet_id(FACET_PARENT_ISA, *id))?;
                bitmap |= self.facet(rtxn, &facet_id(FACET_CONCEPT, *id))?;
                Ok(bitmap)
            }
            Query::ChildOf(id) => {
                let children = direct_children(store, *id)?;
                self.eval(rtxn, store, &Query::ConceptIds(children))
            }
            Query::ChildOrSelfOf(id) => {
                let mut children = direct_children(store, *id)?;
                children.push(*id);
                self.eval(rtxn, store, &Query::ConceptIds(children))
            }
            Query::AncestorOf(id) => {
                let ancestors = store.all_parent_ids(*id)?;
                self.eval(rtxn, store, &Query::ConceptIds(ancestors))
            }
            Query::AncestorOrSelfOf(id) => {
                let mut ancestors = store.all_parent_ids(*id)?;
                ancestors.push(*id);
                self.eval(rtxn, store, &Query::ConceptIds(ancestors))
            }
            Query::ParentOf(id) => {
                let parents = direct_parents(store, *id)?;
                self.eval(rtxn, store, &Query::ConceptIds(parents))
            }
            Query::ParentOrSelfOf(id) => {
                let mut parents = direct_parents(store, *id)?;
                parents.push(*id);
                self.eval(rtxn, store, &Query::ConceptIds(parents))
            }
            Query::MemberOfAny(refsets) => {
                let mut result = RoaringBitmap::new();
                for refset in refsets {
                    result |= self.facet(rtxn, &facet_id(FACET_CONCEPT_REFSET, *refset))?;
                }
                Ok(result)
            }
            Query::DescriptionRefset(refset) => {
                self.facet(rtxn, &facet_id(FACET_DESCRIPTION_REFSET, *refset))
            }
            Query::Acceptability { kind, refset_id } => {
                let tag = match kind {
                    AcceptabilityKind::PreferredIn => FACET_PREFERRED_IN,
                    AcceptabilityKind::AcceptableIn => FACET_ACCEPTABLE_IN,
                };
                self.facet(rtxn, &facet_id(tag, *refset_id))
            }
            Query::AttributeInSet { type_id, values } => {
                let mut result = RoaringBitmap::new();
                for value in values {
                    result |= self.facet(rtxn, &facet_attribute(*type_id, *value))?;
                }
                Ok(result)
            }
            Query::AttributeCount { type_id, min, max } => {
                self.eval_attribute_count(rtxn, *type_id, *min, *max)
            }
            Query::LanguageCode(code) => self.facet(rtxn, &crate::index::facet_language(code)),
            Query::TypeId(id) => self.facet(rtxn, &facet_id(FACET_TYPE, *id)),
            Query::ActiveDescription(v) => {
                self.facet(rtxn, &facet_flag(FACET_ACTIVE_DESCRIPTION, *v))
            }
            Query::ActiveConcept(v) => self.facet(rtxn, &facet_flag(FACET_ACTIVE_CONCEPT, *v)),
            Query::IsFsn(v) => self.facet(rtxn, &facet_flag(FACET_IS_FSN, *v)),
            Query::IsSynonym(v) => self.facet(rtxn, &facet_flag(FACET_IS_SYNONYM, *v)),
        }
    }

    fn eval_prefix(&self, rtxn: &heed::RoTxn, tokens: &[String]) -> SearchResult<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;
        for token in tokens {
            let bitmap = if token.chars().count() <= NGRAM_MAX {
                match self.prefix_docids.get(rtxn, token)? {
                    Some(bytes) => read_bitmap(bytes)?,
                    None => RoaringBitmap::new(),
                }
            } else {
                // Longer than any stored edge n-gram: range over the
                // dictionary instead.
                let mut acc = RoaringBitmap::new();
                for entry in self.term_docids.prefix_iter(rtxn, token)? {
                    let (_, bytes) = entry?;
                    acc |= read_bitmap(bytes)?;
                }
                acc
            };
            result = Some(match result {
                Some(acc) => acc & bitmap,
                None => bitmap,
            });
            if result.as_ref().is_some_and(RoaringBitmap::is_empty) {
                break;
            }
        }
        Ok(result.unwrap_or_default())
    }

    fn eval_fuzzy(
        &self,
        rtxn: &heed::RoTxn,
        tokens: &[String],
        distance: u32,
    ) -> SearchResult<RoaringBitmap> {
        let mut result: Option<RoaringBitmap> = None;
        for token in tokens {
            let mut acc = RoaringBitmap::new();
            for entry in self.term_docids.iter(rtxn)? {
                let (candidate, bytes) = entry?;
                let within = levenshtein_within(token, candidate, distance).is_some()
                    || candidate.starts_with(token.as_str());
                if within {
                    acc |= read_bitmap(bytes)?;
                }
            }
            result = Some(match result {
                Some(prev) => prev & acc,
                None => acc,
            });
        }
        Ok(result.unwrap_or_default())
    }

    fn eval_wildcard(&self, rtxn: &heed::RoTxn, pattern: &str) -> SearchResult<RoaringBitmap> {
        let pattern = pattern.to_lowercase();
        let literal: String = pattern
            .chars()
            .take_while(|c| *c != '*' && *c != '?')
            .collect();
        let mut acc = RoaringBitmap::new();
        for entry in self.term_docids.prefix_iter(rtxn, &literal)? {
            let (candidate, bytes) = entry?;
            if wildcard_match(&pattern, candidate) {
                acc |= read_bitmap(bytes)?;
            }
        }
        Ok(acc)
    }

    fn eval_attribute_count(
        &self,
        rtxn: &heed::RoTxn,
        type_id: SctId,
        min: u32,
        max: Option<u32>,
    ) -> SearchResult<RoaringBitmap> {
        let upper = max.unwrap_or(MAX_ATTR_COUNT).min(MAX_ATTR_COUNT);
        let mut at_least_min = RoaringBitmap::new();
        for count in min.max(1)..=upper {
            at_least_min |= self.facet(rtxn, &facet_attribute_count(type_id, count))?;
        }
        if min == 0 {
            // Zero occurrences means the absence of any count posting.
            let mut any = RoaringBitmap::new();
            for count in 1..=MAX_ATTR_COUNT {
                any |= self.facet(rtxn, &facet_attribute_count(type_id, count))?;
            }
            let all = self.documents_ids(rtxn)?;
            let none = all - any;
            Ok(none | at_least_min)
        } else {
            Ok(at_least_min)
        }
    }

    /// Realises a query as the set of matching concept ids.
    pub fn concept_ids_matching(
        &self,
        store: &ComponentStore,
        query: &Query,
    ) -> SearchResult<HashSet<SctId>> {
        let rtxn = self.env.read_txn()?;
        let docids = self.eval(&rtxn, store, query)?;
        let mut out = HashSet::new();
        for docid in docids {
            if let Some(bytes) = self.docs.get(&rtxn, &docid.to_be_bytes())? {
                let record = crate::document::DocumentRecord::decode(bytes)?;
                out.insert(record.concept_id);
            }
        }
        Ok(out)
    }

    /// Realises a query as an ordered sequence of scored hits.
    ///
    /// Hits are ordered by score descending, then description id ascending.
    /// When `remove_duplicates` is set, hits sharing `(conceptId, term)`
    /// collapse to the first encountered.
    pub fn query_for_results(
        &self,
        store: &ComponentStore,
        query: &Query,
        score_tokens: &[String],
        max_hits: usize,
        remove_duplicates: bool,
    ) -> SearchResult<Vec<SearchHit>> {
        let rtxn = self.env.read_txn()?;
        let docids = self.eval(&rtxn, store, query)?;
        let mut hits = Vec::new();
        for docid in docids {
            let Some(bytes) = self.docs.get(&rtxn, &docid.to_be_bytes())? else {
                continue;
            };
            let record = crate::document::DocumentRecord::decode(bytes)?;
            let score = score_term(score_tokens, &record.term);
            hits.push(SearchHit {
                description_id: record.description_id,
                concept_id: record.concept_id,
                term: record.term,
                score,
            });
        }
        hits.sort_by(|a, b| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| a.description_id.cmp(&b.description_id))
        });
        if remove_duplicates {
            let mut seen: HashSet<(SctId, String)> = HashSet::new();
            hits.retain(|hit| seen.insert((hit.concept_id, hit.term.clone())));
        }
        hits.truncate(max_hits);
        Ok(hits)
    }
}

/// Scores a stored term against the query tokens: the fraction of the term
/// covered by the query, so exact matches score 1.0 and shorter terms rank
/// above longer ones for the same prefix.
fn score_term(query_tokens: &[String], term: &str) -> f32 {
    if query_tokens.is_empty() {
        return 0.0;
    }
    let term_len: usize = tokenize(term).iter().map(String::len).sum();
    if term_len == 0 {
        return 0.0;
    }
    let query_len: usize = query_tokens.iter().map(String::len).sum();
    (query_len as f32 / term_len as f32).min(1.0)
}

fn direct_children(store: &ComponentStore, id: SctId) -> SearchResult<Vec<SctId>> {
    Ok(store
        .child_relationships_of_type(id, well_known::IS_A)?
        .into_iter()
        .filter(|r| r.active)
        .map(|r| r.source_id)
        .collect())
}

fn direct_parents(store: &ComponentStore, id: SctId) -> SearchResult<Vec<SctId>> {
    Ok(store
        .parent_relationships_of_type(id, well_known::IS_A)?
        .into_iter()
        .filter(|r| r.active)
        .map(|r| r.destination_id)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors_collapse() {
        assert_eq!(Query::and([]), Query::All);
        assert_eq!(Query::or([]), Query::None);
        assert_eq!(Query::and([Query::ConceptId(5)]), Query::ConceptId(5));
        assert!(matches!(
            Query::and([Query::ConceptId(5), Query::All]),
            Query::And(_)
        ));
    }

    #[test]
    fn test_term_constructor_blank_degenerates() {
        assert_eq!(Query::term(""), Query::All);
        assert_eq!(Query::term("  --- "), Query::All);
        assert_eq!(
            Query::term("Heart attack"),
            Query::TermPrefix(vec!["heart".to_string(), "attack".to_string()])
        );
    }

    #[test]
    fn test_score_term() {
        let q = vec!["heart".to_string()];
        assert_eq!(score_term(&q, "Heart"), 1.0);
        assert!(score_term(&q, "Heart") > score_term(&q, "Heart attack"));
        assert_eq!(score_term(&[], "Heart"), 0.0);
    }
}
