//! The unified terminology service.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::SyncSender;
use std::sync::Arc;

use hashbrown::HashSet;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, info};

use hermes_ecl::{scg::ScgExpression, Compiler};
use hermes_search::{
    tokenizer, MemberFilter, MemberIndex, Query, SearchIndex,
};
use hermes_store::{
    historical_refsets, locale, module_dependency_report, with_historical, ComponentStore,
    HistoryProfile, IndexStats, ModuleDependencyReport, OpenMode, StoreStatus,
};
use hermes_types::{
    sctid, Component, Concept, Description, FieldId, RefsetItem, Relationship, SctId,
};

use crate::error::{HermesError, Result};
use crate::registry;
use crate::types::{
    ExpandedConcept, ExtendedConcept, OpenOptions, SearchParams, SearchResult,
};

/// Version written to the `version` marker file.
pub const SERVICE_VERSION: u32 = 1;

const EXTENDED_CACHE_SIZE: usize = 2048;

/// Cancellation signal for streaming operations.
///
/// Cloneable; cancelling any clone stops the stream within one batch of
/// hits. Closing the service cancels every in-flight stream.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// A fresh, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// True once cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// An open terminology service: the component store plus its description
/// and member indices, bound to one directory.
///
/// A handle supports any number of concurrent readers. Import and index
/// require a read-write handle and are mutually exclusive with readers in
/// other processes.
pub struct Hermes {
    path: PathBuf,
    store: ComponentStore,
    search: Option<SearchIndex>,
    members: Option<MemberIndex>,
    default_locale: Option<String>,
    extended_cache: Mutex<LruCache<SctId, Arc<ExtendedConcept>>>,
    closed: Arc<AtomicBool>,
}

impl Hermes {
    /// Opens a service rooted at `path`.
    ///
    /// Read-only handles require a fully imported and indexed directory;
    /// read-write handles create one. A `version` marker written by a
    /// different implementation version refuses to open.
    pub fn open(path: &Path, options: OpenOptions) -> Result<Self> {
        let version_file = path.join("version");
        if options.readonly {
            let text = std::fs::read_to_string(&version_file)
                .map_err(|_| HermesError::CorruptStore(format!("no service at {}", path.display())))?;
            let found: u32 = text
                .trim()
                .parse()
                .map_err(|_| HermesError::CorruptStore("malformed version marker".to_string()))?;
            if found != SERVICE_VERSION {
                return Err(HermesError::StoreVersionMismatch {
                    found,
                    expected: SERVICE_VERSION,
                });
            }
        } else {
            std::fs::create_dir_all(path)
                .map_err(|e| HermesError::Internal(e.to_string()))?;
            match std::fs::read_to_string(&version_file) {
                Ok(text) => {
                    let found: u32 = text.trim().parse().map_err(|_| {
                        HermesError::CorruptStore("malformed version marker".to_string())
                    })?;
                    if found != SERVICE_VERSION {
                        return Err(HermesError::StoreVersionMismatch {
                            found,
                            expected: SERVICE_VERSION,
                        });
                    }
                }
                Err(_) => {
                    std::fs::write(&version_file, format!("{SERVICE_VERSION}\n"))
                        .map_err(|e| HermesError::Internal(e.to_string()))?;
                }
            }
        }

        let mode = if options.readonly {
            OpenMode::ReadOnly
        } else {
            OpenMode::ReadWrite
        };
        let store = ComponentStore::open(&path.join("store.db"), mode)?;

        let search_path = path.join("search.db");
        let members_path = path.join("members.db");
        let (search, members) = if options.readonly {
            (
                Some(SearchIndex::open(&search_path, true)?),
                Some(MemberIndex::open(&members_path, true)?),
            )
        } else {
            // Indices may not exist yet in write mode; they appear after
            // the first call to `index`.
            let search = search_path
                .is_dir()
                .then(|| SearchIndex::open(&search_path, false))
                .transpose()?;
            let members = members_path
                .is_dir()
                .then(|| MemberIndex::open(&members_path, false))
                .transpose()?;
            (search, members)
        };

        let closed = registry::register(path);
        info!(path = %path.display(), readonly = options.readonly, "opened terminology service");
        Ok(Self {
            path: path.to_path_buf(),
            store,
            search,
            members,
            default_locale: options.default_locale,
            extended_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(EXTENDED_CACHE_SIZE).expect("non-zero cache size"),
            )),
            closed,
        })
    }

    /// The directory this service is rooted at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Closes the service, cancelling in-flight streams.
    pub fn close(self) {
        drop(self);
    }

    fn search_index(&self) -> Result<&SearchIndex> {
        self.search.as_ref().ok_or_else(|| {
            HermesError::CorruptStore("description index not built; run index first".to_string())
        })
    }

    fn member_index(&self) -> Result<&MemberIndex> {
        self.members.as_ref().ok_or_else(|| {
            HermesError::CorruptStore("member index not built; run index first".to_string())
        })
    }

    fn compiler(&self) -> Result<Compiler<'_>> {
        Ok(Compiler::new(
            &self.store,
            self.search_index()?,
            self.member_index()?,
        ))
    }

    // =========================================================================
    // Import & index
    // =========================================================================

    /// Writes a batch of components; write-mode handles only.
    pub fn import_batch(&self, components: &[Component]) -> Result<()> {
        self.store.write_batch(components)?;
        Ok(())
    }

    /// Consumes a parsed RF2 refset file fragment: reifies each row and
    /// writes the batch. Rows whose field count disagrees with the header
    /// are rejected.
    pub fn import_refset_rows(&self, headings: &[&str], rows: &[Vec<&str>]) -> Result<()> {
        let mut batch = Vec::with_capacity(rows.len());
        for row in rows {
            batch.push(Component::RefsetItem(RefsetItem::from_row(headings, row)?));
        }
        self.import_batch(&batch)
    }

    /// Rebuilds every derived index: the store's derived buckets, the
    /// description index and the member index.
    pub fn index(&mut self) -> Result<IndexStats> {
        let stats = hermes_store::index(&self.store)?;
        // Release any open index environments before rebuilding in place.
        self.search = None;
        self.members = None;
        self.search = Some(SearchIndex::build(&self.store, &self.path.join("search.db"))?);
        self.members = Some(MemberIndex::build(&self.store, &self.path.join("members.db"))?);
        self.extended_cache.lock().clear();
        Ok(stats)
    }

    /// Row counts and index state.
    pub fn status(&self) -> Result<StoreStatus> {
        Ok(self.store.status()?)
    }

    // =========================================================================
    // Component lookups
    // =========================================================================

    /// Fetches a concept.
    pub fn concept(&self, id: SctId) -> Result<Concept> {
        sctid::validate(id, Some(hermes_types::Partition::Concept))?;
        self.store
            .concept(id)?
            .ok_or_else(|| HermesError::NotFound(format!("concept {id}")))
    }

    /// Fetches a description.
    pub fn description(&self, id: SctId) -> Result<Description> {
        sctid::validate(id, Some(hermes_types::Partition::Description))?;
        self.store
            .description(id)?
            .ok_or_else(|| HermesError::NotFound(format!("description {id}")))
    }

    /// Fetches a relationship.
    pub fn relationship(&self, id: SctId) -> Result<Relationship> {
        sctid::validate(id, Some(hermes_types::Partition::Relationship))?;
        self.store
            .relationship(id)?
            .ok_or_else(|| HermesError::NotFound(format!("relationship {id}")))
    }

    /// Fetches a refset member by UUID.
    pub fn refset_item(&self, id: &uuid::Uuid) -> Result<RefsetItem> {
        self.store
            .refset_item(id)?
            .ok_or_else(|| HermesError::NotFound(format!("refset item {id}")))
    }

    /// All descriptions of a concept.
    pub fn descriptions(&self, concept_id: SctId) -> Result<Vec<Description>> {
        Ok(self.store.descriptions(concept_id)?)
    }

    /// Active synonyms of a concept, optionally restricted to those
    /// preferred or acceptable in the given language refsets.
    pub fn synonyms(
        &self,
        concept_id: SctId,
        language_refset_ids: Option<&[SctId]>,
    ) -> Result<Vec<Description>> {
        let mut out = Vec::new();
        for description in self.store.descriptions(concept_id)? {
            if !description.active || !description.is_synonym() {
                continue;
            }
            match language_refset_ids {
                None => out.push(description),
                Some(refsets) => {
                    let entries = self.store.acceptability_entries(description.id)?;
                    if entries.iter().any(|(refset, _)| refsets.contains(refset)) {
                        out.push(description);
                    }
                }
            }
        }
        Ok(out)
    }

    /// The denormalised view of a concept, LRU-cached.
    pub fn extended_concept(&self, id: SctId) -> Result<Arc<ExtendedConcept>> {
        if let Some(hit) = self.extended_cache.lock().get(&id) {
            return Ok(hit.clone());
        }
        let concept = self.concept(id)?;
        let extended = Arc::new(ExtendedConcept {
            descriptions: self.store.descriptions(id)?,
            parent_relationships: self.store.parents_map(id)?,
            direct_parent_relationships: self
                .store
                .parent_relationships(id)?
                .into_iter()
                .filter(|r| r.active)
                .collect(),
            concrete_values: self.store.concrete_values(id)?,
            refsets: self.store.refset_ids_of(id)?,
            concept,
        });
        self.extended_cache.lock().put(id, extended.clone());
        Ok(extended)
    }

    // =========================================================================
    // Subsumption
    // =========================================================================

    /// Transitive IS-A ancestors of a concept.
    pub fn all_parents(&self, id: SctId) -> Result<Vec<SctId>> {
        Ok(self.store.all_parent_ids(id)?)
    }

    /// Transitive IS-A descendants of a concept.
    pub fn all_children(&self, id: SctId) -> Result<Vec<SctId>> {
        Ok(self.store.all_child_ids(id)?)
    }

    /// Union of ancestors over a set of concepts.
    pub fn all_parents_of(&self, ids: &[SctId]) -> Result<Vec<SctId>> {
        let mut out: HashSet<SctId> = HashSet::new();
        for &id in ids {
            out.extend(self.store.all_parent_ids(id)?);
        }
        let mut out: Vec<SctId> = out.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Union of descendants over a set of concepts.
    pub fn all_children_of(&self, ids: &[SctId]) -> Result<Vec<SctId>> {
        let mut out: HashSet<SctId> = HashSet::new();
        for &id in ids {
            out.extend(self.store.all_child_ids(id)?);
        }
        let mut out: Vec<SctId> = out.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Active concrete values sourced at a concept.
    pub fn concrete_values(&self, id: SctId) -> Result<Vec<hermes_types::ConcreteValue>> {
        Ok(self.store.concrete_values(id)?)
    }

    /// Active relationship rows of one type sourced at a concept.
    pub fn parent_relationships_of_type(
        &self,
        id: SctId,
        type_id: SctId,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .store
            .parent_relationships_of_type(id, type_id)?
            .into_iter()
            .filter(|r| r.active)
            .collect())
    }

    /// Active relationship rows of one type arriving at a concept.
    pub fn child_relationships_of_type(
        &self,
        id: SctId,
        type_id: SctId,
    ) -> Result<Vec<Relationship>> {
        Ok(self
            .store
            .child_relationships_of_type(id, type_id)?
            .into_iter()
            .filter(|r| r.active)
            .collect())
    }

    /// True iff `subsumer` is `id` itself or one of its ancestors.
    pub fn subsumed_by(&self, id: SctId, subsumer: SctId) -> Result<bool> {
        if id == subsumer {
            return Ok(true);
        }
        Ok(self.store.all_parent_ids(id)?.binary_search(&subsumer).is_ok())
    }

    // =========================================================================
    // Locale
    // =========================================================================

    /// Ordered language refsets matching an accept-language range.
    pub fn match_locale(&self, accept_language: &str) -> Result<Vec<SctId>> {
        let installed: HashSet<SctId> = self.store.installed_refsets()?.into_iter().collect();
        Ok(locale::match_locale(
            accept_language,
            &installed,
            self.default_locale.as_deref(),
        ))
    }

    /// The preferred synonym of a concept for an accept-language range.
    ///
    /// Deterministic for a given installed refset and language range; a
    /// concept with no preferred synonym in any matched refset yields
    /// `None`.
    pub fn preferred_synonym(
        &self,
        concept_id: SctId,
        accept_language: &str,
    ) -> Result<Option<Description>> {
        for refset in self.match_locale(accept_language)? {
            if let Some(description_id) = self.store.preferred_synonym_id(concept_id, refset)? {
                return Ok(self.store.description(description_id)?);
            }
        }
        Ok(None)
    }

    fn preferred_term_in(&self, concept_id: SctId, refsets: &[SctId]) -> Result<Option<String>> {
        for &refset in refsets {
            if let Some(description_id) = self.store.preferred_synonym_id(concept_id, refset)? {
                if let Some(description) = self.store.description(description_id)? {
                    return Ok(Some(description.term));
                }
            }
        }
        Ok(None)
    }

    // =========================================================================
    // Search
    // =========================================================================

    /// Full-text search over description terms (§ search API).
    pub fn search(&self, params: SearchParams) -> Result<Vec<SearchResult>> {
        let index = self.search_index()?;
        let tokens = tokenizer::tokenize(&params.s);

        let mut clauses: Vec<Query> = Vec::new();
        if !params.inactive_descriptions {
            clauses.push(Query::ActiveDescription(true));
        }
        if !params.inactive_concepts {
            clauses.push(Query::ActiveConcept(true));
        }
        if !params.show_fsn {
            clauses.push(Query::IsFsn(false));
        }
        for (type_id, values) in &params.properties {
            clauses.push(Query::AttributeInSet {
                type_id: *type_id,
                values: values.clone(),
            });
        }
        if !params.concept_refsets.is_empty() {
            clauses.push(Query::MemberOfAny(params.concept_refsets.clone()));
        }
        if let Some(constraint) = &params.constraint {
            clauses.push(self.compiler()?.compile_str(constraint)?);
        }

        let term_clause = |distance: u32| -> Option<Query> {
            if tokens.is_empty() {
                // A blank search degenerates to a pure filter query.
                None
            } else if distance > 0 {
                Some(Query::TermFuzzy {
                    tokens: tokens.clone(),
                    distance,
                })
            } else {
                Some(Query::TermPrefix(tokens.clone()))
            }
        };

        let build = |term: Option<Query>| {
            Query::and(term.into_iter().chain(clauses.iter().cloned()))
        };

        let mut hits = index.query_for_results(
            &self.store,
            &build(term_clause(params.fuzzy)),
            &tokens,
            params.max_hits,
            params.remove_duplicates,
        )?;
        if hits.is_empty() && params.fuzzy == 0 && params.fallback_fuzzy > 0 {
            debug!(s = %params.s, distance = params.fallback_fuzzy, "retrying search with fuzzy fallback");
            hits = index.query_for_results(
                &self.store,
                &build(term_clause(params.fallback_fuzzy)),
                &tokens,
                params.max_hits,
                params.remove_duplicates,
            )?;
        }

        let language_refsets = match &params.accept_language {
            Some(accept_language) => self.match_locale(accept_language)?,
            None => Vec::new(),
        };
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            let preferred_term = if language_refsets.is_empty() {
                None
            } else {
                self.preferred_term_in(hit.concept_id, &language_refsets)?
            };
            out.push(SearchResult {
                id: hit.description_id,
                concept_id: hit.concept_id,
                term: hit.term,
                preferred_term,
            });
        }
        Ok(out)
    }

    /// Streams search results into a bounded channel, honouring
    /// cancellation; back-pressure is the channel's.
    pub fn search_stream(
        &self,
        params: SearchParams,
        sender: SyncSender<SearchResult>,
        cancel: &CancelToken,
    ) -> Result<()> {
        for result in self.search(params)? {
            if cancel.is_cancelled() || self.closed.load(Ordering::SeqCst) {
                break;
            }
            if sender.send(result).is_err() {
                break;
            }
        }
        Ok(())
    }

    // =========================================================================
    // ECL expansion
    // =========================================================================

    /// Expands an ECL expression to its concept-id set, ascending.
    pub fn expand_ecl(&self, ecl: &str) -> Result<Vec<SctId>> {
        let compiler = self.compiler()?;
        let query = compiler.compile_str(ecl)?;
        let mut ids: Vec<SctId> = self
            .search_index()?
            .concept_ids_matching(&self.store, &query)?
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    /// Expands an ECL expression and augments the result with historical
    /// associations; the additional identifiers append after the plain
    /// expansion, deduplicated.
    pub fn expand_ecl_historic(&self, ecl: &str) -> Result<Vec<SctId>> {
        let base = self.expand_ecl(ecl)?;
        let refsets = historical_refsets(&self.store, HistoryProfile::Max)?;
        let expanded = with_historical(&self.store, &base, &refsets)?;
        let mut out = base.clone();
        let seen: HashSet<SctId> = base.into_iter().collect();
        let mut extra: Vec<SctId> = expanded.into_iter().filter(|id| !seen.contains(id)).collect();
        extra.sort_unstable();
        out.extend(extra);
        Ok(out)
    }

    /// Expands an ECL expression, binding each concept to its preferred
    /// synonym in the named language refsets.
    pub fn expand_ecl_preferred(
        &self,
        ecl: &str,
        language_refset_ids: &[SctId],
    ) -> Result<Vec<ExpandedConcept>> {
        let ids = self.expand_ecl(ecl)?;
        let mut out = Vec::with_capacity(ids.len());
        for concept_id in ids {
            out.push(ExpandedConcept {
                concept_id,
                preferred_term: self.preferred_term_in(concept_id, language_refset_ids)?,
            });
        }
        Ok(out)
    }

    /// General expansion entry point; `include_historic` and `preferred`
    /// are mutually exclusive.
    pub fn expand(
        &self,
        ecl: &str,
        include_historic: bool,
        preferred: Option<&[SctId]>,
    ) -> Result<Vec<ExpandedConcept>> {
        if include_historic && preferred.is_some() {
            return Err(HermesError::InvalidParameter(
                "includeHistoric and preferred are mutually exclusive".to_string(),
            ));
        }
        if let Some(refsets) = preferred {
            return self.expand_ecl_preferred(ecl, refsets);
        }
        let ids = if include_historic {
            self.expand_ecl_historic(ecl)?
        } else {
            self.expand_ecl(ecl)?
        };
        Ok(ids
            .into_iter()
            .map(|concept_id| ExpandedConcept {
                concept_id,
                preferred_term: None,
            })
            .collect())
    }

    /// Streams an expansion into a bounded channel, honouring cancellation.
    pub fn expand_ecl_stream(
        &self,
        ecl: &str,
        sender: SyncSender<SctId>,
        cancel: &CancelToken,
    ) -> Result<()> {
        for id in self.expand_ecl(ecl)? {
            if cancel.is_cancelled() || self.closed.load(Ordering::SeqCst) {
                break;
            }
            if sender.send(id).is_err() {
                break;
            }
        }
        Ok(())
    }

    /// `ids ∩ expand(ecl)`, computed index-side without materialising the
    /// full expansion.
    pub fn intersect_ecl(&self, ids: &[SctId], ecl: &str) -> Result<Vec<SctId>> {
        let compiler = self.compiler()?;
        let query = Query::and([
            Query::ConceptIds(ids.to_vec()),
            compiler.compile_str(ecl)?,
        ]);
        let mut out: Vec<SctId> = self
            .search_index()?
            .concept_ids_matching(&self.store, &query)?
            .into_iter()
            .collect();
        out.sort_unstable();
        Ok(out)
    }

    /// For each input id, the subset of the expansion comprising that id's
    /// ancestors or self; input order is preserved.
    pub fn map_into(&self, ids: &[SctId], ecl: &str) -> Result<Vec<Vec<SctId>>> {
        let target: HashSet<SctId> = self.expand_ecl(ecl)?.into_iter().collect();
        let mut out = Vec::with_capacity(ids.len());
        for &id in ids {
            let mut subset = Vec::new();
            if target.contains(&id) {
                subset.push(id);
            }
            for ancestor in self.store.all_parent_ids(id)? {
                if target.contains(&ancestor) {
                    subset.push(ancestor);
                }
            }
            subset.sort_unstable();
            subset.dedup();
            out.push(subset);
        }
        Ok(out)
    }

    // =========================================================================
    // Crossmaps & history
    // =========================================================================

    /// Members of a map refset whose `mapTarget` equals `code`.
    pub fn reverse_map(&self, refset_id: SctId, code: &str) -> Result<Vec<RefsetItem>> {
        Ok(self.member_index()?.members_matching(
            &[refset_id],
            &[MemberFilter::equals(FieldId::MapTarget, code.as_bytes())],
        )?)
    }

    /// Members of a refset whose named field starts with `prefix`.
    pub fn member_field_prefix(
        &self,
        refset_id: SctId,
        field: &str,
        prefix: &str,
    ) -> Result<Vec<RefsetItem>> {
        let field = FieldId::from_name(field).ok_or_else(|| {
            HermesError::InvalidParameter(format!("unknown refset field '{field}'"))
        })?;
        Ok(self.member_index()?.members_matching(
            &[refset_id],
            &[MemberFilter::prefix(field, prefix.as_bytes())],
        )?)
    }

    /// Closes a set of concepts under historical associations; the refsets
    /// default to every installed historical-association refset.
    pub fn with_historical(
        &self,
        ids: &[SctId],
        refset_ids: Option<&[SctId]>,
    ) -> Result<Vec<SctId>> {
        let refsets = match refset_ids {
            Some(refsets) => refsets.to_vec(),
            None => historical_refsets(&self.store, HistoryProfile::Max)?,
        };
        let mut out: Vec<SctId> =
            with_historical(&self.store, ids, &refsets)?.into_iter().collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Refsets a component is a member of.
    pub fn refsets_of(&self, component_id: SctId) -> Result<Vec<SctId>> {
        Ok(self.store.refset_ids_of(component_id)?)
    }

    /// Every installed refset.
    pub fn installed_refsets(&self) -> Result<Vec<SctId>> {
        Ok(self.store.installed_refsets()?)
    }

    /// Validates the module-dependency refset.
    pub fn module_dependencies(&self) -> Result<Vec<ModuleDependencyReport>> {
        Ok(module_dependency_report(&self.store)?)
    }

    // =========================================================================
    // Compositional grammar
    // =========================================================================

    /// Parses a compositional grammar expression.
    pub fn parse_scg(&self, expression: &str) -> Result<ScgExpression> {
        Ok(hermes_ecl::scg::parse_scg(expression)?)
    }

    /// Parses an SCG expression and refreshes every embedded term to the
    /// preferred synonym for the accept-language range.
    pub fn refresh_scg_terms(
        &self,
        expression: &str,
        accept_language: &str,
    ) -> Result<ScgExpression> {
        let mut parsed = self.parse_scg(expression)?;
        let refsets = self.match_locale(accept_language)?;
        parsed.refresh_terms(&|id| {
            self.preferred_term_in(id, &refsets).ok().flatten()
        });
        Ok(parsed)
    }
}

impl Drop for Hermes {
    fn drop(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
        registry::deregister(&self.path);
        debug!(path = %self.path.display(), "closed terminology service");
    }
}
