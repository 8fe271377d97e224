//! The description search index.
//!
//! One document per description, held in a dedicated LMDB environment
//! (`search.db`): stored fields under dense u32 document ids, inverted
//! term and edge-n-gram postings, and facet postings for every filterable
//! field, all as serialized roaring bitmaps.

use std::path::Path;

use heed::types::{Bytes, Str};
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use roaring::RoaringBitmap;
use tracing::info;

use hermes_store::ComponentStore;
use hermes_types::{well_known, SctId};

use crate::document::DocumentRecord;
use crate::error::{SearchError, SearchResult};
use crate::tokenizer::{edge_ngrams, tokenize};

/// Version byte this implementation reads and writes.
pub const SEARCH_VERSION: u32 = 1;

/// Attribute counts saturate here; cardinality queries clamp to it.
pub const MAX_ATTR_COUNT: u32 = 50;

const MAIN_VERSION: &[u8] = b"version";
const MAIN_DOCUMENTS_IDS: &[u8] = b"documents-ids";

// Facet tags, the first byte of every facet posting key.
pub(crate) const FACET_CONCEPT: u8 = 1;
pub(crate) const FACET_TYPE: u8 = 2;
pub(crate) const FACET_ACTIVE_DESCRIPTION: u8 = 3;
pub(crate) const FACET_ACTIVE_CONCEPT: u8 = 4;
pub(crate) const FACET_IS_FSN: u8 = 5;
pub(crate) const FACET_IS_SYNONYM: u8 = 6;
pub(crate) const FACET_CONCEPT_REFSET: u8 = 7;
pub(crate) const FACET_DESCRIPTION_REFSET: u8 = 8;
pub(crate) const FACET_PREFERRED_IN: u8 = 9;
pub(crate) const FACET_ACCEPTABLE_IN: u8 = 10;
pub(crate) const FACET_PARENT_ISA: u8 = 11;
pub(crate) const FACET_ATTRIBUTE: u8 = 12;
pub(crate) const FACET_ATTRIBUTE_COUNT: u8 = 13;
pub(crate) const FACET_LANGUAGE: u8 = 14;

pub(crate) fn facet_id(tag: u8, id: SctId) -> [u8; 9] {
    let mut key = [0u8; 9];
    key[0] = tag;
    key[1..].copy_from_slice(&id.to_be_bytes());
    key
}

pub(crate) fn facet_flag(tag: u8, value: bool) -> [u8; 2] {
    [tag, u8::from(value)]
}

pub(crate) fn facet_attribute(type_id: SctId, destination: SctId) -> [u8; 17] {
    let mut key = [0u8; 17];
    key[0] = FACET_ATTRIBUTE;
    key[1..9].copy_from_slice(&type_id.to_be_bytes());
    key[9..].copy_from_slice(&destination.to_be_bytes());
    key
}

pub(crate) fn facet_language(code: &str) -> Vec<u8> {
    let mut key = Vec::with_capacity(1 + code.len());
    key.push(FACET_LANGUAGE);
    key.extend_from_slice(code.to_ascii_lowercase().as_bytes());
    key
}

pub(crate) fn facet_attribute_count(type_id: SctId, count: u32) -> [u8; 10] {
    let mut key = [0u8; 10];
    key[0] = FACET_ATTRIBUTE_COUNT;
    key[1..9].copy_from_slice(&type_id.to_be_bytes());
    key[9] = count.min(MAX_ATTR_COUNT) as u8;
    key
}

pub(crate) fn read_bitmap(bytes: &[u8]) -> SearchResult<RoaringBitmap> {
    RoaringBitmap::deserialize_from(bytes)
        .map_err(|e| SearchError::Corrupt(format!("undecodable posting list: {e}")))
}

fn write_bitmap(bitmap: &RoaringBitmap) -> SearchResult<Vec<u8>> {
    let mut bytes = Vec::with_capacity(bitmap.serialized_size());
    bitmap
        .serialize_into(&mut bytes)
        .map_err(|e| SearchError::Corrupt(format!("unencodable posting list: {e}")))?;
    Ok(bytes)
}

/// Counters from a completed index build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Description documents indexed.
    pub documents: usize,
    /// Distinct tokens in the term dictionary.
    pub terms: usize,
    /// Distinct edge n-grams.
    pub prefixes: usize,
    /// Distinct facet posting lists.
    pub facets: usize,
}

/// A handle to an open description index.
pub struct SearchIndex {
    pub(crate) env: Env,
    pub(crate) main: Database<Bytes, Bytes>,
    pub(crate) docs: Database<Bytes, Bytes>,
    pub(crate) description_docid: Database<Bytes, Bytes>,
    pub(crate) term_docids: Database<Str, Bytes>,
    pub(crate) prefix_docids: Database<Str, Bytes>,
    pub(crate) facet_docids: Database<Bytes, Bytes>,
}

const DB_NAMES: [&str; 6] = [
    "main",
    "docs",
    "description-docid",
    "term-docids",
    "prefix-docids",
    "facet-docids",
];

impl SearchIndex {
    /// Opens an existing description index.
    pub fn open(path: &Path, read_only: bool) -> SearchResult<Self> {
        if !path.is_dir() {
            return Err(SearchError::Corrupt(format!(
                "no search index at {}",
                path.display()
            )));
        }
        let env = Self::open_env(path, read_only)?;
        let rtxn = env.read_txn()?;
        let main = Self::open_db(&env, &rtxn, "main")?;
        let index = Self {
            docs: Self::open_db(&env, &rtxn, "docs")?,
            description_docid: Self::open_db(&env, &rtxn, "description-docid")?,
            term_docids: Self::open_typed_db(&env, &rtxn, "term-docids")?,
            prefix_docids: Self::open_typed_db(&env, &rtxn, "prefix-docids")?,
            facet_docids: Self::open_db(&env, &rtxn, "facet-docids")?,
            main,
            env: env.clone(),
        };
        match index.main.get(&rtxn, MAIN_VERSION)? {
            Some(bytes) => {
                let found = bytes
                    .try_into()
                    .map(u32::from_be_bytes)
                    .map_err(|_| SearchError::Corrupt("malformed version marker".into()))?;
                if found != SEARCH_VERSION {
                    return Err(SearchError::VersionMismatch {
                        found,
                        expected: SEARCH_VERSION,
                    });
                }
            }
            None => return Err(SearchError::Corrupt("search index has no version".into())),
        }
        drop(rtxn);
        Ok(index)
    }

    fn open_env(path: &Path, read_only: bool) -> SearchResult<Env> {
        let mut options = EnvOpenOptions::new();
        options.map_size(8 * 1024 * 1024 * 1024).max_dbs(DB_NAMES.len() as u32);
        if read_only {
            unsafe {
                options.flags(EnvFlags::READ_ONLY);
            }
        }
        Ok(unsafe { options.open(path)? })
    }

    fn open_db(env: &Env, rtxn: &RoTxn, name: &str) -> SearchResult<Database<Bytes, Bytes>> {
        env.open_database(rtxn, Some(name))?
            .ok_or_else(|| SearchError::Corrupt(format!("missing database '{name}'")))
    }

    fn open_typed_db(env: &Env, rtxn: &RoTxn, name: &str) -> SearchResult<Database<Str, Bytes>> {
        env.open_database(rtxn, Some(name))?
            .ok_or_else(|| SearchError::Corrupt(format!("missing database '{name}'")))
    }

    /// Builds the description index by streaming the indexed store, and
    /// returns an open handle to it.
    ///
    /// The build replaces any previous content atomically: everything is
    /// written in a single transaction committed at the end.
    pub fn build(store: &ComponentStore, path: &Path) -> SearchResult<Self> {
        std::fs::create_dir_all(path)?;
        let env = Self::open_env(path, false)?;
        let mut wtxn = env.write_txn()?;
        let main = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("main"))?;
        let docs = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("docs"))?;
        let description_docid =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some("description-docid"))?;
        let term_docids = env.create_database::<Str, Bytes>(&mut wtxn, Some("term-docids"))?;
        let prefix_docids = env.create_database::<Str, Bytes>(&mut wtxn, Some("prefix-docids"))?;
        let facet_docids = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("facet-docids"))?;
        main.clear(&mut wtxn)?;
        docs.clear(&mut wtxn)?;
        description_docid.clear(&mut wtxn)?;
        term_docids.clear(&mut wtxn)?;
        prefix_docids.clear(&mut wtxn)?;
        facet_docids.clear(&mut wtxn)?;

        // Stream descriptions out first; documents are assigned dense ids
        // in description-id order so rebuilds are deterministic.
        let mut descriptions = Vec::new();
        store.for_each_description(|d| {
            descriptions.push(d);
            Ok(())
        })?;
        descriptions.sort_unstable_by_key(|d| d.id);

        let mut concepts: hashbrown::HashMap<SctId, ConceptMeta> = hashbrown::HashMap::new();
        let mut term_map: std::collections::BTreeMap<String, RoaringBitmap> = Default::default();
        let mut prefix_map: std::collections::BTreeMap<String, RoaringBitmap> = Default::default();
        let mut facet_map: std::collections::BTreeMap<Vec<u8>, RoaringBitmap> = Default::default();
        let mut all_docs = RoaringBitmap::new();

        for (seq, description) in descriptions.iter().enumerate() {
            let docid = seq as u32;
            all_docs.insert(docid);

            if !concepts.contains_key(&description.concept_id) {
                let meta = ConceptMeta::load(store, description.concept_id)?;
                concepts.insert(description.concept_id, meta);
            }
            let meta = &concepts[&description.concept_id];

            for token in tokenize(&description.term) {
                for ngram in edge_ngrams(&token) {
                    prefix_map.entry(ngram.to_string()).or_default().insert(docid);
                }
                term_map.entry(token).or_default().insert(docid);
            }

            let mut facet = |key: Vec<u8>| {
                facet_map.entry(key).or_default().insert(docid);
            };
            facet(facet_id(FACET_CONCEPT, description.concept_id).to_vec());
            facet(facet_id(FACET_TYPE, description.type_id).to_vec());
            facet(facet_flag(FACET_ACTIVE_DESCRIPTION, description.active).to_vec());
            facet(facet_flag(FACET_ACTIVE_CONCEPT, meta.active).to_vec());
            facet(facet_flag(FACET_IS_FSN, description.is_fsn()).to_vec());
            facet(facet_flag(FACET_IS_SYNONYM, description.is_synonym()).to_vec());
            facet(facet_language(&description.language_code));
            for refset in &meta.refsets {
                facet(facet_id(FACET_CONCEPT_REFSET, *refset).to_vec());
            }
            for refset in store.refset_ids_of(description.id)? {
                facet(facet_id(FACET_DESCRIPTION_REFSET, refset).to_vec());
            }
            for (refset, acceptability) in store.acceptability_entries(description.id)? {
                if acceptability == well_known::PREFERRED {
                    facet(facet_id(FACET_PREFERRED_IN, refset).to_vec());
                } else if acceptability == well_known::ACCEPTABLE {
                    facet(facet_id(FACET_ACCEPTABLE_IN, refset).to_vec());
                }
            }
            for ancestor in &meta.ancestors {
                facet(facet_id(FACET_PARENT_ISA, *ancestor).to_vec());
            }
            for (type_id, destinations) in &meta.attributes {
                for destination in destinations {
                    facet(facet_attribute(*type_id, *destination).to_vec());
                }
                facet(facet_attribute_count(*type_id, destinations.len() as u32).to_vec());
            }

            let record = DocumentRecord {
                description_id: description.id,
                concept_id: description.concept_id,
                term: description.term.clone(),
                type_id: description.type_id,
                active_description: description.active,
                active_concept: meta.active,
            };
            docs.put(&mut wtxn, &docid.to_be_bytes(), &record.encode())?;
            description_docid.put(
                &mut wtxn,
                &description.id.to_be_bytes(),
                &docid.to_be_bytes(),
            )?;
        }

        let stats = BuildStats {
            documents: descriptions.len(),
            terms: term_map.len(),
            prefixes: prefix_map.len(),
            facets: facet_map.len(),
        };

        for (token, bitmap) in &term_map {
            term_docids.put(&mut wtxn, token, &write_bitmap(bitmap)?)?;
        }
        for (ngram, bitmap) in &prefix_map {
            prefix_docids.put(&mut wtxn, ngram, &write_bitmap(bitmap)?)?;
        }
        for (key, bitmap) in &facet_map {
            facet_docids.put(&mut wtxn, key, &write_bitmap(bitmap)?)?;
        }
        main.put(&mut wtxn, MAIN_DOCUMENTS_IDS, &write_bitmap(&all_docs)?)?;
        main.put(&mut wtxn, MAIN_VERSION, &SEARCH_VERSION.to_be_bytes())?;
        wtxn.commit()?;

        info!(
            documents = stats.documents,
            terms = stats.terms,
            prefixes = stats.prefixes,
            facets = stats.facets,
            "description index built"
        );
        Ok(Self {
            env,
            main,
            docs,
            description_docid,
            term_docids,
            prefix_docids,
            facet_docids,
        })
    }

    /// The bitmap of every document id.
    pub(crate) fn documents_ids(&self, rtxn: &RoTxn) -> SearchResult<RoaringBitmap> {
        match self.main.get(rtxn, MAIN_DOCUMENTS_IDS)? {
            Some(bytes) => read_bitmap(bytes),
            None => Ok(RoaringBitmap::new()),
        }
    }

    pub(crate) fn facet(&self, rtxn: &RoTxn, key: &[u8]) -> SearchResult<RoaringBitmap> {
        match self.facet_docids.get(rtxn, key)? {
            Some(bytes) => read_bitmap(bytes),
            None => Ok(RoaringBitmap::new()),
        }
    }

    /// Fetches the stored record of a document.
    pub fn document(&self, docid: u32) -> SearchResult<Option<DocumentRecord>> {
        let rtxn = self.env.read_txn()?;
        match self.docs.get(&rtxn, &docid.to_be_bytes())? {
            Some(bytes) => Ok(Some(DocumentRecord::decode(bytes)?)),
            None => Ok(None),
        }
    }

    /// Number of indexed documents.
    pub fn document_count(&self) -> SearchResult<u64> {
        let rtxn = self.env.read_txn()?;
        Ok(self.docs.len(&rtxn)?)
    }
}

/// Per-concept data shared by all of a concept's description documents.
struct ConceptMeta {
    active: bool,
    refsets: Vec<SctId>,
    ancestors: Vec<SctId>,
    attributes: Vec<(SctId, Vec<SctId>)>,
}

impl ConceptMeta {
    fn load(store: &ComponentStore, concept_id: SctId) -> SearchResult<Self> {
        let active = store
            .concept(concept_id)?
            .map(|c| c.active)
            .unwrap_or(false);
        let refsets = store.refset_ids_of(concept_id)?;
        let mut parents = store.parents_map(concept_id)?;
        let ancestors = parents.remove(&well_known::IS_A).unwrap_or_default();
        let attributes = parents.into_iter().collect();
        Ok(Self {
            active,
            refsets,
            ancestors,
            attributes,
        })
    }
}
