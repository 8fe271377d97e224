//! The authoritative on-disk component store.
//!
//! A single memory-mapped LMDB environment with one named database per
//! logical bucket. Values are the `hermes-types` codec bytes; keys come from
//! [`crate::keys`]. The store is opened read-only for queries; import and
//! the index phase take a read-write handle, and the open-mode token guards
//! every write path.

use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn, RwTxn};
use tracing::{debug, info};
use uuid::Uuid;

use chrono::NaiveDate;
use hermes_types::codec::{
    decode_component, decode_id_map, decode_refset_item, encode_component, encode_refset_item,
};
use hermes_types::{
    well_known, Component, Concept, ConcreteValue, Description, RefsetBody, RefsetItem,
    Relationship, SctId,
};

use crate::error::{StoreError, StoreResult};
use crate::keys;

/// Version byte this implementation reads and writes.
pub const STORE_VERSION: u32 = 1;

/// Default LMDB map size: 16 GiB of address space, grown lazily by the OS.
const DEFAULT_MAP_SIZE: usize = 16 * 1024 * 1024 * 1024;

const META_VERSION: &[u8] = b"version";
const META_INDEXED: &[u8] = b"indexed";

/// Open-mode token; writes require [`OpenMode::ReadWrite`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Queries only; import and index are rejected.
    ReadOnly,
    /// Import and index allowed; mutually exclusive with readers in other
    /// processes taking the write lock.
    ReadWrite,
}

/// The named databases backing the store.
pub(crate) struct Buckets {
    pub(crate) concept: Database<Bytes, Bytes>,
    pub(crate) description: Database<Bytes, Bytes>,
    pub(crate) relationship: Database<Bytes, Bytes>,
    pub(crate) concrete_value: Database<Bytes, Bytes>,
    pub(crate) refset_item: Database<Bytes, Bytes>,
    pub(crate) concept_descriptions: Database<Bytes, Bytes>,
    pub(crate) source_relationships: Database<Bytes, Bytes>,
    pub(crate) destination_relationships: Database<Bytes, Bytes>,
    pub(crate) concept_parents: Database<Bytes, Bytes>,
    pub(crate) concept_children: Database<Bytes, Bytes>,
    pub(crate) component_refset_items: Database<Bytes, Bytes>,
    pub(crate) refset_items: Database<Bytes, Bytes>,
    pub(crate) installed_refsets: Database<Bytes, Bytes>,
    pub(crate) refset_field_reverse: Database<Bytes, Bytes>,
    pub(crate) refset_descriptors: Database<Bytes, Bytes>,
    pub(crate) preferred_synonyms: Database<Bytes, Bytes>,
    pub(crate) acceptability: Database<Bytes, Bytes>,
    pub(crate) meta: Database<Bytes, Bytes>,
}

const BUCKET_NAMES: [&str; 18] = [
    "concept",
    "description",
    "relationship",
    "concrete-value",
    "refset-item",
    "concept-descriptions",
    "source-relationships",
    "destination-relationships",
    "concept-parents",
    "concept-children",
    "component-refset-items",
    "refset-items",
    "installed-refsets",
    "refset-field-reverse",
    "refset-descriptors",
    "preferred-synonyms",
    "acceptability",
    "meta",
];

/// A handle to an open component store.
pub struct ComponentStore {
    pub(crate) env: Env,
    mode: OpenMode,
    pub(crate) buckets: Buckets,
}

impl ComponentStore {
    /// Opens (and in read-write mode, creates) a store at `path`.
    ///
    /// Fails with [`StoreError::VersionMismatch`] when the store was written
    /// by an incompatible version, and with [`StoreError::Corrupt`] when the
    /// environment exists but buckets are missing.
    pub fn open(path: &Path, mode: OpenMode) -> StoreResult<Self> {
        if mode == OpenMode::ReadWrite {
            std::fs::create_dir_all(path)?;
        } else if !path.is_dir() {
            return Err(StoreError::Corrupt(format!(
                "no store at {}",
                path.display()
            )));
        }
        let mut options = EnvOpenOptions::new();
        options.map_size(DEFAULT_MAP_SIZE).max_dbs(BUCKET_NAMES.len() as u32);
        if mode == OpenMode::ReadOnly {
            unsafe {
                options.flags(EnvFlags::READ_ONLY);
            }
        }
        let env = unsafe { options.open(path)? };

        let buckets = match mode {
            OpenMode::ReadWrite => {
                let mut wtxn = env.write_txn()?;
                let buckets = Self::create_buckets(&env, &mut wtxn)?;
                match buckets.meta.get(&wtxn, META_VERSION)? {
                    None => {
                        buckets
                            .meta
                            .put(&mut wtxn, META_VERSION, &STORE_VERSION.to_be_bytes())?;
                    }
                    Some(bytes) => Self::check_version(bytes)?,
                }
                wtxn.commit()?;
                buckets
            }
            OpenMode::ReadOnly => {
                let rtxn = env.read_txn()?;
                let buckets = Self::open_buckets(&env, &rtxn)?;
                match buckets.meta.get(&rtxn, META_VERSION)? {
                    None => {
                        return Err(StoreError::Corrupt(
                            "store has no version marker".to_string(),
                        ))
                    }
                    Some(bytes) => Self::check_version(bytes)?,
                }
                buckets
            }
        };

        info!(path = %path.display(), ?mode, "opened component store");
        Ok(Self { env, mode, buckets })
    }

    fn check_version(bytes: &[u8]) -> StoreResult<()> {
        let found = bytes
            .try_into()
            .map(u32::from_be_bytes)
            .map_err(|_| StoreError::Corrupt("malformed version marker".to_string()))?;
        if found != STORE_VERSION {
            return Err(StoreError::VersionMismatch {
                found,
                expected: STORE_VERSION,
            });
        }
        Ok(())
    }

    fn create_buckets(env: &Env, wtxn: &mut RwTxn) -> StoreResult<Buckets> {
        let mut dbs = Vec::with_capacity(BUCKET_NAMES.len());
        for name in BUCKET_NAMES {
            dbs.push(env.create_database::<Bytes, Bytes>(wtxn, Some(name))?);
        }
        Ok(Self::buckets_from(dbs))
    }

    fn open_buckets(env: &Env, rtxn: &RoTxn) -> StoreResult<Buckets> {
        let mut dbs = Vec::with_capacity(BUCKET_NAMES.len());
        for name in BUCKET_NAMES {
            let db = env
                .open_database::<Bytes, Bytes>(rtxn, Some(name))?
                .ok_or_else(|| StoreError::Corrupt(format!("missing bucket '{name}'")))?;
            dbs.push(db);
        }
        Ok(Self::buckets_from(dbs))
    }

    fn buckets_from(mut dbs: Vec<Database<Bytes, Bytes>>) -> Buckets {
        let mut next = || dbs.remove(0);
        Buckets {
            concept: next(),
            description: next(),
            relationship: next(),
            concrete_value: next(),
            refset_item: next(),
            concept_descriptions: next(),
            source_relationships: next(),
            destination_relationships: next(),
            concept_parents: next(),
            concept_children: next(),
            component_refset_items: next(),
            refset_items: next(),
            installed_refsets: next(),
            refset_field_reverse: next(),
            refset_descriptors: next(),
            preferred_synonyms: next(),
            acceptability: next(),
            meta: next(),
        }
    }

    /// The mode this handle was opened with.
    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub(crate) fn require_write(&self) -> StoreResult<()> {
        match self.mode {
            OpenMode::ReadWrite => Ok(()),
            OpenMode::ReadOnly => Err(StoreError::ReadOnly),
        }
    }

    // =========================================================================
    // Writing
    // =========================================================================

    /// Writes a batch of components atomically.
    ///
    /// All records in the batch become visible together or not at all. Rows
    /// sharing a natural key merge by the RF2 rule: the later effective time
    /// wins, ties prefer the active row, equal rows prefer the last writer.
    pub fn write_batch(&self, components: &[Component]) -> StoreResult<()> {
        self.require_write()?;
        let mut wtxn = self.env.write_txn()?;
        for component in components {
            self.write_component(&mut wtxn, component)?;
        }
        wtxn.commit()?;
        debug!(count = components.len(), "wrote component batch");
        Ok(())
    }

    fn write_component(&self, wtxn: &mut RwTxn, component: &Component) -> StoreResult<()> {
        match component {
            Component::Concept(c) => {
                let key = keys::id(c.id);
                if self.supersedes(wtxn, &self.buckets.concept, &key, c.effective_time, c.active)? {
                    self.buckets
                        .concept
                        .put(wtxn, &key, &encode_component(component))?;
                }
            }
            Component::Description(d) => {
                let key = keys::id(d.id);
                let previous_concept = match self.buckets.description.get(wtxn, &key)? {
                    Some(bytes) => match decode_component(bytes)? {
                        Component::Description(old) => {
                            if !merge_wins(d.effective_time, d.active, old.effective_time, old.active)
                            {
                                return Ok(());
                            }
                            Some(old.concept_id)
                        }
                        _ => None,
                    },
                    None => None,
                };
                self.buckets
                    .description
                    .put(wtxn, &key, &encode_component(component))?;
                if let Some(old_concept) = previous_concept {
                    if old_concept != d.concept_id {
                        self.buckets
                            .concept_descriptions
                            .delete(wtxn, &keys::concept_description(old_concept, d.id))?;
                    }
                }
                self.buckets.concept_descriptions.put(
                    wtxn,
                    &keys::concept_description(d.concept_id, d.id),
                    &[],
                )?;
            }
            Component::Relationship(r) => {
                let key = keys::id(r.id);
                if self.supersedes(
                    wtxn,
                    &self.buckets.relationship,
                    &key,
                    r.effective_time,
                    r.active,
                )? {
                    self.buckets
                        .relationship
                        .put(wtxn, &key, &encode_component(component))?;
                }
            }
            Component::ConcreteValue(v) => {
                let key = keys::id(v.id);
                if self.supersedes(
                    wtxn,
                    &self.buckets.concrete_value,
                    &key,
                    v.effective_time,
                    v.active,
                )? {
                    self.buckets
                        .concrete_value
                        .put(wtxn, &key, &encode_component(component))?;
                }
            }
            Component::RefsetItem(item) => {
                let key = keys::uuid(&item.id);
                let replace = match self.buckets.refset_item.get(wtxn, &key)? {
                    Some(bytes) => {
                        let old = decode_refset_item(bytes)?;
                        merge_wins(item.effective_time, item.active, old.effective_time, old.active)
                    }
                    None => true,
                };
                if replace {
                    self.buckets
                        .refset_item
                        .put(wtxn, &key, &encode_refset_item(item))?;
                    if let RefsetBody::RefsetDescriptor { attribute_order, .. } = item.body {
                        self.buckets.refset_descriptors.put(
                            wtxn,
                            &keys::descriptor(item.referenced_component_id, attribute_order),
                            &encode_refset_item(item),
                        )?;
                    }
                }
            }
        }
        Ok(())
    }

    /// True when a row with the given effective time and activity should
    /// replace whatever the bucket currently holds under `key`.
    fn supersedes(
        &self,
        wtxn: &RwTxn,
        db: &Database<Bytes, Bytes>,
        key: &[u8],
        effective_time: NaiveDate,
        active: bool,
    ) -> StoreResult<bool> {
        let Some(bytes) = db.get(wtxn, key)? else {
            return Ok(true);
        };
        let old = decode_component(bytes)?;
        Ok(merge_wins(effective_time, active, old.effective_time(), old.active()))
    }

    // =========================================================================
    // Point lookups
    // =========================================================================

    /// Fetches a concept by identifier.
    pub fn concept(&self, id: SctId) -> StoreResult<Option<Concept>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.concept.get(&rtxn, &keys::id(id))? {
            Some(bytes) => match decode_component(bytes)? {
                Component::Concept(c) => Ok(Some(c)),
                _ => Err(StoreError::Corrupt(format!("non-concept bytes under {id}"))),
            },
            None => Ok(None),
        }
    }

    /// Fetches a description by identifier.
    pub fn description(&self, id: SctId) -> StoreResult<Option<Description>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.description.get(&rtxn, &keys::id(id))? {
            Some(bytes) => match decode_component(bytes)? {
                Component::Description(d) => Ok(Some(d)),
                _ => Err(StoreError::Corrupt(format!(
                    "non-description bytes under {id}"
                ))),
            },
            None => Ok(None),
        }
    }

    /// Fetches a relationship by identifier.
    pub fn relationship(&self, id: SctId) -> StoreResult<Option<Relationship>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.relationship.get(&rtxn, &keys::id(id))? {
            Some(bytes) => match decode_component(bytes)? {
                Component::Relationship(r) => Ok(Some(r)),
                _ => Err(StoreError::Corrupt(format!(
                    "non-relationship bytes under {id}"
                ))),
            },
            None => Ok(None),
        }
    }

    /// Fetches a refset member by UUID.
    pub fn refset_item(&self, id: &Uuid) -> StoreResult<Option<RefsetItem>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.refset_item.get(&rtxn, &keys::uuid(id))? {
            Some(bytes) => Ok(Some(decode_refset_item(bytes)?)),
            None => Ok(None),
        }
    }

    // =========================================================================
    // Prefix scans
    // =========================================================================

    /// All descriptions of a concept.
    pub fn descriptions(&self, concept_id: SctId) -> StoreResult<Vec<Description>> {
        let rtxn = self.env.read_txn()?;
        let mut ids = Vec::new();
        for entry in self
            .buckets
            .concept_descriptions
            .prefix_iter(&rtxn, &keys::id(concept_id))?
        {
            let (key, _) = entry?;
            let (_, rest) = keys::split_id(key);
            let (description_id, _) = keys::split_id(rest);
            ids.push(description_id);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bytes) = self.buckets.description.get(&rtxn, &keys::id(id))? {
                if let Component::Description(d) = decode_component(bytes)? {
                    out.push(d);
                }
            }
        }
        Ok(out)
    }

    /// Concrete values sourced at a concept.
    ///
    /// Concrete values are few per concept; this scans the bucket's source
    /// entries directly.
    pub fn concrete_values(&self, source_id: SctId) -> StoreResult<Vec<ConcreteValue>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self.buckets.concrete_value.iter(&rtxn)? {
            let (_, bytes) = entry?;
            if let Component::ConcreteValue(v) = decode_component(bytes)? {
                if v.source_id == source_id && v.active {
                    out.push(v);
                }
            }
        }
        Ok(out)
    }

    /// The `{typeId → destination set}` map of a concept, IS-A entries
    /// holding the transitive ancestor closure.
    pub fn parents_map(
        &self,
        concept_id: SctId,
    ) -> StoreResult<std::collections::BTreeMap<SctId, Vec<SctId>>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.concept_parents.get(&rtxn, &keys::id(concept_id))? {
            Some(bytes) => Ok(decode_id_map(bytes)?),
            None => Ok(Default::default()),
        }
    }

    /// The `{typeId → source set}` mirror, IS-A entries holding the
    /// transitive descendant closure.
    pub fn children_map(
        &self,
        concept_id: SctId,
    ) -> StoreResult<std::collections::BTreeMap<SctId, Vec<SctId>>> {
        let rtxn = self.env.read_txn()?;
        match self.buckets.concept_children.get(&rtxn, &keys::id(concept_id))? {
            Some(bytes) => Ok(decode_id_map(bytes)?),
            None => Ok(Default::default()),
        }
    }

    /// All transitive IS-A ancestors of a concept.
    pub fn all_parent_ids(&self, concept_id: SctId) -> StoreResult<Vec<SctId>> {
        Ok(self
            .parents_map(concept_id)?
            .remove(&well_known::IS_A)
            .unwrap_or_default())
    }

    /// All transitive IS-A descendants of a concept.
    pub fn all_child_ids(&self, concept_id: SctId) -> StoreResult<Vec<SctId>> {
        Ok(self
            .children_map(concept_id)?
            .remove(&well_known::IS_A)
            .unwrap_or_default())
    }

    /// Destination values of one attribute of a concept.
    pub fn attribute_values(&self, concept_id: SctId, type_id: SctId) -> StoreResult<Vec<SctId>> {
        Ok(self
            .parents_map(concept_id)?
            .remove(&type_id)
            .unwrap_or_default())
    }

    /// Relationship rows of a given type sourced at `source_id`.
    pub fn parent_relationships_of_type(
        &self,
        source_id: SctId,
        type_id: SctId,
    ) -> StoreResult<Vec<Relationship>> {
        self.relationships_by_prefix(
            &self.buckets.source_relationships,
            keys::relationship_type_prefix(source_id, type_id),
        )
    }

    /// Relationship rows of a given type arriving at `destination_id`.
    pub fn child_relationships_of_type(
        &self,
        destination_id: SctId,
        type_id: SctId,
    ) -> StoreResult<Vec<Relationship>> {
        self.relationships_by_prefix(
            &self.buckets.destination_relationships,
            keys::relationship_type_prefix(destination_id, type_id),
        )
    }

    /// All active relationship rows sourced at `source_id`.
    pub fn parent_relationships(&self, source_id: SctId) -> StoreResult<Vec<Relationship>> {
        self.relationships_by_prefix(&self.buckets.source_relationships, keys::id(source_id))
    }

    fn relationships_by_prefix(
        &self,
        db: &Database<Bytes, Bytes>,
        prefix: impl AsRef<[u8]>,
    ) -> StoreResult<Vec<Relationship>> {
        let rtxn = self.env.read_txn()?;
        let mut ids = Vec::new();
        for entry in db.prefix_iter(&rtxn, prefix.as_ref())? {
            let (key, _) = entry?;
            // Key layout: (id, typeId, otherId, relationshipId).
            let (relationship_id, _) = keys::split_id(&key[24..]);
            ids.push(relationship_id);
        }
        let mut out = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(bytes) = self.buckets.relationship.get(&rtxn, &keys::id(id))? {
                if let Component::Relationship(r) = decode_component(bytes)? {
                    out.push(r);
                }
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Refset lookups
    // =========================================================================

    /// Distinct refsets whose active members reference a component.
    pub fn refset_ids_of(&self, component_id: SctId) -> StoreResult<Vec<SctId>> {
        let rtxn = self.env.read_txn()?;
        let mut out: Vec<SctId> = Vec::new();
        for entry in self
            .buckets
            .component_refset_items
            .prefix_iter(&rtxn, &keys::id(component_id))?
        {
            let (key, _) = entry?;
            let (_, rest) = keys::split_id(key);
            let (refset_id, _) = keys::split_id(rest);
            if out.last() != Some(&refset_id) {
                out.push(refset_id);
            }
        }
        out.dedup();
        Ok(out)
    }

    /// Refset members referencing a component.
    pub fn refset_items_of(&self, component_id: SctId) -> StoreResult<Vec<RefsetItem>> {
        let rtxn = self.env.read_txn()?;
        let mut uuids = Vec::new();
        for entry in self
            .buckets
            .component_refset_items
            .prefix_iter(&rtxn, &keys::id(component_id))?
        {
            let (key, _) = entry?;
            let (_, rest) = keys::split_id(key);
            let (_, rest) = keys::split_id(rest);
            let (uuid, _) = keys::split_uuid(rest);
            uuids.push(uuid);
        }
        self.items_by_uuid(&rtxn, uuids)
    }

    /// All members of a refset.
    pub fn refset_members(&self, refset_id: SctId) -> StoreResult<Vec<RefsetItem>> {
        let rtxn = self.env.read_txn()?;
        let mut uuids = Vec::new();
        for entry in self
            .buckets
            .refset_items
            .prefix_iter(&rtxn, &keys::id(refset_id))?
        {
            let (key, _) = entry?;
            let (_, rest) = keys::split_id(key);
            let (uuid, _) = keys::split_uuid(rest);
            uuids.push(uuid);
        }
        self.items_by_uuid(&rtxn, uuids)
    }

    fn items_by_uuid(&self, rtxn: &RoTxn, uuids: Vec<Uuid>) -> StoreResult<Vec<RefsetItem>> {
        let mut out = Vec::with_capacity(uuids.len());
        for uuid in uuids {
            if let Some(bytes) = self.buckets.refset_item.get(rtxn, &keys::uuid(&uuid))? {
                out.push(decode_refset_item(bytes)?);
            }
        }
        Ok(out)
    }

    /// Identifiers of every installed (non-empty) refset.
    pub fn installed_refsets(&self) -> StoreResult<Vec<SctId>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self.buckets.installed_refsets.iter(&rtxn)? {
            let (key, _) = entry?;
            out.push(keys::split_id(key).0);
        }
        Ok(out)
    }

    /// True when a refset has at least one member.
    pub fn is_refset_installed(&self, refset_id: SctId) -> StoreResult<bool> {
        let rtxn = self.env.read_txn()?;
        Ok(self
            .buckets
            .installed_refsets
            .get(&rtxn, &keys::id(refset_id))?
            .is_some())
    }

    /// Descriptor rows declaring the schema of a refset, in field order.
    pub fn refset_descriptors(&self, refset_id: SctId) -> StoreResult<Vec<RefsetItem>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self
            .buckets
            .refset_descriptors
            .prefix_iter(&rtxn, &keys::id(refset_id))?
        {
            let (_, bytes) = entry?;
            out.push(decode_refset_item(bytes)?);
        }
        Ok(out)
    }

    /// Descriptor-declared field counts per refset, including the
    /// referenced-component field.
    pub fn descriptor_arities(&self) -> StoreResult<hashbrown::HashMap<SctId, usize>> {
        let rtxn = self.env.read_txn()?;
        let mut out: hashbrown::HashMap<SctId, usize> = hashbrown::HashMap::new();
        for entry in self.buckets.refset_descriptors.iter(&rtxn)? {
            let (key, _) = entry?;
            let (refset_id, _) = keys::split_id(key);
            *out.entry(refset_id).or_insert(0) += 1;
        }
        Ok(out)
    }

    /// Member UUIDs whose field value starts with `prefix`, via the reverse
    /// field index.
    pub fn field_reverse_uuids(
        &self,
        refset_id: SctId,
        field: hermes_types::FieldId,
        prefix: &[u8],
    ) -> StoreResult<Vec<Uuid>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self
            .buckets
            .refset_field_reverse
            .prefix_iter(&rtxn, &keys::field_reverse_prefix(refset_id, field, prefix))?
        {
            let (key, _) = entry?;
            // The member UUID is the final sixteen bytes.
            let (uuid, _) = keys::split_uuid(&key[key.len() - 16..]);
            out.push(uuid);
        }
        Ok(out)
    }

    /// Members whose field value starts with `prefix`.
    pub fn members_with_field_prefix(
        &self,
        refset_id: SctId,
        field: hermes_types::FieldId,
        prefix: &[u8],
    ) -> StoreResult<Vec<RefsetItem>> {
        let uuids = self.field_reverse_uuids(refset_id, field, prefix)?;
        let rtxn = self.env.read_txn()?;
        self.items_by_uuid(&rtxn, uuids)
    }

    // =========================================================================
    // Locale caches
    // =========================================================================

    /// Cached preferred synonym of a concept in one language refset.
    pub fn preferred_synonym_id(
        &self,
        concept_id: SctId,
        refset_id: SctId,
    ) -> StoreResult<Option<SctId>> {
        let rtxn = self.env.read_txn()?;
        match self
            .buckets
            .preferred_synonyms
            .get(&rtxn, &keys::preferred_synonym(concept_id, refset_id))?
        {
            Some(bytes) => Ok(Some(keys::split_id(bytes).0)),
            None => Ok(None),
        }
    }

    /// Acceptability of a description in one language refset.
    pub fn acceptability_of(
        &self,
        description_id: SctId,
        refset_id: SctId,
    ) -> StoreResult<Option<SctId>> {
        let rtxn = self.env.read_txn()?;
        match self
            .buckets
            .acceptability
            .get(&rtxn, &keys::acceptability(description_id, refset_id))?
        {
            Some(bytes) => Ok(Some(keys::split_id(bytes).0)),
            None => Ok(None),
        }
    }

    /// All `(languageRefsetId, acceptabilityId)` entries of a description.
    pub fn acceptability_entries(
        &self,
        description_id: SctId,
    ) -> StoreResult<Vec<(SctId, SctId)>> {
        let rtxn = self.env.read_txn()?;
        let mut out = Vec::new();
        for entry in self
            .buckets
            .acceptability
            .prefix_iter(&rtxn, &keys::id(description_id))?
        {
            let (key, value) = entry?;
            let (_, rest) = keys::split_id(key);
            let (refset_id, _) = keys::split_id(rest);
            out.push((refset_id, keys::split_id(value).0));
        }
        Ok(out)
    }

    // =========================================================================
    // Streaming
    // =========================================================================

    /// Streams every concept row.
    pub fn for_each_concept(
        &self,
        mut f: impl FnMut(Concept) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let rtxn = self.env.read_txn()?;
        for entry in self.buckets.concept.iter(&rtxn)? {
            let (_, bytes) = entry?;
            if let Component::Concept(c) = decode_component(bytes)? {
                f(c)?;
            }
        }
        Ok(())
    }

    /// Streams every description row.
    pub fn for_each_description(
        &self,
        mut f: impl FnMut(Description) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let rtxn = self.env.read_txn()?;
        for entry in self.buckets.description.iter(&rtxn)? {
            let (_, bytes) = entry?;
            if let Component::Description(d) = decode_component(bytes)? {
                f(d)?;
            }
        }
        Ok(())
    }

    /// Streams every relationship row.
    pub fn for_each_relationship(
        &self,
        mut f: impl FnMut(Relationship) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let rtxn = self.env.read_txn()?;
        for entry in self.buckets.relationship.iter(&rtxn)? {
            let (_, bytes) = entry?;
            if let Component::Relationship(r) = decode_component(bytes)? {
                f(r)?;
            }
        }
        Ok(())
    }

    /// Streams every refset member, ordered by `(refsetId, itemId)`.
    pub fn for_each_refset_member(
        &self,
        mut f: impl FnMut(RefsetItem) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let rtxn = self.env.read_txn()?;
        for entry in self.buckets.refset_items.iter(&rtxn)? {
            let (key, _) = entry?;
            let (_, rest) = keys::split_id(key);
            let (uuid, _) = keys::split_uuid(rest);
            if let Some(bytes) = self.buckets.refset_item.get(&rtxn, &keys::uuid(&uuid))? {
                f(decode_refset_item(bytes)?)?;
            }
        }
        Ok(())
    }

    /// Streams every refset member straight from the primary bucket, in
    /// UUID order; used before the derived `refset-items` bucket exists.
    pub fn for_each_refset_item_raw(
        &self,
        mut f: impl FnMut(RefsetItem) -> StoreResult<()>,
    ) -> StoreResult<()> {
        let rtxn = self.env.read_txn()?;
        for entry in self.buckets.refset_item.iter(&rtxn)? {
            let (_, bytes) = entry?;
            f(decode_refset_item(bytes)?)?;
        }
        Ok(())
    }

    // =========================================================================
    // Status & metadata
    // =========================================================================

    /// Row counts and index state.
    pub fn status(&self) -> StoreResult<StoreStatus> {
        let rtxn = self.env.read_txn()?;
        Ok(StoreStatus {
            concepts: self.buckets.concept.len(&rtxn)?,
            descriptions: self.buckets.description.len(&rtxn)?,
            relationships: self.buckets.relationship.len(&rtxn)?,
            concrete_values: self.buckets.concrete_value.len(&rtxn)?,
            refset_items: self.buckets.refset_item.len(&rtxn)?,
            installed_refsets: self.buckets.installed_refsets.len(&rtxn)?,
            indexed: self.buckets.meta.get(&rtxn, META_INDEXED)?.is_some(),
        })
    }

    pub(crate) fn mark_indexed(&self, wtxn: &mut RwTxn) -> StoreResult<()> {
        self.buckets.meta.put(wtxn, META_INDEXED, &[1])?;
        Ok(())
    }
}

/// Row counts reported by [`ComponentStore::status`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StoreStatus {
    /// Concept rows.
    pub concepts: u64,
    /// Description rows.
    pub descriptions: u64,
    /// Relationship rows.
    pub relationships: u64,
    /// Concrete-value rows.
    pub concrete_values: u64,
    /// Refset member rows.
    pub refset_items: u64,
    /// Installed refsets (post-index).
    pub installed_refsets: u64,
    /// Whether the derived indices have been built.
    pub indexed: bool,
}

/// The RF2 merge rule: later effective time wins, ties prefer the active
/// row, equal rows prefer the last writer.
fn merge_wins(
    new_time: NaiveDate,
    new_active: bool,
    old_time: NaiveDate,
    old_active: bool,
) -> bool {
    match new_time.cmp(&old_time) {
        std::cmp::Ordering::Greater => true,
        std::cmp::Ordering::Less => false,
        std::cmp::Ordering::Equal => !(old_active && !new_active),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_merge_rule() {
        let early = date(2002, 1, 31);
        let late = date(2020, 7, 31);
        // Later effective time always wins.
        assert!(merge_wins(late, false, early, true));
        assert!(!merge_wins(early, true, late, false));
        // Ties prefer the active row.
        assert!(merge_wins(late, true, late, false));
        assert!(!merge_wins(late, false, late, true));
        // Equal activity: last writer wins.
        assert!(merge_wins(late, true, late, true));
        assert!(merge_wins(late, false, late, false));
    }
}
