//! The refset member search index.
//!
//! One document per active refset member in its own LMDB environment
//! (`members.db`). Field postings are keyed `(refsetId, fieldId, value)`
//! with the canonical big-endian byte form of the value, so exact lookups
//! are point reads and prefix/range member filters are key-range scans.

use std::ops::Bound;
use std::path::Path;

use heed::types::Bytes;
use heed::{Database, Env, EnvFlags, EnvOpenOptions, RoTxn};
use roaring::RoaringBitmap;
use tracing::info;

use hermes_store::ComponentStore;
use hermes_types::codec::{decode_refset_item, encode_refset_item};
use hermes_types::{FieldId, RefsetItem, SctId};

use crate::error::{SearchError, SearchResult};
use crate::index::read_bitmap;

/// Version byte this implementation reads and writes.
pub const MEMBERS_VERSION: u32 = 1;

const MAIN_VERSION: &[u8] = b"version";

/// Comparison applied by a member field filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberOp {
    /// Exact value match.
    Equal,
    /// String prefix match.
    Prefix,
    /// Strictly less than.
    LessThan,
    /// Less than or equal.
    LessThanOrEqual,
    /// Strictly greater than.
    GreaterThan,
    /// Greater than or equal.
    GreaterThanOrEqual,
}

/// One member field constraint; filters AND together.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberFilter {
    /// The declared field.
    pub field: FieldId,
    /// The comparison.
    pub op: MemberOp,
    /// Canonical byte form of the comparison value.
    pub value: Vec<u8>,
}

impl MemberFilter {
    /// An exact-match filter.
    pub fn equals(field: FieldId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field,
            op: MemberOp::Equal,
            value: value.into(),
        }
    }

    /// A string-prefix filter.
    pub fn prefix(field: FieldId, value: impl Into<Vec<u8>>) -> Self {
        Self {
            field,
            op: MemberOp::Prefix,
            value: value.into(),
        }
    }
}

/// A handle to an open member index.
pub struct MemberIndex {
    env: Env,
    main: Database<Bytes, Bytes>,
    docs: Database<Bytes, Bytes>,
    field_docids: Database<Bytes, Bytes>,
    refset_docids: Database<Bytes, Bytes>,
}

impl MemberIndex {
    /// Opens an existing member index.
    pub fn open(path: &Path, read_only: bool) -> SearchResult<Self> {
        if !path.is_dir() {
            return Err(SearchError::Corrupt(format!(
                "no member index at {}",
                path.display()
            )));
        }
        let env = Self::open_env(path, read_only)?;
        let rtxn = env.read_txn()?;
        let open = |name: &str| -> SearchResult<Database<Bytes, Bytes>> {
            env.open_database(&rtxn, Some(name))?
                .ok_or_else(|| SearchError::Corrupt(format!("missing database '{name}'")))
        };
        let index = Self {
            main: open("main")?,
            docs: open("member-docs")?,
            field_docids: open("field-docids")?,
            refset_docids: open("refset-docids")?,
            env: env.clone(),
        };
        match index.main.get(&rtxn, MAIN_VERSION)? {
            Some(bytes) => {
                let found = bytes
                    .try_into()
                    .map(u32::from_be_bytes)
                    .map_err(|_| SearchError::Corrupt("malformed version marker".into()))?;
                if found != MEMBERS_VERSION {
                    return Err(SearchError::VersionMismatch {
                        found,
                        expected: MEMBERS_VERSION,
                    });
                }
            }
            None => return Err(SearchError::Corrupt("member index has no version".into())),
        }
        drop(rtxn);
        Ok(index)
    }

    fn open_env(path: &Path, read_only: bool) -> SearchResult<Env> {
        let mut options = EnvOpenOptions::new();
        options.map_size(4 * 1024 * 1024 * 1024).max_dbs(4);
        if read_only {
            unsafe {
                options.flags(EnvFlags::READ_ONLY);
            }
        }
        Ok(unsafe { options.open(path)? })
    }

    /// Builds the member index from the store's active refset members and
    /// returns an open handle.
    pub fn build(store: &ComponentStore, path: &Path) -> SearchResult<Self> {
        std::fs::create_dir_all(path)?;
        let env = Self::open_env(path, false)?;
        let mut wtxn = env.write_txn()?;
        let main = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("main"))?;
        let docs = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("member-docs"))?;
        let field_docids = env.create_database::<Bytes, Bytes>(&mut wtxn, Some("field-docids"))?;
        let refset_docids =
            env.create_database::<Bytes, Bytes>(&mut wtxn, Some("refset-docids"))?;
        main.clear(&mut wtxn)?;
        docs.clear(&mut wtxn)?;
        field_docids.clear(&mut wtxn)?;
        refset_docids.clear(&mut wtxn)?;

        let mut items = Vec::new();
        store.for_each_refset_item_raw(|item| {
            if item.active {
                items.push(item);
            }
            Ok(())
        })?;
        items.sort_unstable_by_key(|item| (item.refset_id, item.id));

        let mut field_map: std::collections::BTreeMap<Vec<u8>, RoaringBitmap> = Default::default();
        let mut refset_map: std::collections::BTreeMap<SctId, RoaringBitmap> = Default::default();
        for (seq, item) in items.iter().enumerate() {
            let docid = seq as u32;
            docs.put(&mut wtxn, &docid.to_be_bytes(), &encode_refset_item(item))?;
            refset_map.entry(item.refset_id).or_default().insert(docid);
            for (field, value) in item.body.fields() {
                field_map
                    .entry(field_key(item.refset_id, field, &value.to_bytes()))
                    .or_default()
                    .insert(docid);
            }
        }

        let mut serialized = Vec::new();
        for (key, bitmap) in &field_map {
            serialized.clear();
            bitmap
                .serialize_into(&mut serialized)
                .map_err(|e| SearchError::Corrupt(format!("unencodable posting list: {e}")))?;
            field_docids.put(&mut wtxn, key, &serialized)?;
        }
        for (refset, bitmap) in &refset_map {
            serialized.clear();
            bitmap
                .serialize_into(&mut serialized)
                .map_err(|e| SearchError::Corrupt(format!("unencodable posting list: {e}")))?;
            refset_docids.put(&mut wtxn, &refset.to_be_bytes(), &serialized)?;
        }
        main.put(&mut wtxn, MAIN_VERSION, &MEMBERS_VERSION.to_be_bytes())?;
        wtxn.commit()?;

        info!(members = items.len(), fields = field_map.len(), "member index built");
        Ok(Self {
            env,
            main,
            docs,
            field_docids,
            refset_docids,
        })
    }

    /// Members of the given refsets matching every filter.
    pub fn members_matching(
        &self,
        refsets: &[SctId],
        filters: &[MemberFilter],
    ) -> SearchResult<Vec<RefsetItem>> {
        let rtxn = self.env.read_txn()?;
        let mut result: Option<RoaringBitmap> = None;

        let mut scope = RoaringBitmap::new();
        for refset in refsets {
            if let Some(bytes) = self.refset_docids.get(&rtxn, &refset.to_be_bytes())? {
                scope |= read_bitmap(bytes)?;
            }
        }
        if !refsets.is_empty() {
            result = Some(scope);
        }

        for filter in filters {
            let mut acc = RoaringBitmap::new();
            for refset in refsets {
                acc |= self.eval_filter(&rtxn, *refset, filter)?;
            }
            result = Some(match result {
                Some(prev) => prev & acc,
                None => acc,
            });
        }

        let docids = result.unwrap_or_default();
        let mut out = Vec::with_capacity(docids.len() as usize);
        for docid in docids {
            if let Some(bytes) = self.docs.get(&rtxn, &docid.to_be_bytes())? {
                out.push(decode_refset_item(bytes)?);
            }
        }
        Ok(out)
    }

    /// Referenced component ids of the members matching the filters.
    pub fn referenced_ids(
        &self,
        refsets: &[SctId],
        filters: &[MemberFilter],
    ) -> SearchResult<Vec<SctId>> {
        let mut ids: Vec<SctId> = self
            .members_matching(refsets, filters)?
            .into_iter()
            .map(|item| item.referenced_component_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        Ok(ids)
    }

    fn eval_filter(
        &self,
        rtxn: &RoTxn,
        refset: SctId,
        filter: &MemberFilter,
    ) -> SearchResult<RoaringBitmap> {
        let mut acc = RoaringBitmap::new();
        match filter.op {
            MemberOp::Equal => {
                let key = field_key(refset, filter.field, &filter.value);
                if let Some(bytes) = self.field_docids.get(rtxn, &key)? {
                    acc |= read_bitmap(bytes)?;
                }
            }
            MemberOp::Prefix => {
                let prefix = field_key(refset, filter.field, &filter.value);
                for entry in self.field_docids.prefix_iter(rtxn, &prefix)? {
                    let (_, bytes) = entry?;
                    acc |= read_bitmap(bytes)?;
                }
            }
            MemberOp::LessThan
            | MemberOp::LessThanOrEqual
            | MemberOp::GreaterThan
            | MemberOp::GreaterThanOrEqual => {
                let field_start = field_key(refset, filter.field, &[]);
                let pivot = field_key(refset, filter.field, &filter.value);
                let field_end = field_upper_bound(refset, filter.field);
                let (lower, upper): (Bound<&[u8]>, Bound<&[u8]>) = match filter.op {
                    MemberOp::LessThan => {
                        (Bound::Included(&field_start), Bound::Excluded(&pivot))
                    }
                    MemberOp::LessThanOrEqual => {
                        (Bound::Included(&field_start), Bound::Included(&pivot))
                    }
                    MemberOp::GreaterThan => {
                        (Bound::Excluded(&pivot), Bound::Excluded(&field_end))
                    }
                    MemberOp::GreaterThanOrEqual => {
                        (Bound::Included(&pivot), Bound::Excluded(&field_end))
                    }
                    _ => unreachable!("non-range op handled above"),
                };
                // Excluded bounds drop only the exact pivot key, so longer
                // values sharing the pivot prefix stay in range.
                for entry in self.field_docids.range(rtxn, &(lower, upper))? {
                    let (_, bytes) = entry?;
                    acc |= read_bitmap(bytes)?;
                }
            }
        }
        Ok(acc)
    }
}

fn field_key(refset: SctId, field: FieldId, value: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + value.len());
    key.extend_from_slice(&refset.to_be_bytes());
    key.push(field as u8);
    key.extend_from_slice(value);
    key
}

/// First key strictly after every `(refset, field, …)` entry.
fn field_upper_bound(refset: SctId, field: FieldId) -> Vec<u8> {
    let mut key = Vec::with_capacity(9);
    key.extend_from_slice(&refset.to_be_bytes());
    key.push(field as u8 + 1);
    key
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_key_ordering() {
        let a = field_key(447562003, FieldId::MapTarget, b"G35");
        let b = field_key(447562003, FieldId::MapTarget, b"G35.9");
        let c = field_key(447562003, FieldId::MapTarget, b"G36");
        let end = field_upper_bound(447562003, FieldId::MapTarget);
        assert!(a < b);
        assert!(b < c);
        assert!(c < end);
        assert!(b.starts_with(&a));
    }
}
