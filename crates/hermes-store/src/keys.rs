//! Compound key encodings for the store buckets.
//!
//! Keys are short byte tuples of big-endian identifiers (and raw field
//! bytes), so lexicographic key order equals the natural order of the tuple
//! and prefix scans walk one identifier's entries contiguously.

use hermes_types::{FieldId, SctId};
use uuid::Uuid;

/// An identifier key: 8 bytes, big-endian.
pub fn id(id: SctId) -> [u8; 8] {
    id.to_be_bytes()
}

/// A UUID key: 16 bytes.
pub fn uuid(id: &Uuid) -> [u8; 16] {
    *id.as_bytes()
}

/// `(conceptId, descriptionId)` for the concept-descriptions bucket.
pub fn concept_description(concept_id: SctId, description_id: SctId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&concept_id.to_be_bytes());
    key[8..].copy_from_slice(&description_id.to_be_bytes());
    key
}

/// `(sourceId, typeId, destinationId, relationshipId)` for the
/// source-relationships bucket; the destination mirror uses the same shape
/// with source and destination swapped.
pub fn relationship(a: SctId, type_id: SctId, b: SctId, relationship_id: SctId) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..16].copy_from_slice(&type_id.to_be_bytes());
    key[16..24].copy_from_slice(&b.to_be_bytes());
    key[24..].copy_from_slice(&relationship_id.to_be_bytes());
    key
}

/// Prefix of [`relationship`] covering one `(id, typeId)` pair.
pub fn relationship_type_prefix(a: SctId, type_id: SctId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&a.to_be_bytes());
    key[8..].copy_from_slice(&type_id.to_be_bytes());
    key
}

/// `(componentId, refsetId, itemId)` for the component-refset-items bucket.
pub fn component_refset_item(component_id: SctId, refset_id: SctId, item: &Uuid) -> [u8; 32] {
    let mut key = [0u8; 32];
    key[..8].copy_from_slice(&component_id.to_be_bytes());
    key[8..16].copy_from_slice(&refset_id.to_be_bytes());
    key[16..].copy_from_slice(item.as_bytes());
    key
}

/// `(refsetId, itemId)` for the refset-items bucket.
pub fn refset_item(refset_id: SctId, item: &Uuid) -> [u8; 24] {
    let mut key = [0u8; 24];
    key[..8].copy_from_slice(&refset_id.to_be_bytes());
    key[8..].copy_from_slice(item.as_bytes());
    key
}

/// `(refsetId, fieldId, valueBytes, itemId)` for the refset-field-reverse
/// bucket.
pub fn field_reverse(refset_id: SctId, field: FieldId, value: &[u8], item: &Uuid) -> Vec<u8> {
    let mut key = Vec::with_capacity(25 + value.len());
    key.extend_from_slice(&refset_id.to_be_bytes());
    key.push(field as u8);
    key.extend_from_slice(value);
    key.extend_from_slice(item.as_bytes());
    key
}

/// Prefix of [`field_reverse`] covering one `(refsetId, fieldId, value…)`.
pub fn field_reverse_prefix(refset_id: SctId, field: FieldId, value: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(9 + value.len());
    key.extend_from_slice(&refset_id.to_be_bytes());
    key.push(field as u8);
    key.extend_from_slice(value);
    key
}

/// `(conceptId, languageRefsetId)` for the preferred-synonyms cache.
pub fn preferred_synonym(concept_id: SctId, refset_id: SctId) -> [u8; 16] {
    let mut key = [0u8; 16];
    key[..8].copy_from_slice(&concept_id.to_be_bytes());
    key[8..].copy_from_slice(&refset_id.to_be_bytes());
    key
}

/// `(descriptionId, languageRefsetId)` for the acceptability cache.
pub fn acceptability(description_id: SctId, refset_id: SctId) -> [u8; 16] {
    preferred_synonym(description_id, refset_id)
}

/// `(refsetId, attributeOrder)` for the refset-descriptors bucket.
pub fn descriptor(refset_id: SctId, attribute_order: u32) -> [u8; 12] {
    let mut key = [0u8; 12];
    key[..8].copy_from_slice(&refset_id.to_be_bytes());
    key[8..].copy_from_slice(&attribute_order.to_be_bytes());
    key
}

/// Splits an 8-byte big-endian identifier off the front of a key.
pub fn split_id(key: &[u8]) -> (SctId, &[u8]) {
    let (head, tail) = key.split_at(8);
    (SctId::from_be_bytes(head.try_into().expect("8-byte key segment")), tail)
}

/// Reads a UUID from the front of a key.
pub fn split_uuid(key: &[u8]) -> (Uuid, &[u8]) {
    let (head, tail) = key.split_at(16);
    (Uuid::from_bytes(head.try_into().expect("16-byte key segment")), tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compound_keys_sort_by_tuple_order() {
        let a = relationship(100, 5, 200, 1);
        let b = relationship(100, 5, 201, 0);
        let c = relationship(100, 6, 0, 0);
        let d = relationship(101, 0, 0, 0);
        assert!(a < b);
        assert!(b < c);
        assert!(c < d);
        assert!(a.starts_with(&relationship_type_prefix(100, 5)));
        assert!(!c.starts_with(&relationship_type_prefix(100, 5)));
    }

    #[test]
    fn test_split_round_trip() {
        let item = Uuid::from_u128(42);
        let key = component_refset_item(24700007, 447562003, &item);
        let (component, rest) = split_id(&key);
        let (refset, rest) = split_id(rest);
        let (found, rest) = split_uuid(rest);
        assert_eq!(component, 24700007);
        assert_eq!(refset, 447562003);
        assert_eq!(found, item);
        assert!(rest.is_empty());
    }
}
