//! Compact binary encoding of every component variant.
//!
//! The encoding is the store's value format and the search index's stored
//! field format, so it is endian-stable and self-describing:
//!
//! - identifiers and module ids are signed 64-bit big-endian;
//! - small positive values (relationship group, days-since-epoch dates,
//!   string lengths) are LEB128 varints, dates zig-zag encoded;
//! - strings are UTF-8 with a varint length prefix, which covers both the
//!   common short-term case and multi-kilobyte textual definitions;
//! - refset item ids are 16-byte UUIDs;
//! - a one-byte kind tag precedes every component, and a second one-byte
//!   variant tag precedes refset bodies, so a byte slice reifies to the
//!   correct concrete variant without consulting the descriptor table.
//!
//! Law: `decode_component(encode_component(x)) == x` for every variant.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::ComponentError;
use crate::refset::{RefsetBody, RefsetItem, RefsetKind};
use crate::{Component, Concept, ConcreteValue, Description, Relationship, SctId};

/// Days from 0001-01-01 (CE) to 1970-01-01.
const EPOCH_CE_DAYS: i64 = 719_163;

// =============================================================================
// Component kind tags
// =============================================================================

const TAG_CONCEPT: u8 = 1;
const TAG_DESCRIPTION: u8 = 2;
const TAG_RELATIONSHIP: u8 = 3;
const TAG_CONCRETE_VALUE: u8 = 4;
const TAG_REFSET_ITEM: u8 = 5;

// =============================================================================
// Encoder
// =============================================================================

fn put_u8(buf: &mut Vec<u8>, v: u8) {
    buf.push(v);
}

fn put_bool(buf: &mut Vec<u8>, v: bool) {
    buf.push(u8::from(v));
}

fn put_i64(buf: &mut Vec<u8>, v: i64) {
    buf.extend_from_slice(&v.to_be_bytes());
}

fn put_varint(buf: &mut Vec<u8>, mut v: u64) {
    loop {
        let byte = (v & 0x7f) as u8;
        v >>= 7;
        if v == 0 {
            buf.push(byte);
            return;
        }
        buf.push(byte | 0x80);
    }
}

fn put_date(buf: &mut Vec<u8>, date: NaiveDate) {
    let days = i64::from(date.num_days_from_ce()) - EPOCH_CE_DAYS;
    // Zig-zag keeps pre-epoch dates legal while staying one byte for the
    // common post-2002 case... of course RF2 never ships those, but the
    // codec should not care.
    put_varint(buf, ((days << 1) ^ (days >> 63)) as u64);
}

fn put_str(buf: &mut Vec<u8>, s: &str) {
    put_varint(buf, s.len() as u64);
    buf.extend_from_slice(s.as_bytes());
}

fn put_uuid(buf: &mut Vec<u8>, id: &Uuid) {
    buf.extend_from_slice(id.as_bytes());
}

// =============================================================================
// Decoder
// =============================================================================

/// Cursor over an encoded component.
struct Decoder<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ComponentError> {
        if self.pos + n > self.buf.len() {
            return Err(ComponentError::Truncated(self.pos));
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, ComponentError> {
        Ok(self.take(1)?[0])
    }

    fn bool(&mut self) -> Result<bool, ComponentError> {
        Ok(self.u8()? != 0)
    }

    fn i64(&mut self) -> Result<i64, ComponentError> {
        let bytes = self.take(8)?;
        Ok(i64::from_be_bytes(bytes.try_into().expect("8-byte slice")))
    }

    fn varint(&mut self) -> Result<u64, ComponentError> {
        let start = self.pos;
        let mut v = 0u64;
        let mut shift = 0u32;
        loop {
            let byte = self.u8()?;
            v |= u64::from(byte & 0x7f) << shift;
            if byte & 0x80 == 0 {
                return Ok(v);
            }
            shift += 7;
            if shift >= 64 {
                return Err(ComponentError::MalformedVarint(start));
            }
        }
    }

    fn date(&mut self) -> Result<NaiveDate, ComponentError> {
        let start = self.pos;
        let z = self.varint()?;
        let days = ((z >> 1) as i64) ^ -((z & 1) as i64);
        let ce = days + EPOCH_CE_DAYS;
        i32::try_from(ce)
            .ok()
            .and_then(NaiveDate::from_num_days_from_ce_opt)
            .ok_or(ComponentError::DateOutOfRange(start))
    }

    fn string(&mut self) -> Result<String, ComponentError> {
        let len = self.varint()? as usize;
        let start = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ComponentError::InvalidUtf8(start))
    }

    fn uuid(&mut self) -> Result<Uuid, ComponentError> {
        let bytes = self.take(16)?;
        Ok(Uuid::from_bytes(bytes.try_into().expect("16-byte slice")))
    }

    fn finished(&self) -> bool {
        self.pos == self.buf.len()
    }
}

// =============================================================================
// Component encoding
// =============================================================================

/// Encodes a component with its one-byte kind tag.
pub fn encode_component(component: &Component) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    match component {
        Component::Concept(c) => {
            put_u8(&mut buf, TAG_CONCEPT);
            put_i64(&mut buf, c.id);
            put_date(&mut buf, c.effective_time);
            put_bool(&mut buf, c.active);
            put_i64(&mut buf, c.module_id);
            put_i64(&mut buf, c.definition_status_id);
        }
        Component::Description(d) => {
            put_u8(&mut buf, TAG_DESCRIPTION);
            put_i64(&mut buf, d.id);
            put_date(&mut buf, d.effective_time);
            put_bool(&mut buf, d.active);
            put_i64(&mut buf, d.module_id);
            put_i64(&mut buf, d.concept_id);
            put_str(&mut buf, &d.language_code);
            put_i64(&mut buf, d.type_id);
            put_str(&mut buf, &d.term);
            put_i64(&mut buf, d.case_significance_id);
        }
        Component::Relationship(r) => {
            put_u8(&mut buf, TAG_RELATIONSHIP);
            put_i64(&mut buf, r.id);
            put_date(&mut buf, r.effective_time);
            put_bool(&mut buf, r.active);
            put_i64(&mut buf, r.module_id);
            put_i64(&mut buf, r.source_id);
            put_i64(&mut buf, r.destination_id);
            put_varint(&mut buf, u64::from(r.relationship_group));
            put_i64(&mut buf, r.type_id);
            put_i64(&mut buf, r.characteristic_type_id);
            put_i64(&mut buf, r.modifier_id);
        }
        Component::ConcreteValue(v) => {
            put_u8(&mut buf, TAG_CONCRETE_VALUE);
            put_i64(&mut buf, v.id);
            put_date(&mut buf, v.effective_time);
            put_bool(&mut buf, v.active);
            put_i64(&mut buf, v.module_id);
            put_i64(&mut buf, v.source_id);
            put_str(&mut buf, &v.value);
            put_varint(&mut buf, u64::from(v.relationship_group));
            put_i64(&mut buf, v.type_id);
            put_i64(&mut buf, v.characteristic_type_id);
            put_i64(&mut buf, v.modifier_id);
        }
        Component::RefsetItem(item) => {
            put_u8(&mut buf, TAG_REFSET_ITEM);
            encode_refset_item_into(&mut buf, item);
        }
    }
    buf
}

/// Encodes a refset item without the component kind tag; this is the
/// `refset-item` bucket value format, led by the variant tag.
pub fn encode_refset_item(item: &RefsetItem) -> Vec<u8> {
    let mut buf = Vec::with_capacity(64);
    encode_refset_item_into(&mut buf, item);
    buf
}

fn encode_refset_item_into(buf: &mut Vec<u8>, item: &RefsetItem) {
    put_u8(buf, item.body.kind() as u8);
    put_uuid(buf, &item.id);
    put_date(buf, item.effective_time);
    put_bool(buf, item.active);
    put_i64(buf, item.module_id);
    put_i64(buf, item.refset_id);
    put_i64(buf, item.referenced_component_id);
    match &item.body {
        RefsetBody::Simple => {}
        RefsetBody::Language { acceptability_id } => put_i64(buf, *acceptability_id),
        RefsetBody::SimpleMap { map_target } => put_str(buf, map_target),
        RefsetBody::ComplexMap {
            map_group,
            map_priority,
            map_rule,
            map_advice,
            map_target,
            correlation_id,
        } => {
            put_varint(buf, u64::from(*map_group));
            put_varint(buf, u64::from(*map_priority));
            put_str(buf, map_rule);
            put_str(buf, map_advice);
            put_str(buf, map_target);
            put_i64(buf, *correlation_id);
        }
        RefsetBody::ExtendedMap {
            map_group,
            map_priority,
            map_rule,
            map_advice,
            map_target,
            correlation_id,
            map_category_id,
        } => {
            put_varint(buf, u64::from(*map_group));
            put_varint(buf, u64::from(*map_priority));
            put_str(buf, map_rule);
            put_str(buf, map_advice);
            put_str(buf, map_target);
            put_i64(buf, *correlation_id);
            put_i64(buf, *map_category_id);
        }
        RefsetBody::Association { target_component_id } => put_i64(buf, *target_component_id),
        RefsetBody::AttributeValue { value_id } => put_i64(buf, *value_id),
        RefsetBody::OwlExpression { owl_expression } => put_str(buf, owl_expression),
        RefsetBody::RefsetDescriptor {
            attribute_description_id,
            attribute_type_id,
            attribute_order,
        } => {
            put_i64(buf, *attribute_description_id);
            put_i64(buf, *attribute_type_id);
            put_varint(buf, u64::from(*attribute_order));
        }
        RefsetBody::ModuleDependency {
            source_effective_time,
            target_effective_time,
        } => {
            put_date(buf, *source_effective_time);
            put_date(buf, *target_effective_time);
        }
        RefsetBody::MrcmDomain {
            domain_constraint,
            parent_domain,
            proximal_primitive_constraint,
            proximal_primitive_refinement,
            domain_template_for_precoordination,
            domain_template_for_postcoordination,
            guide_url,
        } => {
            put_str(buf, domain_constraint);
            put_str(buf, parent_domain);
            put_str(buf, proximal_primitive_constraint);
            put_str(buf, proximal_primitive_refinement);
            put_str(buf, domain_template_for_precoordination);
            put_str(buf, domain_template_for_postcoordination);
            put_str(buf, guide_url);
        }
        RefsetBody::MrcmAttributeDomain {
            domain_id,
            grouped,
            attribute_cardinality,
            attribute_in_group_cardinality,
            rule_strength_id,
            content_type_id,
        } => {
            put_i64(buf, *domain_id);
            put_bool(buf, *grouped);
            put_str(buf, attribute_cardinality);
            put_str(buf, attribute_in_group_cardinality);
            put_i64(buf, *rule_strength_id);
            put_i64(buf, *content_type_id);
        }
        RefsetBody::MrcmAttributeRange {
            range_constraint,
            attribute_rule,
            rule_strength_id,
            content_type_id,
        } => {
            put_str(buf, range_constraint);
            put_str(buf, attribute_rule);
            put_i64(buf, *rule_strength_id);
            put_i64(buf, *content_type_id);
        }
        RefsetBody::MrcmModuleScope { mrcm_rule_refset_id } => {
            put_i64(buf, *mrcm_rule_refset_id)
        }
        RefsetBody::Raw { values } => {
            put_varint(buf, values.len() as u64);
            for v in values {
                put_str(buf, v);
            }
        }
    }
}

// =============================================================================
// Component decoding
// =============================================================================

/// Decodes a tagged component.
pub fn decode_component(bytes: &[u8]) -> Result<Component, ComponentError> {
    let mut d = Decoder::new(bytes);
    let tag = d.u8()?;
    let component = match tag {
        TAG_CONCEPT => Component::Concept(Concept {
            id: d.i64()?,
            effective_time: d.date()?,
            active: d.bool()?,
            module_id: d.i64()?,
            definition_status_id: d.i64()?,
        }),
        TAG_DESCRIPTION => Component::Description(Description {
            id: d.i64()?,
            effective_time: d.date()?,
            active: d.bool()?,
            module_id: d.i64()?,
            concept_id: d.i64()?,
            language_code: d.string()?,
            type_id: d.i64()?,
            term: d.string()?,
            case_significance_id: d.i64()?,
        }),
        TAG_RELATIONSHIP => Component::Relationship(Relationship {
            id: d.i64()?,
            effective_time: d.date()?,
            active: d.bool()?,
            module_id: d.i64()?,
            source_id: d.i64()?,
            destination_id: d.i64()?,
            relationship_group: d.varint()? as u32,
            type_id: d.i64()?,
            characteristic_type_id: d.i64()?,
            modifier_id: d.i64()?,
        }),
        TAG_CONCRETE_VALUE => Component::ConcreteValue(ConcreteValue {
            id: d.i64()?,
            effective_time: d.date()?,
            active: d.bool()?,
            module_id: d.i64()?,
            source_id: d.i64()?,
            value: d.string()?,
            relationship_group: d.varint()? as u32,
            type_id: d.i64()?,
            characteristic_type_id: d.i64()?,
            modifier_id: d.i64()?,
        }),
        TAG_REFSET_ITEM => Component::RefsetItem(decode_refset_item_body(&mut d)?),
        _ => return Err(ComponentError::UnknownTag { tag, offset: 0 }),
    };
    debug_assert!(d.finished(), "trailing bytes after component");
    Ok(component)
}

/// Decodes a refset item from its variant-tagged bucket value.
pub fn decode_refset_item(bytes: &[u8]) -> Result<RefsetItem, ComponentError> {
    decode_refset_item_body(&mut Decoder::new(bytes))
}

fn decode_refset_item_body(d: &mut Decoder<'_>) -> Result<RefsetItem, ComponentError> {
    let offset = d.pos;
    let tag = d.u8()?;
    let kind = RefsetKind::from_u8(tag).ok_or(ComponentError::UnknownTag { tag, offset })?;
    let id = d.uuid()?;
    let effective_time = d.date()?;
    let active = d.bool()?;
    let module_id = d.i64()?;
    let refset_id = d.i64()?;
    let referenced_component_id = d.i64()?;
    let body = match kind {
        RefsetKind::Simple => RefsetBody::Simple,
        RefsetKind::Language => RefsetBody::Language {
            acceptability_id: d.i64()?,
        },
        RefsetKind::SimpleMap => RefsetBody::SimpleMap {
            map_target: d.string()?,
        },
        RefsetKind::ComplexMap => RefsetBody::ComplexMap {
            map_group: d.varint()? as u32,
            map_priority: d.varint()? as u32,
            map_rule: d.string()?,
            map_advice: d.string()?,
            map_target: d.string()?,
            correlation_id: d.i64()?,
        },
        RefsetKind::ExtendedMap => RefsetBody::ExtendedMap {
            map_group: d.varint()? as u32,
            map_priority: d.varint()? as u32,
            map_rule: d.string()?,
            map_advice: d.string()?,
            map_target: d.string()?,
            correlation_id: d.i64()?,
            map_category_id: d.i64()?,
        },
        RefsetKind::Association => RefsetBody::Association {
            target_component_id: d.i64()?,
        },
        RefsetKind::AttributeValue => RefsetBody::AttributeValue { value_id: d.i64()? },
        RefsetKind::OwlExpression => RefsetBody::OwlExpression {
            owl_expression: d.string()?,
        },
        RefsetKind::RefsetDescriptor => RefsetBody::RefsetDescriptor {
            attribute_description_id: d.i64()?,
            attribute_type_id: d.i64()?,
            attribute_order: d.varint()? as u32,
        },
        RefsetKind::ModuleDependency => RefsetBody::ModuleDependency {
            source_effective_time: d.date()?,
            target_effective_time: d.date()?,
        },
        RefsetKind::MrcmDomain => RefsetBody::MrcmDomain {
            domain_constraint: d.string()?,
            parent_domain: d.string()?,
            proximal_primitive_constraint: d.string()?,
            proximal_primitive_refinement: d.string()?,
            domain_template_for_precoordination: d.string()?,
            domain_template_for_postcoordination: d.string()?,
            guide_url: d.string()?,
        },
        RefsetKind::MrcmAttributeDomain => RefsetBody::MrcmAttributeDomain {
            domain_id: d.i64()?,
            grouped: d.bool()?,
            attribute_cardinality: d.string()?,
            attribute_in_group_cardinality: d.string()?,
            rule_strength_id: d.i64()?,
            content_type_id: d.i64()?,
        },
        RefsetKind::MrcmAttributeRange => RefsetBody::MrcmAttributeRange {
            range_constraint: d.string()?,
            attribute_rule: d.string()?,
            rule_strength_id: d.i64()?,
            content_type_id: d.i64()?,
        },
        RefsetKind::MrcmModuleScope => RefsetBody::MrcmModuleScope {
            mrcm_rule_refset_id: d.i64()?,
        },
        RefsetKind::Raw => {
            let count = d.varint()? as usize;
            let mut values = Vec::with_capacity(count);
            for _ in 0..count {
                values.push(d.string()?);
            }
            RefsetBody::Raw { values }
        }
    };
    Ok(RefsetItem {
        id,
        effective_time,
        active,
        module_id,
        refset_id,
        referenced_component_id,
        body,
    })
}

// =============================================================================
// Derived-index value encodings
// =============================================================================

/// Encodes a `{typeId → sorted id set}` map, the value format of the
/// `concept-parents` and `concept-children` buckets.
pub fn encode_id_map(map: &std::collections::BTreeMap<SctId, Vec<SctId>>) -> Vec<u8> {
    let mut buf = Vec::with_capacity(16 + map.len() * 32);
    put_varint(&mut buf, map.len() as u64);
    for (type_id, ids) in map {
        put_i64(&mut buf, *type_id);
        put_varint(&mut buf, ids.len() as u64);
        for id in ids {
            put_i64(&mut buf, *id);
        }
    }
    buf
}

/// Decodes a `{typeId → sorted id set}` map.
pub fn decode_id_map(
    bytes: &[u8],
) -> Result<std::collections::BTreeMap<SctId, Vec<SctId>>, ComponentError> {
    let mut d = Decoder::new(bytes);
    let entries = d.varint()? as usize;
    let mut map = std::collections::BTreeMap::new();
    for _ in 0..entries {
        let type_id = d.i64()?;
        let len = d.varint()? as usize;
        let mut ids = Vec::with_capacity(len);
        for _ in 0..len {
            ids.push(d.i64()?);
        }
        map.insert(type_id, ids);
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::well_known;
    use std::collections::BTreeMap;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn concept() -> Concept {
        Concept {
            id: 24700007,
            effective_time: date(2002, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            definition_status_id: well_known::PRIMITIVE,
        }
    }

    fn header_item(body: RefsetBody) -> RefsetItem {
        RefsetItem {
            id: Uuid::from_u128(0x8000_0517_8513_5ca0_a44c_dc66_f3c3_a1c6),
            effective_time: date(2020, 7, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            refset_id: well_known::ICD10_COMPLEX_MAP,
            referenced_component_id: 24700007,
            body,
        }
    }

    #[test]
    fn test_concept_round_trip() {
        let x = Component::Concept(concept());
        assert_eq!(decode_component(&encode_component(&x)).unwrap(), x);
    }

    #[test]
    fn test_description_round_trip() {
        let x = Component::Description(Description {
            id: 754786011,
            effective_time: date(2017, 7, 31),
            active: false,
            module_id: well_known::CORE_MODULE,
            concept_id: 73211009,
            language_code: "en".to_string(),
            type_id: well_known::SYNONYM,
            term: "Fracture de l'humérus".to_string(),
            case_significance_id: well_known::CASE_INSENSITIVE,
        });
        assert_eq!(decode_component(&encode_component(&x)).unwrap(), x);
    }

    #[test]
    fn test_long_term_round_trip() {
        // Terms beyond the 16-bit length boundary still encode.
        let x = Component::Description(Description {
            id: 754786011,
            effective_time: date(2017, 7, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            concept_id: 73211009,
            language_code: "en".to_string(),
            type_id: well_known::DEFINITION,
            term: "x".repeat(70_000),
            case_significance_id: well_known::CASE_INSENSITIVE,
        });
        assert_eq!(decode_component(&encode_component(&x)).unwrap(), x);
    }

    #[test]
    fn test_relationship_round_trip() {
        let x = Component::Relationship(Relationship {
            id: 3287417029,
            effective_time: date(2002, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: 24700007,
            destination_id: 6118003,
            relationship_group: 300,
            type_id: well_known::IS_A,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
            modifier_id: well_known::EXISTENTIAL_MODIFIER,
        });
        assert_eq!(decode_component(&encode_component(&x)).unwrap(), x);
    }

    #[test]
    fn test_concrete_value_round_trip() {
        let x = Component::ConcreteValue(ConcreteValue {
            id: 15,
            effective_time: date(2021, 1, 31),
            active: true,
            module_id: well_known::CORE_MODULE,
            source_id: 322236009,
            value: "#500".to_string(),
            relationship_group: 1,
            type_id: 1142135004,
            characteristic_type_id: well_known::INFERRED_RELATIONSHIP,
            modifier_id: well_known::EXISTENTIAL_MODIFIER,
        });
        assert_eq!(decode_component(&encode_component(&x)).unwrap(), x);
    }

    #[test]
    fn test_every_refset_variant_round_trips() {
        let bodies = vec![
            RefsetBody::Simple,
            RefsetBody::Language {
                acceptability_id: well_known::PREFERRED,
            },
            RefsetBody::SimpleMap {
                map_target: "G35".to_string(),
            },
            RefsetBody::ComplexMap {
                map_group: 1,
                map_priority: 2,
                map_rule: "TRUE".to_string(),
                map_advice: "ALWAYS G35.9".to_string(),
                map_target: "G35.9".to_string(),
                correlation_id: 447561005,
            },
            RefsetBody::ExtendedMap {
                map_group: 1,
                map_priority: 1,
                map_rule: String::new(),
                map_advice: String::new(),
                map_target: "I30".to_string(),
                correlation_id: 447561005,
                map_category_id: 447637006,
            },
            RefsetBody::Association {
                target_component_id: 24700007,
            },
            RefsetBody::AttributeValue { value_id: 900000000000489007 },
            RefsetBody::OwlExpression {
                owl_expression: "SubClassOf(:24700007 :6118003)".to_string(),
            },
            RefsetBody::RefsetDescriptor {
                attribute_description_id: 449608002,
                attribute_type_id: 900000000000461009,
                attribute_order: 0,
            },
            RefsetBody::ModuleDependency {
                source_effective_time: date(2023, 4, 1),
                target_effective_time: date(2023, 1, 31),
            },
            RefsetBody::MrcmDomain {
                domain_constraint: "<< 404684003".to_string(),
                parent_domain: String::new(),
                proximal_primitive_constraint: "<< 404684003".to_string(),
                proximal_primitive_refinement: String::new(),
                domain_template_for_precoordination: "[[+id(<< 404684003)]]".to_string(),
                domain_template_for_postcoordination: String::new(),
                guide_url: "https://example.org/guide".to_string(),
            },
            RefsetBody::MrcmAttributeDomain {
                domain_id: 404684003,
                grouped: true,
                attribute_cardinality: "0..*".to_string(),
                attribute_in_group_cardinality: "0..1".to_string(),
                rule_strength_id: 723597001,
                content_type_id: 723596005,
            },
            RefsetBody::MrcmAttributeRange {
                range_constraint: "<< 123037004".to_string(),
                attribute_rule: String::new(),
                rule_strength_id: 723597001,
                content_type_id: 723596005,
            },
            RefsetBody::MrcmModuleScope {
                mrcm_rule_refset_id: 723560006,
            },
            RefsetBody::Raw {
                values: vec!["a".to_string(), String::new(), "ç".to_string()],
            },
        ];
        for body in bodies {
            let item = header_item(body);
            let bytes = encode_refset_item(&item);
            assert_eq!(decode_refset_item(&bytes).unwrap(), item, "variant {:?}", item.body.kind());
            // And through the component-tagged path.
            let tagged = encode_component(&Component::RefsetItem(item.clone()));
            assert_eq!(
                decode_component(&tagged).unwrap(),
                Component::RefsetItem(item)
            );
        }
    }

    #[test]
    fn test_unknown_tag_rejected() {
        assert!(matches!(
            decode_component(&[0xEE]),
            Err(ComponentError::UnknownTag { tag: 0xEE, .. })
        ));
    }

    #[test]
    fn test_truncation_rejected() {
        let bytes = encode_component(&Component::Concept(concept()));
        for cut in 1..bytes.len() {
            assert!(
                decode_component(&bytes[..cut]).is_err(),
                "cut at {cut} should fail"
            );
        }
    }

    #[test]
    fn test_id_map_round_trip() {
        let mut map = BTreeMap::new();
        map.insert(well_known::IS_A, vec![6118003, 64572001, 138875005]);
        map.insert(363698007, vec![25087005]);
        assert_eq!(decode_id_map(&encode_id_map(&map)).unwrap(), map);
        assert!(decode_id_map(&encode_id_map(&BTreeMap::new())).unwrap().is_empty());
    }
}
