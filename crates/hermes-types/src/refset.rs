//! Reference set member types.
//!
//! Refset items are polymorphic: the fields carried by a member are declared
//! per reference set (by the refset-descriptor refset and the release file
//! headings), not by the item itself. The engine reifies every row to a
//! tagged [`RefsetBody`] variant so that an encoded item carries a one-byte
//! discriminator and a byte slice decodes to the right concrete variant
//! without consulting the descriptor table.

use chrono::{Datelike, NaiveDate};
use uuid::Uuid;

use crate::error::ImportRowError;
use crate::SctId;

/// One-byte discriminator written ahead of every encoded refset item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum RefsetKind {
    /// Membership only.
    Simple = 1,
    /// Language acceptability.
    Language = 2,
    /// Single map target.
    SimpleMap = 3,
    /// Grouped, prioritised map.
    ComplexMap = 4,
    /// Complex map with a map category.
    ExtendedMap = 5,
    /// Historical association.
    Association = 6,
    /// Attribute value.
    AttributeValue = 7,
    /// OWL expression axiom or ontology row.
    OwlExpression = 8,
    /// Reference set descriptor.
    RefsetDescriptor = 9,
    /// Module dependency.
    ModuleDependency = 10,
    /// MRCM domain.
    MrcmDomain = 11,
    /// MRCM attribute domain.
    MrcmAttributeDomain = 12,
    /// MRCM attribute range.
    MrcmAttributeRange = 13,
    /// MRCM module scope.
    MrcmModuleScope = 14,
    /// Unreified extra columns, kept verbatim.
    Raw = 15,
}

impl RefsetKind {
    /// Decodes a discriminator byte.
    pub fn from_u8(tag: u8) -> Option<Self> {
        Some(match tag {
            1 => RefsetKind::Simple,
            2 => RefsetKind::Language,
            3 => RefsetKind::SimpleMap,
            4 => RefsetKind::ComplexMap,
            5 => RefsetKind::ExtendedMap,
            6 => RefsetKind::Association,
            7 => RefsetKind::AttributeValue,
            8 => RefsetKind::OwlExpression,
            9 => RefsetKind::RefsetDescriptor,
            10 => RefsetKind::ModuleDependency,
            11 => RefsetKind::MrcmDomain,
            12 => RefsetKind::MrcmAttributeDomain,
            13 => RefsetKind::MrcmAttributeRange,
            14 => RefsetKind::MrcmModuleScope,
            15 => RefsetKind::Raw,
            _ => return None,
        })
    }
}

/// Variant-specific fields of a refset member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RefsetBody {
    /// Membership only.
    Simple,
    /// Language refset: preferred/acceptable per dialect.
    Language {
        /// Acceptability concept (preferred or acceptable).
        acceptability_id: SctId,
    },
    /// Simple map to an external code.
    SimpleMap {
        /// The external code.
        map_target: String,
    },
    /// Complex map row.
    ComplexMap {
        /// Group of this map row.
        map_group: u32,
        /// Priority within the group.
        map_priority: u32,
        /// Machine-readable rule.
        map_rule: String,
        /// Human-readable advice.
        map_advice: String,
        /// The external code.
        map_target: String,
        /// Correlation concept.
        correlation_id: SctId,
    },
    /// Extended map row (ICD-10 style).
    ExtendedMap {
        /// Group of this map row.
        map_group: u32,
        /// Priority within the group.
        map_priority: u32,
        /// Machine-readable rule.
        map_rule: String,
        /// Human-readable advice.
        map_advice: String,
        /// The external code.
        map_target: String,
        /// Correlation concept.
        correlation_id: SctId,
        /// Map category concept.
        map_category_id: SctId,
    },
    /// Historical association to a target component.
    Association {
        /// The association target.
        target_component_id: SctId,
    },
    /// Attribute value annotation.
    AttributeValue {
        /// The value concept.
        value_id: SctId,
    },
    /// OWL expression row.
    OwlExpression {
        /// OWL functional syntax.
        owl_expression: String,
    },
    /// Declares one field of a reference set's schema.
    RefsetDescriptor {
        /// Concept naming the field.
        attribute_description_id: SctId,
        /// Concept naming the field's type.
        attribute_type_id: SctId,
        /// Position of the field, zero-based from the common header.
        attribute_order: u32,
    },
    /// Declares a dependency between module versions.
    ModuleDependency {
        /// Version of the depending module.
        source_effective_time: NaiveDate,
        /// Required version of the depended-on module.
        target_effective_time: NaiveDate,
    },
    /// MRCM domain row.
    MrcmDomain {
        /// Domain constraint (ECL).
        domain_constraint: String,
        /// Parent domain expression.
        parent_domain: String,
        /// Proximal primitive constraint (ECL).
        proximal_primitive_constraint: String,
        /// Proximal primitive refinement.
        proximal_primitive_refinement: String,
        /// Precoordination template.
        domain_template_for_precoordination: String,
        /// Postcoordination template.
        domain_template_for_postcoordination: String,
        /// Editorial guide reference.
        guide_url: String,
    },
    /// MRCM attribute-domain row.
    MrcmAttributeDomain {
        /// Domain concept.
        domain_id: SctId,
        /// Whether the attribute may be grouped.
        grouped: bool,
        /// Cardinality of the attribute in the domain.
        attribute_cardinality: String,
        /// Cardinality within a group.
        attribute_in_group_cardinality: String,
        /// Rule strength concept.
        rule_strength_id: SctId,
        /// Content type concept.
        content_type_id: SctId,
    },
    /// MRCM attribute-range row.
    MrcmAttributeRange {
        /// Range constraint (ECL).
        range_constraint: String,
        /// Attribute rule (ECL).
        attribute_rule: String,
        /// Rule strength concept.
        rule_strength_id: SctId,
        /// Content type concept.
        content_type_id: SctId,
    },
    /// MRCM module-scope row.
    MrcmModuleScope {
        /// The MRCM rule refset in scope for the module.
        mrcm_rule_refset_id: SctId,
    },
    /// Extra columns that could not be reified yet, kept verbatim in file
    /// order. The index phase retries reification against the descriptor
    /// table.
    Raw {
        /// Cell values beyond the common six-column header.
        values: Vec<String>,
    },
}

impl RefsetBody {
    /// The discriminator for this variant.
    pub fn kind(&self) -> RefsetKind {
        match self {
            RefsetBody::Simple => RefsetKind::Simple,
            RefsetBody::Language { .. } => RefsetKind::Language,
            RefsetBody::SimpleMap { .. } => RefsetKind::SimpleMap,
            RefsetBody::ComplexMap { .. } => RefsetKind::ComplexMap,
            RefsetBody::ExtendedMap { .. } => RefsetKind::ExtendedMap,
            RefsetBody::Association { .. } => RefsetKind::Association,
            RefsetBody::AttributeValue { .. } => RefsetKind::AttributeValue,
            RefsetBody::OwlExpression { .. } => RefsetKind::OwlExpression,
            RefsetBody::RefsetDescriptor { .. } => RefsetKind::RefsetDescriptor,
            RefsetBody::ModuleDependency { .. } => RefsetKind::ModuleDependency,
            RefsetBody::MrcmDomain { .. } => RefsetKind::MrcmDomain,
            RefsetBody::MrcmAttributeDomain { .. } => RefsetKind::MrcmAttributeDomain,
            RefsetBody::MrcmAttributeRange { .. } => RefsetKind::MrcmAttributeRange,
            RefsetBody::MrcmModuleScope { .. } => RefsetKind::MrcmModuleScope,
            RefsetBody::Raw { .. } => RefsetKind::Raw,
        }
    }

    /// The declared fields of this variant, in schema order.
    ///
    /// Raw bodies expose nothing; they are reified before indexing.
    pub fn fields(&self) -> Vec<(FieldId, FieldValue<'_>)> {
        match self {
            RefsetBody::Simple | RefsetBody::Raw { .. } => Vec::new(),
            RefsetBody::Language { acceptability_id } => {
                vec![(FieldId::AcceptabilityId, FieldValue::Id(*acceptability_id))]
            }
            RefsetBody::SimpleMap { map_target } => {
                vec![(FieldId::MapTarget, FieldValue::Text(map_target))]
            }
            RefsetBody::ComplexMap {
                map_group,
                map_priority,
                map_rule,
                map_advice,
                map_target,
                correlation_id,
            } => vec![
                (FieldId::MapGroup, FieldValue::Int(i64::from(*map_group))),
                (FieldId::MapPriority, FieldValue::Int(i64::from(*map_priority))),
                (FieldId::MapRule, FieldValue::Text(map_rule)),
                (FieldId::MapAdvice, FieldValue::Text(map_advice)),
                (FieldId::MapTarget, FieldValue::Text(map_target)),
                (FieldId::CorrelationId, FieldValue::Id(*correlation_id)),
            ],
            RefsetBody::ExtendedMap {
                map_group,
                map_priority,
                map_rule,
                map_advice,
                map_target,
                correlation_id,
                map_category_id,
            } => vec![
                (FieldId::MapGroup, FieldValue::Int(i64::from(*map_group))),
                (FieldId::MapPriority, FieldValue::Int(i64::from(*map_priority))),
                (FieldId::MapRule, FieldValue::Text(map_rule)),
                (FieldId::MapAdvice, FieldValue::Text(map_advice)),
                (FieldId::MapTarget, FieldValue::Text(map_target)),
                (FieldId::CorrelationId, FieldValue::Id(*correlation_id)),
                (FieldId::MapCategoryId, FieldValue::Id(*map_category_id)),
            ],
            RefsetBody::Association { target_component_id } => {
                vec![(FieldId::TargetComponentId, FieldValue::Id(*target_component_id))]
            }
            RefsetBody::AttributeValue { value_id } => {
                vec![(FieldId::ValueId, FieldValue::Id(*value_id))]
            }
            RefsetBody::OwlExpression { owl_expression } => {
                vec![(FieldId::OwlExpression, FieldValue::Text(owl_expression))]
            }
            RefsetBody::RefsetDescriptor {
                attribute_description_id,
                attribute_type_id,
                attribute_order,
            } => vec![
                (FieldId::AttributeDescriptionId, FieldValue::Id(*attribute_description_id)),
                (FieldId::AttributeTypeId, FieldValue::Id(*attribute_type_id)),
                (FieldId::AttributeOrder, FieldValue::Int(i64::from(*attribute_order))),
            ],
            RefsetBody::ModuleDependency {
                source_effective_time,
                target_effective_time,
            } => vec![
                (FieldId::SourceEffectiveTime, FieldValue::Date(*source_effective_time)),
                (FieldId::TargetEffectiveTime, FieldValue::Date(*target_effective_time)),
            ],
            RefsetBody::MrcmDomain {
                domain_constraint,
                parent_domain,
                proximal_primitive_constraint,
                proximal_primitive_refinement,
                domain_template_for_precoordination,
                domain_template_for_postcoordination,
                guide_url,
            } => vec![
                (FieldId::DomainConstraint, FieldValue::Text(domain_constraint)),
                (FieldId::ParentDomain, FieldValue::Text(parent_domain)),
                (FieldId::ProximalPrimitiveConstraint, FieldValue::Text(proximal_primitive_constraint)),
                (FieldId::ProximalPrimitiveRefinement, FieldValue::Text(proximal_primitive_refinement)),
                (FieldId::DomainTemplateForPrecoordination, FieldValue::Text(domain_template_for_precoordination)),
                (FieldId::DomainTemplateForPostcoordination, FieldValue::Text(domain_template_for_postcoordination)),
                (FieldId::GuideUrl, FieldValue::Text(guide_url)),
            ],
            RefsetBody::MrcmAttributeDomain {
                domain_id,
                grouped,
                attribute_cardinality,
                attribute_in_group_cardinality,
                rule_strength_id,
                content_type_id,
            } => vec![
                (FieldId::DomainId, FieldValue::Id(*domain_id)),
                (FieldId::Grouped, FieldValue::Bool(*grouped)),
                (FieldId::AttributeCardinality, FieldValue::Text(attribute_cardinality)),
                (FieldId::AttributeInGroupCardinality, FieldValue::Text(attribute_in_group_cardinality)),
                (FieldId::RuleStrengthId, FieldValue::Id(*rule_strength_id)),
                (FieldId::ContentTypeId, FieldValue::Id(*content_type_id)),
            ],
            RefsetBody::MrcmAttributeRange {
                range_constraint,
                attribute_rule,
                rule_strength_id,
                content_type_id,
            } => vec![
                (FieldId::RangeConstraint, FieldValue::Text(range_constraint)),
                (FieldId::AttributeRule, FieldValue::Text(attribute_rule)),
                (FieldId::RuleStrengthId, FieldValue::Id(*rule_strength_id)),
                (FieldId::ContentTypeId, FieldValue::Id(*content_type_id)),
            ],
            RefsetBody::MrcmModuleScope { mrcm_rule_refset_id } => {
                vec![(FieldId::MrcmRuleRefsetId, FieldValue::Id(*mrcm_rule_refset_id))]
            }
        }
    }
}

/// A reference set member.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RefsetItem {
    /// Member identifier; refset members are keyed by UUID, not SCTID.
    pub id: Uuid,
    /// Date this row became effective.
    pub effective_time: NaiveDate,
    /// Whether the membership is active.
    pub active: bool,
    /// Module that owns this row.
    pub module_id: SctId,
    /// The reference set.
    pub refset_id: SctId,
    /// The component that is a member.
    pub referenced_component_id: SctId,
    /// Variant-specific fields.
    pub body: RefsetBody,
}

impl RefsetItem {
    /// Reifies a parsed RF2 refset row.
    ///
    /// The first six headings are the common member header; the remainder
    /// select the typed variant. Unrecognised heading shapes land in
    /// [`RefsetBody::Raw`] for descriptor-driven reification during the
    /// index phase. Rows whose field count disagrees with the header are
    /// rejected.
    pub fn from_row(headings: &[&str], row: &[&str]) -> Result<RefsetItem, ImportRowError> {
        if row.len() != headings.len() {
            return Err(ImportRowError::FieldCount {
                expected: headings.len(),
                found: row.len(),
            });
        }
        if headings.len() < 6 {
            return Err(ImportRowError::FieldCount {
                expected: 6,
                found: headings.len(),
            });
        }
        let id = parse_uuid(headings[0], row[0])?;
        let effective_time = parse_date(headings[1], row[1])?;
        let active = parse_bool(headings[2], row[2])?;
        let module_id = parse_id(headings[3], row[3])?;
        let refset_id = parse_id(headings[4], row[4])?;
        let referenced_component_id = parse_id(headings[5], row[5])?;

        let extra_headings = &headings[6..];
        let extra = &row[6..];
        let body = match extra_headings {
            [] => RefsetBody::Simple,
            ["acceptabilityId"] => RefsetBody::Language {
                acceptability_id: parse_id(extra_headings[0], extra[0])?,
            },
            ["mapTarget"] => RefsetBody::SimpleMap {
                map_target: extra[0].to_string(),
            },
            ["mapGroup", "mapPriority", "mapRule", "mapAdvice", "mapTarget", "correlationId"] => {
                RefsetBody::ComplexMap {
                    map_group: parse_int(extra_headings[0], extra[0])?,
                    map_priority: parse_int(extra_headings[1], extra[1])?,
                    map_rule: extra[2].to_string(),
                    map_advice: extra[3].to_string(),
                    map_target: extra[4].to_string(),
                    correlation_id: parse_id(extra_headings[5], extra[5])?,
                }
            }
            ["mapGroup", "mapPriority", "mapRule", "mapAdvice", "mapTarget", "correlationId", "mapCategoryId"] => {
                RefsetBody::ExtendedMap {
                    map_group: parse_int(extra_headings[0], extra[0])?,
                    map_priority: parse_int(extra_headings[1], extra[1])?,
                    map_rule: extra[2].to_string(),
                    map_advice: extra[3].to_string(),
                    map_target: extra[4].to_string(),
                    correlation_id: parse_id(extra_headings[5], extra[5])?,
                    map_category_id: parse_id(extra_headings[6], extra[6])?,
                }
            }
            ["targetComponentId"] => RefsetBody::Association {
                target_component_id: parse_id(extra_headings[0], extra[0])?,
            },
            ["valueId"] => RefsetBody::AttributeValue {
                value_id: parse_id(extra_headings[0], extra[0])?,
            },
            ["owlExpression"] => RefsetBody::OwlExpression {
                owl_expression: extra[0].to_string(),
            },
            ["attributeDescription", "attributeType", "attributeOrder"] => {
                RefsetBody::RefsetDescriptor {
                    attribute_description_id: parse_id(extra_headings[0], extra[0])?,
                    attribute_type_id: parse_id(extra_headings[1], extra[1])?,
                    attribute_order: parse_int(extra_headings[2], extra[2])?,
                }
            }
            ["sourceEffectiveTime", "targetEffectiveTime"] => RefsetBody::ModuleDependency {
                source_effective_time: parse_date(extra_headings[0], extra[0])?,
                target_effective_time: parse_date(extra_headings[1], extra[1])?,
            },
            ["domainConstraint", "parentDomain", "proximalPrimitiveConstraint", "proximalPrimitiveRefinement", "domainTemplateForPrecoordination", "domainTemplateForPostcoordination", "guideURL"] => {
                RefsetBody::MrcmDomain {
                    domain_constraint: extra[0].to_string(),
                    parent_domain: extra[1].to_string(),
                    proximal_primitive_constraint: extra[2].to_string(),
                    proximal_primitive_refinement: extra[3].to_string(),
                    domain_template_for_precoordination: extra[4].to_string(),
                    domain_template_for_postcoordination: extra[5].to_string(),
                    guide_url: extra[6].to_string(),
                }
            }
            ["domainId", "grouped", "attributeCardinality", "attributeInGroupCardinality", "ruleStrengthId", "contentTypeId"] => {
                RefsetBody::MrcmAttributeDomain {
                    domain_id: parse_id(extra_headings[0], extra[0])?,
                    grouped: parse_bool(extra_headings[1], extra[1])?,
                    attribute_cardinality: extra[2].to_string(),
                    attribute_in_group_cardinality: extra[3].to_string(),
                    rule_strength_id: parse_id(extra_headings[4], extra[4])?,
                    content_type_id: parse_id(extra_headings[5], extra[5])?,
                }
            }
            ["rangeConstraint", "attributeRule", "ruleStrengthId", "contentTypeId"] => {
                RefsetBody::MrcmAttributeRange {
                    range_constraint: extra[0].to_string(),
                    attribute_rule: extra[1].to_string(),
                    rule_strength_id: parse_id(extra_headings[2], extra[2])?,
                    content_type_id: parse_id(extra_headings[3], extra[3])?,
                }
            }
            ["mrcmRuleRefsetId"] => RefsetBody::MrcmModuleScope {
                mrcm_rule_refset_id: parse_id(extra_headings[0], extra[0])?,
            },
            _ => RefsetBody::Raw {
                values: extra.iter().map(|v| v.to_string()).collect(),
            },
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
}

fn parse_uuid(heading: &str, value: &str) -> Result<Uuid, ImportRowError> {
    Uuid::parse_str(value).map_err(|_| ImportRowError::FieldValue {
        heading: heading.to_string(),
        expected: "UUID",
        value: value.to_string(),
    })
}

fn parse_id(heading: &str, value: &str) -> Result<SctId, ImportRowError> {
    value.parse().map_err(|_| ImportRowError::FieldValue {
        heading: heading.to_string(),
        expected: "SCTID",
        value: value.to_string(),
    })
}

fn parse_int(heading: &str, value: &str) -> Result<u32, ImportRowError> {
    value.parse().map_err(|_| ImportRowError::FieldValue {
        heading: heading.to_string(),
        expected: "integer",
        value: value.to_string(),
    })
}

fn parse_bool(heading: &str, value: &str) -> Result<bool, ImportRowError> {
    match value {
        "1" => Ok(true),
        "0" => Ok(false),
        _ => Err(ImportRowError::FieldValue {
            heading: heading.to_string(),
            expected: "RF2 boolean",
            value: value.to_string(),
        }),
    }
}

/// Parses an RF2 `YYYYMMDD` effective time.
pub fn parse_date(heading: &str, value: &str) -> Result<NaiveDate, ImportRowError> {
    NaiveDate::parse_from_str(value, "%Y%m%d").map_err(|_| ImportRowError::FieldValue {
        heading: heading.to_string(),
        expected: "YYYYMMDD date",
        value: value.to_string(),
    })
}

/// Identifies a declared refset field for reverse indexing and member
/// filters. The discriminant doubles as the on-disk field tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
#[allow(missing_docs)]
pub enum FieldId {
    AcceptabilityId = 1,
    MapTarget = 2,
    MapGroup = 3,
    MapPriority = 4,
    MapRule = 5,
    MapAdvice = 6,
    CorrelationId = 7,
    MapCategoryId = 8,
    TargetComponentId = 9,
    ValueId = 10,
    OwlExpression = 11,
    AttributeDescriptionId = 12,
    AttributeTypeId = 13,
    AttributeOrder = 14,
    SourceEffectiveTime = 15,
    TargetEffectiveTime = 16,
    DomainConstraint = 17,
    ParentDomain = 18,
    ProximalPrimitiveConstraint = 19,
    ProximalPrimitiveRefinement = 20,
    DomainTemplateForPrecoordination = 21,
    DomainTemplateForPostcoordination = 22,
    GuideUrl = 23,
    DomainId = 24,
    Grouped = 25,
    AttributeCardinality = 26,
    AttributeInGroupCardinality = 27,
    RuleStrengthId = 28,
    ContentTypeId = 29,
    RangeConstraint = 30,
    AttributeRule = 31,
    MrcmRuleRefsetId = 32,
}

impl FieldId {
    /// Resolves an RF2 column heading to a field identifier.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "acceptabilityId" => FieldId::AcceptabilityId,
            "mapTarget" => FieldId::MapTarget,
            "mapGroup" => FieldId::MapGroup,
            "mapPriority" => FieldId::MapPriority,
            "mapRule" => FieldId::MapRule,
            "mapAdvice" => FieldId::MapAdvice,
            "correlationId" => FieldId::CorrelationId,
            "mapCategoryId" => FieldId::MapCategoryId,
            "targetComponentId" => FieldId::TargetComponentId,
            "valueId" => FieldId::ValueId,
            "owlExpression" => FieldId::OwlExpression,
            "attributeDescription" => FieldId::AttributeDescriptionId,
            "attributeType" => FieldId::AttributeTypeId,
            "attributeOrder" => FieldId::AttributeOrder,
            "sourceEffectiveTime" => FieldId::SourceEffectiveTime,
            "targetEffectiveTime" => FieldId::TargetEffectiveTime,
            "domainConstraint" => FieldId::DomainConstraint,
            "parentDomain" => FieldId::ParentDomain,
            "proximalPrimitiveConstraint" => FieldId::ProximalPrimitiveConstraint,
            "proximalPrimitiveRefinement" => FieldId::ProximalPrimitiveRefinement,
            "domainTemplateForPrecoordination" => FieldId::DomainTemplateForPrecoordination,
            "domainTemplateForPostcoordination" => FieldId::DomainTemplateForPostcoordination,
            "guideURL" => FieldId::GuideUrl,
            "domainId" => FieldId::DomainId,
            "grouped" => FieldId::Grouped,
            "attributeCardinality" => FieldId::AttributeCardinality,
            "attributeInGroupCardinality" => FieldId::AttributeInGroupCardinality,
            "ruleStrengthId" => FieldId::RuleStrengthId,
            "contentTypeId" => FieldId::ContentTypeId,
            "rangeConstraint" => FieldId::RangeConstraint,
            "attributeRule" => FieldId::AttributeRule,
            "mrcmRuleRefsetId" => FieldId::MrcmRuleRefsetId,
            _ => return None,
        })
    }

    /// Decodes an on-disk field tag.
    pub fn from_u8(tag: u8) -> Option<Self> {
        const ALL: [FieldId; 32] = [
            FieldId::AcceptabilityId,
            FieldId::MapTarget,
            FieldId::MapGroup,
            FieldId::MapPriority,
            FieldId::MapRule,
            FieldId::MapAdvice,
            FieldId::CorrelationId,
            FieldId::MapCategoryId,
            FieldId::TargetComponentId,
            FieldId::ValueId,
            FieldId::OwlExpression,
            FieldId::AttributeDescriptionId,
            FieldId::AttributeTypeId,
            FieldId::AttributeOrder,
            FieldId::SourceEffectiveTime,
            FieldId::TargetEffectiveTime,
            FieldId::DomainConstraint,
            FieldId::ParentDomain,
            FieldId::ProximalPrimitiveConstraint,
            FieldId::ProximalPrimitiveRefinement,
            FieldId::DomainTemplateForPrecoordination,
            FieldId::DomainTemplateForPostcoordination,
            FieldId::GuideUrl,
            FieldId::DomainId,
            FieldId::Grouped,
            FieldId::AttributeCardinality,
            FieldId::AttributeInGroupCardinality,
            FieldId::RuleStrengthId,
            FieldId::ContentTypeId,
            FieldId::RangeConstraint,
            FieldId::AttributeRule,
            FieldId::MrcmRuleRefsetId,
        ];
        ALL.get(tag.checked_sub(1)? as usize).copied()
    }
}

/// A field value borrowed from a refset body, with a canonical byte form
/// used as the sort key of the reverse indices.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue<'a> {
    /// An SCTID-valued field.
    Id(SctId),
    /// A string-valued field.
    Text(&'a str),
    /// An integer-valued field.
    Int(i64),
    /// An RF2 boolean field.
    Bool(bool),
    /// A date-valued field.
    Date(NaiveDate),
}

impl FieldValue<'_> {
    /// Canonical big-endian byte form; lexicographic order on the bytes
    /// matches the natural order of the value.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            FieldValue::Id(id) => id.to_be_bytes().to_vec(),
            FieldValue::Text(s) => s.as_bytes().to_vec(),
            // Bias preserves order for negative integers.
            FieldValue::Int(i) => (*i as u64 ^ (1 << 63)).to_be_bytes().to_vec(),
            FieldValue::Bool(b) => vec![u8::from(*b)],
            FieldValue::Date(d) => {
                (d.num_days_from_ce() as u32).to_be_bytes().to_vec()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: [&str; 6] = [
        "id",
        "effectiveTime",
        "active",
        "moduleId",
        "refsetId",
        "referencedComponentId",
    ];

    fn with_extra(extra: &[&str]) -> Vec<&'static str> {
        // Leaks are fine in tests; keeps fixtures terse.
        let mut headings: Vec<&'static str> = HEADER.to_vec();
        for h in extra {
            headings.push(Box::leak(h.to_string().into_boxed_str()));
        }
        headings
    }

    #[test]
    fn test_language_row_reifies() {
        let headings = with_extra(&["acceptabilityId"]);
        let row = vec![
            "80000517-8513-5ca0-a44c-dc66f3c3a1c6",
            "20020131",
            "1",
            "900000000000207008",
            "900000000000508004",
            "754786011",
            "900000000000548007",
        ];
        let item = RefsetItem::from_row(&headings, &row).unwrap();
        assert_eq!(item.refset_id, 900000000000508004);
        assert_eq!(
            item.body,
            RefsetBody::Language {
                acceptability_id: 900000000000548007
            }
        );
        assert_eq!(item.body.kind(), RefsetKind::Language);
    }

    #[test]
    fn test_field_count_mismatch_rejected() {
        let headings = with_extra(&["acceptabilityId"]);
        let row = vec![
            "80000517-8513-5ca0-a44c-dc66f3c3a1c6",
            "20020131",
            "1",
            "900000000000207008",
            "900000000000508004",
            "754786011",
        ];
        assert_eq!(
            RefsetItem::from_row(&headings, &row),
            Err(ImportRowError::FieldCount {
                expected: 7,
                found: 6
            })
        );
    }

    #[test]
    fn test_unknown_shape_kept_raw() {
        let headings = with_extra(&["somethingNovel"]);
        let row = vec![
            "80000517-8513-5ca0-a44c-dc66f3c3a1c6",
            "20020131",
            "1",
            "900000000000207008",
            "123456789",
            "754786011",
            "payload",
        ];
        let item = RefsetItem::from_row(&headings, &row).unwrap();
        assert_eq!(
            item.body,
            RefsetBody::Raw {
                values: vec!["payload".to_string()]
            }
        );
    }

    #[test]
    fn test_field_id_round_trip() {
        for tag in 1u8..=32 {
            let field = FieldId::from_u8(tag).unwrap();
            assert_eq!(field as u8, tag);
        }
        assert_eq!(FieldId::from_u8(0), None);
        assert_eq!(FieldId::from_u8(33), None);
        assert_eq!(FieldId::from_name("mapTarget"), Some(FieldId::MapTarget));
    }

    #[test]
    fn test_int_field_byte_order() {
        let neg = FieldValue::Int(-5).to_bytes();
        let zero = FieldValue::Int(0).to_bytes();
        let pos = FieldValue::Int(5).to_bytes();
        assert!(neg < zero);
        assert!(zero < pos);
    }
}
