//! Lowering of ECL syntax trees to search-index queries.
//!
//! The compiler walks the AST bottom-up producing [`Query`] nodes. Most
//! operators map one-to-one onto posting-list queries; dotted and reverse
//! refinements, member filters, history supplements and top/bottom-of-set
//! realise an intermediate concept-id set against the index and re-embed it
//! as a `ConceptIds` node, which keeps the result composable with outer
//! AND/OR/MINUS without blowing up the query tree.

use hashbrown::HashSet;
use tracing::debug;

use hermes_search::{
    AcceptabilityKind, MemberFilter, MemberIndex, MemberOp, Query, SearchIndex,
};
use hermes_store::{historical_refsets, with_historical, ComponentStore, HistoryProfile};
use hermes_types::{well_known, FieldId, SctId};

use crate::ast::{
    Acceptability, AttributeClause, Cardinality, ClauseOperator, ClauseValue, Comparison,
    Constraint, Filter, MemberValue, Refinement, TermMatch,
};
use crate::error::{EclError, EclResult};
use crate::parser::parse;

/// Compiles parsed constraints against an open store and its indices.
pub struct Compiler<'a> {
    store: &'a ComponentStore,
    index: &'a SearchIndex,
    members: &'a MemberIndex,
}

impl<'a> Compiler<'a> {
    /// Creates a compiler over the open handles.
    pub fn new(
        store: &'a ComponentStore,
        index: &'a SearchIndex,
        members: &'a MemberIndex,
    ) -> Self {
        Self { store, index, members }
    }

    /// Parses and compiles an ECL string.
    pub fn compile_str(&self, ecl: &str) -> EclResult<Query> {
        let constraint = parse(ecl)?;
        self.compile(&constraint)
    }

    /// Compiles a constraint to an executable query.
    pub fn compile(&self, constraint: &Constraint) -> EclResult<Query> {
        match constraint {
            Constraint::Concept { id, .. } => Ok(Query::self_of(*id)),
            // Everything the index knows descends from the root, so the
            // wildcard is the whole document set.
            Constraint::Wildcard => Ok(Query::All),
            Constraint::DescendantOf(inner) => self.closure(inner, Query::DescendantOf),
            Constraint::DescendantOrSelfOf(inner) => {
                self.closure(inner, Query::DescendantOrSelfOf)
            }
            Constraint::ChildOf(inner) => self.closure(inner, Query::ChildOf),
            Constraint::ChildOrSelfOf(inner) => self.closure(inner, Query::ChildOrSelfOf),
            Constraint::AncestorOf(inner) => self.closure(inner, Query::AncestorOf),
            Constraint::AncestorOrSelfOf(inner) => self.closure(inner, Query::AncestorOrSelfOf),
            Constraint::ParentOf(inner) => self.closure(inner, Query::ParentOf),
            Constraint::ParentOrSelfOf(inner) => self.closure(inner, Query::ParentOrSelfOf),
            Constraint::MemberOf(inner) => {
                Ok(Query::MemberOfAny(self.realise_refsets(inner)?))
            }
            Constraint::And(a, b) => Ok(Query::and([self.compile(a)?, self.compile(b)?])),
            Constraint::Or(a, b) => Ok(Query::or([self.compile(a)?, self.compile(b)?])),
            Constraint::Minus(a, b) => Ok(Query::not(self.compile(a)?, self.compile(b)?)),
            Constraint::Nested(inner) => self.compile(inner),
            Constraint::Refined { focus, refinement } => {
                let focus = self.compile(focus)?;
                let refinement = self.lower_refinement(refinement)?;
                Ok(Query::and([focus, refinement]))
            }
            Constraint::Dotted { source, attribute } => {
                let sources = self.realise(source)?;
                let types = self.resolve_attribute_types(attribute)?;
                let mut values: HashSet<SctId> = HashSet::new();
                for concept in sources {
                    for type_id in &types {
                        values.extend(self.store.attribute_values(concept, *type_id)?);
                    }
                }
                Ok(Query::concept_ids(values))
            }
            Constraint::Filtered { source, filters } => self.lower_filtered(source, filters),
            Constraint::TopOfSet(inner) => {
                let set = self.realise(inner)?;
                Ok(Query::concept_ids(self.frontier(&set, true)?))
            }
            Constraint::BottomOfSet(inner) => {
                let set = self.realise(inner)?;
                Ok(Query::concept_ids(self.frontier(&set, false)?))
            }
        }
    }

    /// Realises a constraint as the set of matching concept ids.
    pub fn realise(&self, constraint: &Constraint) -> EclResult<Vec<SctId>> {
        let query = self.compile(constraint)?;
        let mut ids: Vec<SctId> = self
            .index
            .concept_ids_matching(self.store, &query)?
            .into_iter()
            .collect();
        ids.sort_unstable();
        debug!(constraint = %constraint, count = ids.len(), "realised intermediate concept set");
        Ok(ids)
    }

    fn closure(
        &self,
        inner: &Constraint,
        make: impl Fn(SctId) -> Query,
    ) -> EclResult<Query> {
        match inner.unwrap_nested() {
            Constraint::Concept { id, .. } => Ok(make(*id)),
            // The closure of the wildcard is every concept.
            Constraint::Wildcard => Ok(Query::All),
            other => {
                let ids = self.realise(other)?;
                Ok(Query::or(ids.into_iter().map(make)))
            }
        }
    }

    /// Resolves `^ X`: the refsets X realises to, filtered to installed
    /// refsets.
    fn realise_refsets(&self, inner: &Constraint) -> EclResult<Vec<SctId>> {
        match inner.unwrap_nested() {
            Constraint::Concept { id, .. } => Ok(vec![*id]),
            Constraint::Wildcard => Ok(self.store.installed_refsets()?),
            other => {
                let installed: HashSet<SctId> =
                    self.store.installed_refsets()?.into_iter().collect();
                Ok(self
                    .realise(other)?
                    .into_iter()
                    .filter(|id| installed.contains(id))
                    .collect())
            }
        }
    }

    /// Resolves an attribute-name expression to relationship type ids.
    ///
    /// A wildcard name means any descendant of the concept-model attribute
    /// root; an expression name is realised like any other constraint.
    fn resolve_attribute_types(&self, name: &Constraint) -> EclResult<Vec<SctId>> {
        match name.unwrap_nested() {
            Constraint::Concept { id, .. } => Ok(vec![*id]),
            Constraint::Wildcard => {
                let mut types = self
                    .store
                    .all_child_ids(well_known::CONCEPT_MODEL_ATTRIBUTE)?;
                types.push(well_known::CONCEPT_MODEL_ATTRIBUTE);
                Ok(types)
            }
            other => self.realise(other),
        }
    }

    // =========================================================================
    // Refinements
    // =========================================================================

    fn lower_refinement(&self, refinement: &Refinement) -> EclResult<Query> {
        let mut clauses = Vec::new();
        for clause in &refinement.ungrouped {
            clauses.push(self.lower_clause(clause)?);
        }
        for group in &refinement.groups {
            if group.cardinality.is_some() {
                return Err(EclError::Unsupported {
                    fragment: format!("group cardinality in {}", refinement),
                });
            }
            // Group cohesion is not representable in the per-concept
            // attribute postings; grouped clauses lower as a conjunction.
            for clause in &group.clauses {
                clauses.push(self.lower_clause(clause)?);
            }
        }
        Ok(Query::and(clauses))
    }

    fn lower_clause(&self, clause: &AttributeClause) -> EclResult<Query> {
        let value_expr = match &clause.value {
            ClauseValue::Expression(expr) => expr,
            ClauseValue::Concrete { .. } => {
                return Err(EclError::Unsupported {
                    fragment: clause.to_string(),
                })
            }
        };
        let types = self.resolve_attribute_types(&clause.name)?;
        if clause.reverse {
            return self.lower_reverse_clause(clause, &types, value_expr);
        }

        let values = match value_expr.unwrap_nested() {
            Constraint::Wildcard => None,
            other => Some(self.realise(other)?),
        };
        let present = Query::or(
            types
                .iter()
                .map(|t| Query::AttributeCount { type_id: *t, min: 1, max: None }),
        );
        let in_set = match &values {
            None => present.clone(),
            Some(values) => Query::or(types.iter().map(|t| Query::AttributeInSet {
                type_id: *t,
                values: values.clone(),
            })),
        };

        let base = match clause.operator {
            ClauseOperator::Equal => in_set,
            ClauseOperator::NotEqual => {
                if clause.cardinality.is_some_and(|c| c.is_zero()) {
                    return Err(EclError::Unsupported {
                        fragment: clause.to_string(),
                    });
                }
                // Attribute present with some value outside the set.
                Query::not(present.clone(), in_set)
            }
        };

        match clause.cardinality {
            None => Ok(base),
            Some(card) if card.is_zero() => {
                // [0..0] means the absence of any matching attribute.
                Ok(Query::not(Query::All, base))
            }
            Some(Cardinality { min, max }) => {
                let count = Query::or(types.iter().map(|t| Query::AttributeCount {
                    type_id: *t,
                    min,
                    max,
                }));
                if values.is_none() {
                    Ok(count)
                } else {
                    Ok(Query::and([count, base]))
                }
            }
        }
    }

    /// `R attr = X`: concepts that are destinations of `attr` sourced at
    /// the realisation of X.
    fn lower_reverse_clause(
        &self,
        clause: &AttributeClause,
        types: &[SctId],
        value_expr: &Constraint,
    ) -> EclResult<Query> {
        if clause.cardinality.is_some() {
            return Err(EclError::Unsupported {
                fragment: clause.to_string(),
            });
        }
        let sources = match value_expr.unwrap_nested() {
            Constraint::Wildcard => {
                return Err(EclError::Unsupported {
                    fragment: clause.to_string(),
                })
            }
            other => self.realise(other)?,
        };
        let mut destinations: HashSet<SctId> = HashSet::new();
        for source in sources {
            for type_id in types {
                destinations.extend(self.store.attribute_values(source, *type_id)?);
            }
        }
        Ok(Query::concept_ids(destinations))
    }

    // =========================================================================
    // Filters
    // =========================================================================

    fn lower_filtered(&self, source: &Constraint, filters: &[Filter]) -> EclResult<Query> {
        let mut member_filters: Vec<&Filter> = Vec::new();
        let mut history: Option<Option<HistoryProfile>> = None;
        let mut description_clauses: Vec<Query> = Vec::new();

        for filter in filters {
            match filter {
                Filter::Member { .. } => member_filters.push(filter),
                Filter::History { profile } => history = Some(*profile),
                other => description_clauses.push(self.lower_description_filter(other)?),
            }
        }

        let base = if member_filters.is_empty() {
            self.compile(source)?
        } else {
            self.lower_member_filters(source, &member_filters)?
        };

        let mut query = Query::and(std::iter::once(base).chain(description_clauses));

        if let Some(profile) = history {
            let ids: Vec<SctId> = self
                .index
                .concept_ids_matching(self.store, &query)?
                .into_iter()
                .collect();
            let refsets = historical_refsets(self.store, profile.unwrap_or_default())?;
            let expanded = with_historical(self.store, &ids, &refsets)?;
            query = Query::concept_ids(expanded);
        }
        Ok(query)
    }

    fn lower_description_filter(&self, filter: &Filter) -> EclResult<Query> {
        match filter {
            Filter::Term { match_type, values } => Ok(Query::or(values.iter().map(|v| {
                match match_type {
                    TermMatch::Contains => Query::term(v),
                    TermMatch::Wildcard => Query::Wildcard(v.clone()),
                }
            }))),
            Filter::Language { codes } => Ok(Query::or(
                codes.iter().map(|c| Query::LanguageCode(c.to_ascii_lowercase())),
            )),
            Filter::DescriptionType { type_ids } => {
                Ok(Query::or(type_ids.iter().map(|t| Query::TypeId(*t))))
            }
            Filter::Dialect { refset_ids, acceptability } => {
                Ok(Query::or(refset_ids.iter().flat_map(|refset| {
                    let mut alternatives = Vec::new();
                    if !matches!(acceptability, Some(Acceptability::Acceptable)) {
                        alternatives.push(Query::Acceptability {
                            kind: AcceptabilityKind::PreferredIn,
                            refset_id: *refset,
                        });
                    }
                    if !matches!(acceptability, Some(Acceptability::Preferred)) {
                        alternatives.push(Query::Acceptability {
                            kind: AcceptabilityKind::AcceptableIn,
                            refset_id: *refset,
                        });
                    }
                    alternatives
                })))
            }
            Filter::PreferredIn { refset_ids } => {
                Ok(Query::or(refset_ids.iter().map(|r| Query::Acceptability {
                    kind: AcceptabilityKind::PreferredIn,
                    refset_id: *r,
                })))
            }
            Filter::AcceptableIn { refset_ids } => {
                Ok(Query::or(refset_ids.iter().map(|r| Query::Acceptability {
                    kind: AcceptabilityKind::AcceptableIn,
                    refset_id: *r,
                })))
            }
            Filter::LanguageRefset { refset_ids } => {
                Ok(Query::or(refset_ids.iter().flat_map(|r| {
                    [
                        Query::Acceptability {
                            kind: AcceptabilityKind::PreferredIn,
                            refset_id: *r,
                        },
                        Query::Acceptability {
                            kind: AcceptabilityKind::AcceptableIn,
                            refset_id: *r,
                        },
                    ]
                })))
            }
            Filter::Active(active) => Ok(Query::ActiveConcept(*active)),
            Filter::Id { ids } => Ok(Query::ConceptIds(ids.clone())),
            unsupported @ (Filter::Module { .. }
            | Filter::DefinitionStatus { .. }
            | Filter::EffectiveTime { .. }
            | Filter::SemanticTag { .. }) => Err(EclError::Unsupported {
                fragment: unsupported.to_string(),
            }),
            Filter::Member { .. } | Filter::History { .. } => {
                unreachable!("member and history filters are routed separately")
            }
        }
    }

    /// `^ X {{ M field op value }}`: query the member index over the focus
    /// refsets and embed the referenced components.
    fn lower_member_filters(
        &self,
        source: &Constraint,
        filters: &[&Filter],
    ) -> EclResult<Query> {
        let refsets = match source.unwrap_nested() {
            Constraint::MemberOf(inner) => self.realise_refsets(inner)?,
            other => {
                return Err(EclError::Unsupported {
                    fragment: format!("member filter on non-member expression: {other}"),
                })
            }
        };

        let mut positive = Vec::new();
        let mut negative = Vec::new();
        for filter in filters {
            let Filter::Member { field, op, value } = filter else {
                continue;
            };
            let field_id = FieldId::from_name(field).ok_or_else(|| EclError::Unsupported {
                fragment: format!("unknown member field '{field}'"),
            })?;
            let bytes = member_value_bytes(field_id, value, filter)?;
            match op {
                Comparison::Equal => positive.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::Equal,
                    value: bytes,
                }),
                Comparison::NotEqual => negative.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::Equal,
                    value: bytes,
                }),
                Comparison::LessThan => positive.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::LessThan,
                    value: bytes,
                }),
                Comparison::LessThanOrEqual => positive.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::LessThanOrEqual,
                    value: bytes,
                }),
                Comparison::GreaterThan => positive.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::GreaterThan,
                    value: bytes,
                }),
                Comparison::GreaterThanOrEqual => positive.push(MemberFilter {
                    field: field_id,
                    op: MemberOp::GreaterThanOrEqual,
                    value: bytes,
                }),
            }
        }

        let mut ids = self.members.referenced_ids(&refsets, &positive)?;
        for exclusion in negative {
            let excluded = self.members.referenced_ids(&refsets, &[exclusion])?;
            ids.retain(|id| excluded.binary_search(id).is_err());
        }
        Ok(Query::concept_ids(ids))
    }

    /// Most general (`top`) or most specific (`bottom`) members of a set.
    fn frontier(&self, set: &[SctId], top: bool) -> EclResult<Vec<SctId>> {
        let members: HashSet<SctId> = set.iter().copied().collect();
        let mut out = Vec::new();
        for &concept in set {
            if top {
                // Top: no ancestor inside the set.
                let ancestors = self.store.all_parent_ids(concept)?;
                if !ancestors.iter().any(|a| members.contains(a)) {
                    out.push(concept);
                }
            } else {
                // Bottom: no descendant inside the set.
                let descendants = self.store.all_child_ids(concept)?;
                if !descendants.iter().any(|d| members.contains(d)) {
                    out.push(concept);
                }
            }
        }
        Ok(out)
    }
}

/// Canonical byte form of a member filter value for a declared field.
fn member_value_bytes(
    field: FieldId,
    value: &MemberValue,
    filter: &Filter,
) -> EclResult<Vec<u8>> {
    let unsupported = || EclError::Unsupported {
        fragment: filter.to_string(),
    };
    match value {
        MemberValue::Time(_) | MemberValue::Decimal(_) => Err(unsupported()),
        MemberValue::String(s) => Ok(s.as_bytes().to_vec()),
        MemberValue::Boolean(b) => Ok(vec![u8::from(*b)]),
        MemberValue::Number(n) => match field {
            // Integer-typed fields use the order-preserving biased form.
            FieldId::MapGroup | FieldId::MapPriority | FieldId::AttributeOrder => {
                Ok(((*n as u64) ^ (1 << 63)).to_be_bytes().to_vec())
            }
            // Everything else numeric is an identifier.
            _ => Ok(n.to_be_bytes().to_vec()),
        },
    }
}
