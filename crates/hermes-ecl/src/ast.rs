//! Abstract syntax tree for ECL v2.0 expression constraints.

use hermes_store::HistoryProfile;
use hermes_types::SctId;

/// A parsed expression constraint.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// A concept reference, optionally with its pipe-delimited term.
    /// Example: `404684003 |Clinical finding|`
    Concept {
        /// The concept identifier.
        id: SctId,
        /// Term carried in the source, for diagnostics and rendering.
        term: Option<String>,
    },

    /// The `*` wildcard: any concept.
    Wildcard,

    /// `< X` — strict descendants.
    DescendantOf(Box<Constraint>),
    /// `<< X` — descendants or self.
    DescendantOrSelfOf(Box<Constraint>),
    /// `<! X` — direct children.
    ChildOf(Box<Constraint>),
    /// `<<! X` — direct children or self.
    ChildOrSelfOf(Box<Constraint>),
    /// `> X` — strict ancestors.
    AncestorOf(Box<Constraint>),
    /// `>> X` — ancestors or self.
    AncestorOrSelfOf(Box<Constraint>),
    /// `>! X` — direct parents.
    ParentOf(Box<Constraint>),
    /// `>>! X` — direct parents or self.
    ParentOrSelfOf(Box<Constraint>),

    /// `^ X` — members of the refsets X realises to.
    MemberOf(Box<Constraint>),

    /// Conjunction.
    And(Box<Constraint>, Box<Constraint>),
    /// Disjunction.
    Or(Box<Constraint>, Box<Constraint>),
    /// Exclusion.
    Minus(Box<Constraint>, Box<Constraint>),

    /// Parenthesised sub-expression.
    Nested(Box<Constraint>),

    /// `X : R` — focus with attribute refinement.
    Refined {
        /// The focus constraint.
        focus: Box<Constraint>,
        /// The refinement clause.
        refinement: Refinement,
    },

    /// `X . A` — values of attribute A over the realisation of X.
    Dotted {
        /// The source constraint.
        source: Box<Constraint>,
        /// The attribute name expression.
        attribute: Box<Constraint>,
    },

    /// `X {{ … }}` — filtered constraint.
    Filtered {
        /// The source constraint.
        source: Box<Constraint>,
        /// Filters, AND-combined.
        filters: Vec<Filter>,
    },

    /// `!!> X` — most general members of the realisation.
    TopOfSet(Box<Constraint>),
    /// `!!< X` — most specific members of the realisation.
    BottomOfSet(Box<Constraint>),
}

impl Constraint {
    /// A bare concept reference.
    pub fn concept(id: SctId) -> Self {
        Constraint::Concept { id, term: None }
    }

    /// Strips `Nested` wrappers.
    pub fn unwrap_nested(&self) -> &Constraint {
        match self {
            Constraint::Nested(inner) => inner.unwrap_nested(),
            other => other,
        }
    }

    /// The concept identifier, when this is a plain reference.
    pub fn as_concept_id(&self) -> Option<SctId> {
        match self.unwrap_nested() {
            Constraint::Concept { id, .. } => Some(*id),
            _ => None,
        }
    }
}

/// Refinement clause: ungrouped attribute clauses and attribute groups,
/// all AND-combined.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Refinement {
    /// Clauses outside any group.
    pub ungrouped: Vec<AttributeClause>,
    /// Grouped clauses.
    pub groups: Vec<AttributeGroup>,
}

/// `{ … }` — attribute clauses constrained to one relationship group.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeGroup {
    /// Optional group cardinality.
    pub cardinality: Option<Cardinality>,
    /// The clauses of the group.
    pub clauses: Vec<AttributeClause>,
}

/// One attribute constraint.
///
/// Example: `[1..3] 363698007 |Finding site| = << 39057004`
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeClause {
    /// Optional cardinality.
    pub cardinality: Option<Cardinality>,
    /// Reverse flag (`R`).
    pub reverse: bool,
    /// Attribute name: a concept, wildcard, or constraint realising to
    /// attribute types.
    pub name: Box<Constraint>,
    /// `=` or `!=`.
    pub operator: ClauseOperator,
    /// The right-hand side.
    pub value: ClauseValue,
}

/// Equality operator of an attribute clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClauseOperator {
    /// Attribute value inside the realised set.
    Equal,
    /// Attribute present with a value outside the realised set.
    NotEqual,
}

/// Right-hand side of an attribute clause.
#[derive(Debug, Clone, PartialEq)]
pub enum ClauseValue {
    /// A constraint; hierarchy prefixes are folded into it.
    Expression(Box<Constraint>),
    /// A concrete comparison, e.g. `>= #500`.
    Concrete {
        /// The comparison operator.
        op: Comparison,
        /// The literal.
        value: ConcreteLiteral,
    },
}

/// Concrete literal in a refinement or member filter.
#[derive(Debug, Clone, PartialEq)]
pub enum ConcreteLiteral {
    /// `#250`
    Integer(i64),
    /// `#3.14`, kept verbatim to round-trip.
    Decimal(String),
    /// `"text"`
    String(String),
    /// `true` / `false`
    Boolean(bool),
}

/// Comparison operator for concrete values and member filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// `=`
    Equal,
    /// `!=`
    NotEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
}

/// Cardinality bounds `[min..max]`; `None` max is `*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cardinality {
    /// Minimum occurrences, inclusive.
    pub min: u32,
    /// Maximum occurrences, inclusive; unbounded when `None`.
    pub max: Option<u32>,
}

impl Cardinality {
    /// True for the `[0..0]` bounds.
    pub fn is_zero(&self) -> bool {
        self.min == 0 && self.max == Some(0)
    }
}

/// Term matching mode of a term filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TermMatch {
    /// Word-prefix match, the default.
    Contains,
    /// Glob pattern, `wild:"…"`.
    Wildcard,
}

/// Dialect acceptability qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acceptability {
    /// Preferred term only.
    Preferred,
    /// Acceptable term only.
    Acceptable,
}

/// Value of a member field filter.
#[derive(Debug, Clone, PartialEq)]
pub enum MemberValue {
    /// Quoted string.
    String(String),
    /// Bare number or identifier.
    Number(i64),
    /// `#`-prefixed decimal, kept verbatim.
    Decimal(String),
    /// Boolean literal.
    Boolean(bool),
    /// Time literal (`@yyyymmdd`), not supported by the member index.
    Time(String),
}

/// One filter inside `{{ … }}`.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `term = "heart"` or `term = wild:"hear*"`.
    Term {
        /// Matching mode.
        match_type: TermMatch,
        /// Alternatives, OR-combined.
        values: Vec<String>,
    },
    /// `language = en` or `language = (en da)`.
    Language {
        /// ISO 639-1 codes.
        codes: Vec<String>,
    },
    /// `type = syn` or `typeId = 900000000000013009`.
    DescriptionType {
        /// Description type ids.
        type_ids: Vec<SctId>,
    },
    /// `dialect = en-gb prefer` or `dialectId = 900000000000508004`.
    Dialect {
        /// Language refset ids.
        refset_ids: Vec<SctId>,
        /// Optional acceptability qualifier.
        acceptability: Option<Acceptability>,
    },
    /// `preferredIn = …`.
    PreferredIn {
        /// Language refset ids.
        refset_ids: Vec<SctId>,
    },
    /// `acceptableIn = …`.
    AcceptableIn {
        /// Language refset ids.
        refset_ids: Vec<SctId>,
    },
    /// `languageRefSetId = …`.
    LanguageRefset {
        /// Language refset ids.
        refset_ids: Vec<SctId>,
    },
    /// `active = true`.
    Active(bool),
    /// `moduleId = …` — parsed, not lowered.
    Module {
        /// Module ids.
        module_ids: Vec<SctId>,
    },
    /// `definitionStatus = primitive` — parsed, not lowered.
    DefinitionStatus {
        /// True for primitive.
        primitive: bool,
    },
    /// `effectiveTime >= 20230401` — parsed, not lowered.
    EffectiveTime {
        /// Comparison operator.
        op: Comparison,
        /// `YYYYMMDD` date.
        date: u32,
    },
    /// `semanticTag = "disorder"` — parsed, not lowered.
    SemanticTag {
        /// Tags, OR-combined.
        tags: Vec<String>,
    },
    /// `id = 24700007`.
    Id {
        /// Concept ids.
        ids: Vec<SctId>,
    },
    /// `M mapTarget = "I30"`.
    Member {
        /// The declared field name as written.
        field: String,
        /// Comparison operator.
        op: Comparison,
        /// The value.
        value: MemberValue,
    },
    /// `+HISTORY` with optional profile.
    History {
        /// Profile; the widest when omitted.
        profile: Option<HistoryProfile>,
    },
}

// =============================================================================
// Rendering
// =============================================================================

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Concept { id, term } => match term {
                Some(term) => write!(f, "{id} |{term}|"),
                None => write!(f, "{id}"),
            },
            Constraint::Wildcard => write!(f, "*"),
            Constraint::DescendantOf(inner) => write!(f, "< {inner}"),
            Constraint::DescendantOrSelfOf(inner) => write!(f, "<< {inner}"),
            Constraint::ChildOf(inner) => write!(f, "<! {inner}"),
            Constraint::ChildOrSelfOf(inner) => write!(f, "<<! {inner}"),
            Constraint::AncestorOf(inner) => write!(f, "> {inner}"),
            Constraint::AncestorOrSelfOf(inner) => write!(f, ">> {inner}"),
            Constraint::ParentOf(inner) => write!(f, ">! {inner}"),
            Constraint::ParentOrSelfOf(inner) => write!(f, ">>! {inner}"),
            Constraint::MemberOf(inner) => write!(f, "^ {inner}"),
            Constraint::And(a, b) => write!(f, "{a} AND {b}"),
            Constraint::Or(a, b) => write!(f, "{a} OR {b}"),
            Constraint::Minus(a, b) => write!(f, "{a} MINUS {b}"),
            Constraint::Nested(inner) => write!(f, "({inner})"),
            Constraint::Refined { focus, refinement } => write!(f, "{focus} : {refinement}"),
            Constraint::Dotted { source, attribute } => write!(f, "{source} . {attribute}"),
            Constraint::Filtered { source, filters } => {
                write!(f, "{source} {{{{ ")?;
                for (i, filter) in filters.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{filter}")?;
                }
                write!(f, " }}}}")
            }
            Constraint::TopOfSet(inner) => write!(f, "!!> {inner}"),
            Constraint::BottomOfSet(inner) => write!(f, "!!< {inner}"),
        }
    }
}

impl std::fmt::Display for Refinement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for clause in &self.ungrouped {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{clause}")?;
            first = false;
        }
        for group in &self.groups {
            if !first {
                write!(f, ", ")?;
            }
            if let Some(card) = &group.cardinality {
                write!(f, "{card} ")?;
            }
            write!(f, "{{ ")?;
            for (i, clause) in group.clauses.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{clause}")?;
            }
            write!(f, " }}")?;
            first = false;
        }
        Ok(())
    }
}

impl std::fmt::Display for AttributeClause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(card) = &self.cardinality {
            write!(f, "{card} ")?;
        }
        if self.reverse {
            write!(f, "R ")?;
        }
        let operator = match self.operator {
            ClauseOperator::Equal => "=",
            ClauseOperator::NotEqual => "!=",
        };
        write!(f, "{} {} {}", self.name, operator, self.value)
    }
}

impl std::fmt::Display for ClauseValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClauseValue::Expression(expr) => write!(f, "{expr}"),
            ClauseValue::Concrete { op, value } => write!(f, "{op} {value}"),
        }
    }
}

impl std::fmt::Display for ConcreteLiteral {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConcreteLiteral::Integer(v) => write!(f, "#{v}"),
            ConcreteLiteral::Decimal(v) => write!(f, "#{v}"),
            ConcreteLiteral::String(v) => write!(f, "\"{v}\""),
            ConcreteLiteral::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl std::fmt::Display for Comparison {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Comparison::Equal => "=",
            Comparison::NotEqual => "!=",
            Comparison::LessThan => "<",
            Comparison::LessThanOrEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::GreaterThanOrEqual => ">=",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for Cardinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) => write!(f, "[{}..{}]", self.min, max),
            None => write!(f, "[{}..*]", self.min),
        }
    }
}

impl std::fmt::Display for MemberValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MemberValue::String(s) => write!(f, "\"{s}\""),
            MemberValue::Number(n) => write!(f, "{n}"),
            MemberValue::Decimal(d) => write!(f, "#{d}"),
            MemberValue::Boolean(b) => write!(f, "{b}"),
            MemberValue::Time(t) => write!(f, "@{t}"),
        }
    }
}

impl std::fmt::Display for Filter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn list<T: std::fmt::Display>(f: &mut std::fmt::Formatter<'_>, items: &[T]) -> std::fmt::Result {
            if items.len() == 1 {
                write!(f, "{}", items[0])
            } else {
                write!(f, "(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, ")")
            }
        }
        match self {
            Filter::Term { match_type, values } => {
                write!(f, "term = ")?;
                match match_type {
                    TermMatch::Contains => {}
                    TermMatch::Wildcard => write!(f, "wild:")?,
                }
                let quoted: Vec<String> = values.iter().map(|v| format!("\"{v}\"")).collect();
                list(f, &quoted)
            }
            Filter::Language { codes } => {
                write!(f, "language = ")?;
                list(f, codes)
            }
            Filter::DescriptionType { type_ids } => {
                write!(f, "typeId = ")?;
                list(f, type_ids)
            }
            Filter::Dialect { refset_ids, acceptability } => {
                write!(f, "dialectId = ")?;
                list(f, refset_ids)?;
                match acceptability {
                    Some(Acceptability::Preferred) => write!(f, " prefer"),
                    Some(Acceptability::Acceptable) => write!(f, " accept"),
                    None => Ok(()),
                }
            }
            Filter::PreferredIn { refset_ids } => {
                write!(f, "preferredIn = ")?;
                list(f, refset_ids)
            }
            Filter::AcceptableIn { refset_ids } => {
                write!(f, "acceptableIn = ")?;
                list(f, refset_ids)
            }
            Filter::LanguageRefset { refset_ids } => {
                write!(f, "languageRefSetId = ")?;
                list(f, refset_ids)
            }
            Filter::Active(v) => write!(f, "active = {v}"),
            Filter::Module { module_ids } => {
                write!(f, "moduleId = ")?;
                list(f, module_ids)
            }
            Filter::DefinitionStatus { primitive } => {
                write!(
                    f,
                    "definitionStatus = {}",
                    if *primitive { "primitive" } else { "defined" }
                )
            }
            Filter::EffectiveTime { op, date } => write!(f, "effectiveTime {op} {date}"),
            Filter::SemanticTag { tags } => {
                write!(f, "semanticTag = ")?;
                let quoted: Vec<String> = tags.iter().map(|t| format!("\"{t}\"")).collect();
                list(f, &quoted)
            }
            Filter::Id { ids } => {
                write!(f, "id = ")?;
                list(f, ids)
            }
            Filter::Member { field, op, value } => write!(f, "M {field} {op} {value}"),
            Filter::History { profile } => {
                write!(f, "+HISTORY")?;
                match profile {
                    Some(HistoryProfile::Min) => write!(f, "-MIN"),
                    Some(HistoryProfile::Mod) => write!(f, "-MOD"),
                    Some(HistoryProfile::Max) => write!(f, "-MAX"),
                    None => Ok(()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_round_readable() {
        let expr = Constraint::DescendantOrSelfOf(Box::new(Constraint::concept(404684003)));
        assert_eq!(expr.to_string(), "<< 404684003");

        let expr = Constraint::Minus(
            Box::new(Constraint::MemberOf(Box::new(Constraint::concept(447562003)))),
            Box::new(Constraint::concept(24700007)),
        );
        assert_eq!(expr.to_string(), "^ 447562003 MINUS 24700007");
    }

    #[test]
    fn test_display_refined() {
        let expr = Constraint::Refined {
            focus: Box::new(Constraint::DescendantOf(Box::new(Constraint::concept(19829001)))),
            refinement: Refinement {
                ungrouped: vec![AttributeClause {
                    cardinality: Some(Cardinality { min: 1, max: None }),
                    reverse: false,
                    name: Box::new(Constraint::concept(116676008)),
                    operator: ClauseOperator::Equal,
                    value: ClauseValue::Expression(Box::new(Constraint::DescendantOrSelfOf(
                        Box::new(Constraint::concept(79654002)),
                    ))),
                }],
                groups: vec![],
            },
        };
        assert_eq!(expr.to_string(), "< 19829001 : [1..*] 116676008 = << 79654002");
    }

    #[test]
    fn test_unwrap_nested() {
        let expr = Constraint::Nested(Box::new(Constraint::Nested(Box::new(
            Constraint::concept(5),
        ))));
        assert_eq!(expr.as_concept_id(), Some(5));
    }
}
