//! ECL v2.0 parser.
//!
//! A nom-combinator grammar producing the [`Constraint`] AST. Rejections
//! surface as [`EclError::Parse`] with one-based line and column positions.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};

use hermes_store::HistoryProfile;
use hermes_types::{well_known, SctId};

use crate::ast::{
    Acceptability, AttributeClause, AttributeGroup, Cardinality, ClauseOperator, ClauseValue,
    Comparison, ConcreteLiteral, Constraint, Filter, MemberValue, Refinement, TermMatch,
};
use crate::error::{EclError, EclResult};

/// Parses an ECL expression constraint.
///
/// # Examples
///
/// ```rust
/// use hermes_ecl::parse;
///
/// let expr = parse("<< 404684003 |Clinical finding|").unwrap();
/// let expr = parse("< 19829001 AND ^ 700043003").unwrap();
/// let expr = parse("< 64572001 {{ term = \"heart\" }}").unwrap();
/// ```
pub fn parse(input: &str) -> EclResult<Constraint> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EclError::Empty);
    }
    match all_consuming(expression_constraint)(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = trimmed.len() - e.input.len();
            Err(EclError::parse_at(trimmed, offset, "expression constraint"))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(EclError::parse_at(trimmed, trimmed.len(), "complete expression"))
        }
    }
}

// =============================================================================
// Whitespace
// =============================================================================

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn mws(input: &str) -> IResult<&str, &str> {
    multispace1(input)
}

// =============================================================================
// Top level: compound expressions
// =============================================================================

fn expression_constraint(input: &str) -> IResult<&str, Constraint> {
    delimited(ws, compound_expression, ws)(input)
}

fn compound_expression(input: &str) -> IResult<&str, Constraint> {
    let (input, first) = refined_expression(input)?;
    compound_tail(input, first)
}

#[derive(Clone, Copy)]
enum CompoundOp {
    And,
    Or,
    Minus,
}

fn compound_tail(input: &str, left: Constraint) -> IResult<&str, Constraint> {
    let op = alt((
        value(CompoundOp::And, preceded(mws, terminated(tag_no_case("AND"), mws))),
        value(CompoundOp::Or, preceded(mws, terminated(tag_no_case("OR"), mws))),
        value(CompoundOp::Minus, preceded(mws, terminated(tag_no_case("MINUS"), mws))),
        value(CompoundOp::And, preceded(ws, terminated(tag(","), ws))),
    ))(input);
    match op {
        Ok((rest, op)) => {
            let (rest, right) = refined_expression(rest)?;
            let combined = match op {
                CompoundOp::And => Constraint::And(Box::new(left), Box::new(right)),
                CompoundOp::Or => Constraint::Or(Box::new(left), Box::new(right)),
                CompoundOp::Minus => Constraint::Minus(Box::new(left), Box::new(right)),
            };
            // Left associative.
            compound_tail(rest, combined)
        }
        Err(_) => Ok((input, left)),
    }
}

fn refined_expression(input: &str) -> IResult<&str, Constraint> {
    let (input, focus) = sub_expression(input)?;
    let (input, refinement) = opt(preceded(
        delimited(ws, char(':'), ws),
        refinement_clause,
    ))(input)?;
    Ok((
        input,
        match refinement {
            Some(refinement) => Constraint::Refined {
                focus: Box::new(focus),
                refinement,
            },
            None => focus,
        },
    ))
}

// =============================================================================
// Sub-expressions
// =============================================================================

/// A sub-expression without dotted or filter tails; used where those tails
/// must not recurse (inside constraint operators and attribute names).
fn base_expression(input: &str) -> IResult<&str, Constraint> {
    alt((
        top_or_bottom,
        map(
            delimited(pair(char('('), ws), compound_expression, pair(ws, char(')'))),
            |inner| Constraint::Nested(Box::new(inner)),
        ),
        constrained_expression,
        member_of_expression,
        focus_concept,
    ))(input)
}

fn sub_expression(input: &str) -> IResult<&str, Constraint> {
    let (input, expr) = base_expression(input)?;
    let (input, expr) = dotted_tail(input, expr)?;
    filtered_tail(input, expr)
}

fn top_or_bottom(input: &str) -> IResult<&str, Constraint> {
    alt((
        map(preceded(pair(tag("!!>"), ws), base_expression), |inner| {
            Constraint::TopOfSet(Box::new(inner))
        }),
        map(preceded(pair(tag("!!<"), ws), base_expression), |inner| {
            Constraint::BottomOfSet(Box::new(inner))
        }),
    ))(input)
}

fn constrained_expression(input: &str) -> IResult<&str, Constraint> {
    // Longest operators first.
    let (input, op) = alt((
        tag("<<!"),
        tag("<<"),
        tag("<!"),
        tag("<"),
        tag(">>!"),
        tag(">>"),
        tag(">!"),
        tag(">"),
    ))(input)?;
    let (input, inner) = preceded(ws, base_expression)(input)?;
    let inner = Box::new(inner);
    let expr = match op {
        "<<!" => Constraint::ChildOrSelfOf(inner),
        "<<" => Constraint::DescendantOrSelfOf(inner),
        "<!" => Constraint::ChildOf(inner),
        "<" => Constraint::DescendantOf(inner),
        ">>!" => Constraint::ParentOrSelfOf(inner),
        ">>" => Constraint::AncestorOrSelfOf(inner),
        ">!" => Constraint::ParentOf(inner),
        _ => Constraint::AncestorOf(inner),
    };
    Ok((input, expr))
}

fn member_of_expression(input: &str) -> IResult<&str, Constraint> {
    let (input, _) = char('^')(input)?;
    let (input, inner) = preceded(ws, base_expression)(input)?;
    Ok((input, Constraint::MemberOf(Box::new(inner))))
}

fn focus_concept(input: &str) -> IResult<&str, Constraint> {
    alt((wildcard, concept_reference))(input)
}

fn wildcard(input: &str) -> IResult<&str, Constraint> {
    value(Constraint::Wildcard, char('*'))(input)
}

fn concept_reference(input: &str) -> IResult<&str, Constraint> {
    let (input, id) = sct_id(input)?;
    let (input, term) = opt(preceded(ws, term_in_pipes))(input)?;
    Ok((input, Constraint::Concept { id, term }))
}

fn sct_id(input: &str) -> IResult<&str, SctId> {
    let (rest, digits) = digit1(input)?;
    match digits.parse::<SctId>() {
        Ok(id) => Ok((rest, id)),
        Err(_) => Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Digit,
        ))),
    }
}

fn term_in_pipes(input: &str) -> IResult<&str, String> {
    let (input, _) = char('|')(input)?;
    let (input, term) = take_while(|c| c != '|')(input)?;
    let (input, _) = char('|')(input)?;
    Ok((input, term.trim().to_string()))
}

// =============================================================================
// Dotted attribute tails
// =============================================================================

fn dotted_tail(input: &str, source: Constraint) -> IResult<&str, Constraint> {
    let mut current = source;
    let mut rest = input;
    loop {
        // A lone '.' must not consume a decimal point inside a concrete
        // value; dotted tails always sit between whitespace-separated
        // expressions.
        let step = preceded(delimited(ws, char('.'), ws), base_expression)(rest);
        match step {
            Ok((next, attribute)) => {
                current = Constraint::Dotted {
                    source: Box::new(current),
                    attribute: Box::new(attribute),
                };
                rest = next;
            }
            Err(_) => return Ok((rest, current)),
        }
    }
}

// =============================================================================
// Refinements
// =============================================================================

fn refinement_clause(input: &str) -> IResult<&str, Refinement> {
    let mut refinement = Refinement::default();
    let (mut input, first) = refinement_item(input)?;
    push_item(&mut refinement, first);
    loop {
        match preceded(delimited(ws, char(','), ws), refinement_item)(input) {
            Ok((rest, item)) => {
                push_item(&mut refinement, item);
                input = rest;
            }
            Err(_) => return Ok((input, refinement)),
        }
    }
}

enum RefinementItem {
    Clause(AttributeClause),
    Group(AttributeGroup),
}

fn push_item(refinement: &mut Refinement, item: RefinementItem) {
    match item {
        RefinementItem::Clause(clause) => refinement.ungrouped.push(clause),
        RefinementItem::Group(group) => refinement.groups.push(group),
    }
}

fn refinement_item(input: &str) -> IResult<&str, RefinementItem> {
    alt((
        map(attribute_group, RefinementItem::Group),
        map(attribute_clause, RefinementItem::Clause),
    ))(input)
}

fn attribute_group(input: &str) -> IResult<&str, AttributeGroup> {
    let (input, cardinality) = opt(terminated(cardinality, ws))(input)?;
    let (input, _) = char('{')(input)?;
    let (input, clauses) = delimited(
        ws,
        separated_list1(delimited(ws, char(','), ws), attribute_clause),
        ws,
    )(input)?;
    let (input, _) = char('}')(input)?;
    Ok((input, AttributeGroup { cardinality, clauses }))
}

fn attribute_clause(input: &str) -> IResult<&str, AttributeClause> {
    let (input, cardinality) = opt(terminated(cardinality, ws))(input)?;
    let (input, reverse) = opt(terminated(tag_no_case("R"), mws))(input)?;
    let (input, name) = attribute_name(input)?;
    let (input, _) = ws(input)?;
    // A concrete comparison carries its own operator (`>= #2.5`); an
    // expression value is introduced by `=` or `!=`.
    let (input, (operator, value)) = alt((
        map(
            pair(terminated(comparison, ws), concrete_literal),
            |(op, literal)| {
                (
                    ClauseOperator::Equal,
                    ClauseValue::Concrete { op, value: literal },
                )
            },
        ),
        map(
            pair(
                terminated(
                    alt((
                        value(ClauseOperator::NotEqual, tag("!=")),
                        value(ClauseOperator::Equal, char('=')),
                    )),
                    ws,
                ),
                base_expression,
            ),
            |(op, expr)| (op, ClauseValue::Expression(Box::new(expr))),
        ),
    ))(input)?;
    Ok((
        input,
        AttributeClause {
            cardinality,
            reverse: reverse.is_some(),
            name: Box::new(name),
            operator,
            value,
        },
    ))
}

fn attribute_name(input: &str) -> IResult<&str, Constraint> {
    // An attribute name is itself a constraint realising to attribute
    // types: a concept, a wildcard, or a hierarchy-operator expression.
    base_expression(input)
}

fn concrete_literal(input: &str) -> IResult<&str, ConcreteLiteral> {
    alt((
        map(preceded(char('#'), decimal_digits), |text: &str| {
            if text.contains('.') {
                ConcreteLiteral::Decimal(text.to_string())
            } else {
                ConcreteLiteral::Integer(text.parse().unwrap_or(0))
            }
        }),
        map(quoted_string, ConcreteLiteral::String),
        value(ConcreteLiteral::Boolean(true), tag_no_case("true")),
        value(ConcreteLiteral::Boolean(false), tag_no_case("false")),
    ))(input)
}

fn decimal_digits(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '.' || c == '-')(input)
}

fn cardinality(input: &str) -> IResult<&str, Cardinality> {
    let (input, _) = char('[')(input)?;
    let (input, min) = delimited(ws, digit1, ws)(input)?;
    let (input, _) = tag("..")(input)?;
    let (input, max) = delimited(
        ws,
        alt((map(char('*'), |_| None), map(digit1, Some))),
        ws,
    )(input)?;
    let (input, _) = char(']')(input)?;
    Ok((
        input,
        Cardinality {
            min: min.parse().unwrap_or(0),
            max: max.map(|m: &str| m.parse().unwrap_or(0)),
        },
    ))
}

// =============================================================================
// Filters
// =============================================================================

fn filtered_tail(input: &str, source: Constraint) -> IResult<&str, Constraint> {
    let (input, filter_blocks) = nom::multi::many0(preceded(ws, filter_block))(input)?;
    if filter_blocks.is_empty() {
        return Ok((input, source));
    }
    let filters = filter_blocks.into_iter().flatten().collect();
    Ok((
        input,
        Constraint::Filtered {
            source: Box::new(source),
            filters,
        },
    ))
}

fn filter_block(input: &str) -> IResult<&str, Vec<Filter>> {
    delimited(
        pair(tag("{{"), ws),
        separated_list1(delimited(ws, char(','), ws), filter),
        pair(ws, tag("}}")),
    )(input)
}

fn filter(input: &str) -> IResult<&str, Filter> {
    alt((
        history_filter,
        member_filter,
        term_filter,
        language_filter,
        type_filter,
        dialect_filter,
        acceptability_filters,
        active_filter,
        module_filter,
        definition_status_filter,
        effective_time_filter,
        semantic_tag_filter,
        id_filter,
    ))(input)
}

fn history_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = char('+')(input)?;
    let (input, _) = tag_no_case("HISTORY")(input)?;
    let (input, profile) = opt(alt((
        value(HistoryProfile::Min, tag_no_case("-MIN")),
        value(HistoryProfile::Mod, tag_no_case("-MOD")),
        value(HistoryProfile::Max, tag_no_case("-MAX")),
    )))(input)?;
    Ok((input, Filter::History { profile }))
}

fn member_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = terminated(tag_no_case("M"), mws)(input)?;
    let (input, field) = take_while1(|c: char| c.is_alphanumeric())(input)?;
    let (input, op) = delimited(ws, comparison, ws)(input)?;
    let (input, value) = member_value(input)?;
    Ok((
        input,
        Filter::Member {
            field: field.to_string(),
            op,
            value,
        },
    ))
}

fn comparison(input: &str) -> IResult<&str, Comparison> {
    alt((
        value(Comparison::NotEqual, tag("!=")),
        value(Comparison::LessThanOrEqual, tag("<=")),
        value(Comparison::GreaterThanOrEqual, tag(">=")),
        value(Comparison::LessThan, char('<')),
        value(Comparison::GreaterThan, char('>')),
        value(Comparison::Equal, char('=')),
    ))(input)
}

fn member_value(input: &str) -> IResult<&str, MemberValue> {
    alt((
        map(quoted_string, MemberValue::String),
        map(preceded(char('@'), take_while1(|c: char| c.is_alphanumeric())), |t: &str| {
            MemberValue::Time(t.to_string())
        }),
        map(preceded(char('#'), decimal_digits), |t: &str| {
            MemberValue::Decimal(t.to_string())
        }),
        value(MemberValue::Boolean(true), tag_no_case("true")),
        value(MemberValue::Boolean(false), tag_no_case("false")),
        map(digit1, |d: &str| MemberValue::Number(d.parse().unwrap_or(0))),
    ))(input)
}

fn term_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("term")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, match_type) = opt(alt((
        value(TermMatch::Wildcard, pair(tag_no_case("wild"), char(':'))),
        value(TermMatch::Contains, pair(tag_no_case("match"), char(':'))),
    )))(input)?;
    let (input, values) = string_or_list(input)?;
    Ok((
        input,
        Filter::Term {
            match_type: match_type.unwrap_or(TermMatch::Contains),
            values,
        },
    ))
}

fn language_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("language")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, codes) = token_or_list(input)?;
    Ok((input, Filter::Language { codes }))
}

fn type_filter(input: &str) -> IResult<&str, Filter> {
    alt((
        |input| {
            let (input, _) = tag_no_case("typeId")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, type_ids) = id_or_list(input)?;
            Ok((input, Filter::DescriptionType { type_ids }))
        },
        |input| {
            let (input, _) = tag_no_case("type")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, tokens) = token_or_list(input)?;
            let type_ids = tokens
                .iter()
                .filter_map(|token| match token.to_ascii_lowercase().as_str() {
                    "syn" => Some(well_known::SYNONYM),
                    "fsn" => Some(well_known::FULLY_SPECIFIED_NAME),
                    "def" => Some(well_known::DEFINITION),
                    _ => None,
                })
                .collect::<Vec<_>>();
            if type_ids.len() != tokens.len() {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Alt,
                )));
            }
            Ok((input, Filter::DescriptionType { type_ids }))
        },
    ))(input)
}

fn dialect_filter(input: &str) -> IResult<&str, Filter> {
    let (input, refset_ids) = alt((
        |input| {
            let (input, _) = tag_no_case("dialectId")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            id_or_list(input)
        },
        |input| {
            let (input, _) = tag_no_case("dialect")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, tags) = token_or_list(input)?;
            let ids: Vec<SctId> = tags
                .iter()
                .flat_map(|tag| hermes_store::locale::dialect_refsets(tag))
                .copied()
                .collect();
            if ids.is_empty() {
                return Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Alt,
                )));
            }
            Ok((input, ids))
        },
    ))(input)?;
    let (input, acceptability) = opt(preceded(
        mws,
        alt((
            value(Acceptability::Preferred, tag_no_case("prefer")),
            value(Acceptability::Acceptable, tag_no_case("accept")),
        )),
    ))(input)?;
    Ok((
        input,
        Filter::Dialect {
            refset_ids,
            acceptability,
        },
    ))
}

fn acceptability_filters(input: &str) -> IResult<&str, Filter> {
    alt((
        |input| {
            let (input, _) = tag_no_case("preferredIn")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, refset_ids) = id_or_list(input)?;
            Ok((input, Filter::PreferredIn { refset_ids }))
        },
        |input| {
            let (input, _) = tag_no_case("acceptableIn")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, refset_ids) = id_or_list(input)?;
            Ok((input, Filter::AcceptableIn { refset_ids }))
        },
        |input| {
            let (input, _) = tag_no_case("languageRefSetId")(input)?;
            let (input, _) = delimited(ws, char('='), ws)(input)?;
            let (input, refset_ids) = id_or_list(input)?;
            Ok((input, Filter::LanguageRefset { refset_ids }))
        },
    ))(input)
}

fn active_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("active")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, active) = alt((
        value(true, tag_no_case("true")),
        value(false, tag_no_case("false")),
        value(true, char('1')),
        value(false, char('0')),
    ))(input)?;
    Ok((input, Filter::Active(active)))
}

fn module_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("moduleId")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, module_ids) = id_or_list(input)?;
    Ok((input, Filter::Module { module_ids }))
}

fn definition_status_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("definitionStatus")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, primitive) = alt((
        value(true, tag_no_case("primitive")),
        value(false, tag_no_case("defined")),
    ))(input)?;
    Ok((input, Filter::DefinitionStatus { primitive }))
}

fn effective_time_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("effectiveTime")(input)?;
    let (input, op) = delimited(ws, comparison, ws)(input)?;
    let (input, date) = digit1(input)?;
    Ok((
        input,
        Filter::EffectiveTime {
            op,
            date: date.parse().unwrap_or(0),
        },
    ))
}

fn semantic_tag_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("semanticTag")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, tags) = string_or_list(input)?;
    Ok((input, Filter::SemanticTag { tags }))
}

fn id_filter(input: &str) -> IResult<&str, Filter> {
    let (input, _) = tag_no_case("id")(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, ids) = id_or_list(input)?;
    Ok((input, Filter::Id { ids }))
}

// =============================================================================
// Filter value helpers
// =============================================================================

fn quoted_string(input: &str) -> IResult<&str, String> {
    let (input, _) = char('"')(input)?;
    let (input, content) = take_while(|c| c != '"')(input)?;
    let (input, _) = char('"')(input)?;
    Ok((input, content.to_string()))
}

fn string_or_list(input: &str) -> IResult<&str, Vec<String>> {
    alt((
        map(quoted_string, |s| vec![s]),
        delimited(
            pair(char('('), ws),
            separated_list1(mws, quoted_string),
            pair(ws, char(')')),
        ),
    ))(input)
}

fn bare_token(input: &str) -> IResult<&str, String> {
    map(
        take_while1(|c: char| c.is_alphanumeric() || c == '-'),
        |t: &str| t.to_string(),
    )(input)
}

fn token_or_list(input: &str) -> IResult<&str, Vec<String>> {
    alt((
        delimited(
            pair(char('('), ws),
            separated_list1(mws, bare_token),
            pair(ws, char(')')),
        ),
        map(bare_token, |t| vec![t]),
    ))(input)
}

fn id_or_list(input: &str) -> IResult<&str, Vec<SctId>> {
    alt((
        delimited(
            pair(char('('), ws),
            separated_list1(mws, sct_id),
            pair(ws, char(')')),
        ),
        map(sct_id, |id| vec![id]),
    ))(input)
}
