//! Compositional grammar parser.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_while, take_while1},
    character::complete::{char, digit1, multispace0},
    combinator::{all_consuming, map, opt, value},
    multi::separated_list1,
    sequence::{delimited, pair, preceded},
    IResult,
};

use hermes_types::SctId;

use super::{ConceptRef, DefinitionStatus, ScgAttribute, ScgExpression, ScgValue};
use crate::error::{EclError, EclResult};

/// Parses a compositional grammar expression.
///
/// # Examples
///
/// ```rust
/// use hermes_ecl::scg::parse_scg;
///
/// let expr = parse_scg("29857009 |Chest pain| : 246112005 = 24484000").unwrap();
/// assert_eq!(expr.focus[0].id, 29857009);
/// ```
pub fn parse_scg(input: &str) -> EclResult<ScgExpression> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(EclError::Empty);
    }
    match all_consuming(delimited(ws, expression, ws))(trimmed) {
        Ok((_, expr)) => Ok(expr),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            let offset = trimmed.len() - e.input.len();
            Err(EclError::parse_at(trimmed, offset, "compositional grammar expression"))
        }
        Err(nom::Err::Incomplete(_)) => {
            Err(EclError::parse_at(trimmed, trimmed.len(), "complete expression"))
        }
    }
}

fn ws(input: &str) -> IResult<&str, &str> {
    multispace0(input)
}

fn expression(input: &str) -> IResult<&str, ScgExpression> {
    let (input, status) = opt(alt((
        value(DefinitionStatus::Equivalent, tag("===")),
        value(DefinitionStatus::SubtypeOf, tag("<<<")),
    )))(input)?;
    let (input, focus) = preceded(
        ws,
        separated_list1(delimited(ws, char('+'), ws), concept_ref),
    )(input)?;
    let (input, refinement) = opt(preceded(delimited(ws, char(':'), ws), refinement))(input)?;
    let (attributes, groups) = refinement.unwrap_or_default();
    Ok((
        input,
        ScgExpression {
            status,
            focus,
            attributes,
            groups,
        },
    ))
}

type ParsedRefinement = (Vec<ScgAttribute>, Vec<Vec<ScgAttribute>>);

fn refinement(input: &str) -> IResult<&str, ParsedRefinement> {
    let mut attributes = Vec::new();
    let mut groups = Vec::new();
    let (mut input, first) = refinement_item(input)?;
    push(&mut attributes, &mut groups, first);
    loop {
        // Items separate with commas; adjacent groups may omit them.
        let next = alt((
            preceded(delimited(ws, char(','), ws), refinement_item),
            preceded(ws, map(attribute_group, Item::Group)),
        ))(input);
        match next {
            Ok((rest, item)) => {
                push(&mut attributes, &mut groups, item);
                input = rest;
            }
            Err(_) => return Ok((input, (attributes, groups))),
        }
    }
}

enum Item {
    Attribute(ScgAttribute),
    Group(Vec<ScgAttribute>),
}

fn push(attributes: &mut Vec<ScgAttribute>, groups: &mut Vec<Vec<ScgAttribute>>, item: Item) {
    match item {
        Item::Attribute(a) => attributes.push(a),
        Item::Group(g) => groups.push(g),
    }
}

fn refinement_item(input: &str) -> IResult<&str, Item> {
    alt((
        map(attribute_group, Item::Group),
        map(attribute, Item::Attribute),
    ))(input)
}

fn attribute_group(input: &str) -> IResult<&str, Vec<ScgAttribute>> {
    delimited(
        pair(char('{'), ws),
        separated_list1(delimited(ws, char(','), ws), attribute),
        pair(ws, char('}')),
    )(input)
}

fn attribute(input: &str) -> IResult<&str, ScgAttribute> {
    let (input, name) = concept_ref(input)?;
    let (input, _) = delimited(ws, char('='), ws)(input)?;
    let (input, value) = attribute_value(input)?;
    Ok((input, ScgAttribute { name, value }))
}

fn attribute_value(input: &str) -> IResult<&str, ScgValue> {
    alt((
        map(
            delimited(pair(char('('), ws), expression, pair(ws, char(')'))),
            |nested| ScgValue::Nested(Box::new(nested)),
        ),
        map(preceded(char('#'), numeric_literal), |text: &str| {
            if text.contains('.') {
                ScgValue::Decimal(text.to_string())
            } else {
                ScgValue::Integer(text.parse().unwrap_or(0))
            }
        }),
        map(quoted_string, ScgValue::String),
        map(concept_ref, ScgValue::Concept),
    ))(input)
}

fn numeric_literal(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_digit() || c == '.' || c == '-')(input)
}

fn quoted_string(input: &str) -> IResult<&str, String> {
    map(
        delimited(char('"'), take_while(|c| c != '"'), char('"')),
        |s: &str| s.to_string(),
    )(input)
}

fn concept_ref(input: &str) -> IResult<&str, ConceptRef> {
    let (input, id) = sct_id(input)?;
    let (input, term) = opt(preceded(ws, term_in_pipes))(input)?;
    Ok((input, ConceptRef { id, term }))
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_precoordinated() {
        let expr = parse_scg("73211009 |Diabetes mellitus|").unwrap();
        assert!(expr.is_precoordinated());
        assert_eq!(expr.focus[0].id, 73211009);
        assert_eq!(expr.focus[0].term.as_deref(), Some("Diabetes mellitus"));
    }

    #[test]
    fn test_parse_refined() {
        let expr = parse_scg("29857009 : 246112005 = 24484000").unwrap();
        assert_eq!(expr.attributes.len(), 1);
        assert_eq!(expr.attributes[0].name.id, 246112005);
        assert_eq!(
            expr.attributes[0].value,
            ScgValue::Concept(ConceptRef::new(24484000))
        );
    }

    #[test]
    fn test_parse_multiple_focus() {
        let expr = parse_scg("421720008 + 7946007").unwrap();
        assert_eq!(expr.focus.len(), 2);
    }

    #[test]
    fn test_parse_groups() {
        let expr = parse_scg(
            "71388002 : { 260686004 = 129304002, 405813007 = 15497006 } { 260686004 = 129304002 }",
        )
        .unwrap();
        assert_eq!(expr.groups.len(), 2);
        assert_eq!(expr.groups[0].len(), 2);
    }

    #[test]
    fn test_parse_nested_and_concrete() {
        let expr = parse_scg(
            "373873005 : 411116001 = (385049006 : 765066002 = 732936001), 1142135004 = #500",
        )
        .unwrap();
        assert_eq!(expr.attributes.len(), 2);
        assert!(matches!(expr.attributes[0].value, ScgValue::Nested(_)));
        assert_eq!(expr.attributes[1].value, ScgValue::Integer(500));
    }

    #[test]
    fn test_parse_definition_status() {
        let expr = parse_scg("=== 73211009").unwrap();
        assert_eq!(expr.status, Some(DefinitionStatus::Equivalent));
        let expr = parse_scg("<<< 73211009").unwrap();
        assert_eq!(expr.status, Some(DefinitionStatus::SubtypeOf));
    }

    #[test]
    fn test_round_trip_law() {
        for source in [
            "73211009",
            "73211009 |Diabetes mellitus|",
            "=== 29857009 : 246112005 = 24484000",
            "71388002:{260686004=129304002,405813007=15497006}",
            "373873005 : 1142135004 = #500, 732945000 = 258684004",
            "373873005:411116001=(385049006:765066002=732936001)",
            "322236009 |Paracetamol 500mg tablet| : 732943007 = \"paracetamol\"",
        ] {
            let parsed = parse_scg(source).unwrap();
            let rendered = parsed.render();
            let reparsed = parse_scg(&rendered).unwrap();
            assert_eq!(parsed, reparsed, "round trip failed for {source:?}");
        }
    }

    #[test]
    fn test_parse_rejections() {
        for bad in ["", ":", "73211009 :", "73211009 : 246112005 =", "abc"] {
            assert!(parse_scg(bad).is_err(), "{bad:?} should fail");
        }
    }
}
