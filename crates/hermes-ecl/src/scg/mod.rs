//! SNOMED CT compositional grammar (SCG).
//!
//! Postcoordinated expressions build specific clinical meanings, in
//! contrast to ECL which selects sets:
//!
//! ```text
//! 29857009 |Chest pain| : 246112005 |Severity| = 24484000 |Severe|
//! ```
//!
//! The module parses and renders SCG expressions with the round-trip
//! guarantee `parse ∘ render ∘ parse = parse` under whitespace and term
//! normalisation, and can refresh the embedded terms from a preferred
//! synonym lookup.

mod parser;

pub use parser::parse_scg;

use hermes_types::SctId;

/// Definition status marker of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DefinitionStatus {
    /// `===` — equivalent to the definition.
    Equivalent,
    /// `<<<` — subtype of the definition.
    SubtypeOf,
}

/// A concept reference, optionally carrying its pipe-delimited term.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConceptRef {
    /// The concept.
    pub id: SctId,
    /// The term as written, or refreshed.
    pub term: Option<String>,
}

impl ConceptRef {
    /// A bare reference.
    pub fn new(id: SctId) -> Self {
        Self { id, term: None }
    }

    /// A reference with a term.
    pub fn with_term(id: SctId, term: impl Into<String>) -> Self {
        Self {
            id,
            term: Some(term.into()),
        }
    }
}

/// A parsed compositional grammar expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScgExpression {
    /// Explicit definition status, when written.
    pub status: Option<DefinitionStatus>,
    /// Focus concepts, `+`-joined.
    pub focus: Vec<ConceptRef>,
    /// Ungrouped attributes.
    pub attributes: Vec<ScgAttribute>,
    /// Attribute groups.
    pub groups: Vec<Vec<ScgAttribute>>,
}

/// One `name = value` attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScgAttribute {
    /// The attribute type.
    pub name: ConceptRef,
    /// The value.
    pub value: ScgValue,
}

/// An attribute value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScgValue {
    /// A concept reference.
    Concept(ConceptRef),
    /// A parenthesised nested expression.
    Nested(Box<ScgExpression>),
    /// `#250`
    Integer(i64),
    /// `#3.14`, kept verbatim.
    Decimal(String),
    /// `"string"`
    String(String),
}

impl ScgExpression {
    /// True when the expression is a bare focus concept.
    pub fn is_precoordinated(&self) -> bool {
        self.focus.len() == 1 && self.attributes.is_empty() && self.groups.is_empty()
    }

    /// Every concept referenced anywhere in the expression.
    pub fn concept_ids(&self) -> Vec<SctId> {
        let mut out = Vec::new();
        self.collect_ids(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_ids(&self, out: &mut Vec<SctId>) {
        for focus in &self.focus {
            out.push(focus.id);
        }
        for attribute in self.attributes.iter().chain(self.groups.iter().flatten()) {
            out.push(attribute.name.id);
            match &attribute.value {
                ScgValue::Concept(c) => out.push(c.id),
                ScgValue::Nested(nested) => nested.collect_ids(out),
                _ => {}
            }
        }
    }

    /// Replaces every embedded term using a preferred-synonym lookup;
    /// references whose lookup yields nothing keep their current term.
    pub fn refresh_terms(&mut self, lookup: &impl Fn(SctId) -> Option<String>) {
        fn refresh_ref(r: &mut ConceptRef, lookup: &impl Fn(SctId) -> Option<String>) {
            if let Some(term) = lookup(r.id) {
                r.term = Some(term);
            }
        }
        for focus in &mut self.focus {
            refresh_ref(focus, lookup);
        }
        for attribute in self
            .attributes
            .iter_mut()
            .chain(self.groups.iter_mut().flatten())
        {
            refresh_ref(&mut attribute.name, lookup);
            match &mut attribute.value {
                ScgValue::Concept(c) => refresh_ref(c, lookup),
                ScgValue::Nested(nested) => nested.refresh_terms(lookup),
                _ => {}
            }
        }
    }

    /// Renders the expression in canonical whitespace.
    pub fn render(&self) -> String {
        self.to_string()
    }
}

// =============================================================================
// Rendering
// =============================================================================

impl std::fmt::Display for ConceptRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.term {
            Some(term) => write!(f, "{} |{}|", self.id, term),
            None => write!(f, "{}", self.id),
        }
    }
}

impl std::fmt::Display for ScgValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScgValue::Concept(c) => write!(f, "{c}"),
            ScgValue::Nested(nested) => write!(f, "({nested})"),
            ScgValue::Integer(v) => write!(f, "#{v}"),
            ScgValue::Decimal(v) => write!(f, "#{v}"),
            ScgValue::String(v) => write!(f, "\"{v}\""),
        }
    }
}

impl std::fmt::Display for ScgAttribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} = {}", self.name, self.value)
    }
}

impl std::fmt::Display for ScgExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status {
            Some(DefinitionStatus::Equivalent) => write!(f, "=== ")?,
            Some(DefinitionStatus::SubtypeOf) => write!(f, "<<< ")?,
            None => {}
        }
        for (i, focus) in self.focus.iter().enumerate() {
            if i > 0 {
                write!(f, " + ")?;
            }
            write!(f, "{focus}")?;
        }
        if self.attributes.is_empty() && self.groups.is_empty() {
            return Ok(());
        }
        write!(f, " : ")?;
        let mut first = true;
        for attribute in &self.attributes {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{attribute}")?;
            first = false;
        }
        for group in &self.groups {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{{ ")?;
            for (i, attribute) in group.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{attribute}")?;
            }
            write!(f, " }}")?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_simple() {
        let expr = ScgExpression {
            status: None,
            focus: vec![ConceptRef::with_term(29857009, "Chest pain")],
            attributes: vec![ScgAttribute {
                name: ConceptRef::with_term(246112005, "Severity"),
                value: ScgValue::Concept(ConceptRef::with_term(24484000, "Severe")),
            }],
            groups: vec![],
        };
        assert_eq!(
            expr.render(),
            "29857009 |Chest pain| : 246112005 |Severity| = 24484000 |Severe|"
        );
    }

    #[test]
    fn test_refresh_terms() {
        let mut expr = ScgExpression {
            status: None,
            focus: vec![ConceptRef::new(80146002)],
            attributes: vec![],
            groups: vec![],
        };
        expr.refresh_terms(&|id| (id == 80146002).then(|| "Appendicectomy".to_string()));
        assert_eq!(expr.render(), "80146002 |Appendicectomy|");
        // Unknown ids keep whatever they had.
        expr.refresh_terms(&|_| None);
        assert_eq!(expr.render(), "80146002 |Appendicectomy|");
    }

    #[test]
    fn test_concept_ids_collects_nested() {
        let expr = ScgExpression {
            status: None,
            focus: vec![ConceptRef::new(71388002)],
            attributes: vec![ScgAttribute {
                name: ConceptRef::new(405815000),
                value: ScgValue::Nested(Box::new(ScgExpression {
                    status: None,
                    focus: vec![ConceptRef::new(122456005)],
                    attributes: vec![],
                    groups: vec![],
                })),
            }],
            groups: vec![],
        };
        assert_eq!(expr.concept_ids(), vec![71388002, 122456005, 405815000]);
    }
}
