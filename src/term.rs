// used to recognize the textual forms of terms
use lazy_static::lazy_static;
use regex::Regex;

// used to print out readable forms of a term
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

// custom made ordering for ORDER BY
use std::cmp::Ordering;

use serde::{Serialize, Serializer};

use crate::error::{MirellaError, Result};

pub mod vocabulary {
    pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";
    pub const XSD: &str = "http://www.w3.org/2001/XMLSchema#";
    pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
    pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
    pub const XSD_DECIMAL: &str = "http://www.w3.org/2001/XMLSchema#decimal";
    pub const XSD_DOUBLE: &str = "http://www.w3.org/2001/XMLSchema#double";
    pub const XSD_FLOAT: &str = "http://www.w3.org/2001/XMLSchema#float";
    /// Context given to quads whose template or source names none.
    pub const DEFAULT_CONTEXT: &str = "https://mirella.dev/default/";

    pub(crate) const NUMERIC_TYPES: [&str; 13] = [
        "integer", "decimal", "double", "float", "int", "long", "short", "byte",
        "nonNegativeInteger", "nonPositiveInteger", "negativeInteger", "positiveInteger",
        "unsignedInt",
    ];
}

lazy_static! {
    static ref VARIABLE: Regex = Regex::new(r"^\?([A-Za-z0-9_]+)$").unwrap();
    static ref IRI: Regex = Regex::new(r#"^<([^<>"\s]*)>$"#).unwrap();
    static ref BLANK: Regex = Regex::new(r"^_:(\S+)$").unwrap();
    static ref LITERAL: Regex = Regex::new(
        r#"(?s)^"((?:[^"\\]|\\.)*)"(?:@([A-Za-z]+(?:-[A-Za-z0-9]+)*)|\^\^<([^<>"\s]*)>)?$"#
    ).unwrap();
}

// ------------- Variable -------------
/// A query variable. Cloning only bumps a reference count, so variables are
/// used directly as column keys of binding tables.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct Variable {
    name: Arc<str>,
    synthetic: bool,
}

impl Variable {
    /// Accepts the name with or without its leading `?`.
    pub fn new(name: &str) -> Self {
        Self { name: Arc::from(name.strip_prefix('?').unwrap_or(name)), synthetic: false }
    }
    /// Engine-generated columns. They never equal a variable made by `new`,
    /// whatever its name.
    pub fn synthetic(namespace: &str, ordinal: usize) -> Self {
        Self { name: Arc::from(format!("{namespace}#{ordinal}")), synthetic: true }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn is_synthetic(&self) -> bool {
        self.synthetic
    }
}
impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "?{}", self.name)
    }
}
impl Serialize for Variable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

// ------------- Term -------------
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Term {
    Variable(Variable),
    Resource { iri: String, blank: bool },
    PlainLiteral { value: String, lang: Option<String> },
    TypedLiteral { value: String, datatype: String },
}

impl Term {
    pub fn var(name: &str) -> Self {
        Self::Variable(Variable::new(name))
    }
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Resource { iri: iri.into(), blank: false }
    }
    pub fn blank(label: impl Into<String>) -> Self {
        Self::Resource { iri: label.into(), blank: true }
    }
    pub fn literal(value: impl Into<String>) -> Self {
        Self::PlainLiteral { value: value.into(), lang: None }
    }
    pub fn lang_literal(value: impl Into<String>, lang: impl Into<String>) -> Self {
        Self::PlainLiteral { value: value.into(), lang: Some(lang.into()) }
    }
    pub fn typed(value: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::TypedLiteral { value: value.into(), datatype: datatype.into() }
    }
    pub fn integer(value: i64) -> Self {
        Self::typed(value.to_string(), vocabulary::XSD_INTEGER)
    }
    pub fn rdf_type() -> Self {
        Self::iri(vocabulary::RDF_TYPE)
    }
    pub fn default_context() -> Self {
        Self::iri(vocabulary::DEFAULT_CONTEXT)
    }

    pub fn is_variable(&self) -> bool {
        matches!(self, Self::Variable(_))
    }
    pub fn is_literal(&self) -> bool {
        matches!(self, Self::PlainLiteral { .. } | Self::TypedLiteral { .. })
    }
    pub fn is_resource(&self) -> bool {
        matches!(self, Self::Resource { .. })
    }
    pub fn is_blank(&self) -> bool {
        matches!(self, Self::Resource { blank: true, .. })
    }
    pub fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            _ => None,
        }
    }
    /// The lexical value of a literal, or the IRI/label of a resource.
    pub fn lexical(&self) -> &str {
        match self {
            Self::Variable(v) => v.name(),
            Self::Resource { iri, .. } => iri,
            Self::PlainLiteral { value, .. } | Self::TypedLiteral { value, .. } => value,
        }
    }
    pub fn numeric_value(&self) -> Option<f64> {
        match self {
            Self::TypedLiteral { value, datatype } => {
                let local = datatype.strip_prefix(vocabulary::XSD)?;
                if vocabulary::NUMERIC_TYPES.contains(&local) {
                    value.trim().parse::<f64>().ok()
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Resource { blank: true, .. } => 1,
            Self::Resource { blank: false, .. } => 2,
            Self::PlainLiteral { .. } | Self::TypedLiteral { .. } => 3,
            Self::Variable(_) => 4,
        }
    }
}

/// Solution ordering used by ORDER BY: unbound first, then blank nodes,
/// IRIs and literals. Numeric literals come before the other literals and
/// compare by value among themselves. Ties fall back to the written form,
/// which keeps the order total.
pub fn order_cmp(left: Option<&Term>, right: Option<&Term>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(l), Some(r)) => l
            .rank()
            .cmp(&r.rank())
            .then_with(|| match (l.numeric_value(), r.numeric_value()) {
                (Some(ln), Some(rn)) => ln.total_cmp(&rn),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => l.lexical().cmp(r.lexical()),
            })
            .then_with(|| l.to_string().cmp(&r.to_string())),
    }
}

fn escape(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            _ => escaped.push(c),
        }
    }
    escaped
}

fn unescape(value: &str) -> String {
    let mut unescaped = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => unescaped.push('\n'),
                Some('r') => unescaped.push('\r'),
                Some(other) => unescaped.push(other),
                None => unescaped.push('\\'),
            }
        } else {
            unescaped.push(c);
        }
    }
    unescaped
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Variable(v) => write!(f, "{v}"),
            Self::Resource { iri, blank: true } => write!(f, "_:{iri}"),
            Self::Resource { iri, blank: false } => write!(f, "<{iri}>"),
            Self::PlainLiteral { value, lang: None } => write!(f, "\"{}\"", escape(value)),
            Self::PlainLiteral { value, lang: Some(lang) } => {
                write!(f, "\"{}\"@{}", escape(value), lang)
            }
            Self::TypedLiteral { value, datatype } => {
                write!(f, "\"{}\"^^<{}>", escape(value), datatype)
            }
        }
    }
}

impl FromStr for Term {
    type Err = MirellaError;
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(captures) = VARIABLE.captures(s) {
            return Ok(Self::var(&captures[1]));
        }
        if let Some(captures) = IRI.captures(s) {
            return Ok(Self::iri(&captures[1]));
        }
        if let Some(captures) = BLANK.captures(s) {
            return Ok(Self::blank(&captures[1]));
        }
        if let Some(captures) = LITERAL.captures(s) {
            let value = unescape(&captures[1]);
            return Ok(match (captures.get(2), captures.get(3)) {
                (Some(lang), _) => Self::lang_literal(value, lang.as_str()),
                (None, Some(datatype)) => Self::typed(value, datatype.as_str()),
                (None, None) => Self::literal(value),
            });
        }
        Err(MirellaError::TermSyntax(s.to_string()))
    }
}

impl Serialize for Term {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
