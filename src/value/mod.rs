//! Interpretation of literal values.
//!
//! A literal is matched against [`DETECTORS`] in order, the first detector accepting it decides
//! its type. A literal nothing accepts is kept as a string.

mod time;

pub use self::time::*;

use crate::filter::CompileError;
use ::time::OffsetDateTime;
use std::fmt::{Display, Formatter};
use std::ops::{Bound, RangeBounds};

#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    String(String),
    Number(f64),
    Boolean(bool),
    Date(OffsetDateTime),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Ordered<T> {
    Greater(T),
    GreaterEqual(T),
    Less(T),
    LessEqual(T),
    Range(Bound<T>, Bound<T>),
}

impl<T> Ordered<T>
where
    T: Clone,
{
    pub fn from_range<R>(range: R) -> Self
    where
        R: RangeBounds<T>,
    {
        Ordered::Range(range.start_bound().cloned(), range.end_bound().cloned())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Pattern {
    /// A regular expression, used as written.
    Regex(String),
    /// A literal with `*` placeholders.
    Wildcard(String),
}

impl Pattern {
    pub fn to_regex(&self) -> String {
        match self {
            Self::Regex(pattern) => pattern.clone(),
            Self::Wildcard(glob) => {
                let body = glob
                    .split('*')
                    .map(regex::escape)
                    .collect::<Vec<_>>()
                    .join(".*");

                let mut pattern = String::with_capacity(body.len() + 2);
                if !glob.starts_with('*') {
                    pattern.push('^');
                }
                pattern.push_str(&body);
                if !glob.ends_with('*') {
                    pattern.push('$');
                }
                pattern
            }
        }
    }

    pub fn case_insensitive(&self) -> bool {
        matches!(self, Self::Wildcard(_))
    }
}

/// The interpreted value of a literal.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolved {
    Ordered(Ordered<Scalar>),
    Pattern(Pattern),
    Scalar(Scalar),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Kind {
    Range,
    Comparison,
    Regex,
    Wildcard,
    Date,
    Number,
    Boolean,
    String,
}

impl Resolved {
    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(Scalar::String(value.into()))
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Ordered(Ordered::Range(..)) => Kind::Range,
            Self::Ordered(_) => Kind::Comparison,
            Self::Pattern(Pattern::Regex(_)) => Kind::Regex,
            Self::Pattern(Pattern::Wildcard(_)) => Kind::Wildcard,
            Self::Scalar(Scalar::Date(_)) => Kind::Date,
            Self::Scalar(Scalar::Number(_)) => Kind::Number,
            Self::Scalar(Scalar::Boolean(_)) => Kind::Boolean,
            Self::Scalar(Scalar::String(_)) => Kind::String,
        }
    }
}

pub type Detector = fn(&str) -> Result<Option<Resolved>, CompileError>;

/// The detector chain, in the order the detectors are tried.
pub const DETECTORS: &[(Kind, Detector)] = &[
    (Kind::Range, detect_range),
    (Kind::Comparison, detect_comparison),
    (Kind::Regex, detect_regex),
    (Kind::Wildcard, detect_wildcard),
    (Kind::Date, detect_date),
    (Kind::Number, detect_number),
    (Kind::Boolean, detect_boolean),
];

/// Resolve a literal to its typed value.
///
/// Only a range with two wildcard bounds fails, every other literal resolves to some value.
pub fn resolve(literal: &str) -> Result<Resolved, CompileError> {
    for (kind, detect) in DETECTORS {
        if let Some(resolved) = detect(literal)? {
            log::trace!("resolved {literal:?} as {kind:?}");
            return Ok(resolved);
        }
    }

    log::trace!("resolved {literal:?} as {:?}", Kind::String);
    Ok(Resolved::string(literal))
}

/// A signed decimal number, rejecting `inf`, `NaN` and friends.
pub fn parse_number(s: &str) -> Option<f64> {
    let valid = s.chars().any(|c| c.is_ascii_digit())
        && s
            .chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '.' | 'e' | 'E'));
    if !valid {
        return None;
    }
    s.parse::<f64>().ok().filter(|n| n.is_finite())
}

/// A bound "looks like a date" if it contains date punctuation and is not a plain number.
fn is_date_bound(s: &str) -> bool {
    looks_like_date(s) && parse_number(s).is_none()
}

fn parse_bound(s: &str) -> Option<Scalar> {
    if is_date_bound(s) {
        parse_date(s).map(Scalar::Date)
    } else {
        parse_number(s).map(Scalar::Number)
    }
}

/// Split the inside of `[A TO B]`, the keyword is case-insensitive.
fn split_range(inner: &str) -> Option<(&str, &str)> {
    let inner = inner.trim();
    let padded = format!(" {} ", inner.to_ascii_uppercase());
    // `padded[i + 1]` is `inner[i]`, upper casing ASCII keeps byte offsets
    let start = padded.find(" TO ")?;
    Some((inner[..start].trim(), inner[start + 2..].trim()))
}

pub fn detect_range(literal: &str) -> Result<Option<Resolved>, CompileError> {
    let Some(inner) = literal
        .strip_prefix('[')
        .and_then(|s| s.strip_suffix(']'))
    else {
        return Ok(None);
    };
    // a bracketed literal that isn't a valid range stays a plain string
    let malformed = || -> Result<Option<Resolved>, CompileError> {
        Ok(Some(Resolved::string(literal)))
    };
    let Some((min, max)) = split_range(inner) else {
        return malformed();
    };

    match (min, max) {
        ("", "") => {
            return Ok(Some(Resolved::Ordered(Ordered::Range(
                Bound::Unbounded,
                Bound::Unbounded,
            ))))
        }
        ("*", "*") => return Err(CompileError::AmbiguousRange(literal.to_string())),
        _ => {}
    }

    let dates = [min, max]
        .iter()
        .any(|bound| *bound != "*" && is_date_bound(bound));

    let bound = |s: &str| -> Option<Bound<Scalar>> {
        match s {
            "*" => Some(Bound::Unbounded),
            s if dates => parse_date(s).map(|date| Bound::Included(Scalar::Date(date))),
            s => parse_number(s).map(|n| Bound::Included(Scalar::Number(n))),
        }
    };

    match (bound(min), bound(max)) {
        (Some(min), Some(max)) => Ok(Some(Resolved::Ordered(Ordered::Range(min, max)))),
        _ => malformed(),
    }
}

const COMPARISONS: &[(&str, fn(Scalar) -> Ordered<Scalar>)] = &[
    (">=", Ordered::GreaterEqual),
    ("<=", Ordered::LessEqual),
    (">", Ordered::Greater),
    ("<", Ordered::Less),
];

pub fn detect_comparison(literal: &str) -> Result<Option<Resolved>, CompileError> {
    for (prefix, ordered) in COMPARISONS {
        if let Some(value) = literal.strip_prefix(prefix) {
            return Ok(parse_bound(value.trim()).map(|value| Resolved::Ordered(ordered(value))));
        }
    }
    Ok(None)
}

pub fn detect_regex(literal: &str) -> Result<Option<Resolved>, CompileError> {
    Ok(literal
        .strip_prefix('/')
        .and_then(|s| s.strip_suffix('/'))
        .filter(|pattern| !pattern.is_empty())
        .map(|pattern| Resolved::Pattern(Pattern::Regex(pattern.to_string()))))
}

pub fn detect_wildcard(literal: &str) -> Result<Option<Resolved>, CompileError> {
    Ok(literal
        .contains('*')
        .then(|| Resolved::Pattern(Pattern::Wildcard(literal.to_string()))))
}

pub fn detect_date(literal: &str) -> Result<Option<Resolved>, CompileError> {
    Ok(parse_date(literal).map(|date| Resolved::Scalar(Scalar::Date(date))))
}

pub fn detect_number(literal: &str) -> Result<Option<Resolved>, CompileError> {
    Ok(parse_number(literal).map(|n| Resolved::Scalar(Scalar::Number(n))))
}

pub fn detect_boolean(literal: &str) -> Result<Option<Resolved>, CompileError> {
    Ok(match literal {
        "true" => Some(Resolved::Scalar(Scalar::Boolean(true))),
        "false" => Some(Resolved::Scalar(Scalar::Boolean(false))),
        _ => None,
    })
}

impl Display for Scalar {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Number(n) => write!(f, "{n}"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Date(date) => f.write_str(&format_date(date).ok_or(std::fmt::Error)?),
        }
    }
}

fn write_bound(f: &mut Formatter<'_>, bound: &Bound<Scalar>) -> std::fmt::Result {
    match bound {
        Bound::Unbounded => f.write_str("*"),
        Bound::Included(value) | Bound::Excluded(value) => write!(f, "{value}"),
    }
}

/// Renders the value back as a query literal.
impl Display for Resolved {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ordered(Ordered::Range(Bound::Unbounded, Bound::Unbounded)) => f.write_str("[ TO ]"),
            Self::Ordered(Ordered::Range(min, max)) => {
                f.write_str("[")?;
                write_bound(f, min)?;
                f.write_str(" TO ")?;
                write_bound(f, max)?;
                f.write_str("]")
            }
            Self::Ordered(Ordered::Greater(value)) => write!(f, ">{value}"),
            Self::Ordered(Ordered::GreaterEqual(value)) => write!(f, ">={value}"),
            Self::Ordered(Ordered::Less(value)) => write!(f, "<{value}"),
            Self::Ordered(Ordered::LessEqual(value)) => write!(f, "<={value}"),
            Self::Pattern(Pattern::Regex(pattern)) => write!(f, "/{pattern}/"),
            Self::Pattern(Pattern::Wildcard(glob)) => f.write_str(glob),
            Self::Scalar(scalar) => write!(f, "{scalar}"),
        }
    }
}
