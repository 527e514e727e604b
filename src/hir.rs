//! The parsed query, before any value is interpreted.
//!
//! The tree borrows all text from the query string. Operator precedence is encoded in the shape
//! of the tree: an [`Expression`] is a disjunction of [`AndExpression`]s, which are conjunctions
//! of [`NotExpression`]s.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

/// A dotted field path, like `user.address.city`.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct Qualifier<'a>(pub Vec<&'a str>);

impl<'a> Qualifier<'a> {
    pub fn parse(field: &'a str) -> Self {
        Self(field.split('.').collect())
    }

    /// The final path segment.
    pub fn name(&self) -> Option<&'a str> {
        self.0.last().copied()
    }
}

impl Display for Qualifier<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (i, s) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            f.write_str(s)?;
        }
        Ok(())
    }
}

impl<'a> Deref for Qualifier<'a> {
    type Target = Vec<&'a str>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'a, const N: usize> From<[&'a str; N]> for Qualifier<'a> {
    fn from(value: [&'a str; N]) -> Self {
        Self(value.into())
    }
}

/// Disjunction, never empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Expression<'a> {
    pub branches: Vec<AndExpression<'a>>,
}

/// Conjunction, never empty.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct AndExpression<'a> {
    pub terms: Vec<NotExpression<'a>>,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum NotExpression<'a> {
    Not(Box<NotExpression<'a>>),
    Term(Term<'a>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Term<'a> {
    FieldValue(FieldValue<'a>),
    FreeText(FreeText<'a>),
    Group(Expression<'a>),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FieldValue<'a> {
    pub field: Qualifier<'a>,
    pub value: Value<'a>,
}

/// Text searched without a field name.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FreeText<'a> {
    Terms(Vec<&'a str>),
    Quoted(&'a str),
    SingleQuoted(&'a str),
    /// Including the slashes.
    Regex(&'a str),
}

/// The raw value of a `field:value` term.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Value<'a> {
    Terms(Vec<&'a str>),
    Quoted(&'a str),
    SingleQuoted(&'a str),
    /// Including the brackets.
    Range(&'a str),
    DateTime(&'a str),
    Time(&'a str),
    /// Including the slashes.
    Regex(&'a str),
}

impl<'a> Expression<'a> {
    pub fn new(branches: Vec<AndExpression<'a>>) -> Self {
        Self { branches }
    }
}

impl<'a> AndExpression<'a> {
    pub fn new(terms: Vec<NotExpression<'a>>) -> Self {
        Self { terms }
    }
}

impl<'a> NotExpression<'a> {
    pub fn not(inner: NotExpression<'a>) -> Self {
        Self::Not(Box::new(inner))
    }
}

impl<'a> Term<'a> {
    pub fn field(field: &'a str, value: Value<'a>) -> Self {
        Self::FieldValue(FieldValue {
            field: Qualifier::parse(field),
            value,
        })
    }
}

impl<'a> From<Term<'a>> for NotExpression<'a> {
    fn from(value: Term<'a>) -> Self {
        Self::Term(value)
    }
}

impl<'a> From<Term<'a>> for Expression<'a> {
    fn from(value: Term<'a>) -> Self {
        Self::new(vec![AndExpression::new(vec![value.into()])])
    }
}

fn write_joined<T: Display>(f: &mut Formatter<'_>, items: &[T], separator: &str) -> std::fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(separator)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl Display for Expression<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_joined(f, &self.branches, " OR ")
    }
}

impl Display for AndExpression<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write_joined(f, &self.terms, " AND ")
    }
}

impl Display for NotExpression<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Not(inner) => write!(f, "NOT {inner}"),
            Self::Term(term) => write!(f, "{term}"),
        }
    }
}

impl Display for Term<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FieldValue(FieldValue { field, value }) => write!(f, "{field}:{value}"),
            Self::FreeText(text) => write!(f, "{text}"),
            Self::Group(expression) => write!(f, "({expression})"),
        }
    }
}

impl Display for FreeText<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terms(terms) => f.write_str(&terms.join(" ")),
            Self::Quoted(s) => write!(f, "\"{s}\""),
            Self::SingleQuoted(s) => write!(f, "'{s}'"),
            Self::Regex(s) => f.write_str(s),
        }
    }
}

impl Display for Value<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Terms(terms) => f.write_str(&terms.join(" ")),
            Self::Quoted(s) => write!(f, "\"{s}\""),
            Self::SingleQuoted(s) => write!(f, "'{s}'"),
            Self::Range(s) | Self::DateTime(s) | Self::Time(s) | Self::Regex(s) => f.write_str(s),
        }
    }
}
