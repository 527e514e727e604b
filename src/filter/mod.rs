//! Translation of a parsed query into a filter [`Document`].
//!
//! The tree is translated bottom-up. Conjunctions merge plain field matches into a single
//! document, negations are pushed down to the fields, and terms without a field either become a
//! `$text` search or a match on the configured default fields.

mod document;

pub use self::document::*;

use crate::hir::{self, AndExpression, Expression, FieldValue, FreeText, NotExpression, Qualifier, Term};
use crate::value::{self, Kind, Ordered, Pattern, Resolved, Scalar};
use serde::{Deserialize, Serialize};
use std::ops::Bound;

/// The store's reserved identifier field.
pub const ID_KEY: &str = "_id";
/// Field name which gets renamed to [`ID_KEY`].
pub const ID_ALIAS: &str = "id";

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    #[error("Range without any bound: {0}")]
    AmbiguousRange(String),
    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
    #[error("Unsupported query on identifier field '{field}': {value}")]
    UnsupportedIdentifierQuery { field: String, value: String },
}

/// How a field value of several unquoted words is interpreted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MultiWordValues {
    /// `name:John Smith` matches the field against `"John Smith"`.
    #[default]
    Phrase,
    /// `name:John Smith` matches the field against `John` and searches for `Smith` as free text.
    SplitFreeText,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CompilerConfig {
    /// Fields searched by terms without a field name. If empty, a `$text` search is used.
    pub default_fields: Vec<String>,
    /// Rename a trailing `id` path segment to `_id`.
    pub rename_identifiers: bool,
    /// Encode identifier values as [`ObjectId`](bson::oid::ObjectId)s.
    pub convert_identifiers: bool,
    pub multi_word_values: MultiWordValues,
}

impl CompilerConfig {
    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_rename_identifiers(mut self, rename_identifiers: bool) -> Self {
        self.rename_identifiers = rename_identifiers;
        self
    }

    pub fn with_convert_identifiers(mut self, convert_identifiers: bool) -> Self {
        self.convert_identifiers = convert_identifiers;
        self
    }

    pub fn with_multi_word_values(mut self, multi_word_values: MultiWordValues) -> Self {
        self.multi_word_values = multi_word_values;
        self
    }
}

/// Translate a parsed query into a filter document.
pub fn compile(expression: &Expression, config: &CompilerConfig) -> Result<Document, CompileError> {
    log::debug!("compiling query: {expression}");

    let document = Context { config }.translate_expression(expression)?;

    log::debug!(
        "compiled query to: {:?}",
        document.keys().collect::<Vec<_>>()
    );
    Ok(document)
}

struct Context<'c> {
    config: &'c CompilerConfig,
}

impl Context<'_> {
    fn translate_expression(&self, expression: &Expression) -> Result<Document, CompileError> {
        let branches = expression
            .branches
            .iter()
            .map(|branch| self.translate_and(branch))
            .collect::<Result<Vec<_>, _>>()?;

        let branches = match <[Document; 1]>::try_from(branches) {
            Ok([branch]) => return Ok(branch),
            Err(branches) => branches,
        };

        if let Some(search) = free_text_union(&branches) {
            log::trace!("joining {} free text branches", branches.len());
            return Ok(text_search(search));
        }

        Ok(entry(OR, array(branches)))
    }

    fn translate_and(&self, and: &AndExpression) -> Result<Document, CompileError> {
        let documents = and
            .terms
            .iter()
            .map(|term| self.translate_not(term))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(conjunction(documents))
    }

    fn translate_not(&self, not: &NotExpression) -> Result<Document, CompileError> {
        match not {
            NotExpression::Term(term) => self.translate_term(term),
            NotExpression::Not(inner) => match inner.as_ref() {
                NotExpression::Term(Term::FieldValue(field_value)) => {
                    self.translate_field_value(field_value, true)
                }
                inner => Ok(negate(self.translate_not(inner)?)),
            },
        }
    }

    fn translate_term(&self, term: &Term) -> Result<Document, CompileError> {
        match term {
            Term::FieldValue(field_value) => self.translate_field_value(field_value, false),
            Term::FreeText(text) => self.translate_free_text(text),
            Term::Group(expression) => self.translate_expression(expression),
        }
    }

    fn translate_field_value(
        &self,
        field_value: &FieldValue,
        negated: bool,
    ) -> Result<Document, CompileError> {
        let negate_if = |document: Document| match negated {
            true => negate(document),
            false => document,
        };

        match self.split_words(&field_value.value) {
            Some((head, rest)) => {
                // the negation applies to the field part only
                let field = self.translate_field(&field_value.field, &hir::Value::Terms(vec![head]))?;
                let text = self.translate_free_text(&FreeText::Terms(rest.to_vec()))?;
                Ok(conjunction(vec![negate_if(field), text]))
            }
            None => Ok(negate_if(
                self.translate_field(&field_value.field, &field_value.value)?,
            )),
        }
    }

    fn split_words<'v, 'a>(&self, value: &'v hir::Value<'a>) -> Option<(&'a str, &'v [&'a str])> {
        match (self.config.multi_word_values, value) {
            (MultiWordValues::SplitFreeText, hir::Value::Terms(words)) => match words.as_slice() {
                [head, rest @ ..] if !rest.is_empty() => Some((*head, rest)),
                _ => None,
            },
            _ => None,
        }
    }

    fn translate_field(&self, field: &Qualifier, value: &hir::Value) -> Result<Document, CompileError> {
        let (literal, resolved) = match value {
            hir::Value::Quoted(s) | hir::Value::SingleQuoted(s) => (s.to_string(), Resolved::string(*s)),
            hir::Value::Terms(words) => {
                let literal = words.join(" ");
                let resolved = value::resolve(&literal)?;
                (literal, resolved)
            }
            hir::Value::Range(s)
            | hir::Value::DateTime(s)
            | hir::Value::Time(s)
            | hir::Value::Regex(s) => (s.to_string(), value::resolve(s)?),
        };

        let name = self.field_name(field);

        if self.config.convert_identifiers && is_identifier(field) {
            return match resolved.kind() {
                Kind::Range | Kind::Comparison | Kind::Regex | Kind::Wildcard => {
                    Err(CompileError::UnsupportedIdentifierQuery {
                        field: name,
                        value: literal,
                    })
                }
                Kind::Date | Kind::Number | Kind::Boolean | Kind::String => {
                    bson::oid::ObjectId::parse_str(&literal)
                        .map(|id| entry(name, id))
                        .map_err(|_| CompileError::InvalidIdentifier(literal))
                }
            };
        }

        Ok(entry(name, translate_resolved(resolved)))
    }

    fn field_name(&self, field: &Qualifier) -> String {
        match field.split_last() {
            Some((last, parents)) if self.config.rename_identifiers && *last == ID_ALIAS => parents
                .iter()
                .copied()
                .chain([ID_KEY])
                .collect::<Vec<_>>()
                .join("."),
            _ => field.to_string(),
        }
    }

    fn translate_free_text(&self, text: &FreeText) -> Result<Document, CompileError> {
        if self.config.default_fields.is_empty() {
            let search = match text {
                FreeText::Terms(words) => words.join(" "),
                FreeText::Quoted(s) | FreeText::SingleQuoted(s) => format!("\"{s}\""),
                FreeText::Regex(s) => strip_slashes(s).to_string(),
            };
            return Ok(text_search(search));
        }

        let matcher = default_matcher(text)?;
        let clauses = self
            .config
            .default_fields
            .iter()
            .map(|field| entry(field.clone(), matcher.clone()))
            .collect::<Vec<_>>();

        Ok(match <[Document; 1]>::try_from(clauses) {
            Ok([clause]) => clause,
            Err(clauses) => entry(OR, array(clauses)),
        })
    }
}

fn is_identifier(field: &Qualifier) -> bool {
    matches!(field.name(), Some(ID_KEY | ID_ALIAS))
}

fn strip_slashes(s: &str) -> &str {
    s.strip_prefix('/')
        .and_then(|s| s.strip_suffix('/'))
        .unwrap_or(s)
}


fn text_search(search: String) -> Document {
    entry(TEXT, entry(SEARCH, search))
}

/// The search string of a plain `$text` clause.
fn search_of(document: &Document) -> Option<&str> {
    match single_entry(document) {
        Some((TEXT, Bson::Document(text))) => match single_entry(text) {
            Some((SEARCH, Bson::String(search))) => Some(search.as_str()),
            _ => None,
        },
        _ => None,
    }
}

/// The search strings of the branches, if every branch is a plain `$text` search.
fn free_text_union(branches: &[Document]) -> Option<String> {
    branches
        .iter()
        .map(search_of)
        .collect::<Option<Vec<_>>>()
        .map(|searches| searches.join(" "))
}

/// Join all `$text` clauses of a conjunction into the first one, a filter may only carry one.
fn join_text_searches(documents: Vec<Document>) -> Vec<Document> {
    let mut searches = vec![];
    let mut position = None;
    let mut result = Vec::with_capacity(documents.len());

    for document in documents {
        match search_of(&document) {
            Some(search) => {
                searches.push(search.to_string());
                if position.is_none() {
                    position = Some(result.len());
                    result.push(Document::new());
                }
            }
            None => result.push(document),
        }
    }

    if let Some(position) = position {
        log::trace!("joining {} conjunctive free text clauses", searches.len());
        result[position] = text_search(searches.join(" "));
    }

    result
}

/// Toggle the `-` exclusion prefix of every word and phrase of a text search.
fn negate_search(search: &str) -> String {
    let mut terms = vec![];
    let mut rest = search.trim_start();

    while !rest.is_empty() {
        let (excluded, body) = match rest.strip_prefix('-') {
            Some(body) => (true, body),
            None => (false, rest),
        };
        let end = match body.strip_prefix('"') {
            Some(phrase) => phrase.find('"').map(|i| i + 2).unwrap_or(body.len()),
            None => body.find(char::is_whitespace).unwrap_or(body.len()),
        };

        let term = &body[..end];
        if !term.is_empty() {
            terms.push(match excluded {
                true => term.to_string(),
                false => format!("-{term}"),
            });
        }
        rest = body[end..].trim_start();
    }

    terms.join(" ")
}

/// The regular expression used to search default fields for a free text term.
fn default_matcher(text: &FreeText) -> Result<Document, CompileError> {
    let (literal, detected) = match text {
        FreeText::Regex(s) => (strip_slashes(s).to_string(), value::detect_regex(s)?),
        FreeText::Terms(words) => {
            let literal = words.join(" ");
            let detected = value::detect_wildcard(&literal)?;
            (literal, detected)
        }
        FreeText::Quoted(s) | FreeText::SingleQuoted(s) => (s.to_string(), None),
    };

    Ok(match detected {
        Some(Resolved::Pattern(pattern)) => translate_pattern(&pattern),
        _ => {
            let mut matcher = entry(REGEX, regex::escape(&literal));
            matcher.insert(OPTIONS, "i");
            matcher
        }
    })
}

/// A clause which can be merged with others into a single document.
fn is_simple(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| !key.starts_with('$'))
}

/// Combine clauses with AND.
///
/// Simple clauses are merged into one document, which takes the position of its first member.
/// Operator clauses and clauses repeating an already merged field stay separate in `$and`.
fn conjunction(documents: Vec<Document>) -> Document {
    let documents = match <[Document; 1]>::try_from(join_text_searches(documents)) {
        Ok([document]) => return document,
        Err(documents) => documents,
    };

    let mut merged = Document::new();
    // `None` marks the position of the merged document
    let mut clauses: Vec<Option<Document>> = Vec::with_capacity(documents.len());

    for document in documents {
        if is_simple(&document) && !document.keys().any(|key| merged.contains_key(key)) {
            if merged.is_empty() {
                clauses.push(None);
            }
            for (key, value) in document {
                merged.insert(key, value);
            }
        } else {
            log::trace!(
                "keeping clause apart: {:?}",
                document.keys().collect::<Vec<_>>()
            );
            clauses.push(Some(document));
        }
    }

    if let [None] = clauses.as_slice() {
        return merged;
    }

    let mut merged = Some(merged);
    let clauses = clauses
        .into_iter()
        .filter_map(|clause| clause.or_else(|| merged.take()))
        .collect::<Vec<_>>();

    entry(AND, array(clauses))
}

/// Negate a clause, pushing the negation down to the fields.
fn negate(document: Document) -> Document {
    if let Some(search) = search_of(&document) {
        return text_search(negate_search(search));
    }

    let (key, value) = match into_single_entry(document) {
        Ok(pair) => pair,
        // NOT (a AND b) => NOT a OR NOT b
        Err(document) => {
            return entry(
                OR,
                array(
                    document
                        .into_iter()
                        .map(|(key, value)| negate(entry(key, value)))
                        .collect(),
                ),
            )
        }
    };

    match value {
        Bson::Array(clauses) if key == OR => {
            conjunction(clauses.into_iter().filter_map(into_document).map(negate).collect())
        }
        Bson::Array(clauses) if key == AND => entry(
            OR,
            array(
                clauses
                    .into_iter()
                    .filter_map(into_document)
                    .map(negate)
                    .collect(),
            ),
        ),
        value => entry(key, negate_value(value)),
    }
}

/// Wrap a value in `$ne`, or unwrap it if it is a `$ne` already.
fn negate_value(value: Bson) -> Bson {
    match value {
        Bson::Document(document) => match into_single_entry(document) {
            Ok((key, inner)) if key == NE => inner,
            Ok((key, inner)) => entry(NE, entry(key, inner)).into(),
            Err(document) => entry(NE, document).into(),
        },
        value => entry(NE, value).into(),
    }
}

fn translate_resolved(resolved: Resolved) -> Bson {
    match resolved {
        Resolved::Scalar(scalar) => translate_scalar(scalar),
        Resolved::Pattern(pattern) => translate_pattern(&pattern).into(),
        Resolved::Ordered(ordered) => translate_ordered(ordered).into(),
    }
}

fn translate_scalar(scalar: Scalar) -> Bson {
    match scalar {
        Scalar::String(s) => Bson::String(s),
        Scalar::Number(n) => number(n),
        Scalar::Boolean(b) => Bson::Boolean(b),
        Scalar::Date(value) => date(value),
    }
}

fn translate_pattern(pattern: &Pattern) -> Document {
    let mut result = entry(REGEX, pattern.to_regex());
    if pattern.case_insensitive() {
        result.insert(OPTIONS, "i");
    }
    result
}

/// Translate an `Ordered` value into an operator document.
fn translate_ordered(ordered: Ordered<Scalar>) -> Document {
    match ordered {
        Ordered::Greater(value) => entry(GT, translate_scalar(value)),
        Ordered::GreaterEqual(value) => entry(GTE, translate_scalar(value)),
        Ordered::Less(value) => entry(LT, translate_scalar(value)),
        Ordered::LessEqual(value) => entry(LTE, translate_scalar(value)),
        Ordered::Range(Bound::Unbounded, Bound::Unbounded) => entry(EXISTS, true),
        Ordered::Range(min, max) => {
            let mut result = Document::new();
            if let Some((operator, value)) = translate_bound(min, GTE, GT) {
                result.insert(operator, value);
            }
            if let Some((operator, value)) = translate_bound(max, LTE, LT) {
                result.insert(operator, value);
            }
            result
        }
    }
}

/// The operator and value for a range bound, `None` if unbounded.
fn translate_bound(
    bound: Bound<Scalar>,
    included: &'static str,
    excluded: &'static str,
) -> Option<(&'static str, Bson)> {
    match bound {
        Bound::Unbounded => None,
        Bound::Included(value) => Some((included, translate_scalar(value))),
        Bound::Excluded(value) => Some((excluded, translate_scalar(value))),
    }
}
