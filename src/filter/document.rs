//! Building blocks for filter documents.

pub use bson::{Bson, Document};
use time::OffsetDateTime;

pub const AND: &str = "$and";
pub const OR: &str = "$or";
pub const NE: &str = "$ne";
pub const GT: &str = "$gt";
pub const GTE: &str = "$gte";
pub const LT: &str = "$lt";
pub const LTE: &str = "$lte";
pub const REGEX: &str = "$regex";
pub const OPTIONS: &str = "$options";
pub const TEXT: &str = "$text";
pub const SEARCH: &str = "$search";
pub const EXISTS: &str = "$exists";

/// Render a document as relaxed extended JSON.
pub trait ToJson {
    fn to_json(&self) -> serde_json::Value;
}

impl ToJson for Document {
    fn to_json(&self) -> serde_json::Value {
        Bson::Document(self.clone()).into_relaxed_extjson()
    }
}

/// A document with a single entry.
pub(crate) fn entry(key: impl Into<String>, value: impl Into<Bson>) -> Document {
    let mut document = Document::new();
    document.insert(key, value);
    document
}

/// The only entry, if there is exactly one.
pub(crate) fn single_entry(document: &Document) -> Option<(&str, &Bson)> {
    match document.len() {
        1 => document.iter().next().map(|(key, value)| (key.as_str(), value)),
        _ => None,
    }
}

/// The only entry by value, or the document if it has none or several.
pub(crate) fn into_single_entry(document: Document) -> Result<(String, Bson), Document> {
    match document.len() {
        1 => document.into_iter().next().ok_or_else(Document::new),
        _ => Err(document),
    }
}

pub(crate) fn into_document(value: Bson) -> Option<Document> {
    match value {
        Bson::Document(document) => Some(document),
        _ => None,
    }
}

pub(crate) fn array(documents: Vec<Document>) -> Bson {
    Bson::Array(documents.into_iter().map(Bson::Document).collect())
}

/// Largest integer an `f64` holds exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Integral values are stored as 64 bit integers, everything else as doubles.
pub(crate) fn number(value: f64) -> Bson {
    if value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        Bson::Int64(value as i64)
    } else {
        Bson::Double(value)
    }
}

/// The store keeps dates with millisecond precision.
pub(crate) fn date(value: OffsetDateTime) -> Bson {
    let millis = value.unix_timestamp_nanos() / 1_000_000;
    Bson::DateTime(bson::DateTime::from_millis(millis as i64))
}
