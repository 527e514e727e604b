use ::time::format_description::well_known::Rfc3339;
use ::time::macros::format_description;
use ::time::{Date, OffsetDateTime, PrimitiveDateTime};

pub type DateParser = fn(&str) -> Option<OffsetDateTime>;

fn rfc3339(s: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339).ok()
}

fn iso_date(s: &str) -> Option<OffsetDateTime> {
    Date::parse(s, format_description!("[year]-[month]-[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn iso_utc(s: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn iso_local(s: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn spaced(s: &str) -> Option<OffsetDateTime> {
    PrimitiveDateTime::parse(
        s,
        format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"),
    )
    .ok()
    .map(PrimitiveDateTime::assume_utc)
}

fn us_date(s: &str) -> Option<OffsetDateTime> {
    Date::parse(s, format_description!("[month]/[day]/[year]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

fn slashed_date(s: &str) -> Option<OffsetDateTime> {
    Date::parse(s, format_description!("[year]/[month]/[day]"))
        .ok()
        .map(|date| date.midnight().assume_utc())
}

/// Accepted date layouts, tried in order. Values without a zone are taken as UTC.
pub const DATE_FORMATS: &[(&str, DateParser)] = &[
    ("RFC 3339", rfc3339),
    ("YYYY-MM-DD", iso_date),
    ("YYYY-MM-DDThh:mm:ssZ", iso_utc),
    ("YYYY-MM-DDThh:mm:ss", iso_local),
    ("YYYY-MM-DD hh:mm:ss", spaced),
    ("MM/DD/YYYY", us_date),
    ("YYYY/MM/DD", slashed_date),
];

pub fn parse_date(s: &str) -> Option<OffsetDateTime> {
    DATE_FORMATS.iter().find_map(|(_, parse)| parse(s))
}

/// Characters which make a literal "look like" a date rather than a number.
pub fn looks_like_date(s: &str) -> bool {
    s.contains(&['-', '/', ':', ' ', 'T'][..])
}

pub fn format_date(date: &OffsetDateTime) -> Option<String> {
    date.format(&Rfc3339).ok()
}
