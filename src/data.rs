//! Core value model shared by every engine module.
//!
//! A [`Dataset`] is an ordered sequence of [`Record`]s; a record is an
//! insertion-ordered map from column name to [`Value`]. The key order of the
//! first record is the dataset's column order. Later records may omit keys,
//! which reads the same as an explicit [`Value::Null`].
//!
//! Numeric coercion follows a lossy "leading literal or zero" policy so that
//! aggregation totals stay defined for dirty cells; see [`coerce_number`].

use std::{fmt, sync::OnceLock};

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use regex::Regex;
use serde::{
    Deserialize, Deserializer, Serialize, Serializer,
    de::{self, Visitor},
};

pub type Record = IndexMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Number(f64),
    Text(String),
}

impl Value {
    /// Null, absent and empty-string cells all count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            Value::Null => true,
            Value::Text(s) => s.is_empty(),
            Value::Number(_) => false,
        }
    }

    pub fn as_number(&self) -> f64 {
        coerce_number(Some(self))
    }

    pub fn as_display(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Number(n) => format_number(*n),
            Value::Text(s) => s.clone(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_display())
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value as f64)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Number(n) => serializer.serialize_f64(*n),
            Value::Text(s) => serializer.serialize_str(s),
        }
    }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
    type Value = Value;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a number, string, boolean or null cell")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_none<E: de::Error>(self) -> Result<Value, E> {
        Ok(Value::Null)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<Value, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }

    fn visit_bool<E: de::Error>(self, v: bool) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Value, E> {
        Ok(Value::Number(v as f64))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Value, E> {
        Ok(Value::Number(v))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Value, E> {
        Ok(Value::Text(v.to_string()))
    }

    fn visit_string<E: de::Error>(self, v: String) -> Result<Value, E> {
        Ok(Value::Text(v))
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(ValueVisitor)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Dataset {
    records: Vec<Record>,
}

impl Dataset {
    pub const fn empty() -> Self {
        Self {
            records: Vec::new(),
        }
    }

    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Record> {
        self.records.iter()
    }

    /// Column names taken from the first record, in key order.
    pub fn columns(&self) -> Vec<&str> {
        self.records
            .first()
            .map(|first| first.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        self.records.get(row).and_then(|record| record.get(column))
    }

    pub fn filter<F>(&self, mut keep: F) -> Dataset
    where
        F: FnMut(&Record) -> bool,
    {
        self.records
            .iter()
            .filter(|record| keep(record))
            .cloned()
            .collect()
    }
}

impl FromIterator<Record> for Dataset {
    fn from_iter<I: IntoIterator<Item = Record>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a Dataset {
    type Item = &'a Record;
    type IntoIter = std::slice::Iter<'a, Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

/// True when `column` is absent from `record` or holds a missing value.
pub fn is_missing_in(record: &Record, column: &str) -> bool {
    record.get(column).is_none_or(Value::is_missing)
}

fn leading_float_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[+-]?(?:Infinity|(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?)")
            .expect("leading float pattern is valid")
    })
}

/// Parses the longest numeric literal at the start of `raw`, ignoring leading
/// whitespace. `"12.5kg"` gives `Some(12.5)`, `"kg"` gives `None`.
pub fn parse_leading_float(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let matched = leading_float_pattern().find(trimmed)?;
    matched.as_str().parse::<f64>().ok()
}

/// Lossy numeric view of a cell: unparsable, missing and NaN cells become 0.
pub fn coerce_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) if !n.is_nan() => *n,
        Some(Value::Text(s)) => coerce_text(s),
        _ => 0.0,
    }
}

pub fn coerce_text(raw: &str) -> f64 {
    parse_leading_float(raw)
        .filter(|n| !n.is_nan())
        .unwrap_or(0.0)
}

/// Strict numeric view: the whole trimmed text must be a finite number.
pub fn parse_full_number(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn format_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "Infinity".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Infinity".to_string()
    } else if value == 0.0 {
        "0".to_string()
    } else {
        value.to_string()
    }
}

/// Rounds half-way cases towards positive infinity (`-2.5` becomes `-2`).
pub fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

pub fn parse_naive_date(value: &str) -> Option<NaiveDate> {
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d-%m-%Y", "%m/%d/%Y", "%d/%m/%Y"];
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
}

pub fn parse_naive_datetime(value: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(value)
                .ok()
                .map(|dt| dt.naive_utc())
        })
}

/// Calendar-looking text: parses as a date or datetime and contains `-`.
pub fn looks_like_datetime(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.contains('-')
        && (parse_naive_date(trimmed).is_some() || parse_naive_datetime(trimmed).is_some())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coerce_number_reads_leading_literals() {
        assert_eq!(coerce_number(Some(&Value::from("12.5kg"))), 12.5);
        assert_eq!(coerce_number(Some(&Value::from("  -3e2 units"))), -300.0);
        assert_eq!(coerce_number(Some(&Value::from(".5"))), 0.5);
        assert_eq!(coerce_number(Some(&Value::from("Infinity"))), f64::INFINITY);
    }

    #[test]
    fn coerce_number_defaults_to_zero() {
        assert_eq!(coerce_number(None), 0.0);
        assert_eq!(coerce_number(Some(&Value::Null)), 0.0);
        assert_eq!(coerce_number(Some(&Value::from("n/a"))), 0.0);
        assert_eq!(coerce_number(Some(&Value::from(""))), 0.0);
        assert_eq!(coerce_number(Some(&Value::Number(f64::NAN))), 0.0);
    }

    #[test]
    fn parse_full_number_rejects_partial_text() {
        assert_eq!(parse_full_number(" 42 "), Some(42.0));
        assert_eq!(parse_full_number("42abc"), None);
        assert_eq!(parse_full_number("inf"), None);
        assert_eq!(parse_full_number(""), None);
    }

    #[test]
    fn numbers_display_without_trailing_fraction() {
        assert_eq!(Value::Number(3.0).as_display(), "3");
        assert_eq!(Value::Number(2.5).as_display(), "2.5");
        assert_eq!(Value::Number(-0.0).as_display(), "0");
        assert_eq!(Value::Number(f64::NEG_INFINITY).as_display(), "-Infinity");
    }

    #[test]
    fn round_half_up_matches_spreadsheet_rounding() {
        assert_eq!(round_half_up(2.5), 3.0);
        assert_eq!(round_half_up(-2.5), -2.0);
        assert_eq!(round_half_up(84.4), 84.0);
    }

    #[test]
    fn looks_like_datetime_requires_dash_separator() {
        assert!(looks_like_datetime("2024-05-06"));
        assert!(looks_like_datetime("2024-05-06T14:30:00"));
        assert!(looks_like_datetime("2024-05-06T14:30:00Z"));
        assert!(!looks_like_datetime("2024/05/06"));
        assert!(!looks_like_datetime("sku-104"));
    }

    #[test]
    fn missing_values_include_empty_text_and_absent_keys() {
        let mut record = Record::new();
        record.insert("name".into(), Value::from(""));
        record.insert("qty".into(), Value::Number(0.0));
        assert!(is_missing_in(&record, "name"));
        assert!(is_missing_in(&record, "price"));
        assert!(!is_missing_in(&record, "qty"));
    }

    #[test]
    fn json_records_deserialize_in_key_order() {
        let dataset: Dataset =
            serde_json::from_str(r#"[{"b": 1, "a": "x", "c": null, "d": true}]"#)
                .expect("parse records");
        assert_eq!(dataset.columns(), vec!["b", "a", "c", "d"]);
        assert_eq!(dataset.value(0, "b"), Some(&Value::Number(1.0)));
        assert_eq!(dataset.value(0, "c"), Some(&Value::Null));
        assert_eq!(dataset.value(0, "d"), Some(&Value::from("true")));
    }
}
