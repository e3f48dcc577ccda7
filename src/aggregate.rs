//! Grouped aggregation producing chart-ready rows.
//!
//! Records are grouped by the stringified categorical axis (and optionally a
//! secondary axis), every measure is coerced with
//! [`coerce_number`](crate::data::coerce_number) and folded per group. Sums
//! and averages share one fold; maxima and minima run their own fold from
//! scratch. Rows are emitted in first-appearance order of their group and
//! optionally stable-sorted afterwards.
//!
//! [`aggregate`] never fails: a malformed spec is logged and yields an empty
//! result so that a chart degrades to "no data".

use std::{cmp::Ordering, collections::HashMap, fmt, str::FromStr};

use indexmap::IndexMap;
use log::{debug, warn};
use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};
use thiserror::Error;

use crate::data::{Dataset, Record, Value, coerce_number, coerce_text, parse_full_number};

pub const UNKNOWN_LABEL: &str = "Unknown";
pub const COUNT_FIELD: &str = "count";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    #[default]
    Sum,
    Average,
    Max,
    Min,
}

impl AggregationKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AggregationKind::Sum => "sum",
            AggregationKind::Average => "average",
            AggregationKind::Max => "max",
            AggregationKind::Min => "min",
        }
    }
}

impl fmt::Display for AggregationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationKind {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sum" => Ok(AggregationKind::Sum),
            "average" | "avg" | "mean" => Ok(AggregationKind::Average),
            "max" => Ok(AggregationKind::Max),
            "min" => Ok(AggregationKind::Min),
            other => Err(AggregateError::UnknownKind(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl FromStr for SortOrder {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(SortOrder::Ascending),
            "desc" | "descending" => Ok(SortOrder::Descending),
            other => Err(AggregateError::UnknownOrder(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    /// Categorical axis value.
    Axis,
    /// Sum of every measure in the row.
    MeasureTotal,
    /// A named field of the row: a measure, `count`, or an axis column.
    Column(String),
}

impl FromStr for SortKey {
    type Err = AggregateError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed {
            "" => Err(AggregateError::EmptySortKey),
            "axis" | "x" => Ok(SortKey::Axis),
            "total" | "measure-total" | "y" => Ok(SortKey::MeasureTotal),
            column => Ok(SortKey::Column(column.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub key: SortKey,
    #[serde(default)]
    pub order: SortOrder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    pub categorical_axis: String,
    #[serde(default)]
    pub secondary_axis: Option<String>,
    pub measures: Vec<String>,
    #[serde(default)]
    pub kind: AggregationKind,
    #[serde(default)]
    pub sort: Option<SortSpec>,
}

impl AggregationSpec {
    pub fn new<S: Into<String>>(categorical_axis: S, measures: Vec<String>) -> Self {
        Self {
            categorical_axis: categorical_axis.into(),
            secondary_axis: None,
            measures,
            kind: AggregationKind::Sum,
            sort: None,
        }
    }

    pub fn with_secondary<S: Into<String>>(mut self, axis: S) -> Self {
        self.secondary_axis = Some(axis.into());
        self
    }

    pub fn with_kind(mut self, kind: AggregationKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_sort(mut self, key: SortKey, order: SortOrder) -> Self {
        self.sort = Some(SortSpec { key, order });
        self
    }

    fn is_incomplete(&self) -> bool {
        self.categorical_axis.trim().is_empty() || self.measures.is_empty()
    }

    pub fn validate(&self) -> Result<(), AggregateError> {
        if let Some(secondary) = &self.secondary_axis
            && secondary == &self.categorical_axis
        {
            return Err(AggregateError::SecondaryRepeatsAxis(secondary.clone()));
        }
        for (idx, measure) in self.measures.iter().enumerate() {
            if measure == COUNT_FIELD {
                return Err(AggregateError::ReservedMeasure(measure.clone()));
            }
            if measure == &self.categorical_axis
                || self.secondary_axis.as_deref() == Some(measure.as_str())
            {
                return Err(AggregateError::MeasureIsAxis(measure.clone()));
            }
            if self.measures[..idx].contains(measure) {
                return Err(AggregateError::DuplicateMeasure(measure.clone()));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    #[error("measure '{0}' is listed more than once")]
    DuplicateMeasure(String),
    #[error("measure '{0}' is also used as a grouping axis")]
    MeasureIsAxis(String),
    #[error("measure name '{0}' is reserved for the row count")]
    ReservedMeasure(String),
    #[error("secondary axis '{0}' repeats the categorical axis")]
    SecondaryRepeatsAxis(String),
    #[error("unknown aggregation '{0}' (expected sum, average, max or min)")]
    UnknownKind(String),
    #[error("unknown sort order '{0}' (expected asc or desc)")]
    UnknownOrder(String),
    #[error("sort key cannot be empty")]
    EmptySortKey,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupLabel {
    pub column: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AggregatedRow {
    pub axis: GroupLabel,
    pub secondary: Option<GroupLabel>,
    pub measures: IndexMap<String, f64>,
    pub count: usize,
}

impl AggregatedRow {
    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures.get(name).copied()
    }

    pub fn measure_total(&self) -> f64 {
        self.measures.values().sum()
    }

    /// Numeric view of any field of the row; unknown fields read as 0.
    fn field_number(&self, name: &str) -> f64 {
        if let Some(value) = self.measures.get(name) {
            return *value;
        }
        if name == COUNT_FIELD {
            return self.count as f64;
        }
        if name == self.axis.column {
            return coerce_text(&self.axis.value);
        }
        match &self.secondary {
            Some(label) if label.column == name => coerce_text(&label.value),
            _ => 0.0,
        }
    }

    pub fn to_record(&self) -> Record {
        let mut record = Record::new();
        record.insert(
            self.axis.column.clone(),
            Value::Text(self.axis.value.clone()),
        );
        if let Some(label) = &self.secondary {
            record.insert(label.column.clone(), Value::Text(label.value.clone()));
        }
        for (name, value) in &self.measures {
            record.insert(name.clone(), Value::Number(*value));
        }
        record.insert(COUNT_FIELD.to_string(), Value::Number(self.count as f64));
        record
    }
}

impl Serialize for AggregatedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let extra = usize::from(self.secondary.is_some());
        let mut map = serializer.serialize_map(Some(self.measures.len() + 2 + extra))?;
        map.serialize_entry(&self.axis.column, &self.axis.value)?;
        if let Some(label) = &self.secondary {
            map.serialize_entry(&label.column, &label.value)?;
        }
        for (name, value) in &self.measures {
            map.serialize_entry(name, value)?;
        }
        map.serialize_entry(COUNT_FIELD, &self.count)?;
        map.end()
    }
}

/// Aggregates `dataset` per `spec`, logging and swallowing any failure.
pub fn aggregate(dataset: &Dataset, spec: &AggregationSpec) -> Vec<AggregatedRow> {
    match try_aggregate(dataset, spec) {
        Ok(rows) => rows,
        Err(err) => {
            warn!(
                "Aggregation on '{}' produced no data: {err}",
                spec.categorical_axis
            );
            Vec::new()
        }
    }
}

pub fn try_aggregate(
    dataset: &Dataset,
    spec: &AggregationSpec,
) -> Result<Vec<AggregatedRow>, AggregateError> {
    if dataset.is_empty() || spec.is_incomplete() {
        return Ok(Vec::new());
    }
    spec.validate()?;

    let groups = Grouping::build(dataset, spec);
    debug!(
        "Grouped {} record(s) into {} group(s) on '{}'",
        dataset.len(),
        groups.len(),
        spec.categorical_axis
    );
    let folded = match spec.kind {
        AggregationKind::Sum | AggregationKind::Average => fold_totals(dataset, spec, &groups),
        AggregationKind::Max | AggregationKind::Min => fold_extrema(dataset, spec, &groups),
    };
    let rows = groups.emit(spec, folded);
    Ok(match &spec.sort {
        Some(sort) => sort_rows(rows, sort),
        None => rows,
    })
}

pub fn axis_label(record: &Record, column: &str) -> String {
    match record.get(column) {
        Some(value) if !value.is_missing() => value.as_display(),
        _ => UNKNOWN_LABEL.to_string(),
    }
}

fn measure_value(record: &Record, measure: &str) -> f64 {
    coerce_number(record.get(measure))
}

type GroupKey = (String, Option<String>);

/// Group assignment of every record plus the group labels in emission order.
struct Grouping {
    keys: Vec<GroupKey>,
    assignments: Vec<usize>,
}

impl Grouping {
    fn build(dataset: &Dataset, spec: &AggregationSpec) -> Self {
        let mut index: HashMap<GroupKey, usize> = HashMap::new();
        let mut keys = Vec::new();
        let mut assignments = Vec::with_capacity(dataset.len());
        for record in dataset {
            let key = (
                axis_label(record, &spec.categorical_axis),
                spec.secondary_axis
                    .as_deref()
                    .map(|column| axis_label(record, column)),
            );
            let slot = match index.get(&key) {
                Some(slot) => *slot,
                None => {
                    let slot = keys.len();
                    index.insert(key.clone(), slot);
                    keys.push(key);
                    slot
                }
            };
            assignments.push(slot);
        }
        Self { keys, assignments }
    }

    fn len(&self) -> usize {
        self.keys.len()
    }

    fn emit(self, spec: &AggregationSpec, folded: Folded) -> Vec<AggregatedRow> {
        self.keys
            .into_iter()
            .zip(folded.values)
            .zip(folded.counts)
            .map(|(((axis, secondary), values), count)| AggregatedRow {
                axis: GroupLabel {
                    column: spec.categorical_axis.clone(),
                    value: axis,
                },
                secondary: spec
                    .secondary_axis
                    .clone()
                    .zip(secondary)
                    .map(|(column, value)| GroupLabel { column, value }),
                measures: spec.measures.iter().cloned().zip(values).collect(),
                count,
            })
            .collect()
    }
}

struct Folded {
    values: Vec<Vec<f64>>,
    counts: Vec<usize>,
}

fn fold_totals(dataset: &Dataset, spec: &AggregationSpec, groups: &Grouping) -> Folded {
    let mut values = vec![vec![0.0; spec.measures.len()]; groups.len()];
    let mut counts = vec![0usize; groups.len()];
    for (record, &group) in dataset.iter().zip(&groups.assignments) {
        counts[group] += 1;
        for (total, measure) in values[group].iter_mut().zip(&spec.measures) {
            *total += measure_value(record, measure);
        }
    }
    if spec.kind == AggregationKind::Average {
        for (totals, &count) in values.iter_mut().zip(&counts) {
            for total in totals.iter_mut() {
                *total /= count as f64;
            }
        }
    }
    Folded { values, counts }
}

fn fold_extrema(dataset: &Dataset, spec: &AggregationSpec, groups: &Grouping) -> Folded {
    let take_max = spec.kind == AggregationKind::Max;
    let seed = if take_max {
        f64::NEG_INFINITY
    } else {
        f64::INFINITY
    };
    let mut values = vec![vec![seed; spec.measures.len()]; groups.len()];
    let mut counts = vec![0usize; groups.len()];
    for (record, &group) in dataset.iter().zip(&groups.assignments) {
        counts[group] += 1;
        for (extremum, measure) in values[group].iter_mut().zip(&spec.measures) {
            let value = measure_value(record, measure);
            *extremum = if take_max {
                extremum.max(value)
            } else {
                extremum.min(value)
            };
        }
    }
    Folded { values, counts }
}

enum SortValue {
    Number(f64),
    Text(String),
}

fn sort_value(row: &AggregatedRow, key: &SortKey) -> SortValue {
    match key {
        SortKey::Axis => match parse_full_number(&row.axis.value) {
            Some(n) => SortValue::number(n),
            None => SortValue::Text(row.axis.value.clone()),
        },
        SortKey::MeasureTotal => SortValue::number(row.measure_total()),
        SortKey::Column(name) => SortValue::number(row.field_number(name)),
    }
}

impl SortValue {
    /// NaN (e.g. `inf + -inf`) sorts as 0.
    fn number(value: f64) -> Self {
        SortValue::Number(if value.is_nan() { 0.0 } else { value })
    }
}

/// Total order over sort keys: numbers (by `total_cmp`) before text, so mixed
/// columns such as `9`, `10`, `1a` never form a cycle.
fn compare_sort_values(left: &SortValue, right: &SortValue) -> Ordering {
    match (left, right) {
        (SortValue::Number(a), SortValue::Number(b)) => a.total_cmp(b),
        (SortValue::Number(_), SortValue::Text(_)) => Ordering::Less,
        (SortValue::Text(_), SortValue::Number(_)) => Ordering::Greater,
        (SortValue::Text(a), SortValue::Text(b)) => compare_text(a, b),
    }
}

/// Case-insensitive ordering; among case variants the lowercase form sorts first.
pub fn compare_text(left: &str, right: &str) -> Ordering {
    left.to_lowercase()
        .cmp(&right.to_lowercase())
        .then_with(|| right.cmp(left))
}

/// Stable sort: rows with equal keys keep their emission order in both
/// directions.
pub fn sort_rows(rows: Vec<AggregatedRow>, sort: &SortSpec) -> Vec<AggregatedRow> {
    let mut keyed: Vec<(SortValue, AggregatedRow)> = rows
        .into_iter()
        .map(|row| (sort_value(&row, &sort.key), row))
        .collect();
    keyed.sort_by(|(a, _), (b, _)| {
        let ordering = compare_sort_values(a, b);
        match sort.order {
            SortOrder::Ascending => ordering,
            SortOrder::Descending => ordering.reverse(),
        }
    });
    keyed.into_iter().map(|(_, row)| row).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows(spec: &AggregationSpec, data: &[(&str, f64)]) -> Vec<AggregatedRow> {
        let dataset = data
            .iter()
            .map(|(axis, value)| {
                let mut record = Record::new();
                record.insert("region".into(), Value::from(*axis));
                record.insert("units".into(), Value::Number(*value));
                record
            })
            .collect();
        try_aggregate(&dataset, spec).expect("aggregate")
    }

    #[test]
    fn spec_validation_rejects_malformed_measures() {
        let base = AggregationSpec::new("region", vec!["units".into(), "units".into()]);
        assert_eq!(
            base.validate(),
            Err(AggregateError::DuplicateMeasure("units".into()))
        );
        let axis_measure = AggregationSpec::new("region", vec!["region".into()]);
        assert!(matches!(
            axis_measure.validate(),
            Err(AggregateError::MeasureIsAxis(_))
        ));
        let reserved = AggregationSpec::new("region", vec!["count".into()]);
        assert!(matches!(
            reserved.validate(),
            Err(AggregateError::ReservedMeasure(_))
        ));
    }

    #[test]
    fn aggregate_swallows_invalid_spec() {
        let mut record = Record::new();
        record.insert("region".into(), Value::from("north"));
        let dataset = Dataset::new(vec![record]);
        let spec = AggregationSpec::new("region", vec!["region".into()]);
        assert!(aggregate(&dataset, &spec).is_empty());
    }

    #[test]
    fn axis_sort_is_numeric_when_labels_are_numbers() {
        let spec = AggregationSpec::new("region", vec!["units".into()])
            .with_sort(SortKey::Axis, SortOrder::Ascending);
        let sorted = rows(&spec, &[("10", 1.0), ("9", 1.0), ("100", 1.0)]);
        let labels: Vec<_> = sorted.iter().map(|r| r.axis.value.as_str()).collect();
        assert_eq!(labels, vec!["9", "10", "100"]);
    }

    #[test]
    fn axis_sort_is_case_insensitive_for_text() {
        let spec = AggregationSpec::new("region", vec!["units".into()])
            .with_sort(SortKey::Axis, SortOrder::Ascending);
        let sorted = rows(&spec, &[("beta", 1.0), ("Alpha", 1.0), ("alpha", 1.0)]);
        let labels: Vec<_> = sorted.iter().map(|r| r.axis.value.as_str()).collect();
        assert_eq!(labels, vec!["alpha", "Alpha", "beta"]);
    }

    #[test]
    fn descending_sort_keeps_ties_in_emission_order() {
        let spec = AggregationSpec::new("region", vec!["units".into()])
            .with_sort(SortKey::Column("units".into()), SortOrder::Descending);
        let sorted = rows(&spec, &[("a", 1.0), ("b", 5.0), ("c", 1.0), ("d", 5.0)]);
        let labels: Vec<_> = sorted.iter().map(|r| r.axis.value.as_str()).collect();
        assert_eq!(labels, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn mixed_axis_labels_put_numbers_before_text() {
        let spec = AggregationSpec::new("region", vec!["units".into()])
            .with_sort(SortKey::Axis, SortOrder::Ascending);
        let sorted = rows(
            &spec,
            &[("1a", 1.0), ("10", 1.0), ("9", 1.0), ("B", 1.0), ("2b", 1.0)],
        );
        let labels: Vec<_> = sorted.iter().map(|r| r.axis.value.as_str()).collect();
        assert_eq!(labels, vec!["9", "10", "1a", "2b", "B"]);
    }

    #[test]
    fn nan_totals_sort_without_panicking() {
        let spec = AggregationSpec::new("region", vec!["units".into()])
            .with_sort(SortKey::MeasureTotal, SortOrder::Descending);
        let sorted = rows(
            &spec,
            &[
                ("a", 1.0),
                ("b", f64::INFINITY),
                ("b", f64::NEG_INFINITY),
                ("c", 3.0),
            ],
        );
        let labels: Vec<_> = sorted.iter().map(|r| r.axis.value.as_str()).collect();
        assert_eq!(labels, vec!["c", "a", "b"]);
        assert!(sorted[2].measure("units").is_some_and(f64::is_nan));
    }

    #[test]
    fn parses_kind_order_and_key_aliases() {
        assert_eq!("avg".parse::<AggregationKind>(), Ok(AggregationKind::Average));
        assert_eq!("DESC".parse::<SortOrder>(), Ok(SortOrder::Descending));
        assert_eq!("y".parse::<SortKey>(), Ok(SortKey::MeasureTotal));
        assert_eq!(
            "units".parse::<SortKey>(),
            Ok(SortKey::Column("units".into()))
        );
        assert!("median".parse::<AggregationKind>().is_err());
    }

    #[test]
    fn serializes_rows_as_flat_chart_points() {
        let spec = AggregationSpec::new("region", vec!["units".into()]);
        let out = rows(&spec, &[("north", 2.0), ("north", 3.0)]);
        let json = serde_json::to_string(&out).expect("serialize");
        assert_eq!(json, r#"[{"region":"north","units":5.0,"count":2}]"#);
    }
}
