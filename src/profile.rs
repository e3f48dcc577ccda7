//! Column profiling for arbitrary record datasets.
//!
//! Type inference is a single-sample heuristic: only the first non-missing
//! value of a column is inspected. Remaining values are not validated
//! against the inferred type.

use std::{collections::HashSet, fmt};

use serde::{Deserialize, Serialize};

use crate::data::{Dataset, Value, looks_like_datetime};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InferredType {
    Integer,
    Float,
    String,
    Datetime,
}

impl InferredType {
    pub fn is_numeric(self) -> bool {
        matches!(self, InferredType::Integer | InferredType::Float)
    }

    fn infer(sample: Option<&Value>) -> Self {
        match sample {
            Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0 => InferredType::Integer,
            Some(Value::Number(_)) => InferredType::Float,
            Some(Value::Text(s)) if looks_like_datetime(s) => InferredType::Datetime,
            _ => InferredType::String,
        }
    }
}

impl fmt::Display for InferredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            InferredType::Integer => "integer",
            InferredType::Float => "float",
            InferredType::String => "string",
            InferredType::Datetime => "datetime",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnProfile {
    pub name: String,
    pub inferred_type: InferredType,
    pub null_count: usize,
    pub unique_count: usize,
}

/// Distinct-value key. Numbers and text never collide, so `1` and `"1"`
/// count as two values.
#[derive(Debug, PartialEq, Eq, Hash)]
enum DistinctKey<'a> {
    Number(u64),
    Text(&'a str),
}

impl<'a> DistinctKey<'a> {
    fn of(value: &'a Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Text(s) if s.is_empty() => None,
            Value::Text(s) => Some(DistinctKey::Text(s)),
            Value::Number(n) => {
                let canonical = if *n == 0.0 {
                    0.0
                } else if n.is_nan() {
                    f64::NAN
                } else {
                    *n
                };
                Some(DistinctKey::Number(canonical.to_bits()))
            }
        }
    }
}

pub fn profile(dataset: &Dataset) -> Vec<ColumnProfile> {
    dataset
        .columns()
        .into_iter()
        .map(|column| profile_column(dataset, column))
        .collect()
}

fn profile_column(dataset: &Dataset, column: &str) -> ColumnProfile {
    let mut null_count = 0usize;
    let mut distinct = HashSet::new();
    let mut sample = None;
    for record in dataset {
        match record.get(column).and_then(DistinctKey::of) {
            Some(key) => {
                if sample.is_none() {
                    sample = record.get(column);
                }
                distinct.insert(key);
            }
            None => null_count += 1,
        }
    }
    ColumnProfile {
        name: column.to_string(),
        inferred_type: InferredType::infer(sample),
        null_count,
        unique_count: distinct.len(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub missing_cells: usize,
}

impl DatasetSummary {
    pub fn from_profiles(dataset: &Dataset, profiles: &[ColumnProfile]) -> Self {
        Self {
            rows: dataset.len(),
            columns: profiles.len(),
            missing_cells: profiles.iter().map(|p| p.null_count).sum(),
        }
    }
}

/// Default chart selection: first text column as the axis, first numeric
/// column as the measure.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AxisSuggestion {
    pub axis: Option<String>,
    pub measure: Option<String>,
}

pub fn suggest_axes(profiles: &[ColumnProfile]) -> AxisSuggestion {
    AxisSuggestion {
        axis: profiles
            .iter()
            .find(|p| p.inferred_type == InferredType::String)
            .map(|p| p.name.clone()),
        measure: profiles
            .iter()
            .find(|p| p.inferred_type.is_numeric())
            .map(|p| p.name.clone()),
    }
}
