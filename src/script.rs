//! Reproducible pandas analysis script for an aggregation.
//!
//! The script repeats the aggregation outside this tool: it loads the data
//! file, drops rows with missing cells, groups and aggregates, sorts, plots
//! with matplotlib and writes `output.csv`.

use std::{fmt, fmt::Write as _, str::FromStr};

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::aggregate::{AggregationKind, AggregationSpec, SortKey, SortOrder};

pub const SCRIPT_OUTPUT_FILE: &str = "output.csv";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    #[default]
    Bar,
    Line,
    Scatter,
}

impl fmt::Display for ChartKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChartKind::Bar => "bar",
            ChartKind::Line => "line",
            ChartKind::Scatter => "scatter",
        })
    }
}

impl FromStr for ChartKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bar" => Ok(ChartKind::Bar),
            "line" => Ok(ChartKind::Line),
            "scatter" => Ok(ChartKind::Scatter),
            other => Err(format!("Unknown chart kind '{other}'")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOptions {
    pub data_file: String,
    pub selected_columns: Vec<String>,
    pub chart: ChartKind,
}

/// Python single-quoted string literal.
fn py_str(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out.push('\'');
    out
}

fn py_list(values: &[String]) -> String {
    format!("[{}]", values.iter().map(|v| py_str(v)).join(", "))
}

fn pandas_method(kind: AggregationKind) -> &'static str {
    match kind {
        AggregationKind::Sum => "sum()",
        AggregationKind::Average => "mean()",
        AggregationKind::Max => "max()",
        AggregationKind::Min => "min()",
    }
}

/// Column the script sorts on: `total` maps to the first measure, since
/// pandas has no per-row total column.
fn sort_column(spec: &AggregationSpec, key: &SortKey) -> String {
    match key {
        SortKey::Axis => spec.categorical_axis.clone(),
        SortKey::MeasureTotal => spec.measures.first().cloned().unwrap_or_default(),
        SortKey::Column(column) => column.clone(),
    }
}

pub fn render_script(spec: &AggregationSpec, options: &ScriptOptions) -> String {
    let axis = py_str(&spec.categorical_axis);
    let group_by = match &spec.secondary_axis {
        Some(secondary) => py_list(&[spec.categorical_axis.clone(), secondary.clone()]),
        None => axis.clone(),
    };
    let measures = if spec.measures.len() == 1 {
        py_str(&spec.measures[0])
    } else {
        py_list(&spec.measures)
    };
    let first_measure = spec.measures.first().map(String::as_str).unwrap_or_default();

    let mut out = String::new();
    let _ = writeln!(out, "import pandas as pd");
    let _ = writeln!(out, "import matplotlib.pyplot as plt");
    let _ = writeln!(out);
    let _ = writeln!(out, "# Load data");
    let _ = writeln!(out, "df = pd.read_csv({})", py_str(&options.data_file));
    let _ = writeln!(out);
    let _ = writeln!(out, "# Drop rows with missing cells");
    let _ = writeln!(out, "df = df.dropna()");
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "# Selected columns: {}",
        options.selected_columns.iter().join(", ")
    );
    let _ = writeln!(out, "selected_df = df[{}]", py_list(&options.selected_columns));
    let _ = writeln!(out);
    let _ = writeln!(out, "# Group and aggregate");
    let _ = writeln!(
        out,
        "grouped_df = df.groupby({group_by})[{measures}].{}.reset_index()",
        pandas_method(spec.kind)
    );
    if let Some(sort) = &spec.sort {
        let _ = writeln!(out);
        let _ = writeln!(out, "# Sort");
        let _ = writeln!(out, "sort_column = {}", py_str(&sort_column(spec, &sort.key)));
        let _ = writeln!(
            out,
            "grouped_df = grouped_df.sort_values(sort_column, ascending={})",
            if sort.order == SortOrder::Ascending { "True" } else { "False" }
        );
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "# Plot");
    let _ = writeln!(out, "plt.figure(figsize=(12, 6))");
    match options.chart {
        ChartKind::Bar | ChartKind::Line => {
            let _ = writeln!(
                out,
                "grouped_df.plot(x={axis}, y={measures}, kind='{}', ax=plt.gca())",
                options.chart
            );
        }
        ChartKind::Scatter => {
            let _ = writeln!(
                out,
                "plt.scatter(grouped_df[{axis}], grouped_df[{}])",
                py_str(first_measure)
            );
        }
    }
    let _ = writeln!(out, "plt.xlabel({axis})");
    let _ = writeln!(out, "plt.ylabel({})", py_str(&spec.measures.join(", ")));
    let _ = writeln!(
        out,
        "plt.title('Aggregation result ({})')",
        spec.kind.as_str().to_uppercase()
    );
    let _ = writeln!(out, "plt.xticks(rotation=45)");
    let _ = writeln!(out, "plt.tight_layout()");
    let _ = writeln!(out, "plt.legend()");
    let _ = writeln!(out, "plt.show()");
    let _ = writeln!(out);
    let _ = writeln!(out, "# Save result");
    let _ = writeln!(
        out,
        "grouped_df.to_csv({}, index=False)",
        py_str(SCRIPT_OUTPUT_FILE)
    );
    let _ = writeln!(out, "print('Analysis complete')");
    let _ = writeln!(out, "print('Aggregation: {}')", spec.kind.as_str());
    let _ = writeln!(out, "print(f'Rows: {{len(grouped_df)}}')");
    out
}
