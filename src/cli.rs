use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::{
    aggregate::{AggregationKind, SortOrder},
    script::ChartKind,
};

#[derive(Debug, Parser)]
#[command(
    name = "stocklab",
    author,
    version,
    about = "Profile tabular data, aggregate it and plan inventory orders",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Infer column types, null counts and distinct counts
    Profile(ProfileArgs),
    /// Group rows by an axis and aggregate numeric measures
    Aggregate(AggregateArgs),
    /// Recommend purchase orders from daily inventory readings
    Recommend(RecommendArgs),
    /// Print the inventory summary used as chat assistant context
    Insights(InsightsArgs),
    /// Emit a pandas script that reproduces an aggregation
    Script(ScriptArgs),
}

#[derive(Debug, Args)]
pub struct InputArgs {
    /// Input CSV, TSV or JSON file ('-' reads CSV from stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// CSV delimiter character (supports ',', 'tab', ';', '|')
    #[arg(long, value_parser = parse_delimiter)]
    pub delimiter: Option<u8>,
    /// Character encoding of the input file (defaults to utf-8)
    #[arg(long = "input-encoding")]
    pub input_encoding: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProfileArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// Emit the profile as JSON instead of a table
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct AggregationArgs {
    /// Categorical axis column
    #[arg(long = "axis")]
    pub axis: String,
    /// Optional secondary grouping column
    #[arg(long = "group-by")]
    pub group_by: Option<String>,
    /// Numeric measure columns (repeatable or comma-separated)
    #[arg(short = 'm', long = "measure", value_delimiter = ',', required = true)]
    pub measures: Vec<String>,
    /// Aggregation function
    #[arg(long = "agg", value_enum, default_value_t = AggArg::Sum)]
    pub agg: AggArg,
    /// Sort key: `axis`, `total`, or any output column name
    #[arg(long = "sort")]
    pub sort: Option<String>,
    /// Sort direction used with --sort
    #[arg(long = "order", value_enum, default_value_t = OrderArg::Asc)]
    pub order: OrderArg,
}

#[derive(Debug, Args)]
pub struct AggregateArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub aggregation: AggregationArgs,
    /// Drop rows with any missing cell before aggregating
    #[arg(long = "drop-incomplete")]
    pub drop_incomplete: bool,
    /// Output CSV file (a table on stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Emit rows as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RecommendArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML recommendation policy overriding the built-in constants
    #[arg(long)]
    pub policy: Option<PathBuf>,
    /// Date delivery estimates count from (defaults to today)
    #[arg(long = "as-of", value_parser = parse_date)]
    pub as_of: Option<NaiveDate>,
    /// Output CSV file (a table on stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
    /// Emit recommendations as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct InsightsArgs {
    #[command(flatten)]
    pub input: InputArgs,
    /// YAML recommendation policy overriding the built-in constants
    #[arg(long)]
    pub policy: Option<PathBuf>,
    /// Number of representative products to list
    #[arg(long, default_value_t = 10)]
    pub top: usize,
}

#[derive(Debug, Args)]
pub struct ScriptArgs {
    #[command(flatten)]
    pub input: InputArgs,
    #[command(flatten)]
    pub aggregation: AggregationArgs,
    /// Chart type drawn by the script
    #[arg(long = "chart", value_enum, default_value_t = ChartArg::Bar)]
    pub chart: ChartArg,
    /// Columns the script selects (defaults to every input column)
    #[arg(short = 'C', long = "columns", value_delimiter = ',')]
    pub columns: Vec<String>,
    /// Output .py file (stdout if omitted)
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AggArg {
    Sum,
    #[value(aliases = ["avg", "mean"])]
    Average,
    Max,
    Min,
}

impl From<AggArg> for AggregationKind {
    fn from(value: AggArg) -> Self {
        match value {
            AggArg::Sum => AggregationKind::Sum,
            AggArg::Average => AggregationKind::Average,
            AggArg::Max => AggregationKind::Max,
            AggArg::Min => AggregationKind::Min,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OrderArg {
    #[value(alias = "ascending")]
    Asc,
    #[value(alias = "descending")]
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(value: OrderArg) -> Self {
        match value {
            OrderArg::Asc => SortOrder::Ascending,
            OrderArg::Desc => SortOrder::Descending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ChartArg {
    Bar,
    Line,
    Scatter,
}

impl From<ChartArg> for ChartKind {
    fn from(value: ChartArg) -> Self {
        match value {
            ChartArg::Bar => ChartKind::Bar,
            ChartArg::Line => ChartKind::Line,
            ChartArg::Scatter => ChartKind::Scatter,
        }
    }
}

pub fn parse_date(value: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
        .map_err(|err| format!("Invalid date '{value}' (expected YYYY-MM-DD): {err}"))
}

pub fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\t" => Ok(b'\t'),
        "comma" | "," => Ok(b','),
        "|" | "pipe" => Ok(b'|'),
        ";" | "semicolon" => Ok(b';'),
        other => {
            let mut chars = other.chars();
            let first = chars
                .next()
                .ok_or_else(|| "Delimiter cannot be empty".to_string())?;
            if chars.next().is_some() {
                return Err("Delimiter must be a single character".to_string());
            }
            if !first.is_ascii() {
                return Err("Delimiter must be ASCII".to_string());
            }
            Ok(first as u8)
        }
    }
}
