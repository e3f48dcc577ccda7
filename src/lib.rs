pub mod aggregate;
pub mod cli;
pub mod data;
pub mod export;
pub mod history;
pub mod ingest;
pub mod insights;
pub mod inventory;
pub mod policy;
pub mod profile;
pub mod recommend;
pub mod script;
pub mod session;
pub mod table;

use std::{env, io::Write, path::Path, sync::OnceLock};

use anyhow::{Context, Result, bail};
use chrono::Local;
use clap::Parser;
use log::{LevelFilter, debug, info};

use crate::{
    aggregate::{AggregationSpec, SortKey, try_aggregate},
    cli::{AggregationArgs, Cli, Commands, InputArgs},
    data::{Dataset, format_number},
    history::Transform,
    inventory::has_inventory_columns,
    policy::RecommendationPolicy,
    profile::{DatasetSummary, suggest_axes},
    script::{ScriptOptions, render_script},
    session::Session,
};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("stocklab", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Profile(args) => handle_profile(&args),
        Commands::Aggregate(args) => handle_aggregate(&args),
        Commands::Recommend(args) => handle_recommend(&args),
        Commands::Insights(args) => handle_insights(&args),
        Commands::Script(args) => handle_script(&args),
    }
}

fn load_session(input: &InputArgs) -> Result<Session> {
    let encoding = ingest::resolve_encoding(input.input_encoding.as_deref())?;
    let delimiter = ingest::resolve_input_delimiter(&input.input, input.delimiter);
    info!(
        "Reading '{}' with delimiter '{}' and encoding {}",
        input.input.display(),
        printable_delimiter(delimiter),
        encoding.name()
    );
    let dataset = ingest::load_dataset(&input.input, input.delimiter, encoding)?;
    let file_name = if ingest::is_dash(&input.input) {
        None
    } else {
        input
            .input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
    };
    let mut session = Session::new();
    session.load(dataset, file_name);
    Ok(session)
}

fn load_policy(path: Option<&Path>) -> Result<RecommendationPolicy> {
    match path {
        Some(path) => RecommendationPolicy::load(path),
        None => Ok(RecommendationPolicy::default()),
    }
}

fn build_spec(args: &AggregationArgs) -> Result<AggregationSpec> {
    let measures = args
        .measures
        .iter()
        .map(|m| m.trim())
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect::<Vec<_>>();
    let mut spec = AggregationSpec::new(args.axis.trim(), measures).with_kind(args.agg.into());
    if let Some(group_by) = args.group_by.as_deref().map(str::trim)
        && !group_by.is_empty()
    {
        spec = spec.with_secondary(group_by);
    }
    if let Some(sort) = &args.sort {
        let key: SortKey = sort.parse().with_context(|| format!("Parsing sort key '{sort}'"))?;
        spec = spec.with_sort(key, args.order.into());
    }
    spec.validate().context("Validating aggregation")?;
    debug!("Aggregation spec: {spec:?}");
    Ok(spec)
}

fn write_json<T: serde::Serialize + ?Sized>(output: Option<&Path>, value: &T) -> Result<()> {
    let mut writer = export::open_output(output)?;
    serde_json::to_writer_pretty(&mut writer, value).context("Serializing JSON output")?;
    writeln!(writer).context("Writing JSON output")?;
    writer.flush().context("Flushing JSON output")?;
    Ok(())
}

fn handle_profile(args: &cli::ProfileArgs) -> Result<()> {
    let session = load_session(&args.input)?;
    let profiles = session.profile();
    let summary = DatasetSummary::from_profiles(session.active(), &profiles);
    if args.json {
        let payload = serde_json::json!({ "summary": summary, "columns": profiles });
        return write_json(None, &payload);
    }

    let headers = ["column", "type", "nulls", "unique"]
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = profiles
        .iter()
        .map(|p| {
            vec![
                p.name.clone(),
                p.inferred_type.to_string(),
                p.null_count.to_string(),
                p.unique_count.to_string(),
            ]
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    println!(
        "{} row(s), {} column(s), {} missing cell(s)",
        summary.rows, summary.columns, summary.missing_cells
    );
    let suggestion = suggest_axes(&profiles);
    if let (Some(axis), Some(measure)) = (&suggestion.axis, &suggestion.measure) {
        println!("suggested chart: --axis {axis} --measure {measure}");
    }
    Ok(())
}

fn handle_aggregate(args: &cli::AggregateArgs) -> Result<()> {
    let spec = build_spec(&args.aggregation)?;
    let mut session = load_session(&args.input)?;
    if args.drop_incomplete {
        let before = session.active().len();
        let after = session.apply(&Transform::DropIncompleteRows).len();
        info!("Dropped {} incomplete row(s)", before - after);
    }
    let rows = try_aggregate(session.active(), &spec)
        .with_context(|| format!("Aggregating on '{}'", spec.categorical_axis))?;
    info!(
        "Aggregated {} row(s) into {} group(s) using {}",
        session.active().len(),
        rows.len(),
        spec.kind
    );

    if args.json {
        return write_json(args.output.as_deref(), &rows);
    }
    if let Some(path) = &args.output {
        let writer = export::open_output(Some(path))?;
        export::write_aggregated_rows(writer, &spec, &rows)
            .with_context(|| format!("Writing aggregation to {path:?}"))?;
        info!("Wrote {} group(s) to {path:?}", rows.len());
        return Ok(());
    }

    let mut headers = vec![spec.categorical_axis.clone()];
    headers.extend(spec.secondary_axis.clone());
    headers.extend(spec.measures.iter().cloned());
    headers.push(aggregate::COUNT_FIELD.to_string());
    let table_rows = rows
        .iter()
        .map(|row| {
            let mut cells = vec![row.axis.value.clone()];
            cells.extend(row.secondary.as_ref().map(|label| label.value.clone()));
            cells.extend(
                spec.measures
                    .iter()
                    .map(|m| row.measure(m).map(format_number).unwrap_or_default()),
            );
            cells.push(row.count.to_string());
            cells
        })
        .collect::<Vec<_>>();
    table::print_table(&headers, &table_rows);
    Ok(())
}

fn handle_recommend(args: &cli::RecommendArgs) -> Result<()> {
    let policy = load_policy(args.policy.as_deref())?;
    let session = load_session(&args.input)?;
    ensure_inventory(session.active())?;
    let products = session.product_series();
    if products.is_empty() {
        bail!("No product names found in {:?}", args.input.input);
    }
    let today = args.as_of.unwrap_or_else(|| Local::now().date_naive());
    let recommendations = session.recommend_as_of(today, &policy);
    info!(
        "{} recommendation(s) for {} product(s) as of {today}",
        recommendations.len(),
        products.len()
    );

    if args.json {
        return write_json(args.output.as_deref(), &recommendations);
    }
    if let Some(path) = &args.output {
        let writer = export::open_output(Some(path))?;
        export::write_recommendations(writer, &recommendations)
            .with_context(|| format!("Writing recommendations to {path:?}"))?;
        info!("Wrote {} recommendation(s) to {path:?}", recommendations.len());
        return Ok(());
    }

    let headers = export::RECOMMENDATION_HEADERS
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let rows = recommendations
        .iter()
        .map(|rec| export::recommendation_fields(rec).to_vec())
        .collect::<Vec<_>>();
    table::print_table(&headers, &rows);
    Ok(())
}

fn handle_insights(args: &cli::InsightsArgs) -> Result<()> {
    let policy = load_policy(args.policy.as_deref())?;
    let session = load_session(&args.input)?;
    ensure_inventory(session.active())?;
    let analyses = session.analyze(&policy);
    print!("{}", insights::render_summary(&analyses, args.top));
    Ok(())
}

fn handle_script(args: &cli::ScriptArgs) -> Result<()> {
    let spec = build_spec(&args.aggregation)?;
    let session = load_session(&args.input)?;
    let selected_columns = if args.columns.is_empty() {
        session
            .active()
            .columns()
            .into_iter()
            .map(str::to_string)
            .collect()
    } else {
        args.columns.clone()
    };
    let options = ScriptOptions {
        data_file: session.data_file_name().to_string(),
        selected_columns,
        chart: args.chart.into(),
    };
    let script = render_script(&spec, &options);
    let mut writer = export::open_output(args.output.as_deref())?;
    writer
        .write_all(script.as_bytes())
        .context("Writing analysis script")?;
    writer.flush().context("Flushing analysis script")?;
    if let Some(path) = &args.output {
        info!("Analysis script written to {path:?}");
    }
    Ok(())
}

fn ensure_inventory(dataset: &Dataset) -> Result<()> {
    if !has_inventory_columns(dataset) {
        bail!(
            "Input has no inventory columns; expected a product column and stock readings \
             (e.g. product, stock, available, scheduled)"
        );
    }
    Ok(())
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
