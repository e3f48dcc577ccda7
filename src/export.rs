//! Delimited text export for spreadsheet readers.
//!
//! Every export is UTF-8 with a leading byte-order mark, one header row and
//! a fixed column order.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use anyhow::{Context, Result};

use crate::{
    aggregate::{AggregatedRow, AggregationSpec, COUNT_FIELD},
    data::{Dataset, format_number, round_half_up},
    recommend::Recommendation,
};

pub const UTF8_BOM: &str = "\u{feff}";

pub const RECOMMENDATION_HEADERS: [&str; 8] = [
    "product",
    "current_stock",
    "min_available",
    "recommended_order",
    "priority",
    "estimated_delivery",
    "reason",
    "trend",
];

/// Opens `path` for writing, or stdout when `path` is absent or `-`.
pub fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(p) if p != Path::new("-") => Ok(Box::new(BufWriter::new(
            File::create(p).with_context(|| format!("Creating output file {p:?}"))?,
        ))),
        _ => Ok(Box::new(std::io::stdout())),
    }
}

fn bom_writer<W: Write>(mut writer: W) -> Result<csv::Writer<W>> {
    writer
        .write_all(UTF8_BOM.as_bytes())
        .context("Writing byte-order mark")?;
    Ok(csv::WriterBuilder::new()
        .quote_style(csv::QuoteStyle::Necessary)
        .from_writer(writer))
}

pub fn write_aggregated_rows<W: Write>(
    writer: W,
    spec: &AggregationSpec,
    rows: &[AggregatedRow],
) -> Result<()> {
    let mut csv_writer = bom_writer(writer)?;
    let mut headers = vec![spec.categorical_axis.as_str()];
    headers.extend(spec.secondary_axis.as_deref());
    headers.extend(spec.measures.iter().map(String::as_str));
    headers.push(COUNT_FIELD);
    csv_writer.write_record(&headers).context("Writing header row")?;

    for row in rows {
        let mut fields = vec![row.axis.value.clone()];
        fields.extend(row.secondary.as_ref().map(|label| label.value.clone()));
        fields.extend(
            spec.measures
                .iter()
                .map(|name| row.measure(name).map(format_number).unwrap_or_default()),
        );
        fields.push(row.count.to_string());
        csv_writer.write_record(&fields).context("Writing aggregated row")?;
    }
    csv_writer.flush().context("Flushing aggregated rows")?;
    Ok(())
}

pub fn write_recommendations<W: Write>(writer: W, recommendations: &[Recommendation]) -> Result<()> {
    let mut csv_writer = bom_writer(writer)?;
    csv_writer
        .write_record(RECOMMENDATION_HEADERS)
        .context("Writing header row")?;
    for rec in recommendations {
        csv_writer
            .write_record(recommendation_fields(rec))
            .with_context(|| format!("Writing recommendation for '{}'", rec.product))?;
    }
    csv_writer.flush().context("Flushing recommendations")?;
    Ok(())
}

pub fn recommendation_fields(rec: &Recommendation) -> [String; 8] {
    [
        rec.product.clone(),
        format_number(round_half_up(rec.average_stock)),
        format_number(round_half_up(rec.min_available)),
        rec.recommended_order_quantity.to_string(),
        rec.priority.to_string(),
        rec.estimated_delivery_date.format("%Y-%m-%d").to_string(),
        rec.reason.to_string(),
        format!("{:.1}%", rec.trend_percent),
    ]
}

/// Writes `columns` of every record; absent cells are left empty.
pub fn write_columns<W: Write>(writer: W, dataset: &Dataset, columns: &[String]) -> Result<()> {
    let mut csv_writer = bom_writer(writer)?;
    csv_writer.write_record(columns).context("Writing header row")?;
    for (row_idx, record) in dataset.iter().enumerate() {
        let fields = columns
            .iter()
            .map(|column| record.get(column).map(|v| v.as_display()).unwrap_or_default());
        csv_writer
            .write_record(fields)
            .with_context(|| format!("Writing row {}", row_idx + 1))?;
    }
    csv_writer.flush().context("Flushing dataset rows")?;
    Ok(())
}
