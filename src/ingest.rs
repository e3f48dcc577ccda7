//! Dataset ingestion for the command line.
//!
//! Turns a delimited text file (or a JSON array of objects) into a
//! [`Dataset`]. Spreadsheet containers are out of scope; export them to CSV
//! first.
//!
//! - **Format**: `.json` files are read as record arrays, everything else as
//!   delimited text.
//! - **Delimiter**: `.tsv` means tab, otherwise comma, unless overridden.
//! - **Encoding**: input bytes are decoded via `encoding_rs`, defaulting to
//!   UTF-8. A leading byte-order mark is dropped.
//! - **stdin**: the `-` path reads standard input as delimited text.

use std::{
    fs::File,
    io::{BufReader, Read},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use log::debug;

use crate::data::{Dataset, Record, Value, parse_full_number};

pub const DEFAULT_CSV_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

const BOM: char = '\u{feff}';

pub fn is_dash(path: &Path) -> bool {
    path == Path::new("-")
}

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        Some(value) => Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'")),
        None => Ok(UTF_8),
    }
}

pub fn resolve_input_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match extension(path) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_CSV_DELIMITER,
    })
}

fn extension(path: &Path) -> Option<&str> {
    path.extension().and_then(|ext| ext.to_str())
}

fn is_json(path: &Path) -> bool {
    matches!(extension(path), Some(ext) if ext.eq_ignore_ascii_case("json"))
}

/// Empty cells become `Null`, whole numbers in text become `Number`.
pub fn parse_cell(raw: &str) -> Value {
    if raw.is_empty() {
        return Value::Null;
    }
    match parse_full_number(raw) {
        Some(number) => Value::Number(number),
        None => Value::Text(raw.to_string()),
    }
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if is_dash(path) {
        Ok(Box::new(std::io::stdin().lock()))
    } else {
        let file = File::open(path).with_context(|| format!("Opening input file {path:?}"))?;
        Ok(Box::new(BufReader::new(file)))
    }
}

pub fn load_dataset(
    path: &Path,
    delimiter: Option<u8>,
    encoding: &'static Encoding,
) -> Result<Dataset> {
    let reader = open_input(path)?;
    let dataset = if is_json(path) {
        read_json(reader, encoding).with_context(|| format!("Reading JSON records from {path:?}"))?
    } else {
        let delimiter = resolve_input_delimiter(path, delimiter);
        read_delimited(reader, delimiter, encoding)
            .with_context(|| format!("Reading delimited records from {path:?}"))?
    };
    debug!(
        "Ingested {} row(s) and {} column(s) from {path:?}",
        dataset.len(),
        dataset.columns().len()
    );
    Ok(dataset)
}

fn decode_field(bytes: &[u8], encoding: &'static Encoding) -> Result<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(anyhow!(
            "Failed to decode text with encoding {}",
            encoding.name()
        ));
    }
    Ok(text.into_owned())
}

pub fn read_delimited<R: Read>(
    reader: R,
    delimiter: u8,
    encoding: &'static Encoding,
) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true)
        .from_reader(reader);
    let mut headers = csv_reader
        .byte_headers()
        .context("Reading header row")?
        .iter()
        .map(|field| decode_field(field, encoding))
        .collect::<Result<Vec<_>>>()?;
    if let Some(first) = headers.first_mut()
        && first.starts_with(BOM)
    {
        first.remove(0);
    }

    let mut records = Vec::new();
    for (row_idx, row) in csv_reader.byte_records().enumerate() {
        let row = row.with_context(|| format!("Reading row {}", row_idx + 2))?;
        let mut record = Record::with_capacity(headers.len());
        for (header, field) in headers.iter().zip(row.iter()) {
            let decoded = decode_field(field, encoding)
                .with_context(|| format!("Decoding row {} column '{header}'", row_idx + 2))?;
            record.insert(header.clone(), parse_cell(&decoded));
        }
        records.push(record);
    }
    Ok(Dataset::new(records))
}

pub fn read_json<R: Read>(mut reader: R, encoding: &'static Encoding) -> Result<Dataset> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes).context("Reading JSON input")?;
    let text = decode_field(&bytes, encoding)?;
    let dataset: Dataset = serde_json::from_str(text.trim_start_matches(BOM))
        .context("Parsing JSON array of records")?;
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_rows_become_typed_records() {
        let input = "\u{feff}product;stock;note\nWidget;12;\nGadget;7.5;late\nShort;3\n";
        let dataset = read_delimited(input.as_bytes(), b';', UTF_8).expect("read");
        assert_eq!(dataset.columns(), vec!["product", "stock", "note"]);
        assert_eq!(dataset.value(0, "stock"), Some(&Value::Number(12.0)));
        assert_eq!(dataset.value(0, "note"), Some(&Value::Null));
        assert_eq!(dataset.value(1, "note"), Some(&Value::from("late")));
        assert_eq!(dataset.value(2, "note"), None);
    }

    #[test]
    fn json_input_keeps_record_order() {
        let input = r#"[{"product": "Widget", "stock": 3}, {"product": "Gadget"}]"#;
        let dataset = read_json(input.as_bytes(), UTF_8).expect("read");
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.value(1, "stock"), None);
    }

    #[test]
    fn delimiter_follows_extension_unless_overridden() {
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), None), b'\t');
        assert_eq!(resolve_input_delimiter(Path::new("a.csv"), None), b',');
        assert_eq!(resolve_input_delimiter(Path::new("a.tsv"), Some(b'|')), b'|');
    }

    #[test]
    fn parse_cell_keeps_codes_with_text() {
        assert_eq!(parse_cell("SKU-01"), Value::from("SKU-01"));
        assert_eq!(parse_cell("-4"), Value::Number(-4.0));
        assert_eq!(parse_cell(""), Value::Null);
    }
}
