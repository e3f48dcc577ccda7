//! Fixed-width console tables for profile, aggregate and recommend output.

use std::{borrow::Cow, fmt::Write as _};

use crate::data::parse_full_number;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Align {
    Left,
    Right,
}

/// Columns whose non-empty cells are all numeric are right-aligned.
pub fn infer_alignment(column_count: usize, rows: &[Vec<String>]) -> Vec<Align> {
    (0..column_count)
        .map(|idx| {
            let mut cells = rows
                .iter()
                .filter_map(|row| row.get(idx))
                .filter(|cell| !cell.is_empty())
                .peekable();
            if cells.peek().is_none() {
                return Align::Left;
            }
            if cells.all(|cell| parse_full_number(cell.trim_end_matches('%')).is_some()) {
                Align::Right
            } else {
                Align::Left
            }
        })
        .collect()
}

pub fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let alignment = infer_alignment(headers.len(), rows);
    let mut widths = headers
        .iter()
        .map(|h| display_width(h).max(1))
        .collect::<Vec<_>>();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(display_width(&sanitize_cell(cell)));
        }
    }

    let mut output = String::new();
    let _ = writeln!(output, "{}", format_row(headers, &widths, &alignment));
    let rule = widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>();
    let _ = writeln!(output, "{}", format_row(&rule, &widths, &alignment));
    for row in rows {
        let _ = writeln!(output, "{}", format_row(row, &widths, &alignment));
    }
    output
}

pub fn print_table(headers: &[String], rows: &[Vec<String>]) {
    print!("{}", render_table(headers, rows));
}

fn format_row(values: &[String], widths: &[usize], alignment: &[Align]) -> String {
    let line = widths
        .iter()
        .enumerate()
        .map(|(idx, width)| {
            let cell = values.get(idx).map(|v| sanitize_cell(v)).unwrap_or_default();
            let padding = " ".repeat(width.saturating_sub(display_width(&cell)));
            match alignment.get(idx) {
                Some(Align::Right) => format!("{padding}{cell}"),
                _ => format!("{cell}{padding}"),
            }
        })
        .collect::<Vec<_>>()
        .join("  ");
    line.trim_end().to_string()
}

fn display_width(value: &str) -> usize {
    value.chars().count()
}

fn sanitize_cell(value: &str) -> Cow<'_, str> {
    if value.contains(['\n', '\r', '\t']) {
        Cow::Owned(value.replace(['\n', '\r', '\t'], " "))
    } else {
        Cow::Borrowed(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn numeric_columns_are_right_aligned() {
        let rendered = render_table(
            &strings(&["product", "stock"]),
            &[strings(&["Widget", "5"]), strings(&["Gadget\nXL", "120"])],
        );
        let lines: Vec<&str> = rendered.lines().collect();
        assert_eq!(lines[0], "product    stock");
        assert_eq!(lines[1], "---------  -----");
        assert_eq!(lines[2], "Widget         5");
        assert_eq!(lines[3], "Gadget XL    120");
    }

    #[test]
    fn percent_cells_count_as_numeric() {
        let alignment = infer_alignment(2, &[strings(&["a", "-12.5%"]), strings(&["b", ""])]);
        assert_eq!(alignment, vec![Align::Left, Align::Right]);
    }
}
