//! Linear undo/redo log of dataset snapshots.
//!
//! Pushing after an undo discards every snapshot ahead of the cursor. Undo
//! and redo clamp at the ends of the log.

use log::debug;

use crate::data::{Dataset, Record, is_missing_in};

static EMPTY: Dataset = Dataset::empty();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transform {
    /// Keep only rows where every schema column holds a value.
    DropIncompleteRows,
    /// Project every row onto the listed columns, in the listed order.
    SelectColumns(Vec<String>),
}

impl Transform {
    pub fn apply(&self, dataset: &Dataset) -> Dataset {
        match self {
            Transform::DropIncompleteRows => {
                let columns: Vec<String> =
                    dataset.columns().into_iter().map(str::to_string).collect();
                dataset.filter(|record| {
                    columns.iter().all(|column| !is_missing_in(record, column))
                        && record.values().all(|value| !value.is_missing())
                })
            }
            Transform::SelectColumns(columns) => dataset
                .iter()
                .map(|record| {
                    columns
                        .iter()
                        .filter_map(|column| {
                            record
                                .get(column)
                                .map(|value| (column.clone(), value.clone()))
                        })
                        .collect::<Record>()
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct History {
    snapshots: Vec<Dataset>,
    cursor: usize,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_initial(dataset: Dataset) -> Self {
        Self {
            snapshots: vec![dataset],
            cursor: 0,
        }
    }

    pub fn push(&mut self, dataset: Dataset) {
        if !self.snapshots.is_empty() {
            let discarded = self.snapshots.len() - (self.cursor + 1);
            if discarded > 0 {
                debug!("Discarding {discarded} redo snapshot(s)");
            }
            self.snapshots.truncate(self.cursor + 1);
        }
        self.snapshots.push(dataset);
        self.cursor = self.snapshots.len() - 1;
    }

    pub fn current(&self) -> &Dataset {
        self.snapshots.get(self.cursor).unwrap_or(&EMPTY)
    }

    pub fn undo(&mut self) -> bool {
        if self.can_undo() {
            self.cursor -= 1;
            true
        } else {
            false
        }
    }

    pub fn redo(&mut self) -> bool {
        if self.can_redo() {
            self.cursor += 1;
            true
        } else {
            false
        }
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Applies `transform` to the current snapshot and pushes the result.
    pub fn apply(&mut self, transform: &Transform) -> &Dataset {
        let next = transform.apply(self.current());
        debug!(
            "{transform:?}: {} -> {} row(s)",
            self.current().len(),
            next.len()
        );
        self.push(next);
        self.current()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn position(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Value;

    fn dataset(rows: &[&[(&str, Value)]]) -> Dataset {
        rows.iter()
            .map(|pairs| {
                pairs
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.clone()))
                    .collect::<Record>()
            })
            .collect()
    }

    #[test]
    fn drop_incomplete_rows_treats_absent_keys_as_missing() {
        let data = dataset(&[
            &[("a", Value::Number(1.0)), ("b", Value::from("x"))],
            &[("a", Value::Number(2.0))],
            &[("a", Value::Number(3.0)), ("b", Value::from(""))],
            &[("a", Value::Number(0.0)), ("b", Value::from("y"))],
        ]);
        let cleaned = Transform::DropIncompleteRows.apply(&data);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.value(1, "a"), Some(&Value::Number(0.0)));
    }

    #[test]
    fn select_columns_reorders_and_skips_absent_keys() {
        let data = dataset(&[&[("a", Value::Number(1.0)), ("b", Value::from("x"))]]);
        let projected =
            Transform::SelectColumns(vec!["b".into(), "zz".into(), "a".into()]).apply(&data);
        assert_eq!(projected.columns(), vec!["b", "a"]);
    }

    #[test]
    fn empty_history_reports_empty_dataset() {
        let mut history = History::new();
        assert!(history.current().is_empty());
        assert!(!history.undo());
        assert!(!history.redo());
    }
}
