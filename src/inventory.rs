//! Inventory reading extraction: column alias resolution and per-product
//! series.
//!
//! Uploaded stock sheets name the same logical column in several languages
//! and casings. [`FIELD_ALIASES`] lists, per logical field, the accepted
//! headers in lookup order; the first alias holding a non-missing value in a
//! row wins.

use indexmap::{IndexMap, map::Entry};
use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::data::{Dataset, Record, Value, coerce_number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InventoryField {
    Product,
    Day,
    Stock,
    Available,
    Scheduled,
}

pub const FIELD_ALIASES: &[(InventoryField, &[&str])] = &[
    (
        InventoryField::Product,
        &[
            "상품명",
            "제품명",
            "품명",
            "product",
            "Product",
            "PRODUCT",
            "product_name",
            "Product Name",
        ],
    ),
    (
        InventoryField::Day,
        &["Day", "day", "DAY", "일차", "날짜", "date", "Date"],
    ),
    (InventoryField::Stock, &["재고", "stock", "Stock", "STOCK"]),
    (
        InventoryField::Available,
        &["가용재고", "available", "Available", "AVAILABLE"],
    ),
    (
        InventoryField::Scheduled,
        &["재고예정", "입고예정", "scheduled", "Scheduled", "SCHEDULED"],
    ),
];

impl InventoryField {
    pub fn aliases(self) -> &'static [&'static str] {
        FIELD_ALIASES
            .iter()
            .find(|(field, _)| *field == self)
            .map(|(_, aliases)| *aliases)
            .unwrap_or(&[])
    }

    /// First alias of this field carrying a non-missing value in `record`.
    pub fn resolve(self, record: &Record) -> Option<&Value> {
        self.aliases()
            .iter()
            .filter_map(|alias| record.get(*alias))
            .find(|value| !value.is_missing())
    }
}

/// Upload structure check: the first record names at least one known column.
pub fn has_inventory_columns(dataset: &Dataset) -> bool {
    let Some(first) = dataset.records().first() else {
        return false;
    };
    FIELD_ALIASES
        .iter()
        .flat_map(|(_, aliases)| aliases.iter())
        .any(|alias| first.contains_key(*alias))
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SeriesError {
    #[error("a product series needs at least one reading")]
    Empty,
    #[error(
        "reading sequences differ in length (stock {stock}, available {available}, scheduled {scheduled})"
    )]
    LengthMismatch {
        stock: usize,
        available: usize,
        scheduled: usize,
    },
}

/// Stock readings of one product in observation order. The three numeric
/// sequences always have the same length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductSeries {
    stock: Vec<f64>,
    available: Vec<f64>,
    scheduled: Vec<f64>,
}

impl ProductSeries {
    pub fn new(
        stock: Vec<f64>,
        available: Vec<f64>,
        scheduled: Vec<f64>,
    ) -> Result<Self, SeriesError> {
        if stock.len() != available.len() || stock.len() != scheduled.len() {
            return Err(SeriesError::LengthMismatch {
                stock: stock.len(),
                available: available.len(),
                scheduled: scheduled.len(),
            });
        }
        if stock.is_empty() {
            return Err(SeriesError::Empty);
        }
        Ok(Self {
            stock,
            available,
            scheduled,
        })
    }

    fn single(stock: f64, available: f64, scheduled: f64) -> Self {
        Self {
            stock: vec![stock],
            available: vec![available],
            scheduled: vec![scheduled],
        }
    }

    fn push(&mut self, stock: f64, available: f64, scheduled: f64) {
        self.stock.push(stock);
        self.available.push(available);
        self.scheduled.push(scheduled);
    }

    pub fn len(&self) -> usize {
        self.stock.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stock.is_empty()
    }

    pub fn stock(&self) -> &[f64] {
        &self.stock
    }

    pub fn available(&self) -> &[f64] {
        &self.available
    }

    pub fn scheduled(&self) -> &[f64] {
        &self.scheduled
    }
}

pub type ProductSeriesMap = IndexMap<String, ProductSeries>;

/// Groups raw readings by product name, appending in record order. Rows
/// without a product name are dropped.
pub fn summarize(dataset: &Dataset) -> ProductSeriesMap {
    let mut products = ProductSeriesMap::new();
    let mut dropped = 0usize;
    for record in dataset {
        let Some(product) = InventoryField::Product.resolve(record) else {
            dropped += 1;
            continue;
        };
        let reading = |field: InventoryField| coerce_number(field.resolve(record));
        let (stock, available, scheduled) = (
            reading(InventoryField::Stock),
            reading(InventoryField::Available),
            reading(InventoryField::Scheduled),
        );
        match products.entry(product.as_display()) {
            Entry::Occupied(mut entry) => entry.get_mut().push(stock, available, scheduled),
            Entry::Vacant(entry) => {
                entry.insert(ProductSeries::single(stock, available, scheduled));
            }
        }
    }
    if dropped > 0 {
        debug!("Dropped {dropped} row(s) without a product name");
    }
    products
}
