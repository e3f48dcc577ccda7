//! Session-scoped workspace state.
//!
//! A [`Session`] owns the active dataset (through its [`History`]) and the
//! name of the file it came from. Every caller works on its own session;
//! nothing here is shared process-wide.

use chrono::NaiveDate;
use log::info;

use crate::{
    aggregate::{AggregatedRow, AggregationSpec, aggregate},
    data::Dataset,
    history::{History, Transform},
    inventory::{ProductSeriesMap, summarize},
    policy::RecommendationPolicy,
    profile::{ColumnProfile, profile},
    recommend::{ProductAnalysis, Recommendation, analyze, recommend_as_of},
};

pub const DEFAULT_DATA_FILE: &str = "data.csv";

#[derive(Debug, Clone, Default)]
pub struct Session {
    file_name: Option<String>,
    history: History,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the active dataset; the history restarts from it.
    pub fn load(&mut self, dataset: Dataset, file_name: Option<String>) {
        info!(
            "Loaded {} row(s) from {}",
            dataset.len(),
            file_name.as_deref().unwrap_or("an unnamed source")
        );
        self.history = History::with_initial(dataset);
        self.file_name = file_name;
    }

    pub fn has_data(&self) -> bool {
        !self.active().is_empty()
    }

    pub fn active(&self) -> &Dataset {
        self.history.current()
    }

    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// File name an exported analysis script should read.
    pub fn data_file_name(&self) -> &str {
        self.file_name().unwrap_or(DEFAULT_DATA_FILE)
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub fn apply(&mut self, transform: &Transform) -> &Dataset {
        self.history.apply(transform)
    }

    pub fn profile(&self) -> Vec<ColumnProfile> {
        profile(self.active())
    }

    pub fn aggregate(&self, spec: &AggregationSpec) -> Vec<AggregatedRow> {
        aggregate(self.active(), spec)
    }

    pub fn product_series(&self) -> ProductSeriesMap {
        summarize(self.active())
    }

    pub fn analyze(&self, policy: &RecommendationPolicy) -> Vec<ProductAnalysis> {
        analyze(&self.product_series(), policy)
    }

    pub fn recommend_as_of(
        &self,
        today: NaiveDate,
        policy: &RecommendationPolicy,
    ) -> Vec<Recommendation> {
        recommend_as_of(&self.product_series(), today, policy)
    }
}
