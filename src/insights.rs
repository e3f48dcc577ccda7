//! Inventory-wide counts and the plain-text context handed to the chat
//! assistant.

use std::fmt::Write as _;

use serde::Serialize;

use crate::{
    data::round_half_up,
    recommend::{ProductAnalysis, StockStatus},
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InventoryInsights {
    pub total_items: usize,
    /// Products whose minimum available stock rounds to 0.
    pub out_of_stock: usize,
    /// Products in the shortage or caution band.
    pub low_stock: usize,
    pub average_stock_level: i64,
    pub total_scheduled: i64,
}

impl InventoryInsights {
    pub fn from_analyses(analyses: &[ProductAnalysis]) -> Self {
        if analyses.is_empty() {
            return Self::default();
        }
        let count_status = |wanted: &[StockStatus]| {
            analyses
                .iter()
                .filter(|a| wanted.contains(&a.status))
                .count()
        };
        let stock_sum: f64 = analyses
            .iter()
            .map(|a| round_half_up(a.average_stock))
            .sum();
        let scheduled_sum: f64 = analyses
            .iter()
            .map(|a| round_half_up(a.average_scheduled))
            .sum();
        Self {
            total_items: analyses.len(),
            out_of_stock: analyses
                .iter()
                .filter(|a| round_half_up(a.min_available) == 0.0)
                .count(),
            low_stock: count_status(&[StockStatus::Shortage, StockStatus::Caution]),
            average_stock_level: round_half_up(stock_sum / analyses.len() as f64) as i64,
            total_scheduled: round_half_up(scheduled_sum) as i64,
        }
    }
}

/// Prompt context: the insight block followed by up to `top` representative
/// products in grouping order.
pub fn render_summary(analyses: &[ProductAnalysis], top: usize) -> String {
    let insights = InventoryInsights::from_analyses(analyses);
    let mut out = String::new();
    let _ = writeln!(out, "[Inventory insights]");
    let _ = writeln!(out, "total items: {}", insights.total_items);
    let _ = writeln!(out, "out of stock: {}", insights.out_of_stock);
    let _ = writeln!(out, "low stock: {}", insights.low_stock);
    let _ = writeln!(out, "average stock level: {}", insights.average_stock_level);
    let _ = writeln!(out, "total scheduled: {}", insights.total_scheduled);
    if top > 0 && !analyses.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "[Representative products]");
        for analysis in analyses.iter().take(top) {
            let _ = writeln!(
                out,
                "{}: avg stock {}, min available {}, status {}",
                analysis.product,
                round_half_up(analysis.average_stock),
                round_half_up(analysis.min_available),
                analysis.status
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        inventory::{ProductSeries, ProductSeriesMap},
        policy::RecommendationPolicy,
        recommend::analyze,
    };

    fn analyses() -> Vec<ProductAnalysis> {
        let mut products = ProductSeriesMap::new();
        products.insert(
            "Scale".into(),
            ProductSeries::new(vec![10.0, 11.0], vec![0.0, 8.0], vec![2.0, 3.0]).expect("series"),
        );
        products.insert(
            "Band".into(),
            ProductSeries::new(vec![20.0, 20.0], vec![10.0, 4.0], vec![1.0, 1.0]).expect("series"),
        );
        products.insert(
            "Clip".into(),
            ProductSeries::new(vec![5.0], vec![5.0], vec![0.0]).expect("series"),
        );
        analyze(&products, &RecommendationPolicy::default())
    }

    #[test]
    fn insights_count_statuses_and_round_averages() {
        let insights = InventoryInsights::from_analyses(&analyses());
        assert_eq!(insights.total_items, 3);
        assert_eq!(insights.out_of_stock, 1);
        assert_eq!(insights.low_stock, 1);
        // round(10.5)=11, 20, 5 -> 36 / 3 = 12
        assert_eq!(insights.average_stock_level, 12);
        // round(2.5)=3, 1, 0
        assert_eq!(insights.total_scheduled, 4);
    }

    #[test]
    fn summary_lists_representative_products() {
        let text = render_summary(&analyses(), 2);
        assert!(text.contains("total items: 3"));
        assert!(text.contains("Scale: avg stock 11, min available 0, status out-of-stock"));
        assert!(text.contains("Band: avg stock 20, min available 4, status shortage"));
        assert!(!text.contains("Clip:"));
    }

    #[test]
    fn out_of_stock_counts_minimums_that_round_to_zero() {
        let mut products = ProductSeriesMap::new();
        products.insert(
            "Nearly".into(),
            ProductSeries::new(vec![10.0, 10.0], vec![0.4, 8.0], vec![0.0, 0.0]).expect("series"),
        );
        products.insert(
            "Half".into(),
            ProductSeries::new(vec![10.0], vec![0.5], vec![0.0]).expect("series"),
        );
        let analyses = analyze(&products, &RecommendationPolicy::default());
        assert_eq!(analyses[0].status, StockStatus::Shortage);
        let insights = InventoryInsights::from_analyses(&analyses);
        assert_eq!(insights.out_of_stock, 1);
    }

    #[test]
    fn empty_inventory_yields_zero_insights() {
        assert_eq!(InventoryInsights::from_analyses(&[]), InventoryInsights::default());
    }
}
