//! Per-product stock analysis and order recommendations.
//!
//! Each product's readings reduce to a [`ProductAnalysis`] (averages,
//! extremes, net trend, urgency and status). Products that need an order or
//! deserve attention become a [`Recommendation`]; healthy, flat products are
//! left out. Division guards return 0 so no NaN or infinity leaks into
//! scores.

use std::fmt;

use chrono::{Days, Local, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    inventory::{ProductSeries, ProductSeriesMap},
    policy::RecommendationPolicy,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    Normal,
    Caution,
    Shortage,
    OutOfStock,
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StockStatus::Normal => "normal",
            StockStatus::Caution => "caution",
            StockStatus::Shortage => "shortage",
            StockStatus::OutOfStock => "out-of-stock",
        })
    }
}

/// Declared most urgent first, so the derived `Ord` sorts `High` before `Low`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderReason {
    ShortageRisk,
    DecliningTrend,
    SafetyStockGap,
    ReorderPoint,
    Healthy,
}

impl fmt::Display for OrderReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OrderReason::ShortageRisk => "Available stock dropping sharply",
            OrderReason::DecliningTrend => "Stock trending down",
            OrderReason::SafetyStockGap => "Safety stock top-up needed",
            OrderReason::ReorderPoint => "Regular reorder point",
            OrderReason::Healthy => "Stock level normal",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProductAnalysis {
    pub product: String,
    pub average_stock: f64,
    pub average_available: f64,
    pub min_available: f64,
    pub max_stock: f64,
    pub average_scheduled: f64,
    pub trend_percent: f64,
    pub stock_ratio: f64,
    pub urgency_score: f64,
    pub status: StockStatus,
    pub data_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub product: String,
    pub average_stock: f64,
    pub min_available: f64,
    pub max_stock: f64,
    pub recommended_order_quantity: u64,
    pub priority: Priority,
    pub reason: OrderReason,
    pub estimated_delivery_date: NaiveDate,
    pub trend_percent: f64,
    pub status: StockStatus,
    pub urgency_score: f64,
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn minimum(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::min).unwrap_or(0.0)
}

fn maximum(values: &[f64]) -> f64 {
    values.iter().copied().reduce(f64::max).unwrap_or(0.0)
}

/// Net movement between the first and last stock reading, in percent.
pub fn trend_percent(stock: &[f64]) -> f64 {
    match (stock.first(), stock.last()) {
        (Some(&first), Some(&last)) if first != 0.0 => (last - first) / first * 100.0,
        _ => 0.0,
    }
}

pub fn analyze_product(
    product: &str,
    series: &ProductSeries,
    policy: &RecommendationPolicy,
) -> ProductAnalysis {
    let average_stock = mean(series.stock());
    let average_available = mean(series.available());
    let min_available = minimum(series.available());
    let trend = trend_percent(series.stock());

    let stock_ratio = if average_available > 0.0 {
        min_available / average_available
    } else {
        0.0
    };
    let trend_factor = if trend < 0.0 {
        trend.abs() / policy.trend_divisor
    } else {
        0.0
    };
    let urgency_score =
        (1.0 - stock_ratio) * policy.shortage_weight + trend_factor * policy.trend_weight;

    let status = if min_available == 0.0 {
        StockStatus::OutOfStock
    } else if min_available < policy.shortage_ratio * average_available {
        StockStatus::Shortage
    } else if min_available < policy.caution_ratio * average_available {
        StockStatus::Caution
    } else {
        StockStatus::Normal
    };

    ProductAnalysis {
        product: product.to_string(),
        average_stock,
        average_available,
        min_available,
        max_stock: maximum(series.stock()),
        average_scheduled: mean(series.scheduled()),
        trend_percent: trend,
        stock_ratio,
        urgency_score,
        status,
        data_points: series.len(),
    }
}

pub fn analyze(products: &ProductSeriesMap, policy: &RecommendationPolicy) -> Vec<ProductAnalysis> {
    products
        .iter()
        .map(|(product, series)| analyze_product(product, series, policy))
        .collect()
}

/// Units needed to lift the lowest observed availability to the safety
/// stock target, before the minimum order floor.
pub fn order_gap(analysis: &ProductAnalysis, policy: &RecommendationPolicy) -> u64 {
    let safety_stock = analysis.average_available * policy.safety_factor;
    (safety_stock - analysis.min_available).ceil().max(0.0) as u64
}

/// First matching rule wins: shortage risk, falling trend, caution band,
/// then any positive order gap.
pub fn prioritize(
    analysis: &ProductAnalysis,
    order_gap: u64,
    policy: &RecommendationPolicy,
) -> (Priority, OrderReason) {
    let min = analysis.min_available;
    let avg = analysis.average_available;
    if min < avg * policy.shortage_ratio {
        (Priority::High, OrderReason::ShortageRisk)
    } else if analysis.trend_percent < policy.trend_alert_percent {
        (Priority::High, OrderReason::DecliningTrend)
    } else if min < avg * policy.caution_ratio {
        (Priority::Medium, OrderReason::SafetyStockGap)
    } else if order_gap > 0 {
        (Priority::Medium, OrderReason::ReorderPoint)
    } else {
        (Priority::Low, OrderReason::Healthy)
    }
}

pub fn recommend_product(
    analysis: &ProductAnalysis,
    today: NaiveDate,
    policy: &RecommendationPolicy,
) -> Option<Recommendation> {
    let gap = order_gap(analysis, policy);
    let (priority, reason) = prioritize(analysis, gap, policy);
    if gap == 0 && priority == Priority::Low {
        return None;
    }
    let lead_time = policy.lead_time_days(priority);
    let estimated_delivery_date = today.checked_add_days(Days::new(lead_time)).unwrap_or(today);
    Some(Recommendation {
        product: analysis.product.clone(),
        average_stock: analysis.average_stock,
        min_available: analysis.min_available,
        max_stock: analysis.max_stock,
        recommended_order_quantity: gap.max(policy.minimum_order),
        priority,
        reason,
        estimated_delivery_date,
        trend_percent: analysis.trend_percent,
        status: analysis.status,
        urgency_score: analysis.urgency_score,
    })
}

/// Recommendations ordered high, medium, low; products keep their grouping
/// order within a tier.
pub fn recommend_as_of(
    products: &ProductSeriesMap,
    today: NaiveDate,
    policy: &RecommendationPolicy,
) -> Vec<Recommendation> {
    let mut recommendations: Vec<Recommendation> = analyze(products, policy)
        .iter()
        .filter_map(|analysis| recommend_product(analysis, today, policy))
        .collect();
    recommendations.sort_by_key(|rec| rec.priority);
    debug!(
        "{} of {} product(s) need attention",
        recommendations.len(),
        products.len()
    );
    recommendations
}

pub fn recommend(products: &ProductSeriesMap) -> Vec<Recommendation> {
    recommend_as_of(
        products,
        Local::now().date_naive(),
        &RecommendationPolicy::default(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(stock: &[f64], available: &[f64]) -> ProductSeries {
        ProductSeries::new(stock.to_vec(), available.to_vec(), vec![0.0; stock.len()])
            .expect("valid series")
    }

    #[test]
    fn trend_uses_first_and_last_reading_only() {
        assert_eq!(trend_percent(&[100.0, 10.0, 500.0, 80.0]), -20.0);
        assert_eq!(trend_percent(&[50.0]), 0.0);
        assert_eq!(trend_percent(&[0.0, 30.0]), 0.0);
        assert_eq!(trend_percent(&[]), 0.0);
    }

    #[test]
    fn status_bands_follow_policy_ratios() {
        let policy = RecommendationPolicy::default();
        let caution = analyze_product("p", &series(&[1.0; 4], &[100.0, 100.0, 75.0, 100.0]), &policy);
        assert_eq!(caution.status, StockStatus::Caution);
        let empty = analyze_product("p", &series(&[1.0; 2], &[0.0, 10.0]), &policy);
        assert_eq!(empty.status, StockStatus::OutOfStock);
        let flat = analyze_product("p", &series(&[1.0; 2], &[10.0, 10.0]), &policy);
        assert_eq!(flat.status, StockStatus::Normal);
    }

    #[test]
    fn urgency_combines_shortfall_and_falling_trend() {
        let policy = RecommendationPolicy::default();
        let analysis = analyze_product("p", &series(&[100.0, 80.0], &[50.0, 50.0]), &policy);
        assert!((analysis.urgency_score - 0.6).abs() < 1e-9);
        let zero = analyze_product("p", &series(&[0.0, 0.0], &[0.0, 0.0]), &policy);
        assert_eq!(zero.stock_ratio, 0.0);
        assert!((zero.urgency_score - 0.7).abs() < 1e-9);
    }

    #[test]
    fn falling_trend_escalates_without_shortfall() {
        let policy = RecommendationPolicy::default();
        let analysis = analyze_product("p", &series(&[100.0, 90.0], &[40.0, 40.0]), &policy);
        let gap = order_gap(&analysis, &policy);
        assert_eq!(gap, 8);
        assert_eq!(
            prioritize(&analysis, gap, &policy),
            (Priority::High, OrderReason::DecliningTrend)
        );
    }

    #[test]
    fn delivery_date_adds_lead_time() {
        let policy = RecommendationPolicy::default();
        let today = NaiveDate::from_ymd_opt(2024, 2, 27).expect("date");
        let analysis = analyze_product("p", &series(&[10.0, 10.0], &[100.0, 40.0]), &policy);
        let rec = recommend_product(&analysis, today, &policy).expect("recommended");
        assert_eq!(rec.priority, Priority::High);
        assert_eq!(
            rec.estimated_delivery_date,
            NaiveDate::from_ymd_opt(2024, 2, 29).expect("date")
        );
    }
}
