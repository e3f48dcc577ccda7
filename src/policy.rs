use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::recommend::Priority;

/// Every tunable constant of the order recommendation engine. `Default`
/// carries the production values; a YAML policy file may override any
/// subset of them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecommendationPolicy {
    /// Weight of the shortfall term `1 - min/avg` in the urgency score.
    pub shortage_weight: f64,
    /// Weight of the negative-trend term in the urgency score.
    pub trend_weight: f64,
    /// A falling trend of this many percent adds 1.0 to the trend term.
    pub trend_divisor: f64,
    pub shortage_ratio: f64,
    pub caution_ratio: f64,
    /// Trend percentage below which a product is escalated to high priority.
    pub trend_alert_percent: f64,
    pub safety_factor: f64,
    pub minimum_order: u64,
    pub lead_times: LeadTimes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LeadTimes {
    pub high: u64,
    pub medium: u64,
    pub low: u64,
}

impl Default for LeadTimes {
    fn default() -> Self {
        Self {
            high: 2,
            medium: 5,
            low: 7,
        }
    }
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            shortage_weight: 0.7,
            trend_weight: 0.3,
            trend_divisor: 10.0,
            shortage_ratio: 0.70,
            caution_ratio: 0.85,
            trend_alert_percent: -5.0,
            safety_factor: 1.2,
            minimum_order: 50,
            lead_times: LeadTimes::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("{name} must be within (0, 1], got {value}")]
    RatioOutOfRange { name: &'static str, value: f64 },
    #[error("caution_ratio ({caution}) must not be below shortage_ratio ({shortage})")]
    CautionBelowShortage { caution: f64, shortage: f64 },
    #[error("{name} must be a finite, non-negative number, got {value}")]
    InvalidWeight { name: &'static str, value: f64 },
    #[error("trend_divisor must be positive, got {0}")]
    NonPositiveDivisor(f64),
    #[error("invalid policy document: {0}")]
    Parse(#[from] serde_yaml::Error),
}

impl RecommendationPolicy {
    pub fn from_yaml_str(raw: &str) -> Result<Self, PolicyError> {
        let policy: RecommendationPolicy = serde_yaml::from_str(raw)?;
        policy.validate()?;
        Ok(policy)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Reading policy file {path:?}"))?;
        let policy = Self::from_yaml_str(&raw)
            .with_context(|| format!("Loading recommendation policy from {path:?}"))?;
        Ok(policy)
    }

    pub fn validate(&self) -> Result<(), PolicyError> {
        for (name, value) in [
            ("shortage_ratio", self.shortage_ratio),
            ("caution_ratio", self.caution_ratio),
        ] {
            if !(value > 0.0 && value <= 1.0) {
                return Err(PolicyError::RatioOutOfRange { name, value });
            }
        }
        if self.caution_ratio < self.shortage_ratio {
            return Err(PolicyError::CautionBelowShortage {
                caution: self.caution_ratio,
                shortage: self.shortage_ratio,
            });
        }
        for (name, value) in [
            ("shortage_weight", self.shortage_weight),
            ("trend_weight", self.trend_weight),
            ("safety_factor", self.safety_factor),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(PolicyError::InvalidWeight { name, value });
            }
        }
        if !(self.trend_divisor > 0.0) {
            return Err(PolicyError::NonPositiveDivisor(self.trend_divisor));
        }
        Ok(())
    }

    pub fn lead_time_days(&self, priority: Priority) -> u64 {
        match priority {
            Priority::High => self.lead_times.high,
            Priority::Medium => self.lead_times.medium,
            Priority::Low => self.lead_times.low,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let policy = RecommendationPolicy::from_yaml_str("minimum_order: 20\nlead_times:\n  high: 1\n")
            .expect("parse policy");
        assert_eq!(policy.minimum_order, 20);
        assert_eq!(policy.lead_times.high, 1);
        assert_eq!(policy.lead_times.medium, 5);
        assert_eq!(policy.safety_factor, 1.2);
    }

    #[test]
    fn rejects_inverted_thresholds() {
        let err = RecommendationPolicy::from_yaml_str("shortage_ratio: 0.9\ncaution_ratio: 0.8\n")
            .expect_err("inverted thresholds");
        assert!(matches!(err, PolicyError::CautionBelowShortage { .. }));
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = RecommendationPolicy::from_yaml_str("safety: 2\n").expect_err("unknown key");
        assert!(matches!(err, PolicyError::Parse(_)));
    }

    #[test]
    fn default_lead_times_follow_priority() {
        let policy = RecommendationPolicy::default();
        assert_eq!(policy.lead_time_days(Priority::High), 2);
        assert_eq!(policy.lead_time_days(Priority::Medium), 5);
        assert_eq!(policy.lead_time_days(Priority::Low), 7);
    }
}
