//! Risk policy configuration.
//!
//! All tunable weights, thresholds and signal sets live in one injected
//! [`RiskPolicy`] value so policy can be adjusted without touching the
//! scoring code. The policy is validated once at engine construction;
//! a bad policy is fatal there rather than at request time.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::RiskError;

/// Default timeout for a single signal collector call.
pub const DEFAULT_COLLECTOR_TIMEOUT: Duration = Duration::from_secs(1);

/// Default timeout for the behavioral audit-store query.
pub const DEFAULT_BEHAVIOR_TIMEOUT: Duration = Duration::from_secs(2);

/// Weights applied to the four sub-scores when computing the composite.
///
/// Must sum to 1.0 (within floating-point tolerance).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RiskWeights {
    pub device_trust: f64,
    pub location_risk: f64,
    pub behavior_risk: f64,
    pub network_risk: f64,
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            device_trust: 0.4,
            location_risk: 0.3,
            behavior_risk: 0.2,
            network_risk: 0.1,
        }
    }
}

impl RiskWeights {
    fn sum(&self) -> f64 {
        self.device_trust + self.location_risk + self.behavior_risk + self.network_risk
    }
}

/// Inclusive lower bounds for each threat level above `low`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LevelThresholds {
    pub medium: u8,
    pub high: u8,
    pub critical: u8,
}

impl Default for LevelThresholds {
    fn default() -> Self {
        Self {
            medium: 40,
            high: 60,
            critical: 80,
        }
    }
}

/// Injected risk policy: weights, thresholds and signal sets.
#[derive(Debug, Clone)]
pub struct RiskPolicy {
    pub weights: RiskWeights,
    pub thresholds: LevelThresholds,
    /// Countries treated as high-risk or anonymized origins (exact match).
    pub high_risk_countries: HashSet<String>,
    /// Case-insensitive substrings marking a suspicious ISP (Tor exits,
    /// anonymizer networks).
    pub suspicious_isp_markers: Vec<String>,
    /// OS major versions considered legacy/unsupported. Matched by exact
    /// major-version comparison, never by substring.
    pub legacy_os_majors: HashSet<u32>,
    /// Composite score above which an elevated-score indicator is raised.
    pub elevated_score_indicator: u8,
    /// Bound on each device/geo collector call.
    pub collector_timeout: Duration,
    /// Bound on the behavioral audit-store query.
    pub behavior_timeout: Duration,
}

impl Default for RiskPolicy {
    fn default() -> Self {
        Self {
            weights: RiskWeights::default(),
            thresholds: LevelThresholds::default(),
            high_risk_countries: HashSet::new(),
            suspicious_isp_markers: vec![
                "tor".to_string(),
                "anonymous".to_string(),
                "anonymizer".to_string(),
            ],
            legacy_os_majors: HashSet::new(),
            elevated_score_indicator: 70,
            collector_timeout: DEFAULT_COLLECTOR_TIMEOUT,
            behavior_timeout: DEFAULT_BEHAVIOR_TIMEOUT,
        }
    }
}

impl RiskPolicy {
    /// Validate the policy. Called once at engine construction.
    pub fn validate(&self) -> Result<(), RiskError> {
        let sum = self.weights.sum();
        if (sum - 1.0).abs() > 1e-9 {
            return Err(RiskError::Configuration(format!(
                "sub-score weights must sum to 1.0, got {sum}"
            )));
        }
        let w = &self.weights;
        if [w.device_trust, w.location_risk, w.behavior_risk, w.network_risk]
            .iter()
            .any(|&v| v < 0.0)
        {
            return Err(RiskError::Configuration(
                "sub-score weights must be non-negative".to_string(),
            ));
        }
        let t = &self.thresholds;
        if !(t.medium < t.high && t.high < t.critical) {
            return Err(RiskError::Configuration(format!(
                "level thresholds must be strictly increasing, got {}/{}/{}",
                t.medium, t.high, t.critical
            )));
        }
        if t.critical > 100 {
            return Err(RiskError::Configuration(
                "critical threshold cannot exceed 100".to_string(),
            ));
        }
        Ok(())
    }
}
