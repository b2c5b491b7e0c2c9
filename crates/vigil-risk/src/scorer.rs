//! Composite risk scoring and threat level classification.

use serde::{Deserialize, Serialize};

use crate::assessors::RiskFactors;
use crate::policy::{LevelThresholds, RiskWeights};

/// Ordinal threat classification derived from the composite score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreatLevel {
    Low,
    Medium,
    High,
    Critical,
}

impl ThreatLevel {
    /// Classify a composite score. Total over [0, 100]: no overlapping
    /// ranges, no gaps. Lower bounds are inclusive.
    #[must_use]
    pub fn from_score(score: u8, thresholds: &LevelThresholds) -> Self {
        if score >= thresholds.critical {
            ThreatLevel::Critical
        } else if score >= thresholds.high {
            ThreatLevel::High
        } else if score >= thresholds.medium {
            ThreatLevel::Medium
        } else {
            ThreatLevel::Low
        }
    }

    /// Whether this level demands step-up action from the caller.
    #[must_use]
    pub fn requires_action(self) -> bool {
        matches!(self, ThreatLevel::High | ThreatLevel::Critical)
    }
}

impl std::fmt::Display for ThreatLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ThreatLevel::Low => write!(f, "low"),
            ThreatLevel::Medium => write!(f, "medium"),
            ThreatLevel::High => write!(f, "high"),
            ThreatLevel::Critical => write!(f, "critical"),
        }
    }
}

/// Result of one risk assessment. Immutable once created; the caller's
/// audit collaborator owns any persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThreatAssessment {
    /// Composite score in [0, 100].
    pub score: u8,
    pub threat_level: ThreatLevel,
    /// Ordered, deterministic threat indicator markers.
    pub indicators: Vec<String>,
    /// Ordered recommendations for the caller.
    pub recommendations: Vec<String>,
    /// True iff `threat_level` is high or critical.
    pub requires_action: bool,
}

/// Weighted composite of the four sub-scores, rounded half away from
/// zero and clamped to [0, 100].
#[must_use]
pub fn composite_score(factors: &RiskFactors, weights: &RiskWeights) -> u8 {
    let weighted = f64::from(factors.device_trust) * weights.device_trust
        + f64::from(factors.location_risk) * weights.location_risk
        + f64::from(factors.behavior_risk) * weights.behavior_risk
        + f64::from(factors.network_risk) * weights.network_risk;
    weighted.round().clamp(0.0, 100.0) as u8
}
