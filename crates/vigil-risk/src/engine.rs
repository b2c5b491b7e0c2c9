//! Risk engine orchestration.
//!
//! Flow per assessment:
//! 1. Collect device and geolocation signals concurrently
//! 2. Compute the pure device/location/network sub-scores
//! 3. Query behavioral history behind a bounded timeout (neutral on expiry)
//! 4. Aggregate into the composite score and threat level
//! 5. Derive indicators and recommendations
//!
//! Once constructed, an assessment always completes: partial signal loss
//! degrades precision, never availability.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use vigil_core::{AuditLogStore, UserId};

use crate::advisor::{recommendations, threat_indicators};
use crate::assessors::{
    device_trust_score, location_risk_score, network_risk_score, BehaviorRiskAssessor,
    RiskFactors,
};
use crate::error::RiskError;
use crate::policy::RiskPolicy;
use crate::scorer::{composite_score, ThreatAssessment, ThreatLevel};
use crate::signals::{
    DeviceFingerprint, DeviceFingerprintCollector, DeviceMetadataProvider, GeolocationCollector,
    GeolocationProvider, GeolocationSnapshot,
};

/// One completed assessment: the collected signals, the sub-scores and
/// the resulting threat assessment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskReport {
    pub fingerprint: DeviceFingerprint,
    pub geolocation: GeolocationSnapshot,
    pub factors: RiskFactors,
    pub assessment: ThreatAssessment,
}

/// Orchestrates signal collection, scoring and advice.
pub struct RiskEngine {
    device_collector: DeviceFingerprintCollector,
    geo_collector: GeolocationCollector,
    behavior: BehaviorRiskAssessor,
    policy: RiskPolicy,
}

impl RiskEngine {
    /// Build an engine from its collaborators. Fails only on an invalid
    /// policy; nothing after construction can fail.
    pub fn new(
        device_provider: Arc<dyn DeviceMetadataProvider>,
        geo_provider: Arc<dyn GeolocationProvider>,
        audit: Arc<dyn AuditLogStore>,
        policy: RiskPolicy,
    ) -> Result<Self, RiskError> {
        policy.validate()?;
        Ok(Self {
            device_collector: DeviceFingerprintCollector::new(
                device_provider,
                policy.collector_timeout,
            ),
            geo_collector: GeolocationCollector::new(geo_provider, policy.collector_timeout),
            behavior: BehaviorRiskAssessor::new(audit),
            policy,
        })
    }

    /// Run a full assessment for one user.
    pub async fn assess(&self, user_id: UserId) -> RiskReport {
        let (fingerprint, geolocation) =
            tokio::join!(self.device_collector.collect(), self.geo_collector.collect());

        let behavior_risk = match tokio::time::timeout(
            self.policy.behavior_timeout,
            self.behavior.assess(user_id),
        )
        .await
        {
            Ok(score) => score,
            Err(_) => {
                warn!(user_id = %user_id, "behavior assessment timed out, score neutral");
                0
            }
        };

        let report = self.evaluate(fingerprint, geolocation, behavior_risk);
        debug!(
            user_id = %user_id,
            score = report.assessment.score,
            threat_level = %report.assessment.threat_level,
            "risk assessment complete"
        );
        report
    }

    /// Score already-collected signals. Pure; exposed for callers that
    /// bring their own snapshots.
    #[must_use]
    pub fn evaluate(
        &self,
        fingerprint: DeviceFingerprint,
        geolocation: GeolocationSnapshot,
        behavior_risk: u8,
    ) -> RiskReport {
        let factors = RiskFactors {
            device_trust: device_trust_score(&fingerprint, &self.policy),
            location_risk: location_risk_score(&geolocation, &self.policy),
            behavior_risk,
            network_risk: network_risk_score(&geolocation, &self.policy),
        };

        let score = composite_score(&factors, &self.policy.weights);
        let threat_level = ThreatLevel::from_score(score, &self.policy.thresholds);
        let indicators = threat_indicators(&fingerprint, &geolocation, score, &self.policy);
        let recs = recommendations(threat_level, &fingerprint, &geolocation);

        RiskReport {
            fingerprint,
            geolocation,
            factors,
            assessment: ThreatAssessment {
                score,
                threat_level,
                indicators,
                recommendations: recs,
                requires_action: threat_level.requires_action(),
            },
        }
    }

    /// The policy this engine was constructed with.
    #[must_use]
    pub fn policy(&self) -> &RiskPolicy {
        &self.policy
    }
}
