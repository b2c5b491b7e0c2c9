//! Risk factor assessors.
//!
//! Each assessor maps raw signals (plus, for behavior, historical audit
//! events) to a sub-score in [0, 100]. The device, location and network
//! assessors are pure functions with no failure mode; the behavior
//! assessor absorbs audit-store failures and returns a neutral score so
//! that signal loss never blocks authentication.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use vigil_core::{AuditLogStore, UserId};

use crate::policy::RiskPolicy;
use crate::signals::{DeviceFingerprint, GeolocationSnapshot};

/// Penalty for a detected emulator.
const EMULATOR_PENALTY: u32 = 40;
/// Penalty for a jailbroken/rooted device.
const JAILBREAK_PENALTY: u32 = 30;
/// Penalty for a legacy/unsupported OS major version.
const LEGACY_OS_PENALTY: u32 = 20;

/// Penalty when a VPN is detected.
const VPN_PENALTY: u32 = 30;
/// Penalty when a proxy is detected.
const PROXY_PENALTY: u32 = 25;
/// Penalty for a high-risk or anonymized origin country.
const HIGH_RISK_COUNTRY_PENALTY: u32 = 40;

/// Penalty for an ISP matching a suspicious marker.
const SUSPICIOUS_ISP_PENALTY: u32 = 35;
/// Penalty when the ISP is absent entirely.
const MISSING_ISP_PENALTY: u32 = 15;

/// Event-flood threshold over the behavior window.
const BEHAVIOR_FLOOD_COUNT: usize = 50;
const BEHAVIOR_FLOOD_PENALTY: u32 = 30;
/// Elevated-activity threshold over the behavior window.
const BEHAVIOR_ELEVATED_COUNT: usize = 20;
const BEHAVIOR_ELEVATED_PENALTY: u32 = 15;
/// Added per event explicitly flagged as suspicious activity.
const SUSPICIOUS_EVENT_PENALTY: u32 = 10;

/// Event type that marks explicitly suspicious activity in the audit log.
pub const SUSPICIOUS_ACTIVITY_EVENT: &str = "suspicious_activity";

/// Hours of audit history consulted by the behavior assessor.
const BEHAVIOR_WINDOW_HOURS: i64 = 24;

/// The four sub-scores, each clamped to [0, 100].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskFactors {
    pub device_trust: u8,
    pub location_risk: u8,
    pub behavior_risk: u8,
    pub network_risk: u8,
}

fn clamp_score(raw: u32) -> u8 {
    raw.min(100) as u8
}

/// Exact major-version extraction: the leading dotted integer of the
/// version string. `"18.2"` has major 18, never 8.
fn os_major_version(os_version: &str) -> Option<u32> {
    os_version
        .trim()
        .split(['.', ' '])
        .next()
        .and_then(|s| s.parse().ok())
}

/// Device trust sub-score. Pure, no I/O, no failure mode.
#[must_use]
pub fn device_trust_score(fingerprint: &DeviceFingerprint, policy: &RiskPolicy) -> u8 {
    let mut score = 0u32;
    if fingerprint.is_emulator {
        score += EMULATOR_PENALTY;
    }
    if fingerprint.is_jailbroken {
        score += JAILBREAK_PENALTY;
    }
    if os_major_version(&fingerprint.os_version)
        .is_some_and(|major| policy.legacy_os_majors.contains(&major))
    {
        score += LEGACY_OS_PENALTY;
    }
    clamp_score(score)
}

/// Location risk sub-score. Missing fields skip their contribution.
#[must_use]
pub fn location_risk_score(geo: &GeolocationSnapshot, policy: &RiskPolicy) -> u8 {
    let mut score = 0u32;
    if geo.vpn_detected == Some(true) {
        score += VPN_PENALTY;
    }
    if geo.proxy_detected == Some(true) {
        score += PROXY_PENALTY;
    }
    if geo
        .country
        .as_ref()
        .is_some_and(|c| policy.high_risk_countries.contains(c))
    {
        score += HIGH_RISK_COUNTRY_PENALTY;
    }
    clamp_score(score)
}

/// Network risk sub-score from ISP metadata.
#[must_use]
pub fn network_risk_score(geo: &GeolocationSnapshot, policy: &RiskPolicy) -> u8 {
    let mut score = 0u32;
    match &geo.isp {
        Some(isp) => {
            let lowered = isp.to_lowercase();
            if policy
                .suspicious_isp_markers
                .iter()
                .any(|marker| lowered.contains(&marker.to_lowercase()))
            {
                score += SUSPICIOUS_ISP_PENALTY;
            }
        }
        None => score += MISSING_ISP_PENALTY,
    }
    clamp_score(score)
}

/// Behavioral sub-score from the user's recent audit history.
pub struct BehaviorRiskAssessor {
    audit: Arc<dyn AuditLogStore>,
}

impl BehaviorRiskAssessor {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditLogStore>) -> Self {
        Self { audit }
    }

    /// Score the last 24 hours of security events.
    ///
    /// Audit-store failure returns 0 (neutral): behavioral signal loss
    /// must never block authentication.
    pub async fn assess(&self, user_id: UserId) -> u8 {
        let since = Utc::now() - Duration::hours(BEHAVIOR_WINDOW_HOURS);
        let events = match self.audit.query(user_id, since).await {
            Ok(events) => events,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "audit query failed, behavior score neutral");
                return 0;
            }
        };

        let mut score = 0u32;
        if events.len() > BEHAVIOR_FLOOD_COUNT {
            score += BEHAVIOR_FLOOD_PENALTY;
        } else if events.len() > BEHAVIOR_ELEVATED_COUNT {
            score += BEHAVIOR_ELEVATED_PENALTY;
        }

        let suspicious = events
            .iter()
            .filter(|e| e.event_type == SUSPICIOUS_ACTIVITY_EVENT)
            .count() as u32;
        score += suspicious * SUSPICIOUS_EVENT_PENALTY;

        clamp_score(score)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_core::{
        AuditStoreError, EventSeverity, InMemoryAuditStore, SecurityEvent,
    };

    fn fingerprint(is_emulator: bool, is_jailbroken: bool, os_version: &str) -> DeviceFingerprint {
        DeviceFingerprint {
            device_id: "device-1".to_string(),
            os_version: os_version.to_string(),
            app_version: "2.4.0".to_string(),
            screen_resolution: "1170x2532".to_string(),
            time_zone: "Europe/Berlin".to_string(),
            language: "de-DE".to_string(),
            is_emulator,
            is_jailbroken,
        }
    }

    fn policy_with_legacy(majors: &[u32]) -> RiskPolicy {
        let mut policy = RiskPolicy::default();
        policy.legacy_os_majors = majors.iter().copied().collect();
        policy
    }

    #[test]
    fn device_trust_accumulates_penalties() {
        let policy = policy_with_legacy(&[8]);
        assert_eq!(device_trust_score(&fingerprint(false, false, "17.1"), &policy), 0);
        assert_eq!(device_trust_score(&fingerprint(true, false, "17.1"), &policy), 40);
        assert_eq!(device_trust_score(&fingerprint(true, true, "17.1"), &policy), 70);
        assert_eq!(device_trust_score(&fingerprint(true, true, "8.0.1"), &policy), 90);
    }

    #[test]
    fn legacy_os_uses_exact_major_comparison() {
        let policy = policy_with_legacy(&[8]);
        // "18.2" must not match legacy major 8.
        assert_eq!(device_trust_score(&fingerprint(false, false, "18.2"), &policy), 0);
        assert_eq!(device_trust_score(&fingerprint(false, false, "8.1"), &policy), 20);
        // Unparseable versions contribute nothing.
        assert_eq!(device_trust_score(&fingerprint(false, false, "unknown"), &policy), 0);
    }

    #[test]
    fn device_trust_clamps_at_100() {
        // Max penalties sum to 90; force a clamp through a synthetic check
        // of the helper instead.
        assert_eq!(clamp_score(250), 100);
    }

    #[test]
    fn location_risk_sums_vpn_proxy_country() {
        let mut policy = RiskPolicy::default();
        policy.high_risk_countries.insert("Atlantis".to_string());

        let geo = GeolocationSnapshot {
            vpn_detected: Some(true),
            proxy_detected: Some(true),
            country: Some("Atlantis".to_string()),
            ..Default::default()
        };
        assert_eq!(location_risk_score(&geo, &policy), 95);
    }

    #[test]
    fn location_risk_skips_missing_fields() {
        let policy = RiskPolicy::default();
        assert_eq!(location_risk_score(&GeolocationSnapshot::default(), &policy), 0);

        let geo = GeolocationSnapshot {
            vpn_detected: Some(true),
            ..Default::default()
        };
        assert_eq!(location_risk_score(&geo, &policy), 30);
    }

    #[test]
    fn network_risk_flags_suspicious_isp() {
        let policy = RiskPolicy::default();
        let geo = GeolocationSnapshot {
            isp: Some("Tor Exit Node 42".to_string()),
            ..Default::default()
        };
        assert_eq!(network_risk_score(&geo, &policy), 35);

        let geo = GeolocationSnapshot {
            isp: Some("Deutsche Telekom".to_string()),
            ..Default::default()
        };
        assert_eq!(network_risk_score(&geo, &policy), 0);
    }

    #[test]
    fn network_risk_penalizes_missing_isp() {
        let policy = RiskPolicy::default();
        assert_eq!(network_risk_score(&GeolocationSnapshot::default(), &policy), 15);
    }

    async fn seed_events(store: &InMemoryAuditStore, user: UserId, count: usize, suspicious: usize) {
        for i in 0..count {
            let event_type = if i < suspicious {
                SUSPICIOUS_ACTIVITY_EVENT
            } else {
                "login"
            };
            store
                .append(SecurityEvent::new(
                    user,
                    event_type,
                    EventSeverity::Low,
                    serde_json::json!({}),
                ))
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn behavior_quiet_history_scores_zero() {
        let store = Arc::new(InMemoryAuditStore::new());
        let user = UserId::new();
        seed_events(&store, user, 5, 0).await;

        let assessor = BehaviorRiskAssessor::new(store);
        assert_eq!(assessor.assess(user).await, 0);
    }

    #[tokio::test]
    async fn behavior_elevated_and_flood_thresholds() {
        let store = Arc::new(InMemoryAuditStore::new());
        let user = UserId::new();
        seed_events(&store, user, 21, 0).await;
        let assessor = BehaviorRiskAssessor::new(store.clone());
        assert_eq!(assessor.assess(user).await, 15);

        let user2 = UserId::new();
        seed_events(&store, user2, 51, 0).await;
        let assessor = BehaviorRiskAssessor::new(store);
        assert_eq!(assessor.assess(user2).await, 30);
    }

    #[tokio::test]
    async fn behavior_suspicious_events_add_up_and_clamp() {
        let store = Arc::new(InMemoryAuditStore::new());
        let user = UserId::new();
        // 51 events, 12 suspicious: 30 + 120 clamps to 100.
        seed_events(&store, user, 51, 12).await;

        let assessor = BehaviorRiskAssessor::new(store);
        assert_eq!(assessor.assess(user).await, 100);
    }

    struct BrokenAudit;

    #[async_trait::async_trait]
    impl AuditLogStore for BrokenAudit {
        async fn query(
            &self,
            _user_id: UserId,
            _since: chrono::DateTime<Utc>,
        ) -> Result<Vec<SecurityEvent>, AuditStoreError> {
            Err(AuditStoreError("connection refused".to_string()))
        }

        async fn append(&self, _event: SecurityEvent) -> Result<(), AuditStoreError> {
            Err(AuditStoreError("connection refused".to_string()))
        }
    }

    #[tokio::test]
    async fn behavior_store_failure_is_neutral() {
        let assessor = BehaviorRiskAssessor::new(Arc::new(BrokenAudit));
        assert_eq!(assessor.assess(UserId::new()).await, 0);
    }
}
