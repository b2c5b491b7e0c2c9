//! Threat advisor: maps an assessed score plus raw signals to ordered
//! indicator and recommendation lists.
//!
//! Pure mapping, no state. Indicator order is fixed so downstream
//! assertions and renderings stay stable.

use crate::policy::RiskPolicy;
use crate::scorer::ThreatLevel;
use crate::signals::{DeviceFingerprint, GeolocationSnapshot};

/// Indicator markers, emitted in this order.
pub const INDICATOR_EMULATOR: &str = "emulator_detected";
pub const INDICATOR_JAILBREAK: &str = "device_jailbroken";
pub const INDICATOR_VPN: &str = "vpn_detected";
pub const INDICATOR_PROXY: &str = "proxy_detected";
pub const INDICATOR_MISSING_ISP: &str = "isp_unavailable";
pub const INDICATOR_ELEVATED_SCORE: &str = "elevated_risk_score";

/// Derive the ordered indicator list from boolean signals.
#[must_use]
pub fn threat_indicators(
    fingerprint: &DeviceFingerprint,
    geo: &GeolocationSnapshot,
    score: u8,
    policy: &RiskPolicy,
) -> Vec<String> {
    let mut indicators = Vec::new();
    if fingerprint.is_emulator {
        indicators.push(INDICATOR_EMULATOR.to_string());
    }
    if fingerprint.is_jailbroken {
        indicators.push(INDICATOR_JAILBREAK.to_string());
    }
    if geo.vpn_detected == Some(true) {
        indicators.push(INDICATOR_VPN.to_string());
    }
    if geo.proxy_detected == Some(true) {
        indicators.push(INDICATOR_PROXY.to_string());
    }
    if geo.isp.is_none() {
        indicators.push(INDICATOR_MISSING_ISP.to_string());
    }
    if score > policy.elevated_score_indicator {
        indicators.push(INDICATOR_ELEVATED_SCORE.to_string());
    }
    indicators
}

/// Build the ordered recommendation list for a threat level, with
/// threat-specific recommendations appended afterwards.
#[must_use]
pub fn recommendations(
    level: ThreatLevel,
    fingerprint: &DeviceFingerprint,
    geo: &GeolocationSnapshot,
) -> Vec<String> {
    let mut recs: Vec<String> = match level {
        ThreatLevel::Critical => vec![
            "Block access immediately".to_string(),
            "Require manual identity approval".to_string(),
            "Trigger incident response".to_string(),
        ],
        ThreatLevel::High => vec![
            "Require multi-factor authentication".to_string(),
            "Tighten verification requirements".to_string(),
            "Increase session monitoring".to_string(),
        ],
        ThreatLevel::Medium => vec![
            "Suggest additional verification".to_string(),
            "Log authentication for review".to_string(),
        ],
        ThreatLevel::Low => vec!["Proceed with standard authentication".to_string()],
    };

    if fingerprint.is_emulator {
        recs.push("Block emulator access".to_string());
    }
    if fingerprint.is_jailbroken {
        recs.push("Restrict access from compromised devices".to_string());
    }
    if geo.vpn_detected == Some(true) || geo.proxy_detected == Some(true) {
        recs.push("Verify network origin".to_string());
    }

    recs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(is_emulator: bool, is_jailbroken: bool) -> DeviceFingerprint {
        DeviceFingerprint {
            device_id: "device-1".to_string(),
            os_version: "17.1".to_string(),
            app_version: "2.4.0".to_string(),
            screen_resolution: "1170x2532".to_string(),
            time_zone: "Europe/Berlin".to_string(),
            language: "de-DE".to_string(),
            is_emulator,
            is_jailbroken,
        }
    }

    #[test]
    fn indicator_order_is_deterministic() {
        let geo = GeolocationSnapshot {
            vpn_detected: Some(true),
            proxy_detected: Some(true),
            isp: None,
            ..Default::default()
        };
        let indicators = threat_indicators(
            &fingerprint(true, true),
            &geo,
            85,
            &RiskPolicy::default(),
        );
        assert_eq!(
            indicators,
            vec![
                INDICATOR_EMULATOR,
                INDICATOR_JAILBREAK,
                INDICATOR_VPN,
                INDICATOR_PROXY,
                INDICATOR_MISSING_ISP,
                INDICATOR_ELEVATED_SCORE,
            ]
        );
    }

    #[test]
    fn score_boundary_for_elevated_indicator() {
        let geo = GeolocationSnapshot {
            isp: Some("Deutsche Telekom".to_string()),
            ..Default::default()
        };
        let policy = RiskPolicy::default();
        let fp = fingerprint(false, false);
        assert!(threat_indicators(&fp, &geo, 70, &policy).is_empty());
        assert_eq!(
            threat_indicators(&fp, &geo, 71, &policy),
            vec![INDICATOR_ELEVATED_SCORE]
        );
    }

    #[test]
    fn recommendations_cover_every_level() {
        let fp = fingerprint(false, false);
        let geo = GeolocationSnapshot::default();

        let critical = recommendations(ThreatLevel::Critical, &fp, &geo);
        assert_eq!(critical[0], "Block access immediately");
        assert_eq!(critical.len(), 3);

        let high = recommendations(ThreatLevel::High, &fp, &geo);
        assert_eq!(high[0], "Require multi-factor authentication");

        let medium = recommendations(ThreatLevel::Medium, &fp, &geo);
        assert_eq!(medium.len(), 2);

        let low = recommendations(ThreatLevel::Low, &fp, &geo);
        assert_eq!(low, vec!["Proceed with standard authentication"]);
    }

    #[test]
    fn threat_specific_recommendations_appended_last() {
        let geo = GeolocationSnapshot {
            vpn_detected: Some(true),
            ..Default::default()
        };
        let recs = recommendations(ThreatLevel::High, &fingerprint(true, false), &geo);
        assert_eq!(recs[recs.len() - 2], "Block emulator access");
        assert_eq!(recs[recs.len() - 1], "Verify network origin");
    }
}
