//! Change monitoring: device and location deltas between authentication
//! attempts.
//!
//! Both checks are advisory and side-effect-only: they emit a
//! [`SecurityEvent`] when a delta crosses a threshold and never block or
//! fail the caller's primary flow. Append failures are logged and
//! swallowed.

use std::sync::Arc;

use serde_json::json;
use tracing::warn;

use vigil_core::{AuditLogStore, EventSeverity, SecurityEvent, UserId};

use crate::signals::{DeviceFingerprint, GeolocationSnapshot};

/// Mean Earth radius in kilometers.
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Distance above which a location change is significant.
pub const SIGNIFICANT_DISTANCE_KM: f64 = 100.0;

/// Distance above which a significant change escalates to medium severity.
pub const MAJOR_DISTANCE_KM: f64 = 1000.0;

/// Event type emitted when the device identifier changes.
pub const EVENT_SECURITY_VIOLATION: &str = "security_violation";

/// Event type emitted on a significant location change.
pub const EVENT_LOCATION_CHANGE: &str = "location_change";

/// Great-circle distance between two coordinates using the Haversine
/// formula. Returns kilometers. Symmetric in its arguments.
#[must_use]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a =
        (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// The outcome of a location comparison.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationChange {
    pub distance_km: f64,
    pub significant: bool,
    pub severity: EventSeverity,
}

/// Classify the distance between two snapshots. Returns `None` when
/// either snapshot lacks coordinates; no significance check is possible
/// then.
#[must_use]
pub fn classify_location_change(
    previous: &GeolocationSnapshot,
    current: &GeolocationSnapshot,
) -> Option<LocationChange> {
    let (prev_lat, prev_lon) = previous.coordinates()?;
    let (cur_lat, cur_lon) = current.coordinates()?;

    let distance_km = haversine_km(prev_lat, prev_lon, cur_lat, cur_lon);
    let severity = if distance_km > MAJOR_DISTANCE_KM {
        EventSeverity::Medium
    } else {
        EventSeverity::Low
    };
    Some(LocationChange {
        distance_km,
        significant: distance_km > SIGNIFICANT_DISTANCE_KM,
        severity,
    })
}

/// Compares current signals against a caller-supplied previous snapshot
/// and emits events for meaningful deltas.
pub struct ChangeMonitor {
    audit: Arc<dyn AuditLogStore>,
}

impl ChangeMonitor {
    #[must_use]
    pub fn new(audit: Arc<dyn AuditLogStore>) -> Self {
        Self { audit }
    }

    /// Emit a `security_violation` event when the device identifier
    /// differs from the previously seen one. No previous id, no check.
    pub async fn check_device_change(
        &self,
        user_id: UserId,
        previous_device_id: Option<&str>,
        current: &DeviceFingerprint,
    ) {
        let Some(previous) = previous_device_id else {
            return;
        };
        if previous == current.device_id {
            return;
        }

        self.emit(SecurityEvent::new(
            user_id,
            EVENT_SECURITY_VIOLATION,
            EventSeverity::Medium,
            json!({
                "reason": "device_changed",
                "previous_device_id": previous,
                "current_device_id": current.device_id,
            }),
        ))
        .await;
    }

    /// Emit a `location_change` event when the great-circle distance
    /// between snapshots is significant. Missing coordinates on either
    /// side skip the check entirely.
    pub async fn check_location_change(
        &self,
        user_id: UserId,
        previous: &GeolocationSnapshot,
        current: &GeolocationSnapshot,
    ) {
        let Some(change) = classify_location_change(previous, current) else {
            return;
        };
        if !change.significant {
            return;
        }

        self.emit(SecurityEvent::new(
            user_id,
            EVENT_LOCATION_CHANGE,
            change.severity,
            json!({
                "distance_km": change.distance_km,
                "previous_city": previous.city,
                "current_city": current.city,
            }),
        ))
        .await;
    }

    async fn emit(&self, event: SecurityEvent) {
        let event_type = event.event_type.clone();
        if let Err(e) = self.audit.append(event).await {
            warn!(event_type = %event_type, error = %e, "failed to append change event, dropping");
        }
    }
}
