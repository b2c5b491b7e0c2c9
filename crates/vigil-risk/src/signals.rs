//! Raw authentication signals and their collectors.
//!
//! Collectors shape provider output into immutable snapshot values and
//! contain no scoring logic. Every provider call may fail independently;
//! a failed field degrades to its neutral default and never faults the
//! collection as a whole.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Placeholder used when a device metadata field cannot be collected.
const UNKNOWN_FIELD: &str = "unknown";

/// A provider call returned nothing usable.
#[derive(Debug, Clone, Error)]
#[error("signal unavailable: {0}")]
pub struct SignalError(pub String);

/// Immutable device fingerprint, produced fresh on every collection call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceFingerprint {
    /// Opaque stable device identifier.
    pub device_id: String,
    pub os_version: String,
    pub app_version: String,
    pub screen_resolution: String,
    pub time_zone: String,
    pub language: String,
    pub is_emulator: bool,
    pub is_jailbroken: bool,
}

/// Point-in-time geolocation and network metadata.
///
/// All fields are optional; absence degrades the dependent sub-scores
/// gracefully rather than faulting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GeolocationSnapshot {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Horizontal accuracy in meters, when the platform reports one.
    pub accuracy: Option<f64>,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub timezone: Option<String>,
    pub isp: Option<String>,
    pub vpn_detected: Option<bool>,
    pub proxy_detected: Option<bool>,
}

impl GeolocationSnapshot {
    /// Both coordinates present.
    #[must_use]
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon)) => Some((lat, lon)),
            _ => None,
        }
    }
}

/// Platform collaborator for raw device metadata.
///
/// Each field may fail on its own; collectors ignore individual failures.
#[async_trait]
pub trait DeviceMetadataProvider: Send + Sync {
    async fn device_id(&self) -> Result<String, SignalError>;
    async fn os_version(&self) -> Result<String, SignalError>;
    async fn app_version(&self) -> Result<String, SignalError>;
    async fn screen_resolution(&self) -> Result<String, SignalError>;
    async fn time_zone(&self) -> Result<String, SignalError>;
    async fn language(&self) -> Result<String, SignalError>;
    async fn is_emulator(&self) -> Result<bool, SignalError>;
    async fn is_jailbroken(&self) -> Result<bool, SignalError>;
}

/// Platform collaborator for geolocation and network metadata.
///
/// Requires user consent; denial or failure yields an error that the
/// collector maps to an empty snapshot.
#[async_trait]
pub trait GeolocationProvider: Send + Sync {
    async fn snapshot(&self) -> Result<GeolocationSnapshot, SignalError>;
}

/// Shapes provider output into a [`DeviceFingerprint`].
pub struct DeviceFingerprintCollector {
    provider: Arc<dyn DeviceMetadataProvider>,
    timeout: Duration,
}

impl DeviceFingerprintCollector {
    #[must_use]
    pub fn new(provider: Arc<dyn DeviceMetadataProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Collect a fresh fingerprint. Never fails: each unavailable field
    /// falls back to its neutral default.
    pub async fn collect(&self) -> DeviceFingerprint {
        let p = &self.provider;
        let (
            device_id,
            os_version,
            app_version,
            screen_resolution,
            time_zone,
            language,
            is_emulator,
            is_jailbroken,
        ) = tokio::join!(
            self.string_field("device_id", p.device_id()),
            self.string_field("os_version", p.os_version()),
            self.string_field("app_version", p.app_version()),
            self.string_field("screen_resolution", p.screen_resolution()),
            self.string_field("time_zone", p.time_zone()),
            self.string_field("language", p.language()),
            self.bool_field("is_emulator", p.is_emulator()),
            self.bool_field("is_jailbroken", p.is_jailbroken()),
        );

        DeviceFingerprint {
            device_id,
            os_version,
            app_version,
            screen_resolution,
            time_zone,
            language,
            is_emulator,
            is_jailbroken,
        }
    }

    async fn string_field(
        &self,
        name: &str,
        fut: impl std::future::Future<Output = Result<String, SignalError>>,
    ) -> String {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(field = name, error = %e, "device metadata field unavailable");
                UNKNOWN_FIELD.to_string()
            }
            Err(_) => {
                warn!(field = name, "device metadata field timed out");
                UNKNOWN_FIELD.to_string()
            }
        }
    }

    async fn bool_field(
        &self,
        name: &str,
        fut: impl std::future::Future<Output = Result<bool, SignalError>>,
    ) -> bool {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => value,
            Ok(Err(e)) => {
                warn!(field = name, error = %e, "device metadata field unavailable");
                false
            }
            Err(_) => {
                warn!(field = name, "device metadata field timed out");
                false
            }
        }
    }
}

/// Shapes provider output into a [`GeolocationSnapshot`].
pub struct GeolocationCollector {
    provider: Arc<dyn GeolocationProvider>,
    timeout: Duration,
}

impl GeolocationCollector {
    #[must_use]
    pub fn new(provider: Arc<dyn GeolocationProvider>, timeout: Duration) -> Self {
        Self { provider, timeout }
    }

    /// Collect a snapshot. Denial, failure or timeout all degrade to an
    /// empty snapshot so the assessment can continue.
    pub async fn collect(&self) -> GeolocationSnapshot {
        match tokio::time::timeout(self.timeout, self.provider.snapshot()).await {
            Ok(Ok(snapshot)) => snapshot,
            Ok(Err(e)) => {
                warn!(error = %e, "geolocation unavailable, continuing without it");
                GeolocationSnapshot::default()
            }
            Err(_) => {
                warn!("geolocation collection timed out, continuing without it");
                GeolocationSnapshot::default()
            }
        }
    }
}
