//! Adaptive authentication risk engine.
//!
//! Computes a composite risk score from device, location, behavioral and
//! network signals, classifies the threat level and tells callers whether
//! step-up verification is warranted.
//!
//! # Modules
//!
//! - [`signals`] - raw signal values, provider contracts and collectors
//! - [`assessors`] - per-factor sub-scores in [0, 100]
//! - [`scorer`] - weighted composite and threat level classification
//! - [`advisor`] - ordered indicators and recommendations
//! - [`monitor`] - device/location change events
//! - [`engine`] - orchestration
//! - [`policy`] - injected weights, thresholds and signal sets

pub mod advisor;
pub mod assessors;
pub mod engine;
pub mod error;
pub mod monitor;
pub mod policy;
pub mod scorer;
pub mod signals;

pub use assessors::{BehaviorRiskAssessor, RiskFactors};
pub use engine::{RiskEngine, RiskReport};
pub use error::RiskError;
pub use monitor::{haversine_km, ChangeMonitor, LocationChange};
pub use policy::{LevelThresholds, RiskPolicy, RiskWeights};
pub use scorer::{composite_score, ThreatAssessment, ThreatLevel};
pub use signals::{
    DeviceFingerprint, DeviceFingerprintCollector, DeviceMetadataProvider, GeolocationCollector,
    GeolocationProvider, GeolocationSnapshot, SignalError,
};
