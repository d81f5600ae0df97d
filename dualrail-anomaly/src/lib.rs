//! Anomaly Detector (C12): flags usage spikes and prolonged silence from
//! the Meter-Reading Store. Advisory only — never feeds back into rating.

pub mod detector;
pub mod error;

pub use detector::{
    Anomaly, AnomalyDetector, DEFAULT_SILENCE_HOURS, DEFAULT_SPIKE_THRESHOLD_MULTIPLIER,
};
pub use error::AnomalyError;
