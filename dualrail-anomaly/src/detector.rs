//! Anomaly Detector (C12): usage spikes and extended silence, computed over
//! the Meter-Reading Store. Statistics here use `f64` per spec §9 — billed
//! amounts never do, but a baseline mean and a ratio are dashboard
//! quantities, not money.

use chrono::{DateTime, Duration, Utc};
use dualrail_core::period::Window;
use dualrail_store::{MeterReadingStore, SortOrder};
use rust_decimal::prelude::ToPrimitive;
use uuid::Uuid;

use crate::error::AnomalyError;

pub const DEFAULT_SPIKE_THRESHOLD_MULTIPLIER: f64 = 3.0;
pub const DEFAULT_SILENCE_HOURS: u32 = 24;
const BASELINE_LOOKBACK_DAYS: i64 = 30;
const MIN_BASELINE_READINGS: usize = 10;
const MAX_BASELINE_READINGS: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly {
    UsageSpike {
        customer_id: Uuid,
        meter_key: String,
        latest_value: f64,
        baseline_avg: f64,
        spike_ratio: f64,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
    },
    Silence {
        customer_id: Uuid,
        hours_without_usage: u32,
        last_check: DateTime<Utc>,
    },
}

pub struct AnomalyDetector<R: MeterReadingStore> {
    readings: R,
}

impl<R: MeterReadingStore> AnomalyDetector<R> {
    pub fn new(readings: R) -> Self {
        Self { readings }
    }

    /// Spike: at least 10 readings in the trailing 30 days, and the latest
    /// reading exceeds the mean of the rest by `threshold_multiplier`.
    pub async fn detect_usage_spikes(
        &self,
        customer_id: Uuid,
        meter_key: &str,
        now: DateTime<Utc>,
        threshold_multiplier: f64,
    ) -> Result<Vec<Anomaly>, AnomalyError> {
        let window = Window::new(now - Duration::days(BASELINE_LOOKBACK_DAYS), now);
        let mut readings = self
            .readings
            .list(customer_id, Some(meter_key), window, SortOrder::Descending)
            .await?;
        readings.truncate(MAX_BASELINE_READINGS);

        if readings.len() < MIN_BASELINE_READINGS {
            return Ok(Vec::new());
        }

        let latest = &readings[0];
        let baseline_values: Vec<f64> =
            readings[1..].iter().map(|r| r.value.to_f64().unwrap_or(0.0)).collect();
        let baseline_avg = baseline_values.iter().sum::<f64>() / baseline_values.len() as f64;
        let latest_value = latest.value.to_f64().unwrap_or(0.0);

        if baseline_avg > 0.0 && latest_value > baseline_avg * threshold_multiplier {
            return Ok(vec![Anomaly::UsageSpike {
                customer_id,
                meter_key: meter_key.to_string(),
                latest_value,
                baseline_avg,
                spike_ratio: latest_value / baseline_avg,
                window_start: latest.window_start,
                window_end: latest.window_end,
            }]);
        }

        Ok(Vec::new())
    }

    /// Silence: no readings of any meter in the trailing `hours_threshold`
    /// hours.
    pub async fn detect_silence(
        &self,
        customer_id: Uuid,
        now: DateTime<Utc>,
        hours_threshold: u32,
    ) -> Result<Vec<Anomaly>, AnomalyError> {
        let window = Window::new(now - Duration::hours(hours_threshold as i64), now);
        let readings = self.readings.list(customer_id, None, window, SortOrder::Ascending).await?;

        if readings.is_empty() {
            return Ok(vec![Anomaly::Silence {
                customer_id,
                hours_without_usage: hours_threshold,
                last_check: now,
            }]);
        }

        Ok(Vec::new())
    }
}
