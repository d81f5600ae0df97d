//! Meter-Reading Store (C3): aggregated (customer, meter, window) values.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dualrail_core::model::{MeterReading, NewMeterReading};
use dualrail_core::period::Window;
use parking_lot::RwLock;
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

type ReadingKey = (Uuid, String, DateTime<Utc>, DateTime<Utc>);

#[async_trait]
pub trait MeterReadingStore: Send + Sync {
    /// If a reading exists for `(customer, meter, window_start, window_end)`,
    /// add the new value to the existing one and merge provenance/metadata;
    /// otherwise insert. Commutative and associative within a window.
    async fn upsert(&self, reading: NewMeterReading) -> Result<MeterReading, StoreError>;

    /// Scalar sum used by alerts and COGS.
    async fn sum(&self, customer_id: Uuid, meter_key: &str, window: Window)
        -> Result<Decimal, StoreError>;

    /// Grouped aggregate used by rating: meter_key -> summed value.
    async fn by_meter(
        &self,
        customer_id: Uuid,
        window: Window,
    ) -> Result<HashMap<String, Decimal>, StoreError>;

    /// Drill-down listing.
    async fn list(
        &self,
        customer_id: Uuid,
        meter_key: Option<&str>,
        window: Window,
        order: SortOrder,
    ) -> Result<Vec<MeterReading>, StoreError>;

    /// Delete all readings for a customer whose window falls within `period`,
    /// so a derivation pass can be safely re-run without double-counting.
    async fn delete_existing_readings(
        &self,
        customer_id: Uuid,
        period: Window,
    ) -> Result<u64, StoreError>;
}

/// Lets a single store instance be shared by value (cloning the `Arc`)
/// across components that are generic over `R: MeterReadingStore` rather
/// than `Arc<R>`, e.g. the scheduler wiring one reading store into the
/// Deriver, COGS Calculator, Rating Engine, and Anomaly Detector alike.
#[async_trait]
impl<T: MeterReadingStore + ?Sized> MeterReadingStore for std::sync::Arc<T> {
    async fn upsert(&self, reading: NewMeterReading) -> Result<MeterReading, StoreError> {
        (**self).upsert(reading).await
    }

    async fn sum(&self, customer_id: Uuid, meter_key: &str, window: Window) -> Result<Decimal, StoreError> {
        (**self).sum(customer_id, meter_key, window).await
    }

    async fn by_meter(&self, customer_id: Uuid, window: Window) -> Result<HashMap<String, Decimal>, StoreError> {
        (**self).by_meter(customer_id, window).await
    }

    async fn list(
        &self,
        customer_id: Uuid,
        meter_key: Option<&str>,
        window: Window,
        order: SortOrder,
    ) -> Result<Vec<MeterReading>, StoreError> {
        (**self).list(customer_id, meter_key, window, order).await
    }

    async fn delete_existing_readings(&self, customer_id: Uuid, period: Window) -> Result<u64, StoreError> {
        (**self).delete_existing_readings(customer_id, period).await
    }
}

#[derive(Default)]
struct Inner {
    readings: HashMap<ReadingKey, MeterReading>,
}

/// Reference `MeterReadingStore` implementation. A single lock serializes
/// all upserts, which is a stronger guarantee than the per-row atomicity the
/// contract requires but is correct and simple for an in-memory reference.
pub struct InMemoryMeterReadingStore {
    inner: RwLock<Inner>,
    next_id: AtomicU64,
}

impl InMemoryMeterReadingStore {
    pub fn new() -> Self {
        Self { inner: RwLock::new(Inner::default()), next_id: AtomicU64::new(1) }
    }
}

impl Default for InMemoryMeterReadingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MeterReadingStore for InMemoryMeterReadingStore {
    async fn upsert(&self, reading: NewMeterReading) -> Result<MeterReading, StoreError> {
        if reading.window_start >= reading.window_end {
            return Err(StoreError::InvalidWindow);
        }
        if reading.value.is_sign_negative() {
            return Err(StoreError::InvalidReadingValue(reading.value));
        }

        let key = (
            reading.customer_id,
            reading.meter_key.clone(),
            reading.window_start,
            reading.window_end,
        );
        let mut inner = self.inner.write();
        if let Some(existing) = inner.readings.get_mut(&key) {
            existing.value += reading.value;
            existing.src_event_ids.extend(reading.src_event_ids);
            if let Some(meta) = reading.metadata {
                existing.metadata = Some(meta);
            }
            return Ok(existing.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = MeterReading {
            id,
            customer_id: reading.customer_id,
            meter_key: reading.meter_key,
            window_start: reading.window_start,
            window_end: reading.window_end,
            value: reading.value,
            src_event_ids: reading.src_event_ids,
            metadata: reading.metadata,
        };
        inner.readings.insert(key, stored.clone());
        Ok(stored)
    }

    async fn sum(
        &self,
        customer_id: Uuid,
        meter_key: &str,
        window: Window,
    ) -> Result<Decimal, StoreError> {
        let inner = self.inner.read();
        let total = inner
            .readings
            .values()
            .filter(|r| r.customer_id == customer_id && r.meter_key == meter_key)
            .filter(|r| window.overlaps(&Window::new(r.window_start, r.window_end)))
            .fold(Decimal::ZERO, |acc, r| acc + r.value);
        Ok(total)
    }

    async fn by_meter(
        &self,
        customer_id: Uuid,
        window: Window,
    ) -> Result<HashMap<String, Decimal>, StoreError> {
        let inner = self.inner.read();
        let mut totals: HashMap<String, Decimal> = HashMap::new();
        for r in inner.readings.values().filter(|r| r.customer_id == customer_id) {
            if window.overlaps(&Window::new(r.window_start, r.window_end)) {
                *totals.entry(r.meter_key.clone()).or_insert(Decimal::ZERO) += r.value;
            }
        }
        Ok(totals)
    }

    async fn list(
        &self,
        customer_id: Uuid,
        meter_key: Option<&str>,
        window: Window,
        order: SortOrder,
    ) -> Result<Vec<MeterReading>, StoreError> {
        let inner = self.inner.read();
        let mut matched: Vec<MeterReading> = inner
            .readings
            .values()
            .filter(|r| r.customer_id == customer_id)
            .filter(|r| meter_key.map(|m| m == r.meter_key).unwrap_or(true))
            .filter(|r| window.overlaps(&Window::new(r.window_start, r.window_end)))
            .cloned()
            .collect();
        matched.sort_by_key(|r| r.window_start);
        if order == SortOrder::Descending {
            matched.reverse();
        }
        Ok(matched)
    }

    async fn delete_existing_readings(
        &self,
        customer_id: Uuid,
        period: Window,
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.write();
        let keys: Vec<ReadingKey> = inner
            .readings
            .values()
            .filter(|r| r.customer_id == customer_id)
            .filter(|r| period.overlaps(&Window::new(r.window_start, r.window_end)))
            .map(|r| (r.customer_id, r.meter_key.clone(), r.window_start, r.window_end))
            .collect();
        let count = keys.len() as u64;
        for key in keys {
            inner.readings.remove(&key);
        }
        Ok(count)
    }
}
