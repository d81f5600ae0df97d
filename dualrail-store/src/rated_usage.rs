//! Storage of `RatedUsage` rows: one per `(customer_id, period_start,
//! period_end)`, upserted in place on re-rating (spec §3: "a single
//! RatedUsage row exists; re-rating updates it in place").

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use dualrail_core::model::RatedUsage;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

type RatedUsageKey = (Uuid, NaiveDate, NaiveDate);

#[async_trait]
pub trait RatedUsageStore: Send + Sync {
    /// Insert or replace the row for `(customer_id, period_start, period_end)`.
    async fn upsert(&self, row: RatedUsage) -> Result<(), StoreError>;

    async fn get(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<RatedUsage, StoreError>;

    /// Mark a row as pushed to the external billing adapter.
    async fn mark_pushed(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<(), StoreError>;

    /// Retention sweep (§4.11 cleanup cycle): delete rows whose `period_end`
    /// is older than `ts`. Returns the number of rows removed.
    async fn delete_before(&self, ts: NaiveDate) -> Result<u64, StoreError>;
}

#[async_trait]
impl<T: RatedUsageStore + ?Sized> RatedUsageStore for std::sync::Arc<T> {
    async fn upsert(&self, row: RatedUsage) -> Result<(), StoreError> {
        (**self).upsert(row).await
    }

    async fn get(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<RatedUsage, StoreError> {
        (**self).get(customer_id, period_start, period_end).await
    }

    async fn mark_pushed(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<(), StoreError> {
        (**self).mark_pushed(customer_id, period_start, period_end).await
    }

    async fn delete_before(&self, ts: NaiveDate) -> Result<u64, StoreError> {
        (**self).delete_before(ts).await
    }
}

#[derive(Default)]
pub struct InMemoryRatedUsageStore {
    rows: RwLock<HashMap<RatedUsageKey, RatedUsage>>,
}

impl InMemoryRatedUsageStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn key(customer_id: Uuid, period_start: NaiveDate, period_end: NaiveDate) -> RatedUsageKey {
    (customer_id, period_start, period_end)
}

#[async_trait]
impl RatedUsageStore for InMemoryRatedUsageStore {
    async fn upsert(&self, row: RatedUsage) -> Result<(), StoreError> {
        let k = key(row.customer_id, row.period_start, row.period_end);
        self.rows.write().insert(k, row);
        Ok(())
    }

    async fn get(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<RatedUsage, StoreError> {
        self.rows
            .read()
            .get(&key(customer_id, period_start, period_end))
            .cloned()
            .ok_or(StoreError::RatedUsageNotFound { customer_id, period_start, period_end })
    }

    async fn mark_pushed(
        &self,
        customer_id: Uuid,
        period_start: NaiveDate,
        period_end: NaiveDate,
    ) -> Result<(), StoreError> {
        let mut rows = self.rows.write();
        let row = rows
            .get_mut(&key(customer_id, period_start, period_end))
            .ok_or(StoreError::RatedUsageNotFound { customer_id, period_start, period_end })?;
        row.external_pushed_at = Some(Utc::now());
        Ok(())
    }

    async fn delete_before(&self, ts: NaiveDate) -> Result<u64, StoreError> {
        let mut rows = self.rows.write();
        let to_remove: Vec<RatedUsageKey> =
            rows.values().filter(|r| r.period_end < ts).map(|r| key(r.customer_id, r.period_start, r.period_end)).collect();
        let count = to_remove.len() as u64;
        for k in to_remove {
            rows.remove(&k);
        }
        Ok(count)
    }
}
