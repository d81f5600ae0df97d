//! Per-`(customer, period)` logical lock (§5): rating invocations for the
//! same key serialize; different customers or periods run freely. Modeled
//! as a registry of keyed `Mutex`es, the same idiom `ConnectorRegistry`
//! uses for its `RwLock<HashMap<...>>`.

use std::collections::HashMap;
use std::sync::Arc;

use dualrail_core::period::DatePeriod;
use parking_lot::{Mutex, RwLock};
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

type LockKey = (Uuid, DatePeriod);

#[derive(Default)]
pub struct PeriodLockRegistry {
    locks: RwLock<HashMap<LockKey, Arc<tokio::sync::Mutex<()>>>>,
    housekeeping: Mutex<()>,
}

impl PeriodLockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, key: LockKey) -> Arc<tokio::sync::Mutex<()>> {
        if let Some(lock) = self.locks.read().get(&key) {
            return lock.clone();
        }
        let _serialize_creation = self.housekeeping.lock();
        self.locks.write().entry(key).or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))).clone()
    }

    /// Acquire the lock for `(customer_id, period)`, held until the
    /// returned guard is dropped.
    pub async fn acquire(&self, customer_id: Uuid, period: DatePeriod) -> OwnedMutexGuard<()> {
        let lock = self.entry((customer_id, period));
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[tokio::test]
    async fn different_customers_do_not_contend() {
        let registry = PeriodLockRegistry::new();
        let period = DatePeriod::day(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());
        let guard_a = registry.acquire(Uuid::new_v4(), period).await;
        let guard_b = registry.acquire(Uuid::new_v4(), period).await;
        drop(guard_a);
        drop(guard_b);
    }

    #[tokio::test]
    async fn same_key_serializes() {
        let registry = Arc::new(PeriodLockRegistry::new());
        let customer = Uuid::new_v4();
        let period = DatePeriod::day(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap());

        let guard = registry.acquire(customer, period).await;
        let registry2 = registry.clone();
        let handle = tokio::spawn(async move {
            let _second_guard = registry2.acquire(customer, period).await;
        });

        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(!handle.is_finished());
        drop(guard);
        handle.await.unwrap();
    }
}
