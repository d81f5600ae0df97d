//! Storage of `WorkflowRun` records, keyed by customer. Shared by the COGS
//! Calculator (attributing cost records to a customer's runs in a period)
//! and the scheduler's reprocessing cycles.

use std::collections::HashMap;

use async_trait::async_trait;
use dualrail_core::model::WorkflowRun;
use dualrail_core::period::Window;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait WorkflowRunStore: Send + Sync {
    async fn upsert(&self, run: WorkflowRun) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Option<WorkflowRun>;

    /// Runs belonging to `customer_id` with `started_at` inside `window`.
    async fn list_by_customer(&self, customer_id: Uuid, window: Window) -> Vec<WorkflowRun>;
}

#[async_trait]
impl<T: WorkflowRunStore + ?Sized> WorkflowRunStore for std::sync::Arc<T> {
    async fn upsert(&self, run: WorkflowRun) -> Result<(), StoreError> {
        (**self).upsert(run).await
    }

    async fn get(&self, id: Uuid) -> Option<WorkflowRun> {
        (**self).get(id).await
    }

    async fn list_by_customer(&self, customer_id: Uuid, window: Window) -> Vec<WorkflowRun> {
        (**self).list_by_customer(customer_id, window).await
    }
}

#[derive(Default)]
pub struct InMemoryWorkflowRunStore {
    runs: RwLock<HashMap<Uuid, WorkflowRun>>,
}

impl InMemoryWorkflowRunStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRunStore for InMemoryWorkflowRunStore {
    async fn upsert(&self, run: WorkflowRun) -> Result<(), StoreError> {
        self.runs.write().insert(run.id, run);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Option<WorkflowRun> {
        self.runs.read().get(&id).cloned()
    }

    async fn list_by_customer(&self, customer_id: Uuid, window: Window) -> Vec<WorkflowRun> {
        self.runs
            .read()
            .values()
            .filter(|r| r.customer_id == customer_id && window.contains(r.started_at))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    #[tokio::test]
    async fn list_by_customer_filters_by_window_and_owner() {
        let store = InMemoryWorkflowRunStore::new();
        let customer = Uuid::new_v4();
        let other = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        store.upsert(WorkflowRun::started(customer, t0)).await.unwrap();
        store.upsert(WorkflowRun::started(customer, t0 + Duration::days(40))).await.unwrap();
        store.upsert(WorkflowRun::started(other, t0)).await.unwrap();

        let window = Window::new(t0, t0 + Duration::days(1));
        let matched = store.list_by_customer(customer, window).await;
        assert_eq!(matched.len(), 1);
    }
}
