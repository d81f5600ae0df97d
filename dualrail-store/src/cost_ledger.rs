//! Cost Ledger (C4): append-only realized-cost records, read by the COGS
//! Calculator. Never aggregated or overwritten here.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dualrail_core::model::{CostRecord, CostType, NewCostRecord};
use dualrail_core::period::Window;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::StoreError;

#[async_trait]
pub trait CostLedger: Send + Sync {
    async fn append(&self, record: NewCostRecord) -> Result<CostRecord, StoreError>;

    /// Filter by workflow-run membership, timestamp range, and cost type.
    /// Any filter left `None` matches everything along that dimension.
    async fn filter(
        &self,
        workflow_run_ids: Option<&[Uuid]>,
        window: Option<Window>,
        cost_types: Option<&[CostType]>,
    ) -> Result<Vec<CostRecord>, StoreError>;
}

#[async_trait]
impl<T: CostLedger + ?Sized> CostLedger for std::sync::Arc<T> {
    async fn append(&self, record: NewCostRecord) -> Result<CostRecord, StoreError> {
        (**self).append(record).await
    }

    async fn filter(
        &self,
        workflow_run_ids: Option<&[Uuid]>,
        window: Option<Window>,
        cost_types: Option<&[CostType]>,
    ) -> Result<Vec<CostRecord>, StoreError> {
        (**self).filter(workflow_run_ids, window, cost_types).await
    }
}

pub struct InMemoryCostLedger {
    records: RwLock<Vec<CostRecord>>,
    next_id: AtomicU64,
}

impl InMemoryCostLedger {
    pub fn new() -> Self {
        Self { records: RwLock::new(Vec::new()), next_id: AtomicU64::new(1) }
    }
}

impl Default for InMemoryCostLedger {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CostLedger for InMemoryCostLedger {
    async fn append(&self, record: NewCostRecord) -> Result<CostRecord, StoreError> {
        if record.cost_amount.is_sign_negative() {
            return Err(StoreError::InvalidReadingValue(record.cost_amount));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let stored = CostRecord {
            id,
            workflow_run_id: record.workflow_run_id,
            ts: record.ts,
            cost_amount: record.cost_amount,
            cost_type: record.cost_type,
            details: record.details,
        };
        self.records.write().push(stored.clone());
        Ok(stored)
    }

    async fn filter(
        &self,
        workflow_run_ids: Option<&[Uuid]>,
        window: Option<Window>,
        cost_types: Option<&[CostType]>,
    ) -> Result<Vec<CostRecord>, StoreError> {
        let records = self.records.read();
        let matched = records
            .iter()
            .filter(|r| {
                workflow_run_ids
                    .map(|ids| r.workflow_run_id.map(|id| ids.contains(&id)).unwrap_or(false))
                    .unwrap_or(true)
            })
            .filter(|r| window.map(|w| w.contains(r.ts)).unwrap_or(true))
            .filter(|r| cost_types.map(|types| types.contains(&r.cost_type)).unwrap_or(true))
            .cloned()
            .collect();
        Ok(matched)
    }
}
