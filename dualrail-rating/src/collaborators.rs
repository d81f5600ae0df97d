//! Narrow seams the Rating Engine needs from its sibling crates (outcome
//! settlement for success fees, period COGS for margin), with blanket
//! implementations bridging to the real collaborators so the engine never
//! has to thread their full generic parameter lists through its own.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dualrail_core::period::Window;
use dualrail_outcomes::{OutcomeStore, OutcomeVerifier, WorkflowRunDirectory};
use dualrail_store::{CostLedger, MeterReadingStore, WorkflowRunStore};
use rust_decimal::Decimal;
use serde_json::Value;
use uuid::Uuid;

use crate::error::RatingError;

#[async_trait]
pub trait SettlementSource: Send + Sync {
    /// Count of settled outcomes matching `outcome_key` and `conditions` in
    /// `period`, used directly as the success-fee billed quantity.
    async fn settled_count(
        &self,
        now: DateTime<Utc>,
        customer_id: Uuid,
        outcome_key: &str,
        period: Window,
        conditions: &HashMap<String, Value>,
    ) -> usize;
}

#[async_trait]
impl<S: OutcomeStore, D: WorkflowRunDirectory> SettlementSource for OutcomeVerifier<S, D> {
    async fn settled_count(
        &self,
        now: DateTime<Utc>,
        customer_id: Uuid,
        outcome_key: &str,
        period: Window,
        conditions: &HashMap<String, Value>,
    ) -> usize {
        self.settled_outcomes(now, customer_id, outcome_key, period, conditions).await.len()
    }
}

/// Lets the scheduler hold one shared `Arc<OutcomeVerifier<..>>` and pass it
/// straight into `RatingEngine::new` without re-threading its generics.
#[async_trait]
impl<T: SettlementSource + ?Sized> SettlementSource for std::sync::Arc<T> {
    async fn settled_count(
        &self,
        now: DateTime<Utc>,
        customer_id: Uuid,
        outcome_key: &str,
        period: Window,
        conditions: &HashMap<String, Value>,
    ) -> usize {
        (**self).settled_count(now, customer_id, outcome_key, period, conditions).await
    }
}

#[async_trait]
pub trait CogsSource: Send + Sync {
    async fn period_cogs(&self, customer_id: Uuid, period: Window) -> Result<Decimal, RatingError>;
}

#[async_trait]
impl<L: CostLedger, R: MeterReadingStore, W: WorkflowRunStore> CogsSource
    for dualrail_cogs::CogsCalculator<L, R, W>
{
    async fn period_cogs(&self, customer_id: Uuid, period: Window) -> Result<Decimal, RatingError> {
        let cogs = dualrail_cogs::CogsCalculator::period_cogs(self, customer_id, period)
            .await
            .map_err(|e| RatingError::InvariantViolation(e.to_string()))?;
        Ok(cogs.total_cogs)
    }
}

/// Same rationale as the `SettlementSource` blanket above: the scheduler
/// shares one `Arc<CogsCalculator<..>>` across rating invocations.
#[async_trait]
impl<T: CogsSource + ?Sized> CogsSource for std::sync::Arc<T> {
    async fn period_cogs(&self, customer_id: Uuid, period: Window) -> Result<Decimal, RatingError> {
        (**self).period_cogs(customer_id, period).await
    }
}
