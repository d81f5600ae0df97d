//! Outcome Verifier (C8): pending -> verified/reversed lifecycle, holdback
//! windows, and the settlement query the Rating Engine's success-fee step
//! reads from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dualrail_core::model::{OutcomeStatus, OutcomeVerification};
use dualrail_core::period::Window;
use serde_json::Value;
use tracing::warn;
use uuid::Uuid;

use crate::error::VerificationError;
use crate::runs::WorkflowRunDirectory;
use crate::store::OutcomeStore;

pub struct OutcomeVerifier<S: OutcomeStore, D: WorkflowRunDirectory> {
    store: Arc<S>,
    runs: Arc<D>,
}

impl<S: OutcomeStore, D: WorkflowRunDirectory> OutcomeVerifier<S, D> {
    pub fn new(store: Arc<S>, runs: Arc<D>) -> Self {
        Self { store, runs }
    }

    /// Create a pending outcome with `holdback_until = now + settlement_days`.
    #[allow(clippy::too_many_arguments)]
    pub async fn create(
        &self,
        now: DateTime<Utc>,
        run_id: Uuid,
        customer_id: Uuid,
        outcome_key: impl Into<String>,
        external_system: Option<String>,
        external_ref: Option<String>,
        settlement_days: u32,
        metadata: HashMap<String, Value>,
    ) -> Result<OutcomeVerification, VerificationError> {
        let record = OutcomeVerification {
            id: Uuid::new_v4(),
            workflow_run_id: run_id,
            customer_id,
            outcome_key: outcome_key.into(),
            external_system,
            external_ref,
            status: OutcomeStatus::Pending,
            holdback_until: now + Duration::days(settlement_days as i64),
            settlement_days,
            created_at: now,
            verified_at: None,
            reversal_reason: None,
            metadata,
        };
        self.store.insert(record.clone()).await?;
        Ok(record)
    }

    /// Transition a record to `verified` or `reversed`. Final once set.
    pub async fn verify(
        &self,
        now: DateTime<Utc>,
        id: Uuid,
        verified: bool,
        reversal_reason: Option<String>,
    ) -> Result<OutcomeVerification, VerificationError> {
        let mut record = self.store.get(id).await.ok_or(VerificationError::NotFound(id))?;
        if record.status != OutcomeStatus::Pending {
            return Err(VerificationError::AlreadyFinal(id));
        }
        if verified {
            record.status = OutcomeStatus::Verified;
            record.verified_at = Some(now);
        } else {
            record.status = OutcomeStatus::Reversed;
            record.reversal_reason = reversal_reason;
        }
        self.store.replace(record.clone()).await?;
        Ok(record)
    }

    /// External webhook verification, keyed on `(external_system,
    /// external_ref)`. When multiple pending records share that key, only
    /// the oldest is updated; later calls with the same ref are no-ops
    /// (logged), not errors. The oldest matching record (by `created_at`,
    /// across every status) is consulted first: if it has already been
    /// settled by a prior external call, this call is a repeat delivery for
    /// an already-handled ref and is ignored even though other pending
    /// records for the same ref may remain.
    pub async fn verify_external(
        &self,
        now: DateTime<Utc>,
        external_system: &str,
        external_ref: &str,
        verified: bool,
        reversal_reason: Option<String>,
    ) -> Result<Option<OutcomeVerification>, VerificationError> {
        let mut candidates: Vec<OutcomeVerification> = self
            .store
            .all()
            .await
            .into_iter()
            .filter(|r| {
                r.external_system.as_deref() == Some(external_system)
                    && r.external_ref.as_deref() == Some(external_ref)
            })
            .collect();
        candidates.sort_by_key(|r| r.created_at);

        let Some(oldest) = candidates.into_iter().next() else {
            warn!(external_system, external_ref, "no outcome matches external verification, ignored");
            return Ok(None);
        };

        if oldest.status != OutcomeStatus::Pending {
            warn!(external_system, external_ref, "ref already settled, repeat external verification ignored");
            return Ok(None);
        }

        let updated = self.verify(now, oldest.id, verified, reversal_reason).await?;
        Ok(Some(updated))
    }

    /// Outcomes eligible for success-fee billing: verified, past holdback,
    /// the associated run started within the period, and every key/value
    /// pair in `conditions` matches the record's metadata exactly.
    pub async fn settled_outcomes(
        &self,
        now: DateTime<Utc>,
        customer_id: Uuid,
        outcome_key: &str,
        period: Window,
        conditions: &HashMap<String, Value>,
    ) -> Vec<OutcomeVerification> {
        let mut matched = Vec::new();
        for record in self.store.all().await {
            if record.customer_id != customer_id || record.outcome_key != outcome_key {
                continue;
            }
            if record.status != OutcomeStatus::Verified || record.holdback_until > now {
                continue;
            }
            let Some(run) = self.runs.get(record.workflow_run_id).await else { continue };
            if !period.contains(run.started_at) {
                continue;
            }
            if !conditions.iter().all(|(k, v)| record.metadata.get(k) == Some(v)) {
                continue;
            }
            matched.push(record);
        }
        matched
    }

    /// Pending outcomes, optionally narrowed to one external system, for the
    /// admin dashboard's settlement-in-progress view.
    pub async fn pending(&self, external_system: Option<&str>) -> Vec<OutcomeVerification> {
        self.store
            .all()
            .await
            .into_iter()
            .filter(|r| r.status == OutcomeStatus::Pending)
            .filter(|r| external_system.map(|s| r.external_system.as_deref() == Some(s)).unwrap_or(true))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runs::InMemoryWorkflowRunDirectory;
    use crate::store::InMemoryOutcomeStore;
    use chrono::TimeZone;
    use dualrail_core::model::WorkflowRun;

    fn verifier() -> OutcomeVerifier<InMemoryOutcomeStore, InMemoryWorkflowRunDirectory> {
        OutcomeVerifier::new(
            Arc::new(InMemoryOutcomeStore::new()),
            Arc::new(InMemoryWorkflowRunDirectory::new()),
        )
    }

    #[tokio::test]
    async fn create_sets_holdback_from_settlement_days() {
        let v = verifier();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let record = v
            .create(now, Uuid::new_v4(), Uuid::new_v4(), "ticket_resolved", None, None, 5, HashMap::new())
            .await
            .unwrap();
        assert_eq!(record.holdback_until, now + Duration::days(5));
        assert_eq!(record.status, OutcomeStatus::Pending);
    }

    #[tokio::test]
    async fn verify_transition_is_final() {
        let v = verifier();
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let record = v
            .create(now, Uuid::new_v4(), Uuid::new_v4(), "ticket_resolved", None, None, 0, HashMap::new())
            .await
            .unwrap();
        v.verify(now, record.id, true, None).await.unwrap();
        let result = v.verify(now, record.id, false, None).await;
        assert!(matches!(result, Err(VerificationError::AlreadyFinal(_))));
    }

    #[tokio::test]
    async fn external_verification_updates_oldest_matching_only() {
        let v = verifier();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::minutes(1);
        let first = v
            .create(
                t0,
                Uuid::new_v4(),
                Uuid::new_v4(),
                "ticket_resolved",
                Some("zendesk".to_string()),
                Some("ref-1".to_string()),
                0,
                HashMap::new(),
            )
            .await
            .unwrap();
        let _second = v
            .create(
                t1,
                Uuid::new_v4(),
                Uuid::new_v4(),
                "ticket_resolved",
                Some("zendesk".to_string()),
                Some("ref-1".to_string()),
                0,
                HashMap::new(),
            )
            .await
            .unwrap();

        let updated = v.verify_external(t1, "zendesk", "ref-1", true, None).await.unwrap();
        assert_eq!(updated.unwrap().id, first.id);

        let again = v.verify_external(t1, "zendesk", "ref-1", true, None).await.unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn settled_outcomes_requires_verified_past_holdback_and_run_in_period() {
        let v = verifier();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let customer = Uuid::new_v4();
        let mut run = WorkflowRun::started(customer, t0);
        run.status = dualrail_core::model::WorkflowRunStatus::Completed;
        let run_id = run.id;
        v.runs.insert(run);

        let record = v
            .create(t0, run_id, customer, "ticket_resolved", None, None, 0, HashMap::new())
            .await
            .unwrap();
        v.verify(t0, record.id, true, None).await.unwrap();

        let period = Window::new(t0 - Duration::days(1), t0 + Duration::days(1));
        let now = t0 + Duration::seconds(1);
        let settled = v
            .settled_outcomes(now, customer, "ticket_resolved", period, &HashMap::new())
            .await;
        assert_eq!(settled.len(), 1);
    }
}
