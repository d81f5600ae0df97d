//! Adjustments (§6.3): a manual credit/debit recorded as an audit-log entry.
//! The pipeline does not apply the adjustment to a bill itself — that is the
//! external billing adapter's concern — it only records that one happened.

use chrono::Utc;
use dualrail_store::{AuditLogStore, StoreError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdjustmentRequest {
    pub customer_id: Uuid,
    pub amount: Decimal,
    pub reason: String,
    pub actor: String,
}

/// Record a manual adjustment, returning the new audit-log entry's id.
pub async fn record_adjustment<A: AuditLogStore>(
    audit_log: &A,
    request: AdjustmentRequest,
) -> Result<u64, StoreError> {
    let subject = format!("customer:{}", request.customer_id);
    let details = json!({ "amount": request.amount, "reason": request.reason });
    let entry = audit_log
        .record(Utc::now(), &request.actor, "adjustment_created", &subject, Some(details))
        .await?;
    Ok(entry.id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dualrail_store::InMemoryAuditLogStore;

    #[tokio::test]
    async fn records_adjustment_against_customer_subject() {
        let audit_log = InMemoryAuditLogStore::new();
        let customer_id = Uuid::new_v4();
        let request = AdjustmentRequest {
            customer_id,
            amount: Decimal::from(-25),
            reason: "goodwill credit".to_string(),
            actor: "admin@dualrail".to_string(),
        };
        let id = record_adjustment(&audit_log, request).await.unwrap();
        assert!(id > 0);

        let entries = audit_log.list(Some(&format!("customer:{customer_id}")), None).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "adjustment_created");
    }
}
