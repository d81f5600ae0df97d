use thiserror::Error;

/// Per-item failures the normalizer can raise. These never abort a whole
/// export batch; callers collect them alongside the items that did succeed.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("missing or unparseable billing.customer_id attribute")]
    MissingCustomerId,

    #[error("customer {0} not found")]
    UnknownCustomer(uuid::Uuid),

    #[error("store error: {0}")]
    Store(#[from] dualrail_store::StoreError),
}
