use thiserror::Error;

/// Failures raised by the event store, meter-reading store, and cost ledger.
///
/// Per the pipeline's error-handling design, store errors are fatal to the
/// caller — there is no retry inside the store itself.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("meter reading value must be finite and non-negative, got {0}")]
    InvalidReadingValue(rust_decimal::Decimal),

    #[error("window_start must be before window_end")]
    InvalidWindow,

    #[error("rated-usage record not found for customer {customer_id} period {period_start}..{period_end}")]
    RatedUsageNotFound {
        customer_id: uuid::Uuid,
        period_start: chrono::NaiveDate,
        period_end: chrono::NaiveDate,
    },

    #[error("concurrent modification detected, retry")]
    StaleState,
}
