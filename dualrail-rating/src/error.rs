use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RatingError {
    #[error(transparent)]
    Store(#[from] dualrail_store::StoreError),

    #[error("pricing tier gap: meter {meter} has no tier covering usage {usage}")]
    PricingTierGap { meter: String, usage: Decimal },

    #[error("rating invariant violated: {0}")]
    InvariantViolation(String),
}
