//! Rating Engine (C10), core of the core: precedence, envelopes, exclusions,
//! tiered pricing, base fees, spend caps, discounts, and success fees,
//! folding in COGS/margin from `dualrail-cogs`.

pub mod collaborators;
pub mod engine;
pub mod envelope;
pub mod error;
pub mod lock;
pub mod policy;
pub mod pricing;

pub use collaborators::{CogsSource, SettlementSource};
pub use engine::{LineType, RatedLine, RatingEngine, RatingResult};
pub use envelope::{allocate_envelopes, EnvelopeAllocation};
pub use error::RatingError;
pub use lock::PeriodLockRegistry;
pub use policy::{
    Exclusion, MeterPricing, Precedence, PricingTier, RatingPolicy, SuccessFeeConfig,
    PARALLEL_ENVELOPE_REDUCTION,
};
pub use pricing::{tiered, TierContribution};
