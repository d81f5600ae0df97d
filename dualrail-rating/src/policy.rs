//! `RatingPolicy` and its nested configuration types (§4.10).

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde_json::Value;

/// The order work and edge meters are rated in, which determines whether
/// envelope allowances apply to edges at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Precedence {
    #[default]
    WorkOverEdges,
    EdgesOverWork,
    Parallel,
}

/// The reduction applied to envelope availability under `Parallel`
/// precedence. No derivation is given in the source; treated as a policy
/// constant subject to review (spec §9 open question).
pub const PARALLEL_ENVELOPE_REDUCTION: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

/// A contiguous, non-overlapping usage range with its own unit price.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingTier {
    pub min_usage: Decimal,
    /// `None` means unbounded — the last tier in a schedule.
    pub max_usage: Option<Decimal>,
    pub unit_price: Decimal,
    pub flat_fee: Decimal,
}

impl PricingTier {
    pub fn new(min_usage: Decimal, max_usage: Option<Decimal>, unit_price: Decimal) -> Self {
        Self { min_usage, max_usage, unit_price, flat_fee: Decimal::ZERO }
    }
}

/// Pricing configuration for one meter: a free quota plus an ordered tier
/// schedule for usage past it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MeterPricing {
    pub included_quota: Decimal,
    pub tiers: Vec<PricingTier>,
    pub unit: String,
}

/// Drop `drop` meters from billing whenever `when` has positive usage in
/// the period.
#[derive(Debug, Clone, PartialEq)]
pub struct Exclusion {
    pub when: String,
    pub drop: Vec<String>,
}

/// Configuration for one success-fee meter: price per settled outcome, plus
/// the metadata conditions a settled outcome must match.
#[derive(Debug, Clone, PartialEq)]
pub struct SuccessFeeConfig {
    pub price_per_unit: Decimal,
    pub conditions: HashMap<String, Value>,
    pub settlement_days: u32,
    pub external_verification: bool,
    pub external_system: Option<String>,
}

impl Default for SuccessFeeConfig {
    fn default() -> Self {
        Self {
            price_per_unit: Decimal::ZERO,
            conditions: HashMap::new(),
            settlement_days: 7,
            external_verification: false,
            external_system: None,
        }
    }
}

/// The complete billing policy rated for one customer's period.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RatingPolicy {
    pub precedence: Precedence,
    /// work meter -> edge meter -> allowance per unit of work.
    pub edges_included_per_work: HashMap<String, HashMap<String, Decimal>>,
    pub exclusions: Vec<Exclusion>,
    pub overage_spill: bool,
    pub meter_pricing: HashMap<String, MeterPricing>,
    pub base_fee: Decimal,
    pub spend_cap: Option<Decimal>,
    pub discount_percent: Decimal,
    /// keyed by outcome/meter key.
    pub success_fees: HashMap<String, SuccessFeeConfig>,
}

impl RatingPolicy {
    pub fn new() -> Self {
        Self { overage_spill: true, ..Default::default() }
    }
}
