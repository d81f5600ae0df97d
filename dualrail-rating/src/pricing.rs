//! Tiered pricing (§4.10 step 7): walks a meter's tier schedule against a
//! billable quantity.

use rust_decimal::Decimal;

use crate::error::RatingError;
use crate::policy::MeterPricing;

#[derive(Debug, Clone, PartialEq)]
pub struct TierContribution {
    pub tier_usage: Decimal,
    pub unit_price: Decimal,
    pub tier_amount: Decimal,
}

/// Price `usage` against `pricing.tiers`, in order. A usage value exactly at
/// a tier boundary belongs to the tier whose `min_usage` equals it
/// (left-closed ranges). Returns a `PricingTierGap` error if the tier
/// schedule doesn't cover all of `usage`.
pub fn tiered(
    meter_key: &str,
    usage: Decimal,
    pricing: &MeterPricing,
) -> Result<(Decimal, Vec<TierContribution>), RatingError> {
    if pricing.tiers.is_empty() {
        return Ok((Decimal::ZERO, Vec::new()));
    }

    let mut total = Decimal::ZERO;
    let mut breakdown = Vec::new();
    let mut remaining = usage;
    let mut processed = Decimal::ZERO;

    for tier in &pricing.tiers {
        if remaining <= Decimal::ZERO {
            break;
        }

        let tier_start = tier.min_usage;
        let tier_end = tier.max_usage.unwrap_or(processed + remaining);

        if processed < tier_start {
            let skip = tier_start - processed;
            if skip >= remaining {
                break;
            }
            remaining -= skip;
            processed = tier_start;
        }

        let capacity = tier_end - processed;
        let tier_usage = remaining.min(capacity);

        if tier_usage > Decimal::ZERO {
            let tier_amount = tier_usage * tier.unit_price + tier.flat_fee;
            total += tier_amount;
            breakdown.push(TierContribution { tier_usage, unit_price: tier.unit_price, tier_amount });
            remaining -= tier_usage;
            processed += tier_usage;
        }
    }

    if remaining > Decimal::ZERO {
        return Err(RatingError::PricingTierGap { meter: meter_key.to_string(), usage });
    }

    Ok((total, breakdown))
}
