//! Usage preview (§6.2 of `spec.md`, breakdown shape supplemented from
//! `original_source/src/kachi/apps/ingest_api/processors.py
//! generate_usage_preview`): a quick, unrated snapshot of a customer's
//! in-progress period, fed to the (out-of-scope) dashboard so customers can
//! see roughly what they owe before a period closes and the Rating Engine
//! produces a committed `RatingResult`.

use std::collections::HashMap;

use dualrail_core::period::Window;
use dualrail_rating::{tiered, RatingPolicy};
use dualrail_store::MeterReadingStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::error::NormalizeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewBreakdown {
    pub base_fee: Decimal,
    pub usage_charges: Decimal,
    pub included_allowances: HashMap<String, Decimal>,
    pub overage_charges: HashMap<String, Decimal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsagePreview {
    pub customer_id: Uuid,
    pub period: Window,
    pub meters: HashMap<String, Decimal>,
    pub estimated_cost: Decimal,
    pub breakdown: Option<PreviewBreakdown>,
}

/// Estimate a customer's cost for `window` without running the full Rating
/// Engine: sums meter readings, then prices each meter against
/// `policy.meter_pricing` alone — no envelope allocation or exclusions,
/// since those are only meaningful as part of a committed rating pass over
/// a closed period. A meter with no declared pricing is still reported in
/// `meters` but contributes nothing to `estimated_cost`, the same
/// unpriced-meter handling the Rating Engine uses.
pub async fn usage_preview<R: MeterReadingStore>(
    store: &R,
    customer_id: Uuid,
    window: Window,
    policy: &RatingPolicy,
    include_breakdown: bool,
) -> Result<UsagePreview, NormalizeError> {
    let meters = store.by_meter(customer_id, window).await?;

    let mut usage_charges = Decimal::ZERO;
    let mut included_allowances = HashMap::new();
    let mut overage_charges = HashMap::new();

    for (meter_key, usage) in &meters {
        let Some(pricing) = policy.meter_pricing.get(meter_key) else {
            warn!(meter_key, "no MeterPricing declared, meter excluded from preview estimate");
            continue;
        };
        included_allowances.insert(meter_key.clone(), pricing.included_quota);

        let billable = (*usage - pricing.included_quota).max(Decimal::ZERO);
        if billable == Decimal::ZERO {
            continue;
        }

        let amount = match tiered(meter_key, billable, pricing) {
            Ok((amount, _breakdown)) => amount,
            Err(err) => {
                warn!(meter_key, error = %err, "pricing tier gap, excluding meter from preview estimate");
                continue;
            }
        };
        usage_charges += amount;
        overage_charges.insert(meter_key.clone(), amount);
    }

    let estimated_cost = policy.base_fee + usage_charges;

    let breakdown = include_breakdown.then(|| PreviewBreakdown {
        base_fee: policy.base_fee,
        usage_charges,
        included_allowances,
        overage_charges,
    });

    Ok(UsagePreview { customer_id, period: window, meters, estimated_cost, breakdown })
}
