//! Envelope allocation (§4.10 step 3): per-work allowances of edge usage,
//! applied before rating edges under `work_over_edges`/`parallel` precedence.

use std::collections::HashMap;

use dualrail_core::catalog::is_work_meter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::policy::RatingPolicy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeAllocation {
    pub edge_meter: String,
    pub allocated: Decimal,
    pub consumed: Decimal,
    pub remaining: Decimal,
}

impl EnvelopeAllocation {
    fn new(edge_meter: impl Into<String>, allocated: Decimal) -> Self {
        Self { edge_meter: edge_meter.into(), allocated, consumed: Decimal::ZERO, remaining: allocated }
    }

    pub fn is_exhausted(&self) -> bool {
        self.remaining <= Decimal::ZERO
    }

    /// Consume up to `amount` of the envelope; returns how much was actually
    /// drawn down. `E.consumed + E.remaining == E.allocated` holds before
    /// and after.
    pub fn consume(&mut self, amount: Decimal) -> Decimal {
        let drawn = amount.max(Decimal::ZERO).min(self.remaining);
        self.consumed += drawn;
        self.remaining -= drawn;
        drawn
    }
}

/// For each work meter with positive usage, add `usage × allowance` to the
/// envelope of every edge meter it maps to.
pub fn allocate_envelopes(
    readings: &HashMap<String, Decimal>,
    policy: &RatingPolicy,
) -> HashMap<String, EnvelopeAllocation> {
    let mut envelopes: HashMap<String, Decimal> = HashMap::new();

    for (meter_key, usage) in readings {
        if !is_work_meter(meter_key) || *usage <= Decimal::ZERO {
            continue;
        }
        let Some(allowances) = policy.edges_included_per_work.get(meter_key) else { continue };
        for (edge_meter, allowance_per_work) in allowances {
            *envelopes.entry(edge_meter.clone()).or_insert(Decimal::ZERO) += allowance_per_work * usage;
        }
    }

    envelopes
        .into_iter()
        .map(|(edge_meter, allocated)| (edge_meter.clone(), EnvelopeAllocation::new(edge_meter, allocated)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_scales_with_work_usage() {
        let mut readings = HashMap::new();
        readings.insert("workflow.completed".to_string(), Decimal::from(5));

        let mut policy = RatingPolicy::new();
        let mut allowances = HashMap::new();
        allowances.insert("llm.tokens".to_string(), Decimal::from(50_000));
        policy.edges_included_per_work.insert("workflow.completed".to_string(), allowances);

        let envelopes = allocate_envelopes(&readings, &policy);
        let envelope = envelopes.get("llm.tokens").unwrap();
        assert_eq!(envelope.allocated, Decimal::from(250_000));
        assert_eq!(envelope.remaining, Decimal::from(250_000));
    }

    #[test]
    fn consume_keeps_allocated_invariant() {
        let mut envelope = EnvelopeAllocation::new("llm.tokens", Decimal::from(100));
        let drawn = envelope.consume(Decimal::from(150));
        assert_eq!(drawn, Decimal::from(100));
        assert_eq!(envelope.consumed + envelope.remaining, envelope.allocated);
        assert!(envelope.is_exhausted());
    }
}
