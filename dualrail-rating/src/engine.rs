//! Rating Engine (C10): the core algorithm. Loads meter readings for a
//! period, applies exclusions and envelope allocation, rates every meter per
//! the policy's precedence, then totals, caps, and folds in COGS/margin.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use dualrail_core::catalog::{is_edge_meter, is_work_meter};
use dualrail_core::period::DatePeriod;
use dualrail_store::MeterReadingStore;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::collaborators::{CogsSource, SettlementSource};
use crate::envelope::{allocate_envelopes, EnvelopeAllocation};
use crate::error::RatingError;
use crate::policy::{MeterPricing, Precedence, RatingPolicy, PARALLEL_ENVELOPE_REDUCTION};
use crate::pricing::tiered;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineType {
    Work,
    Edge,
    BaseFee,
    SuccessFee,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedLine {
    pub meter_key: String,
    pub usage_quantity: Decimal,
    pub billable_quantity: Decimal,
    pub unit_price: Decimal,
    pub amount: Decimal,
    pub line_type: LineType,
    pub description: String,
    pub envelope_consumed: Decimal,
    pub included_consumed: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingResult {
    pub customer_id: Uuid,
    pub period: DatePeriod,
    pub lines: Vec<RatedLine>,
    pub envelopes: HashMap<String, EnvelopeAllocation>,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub total: Decimal,
    pub cogs: Decimal,
    pub margin: Decimal,
}

impl RatingResult {
    /// Serialize into the storage row the scheduler upserts. `id` should be
    /// the existing row's id when re-rating the same `(customer, period)`,
    /// so the row is updated in place rather than replaced by a stranger.
    pub fn to_rated_usage(&self, id: Uuid) -> dualrail_core::model::RatedUsage {
        dualrail_core::model::RatedUsage {
            id,
            customer_id: self.customer_id,
            period_start: self.period.start,
            period_end: self.period.end,
            items: serde_json::to_value(self).unwrap_or(serde_json::Value::Null),
            subtotal: self.subtotal,
            cogs: self.cogs,
            margin: self.margin,
            external_pushed_at: None,
        }
    }
}

pub struct RatingEngine<R: MeterReadingStore, S: SettlementSource, C: CogsSource> {
    readings: R,
    settlement: S,
    cogs: C,
}

impl<R: MeterReadingStore, S: SettlementSource, C: CogsSource> RatingEngine<R, S, C> {
    pub fn new(readings: R, settlement: S, cogs: C) -> Self {
        Self { readings, settlement, cogs }
    }

    pub async fn rate(
        &self,
        customer_id: Uuid,
        period: DatePeriod,
        policy: &RatingPolicy,
        now: DateTime<Utc>,
    ) -> Result<RatingResult, RatingError> {
        let window = period.to_instant_window();
        let original_readings = self.readings.by_meter(customer_id, window).await?;

        let mut excluded_meters: HashSet<String> = HashSet::new();
        for exclusion in &policy.exclusions {
            let triggered = original_readings.get(&exclusion.when).copied().unwrap_or(Decimal::ZERO)
                > Decimal::ZERO;
            if triggered {
                excluded_meters.extend(exclusion.drop.iter().cloned());
            }
        }

        let readings: HashMap<String, Decimal> = original_readings
            .into_iter()
            .filter(|(meter, _)| !excluded_meters.contains(meter))
            .collect();

        let mut envelopes = allocate_envelopes(&readings, policy);
        let mut lines = Vec::new();

        let work_meters: Vec<&String> = readings.keys().filter(|m| is_work_meter(m)).collect();
        let edge_meters: Vec<&String> = readings.keys().filter(|m| is_edge_meter(m)).collect();
        let neutral_meters: Vec<&String> =
            readings.keys().filter(|m| !is_work_meter(m) && !is_edge_meter(m)).collect();

        match policy.precedence {
            Precedence::WorkOverEdges => {
                for meter in &work_meters {
                    self.rate_without_envelope(meter, &readings, policy, &mut lines)?;
                }
                for meter in &edge_meters {
                    self.rate_with_envelope(
                        meter,
                        &readings,
                        policy,
                        &mut envelopes,
                        Decimal::ONE,
                        &mut lines,
                    )?;
                }
            }
            Precedence::EdgesOverWork => {
                for meter in &edge_meters {
                    self.rate_without_envelope(meter, &readings, policy, &mut lines)?;
                }
                for meter in &work_meters {
                    self.rate_without_envelope(meter, &readings, policy, &mut lines)?;
                }
            }
            Precedence::Parallel => {
                for meter in &work_meters {
                    self.rate_without_envelope(meter, &readings, policy, &mut lines)?;
                }
                for meter in &edge_meters {
                    self.rate_with_envelope(
                        meter,
                        &readings,
                        policy,
                        &mut envelopes,
                        PARALLEL_ENVELOPE_REDUCTION,
                        &mut lines,
                    )?;
                }
            }
        }

        for meter in &neutral_meters {
            self.rate_without_envelope(meter, &readings, policy, &mut lines)?;
        }

        if policy.base_fee > Decimal::ZERO {
            lines.push(RatedLine {
                meter_key: "base_fee".to_string(),
                usage_quantity: Decimal::ONE,
                billable_quantity: Decimal::ONE,
                unit_price: policy.base_fee,
                amount: policy.base_fee,
                line_type: LineType::BaseFee,
                description: "plan base fee".to_string(),
                envelope_consumed: Decimal::ZERO,
                included_consumed: Decimal::ZERO,
            });
        }

        for (meter_key, config) in &policy.success_fees {
            let quantity = self
                .settlement
                .settled_count(now, customer_id, meter_key, window, &config.conditions)
                .await;
            if quantity == 0 {
                continue;
            }
            let quantity_decimal = Decimal::from(quantity as u64);
            let amount = quantity_decimal * config.price_per_unit;
            lines.push(RatedLine {
                meter_key: meter_key.clone(),
                usage_quantity: quantity_decimal,
                billable_quantity: quantity_decimal,
                unit_price: config.price_per_unit,
                amount,
                line_type: LineType::SuccessFee,
                description: format!("success fee for {meter_key}"),
                envelope_consumed: Decimal::ZERO,
                included_consumed: Decimal::ZERO,
            });
        }

        let subtotal = lines.iter().fold(Decimal::ZERO, |acc, l| acc + l.amount);
        let mut discount = subtotal * policy.discount_percent / Decimal::from(100);
        let mut total = subtotal - discount;

        if let Some(cap) = policy.spend_cap {
            if total > cap {
                discount += total - cap;
                total = cap;
            }
        }

        let cogs = self.cogs.period_cogs(customer_id, window).await?;
        let margin = total - cogs;

        Ok(RatingResult { customer_id, period, lines, envelopes, subtotal, discount, total, cogs, margin })
    }

    /// Rate a meter with no envelope applied: work meters under every
    /// precedence, edge meters under `edges_over_work`, and neutral meters
    /// always.
    fn rate_without_envelope(
        &self,
        meter_key: &str,
        readings: &HashMap<String, Decimal>,
        policy: &RatingPolicy,
        lines: &mut Vec<RatedLine>,
    ) -> Result<(), RatingError> {
        let usage = readings.get(meter_key).copied().unwrap_or(Decimal::ZERO);
        let Some(pricing) = policy.meter_pricing.get(meter_key) else {
            warn!(meter_key, "no MeterPricing declared, meter is unpriced for this period");
            return Ok(());
        };

        let line_type = if is_work_meter(meter_key) { LineType::Work } else { LineType::Edge };
        let billable = (usage - pricing.included_quota).max(Decimal::ZERO);
        let line = self.price_billable(meter_key, usage, billable, pricing, line_type)?;
        lines.push(line);
        Ok(())
    }

    /// Rate an edge meter with envelope applied: edge meters under
    /// `work_over_edges`/`parallel`.
    #[allow(clippy::too_many_arguments)]
    fn rate_with_envelope(
        &self,
        meter_key: &str,
        readings: &HashMap<String, Decimal>,
        policy: &RatingPolicy,
        envelopes: &mut HashMap<String, EnvelopeAllocation>,
        reduction_factor: Decimal,
        lines: &mut Vec<RatedLine>,
    ) -> Result<(), RatingError> {
        let usage = readings.get(meter_key).copied().unwrap_or(Decimal::ZERO);
        let Some(pricing) = policy.meter_pricing.get(meter_key) else {
            warn!(meter_key, "no MeterPricing declared, meter is unpriced for this period");
            return Ok(());
        };

        let envelope_available = envelopes
            .get(meter_key)
            .map(|e| e.remaining * reduction_factor)
            .unwrap_or(Decimal::ZERO);
        let total_covered = pricing.included_quota + envelope_available;
        let mut billable = (usage - total_covered).max(Decimal::ZERO);

        let envelope_draw = (usage - pricing.included_quota).max(Decimal::ZERO).min(envelope_available);
        if let Some(envelope) = envelopes.get_mut(meter_key) {
            envelope.consumed += envelope_draw;
            envelope.remaining -= envelope_draw;
        }

        if !policy.overage_spill {
            billable = Decimal::ZERO;
        }

        let mut line = self.price_billable(meter_key, usage, billable, pricing, LineType::Edge)?;
        line.envelope_consumed = envelope_draw;
        lines.push(line);
        Ok(())
    }

    fn price_billable(
        &self,
        meter_key: &str,
        usage: Decimal,
        billable: Decimal,
        pricing: &MeterPricing,
        line_type: LineType,
    ) -> Result<RatedLine, RatingError> {
        if billable == Decimal::ZERO {
            return Ok(RatedLine {
                meter_key: meter_key.to_string(),
                usage_quantity: usage,
                billable_quantity: Decimal::ZERO,
                unit_price: Decimal::ZERO,
                amount: Decimal::ZERO,
                line_type,
                description: format!("{meter_key} (included in plan)"),
                envelope_consumed: Decimal::ZERO,
                included_consumed: usage,
            });
        }

        let (amount, _breakdown) = tiered(meter_key, billable, pricing)?;
        let unit_price = if billable > Decimal::ZERO { amount / billable } else { Decimal::ZERO };
        Ok(RatedLine {
            meter_key: meter_key.to_string(),
            usage_quantity: usage,
            billable_quantity: billable,
            unit_price,
            amount,
            line_type,
            description: format!("{meter_key} metered usage"),
            envelope_consumed: Decimal::ZERO,
            included_consumed: usage - billable,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PricingTier;
    use async_trait::async_trait;
    use chrono::{NaiveDate, TimeZone};
    use dualrail_store::{InMemoryMeterReadingStore, MeterReadingStore};
    use dualrail_core::model::NewMeterReading;

    struct NoSettlements;

    #[async_trait]
    impl SettlementSource for NoSettlements {
        async fn settled_count(
            &self,
            _now: DateTime<Utc>,
            _customer_id: Uuid,
            _outcome_key: &str,
            _period: dualrail_core::period::Window,
            _conditions: &HashMap<String, serde_json::Value>,
        ) -> usize {
            0
        }
    }

    struct ZeroCogs;

    #[async_trait]
    impl CogsSource for ZeroCogs {
        async fn period_cogs(
            &self,
            _customer_id: Uuid,
            _period: dualrail_core::period::Window,
        ) -> Result<Decimal, RatingError> {
            Ok(Decimal::ZERO)
        }
    }

    fn day_period() -> DatePeriod {
        DatePeriod::day(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
    }

    async fn seed(store: &InMemoryMeterReadingStore, customer: Uuid, meter: &str, value: Decimal) {
        let window = day_period().to_instant_window();
        store
            .upsert(NewMeterReading::new(customer, meter, window.start, window.end, value))
            .await
            .unwrap();
    }

    fn token_pricing(included_quota: Decimal) -> MeterPricing {
        MeterPricing {
            included_quota,
            tiers: vec![PricingTier::new(Decimal::ZERO, None, Decimal::new(15, 6))],
            unit: "tokens".to_string(),
        }
    }

    fn workflow_pricing() -> MeterPricing {
        MeterPricing {
            included_quota: Decimal::ZERO,
            tiers: vec![PricingTier::new(Decimal::ZERO, None, Decimal::from(10))],
            unit: "count".to_string(),
        }
    }

    #[tokio::test]
    async fn scenario_1_envelope_absorbs_edge_usage() {
        let customer = Uuid::new_v4();
        let store = InMemoryMeterReadingStore::new();
        seed(&store, customer, "workflow.completed", Decimal::from(5)).await;
        seed(&store, customer, "llm.tokens", Decimal::from(150_000)).await;

        let mut policy = RatingPolicy::new();
        policy.precedence = Precedence::WorkOverEdges;
        policy.base_fee = Decimal::from(99);
        policy.meter_pricing.insert("llm.tokens".to_string(), token_pricing(Decimal::from(100_000)));
        policy.meter_pricing.insert("workflow.completed".to_string(), workflow_pricing());
        let mut allowances = HashMap::new();
        allowances.insert("llm.tokens".to_string(), Decimal::from(50_000));
        policy.edges_included_per_work.insert("workflow.completed".to_string(), allowances);

        let engine = RatingEngine::new(store, NoSettlements, ZeroCogs);
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let result = engine.rate(customer, day_period(), &policy, now).await.unwrap();

        let token_line = result.lines.iter().find(|l| l.meter_key == "llm.tokens").unwrap();
        assert_eq!(token_line.amount, Decimal::ZERO);

        let workflow_line = result.lines.iter().find(|l| l.meter_key == "workflow.completed").unwrap();
        assert_eq!(workflow_line.amount, Decimal::from(50));
        assert_eq!(result.total, Decimal::from(99) + Decimal::from(50));
    }

    #[tokio::test]
    async fn scenario_2_edge_spill_past_envelope() {
        let customer = Uuid::new_v4();
        let store = InMemoryMeterReadingStore::new();
        seed(&store, customer, "workflow.completed", Decimal::from(5)).await;
        seed(&store, customer, "llm.tokens", Decimal::from(500_000)).await;

        let mut policy = RatingPolicy::new();
        policy.precedence = Precedence::WorkOverEdges;
        policy.meter_pricing.insert("llm.tokens".to_string(), token_pricing(Decimal::from(100_000)));
        policy.meter_pricing.insert("workflow.completed".to_string(), workflow_pricing());
        let mut allowances = HashMap::new();
        allowances.insert("llm.tokens".to_string(), Decimal::from(50_000));
        policy.edges_included_per_work.insert("workflow.completed".to_string(), allowances);

        let engine = RatingEngine::new(store, NoSettlements, ZeroCogs);
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let result = engine.rate(customer, day_period(), &policy, now).await.unwrap();

        let token_line = result.lines.iter().find(|l| l.meter_key == "llm.tokens").unwrap();
        assert_eq!(token_line.billable_quantity, Decimal::from(150_000));
        assert_eq!(token_line.amount, Decimal::new(225, 2));
    }

    #[tokio::test]
    async fn scenario_3_exclusion_drops_api_calls_on_workflow_completion() {
        let customer = Uuid::new_v4();
        let store = InMemoryMeterReadingStore::new();
        seed(&store, customer, "workflow.completed", Decimal::from(5)).await;
        seed(&store, customer, "api.calls", Decimal::from(25)).await;

        let mut policy = RatingPolicy::new();
        policy.meter_pricing.insert("api.calls".to_string(), token_pricing(Decimal::ZERO));
        policy.meter_pricing.insert("workflow.completed".to_string(), workflow_pricing());
        policy.exclusions.push(crate::policy::Exclusion {
            when: "workflow.completed".to_string(),
            drop: vec!["api.calls".to_string()],
        });

        let engine = RatingEngine::new(store, NoSettlements, ZeroCogs);
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let result = engine.rate(customer, day_period(), &policy, now).await.unwrap();

        assert!(result.lines.iter().all(|l| l.meter_key != "api.calls"));
    }

    #[tokio::test]
    async fn scenario_4_spend_cap_clamps_total() {
        let customer = Uuid::new_v4();
        let store = InMemoryMeterReadingStore::new();
        seed(&store, customer, "workflow.completed", Decimal::from(15)).await;

        let mut policy = RatingPolicy::new();
        policy.meter_pricing.insert("workflow.completed".to_string(), workflow_pricing());
        policy.spend_cap = Some(Decimal::from(100));

        let engine = RatingEngine::new(store, NoSettlements, ZeroCogs);
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let result = engine.rate(customer, day_period(), &policy, now).await.unwrap();

        assert_eq!(result.subtotal, Decimal::from(150));
        assert_eq!(result.total, Decimal::from(100));
        assert_eq!(result.discount, Decimal::from(50));
    }

    #[tokio::test]
    async fn scenario_5_success_fee_with_holdback() {
        use dualrail_core::model::WorkflowRun;
        use dualrail_outcomes::{InMemoryOutcomeStore, InMemoryWorkflowRunDirectory, OutcomeVerifier};
        use std::sync::Arc;

        let customer = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();

        let runs = Arc::new(InMemoryWorkflowRunDirectory::new());
        let verifier = OutcomeVerifier::new(Arc::new(InMemoryOutcomeStore::new()), runs.clone());
        for _ in 0..3 {
            let mut run = WorkflowRun::started(customer, t0);
            run.status = dualrail_core::model::WorkflowRunStatus::Completed;
            let run_id = run.id;
            runs.insert(run);
            let record = verifier
                .create(t0, run_id, customer, "outcome.ticket_resolved", None, None, 0, HashMap::new())
                .await
                .unwrap();
            verifier.verify(t0, record.id, true, None).await.unwrap();
        }

        let store = InMemoryMeterReadingStore::new();
        let mut policy = RatingPolicy::new();
        policy.success_fees.insert(
            "outcome.ticket_resolved".to_string(),
            crate::policy::SuccessFeeConfig {
                price_per_unit: Decimal::from(25),
                ..Default::default()
            },
        );

        let engine = RatingEngine::new(store, verifier, ZeroCogs);
        let now = t0 + chrono::Duration::seconds(1);
        let result = engine.rate(customer, day_period(), &policy, now).await.unwrap();

        let line = result.lines.iter().find(|l| l.meter_key == "outcome.ticket_resolved").unwrap();
        assert_eq!(line.billable_quantity, Decimal::from(3));
        assert_eq!(line.amount, Decimal::from(75));
    }

    #[tokio::test]
    async fn rating_same_period_twice_is_idempotent() {
        let customer = Uuid::new_v4();
        let store = InMemoryMeterReadingStore::new();
        seed(&store, customer, "workflow.completed", Decimal::from(3)).await;

        let mut policy = RatingPolicy::new();
        policy.meter_pricing.insert("workflow.completed".to_string(), workflow_pricing());

        let engine = RatingEngine::new(store, NoSettlements, ZeroCogs);
        let now = Utc.with_ymd_and_hms(2026, 1, 2, 0, 0, 0).unwrap();
        let first = engine.rate(customer, day_period(), &policy, now).await.unwrap();
        let second = engine.rate(customer, day_period(), &policy, now).await.unwrap();
        assert_eq!(first.total, second.total);
        assert_eq!(first.lines.len(), second.lines.len());
    }
}
