//! COGS Calculator (C9): period COGS, per-meter attribution, and margin
//! analysis against a `RatingResult`'s revenue lines.

use std::collections::HashMap;

use dualrail_core::model::CostType;
use dualrail_core::period::Window;
use dualrail_store::{CostLedger, MeterReadingStore, WorkflowRunStore};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::attribution::allowlist_for_meter;
use crate::error::CogsError;

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodCogs {
    pub total_cogs: Decimal,
    pub cogs_by_type: HashMap<CostType, Decimal>,
    pub cost_records_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterCogs {
    pub meter_key: String,
    pub total_usage: Decimal,
    pub attributed_cogs: Decimal,
    pub cost_per_unit: Decimal,
    pub readings_count: usize,
}

/// A single billed line the rating engine produced, the input to margin
/// analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct RevenueLine {
    pub meter_key: Option<String>,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfitabilityScore {
    Excellent,
    Good,
    Fair,
    Poor,
    Loss,
}

impl ProfitabilityScore {
    /// `margin_percentage` is a 0-100 scaled percentage, matching the
    /// thresholds the margin-analysis report is scored against.
    pub fn from_margin_percentage(margin_percentage: Decimal) -> Self {
        if margin_percentage >= Decimal::from(50) {
            ProfitabilityScore::Excellent
        } else if margin_percentage >= Decimal::from(30) {
            ProfitabilityScore::Good
        } else if margin_percentage >= Decimal::from(15) {
            ProfitabilityScore::Fair
        } else if margin_percentage >= Decimal::ZERO {
            ProfitabilityScore::Poor
        } else {
            ProfitabilityScore::Loss
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeterMargin {
    pub revenue: Decimal,
    pub cogs: Decimal,
    pub margin: Decimal,
    pub margin_percentage: Decimal,
    pub cost_per_unit: Decimal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarginAnalysis {
    pub customer_id: Uuid,
    pub period: Window,
    pub total_revenue: Decimal,
    pub total_cogs: Decimal,
    pub gross_margin: Decimal,
    pub margin_percentage: Decimal,
    pub cogs_by_type: HashMap<CostType, Decimal>,
    pub meter_margins: HashMap<String, MeterMargin>,
    pub profitability_score: ProfitabilityScore,
}

pub struct CogsCalculator<L: CostLedger, R: MeterReadingStore, W: WorkflowRunStore> {
    ledger: L,
    readings: R,
    runs: W,
}

fn margin_percentage(margin: Decimal, revenue: Decimal) -> Decimal {
    if revenue > Decimal::ZERO {
        margin / revenue * Decimal::from(100)
    } else {
        Decimal::ZERO
    }
}

impl<L: CostLedger, R: MeterReadingStore, W: WorkflowRunStore> CogsCalculator<L, R, W> {
    pub fn new(ledger: L, readings: R, runs: W) -> Self {
        Self { ledger, readings, runs }
    }

    /// Total COGS for a customer's period, across all of that customer's
    /// workflow runs started or finished inside the period.
    pub async fn period_cogs(
        &self,
        customer_id: Uuid,
        period: Window,
    ) -> Result<PeriodCogs, CogsError> {
        let runs = self.runs.list_by_customer(customer_id, period).await;
        let run_ids: Vec<Uuid> = runs.iter().map(|r| r.id).collect();
        let records = self.ledger.filter(Some(&run_ids), Some(period), None).await?;

        let mut cogs_by_type: HashMap<CostType, Decimal> = HashMap::new();
        let mut total_cogs = Decimal::ZERO;
        for record in &records {
            *cogs_by_type.entry(record.cost_type).or_insert(Decimal::ZERO) += record.cost_amount;
            total_cogs += record.cost_amount;
        }

        Ok(PeriodCogs { total_cogs, cogs_by_type, cost_records_count: records.len() })
    }

    /// COGS attributed to a single meter: the customer's workflow runs in
    /// the period, filtered to the cost types that meter's prefix allows.
    pub async fn meter_cogs(
        &self,
        customer_id: Uuid,
        meter_key: &str,
        period: Window,
    ) -> Result<MeterCogs, CogsError> {
        let readings = self
            .readings
            .list(customer_id, Some(meter_key), period, dualrail_store::SortOrder::Ascending)
            .await?;

        if readings.is_empty() {
            return Ok(MeterCogs {
                meter_key: meter_key.to_string(),
                total_usage: Decimal::ZERO,
                attributed_cogs: Decimal::ZERO,
                cost_per_unit: Decimal::ZERO,
                readings_count: 0,
            });
        }

        let total_usage: Decimal = readings.iter().fold(Decimal::ZERO, |acc, r| acc + r.value);

        let runs = self.runs.list_by_customer(customer_id, period).await;
        let run_ids: Vec<Uuid> = runs.iter().map(|r| r.id).collect();
        let records = self.ledger.filter(Some(&run_ids), Some(period), None).await?;

        let attributed_cogs = match allowlist_for_meter(meter_key) {
            Some(allowed) => records
                .iter()
                .filter(|r| allowed.contains(&r.cost_type))
                .fold(Decimal::ZERO, |acc, r| acc + r.cost_amount),
            None => records.iter().fold(Decimal::ZERO, |acc, r| acc + r.cost_amount),
        };

        let cost_per_unit =
            if total_usage > Decimal::ZERO { attributed_cogs / total_usage } else { Decimal::ZERO };

        Ok(MeterCogs {
            meter_key: meter_key.to_string(),
            total_usage,
            attributed_cogs,
            cost_per_unit,
            readings_count: readings.len(),
        })
    }

    /// Revenue against COGS, with a per-meter breakdown and a qualitative
    /// profitability score.
    pub async fn margin_analysis(
        &self,
        customer_id: Uuid,
        period: Window,
        revenue_lines: &[RevenueLine],
    ) -> Result<MarginAnalysis, CogsError> {
        let period_cogs = self.period_cogs(customer_id, period).await?;
        let total_revenue = revenue_lines.iter().fold(Decimal::ZERO, |acc, l| acc + l.amount);
        let gross_margin = total_revenue - period_cogs.total_cogs;
        let margin_pct = margin_percentage(gross_margin, total_revenue);

        let mut meter_margins = HashMap::new();
        for line in revenue_lines {
            let Some(meter_key) = &line.meter_key else { continue };
            let meter = self.meter_cogs(customer_id, meter_key, period).await?;
            let margin = line.amount - meter.attributed_cogs;
            meter_margins.insert(
                meter_key.clone(),
                MeterMargin {
                    revenue: line.amount,
                    cogs: meter.attributed_cogs,
                    margin,
                    margin_percentage: margin_percentage(margin, line.amount),
                    cost_per_unit: meter.cost_per_unit,
                },
            );
        }

        Ok(MarginAnalysis {
            customer_id,
            period,
            total_revenue,
            total_cogs: period_cogs.total_cogs,
            gross_margin,
            margin_percentage: margin_pct,
            cogs_by_type: period_cogs.cogs_by_type,
            meter_margins,
            profitability_score: ProfitabilityScore::from_margin_percentage(margin_pct),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use dualrail_core::model::{NewCostRecord, NewMeterReading, WorkflowRun};
    use dualrail_store::{InMemoryCostLedger, InMemoryMeterReadingStore, InMemoryWorkflowRunStore};

    fn period() -> Window {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        Window::new(start, start + chrono::Duration::days(30))
    }

    async fn seeded_calculator(
        customer: Uuid,
    ) -> CogsCalculator<InMemoryCostLedger, InMemoryMeterReadingStore, InMemoryWorkflowRunStore> {
        let ledger = InMemoryCostLedger::new();
        let readings = InMemoryMeterReadingStore::new();
        let runs = InMemoryWorkflowRunStore::new();
        let p = period();

        let run = WorkflowRun::started(customer, p.start);
        let run_id = run.id;
        runs.upsert(run).await.unwrap();

        ledger
            .append(NewCostRecord {
                workflow_run_id: Some(run_id),
                ts: p.start,
                cost_amount: Decimal::from(40),
                cost_type: CostType::Tokens,
                details: None,
            })
            .await
            .unwrap();
        ledger
            .append(NewCostRecord {
                workflow_run_id: Some(run_id),
                ts: p.start,
                cost_amount: Decimal::from(10),
                cost_type: CostType::Compute,
                details: None,
            })
            .await
            .unwrap();

        readings
            .upsert(NewMeterReading::new(
                customer,
                "llm.tokens",
                p.start,
                p.start + chrono::Duration::minutes(5),
                Decimal::from(1000),
            ))
            .await
            .unwrap();

        CogsCalculator::new(ledger, readings, runs)
    }

    #[tokio::test]
    async fn period_cogs_sums_all_cost_types() {
        let customer = Uuid::new_v4();
        let calc = seeded_calculator(customer).await;
        let result = calc.period_cogs(customer, period()).await.unwrap();
        assert_eq!(result.total_cogs, Decimal::from(50));
        assert_eq!(result.cogs_by_type.get(&CostType::Tokens), Some(&Decimal::from(40)));
        assert_eq!(result.cogs_by_type.get(&CostType::Compute), Some(&Decimal::from(10)));
    }

    #[tokio::test]
    async fn meter_cogs_restricts_to_meter_prefix_allowlist() {
        let customer = Uuid::new_v4();
        let calc = seeded_calculator(customer).await;
        let result = calc.meter_cogs(customer, "llm.tokens", period()).await.unwrap();
        assert_eq!(result.attributed_cogs, Decimal::from(40));
        assert_eq!(result.total_usage, Decimal::from(1000));
        assert_eq!(result.cost_per_unit, Decimal::from(40) / Decimal::from(1000));
    }

    #[tokio::test]
    async fn meter_cogs_with_no_readings_is_zeroed() {
        let customer = Uuid::new_v4();
        let calc = seeded_calculator(customer).await;
        let result = calc.meter_cogs(customer, "storage.gbh", period()).await.unwrap();
        assert_eq!(result.total_usage, Decimal::ZERO);
        assert_eq!(result.attributed_cogs, Decimal::ZERO);
        assert_eq!(result.readings_count, 0);
    }

    #[tokio::test]
    async fn margin_analysis_scores_profitability() {
        let customer = Uuid::new_v4();
        let calc = seeded_calculator(customer).await;
        let lines = vec![RevenueLine { meter_key: Some("llm.tokens".to_string()), amount: Decimal::from(100) }];
        let analysis = calc.margin_analysis(customer, period(), &lines).await.unwrap();
        assert_eq!(analysis.total_revenue, Decimal::from(100));
        assert_eq!(analysis.total_cogs, Decimal::from(50));
        assert_eq!(analysis.gross_margin, Decimal::from(50));
        assert_eq!(analysis.profitability_score, ProfitabilityScore::Excellent);
        let meter_margin = analysis.meter_margins.get("llm.tokens").unwrap();
        assert_eq!(meter_margin.cogs, Decimal::from(40));
    }

    #[test]
    fn profitability_score_thresholds() {
        assert_eq!(ProfitabilityScore::from_margin_percentage(Decimal::from(60)), ProfitabilityScore::Excellent);
        assert_eq!(ProfitabilityScore::from_margin_percentage(Decimal::from(35)), ProfitabilityScore::Good);
        assert_eq!(ProfitabilityScore::from_margin_percentage(Decimal::from(20)), ProfitabilityScore::Fair);
        assert_eq!(ProfitabilityScore::from_margin_percentage(Decimal::from(5)), ProfitabilityScore::Poor);
        assert_eq!(ProfitabilityScore::from_margin_percentage(Decimal::from(-5)), ProfitabilityScore::Loss);
    }
}
