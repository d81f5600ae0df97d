//! Scheduler (C11): the six duty cycles from spec §4.11, each run under a
//! deadline and with bounded concurrency, reporting results back as a
//! `CycleReport` rather than ever panicking past this boundary — a single
//! customer or connector failing must not abort the rest of the cycle.

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use dualrail_core::period::DatePeriod;
use dualrail_rating::PeriodLockRegistry;
use dualrail_store::{EventStore, RatedUsageStore};
use futures::stream::{self, StreamExt};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backoff::{retry_with_backoff, DEFAULT_DELAYS};
use crate::error::SchedulerError;
use crate::pipeline::Pipeline;

const RECENT_EVENTS_LOOKBACK: Duration = Duration::hours(2);
const ANOMALY_SILENCE_HOURS: u32 = dualrail_anomaly::DEFAULT_SILENCE_HOURS;
const SPIKE_MULTIPLIER: f64 = dualrail_anomaly::DEFAULT_SPIKE_THRESHOLD_MULTIPLIER;

/// Outcome of one duty-cycle invocation. `succeeded`/`failed` count
/// per-customer or per-connector units of work within the cycle; a cycle
/// that misses its deadline still returns a report with the timeout
/// recorded as a single failure rather than propagating an error.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    pub cycle: &'static str,
    pub succeeded: u64,
    pub failed: u64,
    pub errors: Vec<String>,
}

impl CycleReport {
    fn new(cycle: &'static str) -> Self {
        Self { cycle, ..Default::default() }
    }

    fn timed_out(cycle: &'static str, deadline: StdDuration) -> Self {
        let mut report = Self::new(cycle);
        report.failed = 1;
        report.errors.push(format!("cycle exceeded its deadline of {deadline:?}"));
        report
    }
}

pub struct Scheduler {
    pub pipeline: Pipeline,
    rating_locks: PeriodLockRegistry,
}

impl Scheduler {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline, rating_locks: PeriodLockRegistry::new() }
    }

    /// Derive from events in the last 2 hours (spec §4.11 recent-events
    /// cycle), retried up to 3 times on store errors since derivation is
    /// idempotent over the same event window.
    pub async fn run_recent_events_cycle(
        &self,
        now: DateTime<Utc>,
        deadline: StdDuration,
    ) -> CycleReport {
        let cycle = "recent-events";
        let from = now - RECENT_EVENTS_LOOKBACK;

        let attempt = retry_with_backoff(cycle, &DEFAULT_DELAYS, || {
            self.pipeline.deriver.derive(None, Some(from), Some(now), None)
        });

        match tokio::time::timeout(deadline, attempt).await {
            Ok(Ok(result)) => {
                info!(
                    windows = result.windows_processed,
                    readings = result.readings_emitted,
                    "recent-events cycle complete"
                );
                let mut report = CycleReport::new(cycle);
                report.succeeded = result.windows_processed;
                report
            }
            Ok(Err(err)) => {
                error!(%err, "recent-events cycle failed after retries");
                let mut report = CycleReport::new(cycle);
                report.failed = 1;
                report.errors.push(err.to_string());
                report
            }
            Err(_) => {
                error!(cycle, ?deadline, "cycle missed its deadline");
                CycleReport::timed_out(cycle, deadline)
            }
        }
    }

    /// Run every configured connector's collection tick (spec §4.7/§4.11),
    /// bounded by `metrics_max_concurrent` connectors running at once.
    pub async fn run_external_metrics_cycle(
        &self,
        now: DateTime<Utc>,
        deadline: StdDuration,
    ) -> CycleReport {
        let cycle = "external-metrics";
        let sources = self.pipeline.connectors.all();
        let concurrency = self.pipeline.settings.metrics_max_concurrent.max(1);

        let run_all = stream::iter(sources.into_iter().map(|source| {
            let importer = self.pipeline.importer.clone();
            async move {
                let label = source.id.clone();
                retry_with_backoff(&label, &DEFAULT_DELAYS, || importer.collect(&source, now)).await
            }
        }))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>();

        match tokio::time::timeout(deadline, run_all).await {
            Ok(results) => {
                let mut report = CycleReport::new(cycle);
                for result in results {
                    match result {
                        Ok(collected) => {
                            info!(
                                data_source = %collected.data_source,
                                readings = collected.readings_emitted,
                                "connector collection complete"
                            );
                            report.succeeded += 1;
                        }
                        Err(err) => {
                            warn!(%err, "connector collection failed after retries");
                            report.failed += 1;
                            report.errors.push(err.to_string());
                        }
                    }
                }
                report
            }
            Err(_) => {
                error!(cycle, ?deadline, "cycle missed its deadline");
                CycleReport::timed_out(cycle, deadline)
            }
        }
    }

    /// Rate a single `(customer, period)` under its per-customer logical
    /// lock (spec §5), upserting the existing `RatedUsage` row in place
    /// when one already exists so re-rating never duplicates the row.
    async fn rate_customer_period(
        &self,
        customer_id: Uuid,
        period: DatePeriod,
        now: DateTime<Utc>,
    ) -> Result<(), SchedulerError> {
        let _guard = self.rating_locks.acquire(customer_id, period).await;

        let policy = self
            .pipeline
            .policies
            .policy_for(customer_id)
            .await
            .ok_or(SchedulerError::NoPolicy(customer_id))?;

        let result = self.pipeline.engine.rate(customer_id, period, &policy, now).await?;
        let existing_id =
            self.pipeline.rated_usage.get(customer_id, period.start, period.end).await.ok().map(|r| r.id);
        let row = result.to_rated_usage(existing_id.unwrap_or_else(Uuid::new_v4));
        self.pipeline.rated_usage.upsert(row).await?;
        Ok(())
    }

    async fn rate_active_customers(
        &self,
        cycle: &'static str,
        period: DatePeriod,
        now: DateTime<Utc>,
        deadline: StdDuration,
    ) -> CycleReport {
        let customers = self.pipeline.customers.list_active().await;
        let concurrency = self.pipeline.settings.rating_worker_concurrency.max(1);

        let run_all = stream::iter(customers.into_iter().map(|customer_id| async move {
            (customer_id, self.rate_customer_period(customer_id, period, now).await)
        }))
        .buffer_unordered(concurrency)
        .collect::<Vec<_>>();

        match tokio::time::timeout(deadline, run_all).await {
            Ok(results) => {
                let mut report = CycleReport::new(cycle);
                for (customer_id, result) in results {
                    match result {
                        Ok(()) => report.succeeded += 1,
                        Err(err) => {
                            warn!(%customer_id, %err, "rating failed for customer");
                            report.failed += 1;
                            report.errors.push(format!("{customer_id}: {err}"));
                        }
                    }
                }
                report
            }
            Err(_) => {
                error!(cycle, ?deadline, "cycle missed its deadline");
                CycleReport::timed_out(cycle, deadline)
            }
        }
    }

    /// Rate yesterday (UTC calendar day) for every active customer.
    pub async fn run_daily_rating_cycle(&self, now: DateTime<Utc>, deadline: StdDuration) -> CycleReport {
        let yesterday = (now - Duration::days(1)).date_naive();
        let period = DatePeriod::day(yesterday);
        self.rate_active_customers("daily-rating", period, now, deadline).await
    }

    /// Rate the previous calendar month for every active customer,
    /// intended to run once after month end (spec §4.11).
    pub async fn run_monthly_rating_cycle(&self, now: DateTime<Utc>, deadline: StdDuration) -> CycleReport {
        let this_month_start = DatePeriod::month(now.date_naive()).start;
        let previous_month_date = this_month_start - Duration::days(1);
        let period = DatePeriod::month(previous_month_date);
        self.rate_active_customers("monthly-rating", period, now, deadline).await
    }

    /// Spike and silence detection across every active customer's canonical
    /// meters (spec §4.12).
    pub async fn run_anomaly_scan_cycle(&self, now: DateTime<Utc>, deadline: StdDuration) -> CycleReport {
        let cycle = "anomaly-scan";
        let customers = self.pipeline.customers.list_active().await;

        let scan_one = |customer_id: Uuid| async move {
            let mut errors = Vec::new();
            let mut anomaly_count = 0usize;

            match self.pipeline.anomaly.detect_silence(customer_id, now, ANOMALY_SILENCE_HOURS).await {
                Ok(found) => anomaly_count += found.len(),
                Err(err) => errors.push(format!("{customer_id} silence: {err}")),
            }

            for meter in dualrail_core::catalog::CANONICAL_EDGE_METERS
                .iter()
                .copied()
                .chain(dualrail_core::catalog::CANONICAL_WORK_METERS.iter().copied())
            {
                match self.pipeline.anomaly.detect_usage_spikes(customer_id, meter, now, SPIKE_MULTIPLIER).await {
                    Ok(found) => anomaly_count += found.len(),
                    Err(err) => errors.push(format!("{customer_id} {meter}: {err}")),
                }
            }

            if anomaly_count > 0 {
                info!(%customer_id, anomaly_count, "anomalies detected");
            }
            (customer_id, errors)
        };

        let run_all = stream::iter(customers.into_iter().map(scan_one))
            .buffer_unordered(self.pipeline.settings.metrics_max_concurrent.max(1))
            .collect::<Vec<_>>();

        match tokio::time::timeout(deadline, run_all).await {
            Ok(results) => {
                let mut report = CycleReport::new(cycle);
                for (_customer_id, errors) in results {
                    if errors.is_empty() {
                        report.succeeded += 1;
                    } else {
                        report.failed += 1;
                        report.errors.extend(errors);
                    }
                }
                report
            }
            Err(_) => {
                error!(cycle, ?deadline, "cycle missed its deadline");
                CycleReport::timed_out(cycle, deadline)
            }
        }
    }

    /// Delete raw events and rated-usage rows past their retention window
    /// (spec §4.11 cleanup cycle).
    pub async fn run_cleanup_cycle(&self, now: DateTime<Utc>, deadline: StdDuration) -> CycleReport {
        let cycle = "cleanup";
        let event_cutoff = now - Duration::days(self.pipeline.settings.event_retention_days as i64);
        let rated_usage_cutoff =
            (now - Duration::days(self.pipeline.settings.rated_usage_retention_days as i64)).date_naive();

        let cleanup = async {
            let events_removed = retry_with_backoff("cleanup-events", &DEFAULT_DELAYS, || {
                EventStore::delete_before(&self.pipeline.events, event_cutoff)
            })
            .await;
            let rated_removed = retry_with_backoff("cleanup-rated-usage", &DEFAULT_DELAYS, || {
                RatedUsageStore::delete_before(&self.pipeline.rated_usage, rated_usage_cutoff)
            })
            .await;
            (events_removed, rated_removed)
        };

        match tokio::time::timeout(deadline, cleanup).await {
            Ok((events_removed, rated_removed)) => {
                let mut report = CycleReport::new(cycle);
                match events_removed {
                    Ok(n) => {
                        info!(removed = n, "deleted expired raw events");
                        report.succeeded += 1;
                    }
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push(format!("event cleanup: {err}"));
                    }
                }
                match rated_removed {
                    Ok(n) => {
                        info!(removed = n, "deleted expired rated-usage rows");
                        report.succeeded += 1;
                    }
                    Err(err) => {
                        report.failed += 1;
                        report.errors.push(format!("rated-usage cleanup: {err}"));
                    }
                }
                report
            }
            Err(_) => {
                error!(cycle, ?deadline, "cycle missed its deadline");
                CycleReport::timed_out(cycle, deadline)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Pipeline;
    use crate::policy::InMemoryPolicyDirectory;
    use dualrail_core::model::{NewMeterReading, NewRawEvent, RawEventType};
    use dualrail_core::Settings;
    use dualrail_ingest::InMemoryCustomerDirectory;
    use dualrail_metrics::ConnectorRegistry;
    use dualrail_rating::RatingPolicy;
    use dualrail_store::MeterReadingStore;
    use rust_decimal::Decimal;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn priced_policy() -> RatingPolicy {
        let mut policy = RatingPolicy::new();
        policy.meter_pricing.insert(
            "api.calls".to_string(),
            dualrail_rating::MeterPricing {
                included_quota: Decimal::ZERO,
                tiers: vec![dualrail_rating::PricingTier::new(Decimal::ZERO, None, Decimal::new(5, 1))],
                unit: "calls".to_string(),
            },
        );
        policy
    }

    fn scheduler_with_customer(customer_id: Uuid) -> Scheduler {
        let customers = Arc::new(InMemoryCustomerDirectory::with_customers([customer_id]));
        let policies = Arc::new(InMemoryPolicyDirectory::new());
        policies.set(customer_id, priced_policy());
        let connectors = Arc::new(ConnectorRegistry::new());
        let pipeline = Pipeline::new(Settings::default(), customers, policies, connectors);
        Scheduler::new(pipeline)
    }

    #[tokio::test]
    async fn recent_events_cycle_derives_from_appended_events() {
        let customer = Uuid::new_v4();
        let scheduler = scheduler_with_customer(customer);
        let now = Utc::now();

        scheduler
            .pipeline
            .events
            .append(NewRawEvent {
                customer_id: customer,
                ts: now,
                event_type: RawEventType::SpanStarted,
                trace_id: Some("t1".into()),
                span_id: Some("s1".into()),
                payload: json!({ "edge": { "api_calls": "3" } }),
            })
            .await
            .unwrap();

        let report = scheduler.run_recent_events_cycle(now, StdDuration::from_secs(5)).await;
        assert_eq!(report.cycle, "recent-events");
        assert_eq!(report.failed, 0);
        assert!(report.succeeded > 0);
    }

    #[tokio::test]
    async fn daily_rating_cycle_rates_customer_with_readings() {
        let customer = Uuid::new_v4();
        let scheduler = scheduler_with_customer(customer);
        let now = Utc::now();
        let yesterday = (now - Duration::days(1)).date_naive();
        let period = DatePeriod::day(yesterday);
        let window = period.to_instant_window();

        scheduler
            .pipeline
            .readings
            .upsert(NewMeterReading::new(customer, "api.calls", window.start, window.end, Decimal::from(10)))
            .await
            .unwrap();

        let report = scheduler.run_daily_rating_cycle(now, StdDuration::from_secs(5)).await;
        assert_eq!(report.cycle, "daily-rating");
        assert_eq!(report.failed, 0);
        assert_eq!(report.succeeded, 1);

        let stored = scheduler.pipeline.rated_usage.get(customer, period.start, period.end).await.unwrap();
        assert!(stored.subtotal > Decimal::ZERO);
    }

    #[tokio::test]
    async fn rating_cycle_reports_failure_for_unconfigured_policy() {
        let customer = Uuid::new_v4();
        let customers = Arc::new(InMemoryCustomerDirectory::with_customers([customer]));
        let policies = Arc::new(InMemoryPolicyDirectory::new());
        let connectors = Arc::new(ConnectorRegistry::new());
        let pipeline = Pipeline::new(Settings::default(), customers, policies, connectors);
        let scheduler = Scheduler::new(pipeline);

        let report = scheduler.run_daily_rating_cycle(Utc::now(), StdDuration::from_secs(5)).await;
        assert_eq!(report.failed, 1);
        assert_eq!(report.succeeded, 0);
    }

    #[tokio::test]
    async fn anomaly_scan_cycle_completes_for_quiet_customer() {
        let customer = Uuid::new_v4();
        let scheduler = scheduler_with_customer(customer);
        let report = scheduler.run_anomaly_scan_cycle(Utc::now(), StdDuration::from_secs(5)).await;
        assert_eq!(report.cycle, "anomaly-scan");
        assert_eq!(report.failed, 0);
        assert_eq!(report.succeeded, 1);
    }

    #[tokio::test]
    async fn cleanup_cycle_removes_nothing_when_empty() {
        let customer = Uuid::new_v4();
        let scheduler = scheduler_with_customer(customer);
        let report = scheduler.run_cleanup_cycle(Utc::now(), StdDuration::from_secs(5)).await;
        assert_eq!(report.cycle, "cleanup");
        assert_eq!(report.failed, 0);
        assert_eq!(report.succeeded, 2);
    }

    #[tokio::test]
    async fn cycle_that_exceeds_its_deadline_is_reported_as_timed_out() {
        let customer = Uuid::new_v4();
        let scheduler = scheduler_with_customer(customer);
        let report = scheduler.run_recent_events_cycle(Utc::now(), StdDuration::from_nanos(1)).await;
        assert_eq!(report.failed, 1);
        assert!(report.errors[0].contains("deadline"));
    }
}
