//! DualRail scheduler process: runs the six duty cycles from spec §4.11 on
//! their own intervals. No HTTP surface — admin/query surfaces are out of
//! scope for this pipeline (spec §1 Non-goals).

use std::sync::Arc;
use std::time::Duration;

use dualrail_core::Settings;
use dualrail_ingest::InMemoryCustomerDirectory;
use dualrail_metrics::ConnectorRegistry;
use dualrail_scheduler::{InMemoryPolicyDirectory, Pipeline, Scheduler};

const DAILY_RATING_DEADLINE: Duration = Duration::from_secs(30 * 60);
const MONTHLY_RATING_DEADLINE: Duration = Duration::from_secs(60 * 60);
const ANOMALY_SCAN_DEADLINE: Duration = Duration::from_secs(10 * 60);
const CLEANUP_DEADLINE: Duration = Duration::from_secs(10 * 60);
const RECENT_EVENTS_DEADLINE: Duration = Duration::from_secs(2 * 60);

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let settings = Settings::from_env();
    let customers: Arc<dyn dualrail_ingest::CustomerDirectory> =
        Arc::new(InMemoryCustomerDirectory::new());
    let policies = Arc::new(InMemoryPolicyDirectory::new());
    let connectors = Arc::new(ConnectorRegistry::new());

    let external_metrics_interval =
        Duration::from_secs(settings.external_metrics_interval_sec.max(1) as u64);
    let pipeline = Pipeline::new(settings, customers, policies, connectors);
    let scheduler = Arc::new(Scheduler::new(pipeline));

    tracing::info!("dualrail-scheduler starting");

    let mut handles = Vec::new();

    handles.push(spawn_cycle(scheduler.clone(), Duration::from_secs(5 * 60), RECENT_EVENTS_DEADLINE, |s, now, deadline| {
        Box::pin(async move { s.run_recent_events_cycle(now, deadline).await })
    }));

    handles.push(spawn_cycle(
        scheduler.clone(),
        external_metrics_interval,
        Duration::from_secs(external_metrics_interval.as_secs().max(60)),
        |s, now, deadline| Box::pin(async move { s.run_external_metrics_cycle(now, deadline).await }),
    ));

    handles.push(spawn_cycle(scheduler.clone(), Duration::from_secs(24 * 60 * 60), DAILY_RATING_DEADLINE, |s, now, deadline| {
        Box::pin(async move { s.run_daily_rating_cycle(now, deadline).await })
    }));

    handles.push(spawn_cycle(
        scheduler.clone(),
        Duration::from_secs(24 * 60 * 60),
        MONTHLY_RATING_DEADLINE,
        |s, now, deadline| Box::pin(async move { s.run_monthly_rating_cycle(now, deadline).await }),
    ));

    handles.push(spawn_cycle(scheduler.clone(), Duration::from_secs(60 * 60), ANOMALY_SCAN_DEADLINE, |s, now, deadline| {
        Box::pin(async move { s.run_anomaly_scan_cycle(now, deadline).await })
    }));

    handles.push(spawn_cycle(scheduler.clone(), Duration::from_secs(24 * 60 * 60), CLEANUP_DEADLINE, |s, now, deadline| {
        Box::pin(async move { s.run_cleanup_cycle(now, deadline).await })
    }));

    for handle in handles {
        let _ = handle.await;
    }
}

type CycleFuture = std::pin::Pin<Box<dyn std::future::Future<Output = dualrail_scheduler::CycleReport> + Send>>;

fn spawn_cycle(
    scheduler: Arc<Scheduler>,
    period: Duration,
    deadline: Duration,
    run: impl Fn(Arc<Scheduler>, chrono::DateTime<chrono::Utc>, Duration) -> CycleFuture + Send + 'static,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            let now = chrono::Utc::now();
            let report = run(scheduler.clone(), now, deadline).await;
            if report.failed > 0 {
                tracing::warn!(cycle = report.cycle, failed = report.failed, succeeded = report.succeeded, errors = ?report.errors, "cycle completed with failures");
            } else {
                tracing::info!(cycle = report.cycle, succeeded = report.succeeded, "cycle completed");
            }
        }
    })
}
