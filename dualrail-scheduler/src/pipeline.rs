//! Concrete wiring of the pipeline's components behind the in-memory store
//! implementations (persistence/schema choice is out of scope for this
//! pipeline; see `dualrail-store`). Built once at process startup and
//! handed to the `Scheduler`, mirroring `ConnectorRegistry`'s
//! constructed-once-then-read-only shape rather than a module-level global.

use std::sync::Arc;

use dualrail_anomaly::AnomalyDetector;
use dualrail_cogs::CogsCalculator;
use dualrail_core::Settings;
use dualrail_deriver::Deriver;
use dualrail_ingest::CustomerDirectory;
use dualrail_metrics::{ConnectorRegistry, ImportDedupStore, InMemoryDedupStore, MetricsImporter};
use dualrail_outcomes::{InMemoryOutcomeStore, OutcomeVerifier};
use dualrail_rating::RatingEngine;
use dualrail_store::{
    InMemoryCostLedger, InMemoryEventStore, InMemoryMeterReadingStore, InMemoryRatedUsageStore,
    InMemoryWorkflowRunStore,
};

use crate::policy::PolicyDirectory;

pub type SharedEvents = Arc<InMemoryEventStore>;
pub type SharedReadings = Arc<InMemoryMeterReadingStore>;
pub type SharedRatedUsage = Arc<InMemoryRatedUsageStore>;
pub type SharedLedger = Arc<InMemoryCostLedger>;
pub type SharedRuns = Arc<InMemoryWorkflowRunStore>;
pub type SharedOutcomes = Arc<InMemoryOutcomeStore>;

pub type Verifier = OutcomeVerifier<InMemoryOutcomeStore, InMemoryWorkflowRunStore>;
pub type Cogs = CogsCalculator<SharedLedger, SharedReadings, SharedRuns>;
pub type Engine = RatingEngine<SharedReadings, Arc<Verifier>, Arc<Cogs>>;
pub type AnomalyScanner = AnomalyDetector<SharedReadings>;
pub type DerivationPass = Deriver<InMemoryEventStore, InMemoryMeterReadingStore>;
pub type MetricImport = MetricsImporter<InMemoryMeterReadingStore>;

/// Every component duty cycles read or write through, plus the process
/// settings that size their concurrency and retention.
pub struct Pipeline {
    pub events: SharedEvents,
    pub readings: SharedReadings,
    pub rated_usage: SharedRatedUsage,
    pub ledger: SharedLedger,
    pub runs: SharedRuns,
    pub outcomes: SharedOutcomes,
    pub customers: Arc<dyn CustomerDirectory>,
    pub policies: Arc<dyn PolicyDirectory>,
    pub connectors: Arc<ConnectorRegistry>,
    pub dedup: Arc<dyn ImportDedupStore>,
    pub deriver: Arc<DerivationPass>,
    pub importer: Arc<MetricImport>,
    pub verifier: Arc<Verifier>,
    pub cogs: Arc<Cogs>,
    pub engine: Arc<Engine>,
    pub anomaly: Arc<AnomalyScanner>,
    pub settings: Settings,
}

impl Pipeline {
    /// Build every component over fresh in-memory stores. `customers` and
    /// `policies` are injected since customer/plan administration lives
    /// outside this pipeline (spec §3); `connectors` is injected since it is
    /// the one long-lived registry an admin surface mutates between ticks.
    pub fn new(
        settings: Settings,
        customers: Arc<dyn CustomerDirectory>,
        policies: Arc<dyn PolicyDirectory>,
        connectors: Arc<ConnectorRegistry>,
    ) -> Self {
        let events = Arc::new(InMemoryEventStore::new());
        let readings = Arc::new(InMemoryMeterReadingStore::new());
        let rated_usage = Arc::new(InMemoryRatedUsageStore::new());
        let ledger = Arc::new(InMemoryCostLedger::new());
        let runs = Arc::new(InMemoryWorkflowRunStore::new());
        let outcomes = Arc::new(InMemoryOutcomeStore::new());
        let dedup: Arc<dyn ImportDedupStore> = Arc::new(InMemoryDedupStore::new());

        let verifier = Arc::new(OutcomeVerifier::new(outcomes.clone(), runs.clone()));
        let cogs = Arc::new(CogsCalculator::new(ledger.clone(), readings.clone(), runs.clone()));
        let engine = Arc::new(RatingEngine::new(readings.clone(), verifier.clone(), cogs.clone()));
        let deriver =
            Arc::new(Deriver::new(events.clone(), readings.clone(), settings.deriver_window_minutes));
        let importer = Arc::new(MetricsImporter::new(readings.clone(), customers.clone(), dedup.clone()));
        let anomaly = Arc::new(AnomalyDetector::new(readings.clone()));

        Self {
            events,
            readings,
            rated_usage,
            ledger,
            runs,
            outcomes,
            customers,
            policies,
            connectors,
            dedup,
            deriver,
            importer,
            verifier,
            cogs,
            engine,
            anomaly,
            settings,
        }
    }
}
