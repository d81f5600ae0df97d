//! Shared entity types for the metering and rating pipeline.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A billable tenant. Created and administered externally; every other
/// entity in this crate references a customer by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: Uuid,
    pub display_name: String,
    pub currency: String,
    pub external_billing_id: Option<String>,
    pub active: bool,
}

impl Customer {
    pub fn new(display_name: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            display_name: display_name.into(),
            currency: currency.into(),
            external_billing_id: None,
            active: true,
        }
    }
}

/// A versioned workflow shape. Unique by (key, version); immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub key: String,
    pub version: u32,
    pub schema: serde_json::Value,
    pub active: bool,
}

/// Status of a single workflow execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowRunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A single execution of a `WorkflowDefinition`, created at span start and
/// finalized at span end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowRun {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub definition_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: WorkflowRunStatus,
    pub metadata: Option<serde_json::Value>,
}

impl WorkflowRun {
    pub fn started(customer_id: Uuid, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            customer_id,
            definition_id: None,
            started_at,
            ended_at: None,
            status: WorkflowRunStatus::Running,
            metadata: None,
        }
    }
}

/// The kind of telemetry a `RawEvent` carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RawEventType {
    SpanStarted,
    SpanEnded,
    SpanEvent,
    Outcome,
    Counter,
}

/// An append-only, logically immutable piece of normalized telemetry.
///
/// `id` is a monotonic integer assigned by the event store on insert, not by
/// the caller. Uniqueness key is `(trace_id, span_id, event_type, ts)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawEvent {
    pub id: u64,
    pub customer_id: Uuid,
    pub ts: DateTime<Utc>,
    pub event_type: RawEventType,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub payload: serde_json::Value,
}

/// A pending `RawEvent` not yet assigned a store id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewRawEvent {
    pub customer_id: Uuid,
    pub ts: DateTime<Utc>,
    pub event_type: RawEventType,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub payload: serde_json::Value,
}

impl NewRawEvent {
    /// The idempotency key the event store dedups insertion on.
    pub fn dedup_key(&self) -> (Option<String>, Option<String>, RawEventType, DateTime<Utc>) {
        (self.trace_id.clone(), self.span_id.clone(), self.event_type, self.ts)
    }
}

/// An aggregated value for one meter over one half-open time window.
///
/// Unique on `(customer_id, meter_key, window_start, window_end)`. Values are
/// additive: a second upsert against the same window adds to the existing
/// value rather than replacing it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeterReading {
    pub id: u64,
    pub customer_id: Uuid,
    pub meter_key: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub value: Decimal,
    pub src_event_ids: BTreeSet<u64>,
    pub metadata: Option<serde_json::Value>,
}

/// A not-yet-stored meter reading, as produced by the deriver or an external
/// metric importer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMeterReading {
    pub customer_id: Uuid,
    pub meter_key: String,
    pub window_start: DateTime<Utc>,
    pub window_end: DateTime<Utc>,
    pub value: Decimal,
    pub src_event_ids: BTreeSet<u64>,
    pub metadata: Option<serde_json::Value>,
}

impl NewMeterReading {
    pub fn new(
        customer_id: Uuid,
        meter_key: impl Into<String>,
        window_start: DateTime<Utc>,
        window_end: DateTime<Utc>,
        value: Decimal,
    ) -> Self {
        Self {
            customer_id,
            meter_key: meter_key.into(),
            window_start,
            window_end,
            value,
            src_event_ids: BTreeSet::new(),
            metadata: None,
        }
    }
}

/// The realized-cost side of the ledger, tagged by what kind of resource the
/// cost was incurred for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostType {
    Tokens,
    LlmApi,
    Compute,
    Cpu,
    Gpu,
    Memory,
    Storage,
    S3,
    Database,
    Disk,
    Api,
    VendorApi,
    ExternalService,
}

/// A single realized cost, attributable to a workflow run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostRecord {
    pub id: u64,
    pub workflow_run_id: Option<Uuid>,
    pub ts: DateTime<Utc>,
    pub cost_amount: Decimal,
    pub cost_type: CostType,
    pub details: Option<serde_json::Value>,
}

/// A not-yet-stored cost record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewCostRecord {
    pub workflow_run_id: Option<Uuid>,
    pub ts: DateTime<Utc>,
    pub cost_amount: Decimal,
    pub cost_type: CostType,
    pub details: Option<serde_json::Value>,
}

/// Lifecycle state of an outcome awaiting success-fee settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Pending,
    Verified,
    Reversed,
}

/// A business outcome tracked through verification and holdback before it
/// can contribute to success-fee billing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeVerification {
    pub id: Uuid,
    pub workflow_run_id: Uuid,
    pub customer_id: Uuid,
    pub outcome_key: String,
    pub external_system: Option<String>,
    pub external_ref: Option<String>,
    pub status: OutcomeStatus,
    pub holdback_until: DateTime<Utc>,
    pub settlement_days: u32,
    pub created_at: DateTime<Utc>,
    pub verified_at: Option<DateTime<Utc>>,
    pub reversal_reason: Option<String>,
    pub metadata: HashMap<String, serde_json::Value>,
}

/// One line of a `RatingResult`, after serialization for storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatedUsage {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub items: serde_json::Value,
    pub subtotal: Decimal,
    pub cogs: Decimal,
    pub margin: Decimal,
    pub external_pushed_at: Option<DateTime<Utc>>,
}

/// An append-only administrative trail entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditLog {
    pub id: u64,
    pub ts: DateTime<Utc>,
    pub actor: String,
    pub action: String,
    pub subject: String,
    pub details: Option<serde_json::Value>,
}
