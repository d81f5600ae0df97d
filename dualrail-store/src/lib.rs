//! Trait contracts and in-memory reference implementations for the Event
//! Store (C2), Meter-Reading Store (C3), and Cost Ledger (C4).
//!
//! Persistence and schema choice are out of scope for this pipeline; these
//! in-memory implementations are the default a caller gets, matching the
//! contracts the rest of the workspace depends on.

pub mod audit_log;
pub mod cost_ledger;
pub mod error;
pub mod event_store;
pub mod rated_usage;
pub mod reading_store;
pub mod workflow_runs;

pub use audit_log::{AuditLogStore, InMemoryAuditLogStore};
pub use cost_ledger::{CostLedger, InMemoryCostLedger};
pub use error::StoreError;
pub use event_store::{EventStore, InMemoryEventStore};
pub use rated_usage::{InMemoryRatedUsageStore, RatedUsageStore};
pub use reading_store::{InMemoryMeterReadingStore, MeterReadingStore, SortOrder};
pub use workflow_runs::{InMemoryWorkflowRunStore, WorkflowRunStore};
