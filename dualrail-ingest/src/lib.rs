//! Event Normalizer (C5): turns trace-style telemetry and direct outcome
//! submissions into `RawEvent`s, plus the usage-preview and adjustment
//! surfaces the ingestion API sits on top of.

pub mod adjustments;
pub mod attributes;
pub mod customers;
pub mod error;
pub mod normalizer;
pub mod preview;
pub mod trace;

pub use adjustments::{record_adjustment, AdjustmentRequest};
pub use customers::{CustomerDirectory, InMemoryCustomerDirectory};
pub use error::NormalizeError;
pub use normalizer::EventNormalizer;
pub use preview::{usage_preview, PreviewBreakdown, UsagePreview};
pub use trace::{ExportResult, OutcomeEventRequest, TraceExportRequest};
