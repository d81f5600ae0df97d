//! Trace-export request shapes: nested resource -> scope -> spans -> events,
//! mirroring the shape an OTel-style collector would hand the ingestion API.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TraceExportRequest {
    pub resource_spans: Vec<ResourceSpans>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResourceSpans {
    #[serde(default)]
    pub resource_attributes: HashMap<String, Value>,
    #[serde(default)]
    pub scope_spans: Vec<ScopeSpans>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScopeSpans {
    #[serde(default)]
    pub spans: Vec<SpanData>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanData {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub parent_span_id: Option<String>,
    pub name: Option<String>,
    pub start_time_unix_nano: Option<i64>,
    pub end_time_unix_nano: Option<i64>,
    #[serde(default = "default_status")]
    pub status_code: String,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
    #[serde(default)]
    pub events: Vec<SpanEventData>,
}

fn default_status() -> String {
    "OK".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SpanEventData {
    pub name: Option<String>,
    pub time_unix_nano: Option<i64>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

/// A direct outcome submission: one event with explicit customer and event
/// name, bypassing the trace-span shape entirely.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeEventRequest {
    pub customer_id: uuid::Uuid,
    pub event_name: String,
    pub timestamp: Option<chrono::DateTime<chrono::Utc>>,
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub workflow_run_id: Option<uuid::Uuid>,
    #[serde(default)]
    pub attributes: HashMap<String, Value>,
}

/// Outcome of normalizing one `TraceExportRequest`: counts plus a per-item
/// error list. Partial success is the norm — other spans in the same export
/// continue when one fails.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportResult {
    pub spans_processed: u64,
    pub events_processed: u64,
    pub errors: Vec<String>,
}
