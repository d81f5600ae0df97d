//! Event Normalizer (C5): turns trace-style telemetry and direct outcome
//! submissions into `RawEvent`s stored via the Event Store.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dualrail_core::model::{NewRawEvent, RawEventType};
use dualrail_store::EventStore;
use serde_json::{json, Value};

use crate::attributes::{
    extract_billing_attributes, extract_edge_attributes, extract_outcome_attributes,
    extract_work_attributes, AttributeMap,
};
use crate::customers::CustomerDirectory;
use crate::error::NormalizeError;
use crate::trace::{ExportResult, OutcomeEventRequest, ScopeSpans, SpanData, TraceExportRequest};

pub struct EventNormalizer<S: EventStore> {
    store: Arc<S>,
    customers: Arc<dyn CustomerDirectory>,
}

impl<S: EventStore> EventNormalizer<S> {
    pub fn new(store: Arc<S>, customers: Arc<dyn CustomerDirectory>) -> Self {
        Self { store, customers }
    }

    /// Process an OTel-style export: resource -> scope -> spans -> events.
    /// Each span and each span event is processed independently; failures
    /// are collected, not propagated.
    pub async fn process_otel_export(&self, request: TraceExportRequest) -> ExportResult {
        let mut result = ExportResult::default();

        for resource_span in request.resource_spans {
            let resource_attrs = resource_span.resource_attributes;
            for ScopeSpans { spans } in resource_span.scope_spans {
                for span in spans {
                    let merged = merge_attrs(&resource_attrs, &span.attributes, None);
                    match self.process_span(&span, &merged).await {
                        Ok(()) => result.spans_processed += 1,
                        Err(e) => result.errors.push(format!("failed to process span: {e}")),
                    }

                    for event in &span.events {
                        let event_attrs = merge_attrs(&resource_attrs, &span.attributes, Some(&event.attributes));
                        match self.process_span_event(event, &span, &event_attrs).await {
                            Ok(()) => result.events_processed += 1,
                            Err(e) => {
                                result.errors.push(format!("failed to process span event: {e}"))
                            }
                        }
                    }
                }
            }
        }

        result
    }

    async fn process_span(
        &self,
        span: &SpanData,
        merged: &AttributeMap,
    ) -> Result<(), NormalizeError> {
        let billing = extract_billing_attributes(merged).ok_or(NormalizeError::MissingCustomerId)?;
        if !self.customers.exists(billing.customer_id).await {
            return Err(NormalizeError::UnknownCustomer(billing.customer_id));
        }

        let edge = extract_edge_attributes(merged);
        let work = extract_work_attributes(merged);

        let start_payload = json!({
            "span_name": span.name,
            "parent_span_id": span.parent_span_id,
            "attributes": merged,
            "billing": billing_json(&billing),
            "edge": serde_json::to_value(&edge).unwrap_or(Value::Null),
            "work": serde_json::to_value(&work).unwrap_or(Value::Null),
        });
        self.store
            .append(NewRawEvent {
                customer_id: billing.customer_id,
                ts: parse_unix_nano(span.start_time_unix_nano),
                event_type: RawEventType::SpanStarted,
                trace_id: span.trace_id.clone(),
                span_id: span.span_id.clone(),
                payload: start_payload,
            })
            .await?;

        if let Some(end_nano) = span.end_time_unix_nano {
            let duration_ns = end_nano - span.start_time_unix_nano.unwrap_or(end_nano);
            let end_payload = json!({
                "span_name": span.name,
                "status": span.status_code,
                "duration_ns": duration_ns,
                "attributes": merged,
                "billing": billing_json(&billing),
                "edge": serde_json::to_value(&edge).unwrap_or(Value::Null),
                "work": serde_json::to_value(&work).unwrap_or(Value::Null),
            });
            self.store
                .append(NewRawEvent {
                    customer_id: billing.customer_id,
                    ts: parse_unix_nano(Some(end_nano)),
                    event_type: RawEventType::SpanEnded,
                    trace_id: span.trace_id.clone(),
                    span_id: span.span_id.clone(),
                    payload: end_payload,
                })
                .await?;
        }

        Ok(())
    }

    async fn process_span_event(
        &self,
        event: &crate::trace::SpanEventData,
        span: &SpanData,
        merged: &AttributeMap,
    ) -> Result<(), NormalizeError> {
        let billing = extract_billing_attributes(merged).ok_or(NormalizeError::MissingCustomerId)?;
        if !self.customers.exists(billing.customer_id).await {
            return Err(NormalizeError::UnknownCustomer(billing.customer_id));
        }
        let outcome = extract_outcome_attributes(merged);

        let payload = json!({
            "event_name": event.name,
            "attributes": merged,
            "billing": billing_json(&billing),
            "outcome": serde_json::to_value(&outcome).unwrap_or(Value::Null),
        });
        self.store
            .append(NewRawEvent {
                customer_id: billing.customer_id,
                ts: parse_unix_nano(event.time_unix_nano),
                event_type: RawEventType::SpanEvent,
                trace_id: span.trace_id.clone(),
                span_id: span.span_id.clone(),
                payload,
            })
            .await?;
        Ok(())
    }

    /// Process a direct outcome submission, returning the stored raw event id.
    pub async fn process_outcome_event(
        &self,
        request: OutcomeEventRequest,
    ) -> Result<u64, NormalizeError> {
        if !self.customers.exists(request.customer_id).await {
            return Err(NormalizeError::UnknownCustomer(request.customer_id));
        }
        let ts = request.timestamp.unwrap_or_else(Utc::now);
        let outcome = extract_outcome_attributes(&request.attributes);
        let payload = json!({
            "event_name": request.event_name,
            "workflow_run_id": request.workflow_run_id,
            "attributes": request.attributes,
            "outcome": serde_json::to_value(&outcome).unwrap_or(Value::Null),
        });
        let stored = self
            .store
            .append(NewRawEvent {
                customer_id: request.customer_id,
                ts,
                event_type: RawEventType::Outcome,
                trace_id: request.trace_id,
                span_id: request.span_id,
                payload,
            })
            .await?;
        Ok(stored.id)
    }
}

fn billing_json(billing: &crate::attributes::BillingAttributes) -> Value {
    json!({
        "customer_id": billing.customer_id,
        "workflow_run_id": billing.workflow_run_id,
        "meter_candidates": billing.meter_candidates,
    })
}

fn merge_attrs(
    resource: &HashMap<String, Value>,
    span: &HashMap<String, Value>,
    event: Option<&HashMap<String, Value>>,
) -> AttributeMap {
    let mut merged = resource.clone();
    merged.extend(span.clone());
    if let Some(event) = event {
        merged.extend(event.clone());
    }
    merged
}

fn parse_unix_nano(unix_nano: Option<i64>) -> DateTime<Utc> {
    match unix_nano {
        Some(nano) => DateTime::from_timestamp(nano / 1_000_000_000, (nano % 1_000_000_000) as u32)
            .unwrap_or_else(Utc::now),
        None => Utc::now(),
    }
}
