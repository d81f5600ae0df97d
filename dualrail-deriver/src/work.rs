//! Work deriver: turns workflow/step completions and outcome events into
//! the canonical work meters.

use std::collections::HashMap;

use dualrail_core::model::{RawEvent, RawEventType};
use rust_decimal::Decimal;

use crate::edge::Aggregated;

fn str_field<'a>(payload: &'a serde_json::Value, group: &str, key: &str) -> Option<&'a str> {
    payload.get(group)?.get(key)?.as_str()
}

fn top_level_str<'a>(payload: &'a serde_json::Value, key: &str) -> Option<&'a str> {
    payload.get(key)?.as_str()
}

/// Map an event-name or outcome-type string to one of the three canonical
/// outcome meters by substring match, falling back to an explicit type match.
fn map_outcome_meter(event_name: Option<&str>, outcome_type: Option<&str>) -> Option<&'static str> {
    for candidate in [event_name, outcome_type].into_iter().flatten() {
        let lowered = candidate.to_lowercase();
        if lowered.contains("ticket") {
            return Some("outcome.ticket_resolved");
        }
        if lowered.contains("document") {
            return Some("outcome.document_processed");
        }
        if lowered.contains("analysis") {
            return Some("outcome.analysis_completed");
        }
    }
    None
}

pub fn aggregate_work(events: &[RawEvent]) -> HashMap<String, Aggregated> {
    let mut totals: HashMap<String, Aggregated> = HashMap::new();
    let mut bump = |meter: &str, event_id: u64, totals: &mut HashMap<String, Aggregated>| {
        let entry = totals.entry(meter.to_string()).or_default();
        entry.value += Decimal::ONE;
        entry.src_event_ids.insert(event_id);
    };

    for event in events {
        match event.event_type {
            RawEventType::SpanEnded => {
                let Some(workflow_definition) = str_field(&event.payload, "work", "workflow_definition")
                else {
                    continue;
                };
                if workflow_definition.is_empty() {
                    continue;
                }
                let status = top_level_str(&event.payload, "status").unwrap_or("OK");
                if status.eq_ignore_ascii_case("OK") {
                    bump("workflow.completed", event.id, &mut totals);
                } else {
                    bump("workflow.failed", event.id, &mut totals);
                }
                if str_field(&event.payload, "work", "step_key").is_some() {
                    bump("step.completed", event.id, &mut totals);
                }
            }
            RawEventType::Outcome | RawEventType::SpanEvent => {
                let event_name = top_level_str(&event.payload, "event_name");
                let outcome_type = str_field(&event.payload, "outcome", "outcome_type");
                if let Some(meter) = map_outcome_meter(event_name, outcome_type) {
                    bump(meter, event.id, &mut totals);
                }
            }
            RawEventType::SpanStarted | RawEventType::Counter => {}
        }
    }

    totals
}
