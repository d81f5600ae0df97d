//! Edge deriver: aggregates resource-consumption attributes on every event
//! in a window into the canonical edge meters.

use std::collections::{BTreeSet, HashMap};

use dualrail_core::model::{RawEvent, RawEventType};
use rust_decimal::Decimal;
use serde_json::Value;

/// One meter's aggregated value plus the ids of the events that contributed
/// to it, for this window.
#[derive(Debug, Clone, Default)]
pub struct Aggregated {
    pub value: Decimal,
    pub src_event_ids: BTreeSet<u64>,
}

impl Aggregated {
    fn add(&mut self, amount: Decimal, event_id: u64) {
        if amount.is_zero() {
            return;
        }
        self.value += amount;
        self.src_event_ids.insert(event_id);
    }
}

fn decimal_field(group: &Value, key: &str) -> Decimal {
    match group.get(key) {
        Some(Value::String(s)) => s.parse().unwrap_or(Decimal::ZERO),
        Some(Value::Number(n)) => n.as_f64().and_then(Decimal::from_f64_retain).unwrap_or(Decimal::ZERO),
        _ => Decimal::ZERO,
    }
}

/// Aggregate the edge attribute group of every event in a window bucket.
/// Returns only meters whose sum is strictly positive, per spec.
pub fn aggregate_edge(events: &[RawEvent]) -> HashMap<String, Aggregated> {
    let mut totals: HashMap<String, Aggregated> = HashMap::new();

    for event in events {
        if matches!(event.event_type, RawEventType::SpanStarted | RawEventType::SpanEnded) {
            totals.entry("api.calls".to_string()).or_default().add(Decimal::ONE, event.id);
        }

        let Some(edge) = event.payload.get("edge") else { continue };
        let tokens_input = decimal_field(edge, "llm_tokens_input");
        let tokens_output = decimal_field(edge, "llm_tokens_output");
        let tokens_raw = decimal_field(edge, "llm_tokens");
        let compute_ms = decimal_field(edge, "compute_ms");
        let bytes_in = decimal_field(edge, "net_bytes_in");
        let bytes_out = decimal_field(edge, "net_bytes_out");
        let storage_gbh = decimal_field(edge, "storage_gb_hours");

        totals.entry("llm.tokens.input".to_string()).or_default().add(tokens_input, event.id);
        totals.entry("llm.tokens.output".to_string()).or_default().add(tokens_output, event.id);
        totals
            .entry("llm.tokens".to_string())
            .or_default()
            .add(tokens_input + tokens_output + tokens_raw, event.id);
        totals.entry("compute.ms".to_string()).or_default().add(compute_ms, event.id);
        totals.entry("net.bytes".to_string()).or_default().add(bytes_in + bytes_out, event.id);
        totals.entry("storage.gbh".to_string()).or_default().add(storage_gbh, event.id);
    }

    totals.retain(|_, agg| agg.value > Decimal::ZERO);
    totals
}
