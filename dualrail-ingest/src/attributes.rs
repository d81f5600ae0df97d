//! Fixed-set attribute extractors (spec §9's redesign of dynamic attribute
//! lookup into typed structures). Each group pulls its own keys out of a
//! merged resource+span+event attribute map and is independent of the others.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

pub type AttributeMap = HashMap<String, Value>;

fn decimal_attr(attrs: &AttributeMap, key: &str) -> Option<Decimal> {
    match attrs.get(key)? {
        Value::Number(n) => n.as_f64().and_then(Decimal::from_f64_retain),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn string_attr(attrs: &AttributeMap, key: &str) -> Option<String> {
    match attrs.get(key)? {
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn bool_attr(attrs: &AttributeMap, key: &str) -> Option<bool> {
    match attrs.get(key)? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

/// Required-customer billing attributes. `customer_id` must parse as a UUID.
#[derive(Debug, Clone, PartialEq)]
pub struct BillingAttributes {
    pub customer_id: Uuid,
    pub workflow_run_id: Option<Uuid>,
    pub meter_candidates: Vec<String>,
}

/// Extract billing attributes; `None` if `billing.customer_id` is missing or
/// fails to parse as a UUID.
pub fn extract_billing_attributes(attrs: &AttributeMap) -> Option<BillingAttributes> {
    let customer_id = string_attr(attrs, "billing.customer_id")?.parse().ok()?;
    let workflow_run_id =
        string_attr(attrs, "billing.workflow_run_id").and_then(|s| s.parse().ok());
    let meter_candidates = attrs
        .get("billing.meter_candidates")
        .and_then(|v| v.as_array())
        .map(|arr| arr.iter().filter_map(|v| v.as_str().map(String::from)).collect())
        .unwrap_or_default();
    Some(BillingAttributes { customer_id, workflow_run_id, meter_candidates })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EdgeAttributes {
    pub llm_tokens_input: Option<Decimal>,
    pub llm_tokens_output: Option<Decimal>,
    pub llm_tokens: Option<Decimal>,
    pub compute_ms: Option<Decimal>,
    pub net_bytes_in: Option<Decimal>,
    pub net_bytes_out: Option<Decimal>,
    pub storage_gb_hours: Option<Decimal>,
}

pub fn extract_edge_attributes(attrs: &AttributeMap) -> EdgeAttributes {
    EdgeAttributes {
        llm_tokens_input: decimal_attr(attrs, "llm.tokens_input"),
        llm_tokens_output: decimal_attr(attrs, "llm.tokens_output"),
        llm_tokens: decimal_attr(attrs, "llm.tokens"),
        compute_ms: decimal_attr(attrs, "compute.ms"),
        net_bytes_in: decimal_attr(attrs, "net.bytes_in"),
        net_bytes_out: decimal_attr(attrs, "net.bytes_out"),
        storage_gb_hours: decimal_attr(attrs, "storage.gb_hours"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkAttributes {
    pub workflow_definition: Option<String>,
    pub workflow_version: Option<String>,
    pub step_key: Option<String>,
    pub actor_type: Option<String>,
}

pub fn extract_work_attributes(attrs: &AttributeMap) -> WorkAttributes {
    WorkAttributes {
        workflow_definition: string_attr(attrs, "workflow.definition"),
        workflow_version: string_attr(attrs, "workflow.version"),
        step_key: string_attr(attrs, "step.key"),
        actor_type: string_attr(attrs, "actor.type"),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutcomeAttributes {
    pub sla_met: Option<bool>,
    pub outcome_type: Option<String>,
    pub outcome_value: Option<Value>,
}

pub fn extract_outcome_attributes(attrs: &AttributeMap) -> OutcomeAttributes {
    OutcomeAttributes {
        sla_met: bool_attr(attrs, "sla.met"),
        outcome_type: string_attr(attrs, "outcome.type"),
        outcome_value: attrs.get("outcome.value").cloned(),
    }
}
