//! Meter-prefix to cost-type allowlist, the table §4.9 attributes cost
//! records against.

use dualrail_core::model::CostType;

/// The cost types eligible to be attributed to a meter, by its dotted
/// prefix. `None` means "no allowlist restriction" (`workflow.*` and every
/// meter outside the listed prefixes attribute all cost types).
pub fn allowlist_for_meter(meter_key: &str) -> Option<&'static [CostType]> {
    if meter_key.starts_with("llm.") {
        Some(&[CostType::Tokens, CostType::LlmApi])
    } else if meter_key.starts_with("compute.") {
        Some(&[CostType::Compute, CostType::Cpu, CostType::Gpu, CostType::Memory])
    } else if meter_key.starts_with("storage.") {
        Some(&[CostType::Storage, CostType::S3, CostType::Database, CostType::Disk])
    } else if meter_key.starts_with("api.") {
        Some(&[CostType::Api, CostType::VendorApi, CostType::ExternalService])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn llm_prefix_allows_tokens_and_llm_api_only() {
        let allowed = allowlist_for_meter("llm.tokens.input").unwrap();
        assert!(allowed.contains(&CostType::Tokens));
        assert!(allowed.contains(&CostType::LlmApi));
        assert!(!allowed.contains(&CostType::Compute));
    }

    #[test]
    fn workflow_and_neutral_meters_allow_everything() {
        assert!(allowlist_for_meter("workflow.completed").is_none());
        assert!(allowlist_for_meter("custom.thing").is_none());
    }
}
