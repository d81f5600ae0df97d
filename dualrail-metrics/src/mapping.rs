//! `MetricMapping`: per-metric configuration describing how a remote
//! time-series maps onto an internal meter.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformationFunction {
    Sum,
    Avg,
    Min,
    Max,
    Rate,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricMapping {
    pub external_metric_name: String,
    pub dualrail_meter_key: String,
    pub transformation_function: TransformationFunction,
    pub customer_id_label: String,
    pub scaling_factor: Decimal,
    pub label_filters: HashMap<String, String>,
}

impl MetricMapping {
    pub fn new(
        external_metric_name: impl Into<String>,
        dualrail_meter_key: impl Into<String>,
        transformation_function: TransformationFunction,
    ) -> Self {
        Self {
            external_metric_name: external_metric_name.into(),
            dualrail_meter_key: dualrail_meter_key.into(),
            transformation_function,
            customer_id_label: "customer_id".to_string(),
            scaling_factor: Decimal::ONE,
            label_filters: HashMap::new(),
        }
    }

    /// Build the PromQL-style query string: metric name, label filters, and
    /// the transformation function wrapping it where applicable.
    pub fn build_query(&self) -> String {
        let selector = if self.label_filters.is_empty() {
            String::new()
        } else {
            let mut pairs: Vec<(&String, &String)> = self.label_filters.iter().collect();
            pairs.sort();
            let parts: Vec<String> =
                pairs.into_iter().map(|(k, v)| format!("{k}=\"{v}\"")).collect();
            format!("{{{}}}", parts.join(","))
        };
        let base = format!("{}{}", self.external_metric_name, selector);

        match self.transformation_function {
            TransformationFunction::Rate => format!("rate({base}[5m])"),
            TransformationFunction::Sum => format!("sum({base}) by ({})", self.customer_id_label),
            TransformationFunction::Avg => format!("avg({base}) by ({})", self.customer_id_label),
            TransformationFunction::Min => format!("min({base}) by ({})", self.customer_id_label),
            TransformationFunction::Max => format!("max({base}) by ({})", self.customer_id_label),
            TransformationFunction::None => base,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_wraps_with_range_vector() {
        let m = MetricMapping::new("http_requests_total", "api.calls", TransformationFunction::Rate);
        assert_eq!(m.build_query(), "rate(http_requests_total[5m])");
    }

    #[test]
    fn sum_wraps_with_by_clause() {
        let m = MetricMapping::new("http_requests_total", "api.calls", TransformationFunction::Sum);
        assert_eq!(m.build_query(), "sum(http_requests_total) by (customer_id)");
    }

    #[test]
    fn label_filters_render_as_selector() {
        let mut m = MetricMapping::new("cpu_seconds", "compute.ms", TransformationFunction::None);
        m.label_filters.insert("job".to_string(), "worker".to_string());
        assert_eq!(m.build_query(), "cpu_seconds{job=\"worker\"}");
    }
}
