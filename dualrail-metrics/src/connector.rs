//! `MetricsConnector`: the seam between the importer's collection pipeline
//! and a concrete remote time-series backend.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ConnectorError;

/// One returned series: its label set plus the `(timestamp, value)` points
/// a range query produced (an instant query returns a single point).
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    pub labels: HashMap<String, String>,
    pub points: Vec<(DateTime<Utc>, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MetricMetadata {
    pub metric_name: String,
    pub help: Option<String>,
    pub metric_type: Option<String>,
}

#[async_trait]
pub trait MetricsConnector: Send + Sync {
    fn name(&self) -> &str;

    /// A lightweight probe (e.g. Prometheus's `up`) executed before a
    /// collection run; a failing probe short-circuits the run.
    async fn health_check(&self) -> Result<(), ConnectorError>;

    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_secs: i64,
    ) -> Result<Vec<Sample>, ConnectorError>;

    async fn query_instant(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<Sample>, ConnectorError>;

    async fn list_available_metrics(&self) -> Result<Vec<String>, ConnectorError>;

    async fn metric_metadata(&self, metric: &str) -> Result<Option<MetricMetadata>, ConnectorError>;
}
