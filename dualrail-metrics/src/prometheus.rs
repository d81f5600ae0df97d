//! `PrometheusConnector`: `MetricsConnector` over the Prometheus HTTP API
//! (`/api/v1/query`, `/api/v1/query_range`, `/api/v1/label/.../values`,
//! `/api/v1/metadata`).

use std::collections::HashMap;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::connector::{MetricMetadata, MetricsConnector, Sample};
use crate::error::ConnectorError;

/// Bearer or basic auth; `None` for an unauthenticated connection.
#[derive(Debug, Clone)]
pub enum PrometheusAuth {
    None,
    Bearer(String),
    Basic { username: String, password: String },
}

#[derive(Debug, Clone)]
pub struct PrometheusConfig {
    pub endpoint: String,
    pub auth: PrometheusAuth,
    pub timeout: StdDuration,
}

pub struct PrometheusConnector {
    config: PrometheusConfig,
    client: reqwest::Client,
}

impl PrometheusConnector {
    pub fn new(config: PrometheusConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self { config, client }
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth {
            PrometheusAuth::None => builder,
            PrometheusAuth::Bearer(token) => builder.bearer_auth(token),
            PrometheusAuth::Basic { username, password } => {
                builder.basic_auth(username, Some(password))
            }
        }
    }

    async fn get_json<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ConnectorError> {
        let url = format!("{}{}", self.config.endpoint.trim_end_matches('/'), path);
        let request = self.apply_auth(self.client.get(&url).query(query));
        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ConnectorError::Timeout(self.config.timeout)
            } else {
                ConnectorError::ConnectionFailed(e.to_string())
            }
        })?;

        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ConnectorError::AuthenticationFailed(url));
        }
        if !response.status().is_success() {
            return Err(ConnectorError::ConnectionFailed(format!(
                "{} returned {}",
                url,
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| ConnectorError::ResponseShape(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct PromEnvelope<T> {
    status: String,
    data: Option<T>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PromQueryData {
    #[serde(rename = "resultType")]
    result_type: String,
    result: Vec<PromSeries>,
}

#[derive(Debug, Deserialize)]
struct PromSeries {
    metric: HashMap<String, String>,
    #[serde(default)]
    value: Option<(f64, String)>,
    #[serde(default)]
    values: Vec<(f64, String)>,
}

impl PromSeries {
    fn into_sample(self) -> Sample {
        let points = if let Some((ts, v)) = self.value {
            vec![(from_prom_ts(ts), v.parse().unwrap_or(0.0))]
        } else {
            self.values.into_iter().map(|(ts, v)| (from_prom_ts(ts), v.parse().unwrap_or(0.0))).collect()
        };
        Sample { labels: self.metric, points }
    }
}

fn from_prom_ts(ts: f64) -> DateTime<Utc> {
    let secs = ts.trunc() as i64;
    let nanos = ((ts.fract()) * 1_000_000_000.0) as u32;
    DateTime::from_timestamp(secs, nanos).unwrap_or_else(Utc::now)
}

#[derive(Debug, Deserialize)]
#[serde(transparent)]
struct PromLabelValuesData(Vec<String>);

#[derive(Debug, Deserialize)]
struct PromMetadataEntry {
    #[serde(rename = "type")]
    metric_type: Option<String>,
    help: Option<String>,
}

async fn run_query<T: for<'de> Deserialize<'de>>(
    connector: &PrometheusConnector,
    path: &str,
    query: &[(&str, String)],
) -> Result<PromEnvelope<T>, ConnectorError> {
    let envelope: PromEnvelope<T> = connector.get_json(path, query).await?;
    if envelope.status != "success" {
        return Err(ConnectorError::ResponseShape(
            envelope.error.clone().unwrap_or_else(|| "prometheus query failed".to_string()),
        ));
    }
    Ok(envelope)
}

#[async_trait]
impl MetricsConnector for PrometheusConnector {
    fn name(&self) -> &str {
        "prometheus"
    }

    async fn health_check(&self) -> Result<(), ConnectorError> {
        let envelope = run_query::<PromQueryData>(self, "/api/v1/query", &[("query", "up".to_string())])
            .await
            .map_err(|e| ConnectorError::Unhealthy(e.to_string()))?;
        if envelope.data.is_none() {
            return Err(ConnectorError::Unhealthy("empty response to health probe".to_string()));
        }
        Ok(())
    }

    async fn query_range(
        &self,
        query: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        step_secs: i64,
    ) -> Result<Vec<Sample>, ConnectorError> {
        let params = [
            ("query", query.to_string()),
            ("start", start.timestamp().to_string()),
            ("end", end.timestamp().to_string()),
            ("step", format!("{step_secs}s")),
        ];
        let envelope = run_query::<PromQueryData>(self, "/api/v1/query_range", &params).await?;
        let data = envelope.data.ok_or_else(|| {
            ConnectorError::ResponseShape("missing data field".to_string())
        })?;
        if data.result_type != "matrix" {
            warn!(result_type = %data.result_type, "unexpected result type for range query");
        }
        Ok(data.result.into_iter().map(PromSeries::into_sample).collect())
    }

    async fn query_instant(&self, query: &str, at: DateTime<Utc>) -> Result<Vec<Sample>, ConnectorError> {
        let params = [("query", query.to_string()), ("time", at.timestamp().to_string())];
        let envelope = run_query::<PromQueryData>(self, "/api/v1/query", &params).await?;
        let data = envelope.data.ok_or_else(|| {
            ConnectorError::ResponseShape("missing data field".to_string())
        })?;
        Ok(data.result.into_iter().map(PromSeries::into_sample).collect())
    }

    async fn list_available_metrics(&self) -> Result<Vec<String>, ConnectorError> {
        let envelope =
            run_query::<PromLabelValuesData>(self, "/api/v1/label/__name__/values", &[]).await?;
        Ok(envelope.data.map(|d| d.0).unwrap_or_default())
    }

    async fn metric_metadata(&self, metric: &str) -> Result<Option<MetricMetadata>, ConnectorError> {
        let envelope = run_query::<HashMap<String, Vec<PromMetadataEntry>>>(
            self,
            "/api/v1/metadata",
            &[("metric", metric.to_string())],
        )
        .await?;
        let entry = envelope.data.and_then(|mut d| d.remove(metric)).and_then(|mut v| {
            if v.is_empty() {
                None
            } else {
                Some(v.remove(0))
            }
        });
        Ok(entry.map(|e| MetricMetadata {
            metric_name: metric.to_string(),
            help: e.help,
            metric_type: e.metric_type,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prom_ts_converts_fractional_seconds() {
        let dt = from_prom_ts(1_700_000_000.5);
        assert_eq!(dt.timestamp(), 1_700_000_000);
    }
}
