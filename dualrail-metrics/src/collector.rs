//! Collection pipeline (C7 algorithm, spec §4.7): build a query, execute it,
//! map samples onto customers and meters, dedup, and upsert readings.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use dualrail_core::model::NewMeterReading;
use dualrail_core::period::floor_to_bucket;
use dualrail_ingest::CustomerDirectory;
use dualrail_store::MeterReadingStore;
use rust_decimal::Decimal;
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use crate::dedup::{content_hash, ImportDedupStore};
use crate::error::ConnectorError;
use crate::mapping::{MetricMapping, TransformationFunction};
use crate::registry::DataSource;

/// Outcome of one collection tick against one data source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionReport {
    pub data_source: String,
    pub mappings_run: u64,
    pub samples_processed: u64,
    pub readings_emitted: u64,
    pub skipped: Vec<String>,
}

pub struct MetricsImporter<R: MeterReadingStore> {
    readings: Arc<R>,
    customers: Arc<dyn CustomerDirectory>,
    dedup: Arc<dyn ImportDedupStore>,
}

impl<R: MeterReadingStore> MetricsImporter<R> {
    pub fn new(
        readings: Arc<R>,
        customers: Arc<dyn CustomerDirectory>,
        dedup: Arc<dyn ImportDedupStore>,
    ) -> Self {
        Self { readings, customers, dedup }
    }

    /// Run one collection tick for `source`. The health probe runs first and
    /// a failure short-circuits the whole tick with an error result.
    pub async fn collect(
        &self,
        source: &DataSource,
        now: DateTime<Utc>,
    ) -> Result<CollectionReport, ConnectorError> {
        source.connector.health_check().await?;

        let mut report = CollectionReport { data_source: source.id.clone(), ..Default::default() };
        let start = now - chrono_duration(source.collection_interval);

        for mapping in &source.mappings {
            let query = mapping.build_query();
            let samples = source.connector.query_range(&query, start, now, 60).await?;
            report.mappings_run += 1;

            for sample in samples {
                report.samples_processed += 1;
                match self.process_sample(mapping, &sample, now).await {
                    Ok(emitted) => report.readings_emitted += emitted,
                    Err(reason) => {
                        warn!(meter = %mapping.dualrail_meter_key, %reason, "skipping sample");
                        report.skipped.push(reason);
                    }
                }
            }
        }

        info!(
            data_source = %report.data_source,
            mappings_run = report.mappings_run,
            samples_processed = report.samples_processed,
            readings_emitted = report.readings_emitted,
            "collection tick complete"
        );
        Ok(report)
    }

    async fn process_sample(
        &self,
        mapping: &MetricMapping,
        sample: &crate::connector::Sample,
        collection_timestamp: DateTime<Utc>,
    ) -> Result<u64, String> {
        let customer_id_str = sample
            .labels
            .get(&mapping.customer_id_label)
            .ok_or_else(|| format!("sample missing label '{}'", mapping.customer_id_label))?;
        let customer_id: Uuid = customer_id_str
            .parse()
            .map_err(|_| format!("label '{customer_id_str}' is not a valid customer id"))?;
        if !self.customers.exists(customer_id).await {
            return Err(format!("unknown customer {customer_id}"));
        }
        for (key, expected) in &mapping.label_filters {
            if sample.labels.get(key) != Some(expected) {
                return Err(format!("label filter {key}={expected} did not match"));
            }
        }

        let mut minute_buckets: HashMap<DateTime<Utc>, Vec<f64>> = HashMap::new();
        for (ts, value) in &sample.points {
            let scaled = value * decimal_to_f64(mapping.scaling_factor);
            let minute = floor_to_bucket(*ts, Duration::minutes(1));
            minute_buckets.entry(minute).or_default().push(scaled);
        }

        let mut emitted = 0u64;
        for (window_start, values) in minute_buckets {
            let aggregated = aggregate(mapping.transformation_function, &values);
            let value = Decimal::from_f64_retain(aggregated).unwrap_or(Decimal::ZERO);
            let hash = content_hash(customer_id, window_start, &mapping.dualrail_meter_key, value);
            if self.dedup.already_seen(hash) {
                continue;
            }

            let window_end = window_start + Duration::minutes(1);
            let mut reading = NewMeterReading::new(
                customer_id,
                mapping.dualrail_meter_key.clone(),
                window_start,
                window_end,
                value,
            );
            reading.metadata = Some(json!({
                "external_metric": mapping.external_metric_name,
                "source_system": "prometheus",
                "collection_timestamp": collection_timestamp,
                "data_points_count": values.len(),
            }));
            self.readings.upsert(reading).await.map_err(|e| e.to_string())?;
            self.dedup.mark_seen(hash);
            emitted += 1;
        }
        Ok(emitted)
    }
}

fn aggregate(func: TransformationFunction, values: &[f64]) -> f64 {
    match func {
        TransformationFunction::Sum | TransformationFunction::Rate | TransformationFunction::None => {
            values.iter().sum()
        }
        TransformationFunction::Avg => {
            if values.is_empty() {
                0.0
            } else {
                values.iter().sum::<f64>() / values.len() as f64
            }
        }
        TransformationFunction::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
        TransformationFunction::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
    }
}

fn decimal_to_f64(d: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    d.to_f64().unwrap_or(1.0)
}

fn chrono_duration(std_duration: std::time::Duration) -> Duration {
    Duration::from_std(std_duration).unwrap_or_else(|_| Duration::seconds(300))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{MetricMetadata, Sample};
    use crate::dedup::InMemoryDedupStore;
    use crate::registry::DataSource;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use dualrail_ingest::InMemoryCustomerDirectory;
    use dualrail_store::InMemoryMeterReadingStore;
    use std::time::Duration as StdDuration;

    struct FixedConnector {
        samples: Vec<Sample>,
    }

    #[async_trait]
    impl MetricsConnector for FixedConnector {
        fn name(&self) -> &str {
            "fixed"
        }
        async fn health_check(&self) -> Result<(), ConnectorError> {
            Ok(())
        }
        async fn query_range(
            &self,
            _query: &str,
            _start: DateTime<Utc>,
            _end: DateTime<Utc>,
            _step_secs: i64,
        ) -> Result<Vec<Sample>, ConnectorError> {
            Ok(self.samples.clone())
        }
        async fn query_instant(&self, _query: &str, _at: DateTime<Utc>) -> Result<Vec<Sample>, ConnectorError> {
            Ok(self.samples.clone())
        }
        async fn list_available_metrics(&self) -> Result<Vec<String>, ConnectorError> {
            Ok(vec![])
        }
        async fn metric_metadata(&self, _metric: &str) -> Result<Option<MetricMetadata>, ConnectorError> {
            Ok(None)
        }
    }

    use crate::connector::MetricsConnector;

    #[tokio::test]
    async fn scenario_prometheus_samples_land_in_adjacent_minute_windows() {
        let customer = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let t1 = t0 + Duration::seconds(60);
        let mut labels = HashMap::new();
        labels.insert("customer_id".to_string(), customer.to_string());
        let sample = Sample { labels, points: vec![(t0, 100.0), (t1, 105.0)] };

        let readings = Arc::new(InMemoryMeterReadingStore::new());
        let customers = Arc::new(InMemoryCustomerDirectory::with_customers([customer]));
        let dedup = Arc::new(InMemoryDedupStore::new());
        let importer = MetricsImporter::new(readings.clone(), customers, dedup);

        let mut mapping =
            MetricMapping::new("http_requests_total", "api.calls", TransformationFunction::Rate);
        mapping.scaling_factor = Decimal::ONE;
        let source = DataSource {
            id: "prom-1".to_string(),
            connector: Arc::new(FixedConnector { samples: vec![sample] }),
            collection_interval: StdDuration::from_secs(300),
            mappings: vec![mapping],
        };

        let report = importer.collect(&source, t1 + Duration::seconds(1)).await.unwrap();
        assert_eq!(report.readings_emitted, 2);

        let window = dualrail_core::period::Window::new(t0, t1 + Duration::minutes(1));
        let listed = readings
            .list(customer, Some("api.calls"), window, dualrail_store::SortOrder::Ascending)
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);
    }

    #[tokio::test]
    async fn second_run_over_same_window_emits_nothing_new() {
        let customer = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut labels = HashMap::new();
        labels.insert("customer_id".to_string(), customer.to_string());
        let sample = Sample { labels, points: vec![(t0, 100.0)] };

        let readings = Arc::new(InMemoryMeterReadingStore::new());
        let customers = Arc::new(InMemoryCustomerDirectory::with_customers([customer]));
        let dedup = Arc::new(InMemoryDedupStore::new());
        let importer = MetricsImporter::new(readings, customers, dedup);

        let mapping = MetricMapping::new("http_requests_total", "api.calls", TransformationFunction::Rate);
        let source = DataSource {
            id: "prom-1".to_string(),
            connector: Arc::new(FixedConnector { samples: vec![sample] }),
            collection_interval: StdDuration::from_secs(300),
            mappings: vec![mapping],
        };

        let first = importer.collect(&source, t0 + Duration::minutes(1)).await.unwrap();
        let second = importer.collect(&source, t0 + Duration::minutes(1)).await.unwrap();
        assert_eq!(first.readings_emitted, 1);
        assert_eq!(second.readings_emitted, 0);
    }

    #[tokio::test]
    async fn unknown_customer_is_skipped_with_warning() {
        let customer = Uuid::new_v4();
        let unknown = Uuid::new_v4();
        let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut labels = HashMap::new();
        labels.insert("customer_id".to_string(), unknown.to_string());
        let sample = Sample { labels, points: vec![(t0, 100.0)] };

        let readings = Arc::new(InMemoryMeterReadingStore::new());
        let customers = Arc::new(InMemoryCustomerDirectory::with_customers([customer]));
        let dedup = Arc::new(InMemoryDedupStore::new());
        let importer = MetricsImporter::new(readings, customers, dedup);

        let mapping = MetricMapping::new("http_requests_total", "api.calls", TransformationFunction::Rate);
        let source = DataSource {
            id: "prom-1".to_string(),
            connector: Arc::new(FixedConnector { samples: vec![sample] }),
            collection_interval: StdDuration::from_secs(300),
            mappings: vec![mapping],
        };

        let report = importer.collect(&source, t0 + Duration::minutes(1)).await.unwrap();
        assert_eq!(report.readings_emitted, 0);
        assert_eq!(report.skipped.len(), 1);
    }
}
