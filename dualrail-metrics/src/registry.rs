//! Connector registry: an explicit, constructed-once map from data-source id
//! to connector + mappings, passed into the scheduler rather than reached
//! through a module-level global.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::connector::MetricsConnector;
use crate::error::ConnectorError;
use crate::mapping::MetricMapping;

#[derive(Clone)]
pub struct DataSource {
    pub id: String,
    pub connector: Arc<dyn MetricsConnector>,
    pub collection_interval: Duration,
    pub mappings: Vec<MetricMapping>,
}

/// Registry of configured data sources. Built once at startup and handed to
/// the scheduler; the admin surface's "add mapping" / "trigger collection"
/// operations go through this registry rather than a process-wide global.
pub struct ConnectorRegistry {
    sources: RwLock<HashMap<String, DataSource>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self { sources: RwLock::new(HashMap::new()) }
    }

    pub fn register(&self, source: DataSource) -> Result<(), ConnectorError> {
        let mut sources = self.sources.write();
        if sources.contains_key(&source.id) {
            return Err(ConnectorError::ConnectionFailed(format!(
                "data source '{}' already registered",
                source.id
            )));
        }
        sources.insert(source.id.clone(), source);
        Ok(())
    }

    pub fn add_mapping(&self, id: &str, mapping: MetricMapping) -> Result<(), ConnectorError> {
        let mut sources = self.sources.write();
        let source = sources
            .get_mut(id)
            .ok_or_else(|| ConnectorError::ConnectionFailed(format!("data source '{id}' not found")))?;
        source.mappings.push(mapping);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<DataSource> {
        self.sources.read().get(id).cloned()
    }

    pub fn list_ids(&self) -> Vec<String> {
        self.sources.read().keys().cloned().collect()
    }

    pub fn all(&self) -> Vec<DataSource> {
        self.sources.read().values().cloned().collect()
    }
}

impl Default for ConnectorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connector::{MetricMetadata, Sample};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};

    struct StubConnector;

    #[async_trait]
    impl MetricsConnector for StubConnector {
        fn name(&self) -> &str {
            "stub"
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
            Ok(vec![])
        }
        async fn query_instant(&self, _query: &str, _at: DateTime<Utc>) -> Result<Vec<Sample>, ConnectorError> {
            Ok(vec![])
        }
        async fn list_available_metrics(&self) -> Result<Vec<String>, ConnectorError> {
            Ok(vec![])
        }
        async fn metric_metadata(&self, _metric: &str) -> Result<Option<MetricMetadata>, ConnectorError> {
            Ok(None)
        }
    }

    fn source(id: &str) -> DataSource {
        DataSource {
            id: id.to_string(),
            connector: Arc::new(StubConnector),
            collection_interval: Duration::from_secs(300),
            mappings: vec![],
        }
    }

    #[test]
    fn duplicate_registration_is_rejected() {
        let registry = ConnectorRegistry::new();
        registry.register(source("prom-1")).unwrap();
        assert!(registry.register(source("prom-1")).is_err());
    }

    #[test]
    fn add_mapping_extends_existing_source() {
        let registry = ConnectorRegistry::new();
        registry.register(source("prom-1")).unwrap();
        let mapping = MetricMapping::new(
            "http_requests_total",
            "api.calls",
            crate::mapping::TransformationFunction::Rate,
        );
        registry.add_mapping("prom-1", mapping).unwrap();
        assert_eq!(registry.get("prom-1").unwrap().mappings.len(), 1);
    }
}
