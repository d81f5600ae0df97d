//! External Metric Importer (C7): pulls from a remote time-series backend,
//! maps samples onto internal meters, dedups, and writes readings via the
//! Meter-Reading Store.

pub mod collector;
pub mod connector;
pub mod dedup;
pub mod error;
pub mod mapping;
pub mod prometheus;
pub mod registry;

pub use collector::{CollectionReport, MetricsImporter};
pub use connector::{MetricMetadata, MetricsConnector, Sample};
pub use dedup::{ImportDedupStore, InMemoryDedupStore};
pub use error::ConnectorError;
pub use mapping::{MetricMapping, TransformationFunction};
pub use prometheus::{PrometheusAuth, PrometheusConfig, PrometheusConnector};
pub use registry::{ConnectorRegistry, DataSource};
