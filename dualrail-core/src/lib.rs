//! Shared entity types, meter classification, periods, and configuration for
//! the DualRail usage-metering and rating pipeline.

pub mod catalog;
pub mod config;
pub mod model;
pub mod period;

pub use catalog::{classify, is_edge_meter, is_work_meter, MeterCatalog, MeterClass};
pub use config::Settings;
pub use period::{DatePeriod, Window};
