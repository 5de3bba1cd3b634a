//! Histogram registry.
//!
//! Turns parsed lines into Prometheus histogram observations, creating one histogram per
//! metric name on first sight.

mod metric_registry;

pub use metric_registry::{MetricRegistry, RecordReport, RegistryError};
