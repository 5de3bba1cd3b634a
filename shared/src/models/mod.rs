//! Data models for the exporter core.
//!
//! Line-level types produced by the parser and snapshot types produced by the registry.

pub mod line;
pub mod metric;

pub use line::{LabelSet, Observation, ParsedLine};
pub use metric::{HistogramBucket, HistogramData, InstrumentSnapshot, SeriesSnapshot};
