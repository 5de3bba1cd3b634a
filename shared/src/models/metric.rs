//! Histogram snapshot model.
//!
//! Read-only views of the registry's instruments, handed to the serving path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A histogram bucket for distribution metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// The upper bound of this bucket (inclusive).
    pub upper_bound: f64,
    /// The cumulative count of observations less than or equal to `upper_bound`.
    pub count: u64,
}

/// Histogram data for distribution metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramData {
    /// The histogram buckets, excluding the implicit `+Inf` bucket.
    pub buckets: Vec<HistogramBucket>,
    /// The sum of all observed values.
    pub sum: f64,
    /// The total count of observations.
    pub count: u64,
}

impl HistogramData {
    /// Returns the cumulative count for the bucket with the given upper bound.
    #[must_use]
    pub fn cumulative_count(&self, upper_bound: f64) -> Option<u64> {
        self.buckets
            .iter()
            .find(|b| (b.upper_bound - upper_bound).abs() < f64::EPSILON)
            .map(|b| b.count)
    }

    /// Returns the upper bound of the first bucket that received any observation.
    #[must_use]
    pub fn lowest_populated_bound(&self) -> Option<f64> {
        self.buckets
            .iter()
            .find(|b| b.count > 0)
            .map(|b| b.upper_bound)
    }
}

/// One label-value combination of an instrument and its distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesSnapshot {
    /// Label values, positionally matching the instrument's label names.
    pub label_values: Vec<String>,
    /// Accumulated distribution.
    pub histogram: HistogramData,
}

/// Point-in-time view of one registered instrument.
///
/// # Example
///
/// ```
/// use shared::config::Buckets;
/// use shared::models::{LabelSet, Observation, ParsedLine};
/// use shared::registry::MetricRegistry;
///
/// let registry = MetricRegistry::new("nginx_request", Buckets::default()).unwrap();
/// let line = ParsedLine::new(
///     vec![Observation::new("request_time", 0.2)],
///     LabelSet::new().with_label("method", "GET"),
/// );
/// registry.record(&line);
///
/// let snapshot = registry.snapshot().unwrap();
/// assert_eq!(snapshot[0].name, "request_time");
/// assert_eq!(snapshot[0].label_names, ["method"]);
/// assert_eq!(snapshot[0].series[0].histogram.count, 1);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentSnapshot {
    /// Metric name as it appeared in the log line.
    pub name: String,
    /// Fully qualified name used for exposition.
    pub full_name: String,
    /// Help text.
    pub help: String,
    /// Label names fixed at creation.
    pub label_names: Vec<String>,
    /// Observations dropped because of a label shape mismatch.
    pub rejected: u64,
    /// When the instrument was created.
    pub created_at: DateTime<Utc>,
    /// One entry per label-value combination seen so far.
    pub series: Vec<SeriesSnapshot>,
}

impl InstrumentSnapshot {
    /// Finds the series recorded under `label_values`.
    #[must_use]
    pub fn series_for(&self, label_values: &[&str]) -> Option<&SeriesSnapshot> {
        self.series
            .iter()
            .find(|s| s.label_values.iter().map(String::as_str).eq(label_values.iter().copied()))
    }

    /// Total number of observations across all series.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.series.iter().map(|s| s.histogram.count).sum()
    }
}
