//! Dynamic histogram registry.
//!
//! Histograms are created lazily, one per metric name, the first time a name is seen.
//! The label names of that first line become the histogram's fixed label dimensions;
//! later lines for the same name must carry exactly the same label names in the same
//! order, otherwise their observation for that name is rejected.

use crate::config::Buckets;
use crate::models::{
    HistogramBucket, HistogramData, InstrumentSnapshot, LabelSet, Observation, ParsedLine,
    SeriesSnapshot,
};
use chrono::{DateTime, Utc};
use prometheus::core::Collector;
use prometheus::proto::MetricFamily;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Errors that can occur while recording observations.
///
/// None of these are fatal: the affected observation is dropped and the registry keeps
/// accepting input.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The metric already exists with different label names.
    #[error("Label names {got:?} do not match {expected:?} registered for metric '{metric}'")]
    ShapeMismatch {
        /// The metric name.
        metric: String,
        /// Label names fixed at creation.
        expected: Vec<String>,
        /// Label names of the rejected observation.
        got: Vec<String>,
    },

    /// The histogram could not be created or registered.
    #[error("Failed to create histogram '{metric}': {source}")]
    Creation {
        /// The metric name.
        metric: String,
        /// The instrumentation library error.
        source: prometheus::Error,
    },

    /// The value could not be applied to the histogram.
    #[error("Failed to observe value for '{metric}': {source}")]
    Observe {
        /// The metric name.
        metric: String,
        /// The instrumentation library error.
        source: prometheus::Error,
    },

    /// Failed to acquire lock on the registry.
    #[error("Failed to acquire lock on metric registry")]
    LockError,
}

impl RegistryError {
    /// The metric name the error refers to, if any.
    #[must_use]
    pub fn metric(&self) -> Option<&str> {
        match self {
            Self::ShapeMismatch { metric, .. }
            | Self::Creation { metric, .. }
            | Self::Observe { metric, .. } => Some(metric),
            Self::LockError => None,
        }
    }
}

/// Outcome of recording one line.
#[derive(Debug, Default)]
pub struct RecordReport {
    /// Number of observations applied to a histogram.
    pub recorded: usize,
    /// Errors for the observations that were dropped.
    pub rejected: Vec<RegistryError>,
}

impl RecordReport {
    /// Returns true if every observation was recorded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }
}

struct Instrument {
    name: String,
    full_name: String,
    help: String,
    label_names: Vec<String>,
    histograms: HistogramVec,
    rejected: AtomicU64,
    created_at: DateTime<Utc>,
}

impl Instrument {
    fn snapshot(&self) -> InstrumentSnapshot {
        let mut series: Vec<SeriesSnapshot> = self
            .histograms
            .collect()
            .iter()
            .flat_map(MetricFamily::get_metric)
            .map(|metric| {
                let pairs = metric.get_label();
                let label_values = self
                    .label_names
                    .iter()
                    .map(|name| {
                        pairs
                            .iter()
                            .find(|pair| pair.get_name() == name.as_str())
                            .map(|pair| pair.get_value().to_string())
                            .unwrap_or_default()
                    })
                    .collect();

                let histogram = metric.get_histogram();
                SeriesSnapshot {
                    label_values,
                    histogram: HistogramData {
                        buckets: histogram
                            .get_bucket()
                            .iter()
                            .filter(|b| b.get_upper_bound().is_finite())
                            .map(|b| HistogramBucket {
                                upper_bound: b.get_upper_bound(),
                                count: b.get_cumulative_count(),
                            })
                            .collect(),
                        sum: histogram.get_sample_sum(),
                        count: histogram.get_sample_count(),
                    },
                }
            })
            .collect();
        series.sort_by(|a, b| a.label_values.cmp(&b.label_values));

        InstrumentSnapshot {
            name: self.name.clone(),
            full_name: self.full_name.clone(),
            help: self.help.clone(),
            label_names: self.label_names.clone(),
            rejected: self.rejected.load(Ordering::Relaxed),
            created_at: self.created_at,
            series,
        }
    }
}

/// Registry of per-metric-name histograms.
///
/// All histograms live in an owned Prometheus [`Registry`], never the process-global
/// default one, so every `MetricRegistry` is fully isolated. Share it between the
/// ingestion and serving paths with an `Arc`.
///
/// # Example
///
/// ```
/// use shared::config::Buckets;
/// use shared::parser::parse_line;
/// use shared::registry::MetricRegistry;
///
/// let registry = MetricRegistry::new("nginx_request", Buckets::default()).unwrap();
///
/// let line = parse_line(r#"status:200 method=GET path="/api/v1" latency:0.023"#).unwrap();
/// let report = registry.record(&line);
/// assert_eq!(report.recorded, 2);
///
/// // A different label shape for an existing metric is rejected.
/// let line = parse_line("latency:0.5 method=GET").unwrap();
/// let report = registry.record(&line);
/// assert_eq!(report.recorded, 0);
/// assert_eq!(report.rejected.len(), 1);
///
/// assert_eq!(registry.names().unwrap(), ["latency", "status"]);
/// ```
pub struct MetricRegistry {
    namespace: String,
    buckets: Buckets,
    registry: Registry,
    instruments: RwLock<BTreeMap<String, Arc<Instrument>>>,
    rejected: IntCounterVec,
}

impl fmt::Debug for MetricRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricRegistry")
            .field("namespace", &self.namespace)
            .field("buckets", &self.buckets)
            .finish_non_exhaustive()
    }
}

impl MetricRegistry {
    /// Creates an empty registry.
    ///
    /// Exposed metric names are prefixed with `namespace` (unless it is empty) and every
    /// histogram uses `buckets`.
    ///
    /// # Errors
    ///
    /// Returns an error if `namespace` does not produce valid Prometheus metric names.
    pub fn new(namespace: impl Into<String>, buckets: Buckets) -> Result<Self, RegistryError> {
        let namespace = namespace.into();
        let registry = Registry::new();

        let rejected = IntCounterVec::new(
            Opts::new(
                "exporter_rejected_observations_total",
                "Observations dropped because their label names did not match the histogram.",
            )
            .namespace(namespace.clone()),
            &["metric"],
        )
        .and_then(|counter| {
            registry.register(Box::new(counter.clone()))?;
            Ok(counter)
        })
        .map_err(|source| RegistryError::Creation {
            metric: "exporter_rejected_observations_total".to_string(),
            source,
        })?;

        Ok(Self {
            namespace,
            buckets,
            registry,
            instruments: RwLock::new(BTreeMap::new()),
            rejected,
        })
    }

    /// The namespace prefixed to every exposed metric name.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The bucket boundaries used for every histogram.
    #[must_use]
    pub fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    /// The underlying Prometheus registry.
    ///
    /// Additional collectors (such as transport counters) may be registered here so they
    /// are exposed together with the histograms.
    #[must_use]
    pub fn prometheus_registry(&self) -> &Registry {
        &self.registry
    }

    /// Records every observation of a parsed line under the line's labels.
    pub fn record(&self, line: &ParsedLine) -> RecordReport {
        self.record_observations(&line.observations, &line.labels)
    }

    /// Records `observations`, all under the same `labels`.
    ///
    /// Each observation is handled independently: a rejected observation does not
    /// prevent the others from being recorded.
    pub fn record_observations(
        &self,
        observations: &[Observation],
        labels: &LabelSet,
    ) -> RecordReport {
        let mut report = RecordReport::default();

        for observation in observations {
            match self.observe(observation, labels) {
                Ok(()) => report.recorded += 1,
                Err(e) => {
                    tracing::warn!(metric = %observation.name, error = %e, "Dropping observation");
                    report.rejected.push(e);
                }
            }
        }

        report
    }

    fn observe(&self, observation: &Observation, labels: &LabelSet) -> Result<(), RegistryError> {
        let instrument = self.get_or_create(&observation.name, labels)?;

        if !labels.has_names(&instrument.label_names) {
            instrument.rejected.fetch_add(1, Ordering::Relaxed);
            self.rejected
                .with_label_values(&[observation.name.as_str()])
                .inc();
            return Err(RegistryError::ShapeMismatch {
                metric: observation.name.clone(),
                expected: instrument.label_names.clone(),
                got: labels.names().to_vec(),
            });
        }

        let values: Vec<&str> = labels.values().iter().map(String::as_str).collect();
        let histogram = instrument
            .histograms
            .get_metric_with_label_values(&values)
            .map_err(|source| RegistryError::Observe {
                metric: observation.name.clone(),
                source,
            })?;
        histogram.observe(observation.value);

        Ok(())
    }

    /// Returns the histogram for `name`, creating it with `labels`' names if needed.
    ///
    /// The lookup-or-insert runs under the write lock, so concurrent first sightings of a
    /// name always resolve to one instrument.
    fn get_or_create(&self, name: &str, labels: &LabelSet) -> Result<Arc<Instrument>, RegistryError> {
        {
            let instruments = self
                .instruments
                .read()
                .map_err(|_| RegistryError::LockError)?;
            if let Some(instrument) = instruments.get(name) {
                return Ok(Arc::clone(instrument));
            }
        }

        let mut instruments = self
            .instruments
            .write()
            .map_err(|_| RegistryError::LockError)?;

        match instruments.entry(name.to_string()) {
            Entry::Occupied(entry) => Ok(Arc::clone(entry.get())),
            Entry::Vacant(entry) => {
                let instrument = self.create_instrument(name, labels.names())?;
                tracing::debug!(
                    metric = %instrument.full_name,
                    labels = ?instrument.label_names,
                    "Created histogram"
                );
                Ok(Arc::clone(entry.insert(Arc::new(instrument))))
            }
        }
    }

    fn create_instrument(
        &self,
        name: &str,
        label_names: &[String],
    ) -> Result<Instrument, RegistryError> {
        let creation_error = |source| RegistryError::Creation {
            metric: name.to_string(),
            source,
        };

        let help = format!("Nginx request log value for {name}");
        let opts = HistogramOpts::new(name, help.clone())
            .namespace(self.namespace.clone())
            .buckets(self.buckets.as_slice().to_vec());

        let names: Vec<&str> = label_names.iter().map(String::as_str).collect();
        let histograms = HistogramVec::new(opts, &names).map_err(creation_error)?;
        self.registry
            .register(Box::new(histograms.clone()))
            .map_err(creation_error)?;

        Ok(Instrument {
            name: name.to_string(),
            full_name: self.full_name(name),
            help,
            label_names: label_names.to_vec(),
            histograms,
            rejected: AtomicU64::new(0),
            created_at: Utc::now(),
        })
    }

    fn full_name(&self, name: &str) -> String {
        if self.namespace.is_empty() {
            name.to_string()
        } else {
            format!("{}_{name}", self.namespace)
        }
    }

    /// Number of histograms created so far.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn count(&self) -> Result<usize, RegistryError> {
        let instruments = self
            .instruments
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(instruments.len())
    }

    /// Names of all histograms, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn names(&self) -> Result<Vec<String>, RegistryError> {
        let instruments = self
            .instruments
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(instruments.keys().cloned().collect())
    }

    /// Label names fixed for the histogram called `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn label_names(&self, name: &str) -> Result<Option<Vec<String>>, RegistryError> {
        let instruments = self
            .instruments
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(instruments.get(name).map(|i| i.label_names.clone()))
    }

    /// Point-in-time view of every histogram, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry lock is poisoned.
    pub fn snapshot(&self) -> Result<Vec<InstrumentSnapshot>, RegistryError> {
        let instruments = self
            .instruments
            .read()
            .map_err(|_| RegistryError::LockError)?;
        Ok(instruments.values().map(|i| i.snapshot()).collect())
    }

    /// Gathers every collector of the underlying registry for exposition.
    #[must_use]
    pub fn gather(&self) -> Vec<MetricFamily> {
        self.registry.gather()
    }
}
