//! Exporter self-metrics.

use prometheus::{IntCounter, Opts, Registry};

/// Counters describing the exporter's own ingestion.
///
/// Cloning is cheap; clones update the same underlying counters.
#[derive(Clone)]
pub struct ExporterMetrics {
    /// Syslog messages received, accepted or not.
    pub syslog_messages: IntCounter,
    /// Syslog messages dropped by the transport filter plus lines that failed to parse.
    pub parse_failures: IntCounter,
}

impl ExporterMetrics {
    /// Creates the counters and registers them in `registry` under `namespace`.
    ///
    /// # Errors
    ///
    /// Returns an error if a counter cannot be created or is already registered.
    pub fn register(registry: &Registry, namespace: &str) -> Result<Self, prometheus::Error> {
        let syslog_messages = IntCounter::with_opts(
            Opts::new(
                "exporter_syslog_messages",
                "Current total syslog messages received.",
            )
            .namespace(namespace),
        )?;
        registry.register(Box::new(syslog_messages.clone()))?;

        let parse_failures = IntCounter::with_opts(
            Opts::new(
                "exporter_syslog_parse_failure",
                "Number of errors while parsing syslog messages.",
            )
            .namespace(namespace),
        )?;
        registry.register(Box::new(parse_failures.clone()))?;

        Ok(Self {
            syslog_messages,
            parse_failures,
        })
    }
}
