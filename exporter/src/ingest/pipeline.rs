//! Line processing pipeline.

use crate::metrics::ExporterMetrics;
use shared::parser::{parse_line, ParseError};
use shared::registry::{MetricRegistry, RecordReport};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Number of lines buffered between a transport and the pipeline.
pub const CHANNEL_CAPACITY: usize = 20_000;

/// Creates the bounded channel connecting a transport to the pipeline.
#[must_use]
pub fn line_channel() -> (mpsc::Sender<String>, mpsc::Receiver<String>) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// Parses lines and records them in the registry.
#[derive(Clone)]
pub struct Pipeline {
    registry: Arc<MetricRegistry>,
    metrics: ExporterMetrics,
}

impl Pipeline {
    /// Creates a pipeline recording into `registry`.
    #[must_use]
    pub fn new(registry: Arc<MetricRegistry>, metrics: ExporterMetrics) -> Self {
        Self { registry, metrics }
    }

    /// Parses one line and records its observations.
    ///
    /// # Errors
    ///
    /// Returns the parse error if the line does not match the grammar. The failure is
    /// counted and nothing is recorded.
    pub fn process_line(&self, line: &str) -> Result<RecordReport, ParseError> {
        match parse_line(line) {
            Ok(parsed) => Ok(self.registry.record(&parsed)),
            Err(e) => {
                self.metrics.parse_failures.inc();
                Err(e)
            }
        }
    }

    /// Processes lines until every sender of `lines` is dropped.
    ///
    /// Lines still buffered when the senders go away are processed before returning.
    pub async fn run(self, mut lines: mpsc::Receiver<String>) {
        let mut processed: u64 = 0;

        while let Some(line) = lines.recv().await {
            processed += 1;
            if let Err(e) = self.process_line(&line) {
                tracing::error!(error = %e, line = %line, "Failed to parse log line");
            }
        }

        tracing::info!(processed, "Line pipeline stopped");
    }
}
