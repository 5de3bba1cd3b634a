//! Metrics collection module for internal observability.
//!
//! This module provides the counters the exporter keeps about its own ingestion, exposed
//! next to the log-derived histograms.

pub mod exporter;

pub use exporter::ExporterMetrics;
