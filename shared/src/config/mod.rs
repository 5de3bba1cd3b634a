//! Configuration module for the exporter core.
//!
//! This module contains the bucket boundary configuration shared by every histogram.

pub mod buckets;

pub use buckets::{Buckets, BucketsError, DEFAULT_BUCKETS};
