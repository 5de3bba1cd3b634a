//! Nginx Request Exporter Shared Library
//!
//! This crate contains the core of the exporter: the log line grammar and the dynamic
//! histogram registry fed by it. Transport and HTTP concerns live in the `exporter` crate.
//!
//! # Modules
//!
//! - [`parser`] - Log line tokenizer and parser
//! - [`models`] - Parsed line and histogram snapshot types
//! - [`registry`] - Per-metric-name histogram registry
//! - [`config`] - Bucket boundary configuration
//!
//! # Example
//!
//! ```
//! use shared::config::Buckets;
//! use shared::parser::parse_line;
//! use shared::registry::MetricRegistry;
//!
//! let registry = MetricRegistry::new("nginx_request", Buckets::default()).unwrap();
//! let line = parse_line(r#"request_time:0.042 method=GET status="200""#).unwrap();
//!
//! assert!(registry.record(&line).is_clean());
//! assert_eq!(registry.label_names("request_time").unwrap().unwrap(), ["method", "status"]);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod config;
pub mod models;
pub mod parser;
pub mod registry;

/// Re-export common dependencies for convenience.
pub use chrono;
pub use prometheus;
pub use serde;
pub use serde_json;
