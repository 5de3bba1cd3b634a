//! Log line ingestion.
//!
//! A transport (syslog listener or file tailer) pushes raw lines into a bounded channel;
//! the [`Pipeline`] drains it, parsing each line and recording it in the registry.

pub mod pipeline;
pub mod syslog;
pub mod tail;

pub use pipeline::{line_channel, Pipeline, CHANNEL_CAPACITY};
pub use syslog::{SyslogError, SyslogListener, SyslogMessage};
pub use tail::FileTailer;
