//! Application state module.
//!
//! Defines the shared application state that is passed to route handlers.

use crate::config::DEFAULT_NAMESPACE;
use shared::config::Buckets;
use shared::registry::{MetricRegistry, RegistryError};
use std::sync::Arc;

/// Application state shared across all request handlers.
///
/// The registry is the same instance the ingestion pipeline records into.
#[derive(Clone)]
pub struct AppState {
    /// The histogram registry.
    registry: Arc<MetricRegistry>,
    /// Path the Prometheus exposition is served under.
    telemetry_path: Arc<str>,
}

impl AppState {
    /// Creates a new application state serving `registry`.
    pub fn new(registry: Arc<MetricRegistry>, telemetry_path: &str) -> Self {
        Self {
            registry,
            telemetry_path: Arc::from(telemetry_path),
        }
    }

    /// Creates a new application state with a fresh registry and default settings.
    ///
    /// This is useful for development and testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry cannot be created.
    pub fn with_defaults() -> Result<Self, RegistryError> {
        let registry = MetricRegistry::new(DEFAULT_NAMESPACE, Buckets::default())?;
        Ok(Self::new(Arc::new(registry), "/metrics"))
    }

    /// Returns a reference to the registry.
    #[must_use]
    pub fn registry(&self) -> &MetricRegistry {
        self.registry.as_ref()
    }

    /// Returns a shared handle to the registry.
    #[must_use]
    pub fn registry_handle(&self) -> Arc<MetricRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns the telemetry path.
    #[must_use]
    pub fn telemetry_path(&self) -> &str {
        &self.telemetry_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::parser::parse_line;

    #[test]
    fn test_app_state_with_defaults() {
        let state = AppState::with_defaults().unwrap();

        assert_eq!(state.telemetry_path(), "/metrics");
        assert_eq!(state.registry().namespace(), "nginx_request");
        assert_eq!(state.registry().count().unwrap(), 0);
    }

    #[test]
    fn test_app_state_is_clone() {
        let state = AppState::with_defaults().unwrap();
        let state2 = state.clone();

        // Both should share the same registry
        state
            .registry()
            .record(&parse_line("request_time:0.1").unwrap());

        assert_eq!(state2.registry().count().unwrap(), 1);
        assert_eq!(Arc::strong_count(&state2.registry_handle()), 3);
    }
}
