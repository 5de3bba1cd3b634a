//! Exporter configuration module.
//!
//! Configuration is read from command line flags, each of which can also be set through an
//! environment variable (a `.env` file is loaded by the binary before parsing).

use clap::Parser;
use shared::config::{Buckets, DEFAULT_BUCKETS};
use std::net::{AddrParseError, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Default prefix of every exposed metric name.
pub const DEFAULT_NAMESPACE: &str = "nginx_request";

/// Paths served by the exporter itself, which the telemetry path must not shadow.
const RESERVED_PATHS: [&str; 3] = ["/", "/health", "/api/v1/instruments"];

/// Errors that can occur while validating the configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A field failed validation.
    #[error("Invalid configuration: {0}")]
    Validation(#[from] validator::ValidationErrors),

    /// The listen address is not an `ip:port` or `:port` address.
    #[error("Invalid listen address '{address}': {source}")]
    ListenAddress {
        /// The configured address.
        address: String,
        /// The underlying parse error.
        source: AddrParseError,
    },
}

/// Exporter configuration.
///
/// Every flag can also be set through the environment variable listed in its help text.
#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "nginx-request-exporter")]
#[command(author, version, about = "Prometheus exporter for metrics embedded in Nginx access logs", long_about = None)]
pub struct Config {
    /// Address to listen on for web interface and telemetry.
    #[arg(
        long = "web.listen-address",
        env = "NGINX_EXPORTER_LISTEN_ADDRESS",
        default_value = ":9147"
    )]
    pub listen_address: String,

    /// Path under which to expose metrics.
    #[arg(
        long = "web.telemetry-path",
        env = "NGINX_EXPORTER_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    #[validate(custom(function = "validate_telemetry_path"))]
    pub telemetry_path: String,

    /// Syslog listen address, or `unix:<path>` for a Unix datagram socket.
    #[arg(
        long = "nginx.syslog-address",
        env = "NGINX_EXPORTER_SYSLOG_ADDRESS",
        default_value = "127.0.0.1:9514"
    )]
    #[validate(length(min = 1, message = "Syslog address cannot be empty"))]
    pub syslog_address: String,

    /// Syslog tag Nginx messages are sent with.
    #[arg(
        long = "nginx.syslog-tag",
        env = "NGINX_EXPORTER_SYSLOG_TAG",
        default_value = "nginx"
    )]
    #[validate(length(min = 1, message = "Syslog tag cannot be empty"))]
    pub syslog_tag: String,

    /// Buckets for the Prometheus histograms.
    #[arg(
        long = "histogram.buckets",
        env = "NGINX_EXPORTER_BUCKETS",
        default_value = DEFAULT_BUCKETS
    )]
    pub buckets: Buckets,

    /// Path of an access log to tail instead of listening for syslog messages.
    #[arg(long = "access.log-path", env = "NGINX_EXPORTER_ACCESS_LOG")]
    pub access_log: Option<PathBuf>,

    /// How often the access log is polled for new data, in milliseconds.
    #[arg(
        long = "access.poll-interval-ms",
        env = "NGINX_EXPORTER_POLL_INTERVAL_MS",
        default_value_t = 250
    )]
    #[validate(range(min = 1, message = "Poll interval must be at least 1ms"))]
    pub poll_interval_ms: u64,

    /// Prefix of every exposed metric name.
    #[arg(
        long = "metrics.namespace",
        env = "NGINX_EXPORTER_NAMESPACE",
        default_value = DEFAULT_NAMESPACE
    )]
    #[validate(length(min = 1, message = "Namespace cannot be empty"))]
    pub namespace: String,
}

/// Where log lines are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IngestSource {
    /// Tail an access log file.
    File(PathBuf),
    /// Receive syslog datagrams.
    Syslog(SyslogAddress),
}

/// Address of the syslog listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyslogAddress {
    /// UDP `host:port`.
    Udp(String),
    /// Unix datagram socket path.
    Unixgram(PathBuf),
}

impl Config {
    /// Validates the parsed configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any field is invalid or the listen address cannot be parsed.
    pub fn validate_config(&self) -> Result<(), ConfigError> {
        self.validate()?;
        self.listen_socket_addr()?;
        Ok(())
    }

    /// Returns the socket address for binding the HTTP server.
    ///
    /// An address of the form `:port` binds all interfaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the address is not a valid socket address.
    pub fn listen_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let address = if self.listen_address.starts_with(':') {
            format!("0.0.0.0{}", self.listen_address)
        } else {
            self.listen_address.clone()
        };

        address
            .parse()
            .map_err(|source| ConfigError::ListenAddress {
                address: self.listen_address.clone(),
                source,
            })
    }

    /// Returns the configured source of log lines.
    #[must_use]
    pub fn ingest_source(&self) -> IngestSource {
        if let Some(path) = &self.access_log {
            return IngestSource::File(path.clone());
        }

        match self.syslog_address.strip_prefix("unix:") {
            Some(path) => IngestSource::Syslog(SyslogAddress::Unixgram(PathBuf::from(path))),
            None => IngestSource::Syslog(SyslogAddress::Udp(self.syslog_address.clone())),
        }
    }

    /// Returns the access log poll interval.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: ":9147".to_string(),
            telemetry_path: "/metrics".to_string(),
            syslog_address: "127.0.0.1:9514".to_string(),
            syslog_tag: "nginx".to_string(),
            buckets: Buckets::default(),
            access_log: None,
            poll_interval_ms: 250,
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }
}

fn validate_telemetry_path(path: &str) -> Result<(), ValidationError> {
    if !path.starts_with('/') {
        return Err(ValidationError::new("telemetry_path_not_absolute"));
    }
    if path.contains(['{', '}', '*']) || path.split('/').any(|segment| segment.starts_with(':')) {
        return Err(ValidationError::new("telemetry_path_has_wildcard"));
    }
    if RESERVED_PATHS.contains(&path) {
        return Err(ValidationError::new("telemetry_path_reserved"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("nginx-request-exporter").chain(args.iter().copied()))
            .unwrap()
    }

    #[test]
    fn test_config_default_values() {
        let config = Config::default();
        assert_eq!(config.listen_address, ":9147");
        assert_eq!(config.telemetry_path, "/metrics");
        assert_eq!(config.namespace, "nginx_request");
        assert_eq!(config.buckets, Buckets::default());
        assert!(config.validate_config().is_ok());
    }

    #[test]
    fn test_parse_dotted_flags() {
        let config = parse(&[
            "--web.listen-address",
            "127.0.0.1:9000",
            "--web.telemetry-path=/prom",
            "--histogram.buckets",
            ".1,.5,1",
            "--access.log-path",
            "/var/log/nginx/access.log",
        ]);

        assert_eq!(config.listen_address, "127.0.0.1:9000");
        assert_eq!(config.telemetry_path, "/prom");
        assert_eq!(config.buckets.as_slice(), &[0.1, 0.5, 1.0]);
        assert_eq!(
            config.ingest_source(),
            IngestSource::File(PathBuf::from("/var/log/nginx/access.log"))
        );
    }

    #[test]
    fn test_parse_rejects_invalid_buckets() {
        let result = Config::try_parse_from(["nginx-request-exporter", "--histogram.buckets", "1,0.5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_listen_socket_addr() {
        let config = Config::default();
        assert_eq!(
            config.listen_socket_addr().unwrap().to_string(),
            "0.0.0.0:9147"
        );

        let config = Config {
            listen_address: "127.0.0.1:3000".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.listen_socket_addr().unwrap().to_string(),
            "127.0.0.1:3000"
        );

        let config = Config {
            listen_address: "nowhere".to_string(),
            ..Config::default()
        };
        assert!(matches!(
            config.validate_config(),
            Err(ConfigError::ListenAddress { .. })
        ));
    }

    #[test]
    fn test_syslog_source() {
        let config = Config::default();
        assert_eq!(
            config.ingest_source(),
            IngestSource::Syslog(SyslogAddress::Udp("127.0.0.1:9514".to_string()))
        );

        let config = Config {
            syslog_address: "unix:/run/nginx-syslog.sock".to_string(),
            ..Config::default()
        };
        assert_eq!(
            config.ingest_source(),
            IngestSource::Syslog(SyslogAddress::Unixgram(PathBuf::from(
                "/run/nginx-syslog.sock"
            )))
        );
    }

    #[test]
    fn test_validation_failures() {
        for config in [
            Config {
                telemetry_path: "metrics".to_string(),
                ..Config::default()
            },
            Config {
                telemetry_path: "/".to_string(),
                ..Config::default()
            },
            Config {
                telemetry_path: "/health".to_string(),
                ..Config::default()
            },
            Config {
                telemetry_path: "/{name}".to_string(),
                ..Config::default()
            },
            Config {
                telemetry_path: "/:metrics".to_string(),
                ..Config::default()
            },
            Config {
                telemetry_path: "/prom/:name".to_string(),
                ..Config::default()
            },
            Config {
                syslog_tag: String::new(),
                ..Config::default()
            },
            Config {
                namespace: String::new(),
                ..Config::default()
            },
            Config {
                poll_interval_ms: 0,
                ..Config::default()
            },
        ] {
            assert!(
                matches!(config.validate_config(), Err(ConfigError::Validation(_))),
                "{config:?}"
            );
        }
    }

    #[test]
    fn test_poll_interval() {
        let config = Config {
            poll_interval_ms: 1500,
            ..Config::default()
        };
        assert_eq!(config.poll_interval(), Duration::from_millis(1500));
    }
}
