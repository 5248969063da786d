//! Settings schema.
//!
//! Every field has a default, so a file only needs the keys it changes.
//! Unknown keys are rejected.

use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::ConfigError;

/// Root settings document.
///
/// ```toml
/// [server]
/// http_listen_port = 8080
/// grpc_listen_port = 9095
/// graceful_shutdown_timeout = "5s"
/// log_success = true
///
/// [telemetry]
/// log_level = "info"
/// log_format = "json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Listener, timeout and endpoint settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Logging, metrics and tracing settings.
    #[serde(default)]
    pub telemetry: TelemetrySettings,
}

/// Listener and request-handling settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ServerSettings {
    /// Address both listeners bind to.
    #[serde(default = "default_listen_address")]
    pub listen_address: IpAddr,

    /// HTTP listener port. `0` picks an ephemeral port.
    #[serde(default = "default_http_listen_port")]
    pub http_listen_port: u16,

    /// gRPC listener port. `0` picks an ephemeral port.
    #[serde(default = "default_grpc_listen_port")]
    pub grpc_listen_port: u16,

    /// Time allowed for in-flight work to drain before forced termination.
    #[serde(default = "default_graceful_shutdown_timeout", with = "crate::duration")]
    pub graceful_shutdown_timeout: Duration,

    /// Time allowed to read request headers and body.
    #[serde(default = "default_http_read_timeout", with = "crate::duration")]
    pub http_read_timeout: Duration,

    /// Time allowed for a handler to produce its response.
    #[serde(default = "default_http_write_timeout", with = "crate::duration")]
    pub http_write_timeout: Duration,

    /// Time a keep-alive connection may sit without a request.
    #[serde(default = "default_http_idle_timeout", with = "crate::duration")]
    pub http_idle_timeout: Duration,

    /// Log successful requests at `info` instead of `debug`.
    #[serde(default)]
    pub log_success: bool,

    /// Prefix of the request-duration metric.
    #[serde(default = "default_metrics_namespace")]
    pub metrics_namespace: String,

    /// Serve the `/debug` route group.
    #[serde(default = "default_true")]
    pub debug_endpoints: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            listen_address: default_listen_address(),
            http_listen_port: default_http_listen_port(),
            grpc_listen_port: default_grpc_listen_port(),
            graceful_shutdown_timeout: default_graceful_shutdown_timeout(),
            http_read_timeout: default_http_read_timeout(),
            http_write_timeout: default_http_write_timeout(),
            http_idle_timeout: default_http_idle_timeout(),
            log_success: false,
            metrics_namespace: default_metrics_namespace(),
            debug_endpoints: true,
        }
    }
}

fn default_listen_address() -> IpAddr {
    IpAddr::V4(Ipv4Addr::UNSPECIFIED)
}

fn default_http_listen_port() -> u16 {
    80
}

fn default_grpc_listen_port() -> u16 {
    9095
}

fn default_graceful_shutdown_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_http_read_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_http_write_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_http_idle_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_metrics_namespace() -> String {
    "janus".to_string()
}

fn default_true() -> bool {
    true
}

/// Log line encoding.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl From<LogFormat> for janus_telemetry::LogFormat {
    fn from(format: LogFormat) -> Self {
        match format {
            LogFormat::Json => Self::Json,
            LogFormat::Pretty => Self::Pretty,
            LogFormat::Compact => Self::Compact,
        }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct TelemetrySettings {
    /// `service.name` on spans.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Log filter directive.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log line encoding.
    #[serde(default)]
    pub log_format: LogFormat,

    /// OTLP/gRPC collector. Spans stay in-process when unset.
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// Fraction of root traces sampled.
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,

    /// Finished spans kept for `/traces`.
    #[serde(default = "default_recent_spans")]
    pub recent_spans: usize,

    /// Request-duration bucket bounds in seconds.
    #[serde(default = "default_histogram_buckets")]
    pub histogram_buckets: Vec<f64>,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            log_level: default_log_level(),
            log_format: LogFormat::default(),
            otlp_endpoint: None,
            sampling_ratio: default_sampling_ratio(),
            recent_spans: default_recent_spans(),
            histogram_buckets: default_histogram_buckets(),
        }
    }
}

fn default_service_name() -> String {
    "janus".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

fn default_recent_spans() -> usize {
    256
}

fn default_histogram_buckets() -> Vec<f64> {
    janus_telemetry::metrics::DEFAULT_BUCKETS.to_vec()
}

impl TelemetrySettings {
    /// Logging configuration for [`janus_telemetry::init_logging`].
    #[must_use]
    pub fn log_config(&self) -> janus_telemetry::LogConfig {
        janus_telemetry::LogConfig {
            level: self.log_level.clone(),
            format: self.log_format.into(),
            ..janus_telemetry::LogConfig::default()
        }
    }

    /// Tracing configuration for [`janus_telemetry::Tracing::new`].
    #[must_use]
    pub fn trace_config(&self) -> janus_telemetry::TraceConfig {
        janus_telemetry::TraceConfig {
            service_name: self.service_name.clone(),
            sample_ratio: self.sampling_ratio,
            otlp_endpoint: self.otlp_endpoint.clone(),
            recent_capacity: self.recent_spans,
            ..janus_telemetry::TraceConfig::default()
        }
    }
}

impl Settings {
    /// Checks cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let server = &self.server;
        if server.http_listen_port != 0 && server.http_listen_port == server.grpc_listen_port {
            return Err(ConfigError::invalid_value(
                "server.grpc_listen_port",
                "must differ from server.http_listen_port",
            ));
        }
        if server.graceful_shutdown_timeout.is_zero() {
            return Err(ConfigError::invalid_value(
                "server.graceful_shutdown_timeout",
                "must be greater than zero",
            ));
        }
        if !is_metric_prefix(&server.metrics_namespace) {
            return Err(ConfigError::invalid_value(
                "server.metrics_namespace",
                "must match [a-zA-Z_][a-zA-Z0-9_]*",
            ));
        }

        let telemetry = &self.telemetry;
        if !(0.0..=1.0).contains(&telemetry.sampling_ratio) {
            return Err(ConfigError::invalid_value(
                "telemetry.sampling_ratio",
                "must be between 0.0 and 1.0",
            ));
        }
        if telemetry.histogram_buckets.is_empty()
            || telemetry.histogram_buckets.windows(2).any(|w| w[0] >= w[1])
        {
            return Err(ConfigError::invalid_value(
                "telemetry.histogram_buckets",
                "must be a non-empty, strictly increasing list",
            ));
        }

        Ok(())
    }
}

fn is_metric_prefix(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        None => true,
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        Some(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.server.http_listen_port, 80);
        assert_eq!(settings.server.grpc_listen_port, 9095);
        assert_eq!(settings.server.graceful_shutdown_timeout, Duration::from_secs(5));
        assert_eq!(settings.server.http_idle_timeout, Duration::from_secs(120));
        assert!(!settings.server.log_success);
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_same_ports_rejected() {
        let mut settings = Settings::default();
        settings.server.grpc_listen_port = 80;
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("server.grpc_listen_port"));
    }

    #[test]
    fn test_two_ephemeral_ports_allowed() {
        let mut settings = Settings::default();
        settings.server.http_listen_port = 0;
        settings.server.grpc_listen_port = 0;
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_zero_graceful_timeout_rejected() {
        let mut settings = Settings::default();
        settings.server.graceful_shutdown_timeout = Duration::ZERO;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_bad_namespace_rejected() {
        let mut settings = Settings::default();
        settings.server.metrics_namespace = "my-service".to_string();
        assert!(settings.validate().is_err());

        settings.server.metrics_namespace = String::new();
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_unsorted_buckets_rejected() {
        let mut settings = Settings::default();
        settings.telemetry.histogram_buckets = vec![0.5, 0.1];
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let result: Result<Settings, _> = toml::from_str("[server]\nhttp_port = 1\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_durations_accept_strings_and_integers() {
        let settings: Settings = toml::from_str(
            r#"
            [server]
            graceful_shutdown_timeout = "250ms"
            http_idle_timeout = 30
            "#,
        )
        .unwrap();
        assert_eq!(settings.server.graceful_shutdown_timeout, Duration::from_millis(250));
        assert_eq!(settings.server.http_idle_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_serialized_durations_are_readable() {
        let json = serde_json::to_value(ServerSettings::default()).unwrap();
        assert_eq!(json["graceful_shutdown_timeout"], "5s");
        assert_eq!(json["http_idle_timeout"], "2m");
    }
}
