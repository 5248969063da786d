//! Structured logging.
//!
//! Installs a `tracing-subscriber` registry with an [`EnvFilter`] and a
//! single `fmt` layer. `RUST_LOG` takes precedence over the configured level
//! so operators can raise verbosity for one module without a config change.
//!
//! ```rust,ignore
//! use janus_telemetry::logging::{init_logging, LogConfig, LogFormat};
//!
//! init_logging(&LogConfig { format: LogFormat::Pretty, ..LogConfig::default() })?;
//! tracing::info!(http.method = "GET", route = "/ping", "request served");
//! ```

use std::str::FromStr;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Output encoding of log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

impl FromStr for LogFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" | "text" => Ok(Self::Compact),
            other => Err(TelemetryError::Logging(format!("unknown log format `{other}`"))),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Default filter directive, e.g. `info` or `janus_server=debug,info`.
    pub level: String,
    /// Line encoding.
    pub format: LogFormat,
    /// Include the module path of each event.
    pub include_target: bool,
    /// Include source file and line.
    pub file_line_info: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            include_target: true,
            file_line_info: false,
        }
    }
}

/// Builds the filter: `RUST_LOG` if set and valid, the configured level otherwise.
pub fn env_filter(level: &str) -> TelemetryResult<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|e| TelemetryError::Logging(format!("invalid log level `{level}`: {e}")))
}

/// Installs the global log subscriber.
///
/// Fails if a subscriber is already installed.
pub fn init_logging(config: &LogConfig) -> TelemetryResult<()> {
    let filter = env_filter(&config.level)?;
    let base = tracing_subscriber::fmt::layer()
        .with_target(config.include_target)
        .with_file(config.file_line_info)
        .with_line_number(config.file_line_info);

    let layer = match config.format {
        LogFormat::Json => base.json().with_filter(filter).boxed(),
        LogFormat::Pretty => base.pretty().with_filter(filter).boxed(),
        LogFormat::Compact => base.compact().with_filter(filter).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .try_init()
        .map_err(|e| TelemetryError::Logging(e.to_string()))
}

/// Field names shared by every log line Janus emits.
pub mod fields {
    /// Transport that served the request (`http` or `grpc`).
    pub const TRANSPORT: &str = "transport";
    /// Request method, or `gRPC` for RPC calls.
    pub const METHOD: &str = "method";
    /// Matched route template or full gRPC method.
    pub const ROUTE: &str = "route";
    /// Status class label.
    pub const STATUS: &str = "status";
    /// Elapsed time in milliseconds.
    pub const DURATION_MS: &str = "duration_ms";
    /// W3C trace ID.
    pub const TRACE_ID: &str = "trace_id";
    /// Listener the event concerns (`http` or `grpc`).
    pub const LISTENER: &str = "listener";
}
