//! Observability for Janus services.
//!
//! - **Logging**: `tracing` events rendered by `tracing-subscriber` as JSON
//!   or human-readable text.
//! - **Metrics**: one request-duration histogram per server, backed by a
//!   private Prometheus recorder and rendered at `/metrics`.
//! - **Tracing**: an OpenTelemetry SDK provider per server with W3C
//!   propagation, an in-memory buffer for `/traces` and optional OTLP export.
//!
//! Nothing here installs process-wide metric recorders or tracer providers.
//! The server constructs [`RequestDuration`] and [`Tracing`] and threads
//! them through its middleware explicitly. Only [`init_logging`] touches
//! global state, and only when the binary calls it.
//!
//! ```rust,ignore
//! use janus_telemetry::{init_logging, LogConfig, RequestDuration, TraceConfig, Tracing};
//!
//! init_logging(&LogConfig::default())?;
//! let histogram = RequestDuration::new("janus")?;
//! let tracing = Tracing::new(&TraceConfig::default())?;
//! ```

pub mod error;
pub mod logging;
pub mod metrics;
pub mod trace;

pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig, LogFormat};
pub use metrics::{RequestDuration, RequestLabels};
pub use trace::{FinishedSpan, HeaderExtractor, HeaderInjector, RecentSpans, TraceConfig, Tracing};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;
