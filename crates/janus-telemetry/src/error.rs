//! Telemetry error types.

use thiserror::Error;

/// Errors raised while setting up logging, metrics or tracing.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder could not be built.
    #[error("failed to initialize metrics: {0}")]
    Metrics(String),

    /// The tracer provider or an exporter could not be built.
    #[error("failed to initialize tracing: {0}")]
    Tracing(String),

    /// The log subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logging(String),

    /// A finished-span snapshot could not be serialized.
    #[error("failed to serialize spans: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TelemetryError::Metrics("bad buckets".to_string());
        assert_eq!(err.to_string(), "failed to initialize metrics: bad buckets");
    }
}
