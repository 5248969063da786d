//! Error types for the server.
//!
//! | Error | Raised by | Effect |
//! |-------|-----------|--------|
//! | [`BindError`] | [`Server::bind`](crate::Server::bind) | fatal, nothing stays bound |
//! | [`HandlerError`] | route handlers | JSON error response |
//! | [`ServerError`] | construction | fatal |
//! | [`ShutdownTimeoutExceeded`] | the lifecycle | logged, shutdown escalates |
//!
//! Accept failures and handler panics are never returned to the caller; they
//! are logged where they happen.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use http::StatusCode;
use thiserror::Error;

/// Which listener an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listener {
    /// Native HTTP listener.
    Http,
    /// gRPC listener.
    Rpc,
}

impl fmt::Display for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http => f.write_str("HTTP"),
            Self::Rpc => f.write_str("gRPC"),
        }
    }
}

/// A listener could not be bound.
#[derive(Debug, Error)]
#[error("failed to bind {listener} listener on {addr}")]
pub struct BindError {
    /// Listener that failed.
    pub listener: Listener,
    /// Address it tried to bind.
    pub addr: SocketAddr,
    /// Underlying socket error.
    #[source]
    pub source: std::io::Error,
}

/// Failure reported by a route handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request is malformed; answered with `400`.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Answer with a specific status.
    #[error("{message}")]
    Status {
        /// Response status.
        status: StatusCode,
        /// Message placed in the error envelope.
        message: String,
    },

    /// Unexpected failure; answered with `500`. The cause is logged, not sent.
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    /// Creates a [`HandlerError::Status`].
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// Status code the error is answered with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Status { status, .. } => *status,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Errors that stop a server from being built.
#[derive(Debug, Error)]
pub enum ServerError {
    /// A listener could not be bound.
    #[error(transparent)]
    Bind(#[from] BindError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] janus_config::ConfigError),

    /// The histogram or tracer could not be created.
    #[error(transparent)]
    Telemetry(#[from] janus_telemetry::TelemetryError),

    /// A built-in route could not be registered.
    #[error("invalid route: {0}")]
    Route(#[from] janus_router::RouteError),
}

/// Draining did not finish within the graceful shutdown timeout.
#[derive(Debug, Clone, Copy, Error)]
#[error("graceful shutdown did not finish within {timeout:?}; forcing termination")]
pub struct ShutdownTimeoutExceeded {
    /// The timeout that elapsed.
    pub timeout: Duration,
}
