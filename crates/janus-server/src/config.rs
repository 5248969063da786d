//! Runtime server configuration.
//!
//! [`Config`] is the serializable [`Settings`] plus what cannot be read
//! from a file: user middleware, user interceptors and optionally a histogram
//! or tracer built elsewhere.
//!
//! ```rust
//! use janus_server::Config;
//! use std::time::Duration;
//!
//! let config = Config::builder()
//!     .http_listen_port(8080)
//!     .grpc_listen_port(9095)
//!     .graceful_shutdown_timeout(Duration::from_secs(10))
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.http_listen_port(), 8080);
//! ```

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use janus_config::{ConfigError, Settings};
use janus_middleware::{Http, Rpc, SharedMiddleware};
use janus_telemetry::{RequestDuration, TraceConfig, Tracing};

/// Immutable configuration of one server.
#[derive(Clone)]
pub struct Config {
    settings: Settings,
    http_middleware: Vec<SharedMiddleware<Http>>,
    rpc_interceptors: Vec<SharedMiddleware<Rpc>>,
    histogram: Option<Arc<RequestDuration>>,
    tracing: Option<Arc<Tracing>>,
}

impl Config {
    /// Starts from default settings.
    #[must_use]
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new(Settings::default())
    }

    /// Starts from loaded settings.
    #[must_use]
    pub fn from_settings(settings: Settings) -> ConfigBuilder {
        ConfigBuilder::new(settings)
    }

    /// The serializable part of the configuration.
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Address of the HTTP listener.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(self.settings.server.listen_address, self.settings.server.http_listen_port)
    }

    /// Address of the gRPC listener.
    #[must_use]
    pub fn grpc_addr(&self) -> SocketAddr {
        SocketAddr::new(self.settings.server.listen_address, self.settings.server.grpc_listen_port)
    }

    /// HTTP listener port.
    #[must_use]
    pub fn http_listen_port(&self) -> u16 {
        self.settings.server.http_listen_port
    }

    /// gRPC listener port.
    #[must_use]
    pub fn grpc_listen_port(&self) -> u16 {
        self.settings.server.grpc_listen_port
    }

    /// Time allowed for draining before forced termination.
    #[must_use]
    pub fn graceful_shutdown_timeout(&self) -> Duration {
        self.settings.server.graceful_shutdown_timeout
    }

    /// Time allowed to read request headers and body.
    #[must_use]
    pub fn http_read_timeout(&self) -> Duration {
        self.settings.server.http_read_timeout
    }

    /// Time allowed for a handler to produce its response.
    #[must_use]
    pub fn http_write_timeout(&self) -> Duration {
        self.settings.server.http_write_timeout
    }

    /// Time a keep-alive connection may sit idle.
    #[must_use]
    pub fn http_idle_timeout(&self) -> Duration {
        self.settings.server.http_idle_timeout
    }

    /// Whether successful requests are logged at `info`.
    #[must_use]
    pub fn log_success(&self) -> bool {
        self.settings.server.log_success
    }

    /// Whether the `/debug` routes are served.
    #[must_use]
    pub fn debug_endpoints(&self) -> bool {
        self.settings.server.debug_endpoints
    }

    /// User HTTP middleware, outermost first.
    #[must_use]
    pub fn http_middleware(&self) -> &[SharedMiddleware<Http>] {
        &self.http_middleware
    }

    /// User gRPC interceptors, outermost first.
    #[must_use]
    pub fn rpc_interceptors(&self) -> &[SharedMiddleware<Rpc>] {
        &self.rpc_interceptors
    }

    /// Tracing settings derived from the telemetry section.
    #[must_use]
    pub fn trace_config(&self) -> TraceConfig {
        self.settings.telemetry.trace_config()
    }

    pub(crate) fn histogram(&self) -> Option<Arc<RequestDuration>> {
        self.histogram.clone()
    }

    pub(crate) fn tracing(&self) -> Option<Arc<Tracing>> {
        self.tracing.clone()
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let http: Vec<_> = self.http_middleware.iter().map(|m| m.name()).collect();
        let rpc: Vec<_> = self.rpc_interceptors.iter().map(|m| m.name()).collect();
        f.debug_struct("Config")
            .field("settings", &self.settings)
            .field("http_middleware", &http)
            .field("rpc_interceptors", &rpc)
            .field("histogram", &self.histogram.is_some())
            .field("tracing", &self.tracing.is_some())
            .finish()
    }
}

/// Builder for [`Config`].
#[derive(Clone)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    fn new(settings: Settings) -> Self {
        Self {
            config: Config {
                settings,
                http_middleware: Vec::new(),
                rpc_interceptors: Vec::new(),
                histogram: None,
                tracing: None,
            },
        }
    }

    /// Address both listeners bind to.
    #[must_use]
    pub fn listen_address(mut self, addr: IpAddr) -> Self {
        self.config.settings.server.listen_address = addr;
        self
    }

    /// HTTP listener port; `0` picks an ephemeral port.
    #[must_use]
    pub fn http_listen_port(mut self, port: u16) -> Self {
        self.config.settings.server.http_listen_port = port;
        self
    }

    /// gRPC listener port; `0` picks an ephemeral port.
    #[must_use]
    pub fn grpc_listen_port(mut self, port: u16) -> Self {
        self.config.settings.server.grpc_listen_port = port;
        self
    }

    /// Time allowed for draining before forced termination.
    #[must_use]
    pub fn graceful_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.config.settings.server.graceful_shutdown_timeout = timeout;
        self
    }

    /// Time allowed to read request headers and body.
    #[must_use]
    pub fn http_read_timeout(mut self, timeout: Duration) -> Self {
        self.config.settings.server.http_read_timeout = timeout;
        self
    }

    /// Time allowed for a handler to produce its response.
    #[must_use]
    pub fn http_write_timeout(mut self, timeout: Duration) -> Self {
        self.config.settings.server.http_write_timeout = timeout;
        self
    }

    /// Time a keep-alive connection may sit idle.
    #[must_use]
    pub fn http_idle_timeout(mut self, timeout: Duration) -> Self {
        self.config.settings.server.http_idle_timeout = timeout;
        self
    }

    /// Log successful requests at `info`.
    #[must_use]
    pub fn log_success(mut self, enabled: bool) -> Self {
        self.config.settings.server.log_success = enabled;
        self
    }

    /// Prefix of the request-duration metric.
    #[must_use]
    pub fn metrics_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.settings.server.metrics_namespace = namespace.into();
        self
    }

    /// Serve the `/debug` routes.
    #[must_use]
    pub fn debug_endpoints(mut self, enabled: bool) -> Self {
        self.config.settings.server.debug_endpoints = enabled;
        self
    }

    /// Appends user HTTP middleware after the built-in stages.
    #[must_use]
    pub fn http_middleware<I>(mut self, middleware: I) -> Self
    where
        I: IntoIterator<Item = SharedMiddleware<Http>>,
    {
        self.config.http_middleware.extend(middleware);
        self
    }

    /// Appends user gRPC interceptors after the built-in stages.
    #[must_use]
    pub fn rpc_interceptors<I>(mut self, interceptors: I) -> Self
    where
        I: IntoIterator<Item = SharedMiddleware<Rpc>>,
    {
        self.config.rpc_interceptors.extend(interceptors);
        self
    }

    /// Records into an existing histogram instead of creating one.
    #[must_use]
    pub fn histogram(mut self, histogram: Arc<RequestDuration>) -> Self {
        self.config.histogram = Some(histogram);
        self
    }

    /// Uses an existing tracer instead of creating one.
    #[must_use]
    pub fn tracing(mut self, tracing: Arc<Tracing>) -> Self {
        self.config.tracing = Some(tracing);
        self
    }

    /// Validates and freezes the configuration.
    pub fn build(self) -> Result<Config, ConfigError> {
        self.config.settings.validate()?;
        Ok(self.config)
    }
}

impl fmt::Debug for ConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigBuilder").field("config", &self.config).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::builder().build().unwrap();
        assert_eq!(config.http_listen_port(), 80);
        assert_eq!(config.grpc_listen_port(), 9095);
        assert_eq!(config.graceful_shutdown_timeout(), Duration::from_secs(5));
        assert!(!config.log_success());
        assert!(config.http_middleware().is_empty());
    }

    #[test]
    fn test_duplicate_ports_rejected() {
        let err = Config::builder()
            .http_listen_port(8080)
            .grpc_listen_port(8080)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_two_ephemeral_ports_allowed() {
        let config = Config::builder().http_listen_port(0).grpc_listen_port(0).build();
        assert!(config.is_ok());
    }

    #[test]
    fn test_zero_graceful_timeout_rejected() {
        let result = Config::builder().graceful_shutdown_timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_from_settings_keeps_values() {
        let mut settings = Settings::default();
        settings.server.http_listen_port = 3100;
        settings.server.log_success = true;

        let config = Config::from_settings(settings).build().unwrap();
        assert_eq!(config.http_listen_port(), 3100);
        assert!(config.log_success());
        assert_eq!(config.http_addr().port(), 3100);
    }
}
