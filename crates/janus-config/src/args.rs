//! Command-line flags.
//!
//! Flags are the last settings layer. Every flag is optional; an absent flag
//! leaves the file/environment value alone.
//!
//! ```rust,ignore
//! #[derive(clap::Parser)]
//! struct Cli {
//!     #[command(flatten)]
//!     config: janus_config::ConfigArgs,
//! }
//!
//! let settings = Cli::parse().config.load("JANUS")?;
//! ```

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Args;

use crate::schema::LogFormat;
use crate::{ConfigError, Settings, SettingsLoader};

/// `--server.*` flags.
#[derive(Debug, Clone, Default, Args)]
pub struct ServerArgs {
    /// Address both listeners bind to.
    #[arg(long = "server.listen-address", value_name = "IP")]
    pub listen_address: Option<IpAddr>,

    /// HTTP listener port.
    #[arg(long = "server.http-listen-port", value_name = "PORT")]
    pub http_listen_port: Option<u16>,

    /// gRPC listener port.
    #[arg(long = "server.grpc-listen-port", value_name = "PORT")]
    pub grpc_listen_port: Option<u16>,

    /// Time allowed for in-flight work to drain on shutdown.
    #[arg(long = "server.graceful-shutdown-timeout", value_name = "DURATION", value_parser = crate::duration::parse)]
    pub graceful_shutdown_timeout: Option<Duration>,

    /// Time allowed to read a request.
    #[arg(long = "server.http-read-timeout", value_name = "DURATION", value_parser = crate::duration::parse)]
    pub http_read_timeout: Option<Duration>,

    /// Time allowed to produce a response.
    #[arg(long = "server.http-write-timeout", value_name = "DURATION", value_parser = crate::duration::parse)]
    pub http_write_timeout: Option<Duration>,

    /// Time an idle keep-alive connection stays open.
    #[arg(long = "server.http-idle-timeout", value_name = "DURATION", value_parser = crate::duration::parse)]
    pub http_idle_timeout: Option<Duration>,

    /// Log successful requests at info level.
    #[arg(long = "server.log-success", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub log_success: Option<bool>,

    /// Prefix of the request-duration metric.
    #[arg(long = "server.metrics-namespace", value_name = "NAME")]
    pub metrics_namespace: Option<String>,

    /// Serve the /debug route group.
    #[arg(long = "server.debug-endpoints", value_name = "BOOL", num_args = 0..=1, default_missing_value = "true")]
    pub debug_endpoints: Option<bool>,
}

impl ServerArgs {
    /// Overwrites every field whose flag was given.
    pub fn apply(&self, settings: &mut Settings) {
        let server = &mut settings.server;
        if let Some(v) = self.listen_address {
            server.listen_address = v;
        }
        if let Some(v) = self.http_listen_port {
            server.http_listen_port = v;
        }
        if let Some(v) = self.grpc_listen_port {
            server.grpc_listen_port = v;
        }
        if let Some(v) = self.graceful_shutdown_timeout {
            server.graceful_shutdown_timeout = v;
        }
        if let Some(v) = self.http_read_timeout {
            server.http_read_timeout = v;
        }
        if let Some(v) = self.http_write_timeout {
            server.http_write_timeout = v;
        }
        if let Some(v) = self.http_idle_timeout {
            server.http_idle_timeout = v;
        }
        if let Some(v) = self.log_success {
            server.log_success = v;
        }
        if let Some(v) = &self.metrics_namespace {
            server.metrics_namespace = v.clone();
        }
        if let Some(v) = self.debug_endpoints {
            server.debug_endpoints = v;
        }
    }
}

/// Flags for a binary: a config file, the server flags and log overrides.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// TOML or JSON settings file.
    #[arg(long = "config", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub server: ServerArgs,

    /// Log filter directive, e.g. `debug` or `janus_server=trace,info`.
    #[arg(long = "log.level", value_name = "FILTER")]
    pub log_level: Option<String>,

    /// Log line encoding.
    #[arg(long = "log.format", value_enum, value_name = "FORMAT")]
    pub log_format: Option<LogFormat>,
}

impl ConfigArgs {
    /// Runs every layer: defaults, `--config`, `PREFIX__*` variables, then flags.
    pub fn load(&self, env_prefix: &str) -> Result<Settings, ConfigError> {
        let mut loader = SettingsLoader::new();
        if let Some(path) = &self.config_file {
            loader = loader.with_file(path)?;
        }
        let mut settings = loader.with_env_prefix(env_prefix).load_unvalidated()?;
        self.apply(&mut settings);
        settings.validate()?;
        Ok(settings)
    }

    /// Overwrites every field whose flag was given.
    pub fn apply(&self, settings: &mut Settings) {
        self.server.apply(settings);
        if let Some(level) = &self.log_level {
            settings.telemetry.log_level = level.clone();
        }
        if let Some(format) = self.log_format {
            settings.telemetry.log_format = format;
        }
    }
}
