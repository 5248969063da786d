//! Layered settings for Janus servers.
//!
//! Settings come from four layers, each overriding the previous:
//!
//! 1. Defaults compiled into [`Settings`]
//! 2. A TOML or JSON file
//! 3. Environment variables: `JANUS__SERVER__HTTP_LISTEN_PORT=8080`
//! 4. Flags: `--server.http-listen-port=8080`
//!
//! Files are strict: unknown keys fail to load. Durations are written as
//! `250ms`, `5s`, `2m` or `1h`, or as an integer number of seconds.
//!
//! ```no_run
//! use janus_config::SettingsLoader;
//!
//! # fn main() -> Result<(), janus_config::ConfigError> {
//! let settings = SettingsLoader::new()
//!     .with_optional_file("janus.toml")?
//!     .with_env_prefix("JANUS")
//!     .load()?;
//! println!("http on {}", settings.server.http_listen_port);
//! # Ok(())
//! # }
//! ```
//!
//! ```toml
//! [server]
//! http_listen_port = 8080
//! grpc_listen_port = 9095
//! graceful_shutdown_timeout = "10s"
//! http_idle_timeout = "2m"
//! log_success = false
//!
//! [telemetry]
//! service_name = "ping"
//! log_format = "pretty"
//! ```

pub mod args;
pub mod duration;
mod error;
mod loader;
mod schema;

pub use args::{ConfigArgs, ServerArgs};
pub use duration::DurationError;
pub use error::ConfigError;
pub use loader::SettingsLoader;
pub use schema::{LogFormat, ServerSettings, Settings, TelemetrySettings};
