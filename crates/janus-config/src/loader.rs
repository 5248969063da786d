//! Layered settings loader.
//!
//! Layers apply in order, later ones overriding earlier ones:
//! 1. Built-in defaults
//! 2. A TOML or JSON file
//! 3. Environment variables (`PREFIX__SECTION__KEY`)
//! 4. Command-line flags (see [`crate::args`])

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::Path;

use crate::schema::LogFormat;
use crate::{ConfigError, Settings};

/// Builds [`Settings`] from defaults, a file and the environment.
///
/// ```no_run
/// use janus_config::SettingsLoader;
///
/// # fn main() -> Result<(), janus_config::ConfigError> {
/// let settings = SettingsLoader::new()
///     .with_optional_file("janus.toml")?
///     .with_env_prefix("JANUS")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct SettingsLoader {
    settings: Settings,
    env_prefix: Option<String>,
    env_vars: Option<BTreeMap<String, String>>,
}

impl SettingsLoader {
    /// Creates a loader holding the default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets to the default settings.
    #[must_use]
    pub fn with_defaults(mut self) -> Self {
        self.settings = Settings::default();
        self
    }

    /// Replaces the current settings with a TOML (`.toml`) or JSON (`.json`) file.
    ///
    /// Keys absent from the file keep their defaults.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        let format = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| ConfigError::UnsupportedFormat(path.display().to_string()))?;

        self.settings = parse(&content, &format)?;
        Ok(self)
    }

    /// Like [`with_file`](Self::with_file), but a missing file is not an error.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Replaces the current settings with `content` in `format` (`toml` or `json`).
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.settings = parse(content, &format.to_lowercase())?;
        Ok(self)
    }

    /// Enables environment overrides such as `JANUS__SERVER__HTTP_LISTEN_PORT=8080`.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Reads overrides from `vars` instead of the process environment.
    #[must_use]
    pub fn with_env_vars<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env_vars = Some(vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect());
        self
    }

    /// Loads a `.env` file into the process environment if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        let _ = dotenvy::dotenv();
        self
    }

    /// Applies environment overrides and validates.
    pub fn load(self) -> Result<Settings, ConfigError> {
        let settings = self.load_unvalidated()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Applies environment overrides without validating.
    pub fn load_unvalidated(mut self) -> Result<Settings, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            let vars: Vec<(String, String)> = match self.env_vars.take() {
                Some(vars) => vars.into_iter().collect(),
                None => env::vars().collect(),
            };
            for (key, value) in vars.iter().filter(|(k, _)| k.starts_with(&prefix)) {
                self.apply_env_var(key, value, &prefix)?;
            }
        }
        Ok(self.settings)
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let Some(path) = key.strip_prefix(prefix).and_then(|k| k.strip_prefix("__")) else {
            return Ok(());
        };
        let parts: Vec<&str> = path.split("__").collect();
        let server = &mut self.settings.server;
        let telemetry = &mut self.settings.telemetry;

        match parts.as_slice() {
            ["SERVER", "LISTEN_ADDRESS"] => {
                server.listen_address = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected IP address"))?;
            }
            ["SERVER", "HTTP_LISTEN_PORT"] => server.http_listen_port = parse_port(key, value)?,
            ["SERVER", "GRPC_LISTEN_PORT"] => server.grpc_listen_port = parse_port(key, value)?,
            ["SERVER", "GRACEFUL_SHUTDOWN_TIMEOUT"] => {
                server.graceful_shutdown_timeout = parse_duration(key, value)?;
            }
            ["SERVER", "HTTP_READ_TIMEOUT"] => server.http_read_timeout = parse_duration(key, value)?,
            ["SERVER", "HTTP_WRITE_TIMEOUT"] => server.http_write_timeout = parse_duration(key, value)?,
            ["SERVER", "HTTP_IDLE_TIMEOUT"] => server.http_idle_timeout = parse_duration(key, value)?,
            ["SERVER", "LOG_SUCCESS"] => server.log_success = parse_bool_var(key, value)?,
            ["SERVER", "METRICS_NAMESPACE"] => server.metrics_namespace = value.to_string(),
            ["SERVER", "DEBUG_ENDPOINTS"] => server.debug_endpoints = parse_bool_var(key, value)?,

            ["TELEMETRY", "SERVICE_NAME"] => telemetry.service_name = value.to_string(),
            ["TELEMETRY", "LOG_LEVEL"] => telemetry.log_level = value.to_string(),
            ["TELEMETRY", "LOG_FORMAT"] => {
                telemetry.log_format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    "compact" => LogFormat::Compact,
                    _ => {
                        return Err(ConfigError::env_parse_error(
                            key,
                            "expected 'json', 'pretty' or 'compact'",
                        ))
                    }
                };
            }
            ["TELEMETRY", "OTLP_ENDPOINT"] => {
                telemetry.otlp_endpoint = if value.is_empty() { None } else { Some(value.to_string()) };
            }
            ["TELEMETRY", "SAMPLING_RATIO"] => {
                telemetry.sampling_ratio = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected float"))?;
            }
            ["TELEMETRY", "RECENT_SPANS"] => {
                telemetry.recent_spans = value
                    .parse()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected integer"))?;
            }
            ["TELEMETRY", "HISTOGRAM_BUCKETS"] => {
                telemetry.histogram_buckets = value
                    .split(',')
                    .map(|b| b.trim().parse::<f64>())
                    .collect::<Result<_, _>>()
                    .map_err(|_| ConfigError::env_parse_error(key, "expected comma-separated floats"))?;
            }

            _ => {}
        }

        Ok(())
    }
}

fn parse(content: &str, format: &str) -> Result<Settings, ConfigError> {
    match format {
        "toml" => Ok(toml::from_str(content)?),
        "json" => Ok(serde_json::from_str(content)?),
        other => Err(ConfigError::UnsupportedFormat(other.to_string())),
    }
}

fn parse_port(key: &str, value: &str) -> Result<u16, ConfigError> {
    value
        .parse()
        .map_err(|_| ConfigError::env_parse_error(key, "expected port number 0-65535"))
}

fn parse_duration(key: &str, value: &str) -> Result<std::time::Duration, ConfigError> {
    crate::duration::parse(value).map_err(|e| ConfigError::env_parse_error(key, e.to_string()))
}

fn parse_bool_var(key: &str, value: &str) -> Result<bool, ConfigError> {
    parse_bool(value).ok_or_else(|| ConfigError::env_parse_error(key, "expected boolean"))
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
