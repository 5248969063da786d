//! Request-duration histogram shared by both transports.
//!
//! [`RequestDuration`] owns a private Prometheus recorder instead of
//! installing one globally. The server builds one instance and hands an
//! `Arc` to the HTTP chain and the gRPC chain, so both record into the same
//! series and `/metrics` renders exactly that recorder.
//!
//! | Metric | Type | Labels |
//! |--------|------|--------|
//! | `<namespace>_request_duration_seconds` | Histogram | `method`, `route`, `status_code`, `ws` |

use std::time::Duration;

use metrics::{Key, KeyName, Label, Level, Metadata, Recorder, SharedString, Unit};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Suffix of the histogram name.
pub const REQUEST_DURATION_SECONDS: &str = "request_duration_seconds";

/// Bucket bounds in seconds.
pub const DEFAULT_BUCKETS: [f64; 11] = [0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0];

/// Label values of one observation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestLabels {
    /// HTTP method, or `gRPC`.
    pub method: String,
    /// Matched route template, full gRPC method, or `other`.
    pub route: String,
    /// Status class (`2xx`, `5xx`, `success`, `error`).
    pub status: String,
    /// Websocket upgrade or streaming call.
    pub streaming: bool,
}

/// Latency histogram keyed by (method, route, status class, streaming).
pub struct RequestDuration {
    name: String,
    recorder: PrometheusRecorder,
    handle: PrometheusHandle,
}

impl std::fmt::Debug for RequestDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestDuration").field("name", &self.name).finish_non_exhaustive()
    }
}

impl RequestDuration {
    /// Creates the histogram `<namespace>_request_duration_seconds` with
    /// [`DEFAULT_BUCKETS`].
    pub fn new(namespace: &str) -> TelemetryResult<Self> {
        Self::with_buckets(namespace, &DEFAULT_BUCKETS)
    }

    /// Creates the histogram with explicit bucket bounds.
    pub fn with_buckets(namespace: &str, buckets: &[f64]) -> TelemetryResult<Self> {
        let name = if namespace.is_empty() {
            REQUEST_DURATION_SECONDS.to_string()
        } else {
            format!("{namespace}_{REQUEST_DURATION_SECONDS}")
        };

        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(Matcher::Full(name.clone()), buckets)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?
            .build_recorder();
        let handle = recorder.handle();

        recorder.describe_histogram(
            KeyName::from(name.clone()),
            Some(Unit::Seconds),
            SharedString::from("Time (in seconds) spent serving HTTP and gRPC requests."),
        );

        Ok(Self { name, recorder, handle })
    }

    /// Full metric name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records one observation.
    pub fn observe(&self, labels: &RequestLabels, elapsed: Duration) {
        let key = Key::from_parts(
            self.name.clone(),
            vec![
                Label::new("method", labels.method.clone()),
                Label::new("route", labels.route.clone()),
                Label::new("status_code", labels.status.clone()),
                Label::new("ws", if labels.streaming { "true" } else { "false" }),
            ],
        );
        let metadata = Metadata::new(module_path!(), Level::INFO, Some(module_path!()));
        self.recorder
            .register_histogram(&key, &metadata)
            .record(elapsed.as_secs_f64());
    }

    /// Renders every series in Prometheus text exposition format.
    #[must_use]
    pub fn render(&self) -> String {
        self.handle.render()
    }

    /// Handle for rendering from elsewhere.
    #[must_use]
    pub fn handle(&self) -> PrometheusHandle {
        self.handle.clone()
    }

    /// Sums the `_count` series whose label set contains every `needle`.
    ///
    /// Intended for tests and debug pages; parses the rendered text.
    #[must_use]
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn sample_count(&self, needles: &[&str]) -> u64 {
        let prefix = format!("{}_count", self.name);
        self.render()
            .lines()
            .filter(|line| line.starts_with(&prefix))
            .filter(|line| needles.iter().all(|n| line.contains(n)))
            .filter_map(|line| line.rsplit(' ').next())
            .filter_map(|value| value.parse::<f64>().ok())
            .map(|value| value as u64)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(route: &str, status: &str) -> RequestLabels {
        RequestLabels {
            method: "GET".to_string(),
            route: route.to_string(),
            status: status.to_string(),
            streaming: false,
        }
    }

    #[test]
    fn test_name_uses_namespace() {
        assert_eq!(RequestDuration::new("janus").unwrap().name(), "janus_request_duration_seconds");
        assert_eq!(RequestDuration::new("").unwrap().name(), "request_duration_seconds");
    }

    #[test]
    fn test_observations_render_as_histogram() {
        let histogram = RequestDuration::new("test").unwrap();
        histogram.observe(&labels("/users/{id}", "2xx"), Duration::from_millis(12));
        histogram.observe(&labels("/users/{id}", "2xx"), Duration::from_millis(30));
        histogram.observe(&labels("/users/{id}", "5xx"), Duration::from_millis(3));

        let text = histogram.render();
        assert!(text.contains("test_request_duration_seconds_bucket"));
        assert!(text.contains("route=\"/users/{id}\""));
        assert_eq!(histogram.sample_count(&["status_code=\"2xx\""]), 2);
        assert_eq!(histogram.sample_count(&["route=\"/users/{id}\""]), 3);
    }

    #[test]
    fn test_separate_instances_do_not_share_series() {
        let first = RequestDuration::new("first").unwrap();
        let second = RequestDuration::new("first").unwrap();
        first.observe(&labels("/a", "2xx"), Duration::from_millis(1));

        assert_eq!(first.sample_count(&[]), 1);
        assert_eq!(second.sample_count(&[]), 0);
    }

    #[test]
    fn test_empty_buckets_rejected() {
        assert!(RequestDuration::with_buckets("x", &[]).is_err());
    }
}
