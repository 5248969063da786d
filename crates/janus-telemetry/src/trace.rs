//! OpenTelemetry tracing owned by the server.
//!
//! [`Tracing`] bundles an SDK tracer provider, the tracer built from it and a
//! W3C trace-context propagator. Nothing is registered globally: the server
//! passes the bundle to the middleware stages that need it.
//!
//! Every finished span is exported into [`RecentSpans`], a fixed-size ring
//! buffer rendered by the `/traces` endpoint. When an OTLP endpoint is
//! configured, spans are additionally batch-exported over gRPC.

use std::borrow::Cow;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanId, SpanKind, Status, TraceContextExt, Tracer as _, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::export::trace::{ExportResult, SpanData, SpanExporter};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use parking_lot::Mutex;
use serde::Serialize;

use crate::error::TelemetryError;
use crate::TelemetryResult;

/// Tracing configuration.
#[derive(Debug, Clone)]
pub struct TraceConfig {
    /// `service.name` resource attribute.
    pub service_name: String,
    /// `service.version` resource attribute.
    pub service_version: String,
    /// Fraction of root traces sampled, `0.0..=1.0`.
    pub sample_ratio: f64,
    /// OTLP/gRPC collector, e.g. `http://localhost:4317`.
    pub otlp_endpoint: Option<String>,
    /// Finished spans kept for `/traces`.
    pub recent_capacity: usize,
}

impl Default for TraceConfig {
    fn default() -> Self {
        Self {
            service_name: "janus".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            sample_ratio: 1.0,
            otlp_endpoint: None,
            recent_capacity: 256,
        }
    }
}

/// Tracer, propagator and span buffer for one server.
#[derive(Debug)]
pub struct Tracing {
    provider: TracerProvider,
    tracer: Tracer,
    propagator: TraceContextPropagator,
    recent: RecentSpans,
}

impl Tracing {
    /// Builds the provider. Must run inside a Tokio runtime when an OTLP
    /// endpoint is configured.
    pub fn new(config: &TraceConfig) -> TelemetryResult<Self> {
        let recent = RecentSpans::new(config.recent_capacity);

        let resource = Resource::new([
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_NAME,
                config.service_name.clone(),
            ),
            KeyValue::new(
                opentelemetry_semantic_conventions::resource::SERVICE_VERSION,
                config.service_version.clone(),
            ),
        ]);

        let sampler = if config.sample_ratio >= 1.0 {
            Sampler::ParentBased(Box::new(Sampler::AlwaysOn))
        } else if config.sample_ratio <= 0.0 {
            Sampler::ParentBased(Box::new(Sampler::AlwaysOff))
        } else {
            Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(config.sample_ratio)))
        };

        let mut builder = TracerProvider::builder()
            .with_simple_exporter(recent.clone())
            .with_sampler(sampler)
            .with_resource(resource);

        if let Some(endpoint) = &config.otlp_endpoint {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
                .map_err(|e| TelemetryError::Tracing(e.to_string()))?;
            builder = builder.with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio);
        }

        let provider = builder.build();
        let tracer = provider.tracer("janus");

        Ok(Self {
            provider,
            tracer,
            propagator: TraceContextPropagator::new(),
            recent,
        })
    }

    /// The SDK tracer.
    #[must_use]
    pub fn tracer(&self) -> &Tracer {
        &self.tracer
    }

    /// Reads a `traceparent` from `headers`. Returns an empty context when
    /// none is present or it does not parse.
    #[must_use]
    pub fn extract(&self, headers: &http::HeaderMap) -> Context {
        self.propagator.extract(&HeaderExtractor(headers))
    }

    /// Writes the span of `cx` into `headers` as `traceparent`.
    pub fn inject(&self, cx: &Context, headers: &mut http::HeaderMap) {
        self.propagator.inject_context(cx, &mut HeaderInjector(headers));
    }

    /// Starts a server span as a child of `parent` and returns the context
    /// holding it.
    pub fn start_server_span(
        &self,
        name: impl Into<Cow<'static, str>>,
        parent: &Context,
        attributes: Vec<KeyValue>,
    ) -> Context {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .with_attributes(attributes)
            .start_with_context(&self.tracer, parent);
        parent.with_span(span)
    }

    /// Buffer of recently finished spans.
    #[must_use]
    pub fn recent(&self) -> &RecentSpans {
        &self.recent
    }

    /// Flushes and stops every exporter.
    pub fn shutdown(&self) {
        for result in self.provider.force_flush() {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to flush spans");
            }
        }
        if let Err(e) = self.provider.shutdown() {
            tracing::debug!(error = %e, "tracer provider shutdown");
        }
    }
}

/// Span exporter keeping the last N finished spans in memory.
#[derive(Debug, Clone)]
pub struct RecentSpans {
    spans: Arc<Mutex<VecDeque<FinishedSpan>>>,
    capacity: usize,
}

/// A finished span as rendered by `/traces`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FinishedSpan {
    /// Hex trace ID.
    pub trace_id: String,
    /// Hex span ID.
    pub span_id: String,
    /// Hex parent span ID, absent for roots.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_span_id: Option<String>,
    /// Span name.
    pub name: String,
    /// Span kind.
    pub kind: String,
    /// Wall-clock start.
    pub start: DateTime<Utc>,
    /// Duration in milliseconds.
    pub duration_ms: f64,
    /// `unset`, `ok`, or `error: <description>`.
    pub status: String,
    /// Span attributes, stringified.
    pub attributes: BTreeMap<String, String>,
}

impl RecentSpans {
    /// Creates a buffer holding at most `capacity` spans.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            spans: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    fn push(&self, span: FinishedSpan) {
        if self.capacity == 0 {
            return;
        }
        let mut spans = self.spans.lock();
        while spans.len() >= self.capacity {
            spans.pop_front();
        }
        spans.push_back(span);
    }

    /// Most recent spans, newest last.
    #[must_use]
    pub fn snapshot(&self) -> Vec<FinishedSpan> {
        self.spans.lock().iter().cloned().collect()
    }

    /// Spans belonging to one trace.
    #[must_use]
    pub fn by_trace(&self, trace_id: &str) -> Vec<FinishedSpan> {
        self.spans
            .lock()
            .iter()
            .filter(|s| s.trace_id == trace_id)
            .cloned()
            .collect()
    }

    /// Renders the buffer as a JSON array.
    pub fn to_json(&self) -> TelemetryResult<String> {
        Ok(serde_json::to_string(&self.snapshot())?)
    }
}

impl From<SpanData> for FinishedSpan {
    fn from(span: SpanData) -> Self {
        let duration = span
            .end_time
            .duration_since(span.start_time)
            .unwrap_or_default();
        let parent_span_id = (span.parent_span_id != SpanId::INVALID).then(|| span.parent_span_id.to_string());
        let status = match &span.status {
            Status::Unset => "unset".to_string(),
            Status::Ok => "ok".to_string(),
            Status::Error { description } => format!("error: {description}"),
        };

        Self {
            trace_id: span.span_context.trace_id().to_string(),
            span_id: span.span_context.span_id().to_string(),
            parent_span_id,
            name: span.name.to_string(),
            kind: format!("{:?}", span.span_kind).to_lowercase(),
            start: DateTime::<Utc>::from(span.start_time),
            duration_ms: duration.as_secs_f64() * 1000.0,
            status,
            attributes: span
                .attributes
                .iter()
                .map(|kv| (kv.key.to_string(), kv.value.to_string()))
                .collect(),
        }
    }
}

impl SpanExporter for RecentSpans {
    fn export(&mut self, batch: Vec<SpanData>) -> BoxFuture<'static, ExportResult> {
        for span in batch {
            self.push(FinishedSpan::from(span));
        }
        Box::pin(std::future::ready(Ok(())))
    }
}

/// Reads propagation headers from an `http::HeaderMap`.
pub struct HeaderExtractor<'a>(pub &'a http::HeaderMap);

impl opentelemetry::propagation::Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(http::HeaderName::as_str).collect()
    }
}

/// Writes propagation headers into an `http::HeaderMap`.
pub struct HeaderInjector<'a>(pub &'a mut http::HeaderMap);

impl opentelemetry::propagation::Injector for HeaderInjector<'_> {
    fn set(&mut self, key: &str, value: String) {
        if let (Ok(name), Ok(val)) = (
            http::header::HeaderName::try_from(key),
            http::header::HeaderValue::try_from(value),
        ) {
            self.0.insert(name, val);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use opentelemetry::trace::Span as _;

    const PARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    #[test]
    fn test_finished_spans_are_buffered() {
        let tracing = Tracing::new(&TraceConfig::default()).unwrap();
        let cx = tracing.start_server_span("GET /ping", &Context::new(), vec![KeyValue::new("route", "/ping")]);
        cx.span().end();

        let spans = tracing.recent().snapshot();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "GET /ping");
        assert_eq!(spans[0].kind, "server");
        assert_eq!(spans[0].attributes.get("route").map(String::as_str), Some("/ping"));
        assert!(spans[0].parent_span_id.is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_otlp_exporter_shuts_down_inside_runtime() {
        let config = TraceConfig {
            otlp_endpoint: Some("http://127.0.0.1:1".to_string()),
            ..TraceConfig::default()
        };
        let tracing = std::sync::Arc::new(Tracing::new(&config).unwrap());
        let cx = tracing.start_server_span("GET /ping", &Context::new(), Vec::new());
        cx.span().end();
        assert_eq!(tracing.recent().snapshot().len(), 1);

        let shutting_down = std::sync::Arc::clone(&tracing);
        tokio::time::timeout(
            std::time::Duration::from_secs(15),
            tokio::task::spawn_blocking(move || shutting_down.shutdown()),
        )
        .await
        .expect("shutdown did not return")
        .unwrap();
    }

    #[test]
    fn test_extracted_parent_is_continued() {
        let tracing = Tracing::new(&TraceConfig::default()).unwrap();
        let mut headers = http::HeaderMap::new();
        headers.insert("traceparent", PARENT.parse().unwrap());

        let parent = tracing.extract(&headers);
        let cx = tracing.start_server_span("child", &parent, Vec::new());
        let trace_id = cx.span().span_context().trace_id().to_string();
        cx.span().end();

        assert_eq!(trace_id, "4bf92f3577b34da6a3ce929d0e0e4736");
        let spans = tracing.recent().by_trace(&trace_id);
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
    }

    #[test]
    fn test_inject_round_trips_trace_id() {
        let tracing = Tracing::new(&TraceConfig::default()).unwrap();
        let cx = tracing.start_server_span("outbound", &Context::new(), Vec::new());

        let mut headers = http::HeaderMap::new();
        tracing.inject(&cx, &mut headers);
        let value = headers.get("traceparent").unwrap().to_str().unwrap();
        assert!(value.contains(&cx.span().span_context().trace_id().to_string()));
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let tracing = Tracing::new(&TraceConfig {
            recent_capacity: 2,
            ..TraceConfig::default()
        })
        .unwrap();
        for name in ["a", "b", "c"] {
            let mut span = tracing.tracer().start(name);
            span.end();
        }
        let names: Vec<_> = tracing.recent().snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["b", "c"]);
    }

    #[test]
    fn test_json_rendering() {
        let tracing = Tracing::new(&TraceConfig::default()).unwrap();
        let mut span = tracing.tracer().start("rendered");
        span.set_status(Status::error("boom"));
        span.end();

        let json: serde_json::Value = serde_json::from_str(&tracing.recent().to_json().unwrap()).unwrap();
        assert_eq!(json[0]["name"], "rendered");
        assert_eq!(json[0]["status"], "error: boom");
    }
}
