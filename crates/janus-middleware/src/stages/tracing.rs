//! Trace-context propagation.
//!
//! Continues a W3C `traceparent` from the request headers, or starts a new
//! root, and opens a server span around the rest of the chain. The
//! OpenTelemetry [`Context`] holding the span is inserted into the request
//! extensions so handlers can create children or propagate it outbound. The
//! span is renamed once the route is known and ends when the handler
//! returns; server-side failures set an error status.

use std::sync::Arc;

use janus_telemetry::Tracing;
use opentelemetry::trace::{Status, TraceContextExt};
use opentelemetry::{Context, KeyValue};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Transport;

/// Opens a server span per request.
#[derive(Debug, Clone)]
pub struct TraceContext {
    tracing: Arc<Tracing>,
}

impl TraceContext {
    /// Uses the tracer and propagator of `tracing`.
    #[must_use]
    pub fn new(tracing: Arc<Tracing>) -> Self {
        Self { tracing }
    }
}

impl<T: Transport> Middleware<T> for TraceContext {
    fn name(&self) -> &'static str {
        "tracing"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        mut request: T::Request,
        next: Next<'a, T>,
    ) -> BoxFuture<'a, T::Response> {
        Box::pin(async move {
            let method = T::method(&request);
            let parent = self.tracing.extract(T::headers(&request));
            let cx = self.tracing.start_server_span(
                method.clone(),
                &parent,
                vec![KeyValue::new("transport", T::NAME)],
            );

            let span_context = cx.span().span_context().clone();
            if span_context.is_valid() {
                ctx.set_trace_id(span_context.trace_id().to_string());
                ctx.set_span_id(span_context.span_id().to_string());
            }
            T::extensions_mut(&mut request).insert(cx.clone());

            let response = next.run(ctx, request).await;

            let outcome = T::outcome(&response);
            let route = ctx.route_or_other().to_string();
            let span = cx.span();
            span.update_name(T::span_name(&method, &route));
            span.set_attribute(KeyValue::new("route", route));
            span.set_attribute(KeyValue::new("status", outcome.class));
            if outcome.is_error {
                span.set_status(Status::error(outcome.class));
            }
            span.end();

            response
        })
    }
}

/// OpenTelemetry context the tracing stage attached to `extensions`.
#[must_use]
pub fn current_context(extensions: &http::Extensions) -> Context {
    extensions.get::<Context>().cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use bytes::Bytes;
    use http_body_util::Full;
    use janus_telemetry::TraceConfig;

    use super::*;
    use crate::types::{Http, HttpRequest, Rpc};

    const PARENT: &str = "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01";

    fn tracing() -> Arc<Tracing> {
        Arc::new(Tracing::new(&TraceConfig::default()).unwrap())
    }

    #[tokio::test]
    async fn test_continues_incoming_trace() {
        let tracing = tracing();
        let stage = TraceContext::new(tracing.clone());

        let request: HttpRequest = http::Request::builder()
            .uri("/users/7")
            .header("traceparent", PARENT)
            .body(Full::new(Bytes::new()))
            .unwrap();
        let mut ctx = MiddlewareContext::new("http");
        let next = Next::<Http>::terminal(|ctx, req| {
            ctx.set_route("/users/{id}");
            let handler_trace = current_context(req.extensions())
                .span()
                .span_context()
                .trace_id()
                .to_string();
            Box::pin(async move {
                http::Response::new(Full::new(Bytes::from(handler_trace)))
            })
        });
        Middleware::<Http>::process(&stage, &mut ctx, request, next).await;

        assert_eq!(ctx.trace_id(), Some("4bf92f3577b34da6a3ce929d0e0e4736"));
        let spans = tracing.recent().by_trace("4bf92f3577b34da6a3ce929d0e0e4736");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "GET /users/{id}");
        assert_eq!(spans[0].parent_span_id.as_deref(), Some("00f067aa0ba902b7"));
        assert_eq!(spans[0].status, "unset");
    }

    #[tokio::test]
    async fn test_starts_root_without_header() {
        let tracing = tracing();
        let stage = TraceContext::new(tracing.clone());

        let request: HttpRequest = http::Request::builder().uri("/").body(Full::new(Bytes::new())).unwrap();
        let mut ctx = MiddlewareContext::new("http");
        let next = Next::<Http>::terminal(|_ctx, _req| {
            Box::pin(async { http::Response::new(Full::new(Bytes::new())) })
        });
        Middleware::<Http>::process(&stage, &mut ctx, request, next).await;

        let spans = tracing.recent().snapshot();
        assert_eq!(spans.len(), 1);
        assert!(spans[0].parent_span_id.is_none());
        assert_eq!(spans[0].name, "GET other");
        assert_eq!(ctx.trace_id(), Some(spans[0].trace_id.as_str()));
    }

    #[tokio::test]
    async fn test_rpc_failure_marks_span_error() {
        let tracing = tracing();
        let stage = TraceContext::new(tracing.clone());

        let request = http::Request::builder()
            .uri("/pkg.Svc/Call")
            .body(tonic::body::empty_body())
            .unwrap();
        let mut ctx = MiddlewareContext::new("grpc");
        let next = Next::<Rpc>::terminal(|ctx, _req| {
            ctx.set_route("/pkg.Svc/Call");
            Box::pin(async { tonic::Status::unavailable("draining").into_http() })
        });
        Middleware::<Rpc>::process(&stage, &mut ctx, request, next).await;

        let spans = tracing.recent().snapshot();
        assert_eq!(spans[0].name, "pkg.Svc/Call");
        assert_eq!(spans[0].status, "error: error");
    }
}
