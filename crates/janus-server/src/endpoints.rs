//! Operational endpoints registered on every server.
//!
//! | Route | Content |
//! |-------|---------|
//! | `GET /metrics` | request-duration histogram, Prometheus text format |
//! | `GET /traces` | recently finished spans; `?trace_id=` filters one trace |
//! | `GET /debug/routes` | HTTP templates and gRPC services |
//! | `GET /debug/config` | effective configuration |
//! | `GET /debug/runtime` | lifecycle state, uptime, bound addresses |
//!
//! The `/debug` group is only registered when `debug_endpoints` is on.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use http_body_util::Full;
use janus_router::RouteError;
use janus_telemetry::{RequestDuration, Tracing};
use serde::Serialize;

use crate::config::Config;
use crate::lifecycle::StopHandle;
use crate::routes::{json, json_error, Handler, HandlerFuture, RouteTable};

/// Prometheus text exposition content type.
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Facts only known once the server runs.
#[derive(Debug, Default)]
pub(crate) struct RunFacts {
    started_at: OnceLock<(DateTime<Utc>, tokio::time::Instant)>,
    routes: OnceLock<RouteInventory>,
}

impl RunFacts {
    pub(crate) fn started(&self, routes: RouteInventory) {
        let _ = self.started_at.set((Utc::now(), tokio::time::Instant::now()));
        let _ = self.routes.set(routes);
    }
}

/// Everything that is served, as listed by `/debug/routes`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct RouteInventory {
    pub(crate) http: Vec<HttpRoute>,
    pub(crate) grpc: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct HttpRoute {
    template: String,
    methods: Vec<String>,
}

impl RouteInventory {
    pub(crate) fn new(routes: &RouteTable, grpc: Vec<&'static str>) -> Self {
        let http = routes
            .routes()
            .into_iter()
            .map(|(template, methods)| HttpRoute {
                template: template.to_string(),
                methods: methods.iter().map(|m| m.as_str().to_string()).collect(),
            })
            .collect();
        Self { http, grpc }
    }
}

/// Collaborators of the endpoints.
pub(crate) struct Operational {
    pub(crate) histogram: Arc<RequestDuration>,
    pub(crate) tracing: Arc<Tracing>,
    pub(crate) handle: StopHandle,
    pub(crate) facts: Arc<RunFacts>,
    pub(crate) http_addr: SocketAddr,
    pub(crate) grpc_addr: SocketAddr,
}

/// Adds the operational routes to `routes`.
pub(crate) fn register(routes: &mut RouteTable, ops: Operational, config: &Config) -> Result<(), RouteError> {
    routes.route_handler(
        Method::GET,
        "/metrics",
        Arc::new(Metrics {
            histogram: ops.histogram,
        }),
    )?;
    routes.route_handler(
        Method::GET,
        "/traces",
        Arc::new(Traces {
            tracing: ops.tracing,
        }),
    )?;

    if !config.debug_endpoints() {
        return Ok(());
    }

    routes.route_handler(
        Method::GET,
        "/debug/routes",
        Arc::new(DebugRoutes {
            facts: Arc::clone(&ops.facts),
        }),
    )?;
    routes.route_handler(
        Method::GET,
        "/debug/config",
        Arc::new(DebugConfig {
            snapshot: config_snapshot(config),
        }),
    )?;
    routes.route_handler(
        Method::GET,
        "/debug/runtime",
        Arc::new(DebugRuntime {
            handle: ops.handle,
            facts: ops.facts,
            http_addr: ops.http_addr,
            grpc_addr: ops.grpc_addr,
        }),
    )?;
    Ok(())
}

struct Metrics {
    histogram: Arc<RequestDuration>,
}

impl Handler for Metrics {
    fn call(&self, _request: janus_middleware::HttpRequest) -> HandlerFuture {
        let body = self.histogram.render();
        Box::pin(async move {
            Ok(http::Response::builder()
                .header(CONTENT_TYPE, PROMETHEUS_CONTENT_TYPE)
                .body(Full::new(Bytes::from(body)))
                .unwrap_or_else(|_| http::Response::new(Full::new(Bytes::new()))))
        })
    }
}

struct Traces {
    tracing: Arc<Tracing>,
}

impl Handler for Traces {
    fn call(&self, request: janus_middleware::HttpRequest) -> HandlerFuture {
        let recent = self.tracing.recent();
        let spans = match query_param(request.uri().query(), "trace_id") {
            Some(trace_id) => recent.by_trace(trace_id),
            None => recent.snapshot(),
        };
        Box::pin(async move { Ok(json(&spans)) })
    }
}

struct DebugRoutes {
    facts: Arc<RunFacts>,
}

impl Handler for DebugRoutes {
    fn call(&self, _request: janus_middleware::HttpRequest) -> HandlerFuture {
        let response = match self.facts.routes.get() {
            Some(inventory) => json(inventory),
            None => json_error(StatusCode::SERVICE_UNAVAILABLE, "NOT_RUNNING", "server is not running"),
        };
        Box::pin(async move { Ok(response) })
    }
}

struct DebugConfig {
    snapshot: serde_json::Value,
}

impl Handler for DebugConfig {
    fn call(&self, _request: janus_middleware::HttpRequest) -> HandlerFuture {
        let response = json(&self.snapshot);
        Box::pin(async move { Ok(response) })
    }
}

fn config_snapshot(config: &Config) -> serde_json::Value {
    let http: Vec<_> = config.http_middleware().iter().map(|m| m.name()).collect();
    let rpc: Vec<_> = config.rpc_interceptors().iter().map(|m| m.name()).collect();
    serde_json::json!({
        "settings": config.settings(),
        "http_middleware": http,
        "rpc_interceptors": rpc,
    })
}

struct DebugRuntime {
    handle: StopHandle,
    facts: Arc<RunFacts>,
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
}

#[derive(Serialize)]
struct RuntimeReport {
    state: crate::lifecycle::LifecycleState,
    version: &'static str,
    started_at: Option<DateTime<Utc>>,
    uptime_seconds: Option<f64>,
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    workers: usize,
}

impl Handler for DebugRuntime {
    fn call(&self, _request: janus_middleware::HttpRequest) -> HandlerFuture {
        let started = self.facts.started_at.get();
        let report = RuntimeReport {
            state: self.handle.state(),
            version: env!("CARGO_PKG_VERSION"),
            started_at: started.map(|(at, _)| *at),
            uptime_seconds: started.map(|(_, since)| since.elapsed().as_secs_f64()),
            http_addr: self.http_addr,
            grpc_addr: self.grpc_addr,
            workers: tokio::runtime::Handle::current().metrics().num_workers(),
        };
        Box::pin(async move { Ok(json(&report)) })
    }
}

fn query_param<'a>(query: Option<&'a str>, name: &str) -> Option<&'a str> {
    query?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;
    use janus_telemetry::TraceConfig;

    use super::*;
    use crate::shutdown::ShutdownSignal;

    fn table(debug: bool) -> (RouteTable, Arc<RunFacts>) {
        let config = Config::builder().debug_endpoints(debug).build().unwrap();
        let facts = Arc::new(RunFacts::default());
        let ops = Operational {
            histogram: Arc::new(RequestDuration::new("endpoints_test").unwrap()),
            tracing: Arc::new(Tracing::new(&TraceConfig::default()).unwrap()),
            handle: StopHandle::new(ShutdownSignal::new()),
            facts: Arc::clone(&facts),
            http_addr: "127.0.0.1:8080".parse().unwrap(),
            grpc_addr: "127.0.0.1:9095".parse().unwrap(),
        };
        let mut routes = RouteTable::new();
        register(&mut routes, ops, &config).unwrap();
        (routes, facts)
    }

    fn get(path: &str) -> janus_middleware::HttpRequest {
        http::Request::builder().uri(path).body(Full::new(Bytes::new())).unwrap()
    }

    async fn body_json(response: janus_middleware::HttpResponse) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_metrics_content_type() {
        let (routes, _) = table(false);
        let response = routes.dispatch(get("/metrics")).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], PROMETHEUS_CONTENT_TYPE);
    }

    #[tokio::test]
    async fn test_traces_empty_list() {
        let (routes, _) = table(false);
        let response = routes.dispatch(get("/traces?trace_id=abc")).await;
        assert_eq!(body_json(response).await, serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_debug_routes_gated() {
        let (routes, _) = table(false);
        assert_eq!(routes.dispatch(get("/debug/routes")).await.status(), StatusCode::NOT_FOUND);
        assert_eq!(routes.len(), 2);
    }

    #[tokio::test]
    async fn test_debug_routes_after_start() {
        let (routes, facts) = table(true);
        let before = routes.dispatch(get("/debug/routes")).await;
        assert_eq!(before.status(), StatusCode::SERVICE_UNAVAILABLE);

        facts.started(RouteInventory::new(&routes, vec!["httpgrpc.HTTP"]));
        let value = body_json(routes.dispatch(get("/debug/routes")).await).await;
        assert_eq!(value["grpc"][0], "httpgrpc.HTTP");
        assert!(value["http"]
            .as_array()
            .unwrap()
            .iter()
            .any(|r| r["template"] == "/metrics"));
    }

    #[tokio::test]
    async fn test_debug_config_reports_settings() {
        let (routes, _) = table(true);
        let value = body_json(routes.dispatch(get("/debug/config")).await).await;
        assert_eq!(value["settings"]["server"]["grpc_listen_port"], 9095);
        assert_eq!(value["http_middleware"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn test_debug_runtime_state() {
        let (routes, _) = table(true);
        let value = body_json(routes.dispatch(get("/debug/runtime")).await).await;
        assert_eq!(value["state"], "idle");
        assert_eq!(value["http_addr"], "127.0.0.1:8080");
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("a=1&trace_id=ff"), "trace_id"), Some("ff"));
        assert_eq!(query_param(Some("a=1"), "trace_id"), None);
        assert_eq!(query_param(None, "trace_id"), None);
    }
}
