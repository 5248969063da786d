//! The built-in stages working together on both transports.

use std::sync::Arc;

use bytes::Bytes;
use http_body_util::Full;
use janus_middleware::{Builtins, Chain, Http, MiddlewareContext, Rpc};
use janus_telemetry::{RequestDuration, TraceConfig, Tracing};

fn builtins(namespace: &str) -> Builtins {
    Builtins {
        log_success: true,
        histogram: Arc::new(RequestDuration::new(namespace).unwrap()),
        tracing: Arc::new(Tracing::new(&TraceConfig::default()).unwrap()),
    }
}

#[tokio::test]
async fn one_sample_and_one_span_per_http_request() {
    let builtins = builtins("builtins_http");
    let chain = Chain::<Http>::builder().builtins(&builtins).build();

    for _ in 0..3 {
        let mut ctx = MiddlewareContext::new("http");
        let request = http::Request::builder()
            .method("POST")
            .uri("/orders/9")
            .body(Full::new(Bytes::from("{}")))
            .unwrap();
        let response = chain
            .process(&mut ctx, request, |ctx, _req| {
                ctx.set_route("/orders/{id}");
                Box::pin(async {
                    http::Response::builder()
                        .status(201)
                        .body(Full::new(Bytes::new()))
                        .unwrap()
                })
            })
            .await;
        assert_eq!(response.status(), 201);
        assert!(ctx.trace_id().is_some());
    }

    assert_eq!(
        builtins
            .histogram
            .sample_count(&["method=\"POST\"", "route=\"/orders/{id}\"", "status_code=\"2xx\""]),
        3
    );
    assert_eq!(builtins.tracing.recent().snapshot().len(), 3);
}

#[tokio::test]
async fn http_and_rpc_share_one_histogram() {
    let builtins = builtins("builtins_shared");
    let http_chain = Chain::<Http>::builder().builtins(&builtins).build();
    let rpc_chain = Chain::<Rpc>::builder().builtins(&builtins).build();

    let mut ctx = MiddlewareContext::new("http");
    let request = http::Request::builder().uri("/ping").body(Full::new(Bytes::new())).unwrap();
    http_chain
        .process(&mut ctx, request, |ctx, _req| {
            ctx.set_route("/ping");
            Box::pin(async { http::Response::new(Full::new(Bytes::from("pong"))) })
        })
        .await;

    let mut ctx = MiddlewareContext::new("grpc");
    let request = http::Request::builder()
        .uri("/httpgrpc.HTTP/Handle")
        .body(tonic::body::empty_body())
        .unwrap();
    rpc_chain
        .process(&mut ctx, request, |ctx, _req| {
            ctx.set_route("/httpgrpc.HTTP/Handle");
            Box::pin(async { http::Response::new(tonic::body::empty_body()) })
        })
        .await;

    assert_eq!(builtins.histogram.sample_count(&[]), 2);
    assert_eq!(builtins.histogram.sample_count(&["method=\"gRPC\"", "status_code=\"success\""]), 1);
}
