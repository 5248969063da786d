//! Failing gRPC calls are answered, logged and metered once.

mod common;

use std::convert::Infallible;
use std::task::{Context, Poll};

use common::{config, get, Running};
use futures_util::future::BoxFuture;
use http::uri::PathAndQuery;
use janus_middleware::{RpcRequest, RpcResponse};
use janus_server::httpgrpc::{HttpRequest as Envelope, HttpResponse as Reply};
use janus_server::{HandlerError, HttpOverRpcClient, HttpRequest, HttpResponse, Server};
use tonic::server::NamedService;
use tonic::Code;

/// A user service whose handler panics.
#[derive(Clone)]
struct Crashing;

impl NamedService for Crashing {
    const NAME: &'static str = "janus.test.Crashing";
}

impl tower::Service<RpcRequest> for Crashing {
    type Response = RpcResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<RpcResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Infallible>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _request: RpcRequest) -> Self::Future {
        Box::pin(async {
            tokio::task::yield_now().await;
            let crash = true;
            assert!(!crash, "handler bug");
            Ok(http::Response::new(tonic::body::empty_body()))
        })
    }
}

async fn failing(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    Err(HandlerError::Internal(anyhow::anyhow!("database unreachable")))
}

async fn start(namespace: &str) -> Running {
    let config = config().metrics_namespace(namespace).build().unwrap();
    let mut server = Server::bind(config).await.unwrap();
    server.routes_mut().get("/failing", failing).unwrap();
    server.add_rpc_service(Crashing);
    Running::start(server).await
}

/// Sums the `_count` series of `namespace` matching every needle.
async fn samples(running: &Running, namespace: &str, needles: &[&str]) -> u64 {
    let (_, body) = get(&running.url("/metrics")).await;
    let prefix = format!("{namespace}_request_duration_seconds_count");
    String::from_utf8(body.to_vec())
        .unwrap()
        .lines()
        .filter(|line| line.starts_with(&prefix))
        .filter(|line| needles.iter().all(|n| line.contains(n)))
        .filter_map(|line| line.rsplit(' ').next())
        .map(|value| value.parse::<u64>().unwrap())
        .sum()
}

#[tokio::test]
async fn panicking_service_is_answered_and_metered_once() {
    let running = start("rpc_panic").await;

    let channel = tonic::transport::Endpoint::new(running.grpc_url())
        .unwrap()
        .connect()
        .await
        .unwrap();
    let mut grpc = tonic::client::Grpc::new(channel);
    grpc.ready().await.unwrap();
    let status = grpc
        .unary::<Envelope, Reply, _>(
            tonic::Request::new(Envelope::default()),
            PathAndQuery::from_static("/janus.test.Crashing/Call"),
            tonic::codec::ProstCodec::default(),
        )
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Internal);

    let route = "route=\"/janus.test.Crashing/Call\"";
    assert_eq!(samples(&running, "rpc_panic", &[route, "status_code=\"error\""]).await, 1);
    assert_eq!(samples(&running, "rpc_panic", &[route]).await, 1);

    running.stop().await;
}

#[tokio::test]
async fn failing_bridged_handler_is_metered_once_as_error() {
    let running = start("rpc_failing").await;

    let mut rpc = HttpOverRpcClient::connect(running.grpc_url()).await.unwrap();
    let response = rpc
        .round_trip(http::Request::get("/failing").body(bytes::Bytes::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), http::StatusCode::INTERNAL_SERVER_ERROR);

    let route = "route=\"/httpgrpc.HTTP/Handle\"";
    assert_eq!(samples(&running, "rpc_failing", &[route, "status_code=\"error\""]).await, 1);
    assert_eq!(samples(&running, "rpc_failing", &[route]).await, 1);
    assert_eq!(samples(&running, "rpc_failing", &["route=\"/failing\""]).await, 0);

    running.stop().await;
}
