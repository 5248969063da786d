//! Binding, running and stopping a server on real sockets.

mod common;

use std::time::{Duration, Instant};

use bytes::Bytes;
use common::{config, get, Running, LOCALHOST};
use http::StatusCode;
use http_body_util::Full;
use janus_server::routes::text;
use janus_server::{
    HandlerError, HttpOverRpcClient, HttpRequest, HttpResponse, LifecycleState, Listener, Server, ServerError,
};
use tonic::Code;

async fn ping(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    Ok(text("pong"))
}

async fn slow(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    tokio::time::sleep(Duration::from_secs(30)).await;
    Ok(text("late"))
}

fn free_port() -> u16 {
    std::net::TcpListener::bind((LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

#[tokio::test]
async fn run_binds_both_and_stop_releases_both() {
    let server = Server::bind(config().build().unwrap()).await.unwrap();
    assert_ne!(server.http_addr().port(), 0);
    assert_ne!(server.grpc_addr().port(), 0);

    let running = Running::start(server).await;
    let (http, grpc) = (running.http, running.grpc);
    let handle = running.handle.clone();
    running.stop().await;

    assert_eq!(handle.state(), LifecycleState::Stopped);
    tokio::net::TcpListener::bind(http).await.unwrap();
    tokio::net::TcpListener::bind(grpc).await.unwrap();
}

#[tokio::test]
async fn occupied_grpc_port_releases_http_listener() {
    let blocker = std::net::TcpListener::bind((LOCALHOST, 0)).unwrap();
    let grpc_port = blocker.local_addr().unwrap().port();
    let http_port = free_port();

    let config = config()
        .http_listen_port(http_port)
        .grpc_listen_port(grpc_port)
        .build()
        .unwrap();

    match Server::bind(config).await {
        Err(ServerError::Bind(e)) => {
            assert_eq!(e.listener, Listener::Rpc);
            assert_eq!(e.addr.port(), grpc_port);
            assert!(e.to_string().contains("gRPC"));
        }
        other => panic!("expected a gRPC bind error, got {other:?}"),
    }

    std::net::TcpListener::bind((LOCALHOST, http_port)).unwrap();
}

#[tokio::test]
async fn occupied_http_port_names_http_listener() {
    let blocker = std::net::TcpListener::bind((LOCALHOST, 0)).unwrap();
    let port = blocker.local_addr().unwrap().port();

    let err = Server::bind(config().http_listen_port(port).build().unwrap())
        .await
        .unwrap_err();
    assert!(matches!(err, ServerError::Bind(ref e) if e.listener == Listener::Http));
}

#[tokio::test]
async fn stop_before_run_returns_promptly() {
    let server = Server::bind(config().build().unwrap()).await.unwrap();
    let handle = server.stop_handle();
    handle.stop();
    handle.stop();
    assert_eq!(handle.state(), LifecycleState::Idle);

    tokio::time::timeout(Duration::from_secs(5), server.run())
        .await
        .expect("run did not return")
        .unwrap();
    assert_eq!(handle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn stop_twice_is_harmless() {
    let running = Running::start(Server::bind(config().build().unwrap()).await.unwrap()).await;
    let handle = running.handle.clone();
    handle.stop();
    handle.stop();
    running.stop().await;
    handle.stop();
    assert_eq!(handle.state(), LifecycleState::Stopped);
}

#[tokio::test]
async fn graceful_stop_finishes_requests_in_flight() {
    async fn short(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        Ok(text("done"))
    }

    let mut server = Server::bind(config().build().unwrap()).await.unwrap();
    server.routes_mut().get("/short", short).unwrap();
    let running = Running::start(server).await;

    let url = running.url("/short");
    let call = tokio::spawn(async move { get(&url).await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    running.stop().await;

    let (status, body) = call.await.unwrap();
    assert_eq!(status, 200);
    assert_eq!(body, "done");
}

#[tokio::test]
async fn deadline_forces_both_transports_down() {
    let config = config()
        .graceful_shutdown_timeout(Duration::from_millis(300))
        .http_write_timeout(Duration::from_secs(60))
        .build()
        .unwrap();
    let mut server = Server::bind(config).await.unwrap();
    server.routes_mut().get("/slow", slow).unwrap();
    let running = Running::start(server).await;

    let request = http::Request::get(running.url("/slow"))
        .body(Full::new(Bytes::new()))
        .unwrap();
    let http_call = tokio::spawn(common::client().request(request));

    let mut rpc = HttpOverRpcClient::connect(running.grpc_url()).await.unwrap();
    let rpc_call = tokio::spawn(async move {
        rpc.round_trip(http::Request::get("/slow").body(Bytes::new()).unwrap())
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    let started = Instant::now();
    running.stop().await;
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "stopped before the deadline: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(1500), "stopped long after the deadline: {elapsed:?}");

    assert!(http_call.await.unwrap().is_err());
    let status = rpc_call.await.unwrap().unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
}

#[tokio::test]
async fn ping_over_both_transports() {
    let mut server = Server::bind(config().build().unwrap()).await.unwrap();
    server.routes_mut().get("/ping", ping).unwrap();
    let running = Running::start(server).await;

    let (status, body) = get(&running.url("/ping")).await;
    assert_eq!(status, StatusCode::OK.as_u16());
    assert_eq!(body, "pong");

    let mut rpc = HttpOverRpcClient::connect(running.grpc_url()).await.unwrap();
    let response = rpc
        .round_trip(http::Request::get("/ping").body(Bytes::new()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.body(), "pong");

    running.stop().await;
}
