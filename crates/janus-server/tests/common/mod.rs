//! Helpers shared by the socket-level tests.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use janus_server::{ConfigBuilder, Config, LifecycleState, Server, StopHandle, ServerError};
use tokio::task::JoinHandle;

pub const LOCALHOST: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Both listeners on ephemeral loopback ports.
pub fn config() -> ConfigBuilder {
    Config::builder()
        .listen_address(LOCALHOST)
        .http_listen_port(0)
        .grpc_listen_port(0)
        .graceful_shutdown_timeout(Duration::from_secs(2))
}

/// A server running in the background.
pub struct Running {
    pub http: SocketAddr,
    pub grpc: SocketAddr,
    pub handle: StopHandle,
    pub task: JoinHandle<Result<(), ServerError>>,
}

impl Running {
    pub async fn start(server: Server) -> Self {
        let running = Self {
            http: server.http_addr(),
            grpc: server.grpc_addr(),
            handle: server.stop_handle(),
            task: tokio::spawn(server.run()),
        };
        running.handle.wait_for(LifecycleState::Running).await;
        running
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.http)
    }

    pub fn grpc_url(&self) -> String {
        format!("http://{}", self.grpc)
    }

    /// Stops the server and waits for `run` to return.
    pub async fn stop(self) {
        self.handle.stop();
        tokio::time::timeout(Duration::from_secs(10), self.task)
            .await
            .expect("run did not return")
            .unwrap()
            .unwrap();
    }
}

pub fn client() -> Client<HttpConnector, Full<Bytes>> {
    Client::builder(TokioExecutor::new()).build_http()
}

/// Sends a GET and returns status and body.
pub async fn get(url: &str) -> (u16, Bytes) {
    let request = http::Request::get(url).body(Full::new(Bytes::new())).unwrap();
    let response = client().request(request).await.unwrap();
    let status = response.status().as_u16();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}
