//! # Janus Server
//!
//! One service exposed over native HTTP/1.1 and gRPC, with a shared route
//! table, one instrumentation pipeline and one coordinated shutdown.
//!
//! ```text
//!           HTTP :80                         gRPC :9095
//!              │                                 │
//!      ┌───────▼────────┐               ┌────────▼────────┐
//!      │   HTTP chain   │               │ interceptor chain│
//!      │ log·metric·span│               │ log·metric·span  │
//!      └───────┬────────┘               └────────┬────────┘
//!              │                     ┌───────────┴──────────┐
//!              │                     │ httpgrpc.HTTP/Handle │  user services
//!              │                     └───────────┬──────────┘
//!              ▼                                 ▼
//!      ┌──────────────────────────────────────────────┐
//!      │                 RouteTable                   │
//!      └──────────────────────────────────────────────┘
//! ```
//!
//! Requests that arrive through the bridge skip the HTTP chain, so every
//! request produces exactly one log line, one histogram sample and one span.
//!
//! ```rust,ignore
//! use janus_server::{routes::text, shutdown_on_signal, Config, HandlerError, HttpRequest, HttpResponse, Server};
//!
//! async fn ping(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
//!     Ok(text("pong"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Server::bind(Config::builder().build()?).await?;
//!     server.routes_mut().get("/ping", ping)?;
//!     shutdown_on_signal(server.stop_handle());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

mod bridge;
pub mod config;
mod endpoints;
pub mod error;
mod http;
pub mod httpgrpc;
pub mod lifecycle;
pub mod routes;
pub mod rpc;
mod server;
pub mod shutdown;

pub use bridge::Bridge;
pub use config::{Config, ConfigBuilder};
pub use error::{BindError, HandlerError, Listener, ServerError, ShutdownTimeoutExceeded};
pub use httpgrpc::client::HttpOverRpcClient;
pub use janus_middleware::{HttpRequest, HttpResponse};
pub use lifecycle::{LifecycleState, StopHandle};
pub use routes::{Handler, MatchedRoute, PathParams, RouteTable};
pub use rpc::InterceptorLayer;
pub use server::Server;
pub use shutdown::{shutdown_on_signal, ShutdownSignal};
