//! # Janus
//!
//! **One route table, two transports.**
//!
//! Janus serves the same handlers over native HTTP/1.1 and over gRPC (as
//! `httpgrpc.HTTP/Handle`), wraps both in the same logging, metrics and
//! tracing stages, and stops both together: graceful drain first, forced
//! termination once the deadline passes.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use janus::prelude::*;
//!
//! async fn ping(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
//!     Ok(text("pong"))
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::builder().http_listen_port(8080).grpc_listen_port(9095).build()?;
//!     let mut server = Server::bind(config).await?;
//!     server.routes_mut().get("/ping", ping)?;
//!
//!     shutdown_on_signal(server.stop_handle());
//!     server.run().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Request path
//!
//! ```text
//! HTTP  → logging → instrument → tracing → user stages → RouteTable
//! gRPC  → logging → instrument → tracing → user stages → service
//!                                                         └ httpgrpc.HTTP/Handle → RouteTable
//! ```

#![doc(html_root_url = "https://docs.rs/janus/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Re-export settings
pub use janus_config as config;

// Re-export middleware types
pub use janus_middleware as middleware;

// Re-export router types
pub use janus_router as router;

// Re-export server types
pub use janus_server as server;

// Re-export telemetry types
pub use janus_telemetry as telemetry;

/// Prelude module for convenient imports.
///
/// # Example
///
/// ```rust,ignore
/// use janus::prelude::*;
/// ```
pub mod prelude {
    pub use janus_config::{ConfigArgs, Settings, SettingsLoader};

    pub use janus_middleware::{Http, Middleware, MiddlewareContext, Next, Rpc};

    pub use janus_server::routes::{json, json_error, text};
    pub use janus_server::{
        shutdown_on_signal, BindError, Config, HandlerError, HttpOverRpcClient, HttpRequest, HttpResponse,
        LifecycleState, PathParams, RouteTable, Server, ServerError, StopHandle,
    };

    pub use janus_telemetry::{init_logging, RequestDuration, Tracing};
}
