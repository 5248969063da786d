//! # Janus Middleware
//!
//! Ordered middleware chains shared by the HTTP and gRPC listeners of a
//! Janus server.
//!
//! A stage implements [`Middleware<T>`] for a [`Transport`] `T`, either
//! [`Http`] or [`Rpc`]. Stages that only need the facts a transport exposes
//! (method, status class, headers) implement it for every `T`, which is how
//! the built-in stages run on both listeners unchanged.
//!
//! ```text
//! request → logging → instrument → tracing → user stages… → terminal → handler
//! ```
//!
//! The terminal is supplied by the server: it resolves the route, records
//! it with [`MiddlewareContext::set_route`] and invokes the handler. Every
//! stage observes the response on the way back out, so a failure turned into
//! an error response is still logged, measured and traced.
//!
//! ```
//! use std::sync::Arc;
//! use janus_middleware::{Builtins, Chain, Http, Rpc};
//! use janus_telemetry::{RequestDuration, TraceConfig, Tracing};
//!
//! let builtins = Builtins {
//!     log_success: false,
//!     histogram: Arc::new(RequestDuration::new("doc").unwrap()),
//!     tracing: Arc::new(Tracing::new(&TraceConfig::default()).unwrap()),
//! };
//! let http = Chain::<Http>::builder().builtins(&builtins).build();
//! let grpc = Chain::<Rpc>::builder().builtins(&builtins).build();
//! assert_eq!(http.stage_names(), grpc.stage_names());
//! ```

pub mod chain;
pub mod context;
pub mod middleware;
pub mod stages;
pub mod types;

pub use chain::{Builtins, Chain, ChainBuilder, SharedMiddleware};
pub use context::{MiddlewareContext, UNMATCHED_ROUTE};
pub use middleware::{BoxFuture, Middleware, Next, Terminal};
pub use types::{Http, HttpRequest, HttpResponse, Outcome, Rpc, RpcRequest, RpcResponse, Transport};
