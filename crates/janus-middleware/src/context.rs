//! Per-request state shared by the stages of one chain.
//!
//! The terminal handler writes the matched route here before the handler
//! runs; stages read it on the way out, after `next.run` returns.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// State carried through one pass of a chain.
///
/// ```
/// use janus_middleware::MiddlewareContext;
///
/// let mut ctx = MiddlewareContext::new("http");
/// assert_eq!(ctx.route_or_other(), "other");
///
/// ctx.set_route("/users/{id}");
/// assert_eq!(ctx.route(), Some("/users/{id}"));
/// ```
#[derive(Debug)]
pub struct MiddlewareContext {
    transport: &'static str,
    route: Option<String>,
    trace_id: Option<String>,
    span_id: Option<String>,
    started_at: Instant,
    extensions: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

/// Route label used when no route matched.
pub const UNMATCHED_ROUTE: &str = "other";

impl MiddlewareContext {
    /// Creates a context for a request arriving on `transport`.
    #[must_use]
    pub fn new(transport: &'static str) -> Self {
        Self {
            transport,
            route: None,
            trace_id: None,
            span_id: None,
            started_at: Instant::now(),
            extensions: HashMap::new(),
        }
    }

    /// `http` or `grpc`.
    #[must_use]
    pub fn transport(&self) -> &'static str {
        self.transport
    }

    /// Matched route template, or full gRPC method path.
    #[must_use]
    pub fn route(&self) -> Option<&str> {
        self.route.as_deref()
    }

    /// Matched route, or [`UNMATCHED_ROUTE`].
    #[must_use]
    pub fn route_or_other(&self) -> &str {
        self.route.as_deref().unwrap_or(UNMATCHED_ROUTE)
    }

    /// Records the matched route. Called by the terminal handler.
    pub fn set_route(&mut self, route: impl Into<String>) {
        self.route = Some(route.into());
    }

    /// Trace ID of the server span, if tracing ran.
    #[must_use]
    pub fn trace_id(&self) -> Option<&str> {
        self.trace_id.as_deref()
    }

    /// Sets the trace ID. Called by the tracing stage.
    pub fn set_trace_id(&mut self, trace_id: String) {
        self.trace_id = Some(trace_id);
    }

    /// Span ID of the server span, if tracing ran.
    #[must_use]
    pub fn span_id(&self) -> Option<&str> {
        self.span_id.as_deref()
    }

    /// Sets the span ID. Called by the tracing stage.
    pub fn set_span_id(&mut self, span_id: String) {
        self.span_id = Some(span_id);
    }

    /// When the chain started.
    #[must_use]
    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    /// Time since the chain started.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Stores a typed value for later stages.
    pub fn set_extension<T: Send + Sync + 'static>(&mut self, value: T) {
        self.extensions.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// Reads a typed value stored by an earlier stage.
    #[must_use]
    pub fn get_extension<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.extensions
            .get(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_ref::<T>())
    }

    /// Mutable access to a stored value.
    pub fn get_extension_mut<T: Send + Sync + 'static>(&mut self) -> Option<&mut T> {
        self.extensions
            .get_mut(&TypeId::of::<T>())
            .and_then(|boxed| boxed.downcast_mut::<T>())
    }
}
