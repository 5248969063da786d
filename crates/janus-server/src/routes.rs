//! Route table shared by the HTTP listener and the HTTP-over-gRPC bridge.
//!
//! Handlers are registered against route templates before the server runs.
//! At [`Server::run`](crate::Server::run) the table is frozen behind an
//! `Arc` and both transports dispatch into the same instance.
//!
//! ```rust,ignore
//! use janus_server::{routes::text, HandlerError, HttpRequest, HttpResponse};
//!
//! async fn ping(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
//!     Ok(text("pong"))
//! }
//!
//! server.routes_mut().get("/ping", ping)?;
//! ```
//!
//! Dispatch never fails: misses become `404`/`405`, handler errors and panics
//! become JSON error envelopes.
//!
//! ```json
//! {"error": {"code": "NOT_FOUND", "message": "no route for /nope"}}
//! ```

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use http::header::{HeaderValue, ALLOW, CONTENT_TYPE};
use http::{Method, Response, StatusCode};
use http_body_util::Full;
use janus_middleware::{HttpRequest, HttpResponse};
use janus_router::{Miss, Params, RouteError, Router};
use serde::Serialize;

use crate::error::HandlerError;

/// Future returned by a [`Handler`].
pub type HandlerFuture = BoxFuture<'static, Result<HttpResponse, HandlerError>>;

/// An HTTP endpoint.
///
/// Implemented for every `Fn(HttpRequest) -> impl Future<Output =
/// Result<HttpResponse, HandlerError>>`.
pub trait Handler: Send + Sync + 'static {
    /// Handles one request.
    fn call(&self, request: HttpRequest) -> HandlerFuture;
}

impl<F, Fut> Handler for F
where
    F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
{
    fn call(&self, request: HttpRequest) -> HandlerFuture {
        Box::pin(self(request))
    }
}

/// Path parameters captured for the request, in its extensions.
#[derive(Debug, Clone, Default)]
pub struct PathParams(pub Params);

/// Template that matched the request, in its extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchedRoute(pub String);

/// Handlers keyed by method and route template.
#[derive(Default)]
pub struct RouteTable {
    router: Router<Arc<dyn Handler>>,
}

impl RouteTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` for `method` on `template`.
    pub fn route<F, Fut>(&mut self, method: Method, template: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
    {
        self.route_handler(method, template, Arc::new(handler))
    }

    /// Registers an already shared handler.
    pub fn route_handler(
        &mut self,
        method: Method,
        template: &str,
        handler: Arc<dyn Handler>,
    ) -> Result<&mut Self, RouteError> {
        self.router.route(method, template, handler)?;
        Ok(self)
    }

    /// Registers a `GET` handler.
    pub fn get<F, Fut>(&mut self, template: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
    {
        self.route(Method::GET, template, handler)
    }

    /// Registers a `POST` handler.
    pub fn post<F, Fut>(&mut self, template: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
    {
        self.route(Method::POST, template, handler)
    }

    /// Registers a `PUT` handler.
    pub fn put<F, Fut>(&mut self, template: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
    {
        self.route(Method::PUT, template, handler)
    }

    /// Registers a `DELETE` handler.
    pub fn delete<F, Fut>(&mut self, template: &str, handler: F) -> Result<&mut Self, RouteError>
    where
        F: Fn(HttpRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<HttpResponse, HandlerError>> + Send + 'static,
    {
        self.route(Method::DELETE, template, handler)
    }

    /// Registered templates and their methods, sorted by template.
    #[must_use]
    pub fn routes(&self) -> Vec<(&str, Vec<Method>)> {
        self.router.routes()
    }

    /// Number of registered templates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.router.len()
    }

    /// `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.router.is_empty()
    }

    /// Finds the endpoint for a request without running it.
    #[must_use]
    pub fn resolve(&self, method: &Method, path: &str) -> Resolution {
        match self.router.lookup(method, path) {
            Ok(found) => Resolution::Matched {
                handler: Arc::clone(found.endpoint),
                template: found.template.to_string(),
                params: found.params,
            },
            Err(Miss::MethodNotAllowed { template, allowed }) => Resolution::MethodNotAllowed {
                template: template.to_string(),
                allowed,
            },
            Err(Miss::NotFound) => Resolution::NotFound {
                path: path.to_string(),
            },
        }
    }

    /// Resolves and runs the request.
    pub async fn dispatch(&self, request: HttpRequest) -> HttpResponse {
        let resolution = self.resolve(request.method(), request.uri().path());
        resolution.dispatch(request).await
    }
}

impl std::fmt::Debug for RouteTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RouteTable").field("routes", &self.routes()).finish()
    }
}

/// Outcome of a route lookup, independent of the table's lifetime.
pub enum Resolution {
    /// A handler is registered for the method and path.
    Matched {
        /// The endpoint.
        handler: Arc<dyn Handler>,
        /// Template that matched.
        template: String,
        /// Captured path parameters.
        params: Params,
    },
    /// The path matched but the method did not.
    MethodNotAllowed {
        /// Template that matched.
        template: String,
        /// Methods registered on it.
        allowed: Vec<Method>,
    },
    /// Nothing matched.
    NotFound {
        /// Literal request path.
        path: String,
    },
}

impl Resolution {
    /// Template to label the request with, if the path matched.
    #[must_use]
    pub fn template(&self) -> Option<&str> {
        match self {
            Self::Matched { template, .. } | Self::MethodNotAllowed { template, .. } => Some(template),
            Self::NotFound { .. } => None,
        }
    }

    /// Runs the handler, or answers the miss.
    pub async fn dispatch(self, mut request: HttpRequest) -> HttpResponse {
        match self {
            Self::Matched {
                handler,
                template,
                params,
            } => {
                request.extensions_mut().insert(PathParams(params));
                request.extensions_mut().insert(MatchedRoute(template.clone()));
                invoke(handler.as_ref(), &template, request).await
            }
            Self::MethodNotAllowed { allowed, .. } => method_not_allowed(&allowed),
            Self::NotFound { path } => {
                json_error(StatusCode::NOT_FOUND, "NOT_FOUND", &format!("no route for {path}"))
            }
        }
    }
}

impl std::fmt::Debug for Resolution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Matched { template, params, .. } => f
                .debug_struct("Matched")
                .field("template", template)
                .field("params", params)
                .finish_non_exhaustive(),
            Self::MethodNotAllowed { template, allowed } => f
                .debug_struct("MethodNotAllowed")
                .field("template", template)
                .field("allowed", allowed)
                .finish(),
            Self::NotFound { path } => f.debug_struct("NotFound").field("path", path).finish(),
        }
    }
}

async fn invoke(handler: &dyn Handler, template: &str, request: HttpRequest) -> HttpResponse {
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler.call(request))) {
        Ok(future) => future,
        Err(_) => return handler_panicked(template),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => error_response(template, &err),
        Err(_) => handler_panicked(template),
    }
}

fn handler_panicked(template: &str) -> HttpResponse {
    tracing::error!(route = template, "handler panicked");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", "internal server error")
}

fn error_response(template: &str, err: &HandlerError) -> HttpResponse {
    let status = err.status_code();
    match err {
        HandlerError::Internal(cause) => {
            tracing::error!(route = template, error = ?cause, "handler failed");
            json_error(status, "INTERNAL", "internal server error")
        }
        HandlerError::BadRequest(message) => json_error(status, "BAD_REQUEST", message),
        HandlerError::Status { message, .. } => json_error(status, &status_code_name(status), message),
    }
}

fn method_not_allowed(allowed: &[Method]) -> HttpResponse {
    let list = allowed.iter().map(Method::as_str).collect::<Vec<_>>().join(", ");
    let mut response = json_error(
        StatusCode::METHOD_NOT_ALLOWED,
        "METHOD_NOT_ALLOWED",
        &format!("allowed methods: {list}"),
    );
    if let Ok(value) = HeaderValue::from_str(&list) {
        response.headers_mut().insert(ALLOW, value);
    }
    response
}

/// `NOT_FOUND` for 404, `TOO_MANY_REQUESTS` for 429.
fn status_code_name(status: StatusCode) -> String {
    status
        .canonical_reason()
        .unwrap_or("ERROR")
        .to_ascii_uppercase()
        .replace([' ', '-'], "_")
}

/// `200` with a `text/plain` body.
pub fn text(body: impl Into<Bytes>) -> HttpResponse {
    with_content_type(StatusCode::OK, "text/plain; charset=utf-8", body.into())
}

/// `200` with `value` serialized as JSON.
pub fn json<T: Serialize>(value: &T) -> HttpResponse {
    match serde_json::to_vec(value) {
        Ok(body) => with_content_type(StatusCode::OK, "application/json", Bytes::from(body)),
        Err(e) => json_error(StatusCode::INTERNAL_SERVER_ERROR, "SERIALIZATION_ERROR", &e.to_string()),
    }
}

/// The standard error envelope.
pub fn json_error(status: StatusCode, code: &str, message: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": {
            "code": code,
            "message": message
        }
    });
    with_content_type(status, "application/json", Bytes::from(body.to_string()))
}

fn with_content_type(status: StatusCode, content_type: &'static str, body: Bytes) -> HttpResponse {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .body(Full::new(body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
