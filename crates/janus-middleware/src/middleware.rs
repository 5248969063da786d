//! The [`Middleware`] trait and the [`Next`] continuation.
//!
//! A stage receives the request and a `Next`. It may act before calling
//! `next.run`, after it returns, or answer itself without calling it.
//!
//! ```ignore
//! use janus_middleware::{BoxFuture, Http, Middleware, MiddlewareContext, Next};
//! use janus_middleware::types::{HttpRequest, HttpResponse};
//!
//! struct ServedBy;
//!
//! impl Middleware<Http> for ServedBy {
//!     fn name(&self) -> &'static str {
//!         "served_by"
//!     }
//!
//!     fn process<'a>(
//!         &'a self,
//!         ctx: &'a mut MiddlewareContext,
//!         request: HttpRequest,
//!         next: Next<'a, Http>,
//!     ) -> BoxFuture<'a, HttpResponse> {
//!         Box::pin(async move {
//!             let mut response = next.run(ctx, request).await;
//!             response.headers_mut().insert("x-served-by", "janus".parse().unwrap());
//!             response
//!         })
//!     }
//! }
//! ```

use std::future::Future;
use std::pin::Pin;

use crate::context::MiddlewareContext;
use crate::types::Transport;

/// A boxed, sendable future.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Terminal handler of a chain.
///
/// Receives the context so it can record the matched route before the
/// returned future runs.
pub type Terminal<'a, T> = Box<
    dyn FnOnce(&mut MiddlewareContext, <T as Transport>::Request) -> BoxFuture<'static, <T as Transport>::Response>
        + Send
        + 'a,
>;

/// One stage of a chain for transport `T`.
///
/// A stage must call `next.run` at most once. Failures coming back from
/// downstream are responses, not errors, and should be passed through.
pub trait Middleware<T: Transport>: Send + Sync + 'static {
    /// Stage name, reported by [`Chain::stage_names`](crate::Chain::stage_names).
    fn name(&self) -> &'static str;

    /// Handles `request`, usually by delegating to `next`.
    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: T::Request,
        next: Next<'a, T>,
    ) -> BoxFuture<'a, T::Response>;
}

/// The rest of the chain after the current stage.
pub struct Next<'a, T: Transport> {
    inner: NextInner<'a, T>,
}

enum NextInner<'a, T: Transport> {
    Stage {
        middleware: &'a dyn Middleware<T>,
        next: Box<Next<'a, T>>,
    },
    Terminal(Terminal<'a, T>),
}

impl<'a, T: Transport> Next<'a, T> {
    /// Continuation that runs `middleware`, then `next`.
    pub(crate) fn new(middleware: &'a dyn Middleware<T>, next: Next<'a, T>) -> Self {
        Self {
            inner: NextInner::Stage {
                middleware,
                next: Box::new(next),
            },
        }
    }

    /// Continuation that calls the handler.
    pub fn terminal<F>(handler: F) -> Self
    where
        F: FnOnce(&mut MiddlewareContext, T::Request) -> BoxFuture<'static, T::Response> + Send + 'a,
    {
        Self {
            inner: NextInner::Terminal(Box::new(handler)),
        }
    }

    /// Runs the rest of the chain. Consumes `self`, so it runs at most once.
    pub async fn run(self, ctx: &mut MiddlewareContext, request: T::Request) -> T::Response {
        match self.inner {
            NextInner::Stage { middleware, next } => middleware.process(ctx, request, *next).await,
            NextInner::Terminal(handler) => handler(ctx, request).await,
        }
    }
}

impl<T: Transport> std::fmt::Debug for Next<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            NextInner::Stage { middleware, .. } => f.debug_tuple("Next").field(&middleware.name()).finish(),
            NextInner::Terminal(_) => f.write_str("Next(terminal)"),
        }
    }
}
