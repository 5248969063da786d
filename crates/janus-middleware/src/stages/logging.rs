//! Request logging.
//!
//! One event per request after the handler returns, with the fields
//! `transport`, `method`, `route`, `status`, `duration_ms` and `trace_id`.
//! `status` is the HTTP status code or the numeric gRPC code; the class
//! labels are left to metrics.
//!
//! | Outcome | Level |
//! |---------|-------|
//! | server-side failure | `warn` |
//! | anything else, `log_success` on | `info` |
//! | anything else, `log_success` off | `debug` |

use std::marker::PhantomData;
use std::time::Instant;

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Transport;

/// Logs every request once it completes.
#[derive(Debug, Clone, Copy)]
pub struct Logging {
    log_success: bool,
}

impl Logging {
    /// `log_success` raises successful requests from `debug` to `info`.
    #[must_use]
    pub fn new(log_success: bool) -> Self {
        Self { log_success }
    }
}

impl<T: Transport> Middleware<T> for Logging {
    fn name(&self) -> &'static str {
        "logging"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: T::Request,
        next: Next<'a, T>,
    ) -> BoxFuture<'a, T::Response> {
        Box::pin(async move {
            let method = T::method(&request);
            let start = Instant::now();

            let response = next.run(ctx, request).await;

            let outcome = T::outcome(&response);
            let line = Line::<T> {
                method: &method,
                route: ctx.route_or_other(),
                status: outcome.code,
                duration_ms: start.elapsed().as_secs_f64() * 1000.0,
                trace_id: ctx.trace_id().unwrap_or_default(),
                transport: PhantomData,
            };
            if outcome.is_error {
                line.warn();
            } else if self.log_success {
                line.info();
            } else {
                line.debug();
            }

            response
        })
    }
}

struct Line<'a, T> {
    method: &'a str,
    route: &'a str,
    status: u16,
    duration_ms: f64,
    trace_id: &'a str,
    transport: PhantomData<T>,
}

impl<T: Transport> Line<'_, T> {
    fn warn(&self) {
        tracing::warn!(
            transport = T::NAME,
            method = self.method,
            route = self.route,
            status = self.status,
            duration_ms = self.duration_ms,
            trace_id = self.trace_id,
            "request failed"
        );
    }

    fn info(&self) {
        tracing::info!(
            transport = T::NAME,
            method = self.method,
            route = self.route,
            status = self.status,
            duration_ms = self.duration_ms,
            trace_id = self.trace_id,
            "request served"
        );
    }

    fn debug(&self) {
        tracing::debug!(
            transport = T::NAME,
            method = self.method,
            route = self.route,
            status = self.status,
            duration_ms = self.duration_ms,
            trace_id = self.trace_id,
            "request served"
        );
    }
}
