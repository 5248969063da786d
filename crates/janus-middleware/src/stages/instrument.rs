//! Request-duration instrumentation.

use std::sync::Arc;
use std::time::Instant;

use janus_telemetry::{RequestDuration, RequestLabels};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::Transport;

/// Records one histogram sample per request, labelled with the matched
/// route template (never the literal path).
#[derive(Debug, Clone)]
pub struct Instrument {
    histogram: Arc<RequestDuration>,
}

impl Instrument {
    /// Records into `histogram`.
    #[must_use]
    pub fn new(histogram: Arc<RequestDuration>) -> Self {
        Self { histogram }
    }
}

impl<T: Transport> Middleware<T> for Instrument {
    fn name(&self) -> &'static str {
        "instrument"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: T::Request,
        next: Next<'a, T>,
    ) -> BoxFuture<'a, T::Response> {
        Box::pin(async move {
            let method = T::method(&request);
            let streaming = T::is_streaming(&request);
            let start = Instant::now();

            let response = next.run(ctx, request).await;

            let labels = RequestLabels {
                method,
                route: ctx.route_or_other().to_string(),
                status: T::outcome(&response).class.to_string(),
                streaming,
            };
            self.histogram.observe(&labels, start.elapsed());

            response
        })
    }
}
