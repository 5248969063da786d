//! Ordered middleware chains.
//!
//! A [`Chain`] is built once per transport and is immutable afterwards. The
//! first stage added is the outermost: for stages `[A, B]` around handler
//! `H` the order of execution is `A-before, B-before, H, B-after, A-after`.
//!
//! [`ChainBuilder::builtins`] adds the stages every Janus listener carries,
//! in this order, ahead of any user stage:
//!
//! | Position | Stage | Purpose |
//! |----------|-------|---------|
//! | 1 | `logging` | one line per request |
//! | 2 | `instrument` | request-duration histogram |
//! | 3 | `tracing` | W3C trace context, server span |

use std::sync::Arc;

use janus_telemetry::{RequestDuration, Tracing};

use crate::context::MiddlewareContext;
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::stages::{Instrument, Logging, TraceContext};
use crate::types::Transport;

/// A stage shared between chains.
pub type SharedMiddleware<T> = Arc<dyn Middleware<T>>;

/// Collaborators of the built-in stages.
#[derive(Debug, Clone)]
pub struct Builtins {
    /// Log successful requests at `info` rather than `debug`.
    pub log_success: bool,
    /// Histogram shared by both transports.
    pub histogram: Arc<RequestDuration>,
    /// Tracer and propagator shared by both transports.
    pub tracing: Arc<Tracing>,
}

/// Immutable, ordered list of stages for transport `T`.
pub struct Chain<T: Transport> {
    stages: Vec<SharedMiddleware<T>>,
}

impl<T: Transport> Chain<T> {
    /// Starts an empty builder.
    #[must_use]
    pub fn builder() -> ChainBuilder<T> {
        ChainBuilder::new()
    }

    /// Runs `request` through every stage and then `terminal`.
    pub async fn process<H>(&self, ctx: &mut MiddlewareContext, request: T::Request, terminal: H) -> T::Response
    where
        H: FnOnce(&mut MiddlewareContext, T::Request) -> BoxFuture<'static, T::Response> + Send,
    {
        let mut next = Next::terminal(terminal);
        for stage in self.stages.iter().rev() {
            next = Next::new(stage.as_ref(), next);
        }
        next.run(ctx, request).await
    }

    /// Stage names, outermost first.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Number of stages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// `true` if the chain has no stages.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

impl<T: Transport> std::fmt::Debug for Chain<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chain")
            .field("transport", &T::NAME)
            .field("stages", &self.stage_names())
            .finish()
    }
}

/// Builder for [`Chain`].
pub struct ChainBuilder<T: Transport> {
    stages: Vec<SharedMiddleware<T>>,
}

impl<T: Transport> Default for ChainBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> ChainBuilder<T> {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Appends logging, instrumentation and tracing.
    #[must_use]
    pub fn builtins(self, builtins: &Builtins) -> Self {
        self.stage(Logging::new(builtins.log_success))
            .stage(Instrument::new(Arc::clone(&builtins.histogram)))
            .stage(TraceContext::new(Arc::clone(&builtins.tracing)))
    }

    /// Appends one stage inside the ones already added.
    #[must_use]
    pub fn stage<M: Middleware<T>>(mut self, middleware: M) -> Self {
        self.stages.push(Arc::new(middleware));
        self
    }

    /// Appends shared stages in order.
    #[must_use]
    pub fn shared<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = SharedMiddleware<T>>,
    {
        self.stages.extend(stages);
        self
    }

    /// Freezes the chain.
    #[must_use]
    pub fn build(self) -> Chain<T> {
        Chain { stages: self.stages }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use bytes::Bytes;
    use http_body_util::Full;

    use super::*;
    use crate::types::{Http, HttpRequest, HttpResponse};

    #[derive(Clone, Default)]
    struct Log(Arc<Mutex<Vec<String>>>);

    impl Log {
        fn push(&self, entry: impl Into<String>) {
            self.0.lock().unwrap().push(entry.into());
        }

        fn entries(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    struct Recording {
        label: &'static str,
        log: Log,
    }

    impl Middleware<Http> for Recording {
        fn name(&self) -> &'static str {
            self.label
        }

        fn process<'a>(
            &'a self,
            ctx: &'a mut MiddlewareContext,
            request: HttpRequest,
            next: Next<'a, Http>,
        ) -> BoxFuture<'a, HttpResponse> {
            Box::pin(async move {
                self.log.push(format!("{}-before", self.label));
                let response = next.run(ctx, request).await;
                self.log.push(format!("{}-after", self.label));
                response
            })
        }
    }

    #[tokio::test]
    async fn test_first_stage_is_outermost() {
        let log = Log::default();
        let chain = Chain::<Http>::builder()
            .stage(Recording { label: "A", log: log.clone() })
            .stage(Recording { label: "B", log: log.clone() })
            .build();
        assert_eq!(chain.stage_names(), vec!["A", "B"]);

        let handler_log = log.clone();
        let mut ctx = MiddlewareContext::new("http");
        let request = http::Request::builder().uri("/").body(Full::new(Bytes::new())).unwrap();
        chain
            .process(&mut ctx, request, move |_ctx, _req| {
                handler_log.push("H");
                Box::pin(async { http::Response::new(Full::new(Bytes::new())) })
            })
            .await;

        assert_eq!(log.entries(), vec!["A-before", "B-before", "H", "B-after", "A-after"]);
    }

    #[tokio::test]
    async fn test_empty_chain_calls_handler() {
        let chain = Chain::<Http>::builder().build();
        assert!(chain.is_empty());

        let mut ctx = MiddlewareContext::new("http");
        let request = http::Request::builder().uri("/").body(Full::new(Bytes::new())).unwrap();
        let response = chain
            .process(&mut ctx, request, |_ctx, _req| {
                Box::pin(async { http::Response::new(Full::new(Bytes::from("direct"))) })
            })
            .await;
        assert_eq!(response.status(), http::StatusCode::OK);
    }

    #[test]
    fn test_builtins_precede_user_stages() {
        let builtins = Builtins {
            log_success: false,
            histogram: Arc::new(RequestDuration::new("chain_test").unwrap()),
            tracing: Arc::new(Tracing::new(&janus_telemetry::TraceConfig::default()).unwrap()),
        };
        let user: SharedMiddleware<Http> = Arc::new(Recording {
            label: "user",
            log: Log::default(),
        });
        let chain = Chain::<Http>::builder().builtins(&builtins).shared([user]).build();

        assert_eq!(chain.stage_names(), vec!["logging", "instrument", "tracing", "user"]);
        assert_eq!(chain.len(), 4);
    }
}
