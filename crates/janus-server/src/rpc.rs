//! gRPC listener.
//!
//! tonic serves the registered services; every call passes through
//! [`InterceptorLayer`], which runs the gRPC chain around the router. Once
//! the force signal fires, calls still in flight are answered with
//! `UNAVAILABLE` instead of waiting for their handler. A service that fails
//! or panics is answered with an error status, so the chain still logs and
//! meters the call.

use std::convert::Infallible;
use std::future::poll_fn;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use janus_middleware::{Chain, MiddlewareContext, Rpc, RpcRequest, RpcResponse, Transport};
use tokio::net::TcpListener;
use tonic::codegen::StdError;
use tonic::service::Routes;
use tonic::Status;
use tonic::transport::server::TcpIncoming;
use tower::{Layer, Service};

use crate::shutdown::ShutdownSignal;

/// Serves `routes` until `graceful` fires and every call has drained.
pub(crate) async fn serve(
    listener: TcpListener,
    routes: Routes,
    chain: Arc<Chain<Rpc>>,
    graceful: ShutdownSignal,
    force: ShutdownSignal,
) {
    let incoming = match TcpIncoming::from_listener(listener, true, None) {
        Ok(incoming) => incoming,
        Err(e) => {
            tracing::error!(listener = Rpc::NAME, error = %e, "could not use listener");
            return;
        }
    };

    let result = tonic::transport::Server::builder()
        .layer(InterceptorLayer::new(chain, force))
        .add_routes(routes)
        .serve_with_incoming_shutdown(incoming, graceful.recv())
        .await;

    match result {
        Ok(()) => tracing::info!(listener = Rpc::NAME, "drained"),
        Err(e) => tracing::error!(listener = Rpc::NAME, error = %e, "listener stopped"),
    }
}

/// Wraps every gRPC call in the interceptor chain.
#[derive(Debug, Clone)]
pub struct InterceptorLayer {
    chain: Arc<Chain<Rpc>>,
    force: ShutdownSignal,
}

impl InterceptorLayer {
    /// Runs `chain` around each call; `force` cuts calls short.
    #[must_use]
    pub fn new(chain: Arc<Chain<Rpc>>, force: ShutdownSignal) -> Self {
        Self { chain, force }
    }
}

impl<S> Layer<S> for InterceptorLayer {
    type Service = Intercepted<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Intercepted {
            inner,
            chain: Arc::clone(&self.chain),
            force: self.force.clone(),
        }
    }
}

/// Service produced by [`InterceptorLayer`].
#[derive(Debug, Clone)]
pub struct Intercepted<S> {
    inner: S,
    chain: Arc<Chain<Rpc>>,
    force: ShutdownSignal,
}

impl<S> Service<RpcRequest> for Intercepted<S>
where
    S: Service<RpcRequest, Response = RpcResponse> + Clone + Send + 'static,
    S::Error: Into<StdError>,
    S::Future: Send + 'static,
{
    type Response = RpcResponse;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<RpcResponse, Infallible>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        // Readiness is checked on the clone that serves the call.
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: RpcRequest) -> Self::Future {
        let inner = self.inner.clone();
        let chain = Arc::clone(&self.chain);
        let force = self.force.clone();

        Box::pin(async move {
            let mut ctx = MiddlewareContext::new(Rpc::NAME);
            let response = chain
                .process(&mut ctx, request, move |ctx, request| {
                    ctx.set_route(request.uri().path());
                    Box::pin(call_or_abort(inner, request, force))
                })
                .await;
            Ok(response)
        })
    }
}

async fn call_or_abort<S>(mut inner: S, request: RpcRequest, force: ShutdownSignal) -> RpcResponse
where
    S: Service<RpcRequest, Response = RpcResponse>,
    S::Error: Into<StdError>,
{
    if let Err(e) = poll_fn(|cx| inner.poll_ready(cx)).await {
        return Status::from_error(e.into()).into_http();
    }

    let method = request.uri().path().to_string();
    let call = match std::panic::catch_unwind(AssertUnwindSafe(|| inner.call(request))) {
        Ok(call) => call,
        Err(_) => return call_panicked(&method),
    };

    tokio::select! {
        biased;
        () = force.recv() => Status::unavailable("server is shutting down").into_http(),
        outcome = AssertUnwindSafe(call).catch_unwind() => match outcome {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => Status::from_error(e.into()).into_http(),
            Err(_) => call_panicked(&method),
        },
    }
}

fn call_panicked(method: &str) -> RpcResponse {
    tracing::error!(route = method, "gRPC handler panicked");
    Status::internal("internal server error").into_http()
}
