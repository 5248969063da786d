//! Server side of `httpgrpc.HTTP`.
//!
//! Laid out like `tonic-build` output so it registers with any tonic router.

use std::convert::Infallible;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_util::future::BoxFuture;
use tonic::body::BoxBody;
use tonic::codegen::{Body, StdError};
use tonic::server::NamedService;

use super::{HttpRequest, HttpResponse, HANDLE_PATH, SERVICE_NAME};

/// Implementation of `httpgrpc.HTTP`.
#[tonic::async_trait]
pub trait Http: Send + Sync + 'static {
    /// Serves one HTTP request envelope.
    async fn handle(
        &self,
        request: tonic::Request<HttpRequest>,
    ) -> Result<tonic::Response<HttpResponse>, tonic::Status>;
}

/// Tower service exposing an [`Http`] implementation.
#[derive(Debug)]
pub struct HttpServer<T> {
    inner: Arc<T>,
}

impl<T: Http> HttpServer<T> {
    /// Wraps `inner`.
    pub fn new(inner: T) -> Self {
        Self::from_arc(Arc::new(inner))
    }

    /// Wraps an already shared implementation.
    pub fn from_arc(inner: Arc<T>) -> Self {
        Self { inner }
    }
}

impl<T> Clone for HttpServer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> NamedService for HttpServer<T> {
    const NAME: &'static str = SERVICE_NAME;
}

impl<T, B> tower::Service<http::Request<B>> for HttpServer<T>
where
    T: Http,
    B: Body + Send + 'static,
    B::Error: Into<StdError> + Send + 'static,
{
    type Response = http::Response<BoxBody>;
    type Error = Infallible;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: http::Request<B>) -> Self::Future {
        match req.uri().path() {
            HANDLE_PATH => {
                let inner = Arc::clone(&self.inner);
                Box::pin(async move {
                    let codec = tonic::codec::ProstCodec::default();
                    let mut grpc = tonic::server::Grpc::new(codec);
                    Ok(grpc.unary(HandleSvc(inner), req).await)
                })
            }
            _ => Box::pin(async move { Ok(tonic::Status::unimplemented("").into_http()) }),
        }
    }
}

struct HandleSvc<T>(Arc<T>);

impl<T: Http> tonic::server::UnaryService<HttpRequest> for HandleSvc<T> {
    type Response = HttpResponse;
    type Future = BoxFuture<'static, Result<tonic::Response<HttpResponse>, tonic::Status>>;

    fn call(&mut self, request: tonic::Request<HttpRequest>) -> Self::Future {
        let inner = Arc::clone(&self.0);
        Box::pin(async move { inner.handle(request).await })
    }
}
