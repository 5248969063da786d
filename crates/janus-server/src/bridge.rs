//! HTTP-over-gRPC bridge.
//!
//! Serves `httpgrpc.HTTP/Handle` on the gRPC listener by dispatching the
//! rebuilt request straight into the shared [`RouteTable`]. The HTTP chain
//! is not involved: the gRPC interceptors already log, meter and trace the
//! call, so each bridged request is counted once.

use std::sync::Arc;

use janus_middleware::stages::current_context;
use tonic::{Request, Response, Status};

use crate::httpgrpc::server::{Http, HttpServer};
use crate::httpgrpc::{self, HttpRequest, HttpResponse};
use crate::routes::RouteTable;

/// Dispatches envelopes into the route table.
#[derive(Debug, Clone)]
pub struct Bridge {
    routes: Arc<RouteTable>,
}

impl Bridge {
    /// Serves `routes`.
    #[must_use]
    pub fn new(routes: Arc<RouteTable>) -> Self {
        Self { routes }
    }

    /// The tonic service to register.
    #[must_use]
    pub fn into_service(self) -> HttpServer<Self> {
        HttpServer::new(self)
    }
}

#[tonic::async_trait]
impl Http for Bridge {
    async fn handle(&self, request: Request<HttpRequest>) -> Result<Response<HttpResponse>, Status> {
        let parent = current_context(request.extensions());
        let mut http_request = httpgrpc::into_http_request(request.into_inner())?;
        http_request.extensions_mut().insert(parent);

        let response = self.routes.dispatch(http_request).await;
        let wire = httpgrpc::from_http_response(response).await;

        if (500..600).contains(&wire.code) {
            return Err(httpgrpc::error_status(&wire));
        }
        Ok(Response::new(wire))
    }
}
