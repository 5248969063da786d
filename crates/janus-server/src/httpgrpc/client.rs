//! Client side of `httpgrpc.HTTP`.
//!
//! ```rust,ignore
//! use janus_server::httpgrpc::client::HttpOverRpcClient;
//!
//! let mut client = HttpOverRpcClient::connect("http://127.0.0.1:9095").await?;
//! let request = http::Request::get("/ping").body(bytes::Bytes::new())?;
//! let response = client.round_trip(request).await?;
//! assert_eq!(response.body().as_ref(), b"pong");
//! ```

use bytes::Bytes;
use http::uri::PathAndQuery;
use tonic::body::BoxBody;
use tonic::codegen::{Body, StdError};
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};

use super::{request_to_wire, response_from_status, response_from_wire, HttpRequest, HttpResponse, HANDLE_PATH};

/// Sends HTTP requests to a remote `httpgrpc.HTTP` service.
#[derive(Debug, Clone)]
pub struct HttpOverRpcClient<T> {
    inner: tonic::client::Grpc<T>,
}

impl HttpOverRpcClient<Channel> {
    /// Connects to `dst`, e.g. `http://127.0.0.1:9095`.
    pub async fn connect<D>(dst: D) -> Result<Self, tonic::transport::Error>
    where
        D: TryInto<Endpoint>,
        D::Error: Into<StdError>,
    {
        let channel = Endpoint::new(dst)?.connect().await?;
        Ok(Self::new(channel))
    }
}

impl<T> HttpOverRpcClient<T>
where
    T: tonic::client::GrpcService<BoxBody>,
    T::Error: Into<StdError>,
    T::ResponseBody: Body<Data = Bytes> + Send + 'static,
    <T::ResponseBody as Body>::Error: Into<StdError> + Send,
{
    /// Uses an existing transport.
    pub fn new(inner: T) -> Self {
        Self {
            inner: tonic::client::Grpc::new(inner),
        }
    }

    /// Calls `Handle` with a raw envelope.
    pub async fn handle(
        &mut self,
        request: impl tonic::IntoRequest<HttpRequest>,
    ) -> Result<tonic::Response<HttpResponse>, Status> {
        self.inner
            .ready()
            .await
            .map_err(|e| Status::new(Code::Unknown, format!("service was not ready: {}", e.into())))?;
        let codec = tonic::codec::ProstCodec::default();
        let path = PathAndQuery::from_static(HANDLE_PATH);
        self.inner.unary(request.into_request(), path, codec).await
    }

    /// Sends `request` and returns the HTTP response.
    ///
    /// Server errors come back as `Ok` with their `5xx` status; `Err` means
    /// the call itself failed.
    pub async fn round_trip(&mut self, request: http::Request<Bytes>) -> Result<http::Response<Bytes>, Status> {
        match self.handle(request_to_wire(request)).await {
            Ok(response) => response_from_wire(response.into_inner()),
            Err(status) => match response_from_status(&status) {
                Some(response) => response_from_wire(response),
                None => Err(status),
            },
        }
    }
}
