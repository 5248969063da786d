//! HTTP requests carried over gRPC.
//!
//! The `httpgrpc.HTTP` service has one unary method, `Handle`, taking an
//! [`HttpRequest`] envelope and returning an [`HttpResponse`]. The message
//! layout matches the `httpgrpc` protocol:
//!
//! ```protobuf
//! service HTTP {
//!   rpc Handle(HTTPRequest) returns (HTTPResponse) {};
//! }
//!
//! message HTTPRequest {
//!   string method = 1;
//!   string url = 2;
//!   repeated Header headers = 3;
//!   bytes body = 4;
//! }
//!
//! message HTTPResponse {
//!   int32 Code = 1;
//!   repeated Header headers = 2;
//!   bytes body = 3;
//! }
//!
//! message Header {
//!   string key = 1;
//!   repeated string values = 2;
//! }
//! ```
//!
//! A `5xx` response travels as a gRPC error whose details hold a
//! `google.rpc.Status` wrapping the encoded [`HttpResponse`], so clients that
//! only look at the status still see a failure. [`response_from_status`]
//! recovers the response.

pub mod client;
pub mod server;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;
use http_body_util::{BodyExt, Full};
use prost::Message;
use tonic::{Code, Status};

/// Fully qualified service name.
pub const SERVICE_NAME: &str = "httpgrpc.HTTP";

/// Path of the `Handle` method.
pub const HANDLE_PATH: &str = "/httpgrpc.HTTP/Handle";

/// Type URL of [`HttpResponse`] inside a `google.protobuf.Any`.
pub const RESPONSE_TYPE_URL: &str = "type.googleapis.com/httpgrpc.HTTPResponse";

/// An HTTP request envelope.
#[derive(Clone, PartialEq, Message)]
pub struct HttpRequest {
    /// Request method.
    #[prost(string, tag = "1")]
    pub method: String,
    /// Path and query, or an absolute URL.
    #[prost(string, tag = "2")]
    pub url: String,
    /// Request headers.
    #[prost(message, repeated, tag = "3")]
    pub headers: Vec<Header>,
    /// Whole request body.
    #[prost(bytes = "bytes", tag = "4")]
    pub body: Bytes,
}

/// An HTTP response envelope.
#[derive(Clone, PartialEq, Message)]
pub struct HttpResponse {
    /// Status code.
    #[prost(int32, tag = "1")]
    pub code: i32,
    /// Response headers.
    #[prost(message, repeated, tag = "2")]
    pub headers: Vec<Header>,
    /// Whole response body.
    #[prost(bytes = "bytes", tag = "3")]
    pub body: Bytes,
}

/// One header name with all its values.
#[derive(Clone, PartialEq, Message)]
pub struct Header {
    /// Header name.
    #[prost(string, tag = "1")]
    pub key: String,
    /// Values in order of appearance.
    #[prost(string, repeated, tag = "2")]
    pub values: Vec<String>,
}

/// `google.rpc.Status`, as carried in `grpc-status-details-bin`.
#[derive(Clone, PartialEq, Message)]
struct RpcStatus {
    #[prost(int32, tag = "1")]
    code: i32,
    #[prost(string, tag = "2")]
    message: String,
    #[prost(message, repeated, tag = "3")]
    details: Vec<Any>,
}

/// `google.protobuf.Any`.
#[derive(Clone, PartialEq, Message)]
struct Any {
    #[prost(string, tag = "1")]
    type_url: String,
    #[prost(bytes = "bytes", tag = "2")]
    value: Bytes,
}

/// Envelope headers from a header map, one entry per distinct name.
#[must_use]
pub fn headers_to_wire(headers: &HeaderMap) -> Vec<Header> {
    headers
        .keys()
        .map(|name| Header {
            key: name.as_str().to_string(),
            values: headers
                .get_all(name)
                .iter()
                .filter_map(|v| v.to_str().ok().map(str::to_string))
                .collect(),
        })
        .collect()
}

/// Header map from envelope headers. Invalid names or values are dropped.
#[must_use]
pub fn headers_from_wire(headers: &[Header]) -> HeaderMap {
    let mut map = HeaderMap::new();
    for header in headers {
        let Ok(name) = HeaderName::from_bytes(header.key.as_bytes()) else {
            continue;
        };
        for value in &header.values {
            if let Ok(value) = HeaderValue::from_str(value) {
                map.append(name.clone(), value);
            }
        }
    }
    map
}

/// Rebuilds an in-process request from an envelope.
pub fn into_http_request(wire: HttpRequest) -> Result<janus_middleware::HttpRequest, Status> {
    let method = http::Method::from_bytes(wire.method.as_bytes())
        .map_err(|_| Status::invalid_argument(format!("invalid method {:?}", wire.method)))?;
    let uri: http::Uri = wire
        .url
        .parse()
        .map_err(|_| Status::invalid_argument(format!("invalid url {:?}", wire.url)))?;

    let mut request = http::Request::new(Full::new(wire.body));
    *request.method_mut() = method;
    *request.uri_mut() = uri;
    *request.headers_mut() = headers_from_wire(&wire.headers);
    Ok(request)
}

/// Envelope for an in-process response.
pub async fn from_http_response(response: janus_middleware::HttpResponse) -> HttpResponse {
    let (parts, body) = response.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(never) => match never {},
    };
    HttpResponse {
        code: i32::from(parts.status.as_u16()),
        headers: headers_to_wire(&parts.headers),
        body,
    }
}

/// Envelope for a client-side request.
#[must_use]
pub fn request_to_wire(request: http::Request<Bytes>) -> HttpRequest {
    let (parts, body) = request.into_parts();
    let url = parts
        .uri
        .path_and_query()
        .map_or_else(|| parts.uri.path().to_string(), ToString::to_string);
    HttpRequest {
        method: parts.method.as_str().to_string(),
        url,
        headers: headers_to_wire(&parts.headers),
        body,
    }
}

/// Client-side response from an envelope.
pub fn response_from_wire(wire: HttpResponse) -> Result<http::Response<Bytes>, Status> {
    let status = u16::try_from(wire.code)
        .ok()
        .and_then(|code| http::StatusCode::from_u16(code).ok())
        .ok_or_else(|| Status::internal(format!("invalid HTTP status {}", wire.code)))?;

    let mut response = http::Response::new(wire.body);
    *response.status_mut() = status;
    *response.headers_mut() = headers_from_wire(&wire.headers);
    Ok(response)
}

/// gRPC error carrying a server-error response.
#[must_use]
pub fn error_status(response: &HttpResponse) -> Status {
    let message = String::from_utf8_lossy(&response.body).into_owned();
    let details = RpcStatus {
        code: response.code,
        message: message.clone(),
        details: vec![Any {
            type_url: RESPONSE_TYPE_URL.to_string(),
            value: Bytes::from(response.encode_to_vec()),
        }],
    };
    Status::with_details(Code::Internal, message, Bytes::from(details.encode_to_vec()))
}

/// The response an [`error_status`] carries, if any.
#[must_use]
pub fn response_from_status(status: &Status) -> Option<HttpResponse> {
    let details = RpcStatus::decode(status.details()).ok()?;
    details
        .details
        .into_iter()
        .find(|any| any.type_url == RESPONSE_TYPE_URL)
        .and_then(|any| HttpResponse::decode(any.value).ok())
}
