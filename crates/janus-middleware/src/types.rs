//! Transports a chain can wrap.
//!
//! A [`Transport`] names the request and response types of one listener and
//! knows how to read the few facts the built-in stages need from them: the
//! method label, whether the call is streaming, the propagation headers and
//! the status class of the response.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body_util::Full;

/// Request type of the HTTP chain.
pub type HttpRequest = http::Request<Full<Bytes>>;

/// Response type of the HTTP chain.
pub type HttpResponse = http::Response<Full<Bytes>>;

/// Request type of the gRPC chain.
pub type RpcRequest = http::Request<tonic::body::BoxBody>;

/// Response type of the gRPC chain.
pub type RpcResponse = http::Response<tonic::body::BoxBody>;

/// How a request ended, as seen by logging, metrics and tracing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    /// Status class label: `1xx`..`5xx` for HTTP, `success`/`error` for gRPC.
    pub class: &'static str,
    /// Status code as logged: the HTTP status, or the numeric gRPC code.
    pub code: u16,
    /// Server-side failure.
    pub is_error: bool,
}

/// A listener's request/response shape.
pub trait Transport: Send + Sync + 'static {
    /// `http` or `grpc`; used as the `transport` log field.
    const NAME: &'static str;

    /// Request flowing into the chain.
    type Request: Send + 'static;

    /// Response flowing out of the chain.
    type Response: Send + 'static;

    /// Method label of the request.
    fn method(request: &Self::Request) -> String;

    /// Websocket upgrade or streaming call.
    fn is_streaming(request: &Self::Request) -> bool;

    /// Headers carrying trace propagation.
    fn headers(request: &Self::Request) -> &HeaderMap;

    /// Extensions handed on to the handler.
    fn extensions_mut(request: &mut Self::Request) -> &mut http::Extensions;

    /// Status class of a finished response.
    fn outcome(response: &Self::Response) -> Outcome;

    /// Span name once the route is known.
    fn span_name(method: &str, route: &str) -> String {
        format!("{method} {route}")
    }
}

/// Native HTTP/1.1 listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Http;

impl Transport for Http {
    const NAME: &'static str = "http";

    type Request = HttpRequest;
    type Response = HttpResponse;

    fn method(request: &HttpRequest) -> String {
        request.method().as_str().to_string()
    }

    fn is_streaming(request: &HttpRequest) -> bool {
        request
            .headers()
            .get(http::header::UPGRADE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.eq_ignore_ascii_case("websocket"))
    }

    fn headers(request: &HttpRequest) -> &HeaderMap {
        request.headers()
    }

    fn extensions_mut(request: &mut HttpRequest) -> &mut http::Extensions {
        request.extensions_mut()
    }

    fn outcome(response: &HttpResponse) -> Outcome {
        http_outcome(response.status())
    }
}

/// Status class of an HTTP status code.
#[must_use]
pub fn http_outcome(status: StatusCode) -> Outcome {
    let class = match status.as_u16() / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        _ => "5xx",
    };
    Outcome {
        class,
        code: status.as_u16(),
        is_error: status.is_server_error(),
    }
}

/// gRPC listener.
///
/// Interceptors see every call as unary: the streaming flag is always
/// `false`, and only trailers-only error responses are classified as
/// `error`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Rpc;

/// Method label of every gRPC observation.
pub const RPC_METHOD: &str = "gRPC";

impl Transport for Rpc {
    const NAME: &'static str = "grpc";

    type Request = RpcRequest;
    type Response = RpcResponse;

    fn method(_request: &RpcRequest) -> String {
        RPC_METHOD.to_string()
    }

    fn is_streaming(_request: &RpcRequest) -> bool {
        false
    }

    fn headers(request: &RpcRequest) -> &HeaderMap {
        request.headers()
    }

    fn extensions_mut(request: &mut RpcRequest) -> &mut http::Extensions {
        request.extensions_mut()
    }

    fn outcome(response: &RpcResponse) -> Outcome {
        match tonic::Status::from_header_map(response.headers()) {
            Some(status) if status.code() != tonic::Code::Ok => Outcome {
                class: "error",
                code: i32::from(status.code()).try_into().unwrap_or(u16::MAX),
                is_error: true,
            },
            _ => Outcome {
                class: "success",
                code: 0,
                is_error: false,
            },
        }
    }

    fn span_name(_method: &str, route: &str) -> String {
        route.trim_start_matches('/').to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn http_response(status: u16) -> HttpResponse {
        http::Response::builder()
            .status(status)
            .body(Full::new(Bytes::new()))
            .unwrap()
    }

    #[test]
    fn test_http_status_classes() {
        assert_eq!(Http::outcome(&http_response(101)).class, "1xx");
        assert_eq!(Http::outcome(&http_response(204)).class, "2xx");
        assert_eq!(Http::outcome(&http_response(404)).class, "4xx");
        assert!(!Http::outcome(&http_response(404)).is_error);
        assert_eq!(Http::outcome(&http_response(503)).class, "5xx");
        assert!(Http::outcome(&http_response(503)).is_error);
        assert_eq!(Http::outcome(&http_response(418)).code, 418);
    }

    #[test]
    fn test_grpc_outcome_carries_status_code() {
        let failed = tonic::Status::unavailable("draining").into_http();
        let outcome = Rpc::outcome(&failed);
        assert_eq!(outcome.class, "error");
        assert_eq!(outcome.code, 14);
        assert!(outcome.is_error);

        let ok = Rpc::outcome(&http::Response::new(tonic::body::empty_body()));
        assert_eq!(ok.class, "success");
        assert_eq!(ok.code, 0);
    }

    #[test]
    fn test_websocket_upgrade_is_streaming() {
        let request: HttpRequest = http::Request::builder()
            .uri("/ws")
            .header("upgrade", "WebSocket")
            .body(Full::new(Bytes::new()))
            .unwrap();
        assert!(Http::is_streaming(&request));

        let plain: HttpRequest = http::Request::builder().uri("/").body(Full::new(Bytes::new())).unwrap();
        assert!(!Http::is_streaming(&plain));
    }

    #[test]
    fn test_rpc_outcome_reads_trailers_only_status() {
        let ok = http::Response::new(tonic::body::empty_body());
        assert_eq!(Rpc::outcome(&ok).class, "success");

        let failed = tonic::Status::unavailable("draining").into_http();
        let outcome = Rpc::outcome(&failed);
        assert_eq!(outcome.class, "error");
        assert!(outcome.is_error);
    }

    #[test]
    fn test_rpc_span_name_is_method_path() {
        assert_eq!(Rpc::span_name(RPC_METHOD, "/httpgrpc.HTTP/Handle"), "httpgrpc.HTTP/Handle");
        assert_eq!(Http::span_name("GET", "/users/{id}"), "GET /users/{id}");
    }
}
