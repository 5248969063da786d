//! Native HTTP/1.1 listener.
//!
//! One task accepts connections; each connection is served by its own task
//! with hyper's `http1` connection driver. A connection task reacts to:
//!
//! - the graceful signal: stop keep-alive, finish the request in flight,
//! - the idle timeout: same, when no request arrived for a while,
//! - the force signal: drop the connection, aborting whatever is running.
//!
//! Requests have their body collected within the read timeout (`408`
//! otherwise), then run through the HTTP chain into the route table. The
//! handler must answer within the write timeout (`503` otherwise).

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use http::{Request, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use janus_middleware::{Chain, Http, HttpResponse, MiddlewareContext, Transport};
use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::task::{JoinError, JoinSet};
use tokio::time::Instant;

use crate::routes::{json_error, RouteTable};
use crate::shutdown::ShutdownSignal;

/// Everything a connection needs to serve requests.
pub(crate) struct HttpService {
    pub(crate) routes: Arc<RouteTable>,
    pub(crate) chain: Arc<Chain<Http>>,
    pub(crate) read_timeout: Duration,
    pub(crate) write_timeout: Duration,
    pub(crate) idle_timeout: Duration,
}

/// Accepts until `graceful` fires, then waits for open connections to close.
///
/// Connection tasks live in a [`JoinSet`], so aborting this task also drops
/// every connection it accepted.
pub(crate) async fn serve(
    listener: TcpListener,
    service: Arc<HttpService>,
    graceful: ShutdownSignal,
    force: ShutdownSignal,
) {
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            biased;

            () = graceful.recv() => break,

            Some(joined) = connections.join_next(), if !connections.is_empty() => log_join(joined),

            accepted = listener.accept() => match accepted {
                Ok((stream, remote)) => {
                    connections.spawn(serve_connection(
                        stream,
                        remote,
                        Arc::clone(&service),
                        graceful.clone(),
                        force.clone(),
                    ));
                }
                Err(e) if is_connection_error(&e) => {
                    tracing::debug!(listener = Http::NAME, error = %e, "connection dropped before accept");
                }
                Err(e) => {
                    tracing::error!(listener = Http::NAME, error = %e, "accept failed, listener stopped");
                    break;
                }
            },
        }
    }

    drop(listener);
    tracing::info!(
        listener = Http::NAME,
        connections = connections.len(),
        "listener closed, draining connections"
    );
    while let Some(joined) = connections.join_next().await {
        log_join(joined);
    }
    tracing::info!(listener = Http::NAME, "drained");
}

fn log_join(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        tracing::error!(listener = Http::NAME, error = %e, "connection task failed");
    }
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused | io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset
    )
}

async fn serve_connection(
    stream: TcpStream,
    remote: SocketAddr,
    service: Arc<HttpService>,
    graceful: ShutdownSignal,
    force: ShutdownSignal,
) {
    let activity = Arc::new(Activity::new());
    let idle_timeout = service.idle_timeout;
    let read_timeout = service.read_timeout;

    let hyper_service = {
        let activity = Arc::clone(&activity);
        service_fn(move |request: Request<Incoming>| {
            let service = Arc::clone(&service);
            let activity = Arc::clone(&activity);
            async move {
                let _busy = activity.begin();
                Ok::<_, Infallible>(service.handle(request).await)
            }
        })
    };

    let conn = http1::Builder::new()
        .timer(TokioTimer::new())
        .header_read_timeout(read_timeout)
        .serve_connection(TokioIo::new(stream), hyper_service);
    tokio::pin!(conn);

    let mut closing = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(e) = result {
                    tracing::debug!(%remote, error = %e, "connection error");
                }
                break;
            }
            () = graceful.recv(), if !closing => {
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
            () = activity.idle_for(idle_timeout), if !closing => {
                tracing::debug!(%remote, "closing idle connection");
                conn.as_mut().graceful_shutdown();
                closing = true;
            }
            () = force.recv() => {
                tracing::debug!(%remote, "aborting connection");
                break;
            }
        }
    }
}

impl HttpService {
    async fn handle(&self, request: Request<Incoming>) -> HttpResponse {
        let (parts, body) = request.into_parts();
        let body = match tokio::time::timeout(self.read_timeout, body.collect()).await {
            Ok(Ok(collected)) => collected.to_bytes(),
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "failed to read request body");
                return json_error(StatusCode::BAD_REQUEST, "BODY_READ_ERROR", "failed to read request body");
            }
            Err(_) => {
                tracing::warn!(path = parts.uri.path(), "request body not received within read timeout");
                return json_error(StatusCode::REQUEST_TIMEOUT, "REQUEST_TIMEOUT", "request body read timed out");
            }
        };
        let request = Request::from_parts(parts, Full::new(body));

        let routes = Arc::clone(&self.routes);
        let write_timeout = self.write_timeout;
        let mut ctx = MiddlewareContext::new(Http::NAME);
        self.chain
            .process(&mut ctx, request, move |ctx, request| {
                let resolution = routes.resolve(request.method(), request.uri().path());
                if let Some(template) = resolution.template() {
                    ctx.set_route(template);
                }
                Box::pin(async move {
                    match tokio::time::timeout(write_timeout, resolution.dispatch(request)).await {
                        Ok(response) => response,
                        Err(_) => json_error(
                            StatusCode::SERVICE_UNAVAILABLE,
                            "WRITE_TIMEOUT",
                            "handler did not respond within the write timeout",
                        ),
                    }
                })
            })
            .await
    }
}

/// Request activity on one connection, for the idle timeout.
struct Activity {
    in_flight: AtomicUsize,
    last: Mutex<Instant>,
}

impl Activity {
    fn new() -> Self {
        Self {
            in_flight: AtomicUsize::new(0),
            last: Mutex::new(Instant::now()),
        }
    }

    fn begin(&self) -> Busy<'_> {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        Busy(self)
    }

    /// Completes once no request has been in flight for `timeout`.
    async fn idle_for(&self, timeout: Duration) {
        loop {
            let deadline = *self.last.lock() + timeout;
            tokio::time::sleep_until(deadline).await;
            if self.in_flight.load(Ordering::SeqCst) == 0 && *self.last.lock() + timeout <= Instant::now() {
                return;
            }
            if self.in_flight.load(Ordering::SeqCst) > 0 {
                tokio::time::sleep(timeout).await;
            }
        }
    }
}

struct Busy<'a>(&'a Activity);

impl Drop for Busy<'_> {
    fn drop(&mut self) {
        *self.0.last.lock() = Instant::now();
        self.0.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}
