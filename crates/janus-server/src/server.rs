//! The dual-listener server.
//!
//! [`Server::bind`] binds both listeners and wires everything up without
//! starting any task. Routes and gRPC services are added to the returned
//! value, then [`Server::run`] serves until [`StopHandle::stop`] is called.
//!
//! # Shutdown
//!
//! 1. `stop` triggers the graceful signal. The HTTP listener stops
//!    accepting and lets open connections finish their current request;
//!    tonic stops accepting and drains open calls.
//! 2. Both drains run concurrently under `graceful_shutdown_timeout`.
//! 3. If the deadline passes first, the force signal fires: HTTP
//!    connections are dropped, gRPC calls still running are answered with
//!    `UNAVAILABLE` and both serving tasks are aborted.
//!
//! ```rust,ignore
//! use janus_server::{routes::text, shutdown_on_signal, Config, Server};
//!
//! let config = Config::builder().http_listen_port(8080).build()?;
//! let mut server = Server::bind(config).await?;
//! server.routes_mut().get("/ping", |_req| async { Ok(text("pong")) })?;
//!
//! shutdown_on_signal(server.stop_handle());
//! server.run().await?;
//! ```

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use janus_middleware::{Builtins, Chain, Http, Rpc, RpcRequest, RpcResponse};
use janus_telemetry::{RequestDuration, Tracing};
use tokio::net::TcpListener;
use tonic::server::NamedService;
use tonic::service::RoutesBuilder;

use crate::bridge::Bridge;
use crate::config::Config;
use crate::endpoints::{self, Operational, RouteInventory, RunFacts};
use crate::error::{BindError, Listener, ServerError, ShutdownTimeoutExceeded};
use crate::http::{self as http_listener, HttpService};
use crate::lifecycle::{LifecycleState, StopHandle};
use crate::routes::RouteTable;
use crate::rpc;
use crate::shutdown::ShutdownSignal;

/// A bound, not yet running, HTTP + gRPC server.
pub struct Server {
    config: Config,
    http_listener: TcpListener,
    rpc_listener: TcpListener,
    http_addr: SocketAddr,
    grpc_addr: SocketAddr,
    routes: RouteTable,
    rpc_routes: RoutesBuilder,
    rpc_services: Vec<&'static str>,
    http_chain: Arc<Chain<Http>>,
    rpc_chain: Arc<Chain<Rpc>>,
    histogram: Arc<RequestDuration>,
    tracing: Arc<Tracing>,
    facts: Arc<RunFacts>,
    handle: StopHandle,
    force: ShutdownSignal,
}

impl Server {
    /// Binds the HTTP listener, then the gRPC listener.
    ///
    /// If the gRPC bind fails the HTTP listener is closed before the error
    /// is returned.
    pub async fn bind(config: Config) -> Result<Self, ServerError> {
        let http_listener = bind_listener(Listener::Http, config.http_addr()).await?;
        let rpc_listener = match bind_listener(Listener::Rpc, config.grpc_addr()).await {
            Ok(listener) => listener,
            Err(e) => {
                drop(http_listener);
                return Err(e.into());
            }
        };
        let http_addr = local_addr(&http_listener, Listener::Http, config.http_addr())?;
        let grpc_addr = local_addr(&rpc_listener, Listener::Rpc, config.grpc_addr())?;

        let histogram = match config.histogram() {
            Some(histogram) => histogram,
            None => Arc::new(RequestDuration::with_buckets(
                &config.settings().server.metrics_namespace,
                &config.settings().telemetry.histogram_buckets,
            )?),
        };
        let tracing = match config.tracing() {
            Some(tracing) => tracing,
            None => Arc::new(Tracing::new(&config.trace_config())?),
        };

        let builtins = Builtins {
            log_success: config.log_success(),
            histogram: Arc::clone(&histogram),
            tracing: Arc::clone(&tracing),
        };
        let http_chain = Arc::new(
            Chain::<Http>::builder()
                .builtins(&builtins)
                .shared(config.http_middleware().iter().cloned())
                .build(),
        );
        let rpc_chain = Arc::new(
            Chain::<Rpc>::builder()
                .builtins(&builtins)
                .shared(config.rpc_interceptors().iter().cloned())
                .build(),
        );

        let handle = StopHandle::new(ShutdownSignal::new());
        let facts = Arc::new(RunFacts::default());
        let mut routes = RouteTable::new();
        endpoints::register(
            &mut routes,
            Operational {
                histogram: Arc::clone(&histogram),
                tracing: Arc::clone(&tracing),
                handle: handle.clone(),
                facts: Arc::clone(&facts),
                http_addr,
                grpc_addr,
            },
            &config,
        )?;

        ::tracing::info!(
            http = %http_addr,
            grpc = %grpc_addr,
            http_stages = ?http_chain.stage_names(),
            rpc_stages = ?rpc_chain.stage_names(),
            "listeners bound"
        );

        Ok(Self {
            config,
            http_listener,
            rpc_listener,
            http_addr,
            grpc_addr,
            routes,
            rpc_routes: RoutesBuilder::default(),
            rpc_services: Vec::new(),
            http_chain,
            rpc_chain,
            histogram,
            tracing,
            facts,
            handle,
            force: ShutdownSignal::new(),
        })
    }

    /// Address the HTTP listener is bound to.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        self.http_addr
    }

    /// Address the gRPC listener is bound to.
    #[must_use]
    pub fn grpc_addr(&self) -> SocketAddr {
        self.grpc_addr
    }

    /// The configuration the server was bound with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Route table served over HTTP and the bridge.
    pub fn routes_mut(&mut self) -> &mut RouteTable {
        &mut self.routes
    }

    /// Registers a tonic service on the gRPC listener.
    pub fn add_rpc_service<S>(&mut self, service: S) -> &mut Self
    where
        S: tower::Service<RpcRequest, Response = RpcResponse, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        self.rpc_services.push(S::NAME);
        self.rpc_routes.add_service(service);
        self
    }

    /// Histogram shared by both transports.
    #[must_use]
    pub fn histogram(&self) -> Arc<RequestDuration> {
        Arc::clone(&self.histogram)
    }

    /// Tracer shared by both transports.
    #[must_use]
    pub fn tracing(&self) -> Arc<Tracing> {
        Arc::clone(&self.tracing)
    }

    /// Handle for stopping the server from any task.
    #[must_use]
    pub fn stop_handle(&self) -> StopHandle {
        self.handle.clone()
    }

    /// Serves both listeners until stopped.
    pub async fn run(self) -> Result<(), ServerError> {
        let Self {
            config,
            http_listener,
            rpc_listener,
            routes,
            mut rpc_routes,
            mut rpc_services,
            http_chain,
            rpc_chain,
            tracing,
            facts,
            handle,
            force,
            ..
        } = self;

        let routes = Arc::new(routes);
        rpc_routes.add_service(Bridge::new(Arc::clone(&routes)).into_service());
        rpc_services.push(crate::httpgrpc::SERVICE_NAME);
        facts.started(RouteInventory::new(&routes, rpc_services));

        handle.transition(LifecycleState::Idle, LifecycleState::Running);
        let graceful = handle.graceful().clone();
        ::tracing::info!(routes = routes.len(), "serving");

        let http_service = Arc::new(HttpService {
            routes,
            chain: http_chain,
            read_timeout: config.http_read_timeout(),
            write_timeout: config.http_write_timeout(),
            idle_timeout: config.http_idle_timeout(),
        });
        let mut http_task = tokio::spawn(http_listener::serve(
            http_listener,
            http_service,
            graceful.clone(),
            force.clone(),
        ));
        let mut rpc_task = tokio::spawn(rpc::serve(
            rpc_listener,
            rpc_routes.routes(),
            rpc_chain,
            graceful.clone(),
            force.clone(),
        ));

        graceful.recv().await;
        handle.transition(LifecycleState::Running, LifecycleState::ShuttingDown);
        let timeout = config.graceful_shutdown_timeout();
        ::tracing::info!(?timeout, "shutting down");

        let drained = tokio::time::timeout(timeout, async {
            let _ = tokio::join!(&mut http_task, &mut rpc_task);
        })
        .await;

        if drained.is_err() {
            ::tracing::warn!(error = %ShutdownTimeoutExceeded { timeout }, "forcing shutdown");
            force.trigger();
            http_task.abort();
            rpc_task.abort();
            let _ = tokio::join!(http_task, rpc_task);
        }

        handle.set(LifecycleState::Stopped);
        if let Err(e) = tokio::task::spawn_blocking(move || tracing.shutdown()).await {
            ::tracing::warn!(error = %e, "tracer shutdown did not complete");
        }
        ::tracing::info!("stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Server {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Server")
            .field("http_addr", &self.http_addr)
            .field("grpc_addr", &self.grpc_addr)
            .field("routes", &self.routes)
            .field("rpc_services", &self.rpc_services)
            .field("state", &self.handle.state())
            .finish_non_exhaustive()
    }
}

async fn bind_listener(listener: Listener, addr: SocketAddr) -> Result<TcpListener, BindError> {
    TcpListener::bind(addr).await.map_err(|source| BindError {
        listener,
        addr,
        source,
    })
}

fn local_addr(socket: &TcpListener, listener: Listener, addr: SocketAddr) -> Result<SocketAddr, BindError> {
    socket.local_addr().map_err(|source| BindError {
        listener,
        addr,
        source,
    })
}
