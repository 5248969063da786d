//! Ping service.
//!
//! Serves `GET /ping` and `GET /echo/{word}` over HTTP and over the
//! `httpgrpc.HTTP/Handle` bridge until SIGINT or SIGTERM.
//!
//! ```text
//! janus-ping --server.http-listen-port=8080 --server.grpc-listen-port=9095 --log.format=pretty
//! curl localhost:8080/ping
//! ```

use clap::Parser;
use janus::prelude::*;

/// Command line.
#[derive(Debug, Parser)]
#[command(name = "janus-ping", version, about = "Answers pings over HTTP and gRPC")]
struct Cli {
    #[command(flatten)]
    config: ConfigArgs,
}

async fn ping(_req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    Ok(text("pong"))
}

async fn echo(req: HttpRequest) -> Result<HttpResponse, HandlerError> {
    let word = req
        .extensions()
        .get::<PathParams>()
        .and_then(|p| p.0.get("word"))
        .ok_or_else(|| HandlerError::BadRequest("missing word".to_string()))?;
    Ok(text(word.to_string()))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = cli.config.load("JANUS")?;
    init_logging(&settings.telemetry.log_config())?;

    let mut server = Server::bind(Config::from_settings(settings).build()?).await?;
    server.routes_mut().get("/ping", ping)?.get("/echo/{word}", echo)?;

    tracing::info!(
        http = %server.http_addr(),
        grpc = %server.grpc_addr(),
        "janus-ping ready"
    );

    shutdown_on_signal(server.stop_handle());
    server.run().await?;
    Ok(())
}
