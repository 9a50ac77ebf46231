//! Gateway dispatch server.
//!
//! Loads configuration, initialises logging and metrics, and serves a small
//! set of demo routes through the dispatcher.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use async_trait::async_trait;
use clap::Parser;
use serde_json::json;
use tokio::net::TcpListener;

use gateway_dispatch::config::{load_config, GatewayConfig};
use gateway_dispatch::middleware::RequestIdMiddleware;
use gateway_dispatch::observability::{logging, metrics};
use gateway_dispatch::routing::HandlerResult;
use gateway_dispatch::{
    ApiError, Dispatcher, DuplexConnection, DuplexHandler, Endpoint, GatewayServer, HostError,
    Message, PathVariables, Request, ResourceHandler, Response, RouteTable, Shutdown,
    StartupError,
};

#[derive(Debug, Parser)]
#[command(name = "gateway-dispatch", version, about = "Gateway protocol dispatch server")]
struct Cli {
    /// Path to a TOML config file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match cli.config.as_deref().map(load_config).transpose() {
        Ok(config) => config.unwrap_or_default(),
        Err(error) => {
            eprintln!("gateway-dispatch: {error}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(error) = logging::init(&config.observability) {
        eprintln!("gateway-dispatch: failed to initialise logging: {error}");
        return ExitCode::FAILURE;
    }

    match run(config).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(error) => {
            tracing::error!(error = %error, "Startup failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: GatewayConfig) -> Result<(), StartupError> {
    tracing::info!(
        bind_address = %config.listener.bind_address,
        monitoring = config.monitoring.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => {
                if let Err(error) = metrics::init_metrics(addr) {
                    tracing::error!(error = %error, "Failed to install metrics exporter");
                }
            }
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let config = Arc::new(config);
    let dispatcher = Dispatcher::builder(Arc::clone(&config))
        .routes(demo_routes()?)
        .middleware(RequestIdMiddleware)
        .build()?;

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let shutdown = Shutdown::new();
    GatewayServer::new(dispatcher)
        .run(listener, shutdown.subscribe())
        .await?;
    Ok(())
}

fn demo_routes() -> Result<RouteTable, StartupError> {
    let routes = RouteTable::builder()
        .route("health", Endpoint::function(health).named("health"))
        .route("echo/<name>", Endpoint::resource(Echo).named("echo"))
        .route("ws/echo", Endpoint::duplex(EchoSocket).named("echo_socket"))
        .build()?;
    Ok(routes)
}

async fn health(_request: Request, _path_variables: PathVariables) -> HandlerResult {
    Ok(Response::ok(json!({ "status": "ok" })))
}

struct Echo;

#[async_trait]
impl ResourceHandler for Echo {
    async fn get(&self, request: Request, path_variables: PathVariables) -> HandlerResult {
        let name = path_variables
            .get("name")
            .ok_or_else(|| ApiError::bad_request("missing name"))?;
        Ok(Response::ok(json!({
            "name": name,
            "query": request.query_params(),
        })))
    }

    async fn post(&self, request: Request, path_variables: PathVariables) -> HandlerResult {
        Ok(Response::ok(json!({
            "name": path_variables.get("name"),
            "data": request.data()?,
        })))
    }
}

struct EchoSocket;

#[async_trait]
impl DuplexHandler for EchoSocket {
    async fn receive(&self, connection: &mut DuplexConnection, message: Message) -> Result<(), HostError> {
        connection.send(message).await
    }
}
