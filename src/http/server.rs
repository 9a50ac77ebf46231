//! Host adapter: serves real HTTP and WebSocket traffic through the
//! dispatcher.
//!
//! # Responsibilities
//! - Create the Axum router with a single fallback handler
//! - Translate each request into a [`Scope`] plus a [`HostIo`] channel pair
//! - Stream the request body into `HttpRequest` chunks
//! - Turn the two response frames back into an Axum response
//! - Hand WebSocket upgrades to the frame bridge in `websocket.rs`

use std::net::SocketAddr;

use axum::{
    body::{Body, Bytes},
    extract::{
        ws::{rejection::WebSocketUpgradeRejection, WebSocketUpgrade},
        ConnectInfo, Request, State,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Router,
};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::dispatch::Dispatcher;
use crate::http::websocket;
use crate::lifecycle::wait_for_signal;
use crate::protocol::{HostIo, InboundEvent, OutboundEvent, Scope};

/// Slots per direction in each connection's channel pair.
pub(crate) const CHANNEL_CAPACITY: usize = 32;

#[derive(Clone)]
struct AppState {
    dispatcher: Dispatcher,
    max_body_bytes: usize,
}

pub struct GatewayServer {
    router: Router,
}

impl GatewayServer {
    pub fn new(dispatcher: Dispatcher) -> Self {
        let state = AppState {
            max_body_bytes: dispatcher.config().listener.max_body_bytes,
            dispatcher,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(gateway_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Serve until Ctrl-C or until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Gateway server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(wait_for_signal(shutdown))
            .await?;

        tracing::info!("Gateway server stopped");
        Ok(())
    }
}

async fn gateway_handler(
    State(state): State<AppState>,
    ConnectInfo(client): ConnectInfo<SocketAddr>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();

    if let Ok(upgrade) = upgrade {
        let scope = scope_from_parts(Scope::websocket(parts.uri.path()), &parts, client);
        let dispatcher = state.dispatcher.clone();
        return upgrade.on_upgrade(move |socket| websocket::bridge(dispatcher, scope, socket));
    }

    let scope = scope_from_parts(
        Scope::http(parts.method.clone(), parts.uri.path()),
        &parts,
        client,
    );
    serve_request(state, scope, body).await
}

fn scope_from_parts(mut scope: Scope, parts: &Parts, client: SocketAddr) -> Scope {
    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => scope = scope.with_header(name.as_str(), value),
            Err(_) => tracing::debug!(header = %name, "Dropping non-ASCII header value"),
        }
    }
    if let Some(query) = parts.uri.query() {
        scope = scope.with_query(query);
    }
    scope.with_client(client)
}

async fn serve_request(state: AppState, scope: Scope, body: Body) -> Response {
    let (io, mut host) = HostIo::pair(CHANNEL_CAPACITY);
    let dispatcher = state.dispatcher;
    let task = tokio::spawn(async move { dispatcher.dispatch(scope, io).await });

    let mut stream = body.into_data_stream();
    let mut received = 0usize;
    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(error) => {
                tracing::debug!(error = %error, "Request body stream failed");
                let _ = host.inbound.send(InboundEvent::HttpDisconnect).await;
                return StatusCode::BAD_REQUEST.into_response();
            }
        };

        received += chunk.len();
        if received > state.max_body_bytes {
            task.abort();
            return StatusCode::PAYLOAD_TOO_LARGE.into_response();
        }

        let event = InboundEvent::HttpRequest {
            body: chunk,
            more_body: true,
        };
        if host.inbound.send(event).await.is_err() {
            break;
        }
    }
    let _ = host
        .inbound
        .send(InboundEvent::HttpRequest {
            body: Bytes::new(),
            more_body: false,
        })
        .await;

    let start = host.outbound.recv().await;
    let body = host.outbound.recv().await;
    match (start, body) {
        (
            Some(OutboundEvent::HttpResponseStart { status, headers }),
            Some(OutboundEvent::HttpResponseBody { body }),
        ) => {
            let mut builder = axum::http::Response::builder().status(status);
            for (name, value) in &headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            builder
                .body(body.map(Body::from).unwrap_or_else(Body::empty))
                .unwrap_or_else(|error| {
                    tracing::error!(error = %error, "Dispatcher produced an invalid response head");
                    StatusCode::INTERNAL_SERVER_ERROR.into_response()
                })
        }
        _ => {
            tracing::error!("Dispatch ended without framing a response");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
