//! End-to-end tests through the Axum host adapter.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio_tungstenite::{connect_async, tungstenite};

use gateway_dispatch::config::GatewayConfig;
use gateway_dispatch::routing::HandlerResult;
use gateway_dispatch::{
    Dispatcher, DuplexConnection, DuplexHandler, Endpoint, GatewayServer, HostError, Message,
    PathVariables, Request, Response, RouteTable, Shutdown,
};

mod common;

async fn greet(request: Request, vars: PathVariables) -> HandlerResult {
    Ok(Response::ok(json!({
        "name": vars.get("name"),
        "data": request.data()?,
    })))
}

struct Echo;

#[async_trait]
impl DuplexHandler for Echo {
    async fn receive(&self, connection: &mut DuplexConnection, message: Message) -> Result<(), HostError> {
        connection.send(message).await
    }
}

async fn start(config: GatewayConfig) -> (SocketAddr, Shutdown) {
    let routes = RouteTable::builder()
        .route("greet/<name>", Endpoint::function(greet))
        .route("ws/echo", Endpoint::duplex(Echo))
        .build()
        .unwrap();
    let dispatcher = Dispatcher::new(Arc::new(config), routes).unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(dispatcher);
    let signal = shutdown.subscribe();
    tokio::spawn(async move { server.run(listener, signal).await });
    (addr, shutdown)
}

#[tokio::test]
async fn test_http_round_trip() {
    let (addr, shutdown) = start(GatewayConfig::default()).await;
    let client = reqwest::Client::new();

    let response = client
        .post(format!("http://{addr}/greet/ada?x=1"))
        .json(&json!({ "lang": "rust" }))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "application/json"
    );
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "name": "ada", "data": { "lang": "rust" } }));

    let response = client
        .get(format!("http://{addr}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({ "detail": "Not Found" }));

    shutdown.trigger();
}

#[tokio::test]
async fn test_oversized_body_is_rejected() {
    let mut config = GatewayConfig::default();
    config.listener.max_body_bytes = 8;
    let (addr, shutdown) = start(config).await;

    let response = reqwest::Client::new()
        .post(format!("http://{addr}/greet/ada"))
        .body("this body is far too long")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    shutdown.trigger();
}

#[tokio::test]
async fn test_websocket_echo_and_refusal() {
    let (addr, shutdown) = start(GatewayConfig::default()).await;

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/echo")).await.unwrap();
    socket
        .send(tungstenite::Message::Text("ping".into()))
        .await
        .unwrap();
    let reply = tokio::time::timeout(common::TIMEOUT, socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert_eq!(reply.to_text().unwrap(), "ping");
    socket.close(None).await.unwrap();

    let (mut socket, _) = connect_async(format!("ws://{addr}/ws/unknown")).await.unwrap();
    let frame = tokio::time::timeout(common::TIMEOUT, socket.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    match frame {
        tungstenite::Message::Close(Some(close)) => assert_eq!(u16::from(close.code), 1000),
        other => panic!("expected close frame, got {other:?}"),
    }

    shutdown.trigger();
}
