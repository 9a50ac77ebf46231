//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use bytes::Bytes;
use tokio::task::JoinHandle;

use gateway_dispatch::config::GatewayConfig;
use gateway_dispatch::{
    ApiError, Dispatcher, DuplexConnection, HostError, HostIo, HostSide, InboundEvent, Middleware,
    OutboundEvent, Request, Response, Scope,
};

pub const TIMEOUT: Duration = Duration::from_secs(5);

pub type Log = Arc<Mutex<Vec<String>>>;

pub fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

pub fn entries(log: &Log) -> Vec<String> {
    log.lock().unwrap().clone()
}

pub fn config() -> Arc<GatewayConfig> {
    Arc::new(GatewayConfig::default())
}

/// Middleware that records each hook into a shared log.
pub struct Recorder {
    pub id: usize,
    pub log: Log,
    /// Refuse the request (or duplex admission) with `403`.
    pub refuse: bool,
}

impl Recorder {
    pub fn new(id: usize, log: &Log) -> Self {
        Self {
            id,
            log: Arc::clone(log),
            refuse: false,
        }
    }

    pub fn refusing(id: usize, log: &Log) -> Self {
        Self {
            refuse: true,
            ..Self::new(id, log)
        }
    }

    fn push(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl Middleware for Recorder {
    async fn before(&self, request: Request) -> Result<Request, ApiError> {
        self.push(format!("before:{}", self.id));
        if self.refuse {
            return Err(ApiError::forbidden("refused"));
        }
        Ok(request)
    }

    async fn after(&self, response: Response) -> Result<Response, ApiError> {
        self.push(format!("after:{}", self.id));
        Ok(response)
    }

    async fn before_duplex(&self, _connection: &mut DuplexConnection) -> Result<(), ApiError> {
        self.push(format!("before_duplex:{}", self.id));
        if self.refuse {
            return Err(ApiError::forbidden("refused"));
        }
        Ok(())
    }

    async fn after_duplex(&self, _connection: &DuplexConnection) -> Result<(), ApiError> {
        self.push(format!("after_duplex:{}", self.id));
        Ok(())
    }
}

/// The two frames of one HTTP response.
#[derive(Debug)]
pub struct Framed {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl Framed {
    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(self.body.as_ref().expect("response has a body")).unwrap()
    }
}

/// Feed `body` as one final chunk and collect the response frames.
pub async fn send_request(dispatcher: &Dispatcher, scope: Scope, body: &'static [u8]) -> Framed {
    let (io, mut host) = HostIo::pair(8);
    host.inbound
        .send(InboundEvent::HttpRequest {
            body: Bytes::from_static(body),
            more_body: false,
        })
        .await
        .unwrap();

    let result = tokio::time::timeout(TIMEOUT, dispatcher.dispatch(scope, io))
        .await
        .expect("dispatch finished");
    assert_eq!(result, Ok(()));

    let start = host.outbound.recv().await.expect("start frame");
    let body = host.outbound.recv().await.expect("body frame");
    assert_eq!(host.outbound.recv().await, None, "exactly two frames");

    match (start, body) {
        (
            OutboundEvent::HttpResponseStart { status, headers },
            OutboundEvent::HttpResponseBody { body },
        ) => Framed {
            status,
            headers,
            body,
        },
        other => panic!("unexpected frames: {other:?}"),
    }
}

/// Start a duplex dispatch on its own task.
pub fn open_duplex(
    dispatcher: &Dispatcher,
    scope: Scope,
) -> (JoinHandle<Result<(), HostError>>, HostSide) {
    let (io, host) = HostIo::pair(8);
    let dispatcher = dispatcher.clone();
    let task = tokio::spawn(async move { dispatcher.dispatch(scope, io).await });
    (task, host)
}

pub async fn next_frame(host: &mut HostSide) -> Option<OutboundEvent> {
    tokio::time::timeout(TIMEOUT, host.outbound.recv())
        .await
        .expect("frame arrived in time")
}

/// Poll `check` until it holds or the timeout elapses.
pub async fn eventually<F, Fut>(mut check: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let deadline = tokio::time::Instant::now() + TIMEOUT;
    while tokio::time::Instant::now() < deadline {
        if check().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within {TIMEOUT:?}");
}
