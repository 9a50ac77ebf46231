//! WebSocket frame bridge.
//!
//! # Data Flow
//! ```text
//! Client ←── WebSocket frames ──→ bridge ←── InboundEvent / OutboundEvent ──→ Dispatcher
//! ```
//!
//! Axum completes the handshake before the dispatcher sees the connection,
//! so `WebSocketAccept` has nothing left to do here. Refusals therefore
//! reach the client as an immediate close frame. Ping/pong is handled by
//! Axum.

use axum::extract::ws::{CloseFrame, Message as WsMessage, Utf8Bytes, WebSocket};
use futures_util::{SinkExt, StreamExt};

use crate::dispatch::Dispatcher;
use crate::http::server::CHANNEL_CAPACITY;
use crate::protocol::{close_code, HostIo, HostSide, InboundEvent, Message, OutboundEvent, Scope};

pub(crate) async fn bridge(dispatcher: Dispatcher, scope: Scope, socket: WebSocket) {
    let (io, host) = HostIo::pair(CHANNEL_CAPACITY);
    let HostSide {
        inbound,
        mut outbound,
    } = host;
    let (mut sink, mut stream) = socket.split();

    let path = scope.path.clone();
    if inbound.send(InboundEvent::WebSocketConnect).await.is_err() {
        return;
    }
    let dispatch = tokio::spawn(async move { dispatcher.dispatch(scope, io).await });

    let reader = tokio::spawn(async move {
        while let Some(frame) = stream.next().await {
            let event = match frame {
                Ok(WsMessage::Text(text)) => {
                    InboundEvent::WebSocketReceive(Message::Text(text.as_str().to_owned()))
                }
                Ok(WsMessage::Binary(data)) => InboundEvent::WebSocketReceive(Message::Binary(data)),
                Ok(WsMessage::Close(frame)) => {
                    let code = frame.map_or(close_code::NORMAL_CLOSURE, |frame| frame.code);
                    let _ = inbound.send(InboundEvent::WebSocketDisconnect { code }).await;
                    return;
                }
                Ok(WsMessage::Ping(_)) | Ok(WsMessage::Pong(_)) => continue,
                Err(error) => {
                    tracing::debug!(error = %error, "WebSocket read failed");
                    break;
                }
            };
            if inbound.send(event).await.is_err() {
                return;
            }
        }
        let _ = inbound
            .send(InboundEvent::WebSocketDisconnect {
                code: close_code::ABNORMAL_CLOSURE,
            })
            .await;
    });

    while let Some(event) = outbound.recv().await {
        let frame = match event {
            OutboundEvent::WebSocketAccept => continue,
            OutboundEvent::WebSocketSend(Message::Text(text)) => WsMessage::Text(text.into()),
            OutboundEvent::WebSocketSend(Message::Binary(data)) => WsMessage::Binary(data),
            OutboundEvent::WebSocketClose { code } => {
                let close = WsMessage::Close(Some(CloseFrame {
                    code,
                    reason: Utf8Bytes::from_static(""),
                }));
                let _ = sink.send(close).await;
                break;
            }
            other => {
                tracing::debug!(path = %path, event = ?other, "Ignoring non-WebSocket frame");
                continue;
            }
        };
        if sink.send(frame).await.is_err() {
            break;
        }
    }
    drop(outbound);
    let _ = sink.close().await;

    if let Ok(Err(error)) = dispatch.await {
        tracing::debug!(path = %path, error = %error, "Duplex dispatch ended early");
    }
    reader.abort();
}
