//! A single admitted (or admitting) duplex connection.

use std::fmt;

use axum::http::Extensions;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::duplex::registry::{DuplexHandle, RegistryHandle};
use crate::error::HostError;
use crate::protocol::{close_code, HostIo, InboundEvent, Message, OutboundEvent, Scope};
use crate::routing::PathVariables;

/// Process-unique connection identifier, stable for the connection's life.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplexState {
    Pending,
    Accepted,
    Closed,
}

/// Work requested through the registry, executed by the connection's loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Control {
    Send(Message),
    Close(u16),
}

/// What woke the receive loop.
#[derive(Debug)]
pub(crate) enum Signal {
    Message(Message),
    Control(Control),
    Disconnected { code: u16 },
}

pub struct DuplexConnection {
    id: ConnectionId,
    scope: Scope,
    path_variables: PathVariables,
    extensions: Extensions,
    host: HostIo,
    control_tx: mpsc::UnboundedSender<Control>,
    control_rx: mpsc::UnboundedReceiver<Control>,
    registry: Option<RegistryHandle>,
    state: DuplexState,
}

impl DuplexConnection {
    pub fn new(scope: Scope, host: HostIo) -> Self {
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        Self {
            id: ConnectionId::new(),
            scope,
            path_variables: PathVariables::new(),
            extensions: Extensions::new(),
            host,
            control_tx,
            control_rx,
            registry: None,
            state: DuplexState::Pending,
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn scope(&self) -> &Scope {
        &self.scope
    }

    pub fn path(&self) -> &str {
        &self.scope.path
    }

    pub fn path_variables(&self) -> &PathVariables {
        &self.path_variables
    }

    pub(crate) fn set_path_variables(&mut self, path_variables: PathVariables) {
        self.path_variables = path_variables;
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }

    pub fn state(&self) -> DuplexState {
        self.state
    }

    pub fn is_closed(&self) -> bool {
        self.state == DuplexState::Closed
    }

    /// The registry this connection is admitted to, for reaching other
    /// connections.
    pub fn registry(&self) -> Option<&RegistryHandle> {
        self.registry.as_ref()
    }

    pub(crate) fn attach_registry(&mut self, registry: RegistryHandle) {
        self.registry = Some(registry);
    }

    pub(crate) fn handle(&self) -> DuplexHandle {
        DuplexHandle::new(self.id, self.control_tx.clone())
    }

    /// Complete the handshake. Repeated calls are no-ops.
    pub async fn accept(&mut self) -> Result<(), HostError> {
        if self.state != DuplexState::Pending {
            return Ok(());
        }
        self.host.send(OutboundEvent::WebSocketAccept).await?;
        self.state = DuplexState::Accepted;
        Ok(())
    }

    pub async fn send(&self, message: Message) -> Result<(), HostError> {
        if self.is_closed() {
            return Err(HostError::Disconnected);
        }
        self.host.send(OutboundEvent::WebSocketSend(message)).await
    }

    pub async fn send_text(&self, text: impl Into<String>) -> Result<(), HostError> {
        self.send(Message::Text(text.into())).await
    }

    pub async fn send_json(&self, value: &Value) -> Result<(), HostError> {
        self.send(Message::Text(value.to_string())).await
    }

    /// Send a close frame. Only the first call reaches the host.
    pub async fn close(&mut self, code: u16) -> Result<(), HostError> {
        if self.is_closed() {
            return Ok(());
        }
        self.state = DuplexState::Closed;
        self.host.send(OutboundEvent::WebSocketClose { code }).await
    }

    /// Wait for the next inbound message, registry instruction, or
    /// disconnect.
    pub(crate) async fn next_signal(&mut self) -> Signal {
        let id = self.id;
        loop {
            tokio::select! {
                event = self.host.receive() => match event {
                    Some(InboundEvent::WebSocketReceive(message)) => return Signal::Message(message),
                    Some(InboundEvent::WebSocketDisconnect { code }) => {
                        return Signal::Disconnected { code };
                    }
                    Some(other) => {
                        tracing::debug!(connection_id = %id, event = ?other, "Ignoring inbound event");
                    }
                    None => {
                        return Signal::Disconnected {
                            code: close_code::ABNORMAL_CLOSURE,
                        };
                    }
                },
                Some(control) = self.control_rx.recv() => return Signal::Control(control),
            }
        }
    }

    /// Mark the connection closed after the peer went away.
    pub(crate) fn mark_closed(&mut self) {
        self.state = DuplexState::Closed;
    }
}

impl fmt::Debug for DuplexConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DuplexConnection")
            .field("id", &self.id)
            .field("path", &self.scope.path)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (DuplexConnection, crate::protocol::HostSide) {
        let (io, host) = HostIo::pair(8);
        (DuplexConnection::new(Scope::websocket("/ws"), io), host)
    }

    #[tokio::test]
    async fn test_accept_is_sent_once() {
        let (mut conn, mut host) = connection();
        conn.accept().await.unwrap();
        conn.accept().await.unwrap();
        conn.close(close_code::NORMAL_CLOSURE).await.unwrap();

        assert_eq!(host.outbound.recv().await, Some(OutboundEvent::WebSocketAccept));
        assert_eq!(
            host.outbound.recv().await,
            Some(OutboundEvent::WebSocketClose { code: 1000 })
        );
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_sends() {
        let (mut conn, mut host) = connection();
        conn.close(1000).await.unwrap();
        conn.close(1011).await.unwrap();

        assert_eq!(conn.send_text("late").await, Err(HostError::Disconnected));
        drop(conn);
        assert_eq!(
            host.outbound.recv().await,
            Some(OutboundEvent::WebSocketClose { code: 1000 })
        );
        assert_eq!(host.outbound.recv().await, None);
    }

    #[tokio::test]
    async fn test_next_signal_skips_handshake_and_maps_drop_to_abnormal() {
        let (mut conn, host) = connection();
        host.inbound.send(InboundEvent::WebSocketConnect).await.unwrap();
        host.inbound
            .send(InboundEvent::WebSocketReceive(Message::from("ping")))
            .await
            .unwrap();
        drop(host);

        assert!(matches!(
            conn.next_signal().await,
            Signal::Message(Message::Text(text)) if text == "ping"
        ));
        assert!(matches!(
            conn.next_signal().await,
            Signal::Disconnected { code: 1006 }
        ));
    }

    #[tokio::test]
    async fn test_control_wakes_the_loop() {
        let (mut conn, _host) = connection();
        conn.handle().deliver(Control::Close(4000)).unwrap();

        assert!(matches!(
            conn.next_signal().await,
            Signal::Control(Control::Close(4000))
        ));
    }
}
