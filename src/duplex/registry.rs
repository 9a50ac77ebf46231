//! Table of live duplex connections, owned by a single worker task.
//!
//! Every mutation arrives as a [`Command`] over a bounded mpsc channel, so
//! admits, removals, and deliveries are applied in arrival order without
//! locking. Removals issued from `Drop` use a separate unbounded channel so
//! they are never lost to a full queue.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};

use crate::duplex::broker::{Broker, BrokerError};
use crate::duplex::connection::{ConnectionId, Control};
use crate::duplex::event::{DuplexAction, DuplexEvent};
use crate::observability::metrics;
use crate::protocol::Message;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplex registry worker has stopped")]
    Stopped,

    #[error(transparent)]
    Broker(#[from] BrokerError),

    #[error("failed to encode duplex event: {0}")]
    Encode(#[from] serde_json::Error),
}

/// What the registry keeps per connection: enough to reach its loop.
#[derive(Debug, Clone)]
pub(crate) struct DuplexHandle {
    id: ConnectionId,
    control: mpsc::UnboundedSender<Control>,
}

impl DuplexHandle {
    pub(crate) fn new(id: ConnectionId, control: mpsc::UnboundedSender<Control>) -> Self {
        Self { id, control }
    }

    pub(crate) fn id(&self) -> ConnectionId {
        self.id
    }

    /// Hand work to the connection's loop. Fails once the loop is gone.
    pub(crate) fn deliver(&self, control: Control) -> Result<(), RegistryError> {
        self.control.send(control).map_err(|_| RegistryError::Stopped)
    }
}

#[derive(Debug)]
enum Command {
    Admit(DuplexHandle),
    Remove(ConnectionId),
    Deliver(DuplexEvent),
    Len(oneshot::Sender<usize>),
    Contains(ConnectionId, oneshot::Sender<bool>),
}

pub struct DuplexRegistry {
    connections: HashMap<ConnectionId, DuplexHandle>,
    commands: mpsc::Receiver<Command>,
    evictions: mpsc::UnboundedReceiver<ConnectionId>,
    /// Evicted ids whose `Admit` is still queued behind the eviction.
    evicted_early: HashSet<ConnectionId>,
}

impl DuplexRegistry {
    /// Start the worker and return a handle to it.
    ///
    /// With a broker, [`RegistryHandle::send_message`] and
    /// [`RegistryHandle::close_connection`] publish to `channel`; without one
    /// they are delivered locally.
    pub fn spawn(
        capacity: usize,
        broker: Option<Arc<dyn Broker>>,
        channel: impl Into<Arc<str>>,
    ) -> RegistryHandle {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let (evict_tx, evict_rx) = mpsc::unbounded_channel();
        let registry = Self {
            connections: HashMap::new(),
            commands: rx,
            evictions: evict_rx,
            evicted_early: HashSet::new(),
        };
        tokio::spawn(registry.run());

        RegistryHandle {
            commands: tx,
            evictions: evict_tx,
            broker,
            channel: channel.into(),
        }
    }

    async fn run(mut self) {
        tracing::debug!("Duplex registry worker started");
        loop {
            tokio::select! {
                biased;
                Some(id) = self.evictions.recv() => self.evict(id),
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => break,
                },
            }
        }
        tracing::debug!("Duplex registry worker stopped");
    }

    fn apply(&mut self, command: Command) {
        match command {
            Command::Admit(handle) => {
                let id = handle.id();
                if self.evicted_early.remove(&id) {
                    tracing::debug!(connection_id = %id, "Connection evicted before admission");
                    return;
                }
                tracing::debug!(connection_id = %id, "Connection admitted");
                self.connections.insert(id, handle);
                metrics::record_registry_size(self.connections.len());
            }
            Command::Remove(id) => {
                self.remove(id);
            }
            Command::Deliver(event) => self.deliver(event),
            Command::Len(reply) => {
                let _ = reply.send(self.connections.len());
            }
            Command::Contains(id, reply) => {
                let _ = reply.send(self.connections.contains_key(&id));
            }
        }
    }

    /// Removing an unknown id is a no-op.
    fn remove(&mut self, id: ConnectionId) -> bool {
        if self.connections.remove(&id).is_none() {
            return false;
        }
        tracing::debug!(connection_id = %id, "Connection removed");
        metrics::record_registry_size(self.connections.len());
        true
    }

    /// Evictions can overtake the `Admit` they follow, since they travel on
    /// their own channel. An unknown id is remembered so that admit is
    /// dropped when it arrives.
    fn evict(&mut self, id: ConnectionId) {
        if !self.remove(id) {
            self.evicted_early.insert(id);
        }
    }

    fn deliver(&mut self, event: DuplexEvent) {
        let id = event.connection_id;
        let Some(handle) = self.connections.get(&id) else {
            // Served by another process, or already gone.
            tracing::trace!(connection_id = %id, "Event for unknown connection ignored");
            return;
        };

        let control = match event.action {
            DuplexAction::Send { data } => Control::Send(Message::Text(data.to_string())),
            DuplexAction::Close { code } => Control::Close(code),
        };

        if handle.deliver(control).is_err() {
            tracing::debug!(connection_id = %id, "Connection loop gone, dropping entry");
            self.connections.remove(&id);
            metrics::record_registry_size(self.connections.len());
        }
    }
}

/// Cloneable access to the registry worker.
#[derive(Clone)]
pub struct RegistryHandle {
    commands: mpsc::Sender<Command>,
    evictions: mpsc::UnboundedSender<ConnectionId>,
    broker: Option<Arc<dyn Broker>>,
    channel: Arc<str>,
}

impl RegistryHandle {
    pub(crate) async fn admit(&self, handle: DuplexHandle) -> Result<(), RegistryError> {
        self.command(Command::Admit(handle)).await
    }

    pub(crate) async fn remove(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.command(Command::Remove(id)).await
    }

    /// Removal for paths that cannot await, e.g. `Drop`. Never waits for
    /// queue capacity; fails only once the worker has stopped.
    pub(crate) fn evict(&self, id: ConnectionId) -> Result<(), RegistryError> {
        self.evictions.send(id).map_err(|_| RegistryError::Stopped)
    }

    /// Number of connections currently admitted.
    pub async fn len(&self) -> Result<usize, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Len(tx)).await?;
        rx.await.map_err(|_| RegistryError::Stopped)
    }

    pub async fn is_empty(&self) -> Result<bool, RegistryError> {
        Ok(self.len().await? == 0)
    }

    pub async fn contains(&self, id: ConnectionId) -> Result<bool, RegistryError> {
        let (tx, rx) = oneshot::channel();
        self.command(Command::Contains(id, tx)).await?;
        rx.await.map_err(|_| RegistryError::Stopped)
    }

    /// Send `data` as JSON text to a connection, wherever it is served.
    pub async fn send_message(&self, id: ConnectionId, data: Value) -> Result<(), RegistryError> {
        self.publish(DuplexEvent::send(id, data)).await
    }

    /// Close a connection, wherever it is served.
    pub async fn close_connection(&self, id: ConnectionId, code: u16) -> Result<(), RegistryError> {
        self.publish(DuplexEvent::close(id, code)).await
    }

    async fn publish(&self, event: DuplexEvent) -> Result<(), RegistryError> {
        match &self.broker {
            Some(broker) => {
                let payload = serde_json::to_vec(&event)?;
                broker.publish(&self.channel, payload).await?;
                Ok(())
            }
            None => self.command(Command::Deliver(event)).await,
        }
    }

    /// Deliver an event received from the broker. Blocks the calling
    /// thread, so it must not run on the async runtime.
    pub(crate) fn deliver_blocking(&self, event: DuplexEvent) -> Result<(), RegistryError> {
        self.commands
            .blocking_send(Command::Deliver(event))
            .map_err(|_| RegistryError::Stopped)
    }

    async fn command(&self, command: Command) -> Result<(), RegistryError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| RegistryError::Stopped)
    }
}

impl std::fmt::Debug for RegistryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegistryHandle")
            .field("channel", &self.channel)
            .field("broker", &self.broker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn handle() -> (DuplexHandle, mpsc::UnboundedReceiver<Control>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (DuplexHandle::new(ConnectionId::new(), tx), rx)
    }

    #[tokio::test]
    async fn test_admit_and_remove() {
        let registry = DuplexRegistry::spawn(16, None, "events");
        let (conn, _rx) = handle();
        let id = conn.id();

        registry.admit(conn).await.unwrap();
        assert_eq!(registry.len().await.unwrap(), 1);
        assert!(registry.contains(id).await.unwrap());

        registry.remove(id).await.unwrap();
        assert!(registry.is_empty().await.unwrap());
        assert!(!registry.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let registry = DuplexRegistry::spawn(16, None, "events");
        let (first, _first_rx) = handle();
        let (second, _second_rx) = handle();
        let id = first.id();
        registry.admit(first).await.unwrap();
        registry.admit(second).await.unwrap();

        registry.remove(id).await.unwrap();
        registry.remove(id).await.unwrap();
        registry.remove(ConnectionId::new()).await.unwrap();

        assert_eq!(registry.len().await.unwrap(), 1);
        assert!(!registry.contains(id).await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_is_not_blocked_by_a_full_queue() {
        let registry = DuplexRegistry::spawn(1, None, "events");
        let (conn, _rx) = handle();
        let id = conn.id();

        // The worker has not been polled yet, so this admit fills the queue.
        registry.admit(conn).await.unwrap();
        registry.evict(id).unwrap();

        assert!(!registry.contains(id).await.unwrap());
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_evict_after_admission_removes_the_entry() {
        let registry = DuplexRegistry::spawn(4, None, "events");
        let (conn, _rx) = handle();
        let id = conn.id();
        registry.admit(conn).await.unwrap();
        assert!(registry.contains(id).await.unwrap());

        registry.evict(id).unwrap();
        registry.evict(id).unwrap();
        assert!(registry.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn test_local_delivery_reaches_the_connection_loop() {
        let registry = DuplexRegistry::spawn(16, None, "events");
        let (conn, mut rx) = handle();
        let id = conn.id();
        registry.admit(conn).await.unwrap();

        registry.send_message(id, json!({ "n": 1 })).await.unwrap();
        registry.close_connection(id, 4000).await.unwrap();

        assert_eq!(rx.recv().await, Some(Control::Send(Message::from(r#"{"n":1}"#))));
        assert_eq!(rx.recv().await, Some(Control::Close(4000)));
    }

    #[tokio::test]
    async fn test_unknown_connection_is_ignored() {
        let registry = DuplexRegistry::spawn(16, None, "events");
        registry
            .send_message(ConnectionId::new(), json!("nobody"))
            .await
            .unwrap();
        assert_eq!(registry.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_gone_loop_is_dropped_on_delivery() {
        let registry = DuplexRegistry::spawn(16, None, "events");
        let (conn, rx) = handle();
        let id = conn.id();
        registry.admit(conn).await.unwrap();
        drop(rx);

        registry.close_connection(id, 1000).await.unwrap();
        assert!(!registry.contains(id).await.unwrap());
    }
}
