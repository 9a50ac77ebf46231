//! Background thread forwarding broker events into the registry.

use std::sync::Arc;
use std::thread;

use crate::duplex::broker::Broker;
use crate::duplex::event::DuplexEvent;
use crate::duplex::registry::{RegistryError, RegistryHandle};
use crate::error::StartupError;

/// Subscribe to `channel` and start the listener thread.
///
/// The subscription is opened before this returns, so events published
/// afterwards are never missed. The thread ends when the subscription ends
/// or the registry worker stops.
pub fn spawn_listener(
    broker: Arc<dyn Broker>,
    channel: &str,
    registry: RegistryHandle,
) -> Result<thread::JoinHandle<()>, StartupError> {
    let mut subscription = broker.subscribe(channel)?;
    let channel = channel.to_owned();

    let handle = thread::Builder::new()
        .name("duplex-listener".to_owned())
        .spawn(move || {
            tracing::info!(channel = %channel, "Duplex listener subscribed");
            while let Some(payload) = subscription.next_message() {
                let event: DuplexEvent = match serde_json::from_slice(&payload) {
                    Ok(event) => event,
                    Err(error) => {
                        tracing::warn!(channel = %channel, error = %error, "Discarding malformed duplex event");
                        continue;
                    }
                };

                if let Err(RegistryError::Stopped) = registry.deliver_blocking(event) {
                    break;
                }
            }
            tracing::info!(channel = %channel, "Duplex listener stopped");
        })?;

    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use serde_json::json;
    use tokio::sync::mpsc;

    use crate::duplex::broker::MemoryBroker;
    use crate::duplex::connection::{ConnectionId, Control};
    use crate::duplex::registry::{DuplexHandle, DuplexRegistry};
    use crate::protocol::Message;

    #[tokio::test]
    async fn test_published_event_reaches_local_connection() {
        let broker = Arc::new(MemoryBroker::new());
        let registry = DuplexRegistry::spawn(16, Some(broker.clone()), "events");
        let listener = spawn_listener(broker.clone(), "events", registry.clone()).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = ConnectionId::new();
        registry.admit(DuplexHandle::new(id, tx)).await.unwrap();

        broker.publish("events", b"not json".to_vec()).await.unwrap();
        registry.send_message(id, json!("hi")).await.unwrap();

        let control = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap();
        assert_eq!(control, Some(Control::Send(Message::from("\"hi\""))));

        broker.shutdown();
        tokio::task::spawn_blocking(move || listener.join())
            .await
            .unwrap()
            .unwrap();
    }
}
