//! Pub/sub boundary used to fan duplex events out across processes.
//!
//! The backing store itself (e.g. Redis) lives outside this crate; it plugs
//! in by implementing [`Broker`]. [`MemoryBroker`] covers single-process
//! deployments and tests.

use std::collections::HashMap;
use std::sync::{mpsc, Mutex};

use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BrokerError {
    #[error("broker connection closed")]
    Closed,

    #[error("broker transport error: {0}")]
    Transport(String),
}

#[async_trait]
pub trait Broker: Send + Sync {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError>;

    /// Open a blocking subscription. Called from the listener thread.
    fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, BrokerError>;
}

/// A blocking stream of payloads.
pub trait Subscription: Send {
    /// Block until the next payload; `None` ends the subscription.
    fn next_message(&mut self) -> Option<Vec<u8>>;
}

/// In-process broker backed by std channels.
#[derive(Debug, Default)]
pub struct MemoryBroker {
    subscribers: Mutex<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every subscriber, ending their subscriptions.
    pub fn shutdown(&self) {
        if let Ok(mut subscribers) = self.subscribers.lock() {
            subscribers.clear();
        }
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, channel: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        let mut subscribers = self
            .subscribers
            .lock()
            .map_err(|_| BrokerError::Transport("subscriber table poisoned".to_owned()))?;

        if let Some(senders) = subscribers.get_mut(channel) {
            senders.retain(|sender| sender.send(payload.clone()).is_ok());
        }
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> Result<Box<dyn Subscription>, BrokerError> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .map_err(|_| BrokerError::Transport("subscriber table poisoned".to_owned()))?
            .entry(channel.to_owned())
            .or_default()
            .push(tx);
        Ok(Box::new(MemorySubscription { rx }))
    }
}

struct MemorySubscription {
    rx: mpsc::Receiver<Vec<u8>>,
}

impl Subscription for MemorySubscription {
    fn next_message(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_every_subscriber_of_the_channel() {
        let broker = MemoryBroker::new();
        let mut first = broker.subscribe("events").unwrap();
        let mut second = broker.subscribe("events").unwrap();
        let mut other = broker.subscribe("other").unwrap();

        broker.publish("events", b"hello".to_vec()).await.unwrap();
        broker.shutdown();

        assert_eq!(first.next_message(), Some(b"hello".to_vec()));
        assert_eq!(second.next_message(), Some(b"hello".to_vec()));
        assert_eq!(other.next_message(), None);
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_ok() {
        let broker = MemoryBroker::new();
        assert!(broker.publish("nobody", Vec::new()).await.is_ok());
    }
}
