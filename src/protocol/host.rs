//! Per-connection channel pair between the host and the dispatcher.

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;

use crate::error::HostError;
use crate::protocol::events::{InboundEvent, OutboundEvent};

/// Dispatcher side of a connection.
#[derive(Debug)]
pub struct HostIo {
    inbound: mpsc::Receiver<InboundEvent>,
    outbound: mpsc::Sender<OutboundEvent>,
}

/// Host side of a connection: feeds inbound events, drains outbound frames.
#[derive(Debug)]
pub struct HostSide {
    pub inbound: mpsc::Sender<InboundEvent>,
    pub outbound: mpsc::Receiver<OutboundEvent>,
}

impl HostIo {
    pub fn new(
        inbound: mpsc::Receiver<InboundEvent>,
        outbound: mpsc::Sender<OutboundEvent>,
    ) -> Self {
        Self { inbound, outbound }
    }

    /// Create a connected pair with `capacity` slots in each direction.
    pub fn pair(capacity: usize) -> (Self, HostSide) {
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);
        let (outbound_tx, outbound_rx) = mpsc::channel(capacity);
        (
            Self::new(inbound_rx, outbound_tx),
            HostSide {
                inbound: inbound_tx,
                outbound: outbound_rx,
            },
        )
    }

    /// Next inbound event, or `None` once the host dropped its sender.
    pub async fn receive(&mut self) -> Option<InboundEvent> {
        self.inbound.recv().await
    }

    pub async fn send(&self, event: OutboundEvent) -> Result<(), HostError> {
        self.outbound
            .send(event)
            .await
            .map_err(|_| HostError::Disconnected)
    }

    /// Pull body chunks until the final-chunk marker.
    ///
    /// Chunks are appended strictly in arrival order. Events that do not
    /// belong to a request body are skipped.
    pub async fn read_body(&mut self) -> Result<Bytes, HostError> {
        let mut body = BytesMut::new();
        loop {
            match self.receive().await {
                Some(InboundEvent::HttpRequest { body: chunk, more_body }) => {
                    body.extend_from_slice(&chunk);
                    if !more_body {
                        return Ok(body.freeze());
                    }
                }
                Some(InboundEvent::HttpDisconnect) | None => return Err(HostError::Disconnected),
                Some(other) => {
                    tracing::debug!(event = ?other, "Ignoring non-body event while reading request body");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_body_accumulates_chunks() {
        let (mut io, host) = HostIo::pair(8);
        for (chunk, more_body) in [("hel", true), ("lo ", true), ("world", false)] {
            host.inbound
                .send(InboundEvent::HttpRequest {
                    body: Bytes::from(chunk),
                    more_body,
                })
                .await
                .unwrap();
        }

        let body = io.read_body().await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn test_read_body_reports_disconnect() {
        let (mut io, host) = HostIo::pair(8);
        host.inbound
            .send(InboundEvent::HttpRequest {
                body: Bytes::from_static(b"partial"),
                more_body: true,
            })
            .await
            .unwrap();
        host.inbound.send(InboundEvent::HttpDisconnect).await.unwrap();

        assert_eq!(io.read_body().await, Err(HostError::Disconnected));
    }

    #[tokio::test]
    async fn test_read_body_ends_when_host_drops() {
        let (mut io, host) = HostIo::pair(8);
        drop(host);
        assert_eq!(io.read_body().await, Err(HostError::Disconnected));
    }
}
