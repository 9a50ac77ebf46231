//! Frames exchanged with the host.

use bytes::Bytes;
use serde::Serialize;

/// Close codes sent when a duplex connection is refused or torn down.
pub mod close_code {
    /// No route matched, or middleware refused admission.
    pub const NORMAL_CLOSURE: u16 = 1000;
    /// Peer went away without a close frame.
    pub const ABNORMAL_CLOSURE: u16 = 1006;
    /// The handler failed unexpectedly.
    pub const INTERNAL_ERROR: u16 = 1011;
    /// The route resolved to an endpoint that cannot serve duplex traffic.
    pub const BAD_GATEWAY: u16 = 1014;
}

/// A duplex payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Text(String),
    Binary(Bytes),
}

impl Message {
    /// Serialize `value` into a text message.
    pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, serde_json::Error> {
        serde_json::to_string(value).map(Self::Text)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Binary(_) => None,
        }
    }
}

impl From<String> for Message {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for Message {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

/// Events pulled from the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    /// A body chunk; `more_body == false` marks the final one.
    HttpRequest { body: Bytes, more_body: bool },
    /// The client went away before the request completed.
    HttpDisconnect,
    /// Duplex handshake request.
    WebSocketConnect,
    WebSocketReceive(Message),
    WebSocketDisconnect { code: u16 },
}

/// Events pushed to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundEvent {
    HttpResponseStart {
        status: u16,
        headers: Vec<(String, String)>,
    },
    /// `None` frames a bodyless response.
    HttpResponseBody { body: Option<Bytes> },
    WebSocketAccept,
    WebSocketSend(Message),
    WebSocketClose { code: u16 },
}
