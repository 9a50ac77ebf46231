//! Events fanned out to duplex connections through the broker.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::duplex::connection::ConnectionId;

/// An instruction addressed to one connection, possibly served by another
/// process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplexEvent {
    pub connection_id: ConnectionId,
    #[serde(flatten)]
    pub action: DuplexAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DuplexAction {
    /// Send `data` as a JSON text message.
    Send { data: Value },
    Close { code: u16 },
}

impl DuplexEvent {
    pub fn send(connection_id: ConnectionId, data: Value) -> Self {
        Self {
            connection_id,
            action: DuplexAction::Send { data },
        }
    }

    pub fn close(connection_id: ConnectionId, code: u16) -> Self {
        Self {
            connection_id,
            action: DuplexAction::Close { code },
        }
    }
}
