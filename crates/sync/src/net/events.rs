use super::protocol::PlayerRow;

#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    Connected,
    IdentityReceived {
        identity: String,
    },
    Disconnected {
        reason: DisconnectReason,
    },
    Error {
        message: String,
    },
    ReconnectScheduled {
        attempt: u32,
        delay_secs: f64,
    },
    ReconnectFailed {
        attempts: u32,
    },
    PlayerUpdated(PlayerRow),
    InventoryRow {
        table: String,
        payload: String,
    },
    ReducerCompleted {
        request_id: u64,
        reducer: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    Requested,
    Closed { code: u16, reason: String },
    TransportError(String),
}

impl DisconnectReason {
    pub fn as_str(&self) -> &str {
        match self {
            DisconnectReason::Requested => "disconnected",
            DisconnectReason::Closed { reason, .. } => reason,
            DisconnectReason::TransportError(message) => message,
        }
    }
}
