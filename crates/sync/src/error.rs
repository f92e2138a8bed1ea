use thiserror::Error;

/// Failure to decode a single inbound message. Logged and dropped by the
/// connection manager; never surfaced to callers.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("malformed json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing field `{0}`")]
    MissingField(&'static str),

    #[error("unknown message type `{0}`")]
    UnknownMessage(String),

    #[error("invalid `{table}` row: {reason}")]
    InvalidRow { table: String, reason: String },
}
