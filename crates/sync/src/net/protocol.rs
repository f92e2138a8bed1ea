use glam::Vec3;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::snapshot::{DEFAULT_HEALTH, Rotator, SnapshotFlags, StateSnapshot};

pub const PLAYER_TABLE: &str = "player";
pub const INVENTORY_TABLES: &[&str] = &["inventory_item", "item_definition", "world_item"];

pub const UPDATE_TRANSFORM_REDUCER: &str = "update_player_transform";

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    IdentityToken {
        identity: String,
        token: Option<String>,
    },
    SubscriptionUpdate(Vec<TableRow>),
    TransactionUpdate(Vec<TableRow>),
    CallResponse {
        request_id: u64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableRow {
    pub table: String,
    pub fields: Value,
}

#[derive(Deserialize)]
struct IdentityBody {
    identity: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Deserialize)]
struct UpdatesBody {
    #[serde(default)]
    updates: Vec<Value>,
}

#[derive(Deserialize)]
struct CallResponseBody {
    request_id: u64,
}

impl ServerMessage {
    /// Parses either the tagged form `{ "type": "TransactionUpdate", ... }` or
    /// the wrapped form `{ "TransactionUpdate": { ... } }`.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: Value = serde_json::from_str(text)?;
        let Value::Object(map) = value else {
            return Err(ProtocolError::MissingField("type"));
        };

        if let Some(kind) = map.get("type").and_then(Value::as_str) {
            let kind = kind.to_owned();
            return Self::from_body(&kind, Value::Object(map));
        }

        match map.into_iter().next() {
            Some((kind, body)) if body.is_object() => Self::from_body(&kind, body),
            Some((kind, _)) => Err(ProtocolError::UnknownMessage(kind)),
            None => Err(ProtocolError::MissingField("type")),
        }
    }

    fn from_body(kind: &str, body: Value) -> Result<Self, ProtocolError> {
        match kind {
            "IdentityToken" | "identity_token" => {
                let body: IdentityBody = serde_json::from_value(body)?;
                Ok(Self::IdentityToken {
                    identity: body.identity,
                    token: body.token,
                })
            }
            "SubscriptionUpdate" | "subscription_update" => {
                Ok(Self::SubscriptionUpdate(parse_rows(body)?))
            }
            "TransactionUpdate" | "transaction_update" => {
                Ok(Self::TransactionUpdate(parse_rows(body)?))
            }
            "CallResponse"
            | "call_response"
            | "OneOffQueryResponse"
            | "one_off_query_response" => {
                let body: CallResponseBody = serde_json::from_value(body)?;
                Ok(Self::CallResponse {
                    request_id: body.request_id,
                })
            }
            other => Err(ProtocolError::UnknownMessage(other.to_owned())),
        }
    }
}

fn parse_rows(body: Value) -> Result<Vec<TableRow>, ProtocolError> {
    let body: UpdatesBody = serde_json::from_value(body)?;

    body.updates
        .into_iter()
        .map(|fields| {
            let table = fields
                .get("table")
                .and_then(Value::as_str)
                .ok_or(ProtocolError::MissingField("table"))?
                .to_owned();
            Ok(TableRow { table, fields })
        })
        .collect()
}

fn default_health() -> f32 {
    DEFAULT_HEALTH
}

fn default_online() -> bool {
    true
}

/// Row of the `player` table. Accepts both the client field names and the
/// server schema's short names.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PlayerRow {
    pub identity: String,
    #[serde(alias = "pos_x")]
    pub position_x: f32,
    #[serde(alias = "pos_y")]
    pub position_y: f32,
    #[serde(alias = "pos_z")]
    pub position_z: f32,
    #[serde(default, alias = "rot_pitch")]
    pub rotation_pitch: f32,
    #[serde(default, alias = "rot_yaw")]
    pub rotation_yaw: f32,
    #[serde(default, alias = "rot_roll")]
    pub rotation_roll: f32,
    #[serde(default = "default_health")]
    pub health: f32,
    #[serde(default)]
    pub is_attacking: bool,
    #[serde(default = "default_online")]
    pub is_online: bool,
    #[serde(default)]
    pub timestamp: Option<f64>,
}

impl PlayerRow {
    pub fn from_row(row: &TableRow) -> Result<Self, ProtocolError> {
        PlayerRow::deserialize(&row.fields).map_err(|e| ProtocolError::InvalidRow {
            table: row.table.clone(),
            reason: e.to_string(),
        })
    }

    pub fn position(&self) -> Vec3 {
        Vec3::new(self.position_x, self.position_y, self.position_z)
    }

    pub fn rotator(&self) -> Rotator {
        Rotator::new(self.rotation_pitch, self.rotation_yaw, self.rotation_roll)
    }

    pub fn to_snapshot(&self, fallback_time: f64) -> StateSnapshot {
        let mut flags = SnapshotFlags::empty();
        flags.set(SnapshotFlags::ATTACKING, self.is_attacking);

        StateSnapshot {
            position: self.position(),
            rotation: self.rotator().to_quat(),
            health: self.health,
            flags,
            timestamp: self.timestamp.unwrap_or(fallback_time),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ClientMessage {
    Call {
        call: String,
        args: Vec<String>,
        request_id: u64,
    },
    Subscribe {
        subscribe: String,
    },
}

impl ClientMessage {
    pub fn encode(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

pub fn table_query(table: &str) -> String {
    format!("SELECT * FROM {}", table)
}

pub fn is_inventory_table(table: &str) -> bool {
    INVENTORY_TABLES.contains(&table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_tagged_identity() {
        let msg = ServerMessage::parse(r#"{"type":"IdentityToken","identity":"abc"}"#).unwrap();
        assert_eq!(
            msg,
            ServerMessage::IdentityToken {
                identity: "abc".into(),
                token: None
            }
        );
    }

    #[test]
    fn test_parses_wrapped_identity_with_token() {
        let msg = ServerMessage::parse(r#"{"IdentityToken":{"identity":"abc","token":"t0k"}}"#)
            .unwrap();
        assert_eq!(
            msg,
            ServerMessage::IdentityToken {
                identity: "abc".into(),
                token: Some("t0k".into())
            }
        );
    }

    #[test]
    fn test_parses_transaction_rows() {
        let text = r#"{"type":"TransactionUpdate","updates":[
            {"table":"player","identity":"p1","position_x":1.0,"position_y":2.0,"position_z":3.0,"is_online":true},
            {"table":"inventory_item","id":7,"quantity":2}
        ]}"#;

        let ServerMessage::TransactionUpdate(rows) = ServerMessage::parse(text).unwrap() else {
            panic!("expected TransactionUpdate");
        };
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].table, "player");

        let player = PlayerRow::from_row(&rows[0]).unwrap();
        assert_eq!(player.position(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(player.health, DEFAULT_HEALTH);
    }

    #[test]
    fn test_player_row_accepts_server_field_names() {
        let row = TableRow {
            table: "player".into(),
            fields: serde_json::json!({
                "table": "player",
                "identity": "p2",
                "pos_x": 4.0, "pos_y": 5.0, "pos_z": 6.0,
                "rot_yaw": 90.0,
                "is_attacking": true,
                "is_online": false,
                "timestamp": 12.5
            }),
        };

        let player = PlayerRow::from_row(&row).unwrap();
        let snapshot = player.to_snapshot(0.0);

        assert!(!player.is_online);
        assert_eq!(snapshot.timestamp, 12.5);
        assert!(snapshot.is_attacking());
        assert!((player.rotator().yaw - 90.0).abs() < 1e-6);
    }

    #[test]
    fn test_player_row_missing_position_is_invalid() {
        let row = TableRow {
            table: "player".into(),
            fields: serde_json::json!({ "table": "player", "identity": "p3" }),
        };
        assert!(matches!(
            PlayerRow::from_row(&row),
            Err(ProtocolError::InvalidRow { .. })
        ));
    }

    #[test]
    fn test_rejects_malformed_and_unknown() {
        assert!(matches!(
            ServerMessage::parse("{not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"Mystery"}"#),
            Err(ProtocolError::UnknownMessage(_))
        ));
        assert!(matches!(
            ServerMessage::parse(r#"{"type":"TransactionUpdate","updates":[{"id":1}]}"#),
            Err(ProtocolError::MissingField("table"))
        ));
    }

    #[test]
    fn test_encodes_call_with_string_args() {
        let msg = ClientMessage::Call {
            call: "join_instance".into(),
            args: vec!["42".into()],
            request_id: 1,
        };
        let value: Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();

        assert_eq!(value["call"], "join_instance");
        assert_eq!(value["args"][0], "42");
    }

    #[test]
    fn test_encodes_subscribe() {
        let msg = ClientMessage::Subscribe {
            subscribe: table_query("player"),
        };
        assert_eq!(
            msg.encode().unwrap(),
            r#"{"subscribe":"SELECT * FROM player"}"#
        );
    }

    #[test]
    fn test_one_off_query_response_completes_call() {
        let msg = ServerMessage::parse(r#"{"OneOffQueryResponse":{"request_id":4}}"#).unwrap();
        assert_eq!(msg, ServerMessage::CallResponse { request_id: 4 });
    }
}
