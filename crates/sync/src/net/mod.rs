mod connection;
mod events;
mod protocol;
mod transport;

pub use connection::{
    ConnectionConfig, ConnectionManager, ConnectionState, ConnectionStats,
    DEFAULT_MAX_RECONNECT_ATTEMPTS, DEFAULT_RECONNECT_DELAY_SECS, PendingCall, ReconnectBackoff,
};
pub use events::{ConnectionEvent, DisconnectReason};
pub use protocol::{
    ClientMessage, INVENTORY_TABLES, PLAYER_TABLE, PlayerRow, ServerMessage, TableRow,
    UPDATE_TRANSFORM_REDUCER, is_inventory_table, table_query,
};
pub use transport::{Transport, TransportEvent};
