use std::collections::{HashMap, VecDeque};

use super::events::{ConnectionEvent, DisconnectReason};
use super::protocol::{
    ClientMessage, PLAYER_TABLE, PlayerRow, ServerMessage, TableRow, is_inventory_table,
    table_query,
};
use super::transport::{Transport, TransportEvent};
use crate::error::ProtocolError;

pub const DEFAULT_RECONNECT_DELAY_SECS: f64 = 2.0;
pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReconnectBackoff {
    Flat,
    Exponential { max_delay_secs: f64 },
}

impl ReconnectBackoff {
    pub fn delay_for(&self, base_secs: f64, attempt: u32) -> f64 {
        match *self {
            ReconnectBackoff::Flat => base_secs,
            ReconnectBackoff::Exponential { max_delay_secs } => {
                let exponent = attempt.saturating_sub(1).min(30) as i32;
                (base_secs * 2f64.powi(exponent)).min(max_delay_secs)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub host: String,
    pub module_name: String,
    pub reconnect_delay_secs: f64,
    pub max_reconnect_attempts: u32,
    pub backoff: ReconnectBackoff,
    pub subscriptions: Vec<String>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "localhost:3000".to_string(),
            module_name: "eon".to_string(),
            reconnect_delay_secs: DEFAULT_RECONNECT_DELAY_SECS,
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            backoff: ReconnectBackoff::Flat,
            subscriptions: vec![table_query(PLAYER_TABLE), table_query("inventory_item")],
        }
    }
}

impl ConnectionConfig {
    pub fn new(host: impl Into<String>, module_name: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            module_name: module_name.into(),
            ..Default::default()
        }
    }

    /// `wss://<host>/database/websocket/<module>`; an explicit `ws://` or
    /// `wss://` scheme on the host is kept.
    pub fn url(&self) -> String {
        let host = self.host.trim_end_matches('/');
        let base = if host.starts_with("ws://") || host.starts_with("wss://") {
            host.to_string()
        } else {
            format!("wss://{}", host)
        };
        format!("{}/database/websocket/{}", base, self.module_name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCall {
    pub request_id: u64,
    pub reducer: String,
}

#[derive(Debug, Clone, Default)]
pub struct ConnectionStats {
    pub messages_sent: u64,
    pub bytes_sent: u64,
    pub messages_received: u64,
    pub bytes_received: u64,
    pub malformed_dropped: u64,
    pub reconnects_scheduled: u64,
}

pub struct ConnectionManager<T: Transport> {
    transport: T,
    config: Option<ConnectionConfig>,
    state: ConnectionState,
    identity: Option<String>,
    token: Option<String>,
    next_request_id: u64,
    pending_calls: HashMap<u64, PendingCall>,
    subscriptions: Vec<String>,
    reconnect_attempts: u32,
    reconnect_timer: Option<f64>,
    events: VecDeque<ConnectionEvent>,
    stats: ConnectionStats,
}

impl<T: Transport> ConnectionManager<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            config: None,
            state: ConnectionState::Disconnected,
            identity: None,
            token: None,
            next_request_id: 1,
            pending_calls: HashMap::new(),
            subscriptions: Vec::new(),
            reconnect_attempts: 0,
            reconnect_timer: None,
            events: VecDeque::new(),
            stats: ConnectionStats::default(),
        }
    }

    pub fn connect(&mut self, config: ConnectionConfig) {
        if self.is_connected() {
            log::warn!("Already connected to {}", config.url());
            return;
        }

        if self.state == ConnectionState::Connecting {
            log::warn!("Connection already in progress");
            return;
        }

        self.config = Some(config);
        self.reconnect_attempts = 0;
        self.reconnect_timer = None;
        self.open_transport();
    }

    fn open_transport(&mut self) {
        let Some(url) = self.config.as_ref().map(ConnectionConfig::url) else {
            return;
        };

        log::info!("Connecting to {}", url);
        self.state = ConnectionState::Connecting;

        if let Err(e) = self.transport.open(&url) {
            log::error!("Failed to open connection: {}", e);
            self.events.push_back(ConnectionEvent::Error {
                message: e.to_string(),
            });
            self.handle_failure(DisconnectReason::TransportError(e.to_string()));
        }
    }

    pub fn disconnect(&mut self) {
        let was_active = self.state != ConnectionState::Disconnected
            || self.reconnect_timer.is_some();

        self.reconnect_timer = None;
        // A handshake still in flight is not open yet but must be torn down too.
        self.transport.close();
        // Events from the socket we just closed must not drive reconnection.
        let _ = self.transport.poll();

        self.clear_session();
        self.state = ConnectionState::Disconnected;

        if was_active {
            log::info!("Disconnected");
            self.events.push_back(ConnectionEvent::Disconnected {
                reason: DisconnectReason::Requested,
            });
        }
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected && self.transport.is_open()
    }

    pub fn call_reducer<I, S>(&mut self, name: &str, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if !self.is_connected() {
            log::warn!("Cannot call reducer {} - not connected", name);
            return false;
        }

        let request_id = self.next_request_id;
        self.next_request_id += 1;

        let message = ClientMessage::Call {
            call: name.to_string(),
            args: args.into_iter().map(Into::into).collect(),
            request_id,
        };

        if !self.send_message(&message) {
            return false;
        }

        self.pending_calls.insert(
            request_id,
            PendingCall {
                request_id,
                reducer: name.to_string(),
            },
        );
        log::debug!("Called reducer {} (request_id: {})", name, request_id);
        true
    }

    pub fn subscribe(&mut self, query: &str) -> bool {
        if !self.is_connected() {
            log::warn!("Cannot subscribe to {:?} - not connected", query);
            return false;
        }

        if self.subscriptions.iter().any(|q| q == query) {
            log::debug!("Already subscribed: {}", query);
            return false;
        }

        let message = ClientMessage::Subscribe {
            subscribe: query.to_string(),
        };
        if !self.send_message(&message) {
            return false;
        }

        self.subscriptions.push(query.to_string());
        log::info!("Subscribed: {}", query);
        true
    }

    pub fn subscribe_table(&mut self, table: &str) -> bool {
        self.subscribe(&table_query(table))
    }

    pub fn unsubscribe(&mut self, query: &str) -> bool {
        let before = self.subscriptions.len();
        self.subscriptions.retain(|q| q != query);
        let removed = self.subscriptions.len() != before;
        if removed {
            log::info!("Unsubscribed: {}", query);
        }
        removed
    }

    pub fn update(&mut self, dt: f64) {
        for event in self.transport.poll() {
            self.handle_transport_event(event);
        }

        if let Some(remaining) = self.reconnect_timer.as_mut() {
            *remaining -= dt;
            if *remaining <= 0.0 {
                self.reconnect_timer = None;
                let max = self
                    .config
                    .as_ref()
                    .map_or(0, |c| c.max_reconnect_attempts);
                log::info!("Reconnecting (attempt {}/{})", self.reconnect_attempts, max);
                self.open_transport();
            }
        }
    }

    pub fn drain_events(&mut self) -> Vec<ConnectionEvent> {
        self.events.drain(..).collect()
    }

    fn handle_transport_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::Opened => self.handle_opened(),
            TransportEvent::Message(text) => {
                if self.state == ConnectionState::Disconnected {
                    log::debug!("Ignoring message while disconnected");
                    return;
                }
                self.stats.messages_received += 1;
                self.stats.bytes_received += text.len() as u64;
                self.handle_message(&text);
            }
            TransportEvent::Error(message) => {
                if self.state == ConnectionState::Disconnected {
                    log::debug!("Ignoring transport error while disconnected: {}", message);
                    return;
                }
                log::error!("Connection error: {}", message);
                self.events.push_back(ConnectionEvent::Error {
                    message: message.clone(),
                });
                self.handle_failure(DisconnectReason::TransportError(message));
            }
            TransportEvent::Closed {
                code,
                reason,
                clean,
            } => {
                if self.state == ConnectionState::Disconnected {
                    log::debug!("Ignoring close while disconnected (code: {})", code);
                    return;
                }
                log::info!(
                    "Connection closed: {} (code: {}, clean: {})",
                    reason,
                    code,
                    clean
                );

                let reason = DisconnectReason::Closed { code, reason };
                if clean {
                    self.transport.close();
                    self.clear_session();
                    self.state = ConnectionState::Disconnected;
                    self.events.push_back(ConnectionEvent::Disconnected { reason });
                } else {
                    self.handle_failure(reason);
                }
            }
        }
    }

    fn handle_opened(&mut self) {
        match self.state {
            ConnectionState::Connecting => {}
            ConnectionState::Disconnected => {
                log::debug!("Closing socket that opened after disconnect");
                self.transport.close();
                return;
            }
            ConnectionState::Connected => {
                log::debug!("Ignoring duplicate open");
                return;
            }
        }

        self.state = ConnectionState::Connected;
        self.reconnect_attempts = 0;
        log::info!("Connected");
        self.events.push_back(ConnectionEvent::Connected);

        let standing = self
            .config
            .as_ref()
            .map(|c| c.subscriptions.clone())
            .unwrap_or_default();
        for query in standing {
            self.subscribe(&query);
        }
    }

    fn handle_failure(&mut self, reason: DisconnectReason) {
        let was = self.state;

        self.transport.close();
        self.clear_session();
        self.state = ConnectionState::Disconnected;

        if was == ConnectionState::Disconnected {
            return;
        }

        if was == ConnectionState::Connected {
            self.events.push_back(ConnectionEvent::Disconnected { reason });
        }
        self.schedule_reconnect();
    }

    fn schedule_reconnect(&mut self) {
        let Some(config) = self.config.as_ref() else {
            return;
        };

        if self.reconnect_attempts >= config.max_reconnect_attempts {
            log::warn!(
                "Giving up after {} reconnect attempts",
                self.reconnect_attempts
            );
            self.events.push_back(ConnectionEvent::ReconnectFailed {
                attempts: self.reconnect_attempts,
            });
            return;
        }

        self.reconnect_attempts += 1;
        let delay_secs = config
            .backoff
            .delay_for(config.reconnect_delay_secs, self.reconnect_attempts);
        self.reconnect_timer = Some(delay_secs);
        self.stats.reconnects_scheduled += 1;

        log::warn!(
            "Reconnect attempt {}/{} in {:.1}s",
            self.reconnect_attempts,
            config.max_reconnect_attempts,
            delay_secs
        );
        self.events.push_back(ConnectionEvent::ReconnectScheduled {
            attempt: self.reconnect_attempts,
            delay_secs,
        });
    }

    fn clear_session(&mut self) {
        self.identity = None;
        self.token = None;
        self.pending_calls.clear();
        self.subscriptions.clear();
    }

    fn send_message(&mut self, message: &ClientMessage) -> bool {
        let text = match message.encode() {
            Ok(text) => text,
            Err(e) => {
                log::warn!("Failed to encode message: {}", e);
                return false;
            }
        };

        match self.transport.send(&text) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += text.len() as u64;
                true
            }
            Err(e) => {
                log::error!("Send failed: {}", e);
                self.events.push_back(ConnectionEvent::Error {
                    message: e.to_string(),
                });
                self.handle_failure(DisconnectReason::TransportError(e.to_string()));
                false
            }
        }
    }

    fn handle_message(&mut self, text: &str) {
        let message = match ServerMessage::parse(text) {
            Ok(message) => message,
            Err(ProtocolError::UnknownMessage(kind)) => {
                log::debug!("Ignoring message type {}", kind);
                return;
            }
            Err(e) => {
                log::warn!("Dropping malformed message: {}", e);
                self.stats.malformed_dropped += 1;
                return;
            }
        };

        match message {
            ServerMessage::IdentityToken { identity, token } => {
                log::info!("Received identity: {}", identity);
                self.identity = Some(identity.clone());
                self.token = token;
                self.events.push_back(ConnectionEvent::IdentityReceived { identity });
            }
            ServerMessage::SubscriptionUpdate(rows) | ServerMessage::TransactionUpdate(rows) => {
                for row in rows {
                    self.route_row(row);
                }
            }
            ServerMessage::CallResponse { request_id } => {
                match self.pending_calls.remove(&request_id) {
                    Some(call) => {
                        log::debug!(
                            "Reducer {} completed (request_id: {})",
                            call.reducer,
                            request_id
                        );
                        self.events.push_back(ConnectionEvent::ReducerCompleted {
                            request_id,
                            reducer: call.reducer,
                        });
                    }
                    None => log::debug!("Response for unknown request_id {}", request_id),
                }
            }
        }
    }

    fn route_row(&mut self, row: TableRow) {
        if row.table == PLAYER_TABLE {
            match PlayerRow::from_row(&row) {
                Ok(player) => self.events.push_back(ConnectionEvent::PlayerUpdated(player)),
                Err(e) => {
                    log::warn!("Dropping row: {}", e);
                    self.stats.malformed_dropped += 1;
                }
            }
        } else if is_inventory_table(&row.table) {
            self.events.push_back(ConnectionEvent::InventoryRow {
                payload: row.fields.to_string(),
                table: row.table,
            });
        } else {
            log::trace!("Ignoring row for table {}", row.table);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    pub fn config(&self) -> Option<&ConnectionConfig> {
        self.config.as_ref()
    }

    pub fn pending_calls(&self) -> impl Iterator<Item = &PendingCall> {
        self.pending_calls.values()
    }

    pub fn active_subscriptions(&self) -> &[String] {
        &self.subscriptions
    }

    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    pub fn is_reconnect_scheduled(&self) -> bool {
        self.reconnect_timer.is_some()
    }

    pub fn stats(&self) -> &ConnectionStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[derive(Default)]
    struct ScriptedTransport {
        open: bool,
        fail_open: bool,
        opened_urls: Vec<String>,
        sent: Vec<String>,
        close_calls: usize,
        scripted: VecDeque<TransportEvent>,
    }

    impl ScriptedTransport {
        fn script(&mut self, event: TransportEvent) {
            self.scripted.push_back(event);
        }
    }

    impl Transport for ScriptedTransport {
        fn open(&mut self, url: &str) -> io::Result<()> {
            self.opened_urls.push(url.to_string());
            if self.fail_open {
                return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"));
            }
            Ok(())
        }

        fn send(&mut self, text: &str) -> io::Result<()> {
            if !self.open {
                return Err(io::Error::new(io::ErrorKind::NotConnected, "closed"));
            }
            self.sent.push(text.to_string());
            Ok(())
        }

        fn close(&mut self) {
            self.open = false;
            self.close_calls += 1;
        }

        fn is_open(&self) -> bool {
            self.open
        }

        fn poll(&mut self) -> Vec<TransportEvent> {
            let events: Vec<TransportEvent> = self.scripted.drain(..).collect();
            for event in &events {
                match event {
                    TransportEvent::Opened => self.open = true,
                    TransportEvent::Closed { .. } | TransportEvent::Error(_) => self.open = false,
                    TransportEvent::Message(_) => {}
                }
            }
            events
        }
    }

    fn test_config() -> ConnectionConfig {
        ConnectionConfig {
            max_reconnect_attempts: 3,
            reconnect_delay_secs: 1.0,
            ..ConnectionConfig::new("localhost:3000", "eon")
        }
    }

    fn connected_manager() -> ConnectionManager<ScriptedTransport> {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());
        manager.transport_mut().script(TransportEvent::Opened);
        manager.update(0.016);
        manager
    }

    #[test]
    fn test_builds_websocket_url() {
        assert_eq!(
            ConnectionConfig::new("example.com", "eon").url(),
            "wss://example.com/database/websocket/eon"
        );
        assert_eq!(
            ConnectionConfig::new("ws://127.0.0.1:3000/", "eon").url(),
            "ws://127.0.0.1:3000/database/websocket/eon"
        );
    }

    #[test]
    fn test_connect_issues_standing_subscriptions() {
        let mut manager = connected_manager();

        assert!(manager.is_connected());
        assert_eq!(manager.transport().sent.len(), 2);
        assert_eq!(
            manager.transport().sent[0],
            r#"{"subscribe":"SELECT * FROM player"}"#
        );
        assert!(manager.drain_events().contains(&ConnectionEvent::Connected));
    }

    #[test]
    fn test_connect_is_noop_while_connecting_or_connected() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());
        manager.connect(test_config());
        assert_eq!(manager.transport().opened_urls.len(), 1);

        manager.transport_mut().script(TransportEvent::Opened);
        manager.update(0.016);
        manager.connect(test_config());
        assert_eq!(manager.transport().opened_urls.len(), 1);
    }

    #[test]
    fn test_stale_connected_flag_reads_disconnected() {
        let mut manager = connected_manager();
        manager.transport_mut().open = false;

        assert_eq!(manager.state(), ConnectionState::Connected);
        assert!(!manager.is_connected());
    }

    #[test]
    fn test_reducer_call_gated_when_disconnected() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());

        assert!(!manager.call_reducer("use_item", ["7"]));
        assert!(!manager.subscribe("SELECT * FROM player"));
        assert!(manager.transport().sent.is_empty());
        assert_eq!(manager.stats().bytes_sent, 0);
    }

    #[test]
    fn test_reducer_call_is_framed_and_tracked() {
        let mut manager = connected_manager();
        manager.transport_mut().sent.clear();

        assert!(manager.call_reducer("create_instance", ["Arena", "8"]));

        let frame: serde_json::Value =
            serde_json::from_str(&manager.transport().sent[0]).unwrap();
        assert_eq!(frame["call"], "create_instance");
        assert_eq!(frame["args"], serde_json::json!(["Arena", "8"]));
        assert_eq!(manager.pending_calls().count(), 1);

        let request_id = frame["request_id"].as_u64().unwrap();
        manager.transport_mut().script(TransportEvent::Message(format!(
            r#"{{"type":"CallResponse","request_id":{}}}"#,
            request_id
        )));
        manager.update(0.016);

        assert_eq!(manager.pending_calls().count(), 0);
        assert!(manager.drain_events().contains(&ConnectionEvent::ReducerCompleted {
            request_id,
            reducer: "create_instance".into()
        }));
    }

    #[test]
    fn test_subscribe_is_idempotent() {
        let mut manager = connected_manager();
        let sent_before = manager.transport().sent.len();

        assert!(!manager.subscribe("SELECT * FROM player"));
        assert!(manager.subscribe_table("world_item"));
        assert!(!manager.subscribe_table("world_item"));

        assert_eq!(manager.transport().sent.len(), sent_before + 1);
        assert!(manager.unsubscribe("SELECT * FROM world_item"));
        assert!(!manager.unsubscribe("SELECT * FROM world_item"));
    }

    #[test]
    fn test_reconnect_attempts_are_bounded() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());

        for _ in 0..10 {
            manager
                .transport_mut()
                .script(TransportEvent::Error("refused".into()));
            manager.update(1.0);
        }

        // Initial open plus exactly three reconnects.
        assert_eq!(manager.transport().opened_urls.len(), 4);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_reconnect_scheduled());

        let events = manager.drain_events();
        let failed = events
            .iter()
            .filter(|e| matches!(e, ConnectionEvent::ReconnectFailed { attempts: 3 }))
            .count();
        assert_eq!(failed, 1);
    }

    #[test]
    fn test_synchronous_open_failure_also_reconnects() {
        let mut transport = ScriptedTransport::default();
        transport.fail_open = true;
        let mut manager = ConnectionManager::new(transport);
        manager.connect(test_config());

        for _ in 0..10 {
            manager.update(1.0);
        }

        assert_eq!(manager.transport().opened_urls.len(), 4);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_successful_reconnect_resets_attempts() {
        let mut manager = connected_manager();
        manager.transport_mut().script(TransportEvent::Closed {
            code: 1006,
            reason: "abnormal".into(),
            clean: false,
        });
        manager.update(0.016);
        assert_eq!(manager.reconnect_attempts(), 1);
        assert!(manager.active_subscriptions().is_empty());

        manager.update(1.0);
        manager.transport_mut().script(TransportEvent::Opened);
        manager.update(0.016);

        assert!(manager.is_connected());
        assert_eq!(manager.reconnect_attempts(), 0);
        assert_eq!(manager.active_subscriptions().len(), 2);
    }

    #[test]
    fn test_clean_server_close_does_not_reconnect() {
        let mut manager = connected_manager();
        manager.transport_mut().script(TransportEvent::Closed {
            code: 1000,
            reason: "bye".into(),
            clean: true,
        });
        manager.update(0.016);

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_reconnect_scheduled());
    }

    #[test]
    fn test_disconnect_cancels_pending_reconnect() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());
        manager
            .transport_mut()
            .script(TransportEvent::Error("refused".into()));
        manager.update(0.016);
        assert!(manager.is_reconnect_scheduled());

        manager.disconnect();
        manager.disconnect();
        for _ in 0..5 {
            manager.update(1.0);
        }

        assert_eq!(manager.transport().opened_urls.len(), 1);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn test_disconnect_clears_session_state() {
        let mut manager = connected_manager();
        manager.transport_mut().script(TransportEvent::Message(
            r#"{"type":"IdentityToken","identity":"me","token":"secret"}"#.into(),
        ));
        manager.update(0.016);
        manager.call_reducer("leave_instance", Vec::<String>::new());

        manager.disconnect();

        assert_eq!(manager.identity(), None);
        assert_eq!(manager.token(), None);
        assert_eq!(manager.pending_calls().count(), 0);
        assert!(manager.active_subscriptions().is_empty());
    }

    #[test]
    fn test_malformed_message_is_dropped() {
        let mut manager = connected_manager();
        manager.drain_events();
        manager
            .transport_mut()
            .script(TransportEvent::Message("{oops".into()));
        manager.transport_mut().script(TransportEvent::Message(
            r#"{"type":"TransactionUpdate","updates":[
                {"table":"player","identity":"p1","position_x":1,"position_y":0,"position_z":0},
                {"table":"inventory_item","id":3},
                {"table":"chat","text":"hi"}
            ]}"#
            .into(),
        ));
        manager.update(0.016);

        assert!(manager.is_connected());
        assert_eq!(manager.stats().malformed_dropped, 1);

        let events = manager.drain_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], ConnectionEvent::PlayerUpdated(row) if row.identity == "p1"));
        assert!(matches!(&events[1], ConnectionEvent::InventoryRow { table, .. } if table == "inventory_item"));
    }

    #[test]
    fn test_exponential_backoff_is_capped() {
        let backoff = ReconnectBackoff::Exponential {
            max_delay_secs: 10.0,
        };
        assert_eq!(backoff.delay_for(1.0, 1), 1.0);
        assert_eq!(backoff.delay_for(1.0, 3), 4.0);
        assert_eq!(backoff.delay_for(1.0, 8), 10.0);
        assert_eq!(ReconnectBackoff::Flat.delay_for(2.0, 8), 2.0);
    }

    #[test]
    fn test_disconnect_while_connecting_closes_handshake() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());
        manager.disconnect();
        assert_eq!(manager.transport().close_calls, 1);
        manager.drain_events();

        // The handshake completes after the caller gave up on it.
        manager.transport_mut().script(TransportEvent::Opened);
        manager.transport_mut().script(TransportEvent::Message(
            r#"{"type":"IdentityToken","identity":"me"}"#.into(),
        ));
        manager.transport_mut().script(TransportEvent::Message(
            r#"{"type":"TransactionUpdate","updates":[
                {"table":"player","identity":"p","position_x":0,"position_y":0,"position_z":0}
            ]}"#
            .into(),
        ));
        manager.update(0.016);

        assert!(manager.drain_events().is_empty());
        assert_eq!(manager.identity(), None);
        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.transport().is_open());
        assert_eq!(manager.transport().close_calls, 2);
        assert_eq!(manager.stats().messages_received, 0);
    }

    #[test]
    fn test_clean_close_while_connecting_does_not_reconnect() {
        let mut manager = ConnectionManager::new(ScriptedTransport::default());
        manager.connect(test_config());
        manager.transport_mut().script(TransportEvent::Closed {
            code: 1000,
            reason: "going away".into(),
            clean: true,
        });
        manager.update(0.016);
        for _ in 0..5 {
            manager.update(1.0);
        }

        assert_eq!(manager.state(), ConnectionState::Disconnected);
        assert!(!manager.is_reconnect_scheduled());
        assert_eq!(manager.transport().opened_urls.len(), 1);
        assert!(matches!(
            manager.drain_events().as_slice(),
            [ConnectionEvent::Disconnected {
                reason: DisconnectReason::Closed { code: 1000, .. }
            }]
        ));
    }
}
