use std::collections::VecDeque;
use std::io;

use eon::{Transport, TransportEvent};

/// In-memory socket: records sent frames and replays scripted events.
#[derive(Default)]
pub struct ScriptedTransport {
    pub open: bool,
    pub opened_urls: Vec<String>,
    pub sent: Vec<String>,
    pub scripted: VecDeque<TransportEvent>,
}

#[allow(dead_code)]
impl ScriptedTransport {
    pub fn script(&mut self, event: TransportEvent) {
        self.scripted.push_back(event);
    }

    pub fn script_message(&mut self, text: &str) {
        self.scripted.push_back(TransportEvent::Message(text.to_string()));
    }

    pub fn bytes_sent(&self) -> usize {
        self.sent.iter().map(String::len).sum()
    }
}

impl Transport for ScriptedTransport {
    fn open(&mut self, url: &str) -> io::Result<()> {
        self.opened_urls.push(url.to_string());
        Ok(())
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        if !self.open {
            return Err(io::Error::new(io::ErrorKind::NotConnected, "socket closed"));
        }
        self.sent.push(text.to_string());
        Ok(())
    }

    fn close(&mut self) {
        self.open = false;
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        let events: Vec<TransportEvent> = self.scripted.drain(..).collect();
        for event in &events {
            match event {
                TransportEvent::Opened => self.open = true,
                TransportEvent::Error(_) | TransportEvent::Closed { .. } => self.open = false,
                TransportEvent::Message(_) => {}
            }
        }
        events
    }
}

#[allow(dead_code)]
pub fn player_update(identity: &str, x: f32, timestamp: f64, online: bool) -> String {
    format!(
        r#"{{"type":"TransactionUpdate","updates":[{{"table":"player","identity":"{}","position_x":{},"position_y":0.0,"position_z":0.0,"is_online":{},"timestamp":{}}}]}}"#,
        identity, x, online, timestamp
    )
}
