use std::time::Duration;

use eon::{ConnectionConfig, SessionConfig};

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub tick_rate: u32,
    pub stats_interval_secs: f32,
    pub connection: ConnectionConfig,
    pub session: SessionConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tick_rate: 60,
            stats_interval_secs: 5.0,
            connection: ConnectionConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl ClientConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate.max(1) as f64)
    }
}
