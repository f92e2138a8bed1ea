mod client;
mod config;
mod ws;

use std::sync::atomic::Ordering;

use anyhow::Result;
use clap::Parser;
use eon::{ConnectionConfig, InterpolationConfig, ReconnectBackoff, SessionConfig};

use client::HeadlessClient;
use config::ClientConfig;
use ws::WsTransport;

#[derive(Parser)]
#[command(name = "eon-client")]
#[command(about = "Headless Eon sync client")]
struct Args {
    #[arg(
        long,
        default_value = "localhost:3000",
        help = "Backend host, optionally with a ws:// or wss:// scheme"
    )]
    host: String,

    #[arg(short, long, default_value = "eon")]
    module: String,

    #[arg(short, long, default_value_t = 60)]
    tick_rate: u32,

    #[arg(long, default_value_t = eon::net::DEFAULT_RECONNECT_DELAY_SECS)]
    reconnect_delay: f64,

    #[arg(long, default_value_t = eon::net::DEFAULT_MAX_RECONNECT_ATTEMPTS)]
    max_reconnect_attempts: u32,

    #[arg(
        long,
        help = "Double the reconnect delay on every attempt, capped at this many seconds"
    )]
    exponential_backoff: Option<f64>,

    #[arg(long, default_value_t = eon::interpolation::DEFAULT_INTERPOLATION_DELAY)]
    interpolation_delay: f64,
}

impl Args {
    fn into_config(self) -> ClientConfig {
        let backoff = match self.exponential_backoff {
            Some(max_delay_secs) => ReconnectBackoff::Exponential { max_delay_secs },
            None => ReconnectBackoff::Flat,
        };

        ClientConfig {
            tick_rate: self.tick_rate,
            connection: ConnectionConfig {
                reconnect_delay_secs: self.reconnect_delay,
                max_reconnect_attempts: self.max_reconnect_attempts,
                backoff,
                ..ConnectionConfig::new(self.host, self.module)
            },
            session: SessionConfig {
                interpolation: InterpolationConfig {
                    interpolation_delay: self.interpolation_delay,
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().into_config();
    log::info!("Connecting to {}", config.connection.url());

    let runtime = tokio::runtime::Runtime::new()?;
    let mut client = HeadlessClient::new(WsTransport::new(runtime.handle().clone()), config);

    let running = client.running();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::info!("Interrupted, shutting down");
            running.store(false, Ordering::SeqCst);
        }
    });

    client.run();
    Ok(())
}
