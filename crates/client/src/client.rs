use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use eon::{
    ConnectionEvent, PresentationHandle, RegistryEvent, RenderPose, SyncSession, Transport,
};

use crate::config::ClientConfig;

pub struct HeadlessClient<T: Transport> {
    session: SyncSession<T>,
    config: ClientConfig,
    tick_duration: Duration,
    last_tick_time: Instant,
    accumulator: Duration,
    since_stats: f32,
    next_handle: u64,
    running: Arc<AtomicBool>,
}

impl<T: Transport> HeadlessClient<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            session: SyncSession::new(transport, config.session.clone()),
            tick_duration: config.tick_duration(),
            last_tick_time: Instant::now(),
            accumulator: Duration::ZERO,
            since_stats: 0.0,
            next_handle: 1,
            running: Arc::new(AtomicBool::new(true)),
            config,
        }
    }

    pub fn running(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn run(&mut self) {
        self.session.connect(self.config.connection.clone());
        self.last_tick_time = Instant::now();

        while self.running.load(Ordering::SeqCst) {
            self.tick_once();
            std::thread::sleep(Duration::from_millis(1));
        }

        self.session.disconnect();
        log::info!("Client stopped");
    }

    pub fn tick_once(&mut self) {
        let now = Instant::now();
        self.accumulator += now - self.last_tick_time;
        self.last_tick_time = now;

        while self.accumulator >= self.tick_duration {
            self.accumulator -= self.tick_duration;
            self.step(self.tick_duration.as_secs_f64());
        }
    }

    fn step(&mut self, dt: f64) {
        self.session
            .update(dt, &mut |handle: PresentationHandle, pose: &RenderPose| {
                log::trace!("Entity {:?} at {}", handle, pose.position);
            });

        for event in self.session.drain_connection_events() {
            self.handle_connection_event(event);
        }

        for event in self.session.drain_registry_events() {
            self.handle_registry_event(event);
        }

        self.since_stats += dt as f32;
        if self.config.stats_interval_secs > 0.0 && self.since_stats >= self.config.stats_interval_secs
        {
            self.since_stats = 0.0;
            self.log_stats();
        }
    }

    fn handle_connection_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected => log::info!("Session connected"),
            ConnectionEvent::IdentityReceived { identity } => {
                log::info!("Playing as {}", identity);
            }
            ConnectionEvent::Disconnected { reason } => {
                log::warn!("Session disconnected: {}", reason.as_str());
            }
            ConnectionEvent::Error { message } => log::warn!("Session error: {}", message),
            ConnectionEvent::ReconnectScheduled {
                attempt,
                delay_secs,
            } => log::info!("Reconnect {} scheduled in {:.1}s", attempt, delay_secs),
            ConnectionEvent::ReconnectFailed { attempts } => {
                log::error!("Could not reconnect after {} attempts", attempts);
                self.running.store(false, Ordering::SeqCst);
            }
            ConnectionEvent::InventoryRow { table, payload } => {
                log::debug!("{} row: {}", table, payload);
            }
            ConnectionEvent::ReducerCompleted { reducer, .. } => {
                log::debug!("Reducer {} completed", reducer);
            }
            ConnectionEvent::PlayerUpdated(_) => {}
        }
    }

    fn handle_registry_event(&mut self, event: RegistryEvent) {
        match event {
            RegistryEvent::EntityJoined { id, initial } => {
                let handle = PresentationHandle(self.next_handle);
                self.next_handle += 1;
                self.session.registry_mut().attach_handle(&id, handle);
                log::info!("{} joined at {} ({:?})", id, initial.position, handle);
            }
            RegistryEvent::EntityUpdated { id, state } => {
                log::trace!("{} -> {} (health {})", id, state.position, state.health);
            }
            RegistryEvent::EntityLeft { id, handle } => {
                log::info!("{} left ({:?} released)", id, handle);
            }
        }
    }

    fn log_stats(&self) {
        let stats = self.session.connection().stats();
        log::info!(
            "Entities: {} | sent {} msgs / {} B | recv {} msgs / {} B | dropped {}",
            self.session.registry().len(),
            stats.messages_sent,
            stats.bytes_sent,
            stats.messages_received,
            stats.bytes_received,
            stats.malformed_dropped
        );

        for id in self.session.registry().ids() {
            if let Some(interp) = self.session.registry().debug_stats(id) {
                log::debug!(
                    "{}: buffer {} | render time {:.3} | extrapolating {}",
                    id,
                    interp.buffer_size,
                    interp.render_time,
                    interp.is_extrapolating
                );
            }
        }
    }
}
