use std::collections::VecDeque;

use glam::{Quat, Vec3};

use crate::interpolation::{InterpolationConfig, RenderPose};
use crate::net::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, PlayerRow, Transport,
    UPDATE_TRANSFORM_REDUCER,
};
use crate::prediction::{LocalPrediction, PredictionConfig, Reconciliation};
use crate::registry::{EntityRegistry, PoseSink, RegistryEvent};
use crate::snapshot::Rotator;

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    pub interpolation: InterpolationConfig,
    pub prediction: PredictionConfig,
}

/// Wires the connection, the remote registry and local prediction together.
/// Player rows for the local identity go to reconciliation; everything else
/// goes to the registry.
pub struct SyncSession<T: Transport> {
    config: SessionConfig,
    connection: ConnectionManager<T>,
    registry: EntityRegistry,
    local: Option<LocalPrediction>,
    local_identity: Option<String>,
    local_time: f64,
    events: VecDeque<ConnectionEvent>,
}

impl<T: Transport> SyncSession<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            connection: ConnectionManager::new(transport),
            registry: EntityRegistry::new(config.interpolation.clone()),
            config,
            local: None,
            local_identity: None,
            local_time: 0.0,
            events: VecDeque::new(),
        }
    }

    pub fn connect(&mut self, config: ConnectionConfig) {
        self.connection.connect(config);
    }

    pub fn disconnect(&mut self) {
        self.connection.disconnect();
        self.forget_local();
        self.route_connection_events();
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn call_reducer<I, S>(&mut self, name: &str, args: I) -> bool
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.connection.call_reducer(name, args)
    }

    pub fn subscribe(&mut self, query: &str) -> bool {
        self.connection.subscribe(query)
    }

    pub fn update<S: PoseSink + ?Sized>(&mut self, dt: f64, sink: &mut S) {
        self.local_time += dt;
        self.connection.update(dt);
        self.route_connection_events();

        if let Some(local) = self.local.as_mut() {
            local.advance(dt as f32);
        }

        self.registry.tick(dt, sink);
    }

    fn route_connection_events(&mut self) {
        for event in self.connection.drain_events() {
            match event {
                ConnectionEvent::PlayerUpdated(row) => self.route_player_row(&row),
                ConnectionEvent::IdentityReceived { ref identity } => {
                    // A row for ourselves may have arrived before the identity.
                    if self.registry.remove(identity) {
                        log::debug!("Moved {} from remote registry to local", identity);
                    }
                    self.local_identity = Some(identity.clone());
                    self.events.push_back(event);
                }
                ConnectionEvent::Disconnected { .. } => {
                    self.forget_local();
                    self.events.push_back(event);
                }
                other => self.events.push_back(other),
            }
        }
    }

    fn route_player_row(&mut self, row: &PlayerRow) {
        let snapshot = row.to_snapshot(self.local_time);

        if self.local_identity.as_deref() != Some(row.identity.as_str()) {
            self.registry.apply_update(&row.identity, snapshot, row.is_online);
            return;
        }

        if !row.is_online {
            log::info!("Local player reported offline");
            self.local = None;
            return;
        }

        let local = self.local.get_or_insert_with(|| {
            let mut prediction = LocalPrediction::new(self.config.prediction.clone());
            prediction.set_displayed_position(snapshot.position);
            prediction
        });
        if let Reconciliation::Corrected { error, .. } = local.reconcile(&snapshot) {
            log::debug!("Local correction applied (error: {:.2})", error);
        }
    }

    fn forget_local(&mut self) {
        self.local = None;
        self.local_identity = None;
    }

    pub fn record_local_input(&mut self, velocity: Vec3, rotation: Quat) {
        match self.local.as_mut() {
            Some(local) => local.record_input(velocity, rotation),
            None => log::debug!("No local entity; input dropped"),
        }
    }

    pub fn send_transform(&mut self, position: Vec3, rotation: Rotator) -> bool {
        let args = [
            position.x,
            position.y,
            position.z,
            rotation.pitch,
            rotation.yaw,
            rotation.roll,
        ]
        .map(|v| v.to_string());

        self.connection.call_reducer(UPDATE_TRANSFORM_REDUCER, args)
    }

    pub fn render_pose(&self, id: &str) -> Option<RenderPose> {
        self.registry.render_pose(id)
    }

    pub fn drain_registry_events(&mut self) -> Vec<RegistryEvent> {
        self.registry.drain_events()
    }

    pub fn drain_connection_events(&mut self) -> Vec<ConnectionEvent> {
        self.events.drain(..).collect()
    }

    pub fn identity(&self) -> Option<&str> {
        self.local_identity.as_deref()
    }

    pub fn local_prediction(&self) -> Option<&LocalPrediction> {
        self.local.as_ref()
    }

    pub fn local_prediction_mut(&mut self) -> Option<&mut LocalPrediction> {
        self.local.as_mut()
    }

    pub fn connection(&self) -> &ConnectionManager<T> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut ConnectionManager<T> {
        &mut self.connection
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut EntityRegistry {
        &mut self.registry
    }

    pub fn local_time(&self) -> f64 {
        self.local_time
    }
}
