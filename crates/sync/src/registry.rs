use std::collections::{HashMap, VecDeque};

use crate::interpolation::{
    InterpolationConfig, InterpolationStats, RenderPose, ServerClock, SnapshotInterpolator,
};
use crate::snapshot::StateSnapshot;

pub type EntityId = String;

/// Opaque token the presentation layer attaches to a remote entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PresentationHandle(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    EntityJoined {
        id: EntityId,
        initial: StateSnapshot,
    },
    EntityUpdated {
        id: EntityId,
        state: StateSnapshot,
    },
    EntityLeft {
        id: EntityId,
        handle: Option<PresentationHandle>,
    },
}

pub trait PoseSink {
    fn apply_pose(&mut self, handle: PresentationHandle, pose: &RenderPose);
}

impl<F> PoseSink for F
where
    F: FnMut(PresentationHandle, &RenderPose),
{
    fn apply_pose(&mut self, handle: PresentationHandle, pose: &RenderPose) {
        self(handle, pose)
    }
}

#[derive(Debug, Clone)]
pub struct RemoteEntityState {
    pub id: EntityId,
    pub interpolator: SnapshotInterpolator,
    pub handle: Option<PresentationHandle>,
}

impl RemoteEntityState {
    fn new(id: EntityId, config: InterpolationConfig) -> Self {
        Self {
            id,
            interpolator: SnapshotInterpolator::new(config),
            handle: None,
        }
    }
}

pub struct EntityRegistry {
    config: InterpolationConfig,
    entities: HashMap<EntityId, RemoteEntityState>,
    clock: ServerClock,
    events: VecDeque<RegistryEvent>,
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new(InterpolationConfig::default())
    }
}

impl EntityRegistry {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            clock: ServerClock::new(config.time_correction_rate),
            config,
            entities: HashMap::new(),
            events: VecDeque::new(),
        }
    }

    pub fn apply_update(&mut self, id: &str, snapshot: StateSnapshot, online: bool) {
        self.clock.observe(snapshot.timestamp);

        if !online {
            match self.entities.remove(id) {
                Some(entity) => {
                    log::info!("Entity left: {}", id);
                    self.events.push_back(RegistryEvent::EntityLeft {
                        id: entity.id,
                        handle: entity.handle,
                    });
                }
                None => log::debug!("Ignoring offline update for unknown entity {}", id),
            }
            return;
        }

        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.interpolator.push_snapshot(snapshot);
                self.events.push_back(RegistryEvent::EntityUpdated {
                    id: id.to_string(),
                    state: snapshot,
                });
            }
            None => {
                log::info!("Entity joined: {}", id);
                let mut entity = RemoteEntityState::new(id.to_string(), self.config.clone());
                entity.interpolator.push_snapshot(snapshot);
                self.entities.insert(id.to_string(), entity);
                self.events.push_back(RegistryEvent::EntityJoined {
                    id: id.to_string(),
                    initial: snapshot,
                });
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let Some(entity) = self.entities.remove(id) else {
            return false;
        };
        self.events.push_back(RegistryEvent::EntityLeft {
            id: entity.id,
            handle: entity.handle,
        });
        true
    }

    pub fn attach_handle(&mut self, id: &str, handle: PresentationHandle) -> bool {
        match self.entities.get_mut(id) {
            Some(entity) => {
                entity.handle = Some(handle);
                true
            }
            None => {
                log::warn!("Cannot attach handle to unknown entity {}", id);
                false
            }
        }
    }

    pub fn tick<S: PoseSink + ?Sized>(&mut self, dt: f64, sink: &mut S) {
        self.clock.advance(dt);
        let server_time = self.clock.estimated();

        for entity in self.entities.values_mut() {
            entity.interpolator.update(server_time, dt as f32);

            if let (Some(handle), Some(pose)) = (entity.handle, entity.interpolator.displayed()) {
                sink.apply_pose(handle, &pose);
            }
        }
    }

    pub fn render_pose(&self, id: &str) -> Option<RenderPose> {
        self.entities
            .get(id)
            .and_then(|entity| entity.interpolator.displayed())
    }

    pub fn get(&self, id: &str) -> Option<&RemoteEntityState> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn server_time(&self) -> f64 {
        self.clock.estimated()
    }

    pub fn clock(&self) -> &ServerClock {
        &self.clock
    }

    pub fn debug_stats(&self, id: &str) -> Option<InterpolationStats> {
        self.entities
            .get(id)
            .map(|entity| entity.interpolator.debug_stats())
    }

    pub fn drain_events(&mut self) -> Vec<RegistryEvent> {
        self.events.drain(..).collect()
    }
}
