use std::collections::VecDeque;

use glam::{Quat, Vec3};

use crate::snapshot::{DEFAULT_HEALTH, SnapshotFlags, StateSnapshot};

pub const DEFAULT_MAX_RECORDED_INPUTS: usize = 64;
pub const DEFAULT_CORRECTION_THRESHOLD: f32 = 10.0;
pub const DEFAULT_CORRECTION_FACTOR: f32 = 0.3;

#[derive(Debug, Clone)]
pub struct PredictionConfig {
    pub max_recorded_inputs: usize,
    pub correction_threshold: f32,
    pub correction_factor: f32,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            max_recorded_inputs: DEFAULT_MAX_RECORDED_INPUTS,
            correction_threshold: DEFAULT_CORRECTION_THRESHOLD,
            correction_factor: DEFAULT_CORRECTION_FACTOR,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct RecordedInput {
    velocity: Vec3,
    rotation: Quat,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reconciliation {
    Corrected { error: f32, position: Vec3 },
    WithinTolerance { error: f32 },
}

/// Prediction state for the locally controlled entity: inputs are applied
/// immediately and the displayed position is pulled toward the server's
/// authoritative position when they diverge.
#[derive(Debug, Clone)]
pub struct LocalPrediction {
    config: PredictionConfig,
    recorded_inputs: VecDeque<RecordedInput>,
    last_acknowledged_index: usize,
    position: Vec3,
    rotation: Quat,
    health: f32,
    flags: SnapshotFlags,
}

impl Default for LocalPrediction {
    fn default() -> Self {
        Self::new(PredictionConfig::default())
    }
}

impl LocalPrediction {
    pub fn new(config: PredictionConfig) -> Self {
        Self {
            recorded_inputs: VecDeque::with_capacity(config.max_recorded_inputs),
            config,
            last_acknowledged_index: 0,
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            health: DEFAULT_HEALTH,
            flags: SnapshotFlags::empty(),
        }
    }

    pub fn record_input(&mut self, velocity: Vec3, rotation: Quat) {
        self.recorded_inputs.push_back(RecordedInput { velocity, rotation });

        while self.recorded_inputs.len() > self.config.max_recorded_inputs {
            self.recorded_inputs.pop_front();
            self.last_acknowledged_index = self.last_acknowledged_index.saturating_sub(1);
        }
    }

    pub fn advance(&mut self, dt: f32) {
        if let Some(input) = self.recorded_inputs.back() {
            self.position += input.velocity * dt;
            self.rotation = input.rotation;
        }
    }

    pub fn acknowledge(&mut self, index: usize) {
        self.last_acknowledged_index = index.min(self.recorded_inputs.len());
    }

    pub fn reconcile(&mut self, server_state: &StateSnapshot) -> Reconciliation {
        self.health = server_state.health;
        self.flags = server_state.flags;

        let error = self.position.distance(server_state.position);
        if error <= self.config.correction_threshold {
            return Reconciliation::WithinTolerance { error };
        }

        log::info!("Server reconciliation: position error {:.2}, correcting", error);

        self.position = self
            .position
            .lerp(server_state.position, self.config.correction_factor);
        self.recorded_inputs.clear();
        self.last_acknowledged_index = 0;

        Reconciliation::Corrected {
            error,
            position: self.position,
        }
    }

    pub fn set_displayed_position(&mut self, position: Vec3) {
        self.position = position;
    }

    pub fn displayed_position(&self) -> Vec3 {
        self.position
    }

    pub fn displayed_rotation(&self) -> Quat {
        self.rotation
    }

    pub fn health(&self) -> f32 {
        self.health
    }

    pub fn flags(&self) -> SnapshotFlags {
        self.flags
    }

    pub fn recorded_input_count(&self) -> usize {
        self.recorded_inputs.len()
    }

    pub fn last_acknowledged_index(&self) -> usize {
        self.last_acknowledged_index
    }

    pub fn reset(&mut self) {
        self.recorded_inputs.clear();
        self.last_acknowledged_index = 0;
        self.position = Vec3::ZERO;
        self.rotation = Quat::IDENTITY;
        self.health = DEFAULT_HEALTH;
        self.flags = SnapshotFlags::empty();
    }
}
