use glam::{Quat, Vec3};

use crate::snapshot::{DEFAULT_MAX_SNAPSHOTS, SnapshotBuffer, StateSnapshot};

pub const DEFAULT_INTERPOLATION_DELAY: f64 = 0.1;
pub const DEFAULT_MAX_EXTRAPOLATION_TIME: f64 = 0.25;
pub const DEFAULT_SNAP_THRESHOLD: f32 = 500.0;
pub const DEFAULT_TIME_CORRECTION_RATE: f64 = 0.1;

const MIN_SAMPLE_SPACING: f64 = 0.001;

#[derive(Debug, Clone)]
pub struct InterpolationConfig {
    pub interpolation_delay: f64,
    pub max_extrapolation_time: f64,
    pub snap_threshold: f32,
    pub max_snapshots: usize,
    pub prune_window: f64,
    pub time_correction_rate: f64,
    pub display_smoothing_rate: f32,
}

impl Default for InterpolationConfig {
    fn default() -> Self {
        Self {
            interpolation_delay: DEFAULT_INTERPOLATION_DELAY,
            max_extrapolation_time: DEFAULT_MAX_EXTRAPOLATION_TIME,
            snap_threshold: DEFAULT_SNAP_THRESHOLD,
            max_snapshots: DEFAULT_MAX_SNAPSHOTS,
            prune_window: 1.0,
            time_correction_rate: DEFAULT_TIME_CORRECTION_RATE,
            display_smoothing_rate: 0.0,
        }
    }
}

/// Client estimate of the server clock. Advances with local ticks and drifts
/// toward newer server timestamps by a fixed fraction of the gap per update.
#[derive(Debug, Clone)]
pub struct ServerClock {
    estimated: f64,
    correction_rate: f64,
    initialized: bool,
}

impl Default for ServerClock {
    fn default() -> Self {
        Self::new(DEFAULT_TIME_CORRECTION_RATE)
    }
}

impl ServerClock {
    pub fn new(correction_rate: f64) -> Self {
        Self {
            estimated: 0.0,
            correction_rate,
            initialized: false,
        }
    }

    pub fn starting_at(time: f64, correction_rate: f64) -> Self {
        Self {
            estimated: time,
            correction_rate,
            initialized: true,
        }
    }

    pub fn advance(&mut self, dt: f64) {
        if self.initialized {
            self.estimated += dt;
        }
    }

    pub fn observe(&mut self, timestamp: f64) {
        if !self.initialized {
            self.estimated = timestamp;
            self.initialized = true;
            return;
        }

        if timestamp > self.estimated {
            self.estimated += (timestamp - self.estimated) * self.correction_rate;
        }
    }

    pub fn estimated(&self) -> f64 {
        self.estimated
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn reset(&mut self) {
        self.estimated = 0.0;
        self.initialized = false;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderPose {
    pub position: Vec3,
    pub rotation: Quat,
}

impl From<&StateSnapshot> for RenderPose {
    fn from(snapshot: &StateSnapshot) -> Self {
        Self {
            position: snapshot.position,
            rotation: snapshot.rotation,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleKind {
    Single,
    BeforeBuffer,
    Interpolated { alpha: f32 },
    Extrapolated { ahead: f64 },
    Frozen,
}

#[derive(Debug, Clone)]
pub struct SnapshotInterpolator {
    config: InterpolationConfig,
    buffer: SnapshotBuffer,
    pose: Option<StateSnapshot>,
    displayed: Option<RenderPose>,
    last_sample: Option<SampleKind>,
    last_server_time: f64,
    last_render_time: f64,
    snapped_last_update: bool,
}

impl SnapshotInterpolator {
    pub fn new(config: InterpolationConfig) -> Self {
        Self {
            buffer: SnapshotBuffer::new(config.max_snapshots),
            config,
            pose: None,
            displayed: None,
            last_sample: None,
            last_server_time: 0.0,
            last_render_time: 0.0,
            snapped_last_update: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(InterpolationConfig::default())
    }

    pub fn push_snapshot(&mut self, snapshot: StateSnapshot) {
        let evicted = self.buffer.push(snapshot);
        if evicted > 0 {
            log::trace!("Snapshot buffer full, evicted {} oldest", evicted);
        }
    }

    pub fn sample(&self, render_time: f64) -> Option<(StateSnapshot, SampleKind)> {
        match self.buffer.len() {
            0 => return None,
            1 => return self.buffer.latest().map(|s| (*s, SampleKind::Single)),
            _ => {}
        }

        let Some(from_idx) = self.buffer.index_at_or_before(render_time) else {
            return self.buffer.oldest().map(|s| (*s, SampleKind::BeforeBuffer));
        };

        if from_idx + 1 >= self.buffer.len() {
            return self.extrapolate(render_time);
        }

        let from = self.buffer.get(from_idx)?;
        let to = self.buffer.get(from_idx + 1)?;

        let duration = to.timestamp - from.timestamp;
        if duration <= MIN_SAMPLE_SPACING {
            return Some((*to, SampleKind::Interpolated { alpha: 1.0 }));
        }

        let alpha = ((render_time - from.timestamp) / duration).clamp(0.0, 1.0) as f32;
        Some((
            StateSnapshot::blend(from, to, alpha),
            SampleKind::Interpolated { alpha },
        ))
    }

    fn extrapolate(&self, render_time: f64) -> Option<(StateSnapshot, SampleKind)> {
        let (previous, latest) = self.buffer.latest_pair()?;
        let ahead = render_time - latest.timestamp;

        if ahead > self.config.max_extrapolation_time {
            return Some((*latest, SampleKind::Frozen));
        }

        let spacing = latest.timestamp - previous.timestamp;
        if spacing <= MIN_SAMPLE_SPACING {
            return Some((*latest, SampleKind::Extrapolated { ahead: 0.0 }));
        }

        let velocity = (latest.position - previous.position) / spacing as f32;
        let mut pose = *latest;
        pose.position = latest.position + velocity * ahead as f32;

        Some((pose, SampleKind::Extrapolated { ahead }))
    }

    /// Advances the interpolator to `estimated_server_time`. Returns the new
    /// computed pose, or the last held pose when nothing is buffered.
    pub fn update(&mut self, estimated_server_time: f64, dt: f32) -> Option<&StateSnapshot> {
        let render_time = estimated_server_time - self.config.interpolation_delay;
        self.last_server_time = estimated_server_time;
        self.last_render_time = render_time;
        self.snapped_last_update = false;

        let Some((pose, kind)) = self.sample(render_time) else {
            return self.pose.as_ref();
        };

        self.pose = Some(pose);
        self.last_sample = Some(kind);
        self.apply_display(&pose, dt);

        if self.buffer.len() >= 2 {
            self.buffer.prune_older_than(render_time - self.config.prune_window);
        }

        self.pose.as_ref()
    }

    fn apply_display(&mut self, pose: &StateSnapshot, dt: f32) {
        let target = RenderPose::from(pose);

        let Some(displayed) = self.displayed.as_mut() else {
            self.displayed = Some(target);
            return;
        };

        let distance = displayed.position.distance(target.position);
        if distance > self.config.snap_threshold {
            log::info!("Snapping displayed pose (distance: {:.1})", distance);
            *displayed = target;
            self.snapped_last_update = true;
            return;
        }

        let rate = self.config.display_smoothing_rate;
        if rate <= 0.0 {
            *displayed = target;
            return;
        }

        let t = 1.0 - (-rate * dt.max(0.0)).exp();
        displayed.position = displayed.position.lerp(target.position, t);
        displayed.rotation = displayed.rotation.slerp(target.rotation, t);
    }

    pub fn set_displayed(&mut self, pose: RenderPose) {
        self.displayed = Some(pose);
    }

    pub fn displayed(&self) -> Option<RenderPose> {
        self.displayed
    }

    pub fn pose(&self) -> Option<&StateSnapshot> {
        self.pose.as_ref()
    }

    pub fn buffer(&self) -> &SnapshotBuffer {
        &self.buffer
    }

    pub fn config(&self) -> &InterpolationConfig {
        &self.config
    }

    pub fn snapped_last_update(&self) -> bool {
        self.snapped_last_update
    }

    pub fn reset(&mut self) {
        self.buffer.clear();
        self.pose = None;
        self.displayed = None;
        self.last_sample = None;
        self.last_server_time = 0.0;
        self.last_render_time = 0.0;
        self.snapped_last_update = false;
    }

    pub fn debug_stats(&self) -> InterpolationStats {
        InterpolationStats {
            buffer_size: self.buffer.len(),
            server_time: self.last_server_time,
            render_time: self.last_render_time,
            last_sample: self.last_sample,
            is_extrapolating: matches!(self.last_sample, Some(SampleKind::Extrapolated { .. })),
            snapped: self.snapped_last_update,
        }
    }
}

#[derive(Debug, Clone)]
pub struct InterpolationStats {
    pub buffer_size: usize,
    pub server_time: f64,
    pub render_time: f64,
    pub last_sample: Option<SampleKind>,
    pub is_extrapolating: bool,
    pub snapped: bool,
}
