use bitflags::bitflags;
use glam::{EulerRot, Quat, Vec3};

pub const DEFAULT_HEALTH: f32 = 100.0;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SnapshotFlags: u8 {
        const ATTACKING = 1 << 0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rotator {
    pub pitch: f32,
    pub yaw: f32,
    pub roll: f32,
}

impl Rotator {
    pub fn new(pitch: f32, yaw: f32, roll: f32) -> Self {
        Self { pitch, yaw, roll }
    }

    pub fn to_quat(self) -> Quat {
        Quat::from_euler(
            EulerRot::ZYX,
            self.yaw.to_radians(),
            self.pitch.to_radians(),
            self.roll.to_radians(),
        )
    }

    pub fn from_quat(quat: Quat) -> Self {
        let (yaw, pitch, roll) = quat.to_euler(EulerRot::ZYX);
        Self {
            pitch: pitch.to_degrees(),
            yaw: yaw.to_degrees(),
            roll: roll.to_degrees(),
        }
    }
}

/// Authoritative state of one entity at a server timestamp (seconds).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StateSnapshot {
    pub position: Vec3,
    pub rotation: Quat,
    pub health: f32,
    pub flags: SnapshotFlags,
    pub timestamp: f64,
}

impl Default for StateSnapshot {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            health: DEFAULT_HEALTH,
            flags: SnapshotFlags::empty(),
            timestamp: 0.0,
        }
    }
}

impl StateSnapshot {
    pub fn new(position: Vec3, timestamp: f64) -> Self {
        Self {
            position,
            timestamp,
            ..Default::default()
        }
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_health(mut self, health: f32) -> Self {
        self.health = health;
        self
    }

    pub fn with_flags(mut self, flags: SnapshotFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_attacking(&self) -> bool {
        self.flags.contains(SnapshotFlags::ATTACKING)
    }

    /// Blends two snapshots. Position is lerped and rotation slerped along the
    /// shortest arc; health and flags come from whichever endpoint `alpha` is
    /// nearer to.
    pub fn blend(from: &StateSnapshot, to: &StateSnapshot, alpha: f32) -> StateSnapshot {
        let from_rot = from.rotation.normalize();
        let mut to_rot = to.rotation.normalize();
        if from_rot.dot(to_rot) < 0.0 {
            to_rot = -to_rot;
        }

        let nearest = if alpha > 0.5 { to } else { from };

        StateSnapshot {
            position: from.position.lerp(to.position, alpha),
            rotation: from_rot.slerp(to_rot, alpha),
            health: nearest.health,
            flags: nearest.flags,
            timestamp: from.timestamp + (to.timestamp - from.timestamp) * alpha as f64,
        }
    }
}
