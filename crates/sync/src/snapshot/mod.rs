mod buffer;
mod state;

pub use buffer::{DEFAULT_MAX_SNAPSHOTS, SnapshotBuffer};
pub use state::{DEFAULT_HEALTH, Rotator, SnapshotFlags, StateSnapshot};
