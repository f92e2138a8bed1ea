pub mod error;
pub mod interpolation;
pub mod net;
pub mod prediction;
pub mod registry;
pub mod session;
pub mod snapshot;

pub use error::ProtocolError;
pub use interpolation::{
    InterpolationConfig, InterpolationStats, RenderPose, SampleKind, ServerClock,
    SnapshotInterpolator,
};
pub use net::{
    ConnectionConfig, ConnectionEvent, ConnectionManager, ConnectionState, ConnectionStats,
    DisconnectReason, PendingCall, PlayerRow, ReconnectBackoff, Transport, TransportEvent,
};
pub use prediction::{LocalPrediction, PredictionConfig, Reconciliation};
pub use registry::{
    EntityId, EntityRegistry, PoseSink, PresentationHandle, RegistryEvent, RemoteEntityState,
};
pub use session::{SessionConfig, SyncSession};
pub use snapshot::{Rotator, SnapshotBuffer, SnapshotFlags, StateSnapshot};
