//! Scene labelling pipeline: background classification, anchored labels and
//! object placement, independent of any concrete rendering or tracking engine.
//!
//! The render/interaction context is [`ArSession`]; inference runs on its own
//! thread and hands results over through [`PredictionState`].

pub mod anchors;
pub mod annotation;
pub mod config;
pub mod inference;
pub mod placement;
pub mod prediction;
pub mod render;
pub mod session;
pub mod spatial;
pub mod telemetry;
pub mod watchdog;

#[cfg(test)]
mod testing;

pub use anchors::{Anchor, AnchorSet};
pub use annotation::{TickOutcome, annotate};
pub use config::{SessionConfig, TelemetryOptions};
pub use inference::{CycleOutcome, InferenceHandle, InferenceLoop};
pub use placement::{PlaceOutcome, PlacementState, PlacementStateMachine, SelectOutcome};
pub use prediction::{PredictionPublisher, PredictionState, PredictionUpdate};
pub use render::{
    BillboardAxes, DebugSurface, LabelNode, LabelStyle, NodeHit, NodeId, NodeIdentity,
    ObjectLibrary, ObjectNode, ObjectTemplate, Renderer,
};
pub use session::{ArSession, Collaborators, SessionSnapshot};
pub use spatial::{
    HitTestMode, PlaneDetection, ScreenPoint, SpatialResolver, TrackingConfig, TrackingSession,
    Viewport,
};
pub use watchdog::InferenceHealth;
