//! Screen-to-world resolution and tracking lifecycle seams.

use bevy_math::{Vec2, Vec3};
use serde::Serialize;

/// Point in view coordinates, origin at the top-left corner.
pub type ScreenPoint = Vec2;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
/// Size of the rendered view in points.
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> ScreenPoint {
        Vec2::new(self.width * 0.5, self.height * 0.5)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// Which tracking query backs a hit test.
pub enum HitTestMode {
    /// Nearest reconstructed feature point, independent of planes.
    FeaturePoint,
    /// Surfaces already classified as planes, within their extent.
    ExistingPlane,
}

/// Resolves a screen point to a world position using the tracking subsystem.
pub trait SpatialResolver {
    /// Closest hit under `point`, or `None` when nothing is there yet.
    fn hit_test(&self, point: ScreenPoint, mode: HitTestMode) -> Option<Vec3>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PlaneDetection {
    Disabled,
    Horizontal,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
/// World tracking configuration requested when the view becomes active.
pub struct TrackingConfig {
    pub plane_detection: PlaneDetection,
}

impl TrackingConfig {
    /// World tracking with horizontal plane detection.
    pub fn world_with_horizontal_planes() -> Self {
        Self {
            plane_detection: PlaneDetection::Horizontal,
        }
    }
}

/// Lifecycle of the underlying world-tracking session.
pub trait TrackingSession {
    fn run(&mut self, config: TrackingConfig);
    fn pause(&mut self);
}
