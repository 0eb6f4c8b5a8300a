//! Simulated world tracking: static feature points and horizontal planes
//! observed through a [`PinholeCamera`].

use bevy_math::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use vision::{
    HitTestMode, PlaneDetection, ScreenPoint, SpatialResolver, TrackingConfig, TrackingSession,
};

use crate::camera::{PinholeCamera, Ray};

/// Maximum perpendicular distance between a view ray and a feature point for
/// the point to count as hit.
pub const FEATURE_TOLERANCE_M: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
/// Axis-aligned horizontal plane with a finite extent in X and Z.
pub struct HorizontalPlane {
    pub center: Vec3,
    pub extent: Vec2,
}

impl HorizontalPlane {
    pub fn new(center: Vec3, extent: Vec2) -> Self {
        Self { center, extent }
    }

    /// Distance along `ray` to where it crosses the plane inside its extent.
    fn intersect(&self, ray: &Ray) -> Option<f32> {
        if ray.direction.y.abs() <= f32::EPSILON {
            return None;
        }
        let t = (self.center.y - ray.origin.y) / ray.direction.y;
        if t <= 0.0 {
            return None;
        }
        let point = ray.at(t);
        let within_x = (point.x - self.center.x).abs() <= self.extent.x / 2.0;
        let within_z = (point.z - self.center.z).abs() <= self.extent.y / 2.0;
        (within_x && within_z).then_some(t)
    }
}

pub struct SimulatedTracking {
    camera: PinholeCamera,
    feature_points: Vec<Vec3>,
    planes: Vec<HorizontalPlane>,
    active: Option<TrackingConfig>,
}

impl SimulatedTracking {
    pub fn new(camera: PinholeCamera) -> Self {
        Self {
            camera,
            feature_points: Vec::new(),
            planes: Vec::new(),
            active: None,
        }
    }

    pub fn with_feature_points(mut self, points: impl IntoIterator<Item = Vec3>) -> Self {
        self.feature_points.extend(points);
        self
    }

    pub fn with_planes(mut self, planes: impl IntoIterator<Item = HorizontalPlane>) -> Self {
        self.planes.extend(planes);
        self
    }

    pub fn camera(&self) -> &PinholeCamera {
        &self.camera
    }

    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    fn detects_planes(&self) -> bool {
        matches!(
            self.active,
            Some(TrackingConfig {
                plane_detection: PlaneDetection::Horizontal
            })
        )
    }

    fn nearest_feature(&self, ray: &Ray) -> Option<Vec3> {
        self.feature_points
            .iter()
            .filter_map(|&point| {
                let t = (point - ray.origin).dot(ray.direction);
                if t <= 0.0 {
                    return None;
                }
                let offset = (ray.at(t) - point).length();
                (offset <= FEATURE_TOLERANCE_M).then_some((t, point))
            })
            .min_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, point)| point)
    }

    fn nearest_plane(&self, ray: &Ray) -> Option<Vec3> {
        self.planes
            .iter()
            .filter_map(|plane| plane.intersect(ray))
            .min_by(f32::total_cmp)
            .map(|t| ray.at(t))
    }
}

impl SpatialResolver for SimulatedTracking {
    fn hit_test(&self, point: ScreenPoint, mode: HitTestMode) -> Option<Vec3> {
        if !self.is_running() {
            return None;
        }
        let ray = self.camera.ray(point);
        match mode {
            HitTestMode::FeaturePoint => self
                .nearest_feature(&ray)
                .or_else(|| self.detects_planes().then(|| self.nearest_plane(&ray)).flatten()),
            HitTestMode::ExistingPlane if self.detects_planes() => self.nearest_plane(&ray),
            HitTestMode::ExistingPlane => None,
        }
    }
}

impl TrackingSession for SimulatedTracking {
    fn run(&mut self, config: TrackingConfig) {
        info!(
            feature_points = self.feature_points.len(),
            planes = self.planes.len(),
            "World tracking running with {:?} plane detection",
            config.plane_detection
        );
        self.active = Some(config);
    }

    fn pause(&mut self) {
        if self.active.take().is_some() {
            debug!("World tracking paused");
        }
    }
}
