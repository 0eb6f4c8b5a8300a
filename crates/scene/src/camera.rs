//! Fixed pinhole camera used to map between screen points and world space.

use bevy_math::{Vec2, Vec3};
use vision::{ScreenPoint, Viewport};

/// Nodes closer than this to the image plane are not projected.
const NEAR_PLANE_M: f32 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Camera at `position` looking down −Z with +Y up.
///
/// Screen coordinates have their origin at the top-left corner of the
/// viewport with y growing downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PinholeCamera {
    position: Vec3,
    focal_px: f32,
    viewport: Viewport,
}

impl PinholeCamera {
    pub fn new(position: Vec3, focal_px: f32, viewport: Viewport) -> Self {
        Self {
            position,
            focal_px,
            viewport,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn focal_px(&self) -> f32 {
        self.focal_px
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// World-space ray through a screen point.
    pub fn ray(&self, point: ScreenPoint) -> Ray {
        let center = self.viewport.center();
        let direction = Vec3::new(
            (point.x - center.x) / self.focal_px,
            -(point.y - center.y) / self.focal_px,
            -1.0,
        )
        .normalize();
        Ray {
            origin: self.position,
            direction,
        }
    }

    /// Screen point and view depth of a world position, or `None` when it is
    /// behind the camera.
    pub fn project(&self, world: Vec3) -> Option<(ScreenPoint, f32)> {
        let relative = world - self.position;
        let depth = -relative.z;
        if depth <= NEAR_PLANE_M {
            return None;
        }
        let center = self.viewport.center();
        let point = Vec2::new(
            center.x + self.focal_px * relative.x / depth,
            center.y - self.focal_px * relative.y / depth,
        );
        Some((point, depth))
    }

    /// Screen-space length of a world-space length seen at `depth`.
    pub fn scale_at(&self, length: f32, depth: f32) -> f32 {
        self.focal_px * length / depth
    }
}

impl Default for PinholeCamera {
    /// Portrait phone-sized viewport with the camera 1.5 m above the floor.
    fn default() -> Self {
        Self::new(
            Vec3::new(0.0, 1.5, 0.0),
            1000.0,
            Viewport::new(750.0, 1334.0),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> PinholeCamera {
        PinholeCamera::new(Vec3::ZERO, 500.0, Viewport::new(400.0, 800.0))
    }

    #[test]
    fn center_ray_looks_down_negative_z() {
        let ray = camera().ray(Vec2::new(200.0, 400.0));
        assert!((ray.direction - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn projection_inverts_ray() {
        let camera = camera();
        let point = Vec2::new(120.0, 610.0);
        let world = camera.ray(point).at(3.0);
        let (projected, depth) = camera.project(world).expect("in front");
        assert!((projected - point).length() < 1e-3);
        assert!(depth > 0.0);
    }

    #[test]
    fn points_behind_camera_do_not_project() {
        assert_eq!(camera().project(Vec3::new(0.0, 0.0, 1.0)), None);
    }

    #[test]
    fn up_in_world_is_up_on_screen() {
        let (point, _) = camera().project(Vec3::new(0.0, 1.0, -2.0)).expect("in front");
        assert!(point.y < 400.0);
    }
}
