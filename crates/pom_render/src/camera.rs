//! Orbit camera that produces one primary ray per pixel.

use glam::{Quat, Vec3};

/// A ray with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Distance along the ray to a plane, if it is hit in front of the origin.
    pub fn intersect_plane(&self, point: Vec3, normal: Vec3) -> Option<f32> {
        let denom = self.direction.dot(normal);
        if denom.abs() < 1e-8 {
            return None;
        }
        let t = (point - self.origin).dot(normal) / denom;
        (t > 0.0).then_some(t)
    }
}

/// Camera orbiting a target with configurable FOV.
#[derive(Debug, Clone)]
pub struct OrbitCamera {
    pub target: Vec3,
    /// Rotation around +Y in radians.
    pub yaw: f32,
    /// Elevation above the XZ plane in radians.
    pub pitch: f32,
    pub distance: f32,
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    /// Aspect ratio (width / height).
    pub aspect: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            target: Vec3::ZERO,
            yaw: 0.0,
            pitch: 0.6,
            distance: 2.5,
            fov_degrees: 45.0,
            aspect: 16.0 / 9.0,
        }
    }
}

impl OrbitCamera {
    /// Update aspect ratio (call on output resize).
    pub fn set_aspect(&mut self, width: u32, height: u32) {
        self.aspect = width as f32 / height.max(1) as f32;
    }

    fn orientation(&self) -> Quat {
        // Clamp pitch to prevent flipping over the poles.
        let max_pitch = std::f32::consts::FRAC_PI_2 - 0.01;
        Quat::from_rotation_y(self.yaw) * Quat::from_rotation_x(-self.pitch.clamp(-max_pitch, max_pitch))
    }

    /// World position of the eye.
    pub fn position(&self) -> Vec3 {
        self.target + self.orientation() * Vec3::Z * self.distance
    }

    /// Primary ray through the pixel at `(x, y)`; fractional coordinates are allowed
    /// and `(0.5, 0.5)` is the center of the top-left pixel.
    pub fn ray(&self, x: f32, y: f32, width: u32, height: u32) -> Ray {
        let ndc_x = 2.0 * x / width.max(1) as f32 - 1.0;
        let ndc_y = 1.0 - 2.0 * y / height.max(1) as f32;
        let half_height = (self.fov_degrees.to_radians() * 0.5).tan();
        let local = Vec3::new(ndc_x * half_height * self.aspect, ndc_y * half_height, -1.0);
        Ray {
            origin: self.position(),
            direction: (self.orientation() * local).normalize(),
        }
    }
}
