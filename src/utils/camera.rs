//! Perspective camera that drifts toward the pointer.

use glam::{Mat4, Vec3};

/// Horizontal easing factor per frame
pub const HORIZONTAL_EASING: f32 = 0.05;
/// Vertical easing factor per frame. Deliberately ten times faster than
/// the horizontal one.
pub const VERTICAL_EASING: f32 = 0.5;

/// Divisor converting pointer pixels (from the viewport centre) into
/// world units
const POINTER_SCALE: f32 = 100.0;

/// Pointer position relative to the viewport centre, in world units
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerOffset {
    pub x: f32,
    pub y: f32,
}

impl PointerOffset {
    /// `((px - w/2) / 100, (py - h/2) / 100)` with `py` growing downward
    pub fn from_screen(px: f32, py: f32, width: f32, height: f32) -> Self {
        Self {
            x: (px - width / 2.0) / POINTER_SCALE,
            y: (py - height / 2.0) / POINTER_SCALE,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, -2.0, 14.0),
            target: Vec3::ZERO,
            fov_y_degrees: 45.0,
            aspect: 1.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    /// Exponential smoothing toward the pointer; y follows the inverted
    /// pointer so moving the pointer up raises the camera.
    pub fn ease_toward(&mut self, pointer: PointerOffset) {
        self.position.x += (pointer.x - self.position.x) * HORIZONTAL_EASING;
        self.position.y += (-pointer.y - self.position.y) * VERTICAL_EASING;
    }

    pub fn look_at_origin(&mut self) {
        self.target = Vec3::ZERO;
    }

    /// Ignored while either side is zero so the last valid aspect is kept
    pub fn set_viewport(&mut self, width: f32, height: f32) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect,
            self.near,
            self.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}
