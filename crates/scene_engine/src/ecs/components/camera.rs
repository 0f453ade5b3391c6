//! Camera component

use crate::ecs::Component;
use crate::foundation::math::Mat4;

/// Orthographic scene camera
///
/// The renderer picks the first camera flagged `primary`.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraComponent {
    /// Whether this camera drives the main view
    pub primary: bool,
    /// Keep the aspect ratio when the viewport is resized
    pub fixed_aspect_ratio: bool,
    /// Vertical extent of the view volume
    pub orthographic_size: f32,
    /// Near clip plane
    pub near: f32,
    /// Far clip plane
    pub far: f32,
    /// Width over height
    pub aspect_ratio: f32,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self {
            primary: true,
            fixed_aspect_ratio: false,
            orthographic_size: 10.0,
            near: -1.0,
            far: 1.0,
            aspect_ratio: 16.0 / 9.0,
        }
    }
}

impl CameraComponent {
    /// Update the aspect ratio for a new viewport size
    ///
    /// Ignored when the aspect ratio is fixed or the viewport is degenerate.
    #[allow(clippy::cast_precision_loss)]
    pub fn set_viewport_size(&mut self, width: u32, height: u32) {
        if self.fixed_aspect_ratio || width == 0 || height == 0 {
            return;
        }
        self.aspect_ratio = width as f32 / height as f32;
    }

    /// Orthographic projection matrix
    pub fn projection(&self) -> Mat4 {
        let half_height = self.orthographic_size * 0.5;
        let half_width = half_height * self.aspect_ratio;
        Mat4::new_orthographic(-half_width, half_width, -half_height, half_height, self.near, self.far)
    }
}

impl Component for CameraComponent {}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_viewport_resize_updates_aspect() {
        let mut camera = CameraComponent::default();
        camera.set_viewport_size(800, 400);
        assert_relative_eq!(camera.aspect_ratio, 2.0);

        camera.set_viewport_size(0, 400);
        assert_relative_eq!(camera.aspect_ratio, 2.0);
    }

    #[test]
    fn test_fixed_aspect_is_kept() {
        let mut camera = CameraComponent {
            fixed_aspect_ratio: true,
            aspect_ratio: 1.0,
            ..Default::default()
        };
        camera.set_viewport_size(1920, 1080);
        assert_relative_eq!(camera.aspect_ratio, 1.0);
    }
}
