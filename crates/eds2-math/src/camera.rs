// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Vec3};

/// Fixed look-at camera. Projection targets Vulkan clip space
/// (depth 0..1, Y pointing down in NDC).
#[derive(Clone, Copy, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_y_deg: f32,
    pub z_near: f32,
    pub z_far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            eye: Vec3::new(2.0, 4.0, -10.0),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_y_deg: 60.0,
            z_near: 0.1,
            z_far: 256.0,
        }
    }
}

impl Camera {
    pub fn view(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn projection(&self, aspect: f32) -> Mat4 {
        let mut proj = Mat4::perspective_rh(
            self.fov_y_deg.to_radians(),
            aspect.max(f32::EPSILON),
            self.z_near,
            self.z_far,
        );
        // GL-style up vs Vulkan's down-pointing Y
        proj.y_axis.y *= -1.0;
        proj
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn target_projects_to_screen_centre() {
        let cam = Camera::default();
        let clip = cam.projection(16.0 / 9.0) * cam.view() * cam.target.extend(1.0);
        assert_relative_eq!(clip.x / clip.w, 0.0, epsilon = 1e-5);
        assert_relative_eq!(clip.y / clip.w, 0.0, epsilon = 1e-5);
        let depth = clip.z / clip.w;
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn projection_flips_y() {
        let cam = Camera {
            eye: Vec3::new(0.0, 0.0, 5.0),
            ..Camera::default()
        };
        let above = cam.projection(1.0) * cam.view() * Vec3::new(0.0, 1.0, 0.0).extend(1.0);
        assert!(above.y / above.w < 0.0);
    }
}
