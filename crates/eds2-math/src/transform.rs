// SPDX-License-Identifier: CEPL-1.0
use glam::{Mat4, Quat, Vec3};

/// Translation / rotation / scale of a single scene node.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Self::IDENTITY
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn translation(&self) -> Vec3 {
        self.translation
    }

    pub fn set_translation(&mut self, translation: Vec3) {
        self.translation = translation;
    }

    /// T * R * S
    pub fn world_matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_is_identity_matrix() {
        assert_eq!(Transform::default().world_matrix(), Mat4::IDENTITY);
    }

    #[test]
    fn world_matrix_applies_scale_before_translation() {
        let t = Transform::from_translation(Vec3::new(1.0, 2.0, 3.0)).with_scale(Vec3::splat(2.0));
        let p = t.world_matrix().transform_point3(Vec3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(p.x, 3.0);
        assert_relative_eq!(p.y, 2.0);
        assert_relative_eq!(p.z, 3.0);
    }

    #[test]
    fn set_translation_only_moves_origin() {
        let mut t = Transform::IDENTITY.with_scale(Vec3::new(1.0, 0.5, 1.0));
        t.set_translation(Vec3::X);
        assert_eq!(t.translation(), Vec3::X);
        assert_eq!(t.scale, Vec3::new(1.0, 0.5, 1.0));
    }
}
