// SPDX-License-Identifier: CEPL-1.0
pub use glam::{Mat4, Quat, Vec3, Vec4};

mod camera;
mod transform;

pub use camera::Camera;
pub use transform::Transform;
