// SPDX-License-Identifier: CEPL-1.0
use eds2_math::Vec4;
use std::fmt::Debug;

/// Surface description attached to a sub-mesh. Only materials with a base
/// colour factor can be drawn by the emitter.
pub trait Material: Debug + Send + Sync {
    fn name(&self) -> &str;
    fn base_color_factor(&self) -> Option<Vec4>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct PbrMaterial {
    pub name: String,
    pub base_color_factor: Vec4,
}

impl PbrMaterial {
    pub fn new(name: impl Into<String>, base_color_factor: Vec4) -> Self {
        Self {
            name: name.into(),
            base_color_factor,
        }
    }
}

impl Material for PbrMaterial {
    fn name(&self) -> &str {
        &self.name
    }

    fn base_color_factor(&self) -> Option<Vec4> {
        Some(self.base_color_factor)
    }
}
