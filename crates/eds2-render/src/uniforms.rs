// SPDX-License-Identifier: CEPL-1.0
use bytemuck::{Pod, Zeroable};

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct BaselineUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
}

/// std140: the trailing scalar is padded out to a full vec4.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub struct TessellationUbo {
    pub projection: [[f32; 4]; 4],
    pub view: [[f32; 4]; 4],
    pub light_pos: [f32; 4],
    pub tessellation_factor: f32,
    pub _pad: [f32; 3],
}

#[derive(Clone, Copy, Debug, Default)]
pub struct FrameUniforms {
    pub baseline: BaselineUbo,
    pub tessellation: TessellationUbo,
}
