// SPDX-License-Identifier: CEPL-1.0
use crate::MeshId;
use bytemuck::{Pod, Zeroable};

/// The two graphics pipelines every frame draws with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PipelineKind {
    Baseline,
    Tessellation,
}

/// Per-object push constant payload: model matrix followed by RGBA colour.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct PushConstantBlock {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DrawIndexed {
    pub mesh: MeshId,
    pub index_count: u32,
}

/// Command stream a frame is recorded into. Calls land in the stream in the
/// order they are made.
pub trait CommandSink {
    fn bind_pipeline(&mut self, kind: PipelineKind);
    fn set_patch_control_points(&mut self, count: u32);
    fn set_depth_bias_enable(&mut self, enable: bool);
    fn set_rasterizer_discard_enable(&mut self, enable: bool);
    fn push_constants(&mut self, block: &PushConstantBlock);
    fn draw_indexed(&mut self, draw: DrawIndexed);
}

/// Produces the scene portion of a frame. Called once per swapchain image
/// whenever the renderer re-records.
pub trait FrameRecorder {
    fn record(&mut self, sink: &mut dyn CommandSink) -> anyhow::Result<()>;
}
