// SPDX-License-Identifier: CEPL-1.0
use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

mod command;
mod mesh;
mod uniforms;

pub use command::{CommandSink, DrawIndexed, FrameRecorder, PipelineKind, PushConstantBlock};
pub use mesh::{MeshData, MeshId};
pub use uniforms::{BaselineUbo, FrameUniforms, TessellationUbo};

#[derive(Clone, Copy, Debug)]
pub struct RenderSize {
    pub width: u32,
    pub height: u32,
}

impl RenderSize {
    pub fn aspect(&self) -> f32 {
        self.width.max(1) as f32 / self.height.max(1) as f32
    }
}

/// What happened to a frame handed to [`Renderer::render`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    Presented,
    /// Paused or the surface is zero-sized.
    Skipped,
    /// Command buffers were invalidated (swapchain recreated); call
    /// [`Renderer::record`] before the next frame.
    NeedsRecord,
}

pub trait Renderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        meshes: &[MeshData],
    ) -> Result<Self>
    where
        Self: Sized;

    fn resize(&mut self, size: RenderSize) -> Result<()>;
    fn size(&self) -> RenderSize;

    /// Re-record every per-image command buffer from `frame`.
    fn record(&mut self, frame: &mut dyn FrameRecorder) -> Result<()>;
    fn update_uniforms(&mut self, uniforms: &FrameUniforms) -> Result<()>;

    fn render(&mut self) -> Result<FrameOutcome>;
    fn set_clear_color(&mut self, rgba: [f32; 4]);
    fn set_vsync(&mut self, _on: bool) {}
}
