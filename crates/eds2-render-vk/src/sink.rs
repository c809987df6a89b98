// SPDX-License-Identifier: CEPL-1.0
use crate::frame::FrameResources;
use crate::memory::GpuMesh;
use crate::pipeline::PipelineSet;
use ash::ext::extended_dynamic_state2;
use ash::vk;
use eds2_render::{CommandSink, DrawIndexed, PipelineKind, PushConstantBlock};
use tracing::warn;

/// Clamp a requested patch size into `1..=max_patch_size`.
pub(crate) fn clamp_patch_control_points(count: u32, max_patch_size: u32) -> u32 {
    count.clamp(1, max_patch_size.max(1))
}

/// Turns [`CommandSink`] calls into commands on one primary command buffer
/// inside an active dynamic-rendering pass.
pub(crate) struct VkCommandSink<'a> {
    pub device: &'a ash::Device,
    pub eds2: &'a extended_dynamic_state2::Device,
    pub cmd: vk::CommandBuffer,
    pub pipelines: &'a PipelineSet,
    pub frame: &'a FrameResources,
    pub meshes: &'a [GpuMesh],
    pub max_patch_size: u32,
    pub bound: Option<PipelineKind>,
}

impl CommandSink for VkCommandSink<'_> {
    fn bind_pipeline(&mut self, kind: PipelineKind) {
        let p = self.pipelines.get(kind);
        let set = self.frame.set(kind);
        unsafe {
            self.device
                .cmd_bind_pipeline(self.cmd, vk::PipelineBindPoint::GRAPHICS, p.pipeline);
            self.device.cmd_bind_descriptor_sets(
                self.cmd,
                vk::PipelineBindPoint::GRAPHICS,
                p.layout,
                0,
                std::slice::from_ref(&set),
                &[],
            );
        }
        self.bound = Some(kind);
    }

    fn set_patch_control_points(&mut self, count: u32) {
        let clamped = clamp_patch_control_points(count, self.max_patch_size);
        if clamped != count {
            warn!(count, clamped, "patch control points out of device range");
        }
        unsafe { self.eds2.cmd_set_patch_control_points(self.cmd, clamped) };
    }

    fn set_depth_bias_enable(&mut self, enable: bool) {
        unsafe { self.eds2.cmd_set_depth_bias_enable(self.cmd, enable) };
    }

    fn set_rasterizer_discard_enable(&mut self, enable: bool) {
        unsafe { self.eds2.cmd_set_rasterizer_discard_enable(self.cmd, enable) };
    }

    fn push_constants(&mut self, block: &PushConstantBlock) {
        let Some(kind) = self.bound else {
            warn!("push_constants with no pipeline bound; dropped");
            return;
        };
        let p = self.pipelines.get(kind);
        unsafe {
            self.device.cmd_push_constants(
                self.cmd,
                p.layout,
                p.push_stages,
                0,
                bytemuck::bytes_of(block),
            );
        }
    }

    fn draw_indexed(&mut self, draw: DrawIndexed) {
        if self.bound.is_none() {
            warn!(mesh = draw.mesh.0, "draw with no pipeline bound; dropped");
            return;
        }
        let Some(mesh) = self.meshes.get(draw.mesh.0) else {
            warn!(mesh = draw.mesh.0, "draw of unknown mesh; dropped");
            return;
        };
        let count = draw.index_count.min(mesh.index_count);
        let buffers = [mesh.positions.0, mesh.normals.0];
        let offsets = [0_u64; 2];
        unsafe {
            self.device
                .cmd_bind_vertex_buffers(self.cmd, 0, &buffers, &offsets);
            self.device
                .cmd_bind_index_buffer(self.cmd, mesh.indices.0, 0, vk::IndexType::UINT32);
            self.device.cmd_draw_indexed(self.cmd, count, 1, 0, 0, 0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_size_passes_through_in_range() {
        assert_eq!(clamp_patch_control_points(3, 32), 3);
        assert_eq!(clamp_patch_control_points(32, 32), 32);
    }

    #[test]
    fn patch_size_clamps_to_device_limits() {
        assert_eq!(clamp_patch_control_points(0, 32), 1);
        assert_eq!(clamp_patch_control_points(64, 32), 32);
    }

    #[test]
    fn zero_device_limit_still_yields_one() {
        assert_eq!(clamp_patch_control_points(5, 0), 1);
    }
}
