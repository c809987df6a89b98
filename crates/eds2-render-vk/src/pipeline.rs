// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, Result};
use ash::util::read_spv;
use ash::vk;
use eds2_render::{PipelineKind, PushConstantBlock};
use std::ffi::CStr;
use std::io::Cursor;
use std::{fs, path::Path, path::PathBuf};
use tracing::debug;

const ENTRY: &CStr = c"main";

const BASELINE_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/baseline.vert.spv"));
const BASELINE_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/baseline.frag.spv"));
const TESS_VERT: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tess.vert.spv"));
const TESS_CTRL: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tess.tesc.spv"));
const TESS_EVAL: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tess.tese.spv"));
const TESS_FRAG: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/tess.frag.spv"));

/// Control points baked into the tessellation state; the recorded
/// `set_patch_control_points` value overrides it.
pub(crate) const STATIC_PATCH_CONTROL_POINTS: u32 = 3;

fn hex_bytes(b: &[u8]) -> String {
    let mut s = String::with_capacity(b.len() * 2);
    for x in b {
        use std::fmt::Write as _;
        let _ = write!(&mut s, "{:02x}", x);
    }
    s
}

pub(crate) fn pipeline_cache_path(props: &vk::PhysicalDeviceProperties) -> PathBuf {
    let uuid = hex_bytes(&props.pipeline_cache_uuid);
    PathBuf::from(format!(
        "vk_pipeline_cache_{:04x}_{:04x}_{:08x}_{}.bin",
        props.vendor_id, props.device_id, props.driver_version, uuid
    ))
}

pub(crate) unsafe fn create_or_load_pipeline_cache(
    device: &ash::Device,
    path: &Path,
) -> Result<vk::PipelineCache> {
    let data = fs::read(path).ok();
    let (p_initial_data, initial_data_size) = match data {
        Some(ref bytes) => (bytes.as_ptr() as *const std::ffi::c_void, bytes.len()),
        None => (std::ptr::null(), 0),
    };
    debug!(path = %path.display(), bytes = initial_data_size, "pipeline cache");
    let ci = vk::PipelineCacheCreateInfo {
        s_type: vk::StructureType::PIPELINE_CACHE_CREATE_INFO,
        initial_data_size,
        p_initial_data,
        ..Default::default()
    };
    Ok(device.create_pipeline_cache(&ci, None)?)
}

pub(crate) unsafe fn save_pipeline_cache(
    device: &ash::Device,
    cache: vk::PipelineCache,
    path: &Path,
) -> Result<()> {
    // drivers may refuse when the cache is empty or the device is lost
    if let Ok(bytes) = device.get_pipeline_cache_data(cache) {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        fs::write(path, &bytes)?;
    }
    Ok(())
}

/// Dynamic states a pipeline of `kind` is created with.
pub(crate) fn dynamic_states(kind: PipelineKind) -> Vec<vk::DynamicState> {
    let mut states = vec![
        vk::DynamicState::VIEWPORT,
        vk::DynamicState::SCISSOR,
        vk::DynamicState::DEPTH_BIAS_ENABLE,
        vk::DynamicState::RASTERIZER_DISCARD_ENABLE,
    ];
    if kind == PipelineKind::Tessellation {
        states.push(vk::DynamicState::PATCH_CONTROL_POINTS_EXT);
    }
    states
}

/// Stages that read the push constant block.
pub(crate) fn push_constant_stages(kind: PipelineKind) -> vk::ShaderStageFlags {
    match kind {
        PipelineKind::Baseline => vk::ShaderStageFlags::VERTEX,
        PipelineKind::Tessellation => {
            vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::TESSELLATION_EVALUATION
        }
    }
}

/// Stages that read the set 0 binding 0 uniform buffer.
pub(crate) fn uniform_stages(kind: PipelineKind) -> vk::ShaderStageFlags {
    match kind {
        PipelineKind::Baseline => vk::ShaderStageFlags::VERTEX,
        PipelineKind::Tessellation => {
            vk::ShaderStageFlags::TESSELLATION_CONTROL
                | vk::ShaderStageFlags::TESSELLATION_EVALUATION
                | vk::ShaderStageFlags::FRAGMENT
        }
    }
}

fn stage_sources(kind: PipelineKind) -> Vec<(vk::ShaderStageFlags, &'static [u8])> {
    match kind {
        PipelineKind::Baseline => vec![
            (vk::ShaderStageFlags::VERTEX, BASELINE_VERT),
            (vk::ShaderStageFlags::FRAGMENT, BASELINE_FRAG),
        ],
        PipelineKind::Tessellation => vec![
            (vk::ShaderStageFlags::VERTEX, TESS_VERT),
            (vk::ShaderStageFlags::TESSELLATION_CONTROL, TESS_CTRL),
            (vk::ShaderStageFlags::TESSELLATION_EVALUATION, TESS_EVAL),
            (vk::ShaderStageFlags::FRAGMENT, TESS_FRAG),
        ],
    }
}

unsafe fn create_shader_module(device: &ash::Device, bytes: &[u8]) -> Result<vk::ShaderModule> {
    let code = read_spv(&mut Cursor::new(bytes))?;
    let ci = vk::ShaderModuleCreateInfo {
        s_type: vk::StructureType::SHADER_MODULE_CREATE_INFO,
        p_code: code.as_ptr(),
        code_size: code.len() * 4,
        ..Default::default()
    };
    Ok(device.create_shader_module(&ci, None)?)
}

unsafe fn create_set_layout(
    device: &ash::Device,
    stages: vk::ShaderStageFlags,
) -> Result<vk::DescriptorSetLayout> {
    let binding = vk::DescriptorSetLayoutBinding {
        binding: 0,
        descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
        descriptor_count: 1,
        stage_flags: stages,
        ..Default::default()
    };
    let ci = vk::DescriptorSetLayoutCreateInfo {
        s_type: vk::StructureType::DESCRIPTOR_SET_LAYOUT_CREATE_INFO,
        binding_count: 1,
        p_bindings: &binding,
        ..Default::default()
    };
    Ok(device.create_descriptor_set_layout(&ci, None)?)
}

/// Formats and modes a pipeline build depends on.
#[derive(Clone, Copy, Debug)]
pub(crate) struct PipelineTargets {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    /// Draw tessellated patches as lines (needs `fillModeNonSolid`).
    pub wireframe: bool,
}

pub(crate) struct GraphicsPipeline {
    pub set_layout: vk::DescriptorSetLayout,
    pub layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub push_stages: vk::ShaderStageFlags,
}

impl GraphicsPipeline {
    unsafe fn new(
        device: &ash::Device,
        cache: vk::PipelineCache,
        kind: PipelineKind,
        targets: PipelineTargets,
    ) -> Result<Self> {
        let set_layout = create_set_layout(device, uniform_stages(kind))?;
        let push_stages = push_constant_stages(kind);
        let push_range = vk::PushConstantRange {
            stage_flags: push_stages,
            offset: 0,
            size: std::mem::size_of::<PushConstantBlock>() as u32,
        };
        let layout_info = vk::PipelineLayoutCreateInfo {
            s_type: vk::StructureType::PIPELINE_LAYOUT_CREATE_INFO,
            set_layout_count: 1,
            p_set_layouts: &set_layout,
            push_constant_range_count: 1,
            p_push_constant_ranges: &push_range,
            ..Default::default()
        };
        let layout = match device.create_pipeline_layout(&layout_info, None) {
            Ok(l) => l,
            Err(e) => {
                device.destroy_descriptor_set_layout(set_layout, None);
                return Err(e.into());
            }
        };
        match create_pipeline(device, cache, kind, layout, targets) {
            Ok(pipeline) => Ok(Self {
                set_layout,
                layout,
                pipeline,
                push_stages,
            }),
            Err(e) => {
                device.destroy_pipeline_layout(layout, None);
                device.destroy_descriptor_set_layout(set_layout, None);
                Err(e)
            }
        }
    }

    unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_pipeline(self.pipeline, None);
        device.destroy_pipeline_layout(self.layout, None);
        device.destroy_descriptor_set_layout(self.set_layout, None);
    }
}

// STRICT: color_attachment_formats MUST match the current swapchain format.
// On a format change the pipeline is rebuilt before anything is recorded.
unsafe fn create_pipeline(
    device: &ash::Device,
    cache: vk::PipelineCache,
    kind: PipelineKind,
    layout: vk::PipelineLayout,
    targets: PipelineTargets,
) -> Result<vk::Pipeline> {
    let mut modules = Vec::new();
    let mut stages = Vec::new();
    for (stage, bytes) in stage_sources(kind) {
        let module = match create_shader_module(device, bytes) {
            Ok(m) => m,
            Err(e) => {
                for m in modules {
                    device.destroy_shader_module(m, None);
                }
                return Err(e);
            }
        };
        modules.push(module);
        stages.push(vk::PipelineShaderStageCreateInfo {
            s_type: vk::StructureType::PIPELINE_SHADER_STAGE_CREATE_INFO,
            stage,
            module,
            p_name: ENTRY.as_ptr(),
            ..Default::default()
        });
    }

    // positions and normals live in separate buffers
    let vb = [
        vk::VertexInputBindingDescription {
            binding: 0,
            stride: std::mem::size_of::<[f32; 3]>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
        vk::VertexInputBindingDescription {
            binding: 1,
            stride: std::mem::size_of::<[f32; 3]>() as u32,
            input_rate: vk::VertexInputRate::VERTEX,
        },
    ];
    let va = [
        vk::VertexInputAttributeDescription {
            location: 0,
            binding: 0,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
        vk::VertexInputAttributeDescription {
            location: 1,
            binding: 1,
            format: vk::Format::R32G32B32_SFLOAT,
            offset: 0,
        },
    ];
    let vertex_input = vk::PipelineVertexInputStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VERTEX_INPUT_STATE_CREATE_INFO,
        vertex_binding_description_count: vb.len() as u32,
        p_vertex_binding_descriptions: vb.as_ptr(),
        vertex_attribute_description_count: va.len() as u32,
        p_vertex_attribute_descriptions: va.as_ptr(),
        ..Default::default()
    };

    let tessellated = kind == PipelineKind::Tessellation;
    let input_assembly = vk::PipelineInputAssemblyStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_INPUT_ASSEMBLY_STATE_CREATE_INFO,
        topology: if tessellated {
            vk::PrimitiveTopology::PATCH_LIST
        } else {
            vk::PrimitiveTopology::TRIANGLE_LIST
        },
        ..Default::default()
    };
    let tessellation = vk::PipelineTessellationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_TESSELLATION_STATE_CREATE_INFO,
        patch_control_points: STATIC_PATCH_CONTROL_POINTS,
        ..Default::default()
    };

    let dyn_states = dynamic_states(kind);
    let dynamic_state = vk::PipelineDynamicStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DYNAMIC_STATE_CREATE_INFO,
        dynamic_state_count: dyn_states.len() as u32,
        p_dynamic_states: dyn_states.as_ptr(),
        ..Default::default()
    };
    let viewport_state = vk::PipelineViewportStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_VIEWPORT_STATE_CREATE_INFO,
        viewport_count: 1,
        p_viewports: std::ptr::null(), // dynamic
        scissor_count: 1,
        p_scissors: std::ptr::null(), // dynamic
        ..Default::default()
    };

    // depth bias parameters are static; only the enable bit is dynamic
    let raster = vk::PipelineRasterizationStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_RASTERIZATION_STATE_CREATE_INFO,
        polygon_mode: if tessellated && targets.wireframe {
            vk::PolygonMode::LINE
        } else {
            vk::PolygonMode::FILL
        },
        cull_mode: vk::CullModeFlags::NONE,
        front_face: vk::FrontFace::COUNTER_CLOCKWISE,
        depth_bias_enable: vk::FALSE,
        depth_bias_constant_factor: 1.0,
        depth_bias_clamp: 0.0,
        depth_bias_slope_factor: 1.0,
        line_width: 1.0,
        ..Default::default()
    };
    let multisample = vk::PipelineMultisampleStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_MULTISAMPLE_STATE_CREATE_INFO,
        rasterization_samples: vk::SampleCountFlags::TYPE_1,
        ..Default::default()
    };
    let depth_stencil = vk::PipelineDepthStencilStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_DEPTH_STENCIL_STATE_CREATE_INFO,
        depth_test_enable: vk::TRUE,
        depth_write_enable: vk::TRUE,
        depth_compare_op: vk::CompareOp::LESS_OR_EQUAL,
        ..Default::default()
    };
    // alpha blending so the selection highlight can fade
    let color_blend_att = vk::PipelineColorBlendAttachmentState {
        color_write_mask: vk::ColorComponentFlags::R
            | vk::ColorComponentFlags::G
            | vk::ColorComponentFlags::B
            | vk::ColorComponentFlags::A,
        blend_enable: vk::TRUE,
        src_color_blend_factor: vk::BlendFactor::SRC_ALPHA,
        dst_color_blend_factor: vk::BlendFactor::ONE_MINUS_SRC_ALPHA,
        color_blend_op: vk::BlendOp::ADD,
        src_alpha_blend_factor: vk::BlendFactor::ONE,
        dst_alpha_blend_factor: vk::BlendFactor::ZERO,
        alpha_blend_op: vk::BlendOp::ADD,
    };
    let color_blend = vk::PipelineColorBlendStateCreateInfo {
        s_type: vk::StructureType::PIPELINE_COLOR_BLEND_STATE_CREATE_INFO,
        attachment_count: 1,
        p_attachments: &color_blend_att,
        ..Default::default()
    };

    let rendering = vk::PipelineRenderingCreateInfo {
        s_type: vk::StructureType::PIPELINE_RENDERING_CREATE_INFO,
        color_attachment_count: 1,
        p_color_attachment_formats: &targets.color_format,
        depth_attachment_format: targets.depth_format,
        ..Default::default()
    };

    let pipeline_info = vk::GraphicsPipelineCreateInfo {
        s_type: vk::StructureType::GRAPHICS_PIPELINE_CREATE_INFO,
        p_next: (&rendering as *const _) as *const _,
        stage_count: stages.len() as u32,
        p_stages: stages.as_ptr(),
        p_vertex_input_state: &vertex_input,
        p_input_assembly_state: &input_assembly,
        p_tessellation_state: if tessellated {
            &tessellation as *const _
        } else {
            std::ptr::null()
        },
        p_viewport_state: &viewport_state,
        p_rasterization_state: &raster,
        p_multisample_state: &multisample,
        p_depth_stencil_state: &depth_stencil,
        p_color_blend_state: &color_blend,
        p_dynamic_state: &dynamic_state,
        layout,
        ..Default::default()
    };

    let result = device.create_graphics_pipelines(cache, std::slice::from_ref(&pipeline_info), None);
    for m in modules {
        device.destroy_shader_module(m, None);
    }
    match result {
        Ok(p) => Ok(p[0]),
        Err((_, err)) => Err(anyhow!("create_graphics_pipelines({kind:?}) failed: {err:?}")),
    }
}

/// Both scene pipelines, sharing one cache and one set of render targets.
pub(crate) struct PipelineSet {
    pub baseline: GraphicsPipeline,
    pub tessellation: GraphicsPipeline,
    pub targets: PipelineTargets,
}

impl PipelineSet {
    pub unsafe fn new(
        device: &ash::Device,
        cache: vk::PipelineCache,
        targets: PipelineTargets,
    ) -> Result<Self> {
        let baseline = GraphicsPipeline::new(device, cache, PipelineKind::Baseline, targets)?;
        let tessellation =
            match GraphicsPipeline::new(device, cache, PipelineKind::Tessellation, targets) {
                Ok(p) => p,
                Err(e) => {
                    baseline.destroy(device);
                    return Err(e);
                }
            };
        Ok(Self {
            baseline,
            tessellation,
            targets,
        })
    }

    pub fn get(&self, kind: PipelineKind) -> &GraphicsPipeline {
        match kind {
            PipelineKind::Baseline => &self.baseline,
            PipelineKind::Tessellation => &self.tessellation,
        }
    }

    /// Rebuild both pipelines against a new swapchain colour format.
    pub unsafe fn rebuild(
        &mut self,
        device: &ash::Device,
        cache: vk::PipelineCache,
        color_format: vk::Format,
    ) -> Result<()> {
        let targets = PipelineTargets {
            color_format,
            ..self.targets
        };
        let fresh = Self::new(device, cache, targets)?;
        self.destroy(device);
        *self = fresh;
        Ok(())
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        self.baseline.destroy(device);
        self.tessellation.destroy(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_pipelines_toggle_bias_and_discard_dynamically() {
        for kind in [PipelineKind::Baseline, PipelineKind::Tessellation] {
            let states = dynamic_states(kind);
            assert!(states.contains(&vk::DynamicState::DEPTH_BIAS_ENABLE));
            assert!(states.contains(&vk::DynamicState::RASTERIZER_DISCARD_ENABLE));
            assert!(states.contains(&vk::DynamicState::VIEWPORT));
            assert!(states.contains(&vk::DynamicState::SCISSOR));
        }
    }

    #[test]
    fn only_tessellation_has_dynamic_patch_control_points() {
        assert!(!dynamic_states(PipelineKind::Baseline)
            .contains(&vk::DynamicState::PATCH_CONTROL_POINTS_EXT));
        assert!(dynamic_states(PipelineKind::Tessellation)
            .contains(&vk::DynamicState::PATCH_CONTROL_POINTS_EXT));
    }

    #[test]
    fn push_constants_reach_every_stage_that_reads_them() {
        assert_eq!(
            push_constant_stages(PipelineKind::Baseline),
            vk::ShaderStageFlags::VERTEX
        );
        let tess = push_constant_stages(PipelineKind::Tessellation);
        assert!(tess.contains(vk::ShaderStageFlags::VERTEX));
        assert!(tess.contains(vk::ShaderStageFlags::TESSELLATION_EVALUATION));
        assert!(!tess.contains(vk::ShaderStageFlags::FRAGMENT));
    }

    #[test]
    fn tessellation_uniforms_cover_control_eval_and_fragment() {
        let s = uniform_stages(PipelineKind::Tessellation);
        assert!(s.contains(vk::ShaderStageFlags::TESSELLATION_CONTROL));
        assert!(s.contains(vk::ShaderStageFlags::TESSELLATION_EVALUATION));
        assert!(s.contains(vk::ShaderStageFlags::FRAGMENT));
        assert!(!s.contains(vk::ShaderStageFlags::VERTEX));
    }

    #[test]
    fn stage_lists_match_pipeline_kind() {
        assert_eq!(stage_sources(PipelineKind::Baseline).len(), 2);
        assert_eq!(stage_sources(PipelineKind::Tessellation).len(), 4);
        for (_, bytes) in stage_sources(PipelineKind::Tessellation) {
            assert!(read_spv(&mut Cursor::new(bytes)).is_ok());
        }
    }

    #[test]
    fn cache_path_encodes_vendor_and_uuid() {
        let props = vk::PhysicalDeviceProperties {
            vendor_id: 0x10de,
            device_id: 0x2484,
            driver_version: 1,
            pipeline_cache_uuid: [0xab; vk::UUID_SIZE],
            ..Default::default()
        };
        let p = pipeline_cache_path(&props);
        let name = p.to_string_lossy();
        assert!(name.starts_with("vk_pipeline_cache_10de_2484_00000001_"));
        assert!(name.ends_with(&format!("{}.bin", "ab".repeat(16))));
    }
}
