// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, bail, Context, Result};
use ash::ext::extended_dynamic_state2;
use ash::khr::{surface, swapchain as khr_swapchain};
use ash::{vk, Entry, Instance};
use eds2_render::{FrameOutcome, FrameRecorder, FrameUniforms, MeshData, RenderSize, Renderer};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{info, warn};

mod device;
mod frame;
mod instance;
mod memory;
mod pipeline;
mod sink;
mod swapchain;

use device::DeviceCaps;
use frame::{AcquireSlot, FrameSync, FrameUniformSet};
use instance::DebugState;
use memory::{GpuMesh, Uploader};
use pipeline::{PipelineSet, PipelineTargets};
use sink::VkCommandSink;
use swapchain::{DepthTarget, SwapchainBundle, SwapchainConfig};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VkVsyncMode {
    Fifo,    // Target monitor refresh rate
    Mailbox, // Smart Vsync, fps uncapped
}

#[derive(Clone, Copy, Debug)]
struct RuntimeConfig {
    vsync: bool,
    vsync_mode: VkVsyncMode,
}

/// Vsync on with mailbox until the app calls `set_vsync`/`set_vsync_mode`.
impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            vsync_mode: VkVsyncMode::Mailbox,
        }
    }
}

impl RuntimeConfig {
    fn to_swapchain_config(self, hint: RenderSize) -> SwapchainConfig {
        SwapchainConfig {
            hint,
            vsync: self.vsync,
            vsync_mode: self.vsync_mode,
        }
    }
}

pub struct VkRenderer {
    entry: Entry,
    instance: Instance,
    surface_loader: surface::Instance,
    surface: vk::SurfaceKHR,
    debug: DebugState,

    phys: vk::PhysicalDevice,
    device: ash::Device,
    queue: vk::Queue,
    caps: DeviceCaps,
    eds2: extended_dynamic_state2::Device,

    swapchain_loader: khr_swapchain::Device,
    swapchain: vk::SwapchainKHR,
    format: vk::Format,
    extent: vk::Extent2D,
    images: Vec<vk::Image>,
    image_views: Vec<vk::ImageView>,

    depth: DepthTarget,
    depth_format: vk::Format,

    pipeline_cache: vk::PipelineCache,
    pipelines: PipelineSet,
    uniform_set: FrameUniformSet,
    uniforms: FrameUniforms,
    meshes: Vec<GpuMesh>,

    cmd_pool: vk::CommandPool,
    cmd_bufs: Vec<vk::CommandBuffer>,
    frames: Vec<FrameSync>,
    acq_slots: Vec<AcquireSlot>,
    acq_index: usize,
    /// Acquire-slot fence of the submit currently using each image.
    images_in_flight: Vec<vk::Fence>,

    clear: vk::ClearValue,
    paused: bool,
    /// Command buffers no longer match the swapchain or clear colour.
    stale: bool,
    cfg: RuntimeConfig,
}

unsafe fn allocate_command_buffers(
    device: &ash::Device,
    pool: vk::CommandPool,
    count: usize,
) -> Result<Vec<vk::CommandBuffer>> {
    let alloc_info = vk::CommandBufferAllocateInfo {
        s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
        command_pool: pool,
        level: vk::CommandBufferLevel::PRIMARY,
        command_buffer_count: count as u32,
        ..Default::default()
    };
    Ok(device.allocate_command_buffers(&alloc_info)?)
}

unsafe fn build_renderer(
    window: &dyn HasWindowHandle,
    display: &dyn HasDisplayHandle,
    size: RenderSize,
    mesh_data: &[MeshData],
) -> Result<VkRenderer> {
    // 1) Instance + surface
    let instance::InstanceBundle {
        entry,
        instance,
        surface_loader,
        surface,
        debug,
    } = instance::init_instance_and_surface(window, display)?;

    // 2) Device/queue with extended dynamic state 2
    let (phys, queue_family) = device::pick_device_and_queue(&instance, &surface_loader, surface)?;
    let (device, queue, caps) = device::create_device(&instance, phys, queue_family)?;
    let eds2 = extended_dynamic_state2::Device::new(&instance, &device);

    let props = instance.get_physical_device_properties(phys);
    let cache_path = pipeline::pipeline_cache_path(&props);
    let pipeline_cache = pipeline::create_or_load_pipeline_cache(&device, &cache_path)?;

    // 3) Commands + geometry upload
    let pool_info = vk::CommandPoolCreateInfo {
        s_type: vk::StructureType::COMMAND_POOL_CREATE_INFO,
        queue_family_index: queue_family,
        flags: vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER,
        ..Default::default()
    };
    let cmd_pool = device.create_command_pool(&pool_info, None)?;
    let uploader = Uploader {
        instance: &instance,
        device: &device,
        phys,
        queue,
        cmd_pool,
    };
    let mut meshes = Vec::with_capacity(mesh_data.len());
    for m in mesh_data {
        meshes.push(GpuMesh::upload(&uploader, m).with_context(|| format!("upload {}", m.name))?);
    }
    info!(count = meshes.len(), "vk: meshes uploaded");

    // 4) Swapchain-scoped resources
    let swapchain_loader = khr_swapchain::Device::new(&instance, &device);
    let cfg = RuntimeConfig::default();
    let sc = swapchain::create_swapchain_bundle(
        &device,
        &surface_loader,
        &swapchain_loader,
        phys,
        surface,
        vk::SwapchainKHR::null(),
        cfg.to_swapchain_config(size),
    )?;
    let depth_format = swapchain::pick_depth_format(&instance, phys);
    let depth = swapchain::create_depth_target(&instance, &device, phys, sc.extent, depth_format)?;

    let pipelines = PipelineSet::new(
        &device,
        pipeline_cache,
        PipelineTargets {
            color_format: sc.format,
            depth_format,
            wireframe: caps.fill_mode_non_solid,
        },
    )?;
    let image_count = sc.images.len();
    let uniform_set = FrameUniformSet::new(&instance, &device, phys, &pipelines, image_count)?;
    let cmd_bufs = allocate_command_buffers(&device, cmd_pool, image_count)?;
    let frames = frame::create_frame_syncs(&device, image_count)?;
    let acq_slots = frame::create_acquire_slots(&device)?;

    let SwapchainBundle {
        swapchain,
        format,
        extent,
        images,
        image_views,
    } = sc;

    // 5) Nothing is recorded until the app hands over a FrameRecorder.
    Ok(VkRenderer {
        entry,
        instance,
        surface_loader,
        surface,
        debug,
        phys,
        device,
        queue,
        caps,
        eds2,
        swapchain_loader,
        swapchain,
        format,
        extent,
        images,
        image_views,
        depth,
        depth_format,
        pipeline_cache,
        pipelines,
        uniform_set,
        uniforms: FrameUniforms::default(),
        meshes,
        cmd_pool,
        cmd_bufs,
        frames,
        acq_slots,
        acq_index: 0,
        images_in_flight: vec![vk::Fence::null(); image_count],
        clear: vk::ClearValue {
            color: vk::ClearColorValue {
                float32: [0.02, 0.02, 0.04, 1.0],
            },
        },
        paused: false,
        stale: true,
        cfg,
    })
}

impl VkRenderer {
    pub fn set_vsync_mode(&mut self, mode: VkVsyncMode) {
        if self.cfg.vsync_mode == mode {
            return;
        }
        self.cfg.vsync_mode = mode;
        self.recreate_current();
    }

    pub fn device_name(&self) -> &str {
        &self.caps.name
    }

    fn current_size(&self) -> RenderSize {
        RenderSize {
            width: self.extent.width,
            height: self.extent.height,
        }
    }

    fn recreate_current(&mut self) {
        let want = self.current_size();
        if let Err(e) = unsafe { self.recreate_swapchain(want) } {
            warn!("vk: swapchain recreate failed: {e:#}");
        }
    }

    #[inline]
    unsafe fn transition_to_color(&self, cmd: vk::CommandBuffer, image: vk::Image) {
        let subrange = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let pre_barrier = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags2::empty(),
            dst_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            dst_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE
                | vk::AccessFlags2::COLOR_ATTACHMENT_READ,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            image,
            subresource_range: subrange,
            ..Default::default()
        };
        let dep_pre = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &pre_barrier,
            ..Default::default()
        };
        self.device.cmd_pipeline_barrier2(cmd, &dep_pre);
    }

    // The depth image is shared by every swapchain image, so the previous
    // frame's depth writes must finish before this frame clears it.
    #[inline]
    unsafe fn transition_depth_to_attachment(&self, cmd: vk::CommandBuffer) {
        let subrange = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let tests = vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
            | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS;
        let pre = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            src_stage_mask: tests,
            src_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            dst_stage_mask: tests,
            dst_access_mask: vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ,
            old_layout: vk::ImageLayout::UNDEFINED,
            new_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            image: self.depth.image,
            subresource_range: subrange,
            ..Default::default()
        };
        let dep = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &pre,
            ..Default::default()
        };
        self.device.cmd_pipeline_barrier2(cmd, &dep);
    }

    #[inline]
    unsafe fn begin_rendering(&self, cmd: vk::CommandBuffer, image_view: vk::ImageView) {
        let color_att = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view,
            image_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: self.clear,
            ..Default::default()
        };
        let depth_att = vk::RenderingAttachmentInfo {
            s_type: vk::StructureType::RENDERING_ATTACHMENT_INFO,
            image_view: self.depth.view,
            image_layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_value: vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: 1.0,
                    stencil: 0,
                },
            },
            ..Default::default()
        };
        let render_area = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        let rendering_info = vk::RenderingInfo {
            s_type: vk::StructureType::RENDERING_INFO,
            render_area,
            layer_count: 1,
            color_attachment_count: 1,
            p_color_attachments: &color_att,
            p_depth_attachment: &depth_att,
            ..Default::default()
        };
        self.device.cmd_begin_rendering(cmd, &rendering_info);
    }

    /// Viewport and scissor are dynamic in both pipelines; the camera
    /// projection already flips Y, so the viewport stays positive.
    #[inline]
    unsafe fn set_viewport_scissor(&self, cmd: vk::CommandBuffer) {
        let vp = vk::Viewport {
            x: 0.0,
            y: 0.0,
            width: self.extent.width as f32,
            height: self.extent.height as f32,
            min_depth: 0.0,
            max_depth: 1.0,
        };
        self.device.cmd_set_viewport(cmd, 0, std::slice::from_ref(&vp));
        let sc = vk::Rect2D {
            offset: vk::Offset2D { x: 0, y: 0 },
            extent: self.extent,
        };
        self.device.cmd_set_scissor(cmd, 0, std::slice::from_ref(&sc));
    }

    #[inline]
    unsafe fn transition_to_present(&self, cmd: vk::CommandBuffer, image: vk::Image) {
        let subrange = vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::COLOR,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        };
        let post_barrier = vk::ImageMemoryBarrier2 {
            s_type: vk::StructureType::IMAGE_MEMORY_BARRIER_2,
            src_stage_mask: vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            src_access_mask: vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            dst_stage_mask: vk::PipelineStageFlags2::BOTTOM_OF_PIPE,
            dst_access_mask: vk::AccessFlags2::empty(),
            old_layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            new_layout: vk::ImageLayout::PRESENT_SRC_KHR,
            image,
            subresource_range: subrange,
            ..Default::default()
        };
        let dep_post = vk::DependencyInfo {
            s_type: vk::StructureType::DEPENDENCY_INFO,
            image_memory_barrier_count: 1,
            p_image_memory_barriers: &post_barrier,
            ..Default::default()
        };
        self.device.cmd_pipeline_barrier2(cmd, &dep_post);
    }

    unsafe fn record_one_command(
        &self,
        image_index: usize,
        recorder: &mut dyn FrameRecorder,
    ) -> Result<()> {
        let cmd = self.cmd_bufs[image_index];
        let image = self.images[image_index];

        self.device
            .reset_command_buffer(cmd, vk::CommandBufferResetFlags::empty())?;
        let begin = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            ..Default::default()
        };
        self.device.begin_command_buffer(cmd, &begin)?;

        self.transition_to_color(cmd, image);
        self.transition_depth_to_attachment(cmd);
        self.begin_rendering(cmd, self.image_views[image_index]);
        self.set_viewport_scissor(cmd);

        let mut sink = VkCommandSink {
            device: &self.device,
            eds2: &self.eds2,
            cmd,
            pipelines: &self.pipelines,
            frame: &self.uniform_set.frames[image_index],
            meshes: &self.meshes,
            max_patch_size: self.caps.max_patch_size,
            bound: None,
        };
        let scene = recorder.record(&mut sink);

        // close the buffer even when the scene failed so it can be reset later
        self.device.cmd_end_rendering(cmd);
        self.transition_to_present(cmd, image);
        self.device.end_command_buffer(cmd)?;
        scene.with_context(|| format!("record image {image_index}"))
    }

    // STRICT ORDER (recreate):
    // 1) Wait acquire fences (no submit still uses the old swapchain)
    // 2) device_wait_idle() to avoid destroying in-use views/pipelines
    // 3) Destroy per-image views, sync, uniforms tied to OLD swapchain
    // 4) Create NEW swapchain + images + views, then retire the old one
    // 5) Recreate depth for the new extent
    // 6) Rebuild pipelines ONLY if the colour format changed
    // 7) Recreate per-image uniforms + sync
    // 8) Resize command buffers if image count changed
    // Recording waits for the next Renderer::record call.
    unsafe fn recreate_swapchain(&mut self, size: RenderSize) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            return Ok(());
        }
        self.stale = true;

        // 1)
        let acq_fences: Vec<_> = self.acq_slots.iter().map(|s| s.fence).collect();
        if !acq_fences.is_empty() {
            let _ = self.device.wait_for_fences(&acq_fences, true, u64::MAX);
        }
        // 2)
        self.device.device_wait_idle().ok();

        // 3)
        for &iv in &self.image_views {
            self.device.destroy_image_view(iv, None);
        }
        self.image_views.clear();
        for f in &self.frames {
            self.device.destroy_semaphore(f.render_finished, None);
        }
        self.frames.clear();
        self.uniform_set.destroy(&self.device);
        self.uniform_set = FrameUniformSet::empty();

        // 4)
        let bundle = swapchain::create_swapchain_bundle(
            &self.device,
            &self.surface_loader,
            &self.swapchain_loader,
            self.phys,
            self.surface,
            self.swapchain,
            self.cfg.to_swapchain_config(size),
        )?;
        self.swapchain_loader.destroy_swapchain(self.swapchain, None);
        let old_format = self.format;
        self.swapchain = bundle.swapchain;
        self.format = bundle.format;
        self.extent = bundle.extent;
        self.images = bundle.images;
        self.image_views = bundle.image_views;

        // 5)
        self.depth.destroy(&self.device);
        self.depth = DepthTarget::null();
        self.depth = swapchain::create_depth_target(
            &self.instance,
            &self.device,
            self.phys,
            self.extent,
            self.depth_format,
        )?;

        // 6)
        if self.format != old_format {
            info!(?old_format, new_format = ?self.format, "vk: rebuilding pipelines");
            self.pipelines
                .rebuild(&self.device, self.pipeline_cache, self.format)?;
        }

        // 7)
        let image_count = self.images.len();
        self.uniform_set = FrameUniformSet::new(
            &self.instance,
            &self.device,
            self.phys,
            &self.pipelines,
            image_count,
        )?;
        self.frames = frame::create_frame_syncs(&self.device, image_count)?;
        self.images_in_flight = vec![vk::Fence::null(); image_count];

        // 8)
        if self.cmd_bufs.len() != image_count {
            self.device
                .free_command_buffers(self.cmd_pool, &self.cmd_bufs);
            self.cmd_bufs = allocate_command_buffers(&self.device, self.cmd_pool, image_count)?;
        }

        self.acq_index = 0;
        Ok(())
    }

    /// Returns `false` (and pauses) when the surface cannot be drawn to.
    unsafe fn surface_ready(&mut self) -> bool {
        match self
            .surface_loader
            .get_physical_device_surface_capabilities(self.phys, self.surface)
        {
            Ok(caps) if caps.current_extent.width == 0 || caps.current_extent.height == 0 => {
                if !self.paused {
                    self.paused = true;
                    info!("vk: current_extent is 0x0 → paused=true");
                }
                false
            }
            Ok(_) => true,
            Err(e) => {
                if !self.paused {
                    self.paused = true;
                    info!("vk: surface caps error {:?} → paused=true", e);
                }
                false
            }
        }
    }

    /// Waits on a signalled acquire semaphore with an empty submit, so its
    /// slot can acquire again after a frame bails before the real submit.
    unsafe fn release_acquire(&self, sem: vk::Semaphore) {
        let wait_stages = [vk::PipelineStageFlags::ALL_COMMANDS];
        let submit = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            wait_semaphore_count: 1,
            p_wait_semaphores: &sem,
            p_wait_dst_stage_mask: wait_stages.as_ptr(),
            ..Default::default()
        };
        if let Err(e) =
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&submit), vk::Fence::null())
        {
            warn!("vk: acquire semaphore not released: {e:?}");
        }
    }

    unsafe fn recreate_out_of_date(&mut self) -> Result<FrameOutcome> {
        let want = self.current_size();
        self.recreate_swapchain(want)?;
        Ok(FrameOutcome::NeedsRecord)
    }
}

// STRICT TEARDOWN ORDER:
// - Wait acquire fences, then device idle
// - Destroy pipelines/layouts BEFORE swapchain
// - Destroy image views BEFORE swapchain
// - Free command buffers BEFORE destroying their pool
// - Destroy swapchain BEFORE device
// - Destroy per-frame semaphores/fences BEFORE device
// - Destroy surface AFTER device; instance last.
impl Drop for VkRenderer {
    fn drop(&mut self) {
        unsafe {
            let d = &self.device;

            // 1) WAIT ACQUIRE FENCES
            if !self.acq_slots.is_empty() {
                let acq_fences: Vec<_> = self.acq_slots.iter().map(|s| s.fence).collect();
                let _ = d.wait_for_fences(&acq_fences, true, u64::MAX);
            }

            // 2) QUIESCE DEVICE
            d.device_wait_idle().ok();

            // 3) PIPELINES BEFORE SWAPCHAIN
            self.pipelines.destroy(d);

            // 4) IMAGE VIEWS BEFORE SWAPCHAIN
            for &iv in &self.image_views {
                d.destroy_image_view(iv, None);
            }

            // 5) FREE COMMAND BUFFERS BEFORE DESTROYING THEIR POOL
            if !self.cmd_bufs.is_empty() {
                d.free_command_buffers(self.cmd_pool, &self.cmd_bufs);
            }
            d.destroy_command_pool(self.cmd_pool, None);

            // 6) SWAPCHAIN BEFORE DEVICE
            self.swapchain_loader.destroy_swapchain(self.swapchain, None);

            // 7) PER-FRAME SYNC BEFORE DEVICE
            for f in &self.frames {
                d.destroy_semaphore(f.render_finished, None);
            }
            for s in &self.acq_slots {
                d.destroy_fence(s.fence, None);
                d.destroy_semaphore(s.sem, None);
            }

            self.depth.destroy(d);
            for m in &self.meshes {
                m.destroy(d);
            }
            self.uniform_set.destroy(d);

            let props = self.instance.get_physical_device_properties(self.phys);
            let cache_path = pipeline::pipeline_cache_path(&props);
            if let Err(e) = pipeline::save_pipeline_cache(d, self.pipeline_cache, &cache_path) {
                warn!("vk: pipeline cache not saved: {e:#}");
            }
            d.destroy_pipeline_cache(self.pipeline_cache, None);

            // 8) DEVICE, THEN SURFACE, THEN INSTANCE
            d.destroy_device(None);
            self.surface_loader.destroy_surface(self.surface, None);
            instance::destroy_debug_messenger(&self.entry, &self.instance, self.debug);
            self.instance.destroy_instance(None);
        }
    }
}

impl Renderer for VkRenderer {
    fn new(
        window: &dyn HasWindowHandle,
        display: &dyn HasDisplayHandle,
        size: RenderSize,
        meshes: &[MeshData],
    ) -> Result<Self> {
        unsafe { build_renderer(window, display, size, meshes) }
    }

    fn resize(&mut self, size: RenderSize) -> Result<()> {
        if size.width == 0 || size.height == 0 {
            if !self.paused {
                info!("vk: resize to 0x0 → paused=true");
            }
            self.paused = true;
            return Ok(());
        }
        if self.paused {
            info!(
                "vk: resize to {}x{} → paused=false",
                size.width, size.height
            );
        }
        self.paused = false;
        unsafe { self.recreate_swapchain(size) }
    }

    fn size(&self) -> RenderSize {
        self.current_size()
    }

    fn record(&mut self, frame: &mut dyn FrameRecorder) -> Result<()> {
        unsafe {
            // buffers may still be pending from the previous frames
            self.device.device_wait_idle().context("device_wait_idle")?;
            self.stale = true;
            let n = self.cmd_bufs.len();
            if self.frames.len() != n || self.uniform_set.frames.len() != n {
                bail!("swapchain resources incomplete after a failed recreate");
            }
            for i in 0..n {
                self.record_one_command(i, frame)?;
            }
        }
        self.stale = false;
        Ok(())
    }

    fn update_uniforms(&mut self, uniforms: &FrameUniforms) -> Result<()> {
        self.uniforms = *uniforms;
        Ok(())
    }

    // STRICT PER-FRAME ORDER:
    // 1) wait the acquire slot fence, then acquire_next_image
    // 2) wait whatever submit still owns the image, write its uniforms
    // 3) queue_submit (signals render-finished for THIS image)
    // 4) queue_present (waits on render-finished)
    // Each swapchain image has its own FrameSync; do not cross-use semaphores.
    fn render(&mut self) -> Result<FrameOutcome> {
        if self.paused {
            return Ok(FrameOutcome::Skipped);
        }
        if self.stale {
            return Ok(FrameOutcome::NeedsRecord);
        }

        unsafe {
            if !self.surface_ready() {
                return Ok(FrameOutcome::Skipped);
            }

            let slot_sem = self.acq_slots[self.acq_index].sem;
            let slot_fence = self.acq_slots[self.acq_index].fence;
            self.device
                .wait_for_fences(&[slot_fence], true, u64::MAX)
                .context("wait_for_fences(acquire slot)")?;

            // 1) Acquire
            let (image_index, _suboptimal) = match self.swapchain_loader.acquire_next_image(
                self.swapchain,
                u64::MAX,
                slot_sem,
                vk::Fence::null(),
            ) {
                Ok(pair) => pair,
                Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    return self.recreate_out_of_date();
                }
                Err(e) => return Err(anyhow!("acquire_next_image: {e:?}")),
            };
            let img = image_index as usize;

            // 2) Image ownership + uniforms
            let owner = self.images_in_flight[img];
            let prepared = if owner != vk::Fence::null() && owner != slot_fence {
                self.device
                    .wait_for_fences(&[owner], true, u64::MAX)
                    .context("wait_for_fences(image in flight)")
            } else {
                Ok(())
            }
            .and_then(|()| self.uniform_set.frames[img].write(&self.device, &self.uniforms))
            .and_then(|()| {
                self.device
                    .reset_fences(&[slot_fence])
                    .context("reset_fences(acquire slot)")
            });
            if let Err(e) = prepared {
                self.release_acquire(slot_sem);
                return Err(e);
            }
            self.images_in_flight[img] = slot_fence;

            // 3) Submit
            let cmd = self.cmd_bufs[img];
            let render_finished = self.frames[img].render_finished;
            let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
            let submit = vk::SubmitInfo {
                s_type: vk::StructureType::SUBMIT_INFO,
                wait_semaphore_count: 1,
                p_wait_semaphores: &slot_sem,
                p_wait_dst_stage_mask: wait_stages.as_ptr(),
                command_buffer_count: 1,
                p_command_buffers: &cmd,
                signal_semaphore_count: 1,
                p_signal_semaphores: &render_finished,
                ..Default::default()
            };
            self.device
                .queue_submit(self.queue, std::slice::from_ref(&submit), slot_fence)
                .context("queue_submit")?;

            // 4) Present
            let present = vk::PresentInfoKHR {
                s_type: vk::StructureType::PRESENT_INFO_KHR,
                wait_semaphore_count: 1,
                p_wait_semaphores: &render_finished,
                swapchain_count: 1,
                p_swapchains: &self.swapchain,
                p_image_indices: &image_index,
                ..Default::default()
            };
            self.acq_index = (self.acq_index + 1) % self.acq_slots.len();
            match self.swapchain_loader.queue_present(self.queue, &present) {
                Ok(false) => Ok(FrameOutcome::Presented),
                Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                    self.recreate_out_of_date()
                }
                Err(e) => Err(anyhow!("queue_present: {e:?}")),
            }
        }
    }

    fn set_clear_color(&mut self, rgba: [f32; 4]) {
        self.clear = vk::ClearValue {
            color: vk::ClearColorValue { float32: rgba },
        };
        self.stale = true;
    }

    fn set_vsync(&mut self, on: bool) {
        if self.cfg.vsync == on {
            return;
        }
        self.cfg.vsync = on;
        self.recreate_current();
    }
}
