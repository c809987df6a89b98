// SPDX-License-Identifier: CEPL-1.0
use crate::memory::HostBuffer;
use crate::pipeline::PipelineSet;
use anyhow::Result;
use ash::{vk, Instance};
use eds2_render::{BaselineUbo, FrameUniforms, PipelineKind, TessellationUbo};

/// Acquire slots in rotation; independent of the swapchain image count.
pub(crate) const ACQUIRE_SLOTS: usize = 2;

/// Per swapchain image.
pub(crate) struct FrameSync {
    pub render_finished: vk::Semaphore,
}

pub(crate) struct AcquireSlot {
    pub sem: vk::Semaphore,
    pub fence: vk::Fence,
}

pub(crate) unsafe fn create_acquire_slots(device: &ash::Device) -> Result<Vec<AcquireSlot>> {
    let sem_ci = vk::SemaphoreCreateInfo::default();
    let fence_ci = vk::FenceCreateInfo {
        s_type: vk::StructureType::FENCE_CREATE_INFO,
        flags: vk::FenceCreateFlags::SIGNALED,
        ..Default::default()
    };
    let mut slots = Vec::with_capacity(ACQUIRE_SLOTS);
    for _ in 0..ACQUIRE_SLOTS {
        let sem = device.create_semaphore(&sem_ci, None)?;
        let fence = device.create_fence(&fence_ci, None)?;
        slots.push(AcquireSlot { sem, fence });
    }
    Ok(slots)
}

pub(crate) unsafe fn create_frame_syncs(
    device: &ash::Device,
    image_count: usize,
) -> Result<Vec<FrameSync>> {
    let sem_ci = vk::SemaphoreCreateInfo::default();
    let mut frames = Vec::with_capacity(image_count);
    for _ in 0..image_count {
        frames.push(FrameSync {
            render_finished: device.create_semaphore(&sem_ci, None)?,
        });
    }
    Ok(frames)
}

/// Uniform buffers and descriptor sets owned by one swapchain image.
pub(crate) struct FrameResources {
    pub baseline_ubo: HostBuffer,
    pub tess_ubo: HostBuffer,
    pub baseline_set: vk::DescriptorSet,
    pub tess_set: vk::DescriptorSet,
}

impl FrameResources {
    pub fn set(&self, kind: PipelineKind) -> vk::DescriptorSet {
        match kind {
            PipelineKind::Baseline => self.baseline_set,
            PipelineKind::Tessellation => self.tess_set,
        }
    }

    pub unsafe fn write(&self, device: &ash::Device, u: &FrameUniforms) -> Result<()> {
        self.baseline_ubo.write(device, &u.baseline)?;
        self.tess_ubo.write(device, &u.tessellation)
    }
}

/// Per-image uniforms plus the pool their sets come from.
pub(crate) struct FrameUniformSet {
    pub pool: vk::DescriptorPool,
    pub frames: Vec<FrameResources>,
}

impl FrameUniformSet {
    /// Placeholder between teardown and rebuild; safe to destroy.
    pub fn empty() -> Self {
        Self {
            pool: vk::DescriptorPool::null(),
            frames: Vec::new(),
        }
    }

    pub unsafe fn new(
        instance: &Instance,
        device: &ash::Device,
        phys: vk::PhysicalDevice,
        pipelines: &PipelineSet,
        image_count: usize,
    ) -> Result<Self> {
        let set_count = (image_count * 2) as u32;
        let pool_sizes = [vk::DescriptorPoolSize {
            ty: vk::DescriptorType::UNIFORM_BUFFER,
            descriptor_count: set_count,
        }];
        let pool_ci = vk::DescriptorPoolCreateInfo {
            s_type: vk::StructureType::DESCRIPTOR_POOL_CREATE_INFO,
            max_sets: set_count,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        let pool = device.create_descriptor_pool(&pool_ci, None)?;
        let mut out = Self {
            pool,
            frames: Vec::with_capacity(image_count),
        };
        for _ in 0..image_count {
            if let Err(e) = out.push_frame(instance, device, phys, pipelines) {
                out.destroy(device);
                return Err(e);
            }
        }
        Ok(out)
    }

    unsafe fn push_frame(
        &mut self,
        instance: &Instance,
        device: &ash::Device,
        phys: vk::PhysicalDevice,
        pipelines: &PipelineSet,
    ) -> Result<()> {
        let baseline_ubo = HostBuffer::uniform::<BaselineUbo>(instance, device, phys)?;
        let tess_ubo = match HostBuffer::uniform::<TessellationUbo>(instance, device, phys) {
            Ok(b) => b,
            Err(e) => {
                baseline_ubo.destroy(device);
                return Err(e);
            }
        };

        let layouts = [pipelines.baseline.set_layout, pipelines.tessellation.set_layout];
        let alloc = vk::DescriptorSetAllocateInfo {
            s_type: vk::StructureType::DESCRIPTOR_SET_ALLOCATE_INFO,
            descriptor_pool: self.pool,
            descriptor_set_count: layouts.len() as u32,
            p_set_layouts: layouts.as_ptr(),
            ..Default::default()
        };
        let sets = match device.allocate_descriptor_sets(&alloc) {
            Ok(s) => s,
            Err(e) => {
                baseline_ubo.destroy(device);
                tess_ubo.destroy(device);
                return Err(e.into());
            }
        };

        let infos = [baseline_ubo.descriptor_info(), tess_ubo.descriptor_info()];
        let writes: Vec<_> = sets
            .iter()
            .zip(infos.iter())
            .map(|(&dst_set, info)| vk::WriteDescriptorSet {
                s_type: vk::StructureType::WRITE_DESCRIPTOR_SET,
                dst_set,
                dst_binding: 0,
                descriptor_count: 1,
                descriptor_type: vk::DescriptorType::UNIFORM_BUFFER,
                p_buffer_info: info,
                ..Default::default()
            })
            .collect();
        device.update_descriptor_sets(&writes, &[]);

        self.frames.push(FrameResources {
            baseline_ubo,
            tess_ubo,
            baseline_set: sets[0],
            tess_set: sets[1],
        });
        Ok(())
    }

    /// Sets are freed with the pool.
    pub unsafe fn destroy(&self, device: &ash::Device) {
        for f in &self.frames {
            f.baseline_ubo.destroy(device);
            f.tess_ubo.destroy(device);
        }
        device.destroy_descriptor_pool(self.pool, None);
    }
}
