// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, bail, Result};
use ash::{vk, Instance};
use bytemuck::Pod;
use eds2_render::MeshData;

#[inline]
pub(crate) unsafe fn find_memory_type(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    type_bits: u32,
    req: vk::MemoryPropertyFlags,
) -> Result<u32> {
    let mem = instance.get_physical_device_memory_properties(phys);
    (0..mem.memory_type_count)
        .find(|&i| {
            (type_bits & (1 << i)) != 0
                && mem.memory_types[i as usize].property_flags.contains(req)
        })
        .ok_or_else(|| anyhow!("no memory type with {req:?} in mask {type_bits:#b}"))
}

pub(crate) unsafe fn create_buffer_and_memory(
    instance: &Instance,
    device: &ash::Device,
    phys: vk::PhysicalDevice,
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    props: vk::MemoryPropertyFlags,
) -> Result<(vk::Buffer, vk::DeviceMemory)> {
    let bci = vk::BufferCreateInfo {
        s_type: vk::StructureType::BUFFER_CREATE_INFO,
        size,
        usage,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let buf = device.create_buffer(&bci, None)?;
    let req = device.get_buffer_memory_requirements(buf);
    let mem_type = match find_memory_type(instance, phys, req.memory_type_bits, props) {
        Ok(t) => t,
        Err(e) => {
            device.destroy_buffer(buf, None);
            return Err(e);
        }
    };
    let mai = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: req.size,
        memory_type_index: mem_type,
        ..Default::default()
    };
    let mem = device.allocate_memory(&mai, None)?;
    device.bind_buffer_memory(buf, mem, 0)?;
    Ok((buf, mem))
}

/// Host-visible, host-coherent buffer written with plain memcpy.
pub(crate) struct HostBuffer {
    pub buffer: vk::Buffer,
    pub memory: vk::DeviceMemory,
    pub size: vk::DeviceSize,
}

impl HostBuffer {
    pub unsafe fn uniform<T: Pod>(
        instance: &Instance,
        device: &ash::Device,
        phys: vk::PhysicalDevice,
    ) -> Result<Self> {
        let size = std::mem::size_of::<T>() as vk::DeviceSize;
        let (buffer, memory) = create_buffer_and_memory(
            instance,
            device,
            phys,
            size,
            vk::BufferUsageFlags::UNIFORM_BUFFER,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        Ok(Self {
            buffer,
            memory,
            size,
        })
    }

    pub unsafe fn write<T: Pod>(&self, device: &ash::Device, data: &T) -> Result<()> {
        let bytes = bytemuck::bytes_of(data);
        if bytes.len() as vk::DeviceSize > self.size {
            bail!("write of {} bytes into {}-byte buffer", bytes.len(), self.size);
        }
        let ptr = device.map_memory(self.memory, 0, self.size, vk::MemoryMapFlags::empty())?;
        std::ptr::copy_nonoverlapping(bytes.as_ptr(), ptr as *mut u8, bytes.len());
        device.unmap_memory(self.memory);
        Ok(())
    }

    pub fn descriptor_info(&self) -> vk::DescriptorBufferInfo {
        vk::DescriptorBufferInfo {
            buffer: self.buffer,
            offset: 0,
            range: self.size,
        }
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_buffer(self.buffer, None);
        device.free_memory(self.memory, None);
    }
}

/// Everything needed for one-shot staging copies on the graphics queue.
pub(crate) struct Uploader<'a> {
    pub instance: &'a Instance,
    pub device: &'a ash::Device,
    pub phys: vk::PhysicalDevice,
    pub queue: vk::Queue,
    pub cmd_pool: vk::CommandPool,
}

impl Uploader<'_> {
    /// Device-local buffer with `usage | TRANSFER_DST`, filled from `data`.
    pub unsafe fn device_local(
        &self,
        usage: vk::BufferUsageFlags,
        data: &[u8],
    ) -> Result<(vk::Buffer, vk::DeviceMemory)> {
        let (buf, mem) = create_buffer_and_memory(
            self.instance,
            self.device,
            self.phys,
            data.len() as vk::DeviceSize,
            usage | vk::BufferUsageFlags::TRANSFER_DST,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?;
        self.upload_via_staging(buf, data)?;
        Ok((buf, mem))
    }

    /// host -> staging -> `dst`, waiting for the copy to finish.
    unsafe fn upload_via_staging(&self, dst: vk::Buffer, src_data: &[u8]) -> Result<()> {
        let device = self.device;
        let size = src_data.len() as vk::DeviceSize;
        let (staging, staging_mem) = create_buffer_and_memory(
            self.instance,
            device,
            self.phys,
            size,
            vk::BufferUsageFlags::TRANSFER_SRC,
            vk::MemoryPropertyFlags::HOST_VISIBLE | vk::MemoryPropertyFlags::HOST_COHERENT,
        )?;
        let ptr = device.map_memory(staging_mem, 0, size, vk::MemoryMapFlags::empty())?;
        std::ptr::copy_nonoverlapping(src_data.as_ptr(), ptr as *mut u8, src_data.len());
        device.unmap_memory(staging_mem);

        let ai = vk::CommandBufferAllocateInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_ALLOCATE_INFO,
            command_pool: self.cmd_pool,
            level: vk::CommandBufferLevel::PRIMARY,
            command_buffer_count: 1,
            ..Default::default()
        };
        let cmd = device.allocate_command_buffers(&ai)?[0];
        let bi = vk::CommandBufferBeginInfo {
            s_type: vk::StructureType::COMMAND_BUFFER_BEGIN_INFO,
            flags: vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT,
            ..Default::default()
        };
        device.begin_command_buffer(cmd, &bi)?;
        let region = vk::BufferCopy {
            src_offset: 0,
            dst_offset: 0,
            size,
        };
        device.cmd_copy_buffer(cmd, staging, dst, std::slice::from_ref(&region));
        device.end_command_buffer(cmd)?;

        let si = vk::SubmitInfo {
            s_type: vk::StructureType::SUBMIT_INFO,
            command_buffer_count: 1,
            p_command_buffers: &cmd,
            ..Default::default()
        };
        device.queue_submit(self.queue, std::slice::from_ref(&si), vk::Fence::null())?;
        device.queue_wait_idle(self.queue)?;

        device.free_command_buffers(self.cmd_pool, std::slice::from_ref(&cmd));
        device.destroy_buffer(staging, None);
        device.free_memory(staging_mem, None);
        Ok(())
    }
}

/// Device-local copy of a [`MeshData`]: one vertex buffer per attribute
/// plus a u32 index buffer.
pub(crate) struct GpuMesh {
    pub positions: (vk::Buffer, vk::DeviceMemory),
    pub normals: (vk::Buffer, vk::DeviceMemory),
    pub indices: (vk::Buffer, vk::DeviceMemory),
    pub index_count: u32,
}

impl GpuMesh {
    pub unsafe fn upload(up: &Uploader<'_>, mesh: &MeshData) -> Result<Self> {
        if mesh.positions.is_empty() || mesh.indices.is_empty() {
            bail!("mesh `{}` is empty", mesh.name);
        }
        if mesh.normals.len() != mesh.positions.len() {
            bail!(
                "mesh `{}` has {} normals for {} positions",
                mesh.name,
                mesh.normals.len(),
                mesh.positions.len()
            );
        }
        let positions = up.device_local(
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&mesh.positions),
        )?;
        let normals = up.device_local(
            vk::BufferUsageFlags::VERTEX_BUFFER,
            bytemuck::cast_slice(&mesh.normals),
        )?;
        let indices = up.device_local(
            vk::BufferUsageFlags::INDEX_BUFFER,
            bytemuck::cast_slice(&mesh.indices),
        )?;
        Ok(Self {
            positions,
            normals,
            indices,
            index_count: mesh.index_count(),
        })
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        for (buf, mem) in [self.positions, self.normals, self.indices] {
            device.destroy_buffer(buf, None);
            device.free_memory(mem, None);
        }
    }
}
