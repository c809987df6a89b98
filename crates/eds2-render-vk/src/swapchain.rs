// SPDX-License-Identifier: CEPL-1.0
use crate::{memory::find_memory_type, VkVsyncMode};
use anyhow::{Context, Result};
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use eds2_render::RenderSize;

#[derive(Clone, Copy, Debug)]
pub(crate) struct SwapchainConfig {
    pub hint: RenderSize,
    pub vsync: bool,
    pub vsync_mode: VkVsyncMode,
}

pub(crate) struct SwapchainBundle {
    pub swapchain: vk::SwapchainKHR,
    pub format: vk::Format,
    pub extent: vk::Extent2D,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
}

pub(crate) struct DepthTarget {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
}

impl DepthTarget {
    /// Null handles; destroying them is a no-op.
    pub fn null() -> Self {
        Self {
            image: vk::Image::null(),
            memory: vk::DeviceMemory::null(),
            view: vk::ImageView::null(),
        }
    }

    pub unsafe fn destroy(&self, device: &ash::Device) {
        device.destroy_image_view(self.view, None);
        device.destroy_image(self.image, None);
        device.free_memory(self.memory, None);
    }
}

// Info only
fn fmt_name(f: vk::Format) -> &'static str {
    match f {
        vk::Format::B8G8R8A8_UNORM => "B8G8R8A8_UNORM",
        vk::Format::B8G8R8A8_SRGB => "B8G8R8A8_SRGB",
        vk::Format::R8G8B8A8_SRGB => "R8G8B8A8_SRGB",
        vk::Format::R8G8B8A8_UNORM => "R8G8B8A8_UNORM",
        _ => "OTHER",
    }
}

fn pm_name(m: vk::PresentModeKHR) -> &'static str {
    match m {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::MAILBOX => "MAILBOX",
        vk::PresentModeKHR::IMMEDIATE => "IMMEDIATE",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO_RELAXED",
        _ => "OTHER",
    }
}

pub(crate) fn choose_present_mode(
    modes: &[vk::PresentModeKHR],
    vsync: bool,
    mode: VkVsyncMode,
) -> vk::PresentModeKHR {
    let order: &[vk::PresentModeKHR] = match (vsync, mode) {
        (false, _) => &[
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::FIFO,
        ],
        (true, VkVsyncMode::Mailbox) => &[vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO],
        (true, VkVsyncMode::Fifo) => &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
    };
    order
        .iter()
        .copied()
        .find(|m| modes.contains(m))
        .unwrap_or(vk::PresentModeKHR::FIFO)
}

pub(crate) fn extent_from_caps(caps: &vk::SurfaceCapabilitiesKHR, want: RenderSize) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        caps.current_extent
    } else {
        vk::Extent2D {
            width: want
                .width
                .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
            height: want
                .height
                .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
        }
    }
}

/// sRGB 8-bit formats first, then whatever the driver lists first.
pub(crate) fn pick_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    [vk::Format::B8G8R8A8_SRGB, vk::Format::R8G8B8A8_SRGB]
        .into_iter()
        .find_map(|want| formats.iter().copied().find(|f| f.format == want))
        .or_else(|| {
            formats.iter().copied().find(|f| {
                f.format == vk::Format::B8G8R8A8_UNORM
                    && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
            })
        })
        .or_else(|| formats.first().copied())
}

/// One more image than the minimum, capped by the maximum (0 means no cap).
pub(crate) fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    if caps.max_image_count == 0 {
        caps.min_image_count + 1
    } else {
        (caps.min_image_count + 1).min(caps.max_image_count)
    }
}

pub(crate) unsafe fn create_swapchain_bundle(
    device: &ash::Device,
    surf_i: &surface::Instance,
    swap_d: &swapchain::Device,
    phys: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    old_swapchain: vk::SwapchainKHR,
    cfg: SwapchainConfig,
) -> Result<SwapchainBundle> {
    let caps = surf_i.get_physical_device_surface_capabilities(phys, surface)?;
    let formats = surf_i.get_physical_device_surface_formats(phys, surface)?;
    let modes = surf_i.get_physical_device_surface_present_modes(phys, surface)?;

    let surf_format = pick_surface_format(&formats).context("surface reports no formats")?;
    let present_mode = choose_present_mode(&modes, cfg.vsync, cfg.vsync_mode);
    let extent = extent_from_caps(&caps, cfg.hint);
    let min_count = image_count(&caps);

    tracing::info!(
        "format: {}, present_mode: {}, vsync={}, mode={:?}, extent: {}x{}, images(min={} → picked={})",
        fmt_name(surf_format.format),
        pm_name(present_mode),
        cfg.vsync,
        cfg.vsync_mode,
        extent.width,
        extent.height,
        caps.min_image_count,
        min_count
    );

    let pre_transform = if caps
        .supported_transforms
        .contains(vk::SurfaceTransformFlagsKHR::IDENTITY)
    {
        vk::SurfaceTransformFlagsKHR::IDENTITY
    } else {
        caps.current_transform
    };

    let swap_info = vk::SwapchainCreateInfoKHR {
        s_type: vk::StructureType::SWAPCHAIN_CREATE_INFO_KHR,
        surface,
        min_image_count: min_count,
        image_format: surf_format.format,
        image_color_space: surf_format.color_space,
        image_extent: extent,
        image_array_layers: 1,
        image_usage: vk::ImageUsageFlags::COLOR_ATTACHMENT,
        image_sharing_mode: vk::SharingMode::EXCLUSIVE,
        pre_transform,
        composite_alpha: vk::CompositeAlphaFlagsKHR::OPAQUE,
        present_mode,
        clipped: vk::TRUE,
        old_swapchain,
        ..Default::default()
    };

    let new_swapchain = swap_d.create_swapchain(&swap_info, None)?;
    let images = swap_d.get_swapchain_images(new_swapchain)?;

    let mut views = Vec::with_capacity(images.len());
    for &img in &images {
        let iv_info = vk::ImageViewCreateInfo {
            s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
            image: img,
            view_type: vk::ImageViewType::TYPE_2D,
            format: surf_format.format,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: vk::ImageAspectFlags::COLOR,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        };
        views.push(device.create_image_view(&iv_info, None)?);
    }

    Ok(SwapchainBundle {
        swapchain: new_swapchain,
        format: surf_format.format,
        extent,
        images,
        image_views: views,
    })
}

pub(crate) unsafe fn pick_depth_format(instance: &Instance, phys: vk::PhysicalDevice) -> vk::Format {
    let candidates = [
        vk::Format::D32_SFLOAT,
        vk::Format::D24_UNORM_S8_UINT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D16_UNORM,
    ];
    candidates
        .into_iter()
        .find(|&fmt| {
            instance
                .get_physical_device_format_properties(phys, fmt)
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .unwrap_or(vk::Format::D32_SFLOAT)
}

pub(crate) unsafe fn create_depth_target(
    instance: &Instance,
    device: &ash::Device,
    phys: vk::PhysicalDevice,
    extent: vk::Extent2D,
    depth_format: vk::Format,
) -> Result<DepthTarget> {
    let img_ci = vk::ImageCreateInfo {
        s_type: vk::StructureType::IMAGE_CREATE_INFO,
        image_type: vk::ImageType::TYPE_2D,
        format: depth_format,
        extent: vk::Extent3D {
            width: extent.width,
            height: extent.height,
            depth: 1,
        },
        mip_levels: 1,
        array_layers: 1,
        samples: vk::SampleCountFlags::TYPE_1,
        tiling: vk::ImageTiling::OPTIMAL,
        usage: vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
        sharing_mode: vk::SharingMode::EXCLUSIVE,
        ..Default::default()
    };
    let image = device.create_image(&img_ci, None)?;

    let mem_req = device.get_image_memory_requirements(image);
    let alloc = vk::MemoryAllocateInfo {
        s_type: vk::StructureType::MEMORY_ALLOCATE_INFO,
        allocation_size: mem_req.size,
        memory_type_index: find_memory_type(
            instance,
            phys,
            mem_req.memory_type_bits,
            vk::MemoryPropertyFlags::DEVICE_LOCAL,
        )?,
        ..Default::default()
    };
    let memory = device.allocate_memory(&alloc, None)?;
    device.bind_image_memory(image, memory, 0)?;

    let view_ci = vk::ImageViewCreateInfo {
        s_type: vk::StructureType::IMAGE_VIEW_CREATE_INFO,
        image,
        view_type: vk::ImageViewType::TYPE_2D,
        format: depth_format,
        subresource_range: vk::ImageSubresourceRange {
            aspect_mask: vk::ImageAspectFlags::DEPTH,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        },
        ..Default::default()
    };
    let view = device.create_image_view(&view_ci, None)?;
    Ok(DepthTarget {
        image,
        memory,
        view,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [vk::PresentModeKHR; 3] = [
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
        vk::PresentModeKHR::IMMEDIATE,
    ];

    #[test]
    fn present_mode_follows_vsync_policy() {
        use vk::PresentModeKHR as P;
        assert_eq!(choose_present_mode(&ALL, true, VkVsyncMode::Mailbox), P::MAILBOX);
        assert_eq!(choose_present_mode(&ALL, true, VkVsyncMode::Fifo), P::FIFO);
        assert_eq!(choose_present_mode(&ALL, false, VkVsyncMode::Fifo), P::IMMEDIATE);
        assert_eq!(choose_present_mode(&[P::FIFO], true, VkVsyncMode::Mailbox), P::FIFO);
        assert_eq!(choose_present_mode(&[P::FIFO], false, VkVsyncMode::Mailbox), P::FIFO);
    }

    #[test]
    fn free_size_surface_clamps_hint() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 16,
                height: 16,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        };
        let e = extent_from_caps(
            &caps,
            RenderSize {
                width: 4000,
                height: 8,
            },
        );
        assert_eq!((e.width, e.height), (1024, 16));

        let fixed = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..caps
        };
        let e = extent_from_caps(
            &fixed,
            RenderSize {
                width: 1,
                height: 1,
            },
        );
        assert_eq!((e.width, e.height), (800, 600));
    }

    #[test]
    fn surface_format_prefers_srgb() {
        let f = |format| vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        };
        let picked = pick_surface_format(&[
            f(vk::Format::B8G8R8A8_UNORM),
            f(vk::Format::R8G8B8A8_SRGB),
        ]);
        assert_eq!(picked.map(|p| p.format), Some(vk::Format::R8G8B8A8_SRGB));
        assert_eq!(
            pick_surface_format(&[f(vk::Format::R16G16B16A16_SFLOAT)]).map(|p| p.format),
            Some(vk::Format::R16G16B16A16_SFLOAT)
        );
        assert!(pick_surface_format(&[]).is_none());
    }

    #[test]
    fn image_count_respects_cap() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(image_count(&caps), 3);
        let capped = vk::SurfaceCapabilitiesKHR {
            max_image_count: 2,
            ..caps
        };
        assert_eq!(image_count(&capped), 2);
    }
}
