// SPDX-License-Identifier: CEPL-1.0
use anyhow::{anyhow, bail, Context, Result};
use ash::ext::extended_dynamic_state2;
use ash::khr::{surface, swapchain};
use ash::{vk, Instance};
use std::ffi::{c_char, CStr};

/// What the chosen device can do beyond the required baseline.
#[derive(Clone, Debug)]
pub(crate) struct DeviceCaps {
    pub name: String,
    /// Tessellation pipeline draws wireframe when set.
    pub fill_mode_non_solid: bool,
    /// Upper bound for dynamic patch control points.
    pub max_patch_size: u32,
}

/// Supported feature bits relevant to the sample.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FeatureSupport {
    pub dynamic_rendering: bool,
    pub synchronization2: bool,
    pub extended_dynamic_state2: bool,
    pub patch_control_points: bool,
    pub tessellation_shader: bool,
    pub depth_bias_clamp: bool,
    pub fill_mode_non_solid: bool,
}

impl FeatureSupport {
    /// Names of required features the device lacks. `fillModeNonSolid` is
    /// optional.
    pub fn missing(&self) -> Vec<&'static str> {
        [
            (self.dynamic_rendering, "dynamicRendering"),
            (self.synchronization2, "synchronization2"),
            (self.extended_dynamic_state2, "extendedDynamicState2"),
            (self.patch_control_points, "extendedDynamicState2PatchControlPoints"),
            (self.tessellation_shader, "tessellationShader"),
            (self.depth_bias_clamp, "depthBiasClamp"),
        ]
        .into_iter()
        .filter_map(|(ok, name)| (!ok).then_some(name))
        .collect()
    }
}

unsafe fn has_extension(instance: &Instance, phys: vk::PhysicalDevice, name: &CStr) -> bool {
    instance
        .enumerate_device_extension_properties(phys)
        .unwrap_or_default()
        .iter()
        .any(|e| CStr::from_ptr(e.extension_name.as_ptr()) == name)
}

unsafe fn query_features(instance: &Instance, phys: vk::PhysicalDevice) -> FeatureSupport {
    let mut eds2 = vk::PhysicalDeviceExtendedDynamicState2FeaturesEXT {
        s_type: vk::StructureType::PHYSICAL_DEVICE_EXTENDED_DYNAMIC_STATE_2_FEATURES_EXT,
        ..Default::default()
    };
    let mut feats13 = vk::PhysicalDeviceVulkan13Features {
        s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
        ..Default::default()
    };
    let mut feats2 = vk::PhysicalDeviceFeatures2 {
        s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
        ..Default::default()
    };
    feats13.p_next = (&mut eds2) as *mut _ as *mut _;
    feats2.p_next = (&mut feats13) as *mut _ as *mut _;
    instance.get_physical_device_features2(phys, &mut feats2);

    let core = feats2.features;
    FeatureSupport {
        dynamic_rendering: feats13.dynamic_rendering == vk::TRUE,
        synchronization2: feats13.synchronization2 == vk::TRUE,
        extended_dynamic_state2: eds2.extended_dynamic_state2 == vk::TRUE,
        patch_control_points: eds2.extended_dynamic_state2_patch_control_points == vk::TRUE,
        tessellation_shader: core.tessellation_shader == vk::TRUE,
        depth_bias_clamp: core.depth_bias_clamp == vk::TRUE,
        fill_mode_non_solid: core.fill_mode_non_solid == vk::TRUE,
    }
}

fn device_name(props: &vk::PhysicalDeviceProperties) -> String {
    unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Why `phys` cannot run the sample, if it cannot.
unsafe fn rejection(instance: &Instance, phys: vk::PhysicalDevice) -> Option<String> {
    let props = instance.get_physical_device_properties(phys);
    let api = props.api_version;
    if vk::api_version_major(api) == 1 && vk::api_version_minor(api) < 3 {
        return Some("Vulkan 1.3 not supported".into());
    }
    if !has_extension(instance, phys, extended_dynamic_state2::NAME) {
        return Some("VK_EXT_extended_dynamic_state2 not supported".into());
    }
    let missing = query_features(instance, phys).missing();
    if !missing.is_empty() {
        return Some(format!("missing features: {}", missing.join(", ")));
    }
    None
}

/// First device that supports the sample and has a graphics queue able to
/// present to `surface`.
pub(crate) unsafe fn pick_device_and_queue(
    instance: &Instance,
    surf_i: &surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<(vk::PhysicalDevice, u32)> {
    let mut reasons = Vec::new();
    for phys in instance.enumerate_physical_devices()? {
        let name = device_name(&instance.get_physical_device_properties(phys));
        if let Some(reason) = rejection(instance, phys) {
            tracing::info!(device = %name, %reason, "skipping device");
            reasons.push(format!("{name}: {reason}"));
            continue;
        }

        let qprops = instance.get_physical_device_queue_family_properties(phys);
        for (i, q) in qprops.iter().enumerate() {
            if q.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && surf_i
                    .get_physical_device_surface_support(phys, i as u32, surface)
                    .unwrap_or(false)
            {
                return Ok((phys, i as u32));
            }
        }
        reasons.push(format!("{name}: no graphics queue can present"));
    }
    Err(anyhow!("no suitable physical device ({})", reasons.join("; ")))
}

// STRICT ORDER (feature pNext chain): eds2 -> feats13 -> feats2.
// Structs must outlive create_device.
pub(crate) unsafe fn create_device(
    instance: &Instance,
    phys: vk::PhysicalDevice,
    queue_family: u32,
) -> Result<(ash::Device, vk::Queue, DeviceCaps)> {
    let support = query_features(instance, phys);
    let missing = support.missing();
    if !missing.is_empty() {
        bail!("required device features missing: {}", missing.join(", "));
    }

    let priorities = [1.0_f32];
    let qinfo = vk::DeviceQueueCreateInfo {
        s_type: vk::StructureType::DEVICE_QUEUE_CREATE_INFO,
        queue_family_index: queue_family,
        queue_count: 1,
        p_queue_priorities: priorities.as_ptr(),
        ..Default::default()
    };

    let device_exts: [*const c_char; 2] = [
        swapchain::NAME.as_ptr(),
        extended_dynamic_state2::NAME.as_ptr(),
    ];

    let mut eds2 = vk::PhysicalDeviceExtendedDynamicState2FeaturesEXT {
        s_type: vk::StructureType::PHYSICAL_DEVICE_EXTENDED_DYNAMIC_STATE_2_FEATURES_EXT,
        extended_dynamic_state2: vk::TRUE,
        extended_dynamic_state2_patch_control_points: vk::TRUE,
        ..Default::default()
    };
    let mut feats13 = vk::PhysicalDeviceVulkan13Features {
        s_type: vk::StructureType::PHYSICAL_DEVICE_VULKAN_1_3_FEATURES,
        dynamic_rendering: vk::TRUE,
        synchronization2: vk::TRUE,
        ..Default::default()
    };
    let mut feats2 = vk::PhysicalDeviceFeatures2 {
        s_type: vk::StructureType::PHYSICAL_DEVICE_FEATURES_2,
        features: vk::PhysicalDeviceFeatures {
            tessellation_shader: vk::TRUE,
            depth_bias_clamp: vk::TRUE,
            fill_mode_non_solid: support.fill_mode_non_solid as vk::Bool32,
            ..Default::default()
        },
        ..Default::default()
    };
    feats13.p_next = (&mut eds2) as *mut _ as *mut _;
    feats2.p_next = (&mut feats13) as *mut _ as *mut _;

    let dinfo = vk::DeviceCreateInfo {
        s_type: vk::StructureType::DEVICE_CREATE_INFO,
        p_next: (&mut feats2) as *mut _ as *const _,
        queue_create_info_count: 1,
        p_queue_create_infos: &qinfo,
        enabled_extension_count: device_exts.len() as u32,
        pp_enabled_extension_names: device_exts.as_ptr(),
        ..Default::default()
    };

    let device = instance
        .create_device(phys, &dinfo, None)
        .context("create_device")?;
    let queue = device.get_device_queue(queue_family, 0);

    let props = instance.get_physical_device_properties(phys);
    let caps = DeviceCaps {
        name: device_name(&props),
        fill_mode_non_solid: support.fill_mode_non_solid,
        max_patch_size: props.limits.max_tessellation_patch_size,
    };
    if !caps.fill_mode_non_solid {
        tracing::warn!("fillModeNonSolid unsupported; tessellated mesh drawn filled");
    }
    tracing::info!(
        device = %caps.name,
        max_patch_size = caps.max_patch_size,
        "vk: device created"
    );
    Ok((device, queue, caps))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn everything() -> FeatureSupport {
        FeatureSupport {
            dynamic_rendering: true,
            synchronization2: true,
            extended_dynamic_state2: true,
            patch_control_points: true,
            tessellation_shader: true,
            depth_bias_clamp: true,
            fill_mode_non_solid: true,
        }
    }

    #[test]
    fn wireframe_support_is_optional() {
        let support = FeatureSupport {
            fill_mode_non_solid: false,
            ..everything()
        };
        assert!(support.missing().is_empty());
    }

    #[test]
    fn lists_each_missing_requirement() {
        let support = FeatureSupport {
            patch_control_points: false,
            depth_bias_clamp: false,
            ..everything()
        };
        assert_eq!(
            support.missing(),
            ["extendedDynamicState2PatchControlPoints", "depthBiasClamp"]
        );
        assert_eq!(FeatureSupport::default().missing().len(), 6);
    }
}
