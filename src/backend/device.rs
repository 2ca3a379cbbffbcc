// Vulkan Device - GPU selection and the logical device
//
// Responsibilities:
// - Physical device selection (graphics + present queues, required extensions)
// - Logical device + queue creation
// - Queue lookup by role

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use std::collections::BTreeSet;
use std::ffi::{CStr, CString};
use std::sync::Arc;

use super::{Surface, VulkanInstance};
use crate::error::RendererError;

/// Queue family indices a device was accepted with
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilies {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilies {
    pub fn is_shared(&self) -> bool {
        self.graphics == self.present
    }

    /// Family a queue with `role` is taken from
    pub fn index(&self, role: QueueRole) -> u32 {
        match role {
            QueueRole::Graphics => self.graphics,
            QueueRole::Present => self.present,
        }
    }

    /// Distinct family indices, one queue is created per entry
    pub fn unique(&self) -> Vec<u32> {
        let set: BTreeSet<u32> = [self.graphics, self.present].into_iter().collect();
        set.into_iter().collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueRole {
    Graphics,
    Present,
}

/// A physical device that passed every suitability check
#[derive(Debug, Clone)]
pub struct PhysicalDeviceCandidate {
    pub handle: vk::PhysicalDevice,
    pub name: String,
    pub queue_families: QueueFamilies,
}

/// Pick graphics and present queue families.
///
/// A single family that does both wins over a split pair so that no
/// ownership transfer between queues is ever needed.
pub fn find_queue_families<F>(
    families: &[vk::QueueFamilyProperties],
    mut supports_present: F,
) -> Result<Option<QueueFamilies>>
where
    F: FnMut(u32) -> Result<bool>,
{
    let mut graphics = None;
    let mut present = None;

    for (index, family) in families.iter().enumerate() {
        let index = index as u32;
        let has_graphics =
            family.queue_count > 0 && family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        let has_present = supports_present(index)?;

        if has_graphics && has_present {
            return Ok(Some(QueueFamilies {
                graphics: index,
                present: index,
            }));
        }
        if has_graphics && graphics.is_none() {
            graphics = Some(index);
        }
        if has_present && present.is_none() {
            present = Some(index);
        }
    }

    Ok(graphics
        .zip(present)
        .map(|(graphics, present)| QueueFamilies { graphics, present }))
}

/// Required extensions the device does not expose
pub fn missing_extensions(
    available: &[vk::ExtensionProperties],
    required: &[CString],
) -> Vec<String> {
    required
        .iter()
        .filter(|name| {
            !available.iter().any(|ext| {
                let available_name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
                available_name == name.as_c_str()
            })
        })
        .map(|name| name.to_string_lossy().into_owned())
        .collect()
}

/// Return the first device with a graphics queue, a queue that can present
/// to `surface`, and every extension in `required_extensions`.
pub fn select_physical_device(
    surface: &Surface,
    required_extensions: &[CString],
) -> Result<PhysicalDeviceCandidate> {
    let instance = surface.instance();
    let devices = unsafe { instance.instance.enumerate_physical_devices() }
        .context("Failed to enumerate physical devices")?;

    if devices.is_empty() {
        log::warn!("No Vulkan-capable GPU found");
    }

    for device in devices {
        if let Some(candidate) = probe_device(instance, surface, device, required_extensions)? {
            return Ok(candidate);
        }
    }

    Err(RendererError::NoSuitableDevice.into())
}

fn probe_device(
    instance: &VulkanInstance,
    surface: &Surface,
    device: vk::PhysicalDevice,
    required_extensions: &[CString],
) -> Result<Option<PhysicalDeviceCandidate>> {
    let props = unsafe { instance.instance.get_physical_device_properties(device) };
    let name = unsafe { CStr::from_ptr(props.device_name.as_ptr()) }
        .to_string_lossy()
        .into_owned();
    log::debug!("Trying device {}", name);

    let families = unsafe {
        instance
            .instance
            .get_physical_device_queue_family_properties(device)
    };
    let Some(queue_families) =
        find_queue_families(&families, |index| surface.supports_present(device, index))?
    else {
        log::debug!("  {} has no graphics/present queue pair", name);
        return Ok(None);
    };

    let available = unsafe { instance.instance.enumerate_device_extension_properties(device) }
        .context("Failed to enumerate device extensions")?;
    let missing = missing_extensions(&available, required_extensions);
    if !missing.is_empty() {
        log::debug!("  {} lacks extensions {:?}", name, missing);
        return Ok(None);
    }

    Ok(Some(PhysicalDeviceCandidate {
        handle: device,
        name,
        queue_families,
    }))
}

/// Logical device with its queues. Lives for the whole session.
pub struct LogicalDevice {
    pub device: ash::Device,
    pub physical_device: vk::PhysicalDevice,
    pub queue_families: QueueFamilies,
    pub graphics_queue: vk::Queue,
    pub present_queue: vk::Queue,
    pub swapchain_loader: khr::Swapchain,
    // Destroyed after the device
    _instance: Arc<VulkanInstance>,
}

impl LogicalDevice {
    pub fn new(
        instance: Arc<VulkanInstance>,
        candidate: &PhysicalDeviceCandidate,
        required_extensions: &[CString],
    ) -> Result<Arc<Self>> {
        let props = unsafe {
            instance
                .instance
                .get_physical_device_properties(candidate.handle)
        };
        log::info!("Selected GPU: {}", candidate.name);
        log::info!(
            "API Version: {}.{}.{}",
            vk::api_version_major(props.api_version),
            vk::api_version_minor(props.api_version),
            vk::api_version_patch(props.api_version)
        );
        log::info!(
            "Queue families: graphics {}, present {}",
            candidate.queue_families.graphics,
            candidate.queue_families.present
        );

        let queue_priorities = [1.0];
        let queue_create_infos: Vec<_> = candidate
            .queue_families
            .unique()
            .into_iter()
            .map(|family| {
                vk::DeviceQueueCreateInfo::builder()
                    .queue_family_index(family)
                    .queue_priorities(&queue_priorities)
                    .build()
            })
            .collect();

        let extension_ptrs: Vec<_> = required_extensions.iter().map(|e| e.as_ptr()).collect();

        let create_info = vk::DeviceCreateInfo::builder()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&extension_ptrs);

        let device = unsafe {
            instance
                .instance
                .create_device(candidate.handle, &create_info, None)
        }
        .context("Failed to create logical device")?;

        let families = candidate.queue_families;
        let graphics_family = families.index(QueueRole::Graphics);
        let present_family = families.index(QueueRole::Present);
        let graphics_queue = unsafe { device.get_device_queue(graphics_family, 0) };
        let present_queue = unsafe { device.get_device_queue(present_family, 0) };
        let swapchain_loader = khr::Swapchain::new(&instance.instance, &device);

        Ok(Arc::new(Self {
            device,
            physical_device: candidate.handle,
            queue_families: candidate.queue_families,
            graphics_queue,
            present_queue,
            swapchain_loader,
            _instance: instance,
        }))
    }

    pub fn queue(&self, role: QueueRole) -> vk::Queue {
        match role {
            QueueRole::Graphics => self.graphics_queue,
            QueueRole::Present => self.present_queue,
        }
    }

    /// Wait for device to be idle (e.g., before cleanup)
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle() }.context("Failed to wait for device idle")?;
        Ok(())
    }
}

impl Drop for LogicalDevice {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan device...");
        let _ = self.wait_idle();
        unsafe {
            self.device.destroy_device(None);
        }
    }
}
