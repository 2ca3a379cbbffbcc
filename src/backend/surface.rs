// Surface - the window's presentation target
//
// Keeps the instance alive for as long as the surface exists, since the
// surface has to be destroyed before the instance that created it.

use anyhow::{Context, Result};
use ash::extensions::khr;
use ash::vk;
use std::sync::Arc;

use super::VulkanInstance;
use crate::platform::WindowSurface;

pub struct Surface {
    pub handle: vk::SurfaceKHR,
    pub loader: khr::Surface,
    instance: Arc<VulkanInstance>,
}

impl Surface {
    pub fn new(instance: Arc<VulkanInstance>, window: &dyn WindowSurface) -> Result<Self> {
        let handle = window
            .create_surface(&instance.entry, &instance.instance)
            .context("Failed to create window surface")?;
        let loader = khr::Surface::new(&instance.entry, &instance.instance);

        Ok(Self {
            handle,
            loader,
            instance,
        })
    }

    /// Whether `queue_family` on `physical_device` can present to this surface
    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family: u32,
    ) -> Result<bool> {
        unsafe {
            self.loader
                .get_physical_device_surface_support(physical_device, queue_family, self.handle)
        }
        .context("Failed to query surface support")
    }

    pub fn instance(&self) -> &Arc<VulkanInstance> {
        &self.instance
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        log::debug!("Destroying surface");
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
    }
}
