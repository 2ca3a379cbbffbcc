// Synchronization primitives
//
// Semaphores order GPU work (acquire -> render -> present). The fence is
// only created when frames are paced with fences instead of a queue drain.

use anyhow::{anyhow, Context, Result};
use ash::vk;

use super::LogicalDevice;

/// One sync slot
pub struct FrameSync {
    pub image_available: vk::Semaphore,
    pub render_finished: vk::Semaphore,
    pub in_flight_fence: Option<vk::Fence>,
}

impl FrameSync {
    pub fn new(device: &LogicalDevice, with_fence: bool) -> Result<Self> {
        let semaphore_info = vk::SemaphoreCreateInfo::builder();
        // Start signaled so the first wait returns immediately
        let fence_info = vk::FenceCreateInfo::builder().flags(vk::FenceCreateFlags::SIGNALED);

        unsafe {
            let image_available = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let render_finished = device
                .device
                .create_semaphore(&semaphore_info, None)
                .context("Failed to create semaphore")?;
            let in_flight_fence = if with_fence {
                Some(
                    device
                        .device
                        .create_fence(&fence_info, None)
                        .context("Failed to create fence")?,
                )
            } else {
                None
            };

            Ok(Self {
                image_available,
                render_finished,
                in_flight_fence,
            })
        }
    }

    pub fn destroy(&self, device: &ash::Device) {
        unsafe {
            device.destroy_semaphore(self.image_available, None);
            device.destroy_semaphore(self.render_finished, None);
            if let Some(fence) = self.in_flight_fence {
                device.destroy_fence(fence, None);
            }
        }
    }
}

/// Which slot fence last submitted work for each swapchain image.
///
/// Command buffers are recorded once per image, so an image acquired by one
/// slot may still be pending from another. Its old fence has to be waited
/// on before the buffer is submitted again.
#[derive(Debug, Default)]
pub struct ImagesInFlight {
    fences: Vec<vk::Fence>,
}

impl ImagesInFlight {
    /// Forget everything and track `image_count` fresh images
    pub fn reset(&mut self, image_count: usize) {
        self.fences = vec![vk::Fence::null(); image_count];
    }

    pub fn clear(&mut self) {
        self.fences.clear();
    }

    /// Hand `image_index` to `fence`. Returns the fence of another slot
    /// that must be waited on first, if any.
    pub fn claim(&mut self, image_index: u32, fence: vk::Fence) -> Result<Option<vk::Fence>> {
        let slot = self
            .fences
            .get_mut(image_index as usize)
            .ok_or_else(|| anyhow!("Image index {} is not tracked", image_index))?;
        let previous = std::mem::replace(slot, fence);
        if previous == vk::Fence::null() || previous == fence {
            Ok(None)
        } else {
            Ok(Some(previous))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn fence(raw: u64) -> vk::Fence {
        vk::Fence::from_raw(raw)
    }

    #[test]
    fn first_use_of_an_image_needs_no_wait() {
        let mut images = ImagesInFlight::default();
        images.reset(3);
        for index in 0..3 {
            assert_eq!(images.claim(index, fence(1)).unwrap(), None);
        }
    }

    #[test]
    fn same_slot_does_not_wait_on_itself() {
        let mut images = ImagesInFlight::default();
        images.reset(2);
        images.claim(0, fence(1)).unwrap();
        assert_eq!(images.claim(0, fence(1)).unwrap(), None);
    }

    #[test]
    fn image_reused_from_another_slot_waits_on_old_fence() {
        let mut images = ImagesInFlight::default();
        images.reset(3);
        images.claim(1, fence(10)).unwrap();

        assert_eq!(images.claim(1, fence(20)).unwrap(), Some(fence(10)));
        // The new owner is remembered
        assert_eq!(images.claim(1, fence(10)).unwrap(), Some(fence(20)));
    }

    #[test]
    fn reset_forgets_old_fences() {
        let mut images = ImagesInFlight::default();
        images.reset(3);
        images.claim(2, fence(10)).unwrap();

        images.reset(2);
        assert_eq!(images.claim(1, fence(20)).unwrap(), None);
        assert!(images.claim(2, fence(20)).is_err());
    }

    #[test]
    fn cleared_tracker_rejects_every_index() {
        let mut images = ImagesInFlight::default();
        images.reset(3);
        images.clear();
        assert!(images.claim(0, fence(1)).is_err());
    }
}
