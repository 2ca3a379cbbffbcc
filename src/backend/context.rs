// Vulkan context - everything the frame loop drives
//
// Long-lived objects (instance, surface, device, command pool, sync slots)
// are built once. The swapchain and render targets come and go through
// `rebuild`. Field order is the teardown order.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::device::select_physical_device;
use super::swapchain::choose_extent;
use super::sync::{FrameSync, ImagesInFlight};
use super::targets::stale_outcome;
use super::{
    LogicalDevice, QueueRole, RenderTargets, Surface, Swapchain, SwapchainSupport, VulkanInstance,
};
use crate::config::{Config, FramePacing};
use crate::frame::{AcquireOutcome, FrameBackend, PresentOutcome, RebuildOutcome};
use crate::platform::WindowSurface;

pub struct VulkanContext {
    frame_sync: Vec<FrameSync>,
    images_in_flight: ImagesInFlight,
    current_frame: usize,
    wait_stages: [vk::PipelineStageFlags; 1],
    pacing: FramePacing,

    render_targets: Option<RenderTargets>,
    swapchain: Option<Swapchain>,
    command_pool: vk::CommandPool,
    device: Arc<LogicalDevice>,
    // Surface and device each hold the instance until they are gone
    surface: Surface,
    window: Arc<dyn WindowSurface>,
}

impl VulkanContext {
    /// Create everything up to the command pool. No swapchain is built yet.
    pub fn new(config: &Config, window: Arc<dyn WindowSurface>) -> Result<Self> {
        log::info!("Initializing Vulkan...");

        let window_extensions = window.required_extensions()?;
        let instance = Arc::new(VulkanInstance::new(config, &window_extensions)?);
        let surface = Surface::new(instance.clone(), window.as_ref())?;

        let device_extensions = config.graphics.device_extension_names()?;
        let candidate = select_physical_device(&surface, &device_extensions)?;
        let device = LogicalDevice::new(instance, &candidate, &device_extensions)?;

        // Command buffers are recorded once per swapchain and never reset
        let pool_info =
            vk::CommandPoolCreateInfo::builder().queue_family_index(device.queue_families.graphics);
        let command_pool = unsafe { device.device.create_command_pool(&pool_info, None) }
            .context("Failed to create command pool")?;

        let pacing = config.graphics.frame_pacing;
        let mut context = Self {
            frame_sync: Vec::new(),
            images_in_flight: ImagesInFlight::default(),
            current_frame: 0,
            wait_stages: [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT],
            pacing,
            render_targets: None,
            swapchain: None,
            command_pool,
            device,
            surface,
            window,
        };

        let with_fence = pacing == FramePacing::Fences;
        for _ in 0..config.graphics.sync_slots() {
            let sync = FrameSync::new(&context.device, with_fence)?;
            context.frame_sync.push(sync);
        }

        log::info!(
            "Vulkan initialized ({:?} pacing, {} sync slot(s))",
            pacing,
            context.frame_sync.len()
        );
        Ok(context)
    }

    pub fn wait_idle(&self) -> Result<()> {
        self.device.wait_idle()
    }

    fn current_sync(&self) -> &FrameSync {
        &self.frame_sync[self.current_frame]
    }

    fn wait_for_fence(&self, fence: vk::Fence) -> Result<()> {
        unsafe { self.device.device.wait_for_fences(&[fence], true, u64::MAX) }
            .context("Failed to wait for frame fence")
    }
}

impl FrameBackend for VulkanContext {
    fn acquire_image(&mut self) -> Result<AcquireOutcome> {
        let swapchain = self.swapchain.as_ref().context("Swapchain not built")?;

        // Per-image resources out of step with the chain count as stale
        let counts = self.render_targets.as_ref().map(|t| t.counts(swapchain));
        if let Some(outcome) = stale_outcome(counts) {
            log::warn!("Render targets do not match the swapchain: {:?}", counts);
            return Ok(outcome);
        }

        let sync = self.current_sync();
        let (image_available, slot_fence) = (sync.image_available, sync.in_flight_fence);
        if let Some(fence) = slot_fence {
            self.wait_for_fence(fence)?;
        }

        let outcome = swapchain.acquire_next_image(image_available)?;

        if let AcquireOutcome::Ready { image_index, .. } = outcome {
            if let Some(fence) = slot_fence {
                if let Some(previous) = self.images_in_flight.claim(image_index, fence)? {
                    self.wait_for_fence(previous)?;
                }
            }
        }

        Ok(outcome)
    }

    fn submit(&mut self, image_index: u32) -> Result<()> {
        let targets = self
            .render_targets
            .as_ref()
            .context("Render targets not built")?;
        let sync = self.current_sync();

        let wait_semaphores = [sync.image_available];
        let signal_semaphores = [sync.render_finished];
        let command_buffers = [targets.command_buffers[image_index as usize]];

        let submit_info = vk::SubmitInfo::builder()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&self.wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores)
            .build();

        let fence = match sync.in_flight_fence {
            Some(fence) => {
                unsafe { self.device.device.reset_fences(&[fence]) }
                    .context("Failed to reset frame fence")?;
                fence
            }
            None => vk::Fence::null(),
        };

        unsafe {
            self.device
                .device
                .queue_submit(self.device.queue(QueueRole::Graphics), &[submit_info], fence)
        }
        .context("Failed to submit draw command buffer")
    }

    fn present(&mut self, image_index: u32) -> Result<PresentOutcome> {
        let swapchain = self.swapchain.as_ref().context("Swapchain not built")?;
        let present_queue = self.device.queue(QueueRole::Present);

        if self.pacing == FramePacing::QueueIdle {
            unsafe { self.device.device.queue_wait_idle(present_queue) }
                .context("Failed to wait for present queue")?;
        }

        let render_finished = self.current_sync().render_finished;
        let outcome = swapchain.present(present_queue, image_index, &[render_finished])?;

        self.current_frame = (self.current_frame + 1) % self.frame_sync.len();
        Ok(outcome)
    }

    fn rebuild(&mut self) -> Result<RebuildOutcome> {
        self.device.wait_idle()?;

        // Old chain and everything built on its images go first
        self.render_targets = None;
        self.swapchain = None;
        self.images_in_flight.clear();

        let support = SwapchainSupport::query(&self.surface, self.device.physical_device)?;
        let (width, height) = self.window.drawable_size();
        let Some(extent) = choose_extent(&support.capabilities, vk::Extent2D { width, height })
        else {
            log::info!("Surface is {}x{}, skipping swapchain build", width, height);
            return Ok(RebuildOutcome::ZeroExtent);
        };

        let swapchain = Swapchain::new(self.device.clone(), &self.surface, &support, extent)?;
        let targets = RenderTargets::new(self.device.clone(), &swapchain, self.command_pool)?;
        let image_count = swapchain.image_count();

        self.images_in_flight.reset(image_count);
        self.swapchain = Some(swapchain);
        self.render_targets = Some(targets);

        Ok(RebuildOutcome::Rebuilt { image_count })
    }
}

impl Drop for VulkanContext {
    fn drop(&mut self) {
        log::info!("Cleaning up Vulkan resources...");

        if let Err(e) = self.device.wait_idle() {
            log::error!("{:#}", e);
        }

        for sync in &self.frame_sync {
            sync.destroy(&self.device.device);
        }
        self.render_targets = None;
        self.swapchain = None;
        unsafe {
            self.device
                .device
                .destroy_command_pool(self.command_pool, None);
        }

        // Device, surface, instance and window follow
        log::info!("Cleanup complete");
    }
}
