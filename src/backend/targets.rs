// Render targets - everything that depends on the swapchain images
//
// Render pass, pipeline, framebuffers and pre-recorded command buffers.
// Built from one swapchain and dropped before that swapchain is.

use anyhow::{Context, Result};
use ash::vk;
use std::sync::Arc;

use super::pipeline;
use super::{LogicalDevice, Swapchain};
use crate::frame::AcquireOutcome;

/// Lengths of everything that is kept per swapchain image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PerImageCounts {
    pub images: usize,
    pub image_views: usize,
    pub framebuffers: usize,
    pub command_buffers: usize,
}

impl PerImageCounts {
    /// One of each per image, and at least one image
    pub fn is_consistent(&self) -> bool {
        self.images > 0
            && self.image_views == self.images
            && self.framebuffers == self.images
            && self.command_buffers == self.images
    }
}

/// What to report instead of acquiring when the per-image resources are
/// missing (`None`) or out of step with the chain. `None` means go ahead.
pub fn stale_outcome(counts: Option<PerImageCounts>) -> Option<AcquireOutcome> {
    match counts {
        Some(counts) if counts.is_consistent() => None,
        _ => Some(AcquireOutcome::OutOfDate),
    }
}

pub struct RenderTargets {
    pub render_pass: vk::RenderPass,
    pub pipeline_layout: vk::PipelineLayout,
    pub pipeline: vk::Pipeline,
    pub framebuffers: Vec<vk::Framebuffer>,
    /// One per framebuffer, recorded once and resubmitted every frame
    pub command_buffers: Vec<vk::CommandBuffer>,
    command_pool: vk::CommandPool,
    device: Arc<LogicalDevice>,
}

impl RenderTargets {
    pub fn new(
        device: Arc<LogicalDevice>,
        swapchain: &Swapchain,
        command_pool: vk::CommandPool,
    ) -> Result<Self> {
        // Null handles are valid to destroy, so Drop can clean up a
        // partially built set
        let mut targets = Self {
            render_pass: vk::RenderPass::null(),
            pipeline_layout: vk::PipelineLayout::null(),
            pipeline: vk::Pipeline::null(),
            framebuffers: Vec::new(),
            command_buffers: Vec::new(),
            command_pool,
            device,
        };

        let device = targets.device.clone();
        targets.render_pass = pipeline::create_render_pass(&device, swapchain.format)?;
        targets.pipeline_layout = pipeline::create_pipeline_layout(&device)?;
        targets.pipeline = pipeline::create_graphics_pipeline(
            &device,
            targets.render_pass,
            targets.pipeline_layout,
            swapchain.extent,
        )?;
        targets.framebuffers = pipeline::create_framebuffers(
            &device,
            &swapchain.image_views,
            targets.render_pass,
            swapchain.extent,
        )?;

        let alloc_info = vk::CommandBufferAllocateInfo::builder()
            .command_pool(command_pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(targets.framebuffers.len() as u32);
        targets.command_buffers = unsafe { device.device.allocate_command_buffers(&alloc_info) }
            .context("Failed to allocate command buffers")?;

        targets.record(swapchain.extent)?;

        log::info!(
            "Created {} framebuffers and pre-recorded command buffers",
            targets.command_buffers.len()
        );

        Ok(targets)
    }

    /// Record the draw for every image: begin pass, bind pipeline, draw 3 vertices
    fn record(&self, extent: vk::Extent2D) -> Result<()> {
        let device = &self.device.device;

        for (&cmd, &framebuffer) in self.command_buffers.iter().zip(&self.framebuffers) {
            let begin_info = vk::CommandBufferBeginInfo::builder();

            let render_pass_info = vk::RenderPassBeginInfo::builder()
                .render_pass(self.render_pass)
                .framebuffer(framebuffer)
                .render_area(vk::Rect2D {
                    offset: vk::Offset2D { x: 0, y: 0 },
                    extent,
                });

            unsafe {
                device
                    .begin_command_buffer(cmd, &begin_info)
                    .context("Failed to begin command buffer")?;
                device.cmd_begin_render_pass(cmd, &render_pass_info, vk::SubpassContents::INLINE);
                device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline);
                device.cmd_draw(cmd, 3, 1, 0, 0);
                device.cmd_end_render_pass(cmd);
                device
                    .end_command_buffer(cmd)
                    .context("Failed to end command buffer")?;
            }
        }

        Ok(())
    }

    pub fn counts(&self, swapchain: &Swapchain) -> PerImageCounts {
        PerImageCounts {
            images: swapchain.images.len(),
            image_views: swapchain.image_views.len(),
            framebuffers: self.framebuffers.len(),
            command_buffers: self.command_buffers.len(),
        }
    }
}

impl Drop for RenderTargets {
    fn drop(&mut self) {
        log::debug!("Destroying {} render targets", self.framebuffers.len());
        unsafe {
            if !self.command_buffers.is_empty() {
                self.device
                    .device
                    .free_command_buffers(self.command_pool, &self.command_buffers);
            }
            pipeline::destroy_framebuffers(&self.device, &self.framebuffers);
            self.device.device.destroy_pipeline(self.pipeline, None);
            self.device
                .device
                .destroy_pipeline_layout(self.pipeline_layout, None);
            self.device.device.destroy_render_pass(self.render_pass, None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(
        images: usize,
        image_views: usize,
        framebuffers: usize,
        command_buffers: usize,
    ) -> PerImageCounts {
        PerImageCounts {
            images,
            image_views,
            framebuffers,
            command_buffers,
        }
    }

    #[test]
    fn matching_counts_allow_acquire() {
        assert!(counts(3, 3, 3, 3).is_consistent());
        assert_eq!(stale_outcome(Some(counts(3, 3, 3, 3))), None);
        assert_eq!(stale_outcome(Some(counts(2, 2, 2, 2))), None);
    }

    #[test]
    fn any_mismatch_is_out_of_date() {
        for mismatched in [
            counts(3, 2, 3, 3),
            counts(3, 3, 2, 3),
            counts(3, 3, 3, 4),
            counts(2, 3, 3, 3),
        ] {
            assert!(!mismatched.is_consistent(), "{:?}", mismatched);
            assert_eq!(
                stale_outcome(Some(mismatched)),
                Some(AcquireOutcome::OutOfDate)
            );
        }
    }

    #[test]
    fn empty_chain_is_not_consistent() {
        assert!(!counts(0, 0, 0, 0).is_consistent());
    }

    #[test]
    fn missing_targets_are_out_of_date() {
        assert_eq!(stale_outcome(None), Some(AcquireOutcome::OutOfDate));
    }
}
