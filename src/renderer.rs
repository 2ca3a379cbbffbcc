// Public entry point: one object that owns the Vulkan context and the
// frame loop driving it.

use anyhow::Result;
use std::sync::Arc;

use crate::backend::VulkanContext;
use crate::config::Config;
use crate::frame::{FrameLoop, FrameOutcome};
use crate::platform::WindowSurface;

pub struct Renderer {
    // Split so the loop can borrow the context mutably
    frames: FrameLoop,
    context: VulkanContext,
}

impl Renderer {
    /// Bring up Vulkan for `window` and build the first swapchain.
    ///
    /// A window that starts minimized is fine: the swapchain is built by the
    /// first `draw_frame` after it gets a drawable area.
    pub fn initialize(config: &Config, window: Arc<dyn WindowSurface>) -> Result<Self> {
        let mut context = VulkanContext::new(config, window)?;
        let mut frames = FrameLoop::new();
        frames.ensure_built(&mut context)?;
        Ok(Self { frames, context })
    }

    /// Acquire, submit and present at most one image
    pub fn draw_frame(&mut self) -> Result<FrameOutcome> {
        self.frames.draw_frame(&mut self.context)
    }

    /// The drawable size changed; rebuild before the next frame
    pub fn notify_resized(&mut self) {
        self.frames.request_rebuild();
    }

    pub fn needs_rebuild(&self) -> bool {
        self.frames.needs_rebuild()
    }

    pub fn frames(&self) -> &FrameLoop {
        &self.frames
    }

    /// Block until the GPU has finished all submitted work
    pub fn wait_idle(&self) -> Result<()> {
        self.context.wait_idle()
    }
}
