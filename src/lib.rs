// Vulkan presentation-surface and frame-lifecycle manager.
//
// Brings up an instance, surface, device and swapchain for a window, then
// draws a single hardcoded triangle per frame. The swapchain and everything
// built on its images is thrown away and rebuilt whenever the surface goes
// stale or the window is resized.

pub mod backend;
pub mod config;
pub mod error;
pub mod frame;
pub mod platform;
pub mod renderer;
pub mod stats;

pub use config::Config;
pub use error::RendererError;
pub use frame::{FrameBackend, FrameLoop, FrameOutcome};
pub use renderer::Renderer;

/// Initialize logging. `RUST_LOG` overrides the configured level.
pub fn init_logging(debug: &config::DebugConfig) {
    env_logger::Builder::new()
        .filter_level(debug.level_filter())
        .parse_default_env()
        .init();
}
