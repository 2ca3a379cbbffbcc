// =============================================================================
// VULKAN TRIANGLE - window, event loop and renderer wiring
// =============================================================================
//
// FRAME FLOW:
// 1. winit delivers a redraw-worthy event (expose, resize, redraw request)
// 2. Rebuild swapchain + render targets if they went stale
// 3. Acquire swapchain image
// 4. Submit the pre-recorded triangle draw
// 5. Present, then go back to waiting for events
//
// Usage: vk-triangle [config.toml]
// =============================================================================

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Instant;
use vk_triangle::frame::FrameOutcome;
use vk_triangle::platform::{self, WindowSignal};
use vk_triangle::stats::FrameStats;
use vk_triangle::{Config, Renderer};
use winit::{
    application::ApplicationHandler,
    event::WindowEvent,
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    window::{Window, WindowId},
};

fn main() -> Result<()> {
    let config = match std::env::args_os().nth(1) {
        Some(path) => Config::load_from_path(&path)
            .with_context(|| format!("Invalid configuration {:?}", path))?,
        None => Config::load(),
    };

    vk_triangle::init_logging(&config.debug);
    log::info!("Starting Vulkan triangle");
    log::info!(
        "Window: {}x{}, {:?} frame pacing",
        config.window.width,
        config.window.height,
        config.graphics.frame_pacing
    );

    let event_loop = EventLoop::new()?;
    // Block until the next event instead of spinning
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => {
            log::info!("Exited cleanly");
            Ok(())
        }
    }
}

/// Application state.
///
/// Field order matters for Drop: the renderer goes before the window.
struct App {
    config: Config,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    stats: FrameStats,
    /// First fatal error, reported from `main`
    error: Option<anyhow::Error>,
}

impl App {
    fn new(config: Config) -> Self {
        Self {
            config,
            renderer: None,
            window: None,
            stats: FrameStats::new(Instant::now()),
            error: None,
        }
    }

    fn init(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attributes = platform::window_attributes(&self.config.window);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .context("Failed to create window")?,
        );

        let renderer = Renderer::initialize(&self.config, window.clone())?;
        self.renderer = Some(renderer);
        self.window = Some(window);
        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        match renderer.draw_frame()? {
            FrameOutcome::Presented { .. } => {
                if self.config.debug.show_fps {
                    if let Some(sample) = self.stats.record_frame(Instant::now()) {
                        if let Some(window) = &self.window {
                            let title = FrameStats::title(&self.config.window.title, &sample);
                            window.set_title(&title);
                        }
                    }
                }
            }
            FrameOutcome::Stale => {
                // Rebuild and draw again straight away
                if let Some(window) = &self.window {
                    window.request_redraw();
                }
            }
            FrameOutcome::SurfaceUnavailable => {}
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("Fatal: {:#}", error);
        if self.error.is_none() {
            self.error = Some(error);
        }
        self.shutdown();
        event_loop.exit();
    }

    fn shutdown(&mut self) {
        if let Some(renderer) = self.renderer.take() {
            if let Err(e) = renderer.wait_idle() {
                log::error!("{:#}", e);
            }
            let frames = renderer.frames();
            log::info!(
                "Presented {} frames over {} swapchain builds",
                frames.frames_presented(),
                frames.rebuilds()
            );
            // Tears everything down, window last
            drop(renderer);
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        if let Err(e) = self.init(event_loop) {
            self.fail(event_loop, e.context("Failed to initialize Vulkan"));
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let signal = platform::classify(&event);
        match signal {
            WindowSignal::Quit => {
                log::info!("Quit requested, shutting down...");
                self.shutdown();
                event_loop.exit();
            }
            WindowSignal::Resized { width, height } => {
                log::debug!("Window resized to {}x{}", width, height);
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.notify_resized();
                }
                if !signal.is_zero_area() {
                    if let Some(window) = &self.window {
                        window.request_redraw();
                    }
                }
            }
            WindowSignal::Exposed => {
                if let Err(e) = self.draw() {
                    self.fail(event_loop, e);
                }
            }
            WindowSignal::Other => {}
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        let (Some(window), Some(renderer)) = (&self.window, &self.renderer) else {
            return;
        };

        // Nothing to draw into while minimized; the next resize wakes us up
        if !renderer.frames().surface_available() {
            return;
        }
        if self.config.window.continuous_redraw || renderer.needs_rebuild() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        self.shutdown();
    }
}
