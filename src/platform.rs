// Windowing collaborator.
//
// The renderer only needs four things from the window system: the instance
// extensions required for surfaces, a surface for a given instance, the
// current drawable size, and a stream of events telling it when to draw,
// rebuild or quit. winit provides all of them.

use anyhow::{Context, Result};
use ash::vk;
use raw_window_handle::{HasRawDisplayHandle, HasRawWindowHandle};
use std::ffi::{CStr, CString};
use winit::event::WindowEvent;
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes};

use crate::config::WindowConfig;

pub trait WindowSurface {
    /// Instance extensions needed to create a surface for this window
    fn required_extensions(&self) -> Result<Vec<CString>>;

    /// Create a presentation surface owned by the caller
    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;

    /// Size of the drawable area in physical pixels
    fn drawable_size(&self) -> (u32, u32);
}

impl WindowSurface for Window {
    fn required_extensions(&self) -> Result<Vec<CString>> {
        let names = ash_window::enumerate_required_extensions(self.raw_display_handle())
            .context("Unsupported display server")?;
        Ok(names
            .iter()
            .map(|&name| unsafe { CStr::from_ptr(name) }.to_owned())
            .collect())
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        unsafe {
            ash_window::create_surface(
                entry,
                instance,
                self.raw_display_handle(),
                self.raw_window_handle(),
                None,
            )
        }
        .context("Failed to create Vulkan surface for window")
    }

    fn drawable_size(&self) -> (u32, u32) {
        let size = self.inner_size();
        (size.width, size.height)
    }
}

/// What a window event means for the frame loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowSignal {
    Quit,
    /// Drawable size changed; the swapchain has to follow
    Resized { width: u32, height: u32 },
    /// Contents must be drawn again
    Exposed,
    Other,
}

impl WindowSignal {
    pub fn is_zero_area(&self) -> bool {
        matches!(self, WindowSignal::Resized { width, height } if *width == 0 || *height == 0)
    }
}

pub fn classify(event: &WindowEvent) -> WindowSignal {
    match event {
        WindowEvent::CloseRequested | WindowEvent::Destroyed => WindowSignal::Quit,
        WindowEvent::KeyboardInput { event, .. }
            if event.state.is_pressed()
                && event.physical_key == PhysicalKey::Code(KeyCode::Escape) =>
        {
            WindowSignal::Quit
        }
        WindowEvent::Resized(size) => WindowSignal::Resized {
            width: size.width,
            height: size.height,
        },
        WindowEvent::RedrawRequested => WindowSignal::Exposed,
        WindowEvent::Occluded(false) => WindowSignal::Exposed,
        _ => WindowSignal::Other,
    }
}

pub fn window_attributes(config: &WindowConfig) -> WindowAttributes {
    WindowAttributes::default()
        .with_title(&config.title)
        .with_inner_size(winit::dpi::PhysicalSize::new(config.width, config.height))
        .with_resizable(config.resizable)
}
