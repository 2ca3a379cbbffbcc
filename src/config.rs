// =============================================================================
// CONFIGURATION - Load settings from config.toml
// =============================================================================
//
// Everything that used to be a free-floating constant (application name,
// layer and extension names) lives here and is handed to the backend
// explicitly. Defaults apply if the file is missing or has errors.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::ffi::CString;
use std::path::Path;

use crate::error::RendererError;

/// Name of the presentation extension every selected device must expose
pub const SWAPCHAIN_EXTENSION: &str = "VK_KHR_swapchain";

/// Root configuration structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub application: ApplicationConfig,
    pub window: WindowConfig,
    pub graphics: GraphicsConfig,
    pub debug: DebugConfig,
}

/// Identity reported to the driver
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    pub name: String,
    pub engine_name: String,
    pub version: [u32; 3],
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "Vulkan demo".to_string(),
            engine_name: "No Engine".to_string(),
            version: [1, 0, 0],
        }
    }
}

/// Window settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub resizable: bool,
    /// Redraw every time the event loop goes idle instead of waiting for
    /// expose/resize events
    pub continuous_redraw: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "Vulkan".to_string(),
            width: 800,
            height: 600,
            resizable: true,
            continuous_redraw: false,
        }
    }
}

/// How the CPU is kept from running ahead of the GPU
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum FramePacing {
    /// Drain the present queue before every present. One frame in flight.
    #[default]
    QueueIdle,
    /// Ring of per-frame fences, `frames_in_flight` deep
    Fences,
}

/// Graphics settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphicsConfig {
    pub device_extensions: Vec<String>,
    pub frame_pacing: FramePacing,
    pub frames_in_flight: usize,
}

impl Default for GraphicsConfig {
    fn default() -> Self {
        Self {
            device_extensions: vec![SWAPCHAIN_EXTENSION.to_string()],
            frame_pacing: FramePacing::QueueIdle,
            frames_in_flight: 2,
        }
    }
}

impl GraphicsConfig {
    /// Number of sync slots the frame loop cycles through
    pub fn sync_slots(&self) -> usize {
        match self.frame_pacing {
            FramePacing::QueueIdle => 1,
            FramePacing::Fences => self.frames_in_flight,
        }
    }

    pub fn device_extension_names(&self) -> Result<Vec<CString>> {
        to_c_strings(&self.device_extensions)
    }
}

/// Debug settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DebugConfig {
    /// Only honoured in debug builds
    pub validation_layers: bool,
    pub validation_layer: String,
    pub log_level: String,
    pub show_fps: bool,
}

impl Default for DebugConfig {
    fn default() -> Self {
        Self {
            validation_layers: true,
            validation_layer: "VK_LAYER_KHRONOS_validation".to_string(),
            log_level: "info".to_string(),
            show_fps: true,
        }
    }
}

impl DebugConfig {
    pub fn level_filter(&self) -> log::LevelFilter {
        self.log_level.parse().unwrap_or(log::LevelFilter::Info)
    }
}

impl Config {
    /// Load configuration from file, falling back to defaults if not found
    pub fn load() -> Self {
        Self::load_from_path("config.toml").unwrap_or_else(|e| {
            log::warn!("Failed to load config.toml: {:#}. Using defaults.", e);
            Config::default()
        })
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            log::info!("Config file not found at {:?}, using defaults", path);
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;

        log::info!("Loaded configuration from {:?}", path);
        log::debug!("Config: {:?}", config);

        Ok(config)
    }

    /// Reject settings the backend cannot work with
    pub fn validate(&self) -> Result<()> {
        if !self
            .graphics
            .device_extensions
            .iter()
            .any(|name| name == SWAPCHAIN_EXTENSION)
        {
            return Err(RendererError::InvalidConfig(format!(
                "graphics.device_extensions must contain {}",
                SWAPCHAIN_EXTENSION
            ))
            .into());
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(RendererError::InvalidConfig(
                "window size must be non-zero".to_string(),
            )
            .into());
        }
        if self.graphics.frames_in_flight == 0 {
            return Err(RendererError::InvalidConfig(
                "graphics.frames_in_flight must be at least 1".to_string(),
            )
            .into());
        }
        Ok(())
    }

    /// Packed application version for `VkApplicationInfo`
    pub fn application_version(&self) -> u32 {
        let [major, minor, patch] = self.application.version;
        ash::vk::make_api_version(0, major, minor, patch)
    }
}

pub(crate) fn to_c_strings(names: &[String]) -> Result<Vec<CString>> {
    names
        .iter()
        .map(|name| {
            CString::new(name.as_str())
                .with_context(|| format!("Name contains a NUL byte: {:?}", name))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.graphics.frame_pacing, FramePacing::QueueIdle);
        assert_eq!(config.graphics.sync_slots(), 1);
        assert_eq!(config.graphics.device_extensions, vec![SWAPCHAIN_EXTENSION]);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(dir.path().join("nope.toml")).unwrap();
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 600);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let file = write_config(
            r#"
            [window]
            title = "Triangle"
            width = 1024

            [graphics]
            frame_pacing = "fences"
            frames_in_flight = 3
            "#,
        );

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.window.title, "Triangle");
        assert_eq!(config.window.width, 1024);
        assert_eq!(config.window.height, 600);
        assert_eq!(config.graphics.frame_pacing, FramePacing::Fences);
        assert_eq!(config.graphics.sync_slots(), 3);
        assert_eq!(config.application.name, "Vulkan demo");
    }

    #[test]
    fn swapchain_extension_is_mandatory() {
        let file = write_config(
            r#"
            [graphics]
            device_extensions = ["VK_KHR_maintenance1"]
            "#,
        );

        let err = Config::load_from_path(file.path()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RendererError>(),
            Some(RendererError::InvalidConfig(_))
        ));
    }

    #[test]
    fn zero_frames_in_flight_is_rejected() {
        let mut config = Config::default();
        config.graphics.frames_in_flight = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let file = write_config("[window\nwidth = ");
        assert!(Config::load_from_path(file.path()).is_err());
    }

    #[test]
    fn unknown_log_level_defaults_to_info() {
        let mut debug = DebugConfig::default();
        debug.log_level = "chatty".to_string();
        assert_eq!(debug.level_filter(), log::LevelFilter::Info);
        debug.log_level = "trace".to_string();
        assert_eq!(debug.level_filter(), log::LevelFilter::Trace);
    }

    #[test]
    fn application_version_is_packed() {
        let config = Config::default();
        let version = config.application_version();
        assert_eq!(ash::vk::api_version_major(version), 1);
        assert_eq!(ash::vk::api_version_minor(version), 0);
    }
}
