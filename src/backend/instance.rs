// Vulkan Instance - library loading, extensions, validation
//
// Responsibilities:
// - Load the Vulkan library
// - Verify every requested instance extension and layer exists
// - Create the instance and (optionally) the debug messenger

use anyhow::{Context, Result};
use ash::extensions::ext::DebugUtils;
use ash::{vk, Entry};
use std::ffi::{c_char, CStr, CString};

use crate::config::Config;
use crate::error::RendererError;

/// Instance wrapper with automatic cleanup
pub struct VulkanInstance {
    pub entry: Entry,
    pub instance: ash::Instance,
    debug_utils: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    /// Create the instance
    ///
    /// # Arguments
    /// * `config` - Application identity and validation settings
    /// * `window_extensions` - Extensions the windowing system needs for surfaces
    pub fn new(config: &Config, window_extensions: &[CString]) -> Result<Self> {
        let enable_validation = cfg!(debug_assertions) && config.debug.validation_layers;
        log::info!(
            "Creating Vulkan instance: {} (validation {})",
            config.application.name,
            if enable_validation { "on" } else { "off" }
        );

        let entry = unsafe { Entry::load() }
            .context("Failed to load Vulkan library. Is Vulkan installed?")?;

        let mut extensions = window_extensions.to_vec();
        if enable_validation {
            extensions.push(DebugUtils::name().to_owned());
        }

        let available_extensions = entry
            .enumerate_instance_extension_properties(None)
            .context("Failed to enumerate instance extensions")?;
        let available_extension_names: Vec<String> = available_extensions
            .iter()
            .map(|e| raw_name(&e.extension_name))
            .collect();
        log::debug!("Available instance extensions: {:?}", available_extension_names);

        if let Some(missing) = missing_names(&available_extension_names, &extensions)
            .into_iter()
            .next()
        {
            return Err(RendererError::MissingInstanceExtension(missing).into());
        }

        let layers = if enable_validation {
            let layer = CString::new(config.debug.validation_layer.as_str())
                .context("Validation layer name contains a NUL byte")?;
            let available_layers: Vec<String> = entry
                .enumerate_instance_layer_properties()
                .context("Failed to enumerate instance layers")?
                .iter()
                .map(|l| raw_name(&l.layer_name))
                .collect();
            if !missing_names(&available_layers, std::slice::from_ref(&layer)).is_empty() {
                return Err(
                    RendererError::MissingLayer(config.debug.validation_layer.clone()).into(),
                );
            }
            vec![layer]
        } else {
            Vec::new()
        };

        let app_name = CString::new(config.application.name.as_str())?;
        let engine_name = CString::new(config.application.engine_name.as_str())?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(config.application_version())
            .engine_name(&engine_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(vk::API_VERSION_1_1);

        let extension_ptrs: Vec<_> = extensions.iter().map(|e| e.as_ptr()).collect();
        let layer_ptrs: Vec<_> = layers.iter().map(|l| l.as_ptr()).collect();

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extension_ptrs)
            .enabled_layer_names(&layer_ptrs);

        let instance = unsafe { entry.create_instance(&create_info, None) }
            .context("Failed to create Vulkan instance")?;

        // From here on Drop owns the instance
        let mut vulkan = Self {
            entry,
            instance,
            debug_utils: None,
        };

        if enable_validation {
            vulkan.debug_utils = Some(vulkan.setup_debug_messenger()?);
        }

        Ok(vulkan)
    }

    fn setup_debug_messenger(&self) -> Result<(DebugUtils, vk::DebugUtilsMessengerEXT)> {
        let debug_utils = DebugUtils::new(&self.entry, &self.instance);

        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING
                    | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        let messenger = unsafe { debug_utils.create_debug_utils_messenger(&create_info, None) }
            .context("Failed to create debug messenger")?;

        Ok((debug_utils, messenger))
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        log::info!("Destroying Vulkan instance...");
        unsafe {
            if let Some((debug_utils, messenger)) = self.debug_utils.take() {
                debug_utils.destroy_debug_utils_messenger(messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

/// Owned copy of a NUL-terminated name from a Vulkan properties struct
fn raw_name(raw: &[c_char]) -> String {
    unsafe { CStr::from_ptr(raw.as_ptr()) }
        .to_string_lossy()
        .into_owned()
}

/// Requested names that do not appear in `available`, in request order
pub fn missing_names(available: &[String], requested: &[CString]) -> Vec<String> {
    requested
        .iter()
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !available.iter().any(|a| a == name))
        .collect()
}

// Debug callback for validation layers
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    _message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _p_user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*p_callback_data).p_message);

    match message_severity {
        vk::DebugUtilsMessageSeverityFlagsEXT::ERROR => {
            log::error!("[Vulkan] {}", message.to_string_lossy());
        }
        vk::DebugUtilsMessageSeverityFlagsEXT::WARNING => {
            log::warn!("[Vulkan] {}", message.to_string_lossy());
        }
        _ => {
            log::debug!("[Vulkan] {}", message.to_string_lossy());
        }
    }

    vk::FALSE
}
