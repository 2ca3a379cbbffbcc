// Shader module loading
//
// SPIR-V is produced by build.rs and embedded in the binary. The modules
// only need to live until the pipeline that uses them has been created.

use anyhow::{Context, Result};
use ash::vk;
use std::io::Cursor;

use super::LogicalDevice;

pub const TRIANGLE_VERT_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.vert.spv"));
pub const TRIANGLE_FRAG_SPV: &[u8] = include_bytes!(concat!(env!("OUT_DIR"), "/triangle.frag.spv"));

/// Entry point name shared by both stages
pub const ENTRY_POINT: &std::ffi::CStr = c"main";

/// Shader module destroyed on drop
pub struct ShaderModule<'a> {
    pub handle: vk::ShaderModule,
    device: &'a LogicalDevice,
}

impl<'a> ShaderModule<'a> {
    /// Create a module from SPIR-V bytes. `read_spv` takes care of word
    /// alignment, which `include_bytes!` does not guarantee.
    pub fn from_spirv(device: &'a LogicalDevice, bytes: &[u8]) -> Result<Self> {
        let code = ash::util::read_spv(&mut Cursor::new(bytes)).context("Invalid SPIR-V")?;

        let create_info = vk::ShaderModuleCreateInfo::builder().code(&code);

        let handle = unsafe { device.device.create_shader_module(&create_info, None) }
            .context("Failed to create shader module")?;

        Ok(Self { handle, device })
    }
}

impl Drop for ShaderModule<'_> {
    fn drop(&mut self) {
        unsafe {
            self.device.device.destroy_shader_module(self.handle, None);
        }
    }
}
