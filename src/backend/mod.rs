// Backend module - Vulkan abstraction layer
//
// Design: Thin wrappers around ash, each owning its handles and destroying
// them on drop. Ordering between them is held by Arc references.

pub mod context;
pub mod device;
pub mod instance;
pub mod pipeline;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;
pub mod targets;

pub use context::VulkanContext;
pub use device::{LogicalDevice, PhysicalDeviceCandidate, QueueFamilies, QueueRole};
pub use instance::VulkanInstance;
pub use surface::Surface;
pub use swapchain::{Swapchain, SwapchainSupport};
pub use sync::{FrameSync, ImagesInFlight};
pub use targets::{stale_outcome, PerImageCounts, RenderTargets};
