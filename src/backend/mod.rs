// Backend module - Vulkan abstraction layer
//
// Thin wrappers around ash. Every wrapper holds an `Arc<VulkanDevice>` and
// destroys its handles on drop.

pub mod buffer;
pub mod command;
pub mod descriptor;
pub mod device;
pub mod image;
pub mod pipeline;
pub mod queue;
pub mod shader;
pub mod surface;
pub mod swapchain;
pub mod sync;

pub use device::VulkanDevice;
pub use swapchain::Swapchain;
