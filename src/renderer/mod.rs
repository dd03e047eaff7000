pub mod config;
pub mod error;
pub mod scheduler;
pub mod vulkan;

mod core;
mod internals;
mod resources;

use color_eyre::Result;

use crate::platform::PlatformWindow;

pub use config::RenderConfig;
pub use error::RenderError;
pub use vulkan::VulkanRenderer;

/// A rendering backend driven once per application loop iteration
pub trait Renderer {
    fn init(
        window: &dyn PlatformWindow,
        config: RenderConfig,
    ) -> Result<Self>
    where
        Self: Sized;

    /// Draws and presents one frame, rebuilding the swapchain when the surface changed
    fn render(&mut self, window: &mut dyn PlatformWindow) -> Result<()>;

    /// Waits for the GPU and releases every object. Calling it again does nothing.
    fn cleanup(&mut self);
}
