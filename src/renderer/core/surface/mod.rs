//! Platform adapters turning a window's raw handles into a `VkSurfaceKHR`.
//!
//! Exactly one provider is compiled per target and exposed as [`PlatformSurface`].

#[cfg(target_os = "windows")]
mod win32;
#[cfg(target_os = "linux")]
mod xlib;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
mod portable;

use std::ffi::CStr;
use ash::vk;
use color_eyre::Result;

use crate::platform::PlatformWindow;
use crate::renderer::error::RenderError;

#[cfg(target_os = "windows")]
pub use win32::Win32Surface as PlatformSurface;
#[cfg(target_os = "linux")]
pub use xlib::XlibSurface as PlatformSurface;
#[cfg(not(any(target_os = "windows", target_os = "linux")))]
pub use portable::PortableSurface as PlatformSurface;

pub trait SurfaceProvider {
    /// Captures the handles needed to create a surface for `window`
    fn from_window(window: &dyn PlatformWindow) -> Result<Self>
    where
        Self: Sized;

    /// Instance extensions the surface needs, `VK_KHR_surface` included
    fn required_extensions(&self) -> Result<Vec<&'static CStr>>;

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR>;
}

/// Presentation surface and its loader, destroyed before the instance
pub struct RenderSurface {
    pub handle: vk::SurfaceKHR,
    pub loader: ash::khr::surface::Instance,
}

impl RenderSurface {
    pub fn new(
        provider: &dyn SurfaceProvider,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<Self> {
        log::info!("Creating surface...");
        let handle = provider.create_surface(entry, instance)?;
        let loader = ash::khr::surface::Instance::new(entry, instance);
        Ok(Self { handle, loader })
    }

    pub fn supports_present(
        &self,
        physical_device: vk::PhysicalDevice,
        queue_family_index: u32,
    ) -> Result<bool> {
        let supported = unsafe {
            self.loader.get_physical_device_surface_support(
                physical_device,
                queue_family_index,
                self.handle,
            )
        }
        .map_err(RenderError::init("surface support query"))?;
        Ok(supported)
    }

    /// # Safety
    /// Every swapchain created from this surface must already be destroyed.
    pub unsafe fn destroy(&mut self) {
        if self.handle != vk::SurfaceKHR::null() {
            unsafe {
                self.loader.destroy_surface(self.handle, None);
            }
            self.handle = vk::SurfaceKHR::null();
        }
    }
}
