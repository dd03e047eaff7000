use std::ffi::CStr;
use ash::vk;
use color_eyre::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::platform::PlatformWindow;
use crate::renderer::core::surface::SurfaceProvider;
use crate::renderer::error::RenderError;

/// Surface for any other windowing system `ash-window` understands (Metal, Wayland, ...)
pub struct PortableSurface {
    display: RawDisplayHandle,
    window: RawWindowHandle,
}

impl SurfaceProvider for PortableSurface {
    fn from_window(window: &dyn PlatformWindow) -> Result<Self> {
        Ok(Self {
            display: window.instance_handle()?,
            window: window.native_handle()?,
        })
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        let exts = ash_window::enumerate_required_extensions(self.display)
            .map_err(RenderError::init("surface extension list"))?
            .iter()
            .map(|ext| unsafe { CStr::from_ptr(*ext) })
            .collect::<Vec<_>>();
        Ok(exts)
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        let surface = unsafe {
            ash_window::create_surface(entry, instance, self.display, self.window, None)
        }
        .map_err(RenderError::init("surface"))?;
        Ok(surface)
    }
}
