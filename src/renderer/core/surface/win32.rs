use std::ffi::CStr;
use ash::vk;
use color_eyre::Result;
use raw_window_handle::RawWindowHandle;

use crate::platform::PlatformWindow;
use crate::renderer::core::surface::SurfaceProvider;
use crate::renderer::error::RenderError;

/// Win32 surface built from a window's HWND and module HINSTANCE
pub struct Win32Surface {
    hwnd: vk::HWND,
    hinstance: vk::HINSTANCE,
}

impl SurfaceProvider for Win32Surface {
    fn from_window(window: &dyn PlatformWindow) -> Result<Self> {
        match window.native_handle()? {
            RawWindowHandle::Win32(handle) => Ok(Self {
                hwnd: handle.hwnd.get(),
                hinstance: handle
                    .hinstance
                    .ok_or(RenderError::WindowHandle("Win32 instance"))?
                    .get(),
            }),
            _ => Err(RenderError::WindowHandle("Win32 window").into()),
        }
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        Ok(vec![
            ash::khr::surface::NAME,
            ash::khr::win32_surface::NAME,
        ])
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        log::debug!("Creating Win32 surface");
        let surface_info = vk::Win32SurfaceCreateInfoKHR::default()
            .hinstance(self.hinstance)
            .hwnd(self.hwnd);
        let loader = ash::khr::win32_surface::Instance::new(entry, instance);
        let surface = unsafe { loader.create_win32_surface(&surface_info, None) }
            .map_err(RenderError::init("Win32 surface"))?;
        Ok(surface)
    }
}
