use std::ffi::{c_ulong, c_void, CStr};
use std::ptr::NonNull;
use ash::vk;
use color_eyre::Result;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::platform::PlatformWindow;
use crate::renderer::core::surface::SurfaceProvider;
use crate::renderer::error::RenderError;

/// X11 surface built from an Xlib display connection and window id
pub struct XlibSurface {
    display: NonNull<c_void>,
    window: c_ulong,
}

impl SurfaceProvider for XlibSurface {
    fn from_window(window: &dyn PlatformWindow) -> Result<Self> {
        let display = match window.instance_handle()? {
            RawDisplayHandle::Xlib(handle) => handle
                .display
                .ok_or(RenderError::WindowHandle("Xlib display"))?,
            _ => return Err(RenderError::WindowHandle("Xlib display").into()),
        };
        let window = match window.native_handle()? {
            RawWindowHandle::Xlib(handle) => handle.window,
            _ => return Err(RenderError::WindowHandle("Xlib window").into()),
        };
        Ok(Self { display, window })
    }

    fn required_extensions(&self) -> Result<Vec<&'static CStr>> {
        Ok(vec![
            ash::khr::surface::NAME,
            ash::khr::xlib_surface::NAME,
        ])
    }

    fn create_surface(
        &self,
        entry: &ash::Entry,
        instance: &ash::Instance,
    ) -> Result<vk::SurfaceKHR> {
        log::debug!("Creating Xlib surface for window {:#x}", self.window);
        let surface_info = vk::XlibSurfaceCreateInfoKHR::default()
            .dpy(self.display.as_ptr())
            .window(self.window);
        let loader = ash::khr::xlib_surface::Instance::new(entry, instance);
        let surface = unsafe { loader.create_xlib_surface(&surface_info, None) }
            .map_err(RenderError::init("Xlib surface"))?;
        Ok(surface)
    }
}
