use color_eyre::Result;

use crate::platform::PlatformWindow;
use crate::renderer::config::RenderConfig;
use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::instance::RenderInstance;
use crate::renderer::core::surface::{PlatformSurface, RenderSurface, SurfaceProvider};

/// Contains the Vulkan objects that live for the whole run: instance, surface and device
pub struct RenderContext {
    pub instance: RenderInstance,
    pub surface: RenderSurface,
    pub device: RenderDevice,
}

impl RenderContext {
    pub fn new(
        window: &dyn PlatformWindow,
        config: &RenderConfig,
    ) -> Result<Self> {
        let provider = PlatformSurface::from_window(window)?;

        let mut instance = RenderInstance::new(config, &provider)?;

        let mut surface = match RenderSurface::new(&provider, &instance.entry, &instance.instance) {
            Ok(surface) => surface,
            Err(e) => {
                unsafe { instance.destroy() };
                return Err(e);
            }
        };

        let device = match RenderDevice::new(&instance, &surface) {
            Ok(device) => device,
            Err(e) => {
                unsafe {
                    surface.destroy();
                    instance.destroy();
                }
                return Err(e);
            }
        };

        Ok(Self {
            instance,
            surface,
            device,
        })
    }

    /// Destroys the device, surface and instance, in that order.
    ///
    /// # Safety
    /// The device must be idle and every object created from it already destroyed.
    pub unsafe fn destroy(mut self) {
        unsafe {
            self.device.destroy();
            self.surface.destroy();
            self.instance.destroy();
        }
    }
}
