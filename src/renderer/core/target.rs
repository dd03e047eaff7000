use ash::vk;
use color_eyre::Result;

use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::surface::RenderSurface;
use crate::renderer::internals::swapchain::Swapchain;
use crate::renderer::resources::render_pass::{destroy_framebuffers, RenderPass};

/// Presentation target of the renderer: the swapchain and one framebuffer per image.
///
/// Rebuilt wholesale whenever the surface changes.
pub struct RenderTarget {
    pub swapchain: Swapchain,
    pub framebuffers: Vec<vk::Framebuffer>,
}

impl RenderTarget {
    pub fn new(
        dev: &RenderDevice,
        surface: &RenderSurface,
        requested_extent: vk::Extent2D,
    ) -> Result<Self> {
        let swapchain = Swapchain::new(dev, surface, requested_extent)?;
        Ok(Self {
            swapchain,
            framebuffers: Vec::new(),
        })
    }

    pub fn attach_framebuffers(
        &mut self,
        dev: &RenderDevice,
        render_pass: &RenderPass,
    ) -> Result<()> {
        destroy_framebuffers(&dev.logical, &mut self.framebuffers);
        self.framebuffers = render_pass.create_framebuffers(
            &dev.logical,
            &self.swapchain.image_views,
            self.swapchain.extent,
        )?;
        Ok(())
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    pub fn format(&self) -> vk::Format {
        self.swapchain.format
    }

    pub fn image_count(&self) -> usize {
        self.swapchain.image_count()
    }

    /// # Safety
    /// The device must be idle with respect to the swapchain images.
    pub unsafe fn destroy(&mut self, dev: &RenderDevice) {
        destroy_framebuffers(&dev.logical, &mut self.framebuffers);
        unsafe { self.swapchain.destroy(dev) };
    }
}
