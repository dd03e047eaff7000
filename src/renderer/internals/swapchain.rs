use ash::prelude::VkResult;
use ash::vk;
use color_eyre::Result;

use crate::renderer::core::device::RenderDevice;
use crate::renderer::core::surface::RenderSurface;
use crate::renderer::error::RenderError;

/// What a surface supports for a given physical device
#[derive(Debug, Clone, Default)]
pub struct SwapchainSupport {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

/// Parameters chosen for a new swapchain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapchainConfig {
    pub surface_format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
    pub image_count: u32,
}

impl SwapchainSupport {
    pub fn query(
        surface: &RenderSurface,
        physical_device: vk::PhysicalDevice,
    ) -> Result<Self> {
        let (capabilities, formats, present_modes) = unsafe {
            (
                surface
                    .loader
                    .get_physical_device_surface_capabilities(physical_device, surface.handle)
                    .map_err(RenderError::init("surface capability query"))?,
                surface
                    .loader
                    .get_physical_device_surface_formats(physical_device, surface.handle)
                    .map_err(RenderError::init("surface format query"))?,
                surface
                    .loader
                    .get_physical_device_surface_present_modes(physical_device, surface.handle)
                    .map_err(RenderError::init("present mode query"))?,
            )
        };
        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    pub fn negotiate(&self, requested: vk::Extent2D) -> Result<SwapchainConfig> {
        let surface_format = choose_surface_format(&self.formats)
            .ok_or(RenderError::UnsupportedSurface("formats"))?;
        if self.present_modes.is_empty() {
            return Err(RenderError::UnsupportedSurface("present modes").into());
        }

        Ok(SwapchainConfig {
            surface_format,
            present_mode: choose_present_mode(&self.present_modes),
            extent: choose_extent(&self.capabilities, requested),
            image_count: choose_image_count(&self.capabilities),
        })
    }
}

/// `B8G8R8A8_SRGB` with sRGB non-linear color space when listed, the first format otherwise
pub fn choose_surface_format(formats: &[vk::SurfaceFormatKHR]) -> Option<vk::SurfaceFormatKHR> {
    formats
        .iter()
        .find(|f| {
            f.format == vk::Format::B8G8R8A8_SRGB
                && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
        })
        .or_else(|| formats.first())
        .copied()
}

pub fn choose_present_mode(present_modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
        vk::PresentModeKHR::MAILBOX
    } else {
        // FIFO is the only mode every implementation must support
        vk::PresentModeKHR::FIFO
    }
}

pub fn choose_extent(
    capabilities: &vk::SurfaceCapabilitiesKHR,
    requested: vk::Extent2D,
) -> vk::Extent2D {
    if capabilities.current_extent.width == u32::MAX {
        // The surface size follows the swapchain
        return requested;
    }

    let min = capabilities.min_image_extent;
    let max = capabilities.max_image_extent;
    vk::Extent2D {
        width: requested.width.clamp(min.width, max.width.max(min.width)),
        height: requested.height.clamp(min.height, max.height.max(min.height)),
    }
}

/// One image more than the minimum, capped by the maximum when the surface has one
pub fn choose_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = capabilities.min_image_count;
    let max = capabilities.max_image_count;
    let preferred = min.saturating_add(1);
    if max > 0 {
        preferred.min(max)
    } else {
        preferred
    }
}

pub struct Swapchain {
    pub swapchain: vk::SwapchainKHR,
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    pub extent: vk::Extent2D,
    pub format: vk::Format,
}

impl Swapchain {
    pub fn new(
        dev: &RenderDevice,
        surface: &RenderSurface,
        requested_extent: vk::Extent2D,
    ) -> Result<Self> {
        let support = SwapchainSupport::query(surface, dev.physical)?;
        let config = support.negotiate(requested_extent)?;

        let family_indices = dev.queue_families.unique();
        let sharing_mode = if family_indices.len() > 1 {
            vk::SharingMode::CONCURRENT
        } else {
            vk::SharingMode::EXCLUSIVE
        };

        let mut swapchain_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(config.image_count)
            .image_format(config.surface_format.format)
            .image_color_space(config.surface_format.color_space)
            .image_extent(config.extent)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_sharing_mode(sharing_mode)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(config.present_mode)
            .clipped(true)
            .image_array_layers(1);
        if sharing_mode == vk::SharingMode::CONCURRENT {
            swapchain_info = swapchain_info.queue_family_indices(&family_indices);
        }

        let swapchain = unsafe {
            dev.swapchain_loader.create_swapchain(&swapchain_info, None)
        }
        .map_err(RenderError::init("swapchain"))?;

        let (images, image_views) = match Self::create_swapchain_images(
            swapchain,
            config.surface_format.format,
            dev,
        ) {
            Ok(images) => images,
            Err(e) => {
                unsafe { dev.swapchain_loader.destroy_swapchain(swapchain, None) };
                return Err(e);
            }
        };

        log::debug!(
            "Swapchain created: {}x{}, {} images, {:?}, {:?}",
            config.extent.width,
            config.extent.height,
            images.len(),
            config.surface_format.format,
            config.present_mode,
        );

        Ok(Self {
            swapchain,
            images,
            image_views,
            extent: config.extent,
            format: config.surface_format.format,
        })
    }

    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn create_swapchain_images(
        swapchain: vk::SwapchainKHR,
        format: vk::Format,
        dev: &RenderDevice,
    ) -> Result<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        let images = unsafe { dev.swapchain_loader.get_swapchain_images(swapchain) }
            .map_err(RenderError::init("swapchain images"))?;

        let mut image_views = Vec::with_capacity(images.len());
        let created = images.iter().try_for_each(|image| -> VkResult<()> {
            let view_info = vk::ImageViewCreateInfo::default()
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format)
                .components(vk::ComponentMapping {
                    r: vk::ComponentSwizzle::IDENTITY,
                    g: vk::ComponentSwizzle::IDENTITY,
                    b: vk::ComponentSwizzle::IDENTITY,
                    a: vk::ComponentSwizzle::IDENTITY,
                })
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                })
                .image(*image);
            let view = unsafe { dev.logical.create_image_view(&view_info, None) }?;
            image_views.push(view);
            Ok(())
        });

        if let Err(e) = created {
            for view in image_views {
                unsafe { dev.logical.destroy_image_view(view, None) };
            }
            return Err(RenderError::init("swapchain image view")(e).into());
        }

        Ok((images, image_views))
    }

    /// Destroys the image views, then the swapchain. The images belong to the swapchain.
    ///
    /// # Safety
    /// The device must be idle with respect to this swapchain.
    pub unsafe fn destroy(&mut self, dev: &RenderDevice) {
        unsafe {
            for view in self.image_views.drain(..) {
                dev.logical.destroy_image_view(view, None);
            }
            self.images.clear();
            if self.swapchain != vk::SwapchainKHR::null() {
                dev.swapchain_loader.destroy_swapchain(self.swapchain, None);
                self.swapchain = vk::SwapchainKHR::null();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    fn capabilities(min_images: u32, max_images: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min_images,
            max_image_count: max_images,
            current_extent: extent(1024, 768),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(4096, 4096),
            ..Default::default()
        }
    }

    fn format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn support(
        capabilities: vk::SurfaceCapabilitiesKHR,
        present_modes: &[vk::PresentModeKHR],
    ) -> SwapchainSupport {
        SwapchainSupport {
            capabilities,
            formats: vec![
                format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
                format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            ],
            present_modes: present_modes.to_vec(),
        }
    }

    #[test]
    fn image_count_stays_within_bounds() {
        for min in 1..=4 {
            for max in [0, min, min + 1, min + 3] {
                let count = choose_image_count(&capabilities(min, max));
                assert!(count >= min, "count {count} below min {min}");
                if max > 0 {
                    assert!(count <= max, "count {count} above max {max}");
                }
            }
        }
    }

    #[test]
    fn image_count_prefers_one_extra() {
        assert_eq!(choose_image_count(&capabilities(2, 0)), 3);
        assert_eq!(choose_image_count(&capabilities(2, 8)), 3);
        assert_eq!(choose_image_count(&capabilities(3, 3)), 3);
    }

    #[test]
    fn extent_is_clamped_to_surface_bounds() {
        let mut caps = capabilities(2, 0);
        caps.min_image_extent = extent(200, 100);
        caps.max_image_extent = extent(1920, 1080);

        assert_eq!(choose_extent(&caps, extent(800, 600)), extent(800, 600));
        assert_eq!(choose_extent(&caps, extent(50, 50)), extent(200, 100));
        assert_eq!(choose_extent(&caps, extent(4000, 3000)), extent(1920, 1080));
        assert_eq!(choose_extent(&caps, extent(100, 2000)), extent(200, 1080));
    }

    #[test]
    fn any_extent_sentinel_uses_requested_extent() {
        let mut caps = capabilities(2, 0);
        caps.current_extent = extent(u32::MAX, u32::MAX);
        caps.min_image_extent = extent(200, 200);
        caps.max_image_extent = extent(400, 400);

        assert_eq!(choose_extent(&caps, extent(800, 600)), extent(800, 600));
        assert_eq!(choose_extent(&caps, extent(10, 10)), extent(10, 10));
    }

    #[test]
    fn srgb_bgra_is_preferred() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[1]));
    }

    #[test]
    fn first_format_is_the_fallback() {
        let formats = [
            format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            // Right format, wrong color space
            format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::DISPLAY_P3_NONLINEAR_EXT),
        ];
        assert_eq!(choose_surface_format(&formats), Some(formats[0]));
        assert_eq!(choose_surface_format(&formats), choose_surface_format(&formats));
        assert_eq!(choose_surface_format(&[]), None);
    }

    #[test]
    fn mailbox_is_preferred_over_fifo() {
        use vk::PresentModeKHR as Mode;
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::MAILBOX]), Mode::MAILBOX);
        assert_eq!(choose_present_mode(&[Mode::FIFO, Mode::IMMEDIATE]), Mode::FIFO);
        assert_eq!(choose_present_mode(&[Mode::IMMEDIATE]), Mode::FIFO);
    }

    #[test]
    fn negotiate_800x600_window() {
        let mut caps = capabilities(2, 3);
        caps.current_extent = extent(800, 600);
        let support = support(
            caps,
            &[vk::PresentModeKHR::FIFO, vk::PresentModeKHR::MAILBOX],
        );

        let config = support.negotiate(extent(800, 600)).unwrap();
        assert_eq!(config.extent, extent(800, 600));
        assert_eq!(config.present_mode, vk::PresentModeKHR::MAILBOX);
        assert_eq!(config.image_count, 3);
        assert_eq!(config.surface_format.format, vk::Format::B8G8R8A8_SRGB);
    }

    #[test]
    fn negotiate_rejects_empty_lists() {
        let mut no_formats = support(capabilities(2, 0), &[vk::PresentModeKHR::FIFO]);
        no_formats.formats.clear();
        let err = no_formats.negotiate(extent(800, 600)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::UnsupportedSurface("formats"))
        ));

        let no_modes = support(capabilities(2, 0), &[]);
        let err = no_modes.negotiate(extent(800, 600)).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RenderError>(),
            Some(RenderError::UnsupportedSurface("present modes"))
        ));
    }
}
