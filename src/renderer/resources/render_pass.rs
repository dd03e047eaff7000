use ash::vk;
use color_eyre::Result;

use crate::renderer::error::RenderError;

/// Single-subpass render pass clearing one color attachment and handing it to presentation
pub struct RenderPass {
    pub handle: vk::RenderPass,
    pub format: vk::Format,
}

impl RenderPass {
    pub fn new(device: &ash::Device, format: vk::Format) -> Result<Self> {
        let attachments = [color_attachment(format)];
        let color_attachment_refs = [vk::AttachmentReference {
            attachment: 0,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
        }];
        let subpasses = [vk::SubpassDescription::default()
            .pipeline_bind_point(vk::PipelineBindPoint::GRAPHICS)
            .color_attachments(&color_attachment_refs)];
        let dependencies = [external_dependency()];

        let render_pass_info = vk::RenderPassCreateInfo::default()
            .attachments(&attachments)
            .subpasses(&subpasses)
            .dependencies(&dependencies);
        let handle = unsafe { device.create_render_pass(&render_pass_info, None) }
            .map_err(RenderError::init("render pass"))?;

        log::debug!("Render pass created for {:?}", format);
        Ok(Self { handle, format })
    }

    /// One framebuffer per swapchain image view
    pub fn create_framebuffers(
        &self,
        device: &ash::Device,
        image_views: &[vk::ImageView],
        extent: vk::Extent2D,
    ) -> Result<Vec<vk::Framebuffer>> {
        let mut framebuffers = Vec::with_capacity(image_views.len());
        for view in image_views {
            let attachments = [*view];
            let framebuffer_info = vk::FramebufferCreateInfo::default()
                .render_pass(self.handle)
                .attachments(&attachments)
                .width(extent.width)
                .height(extent.height)
                .layers(1);
            match unsafe { device.create_framebuffer(&framebuffer_info, None) } {
                Ok(framebuffer) => framebuffers.push(framebuffer),
                Err(e) => {
                    destroy_framebuffers(device, &mut framebuffers);
                    return Err(RenderError::init("framebuffer")(e).into());
                }
            }
        }
        Ok(framebuffers)
    }

    /// # Safety
    /// No framebuffer or pipeline using this pass may still be in use.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        if self.handle != vk::RenderPass::null() {
            unsafe { device.destroy_render_pass(self.handle, None) };
            self.handle = vk::RenderPass::null();
        }
    }
}

pub fn destroy_framebuffers(device: &ash::Device, framebuffers: &mut Vec<vk::Framebuffer>) {
    for framebuffer in framebuffers.drain(..) {
        unsafe { device.destroy_framebuffer(framebuffer, None) };
    }
}

fn color_attachment(format: vk::Format) -> vk::AttachmentDescription {
    vk::AttachmentDescription::default()
        .format(format)
        .samples(vk::SampleCountFlags::TYPE_1)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .stencil_load_op(vk::AttachmentLoadOp::DONT_CARE)
        .stencil_store_op(vk::AttachmentStoreOp::DONT_CARE)
        .initial_layout(vk::ImageLayout::UNDEFINED)
        .final_layout(vk::ImageLayout::PRESENT_SRC_KHR)
}

/// Keeps the layout transition from running before the acquire semaphore is waited on
fn external_dependency() -> vk::SubpassDependency {
    vk::SubpassDependency::default()
        .src_subpass(vk::SUBPASS_EXTERNAL)
        .dst_subpass(0)
        .src_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .src_access_mask(vk::AccessFlags::empty())
        .dst_stage_mask(vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT)
        .dst_access_mask(vk::AccessFlags::COLOR_ATTACHMENT_WRITE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_is_cleared_and_presented() {
        let attachment = color_attachment(vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
        assert_eq!(attachment.initial_layout, vk::ImageLayout::UNDEFINED);
        assert_eq!(attachment.final_layout, vk::ImageLayout::PRESENT_SRC_KHR);
    }

    #[test]
    fn dependency_waits_for_color_output() {
        let dependency = external_dependency();
        assert_eq!(dependency.src_subpass, vk::SUBPASS_EXTERNAL);
        assert_eq!(dependency.dst_subpass, 0);
        assert_eq!(dependency.src_stage_mask, vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dependency.dst_access_mask, vk::AccessFlags::COLOR_ATTACHMENT_WRITE);
    }
}
