use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;

use crate::platform::PlatformWindow;
use crate::renderer::config::RenderConfig;
use crate::renderer::core::context::RenderContext;
use crate::renderer::core::target::RenderTarget;
use crate::renderer::error::RenderError;
use crate::renderer::internals::command_buffers::{CommandBuffers, DrawTarget};
use crate::renderer::internals::sync::FrameSyncSet;
use crate::renderer::resources::pipeline::{GraphicsPipeline, GraphicsPipelineBuilder};
use crate::renderer::resources::render_pass::{destroy_framebuffers, RenderPass};
use crate::renderer::resources::shader::GraphicsShader;
use crate::renderer::scheduler::{AcquireOutcome, FrameBackend, FrameScheduler, PresentOutcome};
use crate::renderer::Renderer;

/// Draws one triangle per frame into a swapchain
pub struct VulkanRenderer {
    scheduler: FrameScheduler,
    backend: Option<VulkanFrameBackend>,
}

impl Renderer for VulkanRenderer {
    fn init(
        window: &dyn PlatformWindow,
        config: RenderConfig,
    ) -> Result<Self> {
        log::info!("Initializing Vulkan renderer...");
        let mut backend = VulkanFrameBackend::new(window, config)?;
        let frames_in_flight = backend.config.frames_in_flight;

        let extent = vk::Extent2D {
            width: window.width(),
            height: window.height(),
        };
        let image_count = if extent.width == 0 || extent.height == 0 {
            log::debug!("Window has no visible area yet, swapchain creation deferred");
            None
        } else {
            match backend.create_swapchain(extent) {
                Ok(image_count) => Some(image_count),
                Err(e) => {
                    backend.destroy();
                    return Err(e);
                }
            }
        };

        let mut scheduler = FrameScheduler::new(frames_in_flight, image_count.unwrap_or(0));
        if image_count.is_none() {
            scheduler.request_rebuild();
        }

        log::info!("Vulkan renderer initialized");
        Ok(Self {
            scheduler,
            backend: Some(backend),
        })
    }

    fn render(&mut self, window: &mut dyn PlatformWindow) -> Result<()> {
        let Some(backend) = self.backend.as_mut() else {
            return Ok(());
        };
        self.scheduler.render_frame(backend, window)?;
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(backend) = self.backend.take() {
            log::info!("Cleaning up Vulkan renderer...");
            backend.destroy();
        }
    }
}

impl Drop for VulkanRenderer {
    fn drop(&mut self) {
        self.cleanup();
    }
}

/// Owns every Vulkan object and performs the GPU side of each frame
pub struct VulkanFrameBackend {
    config: RenderConfig,
    context: RenderContext,

    target: Option<RenderTarget>,
    render_pass: Option<RenderPass>,
    pipeline: Option<GraphicsPipeline>,
    commands: CommandBuffers,
    sync: FrameSyncSet,
}

impl VulkanFrameBackend {
    fn new(
        window: &dyn PlatformWindow,
        config: RenderConfig,
    ) -> Result<Self> {
        let context = RenderContext::new(window, &config)?;
        let device = &context.device;

        let commands = CommandBuffers::new(&device.logical, device.graphics_queue.family_index)
            .and_then(|mut commands| {
                // Per-image semaphores are added once the swapchain exists
                match FrameSyncSet::new(
                    &device.logical,
                    config.frames_in_flight,
                    0,
                    device.present_fences,
                ) {
                    Ok(sync) => Ok((commands, sync)),
                    Err(e) => {
                        unsafe { commands.destroy(&device.logical) };
                        Err(e)
                    }
                }
            });
        let (commands, sync) = match commands {
            Ok(resources) => resources,
            Err(e) => {
                unsafe { context.destroy() };
                return Err(e);
            }
        };

        Ok(Self {
            config,
            context,
            target: None,
            render_pass: None,
            pipeline: None,
            commands,
            sync,
        })
    }

    fn logical(&self) -> &ash::Device {
        &self.context.device.logical
    }

    /// Blocks until every fenced present has released its semaphores and swapchain
    fn wait_presents(&self) -> Result<()> {
        if self.sync.present_fences.is_empty() {
            return Ok(());
        }
        unsafe {
            self.logical()
                .wait_for_fences(&self.sync.present_fences, true, u64::MAX)
        }
        .map_err(RenderError::frame("present fence wait"))?;
        Ok(())
    }

    fn target(&self) -> Result<&RenderTarget> {
        Ok(self.target.as_ref().ok_or(RenderError::StaleSurface)?)
    }

    /// (Re)creates the render pass and pipeline for a color format
    fn create_pipeline(&mut self, format: vk::Format) -> Result<()> {
        let device = &self.context.device.logical;
        unsafe {
            if let Some(mut pipeline) = self.pipeline.take() {
                pipeline.destroy(device);
            }
            if let Some(mut render_pass) = self.render_pass.take() {
                render_pass.destroy(device);
            }
        }

        let render_pass = self.render_pass.insert(RenderPass::new(device, format)?);
        let shader = GraphicsShader::new(
            &self.config.vertex_shader,
            &self.config.fragment_shader,
            device,
        )?;
        let pipeline = GraphicsPipelineBuilder::new(device)
            .with_shader(shader)
            .with_render_pass(render_pass.handle)
            .build()?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn record_command_buffers(&mut self) -> Result<()> {
        let device = &self.context.device.logical;
        let target = self.target.as_ref().ok_or(RenderError::StaleSurface)?;
        let render_pass = self.render_pass.as_ref().ok_or_eyre("No render pass")?;
        let pipeline = self.pipeline.as_ref().ok_or_eyre("No graphics pipeline")?;

        self.commands.allocate(device, target.image_count())?;
        for (image_index, framebuffer) in target.framebuffers.iter().enumerate() {
            let draw_target = DrawTarget {
                render_pass: render_pass.handle,
                framebuffer: *framebuffer,
                pipeline: pipeline.pipeline,
                extent: target.extent(),
                clear_color: self.config.clear_color,
            };
            self.commands.record(device, image_index, &draw_target)?;
        }
        Ok(())
    }

    /// Releases everything in reverse creation order
    fn destroy(mut self) {
        if let Err(e) = self.context.device.wait_idle() {
            log::error!("Failed to wait for device idle before cleanup: {}", e);
        }
        if let Err(e) = self.wait_presents() {
            log::error!("Failed to wait for pending presents before cleanup: {}", e);
        }

        let device = &self.context.device.logical;
        unsafe {
            self.sync.destroy(device);
            self.commands.destroy(device);
            if let Some(target) = self.target.as_mut() {
                destroy_framebuffers(device, &mut target.framebuffers);
            }
            if let Some(mut pipeline) = self.pipeline.take() {
                pipeline.destroy(device);
            }
            if let Some(mut render_pass) = self.render_pass.take() {
                render_pass.destroy(device);
            }
            if let Some(mut target) = self.target.take() {
                target.destroy(&self.context.device);
            }
            self.context.destroy();
        }
        log::info!("Vulkan objects destroyed");
    }
}

impl FrameBackend for VulkanFrameBackend {
    fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        unsafe {
            self.logical()
                .wait_for_fences(&[self.sync.in_flight[slot]], true, u64::MAX)
        }
        .map_err(RenderError::frame("in-flight fence wait"))?;
        Ok(())
    }

    fn wait_present(&mut self, slot: usize) -> Result<()> {
        if let Some(fence) = self.sync.present_fence(slot) {
            unsafe { self.logical().wait_for_fences(&[fence], true, u64::MAX) }
                .map_err(RenderError::frame("present fence wait"))?;
        }
        Ok(())
    }

    fn reset_slot(&mut self, slot: usize) -> Result<()> {
        unsafe { self.logical().reset_fences(&[self.sync.in_flight[slot]]) }
            .map_err(RenderError::frame("in-flight fence reset"))?;
        Ok(())
    }

    fn acquire_next_image(&mut self, slot: usize) -> Result<AcquireOutcome> {
        let Some(target) = self.target.as_ref() else {
            return Ok(AcquireOutcome::Stale);
        };
        let acquired = unsafe {
            self.context.device.swapchain_loader.acquire_next_image(
                target.swapchain.swapchain,
                u64::MAX,
                self.sync.image_available[slot],
                vk::Fence::null(),
            )
        };
        match acquired {
            Ok((image_index, suboptimal)) => Ok(AcquireOutcome::Acquired {
                image_index: image_index as usize,
                suboptimal,
            }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquireOutcome::Stale),
            Err(e) => Err(RenderError::frame("image acquire")(e).into()),
        }
    }

    fn submit(&mut self, slot: usize, image_index: usize) -> Result<()> {
        let wait_semaphores = [self.sync.image_available[slot]];
        let wait_stages = [vk::PipelineStageFlags::COLOR_ATTACHMENT_OUTPUT];
        let command_buffers = [self.commands.buffers[image_index]];
        let signal_semaphores = [self.sync.render_finished(slot, image_index)];
        let submit_info = vk::SubmitInfo::default()
            .wait_semaphores(&wait_semaphores)
            .wait_dst_stage_mask(&wait_stages)
            .command_buffers(&command_buffers)
            .signal_semaphores(&signal_semaphores);

        unsafe {
            self.logical().queue_submit(
                self.context.device.graphics_queue.handle,
                &[submit_info],
                self.sync.in_flight[slot],
            )
        }
        .map_err(RenderError::frame("queue submit"))?;
        Ok(())
    }

    fn present(&mut self, slot: usize, image_index: usize) -> Result<PresentOutcome> {
        let target = self.target()?;
        let wait_semaphores = [self.sync.render_finished(slot, image_index)];
        let swapchains = [target.swapchain.swapchain];
        let image_indices = [image_index as u32];

        // Already waited on by `wait_present` before this slot's submit
        let present_fences = self.sync.present_fence(slot).map(|fence| [fence]);
        if let Some(fences) = present_fences.as_ref() {
            unsafe { self.logical().reset_fences(fences) }
                .map_err(RenderError::frame("present fence reset"))?;
        }

        let mut present_fence_info = vk::SwapchainPresentFenceInfoEXT::default();
        let mut present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .swapchains(&swapchains)
            .image_indices(&image_indices);
        if let Some(fences) = present_fences.as_ref() {
            present_fence_info = present_fence_info.fences(fences);
            present_info = present_info.push_next(&mut present_fence_info);
        }

        let presented = unsafe {
            self.context.device.swapchain_loader.queue_present(
                self.context.device.present_queue.handle,
                &present_info,
            )
        };
        match presented {
            Ok(suboptimal) => Ok(PresentOutcome::Presented { suboptimal }),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(PresentOutcome::Stale),
            Err(e) => Err(RenderError::frame("present")(e).into()),
        }
    }

    fn wait_idle(&mut self) -> Result<()> {
        self.context.device.wait_idle()?;
        // Device idle does not cover presentation
        self.wait_presents()
    }

    fn destroy_swapchain(&mut self) {
        let device = &self.context.device.logical;
        self.commands.free(device);
        if let Some(mut target) = self.target.take() {
            unsafe { target.destroy(&self.context.device) };
        }
    }

    fn create_swapchain(&mut self, extent: vk::Extent2D) -> Result<usize> {
        let target = RenderTarget::new(&self.context.device, &self.context.surface, extent)?;
        let format = target.format();
        let image_count = target.image_count();
        self.target = Some(target);

        if self.render_pass.as_ref().map(|pass| pass.format) != Some(format) {
            log::debug!("Building render pass and pipeline for {:?}", format);
            self.create_pipeline(format)?;
        }

        let render_pass = self.render_pass.as_ref().ok_or_eyre("No render pass")?;
        if let Some(target) = self.target.as_mut() {
            target.attach_framebuffers(&self.context.device, render_pass)?;
        }

        self.record_command_buffers()?;
        self.sync.resize_for_images(&self.context.device.logical, image_count)?;

        Ok(image_count)
    }
}
