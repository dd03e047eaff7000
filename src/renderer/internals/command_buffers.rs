use ash::vk;
use color_eyre::Result;

use crate::renderer::error::RenderError;

/// What one image's command buffer draws into
pub struct DrawTarget {
    pub render_pass: vk::RenderPass,
    pub framebuffer: vk::Framebuffer,
    pub pipeline: vk::Pipeline,
    pub extent: vk::Extent2D,
    pub clear_color: [f32; 4],
}

/// Command pool with one primary command buffer per swapchain image
pub struct CommandBuffers {
    pool: vk::CommandPool,
    pub buffers: Vec<vk::CommandBuffer>,
}

impl CommandBuffers {
    pub fn new(
        device: &ash::Device,
        queue_family_index: u32,
    ) -> Result<Self> {
        let pool_info = vk::CommandPoolCreateInfo::default()
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER)
            .queue_family_index(queue_family_index);
        let pool = unsafe { device.create_command_pool(&pool_info, None) }
            .map_err(RenderError::init("command pool"))?;

        Ok(Self {
            pool,
            buffers: Vec::new(),
        })
    }

    /// Replaces the current buffers with `count` fresh ones
    pub fn allocate(
        &mut self,
        device: &ash::Device,
        count: usize,
    ) -> Result<()> {
        self.free(device);

        let allocate_info = vk::CommandBufferAllocateInfo::default()
            .command_pool(self.pool)
            .level(vk::CommandBufferLevel::PRIMARY)
            .command_buffer_count(count as u32);
        self.buffers = unsafe { device.allocate_command_buffers(&allocate_info) }
            .map_err(RenderError::init("command buffers"))?;
        Ok(())
    }

    pub fn record(
        &self,
        device: &ash::Device,
        image_index: usize,
        target: &DrawTarget,
    ) -> Result<()> {
        let command_buffer = self.buffers[image_index];
        unsafe { record_triangle(device, command_buffer, target) }
            .map_err(RenderError::init("command buffer recording"))?;
        Ok(())
    }

    pub fn free(&mut self, device: &ash::Device) {
        if !self.buffers.is_empty() {
            unsafe { device.free_command_buffers(self.pool, &self.buffers) };
            self.buffers.clear();
        }
    }

    /// # Safety
    /// None of the buffers may be pending execution.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        self.free(device);
        if self.pool != vk::CommandPool::null() {
            unsafe { device.destroy_command_pool(self.pool, None) };
            self.pool = vk::CommandPool::null();
        }
    }
}

unsafe fn record_triangle(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    target: &DrawTarget,
) -> ash::prelude::VkResult<()> {
    let clear_values = [vk::ClearValue {
        color: vk::ClearColorValue {
            float32: target.clear_color,
        },
    }];
    let render_area = vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent: target.extent,
    };
    let render_pass_begin_info = vk::RenderPassBeginInfo::default()
        .render_pass(target.render_pass)
        .framebuffer(target.framebuffer)
        .render_area(render_area)
        .clear_values(&clear_values);

    unsafe {
        device.reset_command_buffer(command_buffer, vk::CommandBufferResetFlags::empty())?;
        device.begin_command_buffer(command_buffer, &vk::CommandBufferBeginInfo::default())?;

        device.cmd_begin_render_pass(
            command_buffer,
            &render_pass_begin_info,
            vk::SubpassContents::INLINE,
        );
        device.cmd_bind_pipeline(
            command_buffer,
            vk::PipelineBindPoint::GRAPHICS,
            target.pipeline,
        );
        device.cmd_set_viewport(command_buffer, 0, &[flipped_viewport(target.extent)]);
        device.cmd_set_scissor(command_buffer, 0, &[render_area]);
        device.cmd_draw(command_buffer, 3, 1, 0, 0);
        device.cmd_end_render_pass(command_buffer);

        device.end_command_buffer(command_buffer)
    }
}

/// Viewport with a negative height so clip space y points up
pub fn flipped_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}
