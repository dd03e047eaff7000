use ash::vk;
use color_eyre::eyre::OptionExt;
use color_eyre::Result;

use crate::renderer::error::RenderError;
use crate::renderer::resources::shader::GraphicsShader;

/// Graphics pipeline and its layout
pub struct GraphicsPipeline {
    pub pipeline: vk::Pipeline,
    pub layout: vk::PipelineLayout,
}

impl GraphicsPipeline {
    /// # Safety
    /// No command buffer using the pipeline may be pending execution.
    pub unsafe fn destroy(&mut self, device: &ash::Device) {
        unsafe {
            if self.pipeline != vk::Pipeline::null() {
                device.destroy_pipeline(self.pipeline, None);
                self.pipeline = vk::Pipeline::null();
            }
            if self.layout != vk::PipelineLayout::null() {
                device.destroy_pipeline_layout(self.layout, None);
                self.layout = vk::PipelineLayout::null();
            }
        }
    }
}

pub struct GraphicsPipelineBuilder<'a> {
    device: &'a ash::Device,

    input_assembly: vk::PipelineInputAssemblyStateCreateInfo<'static>,
    rasterization: vk::PipelineRasterizationStateCreateInfo<'static>,
    color_blend_attachment: vk::PipelineColorBlendAttachmentState,
    multisample: vk::PipelineMultisampleStateCreateInfo<'static>,
    render_pass: vk::RenderPass,
    shader: Option<GraphicsShader<'a>>,
}

impl<'a> GraphicsPipelineBuilder<'a> {
    pub fn new(device: &'a ash::Device) -> Self {
        Self {
            device,
            input_assembly: default_input_assembly_info(),
            rasterization: default_rasterization_info(),
            color_blend_attachment: default_color_blend_state(),
            multisample: default_multisample_info(),
            render_pass: vk::RenderPass::null(),
            shader: None,
        }
    }

    pub fn with_shader(mut self, shader: GraphicsShader<'a>) -> Self {
        let _ = self.shader.replace(shader);
        self
    }

    pub fn with_render_pass(mut self, render_pass: vk::RenderPass) -> Self {
        self.render_pass = render_pass;
        self
    }

    /// Creates an empty layout and the pipeline, then releases the shader modules
    pub fn build(mut self) -> Result<GraphicsPipeline> {
        let device = self.device;

        let shader = self
            .shader
            .take()
            .ok_or_eyre("No shader provided for GraphicsPipelineBuilder")?;
        let shader_stages = [
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::VERTEX)
                .module(shader.vert_mod)
                .name(c"main"),
            vk::PipelineShaderStageCreateInfo::default()
                .stage(vk::ShaderStageFlags::FRAGMENT)
                .module(shader.frag_mod)
                .name(c"main"),
        ];

        let layout_info = vk::PipelineLayoutCreateInfo::default();
        let layout = unsafe { device.create_pipeline_layout(&layout_info, None) }
            .map_err(RenderError::init("pipeline layout"))?;

        // The triangle's vertices are generated in the vertex shader
        let vertex_input = vk::PipelineVertexInputStateCreateInfo::default();

        let viewport_state = vk::PipelineViewportStateCreateInfo::default()
            .viewport_count(1)
            .scissor_count(1);

        let color_blend_attachments = [self.color_blend_attachment];
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(false)
            .logic_op(vk::LogicOp::COPY)
            .attachments(&color_blend_attachments);

        // Use dynamic state for viewport and scissor configuration
        let dynamic_states = [vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        let dynamic_info = vk::PipelineDynamicStateCreateInfo::default()
            .dynamic_states(&dynamic_states);

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages)
            .layout(layout)
            .render_pass(self.render_pass)
            .subpass(0)
            .vertex_input_state(&vertex_input)
            .input_assembly_state(&self.input_assembly)
            .viewport_state(&viewport_state)
            .rasterization_state(&self.rasterization)
            .multisample_state(&self.multisample)
            .color_blend_state(&color_blend_info)
            .dynamic_state(&dynamic_info);

        let pipelines = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), &[pipeline_info], None)
        };
        // Shader modules are released here whether or not creation succeeded
        drop(shader);

        let pipeline = match pipelines {
            Ok(pipelines) => pipelines.into_iter().next(),
            Err((_, e)) => {
                unsafe { device.destroy_pipeline_layout(layout, None) };
                return Err(RenderError::init("graphics pipeline")(e).into());
            }
        };
        let Some(pipeline) = pipeline else {
            unsafe { device.destroy_pipeline_layout(layout, None) };
            return Err(RenderError::init("graphics pipeline")(vk::Result::ERROR_UNKNOWN).into());
        };

        log::debug!("Graphics pipeline created");
        Ok(GraphicsPipeline { pipeline, layout })
    }
}

fn default_input_assembly_info() -> vk::PipelineInputAssemblyStateCreateInfo<'static> {
    vk::PipelineInputAssemblyStateCreateInfo::default()
        .topology(vk::PrimitiveTopology::TRIANGLE_LIST)
        .primitive_restart_enable(false)
}

fn default_rasterization_info() -> vk::PipelineRasterizationStateCreateInfo<'static> {
    vk::PipelineRasterizationStateCreateInfo::default()
        .depth_clamp_enable(false)
        // Discards all primitives before rasterization stage if true
        .rasterizer_discard_enable(false)
        .polygon_mode(vk::PolygonMode::FILL)
        .line_width(1.0)
        // Backface culling
        .cull_mode(vk::CullModeFlags::BACK)
        .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
        .depth_bias_enable(false)
}

fn default_color_blend_state() -> vk::PipelineColorBlendAttachmentState {
    vk::PipelineColorBlendAttachmentState::default()
        .color_write_mask(vk::ColorComponentFlags::RGBA)
        .blend_enable(false)
}

fn default_multisample_info() -> vk::PipelineMultisampleStateCreateInfo<'static> {
    vk::PipelineMultisampleStateCreateInfo::default()
        .sample_shading_enable(false)
        // 1 sample per pixel means no multisampling
        .rasterization_samples(vk::SampleCountFlags::TYPE_1)
        .min_sample_shading(1.0)
        .alpha_to_coverage_enable(false)
        .alpha_to_one_enable(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rasterizer_culls_back_faces_of_ccw_triangles() {
        let rasterization = default_rasterization_info();
        assert_eq!(rasterization.polygon_mode, vk::PolygonMode::FILL);
        assert_eq!(rasterization.cull_mode, vk::CullModeFlags::BACK);
        assert_eq!(rasterization.front_face, vk::FrontFace::COUNTER_CLOCKWISE);
        assert_eq!(rasterization.line_width, 1.0);
    }

    #[test]
    fn blending_is_disabled_with_full_write_mask() {
        let blend = default_color_blend_state();
        assert_eq!(blend.blend_enable, vk::FALSE);
        assert_eq!(blend.color_write_mask, vk::ColorComponentFlags::RGBA);
    }

    #[test]
    fn single_sample_triangle_list() {
        assert_eq!(
            default_input_assembly_info().topology,
            vk::PrimitiveTopology::TRIANGLE_LIST
        );
        assert_eq!(
            default_multisample_info().rasterization_samples,
            vk::SampleCountFlags::TYPE_1
        );
    }
}
