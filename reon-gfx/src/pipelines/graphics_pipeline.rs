use std::ffi::CStr;
use std::path::PathBuf;
use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::error::{RenderError, RenderResult};
use crate::foundation::device::GfxDevice;
use crate::pipelines::shader::{GfxShaderModule, GfxShaderStageInfo};

pub struct GfxGraphicsPipelineCreateInfo {
    descriptor_set_layouts: Vec<vk::DescriptorSetLayout>,

    push_constant_ranges: Vec<vk::PushConstantRange>,

    /// dynamic render 需要的 framebuffer 信息
    color_attach_formats: Vec<vk::Format>,
    /// dynamic render 需要的 framebuffer 信息
    depth_attach_format: vk::Format,
    /// dynamic render 需要的 framebuffer 信息
    stencil_attach_format: vk::Format,

    shader_stages: Vec<GfxShaderStageInfo>,

    /// shader 的 constant_id = 0，材质的 feature flags，
    /// 同一份 shader 源码由此编出不同的 permutation
    feature_flags: Option<u32>,

    vertex_binding_desc: Vec<vk::VertexInputBindingDescription>,
    vertex_attribute_desc: Vec<vk::VertexInputAttributeDescription>,

    primitive_topology: vk::PrimitiveTopology,

    rasterize_state_info: vk::PipelineRasterizationStateCreateInfo<'static>,

    msaa_sample: vk::SampleCountFlags,
    enable_sample_shading: bool,

    color_attach_blend_states: Vec<vk::PipelineColorBlendAttachmentState>,
    enable_logical_op: bool,

    depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo<'static>,

    dynamic_states: Vec<vk::DynamicState>,
}

impl Default for GfxGraphicsPipelineCreateInfo {
    fn default() -> Self {
        Self {
            color_attach_formats: vec![],

            // format = undefined 表示不使用这个 attachment
            depth_attach_format: vk::Format::UNDEFINED,
            stencil_attach_format: vk::Format::UNDEFINED,

            descriptor_set_layouts: vec![],
            shader_stages: vec![],
            feature_flags: None,

            vertex_binding_desc: vec![],
            vertex_attribute_desc: vec![],

            primitive_topology: vk::PrimitiveTopology::TRIANGLE_LIST,

            rasterize_state_info: vk::PipelineRasterizationStateCreateInfo::default()
                .depth_clamp_enable(false)
                .rasterizer_discard_enable(false)
                .polygon_mode(vk::PolygonMode::FILL)
                .line_width(1.0)
                .cull_mode(vk::CullModeFlags::BACK)
                // 按照 OpenGL 的传统，将 CCW 视为 front face
                .front_face(vk::FrontFace::COUNTER_CLOCKWISE)
                .depth_bias_enable(false),
            msaa_sample: vk::SampleCountFlags::TYPE_1,
            enable_sample_shading: false,

            color_attach_blend_states: vec![],
            enable_logical_op: false,

            depth_stencil_info: vk::PipelineDepthStencilStateCreateInfo::default()
                .depth_test_enable(true)
                .depth_write_enable(true)
                .depth_compare_op(vk::CompareOp::LESS)
                .depth_bounds_test_enable(false)
                .stencil_test_enable(false),
            dynamic_states: vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR],
            push_constant_ranges: vec![],
        }
    }
}

impl GfxGraphicsPipelineCreateInfo {
    /// builder
    #[inline]
    pub fn attach_info(
        &mut self,
        color_attach_formats: Vec<vk::Format>,
        depth_format: Option<vk::Format>,
        stencil_format: Option<vk::Format>,
    ) -> &mut Self {
        self.color_attach_formats = color_attach_formats;
        self.depth_attach_format = depth_format.unwrap_or(vk::Format::UNDEFINED);
        self.stencil_attach_format = stencil_format.unwrap_or(vk::Format::UNDEFINED);

        self
    }

    /// builder
    #[inline]
    pub fn vertex_shader_stage(&mut self, path: PathBuf, entry_point: &'static CStr) -> &mut Self {
        self.shader_stages.push(GfxShaderStageInfo {
            stage: vk::ShaderStageFlags::VERTEX,
            entry_point,
            path,
        });
        self
    }

    /// builder
    #[inline]
    pub fn fragment_shader_stage(&mut self, path: PathBuf, entry_point: &'static CStr) -> &mut Self {
        self.shader_stages.push(GfxShaderStageInfo {
            stage: vk::ShaderStageFlags::FRAGMENT,
            entry_point,
            path,
        });
        self
    }

    /// builder
    #[inline]
    pub fn feature_flags(&mut self, flags: u32) -> &mut Self {
        self.feature_flags = Some(flags);
        self
    }

    /// builder
    #[inline]
    pub fn vertex_binding(&mut self, bindings: Vec<vk::VertexInputBindingDescription>) -> &mut Self {
        self.vertex_binding_desc = bindings;
        self
    }

    /// builder
    #[inline]
    pub fn vertex_attribute(&mut self, attributes: Vec<vk::VertexInputAttributeDescription>) -> &mut Self {
        self.vertex_attribute_desc = attributes;
        self
    }

    /// builder
    #[inline]
    pub fn color_blend_attach_states(&mut self, states: Vec<vk::PipelineColorBlendAttachmentState>) -> &mut Self {
        self.color_attach_blend_states = states;
        self
    }

    /// builder
    #[inline]
    pub fn push_constant_ranges(&mut self, ranges: Vec<vk::PushConstantRange>) -> &mut Self {
        self.push_constant_ranges = ranges;
        self
    }

    /// builder
    #[inline]
    pub fn descriptor_set_layouts(&mut self, layouts: Vec<vk::DescriptorSetLayout>) -> &mut Self {
        self.descriptor_set_layouts = layouts;
        self
    }

    /// builder
    #[inline]
    pub fn polygon_mode(&mut self, mode: vk::PolygonMode) -> &mut Self {
        self.rasterize_state_info.polygon_mode = mode;
        self
    }

    /// builder
    #[inline]
    pub fn cull_mode(&mut self, mode: vk::CullModeFlags) -> &mut Self {
        self.rasterize_state_info.cull_mode = mode;
        self
    }

    /// builder
    #[inline]
    pub fn msaa_samples(&mut self, samples: vk::SampleCountFlags, sample_shading: bool) -> &mut Self {
        self.msaa_sample = samples;
        self.enable_sample_shading = sample_shading;
        self
    }

    /// builder
    #[inline]
    pub fn depth_state(&mut self, test: bool, write: bool, compare_op: vk::CompareOp) -> &mut Self {
        self.depth_stencil_info.depth_test_enable = test as vk::Bool32;
        self.depth_stencil_info.depth_write_enable = write as vk::Bool32;
        self.depth_stencil_info.depth_compare_op = compare_op;
        self
    }

    /// builder
    #[inline]
    pub fn dynamic_states(&mut self, states: Vec<vk::DynamicState>) -> &mut Self {
        self.dynamic_states = states;
        self
    }

    /// 关闭混合的 color attachment 状态
    #[inline]
    pub fn blend_state_opaque() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(false)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }

    /// 标准 alpha 混合的 color attachment 状态
    #[inline]
    pub fn blend_state_alpha() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::SRC_ALPHA)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }

    /// 加法混合，weighted-blended OIT 的 accum attachment 使用
    #[inline]
    pub fn blend_state_additive() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::ONE)
            .dst_color_blend_factor(vk::BlendFactor::ONE)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ONE)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }

    /// 乘法混合，weighted-blended OIT 的 reveal attachment 使用
    ///
    /// dst = dst * (1 - src)，即 reveal *= (1 - alpha)
    #[inline]
    pub fn blend_state_multiplicative() -> vk::PipelineColorBlendAttachmentState {
        vk::PipelineColorBlendAttachmentState::default()
            .blend_enable(true)
            .src_color_blend_factor(vk::BlendFactor::ZERO)
            .dst_color_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_COLOR)
            .color_blend_op(vk::BlendOp::ADD)
            .src_alpha_blend_factor(vk::BlendFactor::ZERO)
            .dst_alpha_blend_factor(vk::BlendFactor::ONE_MINUS_SRC_ALPHA)
            .alpha_blend_op(vk::BlendOp::ADD)
            .color_write_mask(vk::ColorComponentFlags::RGBA)
    }
}

pub struct GfxGraphicsPipeline {
    pipeline: vk::Pipeline,
    pipeline_layout: vk::PipelineLayout,

    device: Rc<GfxDevice>,
}

impl Drop for GfxGraphicsPipeline {
    fn drop(&mut self) {
        unsafe {
            log::info!("Destroying GfxGraphicsPipeline");
            self.device.destroy_pipeline(self.pipeline, None);
            self.device.destroy_pipeline_layout(self.pipeline_layout, None);
        }
    }
}

impl GfxGraphicsPipeline {
    pub fn new(
        device: Rc<GfxDevice>,
        create_info: &GfxGraphicsPipelineCreateInfo,
        debug_name: &str,
    ) -> RenderResult<Self> {
        // dynamic rendering 需要的 framebuffer 信息
        let mut attach_info = vk::PipelineRenderingCreateInfo::default()
            .color_attachment_formats(&create_info.color_attach_formats)
            .depth_attachment_format(create_info.depth_attach_format)
            .stencil_attachment_format(create_info.stencil_attach_format);

        let pipeline_layout = {
            let pipeline_layout_create_info = vk::PipelineLayoutCreateInfo::default()
                .set_layouts(&create_info.descriptor_set_layouts)
                .push_constant_ranges(&create_info.push_constant_ranges);
            unsafe { device.create_pipeline_layout(&pipeline_layout_create_info, None)? }
        };
        device.debug_utils.set_object_debug_name(pipeline_layout, debug_name);

        let mut shader_modules = Vec::with_capacity(create_info.shader_stages.len());
        for stage in &create_info.shader_stages {
            shader_modules.push(GfxShaderModule::new(device.clone(), stage.path())?);
        }

        // specialization constant：constant_id = 0 存放 feature flags
        let spec_entries = [vk::SpecializationMapEntry {
            constant_id: 0,
            offset: 0,
            size: size_of::<u32>(),
        }];
        let spec_data = create_info.feature_flags.unwrap_or(0).to_ne_bytes();
        let spec_info = vk::SpecializationInfo::default().map_entries(&spec_entries).data(&spec_data);

        let shader_stages_info = create_info
            .shader_stages
            .iter()
            .zip(shader_modules.iter())
            .map(|(stage, module)| {
                let mut stage_info = vk::PipelineShaderStageCreateInfo::default()
                    .stage(stage.stage)
                    .module(module.handle())
                    .name(stage.entry_point);
                if create_info.feature_flags.is_some() {
                    stage_info = stage_info.specialization_info(&spec_info);
                }
                stage_info
            })
            .collect_vec();

        // 顶点和 index
        let vertex_input_state_info = vk::PipelineVertexInputStateCreateInfo::default()
            .vertex_binding_descriptions(&create_info.vertex_binding_desc)
            .vertex_attribute_descriptions(&create_info.vertex_attribute_desc);

        let input_assembly_info = vk::PipelineInputAssemblyStateCreateInfo::default()
            .topology(create_info.primitive_topology)
            .primitive_restart_enable(false);

        // viewport 和 scissor 具体值由 dynamic 决定，但是数量由该 create info 决定
        let viewport_info = vk::PipelineViewportStateCreateInfo {
            viewport_count: 1,
            scissor_count: 1,
            ..Default::default()
        };

        // MSAA 配置
        let msaa_info = vk::PipelineMultisampleStateCreateInfo::default()
            .sample_shading_enable(create_info.enable_sample_shading)
            .rasterization_samples(create_info.msaa_sample);

        // 混合设置：需要为每个 color attachment 分别指定
        let color_blend_info = vk::PipelineColorBlendStateCreateInfo::default()
            .logic_op_enable(create_info.enable_logical_op)
            .attachments(&create_info.color_attach_blend_states);

        let dynamic_state_info =
            vk::PipelineDynamicStateCreateInfo::default().dynamic_states(&create_info.dynamic_states);

        // =======================================
        // === 创建 pipeline

        let pipeline_info = vk::GraphicsPipelineCreateInfo::default()
            .stages(&shader_stages_info)
            .vertex_input_state(&vertex_input_state_info)
            .input_assembly_state(&input_assembly_info)
            .viewport_state(&viewport_info)
            .rasterization_state(&create_info.rasterize_state_info)
            .multisample_state(&msaa_info)
            .color_blend_state(&color_blend_info)
            .depth_stencil_state(&create_info.depth_stencil_info)
            .layout(pipeline_layout)
            .dynamic_state(&dynamic_state_info)
            .push_next(&mut attach_info);

        let pipeline_result = unsafe {
            device.create_graphics_pipelines(vk::PipelineCache::null(), std::slice::from_ref(&pipeline_info), None)
        };

        shader_modules.into_iter().for_each(|module| {
            module.destroy();
        });

        let pipeline = match pipeline_result {
            Ok(pipelines) => pipelines[0],
            Err((_, err)) => {
                unsafe { device.destroy_pipeline_layout(pipeline_layout, None) };
                return Err(RenderError::PipelineCompile(err));
            }
        };
        device.debug_utils.set_object_debug_name(pipeline, debug_name);

        Ok(GfxGraphicsPipeline {
            pipeline,
            pipeline_layout,
            device,
        })
    }

    #[inline]
    pub fn pipeline(&self) -> vk::Pipeline {
        self.pipeline
    }

    #[inline]
    pub fn layout(&self) -> vk::PipelineLayout {
        self.pipeline_layout
    }
}
