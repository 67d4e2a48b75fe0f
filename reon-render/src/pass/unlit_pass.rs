//! unlit / wireframe 渲染模式的 pass
//!
//! 跳过光照，直接输出 albedo * base_color。MSAA attachment resolve 到
//! end image，因此 unlit 模式下不需要 composite。wireframe 通过
//! VK_EXT_extended_dynamic_state3 的动态 polygon mode 切换，不支持该
//! 扩展的设备保持 FILL。

use std::path::{Path, PathBuf};

use ash::vk;

use reon_gfx::basic::color::LabelColor;
use reon_gfx::commands::command_buffer::GfxCommandBuffer;
use reon_gfx::commands::synchronize::GfxImageBarrier;
use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::pipelines::graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo};
use reon_gfx::pipelines::rendering_info::GfxRenderingInfo;

use crate::frame_settings::FrameSettings;
use crate::orchestrator::frame_targets::FrameTargets;
use crate::orchestrator::pipeline_cache::PermutationCache;
use crate::pass::{full_scissor, full_viewport, RenderLayouts, ResolvedDraw};
use crate::resource::material::{MaterialFeatures, MaterialFlatData};
use crate::resource::vertex::Vertex3D;

pub struct UnlitPass {
    pipelines: PermutationCache<u32, GfxGraphicsPipeline>,

    set_layouts: Vec<vk::DescriptorSetLayout>,
    color_format: vk::Format,
    depth_format: vk::Format,
    msaa_samples: vk::SampleCountFlags,
    shader_dir: PathBuf,
    /// 设备是否支持动态 polygon mode
    dynamic_polygon_mode: bool,
}

impl UnlitPass {
    /// unlit shader 只关心这两张贴图，其他 feature bit 不产生新的排列
    pub const FLAG_MASK: u32 = MaterialFeatures::ALBEDO_TEX.bits() | MaterialFeatures::EMISSIVE_TEX.bits();

    pub fn new(gfx: &Gfx, layouts: &RenderLayouts, settings: &FrameSettings, shader_dir: &Path) -> RenderResult<Self> {
        let dynamic_polygon_mode = gfx.device.vk_dynamic_state3_pf.is_some();
        let mut pass = Self {
            pipelines: PermutationCache::new(),
            set_layouts: vec![layouts.global.handle(), layouts.material.handle(), layouts.object.handle()],
            color_format: settings.color_format,
            depth_format: settings.depth_format,
            msaa_samples: settings.msaa_samples,
            shader_dir: shader_dir.to_path_buf(),
            dynamic_polygon_mode,
        };

        let Self {
            pipelines,
            set_layouts,
            color_format,
            depth_format,
            msaa_samples,
            shader_dir,
            ..
        } = &mut pass;
        pipelines.warm(&[0], |flags| {
            Self::create_pipeline(
                gfx,
                set_layouts,
                *color_format,
                *depth_format,
                *msaa_samples,
                shader_dir,
                dynamic_polygon_mode,
                flags,
            )
        })?;

        Ok(pass)
    }

    #[allow(clippy::too_many_arguments)]
    fn create_pipeline(
        gfx: &Gfx,
        set_layouts: &[vk::DescriptorSetLayout],
        color_format: vk::Format,
        depth_format: vk::Format,
        msaa_samples: vk::SampleCountFlags,
        shader_dir: &Path,
        dynamic_polygon_mode: bool,
        flags: u32,
    ) -> RenderResult<GfxGraphicsPipeline> {
        let mut dynamic_states = vec![vk::DynamicState::VIEWPORT, vk::DynamicState::SCISSOR];
        if dynamic_polygon_mode {
            dynamic_states.push(vk::DynamicState::POLYGON_MODE_EXT);
        }

        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.vertex_shader_stage(shader_dir.join("unlit.vert.spv"), c"main")
            .fragment_shader_stage(shader_dir.join("unlit.frag.spv"), c"main")
            .feature_flags(flags)
            .attach_info(vec![color_format], Some(depth_format), None)
            .vertex_binding(Vertex3D::vertex_input_bindings())
            .vertex_attribute(Vertex3D::vertex_input_attributes())
            .descriptor_set_layouts(set_layouts.to_vec())
            .push_constant_ranges(vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: size_of::<MaterialFlatData>() as u32,
            }])
            .color_blend_attach_states(vec![GfxGraphicsPipelineCreateInfo::blend_state_opaque()])
            .msaa_samples(msaa_samples, false)
            .depth_state(true, true, vk::CompareOp::LESS)
            .dynamic_states(dynamic_states);

        GfxGraphicsPipeline::new(gfx.device.clone(), &info, &format!("unlit-pass-{flags:#010x}"))
    }

    /// 绘制全部 renderer 并 resolve 到 end image
    ///
    /// 结束时 end image 处于 COLOR_ATTACHMENT_OPTIMAL，可以直接 blit
    pub fn draw(
        &mut self,
        gfx: &Gfx,
        cmd: &GfxCommandBuffer,
        extent: vk::Extent2D,
        targets: &FrameTargets,
        global_set: vk::DescriptorSet,
        draws: &[ResolvedDraw],
        wireframe: bool,
    ) -> RenderResult<()> {
        cmd.begin_label("[unlit-pass]draw", LabelColor::COLOR_PASS);

        let pre_barriers = [
            GfxImageBarrier::new()
                .image(targets.lit.msaa.image.handle())
                .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                .dst_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR),
            GfxImageBarrier::new()
                .image(targets.end.image.handle())
                .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                .dst_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR),
            GfxImageBarrier::new()
                .image(targets.depth_msaa.image.handle())
                .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                .dst_mask(
                    vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                    vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
                )
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::DEPTH),
        ];
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &pre_barriers);

        // 背景用中性灰，wireframe 的黑色线条才看得见
        let rendering_info = GfxRenderingInfo::new(full_scissor(extent))
            .color_attach_resolve(targets.lit.msaa.view.handle(), targets.end.view.handle(), [0.45, 0.45, 0.45, 1.0])
            .depth_attach(targets.depth_msaa.view.handle(), vk::AttachmentStoreOp::DONT_CARE);
        cmd.cmd_begin_rendering(&rendering_info.rendering_info());
        cmd.cmd_set_viewport(0, &[full_viewport(extent)]);
        cmd.cmd_set_scissor(0, &[full_scissor(extent)]);
        if self.dynamic_polygon_mode {
            cmd.cmd_set_polygon_mode(if wireframe { vk::PolygonMode::LINE } else { vk::PolygonMode::FILL });
        } else if wireframe {
            log::error!("wireframe requested but VK_EXT_extended_dynamic_state3 is unavailable, drawing filled");
        }

        let mut bound_flags = None;
        let mut layout = vk::PipelineLayout::null();
        for draw in draws {
            let flags = draw.feature_flags & Self::FLAG_MASK;
            if bound_flags != Some(flags) {
                let dynamic_polygon_mode = self.dynamic_polygon_mode;
                let Self {
                    pipelines,
                    set_layouts,
                    color_format,
                    depth_format,
                    msaa_samples,
                    shader_dir,
                    ..
                } = self;
                let pipeline = pipelines.get_or_create(flags, || {
                    Self::create_pipeline(
                        gfx,
                        set_layouts,
                        *color_format,
                        *depth_format,
                        *msaa_samples,
                        shader_dir,
                        dynamic_polygon_mode,
                        flags,
                    )
                })?;
                cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline());
                layout = pipeline.layout();
                cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[global_set], &[]);
                bound_flags = Some(flags);
            }

            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                layout,
                1,
                &[draw.material_set, draw.object_set],
                &[],
            );
            cmd.cmd_push_constants(
                layout,
                vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&draw.material_data),
            );
            cmd.cmd_bind_vertex_buffers(0, &[draw.vertex_buffer], &[0]);
            cmd.cmd_bind_index_buffer(draw.index_buffer, 0, vk::IndexType::UINT32);
            cmd.draw_indexed(draw.index_count, draw.index_offset, 1, 0, 0);
        }

        cmd.end_rendering();
        cmd.end_label();
        Ok(())
    }
}
