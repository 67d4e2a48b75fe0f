//! 半透明物体的 weighted-blended OIT pass
//!
//! 同时写两个 attachment：accum 做加法混合累积加权颜色，
//! reveal 做乘法混合累积 (1 - alpha)。深度只读，复用 opaque 的 depth，
//! 被不透明物体遮挡的 fragment 直接被深度测试剔除。

use std::path::{Path, PathBuf};

use ash::vk;

use reon_gfx::basic::color::LabelColor;
use reon_gfx::commands::command_buffer::GfxCommandBuffer;
use reon_gfx::commands::synchronize::GfxImageBarrier;
use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::pipelines::graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo};
use reon_gfx::pipelines::rendering_info::GfxRenderingInfo;

use crate::frame_settings::{DefaultRendererSettings, FrameSettings};
use crate::orchestrator::frame_targets::FrameTargets;
use crate::orchestrator::pipeline_cache::PermutationCache;
use crate::pass::{full_scissor, full_viewport, RenderLayouts, ResolvedDraw};
use crate::resource::material::{MaterialFeatures, MaterialFlatData};
use crate::resource::vertex::Vertex3D;

pub struct TransparentPass {
    pipelines: PermutationCache<u32, GfxGraphicsPipeline>,

    set_layouts: Vec<vk::DescriptorSetLayout>,
    depth_format: vk::Format,
    msaa_samples: vk::SampleCountFlags,
    shader_dir: PathBuf,
}

impl TransparentPass {
    /// OIT shader 只采样这两张贴图，其余 feature bit 不参与排列
    pub const FLAG_MASK: u32 = MaterialFeatures::ALBEDO_TEX.bits() | MaterialFeatures::EMISSIVE_TEX.bits();

    pub fn new(gfx: &Gfx, layouts: &RenderLayouts, settings: &FrameSettings, shader_dir: &Path) -> RenderResult<Self> {
        let mut pass = Self {
            pipelines: PermutationCache::new(),
            set_layouts: vec![layouts.global.handle(), layouts.material.handle(), layouts.object.handle()],
            depth_format: settings.depth_format,
            msaa_samples: settings.msaa_samples,
            shader_dir: shader_dir.to_path_buf(),
        };

        let Self {
            pipelines,
            set_layouts,
            depth_format,
            msaa_samples,
            shader_dir,
            ..
        } = &mut pass;
        pipelines.warm(&[0], |flags| {
            Self::create_pipeline(gfx, set_layouts, *depth_format, *msaa_samples, shader_dir, flags)
        })?;

        Ok(pass)
    }

    fn create_pipeline(
        gfx: &Gfx,
        set_layouts: &[vk::DescriptorSetLayout],
        depth_format: vk::Format,
        msaa_samples: vk::SampleCountFlags,
        shader_dir: &Path,
        flags: u32,
    ) -> RenderResult<GfxGraphicsPipeline> {
        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.vertex_shader_stage(shader_dir.join("oit.vert.spv"), c"main")
            .fragment_shader_stage(shader_dir.join("oit.frag.spv"), c"main")
            .feature_flags(flags)
            .attach_info(
                vec![
                    DefaultRendererSettings::OIT_ACCUM_FORMAT,
                    DefaultRendererSettings::OIT_REVEAL_FORMAT,
                ],
                Some(depth_format),
                None,
            )
            .vertex_binding(Vertex3D::vertex_input_bindings())
            .vertex_attribute(Vertex3D::vertex_input_attributes())
            .descriptor_set_layouts(set_layouts.to_vec())
            .push_constant_ranges(vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::FRAGMENT,
                offset: 0,
                size: size_of::<MaterialFlatData>() as u32,
            }])
            // independent blend：accum 加法，reveal 乘法
            .color_blend_attach_states(vec![
                GfxGraphicsPipelineCreateInfo::blend_state_additive(),
                GfxGraphicsPipelineCreateInfo::blend_state_multiplicative(),
            ])
            .msaa_samples(msaa_samples, true)
            // 深度只读，半透明 fragment 不互相遮挡
            .depth_state(true, false, vk::CompareOp::LESS)
            .cull_mode(vk::CullModeFlags::NONE);

        GfxGraphicsPipeline::new(gfx.device.clone(), &info, &format!("transparent-pass-{flags:#010x}"))
    }

    pub fn draw(
        &mut self,
        gfx: &Gfx,
        cmd: &GfxCommandBuffer,
        extent: vk::Extent2D,
        targets: &FrameTargets,
        global_set: vk::DescriptorSet,
        draws: &[ResolvedDraw],
    ) -> RenderResult<()> {
        cmd.begin_label("[transparent-pass]draw", LabelColor::COLOR_PASS);

        let to_attachment = |image: vk::Image| {
            GfxImageBarrier::new()
                .image(image)
                .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                .dst_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
        };
        let pre_barriers = [
            to_attachment(targets.accum.msaa.image.handle()),
            to_attachment(targets.accum.resolve.image.handle()),
            to_attachment(targets.reveal.msaa.image.handle()),
            to_attachment(targets.reveal.resolve.image.handle()),
        ];
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &pre_barriers);

        let rendering_info = GfxRenderingInfo::new(full_scissor(extent))
            .color_attach_resolve(
                targets.accum.msaa.view.handle(),
                targets.accum.resolve.view.handle(),
                [0.0, 0.0, 0.0, 0.0],
            )
            // reveal 初始为 1，表示完全可见
            .color_attach_resolve(
                targets.reveal.msaa.view.handle(),
                targets.reveal.resolve.view.handle(),
                [1.0, 1.0, 1.0, 1.0],
            )
            .depth_attach_load(targets.depth_msaa.view.handle(), vk::AttachmentStoreOp::DONT_CARE);
        cmd.cmd_begin_rendering(&rendering_info.rendering_info());
        cmd.cmd_set_viewport(0, &[full_viewport(extent)]);
        cmd.cmd_set_scissor(0, &[full_scissor(extent)]);

        let mut bound_flags = None;
        let mut layout = vk::PipelineLayout::null();
        for draw in draws {
            let flags = draw.feature_flags & Self::FLAG_MASK;
            if bound_flags != Some(flags) {
                let Self {
                    pipelines,
                    set_layouts,
                    depth_format,
                    msaa_samples,
                    shader_dir,
                    ..
                } = self;
                let pipeline = pipelines.get_or_create(flags, || {
                    Self::create_pipeline(gfx, set_layouts, *depth_format, *msaa_samples, shader_dir, flags)
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

        let to_sampled = |image: vk::Image| {
            GfxImageBarrier::new()
                .image(image)
                .src_mask(
                    vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                    vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
                )
                .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
                .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR)
        };
        let post_barriers = [
            to_sampled(targets.accum.resolve.image.handle()),
            to_sampled(targets.reveal.resolve.image.handle()),
        ];
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &post_barriers);

        cmd.end_label();
        Ok(())
    }
}
