//! 不透明物体的 lit pass
//!
//! 绘制到 MSAA 的 lit attachment 并 resolve 到单采样 image。
//! pipeline 按材质的 feature flags 缓存 permutation，
//! 同一份 shader 源码通过 specialization constant 裁剪分支。

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
use crate::resource::material::MaterialFlatData;
use crate::resource::vertex::Vertex3D;

pub struct OpaquePass {
    pipelines: PermutationCache<u32, GfxGraphicsPipeline>,

    set_layouts: Vec<vk::DescriptorSetLayout>,
    color_format: vk::Format,
    depth_format: vk::Format,
    msaa_samples: vk::SampleCountFlags,
    shader_dir: PathBuf,
}

impl OpaquePass {
    /// 没有贴图的排列在启动时预编译，首帧不会卡在 shader 编译上
    pub const WARM_FLAGS: [u32; 1] = [0];

    pub fn new(gfx: &Gfx, layouts: &RenderLayouts, settings: &FrameSettings, shader_dir: &Path) -> RenderResult<Self> {
        let mut pass = Self {
            pipelines: PermutationCache::new(),
            set_layouts: vec![layouts.global.handle(), layouts.material.handle(), layouts.object.handle()],
            color_format: settings.color_format,
            depth_format: settings.depth_format,
            msaa_samples: settings.msaa_samples,
            shader_dir: shader_dir.to_path_buf(),
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
        pipelines.warm(&Self::WARM_FLAGS, |flags| {
            Self::create_pipeline(gfx, set_layouts, *color_format, *depth_format, *msaa_samples, shader_dir, flags)
        })?;

        Ok(pass)
    }

    fn create_pipeline(
        gfx: &Gfx,
        set_layouts: &[vk::DescriptorSetLayout],
        color_format: vk::Format,
        depth_format: vk::Format,
        msaa_samples: vk::SampleCountFlags,
        shader_dir: &Path,
        flags: u32,
    ) -> RenderResult<GfxGraphicsPipeline> {
        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.vertex_shader_stage(shader_dir.join("lit.vert.spv"), c"main")
            .fragment_shader_stage(shader_dir.join("lit.frag.spv"), c"main")
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
            .msaa_samples(msaa_samples, true)
            .depth_state(true, true, vk::CompareOp::LESS)
            // cull mode 由 double sided 材质逐 draw 决定
            .dynamic_states(vec![
                vk::DynamicState::VIEWPORT,
                vk::DynamicState::SCISSOR,
                vk::DynamicState::CULL_MODE,
            ]);

        GfxGraphicsPipeline::new(gfx.device.clone(), &info, &format!("opaque-pass-{flags:#010x}"))
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
        cmd.begin_label("[opaque-pass]draw", LabelColor::COLOR_PASS);

        let color_barriers = [
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
                .image(targets.lit.resolve.image.handle())
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
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), &color_barriers);

        let rendering_info = GfxRenderingInfo::new(full_scissor(extent))
            .color_attach_resolve(
                targets.lit.msaa.view.handle(),
                targets.lit.resolve.view.handle(),
                [0.0, 0.0, 0.0, 1.0],
            )
            // transparent pass 还要读这张 depth
            .depth_attach(targets.depth_msaa.view.handle(), vk::AttachmentStoreOp::STORE);
        cmd.cmd_begin_rendering(&rendering_info.rendering_info());
        cmd.cmd_set_viewport(0, &[full_viewport(extent)]);
        cmd.cmd_set_scissor(0, &[full_scissor(extent)]);

        let mut bound_flags = None;
        let mut layout = vk::PipelineLayout::null();
        for draw in draws {
            if bound_flags != Some(draw.feature_flags) {
                let Self {
                    pipelines,
                    set_layouts,
                    color_format,
                    depth_format,
                    msaa_samples,
                    shader_dir,
                    ..
                } = self;
                let pipeline = pipelines.get_or_create(draw.feature_flags, || {
                    Self::create_pipeline(
                        gfx,
                        set_layouts,
                        *color_format,
                        *depth_format,
                        *msaa_samples,
                        shader_dir,
                        draw.feature_flags,
                    )
                })?;
                cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, pipeline.pipeline());
                layout = pipeline.layout();
                cmd.bind_descriptor_sets(vk::PipelineBindPoint::GRAPHICS, layout, 0, &[global_set], &[]);
                bound_flags = Some(draw.feature_flags);
            }

            cmd.cmd_set_cull_mode(if draw.material_data.double_sided != 0 {
                vk::CullModeFlags::NONE
            } else {
                vk::CullModeFlags::BACK
            });
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

        // resolve 结果给 composite 采样
        let to_sampled = GfxImageBarrier::new()
            .image(targets.lit.resolve.image.handle())
            .src_mask(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            )
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_sampled));

        cmd.end_label();
        Ok(())
    }

    /// 已经编译的 pipeline 排列数量
    #[inline]
    pub fn permutation_count(&self) -> usize {
        self.pipelines.len()
    }
}
