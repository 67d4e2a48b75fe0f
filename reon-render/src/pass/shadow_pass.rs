//! 方向光的 shadow map pass
//!
//! 深度 only，没有 color attachment。即使没有 shadow caster 也会执行，
//! 把 shadow map 清为 1.0 并转换到可采样的 layout，
//! 后续 pass 采样时得到「不在阴影中」。

use std::path::Path;

use ash::vk;

use reon_gfx::basic::color::LabelColor;
use reon_gfx::commands::command_buffer::GfxCommandBuffer;
use reon_gfx::commands::synchronize::GfxImageBarrier;
use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::pipelines::graphics_pipeline::{GfxGraphicsPipeline, GfxGraphicsPipelineCreateInfo};
use reon_gfx::pipelines::rendering_info::GfxRenderingInfo;

use crate::frame_settings::DefaultRendererSettings;
use crate::gpu_data::ShadowPushConstants;
use crate::orchestrator::frame_targets::FrameTargets;
use crate::pass::{full_scissor, full_viewport, RenderLayouts, ResolvedDraw};
use crate::resource::vertex::Vertex3D;

pub struct ShadowPass {
    pipeline: GfxGraphicsPipeline,
}

impl ShadowPass {
    pub fn new(gfx: &Gfx, layouts: &RenderLayouts, shader_dir: &Path) -> RenderResult<Self> {
        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.vertex_shader_stage(shader_dir.join("shadow.vert.spv"), c"main")
            .attach_info(vec![], Some(DefaultRendererSettings::SHADOW_MAP_FORMAT), None)
            .vertex_binding(Vertex3D::vertex_input_bindings())
            .vertex_attribute(Vertex3D::vertex_input_attributes())
            .descriptor_set_layouts(vec![layouts.object.handle()])
            .push_constant_ranges(vec![vk::PushConstantRange {
                stage_flags: vk::ShaderStageFlags::VERTEX,
                offset: 0,
                size: size_of::<ShadowPushConstants>() as u32,
            }])
            .depth_state(true, true, vk::CompareOp::LESS);

        let pipeline = GfxGraphicsPipeline::new(gfx.device.clone(), &info, "shadow-pass")?;
        Ok(Self { pipeline })
    }

    pub fn draw(
        &self,
        cmd: &GfxCommandBuffer,
        targets: &FrameTargets,
        push_constants: &ShadowPushConstants,
        draws: &[ResolvedDraw],
    ) {
        cmd.begin_label("[shadow-pass]draw", LabelColor::COLOR_PASS);

        let shadow_extent = vk::Extent2D {
            width: DefaultRendererSettings::SHADOW_MAP_RESOLUTION,
            height: DefaultRendererSettings::SHADOW_MAP_RESOLUTION,
        };

        let to_attachment = GfxImageBarrier::new()
            .image(targets.shadow_map.image.handle())
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(
                vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::DEPTH);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_attachment));

        let rendering_info = GfxRenderingInfo::new(full_scissor(shadow_extent))
            .depth_attach(targets.shadow_map.view.handle(), vk::AttachmentStoreOp::STORE);
        cmd.cmd_begin_rendering(&rendering_info.rendering_info());
        cmd.cmd_set_viewport(0, &[full_viewport(shadow_extent)]);
        cmd.cmd_set_scissor(0, &[full_scissor(shadow_extent)]);
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline());
        cmd.cmd_push_constants(
            self.pipeline.layout(),
            vk::ShaderStageFlags::VERTEX,
            0,
            bytemuck::bytes_of(push_constants),
        );

        for draw in draws {
            cmd.bind_descriptor_sets(
                vk::PipelineBindPoint::GRAPHICS,
                self.pipeline.layout(),
                0,
                &[draw.object_set],
                &[],
            );
            cmd.cmd_bind_vertex_buffers(0, &[draw.vertex_buffer], &[0]);
            cmd.cmd_bind_index_buffer(draw.index_buffer, 0, vk::IndexType::UINT32);
            cmd.draw_indexed(draw.index_count, draw.index_offset, 1, 0, 0);
        }

        cmd.end_rendering();

        // 转换到可采样 layout，opaque/transparent 的 fragment shader 会读取
        let to_sampled = GfxImageBarrier::new()
            .image(targets.shadow_map.image.handle())
            .src_mask(
                vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
                vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
            )
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::DEPTH);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_sampled));

        cmd.end_label();
    }
}
