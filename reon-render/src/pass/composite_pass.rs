//! 合成 pass：全屏三角形，把 lit、OIT accum/reveal 合成到 end image
//!
//! fragment shader 计算 final = lit * reveal + accum.rgb / max(accum.a, eps)，
//! 这里只负责 pipeline 和录制。

use std::path::Path;

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
use crate::pass::{full_scissor, full_viewport, RenderLayouts};

pub struct CompositePass {
    pipeline: GfxGraphicsPipeline,
}

impl CompositePass {
    pub fn new(gfx: &Gfx, layouts: &RenderLayouts, settings: &FrameSettings, shader_dir: &Path) -> RenderResult<Self> {
        let mut info = GfxGraphicsPipelineCreateInfo::default();
        info.vertex_shader_stage(shader_dir.join("fullscreen.vert.spv"), c"main")
            .fragment_shader_stage(shader_dir.join("composite.frag.spv"), c"main")
            .attach_info(vec![settings.color_format], None, None)
            .descriptor_set_layouts(vec![layouts.composite.handle()])
            .color_blend_attach_states(vec![GfxGraphicsPipelineCreateInfo::blend_state_opaque()])
            .depth_state(false, false, vk::CompareOp::ALWAYS)
            .cull_mode(vk::CullModeFlags::NONE);

        let pipeline = GfxGraphicsPipeline::new(gfx.device.clone(), &info, "composite-pass")?;
        Ok(Self { pipeline })
    }

    /// 合成到 end image，结束时 end image 处于 COLOR_ATTACHMENT_OPTIMAL
    pub fn draw(
        &self,
        cmd: &GfxCommandBuffer,
        extent: vk::Extent2D,
        targets: &FrameTargets,
        composite_set: vk::DescriptorSet,
    ) {
        cmd.begin_label("[composite-pass]draw", LabelColor::COLOR_PASS);

        let to_attachment = GfxImageBarrier::new()
            .image(targets.end.image.handle())
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            )
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR);
        cmd.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&to_attachment));

        let rendering_info =
            GfxRenderingInfo::new(full_scissor(extent)).color_attach(targets.end.view.handle(), [0.0, 0.0, 0.0, 1.0]);
        cmd.cmd_begin_rendering(&rendering_info.rendering_info());
        cmd.cmd_set_viewport(0, &[full_viewport(extent)]);
        cmd.cmd_set_scissor(0, &[full_scissor(extent)]);
        cmd.cmd_bind_pipeline(vk::PipelineBindPoint::GRAPHICS, self.pipeline.pipeline());
        cmd.bind_descriptor_sets(
            vk::PipelineBindPoint::GRAPHICS,
            self.pipeline.layout(),
            0,
            &[composite_set],
            &[],
        );
        // 顶点坐标在 vertex shader 里由 gl_VertexIndex 生成
        cmd.cmd_draw(3, 1, 0, 0);
        cmd.end_rendering();

        cmd.end_label();
    }
}
