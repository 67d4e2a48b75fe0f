pub mod composite_pass;
pub mod opaque_pass;
pub mod shadow_pass;
pub mod transparent_pass;
pub mod unlit_pass;

use std::rc::Rc;

use ash::vk;

use reon_gfx::commands::command_buffer::GfxCommandBuffer;
use reon_gfx::commands::synchronize::GfxImageBarrier;
use reon_gfx::descriptors::descriptor_set_layout::GfxDescriptorSetLayout;
use reon_gfx::error::RenderResult;
use reon_gfx::foundation::device::GfxDevice;
use reon_gfx::resources::buffer::GfxBuffer;

use crate::resource::material::MaterialFlatData;

/// 材质 descriptor set 中的贴图 slot 数量
pub const MATERIAL_TEXTURE_SLOTS: u32 = 6;

/// 所有 pass 共享的 descriptor set layout
///
/// - set 0 global：全局 UBO、光源 storage buffer、shadow map
/// - set 1 material：各贴图 slot
/// - set 2 object：per-object UBO
/// - composite 单独一个 set：lit/accum/reveal 三个 attachment
/// - end 单独一个 set：最终画面，给外部（编辑器视口等）采样
pub struct RenderLayouts {
    pub global: GfxDescriptorSetLayout,
    pub material: GfxDescriptorSetLayout,
    pub object: GfxDescriptorSetLayout,
    pub composite: GfxDescriptorSetLayout,
    pub end: GfxDescriptorSetLayout,
}

impl RenderLayouts {
    pub fn new(device: Rc<GfxDevice>) -> RenderResult<Self> {
        let global = GfxDescriptorSetLayout::new(
            device.clone(),
            &[
                GfxDescriptorSetLayout::binding(
                    0,
                    vk::DescriptorType::UNIFORM_BUFFER,
                    vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                ),
                GfxDescriptorSetLayout::binding(1, vk::DescriptorType::STORAGE_BUFFER, vk::ShaderStageFlags::FRAGMENT),
                GfxDescriptorSetLayout::binding(
                    2,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
            ],
            "global-set-layout",
        )?;

        let material_bindings = (0..MATERIAL_TEXTURE_SLOTS)
            .map(|slot| {
                GfxDescriptorSetLayout::binding(
                    slot,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                )
            })
            .collect::<Vec<_>>();
        let material = GfxDescriptorSetLayout::new(device.clone(), &material_bindings, "material-set-layout")?;

        let object = GfxDescriptorSetLayout::new(
            device.clone(),
            &[GfxDescriptorSetLayout::binding(
                0,
                vk::DescriptorType::UNIFORM_BUFFER,
                vk::ShaderStageFlags::VERTEX,
            )],
            "object-set-layout",
        )?;

        let composite = GfxDescriptorSetLayout::new(
            device.clone(),
            &[
                GfxDescriptorSetLayout::binding(
                    0,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
                GfxDescriptorSetLayout::binding(
                    1,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
                GfxDescriptorSetLayout::binding(
                    2,
                    vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                    vk::ShaderStageFlags::FRAGMENT,
                ),
            ],
            "composite-set-layout",
        )?;

        let end = GfxDescriptorSetLayout::new(
            device,
            &[GfxDescriptorSetLayout::binding(
                0,
                vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                vk::ShaderStageFlags::FRAGMENT,
            )],
            "end-set-layout",
        )?;

        Ok(Self {
            global,
            material,
            object,
            composite,
            end,
        })
    }
}

/// 解析 DrawCommand 之后、pass 可以直接录制的绘制单元
pub struct ResolvedDraw<'a> {
    pub vertex_buffer: &'a GfxBuffer,
    pub index_buffer: &'a GfxBuffer,
    pub object_set: vk::DescriptorSet,
    pub material_set: vk::DescriptorSet,
    pub material_data: MaterialFlatData,
    pub feature_flags: u32,
    pub index_offset: u32,
    pub index_count: u32,
}

/// 高度为负的 viewport，翻转 y 轴，使得 NDC 的 y 朝上
#[inline]
pub fn full_viewport(extent: vk::Extent2D) -> vk::Viewport {
    vk::Viewport {
        x: 0.0,
        y: extent.height as f32,
        width: extent.width as f32,
        height: -(extent.height as f32),
        min_depth: 0.0,
        max_depth: 1.0,
    }
}

#[inline]
pub fn full_scissor(extent: vk::Extent2D) -> vk::Rect2D {
    vk::Rect2D {
        offset: vk::Offset2D { x: 0, y: 0 },
        extent,
    }
}

/// 把 end image 的内容 blit 到 swapchain image，并转换到 PRESENT_SRC
///
/// end image 需要处于 COLOR_ATTACHMENT_OPTIMAL；swapchain image 的旧内容不保留
pub fn blit_end_to_swapchain(
    cmd: &GfxCommandBuffer,
    end_image: vk::Image,
    swapchain_image: vk::Image,
    extent: vk::Extent2D,
) {
    let pre_barriers = [
        GfxImageBarrier::new()
            .image(end_image)
            .src_mask(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
                vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
            )
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
            .layout_transfer(vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL, vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR),
        GfxImageBarrier::new()
            .image(swapchain_image)
            .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
            .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR),
    ];
    cmd.image_memory_barrier(vk::DependencyFlags::empty(), &pre_barriers);

    let subresource = vk::ImageSubresourceLayers {
        aspect_mask: vk::ImageAspectFlags::COLOR,
        mip_level: 0,
        base_array_layer: 0,
        layer_count: 1,
    };
    let whole_image = [
        vk::Offset3D { x: 0, y: 0, z: 0 },
        vk::Offset3D {
            x: extent.width as i32,
            y: extent.height as i32,
            z: 1,
        },
    ];
    let region = vk::ImageBlit2::default()
        .src_subresource(subresource)
        .src_offsets(whole_image)
        .dst_subresource(subresource)
        .dst_offsets(whole_image);
    cmd.cmd_blit_image(
        &vk::BlitImageInfo2::default()
            .src_image(end_image)
            .src_image_layout(vk::ImageLayout::TRANSFER_SRC_OPTIMAL)
            .dst_image(swapchain_image)
            .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
            .regions(std::slice::from_ref(&region))
            .filter(vk::Filter::NEAREST),
    );

    let post_barriers = [
        GfxImageBarrier::new()
            .image(swapchain_image)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
            .dst_mask(vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::empty())
            .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR),
        // end image 之后可能被外部通过 end_buffer 的 set 采样
        GfxImageBarrier::new()
            .image(end_image)
            .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_READ)
            .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
            .layout_transfer(vk::ImageLayout::TRANSFER_SRC_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            .image_aspect_flag(vk::ImageAspectFlags::COLOR),
    ];
    cmd.image_memory_barrier(vk::DependencyFlags::empty(), &post_barriers);
}
