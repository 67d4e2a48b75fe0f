use std::rc::Rc;

use ash::vk;
use vk_mem::Alloc;

use crate::commands::{command_buffer::GfxCommandBuffer, synchronize::GfxImageBarrier};
use crate::error::{RenderError, RenderResult};
use crate::foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator};
use crate::gfx::Gfx;
use crate::resources::buffer::GfxBuffer;

pub struct GfxImageCreateInfo {
    inner: vk::ImageCreateInfo<'static>,
}

impl GfxImageCreateInfo {
    #[inline]
    pub fn new_image_2d_info(extent: vk::Extent2D, format: vk::Format, usage: vk::ImageUsageFlags) -> Self {
        Self {
            inner: vk::ImageCreateInfo {
                image_type: vk::ImageType::TYPE_2D,
                format,
                extent: extent.into(),
                mip_levels: 1,
                array_layers: 1,
                samples: vk::SampleCountFlags::TYPE_1,
                tiling: vk::ImageTiling::OPTIMAL,
                usage,
                sharing_mode: vk::SharingMode::EXCLUSIVE,
                // spec 上面说，这里只能是 UNDEFINED 或者 PREINITIALIZED
                initial_layout: vk::ImageLayout::UNDEFINED,
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn create_info(&self) -> &vk::ImageCreateInfo<'_> {
        &self.inner
    }

    // getter
    #[inline]
    pub fn extent(&self) -> &vk::Extent3D {
        &self.inner.extent
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.inner.format
    }

    #[inline]
    pub fn sample_count(&self) -> vk::SampleCountFlags {
        self.inner.samples
    }

    /// builder，MSAA attachment 使用
    #[inline]
    pub fn samples(mut self, samples: vk::SampleCountFlags) -> Self {
        self.inner.samples = samples;
        self
    }

    /// builder
    #[inline]
    pub fn mip_levels(mut self, mip_levels: u32) -> Self {
        self.inner.mip_levels = mip_levels;
        self
    }
}

pub struct GfxImageViewCreateInfo {
    inner: vk::ImageViewCreateInfo<'static>,
}

impl GfxImageViewCreateInfo {
    #[inline]
    pub fn new_image_view_2d_info(format: vk::Format, aspect: vk::ImageAspectFlags) -> Self {
        Self {
            inner: vk::ImageViewCreateInfo {
                format,
                view_type: vk::ImageViewType::TYPE_2D,
                subresource_range: vk::ImageSubresourceRange {
                    aspect_mask: aspect,
                    level_count: 1,
                    layer_count: 1,
                    ..Default::default()
                },
                ..Default::default()
            },
        }
    }

    #[inline]
    pub fn inner(&self) -> &vk::ImageViewCreateInfo<'_> {
        &self.inner
    }
}

pub struct GfxImage2D {
    handle: vk::Image,

    allocation: vk_mem::Allocation,

    _name: String,
    image_info: Rc<GfxImageCreateInfo>,

    allocator: Rc<GfxMemAllocator>,
}
impl Drop for GfxImage2D {
    fn drop(&mut self) {
        unsafe { self.allocator.destroy_image(self.handle, &mut self.allocation) }
    }
}
// getter
impl GfxImage2D {
    #[inline]
    pub fn width(&self) -> u32 {
        self.image_info.extent().width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.image_info.extent().height
    }

    #[inline]
    pub fn handle(&self) -> vk::Image {
        self.handle
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.image_info.format()
    }
}
impl GfxImage2D {
    pub fn new(
        gfx: &Gfx,
        image_info: Rc<GfxImageCreateInfo>,
        alloc_info: &vk_mem::AllocationCreateInfo,
        debug_name: &str,
    ) -> RenderResult<Self> {
        let (image, alloc) = unsafe { gfx.allocator.create_image(image_info.create_info(), alloc_info)? };
        gfx.device.debug_utils.set_object_debug_name(image, debug_name);
        Ok(Self {
            _name: debug_name.to_string(),

            handle: image,
            allocation: alloc,

            image_info,
            allocator: gfx.allocator.clone(),
        })
    }

    /// attachment 使用的 device local image
    pub fn new_attachment(
        gfx: &Gfx,
        image_info: Rc<GfxImageCreateInfo>,
        debug_name: &str,
    ) -> RenderResult<Self> {
        Self::new(
            gfx,
            image_info,
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            debug_name,
        )
    }

    /// 根据 RGBA8_UNORM 的 data 创建 image
    pub fn from_rgba8(gfx: &Gfx, width: u32, height: u32, data: &[u8], name: impl AsRef<str>) -> RenderResult<Self> {
        let image = Self::new(
            gfx,
            Rc::new(GfxImageCreateInfo::new_image_2d_info(
                vk::Extent2D { width, height },
                vk::Format::R8G8B8A8_UNORM,
                vk::ImageUsageFlags::TRANSFER_DST | vk::ImageUsageFlags::SAMPLED,
            )),
            &vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            name.as_ref(),
        )?;

        // stage buffer 在 one_time_exec 同步完成后才能销毁
        let _stage_buffer = GfxCommandBuffer::one_time_exec(
            gfx.device.clone(),
            gfx.temp_graphics_command_pool.clone(),
            &gfx.graphics_queue,
            |cmd| image.transfer_data(gfx, cmd, data),
            name.as_ref(),
        )??;

        Ok(image)
    }

    pub fn transfer_data(
        &self,
        gfx: &Gfx,
        command_buffer: &GfxCommandBuffer,
        data: &[u8],
    ) -> RenderResult<GfxBuffer> {
        let pixels_cnt = self.width() * self.height();
        if data.len() != Self::format_byte_count(self.image_info.format())? * pixels_cnt as usize {
            return Err(RenderError::Unsupported("image data size does not match image extent"));
        }

        let mut stage_buffer =
            GfxBuffer::new_stage_buffer(gfx, size_of_val(data) as vk::DeviceSize, "image-stage-buffer")?;
        stage_buffer.transfer_data_by_mem_map(data)?;

        // 1. transition the image layout
        // 2. copy the buffer into the image
        // 3. transition the layout 为了让 fragment shader 可读
        {
            let image_barrier = GfxImageBarrier::new()
                .image(self.handle)
                .src_mask(vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::empty())
                .dst_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                .layout_transfer(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR);
            command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));

            let buffer_image_copy = vk::BufferImageCopy2::default()
                .buffer_offset(0)
                .buffer_row_length(0)
                .buffer_image_height(0)
                .image_offset(vk::Offset3D { x: 0, y: 0, z: 0 })
                .image_extent(vk::Extent3D {
                    width: self.width(),
                    height: self.height(),
                    depth: 1,
                })
                .image_subresource(vk::ImageSubresourceLayers {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    mip_level: 0,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            command_buffer.cmd_copy_buffer_to_image(
                &vk::CopyBufferToImageInfo2::default()
                    .src_buffer(stage_buffer.handle())
                    .dst_image(self.handle)
                    .dst_image_layout(vk::ImageLayout::TRANSFER_DST_OPTIMAL)
                    .regions(std::slice::from_ref(&buffer_image_copy)),
            );

            let image_barrier = GfxImageBarrier::new()
                .image(self.handle)
                .src_mask(vk::PipelineStageFlags2::TRANSFER, vk::AccessFlags2::TRANSFER_WRITE)
                .dst_mask(vk::PipelineStageFlags2::FRAGMENT_SHADER, vk::AccessFlags2::SHADER_READ)
                .layout_transfer(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
                .image_aspect_flag(vk::ImageAspectFlags::COLOR);
            command_buffer.image_memory_barrier(vk::DependencyFlags::empty(), std::slice::from_ref(&image_barrier));
        }

        Ok(stage_buffer)
    }

    /// 计算某种 format 的一个像素需要的存储空间
    fn format_byte_count(format: vk::Format) -> RenderResult<usize> {
        // 根据 vulkan specification 得到的 format 顺序
        const BYTE_3_FORMAT: [(vk::Format, vk::Format); 1] = [(vk::Format::R8G8B8_UNORM, vk::Format::B8G8R8_SRGB)];
        const BYTE_4_FORMAT: [(vk::Format, vk::Format); 1] = [(vk::Format::R8G8B8A8_UNORM, vk::Format::B8G8R8A8_SRGB)];
        const BYTE_6_FORMAT: [(vk::Format, vk::Format); 1] =
            [(vk::Format::R16G16B16_UNORM, vk::Format::R16G16B16_SFLOAT)];
        const BYTE_8_FORMAT: [(vk::Format, vk::Format); 1] =
            [(vk::Format::R16G16B16A16_UNORM, vk::Format::R16G16B16A16_SFLOAT)];

        let is_in_format_region = |format: vk::Format, regions: &[(vk::Format, vk::Format)]| {
            let n = format.as_raw();
            regions.iter().any(|(begin, end)| begin.as_raw() <= n && n < end.as_raw())
        };

        match format {
            f if is_in_format_region(f, &BYTE_3_FORMAT) => Ok(3),
            f if is_in_format_region(f, &BYTE_4_FORMAT) => Ok(4),
            f if is_in_format_region(f, &BYTE_6_FORMAT) => Ok(6),
            f if is_in_format_region(f, &BYTE_8_FORMAT) => Ok(8),
            _ => Err(RenderError::Unsupported("unsupported image format for upload")),
        }
    }
}

pub struct GfxImage2DView {
    handle: vk::ImageView,

    _info: Rc<GfxImageViewCreateInfo>,
    _name: String,

    device: Rc<GfxDevice>,
}
impl Drop for GfxImage2DView {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_image_view(self.handle, None);
        }
    }
}
impl GfxImage2DView {
    pub fn new(
        gfx: &Gfx,
        image: vk::Image,
        mut info: GfxImageViewCreateInfo,
        name: impl AsRef<str>,
    ) -> RenderResult<Self> {
        info.inner.image = image;
        let handle = unsafe { gfx.device.create_image_view(&info.inner, None)? };
        gfx.device.debug_utils.set_object_debug_name(handle, name.as_ref());
        Ok(Self {
            handle,
            _info: Rc::new(info),
            _name: name.as_ref().to_string(),
            device: gfx.device.clone(),
        })
    }

    // getter
    #[inline]
    pub fn handle(&self) -> vk::ImageView {
        self.handle
    }
}
