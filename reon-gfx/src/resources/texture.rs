use std::rc::Rc;

use ash::vk;

use crate::error::RenderResult;
use crate::gfx::Gfx;
use crate::resources::{
    image::{GfxImage2D, GfxImage2DView, GfxImageViewCreateInfo},
    sampler::{GfxSampler, GfxSamplerCreateInfo},
};

/// image + view + sampler 的组合，shader 中的 combined image sampler
pub struct GfxTexture2D {
    image: Rc<GfxImage2D>,
    sampler: GfxSampler,
    image_view: GfxImage2DView,
}

impl GfxTexture2D {
    #[inline]
    pub fn new(gfx: &Gfx, image: Rc<GfxImage2D>, name: &str) -> RenderResult<Self> {
        let sampler = GfxSampler::new(gfx, Rc::new(GfxSamplerCreateInfo::new()), name)?;

        let image_view = GfxImage2DView::new(
            gfx,
            image.handle(),
            GfxImageViewCreateInfo::new_image_view_2d_info(image.format(), vk::ImageAspectFlags::COLOR),
            name,
        )?;

        Ok(Self {
            image,
            sampler,
            image_view,
        })
    }

    /// 根据 RGBA8 数据创建 texture
    #[inline]
    pub fn from_rgba8(gfx: &Gfx, width: u32, height: u32, data: &[u8], name: &str) -> RenderResult<Self> {
        let image = Rc::new(GfxImage2D::from_rgba8(gfx, width, height, data, name)?);
        Self::new(gfx, image, name)
    }

    /// 1x1 的白色 texture
    ///
    /// material 缺失某张贴图时，shader 中对应 slot 绑定这张，避免空 descriptor
    #[inline]
    pub fn dummy_white(gfx: &Gfx) -> RenderResult<Self> {
        Self::from_rgba8(gfx, 1, 1, &[255u8, 255, 255, 255], "dummy-white")
    }

    #[inline]
    pub fn sampler(&self) -> &GfxSampler {
        &self.sampler
    }

    #[inline]
    pub fn image_view(&self) -> &GfxImage2DView {
        &self.image_view
    }

    #[inline]
    pub fn image(&self) -> vk::Image {
        self.image.handle()
    }

    #[inline]
    pub fn descriptor_image_info(&self, layout: vk::ImageLayout) -> vk::DescriptorImageInfo {
        vk::DescriptorImageInfo::default()
            .sampler(self.sampler().handle())
            .image_view(self.image_view().handle())
            .image_layout(layout)
    }
}
