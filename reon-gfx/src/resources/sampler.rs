use std::rc::Rc;

use ash::vk;

use crate::error::RenderResult;
use crate::foundation::device::GfxDevice;
use crate::gfx::Gfx;

pub struct GfxSamplerCreateInfo {
    inner: vk::SamplerCreateInfo<'static>,
}

impl Default for GfxSamplerCreateInfo {
    fn default() -> Self {
        let sampler_info = vk::SamplerCreateInfo::default()
            .mag_filter(vk::Filter::LINEAR)
            .min_filter(vk::Filter::LINEAR)
            .address_mode_u(vk::SamplerAddressMode::REPEAT)
            .address_mode_v(vk::SamplerAddressMode::REPEAT)
            .address_mode_w(vk::SamplerAddressMode::REPEAT)
            .anisotropy_enable(false)
            .max_anisotropy(1.0)
            .border_color(vk::BorderColor::INT_OPAQUE_BLACK)
            .unnormalized_coordinates(false)
            .compare_enable(false)
            .compare_op(vk::CompareOp::ALWAYS)
            .mipmap_mode(vk::SamplerMipmapMode::LINEAR)
            .mip_lod_bias(0.0)
            .min_lod(0.0)
            .max_lod(1.0);

        Self { inner: sampler_info }
    }
}

impl GfxSamplerCreateInfo {
    /// 默认配置：linear，repeat
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// shadow map 采样用：clamp to border，border 为白色（即「不在阴影中」）
    #[inline]
    pub fn new_shadow_map() -> Self {
        let mut info = Self::default();
        info.inner = info
            .inner
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_BORDER)
            .border_color(vk::BorderColor::FLOAT_OPAQUE_WHITE);
        info
    }

    /// attachment 采样用：clamp to edge，nearest 也可以，这里保持 linear
    #[inline]
    pub fn new_attachment() -> Self {
        let mut info = Self::default();
        info.inner = info
            .inner
            .address_mode_u(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_v(vk::SamplerAddressMode::CLAMP_TO_EDGE)
            .address_mode_w(vk::SamplerAddressMode::CLAMP_TO_EDGE);
        info
    }
}

pub struct GfxSampler {
    handle: vk::Sampler,

    _info: Rc<GfxSamplerCreateInfo>,
    device: Rc<GfxDevice>,
}
impl Drop for GfxSampler {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_sampler(self.handle, None);
        }
    }
}

impl GfxSampler {
    #[inline]
    pub fn new(gfx: &Gfx, info: Rc<GfxSamplerCreateInfo>, debug_name: &str) -> RenderResult<Self> {
        let handle = unsafe { gfx.device.create_sampler(&info.inner, None)? };
        gfx.device.debug_utils.set_object_debug_name(handle, debug_name);

        Ok(Self {
            handle,
            _info: info,
            device: gfx.device.clone(),
        })
    }

    // getter
    #[inline]
    pub fn handle(&self) -> vk::Sampler {
        self.handle
    }
}
