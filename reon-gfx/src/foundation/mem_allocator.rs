use std::ops::Deref;

use ash::vk;

use crate::error::RenderResult;

pub struct GfxMemAllocator {
    inner: vk_mem::Allocator,
}

impl GfxMemAllocator {
    /// 由于 vma 的生命周期设定：需要引用 Instance 以及
    /// Device，并确保在其生命周期之内这两个的引用是有效的.
    /// 因此需要在 Gfx 的其他部分都初始化完成后再初始化 vma
    pub fn new(instance: &ash::Instance, pdevice: vk::PhysicalDevice, device: &ash::Device) -> RenderResult<Self> {
        let mut vma_ci = vk_mem::AllocatorCreateInfo::new(instance, device, pdevice);
        vma_ci.vulkan_api_version = vk::API_VERSION_1_3;

        let vma = unsafe { vk_mem::Allocator::new(vma_ci)? };

        Ok(Self { inner: vma })
    }
}

impl Deref for GfxMemAllocator {
    type Target = vk_mem::Allocator;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
