use std::rc::Rc;

use ash::vk;

use crate::descriptors::descriptor_set_layout::GfxDescriptorSetLayout;
use crate::error::RenderResult;
use crate::foundation::device::GfxDevice;

/// 描述符池创建信息
///
/// 用于配置描述符池的创建参数，包括：
/// - 标志位
/// - 最大描述符集数量
/// - 每种类型描述符的最大数量
pub struct GfxDescriptorPoolCreateInfo {
    inner: vk::DescriptorPoolCreateInfo<'static>,
    _pool_sizes: Vec<vk::DescriptorPoolSize>,
}

impl GfxDescriptorPoolCreateInfo {
    #[inline]
    pub fn new(flags: vk::DescriptorPoolCreateFlags, max_sets: u32, pool_sizes: Vec<vk::DescriptorPoolSize>) -> Self {
        let inner = vk::DescriptorPoolCreateInfo {
            flags,
            max_sets,
            pool_size_count: pool_sizes.len() as u32,
            p_pool_sizes: pool_sizes.as_ptr(),
            ..Default::default()
        };
        Self {
            inner,
            _pool_sizes: pool_sizes,
        }
    }
}

/// 描述符池
///
/// 一个描述符池可以分配多个描述符集
pub struct GfxDescriptorPool {
    handle: vk::DescriptorPool,
    _info: Rc<GfxDescriptorPoolCreateInfo>,

    device: Rc<GfxDevice>,
    name: String,
}
impl Drop for GfxDescriptorPool {
    fn drop(&mut self) {
        log::info!("Destroying GfxDescriptorPool: {}", self.name);
        unsafe { self.device.destroy_descriptor_pool(self.handle, None) };
    }
}
impl GfxDescriptorPool {
    #[inline]
    pub fn new(device: Rc<GfxDevice>, ci: Rc<GfxDescriptorPoolCreateInfo>, name: &str) -> RenderResult<Self> {
        let pool = unsafe { device.create_descriptor_pool(&ci.inner, None)? };
        device.debug_utils.set_object_debug_name(pool, name);
        Ok(Self {
            handle: pool,
            _info: ci,
            device: device.clone(),
            name: name.to_string(),
        })
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorPool {
        self.handle
    }

    /// 分配一个描述符集
    pub fn alloc_set(&self, layout: &GfxDescriptorSetLayout, debug_name: &str) -> RenderResult<vk::DescriptorSet> {
        let alloc_info = vk::DescriptorSetAllocateInfo::default()
            .descriptor_pool(self.handle)
            .set_layouts(std::slice::from_ref(layout.handle_ref()));
        let set = unsafe { self.device.allocate_descriptor_sets(&alloc_info)?[0] };
        self.device.debug_utils.set_object_debug_name(set, debug_name);
        Ok(set)
    }

    /// 释放描述符集
    ///
    /// pool 需要带有 FREE_DESCRIPTOR_SET flag
    pub fn free_sets(&self, sets: &[vk::DescriptorSet]) -> RenderResult<()> {
        unsafe {
            self.device.free_descriptor_sets(self.handle, sets)?;
        }
        Ok(())
    }
}
