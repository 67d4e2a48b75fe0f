use std::rc::Rc;

use ash::vk;

use crate::error::RenderResult;
use crate::foundation::device::GfxDevice;

/// 描述符集布局
///
/// 定义了描述符集的结构：绑定的数量、每个绑定的类型和着色器阶段
pub struct GfxDescriptorSetLayout {
    layout: vk::DescriptorSetLayout,

    device: Rc<GfxDevice>,
}
impl Drop for GfxDescriptorSetLayout {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_descriptor_set_layout(self.layout, None);
        }
    }
}

impl GfxDescriptorSetLayout {
    pub fn new(
        device: Rc<GfxDevice>,
        bindings: &[vk::DescriptorSetLayoutBinding],
        debug_name: &str,
    ) -> RenderResult<Self> {
        let create_info = vk::DescriptorSetLayoutCreateInfo::default().bindings(bindings);

        let layout = unsafe { device.create_descriptor_set_layout(&create_info, None)? };
        device.debug_utils.set_object_debug_name(layout, debug_name);
        Ok(Self { layout, device })
    }

    /// 便捷构造一个 binding
    #[inline]
    pub fn binding(
        binding: u32,
        descriptor_type: vk::DescriptorType,
        stages: vk::ShaderStageFlags,
    ) -> vk::DescriptorSetLayoutBinding<'static> {
        vk::DescriptorSetLayoutBinding::default()
            .binding(binding)
            .descriptor_type(descriptor_type)
            .descriptor_count(1)
            .stage_flags(stages)
    }

    #[inline]
    pub fn handle(&self) -> vk::DescriptorSetLayout {
        self.layout
    }

    #[inline]
    pub fn handle_ref(&self) -> &vk::DescriptorSetLayout {
        &self.layout
    }
}
