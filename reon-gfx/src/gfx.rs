use std::{ffi::CStr, rc::Rc};

use ash::vk;

use crate::commands::{command_pool::GfxCommandPool, command_queue::GfxQueue};
use crate::error::{RenderError, RenderResult};
use crate::foundation::{
    device::GfxDevice, instance::GfxInstance, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice,
};

/// 图形上下文：instance、physical device、device、graphics queue、vma
///
/// 整个渲染器共享一个 Gfx，各种 GPU 资源通过它创建
pub struct Gfx {
    vk_entry: ash::Entry,

    pub instance: GfxInstance,
    pub physical_device: Rc<GfxPhysicalDevice>,
    pub device: Rc<GfxDevice>,

    pub graphics_queue: GfxQueue,

    pub allocator: Rc<GfxMemAllocator>,

    /// 临时的 graphics command pool，主要用于临时的命令缓冲区
    pub temp_graphics_command_pool: Rc<GfxCommandPool>,
}

/// 创建与销毁
impl Gfx {
    const ENGINE_NAME: &'static str = "REON";

    pub fn new(app_name: String, instance_extra_exts: Vec<&'static CStr>) -> RenderResult<Self> {
        let vk_entry = unsafe { ash::Entry::load()? };

        let instance = GfxInstance::new(&vk_entry, app_name, Self::ENGINE_NAME.to_string(), instance_extra_exts)?;

        let physical_device = Rc::new(GfxPhysicalDevice::new_descrete_physical_device(instance.ash_instance())?);

        let graphics_queue_family_index = physical_device
            .find_queue_family_index(vk::QueueFlags::GRAPHICS)
            .ok_or(RenderError::Unsupported("gpu has no graphics queue family"))?;

        let queue_priorities = [1.0_f32];
        let queue_create_info = [vk::DeviceQueueCreateInfo::default()
            .queue_family_index(graphics_queue_family_index)
            .queue_priorities(&queue_priorities)];

        let device = Rc::new(GfxDevice::new(&vk_entry, &instance, physical_device.clone(), &queue_create_info)?);

        let graphics_queue = GfxQueue {
            handle: unsafe { device.get_device_queue(graphics_queue_family_index, 0) },
            queue_family_index: graphics_queue_family_index,
            device: device.clone(),
        };
        device.debug_utils.set_object_debug_name(graphics_queue.handle(), "graphics-queue");

        let allocator = Rc::new(GfxMemAllocator::new(
            instance.ash_instance(),
            physical_device.handle,
            &device.handle,
        )?);

        let temp_graphics_command_pool = Rc::new(GfxCommandPool::new(
            device.clone(),
            graphics_queue_family_index,
            vk::CommandPoolCreateFlags::empty(),
            "gfx-temp-graphics",
        )?);

        Ok(Self {
            vk_entry,
            instance,
            physical_device,
            device,
            graphics_queue,
            allocator,
            temp_graphics_command_pool,
        })
    }

    /// 销毁上下文
    ///
    /// 调用前需要保证所有引用了 device/allocator 的资源都已 drop
    pub fn destroy(self) {
        unsafe {
            let _ = self.device.device_wait_idle();
        }
        drop(self.temp_graphics_command_pool);
        drop(self.graphics_queue);

        if Rc::try_unwrap(self.allocator).is_err() {
            log::warn!("vma allocator still referenced at shutdown");
        }
        match Rc::try_unwrap(self.device) {
            Ok(device) => device.destroy(),
            Err(_) => log::warn!("device still referenced at shutdown, skipping destroy"),
        }
        self.instance.destroy();
    }
}

/// getter
impl Gfx {
    #[inline]
    pub fn vk_entry(&self) -> &ash::Entry {
        &self.vk_entry
    }

    /// 当 uniform buffer 的 descriptor 在更新时，其 offset 必须是这个值的整数倍
    ///
    /// 注：这个值一定是 power of 2
    #[inline]
    pub fn min_ubo_offset_align(&self) -> vk::DeviceSize {
        self.physical_device.basic_props.limits.min_uniform_buffer_offset_alignment
    }
}

/// tools
impl Gfx {
    /// 从候选列表中找到第一个支持的 depth format
    ///
    /// 依次尝试 D32 和 D24，保证 attachment 可用
    pub fn find_depth_format(&self) -> RenderResult<vk::Format> {
        self.device
            .find_supported_format(
                self.instance.ash_instance(),
                &[
                    vk::Format::D32_SFLOAT,
                    vk::Format::D32_SFLOAT_S8_UINT,
                    vk::Format::D24_UNORM_S8_UINT,
                ],
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or(RenderError::Unsupported("no supported depth format"))
    }
}
