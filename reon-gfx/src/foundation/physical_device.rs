use ash::vk;
use itertools::Itertools;
use std::ffi::CStr;

use crate::error::{RenderError, RenderResult};

/// 表示一张物理显卡
pub struct GfxPhysicalDevice {
    pub handle: vk::PhysicalDevice,

    /// 当前 gpu 支持的 features
    pub features: vk::PhysicalDeviceFeatures,

    /// 当前 gpu 支持的 device extensions
    pub device_extensions: Vec<vk::ExtensionProperties>,

    /// 当前 gpu 的基础属性
    pub basic_props: vk::PhysicalDeviceProperties,

    pub memory_properties: vk::PhysicalDeviceMemoryProperties,

    pub queue_family_properties: Vec<vk::QueueFamilyProperties>,
}

impl GfxPhysicalDevice {
    /// 创建一个新的物理显卡实例
    ///
    /// 优先选择独立显卡，如果没有则选择第一个可用的显卡
    pub fn new_descrete_physical_device(instance: &ash::Instance) -> RenderResult<Self> {
        unsafe {
            instance
                .enumerate_physical_devices()?
                .iter()
                .map(|pdevice| GfxPhysicalDevice::new(*pdevice, instance))
                // 优先使用独立显卡
                .find_or_first(GfxPhysicalDevice::is_descrete_gpu)
                .ok_or(RenderError::Unsupported("no vulkan physical device found"))
        }
    }

    pub fn new(pdevice: vk::PhysicalDevice, instance: &ash::Instance) -> Self {
        unsafe {
            let basic_props = instance.get_physical_device_properties(pdevice);
            let physical_device_name = CStr::from_ptr(basic_props.device_name.as_ptr());
            log::info!("found gpu: {:?}", physical_device_name);

            // 找到当前 gpu 支持的 extensions，并打印出来
            let device_extensions = instance.enumerate_device_extension_properties(pdevice).unwrap_or_default();
            log::debug!("device supports extensions: ");
            for ext in &device_extensions {
                let ext_name = CStr::from_ptr(ext.extension_name.as_ptr());
                log::debug!("\t{:?}", ext_name.to_str().unwrap_or("<invalid>"));
            }

            Self {
                memory_properties: instance.get_physical_device_memory_properties(pdevice),
                features: instance.get_physical_device_features(pdevice),
                handle: pdevice,
                basic_props,
                queue_family_properties: instance.get_physical_device_queue_family_properties(pdevice),
                device_extensions,
            }
        }
    }

    #[inline]
    /// 当前 gpu 是否是独立显卡
    pub fn is_descrete_gpu(&self) -> bool {
        self.basic_props.device_type == vk::PhysicalDeviceType::DISCRETE_GPU
    }

    /// 当前 gpu 是否支持某个 device extension
    pub fn supports_extension(&self, ext: &CStr) -> bool {
        self.device_extensions
            .iter()
            .any(|prop| ext == unsafe { CStr::from_ptr(prop.extension_name.as_ptr()) })
    }

    /// 找到满足条件的 queue family 的 index
    pub fn find_queue_family_index(&self, queue_flags: vk::QueueFlags) -> Option<u32> {
        self.queue_family_properties
            .iter()
            .enumerate()
            .find(|(_, prop)| prop.queue_flags.contains(queue_flags))
            .map(|(index, _)| index as u32)
    }
}
