use ash::vk;
use itertools::Itertools;
use std::{ffi::CStr, ops::Deref, rc::Rc};

use crate::error::{RenderError, RenderResult};
use crate::foundation::debug_utils::GfxDebugUtils;
use crate::foundation::{instance::GfxInstance, physical_device::GfxPhysicalDevice};

pub struct GfxDevice {
    pub handle: ash::Device,

    pub pdevice: Rc<GfxPhysicalDevice>,

    pub vk_dynamic_render_pf: Rc<ash::khr::dynamic_rendering::Device>,

    /// wireframe 需要 VK_EXT_extended_dynamic_state3 动态切换 polygon mode，
    /// 该 extension 是可选的，不支持时为 None
    pub vk_dynamic_state3_pf: Option<ash::ext::extended_dynamic_state3::Device>,

    pub debug_utils: Rc<GfxDebugUtils>,
}

impl Deref for GfxDevice {
    type Target = ash::Device;

    fn deref(&self) -> &Self::Target {
        &self.handle
    }
}

impl GfxDevice {
    pub fn new(
        vk_pf: &ash::Entry,
        instance: &GfxInstance,
        pdevice: Rc<GfxPhysicalDevice>,
        queue_create_info: &[vk::DeviceQueueCreateInfo],
    ) -> RenderResult<Self> {
        let supports_dynamic_state3 = pdevice.supports_extension(ash::ext::extended_dynamic_state3::NAME);
        if !supports_dynamic_state3 {
            log::warn!("VK_EXT_extended_dynamic_state3 not supported, wireframe mode will be unavailable");
        }

        // device 所需的所有 extension
        let mut required_exts = Self::basic_device_exts();
        if supports_dynamic_state3 {
            required_exts.push(ash::ext::extended_dynamic_state3::NAME);
        }
        for ext in &required_exts {
            if !pdevice.supports_extension(ext) {
                return Err(RenderError::MissingExtension(ext.to_string_lossy().into_owned()));
            }
        }
        let device_exts = required_exts.iter().map(|e| e.as_ptr()).collect_vec();
        let mut exts_str = String::new();
        for ext in &device_exts {
            exts_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("device exts: {}", exts_str);

        // device 所需的所有 features
        let mut all_features = vk::PhysicalDeviceFeatures2::default().features(Self::physical_device_basic_features());
        let mut physical_device_ext_features = Self::physical_device_extra_features(supports_dynamic_state3);
        unsafe {
            physical_device_ext_features.iter_mut().for_each(|f| {
                let ptr = <*mut dyn vk::ExtendsPhysicalDeviceFeatures2>::cast::<vk::BaseOutStructure>(f.as_mut());
                (*ptr).p_next = all_features.p_next as _;
                all_features.p_next = ptr as _;
            });
        }

        let device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(queue_create_info)
            .enabled_extension_names(&device_exts)
            .push_next(&mut all_features);

        let device = unsafe { instance.ash_instance.create_device(pdevice.handle, &device_create_info, None)? };

        let debug_utils = Rc::new(GfxDebugUtils::new(vk_pf, &instance.ash_instance, &device));

        let vk_dynamic_render_pf = Rc::new(ash::khr::dynamic_rendering::Device::new(&instance.ash_instance, &device));
        let vk_dynamic_state3_pf = supports_dynamic_state3
            .then(|| ash::ext::extended_dynamic_state3::Device::new(&instance.ash_instance, &device));

        Ok(Self {
            handle: device,
            pdevice: pdevice.clone(),

            vk_dynamic_render_pf,
            vk_dynamic_state3_pf,

            debug_utils,
        })
    }

    pub fn destroy(self) {
        log::info!("Destroying GfxDevice");
        unsafe {
            self.handle.destroy_device(None);
        }
    }

    /// 必要的 physical device core features
    fn physical_device_basic_features() -> vk::PhysicalDeviceFeatures {
        vk::PhysicalDeviceFeatures::default()
            .sampler_anisotropy(true)
            .independent_blend(true) // OIT 的 accum/reveal 需要不同的 blend state
            .fill_mode_non_solid(true) // wireframe
            .sample_rate_shading(true)
    }

    /// 必要的 physical device extension features
    fn physical_device_extra_features(
        supports_dynamic_state3: bool,
    ) -> Vec<Box<dyn vk::ExtendsPhysicalDeviceFeatures2>> {
        let mut features: Vec<Box<dyn vk::ExtendsPhysicalDeviceFeatures2>> = vec![
            Box::new(vk::PhysicalDeviceDynamicRenderingFeatures::default().dynamic_rendering(true)),
            Box::new(vk::PhysicalDeviceSynchronization2Features::default().synchronization2(true)),
        ];
        if supports_dynamic_state3 {
            features.push(Box::new(
                vk::PhysicalDeviceExtendedDynamicState3FeaturesEXT::default()
                    .extended_dynamic_state3_polygon_mode(true),
            ));
        }
        features
    }

    /// 必要的 device extensions
    fn basic_device_exts() -> Vec<&'static CStr> {
        let mut exts = vec![];

        // swapchain
        exts.push(ash::khr::swapchain::NAME);

        // dynamic rendering
        exts.append(&mut vec![
            ash::khr::depth_stencil_resolve::NAME,
            ash::khr::create_renderpass2::NAME,
            ash::khr::dynamic_rendering::NAME,
        ]);

        exts
    }
}

impl GfxDevice {
    /// 将 UBO 的尺寸和 min_UBO_Offset_Align 对齐，使得得到的尺寸是 min_UBO_Offset_Align 的整数倍
    #[inline]
    pub fn aligned_ubo_size<T: bytemuck::Pod>(&self) -> vk::DeviceSize {
        let min_ubo_align = self.pdevice.basic_props.limits.min_uniform_buffer_offset_alignment;
        let ubo_size = size_of::<T>() as vk::DeviceSize;
        (ubo_size + min_ubo_align - 1) & !(min_ubo_align - 1)
    }

    #[inline]
    pub fn min_ubo_offset_align(&self) -> vk::DeviceSize {
        self.pdevice.basic_props.limits.min_uniform_buffer_offset_alignment
    }

    /// 从候选 format 中找到第一个支持指定 tiling 和 features 的
    ///
    /// 用于探测 depth attachment 的 format
    pub fn find_supported_format(
        &self,
        instance: &ash::Instance,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates
            .iter()
            .find(|format| {
                let props = unsafe { instance.get_physical_device_format_properties(self.pdevice.handle, **format) };
                match tiling {
                    vk::ImageTiling::LINEAR => props.linear_tiling_features.contains(features),
                    vk::ImageTiling::OPTIMAL => props.optimal_tiling_features.contains(features),
                    _ => false,
                }
            })
            .copied()
    }

    /// 最大的受支持的 msaa 采样数
    pub fn max_msaa_sample_count(&self) -> vk::SampleCountFlags {
        let counts = self.pdevice.basic_props.limits.framebuffer_color_sample_counts
            & self.pdevice.basic_props.limits.framebuffer_depth_sample_counts;
        for candidate in [
            vk::SampleCountFlags::TYPE_8,
            vk::SampleCountFlags::TYPE_4,
            vk::SampleCountFlags::TYPE_2,
        ] {
            if counts.contains(candidate) {
                return candidate;
            }
        }
        vk::SampleCountFlags::TYPE_1
    }
}
