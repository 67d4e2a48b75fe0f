use std::{
    collections::HashSet,
    ffi::{c_char, CStr, CString},
    rc::Rc,
};

use ash::vk;
use itertools::Itertools;

use crate::error::{RenderError, RenderResult};
use crate::foundation::debug_utils::GfxDebugUtils;

pub struct GfxInstance {
    /// 仅仅是函数指针和一个裸的 handle，生命周期由 destroy 手动控制
    pub(crate) ash_instance: Rc<ash::Instance>,
}

impl GfxInstance {
    /// 设置所需的 layers 和 extensions，创建 vk instance
    ///
    /// 必需的 extension 缺失时返回 [`RenderError::MissingExtension`]
    pub fn new(
        vk_entry: &ash::Entry,
        app_name: String,
        engine_name: String,
        extra_instance_exts: Vec<&'static CStr>,
    ) -> RenderResult<Self> {
        let app_name = CString::new(app_name.as_str()).unwrap();
        let engine_name = CString::new(engine_name.as_str()).unwrap();
        let app_info = vk::ApplicationInfo::default()
            .api_version(vk::API_VERSION_1_3) // 版本过低时，有些函数无法正确加载
            .application_name(app_name.as_ref())
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name.as_ref())
            .engine_version(vk::make_api_version(0, 1, 0, 0));

        let enabled_extensions = Self::get_extensions(vk_entry, &extra_instance_exts)?;
        let mut enabled_extensions_str = String::new();
        for ext in &enabled_extensions {
            enabled_extensions_str.push_str(&format!("\n\t{:?}", unsafe { CStr::from_ptr(*ext) }));
        }
        log::info!("instance extensions: {}", enabled_extensions_str);

        let mut instance_ci = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&enabled_extensions);

        // 为 instance info 添加 debug messenger
        let mut debug_utils_messenger_ci = GfxDebugUtils::debug_utils_messenger_ci();
        instance_ci = instance_ci.push_next(&mut debug_utils_messenger_ci);

        let handle = unsafe { vk_entry.create_instance(&instance_ci, None)? };

        Ok(Self {
            ash_instance: Rc::new(handle),
        })
    }

    pub fn destroy(self) {
        log::info!("Destroying GfxInstance");
        unsafe {
            self.ash_instance.destroy_instance(None);
        }
    }
}

/// getter
impl GfxInstance {
    #[inline]
    pub fn ash_instance(&self) -> &ash::Instance {
        &self.ash_instance
    }

    #[inline]
    pub fn vk_instance(&self) -> vk::Instance {
        self.ash_instance.handle()
    }
}

/// 构造过程
impl GfxInstance {
    /// instance 所需的，且受支持的 extension
    fn get_extensions(
        vk_entry: &ash::Entry,
        extra_instance_exts: &[&'static CStr],
    ) -> RenderResult<Vec<*const c_char>> {
        let all_ext_props = unsafe { vk_entry.enumerate_instance_extension_properties(None)? };
        let mut enabled_extensions: HashSet<&'static CStr> = HashSet::new();

        // 检查某个 instance ext 并启用
        let mut enable_ext = |ext: &'static CStr| -> RenderResult<()> {
            let supported = all_ext_props
                .iter()
                .any(|supported_ext| ext == unsafe { CStr::from_ptr(supported_ext.extension_name.as_ptr()) });
            if supported {
                enabled_extensions.insert(ext);
                Ok(())
            } else {
                Err(RenderError::MissingExtension(ext.to_string_lossy().into_owned()))
            }
        };

        // 检查外部传入的 extension 是否支持
        for ext in extra_instance_exts {
            enable_ext(ext)?;
        }

        for ext in Self::basic_instance_exts() {
            enable_ext(ext)?;
        }

        Ok(enabled_extensions.iter().map(|ext| ext.as_ptr()).collect_vec())
    }

    /// 必须要开启的 instance extensions
    ///
    /// validation layer 不在这里开启，由 vulkan configurator 控制
    fn basic_instance_exts() -> Vec<&'static CStr> {
        vec![
            // debug messenger + object name + queue/cmd label
            vk::EXT_DEBUG_UTILS_NAME,
        ]
    }
}
