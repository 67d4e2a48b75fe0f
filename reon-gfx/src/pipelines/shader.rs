use std::ffi::CStr;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use ash::vk;

use crate::error::{RenderError, RenderResult};
use crate::foundation::device::GfxDevice;

/// 一个 shader stage 的描述：stage、入口点、spv 文件路径
#[derive(Clone)]
pub struct GfxShaderStageInfo {
    pub stage: vk::ShaderStageFlags,
    pub entry_point: &'static CStr,
    pub path: PathBuf,
}

impl GfxShaderStageInfo {
    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub struct GfxShaderModule {
    pub handle: vk::ShaderModule,

    device: Rc<GfxDevice>,
}

impl GfxShaderModule {
    /// # param
    /// * path - spv shader 文件路径
    pub fn new(device: Rc<GfxDevice>, path: &Path) -> RenderResult<Self> {
        let mut file = std::fs::File::open(path).map_err(|e| RenderError::ShaderLoad {
            path: path.to_path_buf(),
            source: e,
        })?;
        let shader_code = ash::util::read_spv(&mut file).map_err(|e| RenderError::ShaderLoad {
            path: path.to_path_buf(),
            source: e,
        })?;

        let shader_module_info = vk::ShaderModuleCreateInfo::default().code(&shader_code);

        unsafe {
            let shader_module = device.create_shader_module(&shader_module_info, None)?;
            device.debug_utils.set_object_debug_name(shader_module, path.to_string_lossy());
            Ok(Self {
                handle: shader_module,
                device,
            })
        }
    }

    #[inline]
    pub fn handle(&self) -> vk::ShaderModule {
        self.handle
    }

    pub fn destroy(self) {
        unsafe {
            self.device.destroy_shader_module(self.handle, None);
        }
    }
}
