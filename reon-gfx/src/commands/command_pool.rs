use std::rc::Rc;

use ash::vk;

use crate::error::RenderResult;
use crate::foundation::device::GfxDevice;

/// command pool 是和 queue family 绑定的，而不是和 queue 绑定的
pub struct GfxCommandPool {
    handle: vk::CommandPool,
    queue_family_index: u32,

    device: Rc<GfxDevice>,
    _debug_name: String,
}
impl Drop for GfxCommandPool {
    fn drop(&mut self) {
        unsafe {
            self.device.destroy_command_pool(self.handle, None);
        }
    }
}
impl GfxCommandPool {
    pub fn new(
        device: Rc<GfxDevice>,
        queue_family_index: u32,
        flags: vk::CommandPoolCreateFlags,
        debug_name: &str,
    ) -> RenderResult<Self> {
        let pool = unsafe {
            device.create_command_pool(
                &vk::CommandPoolCreateInfo::default().queue_family_index(queue_family_index).flags(flags),
                None,
            )?
        };

        device.debug_utils.set_object_debug_name(pool, debug_name);
        Ok(Self {
            handle: pool,
            queue_family_index,
            device: device.clone(),
            _debug_name: debug_name.to_string(),
        })
    }

    // getter
    #[inline]
    pub fn handle(&self) -> vk::CommandPool {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// 这个调用并不会释放资源，而是将 pool 内的 command buffer 设置到初始状态
    ///
    /// reset 之后，pool 内的 command buffer 又可以重新录制命令
    pub fn reset_all_buffers(&self) -> RenderResult<()> {
        unsafe {
            self.device.reset_command_pool(self.handle, vk::CommandPoolResetFlags::RELEASE_RESOURCES)?;
        }
        Ok(())
    }
}
