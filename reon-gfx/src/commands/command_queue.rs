use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::{
    command_buffer::GfxCommandBuffer,
    synchronize::{GfxFence, GfxSemaphore},
};
use crate::error::RenderResult;
use crate::foundation::device::GfxDevice;

/// # destroy
///
/// queue 在 device 销毁时会被销毁
pub struct GfxQueue {
    pub(crate) handle: vk::Queue,
    pub(crate) queue_family_index: u32,

    pub(crate) device: Rc<GfxDevice>,
}

impl GfxQueue {
    #[inline]
    pub fn handle(&self) -> vk::Queue {
        self.handle
    }

    #[inline]
    pub fn queue_family_index(&self) -> u32 {
        self.queue_family_index
    }

    /// 提交中的 device lost / OOM 错误会向外传播
    pub fn submit(&self, batches: Vec<GfxSubmitInfo>, fence: Option<GfxFence>) -> RenderResult<()> {
        unsafe {
            // batches 的存在是有必要的，submit_infos 引用的 batches 的内存
            let submit_infos = batches.iter().map(|b| *b.inner()).collect_vec();
            self.device.queue_submit2(self.handle, &submit_infos, fence.map_or(vk::Fence::null(), |f| f.handle()))?;
        }
        Ok(())
    }

    /// 根据 specification，vkQueueWaitIdle 应该和 Fence 效率相同
    #[inline]
    pub fn wait_idle(&self) -> RenderResult<()> {
        unsafe { self.device.queue_wait_idle(self.handle)? }
        Ok(())
    }
}

/// 关于 submitInfo 的封装，更易用
#[derive(Default)]
pub struct GfxSubmitInfo {
    inner: vk::SubmitInfo2<'static>,

    _command_buffers: Vec<vk::CommandBufferSubmitInfo<'static>>,
    wait_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
    signal_infos: Vec<vk::SemaphoreSubmitInfo<'static>>,
}

impl GfxSubmitInfo {
    pub fn new(commands: &[GfxCommandBuffer]) -> Self {
        let command_buffers = commands
            .iter()
            .map(|cmd| vk::CommandBufferSubmitInfo::default().command_buffer(cmd.handle()))
            .collect_vec();

        let inner = vk::SubmitInfo2 {
            command_buffer_info_count: command_buffers.len() as u32,
            p_command_buffer_infos: command_buffers.as_ptr(),
            ..Default::default()
        };

        Self {
            inner,
            _command_buffers: command_buffers,
            wait_infos: vec![],
            signal_infos: vec![],
        }
    }

    #[inline]
    pub fn inner(&self) -> &vk::SubmitInfo2 {
        &self.inner
    }

    /// builder
    #[inline]
    pub fn wait_infos(mut self, wait_semaphores: &[(GfxSemaphore, vk::PipelineStageFlags2)]) -> Self {
        self.wait_infos = wait_semaphores
            .iter()
            .map(|(s, stage)| vk::SemaphoreSubmitInfo::default().semaphore(s.handle()).stage_mask(*stage))
            .collect_vec();
        self.inner.wait_semaphore_info_count = self.wait_infos.len() as u32;
        self.inner.p_wait_semaphore_infos = self.wait_infos.as_ptr();
        self
    }

    /// builder
    #[inline]
    pub fn signal_infos(mut self, signal_semaphores: &[(GfxSemaphore, vk::PipelineStageFlags2)]) -> Self {
        self.signal_infos = signal_semaphores
            .iter()
            .map(|(s, stage)| vk::SemaphoreSubmitInfo::default().semaphore(s.handle()).stage_mask(*stage))
            .collect_vec();
        self.inner.signal_semaphore_info_count = self.signal_infos.len() as u32;
        self.inner.p_signal_semaphore_infos = self.signal_infos.as_ptr();
        self
    }
}
