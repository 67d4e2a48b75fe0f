//! 帧循环的骨架：swapchain、per-frame 的 command pool 与同步原语
//!
//! 各个 pass 的提交通过信号量串成链：
//! shadow -> opaque -> transparent(accum) -> composite+blit -> present

use std::rc::Rc;

use ash::vk;
use itertools::Itertools;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use reon_gfx::commands::command_buffer::GfxCommandBuffer;
use reon_gfx::commands::command_pool::GfxCommandPool;
use reon_gfx::commands::synchronize::{GfxFence, GfxSemaphore};
use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::swapchain::render_swapchain::{AcquiredImage, GfxSwapchain, GfxSwapchainInitInfo};
use reon_gfx::swapchain::surface::GfxSurface;

use crate::frame_settings::{DefaultRendererSettings, FrameLabel, FRAMES_IN_FLIGHT};

/// 一个 frame in flight 的同步原语与 command 分配器
struct FrameSlot {
    command_pool: Rc<GfxCommandPool>,
    /// 本帧分配出去的 command buffer，下次轮到该 slot 时统一 free
    allocated_commands: Vec<GfxCommandBuffer>,

    /// swapchain image 可用，acquire 时 signal
    image_available: GfxSemaphore,
    /// shadow pass 完成
    shadow_done: GfxSemaphore,
    /// opaque pass 完成
    opaque_done: GfxSemaphore,
    /// transparent pass 完成
    accum_done: GfxSemaphore,

    /// 本帧的最后一个 submit signal 它
    in_flight_fence: GfxFence,
}

impl FrameSlot {
    fn new(gfx: &Gfx, label: FrameLabel) -> RenderResult<Self> {
        let command_pool = Rc::new(GfxCommandPool::new(
            gfx.device.clone(),
            gfx.graphics_queue.queue_family_index(),
            vk::CommandPoolCreateFlags::empty(),
            &format!("frame-{label}"),
        )?);
        Ok(Self {
            command_pool,
            allocated_commands: Vec::new(),
            image_available: GfxSemaphore::new(gfx.device.clone(), &format!("image-available-{label}"))?,
            shadow_done: GfxSemaphore::new(gfx.device.clone(), &format!("shadow-done-{label}"))?,
            opaque_done: GfxSemaphore::new(gfx.device.clone(), &format!("opaque-done-{label}"))?,
            accum_done: GfxSemaphore::new(gfx.device.clone(), &format!("accum-done-{label}"))?,
            // 初始为 signaled，第一次 wait 不会阻塞
            in_flight_fence: GfxFence::new(gfx.device.clone(), true, &format!("in-flight-{label}"))?,
        })
    }

    fn destroy(mut self) {
        for cmd in self.allocated_commands.drain(..) {
            cmd.free();
        }
        self.image_available.destroy();
        self.shadow_done.destroy();
        self.opaque_done.destroy();
        self.accum_done.destroy();
        self.in_flight_fence.destroy();
    }
}

/// 按 swapchain image index 索引的一组资源，数量跟随 swapchain 的 image 数
///
/// frame in flight 的数量和 image 数可以不同，按 frame label 选取的资源
/// 不能用于 present 等待：slot 复用时 presentation engine 可能还没消费掉
/// 上一次的 wait。按 image 选取则 acquire 保证了该 image 已经离开队列。
struct PerImage<T> {
    items: Vec<T>,
}

impl<T> PerImage<T> {
    fn new(count: usize, create: impl FnMut(usize) -> RenderResult<T>) -> RenderResult<Self> {
        Ok(Self {
            items: (0..count).map(create).try_collect()?,
        })
    }

    #[inline]
    fn get(&self, image_index: u32) -> &T {
        &self.items[image_index as usize]
    }

    fn into_items(self) -> Vec<T> {
        self.items
    }
}

pub struct FrameContext {
    swapchain: GfxSwapchain,
    /// swapchain 重建需要重新创建 surface
    raw_display_handle: RawDisplayHandle,
    raw_window_handle: RawWindowHandle,

    slots: Vec<FrameSlot>,
    /// composite + blit 完成，present 等待它；按 swapchain image 索引
    render_complete: PerImage<GfxSemaphore>,
    frame_label: FrameLabel,
    frame_id: u64,
}

impl FrameContext {
    pub fn new(
        gfx: &Gfx,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
    ) -> RenderResult<Self> {
        let surface = GfxSurface::new(gfx, raw_display_handle, raw_window_handle)?;
        let swapchain = GfxSwapchain::new(
            gfx,
            surface,
            &GfxSwapchainInitInfo::new().format(DefaultRendererSettings::DEFAULT_SURFACE_FORMAT),
        )?;

        let slots = (0..FRAMES_IN_FLIGHT)
            .map(|idx| FrameSlot::new(gfx, FrameLabel::from_usize(idx)))
            .try_collect()?;
        let render_complete = PerImage::new(swapchain.images.len(), |idx| {
            GfxSemaphore::new(gfx.device.clone(), &format!("render-complete-img{idx}"))
        })?;

        Ok(Self {
            swapchain,
            raw_display_handle,
            raw_window_handle,
            slots,
            render_complete,
            frame_label: FrameLabel::A,
            frame_id: 0,
        })
    }

    /// 等待当前 slot 空闲并 acquire swapchain image
    ///
    /// 返回 None 表示 swapchain 已失效，调用方需要触发重建；
    /// 此时 fence 保持 signaled，跳过这一帧是安全的
    pub fn begin_frame(&mut self) -> RenderResult<Option<u32>> {
        let slot = &mut self.slots[*self.frame_label];
        slot.in_flight_fence.wait()?;

        let image_index = match self.swapchain.acquire_next_frame(&slot.image_available, None)? {
            AcquiredImage::Ok(index) => index,
            AcquiredImage::OutOfDate => return Ok(None),
        };

        slot.in_flight_fence.reset()?;
        for cmd in slot.allocated_commands.drain(..) {
            cmd.free();
        }
        slot.command_pool.reset_all_buffers()?;

        Ok(Some(image_index))
    }

    /// 从当前帧的 pool 分配 command buffer，生命周期由 FrameContext 管理
    pub fn alloc_command(&mut self, gfx: &Gfx, name: &str) -> RenderResult<GfxCommandBuffer> {
        let slot = &mut self.slots[*self.frame_label];
        let cmd = GfxCommandBuffer::new(
            gfx.device.clone(),
            slot.command_pool.clone(),
            &format!("{name}-{}", self.frame_label),
        )?;
        slot.allocated_commands.push(cmd.clone());
        Ok(cmd)
    }

    /// present 并推进到下一个 frame label
    pub fn end_frame(&mut self, gfx: &Gfx, image_index: u32) -> RenderResult<()> {
        let render_complete = self.render_complete.get(image_index).clone();
        self.swapchain.submit_frame(&gfx.graphics_queue, image_index, &[render_complete])?;

        self.frame_label = self.frame_label.next();
        self.frame_id += 1;
        Ok(())
    }

    /// 重建 swapchain，调用方需要保证 GPU 已经 idle
    pub fn rebuild_swapchain(&mut self, gfx: &Gfx) -> RenderResult<()> {
        let surface = GfxSurface::new(gfx, self.raw_display_handle, self.raw_window_handle)?;
        self.swapchain = GfxSwapchain::new(
            gfx,
            surface,
            &GfxSwapchainInitInfo::new().format(DefaultRendererSettings::DEFAULT_SURFACE_FORMAT),
        )?;

        // image 数可能变化，present 信号量整组重建
        let old = std::mem::replace(
            &mut self.render_complete,
            PerImage::new(self.swapchain.images.len(), |idx| {
                GfxSemaphore::new(gfx.device.clone(), &format!("render-complete-img{idx}"))
            })?,
        );
        for semaphore in old.into_items() {
            semaphore.destroy();
        }
        Ok(())
    }

    pub fn destroy(self) {
        for slot in self.slots {
            slot.destroy();
        }
        for semaphore in self.render_complete.into_items() {
            semaphore.destroy();
        }
        drop(self.swapchain);
    }
}

// getter
impl FrameContext {
    #[inline]
    pub fn frame_label(&self) -> FrameLabel {
        self.frame_label
    }

    #[inline]
    pub fn frame_id(&self) -> u64 {
        self.frame_id
    }

    #[inline]
    pub fn swapchain_extent(&self) -> vk::Extent2D {
        self.swapchain.extent
    }

    #[inline]
    pub fn swapchain_image(&self, image_index: u32) -> vk::Image {
        self.swapchain.images[image_index as usize]
    }

    #[inline]
    pub fn image_available_semaphore(&self) -> &GfxSemaphore {
        &self.slots[*self.frame_label].image_available
    }

    #[inline]
    pub fn shadow_done_semaphore(&self) -> &GfxSemaphore {
        &self.slots[*self.frame_label].shadow_done
    }

    #[inline]
    pub fn opaque_done_semaphore(&self) -> &GfxSemaphore {
        &self.slots[*self.frame_label].opaque_done
    }

    #[inline]
    pub fn accum_done_semaphore(&self) -> &GfxSemaphore {
        &self.slots[*self.frame_label].accum_done
    }

    /// present 等待的信号量，按 acquire 到的 image 索引
    #[inline]
    pub fn render_complete_semaphore(&self, image_index: u32) -> &GfxSemaphore {
        self.render_complete.get(image_index)
    }

    #[inline]
    pub fn in_flight_fence(&self) -> &GfxFence {
        &self.slots[*self.frame_label].in_flight_fence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_image_follows_image_index_not_frame_label() {
        // 4 个 swapchain image，3 个 frame in flight：
        // 选取结果只取决于 acquire 到的 image index，与 slot 轮转无关
        let per_image = PerImage::new(4, |idx| Ok(idx as u32 * 100)).unwrap();

        let acquired = [0u32, 1, 2, 3, 0, 1];
        let mut label = FrameLabel::A;
        for image_index in acquired {
            assert_eq!(*per_image.get(image_index), image_index * 100);
            label = label.next();
        }
        assert_eq!(label, FrameLabel::from_usize(acquired.len() % FRAMES_IN_FLIGHT));
    }

    #[test]
    fn per_image_count_matches_swapchain_images() {
        let per_image = PerImage::new(3, |idx| Ok(idx)).unwrap();
        assert_eq!(per_image.into_items().len(), 3);
    }
}
