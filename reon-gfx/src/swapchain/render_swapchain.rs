use std::rc::Rc;

use ash::vk;
use itertools::Itertools;

use crate::commands::{
    command_queue::GfxQueue,
    synchronize::{GfxFence, GfxSemaphore},
};
use crate::error::{RenderError, RenderResult};
use crate::foundation::device::GfxDevice;
use crate::gfx::Gfx;
use crate::swapchain::surface::GfxSurface;

pub struct GfxSwapchainInitInfo {
    format: vk::SurfaceFormatKHR,
    swapchain_present_mode: vk::PresentModeKHR,
}

impl Default for GfxSwapchainInitInfo {
    fn default() -> Self {
        Self {
            format: vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            },
            swapchain_present_mode: vk::PresentModeKHR::MAILBOX,
        }
    }
}

impl GfxSwapchainInitInfo {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// builder
    #[inline]
    pub fn format(mut self, format: vk::SurfaceFormatKHR) -> Self {
        self.format = format;
        self
    }
}

/// acquire 的结果
pub enum AcquiredImage {
    /// 成功获得 image index
    Ok(u32),
    /// swapchain 已经和 surface 不匹配，需要重建
    OutOfDate,
}

pub struct GfxSwapchain {
    swapchain_pf: ash::khr::swapchain::Device,
    swapchain_handle: vk::SwapchainKHR,

    device: Rc<GfxDevice>,

    _surface: GfxSurface,

    /// 这里的 image 并非手动创建的，因此无法使用 GfxImage2D 类型
    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,

    pub extent: vk::Extent2D,
    pub color_format: vk::Format,
    pub color_space: vk::ColorSpaceKHR,
    pub present_mode: vk::PresentModeKHR,
}

impl GfxSwapchain {
    pub fn new(gfx: &Gfx, surface: GfxSurface, init_info: &GfxSwapchainInitInfo) -> RenderResult<Self> {
        let pdevice = gfx.physical_device.handle;

        let present_mode = Self::init_present_mode(gfx, &surface, init_info.swapchain_present_mode)?;
        let (format, color_space) = Self::init_format_and_colorspace(gfx, &surface, init_info.format)?;

        let surface_capabilities =
            unsafe { surface.pf.get_physical_device_surface_capabilities(pdevice, surface.handle)? };

        let extent = surface_capabilities.current_extent;
        log::info!("surface capability extent: {:?}", extent);

        let (swapchain_handle, swapchain_pf) =
            Self::create_handle(gfx, &surface, &surface_capabilities, format, color_space, extent, present_mode)?;

        let (images, image_views) = Self::create_images_and_views(gfx, swapchain_handle, &swapchain_pf, format)?;

        Ok(Self {
            swapchain_pf,
            swapchain_handle,
            images,
            image_views,
            extent,
            color_format: format,
            color_space,
            present_mode,
            _surface: surface,
            device: gfx.device.clone(),
        })
    }

    /// getter
    #[inline]
    pub fn image_count(&self) -> usize {
        self.images.len()
    }

    fn create_handle(
        gfx: &Gfx,
        surface: &GfxSurface,
        surface_capabilities: &vk::SurfaceCapabilitiesKHR,
        format: vk::Format,
        color_space: vk::ColorSpaceKHR,
        extent: vk::Extent2D,
        present_mode: vk::PresentModeKHR,
    ) -> RenderResult<(vk::SwapchainKHR, ash::khr::swapchain::Device)> {
        // 确定 image count
        // max_image_count == 0，表示不限制 image 数量
        let image_count = if surface_capabilities.max_image_count == 0 {
            surface_capabilities.min_image_count + 1
        } else {
            u32::min(surface_capabilities.max_image_count, surface_capabilities.min_image_count + 1)
        };

        log::info!("swapchain image count: {}", image_count);
        log::info!("swapchain format: {:?}", format);
        log::info!("swapchain color space: {:?}", color_space);
        log::info!("swapchain present mode: {:?}", present_mode);

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface.handle)
            .min_image_count(image_count)
            .image_format(format)
            .image_color_space(color_space)
            .image_extent(extent)
            .image_array_layers(1)
            // TRANSFER_DST：最终画面通过 blit 写入 swapchain image
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_DST)
            .pre_transform(surface_capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(present_mode)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .clipped(true);

        unsafe {
            let swapchain_pf = ash::khr::swapchain::Device::new(gfx.instance.ash_instance(), &gfx.device.handle);
            let swapchain_handle = swapchain_pf.create_swapchain(&create_info, None)?;
            gfx.device.debug_utils.set_object_debug_name(swapchain_handle, "main-swapchain");

            Ok((swapchain_handle, swapchain_pf))
        }
    }

    fn create_images_and_views(
        gfx: &Gfx,
        swapchain_handle: vk::SwapchainKHR,
        swapchain_pf: &ash::khr::swapchain::Device,
        format: vk::Format,
    ) -> RenderResult<(Vec<vk::Image>, Vec<vk::ImageView>)> {
        let swapchain_images = unsafe { swapchain_pf.get_swapchain_images(swapchain_handle)? };

        let mut image_views = Vec::with_capacity(swapchain_images.len());
        for img in &swapchain_images {
            let create_info = vk::ImageViewCreateInfo::default()
                .image(*img)
                .format(format)
                .view_type(vk::ImageViewType::TYPE_2D)
                .subresource_range(
                    vk::ImageSubresourceRange::default()
                        .aspect_mask(vk::ImageAspectFlags::COLOR)
                        .layer_count(1)
                        .level_count(1),
                );

            image_views.push(unsafe { gfx.device.create_image_view(&create_info, None)? });
        }

        let images = swapchain_images;

        // 为 images 和 image_views 设置 debug name
        for i in 0..images.len() {
            gfx.device.debug_utils.set_object_debug_name(images[i], format!("swapchain-image-{}", i));
            gfx.device.debug_utils.set_object_debug_name(image_views[i], format!("swapchain-image-view-{}", i));
        }

        Ok((images, image_views))
    }

    /// 找到一个合适的 present mode
    ///
    /// @param present_mode: 优先使用的 present mode
    ///
    /// 可以是：immediate, mailbox, fifo, fifo_relaxed
    fn init_present_mode(
        gfx: &Gfx,
        surface: &GfxSurface,
        present_mode: vk::PresentModeKHR,
    ) -> RenderResult<vk::PresentModeKHR> {
        unsafe {
            surface
                .pf
                .get_physical_device_surface_present_modes(gfx.physical_device.handle, surface.handle)?
                .iter()
                .find_or_first(|p| **p == present_mode)
                .copied()
                .ok_or(RenderError::Unsupported("surface has no present mode"))
        }
    }

    /// 找到合适的 format 和 colorspace
    ///
    /// @param format: 优先使用的 format
    fn init_format_and_colorspace(
        gfx: &Gfx,
        surface: &GfxSurface,
        format: vk::SurfaceFormatKHR,
    ) -> RenderResult<(vk::Format, vk::ColorSpaceKHR)> {
        let surface_format = unsafe {
            surface
                .pf
                .get_physical_device_surface_formats(gfx.physical_device.handle, surface.handle)?
                .into_iter()
                .find(|f| *f == format)
                .ok_or(RenderError::Unsupported("preferred surface format unavailable"))?
        };

        Ok((surface_format.format, surface_format.color_space))
    }

    #[inline]
    pub fn acquire_next_frame(
        &self,
        semaphore: &GfxSemaphore,
        fence: Option<&GfxFence>,
    ) -> RenderResult<AcquiredImage> {
        let result = unsafe {
            self.swapchain_pf.acquire_next_image(
                self.swapchain_handle,
                u64::MAX,
                semaphore.handle(),
                fence.map_or(vk::Fence::null(), |f| f.handle()),
            )
        };

        match result {
            // suboptimal 时仍然可以渲染，重建由外部在尺寸变化时触发
            Ok((image_index, _is_suboptimal)) => Ok(AcquiredImage::Ok(image_index)),
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(AcquiredImage::OutOfDate),
            Err(e) => Err(e.into()),
        }
    }

    #[inline]
    pub fn submit_frame(
        &self,
        queue: &GfxQueue,
        image_index: u32,
        wait_semaphores: &[GfxSemaphore],
    ) -> RenderResult<()> {
        let wait_semaphores = wait_semaphores.iter().map(|s| s.handle()).collect_vec();
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(&wait_semaphores)
            .image_indices(std::slice::from_ref(&image_index))
            .swapchains(std::slice::from_ref(&self.swapchain_handle));

        let result = unsafe { self.swapchain_pf.queue_present(queue.handle, &present_info) };
        match result {
            Ok(_) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for GfxSwapchain {
    fn drop(&mut self) {
        log::info!("destroying swapchain");
        unsafe {
            for view in &self.image_views {
                self.device.destroy_image_view(*view, None);
            }
            self.swapchain_pf.destroy_swapchain(self.swapchain_handle, None);
        }
    }
}
