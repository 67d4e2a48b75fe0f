use ash::vk;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};

use crate::error::RenderResult;
use crate::gfx::Gfx;

pub struct GfxSurface {
    pub(crate) handle: vk::SurfaceKHR,
    pub(crate) pf: ash::khr::surface::Instance,
}

impl GfxSurface {
    pub fn new(
        gfx: &Gfx,
        display_handle: RawDisplayHandle,
        window_handle: RawWindowHandle,
    ) -> RenderResult<Self> {
        let surface_pf = ash::khr::surface::Instance::new(gfx.vk_entry(), gfx.instance.ash_instance());

        let surface = unsafe {
            ash_window::create_surface(gfx.vk_entry(), gfx.instance.ash_instance(), display_handle, window_handle, None)?
        };
        gfx.device.debug_utils.set_object_debug_name(surface, "main-surface");

        Ok(GfxSurface {
            handle: surface,
            pf: surface_pf,
        })
    }
}

impl Drop for GfxSurface {
    fn drop(&mut self) {
        log::info!("destroying surface");
        unsafe { self.pf.destroy_surface(self.handle, None) }
    }
}
