//! 渲染帧的编排器
//!
//! 持有图形上下文、场景 registry 和所有 pass，负责：
//! - 每帧上传全局/光源/物体数据
//! - 按 shadow -> opaque -> transparent -> composite 的顺序录制并提交
//! - swapchain/attachment 的 resize 重建与 descriptor 回放
//! - renderer 相关 GPU 资源的延迟释放

use std::collections::HashMap;
use std::rc::Rc;

use ash::vk;
use bytemuck::Zeroable;
use itertools::Itertools;
use raw_window_handle::{RawDisplayHandle, RawWindowHandle};
use slotmap::SecondaryMap;

use reon_gfx::commands::command_queue::GfxSubmitInfo;
use reon_gfx::descriptors::descriptor_pool::{GfxDescriptorPool, GfxDescriptorPoolCreateInfo};
use reon_gfx::error::{RenderError, RenderResult};
use reon_gfx::gfx::Gfx;
use reon_gfx::resources::buffer::GfxStructuredBuffer;
use reon_gfx::resources::texture::GfxTexture2D;

use crate::frame_settings::{
    DefaultRendererSettings, FrameSettings, RenderMode, RendererConfig, FRAMES_IN_FLIGHT,
};
use crate::gpu_data::{GlobalRenderData, LightBufferData, ObjectData, ShadowPushConstants};
use crate::orchestrator::draw_buckets::{DrawBuckets, DrawCommand, SubmeshDraw};
use crate::orchestrator::frame_context::FrameContext;
use crate::orchestrator::frame_targets::{DescriptorRebindTable, FrameSamplers, FrameTargets, SetSlot};
use crate::pass::composite_pass::CompositePass;
use crate::pass::opaque_pass::OpaquePass;
use crate::pass::shadow_pass::ShadowPass;
use crate::pass::transparent_pass::TransparentPass;
use crate::pass::unlit_pass::UnlitPass;
use crate::pass::{blit_end_to_swapchain, RenderLayouts, ResolvedDraw, MATERIAL_TEXTURE_SLOTS};
use crate::resource::material::{Material, MaterialId};
use crate::resource::mesh::Mesh;
use crate::scene::camera::Camera;
use crate::scene::light::{directional_light_view_proj, find_shadow_caster, pack_lights, Light};
use crate::scene::renderer_registry::{MeshRenderer, RendererId, RendererRegistry};

/// 一个 renderer 在 GPU 侧的数据：per-FIF 的 object UBO 和 descriptor set
struct RendererGpuData {
    object_ubos: Vec<GfxStructuredBuffer<ObjectData>>,
    object_sets: Vec<vk::DescriptorSet>,
}

pub struct FrameOrchestrator {
    gfx: Gfx,
    settings: FrameSettings,
    render_mode: RenderMode,
    config: RendererConfig,

    frame_ctx: FrameContext,
    layouts: RenderLayouts,
    samplers: FrameSamplers,
    targets: Vec<FrameTargets>,
    rebind_table: DescriptorRebindTable,

    descriptor_pool: GfxDescriptorPool,

    global_ubos: Vec<GfxStructuredBuffer<GlobalRenderData>>,
    light_buffers: Vec<GfxStructuredBuffer<LightBufferData>>,
    global_sets: Vec<vk::DescriptorSet>,
    composite_sets: Vec<vk::DescriptorSet>,
    end_sets: Vec<vk::DescriptorSet>,
    /// 上一次成功渲染的帧的 end set，空帧和 resize 后为 None
    last_end_set: Option<vk::DescriptorSet>,

    registry: RendererRegistry,
    renderer_data: SecondaryMap<RendererId, RendererGpuData>,
    /// material 的 descriptor set 第一次遇到时才创建；
    /// Rc 保证贴图在 set 的生命周期内存活
    material_sets: HashMap<MaterialId, (vk::DescriptorSet, Rc<Material>)>,
    dummy_texture: GfxTexture2D,
    /// 等到 FRAMES_IN_FLIGHT 帧之后再释放，GPU 可能还在使用
    retired_renderers: Vec<(u64, RendererGpuData)>,

    shadow_pass: ShadowPass,
    opaque_pass: OpaquePass,
    transparent_pass: TransparentPass,
    composite_pass: CompositePass,
    unlit_pass: UnlitPass,

    /// 方向光 shadow map 覆盖的场景包围球
    shadow_center: glam::Vec3,
    shadow_radius: f32,

    needs_resize: bool,
}

/// 创建与销毁
impl FrameOrchestrator {
    pub fn new(
        config: RendererConfig,
        raw_display_handle: RawDisplayHandle,
        raw_window_handle: RawWindowHandle,
        instance_extra_exts: Vec<&'static std::ffi::CStr>,
    ) -> RenderResult<Self> {
        let gfx = Gfx::new(config.app_name.clone(), instance_extra_exts)?;

        let frame_ctx = FrameContext::new(&gfx, raw_display_handle, raw_window_handle)?;
        let settings = FrameSettings {
            color_format: DefaultRendererSettings::COLOR_FORMAT,
            depth_format: gfx.find_depth_format()?,
            frame_extent: frame_ctx.swapchain_extent(),
            msaa_samples: DefaultRendererSettings::MSAA_SAMPLES,
        };

        let layouts = RenderLayouts::new(gfx.device.clone())?;
        let samplers = FrameSamplers::new(&gfx)?;
        let targets = (0..FRAMES_IN_FLIGHT)
            .map(|idx| FrameTargets::new(&gfx, &settings, crate::frame_settings::FrameLabel::from_usize(idx)))
            .try_collect()?;

        let descriptor_pool = GfxDescriptorPool::new(
            gfx.device.clone(),
            Rc::new(GfxDescriptorPoolCreateInfo::new(
                vk::DescriptorPoolCreateFlags::FREE_DESCRIPTOR_SET,
                1024,
                vec![
                    vk::DescriptorPoolSize {
                        ty: vk::DescriptorType::UNIFORM_BUFFER,
                        descriptor_count: 1024,
                    },
                    vk::DescriptorPoolSize {
                        ty: vk::DescriptorType::STORAGE_BUFFER,
                        descriptor_count: 64,
                    },
                    vk::DescriptorPoolSize {
                        ty: vk::DescriptorType::COMBINED_IMAGE_SAMPLER,
                        descriptor_count: 2048,
                    },
                ],
            )),
            "renderer-descriptor-pool",
        )?;

        let mut global_ubos = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut light_buffers = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut global_sets = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut composite_sets = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut end_sets = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for idx in 0..FRAMES_IN_FLIGHT {
            global_ubos.push(GfxStructuredBuffer::new_ubo_mapped(&gfx, 1, format!("global-ubo-{idx}"))?);
            let mut light_buffer = GfxStructuredBuffer::new(
                &gfx,
                format!("light-buffer-{idx}"),
                1,
                vk::BufferUsageFlags::STORAGE_BUFFER,
                true,
            )?;
            light_buffer.map()?;
            light_buffers.push(light_buffer);
            global_sets.push(descriptor_pool.alloc_set(&layouts.global, &format!("global-set-{idx}"))?);
            composite_sets.push(descriptor_pool.alloc_set(&layouts.composite, &format!("composite-set-{idx}"))?);
            end_sets.push(descriptor_pool.alloc_set(&layouts.end, &format!("end-set-{idx}"))?);
        }

        let dummy_texture = GfxTexture2D::dummy_white(&gfx)?;

        let shadow_pass = ShadowPass::new(&gfx, &layouts, &config.shader_dir)?;
        let opaque_pass = OpaquePass::new(&gfx, &layouts, &settings, &config.shader_dir)?;
        let transparent_pass = TransparentPass::new(&gfx, &layouts, &settings, &config.shader_dir)?;
        let composite_pass = CompositePass::new(&gfx, &layouts, &settings, &config.shader_dir)?;
        let unlit_pass = UnlitPass::new(&gfx, &layouts, &settings, &config.shader_dir)?;

        let mut orchestrator = Self {
            gfx,
            settings,
            render_mode: RenderMode::Lit,
            config,
            frame_ctx,
            layouts,
            samplers,
            targets,
            rebind_table: DescriptorRebindTable::new_default(),
            descriptor_pool,
            global_ubos,
            light_buffers,
            global_sets,
            composite_sets,
            end_sets,
            last_end_set: None,
            registry: RendererRegistry::new(),
            renderer_data: SecondaryMap::new(),
            material_sets: HashMap::new(),
            dummy_texture,
            retired_renderers: Vec::new(),
            shadow_pass,
            opaque_pass,
            transparent_pass,
            composite_pass,
            unlit_pass,
            shadow_center: glam::Vec3::ZERO,
            shadow_radius: 30.0,
            needs_resize: false,
        };

        orchestrator.write_static_global_bindings();
        orchestrator.apply_rebind_table();

        Ok(orchestrator)
    }

    pub fn destroy(mut self) {
        unsafe {
            let _ = self.gfx.device.device_wait_idle();
        }

        for (_, data) in self.retired_renderers.drain(..) {
            let _ = self.descriptor_pool.free_sets(&data.object_sets);
        }
        for (_, data) in self.renderer_data.drain() {
            let _ = self.descriptor_pool.free_sets(&data.object_sets);
        }
        self.material_sets.clear();

        drop(self.shadow_pass);
        drop(self.opaque_pass);
        drop(self.transparent_pass);
        drop(self.composite_pass);
        drop(self.unlit_pass);

        drop(self.targets);
        drop(self.samplers);
        drop(self.layouts);
        drop(self.global_ubos);
        drop(self.light_buffers);
        drop(self.dummy_texture);
        drop(self.registry);
        drop(self.descriptor_pool);

        self.frame_ctx.destroy();
        self.gfx.destroy();
    }
}

/// 场景管理
impl FrameOrchestrator {
    pub fn add_renderer(
        &mut self,
        mesh: Rc<Mesh>,
        materials: Vec<Rc<Material>>,
        model_matrix: glam::Mat4,
        cast_shadows: bool,
    ) -> RenderResult<RendererId> {
        for material in &materials {
            self.ensure_material_set(material)?;
        }

        let id = self.registry.insert(MeshRenderer {
            mesh,
            materials,
            model_matrix,
            cast_shadows,
        });

        let mut object_ubos = Vec::with_capacity(FRAMES_IN_FLIGHT);
        let mut object_sets = Vec::with_capacity(FRAMES_IN_FLIGHT);
        for idx in 0..FRAMES_IN_FLIGHT {
            let ubo = GfxStructuredBuffer::new_ubo_mapped(&self.gfx, 1, format!("object-ubo-{id:?}-{idx}"))?;
            let set = self.descriptor_pool.alloc_set(&self.layouts.object, &format!("object-set-{id:?}-{idx}"))?;

            let buffer_info = ubo.get_descriptor_buffer_info_ubo::<ObjectData>();
            let write = vk::WriteDescriptorSet::default()
                .dst_set(set)
                .dst_binding(0)
                .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                .buffer_info(std::slice::from_ref(&buffer_info));
            unsafe { self.gfx.device.update_descriptor_sets(std::slice::from_ref(&write), &[]) };

            object_ubos.push(ubo);
            object_sets.push(set);
        }
        self.renderer_data.insert(id, RendererGpuData { object_ubos, object_sets });

        Ok(id)
    }

    /// 移除 renderer；GPU 资源等在途的帧全部完成后才释放
    pub fn remove_renderer(&mut self, id: RendererId) {
        if self.registry.remove(id).is_none() {
            log::warn!("remove_renderer called with stale id {id:?}");
            return;
        }
        if let Some(data) = self.renderer_data.remove(id) {
            self.retired_renderers.push((self.frame_ctx.frame_id(), data));
        }
    }

    pub fn set_model_matrix(&mut self, id: RendererId, model_matrix: glam::Mat4) {
        match self.registry.get_mut(id) {
            Some(renderer) => renderer.model_matrix = model_matrix,
            None => log::warn!("set_model_matrix called with stale id {id:?}"),
        }
    }

    pub fn set_render_mode(&mut self, mode: RenderMode) {
        if mode == RenderMode::Wireframe && self.gfx.device.vk_dynamic_state3_pf.is_none() {
            log::error!("wireframe mode needs VK_EXT_extended_dynamic_state3, falling back to filled unlit");
        }
        self.render_mode = mode;
    }

    pub fn set_shadow_bounds(&mut self, center: glam::Vec3, radius: f32) {
        self.shadow_center = center;
        self.shadow_radius = radius;
    }

    /// 窗口尺寸变化时调用，重建推迟到下一次 render
    ///
    /// 实际 extent 由 surface capabilities 决定，参数只用于日志
    pub fn set_render_dimensions(&mut self, width: u32, height: u32) {
        log::info!("render dimensions change requested: {width}x{height}");
        self.needs_resize = true;
    }

    fn ensure_material_set(&mut self, material: &Rc<Material>) -> RenderResult<()> {
        if self.material_sets.contains_key(&material.id) {
            return Ok(());
        }

        let set = self.descriptor_pool.alloc_set(&self.layouts.material, &format!("material-set-{}", material.name))?;

        // 缺失的贴图 slot 绑定 1x1 白图，shader 靠 feature flags 决定是否采样
        let slots = [
            &material.albedo_map,
            &material.normal_map,
            &material.metallic_roughness_map,
            &material.emissive_map,
            &material.occlusion_map,
            &material.specular_map,
        ];
        debug_assert_eq!(slots.len(), MATERIAL_TEXTURE_SLOTS as usize);

        let image_infos = slots
            .iter()
            .map(|slot| {
                slot.as_deref()
                    .unwrap_or(&self.dummy_texture)
                    .descriptor_image_info(vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL)
            })
            .collect_vec();
        let writes = image_infos
            .iter()
            .enumerate()
            .map(|(slot, info)| {
                vk::WriteDescriptorSet::default()
                    .dst_set(set)
                    .dst_binding(slot as u32)
                    .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                    .image_info(std::slice::from_ref(info))
            })
            .collect_vec();
        unsafe { self.gfx.device.update_descriptor_sets(&writes, &[]) };

        self.material_sets.insert(material.id, (set, material.clone()));
        Ok(())
    }
}

/// descriptor 写入
impl FrameOrchestrator {
    /// global set 中不随 resize 变化的 binding
    fn write_static_global_bindings(&self) {
        for idx in 0..FRAMES_IN_FLIGHT {
            let ubo_info = self.global_ubos[idx].get_descriptor_buffer_info_ubo::<GlobalRenderData>();
            let light_info = self.light_buffers[idx].get_descriptor_buffer_info_full();
            let writes = [
                vk::WriteDescriptorSet::default()
                    .dst_set(self.global_sets[idx])
                    .dst_binding(0)
                    .descriptor_type(vk::DescriptorType::UNIFORM_BUFFER)
                    .buffer_info(std::slice::from_ref(&ubo_info)),
                vk::WriteDescriptorSet::default()
                    .dst_set(self.global_sets[idx])
                    .dst_binding(1)
                    .descriptor_type(vk::DescriptorType::STORAGE_BUFFER)
                    .buffer_info(std::slice::from_ref(&light_info)),
            ];
            unsafe { self.gfx.device.update_descriptor_sets(&writes, &[]) };
        }
    }

    /// 按 rebind 表把 attachment 写回引用它们的 descriptor set
    ///
    /// 初始化和 resize 重建后都走这条路径
    fn apply_rebind_table(&self) {
        for idx in 0..FRAMES_IN_FLIGHT {
            let image_infos = self
                .rebind_table
                .entries()
                .iter()
                .map(|entry| self.targets[idx].sampled_image_info(entry.target, &self.samplers))
                .collect_vec();
            let writes = self
                .rebind_table
                .entries()
                .iter()
                .zip(image_infos.iter())
                .map(|(entry, info)| {
                    let set = match entry.set {
                        SetSlot::Global => self.global_sets[idx],
                        SetSlot::Composite => self.composite_sets[idx],
                        SetSlot::End => self.end_sets[idx],
                    };
                    vk::WriteDescriptorSet::default()
                        .dst_set(set)
                        .dst_binding(entry.binding)
                        .descriptor_type(vk::DescriptorType::COMBINED_IMAGE_SAMPLER)
                        .image_info(std::slice::from_ref(info))
                })
                .collect_vec();
            unsafe { self.gfx.device.update_descriptor_sets(&writes, &[]) };
        }
    }
}

/// 帧循环
impl FrameOrchestrator {
    /// 渲染一帧并提交 present
    ///
    /// swapchain 失效时本帧跳过，下一帧重建
    pub fn render(&mut self, camera: &Camera, lights: &[Light]) -> RenderResult<()> {
        if self.needs_resize {
            self.rebuild_render_targets()?;
            self.needs_resize = false;
        }

        let Some(image_index) = self.frame_ctx.begin_frame()? else {
            self.needs_resize = true;
            return Ok(());
        };

        let fif = *self.frame_ctx.frame_label();
        self.release_retired_renderers();

        let shadow_push = self.shadow_push_constants(lights);
        self.upload_frame_data(camera, lights, &shadow_push, fif)?;

        let buckets = self.collect_buckets();

        match self.render_mode {
            RenderMode::Lit => self.render_lit(image_index, fif, &shadow_push, &buckets)?,
            RenderMode::Unlit | RenderMode::Wireframe => {
                let wireframe = self.render_mode == RenderMode::Wireframe;
                self.render_unlit(image_index, fif, &buckets, wireframe)?;
            }
        }

        let has_draws = !buckets.opaque.is_empty() || !buckets.transparent.is_empty() || !buckets.shadow.is_empty();
        self.last_end_set = has_draws.then_some(self.end_sets[fif]);

        self.frame_ctx.end_frame(&self.gfx, image_index)?;
        Ok(())
    }

    fn upload_frame_data(
        &mut self,
        camera: &Camera,
        lights: &[Light],
        shadow_push: &ShadowPushConstants,
        fif: usize,
    ) -> RenderResult<()> {
        let view = camera.view_matrix();
        let proj = camera.projection_matrix();

        let packed = pack_lights(lights);
        let global = GlobalRenderData {
            view: view.to_cols_array_2d(),
            proj: proj.to_cols_array_2d(),
            view_proj: (proj * view).to_cols_array_2d(),
            light_view_proj: shadow_push.light_view_proj,
            camera_pos: glam::Vec4::from((camera.position, 1.0)).to_array(),
            light_count: packed.len() as u32,
            _padding: [0; 3],
        };
        self.global_ubos[fif].write(0, &global)?;

        let mut light_data = LightBufferData::zeroed();
        light_data.lights[..packed.len()].copy_from_slice(&packed);
        self.light_buffers[fif].write(0, &light_data)?;

        for (id, renderer) in self.registry.iter() {
            let Some(data) = self.renderer_data.get_mut(id) else {
                return Err(RenderError::Unsupported("renderer missing gpu data"));
            };
            data.object_ubos[fif].write(0, &ObjectData::from_model(renderer.model_matrix))?;
        }
        Ok(())
    }

    fn shadow_push_constants(&self, lights: &[Light]) -> ShadowPushConstants {
        let light_view_proj = find_shadow_caster(lights)
            .map(|light| directional_light_view_proj(light, self.shadow_center, self.shadow_radius))
            .unwrap_or(glam::Mat4::IDENTITY);
        ShadowPushConstants {
            light_view_proj: light_view_proj.to_cols_array_2d(),
        }
    }

    fn collect_buckets(&self) -> DrawBuckets {
        let items = self.registry.iter().flat_map(|(id, renderer)| {
            renderer.mesh.submeshes.iter().filter_map(move |submesh| {
                let Some(material) = renderer.materials.get(submesh.material_slot) else {
                    log::warn!("submesh of {:?} references missing material slot {}", id, submesh.material_slot);
                    return None;
                };
                Some(SubmeshDraw {
                    renderer: id,
                    submesh: *submesh,
                    material,
                    cast_shadows: renderer.cast_shadows,
                })
            })
        });
        DrawBuckets::collect(items)
    }

    fn render_lit(
        &mut self,
        image_index: u32,
        fif: usize,
        shadow_push: &ShadowPushConstants,
        buckets: &DrawBuckets,
    ) -> RenderResult<()> {
        let extent = self.settings.frame_extent;
        let wireframe = false;

        let shadow_draws =
            resolve_draws(&self.registry, &self.renderer_data, &self.material_sets, fif, wireframe, &buckets.shadow);
        let opaque_cmds = buckets.opaque.values().flat_map(|mats| mats.values().flatten()).copied().collect_vec();
        let opaque_draws =
            resolve_draws(&self.registry, &self.renderer_data, &self.material_sets, fif, wireframe, &opaque_cmds);
        let transparent_cmds =
            buckets.transparent.values().flat_map(|mats| mats.values().flatten()).copied().collect_vec();
        let transparent_draws =
            resolve_draws(&self.registry, &self.renderer_data, &self.material_sets, fif, wireframe, &transparent_cmds);

        let cmd_shadow = self.frame_ctx.alloc_command(&self.gfx, "shadow")?;
        cmd_shadow.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "shadow")?;
        self.shadow_pass.draw(&cmd_shadow, &self.targets[fif], shadow_push, &shadow_draws);
        cmd_shadow.end()?;

        let cmd_opaque = self.frame_ctx.alloc_command(&self.gfx, "opaque")?;
        cmd_opaque.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "opaque")?;
        self.opaque_pass.draw(
            &self.gfx,
            &cmd_opaque,
            extent,
            &self.targets[fif],
            self.global_sets[fif],
            &opaque_draws,
        )?;
        cmd_opaque.end()?;

        let cmd_transparent = self.frame_ctx.alloc_command(&self.gfx, "transparent")?;
        cmd_transparent.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "transparent")?;
        self.transparent_pass.draw(
            &self.gfx,
            &cmd_transparent,
            extent,
            &self.targets[fif],
            self.global_sets[fif],
            &transparent_draws,
        )?;
        cmd_transparent.end()?;

        let cmd_composite = self.frame_ctx.alloc_command(&self.gfx, "composite")?;
        cmd_composite.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "composite")?;
        self.composite_pass.draw(&cmd_composite, extent, &self.targets[fif], self.composite_sets[fif]);
        blit_end_to_swapchain(
            &cmd_composite,
            self.targets[fif].end.image.handle(),
            self.frame_ctx.swapchain_image(image_index),
            extent,
        );
        cmd_composite.end()?;

        let batches = vec![
            GfxSubmitInfo::new(&[cmd_shadow]).signal_infos(&[(
                self.frame_ctx.shadow_done_semaphore().clone(),
                vk::PipelineStageFlags2::ALL_GRAPHICS,
            )]),
            GfxSubmitInfo::new(&[cmd_opaque])
                .wait_infos(&[(
                    self.frame_ctx.shadow_done_semaphore().clone(),
                    vk::PipelineStageFlags2::FRAGMENT_SHADER,
                )])
                .signal_infos(&[(
                    self.frame_ctx.opaque_done_semaphore().clone(),
                    vk::PipelineStageFlags2::ALL_GRAPHICS,
                )]),
            GfxSubmitInfo::new(&[cmd_transparent])
                // composite 还要读 opaque 的 resolve 结果，等待范围保守一些
                .wait_infos(&[(
                    self.frame_ctx.opaque_done_semaphore().clone(),
                    vk::PipelineStageFlags2::TOP_OF_PIPE,
                )])
                .signal_infos(&[(
                    self.frame_ctx.accum_done_semaphore().clone(),
                    vk::PipelineStageFlags2::ALL_GRAPHICS,
                )]),
            GfxSubmitInfo::new(&[cmd_composite])
                .wait_infos(&[
                    (self.frame_ctx.accum_done_semaphore().clone(), vk::PipelineStageFlags2::FRAGMENT_SHADER),
                    // 只有 blit 会触碰 swapchain image
                    (self.frame_ctx.image_available_semaphore().clone(), vk::PipelineStageFlags2::TRANSFER),
                ])
                .signal_infos(&[(
                    self.frame_ctx.render_complete_semaphore(image_index).clone(),
                    vk::PipelineStageFlags2::ALL_COMMANDS,
                )]),
        ];
        self.gfx.graphics_queue.submit(batches, Some(self.frame_ctx.in_flight_fence().clone()))?;
        Ok(())
    }

    fn render_unlit(
        &mut self,
        image_index: u32,
        fif: usize,
        buckets: &DrawBuckets,
        wireframe: bool,
    ) -> RenderResult<()> {
        let extent = self.settings.frame_extent;

        // unlit 模式下不区分 opaque/transparent，全部画出来
        let cmds = buckets
            .opaque
            .values()
            .chain(buckets.transparent.values())
            .flat_map(|mats| mats.values().flatten())
            .copied()
            .collect_vec();
        let draws = resolve_draws(&self.registry, &self.renderer_data, &self.material_sets, fif, wireframe, &cmds);

        let cmd = self.frame_ctx.alloc_command(&self.gfx, "unlit")?;
        cmd.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, "unlit")?;
        self.unlit_pass.draw(
            &self.gfx,
            &cmd,
            extent,
            &self.targets[fif],
            self.global_sets[fif],
            &draws,
            wireframe,
        )?;
        blit_end_to_swapchain(
            &cmd,
            self.targets[fif].end.image.handle(),
            self.frame_ctx.swapchain_image(image_index),
            extent,
        );
        cmd.end()?;

        let batches = vec![GfxSubmitInfo::new(&[cmd])
            .wait_infos(&[(self.frame_ctx.image_available_semaphore().clone(), vk::PipelineStageFlags2::TRANSFER)])
            .signal_infos(&[(
                self.frame_ctx.render_complete_semaphore(image_index).clone(),
                vk::PipelineStageFlags2::ALL_COMMANDS,
            )])];
        self.gfx.graphics_queue.submit(batches, Some(self.frame_ctx.in_flight_fence().clone()))?;
        Ok(())
    }

    /// resize：等 GPU idle，重建 swapchain 和所有 attachment，再回放 rebind 表
    fn rebuild_render_targets(&mut self) -> RenderResult<()> {
        unsafe {
            self.gfx.device.device_wait_idle()?;
        }

        self.frame_ctx.rebuild_swapchain(&self.gfx)?;
        self.settings.frame_extent = self.frame_ctx.swapchain_extent();
        log::info!("render targets rebuilt, extent: {:?}", self.settings.frame_extent);

        for idx in 0..FRAMES_IN_FLIGHT {
            self.targets[idx] =
                FrameTargets::new(&self.gfx, &self.settings, crate::frame_settings::FrameLabel::from_usize(idx))?;
        }
        self.apply_rebind_table();
        // 旧的 end image 已销毁，给外部一帧的空窗期
        self.last_end_set = None;
        Ok(())
    }

    fn release_retired_renderers(&mut self) {
        let current = self.frame_ctx.frame_id();
        let pool = &self.descriptor_pool;
        self.retired_renderers.retain(|(retired_at, data)| {
            if current >= retired_at + FRAMES_IN_FLIGHT as u64 {
                let _ = pool.free_sets(&data.object_sets);
                false
            } else {
                true
            }
        });
    }
}

/// getter
impl FrameOrchestrator {
    #[inline]
    pub fn gfx(&self) -> &Gfx {
        &self.gfx
    }

    #[inline]
    pub fn frame_settings(&self) -> &FrameSettings {
        &self.settings
    }

    #[inline]
    pub fn render_mode(&self) -> RenderMode {
        self.render_mode
    }

    #[inline]
    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    #[inline]
    pub fn renderer_count(&self) -> usize {
        self.registry.len()
    }

    #[inline]
    pub fn contains_renderer(&self, id: RendererId) -> bool {
        self.registry.contains(id)
    }

    /// 最终画面的 descriptor set，给外部 UI 采样；
    /// 空帧或 resize 后的第一帧返回 None
    #[inline]
    pub fn end_buffer(&self) -> Option<vk::DescriptorSet> {
        self.last_end_set
    }

    /// opaque pass 已编译的 pipeline 排列数量
    #[inline]
    pub fn compiled_permutations(&self) -> usize {
        self.opaque_pass.permutation_count()
    }
}

/// 把分拣好的 DrawCommand 解析成 pass 可录制的绘制单元
///
/// registry 中已不存在的 renderer（同帧内刚被 remove）被静默跳过
fn resolve_draws<'a>(
    registry: &'a RendererRegistry,
    renderer_data: &'a SecondaryMap<RendererId, RendererGpuData>,
    material_sets: &'a HashMap<MaterialId, (vk::DescriptorSet, Rc<Material>)>,
    fif: usize,
    wireframe: bool,
    commands: &[DrawCommand],
) -> Vec<ResolvedDraw<'a>> {
    commands
        .iter()
        .filter_map(|cmd| {
            let renderer = registry.get(cmd.renderer)?;
            let data = renderer_data.get(cmd.renderer)?;
            let material = renderer.materials.get(cmd.material_slot)?;
            let (material_set, _) = material_sets.get(&material.id)?;
            Some(ResolvedDraw {
                vertex_buffer: &*renderer.mesh.vertex_buffer,
                index_buffer: &*renderer.mesh.index_buffer,
                object_set: data.object_sets[fif],
                material_set: *material_set,
                material_data: material.flat_data(wireframe),
                feature_flags: cmd.feature_flags,
                index_offset: cmd.index_offset,
                index_count: cmd.index_count,
            })
        })
        .collect_vec()
}
