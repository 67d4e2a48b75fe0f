//! 每个 frame in flight 独立的一组离屏 attachment
//!
//! resize 时整组重建，重建后按 rebind 表重新写入引用了这些 attachment 的
//! descriptor set，避免逐个 pass 手工补写时漏掉某个 binding。

use std::rc::Rc;

use ash::vk;

use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::resources::image::{GfxImage2D, GfxImage2DView, GfxImageCreateInfo, GfxImageViewCreateInfo};
use reon_gfx::resources::sampler::{GfxSampler, GfxSamplerCreateInfo};

use crate::frame_settings::{DefaultRendererSettings, FrameLabel, FrameSettings};

/// 会被 shader 采样的离屏 attachment
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SampledTarget {
    ShadowMap,
    /// opaque pass 的 resolve 结果
    LitColor,
    OitAccum,
    OitReveal,
    /// 合成后的最终画面
    EndColor,
}
impl SampledTarget {
    pub const ALL: [Self; 5] = [Self::ShadowMap, Self::LitColor, Self::OitAccum, Self::OitReveal, Self::EndColor];
}

/// rebind 表中 descriptor set 的槽位
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SetSlot {
    Global,
    Composite,
    End,
}

/// 重建 attachment 之后需要补写的一个 descriptor binding
#[derive(Copy, Clone, Debug)]
pub struct RebindEntry {
    pub set: SetSlot,
    pub binding: u32,
    pub target: SampledTarget,
}

/// 声明式的 rebind 表，resize 后整表回放
pub struct DescriptorRebindTable {
    entries: Vec<RebindEntry>,
}

impl DescriptorRebindTable {
    pub fn new_default() -> Self {
        Self {
            entries: vec![
                RebindEntry { set: SetSlot::Global, binding: 2, target: SampledTarget::ShadowMap },
                RebindEntry { set: SetSlot::Composite, binding: 0, target: SampledTarget::LitColor },
                RebindEntry { set: SetSlot::Composite, binding: 1, target: SampledTarget::OitAccum },
                RebindEntry { set: SetSlot::Composite, binding: 2, target: SampledTarget::OitReveal },
                RebindEntry { set: SetSlot::End, binding: 0, target: SampledTarget::EndColor },
            ],
        }
    }

    #[inline]
    pub fn entries(&self) -> &[RebindEntry] {
        &self.entries
    }

    /// 每个可采样 attachment 都必须出现在表里，否则 resize 后会有 set 指向已销毁的 view
    pub fn covers_all_targets(&self) -> bool {
        SampledTarget::ALL
            .iter()
            .all(|target| self.entries.iter().any(|entry| entry.target == *target))
    }
}

/// image + view 的 attachment 组合
pub struct AttachmentTarget {
    pub image: GfxImage2D,
    pub view: GfxImage2DView,
}

impl AttachmentTarget {
    fn new(
        gfx: &Gfx,
        extent: vk::Extent2D,
        format: vk::Format,
        usage: vk::ImageUsageFlags,
        samples: vk::SampleCountFlags,
        aspect: vk::ImageAspectFlags,
        name: &str,
    ) -> RenderResult<Self> {
        let image_info = Rc::new(GfxImageCreateInfo::new_image_2d_info(extent, format, usage).samples(samples));
        let image = GfxImage2D::new_attachment(gfx, image_info, name)?;
        let view = GfxImage2DView::new(
            gfx,
            image.handle(),
            GfxImageViewCreateInfo::new_image_view_2d_info(format, aspect),
            format!("{name}-view"),
        )?;
        Ok(Self { image, view })
    }
}

/// MSAA attachment 和它的单采样 resolve 目标
pub struct MsaaColorTarget {
    pub msaa: AttachmentTarget,
    pub resolve: AttachmentTarget,
}

/// 单个 frame in flight 的全部离屏 attachment
pub struct FrameTargets {
    pub shadow_map: AttachmentTarget,
    pub depth_msaa: AttachmentTarget,

    pub lit: MsaaColorTarget,
    pub accum: MsaaColorTarget,
    pub reveal: MsaaColorTarget,

    /// composite 的输出，blit 到 swapchain 的来源
    pub end: AttachmentTarget,
}

impl FrameTargets {
    pub fn new(gfx: &Gfx, settings: &FrameSettings, frame_label: FrameLabel) -> RenderResult<Self> {
        let extent = settings.frame_extent;
        let samples = settings.msaa_samples;
        let shadow_extent = vk::Extent2D {
            width: DefaultRendererSettings::SHADOW_MAP_RESOLUTION,
            height: DefaultRendererSettings::SHADOW_MAP_RESOLUTION,
        };

        let shadow_map = AttachmentTarget::new(
            gfx,
            shadow_extent,
            DefaultRendererSettings::SHADOW_MAP_FORMAT,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::DEPTH,
            &format!("shadow-map-{frame_label}"),
        )?;

        let depth_msaa = AttachmentTarget::new(
            gfx,
            extent,
            settings.depth_format,
            vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT,
            samples,
            vk::ImageAspectFlags::DEPTH,
            &format!("depth-msaa-{frame_label}"),
        )?;

        let new_msaa_color = |format: vk::Format, name: &str| -> RenderResult<MsaaColorTarget> {
            Ok(MsaaColorTarget {
                msaa: AttachmentTarget::new(
                    gfx,
                    extent,
                    format,
                    vk::ImageUsageFlags::COLOR_ATTACHMENT,
                    samples,
                    vk::ImageAspectFlags::COLOR,
                    &format!("{name}-msaa-{frame_label}"),
                )?,
                resolve: AttachmentTarget::new(
                    gfx,
                    extent,
                    format,
                    vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::SAMPLED,
                    vk::SampleCountFlags::TYPE_1,
                    vk::ImageAspectFlags::COLOR,
                    &format!("{name}-resolve-{frame_label}"),
                )?,
            })
        };

        let lit = new_msaa_color(settings.color_format, "lit")?;
        let accum = new_msaa_color(DefaultRendererSettings::OIT_ACCUM_FORMAT, "oit-accum")?;
        let reveal = new_msaa_color(DefaultRendererSettings::OIT_REVEAL_FORMAT, "oit-reveal")?;

        let end = AttachmentTarget::new(
            gfx,
            extent,
            settings.color_format,
            vk::ImageUsageFlags::COLOR_ATTACHMENT | vk::ImageUsageFlags::TRANSFER_SRC | vk::ImageUsageFlags::SAMPLED,
            vk::SampleCountFlags::TYPE_1,
            vk::ImageAspectFlags::COLOR,
            &format!("end-{frame_label}"),
        )?;

        Ok(Self {
            shadow_map,
            depth_msaa,
            lit,
            accum,
            reveal,
            end,
        })
    }

    /// 某个可采样 attachment 的 descriptor 信息
    pub fn sampled_image_info(&self, target: SampledTarget, samplers: &FrameSamplers) -> vk::DescriptorImageInfo {
        let (view, sampler) = match target {
            SampledTarget::ShadowMap => (&self.shadow_map.view, &samplers.shadow),
            SampledTarget::LitColor => (&self.lit.resolve.view, &samplers.attachment),
            SampledTarget::OitAccum => (&self.accum.resolve.view, &samplers.attachment),
            SampledTarget::OitReveal => (&self.reveal.resolve.view, &samplers.attachment),
            SampledTarget::EndColor => (&self.end.view, &samplers.attachment),
        };
        vk::DescriptorImageInfo {
            sampler: sampler.handle(),
            image_view: view.handle(),
            image_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        }
    }
}

/// attachment 采样器，所有 frame 共享
pub struct FrameSamplers {
    pub attachment: GfxSampler,
    pub shadow: GfxSampler,
}

impl FrameSamplers {
    pub fn new(gfx: &Gfx) -> RenderResult<Self> {
        Ok(Self {
            attachment: GfxSampler::new(gfx, Rc::new(GfxSamplerCreateInfo::new_attachment()), "attachment-sampler")?,
            shadow: GfxSampler::new(gfx, Rc::new(GfxSamplerCreateInfo::new_shadow_map()), "shadow-sampler")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_rebind_table_covers_every_sampled_target() {
        let table = DescriptorRebindTable::new_default();
        assert!(table.covers_all_targets());
    }

    #[test]
    fn rebind_table_bindings_are_unique_per_set() {
        let table = DescriptorRebindTable::new_default();
        for entry in table.entries() {
            let same = table
                .entries()
                .iter()
                .filter(|other| other.set == entry.set && other.binding == entry.binding)
                .count();
            assert_eq!(same, 1, "duplicate binding {} in {:?}", entry.binding, entry.set);
        }
    }
}
