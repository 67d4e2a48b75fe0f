use std::rc::Rc;

use reon_gfx::resources::texture::GfxTexture2D;

bitflags::bitflags! {
    /// 材质启用的贴图，每个 bit 对应一个 shader 里的 specialization 分支
    ///
    /// 位布局与 shader 中的 MATERIAL_FEATURES 常量一致，不可随意调整
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct MaterialFeatures: u32 {
        const ALBEDO_TEX = 1 << 0;
        const NORMAL_TEX = 1 << 1;
        const METALLIC_ROUGHNESS_TEX = 1 << 2;
        const EMISSIVE_TEX = 1 << 3;
        const OCCLUSION_TEX = 1 << 4;
        const SPECULAR_TEX = 1 << 5;
    }
}

/// 材质参与哪条渲染路径
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderingMode {
    Opaque,
    Transparent,
}

/// alpha 的处理方式
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BlendingMode {
    Opaque,
    /// alpha 低于 cutoff 的 fragment 被丢弃，仍然走 opaque pass
    Mask,
    Blend,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MaterialId(uuid::Uuid);
impl MaterialId {
    #[inline]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}
impl Default for MaterialId {
    fn default() -> Self {
        Self::new()
    }
}

/// 标识一组 shader（vs + fs），相同 ShaderId 的材质共享 pipeline 排列
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ShaderId(uuid::Uuid);
impl ShaderId {
    #[inline]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}
impl Default for ShaderId {
    fn default() -> Self {
        Self::new()
    }
}

/// 推给 shader 的材质标量参数，通过 push constant 传递
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialFlatData {
    pub base_color: [f32; 4],
    pub emissive: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
    pub occlusion_strength: f32,
    pub alpha_cutoff: f32,
    pub feature_flags: u32,
    pub double_sided: u32,
    pub _padding: [u32; 2],
}

pub struct Material {
    pub id: MaterialId,
    pub shader_id: ShaderId,
    pub name: String,

    pub rendering_mode: RenderingMode,
    pub blending_mode: BlendingMode,
    pub double_sided: bool,

    pub base_color: glam::Vec4,
    pub emissive: glam::Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub occlusion_strength: f32,
    pub alpha_cutoff: f32,

    pub albedo_map: Option<Rc<GfxTexture2D>>,
    pub normal_map: Option<Rc<GfxTexture2D>>,
    pub metallic_roughness_map: Option<Rc<GfxTexture2D>>,
    pub emissive_map: Option<Rc<GfxTexture2D>>,
    pub occlusion_map: Option<Rc<GfxTexture2D>>,
    pub specular_map: Option<Rc<GfxTexture2D>>,
}

impl Material {
    /// 白色 opaque 材质，没有任何贴图
    pub fn new(name: impl AsRef<str>, shader_id: ShaderId) -> Self {
        Self {
            id: MaterialId::new(),
            shader_id,
            name: name.as_ref().to_string(),
            rendering_mode: RenderingMode::Opaque,
            blending_mode: BlendingMode::Opaque,
            double_sided: false,
            base_color: glam::Vec4::ONE,
            emissive: glam::Vec4::ZERO,
            metallic: 0.0,
            roughness: 1.0,
            occlusion_strength: 1.0,
            alpha_cutoff: 0.5,
            albedo_map: None,
            normal_map: None,
            metallic_roughness_map: None,
            emissive_map: None,
            occlusion_map: None,
            specular_map: None,
        }
    }

    /// 根据实际存在的贴图得到 feature 位掩码，作为 pipeline 排列的 key
    pub fn feature_flags(&self) -> MaterialFeatures {
        let mut flags = MaterialFeatures::empty();
        flags.set(MaterialFeatures::ALBEDO_TEX, self.albedo_map.is_some());
        flags.set(MaterialFeatures::NORMAL_TEX, self.normal_map.is_some());
        flags.set(MaterialFeatures::METALLIC_ROUGHNESS_TEX, self.metallic_roughness_map.is_some());
        flags.set(MaterialFeatures::EMISSIVE_TEX, self.emissive_map.is_some());
        flags.set(MaterialFeatures::OCCLUSION_TEX, self.occlusion_map.is_some());
        flags.set(MaterialFeatures::SPECULAR_TEX, self.specular_map.is_some());
        flags
    }

    pub fn flat_data(&self, wireframe: bool) -> MaterialFlatData {
        // wireframe 模式下压掉材质颜色，线条不带着色痕迹
        let (base_color, emissive) = if wireframe {
            (glam::vec4(0.0, 0.0, 0.0, 1.0), glam::Vec4::ZERO)
        } else {
            (self.base_color, self.emissive)
        };
        MaterialFlatData {
            base_color: base_color.to_array(),
            emissive: emissive.to_array(),
            metallic: self.metallic,
            roughness: self.roughness,
            occlusion_strength: self.occlusion_strength,
            alpha_cutoff: self.alpha_cutoff,
            feature_flags: self.feature_flags().bits(),
            double_sided: self.double_sided as u32,
            _padding: [0; 2],
        }
    }

    /// Mask 材质走 opaque pass，靠 discard 实现镂空
    #[inline]
    pub fn draws_in_opaque(&self) -> bool {
        matches!(self.rendering_mode, RenderingMode::Opaque) || matches!(self.blending_mode, BlendingMode::Mask)
    }

    #[inline]
    pub fn draws_in_transparent(&self) -> bool {
        matches!(self.rendering_mode, RenderingMode::Transparent) && matches!(self.blending_mode, BlendingMode::Blend)
    }

    /// 半透明物体不投射阴影
    #[inline]
    pub fn casts_shadow(&self) -> bool {
        self.draws_in_opaque()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_flags_follow_present_textures() {
        let mat = Material::new("plain", ShaderId::new());
        assert!(mat.feature_flags().is_empty());
        assert_eq!(mat.flat_data(false).feature_flags, 0);
    }

    #[test]
    fn mask_material_draws_in_opaque_pass() {
        let mut mat = Material::new("foliage", ShaderId::new());
        mat.rendering_mode = RenderingMode::Transparent;
        mat.blending_mode = BlendingMode::Mask;
        assert!(mat.draws_in_opaque());
        assert!(!mat.draws_in_transparent());
        assert!(mat.casts_shadow());
    }

    #[test]
    fn blend_material_skips_shadow_pass() {
        let mut mat = Material::new("glass", ShaderId::new());
        mat.rendering_mode = RenderingMode::Transparent;
        mat.blending_mode = BlendingMode::Blend;
        assert!(!mat.draws_in_opaque());
        assert!(mat.draws_in_transparent());
        assert!(!mat.casts_shadow());
    }

    #[test]
    fn wireframe_flat_data_overrides_colors() {
        let mut mat = Material::new("red", ShaderId::new());
        mat.base_color = glam::vec4(1.0, 0.0, 0.0, 1.0);
        mat.emissive = glam::vec4(0.5, 0.5, 0.0, 1.0);
        let data = mat.flat_data(true);
        assert_eq!(data.base_color, [0.0, 0.0, 0.0, 1.0]);
        assert_eq!(data.emissive, [0.0; 4]);
        // 标量参数不受 wireframe 影响
        assert_eq!(data.alpha_cutoff, 0.5);
    }
}
