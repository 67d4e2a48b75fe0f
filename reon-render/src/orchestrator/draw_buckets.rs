//! 每帧把 renderer 的 submesh 分拣到各个 pass 的桶里
//!
//! opaque/transparent 按 shader -> material 两级分组，减少 pipeline 和
//! descriptor set 的绑定切换；shadow 不关心材质，只有一个平铺的列表。

use indexmap::IndexMap;

use crate::resource::material::{Material, MaterialId, ShaderId};
use crate::resource::mesh::SubMesh;
use crate::scene::renderer_registry::RendererId;

/// 一次 indexed draw 需要的全部信息
#[derive(Copy, Clone, Debug)]
pub struct DrawCommand {
    pub renderer: RendererId,
    pub material_slot: usize,
    pub index_offset: u32,
    pub index_count: u32,
    /// 材质的 feature 位掩码，选择 pipeline 排列用
    pub feature_flags: u32,
}

/// 分拣的输入：registry 中一个 renderer 的一个 submesh
pub struct SubmeshDraw<'a> {
    pub renderer: RendererId,
    pub submesh: SubMesh,
    pub material: &'a Material,
    pub cast_shadows: bool,
}

/// shader -> material -> draw 的两级分组，IndexMap 保证录制顺序稳定
pub type MaterialBuckets = IndexMap<ShaderId, IndexMap<MaterialId, Vec<DrawCommand>>>;

#[derive(Default)]
pub struct DrawBuckets {
    pub opaque: MaterialBuckets,
    pub transparent: MaterialBuckets,
    pub shadow: Vec<DrawCommand>,
}

impl DrawBuckets {
    pub fn collect<'a>(items: impl IntoIterator<Item = SubmeshDraw<'a>>) -> Self {
        let mut buckets = Self::default();
        for item in items {
            let cmd = DrawCommand {
                renderer: item.renderer,
                material_slot: item.submesh.material_slot,
                index_offset: item.submesh.index_offset,
                index_count: item.submesh.index_count,
                feature_flags: item.material.feature_flags().bits(),
            };

            if item.material.draws_in_opaque() {
                Self::push(&mut buckets.opaque, item.material, cmd);
            }
            if item.material.draws_in_transparent() {
                Self::push(&mut buckets.transparent, item.material, cmd);
            }
            if item.cast_shadows && item.material.casts_shadow() {
                buckets.shadow.push(cmd);
            }
        }
        buckets
    }

    fn push(buckets: &mut MaterialBuckets, material: &Material, cmd: DrawCommand) {
        buckets
            .entry(material.shader_id)
            .or_default()
            .entry(material.id)
            .or_default()
            .push(cmd);
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty() && self.shadow.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::material::{BlendingMode, RenderingMode};
    use slotmap::SlotMap;

    fn make_id() -> RendererId {
        let mut arena: SlotMap<RendererId, ()> = SlotMap::with_key();
        arena.insert(())
    }

    fn submesh(slot: usize) -> SubMesh {
        SubMesh {
            index_offset: 0,
            index_count: 36,
            material_slot: slot,
        }
    }

    #[test]
    fn opaque_material_lands_in_opaque_and_shadow() {
        let material = Material::new("opaque", ShaderId::new());
        let buckets = DrawBuckets::collect([SubmeshDraw {
            renderer: make_id(),
            submesh: submesh(0),
            material: &material,
            cast_shadows: true,
        }]);
        assert_eq!(buckets.opaque.len(), 1);
        assert!(buckets.transparent.is_empty());
        assert_eq!(buckets.shadow.len(), 1);
    }

    #[test]
    fn mask_material_goes_to_opaque_not_transparent() {
        let mut material = Material::new("foliage", ShaderId::new());
        material.rendering_mode = RenderingMode::Transparent;
        material.blending_mode = BlendingMode::Mask;
        let buckets = DrawBuckets::collect([SubmeshDraw {
            renderer: make_id(),
            submesh: submesh(0),
            material: &material,
            cast_shadows: true,
        }]);
        assert_eq!(buckets.opaque.len(), 1);
        assert!(buckets.transparent.is_empty());
        assert_eq!(buckets.shadow.len(), 1);
    }

    #[test]
    fn blend_material_is_excluded_from_shadow() {
        let mut material = Material::new("glass", ShaderId::new());
        material.rendering_mode = RenderingMode::Transparent;
        material.blending_mode = BlendingMode::Blend;
        let buckets = DrawBuckets::collect([SubmeshDraw {
            renderer: make_id(),
            submesh: submesh(0),
            material: &material,
            cast_shadows: true,
        }]);
        assert!(buckets.opaque.is_empty());
        assert_eq!(buckets.transparent.len(), 1);
        assert!(buckets.shadow.is_empty());
    }

    #[test]
    fn renderer_opt_out_skips_shadow_even_for_opaque() {
        let material = Material::new("no-shadow", ShaderId::new());
        let buckets = DrawBuckets::collect([SubmeshDraw {
            renderer: make_id(),
            submesh: submesh(0),
            material: &material,
            cast_shadows: false,
        }]);
        assert_eq!(buckets.opaque.len(), 1);
        assert!(buckets.shadow.is_empty());
    }

    #[test]
    fn empty_scene_yields_empty_buckets() {
        let items: [SubmeshDraw; 0] = [];
        let buckets = DrawBuckets::collect(items);
        assert!(buckets.is_empty());
        assert!(buckets.opaque.is_empty());
        assert!(buckets.transparent.is_empty());
        assert!(buckets.shadow.is_empty());
    }

    #[test]
    fn shadow_list_keeps_cube_and_excludes_blend_quad() {
        // 同一个场景里：不透明 cube 进 shadow，Blend 材质的 quad 不进
        let cube_material = Material::new("cube", ShaderId::new());
        let mut quad_material = Material::new("glass-quad", ShaderId::new());
        quad_material.rendering_mode = RenderingMode::Transparent;
        quad_material.blending_mode = BlendingMode::Blend;

        let cube = make_id();
        let quad = make_id();
        let buckets = DrawBuckets::collect([
            SubmeshDraw { renderer: cube, submesh: submesh(0), material: &cube_material, cast_shadows: true },
            SubmeshDraw { renderer: quad, submesh: submesh(0), material: &quad_material, cast_shadows: true },
        ]);

        assert_eq!(buckets.shadow.len(), 1);
        assert_eq!(buckets.shadow[0].renderer, cube);
        assert_eq!(buckets.opaque.len(), 1);
        assert_eq!(buckets.transparent.len(), 1);
        assert_eq!(buckets.transparent[&quad_material.shader_id][&quad_material.id][0].renderer, quad);
    }

    #[test]
    fn draws_group_by_shader_then_material() {
        let shader = ShaderId::new();
        let mat_a = Material::new("a", shader);
        let mat_b = Material::new("b", shader);
        let mat_other = Material::new("c", ShaderId::new());

        let renderer = make_id();
        let buckets = DrawBuckets::collect([
            SubmeshDraw { renderer, submesh: submesh(0), material: &mat_a, cast_shadows: true },
            SubmeshDraw { renderer, submesh: submesh(1), material: &mat_b, cast_shadows: true },
            SubmeshDraw { renderer, submesh: submesh(2), material: &mat_a, cast_shadows: true },
            SubmeshDraw { renderer, submesh: submesh(3), material: &mat_other, cast_shadows: true },
        ]);

        assert_eq!(buckets.opaque.len(), 2);
        let same_shader = &buckets.opaque[&shader];
        assert_eq!(same_shader.len(), 2);
        assert_eq!(same_shader[&mat_a.id].len(), 2);
        assert_eq!(same_shader[&mat_b.id].len(), 1);
        // 插入顺序保持稳定
        assert_eq!(buckets.opaque.get_index(0).unwrap().0, &shader);
    }
}
