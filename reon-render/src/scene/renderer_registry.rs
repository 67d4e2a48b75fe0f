use std::rc::Rc;

use slotmap::SlotMap;

use crate::resource::material::Material;
use crate::resource::mesh::Mesh;

slotmap::new_key_type! {
    /// renderer 的 generational 句柄，remove 之后旧 id 自动失效
    pub struct RendererId;
}

/// 场景中一个可绘制的物体：mesh + 每个 submesh 对应的材质
pub struct MeshRenderer {
    pub mesh: Rc<Mesh>,
    /// 由 submesh 的 material_slot 索引
    pub materials: Vec<Rc<Material>>,
    pub model_matrix: glam::Mat4,
    pub cast_shadows: bool,
}

/// renderer 的存储，遍历顺序稳定
#[derive(Default)]
pub struct RendererRegistry {
    renderers: SlotMap<RendererId, MeshRenderer>,
}

impl RendererRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, renderer: MeshRenderer) -> RendererId {
        self.renderers.insert(renderer)
    }

    /// 返回被移除的 renderer，id 不存在（或已 stale）时返回 None
    pub fn remove(&mut self, id: RendererId) -> Option<MeshRenderer> {
        self.renderers.remove(id)
    }

    #[inline]
    pub fn get(&self, id: RendererId) -> Option<&MeshRenderer> {
        self.renderers.get(id)
    }

    #[inline]
    pub fn get_mut(&mut self, id: RendererId) -> Option<&mut MeshRenderer> {
        self.renderers.get_mut(id)
    }

    #[inline]
    pub fn contains(&self, id: RendererId) -> bool {
        self.renderers.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RendererId, &MeshRenderer)> {
        self.renderers.iter()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.renderers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.renderers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_id_does_not_resolve_after_remove() {
        let mut registry: SlotMap<RendererId, u32> = SlotMap::with_key();
        let id = registry.insert(7);
        registry.remove(id);
        let reused = registry.insert(8);
        // 旧 id 即使 slot 被复用也不会命中新数据
        assert!(registry.get(id).is_none());
        assert_ne!(id, reused);
        assert_eq!(registry.get(reused), Some(&8));
    }

    #[test]
    fn double_remove_is_a_noop() {
        let mut registry: SlotMap<RendererId, u32> = SlotMap::with_key();
        let id = registry.insert(1);
        assert!(registry.remove(id).is_some());
        assert!(registry.remove(id).is_none());
    }
}
