use std::rc::Rc;

use reon_gfx::error::RenderResult;
use reon_gfx::gfx::Gfx;
use reon_gfx::resources::buffer::{GfxIndexBuffer, GfxVertexBuffer};

use crate::resource::vertex::Vertex3D;

/// mesh 中的一段连续索引，对应一个 material slot
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct SubMesh {
    pub index_offset: u32,
    pub index_count: u32,
    /// renderer 的 materials 数组中的下标
    pub material_slot: usize,
}

/// 顶点与索引数据都在 device local 内存上，上传后不可修改
pub struct Mesh {
    pub vertex_buffer: GfxVertexBuffer<Vertex3D>,
    pub index_buffer: GfxIndexBuffer,
    pub submeshes: Vec<SubMesh>,

    name: String,
}

impl Mesh {
    pub fn new(
        gfx: &Gfx,
        vertices: &[Vertex3D],
        indices: &[u32],
        submeshes: Vec<SubMesh>,
        name: impl AsRef<str>,
    ) -> RenderResult<Rc<Self>> {
        let vertex_buffer = GfxVertexBuffer::new(gfx, vertices, format!("{}-vertex", name.as_ref()))?;
        let index_buffer = GfxIndexBuffer::new(gfx, indices, format!("{}-index", name.as_ref()))?;

        Ok(Rc::new(Self {
            vertex_buffer,
            index_buffer,
            submeshes,
            name: name.as_ref().to_string(),
        }))
    }

    /// 整个 index buffer 作为单个 submesh，material slot 为 0
    pub fn new_single_submesh(
        gfx: &Gfx,
        vertices: &[Vertex3D],
        indices: &[u32],
        name: impl AsRef<str>,
    ) -> RenderResult<Rc<Self>> {
        let submeshes = vec![SubMesh {
            index_offset: 0,
            index_count: indices.len() as u32,
            material_slot: 0,
        }];
        Self::new(gfx, vertices, indices, submeshes, name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }
}
