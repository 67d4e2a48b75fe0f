//! shader 侧可见的数据布局
//!
//! 所有结构体都是 std140 兼容的 #[repr(C)]，字段顺序和 shader 中保持一致

use crate::frame_settings::DefaultRendererSettings;
use crate::scene::light::LightData;

/// set = 0, binding = 0 的全局 UBO，每帧更新一次
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GlobalRenderData {
    pub view: [[f32; 4]; 4],
    pub proj: [[f32; 4]; 4],
    pub view_proj: [[f32; 4]; 4],
    /// 主方向光的 view * proj，shadow map 采样用
    pub light_view_proj: [[f32; 4]; 4],
    /// xyz = camera 位置，w 未使用
    pub camera_pos: [f32; 4],
    pub light_count: u32,
    pub _padding: [u32; 3],
}

/// set = 0, binding = 1 的光源 storage buffer
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightBufferData {
    pub lights: [LightData; DefaultRendererSettings::MAX_LIGHTS],
}

/// set = 2, binding = 0 的 per-object UBO
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ObjectData {
    pub model: [[f32; 4]; 4],
    /// model 的逆转置，法线变换用
    pub model_inv_transpose: [[f32; 4]; 4],
}

impl ObjectData {
    pub fn from_model(model: glam::Mat4) -> Self {
        Self {
            model: model.to_cols_array_2d(),
            model_inv_transpose: model.inverse().transpose().to_cols_array_2d(),
        }
    }
}

/// shadow pass 的 push constant：光源的 view * proj
#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ShadowPushConstants {
    pub light_view_proj: [[f32; 4]; 4],
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_data_inverse_transpose_undoes_scale() {
        let model = glam::Mat4::from_scale(glam::vec3(2.0, 2.0, 2.0));
        let data = ObjectData::from_model(model);
        let inv_t = glam::Mat4::from_cols_array_2d(&data.model_inv_transpose);
        // 均匀缩放 2 的逆转置是缩放 0.5
        assert!((inv_t.x_axis.x - 0.5).abs() < 1e-6);
    }

    #[test]
    fn global_render_data_has_stable_layout() {
        // UBO 布局要求 16 字节对齐：4 个 mat4 + vec4 + (u32 + padding)
        assert_eq!(size_of::<GlobalRenderData>(), 4 * 64 + 16 + 16);
    }
}
