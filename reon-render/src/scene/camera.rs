use glam::{Mat4, Vec3};

/// 右手系 camera，view 矩阵由 position/euler 导出
pub struct Camera {
    pub position: Vec3,

    pub euler_yaw_deg: f32,
    pub euler_pitch_deg: f32,

    pub fov_deg_vertical: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 4.0),
            euler_yaw_deg: 0.0,
            euler_pitch_deg: 0.0,
            fov_deg_vertical: 60.0,
            aspect_ratio: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

impl Camera {
    pub fn view_matrix(&self) -> Mat4 {
        let rotation = Mat4::from_rotation_y(self.euler_yaw_deg.to_radians())
            * Mat4::from_rotation_x(self.euler_pitch_deg.to_radians());
        let translation = Mat4::from_translation(self.position);
        (translation * rotation).inverse()
    }

    /// Vulkan 的 NDC y 轴朝下，通过 viewport 翻转修正，这里的投影矩阵保持 GL 习惯
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_deg_vertical.to_radians(), self.aspect_ratio, self.near, self.far)
    }

    pub fn forward(&self) -> Vec3 {
        let rotation = Mat4::from_rotation_y(self.euler_yaw_deg.to_radians())
            * Mat4::from_rotation_x(self.euler_pitch_deg.to_radians());
        rotation.transform_vector3(Vec3::NEG_Z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_camera_looks_down_negative_z() {
        let camera = Camera::default();
        let forward = camera.forward();
        assert!((forward - Vec3::NEG_Z).length() < 1e-6);
    }

    #[test]
    fn view_matrix_moves_world_opposite_to_camera() {
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, 4.0),
            ..Default::default()
        };
        let origin_in_view = camera.view_matrix().transform_point3(Vec3::ZERO);
        assert!((origin_in_view.z + 4.0).abs() < 1e-6);
    }
}
