use glam::{Mat4, Vec3, Vec4};
use itertools::Itertools;

use crate::frame_settings::DefaultRendererSettings;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum LightKind {
    Directional,
    Point,
    Spot,
}

#[derive(Copy, Clone, Debug)]
pub struct Light {
    pub kind: LightKind,
    pub position: Vec3,
    /// directional/spot 的照射方向，point light 忽略
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    /// point/spot 的衰减半径
    pub range: f32,
    /// spot 的外锥角（度），其他类型忽略
    pub spot_angle_deg: f32,
}

impl Light {
    pub fn directional(direction: Vec3, color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            position: Vec3::ZERO,
            direction: direction.normalize(),
            color,
            intensity,
            range: f32::MAX,
            spot_angle_deg: 0.0,
        }
    }

    pub fn point(position: Vec3, color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            kind: LightKind::Point,
            position,
            direction: Vec3::NEG_Y,
            color,
            intensity,
            range,
            spot_angle_deg: 0.0,
        }
    }

    pub fn spot(
        position: Vec3,
        direction: Vec3,
        color: Vec3,
        intensity: f32,
        range: f32,
        spot_angle_deg: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot,
            position,
            direction: direction.normalize(),
            color,
            intensity,
            range,
            spot_angle_deg,
        }
    }
}

/// 光源在 storage buffer 中的布局
///
/// kind 打包在 position 的 w 分量里：0 = directional, 1 = point, 2 = spot
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightData {
    pub position_and_kind: [f32; 4],
    pub direction_and_range: [f32; 4],
    pub color_and_intensity: [f32; 4],
    /// x = 外锥角一半的余弦，y = 内锥角一半的余弦，spot 以外的类型为 0
    pub spot_cone: [f32; 4],
}

impl LightData {
    /// 内锥取外锥的 80%，两者之间平滑过渡
    const SPOT_INNER_RATIO: f32 = 0.8;

    fn from_light(light: &Light) -> Self {
        let kind = match light.kind {
            LightKind::Directional => 0.0,
            LightKind::Point => 1.0,
            LightKind::Spot => 2.0,
        };
        let spot_cone = if light.kind == LightKind::Spot {
            let outer_half = (light.spot_angle_deg * 0.5).to_radians();
            [outer_half.cos(), (outer_half * Self::SPOT_INNER_RATIO).cos(), 0.0, 0.0]
        } else {
            [0.0; 4]
        };
        Self {
            position_and_kind: Vec4::from((light.position, kind)).to_array(),
            direction_and_range: Vec4::from((light.direction, light.range)).to_array(),
            color_and_intensity: Vec4::from((light.color, light.intensity)).to_array(),
            spot_cone,
        }
    }
}

/// 打包一帧的光源数据，超出 MAX_LIGHTS 的部分被丢弃并告警
pub fn pack_lights(lights: &[Light]) -> Vec<LightData> {
    if lights.len() > DefaultRendererSettings::MAX_LIGHTS {
        log::warn!(
            "{} lights submitted, only the first {} are uploaded",
            lights.len(),
            DefaultRendererSettings::MAX_LIGHTS
        );
    }
    lights
        .iter()
        .take(DefaultRendererSettings::MAX_LIGHTS)
        .map(LightData::from_light)
        .collect_vec()
}

/// 场景中第一个 directional light 作为 shadow caster
pub fn find_shadow_caster(lights: &[Light]) -> Option<&Light> {
    lights.iter().find(|light| light.kind == LightKind::Directional)
}

/// 方向光的正交投影 view * proj，覆盖以场景中心为基准的固定范围
pub fn directional_light_view_proj(light: &Light, scene_center: Vec3, scene_radius: f32) -> Mat4 {
    let eye = scene_center - light.direction * scene_radius * 2.0;
    let up = if light.direction.cross(Vec3::Y).length_squared() < 1e-6 { Vec3::Z } else { Vec3::Y };
    let view = Mat4::look_at_rh(eye, scene_center, up);
    let proj = Mat4::orthographic_rh(
        -scene_radius,
        scene_radius,
        -scene_radius,
        scene_radius,
        0.1,
        scene_radius * 4.0,
    );
    proj * view
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_lights_clamps_to_max() {
        // 超限会触发 warn，初始化日志便于观察
        reon_crate_tools::init_log::init_log();
        let lights = (0..20)
            .map(|i| Light::point(Vec3::splat(i as f32), Vec3::ONE, 1.0, 10.0))
            .collect_vec();
        let packed = pack_lights(&lights);
        assert_eq!(packed.len(), DefaultRendererSettings::MAX_LIGHTS);
        // 保留的是前 16 个
        assert_eq!(packed[0].position_and_kind[0], 0.0);
        assert_eq!(packed[15].position_and_kind[0], 15.0);
    }

    #[test]
    fn pack_lights_encodes_kind_in_position_w() {
        let lights = [
            Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0),
            Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0),
        ];
        let packed = pack_lights(&lights);
        assert_eq!(packed[0].position_and_kind[3], 0.0);
        assert_eq!(packed[1].position_and_kind[3], 1.0);
    }

    #[test]
    fn spot_light_packs_cone_cosines() {
        let lights = [
            Light::spot(Vec3::new(0.0, 3.0, 0.0), Vec3::NEG_Y, Vec3::ONE, 5.0, 12.0, 60.0),
            Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0),
        ];
        let packed = pack_lights(&lights);

        assert_eq!(packed[0].position_and_kind[3], 2.0);
        let outer_half = 30.0f32.to_radians();
        assert!((packed[0].spot_cone[0] - outer_half.cos()).abs() < 1e-6);
        assert!(
            (packed[0].spot_cone[1] - (outer_half * LightData::SPOT_INNER_RATIO).cos()).abs()
                < 1e-6
        );
        // 内锥余弦更大，smoothstep 的边界顺序才成立
        assert!(packed[0].spot_cone[1] > packed[0].spot_cone[0]);
        // 非 spot 光源不携带锥角
        assert_eq!(packed[1].spot_cone, [0.0; 4]);
    }

    #[test]
    fn shadow_caster_is_first_directional_light() {
        let lights = [
            Light::point(Vec3::ZERO, Vec3::ONE, 1.0, 5.0),
            Light::directional(Vec3::new(0.3, -1.0, 0.2), Vec3::ONE, 2.0),
        ];
        let caster = find_shadow_caster(&lights).unwrap();
        assert_eq!(caster.kind, LightKind::Directional);
        assert!(find_shadow_caster(&lights[..1]).is_none());
    }

    #[test]
    fn light_view_proj_centers_the_scene() {
        let light = Light::directional(Vec3::NEG_Y, Vec3::ONE, 1.0);
        let view_proj = directional_light_view_proj(&light, Vec3::ZERO, 10.0);
        let center_ndc = view_proj.project_point3(Vec3::ZERO);
        assert!(center_ndc.x.abs() < 1e-5);
        assert!(center_ndc.y.abs() < 1e-5);
        assert!(center_ndc.z > 0.0 && center_ndc.z < 1.0);
    }
}
