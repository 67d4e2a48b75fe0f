use ash::vk;
use std::fmt::Display;
use std::ops::Deref;
use std::path::PathBuf;

pub struct DefaultRendererSettings;
impl DefaultRendererSettings {
    pub const DEFAULT_SURFACE_FORMAT: vk::SurfaceFormatKHR = vk::SurfaceFormatKHR {
        format: vk::Format::B8G8R8A8_UNORM,
        color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
    };
    pub const DEFAULT_PRESENT_MODE: vk::PresentModeKHR = vk::PresentModeKHR::MAILBOX;

    /// 离屏 color attachment 的 format
    pub const COLOR_FORMAT: vk::Format = vk::Format::R8G8B8A8_UNORM;

    /// weighted-blended OIT 的 accumulation attachment
    pub const OIT_ACCUM_FORMAT: vk::Format = vk::Format::R16G16B16A16_SFLOAT;
    /// weighted-blended OIT 的 revealage attachment
    pub const OIT_REVEAL_FORMAT: vk::Format = vk::Format::R16_SFLOAT;

    pub const DEPTH_FORMAT_CANDIDATES: &'static [vk::Format] = &[
        vk::Format::D32_SFLOAT,
        vk::Format::D32_SFLOAT_S8_UINT,
        vk::Format::D24_UNORM_S8_UINT,
    ];

    /// shadow map 的分辨率固定，不随窗口尺寸变化
    pub const SHADOW_MAP_RESOLUTION: u32 = 2048;
    pub const SHADOW_MAP_FORMAT: vk::Format = vk::Format::D32_SFLOAT;

    pub const MSAA_SAMPLES: vk::SampleCountFlags = vk::SampleCountFlags::TYPE_4;

    /// 单帧可以上传的最大光源数量，超出的部分被丢弃
    pub const MAX_LIGHTS: usize = 16;
}

/// 同时在录制/执行中的帧的数量
pub const FRAMES_IN_FLIGHT: usize = 3;

/// 渲染器的初始配置
pub struct RendererConfig {
    pub app_name: String,
    /// 编译好的 spv shader 所在目录
    pub shader_dir: PathBuf,
}

#[derive(Copy, Clone, Default)]
pub struct FrameSettings {
    pub color_format: vk::Format,
    pub depth_format: vk::Format,
    pub frame_extent: vk::Extent2D,
    pub msaa_samples: vk::SampleCountFlags,
}

/// 渲染模式
///
/// Unlit 和 Wireframe 会用 unlit pass 替代正常的 shadow/opaque/transparent 流程
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RenderMode {
    Lit,
    Unlit,
    Wireframe,
}

/// 标识 frame in flight 的序号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLabel {
    A,
    B,
    C,
}
impl Deref for FrameLabel {
    type Target = usize;
    #[inline]
    fn deref(&self) -> &Self::Target {
        match self {
            Self::A => &Self::INDEX[0],
            Self::B => &Self::INDEX[1],
            Self::C => &Self::INDEX[2],
        }
    }
}
impl Display for FrameLabel {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::B => write!(f, "B"),
            Self::C => write!(f, "C"),
        }
    }
}
impl FrameLabel {
    const INDEX: [usize; 3] = [0, 1, 2];

    #[inline]
    pub fn from_usize(idx: usize) -> Self {
        match idx {
            0 => Self::A,
            1 => Self::B,
            2 => Self::C,
            _ => panic!("Invalid frame index: {idx}"),
        }
    }

    #[inline]
    pub fn next(self) -> Self {
        Self::from_usize((*self + 1) % FRAMES_IN_FLIGHT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_label_cycles_through_frames_in_flight() {
        let mut label = FrameLabel::A;
        label = label.next();
        assert_eq!(*label, 1);
        label = label.next();
        assert_eq!(*label, 2);
        label = label.next();
        assert_eq!(*label, 0);
    }

    #[test]
    fn frame_label_display_matches_index() {
        assert_eq!(FrameLabel::from_usize(1).to_string(), "B");
        assert_eq!(*FrameLabel::C, 2);
    }
}
