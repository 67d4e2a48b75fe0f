/// debug label 使用的颜色
pub struct LabelColor;

impl LabelColor {
    pub const COLOR_PASS: glam::Vec4 = glam::vec4(1.0, 0.78, 0.05, 1.0);
    pub const COLOR_CMD: glam::Vec4 = glam::vec4(0.18, 0.55, 0.92, 1.0);
    pub const COLOR_STAGE: glam::Vec4 = glam::vec4(0.45, 0.84, 0.44, 1.0);
}
