use ash::vk;

pub type RenderResult<T> = Result<T, RenderError>;

/// 渲染子系统的错误类型
///
/// 原则：资源创建、管线编译、命令提交中的 vulkan 错误都通过该类型向外传播，
/// 调用方（测试、工具）可以区分 device lost、OOM、shader 编译失败等情况。
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("gpu device lost")]
    DeviceLost,

    #[error("out of device/host memory")]
    OutOfMemory,

    #[error("vulkan error: {0}")]
    Vulkan(vk::Result),

    #[error("failed to load vulkan library: {0}")]
    Loading(#[from] ash::LoadingError),

    #[error("failed to load shader {path}: {source}")]
    ShaderLoad {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("pipeline compile failed: {0}")]
    PipelineCompile(vk::Result),

    #[error("no pipeline cached for feature flags {0:#010x}")]
    MissingPipeline(u32),

    #[error("missing required extension: {0}")]
    MissingExtension(String),

    #[error("unsupported: {0}")]
    Unsupported(&'static str),
}

impl From<vk::Result> for RenderError {
    fn from(value: vk::Result) -> Self {
        match value {
            vk::Result::ERROR_DEVICE_LOST => Self::DeviceLost,
            vk::Result::ERROR_OUT_OF_DEVICE_MEMORY | vk::Result::ERROR_OUT_OF_HOST_MEMORY => Self::OutOfMemory,
            other => Self::Vulkan(other),
        }
    }
}
