//! REON 渲染子系统
//!
//! 负责一帧的编排：场景数据上传、shadow/opaque/transparent/composite 各个 pass
//! 的命令录制与提交、swapchain 呈现，以及 mesh/material/attachment 等 GPU 资源的
//! 生命周期管理。
//!
//! 入口是 [`orchestrator::frame_orchestrator::FrameOrchestrator`]。

pub mod frame_settings;
pub mod gpu_data;
pub mod orchestrator;
pub mod pass;
pub mod resource;
pub mod scene;
