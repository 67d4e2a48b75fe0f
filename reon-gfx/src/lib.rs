//! REON 的 Vulkan 封装层
//!
//! 提供设备管理、命令缓冲、同步原语、资源（buffer/image/texture）以及
//! 图形管线的高层封装。所有 GPU 对象的创建入口都返回 [`error::RenderResult`]，
//! 区分 device lost / OOM / shader 加载失败等错误类别。

pub mod basic;
pub mod commands;
pub mod descriptors;
pub mod error;
pub mod foundation;
pub mod gfx;
pub mod pipelines;
pub mod resources;
pub mod swapchain;
