//! AlphaFold3 推理节点
//!
//! 在 NANDA 注册中心注册自己，轮询分派的折叠任务，
//! 调用本机的 AlphaFold3 管线执行，并把结果上报回去。

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// 错误类型统一从 af3-core 导出
pub use af3_core::error;
pub use af3_core::error::{CoreError, Result};
