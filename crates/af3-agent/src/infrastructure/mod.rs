//! 基础设施层：注册中心客户端与推理管线的具体实现

pub mod http;
pub mod memory;
pub mod pipeline;

use crate::application::ports::RegistryPort;
use crate::config::AgentConfig;
use af3_core::error::{CoreError, Result};
use std::sync::Arc;
use tracing::info;

/// 按配置选择注册中心实现
///
/// `mode = "http"` 走真实网络，`mode = "mock"` 用进程内实现，
/// 方便在没有注册中心的环境里冒烟验证。未知取值在配置校验
/// 阶段就会被拒绝，这里兜底再报一次。
pub fn build_registry(cfg: &AgentConfig) -> Result<Arc<dyn RegistryPort>> {
    match cfg.common.registry.mode.as_str() {
        "http" => {
            let client = http::HttpRegistryClient::new(&cfg.common.registry)?;
            Ok(Arc::new(client))
        }
        "mock" => {
            info!("Using in-memory registry (mock mode)");
            Ok(Arc::new(memory::MemoryRegistry::new()))
        }
        other => Err(CoreError::config_error(format!(
            "Unknown registry mode: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_registry_honors_mode() {
        let mut cfg = AgentConfig::default();
        cfg.common.registry.mode = "mock".to_string();
        assert!(build_registry(&cfg).is_ok());

        cfg.common.registry.mode = "http".to_string();
        assert!(build_registry(&cfg).is_ok());

        cfg.common.registry.mode = "carrier-pigeon".to_string();
        assert!(build_registry(&cfg).is_err());
    }
}
