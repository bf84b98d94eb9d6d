//! 统一配置管理模块
//!
//! 提供分层的配置加载与验证：默认值 → 可选 TOML 文件 → 环境变量覆盖
//! （环境变量覆盖由组件侧应用，见 af3-agent 的 `AgentConfig::load_smart`）。

pub mod common;
pub mod loader;

// 重导出主要类型
pub use common::{CommonConfig, RegistryConfig, TelemetryConfig};
pub use loader::{ComponentConfig, ConfigLoadOptions, ConfigLoader, ConfigSource};

// 便捷的配置加载函数
pub fn load_config<T: ComponentConfig>(
    sources: &[ConfigSource],
    options: ConfigLoadOptions,
) -> crate::error::Result<T> {
    ConfigLoader::new()
        .with_options(options)
        .add_sources(sources)
        .load()
}
