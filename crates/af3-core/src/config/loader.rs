use crate::error::{CoreError, Result};
use figment::{
    Figment,
    providers::{Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 配置源，按加入顺序合并（后者覆盖前者）
#[derive(Debug, Clone)]
pub enum ConfigSource {
    Defaults,
    File(PathBuf),
}

/// 配置加载选项
#[derive(Debug, Clone)]
pub struct ConfigLoadOptions {
    pub validate: bool,
    pub fail_on_missing_file: bool,
}

impl Default for ConfigLoadOptions {
    fn default() -> Self {
        Self {
            validate: true,
            fail_on_missing_file: false,
        }
    }
}

/// 组件配置 trait
///
/// 各组件的配置实现此 trait 以接入统一的加载与验证。
pub trait ComponentConfig:
    Serialize + for<'de> Deserialize<'de> + Clone + Send + Sync + Default + 'static
{
    /// 业务规则验证
    fn validate_business_rules(&self) -> Result<()> {
        Ok(())
    }

    /// 验证配置完整性
    fn validate(&self) -> Result<()> {
        self.validate_business_rules()
    }
}

/// 统一配置加载器
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
    options: ConfigLoadOptions,
}

impl ConfigLoader {
    /// 创建新的配置加载器
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
            options: ConfigLoadOptions::default(),
        }
    }

    /// 添加配置源
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// 添加多个配置源
    pub fn add_sources(mut self, sources: &[ConfigSource]) -> Self {
        self.sources.extend(sources.iter().cloned());
        self
    }

    /// 设置加载选项
    pub fn with_options(mut self, options: ConfigLoadOptions) -> Self {
        self.options = options;
        self
    }

    /// 加载配置
    pub fn load<T: ComponentConfig>(&self) -> Result<T> {
        let mut figment = Figment::new();

        // 按优先级处理配置源
        for source in &self.sources {
            match source {
                ConfigSource::Defaults => {
                    figment = figment.merge(Serialized::defaults(T::default()));
                }
                ConfigSource::File(path) => {
                    if path.exists() {
                        figment = figment.merge(Toml::file(path));
                    } else if self.options.fail_on_missing_file {
                        return Err(CoreError::Config {
                            message: format!("Config file not found: {}", path.display()),
                        });
                    }
                }
            }
        }

        let config: T = figment.extract().map_err(|e| CoreError::Config {
            message: format!("Failed to extract config: {}", e),
        })?;

        // 验证配置
        if self.options.validate {
            config.validate()?;
        }

        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}
