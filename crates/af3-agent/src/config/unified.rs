use af3_core::config::{CommonConfig, ComponentConfig, ConfigLoadOptions, ConfigSource};
use af3_core::constants;
use af3_core::error::{CoreError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// 配置文件查找顺序，第一个存在的生效
const CONFIG_FILE_CANDIDATES: [&str; 2] = ["node.toml", "config/node.toml"];

/// 统一的节点配置
///
/// 优先级从低到高：内置默认值、TOML 配置文件、环境变量。
/// 环境变量支持两类：`AF3_AGENT_` 前缀的通用覆盖
/// （`AF3_AGENT_REGISTRY__POLL_INTERVAL_SEC=5`，双下划线分隔层级），
/// 以及注册中心约定的两个裸变量 `AGENT_ID` 和 `REGISTRY_URL`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(flatten)]
    pub common: CommonConfig,

    /// 节点身份与并发
    pub agent: AgentSection,

    /// 推理管线配置
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSection {
    pub node_id: String,
    pub max_concurrent_inferences: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSection {
    /// Python 解释器
    pub python_bin: String,
    /// AlphaFold3 入口脚本
    pub script_path: String,
    /// 每个任务的工作目录挂在这个目录下
    pub output_dir: String,
    /// 模型权重目录，缺省时不传给脚本
    pub model_dir: Option<String>,
    /// 单次推理的超时秒数，任务可以自带更短的值
    pub run_timeout_sec: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            common: CommonConfig::default(),
            agent: AgentSection::default(),
            pipeline: PipelineSection::default(),
        }
    }
}

impl Default for AgentSection {
    fn default() -> Self {
        Self {
            node_id: constants::DEFAULT_NODE_ID.to_string(),
            max_concurrent_inferences: constants::DEFAULT_MAX_CONCURRENT_INFERENCES,
        }
    }
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            python_bin: constants::DEFAULT_PYTHON_BIN.to_string(),
            script_path: constants::DEFAULT_PIPELINE_SCRIPT.to_string(),
            output_dir: "runs".to_string(),
            model_dir: None,
            run_timeout_sec: constants::DEFAULT_RUN_TIMEOUT_SECS,
        }
    }
}

impl AgentConfig {
    /// 智能配置加载：默认值 + 可选配置文件 + 环境变量覆盖
    pub fn load_smart() -> Result<Self> {
        let mut sources = vec![ConfigSource::Defaults];
        for candidate in CONFIG_FILE_CANDIDATES {
            let path = std::path::Path::new(candidate);
            if path.exists() {
                sources.push(ConfigSource::File(path.to_path_buf()));
                break;
            }
        }

        // 校验放到环境变量覆盖之后统一做
        let mut cfg: Self = af3_core::config::load_config(
            &sources,
            ConfigLoadOptions {
                validate: false,
                fail_on_missing_file: false,
            },
        )?;

        cfg.apply_env_overrides()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        let mut updates: HashMap<String, String> = std::env::vars()
            .filter(|(k, _)| k.starts_with(constants::ENV_CONFIG_PREFIX))
            .map(|(k, v)| {
                let key = k[constants::ENV_CONFIG_PREFIX.len()..]
                    .to_lowercase()
                    .replace("__", ".");
                (key, v)
            })
            .collect();

        // 注册中心约定的裸变量，优先级最高
        if let Ok(v) = std::env::var(constants::ENV_AGENT_ID) {
            updates.insert("agent.node_id".to_string(), v);
        }
        if let Ok(v) = std::env::var(constants::ENV_REGISTRY_URL) {
            updates.insert("registry.url".to_string(), v);
        }

        if !updates.is_empty() {
            self.apply_kv_updates(&updates)?;
        }
        Ok(())
    }

    /// 从 KV 增量更新
    pub fn apply_kv_updates(&mut self, updates: &HashMap<String, String>) -> Result<()> {
        // 使用 serde_json 进行结构化更新
        let mut current_json = serde_json::to_value(&*self)?;

        for (key, value) in updates {
            let json_value = parse_config_value(value)?;

            // 使用点分隔的路径来设置值
            let path_parts: Vec<&str> = key.split('.').collect();
            set_nested_value(&mut current_json, &path_parts, json_value)?;
        }

        *self = serde_json::from_value(current_json)?;

        // 验证更新后的配置
        self.validate()?;
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.common.registry.poll_interval_sec)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.common.registry.heartbeat_interval_sec)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.pipeline.run_timeout_sec)
    }
}

impl ComponentConfig for AgentConfig {
    fn validate_business_rules(&self) -> Result<()> {
        self.common.validate()?;

        if self.agent.node_id.trim().is_empty() {
            return Err(CoreError::config_error("node_id cannot be empty"));
        }

        if self.agent.max_concurrent_inferences == 0 {
            return Err(CoreError::config_error(
                "max_concurrent_inferences must be greater than 0",
            ));
        }

        if self.pipeline.python_bin.trim().is_empty() {
            return Err(CoreError::config_error(
                "pipeline.python_bin cannot be empty",
            ));
        }

        if self.pipeline.script_path.trim().is_empty() {
            return Err(CoreError::config_error(
                "pipeline.script_path cannot be empty",
            ));
        }

        if self.pipeline.run_timeout_sec == 0 {
            return Err(CoreError::config_error(
                "pipeline.run_timeout_sec must be greater than 0",
            ));
        }

        Ok(())
    }
}

fn parse_config_value(value: &str) -> Result<serde_json::Value> {
    // 尝试解析为 JSON
    if let Ok(json_value) = serde_json::from_str(value) {
        return Ok(json_value);
    }

    // 尝试解析为布尔值
    if let Ok(bool_value) = value.parse::<bool>() {
        return Ok(serde_json::Value::Bool(bool_value));
    }

    // 尝试解析为数字
    if let Ok(num_value) = value.parse::<i64>() {
        return Ok(serde_json::Value::Number(num_value.into()));
    }

    if let Ok(num_value) = value.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(num_value) {
            return Ok(serde_json::Value::Number(number));
        }
    }

    // 默认为字符串
    Ok(serde_json::Value::String(value.to_string()))
}

fn set_nested_value(
    json: &mut serde_json::Value,
    path_parts: &[&str],
    value: serde_json::Value,
) -> Result<()> {
    if path_parts.is_empty() {
        return Err(CoreError::config_error("Empty path not allowed"));
    }

    let mut current = json;

    for (i, part) in path_parts.iter().enumerate() {
        if i == path_parts.len() - 1 {
            // 最后一个部分，设置值
            if let serde_json::Value::Object(obj) = current {
                obj.insert(part.to_string(), value);
                break;
            } else {
                return Err(CoreError::config_error(format!(
                    "Cannot set value at path: {}",
                    path_parts.join(".")
                )));
            }
        } else {
            // 中间部分，确保对象存在
            if let serde_json::Value::Object(obj) = current {
                if !obj.contains_key(*part) {
                    obj.insert(
                        part.to_string(),
                        serde_json::Value::Object(serde_json::Map::new()),
                    );
                }
                current = obj.get_mut(*part).ok_or_else(|| {
                    CoreError::config_error(format!("Invalid path: {}", path_parts.join(".")))
                })?;
            } else {
                return Err(CoreError::config_error(format!(
                    "Invalid path: {}",
                    path_parts.join(".")
                )));
            }
        }
    }

    Ok(())
}
