use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// 所有组件共享的基础配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommonConfig {
    pub registry: RegistryConfig,
    pub telemetry: TelemetryConfig,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            registry: RegistryConfig::default(),
            telemetry: TelemetryConfig::default(),
        }
    }
}

/// 注册中心连接配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// 客户端实现："http"（真实网络）或 "mock"（进程内，仅测试/演示）
    #[serde(default = "default_registry_mode")]
    pub mode: String,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_sec: u64,
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_sec: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_sec: u64,
    /// 单次轮询最多领取的任务数
    #[serde(default = "default_fetch_batch")]
    pub fetch_batch: usize,
    #[serde(default = "default_results_base_url")]
    pub results_base_url: String,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            mode: default_registry_mode(),
            poll_interval_sec: default_poll_interval(),
            heartbeat_interval_sec: default_heartbeat_interval(),
            request_timeout_sec: default_request_timeout(),
            fetch_batch: default_fetch_batch(),
            results_base_url: default_results_base_url(),
        }
    }
}

/// 遥测配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default)]
    pub log_no_ansi: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            log_no_ansi: false,
            log_file: None,
        }
    }
}

// 默认值函数
fn default_registry_url() -> String {
    constants::DEFAULT_REGISTRY_URL.to_string()
}

fn default_registry_mode() -> String {
    "http".to_string()
}

fn default_poll_interval() -> u64 {
    constants::DEFAULT_POLL_INTERVAL_SECS
}

fn default_heartbeat_interval() -> u64 {
    constants::DEFAULT_HEARTBEAT_INTERVAL_SECS
}

fn default_request_timeout() -> u64 {
    constants::DEFAULT_REQUEST_TIMEOUT_SECS
}

fn default_fetch_batch() -> usize {
    constants::DEFAULT_FETCH_BATCH
}

fn default_results_base_url() -> String {
    constants::DEFAULT_RESULTS_BASE_URL.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "text".to_string()
}

impl CommonConfig {
    /// 验证配置的有效性
    pub fn validate(&self) -> crate::error::Result<()> {
        // 验证注册中心 URL 格式
        if !self.registry.url.starts_with("http://") && !self.registry.url.starts_with("https://")
        {
            return Err(crate::error::CoreError::Config {
                message: format!("Invalid registry URL: {}", self.registry.url),
            });
        }

        // 验证客户端模式
        let valid_modes = ["http", "mock"];
        if !valid_modes.contains(&self.registry.mode.as_str()) {
            return Err(crate::error::CoreError::Config {
                message: format!("Invalid registry mode: {}", self.registry.mode),
            });
        }

        // 轮询 / 心跳节奏不允许为 0（会退化成忙轮询或假死）
        if self.registry.poll_interval_sec == 0 {
            return Err(crate::error::CoreError::Config {
                message: "poll_interval_sec must be greater than 0".to_string(),
            });
        }
        if self.registry.heartbeat_interval_sec == 0 {
            return Err(crate::error::CoreError::Config {
                message: "heartbeat_interval_sec must be greater than 0".to_string(),
            });
        }
        if self.registry.fetch_batch == 0 {
            return Err(crate::error::CoreError::Config {
                message: "fetch_batch must be greater than 0".to_string(),
            });
        }

        // 验证日志级别
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.telemetry.log_level.as_str()) {
            return Err(crate::error::CoreError::Config {
                message: format!("Invalid log level: {}", self.telemetry.log_level),
            });
        }

        // 验证日志格式
        let valid_formats = ["text", "json"];
        if !valid_formats.contains(&self.telemetry.log_format.as_str()) {
            return Err(crate::error::CoreError::Config {
                message: format!("Invalid log format: {}", self.telemetry.log_format),
            });
        }

        Ok(())
    }
}

impl crate::config::loader::ComponentConfig for CommonConfig {
    fn validate_business_rules(&self) -> crate::error::Result<()> {
        self.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_registry_contract() {
        let cfg = CommonConfig::default();
        assert_eq!(cfg.registry.url, "https://chat.nanda-registry.com:6900");
        assert_eq!(cfg.registry.poll_interval_sec, 30);
        assert_eq!(cfg.registry.mode, "http");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_url_scheme() {
        let mut cfg = CommonConfig::default();
        cfg.registry.url = "nats://localhost:4222".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_mode() {
        let mut cfg = CommonConfig::default();
        cfg.registry.mode = "carrier-pigeon".to_string();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_intervals() {
        let mut cfg = CommonConfig::default();
        cfg.registry.poll_interval_sec = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = CommonConfig::default();
        cfg.registry.fetch_batch = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_unknown_log_level() {
        let mut cfg = CommonConfig::default();
        cfg.telemetry.log_level = "verbose".to_string();
        assert!(cfg.validate().is_err());
    }
}
