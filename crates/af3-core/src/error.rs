//! 统一错误处理系统

use crate::types::TaskId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 核心错误类型 - 统一的错误处理
#[derive(Error, Debug, Clone, Serialize, Deserialize)]
pub enum CoreError {
    // === 序列化错误 ===
    #[error("Serialization failed: {message}")]
    Serialization { message: String },

    // === 任务相关错误 ===
    #[error("Invalid task: {reason}")]
    InvalidTask { reason: String },

    #[error("Inference failed: {task_id} - {reason}")]
    InferenceFailed {
        task_id: TaskId,
        reason: String,
        retry_count: u32,
    },

    #[error("Task timeout: {task_id}")]
    TaskTimeout { task_id: TaskId },

    #[error("Task cancelled: {task_id}")]
    TaskCancelled { task_id: TaskId },

    // === 注册中心与网络错误 ===
    #[error("Registry error: {message}")]
    Registry { message: String },

    #[error("Connection failed: {endpoint}")]
    Connection { endpoint: String },

    // === 推理管线错误 ===
    #[error("Pipeline error: {message}")]
    Pipeline { message: String },

    // === 配置错误 ===
    #[error("Config error: {message}")]
    Config { message: String },

    // === 系统错误 ===
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Service unavailable: {service}")]
    ServiceUnavailable { service: String },
}

impl CoreError {
    /// 判断错误是否可重试
    ///
    /// 注册中心 / 连接 / 服务不可用属于瞬时错误；推理失败在重试
    /// 次数内可重试；其余一律视为终态。
    pub fn is_retriable(&self) -> bool {
        match self {
            CoreError::Registry { .. }
            | CoreError::Connection { .. }
            | CoreError::ServiceUnavailable { .. } => true,
            CoreError::InferenceFailed { retry_count, .. } => *retry_count < 3,
            _ => false,
        }
    }

    /// 创建任务无效错误
    pub fn invalid_task(reason: impl Into<String>) -> Self {
        CoreError::InvalidTask {
            reason: reason.into(),
        }
    }

    /// 创建推理失败错误
    pub fn inference_failed(
        task_id: impl Into<TaskId>,
        reason: impl Into<String>,
        retry_count: u32,
    ) -> Self {
        CoreError::InferenceFailed {
            task_id: task_id.into(),
            reason: reason.into(),
            retry_count,
        }
    }

    /// 创建任务超时错误
    pub fn task_timeout(task_id: impl Into<TaskId>) -> Self {
        CoreError::TaskTimeout {
            task_id: task_id.into(),
        }
    }

    /// 创建任务取消错误
    pub fn task_cancelled(task_id: impl Into<TaskId>) -> Self {
        CoreError::TaskCancelled {
            task_id: task_id.into(),
        }
    }

    /// 创建注册中心错误
    pub fn registry_error(message: impl Into<String>) -> Self {
        CoreError::Registry {
            message: message.into(),
        }
    }

    /// 创建连接错误（带上下文）
    pub fn connection_error(endpoint: impl Into<String>) -> Self {
        CoreError::Connection {
            endpoint: endpoint.into(),
        }
    }

    /// 创建管线错误
    pub fn pipeline_error(message: impl Into<String>) -> Self {
        CoreError::Pipeline {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }

    /// 创建内部错误
    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }

    /// 创建服务不可用错误
    pub fn service_unavailable(service: impl Into<String>) -> Self {
        CoreError::ServiceUnavailable {
            service: service.into(),
        }
    }
}

/// Core 操作的 Result 类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<std::io::Error> for CoreError {
    fn from(err: std::io::Error) -> Self {
        let message = err.to_string();
        match err.kind() {
            std::io::ErrorKind::TimedOut | std::io::ErrorKind::ConnectionRefused => {
                CoreError::Connection {
                    endpoint: "unknown".to_string(),
                }
            }
            _ => CoreError::Internal { message },
        }
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization {
            message: err.to_string(),
        }
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(err: reqwest::Error) -> Self {
        // 连接 / 超时归为可重试的 Connection，其余按注册中心错误处理
        if err.is_connect() || err.is_timeout() {
            CoreError::Connection {
                endpoint: err
                    .url()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
            }
        } else {
            CoreError::Registry {
                message: err.to_string(),
            }
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod retriability {
        use super::*;

        #[test]
        fn test_transient_errors_are_retriable() {
            assert!(CoreError::connection_error("https://chat.nanda-registry.com:6900")
                .is_retriable());
            assert!(CoreError::registry_error("heartbeat rejected").is_retriable());
            assert!(CoreError::service_unavailable("registry").is_retriable());
        }

        #[test]
        fn test_inference_failure_retriable_below_limit() {
            assert!(CoreError::inference_failed("task-1", "OOM", 1).is_retriable());
            assert!(!CoreError::inference_failed("task-1", "OOM", 3).is_retriable());
        }

        #[test]
        fn test_terminal_errors_are_not_retriable() {
            assert!(!CoreError::invalid_task("missing task_id").is_retriable());
            assert!(!CoreError::task_timeout("task-1").is_retriable());
            assert!(!CoreError::task_cancelled("task-1").is_retriable());
            assert!(!CoreError::config_error("bad poll interval").is_retriable());
            assert!(!CoreError::pipeline_error("spawn failed").is_retriable());
        }
    }

    mod conversions {
        use super::*;

        #[test]
        fn test_connection_refused_maps_to_connection() {
            let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
            let err: CoreError = io.into();
            assert!(matches!(err, CoreError::Connection { .. }));
        }

        #[test]
        fn test_other_io_maps_to_internal() {
            let io = std::io::Error::new(std::io::ErrorKind::NotFound, "no such file");
            let err: CoreError = io.into();
            assert!(matches!(err, CoreError::Internal { .. }));
            assert!(err.to_string().contains("no such file"));
        }

        #[test]
        fn test_serde_error_maps_to_serialization() {
            let bad = serde_json::from_str::<serde_json::Value>("{not json");
            let err: CoreError = bad.unwrap_err().into();
            assert!(matches!(err, CoreError::Serialization { .. }));
        }
    }

    #[test]
    fn test_error_display_format() {
        let err = CoreError::inference_failed("task-42", "fold diverged", 2);
        assert_eq!(err.to_string(), "Inference failed: task-42 - fold diverged");
    }
}
