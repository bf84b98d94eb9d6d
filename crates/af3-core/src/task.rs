use crate::constants::result_url_for_typed;
use crate::error::{CoreError, Result};
use crate::types::{NodeId, TaskId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// 任务规格 - 注册中心下发的纯数据传输对象，不可变
///
/// 适配层只消费 `task_id` 与 `timeout_sec`；`params` 对节点不透明，
/// 原样交给推理管线作为 JSON 输入。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(default)]
    pub task_id: TaskId,
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub priority: Option<i32>,
    /// 单任务超时覆盖；None 时使用节点配置的默认值
    #[serde(default)]
    pub timeout_sec: Option<u64>,
}

impl TaskSpec {
    /// 便捷构造函数：创建只带 ID 的任务
    pub fn new(task_id: impl Into<TaskId>) -> Self {
        Self {
            task_id: task_id.into(),
            params: serde_json::Map::new(),
            priority: None,
            timeout_sec: None,
        }
    }

    /// 可链式方法：设置管线输入参数
    pub fn with_params(mut self, params: serde_json::Map<String, serde_json::Value>) -> Self {
        self.params = params;
        self
    }

    /// 可链式方法：设置单任务超时
    pub fn with_timeout(mut self, timeout_sec: u64) -> Self {
        self.timeout_sec = Some(timeout_sec);
        self
    }

    /// 校验 payload：缺失或空的 task_id 是显式错误，不做任何静默兜底
    pub fn validate(&self) -> Result<()> {
        if self.task_id.as_str().is_empty() {
            return Err(CoreError::invalid_task("task payload missing task_id"));
        }
        Ok(())
    }
}

/// 上报状态：Running 为进行中，其余均为终态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    Running,
    Succeeded,
    Failed,
    Timeout,
    Cancelled,
}

impl ReportState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReportState::Running)
    }
}

impl fmt::Display for ReportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportState::Running => "running",
            ReportState::Succeeded => "succeeded",
            ReportState::Failed => "failed",
            ReportState::Timeout => "timeout",
            ReportState::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// 任务上报 - 回传注册中心的纯数据传输对象
///
/// 成功与失败必须可区分：成功携带 result_url，失败携带 error，
/// 二者不会同时出现。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    pub node_id: NodeId,
    pub state: ReportState,
    pub result_url: Option<String>,
    pub error: Option<String>,
    pub exit_code: Option<i32>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
}

impl TaskReport {
    fn base(task_id: TaskId, node_id: NodeId, state: ReportState) -> Self {
        Self {
            task_id,
            node_id,
            state,
            result_url: None,
            error: None,
            exit_code: None,
            started_at: None,
            finished_at: None,
            duration_ms: None,
        }
    }

    /// 进行中上报：领取后、执行前发出
    pub fn running(task_id: TaskId, node_id: NodeId) -> Self {
        let mut report = Self::base(task_id, node_id, ReportState::Running);
        report.started_at = Some(Utc::now());
        report
    }

    /// 成功上报：携带按约定格式生成的结果 URL
    pub fn succeeded(task_id: TaskId, node_id: NodeId, results_base: &str) -> Self {
        let url = result_url_for_typed(results_base, &task_id);
        let mut report = Self::base(task_id, node_id, ReportState::Succeeded);
        report.result_url = Some(url);
        report.finished_at = Some(Utc::now());
        report
    }

    /// 失败上报：result_url 保持为空
    pub fn failed(task_id: TaskId, node_id: NodeId, error: impl Into<String>) -> Self {
        let mut report = Self::base(task_id, node_id, ReportState::Failed);
        report.error = Some(error.into());
        report.finished_at = Some(Utc::now());
        report
    }

    /// 超时上报
    pub fn timed_out(task_id: TaskId, node_id: NodeId) -> Self {
        let mut report = Self::base(task_id, node_id, ReportState::Timeout);
        report.error = Some("inference timed out".to_string());
        report.finished_at = Some(Utc::now());
        report
    }

    /// 取消上报（节点停机时在途任务的终态）
    pub fn cancelled(task_id: TaskId, node_id: NodeId) -> Self {
        let mut report = Self::base(task_id, node_id, ReportState::Cancelled);
        report.error = Some("inference cancelled".to_string());
        report.finished_at = Some(Utc::now());
        report
    }

    /// 可链式方法：记录子进程退出码
    pub fn with_exit_code(mut self, exit_code: Option<i32>) -> Self {
        self.exit_code = exit_code;
        self
    }

    /// 可链式方法：补充起止时间与耗时
    pub fn with_timing(mut self, started_at: DateTime<Utc>, duration_ms: u64) -> Self {
        self.started_at = Some(started_at);
        self.duration_ms = Some(duration_ms);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::DEFAULT_RESULTS_BASE_URL;

    mod spec_validation {
        use super::*;

        #[test]
        fn test_missing_task_id_is_rejected() {
            // 不带 task_id 的 payload 反序列化成功，但校验必须失败
            let spec: TaskSpec = serde_json::from_str(r#"{"params": {"seq": "MKV"}}"#).unwrap();
            let err = spec.validate().unwrap_err();
            assert!(matches!(err, CoreError::InvalidTask { .. }));
        }

        #[test]
        fn test_empty_task_id_is_rejected() {
            let spec = TaskSpec::new("");
            assert!(spec.validate().is_err());
        }

        #[test]
        fn test_valid_spec_passes() {
            let spec = TaskSpec::new("task-001").with_timeout(600);
            assert!(spec.validate().is_ok());
            assert_eq!(spec.timeout_sec, Some(600));
        }

        #[test]
        fn test_unknown_params_are_preserved() {
            let spec: TaskSpec = serde_json::from_str(
                r#"{"task_id": "t1", "params": {"fasta": ">A\nMKV", "seeds": [1, 2]}}"#,
            )
            .unwrap();
            assert_eq!(spec.params.len(), 2);
            assert_eq!(spec.params["fasta"], serde_json::json!(">A\nMKV"));
        }
    }

    mod report_shape {
        use super::*;

        #[test]
        fn test_result_url_exact_format() {
            let report = TaskReport::succeeded(
                TaskId::from("X"),
                NodeId::from("af3-node-sf-01"),
                DEFAULT_RESULTS_BASE_URL,
            );
            assert_eq!(
                report.result_url.as_deref(),
                Some("https://results.agicorp.network/X/model.cif")
            );
            assert!(report.error.is_none());
            assert!(report.state.is_terminal());
        }

        #[test]
        fn test_trailing_slash_base_is_normalized() {
            let report = TaskReport::succeeded(
                TaskId::from("t9"),
                NodeId::from("n1"),
                "https://results.agicorp.network/",
            );
            assert_eq!(
                report.result_url.as_deref(),
                Some("https://results.agicorp.network/t9/model.cif")
            );
        }

        #[test]
        fn test_failure_report_has_no_result_url() {
            let report =
                TaskReport::failed(TaskId::from("t1"), NodeId::from("n1"), "fold diverged")
                    .with_exit_code(Some(1));
            assert!(report.result_url.is_none());
            assert_eq!(report.error.as_deref(), Some("fold diverged"));
            assert_eq!(report.exit_code, Some(1));
        }

        #[test]
        fn test_running_report_is_not_terminal() {
            let report = TaskReport::running(TaskId::from("t1"), NodeId::from("n1"));
            assert!(!report.state.is_terminal());
            assert!(report.started_at.is_some());
            assert!(report.finished_at.is_none());
        }

        #[test]
        fn test_state_serializes_snake_case() {
            let json = serde_json::to_string(&ReportState::Succeeded).unwrap();
            assert_eq!(json, r#""succeeded""#);
        }
    }
}
