use super::status::AgentStatus;
use af3_core::constants::NODE_CAPABILITIES;
use af3_core::node::NodeStatus;
use af3_core::types::{NodeId, TaskId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 去重记录的容量上限，超过后整体清空
const MAX_TRACKED_TASKS: usize = 10_000;

/// Agent 核心领域实体
///
/// 持有节点身份、运行状态和任务去重记录。
/// 身份字段在构造后只读，能力列表是编译期常量，
/// 因此构造永远不会失败。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    id: NodeId,
    registry_url: String,
    instance_id: String,
    pub status: AgentStatus,
    inflight: usize,
    processed_tasks: HashSet<TaskId>,
    sent_reports: HashSet<TaskId>,
}

impl Agent {
    pub fn new(
        id: NodeId,
        registry_url: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            id,
            registry_url: registry_url.into(),
            instance_id: instance_id.into(),
            status: AgentStatus::Initializing,
            inflight: 0,
            processed_tasks: HashSet::new(),
            sent_reports: HashSet::new(),
        }
    }

    pub fn id(&self) -> &NodeId {
        &self.id
    }

    pub fn registry_url(&self) -> &str {
        &self.registry_url
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// 节点能力集合，固定不变
    pub fn capabilities(&self) -> &'static [&'static str] {
        &NODE_CAPABILITIES
    }

    pub fn set_status(&mut self, status: AgentStatus) {
        self.status = status;
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AgentStatus::Running)
    }

    pub fn can_accept_tasks(&self) -> bool {
        matches!(self.status, AgentStatus::Running)
    }

    /// 注册中心视角的节点状态
    ///
    /// Running 且有在途推理时上报 Busy，其余映射见各分支。
    pub fn wire_status(&self) -> NodeStatus {
        match self.status {
            AgentStatus::Running if self.inflight > 0 => NodeStatus::Busy,
            AgentStatus::Running => NodeStatus::Online,
            // 初始化阶段已经连上注册中心，对外视为在线
            AgentStatus::Initializing => NodeStatus::Online,
            AgentStatus::Draining | AgentStatus::Shutdown => NodeStatus::Offline,
        }
    }

    pub fn mark_inference_started(&mut self) {
        self.inflight += 1;
    }

    pub fn mark_inference_finished(&mut self) {
        self.inflight = self.inflight.saturating_sub(1);
    }

    pub fn inflight(&self) -> usize {
        self.inflight
    }

    pub fn is_task_processed(&self, task_id: &TaskId) -> bool {
        self.processed_tasks.contains(task_id)
    }

    pub fn mark_task_processed(&mut self, task_id: TaskId) {
        self.processed_tasks.insert(task_id);
    }

    pub fn is_result_sent(&self, task_id: &TaskId) -> bool {
        self.sent_reports.contains(task_id)
    }

    pub fn mark_result_sent(&mut self, task_id: TaskId) {
        self.sent_reports.insert(task_id);
    }

    /// 清理过大的去重记录，防止长时间运行后无限增长
    pub fn cleanup_old_records(&mut self) {
        if self.processed_tasks.len() > MAX_TRACKED_TASKS {
            self.processed_tasks.clear();
        }
        if self.sent_reports.len() > MAX_TRACKED_TASKS {
            self.sent_reports.clear();
        }
    }
}
