use crate::application::ports::RegistryPort;
use af3_core::error::Result;
use af3_core::node::{NodeHeartbeat, NodeRegistration};
use af3_core::task::{TaskReport, TaskSpec};
use af3_core::types::NodeId;
use async_trait::async_trait;
use std::collections::VecDeque;
use tokio::sync::Mutex;

/// 进程内注册中心
///
/// 记录所有收到的调用并维护一个待派发任务队列。
/// 供集成测试使用，也支撑 `registry.mode = "mock"` 的离线运行。
#[derive(Default)]
pub struct MemoryRegistry {
    inner: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    registrations: Vec<NodeRegistration>,
    heartbeats: Vec<NodeHeartbeat>,
    pending: VecDeque<TaskSpec>,
    reports: Vec<TaskReport>,
    deregistered: Vec<NodeId>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 把一个任务放进待派发队列
    pub async fn push_task(&self, spec: TaskSpec) {
        self.inner.lock().await.pending.push_back(spec);
    }

    pub async fn registrations(&self) -> Vec<NodeRegistration> {
        self.inner.lock().await.registrations.clone()
    }

    pub async fn heartbeats(&self) -> Vec<NodeHeartbeat> {
        self.inner.lock().await.heartbeats.clone()
    }

    pub async fn reports(&self) -> Vec<TaskReport> {
        self.inner.lock().await.reports.clone()
    }

    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }

    pub async fn was_deregistered(&self, node_id: &NodeId) -> bool {
        self.inner.lock().await.deregistered.contains(node_id)
    }
}

#[async_trait]
impl RegistryPort for MemoryRegistry {
    async fn register(&self, registration: &NodeRegistration) -> Result<()> {
        self.inner
            .lock()
            .await
            .registrations
            .push(registration.clone());
        Ok(())
    }

    async fn heartbeat(&self, heartbeat: &NodeHeartbeat) -> Result<()> {
        self.inner.lock().await.heartbeats.push(heartbeat.clone());
        Ok(())
    }

    async fn fetch_tasks(&self, _node_id: &NodeId, max: usize) -> Result<Vec<TaskSpec>> {
        let mut state = self.inner.lock().await;
        let count = max.min(state.pending.len());
        Ok(state.pending.drain(..count).collect())
    }

    async fn submit_report(&self, report: &TaskReport) -> Result<()> {
        self.inner.lock().await.reports.push(report.clone());
        Ok(())
    }

    async fn deregister(&self, node_id: &NodeId) -> Result<()> {
        self.inner.lock().await.deregistered.push(node_id.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_drains_at_most_max() {
        let registry = MemoryRegistry::new();
        for i in 0..5 {
            registry.push_task(TaskSpec::new(format!("task-{}", i))).await;
        }

        let node = NodeId::from("af3-node-sf-01");
        let first = registry.fetch_tasks(&node, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].task_id.as_str(), "task-0");

        let rest = registry.fetch_tasks(&node, 10).await.unwrap();
        assert_eq!(rest.len(), 3);
        assert_eq!(registry.pending_count().await, 0);
    }

    #[tokio::test]
    async fn test_calls_are_recorded() {
        let registry = MemoryRegistry::new();
        let node = NodeId::from("af3-node-sf-01");

        let registration = NodeRegistration::new(node.clone(), "inst-1", "host-1");
        registry.register(&registration).await.unwrap();
        registry.deregister(&node).await.unwrap();

        assert_eq!(registry.registrations().await.len(), 1);
        assert!(registry.was_deregistered(&node).await);
    }
}
