use af3_core::error::Result;
use af3_core::node::{NodeHeartbeat, NodeRegistration};
use af3_core::task::{TaskReport, TaskSpec};
use af3_core::types::NodeId;
use async_trait::async_trait;

/// 注册中心访问端口
///
/// 有两个实现：`HttpRegistryClient` 走真实网络，`MemoryRegistry`
/// 在进程内记录所有调用。用哪个由配置在构造期显式决定，
/// 运行期不做任何隐式回退。
#[async_trait]
pub trait RegistryPort: Send + Sync {
    /// 向注册中心宣告本节点
    async fn register(&self, registration: &NodeRegistration) -> Result<()>;

    /// 上报一次心跳
    async fn heartbeat(&self, heartbeat: &NodeHeartbeat) -> Result<()>;

    /// 拉取分派给本节点的任务，最多 `max` 条
    async fn fetch_tasks(&self, node_id: &NodeId, max: usize) -> Result<Vec<TaskSpec>>;

    /// 汇报任务执行进展或结果
    async fn submit_report(&self, report: &TaskReport) -> Result<()>;

    /// 从注册中心注销本节点
    async fn deregister(&self, node_id: &NodeId) -> Result<()>;
}
