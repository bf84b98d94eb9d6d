//! 领域模型：节点实体与任务状态机

pub mod agent;
pub mod task;

pub use agent::{Agent, AgentStatus};
pub use task::{Task, TaskStatus};
