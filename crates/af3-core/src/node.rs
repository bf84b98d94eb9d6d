use crate::constants::NODE_CAPABILITIES;
use crate::error::CoreError;
use crate::types::NodeId;
use serde::{Deserialize, Serialize};

/// 注册中心视角下的节点状态（短 TTL，随心跳更新）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Online,
    Busy,
    Offline,
}

/// 节点注册信息 - 注册时一次性上报（长期保存）
/// 只包含稳定字段，能力列表固定且顺序稳定
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeRegistration {
    pub node_id: NodeId,
    /// 进程实例 ID（每次启动随机生成，用于区分同名节点的重启）
    pub instance_id: String,
    pub hostname: String,
    pub capabilities: Vec<String>,
    pub agent_version: String,
    pub registered_at: i64, // Unix 时间戳
}

impl NodeRegistration {
    pub fn new(
        node_id: NodeId,
        instance_id: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            node_id,
            instance_id: instance_id.into(),
            hostname: hostname.into(),
            capabilities: NODE_CAPABILITIES.iter().map(|s| s.to_string()).collect(),
            agent_version: env!("CARGO_PKG_VERSION").to_string(),
            registered_at: chrono::Utc::now().timestamp(),
        }
    }

    /// Basic sanity validation to prevent clearly invalid values from propagating
    pub fn validate_basic(&self) -> Result<(), CoreError> {
        if self.node_id.as_str().is_empty() {
            return Err(CoreError::config_error("node_id must not be empty"));
        }
        if self.capabilities.is_empty() {
            return Err(CoreError::config_error("capabilities must not be empty"));
        }
        Ok(())
    }
}

/// 节点心跳（短 TTL）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeHeartbeat {
    pub node_id: NodeId,
    pub instance_id: String,
    pub status: NodeStatus,
    pub sequence: u64,  // 心跳序列号，用于检测重复或丢失
    pub last_seen: i64, // Unix 时间戳
}

impl NodeHeartbeat {
    pub fn new(
        node_id: NodeId,
        instance_id: impl Into<String>,
        status: NodeStatus,
        sequence: u64,
    ) -> Self {
        Self {
            node_id,
            instance_id: instance_id.into(),
            status,
            sequence,
            last_seen: chrono::Utc::now().timestamp(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_carries_fixed_capabilities() {
        let reg = NodeRegistration::new(NodeId::from("af3-node-sf-01"), "inst-1", "host-a");
        assert_eq!(reg.capabilities, vec!["alphafold3", "protein_folding"]);
        assert!(reg.validate_basic().is_ok());
    }

    #[test]
    fn test_empty_node_id_fails_basic_validation() {
        let reg = NodeRegistration::new(NodeId::from(""), "inst-1", "host-a");
        assert!(reg.validate_basic().is_err());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&NodeStatus::Offline).unwrap();
        assert_eq!(json, r#""offline""#);
    }
}
