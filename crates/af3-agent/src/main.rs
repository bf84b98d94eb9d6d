use af3_agent::{
    application::services::{HeartbeatService, InferenceWorker, TaskPoller},
    config::AgentConfig,
    domain::{Agent, AgentStatus},
    infrastructure::{build_registry, pipeline::AlphaFold3Pipeline},
};
use af3_core::{
    backoff::{execute_with_backoff_selective, registration_backoff},
    error::CoreError,
    node::{NodeHeartbeat, NodeRegistration, NodeStatus},
    rate_limit::RateLimiterCollection,
    shutdown::{GracefulShutdown, wait_for_tasks_with_timeout},
    telemetry::{init_tracing_with, LogConfig},
    types::NodeId,
};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info};
use uuid::Uuid;

/// 关停后留给在途任务收尾的时间；管线进程在取消时就被终止，
/// 这里只等上报完成
const DRAIN_TIMEOUT_SECS: u64 = 30;

#[tokio::main]
async fn main() -> Result<()> {
    // 统一配置加载（默认值 + 文件 + 环境变量覆盖）
    let cfg = AgentConfig::load_smart()?;

    // 初始化遥测
    init_tracing_with(&LogConfig::from(&cfg.common.telemetry));

    info!("Starting AlphaFold3 node...");
    info!("  Registry URL: {}", cfg.common.registry.url);
    info!("  Registry mode: {}", cfg.common.registry.mode);
    info!("  Node ID: {}", cfg.agent.node_id);
    info!("  Log level: {}", cfg.common.telemetry.log_level);

    let registry = build_registry(&cfg)?;

    // 节点 ID 来自配置，实例 ID 每次启动随机生成
    let node_id = NodeId::from(cfg.agent.node_id.clone());
    let instance_id = Uuid::new_v4().to_string();
    info!("Generated instance ID: {}", instance_id);

    let agent = Arc::new(RwLock::new(Agent::new(
        node_id.clone(),
        cfg.common.registry.url.clone(),
        instance_id.clone(),
    )));

    let limiters = Arc::new(RateLimiterCollection::default());
    let shutdown = GracefulShutdown::new();

    // 注册到 NANDA 注册中心，瞬态错误退避重试，配置类错误立即失败
    let hostname = hostname::get()
        .ok()
        .and_then(|s| s.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());
    let registration = NodeRegistration::new(node_id.clone(), instance_id.clone(), hostname);
    registration.validate_basic()?;

    {
        let reg_registry = registry.clone();
        let reg_payload = registration.clone();
        execute_with_backoff_selective(
            move || {
                let registry = reg_registry.clone();
                let registration = reg_payload.clone();
                async move { registry.register(&registration).await }
            },
            registration_backoff(),
            Arc::new(|e: &CoreError| e.is_retriable()),
        )
        .await?;
    }
    info!(
        "Registered with registry as {} (capabilities: {:?})",
        node_id,
        af3_core::NODE_CAPABILITIES
    );

    {
        let mut agent_guard = agent.write().await;
        agent_guard.set_status(AgentStatus::Running);
    }
    info!("Node status set to Running");

    // 组装服务
    let pipeline = Arc::new(AlphaFold3Pipeline::new(cfg.pipeline.clone()));
    let worker = Arc::new(InferenceWorker::new(
        agent.clone(),
        registry.clone(),
        pipeline,
        limiters.clone(),
        cfg.common.registry.results_base_url.clone(),
        cfg.run_timeout(),
    ));

    let heartbeat_service = HeartbeatService::new(
        agent.clone(),
        registry.clone(),
        limiters.clone(),
        shutdown.clone(),
        cfg.heartbeat_interval(),
    );

    let poller = TaskPoller::new(
        agent.clone(),
        registry.clone(),
        worker,
        limiters.clone(),
        shutdown.clone(),
        cfg.agent.max_concurrent_inferences,
        cfg.common.registry.fetch_batch,
        cfg.poll_interval(),
    );

    // 启动后台服务
    let heartbeat_handle = tokio::spawn(heartbeat_service.run());
    let poller_handle = tokio::spawn(poller.run());

    info!("All services started successfully");

    // 等待全局关闭信号
    shutdown.wait_for_signal().await;

    info!("Shutdown signal received, stopping services...");

    {
        let mut agent_guard = agent.write().await;
        agent_guard.set_status(AgentStatus::Draining);
    }

    // 主动发送一次离线心跳，确保注册中心立即感知
    {
        let offline_hb =
            NodeHeartbeat::new(node_id.clone(), instance_id.clone(), NodeStatus::Offline, 0);
        if let Err(e) = registry.heartbeat(&offline_hb).await {
            error!("Failed to send offline heartbeat: {}", e);
        } else {
            info!("Sent offline heartbeat");
        }
    }

    // 等待在途任务收尾
    wait_for_tasks_with_timeout(vec![heartbeat_handle, poller_handle], DRAIN_TIMEOUT_SECS).await;

    // 尽力注销，失败不影响退出
    if let Err(e) = registry.deregister(&node_id).await {
        error!("Failed to deregister from registry: {}", e);
    } else {
        info!("Deregistered from registry");
    }

    {
        let mut agent_guard = agent.write().await;
        agent_guard.set_status(AgentStatus::Shutdown);
    }

    info!("Node shut down gracefully");
    Ok(())
}
