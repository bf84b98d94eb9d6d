use crate::application::ports::RegistryPort;
use crate::domain::agent::Agent;
use af3_core::backoff::{execute_with_backoff, heartbeat_backoff};
use af3_core::error::Result;
use af3_core::node::NodeHeartbeat;
use af3_core::rate_limit::{rate_limited_operation, RateLimiterCollection};
use af3_core::shutdown::{GracefulShutdown, with_cancellation_and_timeout};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::interval;
use tracing::{debug, error, info};

/// 心跳服务
///
/// 按固定间隔向注册中心上报节点状态。序号只在发送成功后递增，
/// 注册中心因此能看出丢了多少拍。单次发送被限制在一个心跳周期内，
/// 挂住的请求不会让后续心跳堆积。
pub struct HeartbeatService {
    agent: Arc<RwLock<Agent>>,
    registry: Arc<dyn RegistryPort>,
    limiters: Arc<RateLimiterCollection>,
    shutdown: GracefulShutdown,
    interval: Duration,
}

impl HeartbeatService {
    pub fn new(
        agent: Arc<RwLock<Agent>>,
        registry: Arc<dyn RegistryPort>,
        limiters: Arc<RateLimiterCollection>,
        shutdown: GracefulShutdown,
        interval: Duration,
    ) -> Self {
        Self {
            agent,
            registry,
            limiters,
            shutdown,
            interval,
        }
    }

    pub async fn run(self) {
        let mut timer = interval(self.interval);
        let mut sequence = 0u64;

        info!("Starting heartbeat service (interval: {:?})", self.interval);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Heartbeat service received shutdown");
                    break;
                }
                _ = timer.tick() => {
                    let send = self.send_heartbeat(sequence);
                    match with_cancellation_and_timeout(send, self.shutdown.token.clone(), self.interval).await {
                        Ok(Ok(())) => {
                            sequence = sequence.wrapping_add(1);
                        }
                        Ok(Err(e)) => error!("Failed to send heartbeat: {}", e),
                        Err(e) => error!("Heartbeat send aborted: {}", e),
                    }
                }
            }
        }
    }

    async fn send_heartbeat(&self, sequence: u64) -> Result<()> {
        // 收集节点信息
        let (node_id, instance_id, status) = {
            let agent = self.agent.read().await;
            (
                agent.id().clone(),
                agent.instance_id().to_string(),
                agent.wire_status(),
            )
        };

        let heartbeat = NodeHeartbeat::new(node_id, instance_id, status, sequence);

        // 限流 + 退避 上报心跳
        rate_limited_operation(
            &self.limiters.heartbeat,
            || async {
                execute_with_backoff(
                    || async { self.registry.heartbeat(&heartbeat).await },
                    heartbeat_backoff(),
                )
                .await
            },
            None,
            "heartbeat.send",
        )
        .await?;

        debug!("Heartbeat sent (sequence: {})", sequence);
        Ok(())
    }
}
