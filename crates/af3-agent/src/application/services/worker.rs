use crate::application::ports::{InferencePort, RegistryPort};
use crate::domain::{agent::Agent, task::Task};
use af3_core::backoff::{execute_with_backoff, registry_request_backoff};
use af3_core::error::{CoreError, Result};
use af3_core::rate_limit::{rate_limited_operation, RateLimiterCollection};
use af3_core::task::{TaskReport, TaskSpec};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// 单个任务的执行编排
///
/// 负责一条任务从校验、上报 Running、跑管线到上报终态的完整流程。
/// 被工作池里的多个 worker 共享，自身无可变状态，
/// 去重记录都落在领域 Agent 上。
pub struct InferenceWorker {
    agent: Arc<RwLock<Agent>>,
    registry: Arc<dyn RegistryPort>,
    pipeline: Arc<dyn InferencePort>,
    limiters: Arc<RateLimiterCollection>,
    results_base_url: String,
    default_timeout: Duration,
}

impl InferenceWorker {
    pub fn new(
        agent: Arc<RwLock<Agent>>,
        registry: Arc<dyn RegistryPort>,
        pipeline: Arc<dyn InferencePort>,
        limiters: Arc<RateLimiterCollection>,
        results_base_url: String,
        default_timeout: Duration,
    ) -> Self {
        Self {
            agent,
            registry,
            pipeline,
            limiters,
            results_base_url,
            default_timeout,
        }
    }

    /// 处理一条拉取到的任务
    pub async fn process_task(&self, spec: TaskSpec, cancel: CancellationToken) -> Result<()> {
        // 没有 task_id 的载荷连失败都无处上报，直接丢弃
        if let Err(e) = spec.validate() {
            error!("Dropping invalid task payload: {}", e);
            return Err(e);
        }

        // 任务级幂等：同一个任务在本节点只执行一次
        {
            let agent = self.agent.read().await;
            if agent.is_task_processed(&spec.task_id) {
                info!(task_id = %spec.task_id, "Task already processed, skipping");
                return Ok(());
            }
        }
        {
            let mut agent = self.agent.write().await;
            agent.mark_task_processed(spec.task_id.clone());
        }

        let report = self.run_inference(&spec, cancel).await?;
        debug!(task_id = %spec.task_id, state = %report.state, "Task finished");
        Ok(())
    }

    /// 执行一次完整的推理流程，返回最终上报的终态
    pub async fn run_inference(
        &self,
        spec: &TaskSpec,
        cancel: CancellationToken,
    ) -> Result<TaskReport> {
        spec.validate()?;

        let node_id = { self.agent.read().await.id().clone() };
        let mut task = Task::new(spec.clone());

        let started_at = Utc::now();
        let clock = std::time::Instant::now();

        task.start()?;

        // 先报 Running 再开跑；上报失败只记日志，不挡推理
        let running = TaskReport::running(spec.task_id.clone(), node_id.clone());
        if let Err(e) = self.submit_report_safely(&running).await {
            warn!(task_id = %spec.task_id, "Failed to submit running report: {}", e);
        }

        {
            self.agent.write().await.mark_inference_started();
        }

        let timeout = spec
            .timeout_sec
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);
        let outcome = self.pipeline.run(spec, cancel, timeout).await;

        {
            self.agent.write().await.mark_inference_finished();
        }

        let duration_ms = clock.elapsed().as_millis() as u64;

        let report = match outcome {
            Ok(output) => {
                task.complete(output.exit_code)?;
                info!(task_id = %spec.task_id, duration_ms = duration_ms, "Inference succeeded");
                TaskReport::succeeded(spec.task_id.clone(), node_id, &self.results_base_url)
                    .with_exit_code(Some(output.exit_code))
                    .with_timing(started_at, duration_ms)
            }
            Err(CoreError::TaskTimeout { .. }) => {
                task.timeout()?;
                warn!(task_id = %spec.task_id, timeout_sec = timeout.as_secs(), "Inference timed out");
                TaskReport::timed_out(spec.task_id.clone(), node_id)
                    .with_timing(started_at, duration_ms)
            }
            Err(CoreError::TaskCancelled { .. }) => {
                task.cancel()?;
                warn!(task_id = %spec.task_id, "Inference cancelled");
                TaskReport::cancelled(spec.task_id.clone(), node_id)
                    .with_timing(started_at, duration_ms)
            }
            Err(e) => {
                task.fail(e.to_string())?;
                error!(task_id = %spec.task_id, "Inference failed: {}", e);
                TaskReport::failed(spec.task_id.clone(), node_id, e.to_string())
                    .with_timing(started_at, duration_ms)
            }
        };

        self.submit_report_safely(&report).await?;
        Ok(report)
    }

    /// 安全上报（限流 + 退避，终态只发一次）
    async fn submit_report_safely(&self, report: &TaskReport) -> Result<()> {
        // 检查终态是否已发送过
        if report.state.is_terminal() {
            let agent = self.agent.read().await;
            if agent.is_result_sent(&report.task_id) {
                debug!(task_id = %report.task_id, "Report already sent, skipping");
                return Ok(());
            }
        }

        let submit_result = rate_limited_operation(
            &self.limiters.reports,
            || async {
                execute_with_backoff(
                    || async { self.registry.submit_report(report).await },
                    registry_request_backoff(),
                )
                .await
            },
            None,
            "report.submit",
        )
        .await;

        // 发送成功后才把终态记为已发出
        if submit_result.is_ok() && report.state.is_terminal() {
            let mut agent = self.agent.write().await;
            agent.mark_result_sent(report.task_id.clone());
        }

        submit_result
    }
}
