use crate::application::ports::RegistryPort;
use crate::application::services::worker::InferenceWorker;
use crate::domain::agent::Agent;
use af3_core::backoff::{delay_for_attempt, registry_request_backoff};
use af3_core::rate_limit::{rate_limited_operation, RateLimiterCollection};
use af3_core::shutdown::GracefulShutdown;
use af3_core::task::TaskSpec;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Notify, RwLock};
use tracing::{debug, error, info, warn};

/// 任务轮询器：拉取循环 + 工作池
///
/// 生产者按 `poll_interval` 轮询注册中心，把任务批次塞进有界通道；
/// `max_concurrent` 个 worker 从通道取任务执行。空批次休眠一个轮询
/// 周期，非空批次立即进入下一轮拉取。退出时关闭通道并等所有
/// worker 收尾。
pub struct TaskPoller {
    agent: Arc<RwLock<Agent>>,
    registry: Arc<dyn RegistryPort>,
    worker: Arc<InferenceWorker>,
    limiters: Arc<RateLimiterCollection>,
    shutdown: GracefulShutdown,
    max_concurrent: usize,
    fetch_batch: usize,
    poll_interval: Duration,
}

impl TaskPoller {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        agent: Arc<RwLock<Agent>>,
        registry: Arc<dyn RegistryPort>,
        worker: Arc<InferenceWorker>,
        limiters: Arc<RateLimiterCollection>,
        shutdown: GracefulShutdown,
        max_concurrent: usize,
        fetch_batch: usize,
        poll_interval: Duration,
    ) -> Self {
        Self {
            agent,
            registry,
            worker,
            limiters,
            shutdown,
            max_concurrent,
            fetch_batch,
            poll_interval,
        }
    }

    pub async fn run(self) {
        let node_id = {
            let agent = self.agent.read().await;
            agent.id().clone()
        };

        info!("Starting task poller for node: {}", node_id);

        // 有界通道：缓冲与并发对齐（并发×2），拉多了也只是排队
        let channel_buffer = self.max_concurrent.saturating_mul(2).max(1);
        let (tx, rx) = mpsc::channel::<TaskSpec>(channel_buffer);
        let shared_rx = Arc::new(Mutex::new(rx));

        // 启动工作池
        let workers_left = Arc::new(std::sync::atomic::AtomicUsize::new(self.max_concurrent));
        let all_workers_done = Arc::new(Notify::new());
        for i in 0..self.max_concurrent {
            let worker_clone = self.worker.clone();
            let shared_rx_clone = shared_rx.clone();
            let workers_left_clone = workers_left.clone();
            let all_workers_done_clone = all_workers_done.clone();
            let shutdown_clone = self.shutdown.clone();
            tokio::spawn(async move {
                loop {
                    let spec_opt = {
                        let mut guard = shared_rx_clone.lock().await;
                        guard.recv().await
                    };
                    match spec_opt {
                        Some(spec) => {
                            debug!("Worker {} picked up task {}", i, spec.task_id);
                            if let Err(e) = worker_clone
                                .process_task(spec, shutdown_clone.child_token())
                                .await
                            {
                                error!("Worker {} failed to process task: {}", i, e);
                            }
                        }
                        None => {
                            if workers_left_clone.fetch_sub(1, std::sync::atomic::Ordering::SeqCst)
                                == 1
                            {
                                all_workers_done_clone.notify_waiters();
                            }
                            break;
                        }
                    }
                }
            });
        }

        // 生产者循环：biased select 保证 shutdown 信号优先
        let mut last_cleanup = std::time::Instant::now();
        let mut fetch_attempt: u32 = 0;

        'produce: loop {
            if self.shutdown.is_cancelled() {
                info!("Shutdown signal received, breaking task poller loop.");
                break;
            }

            let can_accept_tasks = self.agent.read().await.can_accept_tasks();
            if !can_accept_tasks {
                warn!("Node is draining; stop fetching and wait for workers to finish.");
                break;
            }

            // 定期清理过期的去重记录（每小时一次）
            if last_cleanup.elapsed() > Duration::from_secs(3600) {
                let mut agent = self.agent.write().await;
                agent.cleanup_old_records();
                last_cleanup = std::time::Instant::now();
                debug!("Cleaned up old task records");
            }

            tokio::select! {
                biased;

                _ = self.shutdown.cancelled() => {
                    info!("Shutdown received while waiting for tasks, exiting.");
                    break 'produce;
                }

                fetch_result = rate_limited_operation(
                    &self.limiters.registry,
                    || async { self.registry.fetch_tasks(&node_id, self.fetch_batch).await },
                    None,
                    "tasks.fetch",
                ) => {
                    match fetch_result {
                        Ok(batch) if batch.is_empty() => {
                            debug!("No tasks assigned in this poll");
                            fetch_attempt = 0;
                            tokio::select! {
                                _ = tokio::time::sleep(self.poll_interval) => {}
                                _ = self.shutdown.cancelled() => {
                                    info!("Shutdown received during idle sleep, exiting.");
                                    break 'produce;
                                }
                            }
                        }
                        Ok(batch) => {
                            fetch_attempt = 0;
                            let mut dispatched = 0usize;
                            for spec in batch {
                                // 已处理过的任务不再入队
                                if self.agent.read().await.is_task_processed(&spec.task_id) {
                                    debug!(task_id = %spec.task_id, "Skipping already processed task");
                                    continue;
                                }
                                if tx.send(spec).await.is_err() {
                                    error!("All workers dropped, stopping task poller");
                                    break 'produce;
                                }
                                dispatched += 1;
                            }
                            if dispatched > 0 {
                                info!("Dispatched {} tasks to workers", dispatched);
                            }
                            // 队列可能还有积压，不休眠直接进入下一轮拉取
                        }
                        Err(e) => {
                            let wait = delay_for_attempt(&registry_request_backoff(), fetch_attempt);
                            fetch_attempt = fetch_attempt.saturating_add(1);
                            error!("Failed to fetch tasks: {}. Retrying in {:?}", e, wait);
                            tokio::select! {
                                _ = tokio::time::sleep(wait) => {}
                                _ = self.shutdown.cancelled() => {
                                    info!("Shutdown received during backoff sleep, exiting.");
                                    break 'produce;
                                }
                            }
                        }
                    }
                }
            }
        }

        // 停止生产：先注册唤醒点再关闭发送端，避免错过最后一个 worker 的通知
        let notified = all_workers_done.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();
        drop(tx);
        if workers_left.load(std::sync::atomic::Ordering::SeqCst) != 0 {
            notified.await;
        }

        info!("Task poller stopped");
    }
}
