use crate::application::ports::RegistryPort;
use af3_core::config::RegistryConfig;
use af3_core::constants::{
    deregister_path, heartbeat_path, register_path, report_path, tasks_path,
};
use af3_core::error::{CoreError, Result};
use af3_core::node::{NodeHeartbeat, NodeRegistration};
use af3_core::task::{TaskReport, TaskSpec};
use af3_core::types::NodeId;
use af3_core::utils::truncate_output_preview;
use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

/// NANDA 注册中心的 HTTP 客户端
///
/// 每个端点一个小方法，全部走 JSON。非 2xx 响应被转成
/// `CoreError::Registry`，连接与超时类错误由 `From<reqwest::Error>`
/// 映射为 `CoreError::Connection`，两者都会被退避逻辑视为瞬态。
pub struct HttpRegistryClient {
    http: reqwest::Client,
    base_url: String,
}

impl HttpRegistryClient {
    pub fn new(cfg: &RegistryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_sec))
            .user_agent(concat!("af3-agent/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CoreError::internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: cfg.url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<()> {
        let url = self.endpoint(path);
        debug!(url = %url, "POST to registry");

        let response = self.http.post(&url).json(body).send().await?;
        Self::ensure_success(response).await
    }

    async fn ensure_success(response: reqwest::Response) -> Result<()> {
        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(CoreError::registry_error(format!(
            "HTTP {}: {}",
            status,
            truncate_output_preview(&body)
        )))
    }
}

#[async_trait]
impl RegistryPort for HttpRegistryClient {
    async fn register(&self, registration: &NodeRegistration) -> Result<()> {
        self.post_json(register_path(), registration).await
    }

    async fn heartbeat(&self, heartbeat: &NodeHeartbeat) -> Result<()> {
        self.post_json(heartbeat_path(), heartbeat).await
    }

    async fn fetch_tasks(&self, node_id: &NodeId, max: usize) -> Result<Vec<TaskSpec>> {
        let url = self.endpoint(&tasks_path(node_id));
        debug!(url = %url, max = max, "Fetching tasks from registry");

        let response = self
            .http
            .get(&url)
            .query(&[("max", max)])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CoreError::registry_error(format!(
                "HTTP {}: {}",
                status,
                truncate_output_preview(&body)
            )));
        }

        let tasks = response.json::<Vec<TaskSpec>>().await?;
        Ok(tasks)
    }

    async fn submit_report(&self, report: &TaskReport) -> Result<()> {
        self.post_json(&report_path(&report.task_id), report).await
    }

    async fn deregister(&self, node_id: &NodeId) -> Result<()> {
        self.post_json(deregister_path(), &serde_json::json!({ "node_id": node_id }))
            .await
    }
}
