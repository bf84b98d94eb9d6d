// 节点身份与注册中心的默认值（环境变量未设置时生效）
pub const DEFAULT_NODE_ID: &str = "af3-node-sf-01";
pub const DEFAULT_REGISTRY_URL: &str = "https://chat.nanda-registry.com:6900";

// 节点能力声明：固定列表，顺序稳定，注册时原样上报
pub const NODE_CAPABILITIES: [&str; 2] = ["alphafold3", "protein_folding"];

// 结果投递：完成的任务只上报一个可下载的 URL，结构文件本身不走注册中心
pub const DEFAULT_RESULTS_BASE_URL: &str = "https://results.agicorp.network";
pub const RESULT_MODEL_FILENAME: &str = "model.cif";

// 环境变量名（兼容注册中心侧约定的两个裸名 + 结构化覆盖前缀）
pub const ENV_AGENT_ID: &str = "AGENT_ID";
pub const ENV_REGISTRY_URL: &str = "REGISTRY_URL";
pub const ENV_CONFIG_PREFIX: &str = "AF3_AGENT_";

// 轮询 / 心跳默认节奏
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 15;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// 单次轮询最多领取的任务数
pub const DEFAULT_FETCH_BATCH: usize = 4;

// 推理执行默认值（AlphaFold3 跑一次以小时计，超时放宽到 1h）
pub const DEFAULT_MAX_CONCURRENT_INFERENCES: usize = 1;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 3600;
pub const DEFAULT_PYTHON_BIN: &str = "python3";
pub const DEFAULT_PIPELINE_SCRIPT: &str = "run_alphafold.py";

/// 生成任务结果 URL：{base}/{taskId}/model.cif
/// 请优先使用 `result_url_for_typed`，该函数仅作为兼容保留
pub fn result_url_for(base: &str, task_id: &str) -> String {
    result_url_for_typed(base, &crate::types::TaskId::from(task_id))
}

/// 生成任务结果 URL：{base}/{taskId}/model.cif（类型安全版本）
pub fn result_url_for_typed(base: &str, task_id: &crate::types::TaskId) -> String {
    format!(
        "{}/{}/{RESULT_MODEL_FILENAME}",
        base.trim_end_matches('/'),
        task_id.as_str()
    )
}

// ---------- 注册中心 HTTP 路径 helpers ----------

pub fn register_path() -> &'static str {
    "/agents/register"
}

pub fn heartbeat_path() -> &'static str {
    "/agents/heartbeat"
}

pub fn deregister_path() -> &'static str {
    "/agents/deregister"
}

/// 指定节点的待领取任务路径
pub fn tasks_path(node_id: &crate::types::NodeId) -> String {
    format!("/agents/{}/tasks", node_id.as_str())
}

/// 指定任务的状态上报路径
pub fn report_path(task_id: &crate::types::TaskId) -> String {
    format!("/tasks/{}/report", task_id.as_str())
}
