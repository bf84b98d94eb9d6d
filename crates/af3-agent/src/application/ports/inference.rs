use af3_core::error::Result;
use af3_core::task::TaskSpec;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// 一次推理运行的产出
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    /// 管线进程的退出码
    pub exit_code: i32,
    /// 产出的结构文件（model.cif）在本地的路径
    pub result_path: PathBuf,
    /// 标准错误流的末尾片段，用于日志排查
    pub stderr_tail: String,
}

/// 推理执行端口
///
/// 真实实现派生 AlphaFold3 管线子进程；测试里用即时返回的桩。
/// 调用方负责决定超时时长并在关停时取消 token。
#[async_trait]
pub trait InferencePort: Send + Sync {
    async fn run(
        &self,
        spec: &TaskSpec,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<InferenceOutput>;
}
