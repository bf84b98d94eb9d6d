use crate::application::ports::{InferenceOutput, InferencePort};
use crate::config::PipelineSection;
use af3_core::constants::RESULT_MODEL_FILENAME;
use af3_core::error::{CoreError, Result};
use af3_core::shutdown::{execute_process_with_cancellation, ExecutionError};
use af3_core::task::TaskSpec;
use af3_core::utils::stderr_tail;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// 保留 stderr 末尾的行数，Python 栈回溯和 CUDA 报错都在末尾
const STDERR_TAIL_LINES: usize = 20;

/// AlphaFold3 推理管线适配器
///
/// 每个任务独占一个工作目录 `{output_dir}/{task_id}`：
/// 任务参数写成 `input.json`，随后派生
/// `{python_bin} {script_path} --json_path ... --output_dir ...`。
/// 退出码为 0 且产出 model.cif 才算成功。
pub struct AlphaFold3Pipeline {
    cfg: PipelineSection,
}

impl AlphaFold3Pipeline {
    pub fn new(cfg: PipelineSection) -> Self {
        Self { cfg }
    }

    fn work_dir_for(&self, spec: &TaskSpec) -> PathBuf {
        Path::new(&self.cfg.output_dir).join(spec.task_id.as_str())
    }

    fn build_command(&self, json_path: &Path, work_dir: &Path) -> Command {
        let mut cmd = Command::new(&self.cfg.python_bin);
        cmd.arg(&self.cfg.script_path)
            .arg("--json_path")
            .arg(json_path)
            .arg("--output_dir")
            .arg(work_dir);
        if let Some(model_dir) = &self.cfg.model_dir {
            cmd.arg("--model_dir").arg(model_dir);
        }
        cmd.stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl InferencePort for AlphaFold3Pipeline {
    async fn run(
        &self,
        spec: &TaskSpec,
        cancel: CancellationToken,
        timeout: Duration,
    ) -> Result<InferenceOutput> {
        let task_id = &spec.task_id;

        // task_id 会成为目录名，含路径分隔符的一律拒绝
        let raw_id = task_id.as_str();
        if raw_id.contains('/') || raw_id.contains('\\') || raw_id.contains("..") {
            return Err(CoreError::invalid_task(format!(
                "task_id is not a safe directory name: {}",
                raw_id
            )));
        }

        let work_dir = self.work_dir_for(spec);
        tokio::fs::create_dir_all(&work_dir)
            .await
            .map_err(|e| CoreError::pipeline_error(format!("Failed to create work dir: {}", e)))?;

        // 任务参数落盘，管线脚本从文件读取输入
        let json_path = work_dir.join("input.json");
        let params = serde_json::to_vec_pretty(&spec.params)?;
        tokio::fs::write(&json_path, params)
            .await
            .map_err(|e| CoreError::pipeline_error(format!("Failed to write input.json: {}", e)))?;

        let mut cmd = self.build_command(&json_path, &work_dir);
        debug!(task_id = %task_id, command = ?cmd.as_std(), "Spawning pipeline process");

        let child = cmd.spawn().map_err(|e| {
            CoreError::pipeline_error(format!("Failed to spawn {}: {}", self.cfg.python_bin, e))
        })?;

        info!(task_id = %task_id, timeout_sec = timeout.as_secs(), "Pipeline started");

        let output = execute_process_with_cancellation(child, cancel, timeout, "alphafold3")
            .await
            .map_err(|e| match e {
                ExecutionError::Cancelled => CoreError::task_cancelled(task_id.clone()),
                ExecutionError::Timeout(_) => CoreError::task_timeout(task_id.clone()),
                ExecutionError::Failed(err) => CoreError::pipeline_error(err.to_string()),
            })?;

        let exit_code = output.status.code().unwrap_or(-1);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail = stderr_tail(&stderr, STDERR_TAIL_LINES);

        if exit_code != 0 {
            return Err(CoreError::inference_failed(task_id.clone(), tail, 0));
        }

        // 成功判定：退出码 0 还不够，结构文件必须真的存在
        let result_path = work_dir.join(RESULT_MODEL_FILENAME);
        if tokio::fs::metadata(&result_path).await.is_err() {
            return Err(CoreError::inference_failed(
                task_id.clone(),
                format!("pipeline exited 0 but produced no {}", RESULT_MODEL_FILENAME),
                0,
            ));
        }

        info!(task_id = %task_id, result = %result_path.display(), "Pipeline finished");

        Ok(InferenceOutput {
            exit_code,
            result_path,
            stderr_tail: tail,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_with_script(output_dir: &Path, script: &Path) -> AlphaFold3Pipeline {
        AlphaFold3Pipeline::new(PipelineSection {
            python_bin: "sh".to_string(),
            script_path: script.to_string_lossy().to_string(),
            output_dir: output_dir.to_string_lossy().to_string(),
            model_dir: None,
            run_timeout_sec: 60,
        })
    }

    #[cfg(unix)]
    mod process_runs {
        use super::*;
        use std::io::Write;

        /// 写一个代替 run_alphafold.py 的 shell 脚本
        fn fake_script(dir: &Path, body: &str) -> PathBuf {
            let path = dir.join("fake_pipeline.sh");
            let mut file = std::fs::File::create(&path).unwrap();
            writeln!(file, "#!/bin/sh").unwrap();
            writeln!(file, "{}", body).unwrap();
            path
        }

        /// 从参数里解析 --output_dir 的脚本前缀
        const PARSE_OUTPUT_DIR: &str = r#"
out=""
while [ "$#" -gt 0 ]; do
  if [ "$1" = "--output_dir" ]; then out="$2"; shift 2; else shift 1; fi
done"#;

        #[tokio::test]
        async fn test_successful_run_returns_result_path() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_script(
                dir.path(),
                &format!("{}\n: > \"$out/model.cif\"\nexit 0", PARSE_OUTPUT_DIR),
            );
            let pipeline = pipeline_with_script(dir.path(), &script);

            let spec = TaskSpec::new("task-ok").with_params(
                [("sequence".to_string(), serde_json::json!("MKTAYIAK"))]
                    .into_iter()
                    .collect(),
            );
            let output = pipeline
                .run(&spec, CancellationToken::new(), Duration::from_secs(30))
                .await
                .unwrap();

            assert_eq!(output.exit_code, 0);
            assert!(output.result_path.ends_with("task-ok/model.cif"));
            assert!(output.result_path.exists());

            // 输入参数必须已经写进工作目录
            let written = std::fs::read_to_string(dir.path().join("task-ok/input.json")).unwrap();
            assert!(written.contains("MKTAYIAK"));
        }

        #[tokio::test]
        async fn test_nonzero_exit_surfaces_stderr_tail() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_script(dir.path(), "echo 'CUDA out of memory' >&2\nexit 3");
            let pipeline = pipeline_with_script(dir.path(), &script);

            let err = pipeline
                .run(
                    &TaskSpec::new("task-oom"),
                    CancellationToken::new(),
                    Duration::from_secs(30),
                )
                .await
                .unwrap_err();

            match err {
                CoreError::InferenceFailed { reason, .. } => {
                    assert!(reason.contains("CUDA out of memory"), "reason: {}", reason);
                }
                other => panic!("expected InferenceFailed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_exit_zero_without_model_file_is_failure() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_script(dir.path(), "exit 0");
            let pipeline = pipeline_with_script(dir.path(), &script);

            let err = pipeline
                .run(
                    &TaskSpec::new("task-empty"),
                    CancellationToken::new(),
                    Duration::from_secs(30),
                )
                .await
                .unwrap_err();

            match err {
                CoreError::InferenceFailed { reason, .. } => {
                    assert!(reason.contains("model.cif"), "reason: {}", reason);
                }
                other => panic!("expected InferenceFailed, got {:?}", other),
            }
        }

        #[tokio::test]
        async fn test_cancellation_stops_long_run() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_script(dir.path(), "sleep 30");
            let pipeline = pipeline_with_script(dir.path(), &script);

            let token = CancellationToken::new();
            let cancel = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                cancel.cancel();
            });

            let started = std::time::Instant::now();
            let err = pipeline
                .run(
                    &TaskSpec::new("task-cancel"),
                    token,
                    Duration::from_secs(60),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, CoreError::TaskCancelled { .. }));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn test_timeout_stops_long_run() {
            let dir = tempfile::tempdir().unwrap();
            let script = fake_script(dir.path(), "sleep 30");
            let pipeline = pipeline_with_script(dir.path(), &script);

            let err = pipeline
                .run(
                    &TaskSpec::new("task-slow"),
                    CancellationToken::new(),
                    Duration::from_millis(100),
                )
                .await
                .unwrap_err();

            assert!(matches!(err, CoreError::TaskTimeout { .. }));
        }
    }

    #[tokio::test]
    async fn test_task_id_with_path_separator_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline_with_script(dir.path(), Path::new("unused.sh"));

        let err = pipeline
            .run(
                &TaskSpec::new("../escape"),
                CancellationToken::new(),
                Duration::from_secs(1),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CoreError::InvalidTask { .. }));
    }
}
