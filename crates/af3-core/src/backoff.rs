//! 指数退避重试策略
//!
//! 这个模块基于 backoff crate 提供了轻便的重试机制。

use backoff::{Error as BackoffError, ExponentialBackoff, future::retry};
use std::time::Duration;

/// 启动注册的重试策略：注册中心可能尚未就绪，允许较长等待窗口
pub fn registration_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(500),
        max_interval: Duration::from_millis(30000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(300)),
        randomization_factor: 0.1,
        ..Default::default()
    }
}

/// 心跳发送的重试策略：窗口必须短于心跳周期，避免重试挤占下一拍
pub fn heartbeat_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(200),
        max_interval: Duration::from_millis(2000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(10)),
        randomization_factor: 0.2,
        ..Default::default()
    }
}

/// 普通注册中心请求（领取任务、上报结果）的重试策略
pub fn registry_request_backoff() -> ExponentialBackoff {
    ExponentialBackoff {
        initial_interval: Duration::from_millis(100),
        max_interval: Duration::from_millis(2000),
        multiplier: 2.0,
        max_elapsed_time: Some(Duration::from_secs(30)),
        randomization_factor: 0.15,
        ..Default::default()
    }
}

/// 便捷方法：执行重试操作
pub async fn execute_with_backoff<F, Fut, T, E>(
    operation: F,
    backoff: ExponentialBackoff,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display + Send + 'static,
{
    let mut op = operation;
    let wrapped_operation = move || {
        let fut = op();
        async move { fut.await.map_err(BackoffError::transient) }
    };

    // backoff::future::retry 在失败时返回底层错误类型 E
    retry(backoff, wrapped_operation).await
}

/// 带错误分类的重试：仅对被判定为“瞬态”的错误进行重试；否则立即失败
pub async fn execute_with_backoff_selective<F, Fut, T, E>(
    mut operation: F,
    backoff: ExponentialBackoff,
    is_transient: std::sync::Arc<dyn Fn(&E) -> bool + Send + Sync + 'static>,
) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: std::fmt::Display + Send + 'static,
{
    let wrapped_operation = move || {
        let fut = operation();
        let classify = is_transient.clone();
        async move {
            match fut.await {
                Ok(v) => Ok(v),
                Err(e) => {
                    if (classify)(&e) {
                        Err(BackoffError::transient(e))
                    } else {
                        Err(BackoffError::permanent(e))
                    }
                }
            }
        }
    };

    retry(backoff, wrapped_operation).await
}

pub fn delay_for_attempt(cfg: &ExponentialBackoff, attempt: u32) -> Duration {
    // 使用毫秒为单位进行浮点计算，再裁剪到上限
    let base_ms = cfg.initial_interval.as_millis() as f64;
    let factor = cfg.multiplier.powi(attempt as i32);
    let raw_ms = base_ms * factor;
    let capped_ms = raw_ms.min(cfg.max_interval.as_millis() as f64);
    Duration::from_millis(capped_ms as u64)
}
