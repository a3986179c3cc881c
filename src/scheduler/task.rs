//! 调度任务类型
//!
//! 定义任务请求、等待句柄和重试退避的计算

use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::oneshot;

use crate::config::constants;
use crate::error::{TranslationError, TranslationResult};
use crate::storage::cache::CacheKey;

/// 任务执行产生的future
pub type TaskFuture = BoxFuture<'static, TranslationResult<String>>;

/// 任务的执行体
///
/// 每次（重试）执行都重新调用闭包构造新的future。
pub type TaskExec = Arc<dyn Fn() -> TaskFuture + Send + Sync>;

/// 提交给调度器的任务请求
pub struct TaskRequest {
    /// 去重键，与缓存键同构
    pub key: CacheKey,
    /// 优先级，数值越小越先执行
    pub priority: i64,
    pub execute: TaskExec,
}

impl TaskRequest {
    pub fn new<F>(key: CacheKey, priority: i64, execute: F) -> Self
    where
        F: Fn() -> TaskFuture + Send + Sync + 'static,
    {
        Self {
            key,
            priority,
            execute: Arc::new(execute),
        }
    }
}

/// 任务状态机阶段
///
/// `queued → running → {succeeded | retry-wait → queued | failed}`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Queued,
    Running,
    RetryWait,
}

/// 取消任务时使用的引用
#[derive(Debug, Clone)]
pub struct TaskRef {
    pub(crate) key: CacheKey,
    pub(crate) task_id: u64,
}

/// 任务等待句柄
///
/// 同键并发请求共享同一个任务，每个句柄是其中一个等待者。
pub struct TaskHandle {
    reference: TaskRef,
    receiver: oneshot::Receiver<TranslationResult<String>>,
}

impl TaskHandle {
    pub(crate) fn new(
        reference: TaskRef,
        receiver: oneshot::Receiver<TranslationResult<String>>,
    ) -> Self {
        Self {
            reference,
            receiver,
        }
    }

    /// 取消用的引用
    pub fn reference(&self) -> TaskRef {
        self.reference.clone()
    }

    /// 等待任务结束
    pub async fn wait(self) -> TranslationResult<String> {
        match self.receiver.await {
            Ok(result) => result,
            // 发送端消失等价于任务被丢弃
            Err(_) => Err(TranslationError::Cancelled),
        }
    }
}

/// 计算重试退避延迟
///
/// 指数退避 `base * 2^attempt`，配额错误的基数放大
/// `QUOTA_BACKOFF_MULTIPLIER` 倍。
pub fn backoff_delay(error: &TranslationError, attempt: u32, base_delay: Duration) -> Duration {
    let base = if matches!(error, TranslationError::QuotaExceeded) {
        base_delay * constants::QUOTA_BACKOFF_MULTIPLIER
    } else {
        base_delay
    };

    base * 2u32.saturating_pow(attempt)
}
