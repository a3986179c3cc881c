//! 任务队列与调度器
//!
//! 进程内优先级队列：同时最多运行 `max_concurrency` 个任务，
//! 失败按指数退避重试，同键的在途请求合并为同一个任务。
//! 去重不是优化而是正确性要求——外部翻译能力本身可能是
//! 资源受限的。
//!
//! 任务状态机：`queued → running → {succeeded | retry-wait → queued | failed}`

pub mod task;

pub use task::{backoff_delay, TaskExec, TaskFuture, TaskHandle, TaskPhase, TaskRef, TaskRequest};

use std::cmp::Ordering as CmpOrdering;
use std::collections::{BinaryHeap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::sync::oneshot;

use crate::config::constants;
use crate::config::TranslationConfig;
use crate::error::{TranslationError, TranslationResult};
use crate::storage::cache::CacheKey;

/// 调度器配置
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// 并发槽位数量
    pub max_concurrency: usize,
    /// 最大重试次数（不含首次执行）
    pub max_attempts: u32,
    /// 退避基础延迟
    pub base_delay: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_concurrency: constants::DEFAULT_MAX_CONCURRENCY,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(constants::DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl From<&TranslationConfig> for SchedulerConfig {
    fn from(config: &TranslationConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
        }
    }
}

/// 队列状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueStatus {
    /// 排队中的任务数
    pub length: usize,
    /// 正在运行的任务数
    pub running_count: usize,
    /// 处于退避等待的任务数
    pub retry_waiting: usize,
}

/// 堆中的队列槽
///
/// 优先级数值小的先出队，同优先级按提交序号先进先出。
/// 槽位可能因任务被取消或重新入队而过期，出队时按任务表校验。
struct QueueSlot {
    priority: i64,
    seq: u64,
    key: CacheKey,
    task_id: u64,
}

impl PartialEq for QueueSlot {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueueSlot {}

impl PartialOrd for QueueSlot {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueSlot {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // BinaryHeap是大顶堆，反转比较让小优先级值先弹出
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// 任务表项
struct TaskState {
    id: u64,
    phase: TaskPhase,
    priority: i64,
    attempt: u32,
    cancelled: bool,
    waiters: Vec<oneshot::Sender<TranslationResult<String>>>,
    execute: TaskExec,
}

#[derive(Default)]
struct State {
    queue: BinaryHeap<QueueSlot>,
    tasks: HashMap<CacheKey, TaskState>,
    running: usize,
    next_seq: u64,
    next_task_id: u64,
}

struct Shared {
    state: Mutex<State>,
    config: SchedulerConfig,
}

/// 翻译任务调度器
///
/// 所有可变状态集中在内部互斥锁之后，外部调用方不直接触碰队列。
/// 克隆是廉价的句柄克隆。
#[derive(Clone)]
pub struct Scheduler {
    shared: Arc<Shared>,
}

impl Scheduler {
    pub fn new(config: SchedulerConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State::default()),
                config,
            }),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.shared.config
    }

    /// 提交任务
    ///
    /// 同键任务已在排队或运行时，新请求挂到现有任务上作为额外的
    /// 等待者（请求合并），不会产生重复执行。
    pub fn submit(&self, request: TaskRequest) -> TaskHandle {
        let mut state = self.lock_state();

        if let Some(existing) = state.tasks.get_mut(&request.key) {
            if !existing.cancelled {
                let (tx, rx) = oneshot::channel();
                existing.waiters.push(tx);
                tracing::debug!(
                    "任务合并: {} 现有 {} 个等待者",
                    request.key.storage_key(),
                    existing.waiters.len()
                );
                let reference = TaskRef {
                    key: request.key,
                    task_id: existing.id,
                };
                return TaskHandle::new(reference, rx);
            }
        }

        let task_id = state.next_task_id;
        state.next_task_id += 1;
        let seq = state.next_seq;
        state.next_seq += 1;

        let (tx, rx) = oneshot::channel();
        state.tasks.insert(
            request.key.clone(),
            TaskState {
                id: task_id,
                phase: TaskPhase::Queued,
                priority: request.priority,
                attempt: 0,
                cancelled: false,
                waiters: vec![tx],
                execute: request.execute,
            },
        );
        state.queue.push(QueueSlot {
            priority: request.priority,
            seq,
            key: request.key.clone(),
            task_id,
        });

        self.pump(&mut state);

        TaskHandle::new(
            TaskRef {
                key: request.key,
                task_id,
            },
            rx,
        )
    }

    /// 取消任务
    ///
    /// 排队或退避等待中的任务直接移除；运行中的任务无法中断，
    /// 其结果到达时被丢弃。两种情况下等待者都立即收到取消错误。
    pub fn cancel(&self, reference: &TaskRef) -> bool {
        let mut state = self.lock_state();

        let Some(task) = state.tasks.get_mut(&reference.key) else {
            return false;
        };
        if task.id != reference.task_id {
            return false;
        }

        match task.phase {
            TaskPhase::Queued | TaskPhase::RetryWait => {
                let waiters = std::mem::take(&mut task.waiters);
                state.tasks.remove(&reference.key);
                notify_waiters(waiters, Err(TranslationError::Cancelled));
                true
            }
            TaskPhase::Running => {
                task.cancelled = true;
                let waiters = std::mem::take(&mut task.waiters);
                notify_waiters(waiters, Err(TranslationError::Cancelled));
                true
            }
        }
    }

    /// 查询队列状态
    pub fn status(&self) -> QueueStatus {
        let state = self.lock_state();
        let mut length = 0;
        let mut retry_waiting = 0;
        for task in state.tasks.values() {
            match task.phase {
                TaskPhase::Queued => length += 1,
                TaskPhase::RetryWait => retry_waiting += 1,
                TaskPhase::Running => {}
            }
        }

        QueueStatus {
            length,
            running_count: state.running,
            retry_waiting,
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// 在有空闲槽位时启动队首任务
    fn pump(&self, state: &mut State) {
        while state.running < self.shared.config.max_concurrency {
            let Some(slot) = state.queue.pop() else {
                break;
            };

            // 校验槽位是否仍然有效：任务可能已被取消或重新入队
            let Some(task) = state.tasks.get_mut(&slot.key) else {
                continue;
            };
            if task.id != slot.task_id || task.phase != TaskPhase::Queued {
                continue;
            }

            task.phase = TaskPhase::Running;
            state.running += 1;

            let execute = Arc::clone(&task.execute);
            let scheduler = self.clone();
            let key = slot.key;
            let task_id = slot.task_id;

            tokio::spawn(async move {
                let result = (execute)().await;
                scheduler.complete(key, task_id, result);
            });
        }
    }

    /// 处理任务的一次执行结果
    fn complete(&self, key: CacheKey, task_id: u64, result: TranslationResult<String>) {
        let mut guard = self.lock_state();
        let state = &mut *guard;

        // 一次执行结束，无论任务表状态如何都要释放槽位
        state.running = state.running.saturating_sub(1);

        let Some(task) = state.tasks.get_mut(&key) else {
            self.pump(state);
            return;
        };
        if task.id != task_id {
            self.pump(state);
            return;
        }

        // 运行中被取消：结果丢弃，等待者已在取消时收到通知
        if task.cancelled {
            state.tasks.remove(&key);
            self.pump(state);
            return;
        }

        match result {
            Ok(text) => {
                let waiters = std::mem::take(&mut task.waiters);
                state.tasks.remove(&key);
                notify_waiters(waiters, Ok(text));
            }
            Err(error) => {
                let retryable =
                    error.is_retryable() && task.attempt < self.shared.config.max_attempts;

                if retryable {
                    let failed_attempt = task.attempt;
                    task.attempt += 1;
                    // 重试任务降级，排在所有新任务之后
                    task.priority += constants::RETRY_PRIORITY_PENALTY;
                    task.phase = TaskPhase::RetryWait;

                    let delay =
                        backoff_delay(&error, failed_attempt, self.shared.config.base_delay);
                    tracing::warn!(
                        "任务 {} 第 {} 次执行失败，{:.1}秒后重试: {}",
                        key.storage_key(),
                        failed_attempt + 1,
                        delay.as_secs_f32(),
                        error
                    );

                    let scheduler = self.clone();
                    let retry_key = key.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(delay).await;
                        scheduler.requeue(retry_key, task_id);
                    });
                } else {
                    tracing::error!("任务 {} 终止失败: {}", key.storage_key(), error);
                    let waiters = std::mem::take(&mut task.waiters);
                    state.tasks.remove(&key);
                    notify_waiters(waiters, Err(error));
                }
            }
        }

        self.pump(state);
    }

    /// 退避结束后重新入队
    fn requeue(&self, key: CacheKey, task_id: u64) {
        let mut state = self.lock_state();

        let Some(task) = state.tasks.get_mut(&key) else {
            // 退避期间被取消
            return;
        };
        if task.id != task_id || task.phase != TaskPhase::RetryWait {
            return;
        }

        task.phase = TaskPhase::Queued;
        let priority = task.priority;
        let seq = state.next_seq;
        state.next_seq += 1;
        state.queue.push(QueueSlot {
            priority,
            seq,
            key,
            task_id,
        });

        self.pump(&mut state);
    }
}

fn notify_waiters(
    waiters: Vec<oneshot::Sender<TranslationResult<String>>>,
    result: TranslationResult<String>,
) {
    for tx in waiters {
        // 等待者可能已放弃，忽略发送失败
        let _ = tx.send(result.clone());
    }
}
