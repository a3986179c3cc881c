//! 批量翻译编排器
//!
//! 给定提取出的片段列表和目标语言：先用缓存分流，命中的立即
//! 应用；未命中的按优先级提交给调度器，结果按到达顺序流回
//! 突变层——这是页面"逐块变成译文"效果的来源。单个片段的
//! 终止失败只标记该片段，不会中止整批。

use std::sync::{Arc, Mutex};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc;

use crate::capability::TranslationCapability;
use crate::config::constants;
use crate::document::{NodeId, SharedDocument};
use crate::error::{TranslationError, TranslationResult};
use crate::mutation::MutationSet;
use crate::pipeline::extractor::TranslatableUnit;
use crate::scheduler::{Scheduler, TaskFuture, TaskRef, TaskRequest};
use crate::storage::cache::{CacheKey, TranslationCache};

use super::service::ServiceStats;

/// 进度事件
///
/// 每个片段解决（成功或终止失败）后都会发出一次，
/// 不是等整批结束才报告。
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    /// 本次解决的节点；空批次的收尾事件里为None
    pub node_id: Option<NodeId>,
    pub total: usize,
    pub completed: usize,
    /// 当前片段原文的截断预览
    pub current_label: String,
    /// round(100 * completed / total)
    pub percentage: u32,
    pub failed: bool,
}

/// 单个片段的最终结果
#[derive(Debug)]
pub struct UnitOutcome {
    pub unit_id: usize,
    pub node_id: NodeId,
    pub result: TranslationResult<String>,
}

/// 批次汇总
#[derive(Debug, Default)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub cache_hits: usize,
    pub outcomes: Vec<UnitOutcome>,
}

/// 批次句柄
///
/// 取消只作用于仍未解决的调度任务，已应用的突变保持原样——
/// 还原是独立的显式操作。
pub struct BatchHandle {
    task_refs: Arc<Mutex<Vec<TaskRef>>>,
    scheduler: Scheduler,
    join: tokio::task::JoinHandle<BatchReport>,
}

impl BatchHandle {
    /// 取消整批中所有未解决的任务
    pub fn cancel(&self) {
        let refs = self
            .task_refs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        let mut cancelled = 0;
        for reference in &refs {
            if self.scheduler.cancel(reference) {
                cancelled += 1;
            }
        }
        tracing::info!("批次取消: {} 个任务被撤销", cancelled);
    }

    /// 等待整批结束
    pub async fn wait(self) -> TranslationResult<BatchReport> {
        self.join
            .await
            .map_err(|e| TranslationError::InternalError(format!("批次任务中止: {}", e)))
    }
}

/// 派生调度优先级
///
/// 结构优先级是主导因素；更短的文本、更靠前的提取位置得到
/// 提升，看起来像标题的文本额外加速。不可见片段整体靠后。
/// 数值越小越先执行。
pub fn derive_task_priority(unit: &TranslatableUnit) -> i64 {
    let chars = unit.char_count() as i64;

    let mut priority = unit.priority as i64 * 1000;
    priority += (unit.id as i64).min(499);
    priority += (chars / 20).min(400);

    if looks_like_heading(unit) {
        priority -= 250;
    }

    if !unit.visible {
        priority += 10_000;
    }

    priority
}

/// 短且首字母大写为主的文本按标题对待
fn looks_like_heading(unit: &TranslatableUnit) -> bool {
    if unit.priority <= 1 {
        return true;
    }

    if unit.char_count() > constants::HEADING_MAX_CHARS {
        return false;
    }

    let words: Vec<&str> = unit.original_text.split_whitespace().collect();
    if words.is_empty() {
        return false;
    }

    let capitalized = words
        .iter()
        .filter(|word| word.chars().next().is_some_and(|c| c.is_uppercase()))
        .count();

    capitalized * 2 > words.len()
}

fn truncate_label(text: &str) -> String {
    const MAX_LABEL_CHARS: usize = 40;
    if text.chars().count() <= MAX_LABEL_CHARS {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(MAX_LABEL_CHARS).collect();
        format!("{}…", truncated)
    }
}

/// 批量翻译编排器
pub struct BatchOrchestrator {
    cache: Arc<TranslationCache>,
    scheduler: Scheduler,
    translator: Arc<dyn TranslationCapability>,
    stats: Arc<ServiceStats>,
    max_text_length: usize,
}

impl BatchOrchestrator {
    pub fn new(
        cache: Arc<TranslationCache>,
        scheduler: Scheduler,
        translator: Arc<dyn TranslationCapability>,
        stats: Arc<ServiceStats>,
        max_text_length: usize,
    ) -> Self {
        Self {
            cache,
            scheduler,
            translator,
            stats,
            max_text_length,
        }
    }

    /// 启动一批翻译
    ///
    /// 立即返回批次句柄；进度事件和突变随结果到达流式产生。
    pub fn start_batch(
        &self,
        document: SharedDocument,
        mutations: Arc<Mutex<MutationSet>>,
        units: Vec<TranslatableUnit>,
        source_lang: String,
        target_lang: String,
        progress: mpsc::UnboundedSender<ProgressEvent>,
    ) -> BatchHandle {
        let task_refs = Arc::new(Mutex::new(Vec::new()));

        let driver = BatchDriver {
            cache: Arc::clone(&self.cache),
            scheduler: self.scheduler.clone(),
            translator: Arc::clone(&self.translator),
            stats: Arc::clone(&self.stats),
            max_text_length: self.max_text_length,
            document,
            mutations,
            source_lang,
            target_lang,
            progress,
            task_refs: Arc::clone(&task_refs),
        };

        let join = tokio::spawn(driver.run(units));

        BatchHandle {
            task_refs,
            scheduler: self.scheduler.clone(),
            join,
        }
    }
}

/// 一次批量翻译的驱动状态
struct BatchDriver {
    cache: Arc<TranslationCache>,
    scheduler: Scheduler,
    translator: Arc<dyn TranslationCapability>,
    stats: Arc<ServiceStats>,
    max_text_length: usize,
    document: SharedDocument,
    mutations: Arc<Mutex<MutationSet>>,
    source_lang: String,
    target_lang: String,
    progress: mpsc::UnboundedSender<ProgressEvent>,
    task_refs: Arc<Mutex<Vec<TaskRef>>>,
}

impl BatchDriver {
    async fn run(self, units: Vec<TranslatableUnit>) -> BatchReport {
        let total = units.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };
        let mut completed = 0usize;

        tracing::info!(
            "批量翻译开始: {} 个片段, {} → {}",
            total,
            self.source_lang,
            self.target_lang
        );

        if total == 0 {
            // 空批次直接收尾
            self.emit(None, 0, 0, String::new(), false);
            return report;
        }

        // 第一步：缓存分流。命中的立即应用并报告进度。
        let mut pending = FuturesUnordered::new();
        for unit in units {
            if let Some(hit) =
                self.cache
                    .get(&unit.original_text, &self.source_lang, &self.target_lang)
            {
                completed += 1;
                report.cache_hits += 1;
                report.succeeded += 1;
                self.stats.inc_cache_hits();
                self.apply_translation(&unit, &hit);
                self.emit(
                    Some(unit.node_id),
                    total,
                    completed,
                    truncate_label(&unit.original_text),
                    false,
                );
                report.outcomes.push(UnitOutcome {
                    unit_id: unit.id,
                    node_id: unit.node_id,
                    result: Ok(hit),
                });
                continue;
            }
            self.stats.inc_cache_misses();

            // 验证在任务创建之前拒绝无效输入
            if let Err(error) = self.validate_unit(&unit) {
                completed += 1;
                report.failed += 1;
                self.stats.inc_units_failed();
                self.emit(
                    Some(unit.node_id),
                    total,
                    completed,
                    truncate_label(&unit.original_text),
                    true,
                );
                report.outcomes.push(UnitOutcome {
                    unit_id: unit.id,
                    node_id: unit.node_id,
                    result: Err(error),
                });
                continue;
            }

            // 第二步：未命中提交调度器
            let handle = self.submit_unit(&unit);
            self.task_refs
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(handle.reference());
            self.stats.inc_tasks_submitted();

            pending.push(async move { (unit, handle.wait().await) });
        }

        // 第三步：按解决顺序流式应用，不等整批
        while let Some((unit, result)) = pending.next().await {
            completed += 1;
            match result {
                Ok(translated) => {
                    self.cache.put(
                        &unit.original_text,
                        &self.source_lang,
                        &self.target_lang,
                        &translated,
                    );
                    self.apply_translation(&unit, &translated);
                    self.stats.inc_translations_completed();
                    report.succeeded += 1;
                    self.emit(
                        Some(unit.node_id),
                        total,
                        completed,
                        truncate_label(&unit.original_text),
                        false,
                    );
                    report.outcomes.push(UnitOutcome {
                        unit_id: unit.id,
                        node_id: unit.node_id,
                        result: Ok(translated),
                    });
                }
                Err(error) => {
                    // 失败片段保留原文，继续处理其余片段
                    self.stats.inc_units_failed();
                    report.failed += 1;
                    self.emit(
                        Some(unit.node_id),
                        total,
                        completed,
                        truncate_label(&unit.original_text),
                        true,
                    );
                    report.outcomes.push(UnitOutcome {
                        unit_id: unit.id,
                        node_id: unit.node_id,
                        result: Err(error),
                    });
                }
            }
        }

        self.cache.persist();

        tracing::info!(
            "批量翻译结束: 成功 {}, 失败 {}, 缓存命中 {}",
            report.succeeded,
            report.failed,
            report.cache_hits
        );

        report
    }

    fn validate_unit(&self, unit: &TranslatableUnit) -> TranslationResult<()> {
        if unit.original_text.trim().is_empty() {
            return Err(TranslationError::InvalidInput("文本为空".to_string()));
        }

        let chars = unit.char_count();
        if chars > self.max_text_length {
            return Err(TranslationError::TextTooLong {
                actual: chars,
                limit: self.max_text_length,
            });
        }

        Ok(())
    }

    fn submit_unit(&self, unit: &TranslatableUnit) -> crate::scheduler::TaskHandle {
        let key = CacheKey::new(&unit.original_text, &self.source_lang, &self.target_lang);
        let priority = derive_task_priority(unit);

        let translator = Arc::clone(&self.translator);
        let text = unit.original_text.clone();
        let source = self.source_lang.clone();
        let target = self.target_lang.clone();

        self.scheduler.submit(TaskRequest::new(key, priority, move || {
            let translator = Arc::clone(&translator);
            let text = text.clone();
            let source = source.clone();
            let target = target.clone();
            let future: TaskFuture = Box::pin(async move {
                translator.translate(&text, &source, &target).await
            });
            future
        }))
    }

    /// 写回文档并登记突变记录
    fn apply_translation(&self, unit: &TranslatableUnit, translated: &str) {
        let mut document = self.document.write().unwrap_or_else(|e| e.into_inner());
        let mut mutations = self.mutations.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(error) = mutations.apply(&mut document, unit.node_id, unit.kind, translated) {
            tracing::warn!("应用译文到节点 {} 失败: {}", unit.node_id, error);
        }
    }

    fn emit(
        &self,
        node_id: Option<NodeId>,
        total: usize,
        completed: usize,
        current_label: String,
        failed: bool,
    ) {
        let percentage = if total == 0 {
            100
        } else {
            (100.0 * completed as f64 / total as f64).round() as u32
        };

        // 接收端可能已经放弃监听
        let _ = self.progress.send(ProgressEvent {
            node_id,
            total,
            completed,
            current_label,
            percentage,
            failed,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extractor::UnitKind;

    fn unit(id: usize, priority: u8, visible: bool, text: &str) -> TranslatableUnit {
        TranslatableUnit {
            id,
            node_id: NodeId(id as u64 + 1),
            original_text: text.to_string(),
            priority,
            visible,
            kind: UnitKind::Text,
        }
    }

    #[test]
    fn test_priority_structural_rank_dominates() {
        let heading = unit(1, 1, true, "Getting Started");
        let paragraph = unit(0, 2, true, &"long body text ".repeat(10));

        assert!(
            derive_task_priority(&heading) < derive_task_priority(&paragraph),
            "heading beats paragraph despite later extraction position"
        );
    }

    #[test]
    fn test_priority_shorter_text_wins_within_rank() {
        let short = unit(5, 3, true, "Short item");
        let long = unit(5, 3, true, &"much longer list item content ".repeat(8));

        assert!(derive_task_priority(&short) < derive_task_priority(&long));
    }

    #[test]
    fn test_priority_invisible_sinks() {
        let visible = unit(0, 7, true, "Footer note text");
        let invisible = unit(0, 0, false, "Offscreen page title");

        assert!(derive_task_priority(&visible) < derive_task_priority(&invisible));
    }

    #[test]
    fn test_title_cased_label_gets_heading_boost() {
        let title_cased = unit(3, 4, true, "Contact Our Sales Team");
        let plain = unit(3, 4, true, "contact our sales team");

        assert!(derive_task_priority(&title_cased) < derive_task_priority(&plain));
    }

    #[test]
    fn test_truncate_label() {
        assert_eq!(truncate_label("short"), "short");
        let long = "x".repeat(80);
        let label = truncate_label(&long);
        assert_eq!(label.chars().count(), 41);
        assert!(label.ends_with('…'));
    }
}
