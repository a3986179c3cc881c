//! 翻译引擎门面
//!
//! 把缓存、调度器、提取器、编排器和突变层装配成对宿主应用的
//! 统一入口。缓存和调度器是引擎级共享资源（整页翻译和单条翻译
//! 共用），提取结果和突变记录归属于当前页面会话，整页还原或
//! 新一轮提取时一起丢弃。
//!
//! 引擎是显式构造、按引用传递的服务对象：类型本身不预设单例，
//! 宿主可以在启动时装配一个进程级实例。

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use tokio::sync::mpsc;

use crate::capability::{KeyValueStore, LanguageDetection, TranslationCapability};
use crate::config::{constants, TranslationConfig};
use crate::document::SharedDocument;
use crate::error::{TranslationError, TranslationResult};
use crate::mutation::MutationSet;
use crate::pipeline::extractor::TextExtractor;
use crate::pipeline::filters::normalize_text;
use crate::scheduler::{QueueStatus, Scheduler, SchedulerConfig, TaskFuture, TaskRequest};
use crate::storage::cache::{CacheConfig, CacheKey, CacheStats, TranslationCache};

use super::orchestrator::{BatchHandle, BatchOrchestrator, ProgressEvent};

/// 一次整页翻译：进度事件流 + 可取消的批次句柄
pub struct PageTranslation {
    pub handle: BatchHandle,
    pub events: mpsc::UnboundedReceiver<ProgressEvent>,
}

/// 翻译引擎
pub struct TranslationEngine {
    config: TranslationConfig,
    document: SharedDocument,
    cache: Arc<TranslationCache>,
    scheduler: Scheduler,
    orchestrator: BatchOrchestrator,
    translator: Arc<dyn TranslationCapability>,
    detector: Option<Arc<dyn LanguageDetection>>,
    extractor: TextExtractor,
    mutations: Arc<Mutex<MutationSet>>,
    stats: Arc<ServiceStats>,
}

impl TranslationEngine {
    /// 创建翻译引擎（纯内存缓存）
    pub fn new(
        config: TranslationConfig,
        document: SharedDocument,
        translator: Arc<dyn TranslationCapability>,
    ) -> TranslationResult<Self> {
        Self::build(config, document, translator, None)
    }

    /// 创建带持久化缓存的翻译引擎
    pub fn with_store(
        config: TranslationConfig,
        document: SharedDocument,
        translator: Arc<dyn TranslationCapability>,
        store: Arc<dyn KeyValueStore>,
    ) -> TranslationResult<Self> {
        Self::build(config, document, translator, Some(store))
    }

    fn build(
        config: TranslationConfig,
        document: SharedDocument,
        translator: Arc<dyn TranslationCapability>,
        store: Option<Arc<dyn KeyValueStore>>,
    ) -> TranslationResult<Self> {
        config.validate()?;

        let cache_config = CacheConfig {
            max_entries: config.cache_max_entries,
            ttl: config.cache_ttl(),
        };
        let cache = Arc::new(match store {
            Some(store) if config.cache_enabled => {
                TranslationCache::with_store(cache_config, store)
            }
            _ => TranslationCache::new(cache_config),
        });

        let scheduler = Scheduler::new(SchedulerConfig::from(&config));
        let stats = Arc::new(ServiceStats::default());

        let orchestrator = BatchOrchestrator::new(
            Arc::clone(&cache),
            scheduler.clone(),
            Arc::clone(&translator),
            Arc::clone(&stats),
            config.max_text_length,
        );

        tracing::info!(
            "翻译引擎已装配: 目标语言 {}, 并发 {}, 缓存容量 {}",
            config.target_lang,
            config.max_concurrency,
            config.cache_max_entries
        );

        Ok(Self {
            config,
            document,
            cache,
            scheduler,
            orchestrator,
            translator,
            detector: None,
            extractor: TextExtractor::new(),
            mutations: Arc::new(Mutex::new(MutationSet::new())),
            stats,
        })
    }

    /// 挂接语言检测能力
    pub fn set_language_detector(&mut self, detector: Arc<dyn LanguageDetection>) {
        self.detector = Some(detector);
    }

    /// 提取整页文本并启动流式翻译
    ///
    /// 返回进度事件流，每个片段解决后推送一次，最后一个事件的
    /// `percentage` 是100。已应用的突变通过 [`restore_page`]
    /// 显式还原。
    ///
    /// [`restore_page`]: TranslationEngine::restore_page
    pub async fn extract_and_translate_page(
        &self,
        target_lang: &str,
    ) -> TranslationResult<PageTranslation> {
        let units = {
            let document = self.document.read().unwrap_or_else(|e| e.into_inner());
            self.extractor.extract(&document)
        };
        self.stats.add_units_extracted(units.len());
        tracing::info!("页面提取完成: {} 个可翻译片段", units.len());

        let source_lang = self.resolve_source_lang(units.first().map(|u| u.original_text.as_str())).await;

        let (tx, rx) = mpsc::unbounded_channel();
        let handle = self.orchestrator.start_batch(
            Arc::clone(&self.document),
            Arc::clone(&self.mutations),
            units,
            source_lang,
            target_lang.to_string(),
            tx,
        );

        Ok(PageTranslation { handle, events: rx })
    }

    /// 还原整页到翻译前的状态
    ///
    /// 同步且幂等；返回被还原的记录数。
    pub fn restore_page(&self) -> usize {
        let mut document = self.document.write().unwrap_or_else(|e| e.into_inner());
        let mut mutations = self.mutations.lock().unwrap_or_else(|e| e.into_inner());

        let restored = mutations.restore_all(&mut document);
        if restored > 0 {
            self.stats.inc_pages_restored();
            tracing::info!("整页还原完成: {} 个节点", restored);
        }
        restored
    }

    /// 还原单个节点
    pub fn restore_node(&self, node_id: crate::document::NodeId) -> bool {
        let mut document = self.document.write().unwrap_or_else(|e| e.into_inner());
        let mut mutations = self.mutations.lock().unwrap_or_else(|e| e.into_inner());
        mutations.restore_one(&mut document, node_id)
    }

    /// 翻译单条文本（输入框、选中文本）
    ///
    /// 与页面引擎共享缓存和调度器，同样享受去重与重试。
    pub async fn translate_single(
        &self,
        text: &str,
        source_lang: Option<&str>,
        target_lang: &str,
    ) -> TranslationResult<String> {
        let normalized = normalize_text(text);
        if normalized.is_empty() {
            return Err(TranslationError::InvalidInput("文本为空".to_string()));
        }

        let chars = normalized.chars().count();
        if chars > self.config.max_text_length {
            return Err(TranslationError::TextTooLong {
                actual: chars,
                limit: self.config.max_text_length,
            });
        }

        let source = match source_lang {
            Some(lang) if lang != constants::AUTO_LANG => lang.to_string(),
            _ => self.resolve_source_lang(Some(&normalized)).await,
        };

        if let Some(hit) = self.cache.get(&normalized, &source, target_lang) {
            self.stats.inc_cache_hits();
            return Ok(hit);
        }
        self.stats.inc_cache_misses();

        let key = CacheKey::new(&normalized, &source, target_lang);
        // 交互式请求按短文本规则提升
        let priority = 100 + (chars as i64 / 20).min(400);

        let translator = Arc::clone(&self.translator);
        let text_owned = normalized.clone();
        let source_owned = source.clone();
        let target_owned = target_lang.to_string();

        let handle = self.scheduler.submit(TaskRequest::new(key, priority, move || {
            let translator = Arc::clone(&translator);
            let text = text_owned.clone();
            let source = source_owned.clone();
            let target = target_owned.clone();
            let future: TaskFuture = Box::pin(async move {
                translator.translate(&text, &source, &target).await
            });
            future
        }));

        let translated = handle.wait().await?;
        self.cache.put(&normalized, &source, target_lang, &translated);
        self.stats.inc_translations_completed();

        Ok(translated)
    }

    /// 缓存统计
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// 队列状态
    pub fn queue_status(&self) -> QueueStatus {
        self.scheduler.status()
    }

    /// 清理过期缓存条目
    ///
    /// 适合按 [`constants::DEFAULT_CACHE_SWEEP_INTERVAL`] 周期性调用；
    /// 不调用也不影响正确性，过期条目在读取时按缺失处理。
    pub fn sweep_cache(&self) -> usize {
        self.cache.sweep()
    }

    /// 清空缓存
    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// 引擎统计快照
    pub fn stats(&self) -> ServiceStatsSnapshot {
        self.stats.snapshot()
    }

    pub fn config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 解析源语言
    ///
    /// 配置了具体源语言时直接使用；否则尝试语言检测，检测失败
    /// 退回 "auto" 占位标签而不是中止编排。
    async fn resolve_source_lang(&self, sample: Option<&str>) -> String {
        if self.config.source_lang != constants::AUTO_LANG {
            return self.config.source_lang.clone();
        }

        let (Some(detector), Some(sample)) = (&self.detector, sample) else {
            return constants::AUTO_LANG.to_string();
        };

        match detector.detect(sample).await {
            Ok(lang) => lang,
            Err(error) => {
                tracing::warn!("语言检测失败，使用auto占位: {}", error);
                constants::AUTO_LANG.to_string()
            }
        }
    }
}

/// 引擎统计信息（线程安全）
///
/// 原子计数器，随操作实时更新，`snapshot()` 取一致视图。
#[derive(Debug, Default)]
pub struct ServiceStats {
    pub units_extracted: AtomicUsize,
    pub tasks_submitted: AtomicUsize,
    pub translations_completed: AtomicUsize,
    pub units_failed: AtomicUsize,
    pub cache_hits: AtomicUsize,
    pub cache_misses: AtomicUsize,
    pub pages_restored: AtomicUsize,
}

impl ServiceStats {
    pub fn add_units_extracted(&self, count: usize) {
        self.units_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_tasks_submitted(&self) {
        self.tasks_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_translations_completed(&self) {
        self.translations_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_units_failed(&self) {
        self.units_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_hits(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_cache_misses(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_pages_restored(&self) {
        self.pages_restored.fetch_add(1, Ordering::Relaxed);
    }

    /// 获取统计数据的一致性快照
    pub fn snapshot(&self) -> ServiceStatsSnapshot {
        ServiceStatsSnapshot {
            units_extracted: self.units_extracted.load(Ordering::Relaxed),
            tasks_submitted: self.tasks_submitted.load(Ordering::Relaxed),
            translations_completed: self.translations_completed.load(Ordering::Relaxed),
            units_failed: self.units_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            pages_restored: self.pages_restored.load(Ordering::Relaxed),
        }
    }
}

/// 统计数据的不可变快照
#[derive(Debug, Clone, Copy)]
pub struct ServiceStatsSnapshot {
    pub units_extracted: usize,
    pub tasks_submitted: usize,
    pub translations_completed: usize,
    pub units_failed: usize,
    pub cache_hits: usize,
    pub cache_misses: usize,
    pub pages_restored: usize,
}
