//! # weblingo
//!
//! 客户端文本翻译编排引擎。宿主应用把页面映射成可寻址的文档树，
//! 引擎负责剩下的一切：
//!
//! - **pipeline**: 文本提取与过滤（哪些片段值得翻译、按什么顺序）
//! - **scheduler**: 有界并发的优先级任务队列，指数退避重试，同键请求合并
//! - **storage**: 内容寻址的结果缓存，TTL过期 + LRU容量上限
//! - **mutation**: 可逐位还原的文档突变层
//! - **engine**: 批量编排器与引擎门面
//! - **capability**: 宿主提供的翻译/语言检测/持久化能力接口
//!
//! # 基本用法
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use weblingo::{DocumentBuilder, NodeId, NodeRole, TranslationConfig, TranslationEngine};
//! # use weblingo::capability::TranslationCapability;
//! # fn translator() -> Arc<dyn TranslationCapability> { unimplemented!() }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut builder = DocumentBuilder::new();
//! builder.add_node(NodeId(0), NodeRole::Heading, "Hello");
//! let document = weblingo::document::shared(builder.build());
//!
//! let config = TranslationConfig::default_with_lang("zh");
//! let engine = TranslationEngine::new(config, document, translator())?;
//!
//! let mut page = engine.extract_and_translate_page("zh").await?;
//! while let Some(event) = page.events.recv().await {
//!     println!("{}% {}", event.percentage, event.current_label);
//! }
//!
//! engine.restore_page();
//! # Ok(())
//! # }
//! ```

pub mod capability;
pub mod config;
pub mod document;
pub mod engine;
pub mod error;
pub mod mutation;
pub mod pipeline;
pub mod scheduler;
pub mod storage;

// ============================================================================
// 核心API导出
// ============================================================================

pub use config::{constants, ConfigManager, TranslationConfig};
pub use document::{Document, DocumentBuilder, DocumentNode, NodeId, NodeRole, SharedDocument};
pub use engine::{
    BatchHandle, BatchReport, PageTranslation, ProgressEvent, ServiceStats, ServiceStatsSnapshot,
    TranslationEngine, UnitOutcome,
};
pub use error::{ErrorCategory, ErrorSeverity, TranslationError, TranslationResult};
pub use mutation::{MutationRecord, MutationSet};
pub use pipeline::{TextExtractor, TextFilter, TranslatableUnit, UnitKind};
pub use scheduler::{QueueStatus, Scheduler, SchedulerConfig, TaskHandle, TaskRequest};
pub use storage::{CacheConfig, CacheKey, CacheStats, TranslationCache};

// ============================================================================
// 便利函数
// ============================================================================

/// 检查文本是否应该翻译
///
/// # Examples
///
/// ```rust
/// use weblingo::should_translate;
///
/// assert!(should_translate("Hello World"));
/// assert!(!should_translate("12345"));
/// assert!(!should_translate(""));
/// ```
pub fn should_translate(text: &str) -> bool {
    let filter = pipeline::TextFilter::new();
    filter.should_translate(text)
}

/// 归一化文本（压缩空白 + 去首尾空白）
pub fn normalize_text(text: &str) -> String {
    pipeline::normalize_text(text)
}

/// 模块初始化日志
pub fn init() {
    tracing::info!("weblingo 引擎 v{} 已加载", env!("CARGO_PKG_VERSION"));
}
