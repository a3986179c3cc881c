//! 引擎核心模块
//!
//! 批量编排器负责把提取结果变成流式的翻译操作，
//! 引擎门面把缓存、调度器、提取器和突变层装配在一起。

pub mod orchestrator;
pub mod service;

pub use orchestrator::{
    derive_task_priority, BatchHandle, BatchOrchestrator, BatchReport, ProgressEvent, UnitOutcome,
};
pub use service::{PageTranslation, ServiceStats, ServiceStatsSnapshot, TranslationEngine};
