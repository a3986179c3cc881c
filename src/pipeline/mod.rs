//! 文本处理管道模块
//!
//! 负责从文档树中提取可翻译文本并进行智能过滤

pub mod extractor;
pub mod filters;

pub use extractor::{TextExtractor, TranslatableUnit, UnitKind};
pub use filters::{normalize_text, TextFilter};
