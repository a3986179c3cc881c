//! 翻译引擎统一错误处理
//!
//! 提供结构化错误类型和重试分类机制

use std::fmt;

use thiserror::Error;

/// 翻译错误类型
///
/// 错误分类是调度器重试策略的依据：`CapabilityUnavailable` 严格不可重试，
/// 无法归类的瞬时失败统一落入可重试的 `NetworkOrTransient`。
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TranslationError {
    /// 翻译能力无法初始化或不可用（不可重试）
    #[error("翻译能力不可用: {0}")]
    CapabilityUnavailable(String),

    /// 网络或瞬时错误（可重试）
    #[error("网络或瞬时错误: {0}")]
    NetworkOrTransient(String),

    /// 配额用尽（可重试，退避时间更长）
    #[error("请求配额已用尽")]
    QuotaExceeded,

    /// 输入验证错误（调度前拒绝）
    #[error("输入无效: {0}")]
    InvalidInput(String),

    /// 文本超出长度限制（调度前拒绝）
    #[error("文本过长: {actual} 字符，上限 {limit}")]
    TextTooLong { actual: usize, limit: usize },

    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 任务在完成前被取消
    #[error("任务已取消")]
    Cancelled,

    /// 内部错误
    #[error("内部错误: {0}")]
    InternalError(String),
}

impl TranslationError {
    /// 检查错误是否可重试
    pub fn is_retryable(&self) -> bool {
        match self {
            TranslationError::NetworkOrTransient(_) => true,
            TranslationError::QuotaExceeded => true,
            TranslationError::CapabilityUnavailable(_) => false,
            TranslationError::InvalidInput(_) => false,
            TranslationError::TextTooLong { .. } => false,
            TranslationError::ConfigError(_) => false,
            TranslationError::CacheError(_) => false,
            TranslationError::Cancelled => false,
            TranslationError::InternalError(_) => false,
        }
    }

    /// 获取错误的严重程度
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            TranslationError::CapabilityUnavailable(_) => ErrorSeverity::Critical,
            TranslationError::NetworkOrTransient(_) => ErrorSeverity::Warning,
            TranslationError::QuotaExceeded => ErrorSeverity::Warning,
            TranslationError::InvalidInput(_) => ErrorSeverity::Info,
            TranslationError::TextTooLong { .. } => ErrorSeverity::Info,
            TranslationError::ConfigError(_) => ErrorSeverity::Critical,
            TranslationError::CacheError(_) => ErrorSeverity::Warning,
            TranslationError::Cancelled => ErrorSeverity::Info,
            TranslationError::InternalError(_) => ErrorSeverity::Critical,
        }
    }

    /// 获取错误类别
    pub fn category(&self) -> ErrorCategory {
        match self {
            TranslationError::CapabilityUnavailable(_) => ErrorCategory::Capability,
            TranslationError::NetworkOrTransient(_) => ErrorCategory::Network,
            TranslationError::QuotaExceeded => ErrorCategory::RateLimit,
            TranslationError::InvalidInput(_) => ErrorCategory::Input,
            TranslationError::TextTooLong { .. } => ErrorCategory::Input,
            TranslationError::ConfigError(_) => ErrorCategory::Configuration,
            TranslationError::CacheError(_) => ErrorCategory::Cache,
            TranslationError::Cancelled => ErrorCategory::Cancellation,
            TranslationError::InternalError(_) => ErrorCategory::Internal,
        }
    }

    /// 把外部能力返回的未知失败归入规范分类
    ///
    /// 无法识别的消息一律按瞬时错误处理，由重试策略兜底。
    pub fn classify_capability_failure<T: fmt::Display>(message: T) -> Self {
        let msg = message.to_string();
        let lower = msg.to_lowercase();

        if lower.contains("unavailable") || lower.contains("not initialized") {
            TranslationError::CapabilityUnavailable(msg)
        } else if lower.contains("quota") || lower.contains("rate limit") {
            TranslationError::QuotaExceeded
        } else {
            TranslationError::NetworkOrTransient(msg)
        }
    }
}

/// 错误严重程度
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Critical,
}

/// 错误类别
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    Capability,
    Network,
    RateLimit,
    Input,
    Configuration,
    Cache,
    Cancellation,
    Internal,
}

impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::NetworkOrTransient(format!("IO错误: {}", error))
    }
}

impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::CacheError(format!("JSON序列化错误: {}", error))
    }
}

impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::ConfigError(format!("TOML解析错误: {}", error))
    }
}

/// 错误结果类型别名
pub type TranslationResult<T> = Result<T, TranslationError>;
