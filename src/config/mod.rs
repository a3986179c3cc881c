//! 配置管理模块
//!
//! 提供简化的配置管理，支持环境变量、配置文件和默认值

pub mod manager;

pub use manager::{ConfigManager, TranslationConfig};

/// 配置常量
pub mod constants {
    use std::time::Duration;

    // 调度相关
    pub const DEFAULT_MAX_CONCURRENCY: usize = 10;
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
    pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;
    /// 重试任务每次降级的优先级惩罚，保证重试排在所有新任务之后
    pub const RETRY_PRIORITY_PENALTY: i64 = 1000;
    /// 配额错误的退避放大系数
    pub const QUOTA_BACKOFF_MULTIPLIER: u32 = 4;

    // 文本过滤相关
    pub const MIN_MEANINGFUL_CHARS: usize = 2;
    pub const NON_ALPHABETIC_RATIO: f32 = 0.70;
    pub const SUBSTANTIAL_PARAGRAPH_CHARS: usize = 50;
    /// title 属性只有在比渲染文本长这么多倍时才优先
    pub const TITLE_ATTR_PREFERENCE_FACTOR: usize = 2;
    /// 判定“像标题”的字符数上限
    pub const HEADING_MAX_CHARS: usize = 60;

    // 输入限制
    pub const DEFAULT_MAX_TEXT_LENGTH: usize = 10000;

    // 缓存设置
    pub const DEFAULT_CACHE_MAX_ENTRIES: usize = 1000;
    pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600); // 1小时
    pub const DEFAULT_CACHE_SWEEP_INTERVAL: Duration = Duration::from_secs(300); // 5分钟

    /// 源语言未知时使用的占位语言标签
    pub const AUTO_LANG: &str = "auto";

    // 可翻译属性
    pub const TRANSLATABLE_ATTRS: &[&str] = &["alt", "placeholder", "title"];

    // 配置文件搜索路径
    pub const CONFIG_PATHS: &[&str] = &[
        "weblingo.toml",
        "config.toml",
        ".weblingo.toml",
        "~/.config/weblingo/config.toml",
        "/etc/weblingo/config.toml",
    ];
}

/// 便利函数
pub fn config_file_exists() -> bool {
    constants::CONFIG_PATHS.iter().any(|path| {
        let expanded = shellexpand::tilde(path);
        std::path::Path::new(expanded.as_ref()).exists()
    })
}

/// 加载配置（找不到配置文件时退回默认值）
pub fn load_config(target_lang: &str) -> TranslationConfig {
    match ConfigManager::new() {
        Ok(manager) => {
            let mut config = manager.get_config().clone();
            config.target_lang = target_lang.to_string();
            config
        }
        Err(e) => {
            tracing::warn!("配置加载失败，使用默认配置: {}", e);
            TranslationConfig::default_with_lang(target_lang)
        }
    }
}
