//! 简化的配置管理器
//!
//! 提供统一的配置接口，支持文件配置、环境变量和默认值

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::constants;
use crate::error::{TranslationError, TranslationResult};

/// 翻译引擎配置
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TranslationConfig {
    // 基础配置
    pub target_lang: String,
    pub source_lang: String,

    // 调度配置
    pub max_concurrency: usize,
    pub max_attempts: u32,
    pub base_delay_ms: u64,

    // 输入限制
    pub max_text_length: usize,

    // 缓存配置
    pub cache_enabled: bool,
    pub cache_ttl_secs: u64,
    pub cache_max_entries: usize,
}

impl TranslationConfig {
    /// 创建带指定目标语言的默认配置
    pub fn default_with_lang(target_lang: &str) -> Self {
        Self {
            target_lang: target_lang.to_string(),
            ..Self::default()
        }
    }

    /// 验证配置
    pub fn validate(&self) -> TranslationResult<()> {
        if self.target_lang.is_empty() {
            return Err(TranslationError::ConfigError(
                "目标语言不能为空".to_string(),
            ));
        }

        if self.max_concurrency == 0 {
            return Err(TranslationError::ConfigError(
                "最大并发数不能为0".to_string(),
            ));
        }

        if self.max_text_length == 0 {
            return Err(TranslationError::ConfigError(
                "最大文本长度不能为0".to_string(),
            ));
        }

        if self.cache_enabled && self.cache_max_entries == 0 {
            return Err(TranslationError::ConfigError(
                "启用缓存时缓存容量不能为0".to_string(),
            ));
        }

        Ok(())
    }

    /// 应用环境变量覆盖
    pub fn apply_env_overrides(&mut self) {
        if let Ok(lang) = std::env::var("WEBLINGO_TARGET_LANG") {
            self.target_lang = lang;
        }

        if let Ok(lang) = std::env::var("WEBLINGO_SOURCE_LANG") {
            self.source_lang = lang;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_MAX_CONCURRENCY") {
            self.max_concurrency = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_MAX_ATTEMPTS") {
            self.max_attempts = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_BASE_DELAY_MS") {
            self.base_delay_ms = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_MAX_TEXT_LENGTH") {
            self.max_text_length = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_CACHE_ENABLED") {
            self.cache_enabled = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_CACHE_TTL_SECS") {
            self.cache_ttl_secs = value;
        }

        if let Some(value) = read_env_parsed("WEBLINGO_CACHE_MAX_ENTRIES") {
            self.cache_max_entries = value;
        }
    }

    /// 转换为Duration类型
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            target_lang: "zh".to_string(),
            source_lang: constants::AUTO_LANG.to_string(),

            max_concurrency: constants::DEFAULT_MAX_CONCURRENCY,
            max_attempts: constants::DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: constants::DEFAULT_BASE_DELAY_MS,

            max_text_length: constants::DEFAULT_MAX_TEXT_LENGTH,

            cache_enabled: true,
            cache_ttl_secs: constants::DEFAULT_CACHE_TTL.as_secs(),
            cache_max_entries: constants::DEFAULT_CACHE_MAX_ENTRIES,
        }
    }
}

fn read_env_parsed<T: std::str::FromStr>(name: &str) -> Option<T> {
    match std::env::var(name) {
        Ok(raw) => match raw.trim().parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("环境变量 {} 的值无法解析，已忽略: {}", name, raw);
                None
            }
        },
        Err(_) => None,
    }
}

/// 简化的配置管理器
pub struct ConfigManager {
    config: TranslationConfig,
}

impl ConfigManager {
    /// 创建新的配置管理器
    ///
    /// 加载顺序：配置文件 → 环境变量覆盖 → 验证。
    pub fn new() -> TranslationResult<Self> {
        let mut config = Self::load_config()?;
        config.apply_env_overrides();
        config.validate()?;

        Ok(Self { config })
    }

    /// 使用现成配置创建管理器（测试和嵌入场景）
    pub fn with_config(config: TranslationConfig) -> TranslationResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// 获取配置
    pub fn get_config(&self) -> &TranslationConfig {
        &self.config
    }

    /// 从文件加载配置
    fn load_config() -> TranslationResult<TranslationConfig> {
        for path in constants::CONFIG_PATHS {
            let expanded_path = shellexpand::tilde(path);
            if Path::new(expanded_path.as_ref()).exists() {
                tracing::info!("加载配置文件: {}", expanded_path);
                return Self::load_from_file(&expanded_path);
            }
        }

        tracing::info!("未找到配置文件，使用默认配置");
        Ok(TranslationConfig::default())
    }

    /// 从指定文件加载配置
    pub fn load_from_file(path: &str) -> TranslationResult<TranslationConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".toml") {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        } else {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = TranslationConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
