//! 翻译结果缓存
//!
//! 内容寻址的记忆化存储：键由归一化文本的哈希加语言对组成，
//! 条目带TTL过期和LRU容量上限。持久化是尽力而为的，存储失败
//! 只记日志，不影响内存视图。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::capability::KeyValueStore;
use crate::config::constants;

/// 持久化快照使用的存储键
const STORE_KEY: &str = "weblingo.cache.v1";

// ============================================================================
// 核心类型
// ============================================================================

/// 缓存键：归一化文本哈希 + 语言对
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    hash: String,
    source_lang: String,
    target_lang: String,
}

impl CacheKey {
    /// 生成缓存键
    ///
    /// 文本先做 trim + 小写 + 空白压缩，再用blake3哈希，
    /// 保证同一内容的不同空白形态命中同一条目。
    pub fn new(text: &str, source_lang: &str, target_lang: &str) -> Self {
        let normalized = Self::normalize(text);
        let hash = blake3::hash(normalized.as_bytes()).to_hex().to_string();

        Self {
            hash,
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        }
    }

    fn normalize(text: &str) -> String {
        text.split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }

    /// 存储用的复合键字符串
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.source_lang, self.target_lang, self.hash)
    }
}

/// 缓存条目
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub translated_text: String,
    pub created_at: Instant,
    pub last_accessed: Instant,
    pub access_count: u64,
}

impl CacheEntry {
    pub fn new(translated_text: String) -> Self {
        let now = Instant::now();
        Self {
            translated_text,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    /// 更新访问信息
    pub fn access(&mut self) {
        self.access_count += 1;
        self.last_accessed = Instant::now();
    }

    /// 检查条目是否过期
    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.created_at.elapsed() > ttl
    }
}

/// 缓存配置
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: constants::DEFAULT_CACHE_MAX_ENTRIES,
            ttl: constants::DEFAULT_CACHE_TTL,
        }
    }
}

/// 缓存统计信息
///
/// 命中/未命中计数单调递增，直到显式 `clear()`。
#[derive(Debug, Default, Clone)]
pub struct CacheStats {
    pub entry_count: usize,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expired_removed: u64,
}

impl CacheStats {
    /// 计算缓存命中率，无请求时为0
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

#[derive(Debug, Default)]
struct Counters {
    hits: u64,
    misses: u64,
    evictions: u64,
    expired_removed: u64,
}

/// 持久化快照
#[derive(Debug, Serialize, Deserialize)]
struct PersistedCache {
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    hash: String,
    source_lang: String,
    target_lang: String,
    translated_text: String,
}

// ============================================================================
// 缓存实现
// ============================================================================

/// 翻译缓存
pub struct TranslationCache {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    config: CacheConfig,
    counters: RwLock<Counters>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl TranslationCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            config,
            counters: RwLock::new(Counters::default()),
            store: None,
        }
    }

    /// 创建带持久化后端的缓存，启动时尽力恢复快照
    pub fn with_store(config: CacheConfig, store: Arc<dyn KeyValueStore>) -> Self {
        let cache = Self {
            entries: RwLock::new(HashMap::new()),
            config,
            counters: RwLock::new(Counters::default()),
            store: Some(store),
        };
        cache.load_persisted();
        cache
    }

    /// 查询缓存
    ///
    /// 过期条目视为未命中并立即删除。
    pub fn get(&self, text: &str, source_lang: &str, target_lang: &str) -> Option<String> {
        let key = CacheKey::new(text, source_lang, target_lang);
        self.get_by_key(&key)
    }

    pub fn get_by_key(&self, key: &CacheKey) -> Option<String> {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());

        if let Some(entry) = entries.get_mut(key) {
            if !entry.is_expired(self.config.ttl) {
                entry.access();
                counters.hits += 1;
                return Some(entry.translated_text.clone());
            }
            entries.remove(key);
            counters.expired_removed += 1;
        }

        counters.misses += 1;
        None
    }

    /// 写入缓存
    ///
    /// 覆盖同键条目并重置创建时间。插入后如果超出容量上限，
    /// 按 `last_accessed` 升序淘汰，直到回到上限以内。
    pub fn put(&self, text: &str, source_lang: &str, target_lang: &str, result: &str) {
        let key = CacheKey::new(text, source_lang, target_lang);
        self.put_by_key(key, result);
    }

    pub fn put_by_key(&self, key: CacheKey, result: &str) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, CacheEntry::new(result.to_string()));

        let mut evicted = 0u64;
        while entries.len() > self.config.max_entries {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_accessed)
                .map(|(key, _)| key.clone());

            match oldest {
                Some(key) => {
                    entries.remove(&key);
                    evicted += 1;
                }
                None => break,
            }
        }

        if evicted > 0 {
            let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
            counters.evictions += evicted;
        }
    }

    /// 清理所有过期条目，返回删除数量
    pub fn sweep(&self) -> usize {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        let ttl = self.config.ttl;
        entries.retain(|_, entry| !entry.is_expired(ttl));
        let removed = before - entries.len();

        if removed > 0 {
            let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
            counters.expired_removed += removed as u64;
            tracing::debug!("缓存清理删除了 {} 个过期条目", removed);
        }

        removed
    }

    /// 清空缓存并重置统计
    pub fn clear(&self) {
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.clear();

        let mut counters = self.counters.write().unwrap_or_else(|e| e.into_inner());
        *counters = Counters::default();
    }

    /// 获取统计信息快照
    pub fn stats(&self) -> CacheStats {
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let counters = self.counters.read().unwrap_or_else(|e| e.into_inner());

        CacheStats {
            entry_count: entries.len(),
            hits: counters.hits,
            misses: counters.misses,
            evictions: counters.evictions,
            expired_removed: counters.expired_removed,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// 把当前未过期条目写入持久化存储
    ///
    /// 尽力而为：存储失败记日志后返回，内存视图保持权威。
    pub fn persist(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let snapshot = {
            let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
            let ttl = self.config.ttl;
            PersistedCache {
                entries: entries
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired(ttl))
                    .map(|(key, entry)| PersistedEntry {
                        hash: key.hash.clone(),
                        source_lang: key.source_lang.clone(),
                        target_lang: key.target_lang.clone(),
                        translated_text: entry.translated_text.clone(),
                    })
                    .collect(),
            }
        };

        let payload = match serde_json::to_string(&snapshot) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!("缓存快照序列化失败: {}", e);
                return;
            }
        };

        if let Err(e) = store.store(STORE_KEY, &payload) {
            tracing::warn!("缓存持久化失败，内存缓存继续生效: {}", e);
        }
    }

    /// 从持久化存储恢复条目，失败时静默退化为空缓存
    fn load_persisted(&self) {
        let Some(store) = &self.store else {
            return;
        };

        let payload = match store.load(STORE_KEY) {
            Ok(Some(payload)) => payload,
            Ok(None) => return,
            Err(e) => {
                tracing::warn!("读取缓存快照失败: {}", e);
                return;
            }
        };

        let snapshot: PersistedCache = match serde_json::from_str(&payload) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("缓存快照解析失败: {}", e);
                return;
            }
        };

        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        let count = snapshot.entries.len();
        for persisted in snapshot.entries {
            let key = CacheKey {
                hash: persisted.hash,
                source_lang: persisted.source_lang,
                target_lang: persisted.target_lang,
            };
            // 恢复的条目按新建处理，TTL重新计时
            entries.insert(key, CacheEntry::new(persisted.translated_text));
        }

        tracing::info!("从持久化存储恢复了 {} 个缓存条目", count);
    }
}
