//! 外部能力接口
//!
//! 翻译、语言检测和持久化存储都由宿主应用提供，本模块只定义进程内的
//! 函数契约。引擎核心不关心这些能力背后是本地模型、HTTP服务还是IPC。

use futures::future::BoxFuture;

use crate::error::TranslationResult;

/// 翻译能力
///
/// 失败时应返回规范化的错误分类：不可用 → `CapabilityUnavailable`，
/// 瞬时失败 → `NetworkOrTransient`，限流 → `QuotaExceeded`。
pub trait TranslationCapability: Send + Sync {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslationResult<String>>;
}

/// 语言检测能力
///
/// 检测失败不会中止编排流程，调用方退回 "auto" 占位标签。
pub trait LanguageDetection: Send + Sync {
    fn detect<'a>(&'a self, text: &'a str) -> BoxFuture<'a, TranslationResult<String>>;
}

/// 持久化键值存储
///
/// 仅用于跨进程重启保留缓存内容，缺失时退化为纯内存缓存。
/// 存储失败由缓存层记录日志，不向调用方传播。
pub trait KeyValueStore: Send + Sync {
    fn load(&self, key: &str) -> std::io::Result<Option<String>>;
    fn store(&self, key: &str, value: &str) -> std::io::Result<()>;
}

/// 内存键值存储
///
/// 自带的参考实现，主要服务于测试和无持久化需求的宿主。
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: std::sync::RwLock<std::collections::HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn load(&self, key: &str) -> std::io::Result<Option<String>> {
        let entries = self
            .entries
            .read()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn store(&self, key: &str, value: &str) -> std::io::Result<()> {
        let mut entries = self
            .entries
            .write()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_round_trip() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.load("cache").unwrap(), None);

        store.store("cache", "{\"entries\":[]}").unwrap();
        assert_eq!(
            store.load("cache").unwrap(),
            Some("{\"entries\":[]}".to_string())
        );
    }
}
