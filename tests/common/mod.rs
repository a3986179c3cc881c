// 集成测试公共模块
//
// 提供文档夹具、可编程的假翻译能力和测试配置

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use futures::future::BoxFuture;

use weblingo::capability::{KeyValueStore, LanguageDetection, TranslationCapability};
use weblingo::document::{shared, DocumentBuilder, NodeId, NodeRole, SharedDocument};
use weblingo::error::{TranslationError, TranslationResult};
use weblingo::ProgressEvent;
use weblingo::TranslationConfig;

/// 快速的测试配置：毫秒级退避，小缓存
pub fn test_config() -> TranslationConfig {
    TranslationConfig {
        target_lang: "zh".to_string(),
        source_lang: "en".to_string(),
        max_concurrency: 4,
        max_attempts: 3,
        base_delay_ms: 5,
        max_text_length: 10000,
        cache_enabled: true,
        cache_ttl_secs: 3600,
        cache_max_entries: 100,
    }
}

/// 假翻译能力的行为模式
pub enum FakeMode {
    /// 返回 "[目标语言] 原文"
    Echo,
    /// 前 n 次调用失败，之后成功
    FailTimes(usize, TranslationError),
    /// 永远失败
    AlwaysFail(TranslationError),
}

/// 可编程的假翻译能力
///
/// 统计总调用次数和每条文本的调用次数，用于验证去重和重试。
pub struct FakeTranslator {
    calls: AtomicUsize,
    per_text: Mutex<HashMap<String, usize>>,
    delay: Duration,
    mode: FakeMode,
}

impl FakeTranslator {
    pub fn echo() -> Self {
        Self {
            calls: AtomicUsize::new(0),
            per_text: Mutex::new(HashMap::new()),
            delay: Duration::from_millis(0),
            mode: FakeMode::Echo,
        }
    }

    pub fn fail_times(times: usize, error: TranslationError) -> Self {
        Self {
            mode: FakeMode::FailTimes(times, error),
            ..Self::echo()
        }
    }

    pub fn always_fail(error: TranslationError) -> Self {
        Self {
            mode: FakeMode::AlwaysFail(error),
            ..Self::echo()
        }
    }

    /// 每次调用前的固定延迟（模拟等延迟网络）
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, text: &str) -> usize {
        self.per_text
            .lock()
            .unwrap()
            .get(text)
            .copied()
            .unwrap_or(0)
    }
}

impl TranslationCapability for FakeTranslator {
    fn translate<'a>(
        &'a self,
        text: &'a str,
        _source_lang: &'a str,
        target_lang: &'a str,
    ) -> BoxFuture<'a, TranslationResult<String>> {
        Box::pin(async move {
            let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
            *self
                .per_text
                .lock()
                .unwrap()
                .entry(text.to_string())
                .or_insert(0) += 1;

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            match &self.mode {
                FakeMode::Echo => Ok(format!("[{}] {}", target_lang, text)),
                FakeMode::FailTimes(times, error) => {
                    if call_index < *times {
                        Err(error.clone())
                    } else {
                        Ok(format!("[{}] {}", target_lang, text))
                    }
                }
                FakeMode::AlwaysFail(error) => Err(error.clone()),
            }
        })
    }
}

/// 假语言检测能力
pub struct FakeDetector {
    pub result: TranslationResult<String>,
}

impl FakeDetector {
    pub fn returning(lang: &str) -> Self {
        Self {
            result: Ok(lang.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            result: Err(TranslationError::CapabilityUnavailable(
                "detector offline".to_string(),
            )),
        }
    }
}

impl LanguageDetection for FakeDetector {
    fn detect<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, TranslationResult<String>> {
        let result = self.result.clone();
        Box::pin(async move { result })
    }
}

/// 永远写入失败的键值存储，用于验证持久化失败不传播
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn load(&self, _key: &str) -> std::io::Result<Option<String>> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "store unavailable",
        ))
    }

    fn store(&self, _key: &str, _value: &str) -> std::io::Result<()> {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "store unavailable",
        ))
    }
}

/// 只有一个标题和一个长段落的最小页面
pub fn heading_and_paragraph_page() -> (SharedDocument, NodeId, NodeId) {
    let mut builder = DocumentBuilder::new();
    let h1 = builder.add_node(NodeId(0), NodeRole::Heading, "Hello");
    let long_text = "This paragraph carries one hundred and twenty characters of body copy, \
                     padded until the length is right today.";
    let p = builder.add_node(NodeId(0), NodeRole::Paragraph, long_text);
    (shared(builder.build()), h1, p)
}

/// 带各种节点类型的完整页面
pub fn full_page() -> SharedDocument {
    let mut builder = DocumentBuilder::new();
    builder.add_node(NodeId(0), NodeRole::Title, "Example Site");
    builder.add_node(NodeId(0), NodeRole::Heading, "Welcome Section");
    builder.add_node(
        NodeId(0),
        NodeRole::Paragraph,
        "A substantial paragraph with enough characters to rank as real content on the page.",
    );
    builder.add_node(NodeId(0), NodeRole::ListItem, "First bullet point");
    builder.add_node(NodeId(0), NodeRole::Link, "Read more");

    let img = builder.add_node(NodeId(0), NodeRole::Image, "");
    builder.set_attr(img, "alt", "Team photo from the launch");
    let input = builder.add_node(NodeId(0), NodeRole::Input, "");
    builder.set_attr(input, "placeholder", "Search articles");

    // 不该被提取的内容
    let code = builder.add_node(NodeId(0), NodeRole::Code, "");
    builder.add_node(code, NodeRole::Paragraph, "fn main() { compute(); }");
    builder.add_node(NodeId(0), NodeRole::Paragraph, "12345");

    shared(builder.build())
}

/// 收集进度事件直到通道关闭
pub async fn collect_events(
    mut rx: tokio::sync::mpsc::UnboundedReceiver<ProgressEvent>,
) -> Vec<ProgressEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
