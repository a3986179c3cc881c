//! 端到端翻译管道集成测试
//!
//! 从文档树提取到流式突变的完整链路

use std::sync::Arc;
use std::time::Duration;

use weblingo::document::{shared, DocumentBuilder, NodeId, NodeRole};
use weblingo::{TranslationConfig, TranslationEngine};

mod common;

use common::{collect_events, full_page, heading_and_paragraph_page, test_config, FakeDetector, FakeTranslator};

fn engine_with(
    config: TranslationConfig,
    document: weblingo::SharedDocument,
    translator: Arc<FakeTranslator>,
) -> TranslationEngine {
    TranslationEngine::new(config, document, translator).expect("engine should assemble")
}

/// 整页翻译：每个片段解决后推送一次进度，completed严格递增，
/// 最后一个事件是100%
#[tokio::test]
async fn test_streaming_progress_monotonicity() {
    let document = full_page();
    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), document, Arc::clone(&translator));

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    let events = collect_events(page.events).await;
    page.handle.wait().await.unwrap();

    let total = events[0].total;
    assert!(total >= 5, "expected the fixture's translatable units, got {}", total);
    assert_eq!(events.len(), total, "one event per resolved unit");

    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.completed, i + 1, "completed strictly increasing");
        let expected = (100.0 * (i + 1) as f64 / total as f64).round() as u32;
        assert_eq!(event.percentage, expected);
        assert!(!event.failed);
    }
    assert_eq!(events.last().unwrap().percentage, 100);

    println!("✅ Streaming progress test passed with {} units", total);
}

/// 提取过滤：代码块和纯数字不进入翻译
#[tokio::test]
async fn test_extraction_skips_untranslatable_content() {
    let document = full_page();
    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), Arc::clone(&document), Arc::clone(&translator));

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    collect_events(page.events).await;
    page.handle.wait().await.unwrap();

    let doc = document.read().unwrap();
    let mut untouched = true;
    doc.walk(|node| {
        if node.text.contains("fn main()") || node.text == "12345" {
            untouched &= !node.translated;
        }
        true
    });
    assert!(untouched, "code and numeric nodes stay untranslated");
}

/// 端到端优先级：等延迟下h1先于120字符的段落被应用
#[tokio::test]
async fn test_heading_applied_before_paragraph() {
    let (document, h1, p) = heading_and_paragraph_page();
    let translator =
        Arc::new(FakeTranslator::echo().with_delay(Duration::from_millis(15)));

    // 单并发让优先级完全决定执行次序
    let config = TranslationConfig {
        max_concurrency: 1,
        ..test_config()
    };
    let engine = engine_with(config, document, Arc::clone(&translator));

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    let events = collect_events(page.events).await;
    page.handle.wait().await.unwrap();

    let resolved: Vec<NodeId> = events.iter().filter_map(|e| e.node_id).collect();
    assert_eq!(resolved, vec![h1, p], "heading mutation observed strictly first");

    println!("✅ End-to-end priority test passed: <h1> before <p>");
}

/// 突变与整页还原：译文写入后还原必须逐位恢复原文
#[tokio::test]
async fn test_page_restore_round_trip() {
    let mut builder = DocumentBuilder::new();
    let original_heading = "Weather  Report"; // 刻意的双空格
    let h = builder.add_node(NodeId(0), NodeRole::Heading, original_heading);
    let img = builder.add_node(NodeId(0), NodeRole::Image, "");
    builder.set_attr(img, "alt", "Satellite view of the storm");
    let document = shared(builder.build());

    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), Arc::clone(&document), translator);

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    collect_events(page.events).await;
    page.handle.wait().await.unwrap();

    {
        let doc = document.read().unwrap();
        assert!(doc.node(h).unwrap().text.starts_with("[zh]"));
        assert!(doc.node(img).unwrap().attr("alt").unwrap().starts_with("[zh]"));
    }

    let restored = engine.restore_page();
    assert_eq!(restored, 2);

    let doc = document.read().unwrap();
    assert_eq!(doc.node(h).unwrap().text, original_heading, "bit-for-bit");
    assert_eq!(
        doc.node(img).unwrap().attr("alt"),
        Some("Satellite view of the storm")
    );
    drop(doc);

    // 还原是幂等的
    assert_eq!(engine.restore_page(), 0);

    println!("✅ Restore round trip test passed");
}

/// 重复文本去重：同样的片段只调用一次翻译能力，两个节点都被更新
#[tokio::test]
async fn test_duplicate_text_translates_once() {
    let mut builder = DocumentBuilder::new();
    let a = builder.add_node(NodeId(0), NodeRole::ListItem, "Repeated label");
    let b = builder.add_node(NodeId(0), NodeRole::ListItem, "Repeated label");
    let document = shared(builder.build());

    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), Arc::clone(&document), Arc::clone(&translator));

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    collect_events(page.events).await;
    let report = page.handle.wait().await.unwrap();

    assert_eq!(report.total, 2);
    assert_eq!(report.succeeded, 2);
    assert_eq!(translator.calls_for("Repeated label"), 1, "coalesced into one call");

    let doc = document.read().unwrap();
    assert_eq!(doc.node(a).unwrap().text, "[zh] Repeated label");
    assert_eq!(doc.node(b).unwrap().text, "[zh] Repeated label");
}

/// 缓存复用：第二次整页翻译完全命中缓存，不再调用能力
#[tokio::test]
async fn test_second_pass_served_from_cache() {
    let document = full_page();
    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), Arc::clone(&document), Arc::clone(&translator));

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    collect_events(page.events).await;
    page.handle.wait().await.unwrap();
    let first_pass_calls = translator.calls();

    engine.restore_page();

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    collect_events(page.events).await;
    let report = page.handle.wait().await.unwrap();

    assert_eq!(translator.calls(), first_pass_calls, "no new capability calls");
    assert_eq!(report.cache_hits, report.total);

    println!("✅ Cache reuse test passed");
}

/// 单条翻译与页面引擎共享缓存
#[tokio::test]
async fn test_translate_single_shares_cache() {
    let document = full_page();
    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), document, Arc::clone(&translator));

    let first = engine
        .translate_single("Standalone input text", None, "zh")
        .await
        .unwrap();
    assert_eq!(first, "[zh] Standalone input text");
    assert_eq!(translator.calls(), 1);

    let second = engine
        .translate_single("Standalone input text", None, "zh")
        .await
        .unwrap();
    assert_eq!(second, first);
    assert_eq!(translator.calls(), 1, "second request is a cache hit");

    let stats = engine.cache_stats();
    assert!(stats.hits >= 1);
}

/// 语言检测失败时退回auto占位，不中止翻译
#[tokio::test]
async fn test_detector_failure_falls_back_to_auto() {
    let document = full_page();
    let translator = Arc::new(FakeTranslator::echo());
    let config = TranslationConfig {
        source_lang: "auto".to_string(),
        ..test_config()
    };
    let mut engine = engine_with(config, document, Arc::clone(&translator));
    engine.set_language_detector(Arc::new(FakeDetector::failing()));

    let result = engine
        .translate_single("Resilient to detector loss", None, "zh")
        .await;
    assert!(result.is_ok(), "orchestration proceeds with auto tag");
}

/// 空页面：没有可翻译片段时仍然收到一个100%的收尾事件
#[tokio::test]
async fn test_empty_page_terminal_event() {
    let document = shared(DocumentBuilder::new().build());
    let translator = Arc::new(FakeTranslator::echo());
    let engine = engine_with(test_config(), document, translator);

    let page = engine.extract_and_translate_page("zh").await.unwrap();
    let events = collect_events(page.events).await;
    page.handle.wait().await.unwrap();

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].percentage, 100);
    assert_eq!(events[0].total, 0);
}

/// 批次取消：未解决的任务被撤销，已应用的突变保留
#[tokio::test]
async fn test_batch_cancellation_keeps_applied_mutations() {
    let mut builder = DocumentBuilder::new();
    let fast = builder.add_node(NodeId(0), NodeRole::Title, "Fast Title");
    for i in 0..6 {
        builder.add_node(
            NodeId(0),
            NodeRole::Paragraph,
            &format!("Queued paragraph number {} with plenty of body text to translate", i),
        );
    }
    let document = shared(builder.build());

    let translator =
        Arc::new(FakeTranslator::echo().with_delay(Duration::from_millis(30)));
    let config = TranslationConfig {
        max_concurrency: 1,
        ..test_config()
    };
    let engine = engine_with(config, Arc::clone(&document), translator);

    let mut page = engine.extract_and_translate_page("zh").await.unwrap();
    // 等第一个（标题）落地后取消剩余批次
    let first = page.events.recv().await.unwrap();
    assert_eq!(first.node_id, Some(fast));
    page.handle.cancel();

    let report = page.handle.wait().await.unwrap();
    assert!(report.succeeded >= 1);
    assert!(report.failed >= 1, "cancelled units count as failed outcomes");

    // 已应用的标题突变保持原样，还原是独立操作
    let doc = document.read().unwrap();
    assert_eq!(doc.node(fast).unwrap().text, "[zh] Fast Title");

    println!("✅ Batch cancellation test passed");
}
