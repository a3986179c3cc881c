//! 突变与还原层
//!
//! 把译文写入文档节点的同时记录还原信息。还原必须逐位精确：
//! 空白、大小写和编码都要与翻译前完全一致。

use std::collections::HashMap;

use crate::document::{Document, NodeId};
use crate::error::{TranslationError, TranslationResult};
use crate::pipeline::extractor::UnitKind;

/// 可还原的节点值变更记录
#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub node_id: NodeId,
    pub kind: UnitKind,
    /// 第一次apply之前的原始值，后续apply不再改写
    pub original_value: String,
    pub applied_value: String,
}

/// 一次页面翻译会话的全部突变记录
///
/// 与提取结果同生命周期：会话结束或整页还原时一起丢弃。
#[derive(Debug, Default)]
pub struct MutationSet {
    records: Vec<MutationRecord>,
    index: HashMap<(NodeId, UnitKind), usize>,
}

impl MutationSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// 把译文应用到节点的指定槽位
    ///
    /// 同一槽位的第二次apply只覆盖可见值，第一条记录里的原始值
    /// 保持权威，保证还原总能回到翻译前的状态。
    pub fn apply(
        &mut self,
        document: &mut Document,
        node_id: NodeId,
        kind: UnitKind,
        translated: &str,
    ) -> TranslationResult<()> {
        let node = document.node_mut(node_id).ok_or_else(|| {
            TranslationError::InternalError(format!("节点 {} 不存在", node_id))
        })?;

        let current = match kind.attr_name() {
            None => node.text.clone(),
            Some(attr) => node.attr(attr).unwrap_or_default().to_string(),
        };

        match self.index.get(&(node_id, kind)) {
            Some(&pos) => {
                self.records[pos].applied_value = translated.to_string();
            }
            None => {
                self.index.insert((node_id, kind), self.records.len());
                self.records.push(MutationRecord {
                    node_id,
                    kind,
                    original_value: current,
                    applied_value: translated.to_string(),
                });
            }
        }

        match kind.attr_name() {
            None => node.text = translated.to_string(),
            Some(attr) => node.set_attr(attr, translated.to_string()),
        }
        node.translated = true;

        Ok(())
    }

    /// 还原单个节点并丢弃它的记录
    ///
    /// 用于单条翻译失败时的局部回退，不影响其余节点。
    pub fn restore_one(&mut self, document: &mut Document, node_id: NodeId) -> bool {
        let mut restored = false;
        let mut remaining = Vec::with_capacity(self.records.len());

        for record in self.records.drain(..) {
            if record.node_id == node_id {
                restore_record(document, &record);
                restored = true;
            } else {
                remaining.push(record);
            }
        }

        self.records = remaining;
        self.rebuild_index();

        if restored {
            if let Some(node) = document.node_mut(node_id) {
                node.translated = false;
            }
        }

        restored
    }

    /// 还原所有记录过的节点并清空记录
    ///
    /// 幂等：第二次调用没有剩余记录，什么都不做。
    pub fn restore_all(&mut self, document: &mut Document) -> usize {
        let count = self.records.len();

        for record in self.records.drain(..) {
            restore_record(document, &record);
            if let Some(node) = document.node_mut(record.node_id) {
                node.translated = false;
            }
        }

        self.index.clear();
        count
    }

    pub fn records(&self) -> &[MutationRecord] {
        &self.records
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (pos, record) in self.records.iter().enumerate() {
            self.index.insert((record.node_id, record.kind), pos);
        }
    }
}

fn restore_record(document: &mut Document, record: &MutationRecord) {
    let Some(node) = document.node_mut(record.node_id) else {
        return;
    };

    match record.kind.attr_name() {
        None => node.text = record.original_value.clone(),
        Some(attr) => node.set_attr(attr, record.original_value.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{DocumentBuilder, NodeRole};

    fn doc_with_paragraph(text: &str) -> (Document, NodeId) {
        let mut builder = DocumentBuilder::new();
        let id = builder.add_node(NodeId(0), NodeRole::Paragraph, text);
        (builder.build(), id)
    }

    #[test]
    fn test_apply_and_restore_round_trip() {
        // 原始值保留了特殊的空白和大小写形态
        let original = "  Hello\tWORLD  ";
        let (mut doc, id) = doc_with_paragraph(original);
        let mut mutations = MutationSet::new();

        mutations.apply(&mut doc, id, UnitKind::Text, "你好世界").unwrap();
        assert_eq!(doc.node(id).unwrap().text, "你好世界");
        assert!(doc.node(id).unwrap().translated);

        mutations.restore_all(&mut doc);
        assert_eq!(doc.node(id).unwrap().text, original, "bit-for-bit restore");
        assert!(!doc.node(id).unwrap().translated);
        assert!(mutations.is_empty());
    }

    #[test]
    fn test_double_apply_keeps_first_original() {
        let (mut doc, id) = doc_with_paragraph("Original");
        let mut mutations = MutationSet::new();

        mutations.apply(&mut doc, id, UnitKind::Text, "第一版").unwrap();
        mutations.apply(&mut doc, id, UnitKind::Text, "第二版").unwrap();

        assert_eq!(doc.node(id).unwrap().text, "第二版");
        assert_eq!(mutations.len(), 1, "one record per slot");

        mutations.restore_all(&mut doc);
        assert_eq!(doc.node(id).unwrap().text, "Original");
    }

    #[test]
    fn test_attribute_mutation() {
        let mut builder = DocumentBuilder::new();
        let img = builder.add_node(NodeId(0), NodeRole::Image, "");
        builder.set_attr(img, "alt", "A mountain");
        let mut doc = builder.build();

        let mut mutations = MutationSet::new();
        mutations.apply(&mut doc, img, UnitKind::Alt, "一座山").unwrap();
        assert_eq!(doc.node(img).unwrap().attr("alt"), Some("一座山"));

        mutations.restore_all(&mut doc);
        assert_eq!(doc.node(img).unwrap().attr("alt"), Some("A mountain"));
    }

    #[test]
    fn test_restore_one_leaves_others_intact() {
        let mut builder = DocumentBuilder::new();
        let a = builder.add_node(NodeId(0), NodeRole::Paragraph, "Alpha");
        let b = builder.add_node(NodeId(0), NodeRole::Paragraph, "Beta");
        let mut doc = builder.build();

        let mut mutations = MutationSet::new();
        mutations.apply(&mut doc, a, UnitKind::Text, "阿尔法").unwrap();
        mutations.apply(&mut doc, b, UnitKind::Text, "贝塔").unwrap();

        assert!(mutations.restore_one(&mut doc, a));
        assert_eq!(doc.node(a).unwrap().text, "Alpha");
        assert_eq!(doc.node(b).unwrap().text, "贝塔", "other node untouched");
        assert_eq!(mutations.len(), 1);

        // 再次还原同一节点是无操作
        assert!(!mutations.restore_one(&mut doc, a));
    }

    #[test]
    fn test_restore_all_is_idempotent() {
        let (mut doc, id) = doc_with_paragraph("Text");
        let mut mutations = MutationSet::new();

        mutations.apply(&mut doc, id, UnitKind::Text, "文本").unwrap();
        assert_eq!(mutations.restore_all(&mut doc), 1);
        assert_eq!(mutations.restore_all(&mut doc), 0);
        assert_eq!(doc.node(id).unwrap().text, "Text");
    }

    #[test]
    fn test_apply_to_missing_node_errors() {
        let (mut doc, _) = doc_with_paragraph("Text");
        let mut mutations = MutationSet::new();

        let result = mutations.apply(&mut doc, NodeId(999), UnitKind::Text, "x");
        assert!(matches!(result, Err(TranslationError::InternalError(_))));
    }
}
