//! 文档文本提取器
//!
//! 遍历文档树，筛选值得翻译的文本片段，给每个片段分配结构优先级
//! 和可见性标记，产出排好序的提取结果。

use crate::config::constants;
use crate::document::{Document, DocumentNode, NodeId, NodeRole};
use crate::pipeline::filters::{normalize_text, TextFilter};

/// 文本片段的承载位置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// 节点自身的渲染文本
    Text,
    /// alt属性
    Alt,
    /// placeholder属性
    Placeholder,
    /// title属性
    Title,
}

impl UnitKind {
    /// 属性槽名称；渲染文本返回None
    pub fn attr_name(&self) -> Option<&'static str> {
        match self {
            UnitKind::Text => None,
            UnitKind::Alt => Some("alt"),
            UnitKind::Placeholder => Some("placeholder"),
            UnitKind::Title => Some("title"),
        }
    }
}

/// 单个候选翻译片段
///
/// 在一次提取内不可变，提取结果随会话一起丢弃。
#[derive(Debug, Clone)]
pub struct TranslatableUnit {
    /// 在本次提取内唯一的序号（排序后的位置）
    pub id: usize,
    pub node_id: NodeId,
    /// 归一化后的原文
    pub original_text: String,
    /// 结构优先级，数值越小越重要
    pub priority: u8,
    /// 是否在视口内
    pub visible: bool,
    pub kind: UnitKind,
}

impl TranslatableUnit {
    pub fn char_count(&self) -> usize {
        self.original_text.chars().count()
    }
}

/// 文档文本提取器
pub struct TextExtractor {
    filter: TextFilter,
}

impl TextExtractor {
    pub fn new() -> Self {
        Self {
            filter: TextFilter::new(),
        }
    }

    /// 提取可翻译片段，返回排好序的列表
    ///
    /// 排序规则：可见的在前，然后按优先级升序，同优先级按文本长度
    /// 降序（更长的内容视为更有实质性）。
    pub fn extract(&self, document: &Document) -> Vec<TranslatableUnit> {
        let mut units = Vec::new();

        document.walk(|node| {
            if node.engine_ui || node.no_translate || node.role.is_excluded_container() {
                // 整棵子树排除
                return false;
            }

            if node.hidden || node.has_zero_size() {
                return true;
            }

            if let Some((kind, text)) = self.candidate_text(node) {
                let normalized = normalize_text(&text);
                if self.filter.should_translate(&normalized) {
                    let priority = Self::structural_rank(node.role, kind, normalized.chars().count());
                    units.push(TranslatableUnit {
                        id: 0, // 排序后回填
                        node_id: node.id,
                        original_text: normalized,
                        priority,
                        visible: node.in_viewport,
                        kind,
                    });
                }
            }

            true
        });

        units.sort_by(|a, b| {
            b.visible
                .cmp(&a.visible)
                .then_with(|| a.priority.cmp(&b.priority))
                .then_with(|| b.char_count().cmp(&a.char_count()))
        });

        for (index, unit) in units.iter_mut().enumerate() {
            unit.id = index;
        }

        units
    }

    /// 为节点挑选文本来源
    ///
    /// 图像取alt，输入控件取placeholder。其余节点在渲染文本和title
    /// 属性之间取舍：渲染文本优先，除非为空或title明显更长
    /// （携带的信息更多）。
    fn candidate_text(&self, node: &DocumentNode) -> Option<(UnitKind, String)> {
        match node.role {
            NodeRole::Image => node
                .attr("alt")
                .filter(|alt| !alt.trim().is_empty())
                .map(|alt| (UnitKind::Alt, alt.to_string())),
            NodeRole::Input => node
                .attr("placeholder")
                .filter(|p| !p.trim().is_empty())
                .map(|p| (UnitKind::Placeholder, p.to_string())),
            _ => {
                let rendered = normalize_text(&node.text);
                let title_attr = node.attr("title").map(normalize_text).unwrap_or_default();

                if rendered.is_empty() && title_attr.is_empty() {
                    return None;
                }

                if rendered.is_empty() {
                    return Some((UnitKind::Title, title_attr));
                }

                let title_wins = !title_attr.is_empty()
                    && title_attr.chars().count()
                        >= rendered.chars().count() * constants::TITLE_ATTR_PREFERENCE_FACTOR;

                if title_wins {
                    Some((UnitKind::Title, title_attr))
                } else {
                    Some((UnitKind::Text, node.text.clone()))
                }
            }
        }
    }

    /// 固定的结构优先级表
    ///
    /// 页面标题 > 章节标题 > 实质段落 > 列表内容 > 链接 >
    /// 交互控件 > 标签/小文本 > 其他。
    fn structural_rank(role: NodeRole, kind: UnitKind, char_count: usize) -> u8 {
        match kind {
            UnitKind::Alt => 7,
            UnitKind::Placeholder => 5,
            UnitKind::Title => 6,
            UnitKind::Text => match role {
                NodeRole::Title => 0,
                NodeRole::Heading => 1,
                NodeRole::Paragraph => {
                    if char_count > constants::SUBSTANTIAL_PARAGRAPH_CHARS {
                        2
                    } else {
                        6
                    }
                }
                NodeRole::ListItem | NodeRole::TableCell => 3,
                NodeRole::Link => 4,
                NodeRole::Button | NodeRole::Input => 5,
                NodeRole::Label | NodeRole::Caption => 6,
                _ => 7,
            },
        }
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new()
    }
}
