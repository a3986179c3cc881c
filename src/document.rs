//! 通用文档树模型
//!
//! 引擎不直接依赖任何具体的DOM实现：宿主把页面映射成一棵可寻址的
//! 节点树，每个节点带角色标签、自身渲染文本和命名属性槽
//! （alt / placeholder / title）。任何树形文档模型都能满足这个契约。

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// 节点的稳定地址
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 节点角色
///
/// 提取器用固定的角色集合判定候选节点和结构优先级。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    /// 页面级标题
    Title,
    /// 章节标题
    Heading,
    Paragraph,
    ListItem,
    Link,
    Button,
    Label,
    TableCell,
    Caption,
    /// 图像（alt属性承载文本）
    Image,
    /// 输入控件（placeholder属性承载文本）
    Input,
    /// 不带自有文本语义的容器
    Container,
    // 以下角色整棵子树都排除在提取之外
    Code,
    Script,
    Style,
    Other,
}

impl NodeRole {
    /// 该角色的子树是否整体排除在提取之外
    pub fn is_excluded_container(&self) -> bool {
        matches!(self, NodeRole::Code | NodeRole::Script | NodeRole::Style)
    }
}

/// 文档节点
///
/// `text` 只包含节点自身的直接文本，子节点的文本永远不会折叠进祖先，
/// 这样嵌套的可提取元素天然不会与祖先重复。
#[derive(Debug, Clone)]
pub struct DocumentNode {
    pub id: NodeId,
    pub role: NodeRole,
    /// 节点自身的渲染文本（未归一化的原始值）
    pub text: String,
    /// 命名属性槽
    pub attrs: HashMap<String, String>,
    /// 显式隐藏状态
    pub hidden: bool,
    pub width: u32,
    pub height: u32,
    /// 当前是否在视口内
    pub in_viewport: bool,
    /// 显式标记为不可翻译
    pub no_translate: bool,
    /// 属于翻译助手自身的界面
    pub engine_ui: bool,
    /// 已应用翻译的标记
    pub translated: bool,
    pub children: Vec<NodeId>,
}

impl DocumentNode {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs.get(name).map(|s| s.as_str())
    }

    pub fn set_attr(&mut self, name: &str, value: String) {
        self.attrs.insert(name.to_string(), value);
    }

    /// 零尺寸节点视为不可见
    pub fn has_zero_size(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// 以NodeId寻址的文档树
#[derive(Debug, Clone)]
pub struct Document {
    nodes: HashMap<NodeId, DocumentNode>,
    root: NodeId,
}

impl Document {
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> Option<&DocumentNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut DocumentNode> {
        self.nodes.get_mut(&id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// 按文档顺序深度优先遍历
    ///
    /// 回调返回 `false` 时跳过该节点的整棵子树。
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&DocumentNode) -> bool,
    {
        self.walk_from(self.root, &mut visit);
    }

    fn walk_from<F>(&self, id: NodeId, visit: &mut F)
    where
        F: FnMut(&DocumentNode) -> bool,
    {
        let Some(node) = self.nodes.get(&id) else {
            return;
        };

        if !visit(node) {
            return;
        }

        for child in node.children.clone() {
            self.walk_from(child, visit);
        }
    }
}

/// 共享文档句柄
///
/// 翻译结果是流式到达的，突变层需要在异步任务中写回文档。
pub type SharedDocument = Arc<RwLock<Document>>;

pub fn shared(document: Document) -> SharedDocument {
    Arc::new(RwLock::new(document))
}

/// 文档构建器
///
/// 宿主和测试用它把页面装配成节点树。
pub struct DocumentBuilder {
    nodes: HashMap<NodeId, DocumentNode>,
    next_id: u64,
    root: NodeId,
}

impl DocumentBuilder {
    pub fn new() -> Self {
        let root_id = NodeId(0);
        let mut nodes = HashMap::new();
        nodes.insert(
            root_id,
            DocumentNode {
                id: root_id,
                role: NodeRole::Container,
                text: String::new(),
                attrs: HashMap::new(),
                hidden: false,
                width: 1920,
                height: 1080,
                in_viewport: true,
                no_translate: false,
                engine_ui: false,
                translated: false,
                children: Vec::new(),
            },
        );

        Self {
            nodes,
            next_id: 1,
            root: root_id,
        }
    }

    /// 添加节点，返回新节点的id
    pub fn add_node(&mut self, parent: NodeId, role: NodeRole, text: &str) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;

        self.nodes.insert(
            id,
            DocumentNode {
                id,
                role,
                text: text.to_string(),
                attrs: HashMap::new(),
                hidden: false,
                width: 800,
                height: 24,
                in_viewport: true,
                no_translate: false,
                engine_ui: false,
                translated: false,
                children: Vec::new(),
            },
        );

        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }

        id
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.set_attr(name, value.to_string());
        }
        self
    }

    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.hidden = hidden;
        }
        self
    }

    pub fn set_size(&mut self, id: NodeId, width: u32, height: u32) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.width = width;
            node.height = height;
        }
        self
    }

    pub fn set_in_viewport(&mut self, id: NodeId, in_viewport: bool) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.in_viewport = in_viewport;
        }
        self
    }

    pub fn set_no_translate(&mut self, id: NodeId, no_translate: bool) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.no_translate = no_translate;
        }
        self
    }

    pub fn set_engine_ui(&mut self, id: NodeId, engine_ui: bool) -> &mut Self {
        if let Some(node) = self.nodes.get_mut(&id) {
            node.engine_ui = engine_ui;
        }
        self
    }

    pub fn build(self) -> Document {
        Document {
            nodes: self.nodes,
            root: self.root,
        }
    }
}

impl Default for DocumentBuilder {
    fn default() -> Self {
        Self::new()
    }
}
