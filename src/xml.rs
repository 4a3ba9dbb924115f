//! XML Tree Module
//!
//! quick-xmlのイベントストリームから構築する、読み取り専用のアリーナ型XMLツリー。
//! DOCX・PPTX・ODF・OFDの各アダプターが使用します。
//!
//! ノードは`NodeId`で識別され、訪問済み集合のキーとしてそのまま使えます。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::DocParserError;

/// ツリー内のノード識別子
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

#[derive(Debug)]
enum NodeKind {
    Element {
        name: String,
        attributes: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug)]
struct Node {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// 解析済みのXML文書
///
/// # 使用例
///
/// ```rust
/// use docparser::xml::XmlDocument;
///
/// let doc = XmlDocument::parse(br#"<a:p><a:r><a:t>Hello</a:t></a:r></a:p>"#).unwrap();
/// let root = doc.root();
/// assert_eq!(doc.name(root), "a:p");
/// assert_eq!(doc.local_name(root), "p");
/// assert_eq!(doc.text(root), "Hello");
/// ```
#[derive(Debug)]
pub struct XmlDocument {
    nodes: Vec<Node>,
    root: NodeId,
}

impl XmlDocument {
    /// バイト列をXMLツリーに変換する
    ///
    /// # 戻り値
    ///
    /// * `Ok(XmlDocument)` - 解析に成功した場合
    /// * `Err(DocParserError::Xml)` - 整形式でない場合、またはルート要素がない場合
    pub fn parse(bytes: &[u8]) -> Result<Self, DocParserError> {
        let mut reader = Reader::from_reader(bytes);
        // テキストの前後の空白を保持する（`w:t`や`a:t`の空白は意味を持つ）
        reader.trim_text(false);

        // インデックス0は文書ノード（要素ではない）
        let mut nodes = vec![Node {
            kind: NodeKind::Element {
                name: String::new(),
                attributes: Vec::new(),
            },
            parent: None,
            children: Vec::new(),
        }];
        let mut stack = vec![NodeId(0)];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => {
                    let id = push_element(&reader, &mut nodes, &stack, &e)?;
                    stack.push(id);
                }
                Ok(Event::Empty(e)) => {
                    push_element(&reader, &mut nodes, &stack, &e)?;
                }
                Ok(Event::End(_)) => {
                    if stack.len() > 1 {
                        stack.pop();
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = match e.unescape() {
                        Ok(text) => text.into_owned(),
                        Err(_) => String::from_utf8_lossy(&e).into_owned(),
                    };
                    push_text(&mut nodes, &stack, text);
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    push_text(&mut nodes, &stack, text);
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(e) => {
                    return Err(DocParserError::Xml(format!(
                        "Error at position {}: {}",
                        reader.buffer_position(),
                        e
                    )))
                }
            }
            buf.clear();
        }

        let root = nodes[0]
            .children
            .iter()
            .copied()
            .find(|id| matches!(nodes[id.0].kind, NodeKind::Element { .. }))
            .ok_or_else(|| DocParserError::Xml("Document has no root element".to_string()))?;

        Ok(Self { nodes, root })
    }

    /// ルート要素
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// 要素の修飾名（例: `w:p`）。テキストノードの場合は空文字列
    pub fn name(&self, id: NodeId) -> &str {
        match &self.nodes[id.0].kind {
            NodeKind::Element { name, .. } => name,
            NodeKind::Text(_) => "",
        }
    }

    /// 名前空間プレフィックスを除いたローカル名（例: `p`）
    pub fn local_name(&self, id: NodeId) -> &str {
        let name = self.name(id);
        name.rsplit_once(':').map_or(name, |(_, local)| local)
    }

    /// 要素ノードかどうか
    pub fn is_element(&self, id: NodeId) -> bool {
        matches!(self.nodes[id.0].kind, NodeKind::Element { .. })
    }

    /// テキストノードの内容（要素ノードの場合は`None`）
    pub fn node_text(&self, id: NodeId) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => Some(text),
            NodeKind::Element { .. } => None,
        }
    }

    /// 親ノード（ルート要素の場合は`None`）
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent.filter(|parent| parent.0 != 0)
    }

    /// すべての子ノード（要素とテキスト、文書順）
    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// 子要素のみを列挙する
    pub fn element_children(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.children(id)
            .iter()
            .copied()
            .filter(move |&child| self.is_element(child))
    }

    /// 指定した修飾名を持つ子要素を列挙する
    pub fn children_named<'a>(
        &'a self,
        id: NodeId,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.element_children(id)
            .filter(move |&child| self.name(child) == name)
    }

    /// 指定した修飾名を持つ最初の子要素
    pub fn child(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.children_named(id, name).next()
    }

    /// 名前空間プレフィックスを無視して、ローカル名で子要素を列挙する
    pub fn children_local<'a>(
        &'a self,
        id: NodeId,
        local_name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.element_children(id)
            .filter(move |&child| self.local_name(child) == local_name)
    }

    /// ローカル名で最初の子要素を検索する
    pub fn child_local(&self, id: NodeId, local_name: &str) -> Option<NodeId> {
        self.children_local(id, local_name).next()
    }

    /// 属性値（修飾名で検索）
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        match &self.nodes[id.0].kind {
            NodeKind::Element { attributes, .. } => attributes
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            NodeKind::Text(_) => None,
        }
    }

    /// 子孫のテキストをすべて連結した文字列
    pub fn text(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(id, &mut out);
        out
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0].kind {
            NodeKind::Text(text) => out.push_str(text),
            NodeKind::Element { .. } => {
                for &child in &self.nodes[id.0].children {
                    self.collect_text(child, out);
                }
            }
        }
    }

    /// 子孫の要素を文書順（前順）で列挙する（自身は含まない）
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(current) = stack.pop() {
            if !self.is_element(current) {
                continue;
            }
            out.push(current);
            stack.extend(self.children(current).iter().rev().copied());
        }
        out
    }

    /// 指定した修飾名を持つ最初の子孫要素
    pub fn find_descendant(&self, id: NodeId, name: &str) -> Option<NodeId> {
        self.descendants(id)
            .into_iter()
            .find(|&node| self.name(node) == name)
    }
}

fn push_element<R>(
    reader: &Reader<R>,
    nodes: &mut Vec<Node>,
    stack: &[NodeId],
    e: &BytesStart<'_>,
) -> Result<NodeId, DocParserError> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut attributes = Vec::new();
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|err| DocParserError::Xml(format!("XML attribute error: {}", err)))?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = match attr.decode_and_unescape_value(reader) {
            Ok(value) => value.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attributes.push((key, value));
    }

    let parent = stack.last().copied().unwrap_or(NodeId(0));
    let id = NodeId(nodes.len());
    nodes.push(Node {
        kind: NodeKind::Element { name, attributes },
        parent: Some(parent),
        children: Vec::new(),
    });
    nodes[parent.0].children.push(id);
    Ok(id)
}

fn push_text(nodes: &mut Vec<Node>, stack: &[NodeId], text: String) {
    // ルート要素の外側のテキスト（空白など）は捨てる
    if stack.len() <= 1 || text.is_empty() {
        return;
    }
    let parent = stack[stack.len() - 1];
    let id = NodeId(nodes.len());
    nodes.push(Node {
        kind: NodeKind::Text(text),
        parent: Some(parent),
        children: Vec::new(),
    });
    nodes[parent.0].children.push(id);
}
