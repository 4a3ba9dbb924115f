//! ODF Parser Module
//!
//! OpenDocument形式（`.odt` / `.ods` / `.odp` / `.odg`）の`content.xml`からテキストを抽出します。

use std::path::PathBuf;

use log::{debug, info};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::xml::{NodeId, XmlDocument};

const CONTENT_PART: &str = "content.xml";

/// 子ノードを順に変換する
fn render_children(doc: &XmlDocument, node: NodeId, out: &mut String) {
    for &child in doc.children(node) {
        render_node(doc, child, out);
    }
}

/// 1つのノードをテキストに変換して`out`に追加する
fn render_node(doc: &XmlDocument, node: NodeId, out: &mut String) {
    if let Some(text) = doc.node_text(node) {
        // 整形用の改行・インデントだけのテキストは無視する
        if !(text.contains('\n') && text.trim().is_empty()) {
            out.push_str(text);
        }
        return;
    }

    match doc.name(node) {
        "text:p" | "text:h" | "text:a" => {
            render_children(doc, node, out);
            out.push('\n');
        }
        "table:table" => render_table(doc, node, out),
        "text:tab" => out.push('\t'),
        "text:line-break" => out.push('\n'),
        "text:s" => {
            let count = doc
                .attr(node, "text:c")
                .and_then(|c| c.parse::<usize>().ok())
                .unwrap_or(1);
            out.extend(std::iter::repeat(' ').take(count));
        }
        _ => render_children(doc, node, out),
    }
}

/// 表のセルを1行ずつ出力する
fn render_table(doc: &XmlDocument, table: NodeId, out: &mut String) {
    for row in table_rows(doc, table) {
        for cell in doc.children_named(row, "table:table-cell") {
            render_children(doc, cell, out);
            out.push('\n');
        }
    }
}

/// 行グループ（`table:table-header-rows`など）の中も含めて行を列挙する
fn table_rows(doc: &XmlDocument, node: NodeId) -> Vec<NodeId> {
    let mut rows = Vec::new();
    for child in doc.element_children(node) {
        match doc.name(child) {
            "table:table-row" => rows.push(child),
            "table:table-header-rows" | "table:table-rows" | "table:table-row-group" => {
                rows.extend(table_rows(doc, child))
            }
            _ => {}
        }
    }
    rows
}

/// OpenDocumentパーサー
#[derive(Debug)]
pub struct OdfParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl OdfParser {
    /// ファイルパスを指定してパーサーを生成する
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            source: Source::new(path),
            accumulator: TextAccumulator::new(),
        }
    }

    /// セキュリティ設定を変更する
    pub fn with_security_config(mut self, config: SecurityConfig) -> Self {
        self.source.set_security_config(config);
        self
    }
}

impl DocumentParser for OdfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Odf
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let mut archive = self.source.open_archive()?;
        let doc = XmlDocument::parse(&archive.read_required(CONTENT_PART)?)?;
        let root = doc.root();

        // office:body → office:text / office:spreadsheet / ... の子要素を1ブロックとする
        let blocks: Vec<NodeId> = match doc.child_local(root, "body") {
            Some(body) => doc
                .element_children(body)
                .flat_map(|content| doc.element_children(content))
                .collect(),
            None => {
                debug!("{} has no office:body", CONTENT_PART);
                vec![root]
            }
        };

        for &block in &blocks {
            if self.accumulator.stop_requested() {
                break;
            }
            let mut text = String::new();
            render_node(&doc, block, &mut text);
            if !self.accumulator.append(&text) {
                break;
            }
        }

        info!("ODF: {} blocks, {} bytes of text", blocks.len(), self.accumulator.len());
        Ok(())
    }
}
