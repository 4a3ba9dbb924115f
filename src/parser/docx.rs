//! DOCX Parser Module
//!
//! `word/document.xml`の本文を段落・リスト・表の単位でテキスト化します。
//! 補助パート（番号定義・スタイル・リレーションシップ）は存在しない場合は空として扱います。

use std::collections::{HashMap, HashSet};
use std::path::PathBuf;

use log::{debug, info, warn};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::archive::ArchiveReader;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::xml::{NodeId, XmlDocument};

const DOCUMENT_PART: &str = "word/document.xml";
const NUMBERING_PART: &str = "word/numbering.xml";
const STYLES_PART: &str = "word/styles.xml";
const RELATIONSHIPS_PART: &str = "word/_rels/document.xml.rels";

/// 見出しとして扱うスタイル名（小文字化して比較）
const HEADING_STYLE_NAMES: [&str; 10] = [
    "heading 1",
    "heading 2",
    "heading 3",
    "heading 4",
    "heading 5",
    "heading 6",
    "heading 7",
    "heading 8",
    "heading 9",
    "heading 10",
];

/// 補助パートを読み込み、XMLとして解析する（欠落・破損時は`None`）
fn read_optional_part(archive: &mut ArchiveReader, name: &str) -> Result<Option<XmlDocument>, DocParserError> {
    let Some(bytes) = archive.read_bytes(name)? else {
        debug!("{} not found", name);
        return Ok(None);
    };
    match XmlDocument::parse(&bytes) {
        Ok(doc) => Ok(Some(doc)),
        Err(e) => {
            warn!("Ignoring malformed {}: {}", name, e);
            Ok(None)
        }
    }
}

/// numId → レベルごとの番号書式（`decimal`、`upperRoman`など）
fn numbering_map(doc: Option<&XmlDocument>) -> HashMap<String, Vec<String>> {
    let mut map = HashMap::new();
    let Some(doc) = doc else {
        return map;
    };
    let root = doc.root();

    let mut abstract_levels: HashMap<&str, Vec<String>> = HashMap::new();
    for abstract_num in doc.children_named(root, "w:abstractNum") {
        let Some(id) = doc.attr(abstract_num, "w:abstractNumId") else {
            continue;
        };
        let levels = doc
            .children_named(abstract_num, "w:lvl")
            .map(|lvl| {
                doc.child(lvl, "w:numFmt")
                    .and_then(|fmt| doc.attr(fmt, "w:val"))
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();
        abstract_levels.insert(id, levels);
    }

    for num in doc.children_named(root, "w:num") {
        let Some(num_id) = doc.attr(num, "w:numId") else {
            continue;
        };
        let levels = doc
            .child(num, "w:abstractNumId")
            .and_then(|node| doc.attr(node, "w:val"))
            .and_then(|id| abstract_levels.get(id));
        if let Some(levels) = levels {
            map.insert(num_id.to_string(), levels.clone());
        }
    }
    map
}

/// 見出しスタイルのstyleId集合
fn heading_styles(doc: Option<&XmlDocument>) -> HashSet<String> {
    let mut styles = HashSet::new();
    let Some(doc) = doc else {
        return styles;
    };
    for style in doc.children_named(doc.root(), "w:style") {
        let name = doc
            .child(style, "w:name")
            .and_then(|node| doc.attr(node, "w:val"))
            .map(str::to_lowercase);
        let Some(name) = name else {
            continue;
        };
        // 書式情報（w:rPr）を持たないスタイルは登録しない
        if doc.child(style, "w:rPr").is_none() {
            continue;
        }
        if HEADING_STYLE_NAMES.contains(&name.as_str()) {
            if let Some(id) = doc.attr(style, "w:styleId") {
                styles.insert(id.to_string());
            }
        }
    }
    styles
}

/// リレーションシップId → ターゲット
fn relationship_map(doc: Option<&XmlDocument>) -> HashMap<String, String> {
    let Some(doc) = doc else {
        return HashMap::new();
    };
    doc.element_children(doc.root())
        .filter_map(|rel| {
            let id = doc.attr(rel, "Id")?;
            let target = doc.attr(rel, "Target").unwrap_or_default();
            Some((id.to_string(), target.to_string()))
        })
        .collect()
}

/// `w:body`を走査するウォーカー
///
/// リストはまとめて先読みで処理するため、処理済みのノードを`visited`で管理します。
struct BodyWalker<'d> {
    doc: &'d XmlDocument,
    numbering: HashMap<String, Vec<String>>,
    headings: HashSet<String>,
    relationships: HashMap<String, String>,
    visited: HashSet<NodeId>,
}

impl<'d> BodyWalker<'d> {
    /// 本文直下の1要素をテキストブロック（改行なし）に変換する
    ///
    /// 出力しない要素は空のベクターになります。
    fn blocks(&mut self, siblings: &[NodeId], index: usize) -> Vec<String> {
        let node = siblings[index];
        let name = self.doc.name(node);
        if name == "w:sectPr" || self.visited.contains(&node) {
            return Vec::new();
        }

        let blocks = match name {
            "w:p" if self.is_header(node) => vec![self.paragraph_text(node)],
            "w:p" if self.is_title(node) => return Vec::new(),
            "w:p" if self.is_list_item(node) => self.list_blocks(siblings, index),
            "w:p" => vec![self.paragraph_text(node)],
            "w:tbl" => self.table_rows(node),
            _ => Vec::new(),
        };
        self.visited.insert(node);
        blocks
    }

    /// 段落（または段落に準ずるコンテナ）のテキスト
    fn paragraph_text(&self, node: NodeId) -> String {
        let mut text = String::new();
        self.collect_content(node, &mut text);
        text
    }

    fn collect_content(&self, node: NodeId, out: &mut String) {
        for child in self.doc.element_children(node) {
            match self.doc.name(child) {
                "w:r" => self.collect_run(child, out),
                "w:hyperlink" => {
                    let resolved = self
                        .doc
                        .attr(child, "r:id")
                        .is_some_and(|id| self.relationships.contains_key(id));
                    if resolved {
                        self.collect_content(child, out);
                    }
                }
                "w:ins" | "w:smartTag" => self.collect_content(child, out),
                _ => {}
            }
        }
    }

    fn collect_run(&self, run: NodeId, out: &mut String) {
        for child in self.doc.element_children(run) {
            match self.doc.name(child) {
                "w:t" => out.push_str(&self.doc.text(child)),
                "w:tab" => out.push('\t'),
                "w:br" | "w:cr" => out.push('\n'),
                _ => {}
            }
        }
    }

    fn is_title(&self, node: NodeId) -> bool {
        self.doc
            .find_descendant(node, "w:pStyle")
            .and_then(|style| self.doc.attr(style, "w:val"))
            == Some("Title")
    }

    fn numbering_id(&self, node: NodeId) -> Option<&'d str> {
        self.doc
            .find_descendant(node, "w:numId")
            .and_then(|num| self.doc.attr(num, "w:val"))
    }

    fn indentation_level(&self, node: NodeId) -> i32 {
        match self.doc.find_descendant(node, "w:ilvl") {
            Some(ilvl) => self
                .doc
                .attr(ilvl, "w:val")
                .and_then(|v| v.parse().ok())
                .unwrap_or(0),
            None => -1,
        }
    }

    fn has_numbering_level(&self, node: NodeId) -> bool {
        self.doc.descendants(node).into_iter().any(|d| {
            self.doc.name(d) == "w:ilvl"
                && self
                    .doc
                    .parent(d)
                    .is_some_and(|p| self.doc.name(p) == "w:numPr")
        })
    }

    /// 最上位（レベル0）の大文字ローマ数字リスト項目は見出しとして扱う
    fn is_top_level(&self, node: NodeId) -> bool {
        if self.indentation_level(node) != 0 {
            return false;
        }
        self.numbering_id(node)
            .and_then(|id| self.numbering.get(id))
            .and_then(|levels| levels.first())
            .is_some_and(|format| format == "upperRoman")
    }

    fn is_natural_header(&self, node: NodeId) -> bool {
        self.doc
            .child(node, "w:pPr")
            .and_then(|ppr| self.doc.child(ppr, "w:pStyle"))
            .and_then(|style| self.doc.attr(style, "w:val"))
            .is_some_and(|id| self.headings.contains(id))
    }

    fn is_header(&self, node: NodeId) -> bool {
        self.is_top_level(node) || self.is_natural_header(node)
    }

    fn is_list_item(&self, node: NodeId) -> bool {
        !self.is_header(node) && self.has_numbering_level(node)
    }

    /// 同じリストに属する項目の後に、同じリストの項目がもう現れないかどうか
    fn is_last_item(&self, siblings: &[NodeId], index: usize, list_id: Option<&str>) -> bool {
        siblings[index + 1..]
            .iter()
            .find(|&&node| self.is_list_item(node))
            .map_or(true, |&node| self.numbering_id(node) != list_id)
    }

    /// `siblings[start]`から始まるリストの範囲を求める
    fn list_run(&self, siblings: &[NodeId], start: usize) -> Vec<NodeId> {
        let first = siblings[start];
        let list_id = self.numbering_id(first);
        let start_level = self.indentation_level(first);
        if self.is_last_item(siblings, start, list_id) {
            return vec![first];
        }

        let mut run = vec![first];
        for (offset, &node) in siblings[start + 1..].iter().enumerate() {
            if self.is_top_level(node) {
                break;
            }
            let list_item = self.is_list_item(node);
            if list_item && start_level > self.indentation_level(node) {
                break;
            }
            match self.numbering_id(node) {
                None | Some("-1") => run.push(node),
                Some(id) if Some(id) != list_id => break,
                Some(_) => {
                    run.push(node);
                    if list_item && self.is_last_item(siblings, start + 1 + offset, list_id) {
                        break;
                    }
                }
            }
        }
        run
    }

    /// リスト全体（途中に挟まる段落・表を含む）をブロックに変換する
    fn list_blocks(&mut self, siblings: &[NodeId], start: usize) -> Vec<String> {
        let mut blocks = Vec::new();
        for node in self.list_run(siblings, start) {
            if !self.visited.insert(node) {
                continue;
            }
            if self.is_list_item(node) {
                blocks.push(self.paragraph_text(node));
                continue;
            }
            match self.doc.name(node) {
                "w:p" => blocks.push(self.paragraph_text(node)),
                "w:tbl" => blocks.extend(self.table_rows(node)),
                _ => {}
            }
        }
        blocks
    }

    /// 表を行ごとのテキスト（セルはタブ区切り）に変換する
    fn table_rows(&mut self, table: NodeId) -> Vec<String> {
        let rows: Vec<NodeId> = self.doc.children_named(table, "w:tr").collect();
        let mut lines = Vec::with_capacity(rows.len());
        for row in rows {
            let cells: Vec<NodeId> = self
                .doc
                .children_named(row, "w:tc")
                .filter(|&cell| !self.is_merge_continuation(cell))
                .collect();
            let mut texts = Vec::with_capacity(cells.len());
            for cell in cells {
                texts.push(self.cell_text(cell));
            }
            lines.push(texts.join("\t"));
        }
        lines
    }

    /// 縦方向の結合セル（`restart`以外の`w:vMerge`）は結合元のセルに含まれる
    fn is_merge_continuation(&self, cell: NodeId) -> bool {
        let merge = self
            .doc
            .child(cell, "w:tcPr")
            .and_then(|pr| self.doc.child(pr, "w:vMerge"));
        match merge {
            Some(merge) => self.doc.attr(merge, "w:val") != Some("restart"),
            None => false,
        }
    }

    /// セル内の段落を空白で連結する
    fn cell_text(&mut self, cell: NodeId) -> String {
        let children: Vec<NodeId> = self.doc.element_children(cell).collect();
        let mut parts = Vec::new();
        for (index, &node) in children.iter().enumerate() {
            if self.visited.contains(&node) {
                continue;
            }
            match self.doc.name(node) {
                "w:tcPr" => {}
                _ if self.is_list_item(node) => parts.extend(self.list_blocks(&children, index)),
                "w:tbl" => parts.extend(self.table_rows(node)),
                _ => parts.push(self.paragraph_text(node)),
            }
            self.visited.insert(node);
        }
        parts.retain(|part| !part.is_empty());
        parts.join(" ")
    }
}

/// Word 2007以降（`.docx`）パーサー
#[derive(Debug)]
pub struct DocxParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl DocxParser {
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

impl DocumentParser for DocxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Docx
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let mut archive = self.source.open_archive()?;
        let document = XmlDocument::parse(&archive.read_required(DOCUMENT_PART)?)?;

        let numbering = read_optional_part(&mut archive, NUMBERING_PART)?;
        let styles = read_optional_part(&mut archive, STYLES_PART)?;
        let relationships = read_optional_part(&mut archive, RELATIONSHIPS_PART)?;

        let mut walker = BodyWalker {
            doc: &document,
            numbering: numbering_map(numbering.as_ref()),
            headings: heading_styles(styles.as_ref()),
            relationships: relationship_map(relationships.as_ref()),
            visited: HashSet::new(),
        };

        let Some(body) = document.child(document.root(), "w:body") else {
            debug!("{} has no w:body", DOCUMENT_PART);
            return Ok(());
        };
        let children: Vec<NodeId> = document.element_children(body).collect();

        let mut paragraphs = 0;
        'body: for index in 0..children.len() {
            if self.accumulator.stop_requested() {
                break;
            }
            for block in walker.blocks(&children, index) {
                paragraphs += 1;
                let mut line = block;
                line.push('\n');
                if !self.accumulator.append(&line) {
                    break 'body;
                }
            }
        }

        info!("DOCX: {} blocks, {} bytes of text", paragraphs, self.accumulator.len());
        Ok(())
    }
}
