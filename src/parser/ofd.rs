//! OFD Parser Module
//!
//! 中国の電子文書規格OFD（GB/T 33190）からテキストを抽出します。
//!
//! `OFD.xml` → `DocBody/DocRoot`（文書XML）→ `Pages/Page@BaseLoc`（ページXML）の順に辿り、
//! 各ページの`TextObject/TextCode`を連結します。要素名は名前空間プレフィックスを無視して照合します。

use std::path::PathBuf;

use log::{debug, info, warn};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::archive::ArchiveReader;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::xml::{NodeId, XmlDocument};

const ENTRY_PART: &str = "OFD.xml";

/// 構造エラー（`status_code`が1になるよう、部品名は`OFD`で始める）
fn missing(what: &str) -> DocParserError {
    DocParserError::MissingPart(format!("OFD {}", what))
}

/// パッケージ内の相対パスを解決する
///
/// `/`で始まる場合はパッケージのルートから、それ以外は`base_dir`からの相対パスです。
fn resolve(base_dir: &str, location: &str) -> String {
    let joined = if let Some(absolute) = location.strip_prefix('/') {
        absolute.to_string()
    } else if base_dir.is_empty() {
        location.to_string()
    } else {
        format!("{}/{}", base_dir, location)
    };

    let mut segments: Vec<&str> = Vec::new();
    for segment in joined.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

/// パスのディレクトリ部分
fn parent_dir(path: &str) -> &str {
    path.trim_start_matches('/')
        .rsplit_once('/')
        .map_or("", |(dir, _)| dir)
}

fn read_xml(archive: &mut ArchiveReader, name: &str) -> Result<Option<XmlDocument>, DocParserError> {
    match archive.read_bytes(name)? {
        Some(bytes) => Ok(Some(XmlDocument::parse(&bytes)?)),
        None => Ok(None),
    }
}

/// ページXMLに含まれる`TextCode`のテキストを文書順に連結する
fn page_text(doc: &XmlDocument) -> String {
    let mut out = String::new();
    for node in doc.descendants(doc.root()) {
        if doc.local_name(node) != "TextObject" {
            continue;
        }
        for code in doc.children_local(node, "TextCode") {
            out.push_str(&doc.text(code));
        }
    }
    out
}

/// 文書XMLの`Pages/Page@BaseLoc`を列挙する
fn page_locations(doc: &XmlDocument) -> Vec<String> {
    let root = doc.root();
    let Some(pages) = doc.child_local(root, "Pages") else {
        return Vec::new();
    };
    doc.children_local(pages, "Page")
        .filter_map(|page| doc.attr(page, "BaseLoc"))
        .map(str::to_string)
        .collect()
}

/// OFDパーサー
#[derive(Debug)]
pub struct OfdParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl OfdParser {
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

impl DocumentParser for OfdParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Ofd
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        // パッケージとして開けない場合も構造エラーとして扱う
        let mut archive = self.source.open_archive().map_err(|e| match e {
            DocParserError::Zip(reason) => missing(&format!("package ({})", reason)),
            other => other,
        })?;

        let entry = read_xml(&mut archive, ENTRY_PART)?.ok_or_else(|| missing(ENTRY_PART))?;
        let doc_root = entry
            .child_local(entry.root(), "DocBody")
            .and_then(|body| entry.child_local(body, "DocRoot"))
            .map(|node: NodeId| entry.text(node).trim().to_string())
            .filter(|path| !path.is_empty())
            .ok_or_else(|| missing("DocRoot"))?;

        let document_path = resolve("", &doc_root);
        debug!("OFD default document: {}", document_path);
        let document = read_xml(&mut archive, &document_path)?
            .ok_or_else(|| missing(&format!("document {}", document_path)))?;

        let locations = page_locations(&document);
        if locations.is_empty() {
            return Err(missing("pages"));
        }

        let base_dir = parent_dir(&document_path).to_string();
        let mut pages = 0;
        for location in &locations {
            if self.accumulator.stop_requested() {
                break;
            }
            let page_path = resolve(&base_dir, location);
            let page = match read_xml(&mut archive, &page_path) {
                Ok(Some(page)) => page,
                Ok(None) => {
                    warn!("OFD page {} not found", page_path);
                    continue;
                }
                Err(e) => {
                    warn!("Skipping OFD page {}: {}", page_path, e);
                    continue;
                }
            };

            pages += 1;
            if !self.accumulator.append(&page_text(&page)) {
                break;
            }
        }

        if pages == 0 {
            return Err(missing(&format!("pages (none of {} readable)", locations.len())));
        }

        info!(
            "OFD: {} of {} pages, {} bytes of text",
            pages,
            locations.len(),
            self.accumulator.len()
        );
        Ok(())
    }
}
