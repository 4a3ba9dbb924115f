//! PPTX Parser Module
//!
//! `ppt/presentation.xml`のスライド数を数え、`ppt/slides/slideN.xml`を順に読み込みます。

use std::path::PathBuf;

use log::{debug, info, warn};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::xml::{NodeId, XmlDocument};

const PRESENTATION_PART: &str = "ppt/presentation.xml";

/// 読み込むスライド数の上限（この番号未満のスライドのみ処理する）
const MAX_SLIDES: usize = 2500;

/// `p:sldIdLst`の子要素数
fn slide_count(archive_bytes: Option<Vec<u8>>) -> usize {
    let Some(bytes) = archive_bytes else {
        debug!("{} not found", PRESENTATION_PART);
        return 0;
    };
    let doc = match XmlDocument::parse(&bytes) {
        Ok(doc) => doc,
        Err(e) => {
            warn!("Malformed {}: {}", PRESENTATION_PART, e);
            return 0;
        }
    };
    doc.child(doc.root(), "p:sldIdLst")
        .map_or(0, |list| doc.element_children(list).count())
}

/// スライドのテキスト（`a:t`の内容、`a:p`ごとに改行）
fn slide_text(doc: &XmlDocument) -> String {
    let mut out = String::new();
    collect(doc, doc.root(), &mut out);
    out
}

fn collect(doc: &XmlDocument, node: NodeId, out: &mut String) {
    match doc.name(node) {
        "a:t" => out.push_str(&doc.text(node)),
        "a:p" => {
            for child in doc.element_children(node) {
                collect(doc, child, out);
            }
            out.push('\n');
        }
        _ => {
            for child in doc.element_children(node) {
                collect(doc, child, out);
            }
        }
    }
}

/// PowerPoint 2007以降（`.pptx` / `.ppsx`）パーサー
#[derive(Debug)]
pub struct PptxParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl PptxParser {
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

impl DocumentParser for PptxParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pptx
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let mut archive = self.source.open_archive()?;
        let count = slide_count(archive.read_bytes(PRESENTATION_PART)?);
        debug!("Presentation declares {} slides", count);

        let mut slides = 0;
        for index in (1..=count).take_while(|&i| i < MAX_SLIDES) {
            if self.accumulator.stop_requested() {
                break;
            }

            let part = format!("ppt/slides/slide{}.xml", index);
            let Some(bytes) = archive.read_bytes(&part)? else {
                debug!("{} not found, skipping", part);
                continue;
            };
            let doc = match XmlDocument::parse(&bytes) {
                Ok(doc) => doc,
                Err(e) => {
                    warn!("Skipping malformed {}: {}", part, e);
                    continue;
                }
            };

            slides += 1;
            if !self.accumulator.append(&slide_text(&doc)) {
                break;
            }
        }

        info!("PPTX: {} slides, {} bytes of text", slides, self.accumulator.len());
        Ok(())
    }
}
