//! TXT Parser Module
//!
//! プレーンテキスト（`.txt` / `.md`など）を行単位で読み込みます。

use std::borrow::Cow;
use std::path::PathBuf;

use encoding_rs::{Encoding, WINDOWS_1252};
use log::{debug, info};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;

/// バイト列をテキストに復号する
///
/// BOMがあればそのエンコーディング（UTF-8 / UTF-16LE / UTF-16BE）を使い、
/// なければUTF-8として解釈します。UTF-8として不正な場合はWindows-1252とみなします。
fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        debug!("Text BOM detected: {}", encoding.name());
        let (text, _) = encoding.decode_without_bom_handling(&bytes[bom_len..]);
        return text;
    }

    match std::str::from_utf8(bytes) {
        Ok(text) => Cow::Borrowed(text),
        Err(_) => {
            debug!("Input is not UTF-8, decoding as {}", WINDOWS_1252.name());
            let (text, _) = WINDOWS_1252.decode_without_bom_handling(bytes);
            text
        }
    }
}

/// プレーンテキストパーサー
#[derive(Debug)]
pub struct TxtParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl TxtParser {
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

impl DocumentParser for TxtParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Txt
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let bytes = self.source.read()?;
        let text = decode_text(&bytes);

        let mut line_buf = String::new();
        for line in text.lines() {
            line_buf.clear();
            line_buf.push_str(line);
            line_buf.push('\n');
            if !self.accumulator.append(&line_buf) {
                break;
            }
        }

        info!("TXT: {} bytes of text", self.accumulator.len());
        Ok(())
    }
}
