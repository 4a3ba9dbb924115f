//! PDF Parser Module
//!
//! pdf-extractでページごとのテキストを取り出します。
//! バックエンドがパニックした場合も`DocParserError::Pdf`として扱います。

use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;

use log::{debug, info};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;

/// PDFのページテキストを抽出する
fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, DocParserError> {
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(bytes)
    }));

    match result {
        Ok(Ok(pages)) => Ok(pages),
        Ok(Err(e)) => Err(DocParserError::Pdf(e.to_string())),
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(DocParserError::Pdf(format!("backend panicked: {}", reason)))
        }
    }
}

/// ページ単位でアキュムレーターに追加し、追加したページ数を返す
fn append_pages(acc: &mut TextAccumulator, pages: &[String]) -> usize {
    let mut appended = 0;
    for page in pages {
        if acc.stop_requested() {
            break;
        }
        appended += 1;
        if !acc.append(page) {
            break;
        }
    }
    appended
}

/// PDFパーサー
#[derive(Debug)]
pub struct PdfParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl PdfParser {
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

impl DocumentParser for PdfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Pdf
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let bytes = self.source.read()?;
        // pdf-extractは全ページをまとめて展開するため、上限による打ち切りは
        // 展開後のテキスト追加にのみ効き、展開処理そのものは短縮されない
        let pages = extract_pages(&bytes)?;
        debug!("PDF {} has {} pages", self.source.path().display(), pages.len());

        let appended = append_pages(&mut self.accumulator, &pages);

        info!(
            "PDF: {} of {} pages, {} bytes of text",
            appended,
            pages.len(),
            self.accumulator.len()
        );
        Ok(())
    }
}
