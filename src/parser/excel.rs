//! Excel Parser Module
//!
//! calamineを使用してXLS / XLSXブックのセル値を取り出します。
//! セルはタブ区切り、行は改行で終わり、シートの間には空行を1つ挟みます。

use std::io::Cursor;
use std::path::PathBuf;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::Timelike;
use log::{debug, info, warn};

use super::xlsb::format_number;
use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;

/// セル値を文字列に変換する
///
/// - 数値: XLSBと共通の書式（`3`、`12.34`）
/// - 真偽値: `TRUE` / `FALSE`
/// - 日付: ISO 8601（時刻部分がある場合のみ`T%H:%M:%S`を付ける）
/// - エラー: Excelのエラー表記（`#DIV/0!`など）
pub(crate) fn cell_text(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        Data::Float(f) => format_number(*f),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::DateTime(dt) => {
            if dt.is_duration() {
                return format_number(dt.as_f64());
            }
            match dt.as_datetime() {
                Some(datetime) if datetime.num_seconds_from_midnight() == 0 => {
                    datetime.format("%Y-%m-%d").to_string()
                }
                Some(datetime) => datetime.format("%Y-%m-%dT%H:%M:%S").to_string(),
                None => format_number(dt.as_f64()),
            }
        }
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    }
}

/// 1行分のテキスト（末尾の空セルは出力しない）
fn row_text(row: &[Data]) -> String {
    let used = row
        .iter()
        .rposition(|cell| !matches!(cell, Data::Empty))
        .map_or(0, |last| last + 1);

    let mut line = row[..used]
        .iter()
        .map(cell_text)
        .collect::<Vec<_>>()
        .join("\t");
    line.push('\n');
    line
}

/// Excel 97-2003 / 2007以降（`.xls` / `.xlsx`）パーサー
#[derive(Debug)]
pub struct ExcelParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl ExcelParser {
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

impl DocumentParser for ExcelParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Excel
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let bytes = self.source.read()?;
        let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))?;
        let sheet_names = workbook.sheet_names();
        debug!("Workbook {} has {} sheets", self.source.path().display(), sheet_names.len());

        let mut any_text = false;
        let mut rows = 0;
        'sheets: for name in &sheet_names {
            if self.accumulator.stop_requested() {
                break;
            }

            let range = match workbook.worksheet_range(name) {
                Ok(range) => range,
                Err(e) => {
                    warn!("Skipping sheet '{}': {}", name, e);
                    continue;
                }
            };
            if range.is_empty() {
                debug!("Sheet '{}' is empty", name);
                continue;
            }

            if any_text && !self.accumulator.append("\n") {
                break;
            }
            any_text = true;

            for row in range.rows() {
                if self.accumulator.stop_requested() {
                    break 'sheets;
                }
                rows += 1;
                if !self.accumulator.append(&row_text(row)) {
                    break 'sheets;
                }
            }
        }

        info!("Excel: {} rows, {} bytes of text", rows, self.accumulator.len());
        Ok(())
    }
}
