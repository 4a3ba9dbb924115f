//! XLSB Parser Module
//!
//! Excelバイナリブック（`.xlsb`）のワークシートから、タブ区切り・改行区切りの
//! テキストグリッドを再構築します。
//!
//! # 処理の流れ
//!
//! 1. `xl/sharedStrings.bin`から共有文字列テーブルを構築する
//! 2. `xl/worksheets/sheet1.bin`、`sheet2.bin`、…を存在する限り順に走査する
//!
//! レコードヘッダーは可変長です。種別は最大2バイト、サイズは最大4バイトで、
//! 各バイトの下位7ビットが値、最上位ビットが継続フラグです。

use std::path::PathBuf;

use log::{debug, info, warn};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::binary::BinaryCursor;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::utf16::{encode_unit_into, is_high_surrogate, pack_surrogate_pair};

/// 共有文字列テーブルのパート名
const SHARED_STRINGS_PART: &str = "xl/sharedStrings.bin";

/// ワークシートの最大行数
const MAX_ROWS: u32 = 1_048_576;

/// ワークシートの最大列数
const MAX_COLUMNS: u32 = 16_384;

/// XLSBのレコード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordType {
    /// BrtRowHdr (0x00)
    RowHeader,
    /// BrtCellBlank (0x01)
    CellBlank,
    /// BrtCellRk (0x02)
    CellRk,
    /// BrtCellError (0x03)
    CellError,
    /// BrtCellBool (0x04)
    CellBool,
    /// BrtCellReal (0x05)
    CellReal,
    /// BrtCellSt (0x06)
    CellString,
    /// BrtCellIsst (0x07)
    CellSharedString,
    /// BrtFmlaString (0x08)
    FormulaString,
    /// BrtFmlaNum (0x09)
    FormulaNumber,
    /// BrtFmlaBool (0x0A)
    FormulaBool,
    /// BrtFmlaError (0x0B)
    FormulaError,
    /// BrtSSItem (0x13)
    SharedStringItem,
    /// BrtWsDim (0x94)
    SheetDimension,
    /// BrtBeginSst (0x9F)
    BeginSharedStrings,
    /// 上記以外
    Other(u32),
}

impl RecordType {
    fn from_u32(value: u32) -> Self {
        match value {
            0x00 => RecordType::RowHeader,
            0x01 => RecordType::CellBlank,
            0x02 => RecordType::CellRk,
            0x03 => RecordType::CellError,
            0x04 => RecordType::CellBool,
            0x05 => RecordType::CellReal,
            0x06 => RecordType::CellString,
            0x07 => RecordType::CellSharedString,
            0x08 => RecordType::FormulaString,
            0x09 => RecordType::FormulaNumber,
            0x0A => RecordType::FormulaBool,
            0x0B => RecordType::FormulaError,
            0x13 => RecordType::SharedStringItem,
            0x94 => RecordType::SheetDimension,
            0x9F => RecordType::BeginSharedStrings,
            other => RecordType::Other(other),
        }
    }
}

/// 1つのレコード（ペイロードは元のバッファを借用）
#[derive(Debug)]
struct Record<'a> {
    record_type: RecordType,
    payload: &'a [u8],
}

/// レコードストリームを先頭から順に切り出すイテレーター
///
/// 宣言サイズが残りのバイト数を超える場合、ペイロードは末尾までに切り詰められます。
struct RecordReader<'a> {
    cursor: BinaryCursor<'a>,
}

impl<'a> RecordReader<'a> {
    fn new(stream: &'a [u8]) -> Self {
        Self {
            cursor: BinaryCursor::new(stream),
        }
    }
}

impl<'a> Iterator for RecordReader<'a> {
    type Item = Record<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.is_at_end() {
            return None;
        }
        let record_type = read_varint(&mut self.cursor, 2)?;
        let size = read_varint(&mut self.cursor, 4)? as usize;
        let payload = self
            .cursor
            .read_bytes(size.min(self.cursor.remaining()))
            .ok()?;
        Some(Record {
            record_type: RecordType::from_u32(record_type),
            payload,
        })
    }
}

/// 7ビット単位の可変長整数を読む（最大`max_bytes`バイト）
fn read_varint(cursor: &mut BinaryCursor<'_>, max_bytes: usize) -> Option<u32> {
    let mut value = 0u32;
    for i in 0..max_bytes {
        let byte = cursor.read_u8().ok()?;
        value |= u32::from(byte & 0x7F) << (i * 7);
        if byte < 0x80 {
            break;
        }
    }
    Some(value)
}

/// XLWideString（4バイトの文字数 + UTF-16LEコードユニット列）を読む
///
/// NULユニットは出力しません。末尾に対になるユニットのない上位サロゲートは
/// U+FFFDになります。
fn read_wide_string(cursor: &mut BinaryCursor<'_>) -> Result<String, DocParserError> {
    let count = cursor.read_u32()? as usize;
    let byte_len = count.saturating_mul(2);
    if byte_len > cursor.remaining() {
        return Err(DocParserError::UnexpectedEof {
            needed: byte_len,
            remaining: cursor.remaining(),
        });
    }

    let mut out = String::with_capacity(count);
    let mut buf = [0u8; 4];
    let mut i = 0;
    while i < count {
        let unit = cursor.read_u16()?;
        i += 1;
        if unit == 0 {
            continue;
        }
        let mut packed = u32::from(unit);
        if is_high_surrogate(unit) && i < count {
            packed = pack_surrogate_pair(unit, cursor.read_u16()?);
            i += 1;
        }
        out.push_str(encode_unit_into(packed, &mut buf));
    }
    Ok(out)
}

/// RK形式で圧縮された数値を展開する
///
/// - ビット0: 100で割る
/// - ビット1: 上位30ビットが符号付き整数（算術右シフトで展開）
/// - それ以外: 下位2ビットを0にした値が倍精度浮動小数点数の上位32ビット
///
/// # 使用例
///
/// ```rust
/// use docparser::decode_rk;
///
/// assert_eq!(decode_rk(402), 100.0);          // 整数100
/// assert_eq!(decode_rk(403), 1.0);            // 整数100 ÷ 100
/// assert_eq!(decode_rk((1234 << 2) | 3), 12.34);
/// assert_eq!(decode_rk(0x3FF8_0000), 1.5);    // 1.5の上位32ビット
/// ```
pub fn decode_rk(raw: u32) -> f64 {
    let value = if raw & 0x02 != 0 {
        f64::from((raw as i32) >> 2)
    } else {
        f64::from_bits(u64::from(raw & 0xFFFF_FFFC) << 32)
    };

    if raw & 0x01 != 0 {
        value / 100.0
    } else {
        value
    }
}

/// 数値をテキストに変換する
///
/// 整数値は小数部なし（`3`）、それ以外は往復可能な最短表現（`12.34`）です。
/// Excelアダプターと共通の書式です。
pub(crate) fn format_number(value: f64) -> String {
    if value == 0.0 {
        // -0.0を"-0"と表示しない
        return "0".to_string();
    }
    value.to_string()
}

/// 共有文字列テーブルを構築する
///
/// BrtSSItemレコードごとに、1バイトのフラグを読み飛ばしてから文字列を読みます。
/// 破損したレコードに到達した時点で、それまでに読めた文字列を返します。
///
/// # 使用例
///
/// ```rust
/// use docparser::parse_shared_strings;
///
/// // BrtSSItem: flags=0, cch=2, "Hi"
/// let stream = [0x13, 0x09, 0x00, 0x02, 0x00, 0x00, 0x00, b'H', 0x00, b'i', 0x00];
/// assert_eq!(parse_shared_strings(&stream), vec!["Hi".to_string()]);
/// ```
pub fn parse_shared_strings(stream: &[u8]) -> Vec<String> {
    let mut strings = Vec::new();
    for record in RecordReader::new(stream) {
        if record.record_type != RecordType::SharedStringItem {
            continue;
        }
        let mut cursor = BinaryCursor::new(record.payload);
        let item = cursor.read_u8().and_then(|_flags| read_wide_string(&mut cursor));
        match item {
            Ok(text) => strings.push(text),
            Err(e) => {
                warn!(
                    "Shared string table truncated after {} items: {}",
                    strings.len(),
                    e
                );
                break;
            }
        }
    }
    strings
}

/// シートの範囲（BrtWsDim、参考情報）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SheetDimension {
    /// 先頭行
    pub row_start: u32,
    /// 最終行
    pub row_end: u32,
    /// 先頭列
    pub column_start: u32,
    /// 最終列
    pub column_end: u32,
}

/// 1枚のワークシートのレコードストリームをテキストグリッドに変換するデコーダー
///
/// セルはタブ区切り、行は改行区切りです。空の行・列はそれぞれ改行・タブで埋めます。
///
/// # 使用例
///
/// ```rust
/// use docparser::{TextAccumulator, WorksheetDecoder};
///
/// // BrtRowHdr(row=0) → BrtCellBool(col=1, true)
/// let stream = [
///     0x00, 0x04, 0x00, 0x00, 0x00, 0x00,
///     0x04, 0x09, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01,
/// ];
/// let mut acc = TextAccumulator::new();
/// WorksheetDecoder::new(&[]).decode(&stream, &mut acc).unwrap();
/// assert_eq!(acc.text(), "\t1");
/// ```
#[derive(Debug)]
pub struct WorksheetDecoder<'a> {
    shared_strings: &'a [String],
    current_row: u32,
    current_column: u32,
    dimension: Option<SheetDimension>,
    /// 最初の出力の前に区切りの改行を入れるかどうか
    separate: bool,
    produced_text: bool,
}

impl<'a> WorksheetDecoder<'a> {
    /// 共有文字列テーブルを参照するデコーダーを生成
    pub fn new(shared_strings: &'a [String]) -> Self {
        Self {
            shared_strings,
            current_row: 0,
            current_column: 0,
            dimension: None,
            separate: false,
            produced_text: false,
        }
    }

    /// 最初の出力の前に`\n`を入れる（前のシートとの区切り）
    pub fn separated(mut self, separate: bool) -> Self {
        self.separate = separate;
        self
    }

    /// テキストを1文字以上出力したかどうか
    pub fn produced_text(&self) -> bool {
        self.produced_text
    }

    /// BrtWsDimで宣言されたシートの範囲
    pub fn dimension(&self) -> Option<SheetDimension> {
        self.dimension
    }

    /// ワークシートのレコードストリームを走査してアキュムレーターに出力する
    ///
    /// # 戻り値
    ///
    /// * `Ok(())` - ストリームの末尾に到達した、またはアキュムレーターが追加を拒否した場合
    /// * `Err(DocParserError)` - レコードの途中でデータが尽きた、または行・列番号が範囲外の場合。
    ///   それまでに出力したテキストはアキュムレーターに残ります
    pub fn decode(&mut self, stream: &[u8], acc: &mut TextAccumulator) -> Result<(), DocParserError> {
        for record in RecordReader::new(stream) {
            let mut cursor = BinaryCursor::new(record.payload);
            let text = self.decode_record(record.record_type, &mut cursor)?;
            if !self.emit(&text, acc) {
                debug!("Worksheet decode stopped by truncation");
                break;
            }
        }
        Ok(())
    }

    /// 1レコードを解釈し、出力するテキストを返す
    fn decode_record(
        &mut self,
        record_type: RecordType,
        cursor: &mut BinaryCursor<'_>,
    ) -> Result<String, DocParserError> {
        let text = match record_type {
            RecordType::RowHeader => {
                let row = cursor.read_u32()?;
                if row > MAX_ROWS {
                    return Err(DocParserError::MalformedRecord(format!(
                        "Row index {} exceeds {}",
                        row, MAX_ROWS
                    )));
                }
                let gap = row.saturating_sub(self.current_row) as usize;
                self.current_row = row;
                self.current_column = 0;
                "\n".repeat(gap)
            }
            RecordType::CellBlank => self.read_column(cursor)?,
            RecordType::CellBool | RecordType::FormulaBool => {
                let mut text = self.read_column(cursor)?;
                text.push_str(if cursor.read_u8()? != 0 { "1" } else { "0" });
                text
            }
            RecordType::CellReal | RecordType::FormulaNumber => {
                let mut text = self.read_column(cursor)?;
                text.push_str(&format_number(cursor.read_f64_le()?));
                text
            }
            RecordType::CellString | RecordType::FormulaString => {
                let mut text = self.read_column(cursor)?;
                text.push_str(&read_wide_string(cursor)?);
                text
            }
            RecordType::CellRk => {
                let mut text = self.read_column(cursor)?;
                text.push_str(&format_number(decode_rk(cursor.read_u32()?)));
                text
            }
            RecordType::CellSharedString => {
                let mut text = self.read_column(cursor)?;
                let index = cursor.read_u32()? as usize;
                match self.shared_strings.get(index) {
                    Some(value) => text.push_str(value),
                    None => warn!(
                        "Shared string index {} out of range ({} strings)",
                        index,
                        self.shared_strings.len()
                    ),
                }
                text
            }
            RecordType::SheetDimension => {
                self.dimension = Some(SheetDimension {
                    row_start: cursor.read_u32()?,
                    row_end: cursor.read_u32()?,
                    column_start: cursor.read_u32()?,
                    column_end: cursor.read_u32()?,
                });
                String::new()
            }
            RecordType::CellError
            | RecordType::FormulaError
            | RecordType::SharedStringItem
            | RecordType::BeginSharedStrings
            | RecordType::Other(_) => String::new(),
        };
        Ok(text)
    }

    /// セルの列番号を読み、前のセルとの間を埋めるタブを返す
    fn read_column(&mut self, cursor: &mut BinaryCursor<'_>) -> Result<String, DocParserError> {
        let column = cursor.read_u32()?;
        if column > MAX_COLUMNS {
            return Err(DocParserError::MalformedRecord(format!(
                "Column index {} exceeds {}",
                column, MAX_COLUMNS
            )));
        }

        let mut separators = String::new();
        if self.current_column > 0 {
            separators.push('\t');
        }
        while column > self.current_column {
            separators.push('\t');
            self.current_column += 1;
        }

        // スタイル参照（iStyleRef + フラグ）
        cursor.skip(4);
        self.current_column = column + 1;
        Ok(separators)
    }

    fn emit(&mut self, text: &str, acc: &mut TextAccumulator) -> bool {
        if text.is_empty() {
            return true;
        }
        let accepted = if self.separate && !self.produced_text {
            acc.append("\n") && acc.append(text)
        } else {
            acc.append(text)
        };
        self.produced_text = true;
        accepted
    }
}

/// Excelバイナリブック（`.xlsb`）パーサー
#[derive(Debug)]
pub struct XlsbParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl XlsbParser {
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

impl DocumentParser for XlsbParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Xlsb
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let mut archive = self.source.open_archive()?;

        let shared_strings = match archive.read_bytes(SHARED_STRINGS_PART)? {
            Some(bytes) => parse_shared_strings(&bytes),
            None => {
                debug!("{} not found, using an empty table", SHARED_STRINGS_PART);
                Vec::new()
            }
        };

        let mut sheet_index = 1;
        let mut sheets = 0;
        let mut any_text = false;
        loop {
            let part = format!("xl/worksheets/sheet{}.bin", sheet_index);
            let Some(stream) = archive.read_bytes(&part)? else {
                break;
            };
            if self.accumulator.stop_requested() {
                break;
            }

            let mut decoder = WorksheetDecoder::new(&shared_strings).separated(any_text);
            if let Err(e) = decoder.decode(&stream, &mut self.accumulator) {
                warn!("Worksheet {} decode aborted: {}", part, e);
            }
            any_text |= decoder.produced_text();
            sheets += 1;

            if self.accumulator.is_truncated() {
                break;
            }
            sheet_index += 1;
        }

        info!(
            "XLSB: {} sheets, {} shared strings, {} bytes of text",
            sheets,
            shared_strings.len(),
            self.accumulator.len()
        );
        Ok(())
    }
}
