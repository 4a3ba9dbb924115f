//! PPT Parser Module
//!
//! PowerPoint 97-2003のバイナリレコードストリームからテキストを抽出します。
//!
//! CFBコンテナ内の`PowerPoint Document`ストリームは、8バイトのヘッダー
//! （バージョン/インスタンス2バイト、レコード種別2バイト、長さ4バイト）を持つ
//! レコードが平坦に並んだものです。コンテナレコードの子レコードは
//! そのまま後続に並ぶため、コンテナは読み飛ばさずに通過します。

use std::io::{Cursor, Read};
use std::path::PathBuf;

use log::{debug, info};

use super::{DocumentParser, Source, PPT_DOCUMENT_STREAM};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::binary::BinaryCursor;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::utf16::{encode_unit_into, is_high_surrogate, pack_surrogate_pair};

/// レコードヘッダーのバイト数
const RECORD_HEADER_SIZE: usize = 8;

/// PPTのレコード種別
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RecordType {
    /// RT_CString (0x0FBA): 16ビット文字列
    CString,
    /// RT_TextCharsAtom (0x0FA0): 16ビット文字列
    TextCharsAtom,
    /// RT_TextBytesAtom (0x0FA8): 8ビット文字列
    TextBytesAtom,
    /// RT_Document (0x03E8)
    Document,
    /// RT_Drawing (0x040C)
    Drawing,
    /// RT_EndDocumentAtom (0x03EA)
    EndDocumentAtom,
    /// RT_List (0x07D0)
    List,
    /// RT_MainMaster (0x03F8)
    MainMaster,
    /// RT_SlideBase (0x03EC)
    SlideBase,
    /// RT_SlideListWithText (0x0FF0)
    SlideListWithText,
    /// RT_Slide (0x03EE)
    Slide,
    /// OfficeArtClientTextbox (0xF00D)
    ClientTextbox,
    /// OfficeArtDgContainer (0xF002)
    DgContainer,
    /// OfficeArtSpgrContainer (0xF003)
    SpgrContainer,
    /// OfficeArtSpContainer (0xF004)
    SpContainer,
    /// 未知のレコード
    Unknown(u16),
}

impl RecordType {
    fn from_u16(value: u16) -> Self {
        match value {
            0x0FBA => RecordType::CString,
            0x0FA0 => RecordType::TextCharsAtom,
            0x0FA8 => RecordType::TextBytesAtom,
            0x03E8 => RecordType::Document,
            0x040C => RecordType::Drawing,
            0x03EA => RecordType::EndDocumentAtom,
            0x07D0 => RecordType::List,
            0x03F8 => RecordType::MainMaster,
            0x03EC => RecordType::SlideBase,
            0x0FF0 => RecordType::SlideListWithText,
            0x03EE => RecordType::Slide,
            0xF00D => RecordType::ClientTextbox,
            0xF002 => RecordType::DgContainer,
            0xF003 => RecordType::SpgrContainer,
            0xF004 => RecordType::SpContainer,
            other => RecordType::Unknown(other),
        }
    }
}

/// レコードストリームを走査してテキストをアキュムレーターに追加する
///
/// # 引数
///
/// * `stream` - `PowerPoint Document`ストリームの内容
/// * `acc` - 出力先
///
/// # 戻り値
///
/// 走査したレコード数。アキュムレーターが追加を拒否した時点で走査を打ち切ります。
///
/// # 使用例
///
/// ```rust
/// use docparser::{walk_records, TextAccumulator};
///
/// // RT_TextBytesAtom "Hi"
/// let stream = [0x00, 0x00, 0xA8, 0x0F, 0x02, 0x00, 0x00, 0x00, b'H', b'i'];
/// let mut acc = TextAccumulator::new();
/// walk_records(&stream, &mut acc);
/// assert_eq!(acc.text(), "Hi\n");
/// ```
pub fn walk_records(stream: &[u8], acc: &mut TextAccumulator) -> usize {
    let mut cursor = BinaryCursor::new(stream);
    let mut records = 0;

    while cursor.remaining() >= RECORD_HEADER_SIZE {
        let Some((record_type, length)) = read_header(&mut cursor) else {
            break;
        };
        records += 1;

        let accepted = match RecordType::from_u16(record_type) {
            RecordType::CString | RecordType::TextCharsAtom => {
                read_wide_text(&mut cursor, length, acc)
            }
            RecordType::TextBytesAtom => read_byte_text(&mut cursor, length, acc),
            RecordType::Document
            | RecordType::Drawing
            | RecordType::List
            | RecordType::SlideBase
            | RecordType::SlideListWithText
            | RecordType::Slide
            | RecordType::ClientTextbox
            | RecordType::DgContainer
            | RecordType::SpgrContainer
            | RecordType::SpContainer => true,
            RecordType::EndDocumentAtom | RecordType::MainMaster | RecordType::Unknown(_) => {
                cursor.skip(length);
                true
            }
        };

        if !accepted {
            debug!("PPT record walk stopped by truncation after {} records", records);
            break;
        }
    }

    records
}

fn read_header(cursor: &mut BinaryCursor<'_>) -> Option<(u16, usize)> {
    let _version_instance = cursor.read_u16().ok()?;
    let record_type = cursor.read_u16().ok()?;
    let length = cursor.read_u32().ok()?;
    Some((record_type, length as usize))
}

/// 16ビット文字のテキストアトムを読む
fn read_wide_text(cursor: &mut BinaryCursor<'_>, length: usize, acc: &mut TextAccumulator) -> bool {
    let text_len = (length / 2).min(cursor.remaining() / 2);
    let mut buf = [0u8; 4];

    let mut i = 0;
    while i < text_len {
        let Ok(unit) = cursor.read_u16() else {
            break;
        };
        let accepted = if unit == 0x0D || unit == 0x0B {
            acc.append("\n")
        } else {
            let mut packed = u32::from(unit);
            if is_high_surrogate(unit) && i + 1 < text_len {
                i += 1;
                if let Ok(low) = cursor.read_u16() {
                    packed = pack_surrogate_pair(unit, low);
                }
            }
            acc.append(encode_unit_into(packed, &mut buf))
        };
        if !accepted {
            return false;
        }
        i += 1;
    }

    acc.append("\n")
}

/// 8ビット文字のテキストアトムを読む（各バイトはLatin-1として扱う）
fn read_byte_text(cursor: &mut BinaryCursor<'_>, length: usize, acc: &mut TextAccumulator) -> bool {
    let text_len = length.min(cursor.remaining());
    let Ok(bytes) = cursor.read_bytes(text_len) else {
        return acc.append("\n");
    };

    let mut buf = [0u8; 4];
    for &byte in bytes {
        let accepted = if byte == 0x0B || byte == 0x0D {
            acc.append("\n")
        } else {
            acc.append(encode_unit_into(u32::from(byte), &mut buf))
        };
        if !accepted {
            return false;
        }
    }

    acc.append("\n")
}

/// PowerPoint 97-2003（`.ppt` / `.pps` / `.dps`）パーサー
#[derive(Debug)]
pub struct PptParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl PptParser {
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

    /// CFBコンテナから`PowerPoint Document`ストリームを取り出す
    fn read_document_stream(&self) -> Result<Vec<u8>, DocParserError> {
        let bytes = self.source.read()?;
        let missing = || DocParserError::MissingPart(PPT_DOCUMENT_STREAM.to_string());

        let mut compound = cfb::CompoundFile::open(Cursor::new(bytes)).map_err(|e| {
            debug!("Not a compound file: {}", e);
            missing()
        })?;

        let stream_path = format!("/{}", PPT_DOCUMENT_STREAM);
        if !compound.is_stream(&stream_path) {
            return Err(missing());
        }

        let mut stream = compound.open_stream(&stream_path).map_err(|_| missing())?;
        let mut data = Vec::new();
        stream.read_to_end(&mut data)?;
        Ok(data)
    }
}

impl DocumentParser for PptParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Ppt
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let stream = self.read_document_stream()?;
        if stream.is_empty() {
            return Err(DocParserError::MissingPart(PPT_DOCUMENT_STREAM.to_string()));
        }

        debug!(
            "Walking {} ({} bytes): {}",
            PPT_DOCUMENT_STREAM,
            stream.len(),
            self.source.path().display()
        );
        let records = walk_records(&stream, &mut self.accumulator);
        info!("PPT: {} records, {} bytes of text", records, self.accumulator.len());
        Ok(())
    }
}
