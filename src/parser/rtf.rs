//! RTF Parser Module
//!
//! RTFの制御語ストリームを走査し、段落単位でテキストを取り出します。
//!
//! フォント表・スタイルシート・ヘッダー/フッター・埋め込みオブジェクトなどの
//! 出力先（destination）グループは読み飛ばします。`\'hh`は文書のコードページ
//! （`\ansicpgN`、既定はWindows-1252）で、`\uN`はUTF-16コードユニットとして復号します。

use std::path::PathBuf;

use encoding_rs::{Encoding, WINDOWS_1252};
use log::{debug, info};

use super::{DocumentParser, Source};
use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::security::SecurityConfig;
use crate::utf16::{encode_unit, pack_surrogate_pair};

/// 内容を出力しないグループの制御語
const SKIPPED_DESTINATIONS: [&str; 15] = [
    "fonttbl",
    "filetbl",
    "colortbl",
    "stylesheet",
    "info",
    "header",
    "headerl",
    "headerr",
    "headerf",
    "footer",
    "footerl",
    "footerr",
    "footerf",
    "object",
    "pict",
];

/// 制御語名の最大長
const MAX_KEYWORD_LEN: usize = 32;

/// グループ（`{ ... }`）ごとに保存・復元される状態
#[derive(Debug, Clone, Copy)]
struct GroupState {
    /// このグループの内容を出力しない
    skip: bool,
    /// リスト記号（`\listtext`）の途中
    in_bullet: bool,
    /// `\uN`の後に読み飛ばす代替文字数
    unicode_skip: usize,
}

impl Default for GroupState {
    fn default() -> Self {
        Self {
            skip: false,
            in_bullet: false,
            unicode_skip: 1,
        }
    }
}

/// コードページ番号に対応するエンコーディング
fn codepage_encoding(codepage: i32) -> Option<&'static Encoding> {
    let label = match codepage {
        874 => "windows-874".to_string(),
        932 => "shift_jis".to_string(),
        936 => "gbk".to_string(),
        949 => "euc-kr".to_string(),
        950 => "big5".to_string(),
        1250..=1258 => format!("windows-{}", codepage),
        10000 => "macintosh".to_string(),
        65001 => "utf-8".to_string(),
        _ => return None,
    };
    Encoding::for_label(label.as_bytes())
}

/// RTFを段落ごとに返すスキャナー
///
/// 各要素は`\n`で終わる段落テキストです（最後の段落のみ改行なしの場合があります）。
///
/// # 使用例
///
/// ```rust,ignore
/// let paragraphs: Vec<String> = RtfScanner::new(br"{\rtf1 Hello\par World}").collect();
/// assert_eq!(paragraphs, vec!["Hello\n", "World"]);
/// ```
pub(crate) struct RtfScanner<'a> {
    data: &'a [u8],
    pos: usize,
    state: GroupState,
    stack: Vec<GroupState>,
    encoding: &'static Encoding,
    /// コードページで復号待ちのバイト列（`\'hh`の連続）
    pending_bytes: Vec<u8>,
    /// `\uN`の後に残っている代替文字数
    skip_chars: usize,
    high_surrogate: Option<u16>,
    /// 直前が`\*`だった
    ignorable: bool,
    line: String,
}

impl<'a> RtfScanner<'a> {
    pub(crate) fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            state: GroupState::default(),
            stack: Vec::new(),
            encoding: WINDOWS_1252,
            pending_bytes: Vec::new(),
            skip_chars: 0,
            high_surrogate: None,
            ignorable: false,
            line: String::new(),
        }
    }

    fn suppressed(&self) -> bool {
        self.state.skip || self.state.in_bullet
    }

    fn flush_bytes(&mut self) {
        if self.pending_bytes.is_empty() {
            return;
        }
        let (decoded, _, _) = self.encoding.decode(&self.pending_bytes);
        self.line.push_str(&decoded);
        self.pending_bytes.clear();
    }

    fn emit_str(&mut self, text: &str) {
        if self.suppressed() {
            return;
        }
        self.flush_bytes();
        if self.high_surrogate.take().is_some() {
            self.line.push('\u{FFFD}');
        }
        self.line.push_str(text);
    }

    fn emit_char(&mut self, ch: char) {
        let mut buf = [0u8; 4];
        self.emit_str(ch.encode_utf8(&mut buf));
    }

    fn emit_byte(&mut self, byte: u8) {
        if !self.suppressed() {
            self.pending_bytes.push(byte);
        }
    }

    /// 段落を区切る。出力対象外のグループ内では何もしない
    fn paragraph_break(&mut self) -> Option<String> {
        if self.state.skip {
            return None;
        }
        self.emit_char('\n');
        Some(std::mem::take(&mut self.line))
    }

    /// `\uN`（Nは符号付き16ビット）を処理する
    fn unicode(&mut self, param: i32) {
        self.skip_chars = self.state.unicode_skip;
        if self.suppressed() {
            return;
        }
        let unit = if param < 0 { param + 65536 } else { param };
        let unit = unit.clamp(0, 0xFFFF) as u16;

        match unit {
            0xD800..=0xDBFF => {
                self.flush_bytes();
                if self.high_surrogate.replace(unit).is_some() {
                    self.line.push('\u{FFFD}');
                }
            }
            0xDC00..=0xDFFF => match self.high_surrogate.take() {
                Some(high) => {
                    self.flush_bytes();
                    self.line.push_str(&encode_unit(pack_surrogate_pair(high, unit)));
                }
                None => self.emit_char('\u{FFFD}'),
            },
            _ => {
                let text = encode_unit(u32::from(unit));
                self.emit_str(&text);
            }
        }
    }

    /// 英字の制御語とその数値パラメーターを読む（`pos`は先頭の英字を指す）
    fn read_control_word(&mut self) -> (String, Option<i32>) {
        let start = self.pos;
        while self.pos < self.data.len()
            && self.data[self.pos].is_ascii_alphabetic()
            && self.pos - start < MAX_KEYWORD_LEN
        {
            self.pos += 1;
        }
        let name = String::from_utf8_lossy(&self.data[start..self.pos]).into_owned();

        let param_start = self.pos;
        if self.pos < self.data.len() && self.data[self.pos] == b'-' {
            self.pos += 1;
        }
        let digits_start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos].is_ascii_digit() {
            self.pos += 1;
        }
        let param = if self.pos > digits_start {
            std::str::from_utf8(&self.data[param_start..self.pos])
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .map(|v| v.clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32)
        } else {
            self.pos = param_start;
            None
        };

        // 区切りの空白1文字は制御語の一部
        if self.pos < self.data.len() && self.data[self.pos] == b' ' {
            self.pos += 1;
        }
        (name, param)
    }

    /// 制御語を処理する。段落が確定した場合はそれを返す
    fn control_word(&mut self, name: &str, param: Option<i32>) -> Option<String> {
        if name == "bin" {
            let len = param.unwrap_or(0).max(0) as usize;
            self.pos = (self.pos + len).min(self.data.len());
            return None;
        }

        if self.ignorable {
            self.ignorable = false;
            // `{\*\shppict ...}`は中身の`\pict`グループで判断する
            if name != "shppict" {
                self.state.skip = true;
                return None;
            }
        }

        if SKIPPED_DESTINATIONS.contains(&name) {
            self.state.skip = true;
            return None;
        }

        match name {
            "par" | "line" | "softline" | "cell" | "row" => return self.paragraph_break(),
            "tab" => {
                if self.state.in_bullet {
                    self.state.in_bullet = false;
                } else {
                    self.emit_char('\t');
                }
            }
            "enspace" | "emspace" => self.emit_char('\u{00A0}'),
            "endash" => self.emit_char('\u{2013}'),
            "emdash" => self.emit_char('\u{2014}'),
            "bullet" => self.emit_char('\u{2022}'),
            "lquote" => self.emit_char('\u{2018}'),
            "rquote" => self.emit_char('\u{2019}'),
            "ldblquote" => self.emit_char('\u{201C}'),
            "rdblquote" => self.emit_char('\u{201D}'),
            "listtext" | "pntext" => self.state.in_bullet = true,
            "u" => {
                if let Some(param) = param {
                    self.unicode(param);
                }
            }
            "uc" => self.state.unicode_skip = param.unwrap_or(1).max(0) as usize,
            "ansicpg" => {
                if let Some(encoding) = param.and_then(codepage_encoding) {
                    self.flush_bytes();
                    debug!("RTF code page {} ({})", param.unwrap_or(0), encoding.name());
                    self.encoding = encoding;
                }
            }
            _ => {}
        }
        None
    }

    /// `\`の直後を処理する
    fn control(&mut self) -> Option<String> {
        let Some(&next) = self.data.get(self.pos) else {
            return None;
        };

        if next.is_ascii_alphabetic() {
            let (name, param) = self.read_control_word();
            return self.control_word(&name, param);
        }

        self.pos += 1;
        match next {
            b'\\' | b'{' | b'}' => self.emit_char(next as char),
            b'\'' => {
                let hex = self.data.get(self.pos..self.pos + 2);
                let byte = hex
                    .and_then(|h| std::str::from_utf8(h).ok())
                    .and_then(|h| u8::from_str_radix(h, 16).ok());
                if let Some(byte) = byte {
                    self.pos += 2;
                    if self.skip_chars > 0 {
                        self.skip_chars -= 1;
                    } else {
                        self.emit_byte(byte);
                    }
                }
            }
            b'*' => self.ignorable = true,
            b'~' => self.emit_char('\u{00A0}'),
            b'_' => self.emit_char('-'),
            b'\r' | b'\n' => return self.paragraph_break(),
            _ => {}
        }
        None
    }
}

impl<'a> Iterator for RtfScanner<'a> {
    type Item = String;

    fn next(&mut self) -> Option<Self::Item> {
        while self.pos < self.data.len() {
            let byte = self.data[self.pos];
            self.pos += 1;

            let paragraph = match byte {
                b'\\' => self.control(),
                b'{' => {
                    self.flush_bytes();
                    self.stack.push(self.state);
                    self.skip_chars = 0;
                    None
                }
                b'}' => {
                    self.flush_bytes();
                    if let Some(state) = self.stack.pop() {
                        self.state = state;
                    }
                    self.ignorable = false;
                    self.skip_chars = 0;
                    None
                }
                b'\r' | b'\n' => None,
                _ if self.skip_chars > 0 => {
                    self.skip_chars -= 1;
                    None
                }
                _ if byte < 0x80 => {
                    self.emit_char(byte as char);
                    None
                }
                _ => {
                    self.emit_byte(byte);
                    None
                }
            };

            if paragraph.is_some() {
                return paragraph;
            }
        }

        self.flush_bytes();
        if self.line.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.line))
        }
    }
}

/// リッチテキスト（`.rtf`）パーサー
#[derive(Debug)]
pub struct RtfParser {
    source: Source,
    accumulator: TextAccumulator,
}

impl RtfParser {
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

impl DocumentParser for RtfParser {
    fn format(&self) -> DocumentFormat {
        DocumentFormat::Rtf
    }

    fn accumulator(&self) -> &TextAccumulator {
        &self.accumulator
    }

    fn accumulator_mut(&mut self) -> &mut TextAccumulator {
        &mut self.accumulator
    }

    fn convert(&mut self) -> Result<(), DocParserError> {
        let data = self.source.read()?;

        let mut paragraphs = 0;
        for paragraph in RtfScanner::new(&data) {
            paragraphs += 1;
            if !self.accumulator.append(&paragraph) {
                break;
            }
        }

        info!("RTF: {} paragraphs, {} bytes of text", paragraphs, self.accumulator.len());
        Ok(())
    }
}
