//! Parser Module
//!
//! フォーマットごとのパーサーと、それらが共有する`DocumentParser`トレイト。
//!
//! すべてのパーサーは自身の`TextAccumulator`を所有し、テキストの出力は
//! `TextAccumulator::append`だけを経由します。切り詰めの判断はそこに集約されています。

mod docx;
mod excel;
mod odf;
mod ofd;
mod pdf;
mod ppt;
mod pptx;
mod rtf;
mod txt;
mod xlsb;

use std::path::{Path, PathBuf};

use log::warn;

use crate::accumulator::TextAccumulator;
use crate::api::DocumentFormat;
use crate::archive::ArchiveReader;
use crate::error::DocParserError;
use crate::security::{read_input, SecurityConfig};

pub use docx::DocxParser;
pub use excel::ExcelParser;
pub use odf::OdfParser;
pub use ofd::OfdParser;
pub use pdf::PdfParser;
pub use ppt::{walk_records, PptParser};
pub use pptx::PptxParser;
pub use rtf::RtfParser;
pub use txt::TxtParser;
pub use xlsb::{decode_rk, parse_shared_strings, SheetDimension, WorksheetDecoder, XlsbParser};

/// PPTのレコードストリームを格納するCFBストリーム名
pub(crate) const PPT_DOCUMENT_STREAM: &str = "PowerPoint Document";

/// フォーマットパーサーの共通インターフェース
///
/// 呼び出し側は`set_truncation_limit`（任意）→`convert`→`text`/`is_truncated`の順に使います。
///
/// # 使用例
///
/// ```rust,no_run
/// use docparser::{DocumentParser, TxtParser};
///
/// # fn main() -> Result<(), docparser::DocParserError> {
/// let mut parser = TxtParser::new("notes.txt");
/// parser.set_truncation_limit(1024);
/// parser.convert()?;
/// println!("{} (truncated: {})", parser.text(), parser.is_truncated());
/// # Ok(())
/// # }
/// ```
pub trait DocumentParser {
    /// このパーサーが扱うフォーマット
    fn format(&self) -> DocumentFormat;

    /// 出力先のアキュムレーター
    fn accumulator(&self) -> &TextAccumulator;

    /// 出力先のアキュムレーター（可変）
    fn accumulator_mut(&mut self) -> &mut TextAccumulator;

    /// 文書を解析してテキストを蓄積する
    ///
    /// 必須パートの欠落などの構造的エラーのみ`Err`になります。
    /// レコードの破損など局所的な問題はログに記録して読み飛ばします。
    fn convert(&mut self) -> Result<(), DocParserError>;

    /// バイト上限を設定する（`convert`の前に1回だけ呼ぶ）
    fn set_truncation_limit(&mut self, max_bytes: usize) {
        self.accumulator_mut().set_limit(max_bytes);
    }

    /// 蓄積されたテキスト
    fn text(&self) -> &str {
        self.accumulator().text()
    }

    /// 切り詰めが発生したかどうか
    fn is_truncated(&self) -> bool {
        self.accumulator().is_truncated()
    }

    /// `convert`を実行し、従来のステータスコードを返す
    ///
    /// 成功は0、失敗は`DocParserError::status_code`の値です。
    fn convert_status(&mut self) -> i32 {
        match self.convert() {
            Ok(()) => 0,
            Err(e) => {
                warn!("{} conversion failed: {}", self.format(), e);
                e.status_code()
            }
        }
    }
}

/// パーサーが読み込む入力ファイルとセキュリティ設定
#[derive(Debug, Clone)]
pub(crate) struct Source {
    path: PathBuf,
    security: SecurityConfig,
}

impl Source {
    pub(crate) fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            security: SecurityConfig::default(),
        }
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn set_security_config(&mut self, config: SecurityConfig) {
        self.security = config;
    }

    /// ファイル全体をサイズ制限付きで読み込む
    pub(crate) fn read(&self) -> Result<Vec<u8>, DocParserError> {
        read_input(&self.path, &self.security)
    }

    /// ファイルをZIPコンテナとして開く
    pub(crate) fn open_archive(&self) -> Result<ArchiveReader, DocParserError> {
        ArchiveReader::open(&self.path, &self.security)
    }
}

/// フォーマットに対応するパーサーを生成する
///
/// 生成されたパーサーはそれぞれ独立したバッファを持つため、
/// 異なるパーサーを別々のスレッドで同時に実行できます。
pub fn create_parser(
    format: DocumentFormat,
    path: impl Into<PathBuf>,
    security: SecurityConfig,
) -> Box<dyn DocumentParser + Send> {
    let path = path.into();
    match format {
        DocumentFormat::Docx => Box::new(DocxParser::new(path).with_security_config(security)),
        DocumentFormat::Pptx => Box::new(PptxParser::new(path).with_security_config(security)),
        DocumentFormat::Txt => Box::new(TxtParser::new(path).with_security_config(security)),
        DocumentFormat::Rtf => Box::new(RtfParser::new(path).with_security_config(security)),
        DocumentFormat::Odf => Box::new(OdfParser::new(path).with_security_config(security)),
        DocumentFormat::Ofd => Box::new(OfdParser::new(path).with_security_config(security)),
        DocumentFormat::Excel => Box::new(ExcelParser::new(path).with_security_config(security)),
        DocumentFormat::Xlsb => Box::new(XlsbParser::new(path).with_security_config(security)),
        DocumentFormat::Ppt => Box::new(PptParser::new(path).with_security_config(security)),
        DocumentFormat::Pdf => Box::new(PdfParser::new(path).with_security_config(security)),
    }
}
