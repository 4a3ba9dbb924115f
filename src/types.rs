//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。

use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::api::DocumentFormat;
use crate::error::DocParserError;

/// 1つの文書から抽出した結果
///
/// `truncated`が`true`の場合、`text`の末尾には切り詰めマーカーが付加されています。
///
/// # 使用例
///
/// ```rust
/// use docparser::{DocumentFormat, Extraction};
///
/// let extraction = Extraction {
///     text: "Hello\n".to_string(),
///     truncated: false,
///     format: DocumentFormat::Txt,
/// };
/// let json = serde_json::to_string(&extraction).unwrap();
/// assert_eq!(json, r#"{"text":"Hello\n","truncated":false,"format":"txt"}"#);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Extraction {
    /// 抽出されたテキスト
    pub text: String,

    /// バイト上限により切り詰められたか
    pub truncated: bool,

    /// 使用したパーサーのフォーマット
    pub format: DocumentFormat,
}

impl Extraction {
    /// テキストのバイト数
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// テキストが空かどうか
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// 抽出元のパスを付けてJSON Lines形式の1行を書き出す
    ///
    /// 検索インデックスへの投入用に、`path`・`format`・`truncated`・`text`の
    /// 4フィールドを持つオブジェクトを1行で出力します。
    ///
    /// # 引数
    ///
    /// * `path` - 抽出元のファイルパス
    /// * `writer` - 出力先
    pub fn write_json_line<W: Write>(&self, path: &Path, mut writer: W) -> Result<(), DocParserError> {
        #[derive(Serialize)]
        struct Record<'a> {
            path: String,
            format: DocumentFormat,
            truncated: bool,
            text: &'a str,
        }

        let record = Record {
            path: path.display().to_string(),
            format: self.format,
            truncated: self.truncated,
            text: &self.text,
        };
        serde_json::to_writer(&mut writer, &record).map_err(|e| {
            DocParserError::Io(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("JSON serialization error: {}", e),
            ))
        })?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}
