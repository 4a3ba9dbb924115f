//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。

use thiserror::Error;

/// docparserクレート全体で使用するエラー型
///
/// 各フォーマットパーサーの`convert()`が返す致命的エラーと、
/// バイナリカーソルの「データ不足」シグナルを統一的に扱います。
///
/// # エラーの種類
///
/// - `Io`: ファイル読み込みの失敗
/// - `Zip` / `Xml`: コンテナまたは必須XMLパートの破損
/// - `MissingPart`: 必須ストリーム・パートの欠落（構造的エラー）
/// - `UnexpectedEof`: バイナリレコードの途中でバッファが尽きた（局所的エラー）
/// - `UnsupportedFormat`: 拡張子に対応するパーサーがない
///
/// # 使用例
///
/// ```rust,no_run
/// use docparser::DocParserError;
/// use std::fs::File;
///
/// fn open_document(path: &str) -> Result<(), DocParserError> {
///     let _file = File::open(path)?;  // Ioエラーが自動的に変換される
///     Ok(())
/// }
/// ```
#[derive(Error, Debug)]
pub enum DocParserError {
    /// I/O操作中に発生したエラー
    ///
    /// `#[from]`属性により、`std::io::Error`から自動的に変換されます。
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIPアーカイブの解析エラー
    #[error("ZIP archive error: {0}")]
    Zip(String),

    /// XMLパートの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// XLS/XLSXの解析中に発生したエラー（calamine由来）
    #[error("Failed to parse spreadsheet: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// PDFバックエンドのエラー
    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),

    /// 必須のストリームまたはパートが存在しない
    ///
    /// 例: PPTの`PowerPoint Document`ストリーム、ODFの`content.xml`、
    /// OFDの`OFD.xml`ルートなど。パーサーは空のテキストと非ゼロのステータスを返します。
    #[error("Required part is missing: {0}")]
    MissingPart(String),

    /// バイナリカーソルの読み込みに必要なバイト数が残っていない
    ///
    /// 呼び出し側は「このストリームの解析を中止する」シグナルとして扱い、
    /// 変換全体の致命的エラーにはしません。
    #[error("Unexpected end of data: needed {needed} bytes, {remaining} remaining")]
    UnexpectedEof {
        /// 要求されたバイト数
        needed: usize,
        /// 残りのバイト数
        remaining: usize,
    },

    /// バイナリレコードの値が仕様上の範囲を外れている
    ///
    /// 例: XLSBの行番号・列番号がシートの最大サイズを超える場合。
    /// `UnexpectedEof`と同様に、該当ストリームの解析だけを中止します。
    #[error("Malformed record: {0}")]
    MalformedRecord(String),

    /// サポートされていないファイル形式
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// セキュリティ制限に違反したエラー
    ///
    /// ZIP bomb攻撃、ファイルサイズ制限などのセキュリティ制限に違反した場合に発生します。
    #[error("Security violation: {0}")]
    SecurityViolation(String),

    /// 設定の検証に失敗したエラー
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DocParserError {
    /// 従来のステータスコードへの変換
    ///
    /// 成功は0、致命的エラーは非ゼロです。PPTストリーム欠落は3、
    /// OFDの構造エラーは1、それ以外は-1を返します。
    pub fn status_code(&self) -> i32 {
        match self {
            DocParserError::MissingPart(part) if part == crate::parser::PPT_DOCUMENT_STREAM => 3,
            DocParserError::MissingPart(part) if part.starts_with("OFD") => 1,
            _ => -1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_io_error() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error: DocParserError = io_err.into();

        match error {
            DocParserError::Io(e) => {
                assert_eq!(e.kind(), io::ErrorKind::NotFound);
                assert_eq!(e.to_string(), "File not found");
            }
            _ => panic!("Expected Io error"),
        }
    }

    #[test]
    fn test_spreadsheet_error_display() {
        let error: DocParserError = calamine::Error::Msg("Corrupted file").into();

        let error_msg = error.to_string();
        assert!(error_msg.contains("Failed to parse spreadsheet"));
        assert!(error_msg.contains("Corrupted file"));
    }

    #[test]
    fn test_unexpected_eof_display() {
        let error = DocParserError::UnexpectedEof {
            needed: 4,
            remaining: 1,
        };
        assert_eq!(
            error.to_string(),
            "Unexpected end of data: needed 4 bytes, 1 remaining"
        );
    }

    #[test]
    fn test_status_codes() {
        let ppt = DocParserError::MissingPart("PowerPoint Document".to_string());
        assert_eq!(ppt.status_code(), 3);

        let ofd = DocParserError::MissingPart("OFD.xml".to_string());
        assert_eq!(ofd.status_code(), 1);

        let docx = DocParserError::MissingPart("word/document.xml".to_string());
        assert_eq!(docx.status_code(), -1);

        assert_eq!(DocParserError::Pdf("locked".to_string()).status_code(), -1);
    }

    #[test]
    fn test_error_conversion_with_question_mark() {
        fn io_operation() -> Result<(), DocParserError> {
            let _file = std::fs::File::open("nonexistent_file.docx")?;
            Ok(())
        }

        match io_operation() {
            Err(DocParserError::Io(_)) => {}
            _ => panic!("Expected Io error from ? operator"),
        }
    }
}
