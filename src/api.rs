//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::path::Path;

use serde::Serialize;

/// 文書フォーマット
///
/// ファイル拡張子から選択されるパーサーの種類です。
/// 拡張子の比較は大文字小文字を区別しません。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
#[non_exhaustive]
pub enum DocumentFormat {
    /// Word 2007以降（`.docx`）
    Docx,

    /// PowerPoint 2007以降（`.pptx` / `.ppsx`）
    Pptx,

    /// プレーンテキスト（`.txt` / `.text` / `.md` / `.markdown`）
    Txt,

    /// リッチテキスト（`.rtf`）
    Rtf,

    /// OpenDocument（`.odt` / `.ods` / `.odp` / `.odg`）
    Odf,

    /// 中国の電子文書規格OFD（`.ofd`）
    Ofd,

    /// Excelブック（`.xls` / `.xlsx`）
    ///
    /// `calamine`による解析。
    Excel,

    /// Excelバイナリブック（`.xlsb`）
    Xlsb,

    /// PowerPoint 97-2003（`.ppt` / `.pps` / `.dps`）
    Ppt,

    /// PDF（`.pdf`）
    Pdf,
}

impl DocumentFormat {
    /// 拡張子（ドットなし）からフォーマットを判定する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use docparser::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_extension("DOCX"), Some(DocumentFormat::Docx));
    /// assert_eq!(DocumentFormat::from_extension("ppsx"), Some(DocumentFormat::Pptx));
    /// assert_eq!(DocumentFormat::from_extension("doc"), None);
    /// ```
    pub fn from_extension(extension: &str) -> Option<Self> {
        let format = match extension.to_ascii_lowercase().as_str() {
            "docx" => DocumentFormat::Docx,
            "pptx" | "ppsx" => DocumentFormat::Pptx,
            "txt" | "text" | "md" | "markdown" => DocumentFormat::Txt,
            "rtf" => DocumentFormat::Rtf,
            "odt" | "ods" | "odp" | "odg" => DocumentFormat::Odf,
            "ofd" => DocumentFormat::Ofd,
            "xls" | "xlsx" => DocumentFormat::Excel,
            "xlsb" => DocumentFormat::Xlsb,
            "ppt" | "pps" | "dps" => DocumentFormat::Ppt,
            "pdf" => DocumentFormat::Pdf,
            _ => return None,
        };
        Some(format)
    }

    /// ファイルパスの拡張子からフォーマットを判定する
    ///
    /// 拡張子のないファイルは`None`です。
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use docparser::DocumentFormat;
    ///
    /// assert_eq!(DocumentFormat::from_path("report.XLSB"), Some(DocumentFormat::Xlsb));
    /// assert_eq!(DocumentFormat::from_path("README"), None);
    /// ```
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// 表示用の名前
    pub fn name(&self) -> &'static str {
        match self {
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pptx => "pptx",
            DocumentFormat::Txt => "txt",
            DocumentFormat::Rtf => "rtf",
            DocumentFormat::Odf => "odf",
            DocumentFormat::Ofd => "ofd",
            DocumentFormat::Excel => "excel",
            DocumentFormat::Xlsb => "xlsb",
            DocumentFormat::Ppt => "ppt",
            DocumentFormat::Pdf => "pdf",
        }
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_extension_is_case_insensitive() {
        assert_eq!(DocumentFormat::from_extension("Pdf"), Some(DocumentFormat::Pdf));
        assert_eq!(DocumentFormat::from_extension("ODG"), Some(DocumentFormat::Odf));
        assert_eq!(DocumentFormat::from_extension("Markdown"), Some(DocumentFormat::Txt));
    }

    #[test]
    fn test_dispatch_table() {
        let cases = [
            ("a.docx", DocumentFormat::Docx),
            ("a.pptx", DocumentFormat::Pptx),
            ("a.txt", DocumentFormat::Txt),
            ("a.md", DocumentFormat::Txt),
            ("a.rtf", DocumentFormat::Rtf),
            ("a.ods", DocumentFormat::Odf),
            ("a.ofd", DocumentFormat::Ofd),
            ("a.xls", DocumentFormat::Excel),
            ("a.xlsx", DocumentFormat::Excel),
            ("a.xlsb", DocumentFormat::Xlsb),
            ("a.pps", DocumentFormat::Ppt),
            ("a.dps", DocumentFormat::Ppt),
            ("dir.v2/a.pdf", DocumentFormat::Pdf),
        ];
        for (path, expected) in cases {
            assert_eq!(DocumentFormat::from_path(path), Some(expected), "{}", path);
        }
    }

    #[test]
    fn test_unsupported_paths() {
        assert_eq!(DocumentFormat::from_path("noext"), None);
        assert_eq!(DocumentFormat::from_path("legacy.doc"), None);
        assert_eq!(DocumentFormat::from_path("archive.zip"), None);
        assert_eq!(DocumentFormat::from_path("trailing."), None);
    }

    #[test]
    fn test_serialize_lowercase() {
        let json = serde_json::to_string(&DocumentFormat::Xlsb).unwrap();
        assert_eq!(json, "\"xlsb\"");
    }
}
