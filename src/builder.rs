//! Builder Module
//!
//! Fluent Builder APIを提供し、`Extractor`インスタンスを段階的に構築する。

use std::path::{Path, PathBuf};

use log::{debug, error};
use rayon::prelude::*;

use crate::api::DocumentFormat;
use crate::error::DocParserError;
use crate::parser::create_parser;
use crate::security::SecurityConfig;
use crate::types::Extraction;

/// 切り詰め時に付加する既定のマーカー
pub const DEFAULT_TRUNCATION_MARKER: &str = "\n[CONTENT_TRUNCATED]";

/// 抽出処理の設定を保持する内部構造体
#[derive(Debug, Clone)]
pub(crate) struct ExtractionConfig {
    /// バイト上限（Noneの場合は無制限）
    pub truncation_limit: Option<usize>,

    /// 切り詰め時に付加するマーカー
    pub truncation_marker: String,

    /// 入力ファイル・コンテナの制限
    pub security: SecurityConfig,

    /// 拡張子による判定を上書きするフォーマット
    pub format_override: Option<DocumentFormat>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            truncation_limit: None,
            truncation_marker: DEFAULT_TRUNCATION_MARKER.to_string(),
            security: SecurityConfig::default(),
            format_override: None,
        }
    }
}

/// Fluent Builder APIを提供する構造体
///
/// `Extractor`インスタンスを段階的に構築するためのビルダーです。
/// すべての設定項目にデフォルト値が設定されており、必要な設定のみをオーバーライドできます。
///
/// # 使用例
///
/// ```rust,no_run
/// use docparser::ExtractorBuilder;
///
/// # fn main() -> Result<(), docparser::DocParserError> {
/// let extractor = ExtractorBuilder::new()
///     .with_truncation_limit(64 * 1024)
///     .build()?;
/// let extraction = extractor.extract_file("report.docx")?;
/// println!("{}", extraction.text);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ExtractorBuilder {
    /// 内部設定（構築中）
    config: ExtractionConfig,
}

impl ExtractorBuilder {
    /// デフォルト設定を持つビルダーインスタンスを生成する
    ///
    /// # デフォルト設定
    ///
    /// - バイト上限: なし
    /// - 切り詰めマーカー: `"\n[CONTENT_TRUNCATED]"`
    /// - セキュリティ設定: `SecurityConfig::default()`
    /// - フォーマット: 拡張子から判定
    pub fn new() -> Self {
        Self::default()
    }

    /// 抽出するテキストのバイト上限を設定する
    ///
    /// 上限に達した文書はそこで解析を打ち切り、マーカーを付加します。
    /// マーカーの長さは上限に含まれません。
    pub fn with_truncation_limit(mut self, max_bytes: usize) -> Self {
        self.config.truncation_limit = Some(max_bytes);
        self
    }

    /// 切り詰め時に付加するマーカーを設定する
    ///
    /// 空文字列は`build()`で`Config`エラーになります。
    pub fn with_truncation_marker(mut self, marker: impl Into<String>) -> Self {
        self.config.truncation_marker = marker.into();
        self
    }

    /// セキュリティ設定を指定する
    ///
    /// # 使用例
    ///
    /// ```rust
    /// use docparser::{ExtractorBuilder, SecurityConfig};
    ///
    /// let config = SecurityConfig {
    ///     max_file_count: 100,
    ///     ..SecurityConfig::default()
    /// };
    /// let extractor = ExtractorBuilder::new().with_security_config(config).build();
    /// assert!(extractor.is_ok());
    /// ```
    pub fn with_security_config(mut self, config: SecurityConfig) -> Self {
        self.config.security = config;
        self
    }

    /// 拡張子による判定を行わず、常に指定したフォーマットで解析する
    pub fn with_format_override(mut self, format: DocumentFormat) -> Self {
        self.config.format_override = Some(format);
        self
    }

    /// 設定を検証して`Extractor`を構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(Extractor)` - 設定が有効な場合
    /// * `Err(DocParserError::Config)` - マーカーが空、またはセキュリティ設定が無効な場合
    pub fn build(self) -> Result<Extractor, DocParserError> {
        if self.config.truncation_marker.is_empty() {
            return Err(DocParserError::Config(
                "Truncation marker must not be empty".to_string(),
            ));
        }

        self.config.security.validate()?;

        Ok(Extractor {
            config: self.config,
        })
    }
}

/// 抽出処理のファサード
///
/// ファイルごとに独立したパーサーを生成するため、
/// 1つの`Extractor`を複数スレッドから共有できます。
#[derive(Debug, Clone)]
pub struct Extractor {
    config: ExtractionConfig,
}

impl Extractor {
    /// 設定されたバイト上限
    pub fn truncation_limit(&self) -> Option<usize> {
        self.config.truncation_limit
    }

    fn resolve_format(&self, path: &Path) -> Result<DocumentFormat, DocParserError> {
        match self.config.format_override {
            Some(format) => Ok(format),
            None => DocumentFormat::from_path(path).ok_or_else(|| {
                DocParserError::UnsupportedFormat(path.display().to_string())
            }),
        }
    }

    /// 1つのファイルからテキストを抽出する
    ///
    /// # 引数
    ///
    /// * `path` - 入力ファイルのパス
    ///
    /// # 戻り値
    ///
    /// * `Ok(Extraction)` - 抽出に成功した場合（切り詰め時はマーカー付き）
    /// * `Err(DocParserError::UnsupportedFormat)` - 拡張子に対応するパーサーがない場合
    /// * `Err(DocParserError)` - パーサーが構造的エラーを返した場合
    pub fn extract_file(&self, path: impl AsRef<Path>) -> Result<Extraction, DocParserError> {
        let path = path.as_ref();
        let format = self.resolve_format(path)?;
        debug!("Extracting {} as {}", path.display(), format);

        let mut parser = create_parser(format, path, self.config.security.clone());
        if let Some(limit) = self.config.truncation_limit {
            parser.set_truncation_limit(limit);
        }
        parser.convert()?;

        let truncated = parser.is_truncated();
        let mut text = parser.text().to_string();
        if truncated {
            text.push_str(&self.config.truncation_marker);
        }

        Ok(Extraction {
            text,
            truncated,
            format,
        })
    }

    /// 1つのファイルからテキストを抽出し、失敗時は空文字列を返す
    ///
    /// エラーはログに記録されます。バッチ処理で1ファイルの失敗が全体を止めないための入口です。
    pub fn extract_file_lossy(&self, path: impl AsRef<Path>) -> String {
        let path = path.as_ref();
        match self.extract_file(path) {
            Ok(extraction) => extraction.text,
            Err(e) => {
                error!("Failed to extract {}: {}", path.display(), e);
                String::new()
            }
        }
    }

    /// 複数のファイルを並列に抽出する
    ///
    /// 結果は入力と同じ順序で返されます。
    ///
    /// # 使用例
    ///
    /// ```rust,no_run
    /// use docparser::ExtractorBuilder;
    ///
    /// # fn main() -> Result<(), docparser::DocParserError> {
    /// let extractor = ExtractorBuilder::new().build()?;
    /// let results = extractor.extract_files(&["a.pptx", "b.xlsb", "c.rtf"]);
    /// for result in results {
    ///     match result {
    ///         Ok(extraction) => println!("{}: {} bytes", extraction.format, extraction.len()),
    ///         Err(e) => eprintln!("{}", e),
    ///     }
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn extract_files<P>(&self, paths: &[P]) -> Vec<Result<Extraction, DocParserError>>
    where
        P: AsRef<Path> + Sync,
    {
        paths
            .par_iter()
            .map(|path| self.extract_file(path))
            .collect()
    }

    /// ディレクトリ直下の対応ファイルを並列に抽出する
    ///
    /// 拡張子に対応するパーサーがないファイルは対象外です。結果はパス順に並びます。
    pub fn extract_dir(
        &self,
        dir: impl AsRef<Path>,
    ) -> Result<Vec<(PathBuf, Result<Extraction, DocParserError>)>, DocParserError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && DocumentFormat::from_path(&path).is_some() {
                paths.push(path);
            }
        }
        paths.sort();

        let results = self.extract_files(&paths);
        Ok(paths.into_iter().zip(results).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, content: &[u8]) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(content).unwrap();
        file
    }

    #[test]
    fn test_extractor_builder_new() {
        let builder = ExtractorBuilder::new();
        assert!(builder.config.truncation_limit.is_none());
        assert_eq!(builder.config.truncation_marker, DEFAULT_TRUNCATION_MARKER);
        assert_eq!(builder.config.security, SecurityConfig::default());
        assert!(builder.config.format_override.is_none());
    }

    #[test]
    fn test_builder_method_chaining() {
        let builder = ExtractorBuilder::new()
            .with_truncation_limit(100)
            .with_truncation_marker("...")
            .with_format_override(DocumentFormat::Txt);
        assert_eq!(builder.config.truncation_limit, Some(100));
        assert_eq!(builder.config.truncation_marker, "...");
        assert_eq!(builder.config.format_override, Some(DocumentFormat::Txt));
    }

    #[test]
    fn test_build_with_empty_marker() {
        match ExtractorBuilder::new().with_truncation_marker("").build() {
            Err(DocParserError::Config(msg)) => assert!(msg.contains("marker")),
            other => panic!("Expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_build_with_invalid_security_config() {
        let config = SecurityConfig {
            max_file_count: 0,
            ..SecurityConfig::default()
        };
        let result = ExtractorBuilder::new().with_security_config(config).build();
        assert!(matches!(result, Err(DocParserError::Config(_))));
    }

    #[test]
    fn test_unsupported_extension() {
        let extractor = ExtractorBuilder::new().build().unwrap();
        assert!(matches!(
            extractor.extract_file("legacy.doc"),
            Err(DocParserError::UnsupportedFormat(_))
        ));
        assert!(matches!(
            extractor.extract_file("no_extension"),
            Err(DocParserError::UnsupportedFormat(_))
        ));
        assert_eq!(extractor.extract_file_lossy("legacy.doc"), "");
    }

    #[test]
    fn test_truncation_marker_appended() {
        let file = write_temp(".txt", b"alpha beta gamma\ndelta epsilon\n");
        let extractor = ExtractorBuilder::new()
            .with_truncation_limit(20)
            .build()
            .unwrap();

        let extraction = extractor.extract_file(file.path()).unwrap();
        assert!(extraction.truncated);
        assert_eq!(extraction.format, DocumentFormat::Txt);
        assert!(extraction.text.ends_with(DEFAULT_TRUNCATION_MARKER));
        assert!(extraction.text.starts_with("alpha beta gamma\n"));
    }

    #[test]
    fn test_no_marker_without_truncation() {
        let file = write_temp(".md", b"# Title\n");
        let extractor = ExtractorBuilder::new()
            .with_truncation_limit(1024)
            .build()
            .unwrap();

        let extraction = extractor.extract_file(file.path()).unwrap();
        assert!(!extraction.truncated);
        assert_eq!(extraction.text, "# Title\n");
    }

    #[test]
    fn test_format_override() {
        let file = write_temp(".dat", br"{\rtf1 Overridden\par}");
        let extractor = ExtractorBuilder::new()
            .with_format_override(DocumentFormat::Rtf)
            .build()
            .unwrap();

        let extraction = extractor.extract_file(file.path()).unwrap();
        assert_eq!(extraction.format, DocumentFormat::Rtf);
        assert_eq!(extraction.text, "Overridden\n");
    }

    #[test]
    fn test_extract_file_lossy_on_structural_error() {
        let file = write_temp(".odt", b"not a zip");
        let extractor = ExtractorBuilder::new().build().unwrap();
        assert_eq!(extractor.extract_file_lossy(file.path()), "");
    }

    #[test]
    fn test_extract_files_preserves_order() {
        let files: Vec<_> = (0..8)
            .map(|i| write_temp(".txt", format!("file {}\n", i).as_bytes()))
            .collect();
        let paths: Vec<PathBuf> = files.iter().map(|f| f.path().to_path_buf()).collect();

        let extractor = ExtractorBuilder::new().build().unwrap();
        let results = extractor.extract_files(&paths);
        assert_eq!(results.len(), 8);
        for (i, result) in results.iter().enumerate() {
            assert_eq!(result.as_ref().unwrap().text, format!("file {}\n", i));
        }
    }

    #[test]
    fn test_extract_dir_skips_unknown_extensions() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "second\n").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first\n").unwrap();
        std::fs::write(dir.path().join("c.bin"), [0u8, 1, 2]).unwrap();

        let extractor = ExtractorBuilder::new().build().unwrap();
        let results = extractor.extract_dir(dir.path()).unwrap();
        let texts: Vec<String> = results
            .into_iter()
            .map(|(_, result)| result.unwrap().text)
            .collect();
        assert_eq!(texts, vec!["first\n".to_string(), "second\n".to_string()]);
    }
}
