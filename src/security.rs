//! Security Module
//!
//! 入力ファイルとコンテナの読み込みに対するセキュリティ制限。
//! ZIP bomb攻撃、パストラバーサル攻撃、巨大な入力ファイルへの対策を提供します。

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::error::DocParserError;

/// セキュリティ設定
///
/// 文書の読み込み時に適用される制限を定義します。
/// `ExtractorBuilder::with_security_config`で変更できます。
///
/// # 使用例
///
/// ```rust
/// use docparser::SecurityConfig;
///
/// let config = SecurityConfig {
///     max_file_count: 500,
///     ..SecurityConfig::default()
/// };
/// assert_eq!(config.max_file_count, 500);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecurityConfig {
    /// 展開後の最大サイズ（バイト）
    /// デフォルト: 1GB (1_073_741_824 bytes)
    pub max_decompressed_size: u64,
    /// ZIPアーカイブ内の最大ファイル数
    /// デフォルト: 10000
    pub max_file_count: usize,
    /// 単一エントリの最大サイズ（バイト）
    /// デフォルト: 100MB (104_857_600 bytes)
    pub max_file_size: u64,
    /// 入力ファイルの最大サイズ（バイト）
    /// デフォルト: 2GB (2_147_483_648 bytes)
    pub max_input_file_size: u64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_decompressed_size: 1_073_741_824, // 1GB
            max_file_count: 10_000,
            max_file_size: 104_857_600,         // 100MB
            max_input_file_size: 2_147_483_648, // 2GB
        }
    }
}

impl SecurityConfig {
    /// デフォルトのセキュリティ設定を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 設定値の検証
    ///
    /// いずれかの上限が0の場合は`Config`エラーを返します。
    pub(crate) fn validate(&self) -> Result<(), DocParserError> {
        if self.max_file_count == 0 {
            return Err(DocParserError::Config(
                "max_file_count must be greater than 0".to_string(),
            ));
        }
        if self.max_file_size == 0 || self.max_decompressed_size == 0 {
            return Err(DocParserError::Config(
                "Archive size limits must be greater than 0".to_string(),
            ));
        }
        if self.max_input_file_size == 0 {
            return Err(DocParserError::Config(
                "max_input_file_size must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 入力ファイルをサイズ制限付きで読み込む
///
/// # 引数
///
/// * `path` - 入力ファイルのパス
/// * `config` - セキュリティ設定
///
/// # 戻り値
///
/// * `Ok(Vec<u8>)` - ファイルの内容
/// * `Err(DocParserError::SecurityViolation)` - `max_input_file_size`を超える場合
/// * `Err(DocParserError::Io)` - 読み込みに失敗した場合
pub(crate) fn read_input(path: &Path, config: &SecurityConfig) -> Result<Vec<u8>, DocParserError> {
    let file = File::open(path)?;

    // メタデータが嘘をつく場合に備えて、上限+1バイトまでしか読まない
    let mut buffer = Vec::new();
    let bytes_read = file
        .take(config.max_input_file_size.saturating_add(1))
        .read_to_end(&mut buffer)?;

    if bytes_read as u64 > config.max_input_file_size {
        return Err(DocParserError::SecurityViolation(format!(
            "Input file size exceeds maximum: {} bytes (max: {} bytes)",
            bytes_read, config.max_input_file_size
        )));
    }

    Ok(buffer)
}

/// ZIPエントリパスの検証
///
/// パストラバーサル攻撃を防ぐため、エントリパスを検証します。
///
/// # 引数
///
/// * `path` - 検証するエントリパス
///
/// # 戻り値
///
/// * `Ok(())` - パスが安全な場合
/// * `Err(String)` - パスが危険な場合（`..`や絶対パスを含む）
pub(crate) fn validate_zip_path(path: &str) -> Result<(), String> {
    if path.is_empty() {
        return Err("Empty path is not allowed".to_string());
    }

    // 絶対パスを拒否（Windows形式の`C:\`やUnix形式の`/`で始まるパス）
    if path.starts_with('/') || path.starts_with("C:\\") || path.starts_with("c:\\") {
        return Err(format!("Absolute path is not allowed: {}", path));
    }

    // `..`を含むパスを拒否（ディレクトリトラバーサル攻撃）
    if path.split('/').any(|segment| segment == "..") {
        return Err(format!("Path traversal detected: {}", path));
    }

    if path.contains('\\') {
        return Err(format!("Backslash in path is not allowed: {}", path));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_validate_zip_path_valid() {
        assert!(validate_zip_path("word/document.xml").is_ok());
        assert!(validate_zip_path("xl/worksheets/sheet1.bin").is_ok());
        assert!(validate_zip_path("Doc_0/Pages/Page_0/Content.xml").is_ok());
        // ".."を含むファイル名そのものは許可
        assert!(validate_zip_path("media/image..png").is_ok());
    }

    #[test]
    fn test_validate_zip_path_empty() {
        assert!(validate_zip_path("").is_err());
    }

    #[test]
    fn test_validate_zip_path_absolute() {
        assert!(validate_zip_path("/etc/passwd").is_err());
        assert!(validate_zip_path("C:\\Windows\\system32").is_err());
        assert!(validate_zip_path("c:\\word\\document.xml").is_err());
    }

    #[test]
    fn test_validate_zip_path_traversal() {
        assert!(validate_zip_path("../etc/passwd").is_err());
        assert!(validate_zip_path("word/../../etc/passwd").is_err());
        assert!(validate_zip_path("word/..").is_err());
        assert!(validate_zip_path("..").is_err());
    }

    #[test]
    fn test_validate_zip_path_backslash() {
        assert!(validate_zip_path("word\\document.xml").is_err());
    }

    #[test]
    fn test_security_config_validate() {
        assert!(SecurityConfig::new().validate().is_ok());

        let config = SecurityConfig {
            max_file_count: 0,
            ..SecurityConfig::default()
        };
        assert!(matches!(config.validate(), Err(DocParserError::Config(_))));
    }

    #[test]
    fn test_read_input_size_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"0123456789").unwrap();

        let config = SecurityConfig {
            max_input_file_size: 10,
            ..SecurityConfig::default()
        };
        assert_eq!(read_input(file.path(), &config).unwrap().len(), 10);

        let config = SecurityConfig {
            max_input_file_size: 9,
            ..SecurityConfig::default()
        };
        assert!(matches!(
            read_input(file.path(), &config),
            Err(DocParserError::SecurityViolation(_))
        ));
    }

    #[test]
    fn test_read_input_missing_file() {
        let result = read_input(Path::new("no/such/file.docx"), &SecurityConfig::default());
        assert!(matches!(result, Err(DocParserError::Io(_))));
    }
}
