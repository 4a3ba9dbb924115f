//! Archive Reader Module
//!
//! ZIPコンテナ（DOCX/PPTX/XLSB/ODF/OFD）から内部ファイルを読み出すモジュール。
//! 内部ファイル名の検索は大文字小文字を区別しません。

use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::Path;

use log::{debug, warn};
use zip::ZipArchive;

use crate::error::DocParserError;
use crate::security::{read_input, validate_zip_path, SecurityConfig};

/// ZIPコンテナのリーダー
///
/// オープン時にエントリ数・エントリサイズ・展開後の合計サイズを検証します。
/// パストラバーサルの疑いがあるエントリは読み出し対象から除外されます。
/// コンテナはメモリ上に保持され、ドロップ時に解放されます。
pub struct ArchiveReader {
    archive: ZipArchive<Cursor<Vec<u8>>>,
    /// 小文字化したエントリ名 → エントリのインデックス
    entries: HashMap<String, usize>,
    max_file_size: u64,
}

impl std::fmt::Debug for ArchiveReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchiveReader")
            .field("entries", &self.entries.len())
            .finish()
    }
}

impl ArchiveReader {
    /// ファイルパスからコンテナを開く
    pub fn open(path: &Path, config: &SecurityConfig) -> Result<Self, DocParserError> {
        let bytes = read_input(path, config)?;
        Self::from_bytes(bytes, config)
    }

    /// メモリ上のバイト列からコンテナを開く
    ///
    /// # 戻り値
    ///
    /// * `Ok(ArchiveReader)` - コンテナの検証に成功した場合
    /// * `Err(DocParserError::Zip)` - ZIPとして読めない場合
    /// * `Err(DocParserError::SecurityViolation)` - セキュリティ制限を超える場合
    pub fn from_bytes(bytes: Vec<u8>, config: &SecurityConfig) -> Result<Self, DocParserError> {
        let mut archive = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| DocParserError::Zip(format!("{}", e)))?;

        // セキュリティチェック: ファイル数の上限
        if archive.len() > config.max_file_count {
            return Err(DocParserError::SecurityViolation(format!(
                "ZIP archive contains too many files: {} (max: {})",
                archive.len(),
                config.max_file_count
            )));
        }

        let mut entries = HashMap::with_capacity(archive.len());
        let mut total_decompressed_size = 0u64;
        for i in 0..archive.len() {
            let file = archive
                .by_index(i)
                .map_err(|e| DocParserError::Zip(format!("{}", e)))?;

            let file_name = file.name().to_string();
            let file_size = file.size();
            if file_size > config.max_file_size {
                return Err(DocParserError::SecurityViolation(format!(
                    "File '{}' exceeds maximum size: {} bytes (max: {} bytes)",
                    file_name, file_size, config.max_file_size
                )));
            }

            total_decompressed_size = total_decompressed_size
                .checked_add(file_size)
                .ok_or_else(|| {
                    DocParserError::SecurityViolation(
                        "Total decompressed size calculation overflow".to_string(),
                    )
                })?;
            if total_decompressed_size > config.max_decompressed_size {
                return Err(DocParserError::SecurityViolation(format!(
                    "Total decompressed size exceeds maximum: {} bytes (max: {} bytes)",
                    total_decompressed_size, config.max_decompressed_size
                )));
            }

            if let Err(reason) = validate_zip_path(&file_name) {
                warn!("Skipping archive entry: {}", reason);
                continue;
            }

            entries.entry(file_name.to_lowercase()).or_insert(i);
        }

        debug!(
            "Opened archive with {} entries ({} bytes uncompressed)",
            entries.len(),
            total_decompressed_size
        );

        Ok(Self {
            archive,
            entries,
            max_file_size: config.max_file_size,
        })
    }

    /// 内部ファイルが存在するかどうか（大文字小文字を区別しない）
    pub fn exists(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize(name))
    }

    /// 内部ファイルの内容を読み出す
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(Vec<u8>))` - エントリが存在する場合
    /// * `Ok(None)` - エントリが存在しない場合
    /// * `Err(DocParserError)` - 展開に失敗した場合、またはサイズ制限を超える場合
    pub fn read_bytes(&mut self, name: &str) -> Result<Option<Vec<u8>>, DocParserError> {
        let Some(&index) = self.entries.get(&normalize(name)) else {
            return Ok(None);
        };

        let file = self
            .archive
            .by_index(index)
            .map_err(|e| DocParserError::Zip(format!("{}", e)))?;

        // ヘッダーのサイズ情報を信用せず、上限+1バイトまでしか展開しない
        let mut buffer = Vec::new();
        file.take(self.max_file_size.saturating_add(1))
            .read_to_end(&mut buffer)?;
        if buffer.len() as u64 > self.max_file_size {
            return Err(DocParserError::SecurityViolation(format!(
                "File '{}' exceeds maximum size when decompressed (max: {} bytes)",
                name, self.max_file_size
            )));
        }

        Ok(Some(buffer))
    }

    /// 内部ファイルを読み出し、存在しない場合は`MissingPart`エラーにする
    pub fn read_required(&mut self, name: &str) -> Result<Vec<u8>, DocParserError> {
        self.read_bytes(name)?
            .ok_or_else(|| DocParserError::MissingPart(name.to_string()))
    }
}

/// 検索用にエントリ名を正規化する（先頭の`/`を除去し小文字化）
fn normalize(name: &str) -> String {
    name.trim_start_matches('/').to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        for (name, data) in entries {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(data).unwrap();
        }
        writer.finish().unwrap().into_inner()
    }

    #[test]
    fn test_case_insensitive_lookup() {
        let bytes = build_zip(&[("Word/Document.xml", b"<w:document/>")]);
        let mut reader = ArchiveReader::from_bytes(bytes, &SecurityConfig::default()).unwrap();

        assert!(reader.exists("word/document.xml"));
        assert!(reader.exists("WORD/DOCUMENT.XML"));
        assert!(!reader.exists("word/styles.xml"));

        let data = reader.read_bytes("word/document.xml").unwrap();
        assert_eq!(data.as_deref(), Some(&b"<w:document/>"[..]));
    }

    #[test]
    fn test_missing_entry() {
        let bytes = build_zip(&[("a.txt", b"a")]);
        let mut reader = ArchiveReader::from_bytes(bytes, &SecurityConfig::default()).unwrap();

        assert!(reader.read_bytes("b.txt").unwrap().is_none());
        match reader.read_required("b.txt") {
            Err(DocParserError::MissingPart(name)) => assert_eq!(name, "b.txt"),
            other => panic!("Expected MissingPart, got {:?}", other),
        }
    }

    #[test]
    fn test_not_a_zip() {
        let result = ArchiveReader::from_bytes(b"plain text".to_vec(), &SecurityConfig::default());
        assert!(matches!(result, Err(DocParserError::Zip(_))));
    }

    #[test]
    fn test_too_many_files() {
        let bytes = build_zip(&[("a", b"1"), ("b", b"2"), ("c", b"3")]);
        let config = SecurityConfig {
            max_file_count: 2,
            ..SecurityConfig::default()
        };
        let result = ArchiveReader::from_bytes(bytes, &config);
        assert!(matches!(result, Err(DocParserError::SecurityViolation(_))));
    }

    #[test]
    fn test_entry_too_large() {
        let bytes = build_zip(&[("big.bin", &[0u8; 64])]);
        let config = SecurityConfig {
            max_file_size: 16,
            ..SecurityConfig::default()
        };
        let result = ArchiveReader::from_bytes(bytes, &config);
        assert!(matches!(result, Err(DocParserError::SecurityViolation(_))));
    }

    #[test]
    fn test_traversal_entry_is_skipped() {
        let bytes = build_zip(&[("../evil.xml", b"x"), ("content.xml", b"ok")]);
        let reader = ArchiveReader::from_bytes(bytes, &SecurityConfig::default()).unwrap();
        assert!(!reader.exists("../evil.xml"));
        assert!(reader.exists("content.xml"));
    }
}
