//! Boundary Tests
//!
//! バイト上限の境界条件、空の文書、破損した入力に対する振る舞いを検証します。

use std::io::Write;
use std::path::{Path, PathBuf};

use docparser::{
    create_parser, DocParserError, DocumentFormat, DocumentParser, ExtractorBuilder, SecurityConfig,
    TextAccumulator, DEFAULT_TRUNCATION_MARKER,
};
use proptest::prelude::*;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::ZipWriter;

// Helper module for generating test fixtures
mod fixtures {
    use super::*;

    pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, String)]) -> PathBuf {
        let path = dir.join(name);
        let mut zip = ZipWriter::new(std::fs::File::create(&path).unwrap());
        for (entry, data) in entries {
            zip.start_file(*entry, FileOptions::default()).unwrap();
            zip.write_all(data.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
        path
    }

    /// 段落数を指定したDOCX
    pub fn docx_paragraphs(dir: &Path, count: usize) -> PathBuf {
        let body: String = (0..count)
            .map(|i| format!("<w:p><w:r><w:t>Paragraph number {} of the report.</w:t></w:r></w:p>", i))
            .collect();
        let document = format!(r#"<w:document xmlns:w="urn:w"><w:body>{}</w:body></w:document>"#, body);
        write_zip(dir, "long.docx", &[("word/document.xml", document)])
    }

    /// 1つのセルに長い文字列を持つXLSX
    pub fn xlsx_long_cell(dir: &Path, len: usize) -> PathBuf {
        use rust_xlsxwriter::Workbook;

        let path = dir.join("long.xlsx");
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet.write_string(0, 0, "あ".repeat(len)).unwrap();
        workbook.save(&path).unwrap();
        path
    }

    /// 空のシートだけを持つXLSX
    pub fn xlsx_empty(dir: &Path) -> PathBuf {
        use rust_xlsxwriter::Workbook;

        let path = dir.join("empty.xlsx");
        let mut workbook = Workbook::new();
        workbook.add_worksheet();
        workbook.save(&path).unwrap();
        path
    }
}

#[test]
fn test_zero_limit_yields_marker_only() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::docx_paragraphs(dir.path(), 3);

    let extraction = ExtractorBuilder::new()
        .with_truncation_limit(0)
        .build()
        .unwrap()
        .extract_file(&path)
        .unwrap();
    assert!(extraction.truncated);
    assert_eq!(extraction.text, DEFAULT_TRUNCATION_MARKER);
}

#[test]
fn test_no_limit_is_backward_compatible() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::docx_paragraphs(dir.path(), 200);

    let unlimited = ExtractorBuilder::new().build().unwrap().extract_file(&path).unwrap();
    assert!(!unlimited.truncated);
    assert_eq!(unlimited.text.lines().count(), 200);
    assert!(unlimited.text.ends_with("Paragraph number 199 of the report.\n"));

    // 十分大きな上限は上限なしと同じ結果
    let generous = ExtractorBuilder::new()
        .with_truncation_limit(unlimited.text.len())
        .build()
        .unwrap()
        .extract_file(&path)
        .unwrap();
    assert_eq!(generous, unlimited);
}

#[test]
fn test_truncation_cuts_at_word_boundary() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::docx_paragraphs(dir.path(), 50);

    let extraction = ExtractorBuilder::new()
        .with_truncation_limit(100)
        .with_truncation_marker("…")
        .build()
        .unwrap()
        .extract_file(&path)
        .unwrap();
    assert!(extraction.truncated);
    // 3段落目の残り30バイトには文末記号がないため、空白の手前で切られる
    assert_eq!(
        extraction.text,
        "Paragraph number 0 of the report.\nParagraph number 1 of the report.\nParagraph number 2 of the…"
    );
}

#[test]
fn test_very_long_cell_is_cut_on_char_boundary() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::xlsx_long_cell(dir.path(), 10_000);

    let mut parser = create_parser(DocumentFormat::Excel, &path, SecurityConfig::default());
    parser.set_truncation_limit(1000);
    parser.convert().unwrap();
    assert!(parser.is_truncated());
    // "あ"は3バイト: 1000バイト以下で最大の文字境界は999
    assert_eq!(parser.text().len(), 999);
    assert!(parser.text().chars().all(|c| c == 'あ'));
}

#[test]
fn test_empty_documents() {
    let dir = TempDir::new().unwrap();
    let empty_txt = dir.path().join("empty.txt");
    std::fs::write(&empty_txt, b"").unwrap();
    let empty_rtf = dir.path().join("empty.rtf");
    std::fs::write(&empty_rtf, br"{\rtf1\ansi}").unwrap();
    let empty_xlsx = fixtures::xlsx_empty(dir.path());
    let empty_docx = fixtures::docx_paragraphs(dir.path(), 0);

    let extractor = ExtractorBuilder::new().with_truncation_limit(10).build().unwrap();
    for path in [&empty_txt, &empty_rtf, &empty_xlsx, &empty_docx] {
        let extraction = extractor.extract_file(path).unwrap();
        assert_eq!(extraction.text, "", "{}", path.display());
        assert!(!extraction.truncated);
    }
}

#[test]
fn test_corrupted_containers() {
    let dir = TempDir::new().unwrap();
    let extractor = ExtractorBuilder::new().build().unwrap();

    for name in ["broken.docx", "broken.pptx", "broken.odt", "broken.xlsb"] {
        let path = dir.path().join(name);
        std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
        match extractor.extract_file(&path) {
            Err(DocParserError::Zip(_)) => {}
            other => panic!("{}: expected Zip error, got {:?}", name, other),
        }
    }

    let path = dir.path().join("broken.xlsx");
    std::fs::write(&path, b"PK\x03\x04 truncated").unwrap();
    assert!(matches!(
        extractor.extract_file(&path),
        Err(DocParserError::Spreadsheet(_))
    ));
}

#[test]
fn test_malformed_required_xml() {
    let dir = TempDir::new().unwrap();
    let path = fixtures::write_zip(
        dir.path(),
        "bad.odt",
        &[("content.xml", "<office:document-content><office:body></office:text>".to_string())],
    );

    let mut parser = create_parser(DocumentFormat::Odf, &path, SecurityConfig::default());
    assert_eq!(parser.convert_status(), -1);
    assert_eq!(parser.text(), "");
}

proptest! {
    #[test]
    fn test_truncation_monotonicity(
        pieces in proptest::collection::vec(".{0,40}", 0..20),
        limit in 0usize..200,
    ) {
        let mut acc = TextAccumulator::with_limit(limit);
        for piece in &pieces {
            acc.append(piece);
            prop_assert!(acc.len() <= limit);
        }
    }

    #[test]
    fn test_truncation_idempotence(
        pieces in proptest::collection::vec("[a-z .]{1,30}", 1..20),
        limit in 1usize..100,
    ) {
        let mut acc = TextAccumulator::with_limit(limit);
        let mut refused = false;
        for piece in &pieces {
            let before = acc.text().to_string();
            let accepted = acc.append(piece);
            if refused {
                prop_assert!(!accepted);
                prop_assert_eq!(acc.text(), before.as_str());
            }
            refused |= !accepted;
        }
    }
}
