//! docparser - Pure-Rust plain-text extraction from office documents
//!
//! This crate extracts the plain text of office documents (DOCX, PPTX, XLS/XLSX, XLSB,
//! legacy PPT, ODF, OFD, PDF, RTF and TXT) for search indexing. Every parser writes
//! into a byte-budgeted accumulator, so extraction of huge documents can be capped
//! and stops early once the budget is spent.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use docparser::ExtractorBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an extractor with default settings (no byte limit)
//!     let extractor = ExtractorBuilder::new().build()?;
//!
//!     // The parser is selected from the file extension
//!     let extraction = extractor.extract_file("slides.pptx")?;
//!     println!("{}", extraction.text);
//!
//!     Ok(())
//! }
//! ```
//!
//! # Truncation
//!
//! ```rust,no_run
//! use docparser::ExtractorBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = ExtractorBuilder::new()
//!         .with_truncation_limit(1024 * 1024)            // 1 MiB of text per document
//!         .with_truncation_marker("\n[CONTENT_TRUNCATED]")
//!         .build()?;
//!
//!     let extraction = extractor.extract_file("huge.xlsb")?;
//!     if extraction.truncated {
//!         eprintln!("truncated at {} bytes", extraction.len());
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Using a Parser Directly
//!
//! ```rust,no_run
//! use docparser::{DocumentParser, PptParser};
//!
//! let mut parser = PptParser::new("legacy.ppt");
//! parser.set_truncation_limit(4096);
//! let status = parser.convert_status(); // 0 = success, 3 = missing "PowerPoint Document"
//! println!("{} {}", status, parser.text());
//! ```
//!
//! # Batch Extraction
//!
//! ```rust,no_run
//! use docparser::ExtractorBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let extractor = ExtractorBuilder::new().build()?;
//!
//!     // Files are processed in parallel; results keep the input order
//!     for result in extractor.extract_files(&["a.docx", "b.odt", "c.ofd"]) {
//!         match result {
//!             Ok(extraction) => println!("{}: {} bytes", extraction.format, extraction.len()),
//!             Err(e) => eprintln!("{}", e),
//!         }
//!     }
//!
//!     Ok(())
//! }
//! ```

mod accumulator;
mod api;
mod archive;
mod binary;
mod builder;
mod error;
mod parser;
mod security;
mod types;
pub mod utf16;
pub mod xml;

// 公開API
pub use accumulator::{truncate_at_boundary, TextAccumulator};
pub use api::DocumentFormat;
pub use archive::ArchiveReader;
pub use binary::BinaryCursor;
pub use builder::{Extractor, ExtractorBuilder, DEFAULT_TRUNCATION_MARKER};
pub use error::DocParserError;
pub use parser::{
    create_parser, decode_rk, parse_shared_strings, walk_records, DocumentParser, DocxParser,
    ExcelParser, OdfParser, OfdParser, PdfParser, PptParser, PptxParser, RtfParser,
    SheetDimension, TxtParser, WorksheetDecoder, XlsbParser,
};
pub use security::SecurityConfig;
pub use types::Extraction;
