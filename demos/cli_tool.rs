//! CLI Tool Example
//!
//! This example demonstrates how to build a command-line tool
//! using docparser for extracting plain text from office documents.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use std::process;

use docparser::{DocParserError, DocumentFormat, Extraction, ExtractorBuilder};

struct Options {
    inputs: Vec<String>,
    output: Option<String>,
    limit: Option<usize>,
    marker: Option<String>,
    format: Option<DocumentFormat>,
    json: bool,
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {} <input>... [options]", program);
    eprintln!("\nOptions:");
    eprintln!("  --limit <bytes>      Stop extracting after the given number of bytes");
    eprintln!("  --marker <text>      Text appended to truncated output");
    eprintln!("  --format <ext>       Treat every input as this extension (e.g. docx)");
    eprintln!("  --output <path>      Write output to a file instead of stdout");
    eprintln!("  --json               Emit one JSON object per input");
    eprintln!("\nInputs may be files or directories.");
    eprintln!("\nExamples:");
    eprintln!("  {} report.docx", program);
    eprintln!("  {} slides.ppt --limit 4096", program);
    eprintln!("  {} ./inbox --json --output index.jsonl", program);
    eprintln!("\nSet RUST_LOG=debug for parser diagnostics.");
    process::exit(1);
}

fn parse_args(args: &[String]) -> Options {
    let program = args.first().map(String::as_str).unwrap_or("cli_tool");
    let mut options = Options {
        inputs: Vec::new(),
        output: None,
        limit: None,
        marker: None,
        format: None,
        json: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--limit" => {
                let raw = option_value(args, i);
                let limit = raw.parse::<usize>().unwrap_or_else(|_| {
                    eprintln!("Error: Invalid byte limit: {}", raw);
                    process::exit(1);
                });
                options.limit = Some(limit);
                i += 2;
            }
            "--marker" => {
                options.marker = Some(option_value(args, i).clone());
                i += 2;
            }
            "--format" => {
                let raw = option_value(args, i);
                let format = DocumentFormat::from_extension(raw).unwrap_or_else(|| {
                    eprintln!("Error: Unsupported format: {}", raw);
                    process::exit(1);
                });
                options.format = Some(format);
                i += 2;
            }
            "--output" => {
                options.output = Some(option_value(args, i).clone());
                i += 2;
            }
            "--json" => {
                options.json = true;
                i += 1;
            }
            "-h" | "--help" => usage(program),
            flag if flag.starts_with("--") => {
                eprintln!("Error: Unknown option: {}", flag);
                process::exit(1);
            }
            input => {
                options.inputs.push(input.to_string());
                i += 1;
            }
        }
    }

    if options.inputs.is_empty() {
        usage(program);
    }
    options
}

fn option_value(args: &[String], i: usize) -> &String {
    args.get(i + 1).unwrap_or_else(|| {
        eprintln!("Error: {} requires a value", args[i]);
        process::exit(1);
    })
}

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let options = parse_args(&args);

    match run(&options) {
        Ok(failures) if failures > 0 => process::exit(2),
        Ok(_) => {}
        Err(e) => {
            handle_error(&e);
            process::exit(1);
        }
    }
}

/// Extracts every input and returns the number of failed files.
fn run(options: &Options) -> Result<usize, DocParserError> {
    let mut builder = ExtractorBuilder::new();
    if let Some(limit) = options.limit {
        builder = builder.with_truncation_limit(limit);
    }
    if let Some(marker) = &options.marker {
        builder = builder.with_truncation_marker(marker.clone());
    }
    if let Some(format) = options.format {
        builder = builder.with_format_override(format);
    }
    let extractor = builder.build()?;

    let mut results = Vec::new();
    for input in &options.inputs {
        let path = Path::new(input);
        if path.is_dir() {
            results.extend(extractor.extract_dir(path)?);
        } else {
            results.push((path.to_path_buf(), extractor.extract_file(path)));
        }
    }

    let mut out: Box<dyn Write> = match &options.output {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout().lock()),
    };

    let mut failures = 0;
    for (path, result) in results {
        match result {
            Ok(extraction) => write_extraction(&mut out, &path, &extraction, options.json)?,
            Err(e) => {
                failures += 1;
                eprintln!("{}: ", path.display());
                handle_error(&e);
            }
        }
    }
    out.flush()?;
    Ok(failures)
}

fn write_extraction(
    out: &mut dyn Write,
    path: &Path,
    extraction: &Extraction,
    json: bool,
) -> Result<(), DocParserError> {
    if json {
        extraction.write_json_line(path, out)
    } else {
        writeln!(out, "==> {} <==", path.display())?;
        writeln!(out, "{}", extraction.text)?;
        Ok(())
    }
}

fn handle_error(error: &DocParserError) {
    match error {
        DocParserError::Io(io_err) => {
            eprintln!("I/O Error: {}", io_err);
            eprintln!("Please check that the file exists and you have permission to access it.");
        }
        DocParserError::Zip(msg) => {
            eprintln!("ZIP Archive Error: {}", msg);
            eprintln!("The file may be corrupted or not a valid ZIP package.");
        }
        DocParserError::Xml(msg) => {
            eprintln!("XML Error: {}", msg);
            eprintln!("A required document part is not well-formed.");
        }
        DocParserError::MissingPart(part) => {
            eprintln!("Missing Part: {}", part);
            eprintln!("The file does not contain the content this format requires.");
        }
        DocParserError::UnsupportedFormat(msg) => {
            eprintln!("Unsupported Format: {}", msg);
            eprintln!("Use --format to choose a parser explicitly.");
        }
        DocParserError::SecurityViolation(msg) => {
            eprintln!("Security Violation: {}", msg);
            eprintln!("The file violates security constraints (e.g., file size limit).");
        }
        DocParserError::Config(msg) => {
            eprintln!("Configuration Error: {}", msg);
        }
        other => {
            eprintln!("Extraction Error: {}", other);
        }
    }
}
