//! PDF header detection and leading-garbage repair.

use crate::error::{Error, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// PDF format information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfFormat {
    /// PDF version (e.g., "1.7", "2.0")
    pub version: String,
    /// Offset of the `%PDF-` header; non-zero when junk precedes it
    pub header_offset: usize,
}

impl std::fmt::Display for PdfFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PDF {}", self.version)
    }
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PDF_MAGIC_LEN: usize = 5;
const VERSION_LEN: usize = 3; // e.g., "1.7"

/// How far into the file the header may be found.
pub const HEADER_SEARCH_WINDOW: usize = 1024;

/// Detect PDF format from a file path.
///
/// # Example
/// ```no_run
/// use pdfrecipe::detect::detect_format_from_path;
///
/// let format = detect_format_from_path("document.pdf").unwrap();
/// println!("PDF version: {}", format.version);
/// ```
pub fn detect_format_from_path<P: AsRef<Path>>(path: P) -> Result<PdfFormat> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let mut header = Vec::with_capacity(HEADER_SEARCH_WINDOW + 16);
    reader
        .take((HEADER_SEARCH_WINDOW + 16) as u64)
        .read_to_end(&mut header)?;
    detect_format_from_bytes(&header)
}

/// Detect PDF format from bytes.
///
/// The header is accepted anywhere within the first
/// [`HEADER_SEARCH_WINDOW`] bytes; its offset is reported so callers can
/// strip the junk before handing the data to the parser.
pub fn detect_format_from_bytes(data: &[u8]) -> Result<PdfFormat> {
    let offset = locate_header(data).ok_or(Error::UnknownFormat)?;
    let data = &data[offset..];

    if data.len() < PDF_MAGIC_LEN + VERSION_LEN {
        return Err(Error::UnknownFormat);
    }

    let version_bytes = &data[PDF_MAGIC_LEN..PDF_MAGIC_LEN + VERSION_LEN];
    let version = String::from_utf8_lossy(version_bytes).to_string();

    if !is_valid_version(&version) {
        return Err(Error::UnsupportedVersion(version));
    }

    Ok(PdfFormat {
        version,
        header_offset: offset,
    })
}

/// Find the `%PDF-` marker within the search window.
pub fn locate_header(data: &[u8]) -> Option<usize> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW + PDF_MAGIC_LEN)];
    window
        .windows(PDF_MAGIC_LEN)
        .position(|w| w == PDF_MAGIC)
}

/// Return the data starting at the PDF header.
///
/// Files such as XFA exports sometimes carry whitespace before `%PDF-`,
/// which makes the cross-reference offsets unusable unless it is removed.
pub fn strip_leading_garbage(data: &[u8]) -> &[u8] {
    match locate_header(data) {
        Some(0) | None => data,
        Some(offset) => {
            log::warn!("Skipping {} bytes before the PDF header", offset);
            &data[offset..]
        }
    }
}

/// Check if a version string is valid.
fn is_valid_version(version: &str) -> bool {
    if version.len() != 3 {
        return false;
    }

    let chars: Vec<char> = version.chars().collect();
    chars[0].is_ascii_digit() && chars[1] == '.' && chars[2].is_ascii_digit()
}

/// Check if a file is a valid PDF.
pub fn is_pdf<P: AsRef<Path>>(path: P) -> bool {
    detect_format_from_path(path).is_ok()
}

/// Check if bytes represent a valid PDF.
pub fn is_pdf_bytes(data: &[u8]) -> bool {
    detect_format_from_bytes(data).is_ok()
}
