//! # pdfrecipe
//!
//! Small, composable PDF recipes on top of `lopdf`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfrecipe::{extract_text, TextOptions};
//!
//! fn main() -> pdfrecipe::Result<()> {
//!     let text = extract_text("document.pdf", TextOptions::default().sorted())?;
//!     println!("{}", text);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Signing**: visible or invisible CMS signatures from a PKCS#12 keystore, RFC 3161 timestamps
//! - **Text**: position-aware text extraction, region extraction, ligature and bidi handling
//! - **Images**: images from page resources, drawn images (with flips) and annotation appearances
//! - **Content rewriting**: force text to black, trim pages, place images
//! - **Forms**: AcroForm field lookup and XFA retrieval

pub mod content;
pub mod detect;
pub mod document;
pub mod error;
pub mod extract;
pub mod form;
pub mod model;
pub mod options;
pub mod sign;

pub use content::{
    add_centered_image, add_centered_image_flipped, add_clipped_image, make_text_black,
    make_text_black_in_areas, remove_alternate_annotations_and_blacken, trim_and_center_page,
    trim_page, AppendMode, BlackTextFilter, ContentStreamEditor, EditFilter, ImageXObject,
    PageCanvas, StreamEngine,
};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf, PdfFormat};
pub use document::PdfDocument;
pub use error::{Error, Result};
pub use extract::{
    extract_annotation_images, extract_page_images, extract_resource_images, ImageWriter, Region,
    TextPosition, TextStripper, TextStripperByArea,
};
pub use form::{get_parsable_xfa_form, get_xfa, XfaResource};
pub use model::{Color, ColorSpace, ExtractedImage, Matrix, Rectangle};
pub use options::{ErrorMode, FontHeightMode, LoadOptions, PageSelection, TextOptions};
pub use sign::{
    ExternalSigningSupport, Pkcs12Signer, SignatureInterface, SignatureOptions,
    VisibleSigProperties, VisibleSignDesigner, VisibleSignature,
};

use std::path::{Path, PathBuf};

/// Extract the text of a PDF file.
///
/// # Example
///
/// ```no_run
/// use pdfrecipe::{extract_text, TextOptions};
///
/// let text = extract_text("document.pdf", TextOptions::default()).unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P, options: TextOptions) -> Result<String> {
    let doc = PdfDocument::open(path)?;
    TextStripper::new(options).get_text(doc.inner())
}

/// Write every drawn image of a PDF file into `dir`.
///
/// Files are named `{prefix}-{page}-{index}{flips}.{ext}`.
///
/// # Example
///
/// ```no_run
/// let written = pdfrecipe::extract_images("document.pdf", "./images", "doc").unwrap();
/// println!("{} images", written.len());
/// ```
pub fn extract_images<P: AsRef<Path>, D: AsRef<Path>>(
    path: P,
    dir: D,
    prefix: &str,
) -> Result<Vec<PathBuf>> {
    let doc = PdfDocument::open(path)?;
    let writer = ImageWriter::new(dir);
    extract_page_images(doc.inner())?
        .iter()
        .map(|image| writer.write(&image.image, &image.file_name(prefix)))
        .collect()
}

/// Rewrite a PDF file so that all text is drawn in black.
///
/// # Example
///
/// ```no_run
/// pdfrecipe::blacken_text("colored.pdf", "black.pdf").unwrap();
/// ```
pub fn blacken_text<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output: Q) -> Result<()> {
    let mut doc = PdfDocument::open(input)?;
    make_text_black(doc.inner_mut())?;
    doc.save(output)
}

/// XFA data of a PDF file, `None` when the document has no XFA form.
pub fn read_xfa<P: AsRef<Path>>(path: P) -> Result<Option<Vec<u8>>> {
    let doc = PdfDocument::open(path)?;
    Ok(get_xfa(doc.inner())?.map(|xfa| xfa.bytes()))
}
