//! Error types for pdfrecipe library.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pdfrecipe operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while loading, rewriting or signing a PDF.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file format is not recognized as PDF.
    #[error("Unknown file format: not a valid PDF")]
    UnknownFormat,

    /// The PDF version is not supported.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// Error parsing PDF structure.
    #[error("PDF parsing error: {0}")]
    PdfParse(String),

    /// The PDF document is encrypted and requires a password.
    #[error("Document is encrypted")]
    Encrypted,

    /// The input document does not exist.
    #[error("Document not found: {}", .0.display())]
    DocumentNotFound(PathBuf),

    /// A required PDF object is missing.
    #[error("Missing required object: {0}")]
    MissingObject(String),

    /// A content stream could not be decoded or re-encoded.
    #[error("Content stream error: {0}")]
    ContentStream(String),

    /// Error extracting images from PDF.
    #[error("Image extraction error: {0}")]
    ImageExtract(String),

    /// An image could not be embedded into a page.
    #[error("Image embedding error: {0}")]
    ImageEmbed(String),

    /// Text of a page could not be extracted.
    #[error("Text extraction error: {0}")]
    TextExtract(String),

    /// Page number is out of range.
    #[error("Page {0} is out of range (document has {1} pages)")]
    PageOutOfRange(u32, u32),

    /// Invalid page range specification.
    #[error("Invalid page range: {0}")]
    InvalidPageRange(String),

    /// XFA form data is malformed.
    #[error("XFA error: {0}")]
    Xfa(String),

    /// Generic signing failure.
    #[error("Signing error: {0}")]
    Signing(String),

    /// The named signature field already carries a signature.
    #[error("Signature field {0} is already signed")]
    AlreadySigned(String),

    /// The document's DocMDP permission forbids any change.
    #[error(
        "No changes to the document are permitted due to DocMDP transform parameters dictionary"
    )]
    ModificationNotPermitted,

    /// The signature does not fit into the reserved placeholder.
    #[error("Signature of {needed} bytes does not fit the {available} reserved bytes")]
    SignatureTooLarge { needed: usize, available: usize },

    /// The keystore could not be opened or holds no usable key.
    #[error("Keystore error: {0}")]
    Keystore(String),

    /// The timestamp authority request failed.
    #[error("Timestamp error: {0}")]
    Timestamp(String),
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::PdfParse(err.to_string()),
        }
    }
}

impl From<openssl::error::ErrorStack> for Error {
    fn from(err: openssl::error::ErrorStack) -> Self {
        Error::Signing(err.to_string())
    }
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Signing(format!("DER: {}", err))
    }
}

impl From<png::EncodingError> for Error {
    fn from(err: png::EncodingError) -> Self {
        Error::ImageExtract(err.to_string())
    }
}

impl From<png::DecodingError> for Error {
    fn from(err: png::DecodingError) -> Self {
        Error::ImageEmbed(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xfa(err.to_string())
    }
}

#[cfg(feature = "timestamp")]
impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Timestamp(err.to_string())
    }
}
