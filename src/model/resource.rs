//! Images pulled out of a document.

use serde::{Deserialize, Serialize};

/// Encoding of the bytes held by an [`ExtractedImage`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    /// DCTDecode stream, written as-is
    Jpeg,
    /// JPXDecode stream, written as-is
    Jpx,
    /// JBIG2Decode stream, written as-is
    Jbig2,
    /// CCITTFaxDecode stream, written as-is
    Ccitt,
    /// Decoded samples, encoded to PNG on output
    Raw,
}

/// Colour space of an image's samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageColorSpace {
    Gray,
    Rgb,
    Cmyk,
    /// Palette lookup with `base` components per entry
    Indexed {
        base: Box<ImageColorSpace>,
        hival: u8,
        palette: Vec<u8>,
    },
    Unknown(String),
}

impl ImageColorSpace {
    /// Components per sample.
    pub fn components(&self) -> usize {
        match self {
            ImageColorSpace::Gray => 1,
            ImageColorSpace::Rgb => 3,
            ImageColorSpace::Cmyk => 4,
            ImageColorSpace::Indexed { .. } => 1,
            ImageColorSpace::Unknown(_) => 1,
        }
    }
}

/// An image XObject as found in a page, form or appearance stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractedImage {
    /// Stream data, encoded or decoded depending on `format`
    #[serde(skip_serializing)]
    pub data: Vec<u8>,

    pub format: ImageFormat,

    /// Resource name the image was drawn under
    pub name: String,

    pub width: u32,
    pub height: u32,
    pub bits_per_component: u8,
    pub color_space: ImageColorSpace,

    /// Stencil mask (`/ImageMask true`)
    pub is_mask: bool,

    /// CMYK JPEGs written by Adobe store inverted samples
    pub inverted: bool,
}

impl ExtractedImage {
    pub fn new(data: Vec<u8>, format: ImageFormat, width: u32, height: u32) -> Self {
        Self {
            data,
            format,
            name: String::new(),
            width,
            height,
            bits_per_component: 8,
            color_space: ImageColorSpace::Rgb,
            is_mask: false,
            inverted: false,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_color_space(mut self, color_space: ImageColorSpace) -> Self {
        self.color_space = color_space;
        self
    }

    pub fn with_bits_per_component(mut self, bits: u8) -> Self {
        self.bits_per_component = bits;
        self
    }

    /// Size of the stored data in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// File suffix used when writing the image.
    pub fn suffix(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Jpx => "jpx",
            ImageFormat::Jbig2 => "jb2",
            ImageFormat::Ccitt => "tif",
            ImageFormat::Raw => "png",
        }
    }

    /// MIME type of the written file.
    pub fn mime_type(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Jpx => "image/jpx",
            ImageFormat::Jbig2 => "image/x-jbig2",
            ImageFormat::Ccitt => "image/tiff",
            ImageFormat::Raw => "image/png",
        }
    }

    /// Detect MIME type from data magic bytes.
    pub fn detect_mime_type(data: &[u8]) -> Option<&'static str> {
        if data.len() < 8 {
            return None;
        }

        // JPEG: FF D8 FF
        if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
            return Some("image/jpeg");
        }

        // PNG: 89 50 4E 47 0D 0A 1A 0A
        if data.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
            return Some("image/png");
        }

        // JPEG 2000: 00 00 00 0C 6A 50 20 20, or a bare codestream FF 4F FF 51
        if data.starts_with(&[0x00, 0x00, 0x00, 0x0C, 0x6A, 0x50, 0x20, 0x20])
            || data.starts_with(&[0xFF, 0x4F, 0xFF, 0x51])
        {
            return Some("image/jpx");
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_follows_format() {
        let jpeg = ExtractedImage::new(vec![0xFF, 0xD8, 0xFF], ImageFormat::Jpeg, 1, 1);
        assert_eq!(jpeg.suffix(), "jpg");
        assert_eq!(jpeg.mime_type(), "image/jpeg");

        let raw = ExtractedImage::new(vec![0; 3], ImageFormat::Raw, 1, 1);
        assert_eq!(raw.suffix(), "png");
    }

    #[test]
    fn test_detect_mime_type() {
        let jpeg_data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10, 0x4A, 0x46];
        assert_eq!(
            ExtractedImage::detect_mime_type(&jpeg_data),
            Some("image/jpeg")
        );

        let png_data = vec![0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
        assert_eq!(ExtractedImage::detect_mime_type(&png_data), Some("image/png"));

        let unknown = vec![0x00, 0x00, 0x00, 0x00];
        assert_eq!(ExtractedImage::detect_mime_type(&unknown), None);
    }

    #[test]
    fn test_indexed_components() {
        let cs = ImageColorSpace::Indexed {
            base: Box::new(ImageColorSpace::Rgb),
            hival: 1,
            palette: vec![0, 0, 0, 255, 255, 255],
        };
        assert_eq!(cs.components(), 1);
    }
}
