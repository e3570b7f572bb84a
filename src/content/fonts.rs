//! Font metrics needed to advance the text matrix and size glyphs.

use std::collections::HashMap;

use lopdf::{Dictionary, Document as LopdfDocument, Object};

use crate::document::{resolve, resolve_dict};

/// Advance used when a font gives no width at all (glyph space).
const FALLBACK_WIDTH: f32 = 500.0;

/// A font resource with the metrics the content engine needs.
#[derive(Debug, Clone)]
pub struct PdfFont {
    /// Key under `/Font` in the resources
    pub resource_name: Vec<u8>,
    /// `/BaseFont`, "Unknown" when absent
    pub base_font: String,
    dict: Dictionary,
    two_byte: bool,
    first_char: u32,
    widths: Vec<f32>,
    missing_width: f32,
    default_width: f32,
    cid_widths: HashMap<u32, f32>,
    /// Glyph space to text space factor (0.001 except for Type3)
    width_scale: f32,
    ascent: f32,
    descent: f32,
    cap_height: f32,
    bbox_height: f32,
}

impl PdfFont {
    /// Read metrics from a font dictionary.
    pub fn load(doc: &LopdfDocument, resource_name: &[u8], dict: &Dictionary) -> Self {
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .map(|n| String::from_utf8_lossy(n).to_string())
            .unwrap_or_else(|| "Unknown".to_string());

        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"Type1".as_slice());

        let mut font = PdfFont {
            resource_name: resource_name.to_vec(),
            base_font,
            dict: dict.clone(),
            two_byte: subtype == b"Type0",
            first_char: 0,
            widths: Vec::new(),
            missing_width: 0.0,
            default_width: 1000.0,
            cid_widths: HashMap::new(),
            width_scale: 0.001,
            ascent: 0.0,
            descent: 0.0,
            cap_height: 0.0,
            bbox_height: 0.0,
        };

        if font.two_byte {
            let descendant = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
                .and_then(|a| a.first())
                .and_then(|o| resolve_dict(doc, o));
            if let Some(cid_font) = descendant {
                font.default_width = number(doc, cid_font.get(b"DW").ok()).unwrap_or(1000.0);
                if let Some(w) = cid_font
                    .get(b"W")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                {
                    font.cid_widths = parse_cid_widths(doc, w);
                }
                font.read_descriptor(doc, cid_font);
            }
        } else {
            font.first_char = number(doc, dict.get(b"FirstChar").ok()).unwrap_or(0.0) as u32;
            if let Some(widths) = dict
                .get(b"Widths")
                .ok()
                .and_then(|o| resolve(doc, o))
                .and_then(|o| o.as_array().ok())
            {
                font.widths = widths
                    .iter()
                    .map(|w| number(doc, Some(w)).unwrap_or(0.0))
                    .collect();
            }
            if subtype == b"Type3" {
                if let Some(m) = dict
                    .get(b"FontMatrix")
                    .ok()
                    .and_then(|o| resolve(doc, o))
                    .and_then(|o| o.as_array().ok())
                    .and_then(|a| a.first())
                    .and_then(|o| o.as_float().ok())
                {
                    font.width_scale = m;
                }
            }
            font.read_descriptor(doc, dict);
        }

        font
    }

    fn read_descriptor(&mut self, doc: &LopdfDocument, dict: &Dictionary) {
        let Some(descriptor) = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| resolve_dict(doc, o))
        else {
            return;
        };
        self.missing_width = number(doc, descriptor.get(b"MissingWidth").ok()).unwrap_or(0.0);
        self.ascent = number(doc, descriptor.get(b"Ascent").ok()).unwrap_or(0.0);
        self.descent = number(doc, descriptor.get(b"Descent").ok()).unwrap_or(0.0);
        self.cap_height = number(doc, descriptor.get(b"CapHeight").ok()).unwrap_or(0.0);
        if let Some(bbox) = descriptor
            .get(b"FontBBox")
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_array().ok())
        {
            let values: Vec<f32> = bbox.iter().filter_map(|o| o.as_float().ok()).collect();
            if values.len() == 4 {
                self.bbox_height = (values[3] - values[1]).abs();
            }
        }
    }

    /// The font dictionary.
    pub fn dict(&self) -> &Dictionary {
        &self.dict
    }

    /// Whether character codes are two bytes wide.
    pub fn is_two_byte(&self) -> bool {
        self.two_byte
    }

    /// Split a string operand into character codes.
    pub fn codes<'b>(&self, bytes: &'b [u8]) -> Vec<(u32, &'b [u8])> {
        if self.two_byte {
            bytes
                .chunks(2)
                .map(|c| {
                    let code = c.iter().fold(0u32, |acc, &b| (acc << 8) | b as u32);
                    (code, c)
                })
                .collect()
        } else {
            bytes
                .iter()
                .enumerate()
                .map(|(i, &b)| (b as u32, &bytes[i..i + 1]))
                .collect()
        }
    }

    /// Advance of `code` in glyph space units.
    pub fn glyph_width(&self, code: u32) -> f32 {
        if self.two_byte {
            return self
                .cid_widths
                .get(&code)
                .copied()
                .unwrap_or(self.default_width);
        }
        if code >= self.first_char {
            if let Some(&w) = self.widths.get((code - self.first_char) as usize) {
                return w;
            }
        }
        if self.missing_width > 0.0 {
            self.missing_width
        } else if self.widths.is_empty() {
            FALLBACK_WIDTH
        } else {
            0.0
        }
    }

    /// Advance of `code` in text space for a unit font size.
    pub fn text_width(&self, code: u32) -> f32 {
        self.glyph_width(code) * self.width_scale
    }

    /// Width of the space glyph in text space, estimated when absent.
    pub fn space_width(&self) -> f32 {
        let width = if self.two_byte {
            self.default_width
        } else {
            self.glyph_width(32)
        };
        if width > 0.0 {
            width * self.width_scale
        } else {
            0.25
        }
    }

    /// Glyph height in text space for a unit font size.
    ///
    /// Half the bounding box height, lowered to the cap height or the
    /// ascent/descent span when those are smaller.
    pub fn glyph_height(&self) -> f32 {
        let mut height = self.bbox_height / 2.0;
        if self.cap_height != 0.0 && (self.cap_height < height || height == 0.0) {
            height = self.cap_height;
        }
        if self.cap_height == 0.0 && self.ascent != 0.0 && self.descent != 0.0 {
            let span = self.ascent - self.descent;
            if span < height || height == 0.0 {
                height = span;
            }
        }
        if height <= 0.0 {
            height = 1000.0;
        }
        height * 0.001
    }

    /// Fallback decoding of one code when the font has no usable encoding.
    pub fn fallback_decode(&self, bytes: &[u8]) -> String {
        if self.two_byte && bytes.len() == 2 {
            let code = u16::from_be_bytes([bytes[0], bytes[1]]);
            return char::from_u32(code as u32)
                .map(String::from)
                .unwrap_or_default();
        }
        bytes.iter().map(|&b| b as char).collect()
    }
}

fn number(doc: &LopdfDocument, obj: Option<&Object>) -> Option<f32> {
    resolve(doc, obj?)?.as_float().ok()
}

/// Parse a CIDFont `/W` array: `c [w1 w2 ...]` and `c_first c_last w` runs.
fn parse_cid_widths(doc: &LopdfDocument, w: &[Object]) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0;
    while i < w.len() {
        let Some(first) = number(doc, Some(&w[i])) else {
            break;
        };
        let first = first as u32;
        match w.get(i + 1).and_then(|o| resolve(doc, o)) {
            Some(Object::Array(list)) => {
                for (offset, width) in list.iter().enumerate() {
                    if let Some(width) = number(doc, Some(width)) {
                        widths.insert(first + offset as u32, width);
                    }
                }
                i += 2;
            }
            Some(_) => {
                let last = number(doc, w.get(i + 1)).unwrap_or(first as f32) as u32;
                let width = number(doc, w.get(i + 2)).unwrap_or(0.0);
                for code in first..=last {
                    widths.insert(code, width);
                }
                i += 3;
            }
            None => break,
        }
    }
    widths
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[test]
    fn test_simple_font_widths() {
        let doc = LopdfDocument::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "TrueType",
            "BaseFont" => "Arial",
            "FirstChar" => 32,
            "Widths" => vec![278.into(), 556.into()],
        };
        let font = PdfFont::load(&doc, b"F1", &dict);
        assert_eq!(font.base_font, "Arial");
        assert_eq!(font.glyph_width(32), 278.0);
        assert_eq!(font.glyph_width(33), 556.0);
        assert_eq!(font.glyph_width(90), 0.0);
        assert!((font.space_width() - 0.278).abs() < 1e-6);
    }

    #[test]
    fn test_font_without_widths_uses_fallback() {
        let doc = LopdfDocument::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        };
        let font = PdfFont::load(&doc, b"F1", &dict);
        assert_eq!(font.glyph_width(65), FALLBACK_WIDTH);
        assert_eq!(font.codes(b"AB").len(), 2);
    }

    #[test]
    fn test_type0_widths() {
        let doc = LopdfDocument::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type0",
            "BaseFont" => "Noto",
            "DescendantFonts" => vec![Object::Dictionary(dictionary! {
                "Type" => "Font",
                "Subtype" => "CIDFontType2",
                "DW" => 900,
                "W" => vec![
                    1.into(),
                    Object::Array(vec![100.into(), 200.into()]),
                    10.into(), 12.into(), 300.into(),
                ],
            })],
        };
        let font = PdfFont::load(&doc, b"F2", &dict);
        assert!(font.is_two_byte());
        assert_eq!(font.glyph_width(1), 100.0);
        assert_eq!(font.glyph_width(2), 200.0);
        assert_eq!(font.glyph_width(11), 300.0);
        assert_eq!(font.glyph_width(50), 900.0);

        let codes = font.codes(&[0x00, 0x01, 0x00, 0x0B]);
        assert_eq!(codes.iter().map(|c| c.0).collect::<Vec<_>>(), vec![1, 11]);
        assert_eq!(font.fallback_decode(&[0x00, 0x41]), "A");
    }

    #[test]
    fn test_glyph_height_from_descriptor() {
        let doc = LopdfDocument::with_version("1.5");
        let dict = dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "FontDescriptor" => dictionary! {
                "FontBBox" => vec![0.into(), (-200).into(), 1000.into(), 1200.into()],
                "CapHeight" => 700,
            },
        };
        let font = PdfFont::load(&doc, b"F1", &dict);
        assert!((font.glyph_height() - 0.7).abs() < 1e-6);
    }
}
