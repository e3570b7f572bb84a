//! Text extraction.
//!
//! Glyphs reported by the content engine become [`TextPosition`]s in a
//! top-left coordinate system relative to the crop box. Positions are then
//! grouped into lines and words and written out as plain text.

use std::cmp::Ordering;
use std::collections::{BTreeSet, HashMap};

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId};
use serde::Serialize;
use unicode_bidi::BidiInfo;
use unicode_normalization::UnicodeNormalization;

use crate::content::{ContentHandler, Glyph, StreamEngine};
use crate::document::crop_box_of;
use crate::error::{Error, Result};
use crate::model::{Color, Matrix, Rectangle};
use crate::options::{ErrorMode, FontHeightMode, TextOptions};

/// One glyph with its page position.
#[derive(Debug, Clone, Serialize)]
pub struct TextPosition {
    pub unicode: String,
    /// Distance from the left edge of the crop box
    pub x: f32,
    /// Baseline distance from the top edge of the crop box
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub font_size: f32,
    pub font_name: String,
    /// Width of a space in the same font, page space
    pub space_width: f32,
    pub color: Color,
    /// Text rendering matrix
    pub matrix: Matrix,
}

struct PositionCollector {
    crop: Rectangle,
    font_height: FontHeightMode,
    positions: Vec<TextPosition>,
}

impl ContentHandler for PositionCollector {
    fn show_glyph(&mut self, glyph: &Glyph) {
        if glyph.unicode.is_empty() {
            return;
        }
        let trm = glyph.text_rendering_matrix;
        let scale_y = trm.scaling_factor_y();
        let height = match self.font_height {
            FontHeightMode::Descriptor => glyph.font.glyph_height() * scale_y,
            FontHeightMode::FontSize => scale_y,
            FontHeightMode::Fixed(fraction) => fraction * scale_y,
        };
        self.positions.push(TextPosition {
            unicode: glyph.unicode.clone(),
            x: trm.e - self.crop.llx,
            y: self.crop.ury - trm.f,
            width: glyph.width,
            height,
            font_size: glyph.font_size,
            font_name: glyph.font.base_font.clone(),
            space_width: glyph.font.space_width() * trm.scaling_factor_x(),
            color: glyph.fill_color.clone(),
            matrix: trm,
        });
    }
}

/// Plain text extractor.
#[derive(Debug, Clone, Default)]
pub struct TextStripper {
    options: TextOptions,
}

impl TextStripper {
    pub fn new(options: TextOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &TextOptions {
        &self.options
    }

    /// Glyph positions of one page in content stream order.
    pub fn text_positions(
        &self,
        doc: &LopdfDocument,
        page_id: ObjectId,
    ) -> Result<Vec<TextPosition>> {
        let mut collector = PositionCollector {
            crop: crop_box_of(doc, page_id),
            font_height: self.options.font_height,
            positions: Vec::new(),
        };
        StreamEngine::new(doc).process_page(page_id, &mut collector)?;
        Ok(collector.positions)
    }

    /// Text of all selected pages, each followed by the page end marker.
    pub fn get_text(&self, doc: &LopdfDocument) -> Result<String> {
        let mut text = String::new();
        for (page, page_id) in doc.get_pages() {
            if !self.options.pages.includes(page) {
                continue;
            }
            match self.page_text(doc, page_id) {
                Ok(page_text) => text.push_str(&page_text),
                Err(e) if self.options.error_mode == ErrorMode::Lenient => {
                    log::warn!("Skipping text of page {}: {}", page, e);
                }
                Err(e) => return Err(Error::TextExtract(format!("page {}: {}", page, e))),
            }
            text.push_str(&self.options.page_end);
        }
        Ok(text)
    }

    /// Text of one page without the page end marker.
    pub fn page_text(&self, doc: &LopdfDocument, page_id: ObjectId) -> Result<String> {
        let positions = self.text_positions(doc, page_id)?;
        Ok(self.write_positions(&positions))
    }

    /// Lay out positions as lines of words.
    pub fn write_positions(&self, positions: &[TextPosition]) -> String {
        build_lines(positions, self.options.sort_by_position)
            .iter()
            .map(|line| self.write_line(line))
            .collect::<Vec<_>>()
            .join(&self.options.line_separator)
    }

    fn write_line(&self, line: &[&TextPosition]) -> String {
        let mut text = String::new();
        let mut previous: Option<&TextPosition> = None;
        for position in line {
            if let Some(prev) = previous {
                let gap = position.x - (prev.x + prev.width);
                let average_width = (prev.width + position.width) / 2.0;
                let threshold = (self.options.spacing_tolerance * prev.space_width)
                    .min(self.options.average_char_tolerance * average_width);
                let at_whitespace = text.chars().last().map_or(true, char::is_whitespace)
                    || position.unicode.starts_with(char::is_whitespace);
                if gap > threshold && !at_whitespace {
                    text.push_str(&self.options.word_separator);
                }
            }
            text.push_str(&position.unicode);
            previous = Some(position);
        }
        normalize_line(&text)
    }
}

fn same_line(a: &TextPosition, b: &TextPosition) -> bool {
    let tolerance = (a.height.max(b.height) / 2.0).max(0.5);
    (a.y - b.y).abs() <= tolerance
}

/// Group positions into lines; sorted output runs top to bottom, left to right.
fn build_lines(positions: &[TextPosition], sort_by_position: bool) -> Vec<Vec<&TextPosition>> {
    let mut ordered: Vec<&TextPosition> = positions.iter().collect();
    if sort_by_position {
        ordered.sort_by(|a, b| a.y.partial_cmp(&b.y).unwrap_or(Ordering::Equal));
    }

    let mut lines: Vec<Vec<&TextPosition>> = Vec::new();
    for position in ordered {
        match lines.last_mut() {
            Some(line) if line.last().map_or(false, |last| same_line(last, position)) => {
                line.push(position)
            }
            _ => lines.push(vec![position]),
        }
    }

    if sort_by_position {
        for line in &mut lines {
            line.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(Ordering::Equal));
        }
    }
    lines
}

fn is_presentation_form(c: char) -> bool {
    matches!(c as u32, 0xFB00..=0xFDFF | 0xFE70..=0xFEFF)
}

/// Expand presentation forms and put right-to-left runs in reading order.
pub fn normalize_line(line: &str) -> String {
    let mut normalized = String::with_capacity(line.len());
    for c in line.chars() {
        if is_presentation_form(c) {
            normalized.extend(c.to_string().nfkc());
        } else {
            normalized.push(c);
        }
    }

    let bidi = BidiInfo::new(&normalized, None);
    if !bidi.has_rtl() {
        return normalized;
    }
    bidi.paragraphs
        .iter()
        .map(|para| bidi.reorder_line(para, para.range.clone()).into_owned())
        .collect()
}

/// A rectangle in top-left page coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Region {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Region {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.x + self.width && y >= self.y && y < self.y + self.height
    }
}

/// Extracts text from named regions of a page.
#[derive(Debug, Clone, Default)]
pub struct TextStripperByArea {
    stripper: TextStripper,
    regions: Vec<(String, Region)>,
    texts: HashMap<String, String>,
}

impl TextStripperByArea {
    pub fn new(options: TextOptions) -> Self {
        Self {
            stripper: TextStripper::new(options),
            regions: Vec::new(),
            texts: HashMap::new(),
        }
    }

    /// Add or replace a region.
    pub fn add_region(&mut self, name: impl Into<String>, region: Region) {
        let name = name.into();
        match self.regions.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = region,
            None => self.regions.push((name, region)),
        }
    }

    pub fn remove_region(&mut self, name: &str) {
        self.regions.retain(|(n, _)| n != name);
        self.texts.remove(name);
    }

    /// Region names in insertion order.
    pub fn regions(&self) -> Vec<&str> {
        self.regions.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Extract the text of every region from one page.
    pub fn extract_regions(&mut self, doc: &LopdfDocument, page_id: ObjectId) -> Result<()> {
        let positions = self.stripper.text_positions(doc, page_id)?;
        self.texts.clear();
        for (name, region) in &self.regions {
            let inside: Vec<TextPosition> = positions
                .iter()
                .filter(|p| region.contains(p.x, p.y))
                .cloned()
                .collect();
            let mut text = self.stripper.write_positions(&inside);
            if !inside.is_empty() {
                text.push_str(&self.stripper.options().line_separator);
            }
            self.texts.insert(name.clone(), text);
        }
        Ok(())
    }

    /// Text of `name` from the last extraction; empty for unknown regions.
    pub fn text_for_region(&self, name: &str) -> &str {
        self.texts.get(name).map(String::as_str).unwrap_or("")
    }
}

#[derive(Debug, Clone, Copy)]
enum Role {
    /// Page, page tree node or form XObject carrying `/Resources`
    Holder,
    Resources,
    Fonts,
    Font,
    XObjects,
}

fn strip_entry(value: &mut Object, role: Role, pending: &mut Vec<(ObjectId, Role)>) -> usize {
    match value {
        Object::Reference(id) => {
            pending.push((*id, role));
            0
        }
        Object::Dictionary(dict) => strip_dict(dict, role, pending),
        Object::Stream(stream) => strip_dict(&mut stream.dict, role, pending),
        _ => 0,
    }
}

fn strip_child(
    dict: &mut Dictionary,
    key: &[u8],
    role: Role,
    pending: &mut Vec<(ObjectId, Role)>,
) -> usize {
    dict.get_mut(key)
        .map(|value| strip_entry(value, role, pending))
        .unwrap_or(0)
}

fn strip_dict(dict: &mut Dictionary, role: Role, pending: &mut Vec<(ObjectId, Role)>) -> usize {
    match role {
        Role::Holder => {
            if let Ok(Object::Reference(parent)) = dict.get(b"Parent") {
                pending.push((*parent, Role::Holder));
            }
            strip_child(dict, b"Resources", Role::Resources, pending)
        }
        Role::Resources => {
            strip_child(dict, b"Font", Role::Fonts, pending)
                + strip_child(dict, b"XObject", Role::XObjects, pending)
        }
        Role::Fonts | Role::XObjects => {
            let entry_role = if matches!(role, Role::Fonts) { Role::Font } else { Role::Holder };
            dict.iter_mut()
                .map(|(_, value)| strip_entry(value, entry_role, pending))
                .sum()
        }
        Role::Font => usize::from(dict.remove(b"ToUnicode").is_some()),
    }
}

/// Remove `/ToUnicode` maps from every font used by the pages, including
/// fonts of nested form XObjects. Returns the number of maps removed.
pub fn remove_to_unicode_maps(doc: &mut LopdfDocument) -> usize {
    let mut pending: Vec<(ObjectId, Role)> = doc
        .get_pages()
        .into_values()
        .map(|id| (id, Role::Holder))
        .collect();
    let mut seen = BTreeSet::new();
    let mut removed = 0;

    while let Some((id, role)) = pending.pop() {
        if !seen.insert((id, role as u8)) {
            continue;
        }
        let dict = match doc.get_object_mut(id) {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(Object::Stream(stream)) => &mut stream.dict,
            _ => continue,
        };
        removed += strip_dict(dict, role, &mut pending);
    }
    log::debug!("Removed {} ToUnicode maps", removed);
    removed
}
