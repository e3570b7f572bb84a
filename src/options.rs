//! Loading and extraction options.

use std::ops::RangeInclusive;

use crate::error::{Error, Result};

/// Options for loading PDF documents.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Strip junk before the `%PDF-` header
    pub repair_header: bool,

    /// Password for encrypted documents
    pub password: Option<String>,
}

impl LoadOptions {
    /// Create new load options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable header repair.
    pub fn with_header_repair(mut self, repair: bool) -> Self {
        self.repair_header = repair;
        self
    }

    /// Set password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            repair_header: true,
            password: None,
        }
    }
}

/// Error handling mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Fail on any error
    #[default]
    Strict,
    /// Skip invalid content and continue
    Lenient,
}

/// How glyph heights are computed for text positions.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum FontHeightMode {
    /// Use the font descriptor's bounding box or cap height
    #[default]
    Descriptor,
    /// Use the font size alone
    FontSize,
    /// A fixed fraction of the font size, e.g. `0.5`
    Fixed(f32),
}

/// Options for text extraction.
#[derive(Debug, Clone)]
pub struct TextOptions {
    /// Order glyphs by position instead of content-stream order
    pub sort_by_position: bool,

    /// Which pages to extract
    pub pages: PageSelection,

    /// Gap, as a fraction of the space width, that separates words
    pub spacing_tolerance: f32,

    /// Gap, as a fraction of the average glyph width, that separates words
    pub average_char_tolerance: f32,

    /// Written between lines
    pub line_separator: String,

    /// Written between words
    pub word_separator: String,

    /// Written after each page
    pub page_end: String,

    /// Glyph height computation
    pub font_height: FontHeightMode,

    /// Whether a page that fails to process aborts extraction
    pub error_mode: ErrorMode,
}

impl TextOptions {
    /// Create new text options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sort output by position.
    pub fn sorted(mut self) -> Self {
        self.sort_by_position = true;
        self
    }

    /// Enable or disable position sorting.
    pub fn with_sort_by_position(mut self, sort: bool) -> Self {
        self.sort_by_position = sort;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Restrict extraction to `start..=end`.
    pub fn with_page_range(mut self, start: u32, end: u32) -> Self {
        self.pages = PageSelection::Range(start..=end);
        self
    }

    /// Set the word spacing tolerance.
    pub fn with_spacing_tolerance(mut self, tolerance: f32) -> Self {
        self.spacing_tolerance = tolerance;
        self
    }

    /// Set the average character tolerance.
    pub fn with_average_char_tolerance(mut self, tolerance: f32) -> Self {
        self.average_char_tolerance = tolerance;
        self
    }

    /// Set the line separator.
    pub fn with_line_separator(mut self, separator: impl Into<String>) -> Self {
        self.line_separator = separator.into();
        self
    }

    /// Set the word separator.
    pub fn with_word_separator(mut self, separator: impl Into<String>) -> Self {
        self.word_separator = separator.into();
        self
    }

    /// Set the page end marker.
    pub fn with_page_end(mut self, page_end: impl Into<String>) -> Self {
        self.page_end = page_end.into();
        self
    }

    /// Set the glyph height mode.
    pub fn with_font_height(mut self, mode: FontHeightMode) -> Self {
        self.font_height = mode;
        self
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Enable lenient mode (skip pages that fail).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            sort_by_position: false,
            pages: PageSelection::All,
            spacing_tolerance: 0.5,
            average_char_tolerance: 0.3,
            line_separator: "\n".to_string(),
            word_separator: " ".to_string(),
            page_end: "\n".to_string(),
            font_height: FontHeightMode::Descriptor,
            error_mode: ErrorMode::Strict,
        }
    }
}

/// Page selection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed)
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed)
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Check if a page number should be included.
    pub fn includes(&self, page: u32) -> bool {
        match self {
            PageSelection::All => true,
            PageSelection::Range(range) => range.contains(&page),
            PageSelection::Pages(pages) => pages.contains(&page),
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let invalid = |what: &str| Error::InvalidPageRange(format!("{} in {:?}", what, s));
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                let start: u32 = start.trim().parse().map_err(|_| invalid("invalid start page"))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid("invalid end page"))?;
                if start == 0 || end < start {
                    return Err(invalid("empty range"));
                }
                return Ok(PageSelection::Range(start..=end));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            let part = part.trim();
            if let Some((start, end)) = part.split_once('-') {
                let start: u32 = start.trim().parse().map_err(|_| invalid("invalid page number"))?;
                let end: u32 = end.trim().parse().map_err(|_| invalid("invalid page number"))?;
                for p in start..=end {
                    if !pages.contains(&p) {
                        pages.push(p);
                    }
                }
            } else {
                let p: u32 = part.parse().map_err(|_| invalid("invalid page number"))?;
                if !pages.contains(&p) {
                    pages.push(p);
                }
            }
        }

        pages.sort();
        Ok(PageSelection::Pages(pages))
    }
}
