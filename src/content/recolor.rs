//! Forcing text to black.
//!
//! Text shown in a non-black fill colour is switched to `0 g` for the
//! duration of the text-showing operation; the original colour is restored
//! before the next operation so that graphics keep their colours.

use lopdf::content::Operation;
use lopdf::{Document as LopdfDocument, Object, ObjectId};

use super::editor::{ContentStreamEditor, ContentWriter, EditFilter};
use super::engine::{is_text_showing, GraphicsState, TextSpan};
use crate::document::{resolve, resolve_dict};
use crate::error::Result;
use crate::model::{Color, Matrix, Rectangle};

/// Edit filter that blackens text, optionally only inside given areas.
#[derive(Debug, Default, Clone)]
pub struct BlackTextFilter {
    areas: Option<Vec<Rectangle>>,
    replaced: Option<Color>,
}

impl BlackTextFilter {
    /// Blacken all text.
    pub fn new() -> Self {
        Self::default()
    }

    /// Blacken only text starting or ending inside one of `areas`.
    pub fn in_areas(areas: Vec<Rectangle>) -> Self {
        Self {
            areas: Some(areas),
            replaced: None,
        }
    }

    /// Colour currently overridden by `0 g`, if any.
    pub fn replaced_color(&self) -> Option<&Color> {
        self.replaced.as_ref()
    }

    fn applies_to(&self, span: &TextSpan) -> bool {
        match &self.areas {
            None => true,
            Some(areas) => {
                let inside = |m: &Option<Matrix>| {
                    m.map_or(false, |m| {
                        areas
                            .iter()
                            .any(|r| r.contains(m.translate_x(), m.translate_y()))
                    })
                };
                inside(&span.start) || inside(&span.end)
            }
        }
    }
}

impl EditFilter for BlackTextFilter {
    fn write(
        &mut self,
        writer: &mut ContentWriter,
        op: &Operation,
        state: &GraphicsState,
        span: &TextSpan,
    ) -> Result<()> {
        if is_text_showing(&op.operator) && self.applies_to(span) {
            if self.replaced.is_none() && !state.fill_color.is_black() {
                self.replaced = Some(state.fill_color.clone());
                writer.write("g", vec![Object::Integer(0)]);
            }
        } else if let Some(color) = self.replaced.take() {
            match color.fill_operator() {
                Some(operator) => writer.write(operator, color.operands()),
                None => log::warn!(
                    "Cannot restore fill colour in {} after black text",
                    color.space.name()
                ),
            }
        }

        writer.write_operation(op);
        Ok(())
    }
}

/// Blacken the text of every page.
pub fn make_text_black(doc: &mut LopdfDocument) -> Result<()> {
    let editor = ContentStreamEditor::new();
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    for page_id in page_ids {
        editor.edit_page(doc, page_id, &mut BlackTextFilter::new())?;
    }
    Ok(())
}

/// Blacken text of page `page_id` within `areas` (default user space).
pub fn make_text_black_in_areas(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    areas: Vec<Rectangle>,
) -> Result<()> {
    ContentStreamEditor::new().edit_page(doc, page_id, &mut BlackTextFilter::in_areas(areas))
}

/// Remove every other annotation (the first, third, ...) from each page and
/// blacken the text underneath the removed ones.
///
/// Returns the number of annotations removed.
pub fn remove_alternate_annotations_and_blacken(doc: &mut LopdfDocument) -> Result<usize> {
    let page_ids: Vec<ObjectId> = doc.get_pages().into_values().collect();
    let mut removed = 0;

    for page_id in page_ids {
        let annotations = doc
            .get_dictionary(page_id)?
            .get(b"Annots")
            .ok()
            .and_then(|a| resolve(doc, a))
            .and_then(|a| a.as_array().ok())
            .cloned();
        let Some(annotations) = annotations else {
            continue;
        };

        let mut areas = Vec::new();
        let mut kept = Vec::new();
        for (index, entry) in annotations.into_iter().enumerate() {
            if index % 2 == 0 {
                let rect = resolve_dict(doc, &entry)
                    .and_then(|d| d.get(b"Rect").ok())
                    .and_then(|r| resolve(doc, r))
                    .and_then(|r| r.as_array().ok())
                    .and_then(|r| Rectangle::from_array(r));
                areas.extend(rect);
                removed += 1;
            } else {
                kept.push(entry);
            }
        }
        doc.get_dictionary_mut(page_id)?
            .set("Annots", Object::Array(kept));

        make_text_black_in_areas(doc, page_id, areas)?;
    }

    log::info!("Removed {} annotations", removed);
    Ok(removed)
}
