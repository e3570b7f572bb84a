//! Drawing additional content onto an existing page.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use super::engine::decode_operations;
use super::image::ImageXObject;
use crate::document::{ensure_page_resources, page_resources, resolve, resolve_dict};
use crate::error::{Error, Result};
use crate::model::{Matrix, Rectangle};

/// Where new content goes relative to the existing page content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppendMode {
    #[default]
    Append,
    Prepend,
    /// Replace the page content
    Overwrite,
}

/// A content stream being built for one page.
///
/// Nothing is written until [`finish`](Self::finish) is called.
pub struct PageCanvas<'d> {
    doc: &'d mut LopdfDocument,
    page_id: ObjectId,
    mode: AppendMode,
    compress: bool,
    reset_context: bool,
    operations: Vec<Operation>,
    xobjects: Vec<(String, ObjectId)>,
}

impl<'d> PageCanvas<'d> {
    /// Open a canvas in append mode with compression.
    pub fn new(doc: &'d mut LopdfDocument, page_id: ObjectId) -> Self {
        Self::with_mode(doc, page_id, AppendMode::Append, true, false)
    }

    /// Open a canvas.
    ///
    /// With `reset_context` the existing content is wrapped in `q`/`Q` so
    /// appended operations start from the default graphics state.
    pub fn with_mode(
        doc: &'d mut LopdfDocument,
        page_id: ObjectId,
        mode: AppendMode,
        compress: bool,
        reset_context: bool,
    ) -> Self {
        Self {
            doc,
            page_id,
            mode,
            compress,
            reset_context,
            operations: Vec::new(),
            xobjects: Vec::new(),
        }
    }

    /// Operations recorded so far.
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    fn push(&mut self, operator: &str, operands: Vec<Object>) -> &mut Self {
        self.operations.push(Operation::new(operator, operands));
        self
    }

    pub fn save_state(&mut self) -> &mut Self {
        self.push("q", vec![])
    }

    pub fn restore_state(&mut self) -> &mut Self {
        self.push("Q", vec![])
    }

    /// Concatenate `matrix` to the CTM.
    pub fn transform(&mut self, matrix: &Matrix) -> &mut Self {
        self.push("cm", matrix.to_operands())
    }

    pub fn set_line_width(&mut self, width: f32) -> &mut Self {
        self.push("w", vec![Object::Real(width)])
    }

    /// Stroking gray, 0 (black) to 1 (white).
    pub fn set_stroking_gray(&mut self, gray: f32) -> &mut Self {
        self.push("G", vec![Object::Real(gray)])
    }

    /// Non-stroking gray, 0 (black) to 1 (white).
    pub fn set_non_stroking_gray(&mut self, gray: f32) -> &mut Self {
        self.push("g", vec![Object::Real(gray)])
    }

    /// Stroking RGB with components 0..=1.
    pub fn set_stroking_rgb(&mut self, r: f32, g: f32, b: f32) -> &mut Self {
        self.push("RG", vec![Object::Real(r), Object::Real(g), Object::Real(b)])
    }

    /// Non-stroking RGB with components 0..=1.
    pub fn set_non_stroking_rgb(&mut self, r: f32, g: f32, b: f32) -> &mut Self {
        self.push("rg", vec![Object::Real(r), Object::Real(g), Object::Real(b)])
    }

    /// Stroking RGB with components 0..=255.
    pub fn set_stroking_rgb8(&mut self, r: u8, g: u8, b: u8) -> &mut Self {
        self.set_stroking_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    /// Non-stroking RGB with components 0..=255.
    pub fn set_non_stroking_rgb8(&mut self, r: u8, g: u8, b: u8) -> &mut Self {
        self.set_non_stroking_rgb(r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0)
    }

    pub fn move_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.push("m", vec![Object::Real(x), Object::Real(y)])
    }

    pub fn line_to(&mut self, x: f32, y: f32) -> &mut Self {
        self.push("l", vec![Object::Real(x), Object::Real(y)])
    }

    pub fn close_path(&mut self) -> &mut Self {
        self.push("h", vec![])
    }

    pub fn add_rect(&mut self, x: f32, y: f32, width: f32, height: f32) -> &mut Self {
        self.push(
            "re",
            vec![
                Object::Real(x),
                Object::Real(y),
                Object::Real(width),
                Object::Real(height),
            ],
        )
    }

    /// Add `rect` as a rectangle subpath.
    pub fn add_rectangle(&mut self, rect: &Rectangle) -> &mut Self {
        self.add_rect(rect.llx, rect.lly, rect.width(), rect.height())
    }

    /// Intersect the clip with the current path (nonzero winding).
    ///
    /// The path still needs a painting or `n` operator.
    pub fn clip(&mut self) -> &mut Self {
        self.push("W", vec![])
    }

    pub fn clip_even_odd(&mut self) -> &mut Self {
        self.push("W*", vec![])
    }

    pub fn stroke(&mut self) -> &mut Self {
        self.push("S", vec![])
    }

    pub fn fill(&mut self) -> &mut Self {
        self.push("f", vec![])
    }

    pub fn fill_even_odd(&mut self) -> &mut Self {
        self.push("f*", vec![])
    }

    pub fn end_path(&mut self) -> &mut Self {
        self.push("n", vec![])
    }

    /// Append raw content stream syntax.
    pub fn append_raw(&mut self, raw: &str) -> Result<&mut Self> {
        let operations = decode_operations(raw.as_bytes())?;
        self.operations.extend(operations);
        Ok(self)
    }

    /// Draw `image` into the rectangle at (`x`, `y`) of size `width` × `height`.
    pub fn draw_image(
        &mut self,
        image: &ImageXObject,
        x: f32,
        y: f32,
        width: f32,
        height: f32,
    ) -> &mut Self {
        let registered = self
            .xobjects
            .iter()
            .find(|(_, id)| *id == image.object_id())
            .map(|(name, _)| name.clone());
        let name = match registered {
            Some(name) => name,
            None => {
                let name = self.next_image_name();
                self.xobjects.push((name.clone(), image.object_id()));
                name
            }
        };
        self.save_state()
            .transform(&Matrix::new(width, 0.0, 0.0, height, x, y))
            .push("Do", vec![Object::Name(name.into_bytes())])
            .restore_state()
    }

    fn next_image_name(&self) -> String {
        let existing = page_resources(self.doc, self.page_id)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(self.doc, x));
        let taken = |candidate: &str| {
            existing.map_or(false, |x| x.has(candidate.as_bytes()))
                || self.xobjects.iter().any(|(n, _)| n == candidate)
        };
        let mut index = 1;
        loop {
            let candidate = format!("Im{}", index);
            if !taken(&candidate) {
                return candidate;
            }
            index += 1;
        }
    }

    /// Write the content stream into the page and register drawn images.
    pub fn finish(self) -> Result<()> {
        let PageCanvas {
            doc,
            page_id,
            mode,
            compress,
            reset_context,
            mut operations,
            xobjects,
        } = self;

        if !xobjects.is_empty() {
            register_xobjects(doc, page_id, &xobjects)?;
        }

        let restore_first =
            reset_context && mode == AppendMode::Append && has_content(doc, page_id);
        if restore_first {
            operations.insert(0, Operation::new("Q", vec![]));
        }
        let stream_id = add_stream(doc, operations, compress)?;

        let existing: Vec<Object> = match doc.get_dictionary(page_id)?.get(b"Contents") {
            Ok(contents) => match resolve(doc, contents) {
                Some(Object::Array(items)) => items.clone(),
                Some(_) => vec![contents.clone()],
                None => Vec::new(),
            },
            Err(_) => Vec::new(),
        };

        let contents = match mode {
            AppendMode::Overwrite => vec![Object::Reference(stream_id)],
            AppendMode::Prepend => {
                let mut contents = vec![Object::Reference(stream_id)];
                contents.extend(existing);
                contents
            }
            AppendMode::Append => {
                let mut contents = Vec::with_capacity(existing.len() + 2);
                if restore_first {
                    let save_id = add_stream(doc, vec![Operation::new("q", vec![])], compress)?;
                    contents.push(Object::Reference(save_id));
                }
                contents.extend(existing);
                contents.push(Object::Reference(stream_id));
                contents
            }
        };

        doc.get_dictionary_mut(page_id)?
            .set("Contents", Object::Array(contents));
        Ok(())
    }
}

fn has_content(doc: &LopdfDocument, page_id: ObjectId) -> bool {
    doc.get_dictionary(page_id)
        .map(|page| page.has(b"Contents"))
        .unwrap_or(false)
}

fn add_stream(
    doc: &mut LopdfDocument,
    operations: Vec<Operation>,
    compress: bool,
) -> Result<ObjectId> {
    let bytes = Content { operations }
        .encode()
        .map_err(|e| Error::ContentStream(e.to_string()))?;
    let mut stream = Stream::new(Dictionary::new(), bytes);
    if compress {
        if let Err(e) = stream.compress() {
            log::warn!("Keeping content stream uncompressed: {}", e);
        }
    }
    Ok(doc.add_object(stream))
}

fn register_xobjects(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    xobjects: &[(String, ObjectId)],
) -> Result<()> {
    ensure_page_resources(doc, page_id)?;
    let resources = doc
        .get_dictionary_mut(page_id)?
        .get_mut(b"Resources")?
        .as_dict_mut()?;
    if !matches!(resources.get(b"XObject"), Ok(Object::Dictionary(_))) {
        resources.set("XObject", Dictionary::new());
    }
    let xobject_dict = resources.get_mut(b"XObject")?.as_dict_mut()?;
    for (name, id) in xobjects {
        xobject_dict.set(name.as_bytes().to_vec(), Object::Reference(*id));
    }
    Ok(())
}
