//! Graphics stream interpreter.
//!
//! [`StreamEngine`] replays content stream operations while tracking the
//! graphics state stack, the current transformation matrix, colours and the
//! text state. Text showing and image drawing are reported to a
//! [`ContentHandler`]. Form XObjects are entered recursively when enabled.

use std::collections::HashMap;
use std::rc::Rc;

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use super::fonts::PdfFont;
use crate::document::{page_content, page_resources, resolve, resolve_dict};
use crate::error::{Error, Result};
use crate::model::{Color, ColorSpace, Matrix};

/// Operators that paint text.
pub const TEXT_SHOWING_OPERATORS: [&str; 4] = ["Tj", "'", "\"", "TJ"];

/// Nested form XObjects deeper than this are skipped.
const MAX_FORM_DEPTH: usize = 16;

/// Whether `operator` paints text.
pub fn is_text_showing(operator: &str) -> bool {
    TEXT_SHOWING_OPERATORS.contains(&operator)
}

/// Text state parameters (`Tc Tw Tz TL Tf Ts Tr`).
#[derive(Debug, Clone)]
pub struct TextState {
    pub char_spacing: f32,
    pub word_spacing: f32,
    /// `Tz / 100`
    pub horizontal_scaling: f32,
    pub leading: f32,
    pub font: Option<Rc<PdfFont>>,
    pub font_size: f32,
    pub rise: f32,
    pub render_mode: i64,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scaling: 1.0,
            leading: 0.0,
            font: None,
            font_size: 0.0,
            rise: 0.0,
            render_mode: 0,
        }
    }
}

/// The part of the graphics state saved by `q` and restored by `Q`.
#[derive(Debug, Clone)]
pub struct GraphicsState {
    pub ctm: Matrix,
    pub fill_color: Color,
    pub stroke_color: Color,
    pub line_width: f32,
    pub text: TextState,
}

impl Default for GraphicsState {
    fn default() -> Self {
        Self {
            ctm: Matrix::identity(),
            fill_color: Color::default(),
            stroke_color: Color::default(),
            line_width: 1.0,
            text: TextState::default(),
        }
    }
}

/// One painted glyph.
#[derive(Debug, Clone)]
pub struct Glyph {
    pub code: u32,
    pub unicode: String,
    /// Text rendering matrix in page space
    pub text_rendering_matrix: Matrix,
    /// Advance in page space
    pub width: f32,
    pub font_size: f32,
    pub font: Rc<PdfFont>,
    pub fill_color: Color,
    pub render_mode: i64,
}

/// An image XObject painted by `Do`.
#[derive(Debug)]
pub struct ImageDraw<'a> {
    pub name: &'a [u8],
    pub id: Option<ObjectId>,
    pub stream: &'a Stream,
    /// CTM at the time of drawing; maps the unit square onto the page
    pub ctm: Matrix,
}

/// Page-space text matrices around a text-showing operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextSpan {
    /// `Tm × CTM` before the first string was shown
    pub start: Option<Matrix>,
    /// `Tm × CTM` after the last string was shown
    pub end: Option<Matrix>,
}

/// Receives painting events from the engine.
pub trait ContentHandler {
    fn show_glyph(&mut self, _glyph: &Glyph) {}

    /// Called after each string operand has been shown.
    fn show_text_end(&mut self) {}

    fn draw_image(&mut self, _doc: &LopdfDocument, _image: &ImageDraw<'_>) {}
}

/// Handler that ignores everything.
impl ContentHandler for () {}

/// Content stream interpreter over a loaded document.
pub struct StreamEngine<'a> {
    doc: &'a LopdfDocument,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    stack_floor: usize,
    text_matrix: Matrix,
    line_matrix: Matrix,
    resources: Vec<Option<&'a Dictionary>>,
    descend_forms: bool,
    active_forms: Vec<ObjectId>,
    form_depth: usize,
    span: TextSpan,
    font_cache: HashMap<ObjectId, Rc<PdfFont>>,
}

impl<'a> StreamEngine<'a> {
    pub fn new(doc: &'a LopdfDocument) -> Self {
        Self {
            doc,
            state: GraphicsState::default(),
            stack: Vec::new(),
            stack_floor: 0,
            text_matrix: Matrix::identity(),
            line_matrix: Matrix::identity(),
            resources: Vec::new(),
            descend_forms: true,
            active_forms: Vec::new(),
            form_depth: 0,
            span: TextSpan::default(),
            font_cache: HashMap::new(),
        }
    }

    /// Enable or disable entering form XObjects on `Do`.
    pub fn with_form_descent(mut self, descend: bool) -> Self {
        self.descend_forms = descend;
        self
    }

    pub fn document(&self) -> &'a LopdfDocument {
        self.doc
    }

    /// Current graphics state.
    pub fn state(&self) -> &GraphicsState {
        &self.state
    }

    /// Current text matrix.
    pub fn text_matrix(&self) -> &Matrix {
        &self.text_matrix
    }

    /// Depth of the `q` stack.
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    fn reset(&mut self, resources: Option<&'a Dictionary>) {
        self.state = GraphicsState::default();
        self.stack.clear();
        self.stack_floor = 0;
        self.text_matrix = Matrix::identity();
        self.line_matrix = Matrix::identity();
        self.resources = vec![resources];
        self.active_forms.clear();
        self.form_depth = 0;
        self.span = TextSpan::default();
    }

    /// Reset to the page's initial state and decode its content.
    ///
    /// Callers then feed each operation to [`process_operation`](Self::process_operation).
    pub fn begin_page(&mut self, page_id: ObjectId) -> Result<Vec<Operation>> {
        self.reset(page_resources(self.doc, page_id));
        let content = page_content(self.doc, page_id)?;
        decode_operations(&content)
    }

    /// Interpret a whole page.
    pub fn process_page(
        &mut self,
        page_id: ObjectId,
        handler: &mut dyn ContentHandler,
    ) -> Result<()> {
        let operations = self.begin_page(page_id)?;
        for op in &operations {
            self.process_operation(op, handler)?;
        }
        Ok(())
    }

    /// Interpret a standalone form stream such as an annotation appearance.
    ///
    /// The page's resources apply when the stream has none of its own.
    pub fn process_form_stream(
        &mut self,
        stream: &'a Stream,
        page_id: ObjectId,
        handler: &mut dyn ContentHandler,
    ) -> Result<()> {
        self.reset(page_resources(self.doc, page_id));
        self.process_form(stream, None, handler)
    }

    /// Execute one operation and report its text span, if it showed text.
    pub fn process_operation(
        &mut self,
        op: &Operation,
        handler: &mut dyn ContentHandler,
    ) -> Result<TextSpan> {
        let outer = std::mem::take(&mut self.span);
        self.execute(op, handler)?;
        Ok(std::mem::replace(&mut self.span, outer))
    }

    fn execute(&mut self, op: &Operation, handler: &mut dyn ContentHandler) -> Result<()> {
        let operands = &op.operands;
        match op.operator.as_str() {
            // graphics state
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if self.stack.len() > self.stack_floor {
                    if let Some(saved) = self.stack.pop() {
                        self.state = saved;
                    }
                } else {
                    log::debug!("Ignoring unbalanced Q");
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.multiply(&self.state.ctm);
                }
            }
            "w" => {
                if let Some(width) = number(operands, 0) {
                    self.state.line_width = width;
                }
            }

            // colour
            "g" => self.state.fill_color = device_color(ColorSpace::DeviceGray, operands),
            "rg" => self.state.fill_color = device_color(ColorSpace::DeviceRgb, operands),
            "k" => self.state.fill_color = device_color(ColorSpace::DeviceCmyk, operands),
            "G" => self.state.stroke_color = device_color(ColorSpace::DeviceGray, operands),
            "RG" => self.state.stroke_color = device_color(ColorSpace::DeviceRgb, operands),
            "K" => self.state.stroke_color = device_color(ColorSpace::DeviceCmyk, operands),
            "cs" => {
                if let Some(space) = self.color_space_operand(operands) {
                    self.state.fill_color = space.initial_color();
                }
            }
            "CS" => {
                if let Some(space) = self.color_space_operand(operands) {
                    self.state.stroke_color = space.initial_color();
                }
            }
            "sc" | "scn" => {
                let space = self.state.fill_color.space.clone();
                self.state.fill_color = device_color(space, operands);
            }
            "SC" | "SCN" => {
                let space = self.state.stroke_color.space.clone();
                self.state.stroke_color = device_color(space, operands);
            }

            // text objects and positioning
            "BT" => {
                self.text_matrix = Matrix::identity();
                self.line_matrix = Matrix::identity();
            }
            "ET" => {}
            "Td" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    self.move_text_position(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (number(operands, 0), number(operands, 1)) {
                    self.state.text.leading = -ty;
                    self.move_text_position(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.text_matrix = m;
                    self.line_matrix = m;
                }
            }
            "T*" => self.next_line(),

            // text state
            "Tc" => set_number(&mut self.state.text.char_spacing, operands),
            "Tw" => set_number(&mut self.state.text.word_spacing, operands),
            "TL" => set_number(&mut self.state.text.leading, operands),
            "Ts" => set_number(&mut self.state.text.rise, operands),
            "Tz" => {
                if let Some(scale) = number(operands, 0) {
                    self.state.text.horizontal_scaling = scale / 100.0;
                }
            }
            "Tr" => {
                if let Some(mode) = operands.first().and_then(|o| o.as_i64().ok()) {
                    self.state.text.render_mode = mode;
                }
            }
            "Tf" => {
                if let (Some(name), Some(size)) = (
                    operands.first().and_then(|o| o.as_name().ok()),
                    number(operands, 1),
                ) {
                    self.state.text.font = self.load_font(name);
                    self.state.text.font_size = size;
                }
            }

            // text showing
            "Tj" => {
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    self.show_string(bytes, handler);
                }
            }
            "'" => {
                self.next_line();
                if let Some(bytes) = operands.first().and_then(|o| o.as_str().ok()) {
                    self.show_string(bytes, handler);
                }
            }
            "\"" => {
                set_number(&mut self.state.text.word_spacing, operands);
                if let Some(tc) = number(operands, 1) {
                    self.state.text.char_spacing = tc;
                }
                self.next_line();
                if let Some(bytes) = operands.get(2).and_then(|o| o.as_str().ok()) {
                    self.show_string(bytes, handler);
                }
            }
            "TJ" => {
                if let Some(items) = operands.first().and_then(|o| o.as_array().ok()) {
                    for item in items {
                        match item {
                            Object::String(bytes, _) => self.show_string(bytes, handler),
                            Object::Integer(_) | Object::Real(_) => {
                                let adjustment = item.as_float().unwrap_or(0.0);
                                let text = &self.state.text;
                                let tx = -adjustment / 1000.0
                                    * text.font_size
                                    * text.horizontal_scaling;
                                self.text_matrix =
                                    Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
                            }
                            _ => {}
                        }
                    }
                }
            }

            // XObjects
            "Do" => {
                if let Some(name) = operands.first().and_then(|o| o.as_name().ok()) {
                    self.do_xobject(name, handler)?;
                }
            }

            _ => {}
        }
        Ok(())
    }

    fn move_text_position(&mut self, tx: f32, ty: f32) {
        self.line_matrix = Matrix::translate(tx, ty).multiply(&self.line_matrix);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_text_position(0.0, -leading);
    }

    fn show_string(&mut self, bytes: &[u8], handler: &mut dyn ContentHandler) {
        let ctm = self.state.ctm;
        if self.span.start.is_none() {
            self.span.start = Some(self.text_matrix.multiply(&ctm));
        }

        if let Some(font) = self.state.text.font.clone() {
            let encoding = font.dict().get_font_encoding(self.doc).ok();
            let text = self.state.text.clone();
            let fs = text.font_size;
            let th = text.horizontal_scaling;
            let parameters = Matrix::new(fs * th, 0.0, 0.0, fs, 0.0, text.rise);

            for (code, code_bytes) in font.codes(bytes) {
                let w0 = font.text_width(code);
                let text_to_page = self.text_matrix.multiply(&ctm);
                let unicode = encoding
                    .as_ref()
                    .and_then(|enc| LopdfDocument::decode_text(enc, code_bytes).ok())
                    .unwrap_or_else(|| font.fallback_decode(code_bytes));

                handler.show_glyph(&Glyph {
                    code,
                    unicode,
                    text_rendering_matrix: parameters.multiply(&text_to_page),
                    width: w0 * fs * th * text_to_page.scaling_factor_x(),
                    font_size: fs,
                    font: Rc::clone(&font),
                    fill_color: self.state.fill_color.clone(),
                    render_mode: text.render_mode,
                });

                let word_spacing = if code_bytes.len() == 1 && code == 32 {
                    text.word_spacing
                } else {
                    0.0
                };
                let tx = (w0 * fs + text.char_spacing + word_spacing) * th;
                self.text_matrix = Matrix::translate(tx, 0.0).multiply(&self.text_matrix);
            }
        } else {
            log::debug!("Text shown without a font; skipping {} bytes", bytes.len());
        }
        handler.show_text_end();

        self.span.end = Some(self.text_matrix.multiply(&ctm));
    }

    fn current_resources(&self) -> Option<&'a Dictionary> {
        self.resources.last().copied().flatten()
    }

    /// Look up `/category /name` in the current resources.
    fn lookup_resource(&self, category: &[u8], name: &[u8]) -> Option<&'a Object> {
        let resources = self.current_resources()?;
        let doc = self.doc;
        let category = resolve_dict(doc, resources.get(category).ok()?)?;
        category.get(name).ok()
    }

    fn load_font(&mut self, name: &[u8]) -> Option<Rc<PdfFont>> {
        let obj = match self.lookup_resource(b"Font", name) {
            Some(obj) => obj,
            None => {
                log::debug!("Font /{} not found", String::from_utf8_lossy(name));
                return None;
            }
        };
        let id = obj.as_reference().ok();
        if let Some(font) = id.and_then(|id| self.font_cache.get(&id)) {
            return Some(Rc::clone(font));
        }
        let dict = resolve_dict(self.doc, obj)?;
        let font = Rc::new(PdfFont::load(self.doc, name, dict));
        if let Some(id) = id {
            self.font_cache.insert(id, Rc::clone(&font));
        }
        Some(font)
    }

    fn color_space_operand(&self, operands: &[Object]) -> Option<ColorSpace> {
        let name = operands.first()?.as_name().ok()?;
        let space = ColorSpace::from_name(name);
        if !matches!(space, ColorSpace::Other(_)) {
            return Some(space);
        }
        // named resource: a family name or an array starting with one
        let resource = self
            .lookup_resource(b"ColorSpace", name)
            .and_then(|o| resolve(self.doc, o));
        let family = match resource {
            Some(Object::Name(family)) => family.as_slice(),
            Some(Object::Array(array)) => array.first()?.as_name().ok()?,
            _ => return Some(space),
        };
        Some(ColorSpace::from_name(family))
    }

    fn do_xobject(&mut self, name: &[u8], handler: &mut dyn ContentHandler) -> Result<()> {
        let Some(obj) = self.lookup_resource(b"XObject", name) else {
            log::debug!("XObject /{} not found", String::from_utf8_lossy(name));
            return Ok(());
        };
        let id = obj.as_reference().ok();
        let Some(Object::Stream(stream)) = resolve(self.doc, obj) else {
            return Ok(());
        };

        let subtype = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok());
        match subtype {
            Some(b"Image") => {
                handler.draw_image(
                    self.doc,
                    &ImageDraw {
                        name,
                        id,
                        stream,
                        ctm: self.state.ctm,
                    },
                );
            }
            Some(b"Form") if self.descend_forms => self.process_form(stream, id, handler)?,
            _ => {}
        }
        Ok(())
    }

    fn process_form(
        &mut self,
        stream: &'a Stream,
        id: Option<ObjectId>,
        handler: &mut dyn ContentHandler,
    ) -> Result<()> {
        if self.form_depth >= MAX_FORM_DEPTH {
            log::warn!("Form XObjects nested deeper than {}; skipping", MAX_FORM_DEPTH);
            return Ok(());
        }
        if let Some(id) = id {
            if self.active_forms.contains(&id) {
                log::warn!("Form XObject {:?} draws itself; skipping", id);
                return Ok(());
            }
        }

        let content = stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone());
        let operations = decode_operations(&content)?;

        // enter
        self.stack.push(self.state.clone());
        let saved_floor = self.stack_floor;
        self.stack_floor = self.stack.len();
        let saved_text = (self.text_matrix, self.line_matrix);
        if let Some(matrix) = stream
            .dict
            .get(b"Matrix")
            .ok()
            .and_then(|o| resolve(self.doc, o))
            .and_then(|o| o.as_array().ok())
            .and_then(|a| Matrix::from_operands(a))
        {
            self.state.ctm = matrix.multiply(&self.state.ctm);
        }
        let form_resources = stream
            .dict
            .get(b"Resources")
            .ok()
            .and_then(|o| resolve_dict(self.doc, o))
            .or_else(|| self.current_resources());
        self.resources.push(form_resources);
        if let Some(id) = id {
            self.active_forms.push(id);
        }
        self.form_depth += 1;

        let result = operations
            .iter()
            .try_for_each(|op| self.execute(op, handler));

        // leave, even when the form content failed
        self.form_depth -= 1;
        if id.is_some() {
            self.active_forms.pop();
        }
        self.resources.pop();
        self.stack.truncate(self.stack_floor);
        self.stack_floor = saved_floor;
        if let Some(saved) = self.stack.pop() {
            self.state = saved;
        }
        (self.text_matrix, self.line_matrix) = saved_text;

        result
    }
}

/// Decode content stream bytes into operations.
pub fn decode_operations(content: &[u8]) -> Result<Vec<Operation>> {
    Content::decode(content)
        .map(|c| c.operations)
        .map_err(|e| Error::ContentStream(e.to_string()))
}

fn number(operands: &[Object], index: usize) -> Option<f32> {
    operands.get(index).and_then(|o| o.as_float().ok())
}

fn set_number(target: &mut f32, operands: &[Object]) {
    if let Some(value) = number(operands, 0) {
        *target = value;
    }
}

fn device_color(space: ColorSpace, operands: &[Object]) -> Color {
    Color {
        space,
        components: operands.iter().filter_map(|o| o.as_float().ok()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    #[derive(Default)]
    struct Recorder {
        glyphs: Vec<Glyph>,
        images: Vec<(String, Matrix)>,
    }

    impl ContentHandler for Recorder {
        fn show_glyph(&mut self, glyph: &Glyph) {
            self.glyphs.push(glyph.clone());
        }

        fn draw_image(&mut self, _doc: &LopdfDocument, image: &ImageDraw<'_>) {
            self.images
                .push((String::from_utf8_lossy(image.name).to_string(), image.ctm));
        }
    }

    fn page_with(content: &[u8], resources: Dictionary) -> (LopdfDocument, ObjectId) {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => resources,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        (doc, page_id)
    }

    fn font_resources() -> Dictionary {
        dictionary! {
            "Font" => dictionary! {
                "F1" => dictionary! {
                    "Type" => "Font",
                    "Subtype" => "Type1",
                    "BaseFont" => "Helvetica",
                    "FirstChar" => 65,
                    "Widths" => vec![600.into(), 600.into(), 600.into()],
                },
            },
        }
    }

    #[test]
    fn test_glyph_positions_advance() {
        let (doc, page_id) = page_with(b"BT /F1 10 Tf 100 700 Td (ABC) Tj ET", font_resources());
        let mut recorder = Recorder::default();
        StreamEngine::new(&doc)
            .process_page(page_id, &mut recorder)
            .unwrap();

        assert_eq!(recorder.glyphs.len(), 3);
        let xs: Vec<f32> = recorder
            .glyphs
            .iter()
            .map(|g| g.text_rendering_matrix.e)
            .collect();
        assert!((xs[0] - 100.0).abs() < 1e-3);
        assert!((xs[1] - 106.0).abs() < 1e-3);
        assert!((xs[2] - 112.0).abs() < 1e-3);
        assert_eq!(recorder.glyphs[0].text_rendering_matrix.f, 700.0);
        assert!((recorder.glyphs[0].width - 6.0).abs() < 1e-3);
    }

    #[test]
    fn test_tj_adjustment_and_ctm() {
        let (doc, page_id) = page_with(
            b"q 2 0 0 2 0 0 cm BT /F1 10 Tf [(A) -1000 (B)] TJ ET Q",
            font_resources(),
        );
        let mut recorder = Recorder::default();
        StreamEngine::new(&doc)
            .process_page(page_id, &mut recorder)
            .unwrap();

        // A advances 6, the adjustment another 10, all doubled by the CTM
        assert!((recorder.glyphs[1].text_rendering_matrix.e - 32.0).abs() < 1e-3);
        assert_eq!(recorder.glyphs[1].text_rendering_matrix.a, 20.0);
    }

    #[test]
    fn test_colors_and_stack() {
        let (doc, page_id) = page_with(b"1 0 0 rg q 0 0 1 0 k Q", Dictionary::new());
        let mut engine = StreamEngine::new(&doc);
        let operations = engine.begin_page(page_id).unwrap();
        for (i, op) in operations.iter().enumerate() {
            engine.process_operation(op, &mut ()).unwrap();
            if i == 2 {
                assert_eq!(engine.state().fill_color, Color::cmyk(0.0, 0.0, 1.0, 0.0));
            }
        }
        assert_eq!(engine.state().fill_color, Color::rgb(1.0, 0.0, 0.0));
        assert_eq!(engine.stack_depth(), 0);
    }

    #[test]
    fn test_named_color_space() {
        let resources = dictionary! {
            "ColorSpace" => dictionary! {
                "CS0" => vec![Object::Name(b"ICCBased".to_vec()), Object::Integer(0)],
                "CS1" => "DeviceRGB",
            },
        };
        let (doc, page_id) = page_with(b"/CS0 cs 0.5 sc", resources);
        let mut engine = StreamEngine::new(&doc);
        engine.process_page(page_id, &mut ()).unwrap();
        assert_eq!(
            engine.state().fill_color.space,
            ColorSpace::Other("ICCBased".to_string())
        );

        let resources = dictionary! {
            "ColorSpace" => dictionary! { "CS1" => "DeviceRGB" },
        };
        let (doc, page_id) = page_with(b"/CS1 cs 0 1 0 sc", resources);
        let mut engine = StreamEngine::new(&doc);
        engine.process_page(page_id, &mut ()).unwrap();
        assert_eq!(engine.state().fill_color, Color::rgb(0.0, 1.0, 0.0));
    }

    #[test]
    fn test_text_span_reported() {
        let (doc, page_id) = page_with(b"BT /F1 10 Tf 50 60 Td (AB) Tj ET", font_resources());
        let mut engine = StreamEngine::new(&doc);
        let operations = engine.begin_page(page_id).unwrap();
        let mut spans = Vec::new();
        for op in &operations {
            spans.push(engine.process_operation(op, &mut ()).unwrap());
        }
        let show = &spans[3];
        assert_eq!(show.start.unwrap().translate_x(), 50.0);
        assert!((show.end.unwrap().translate_x() - 62.0).abs() < 1e-3);
        assert_eq!(spans[2], TextSpan::default());
    }

    #[test]
    fn test_images_inside_forms() {
        let mut doc = LopdfDocument::with_version("1.5");
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0x80],
        ));
        let form_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
                "Matrix" => vec![(-1).into(), 0.into(), 0.into(), 1.into(), 0.into(), 0.into()],
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            },
            b"q 10 0 0 10 0 0 cm /Im0 Do Q".to_vec(),
        ));
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"/Fm0 Do".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! { "XObject" => dictionary! { "Fm0" => form_id } },
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );

        let mut recorder = Recorder::default();
        StreamEngine::new(&doc)
            .process_page(page_id, &mut recorder)
            .unwrap();
        assert_eq!(recorder.images.len(), 1);
        assert_eq!(recorder.images[0].0, "Im0");
        assert_eq!(recorder.images[0].1.scale_x(), -10.0);

        let mut recorder = Recorder::default();
        StreamEngine::new(&doc)
            .with_form_descent(false)
            .process_page(page_id, &mut recorder)
            .unwrap();
        assert!(recorder.images.is_empty());
    }
}
