//! Layout and appearance of a visible signature.

use std::path::Path;

use lopdf::{dictionary, Dictionary, Document as LopdfDocument, ObjectId, Stream};

use crate::content::{image_dimensions, ImageXObject};
use crate::document::PdfDocument;
use crate::error::Result;
use crate::model::{Matrix, Rectangle};

/// Placeholder size reserved for the CMS signature when none is preferred.
pub const SIGNATURE_DEFAULT_LENGTH: usize = 0x2500;

/// Places a signature image on a page.
///
/// Coordinates are measured from the top-left corner of the page, sizes are
/// the image's pixel size scaled by [`zoom`](Self::zoom).
#[derive(Debug, Clone)]
pub struct VisibleSignDesigner {
    image: Vec<u8>,
    page: u32,
    x_axis: f32,
    y_axis: f32,
    page_width: f32,
    page_height: f32,
    rotation: i64,
    image_width: f32,
    image_height: f32,
    bbox_size: (i32, i32),
    transform: Matrix,
}

impl VisibleSignDesigner {
    /// Designer for a new signature field on the 1-based `page` of `doc`.
    pub fn new(doc: &PdfDocument, image: Vec<u8>, page: u32) -> Result<Self> {
        let mut designer = Self::for_existing_field(image)?;
        let media = doc.media_box(page)?;
        designer.page = page;
        designer.page_width = media.width();
        designer.page_height = media.height();
        designer.rotation = doc.rotation(page)?;
        Ok(designer)
    }

    /// Designer for a new field, reading the image from a file.
    pub fn from_file<P: AsRef<Path>>(doc: &PdfDocument, image: P, page: u32) -> Result<Self> {
        Self::new(doc, std::fs::read(image)?, page)
    }

    /// Designer that only supplies an appearance; the field keeps its own position.
    pub fn for_existing_field(image: Vec<u8>) -> Result<Self> {
        let (width, height) = image_dimensions(&image)?;
        Ok(Self {
            image,
            page: 1,
            x_axis: 0.0,
            y_axis: 0.0,
            page_width: 0.0,
            page_height: 0.0,
            rotation: 0,
            image_width: width as f32,
            image_height: height as f32,
            bbox_size: (width as i32, height as i32),
            transform: Matrix::identity(),
        })
    }

    pub fn x_axis(mut self, x: f32) -> Self {
        self.x_axis = x;
        self
    }

    pub fn y_axis(mut self, y: f32) -> Self {
        self.y_axis = y;
        self
    }

    /// Grow (positive) or shrink (negative) the image by `percent`.
    pub fn zoom(mut self, percent: f32) -> Self {
        self.image_height += self.image_height * percent / 100.0;
        self.image_width += self.image_width * percent / 100.0;
        self.bbox_size = (self.image_width as i32, self.image_height as i32);
        self
    }

    /// Keep the signature upright on rotated pages.
    ///
    /// Moves the position into the rotated coordinate system and turns the
    /// appearance with the page. Call after positioning and zooming.
    pub fn adjust_for_rotation(mut self) -> Self {
        let (w, h) = (self.image_width, self.image_height);
        match self.rotation {
            90 => {
                let x = self.x_axis;
                self.x_axis = self.y_axis;
                self.y_axis = self.page_height - x - w;
                self.transform = Matrix::new(0.0, h / w, -w / h, 0.0, w, 0.0);
                self.image_width = h;
                self.image_height = w;
            }
            180 => {
                self.x_axis = self.page_width - self.x_axis - w;
                self.y_axis = self.page_height - self.y_axis - h;
                self.transform = Matrix::new(-1.0, 0.0, 0.0, -1.0, w, h);
            }
            270 => {
                let x = self.x_axis;
                self.x_axis = self.page_width - self.y_axis - h;
                self.y_axis = x;
                self.transform = Matrix::new(0.0, -h / w, w / h, 0.0, 0.0, h);
                self.image_width = h;
                self.image_height = w;
            }
            _ => {}
        }
        self
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn width(&self) -> f32 {
        self.image_width
    }

    pub fn height(&self) -> f32 {
        self.image_height
    }

    pub fn rotation(&self) -> i64 {
        self.rotation
    }

    pub fn transform(&self) -> &Matrix {
        &self.transform
    }

    /// Widget rectangle in page space.
    pub fn rectangle(&self) -> Rectangle {
        Rectangle::from_corners(
            self.x_axis,
            self.page_height - self.y_axis - self.image_height,
            self.x_axis + self.image_width,
            self.page_height - self.y_axis,
        )
    }

    /// Bounding box of the appearance forms, before rotation.
    pub fn bbox(&self) -> Rectangle {
        let (w, h) = self.bbox_size;
        Rectangle::from_corners(0.0, 0.0, w as f32, h as f32).normalized()
    }

    /// Build the appearance forms in `doc` and return the outer form.
    ///
    /// The outer form carries the rotation and draws an inner form made of
    /// an empty background layer `n0` and the image layer `n2`.
    pub fn build_appearance(&self, doc: &mut LopdfDocument) -> Result<ObjectId> {
        let image = ImageXObject::from_bytes(doc, &self.image, "signature")?;
        let bbox = self.bbox();

        let image_form = form(
            &bbox,
            None,
            dictionary! { "img0" => image.object_id() },
            format!("q {} 0 0 {} 0 0 cm /img0 Do Q\n", bbox.width(), bbox.height()),
        );
        let image_form = doc.add_object(image_form);

        let background = form(
            &Rectangle::from_corners(0.0, 0.0, 100.0, 100.0),
            None,
            Dictionary::new(),
            "% DSBlank\n".to_string(),
        );
        let background = doc.add_object(background);

        let inner = form(
            &bbox,
            None,
            dictionary! { "n0" => background, "n2" => image_form },
            "q 1 0 0 1 0 0 cm /n0 Do Q\nq 1 0 0 1 0 0 cm /n2 Do Q\n".to_string(),
        );
        let inner = doc.add_object(inner);

        let holder = form(
            &bbox,
            Some(&self.transform),
            dictionary! { "FRM" => inner },
            "q 1 0 0 1 0 0 cm /FRM Do Q\n".to_string(),
        );
        Ok(doc.add_object(holder))
    }
}

fn form(
    bbox: &Rectangle,
    matrix: Option<&Matrix>,
    xobjects: Dictionary,
    content: String,
) -> Stream {
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => bbox.to_array(),
    };
    if let Some(matrix) = matrix {
        dict.set("Matrix", matrix.to_operands());
    }
    let mut resources = Dictionary::new();
    if !xobjects.is_empty() {
        resources.set("XObject", xobjects);
    }
    dict.set("Resources", resources);
    Stream::new(dict, content.into_bytes())
}

/// Signer details and placement of a signature.
#[derive(Debug, Clone)]
pub struct VisibleSigProperties {
    signer_name: String,
    signer_location: String,
    signature_reason: String,
    preferred_size: usize,
    page: u32,
    visual_sign_enabled: bool,
    designer: Option<VisibleSignDesigner>,
}

impl Default for VisibleSigProperties {
    fn default() -> Self {
        Self {
            signer_name: String::new(),
            signer_location: String::new(),
            signature_reason: String::new(),
            preferred_size: 0,
            page: 1,
            visual_sign_enabled: false,
            designer: None,
        }
    }
}

impl VisibleSigProperties {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = name.into();
        self
    }

    pub fn signer_location(mut self, location: impl Into<String>) -> Self {
        self.signer_location = location.into();
        self
    }

    pub fn signature_reason(mut self, reason: impl Into<String>) -> Self {
        self.signature_reason = reason.into();
        self
    }

    /// Placeholder bytes for the signature, 0 for the default.
    pub fn preferred_size(mut self, size: usize) -> Self {
        self.preferred_size = size;
        self
    }

    /// 1-based page of the widget.
    pub fn page(mut self, page: u32) -> Self {
        self.page = page;
        self
    }

    pub fn visual_sign_enabled(mut self, enabled: bool) -> Self {
        self.visual_sign_enabled = enabled;
        self
    }

    pub fn designer(mut self, designer: Option<VisibleSignDesigner>) -> Self {
        self.designer = designer;
        self
    }

    pub fn get_signer_name(&self) -> &str {
        &self.signer_name
    }

    pub fn get_signer_location(&self) -> &str {
        &self.signer_location
    }

    pub fn get_signature_reason(&self) -> &str {
        &self.signature_reason
    }

    pub fn get_page(&self) -> u32 {
        self.page
    }

    pub fn is_visual_sign_enabled(&self) -> bool {
        self.visual_sign_enabled
    }

    pub fn get_designer(&self) -> Option<&VisibleSignDesigner> {
        self.designer.as_ref()
    }

    pub fn signature_options(&self) -> SignatureOptions {
        SignatureOptions::new()
            .with_preferred_signature_size(self.preferred_size)
            .with_page(self.page)
    }
}

/// Placement options applied when the signature is added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureOptions {
    preferred_signature_size: usize,
    page: u32,
}

impl Default for SignatureOptions {
    fn default() -> Self {
        Self {
            preferred_signature_size: SIGNATURE_DEFAULT_LENGTH,
            page: 1,
        }
    }
}

impl SignatureOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes reserved for the signature; 0 keeps the default.
    pub fn with_preferred_signature_size(mut self, size: usize) -> Self {
        if size > 0 {
            self.preferred_signature_size = size;
        }
        self
    }

    /// 1-based page of the widget.
    pub fn with_page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn preferred_signature_size(&self) -> usize {
        self.preferred_signature_size
    }

    pub fn page(&self) -> u32 {
        self.page
    }
}
