//! Content stream processing: interpretation, rewriting and drawing.

mod canvas;
mod editor;
mod engine;
mod fonts;
pub(crate) mod image;
mod recipes;
mod recolor;

pub use canvas::{AppendMode, PageCanvas};
pub use editor::{ContentStreamEditor, ContentWriter, EditFilter, PassThrough};
pub use engine::{
    decode_operations, is_text_showing, ContentHandler, Glyph, GraphicsState, ImageDraw,
    StreamEngine, TextSpan, TextState, TEXT_SHOWING_OPERATORS,
};
pub use fonts::PdfFont;
pub use image::{image_dimensions, ImageXObject};
pub(crate) use image::parse_jpeg;
pub use recipes::{
    add_centered_image, add_centered_image_flipped, add_clipped_image, center_box_around_box,
    trim_and_center_page, trim_page,
};
pub use recolor::{
    make_text_black, make_text_black_in_areas, remove_alternate_annotations_and_blacken,
    BlackTextFilter,
};
