//! Extraction of images and text from existing documents.

mod images;
mod text;

pub use images::{
    annotation_appearances, encode_png, extract_annotation_images, extract_page_images,
    extract_resource_images, file_name, flip_marker, image_color_space, image_from_stream,
    AnnotationImage, ImageWriter, PageImage,
};
pub use text::{
    normalize_line, remove_to_unicode_maps, Region, TextPosition, TextStripper,
    TextStripperByArea,
};
