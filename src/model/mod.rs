//! Value types shared by the content, extraction and signing modules.

mod color;
mod geometry;
mod resource;

pub use color::{Color, ColorSpace};
pub use geometry::{Matrix, Rectangle};
pub use resource::{ExtractedImage, ImageColorSpace, ImageFormat};
