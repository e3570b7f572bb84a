//! Page-level drawing recipes: placing images and trimming pages.

use lopdf::{Document as LopdfDocument, Object, ObjectId};

use super::canvas::{AppendMode, PageCanvas};
use super::image::ImageXObject;
use crate::document::crop_box_of;
use crate::error::Result;
use crate::model::{Matrix, Rectangle};

/// Draw `image` at its natural size centred in the crop box.
pub fn add_centered_image(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    image: &ImageXObject,
) -> Result<()> {
    let crop = crop_box_of(doc, page_id);
    let (w, h) = (image.width() as f32, image.height() as f32);
    let x = (crop.width() - w) / 2.0 + crop.llx;
    let y = (crop.height() - h) / 2.0 + crop.lly;

    let mut canvas = PageCanvas::new(doc, page_id);
    canvas.draw_image(image, x, y, w, h);
    canvas.finish()
}

/// Like [`add_centered_image`] but first flips the coordinate system to a
/// top-left origin with `[1 0 0 -1 llx ury]`.
///
/// Offsets are not corrected for the flip, so the image comes out mirrored
/// vertically.
pub fn add_centered_image_flipped(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    image: &ImageXObject,
) -> Result<()> {
    let crop = crop_box_of(doc, page_id);
    let (w, h) = (image.width() as f32, image.height() as f32);
    let x = (crop.width() - w) / 2.0;
    let y = (crop.height() - h) / 2.0;

    let mut canvas = PageCanvas::new(doc, page_id);
    canvas
        .transform(&Matrix::new(1.0, 0.0, 0.0, -1.0, crop.llx, crop.ury))
        .draw_image(image, x, y, w, h);
    canvas.finish()
}

/// Replace the page content with `image` clipped to a diamond, whose outline
/// is stroked in `frame_rgb` with `line_width`.
pub fn add_clipped_image(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    image: &ImageXObject,
    frame_rgb: (u8, u8, u8),
    line_width: f32,
) -> Result<()> {
    let crop = crop_box_of(doc, page_id);
    let (w, h) = (image.width() as f32, image.height() as f32);
    let (x0, y0) = (crop.llx, crop.lly);

    let mut canvas = PageCanvas::with_mode(doc, page_id, AppendMode::Overwrite, true, false);
    canvas
        .set_stroking_rgb8(frame_rgb.0, frame_rgb.1, frame_rgb.2)
        .set_line_width(line_width)
        .move_to(x0, y0 + h / 2.0)
        .line_to(x0 + w / 3.0, y0 + 2.0 * h / 3.0)
        .line_to(x0 + w, y0 + h / 2.0)
        .line_to(x0 + w / 3.0, y0 + h / 3.0)
        .close_path()
        .clip()
        .stroke()
        .draw_image(image, x0, y0, w, h);
    canvas.finish()
}

/// A `width` × `height` rectangle centred on `inner`.
pub fn center_box_around_box(inner: &Rectangle, width: f32, height: f32) -> Rectangle {
    let horizontal_margin = (width - inner.width()) / 2.0;
    let vertical_margin = (height - inner.height()) / 2.0;
    Rectangle::new(
        inner.llx - horizontal_margin,
        inner.lly - vertical_margin,
        width,
        height,
    )
}

/// Paint white over everything in `outer` that lies outside `keep`.
fn cover_outside(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    outer: &Rectangle,
    keep: &Rectangle,
) -> Result<()> {
    let mut canvas = PageCanvas::with_mode(doc, page_id, AppendMode::Append, false, true);
    canvas
        .set_non_stroking_gray(1.0)
        .add_rectangle(outer)
        .add_rectangle(keep)
        .fill_even_odd();
    canvas.finish()
}

/// Hide page content outside `keep`.
pub fn trim_page(doc: &mut LopdfDocument, page_id: ObjectId, keep: &Rectangle) -> Result<()> {
    let crop = crop_box_of(doc, page_id);
    cover_outside(doc, page_id, &crop, keep)
}

/// Hide content outside `keep`, then move the page boxes so that `keep`
/// sits in the middle of a page of the original crop box size.
pub fn trim_and_center_page(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    keep: &Rectangle,
) -> Result<Rectangle> {
    let crop = crop_box_of(doc, page_id);
    let centered = center_box_around_box(keep, crop.width(), crop.height());
    cover_outside(doc, page_id, &centered, keep)?;

    let page = doc.get_dictionary_mut(page_id)?;
    page.set("MediaBox", Object::Array(centered.to_array()));
    page.set("CropBox", Object::Array(centered.to_array()));
    Ok(centered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::engine::decode_operations;
    use crate::content::image::tests::jpeg_header;
    use crate::document::page_content;
    use lopdf::{dictionary, Stream};

    fn letter_page() -> (LopdfDocument, ObjectId) {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"0 0 m".to_vec()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {},
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            }),
        );
        (doc, page_id)
    }

    fn cm_operands(doc: &LopdfDocument, page_id: ObjectId) -> Vec<Matrix> {
        let content = page_content(doc, page_id).unwrap();
        decode_operations(&content)
            .unwrap()
            .iter()
            .filter(|o| o.operator == "cm")
            .filter_map(|o| Matrix::from_operands(&o.operands))
            .collect()
    }

    #[test]
    fn test_center_box_around_box() {
        let inner = Rectangle::new(200.0, 300.0, 300.0, 400.0);
        let outer = center_box_around_box(&inner, 612.0, 792.0);
        assert_eq!(outer.llx, 44.0);
        assert_eq!(outer.lly, 104.0);
        assert_eq!(outer.width(), 612.0);
    }

    #[test]
    fn test_centered_image_position() {
        let (mut doc, page_id) = letter_page();
        let image = ImageXObject::from_bytes(&mut doc, &jpeg_header(100, 50, 3), "pic").unwrap();
        add_centered_image(&mut doc, page_id, &image).unwrap();
        let matrices = cm_operands(&doc, page_id);
        assert_eq!(matrices, vec![Matrix::new(100.0, 0.0, 0.0, 50.0, 256.0, 371.0)]);
    }

    #[test]
    fn test_flipped_variant_applies_mirror_first() {
        let (mut doc, page_id) = letter_page();
        let image = ImageXObject::from_bytes(&mut doc, &jpeg_header(100, 50, 3), "pic").unwrap();
        add_centered_image_flipped(&mut doc, page_id, &image).unwrap();
        let matrices = cm_operands(&doc, page_id);
        assert_eq!(matrices[0], Matrix::new(1.0, 0.0, 0.0, -1.0, 0.0, 792.0));
        assert_eq!(matrices.len(), 2);
    }

    #[test]
    fn test_trim_and_center_sets_boxes() {
        let (mut doc, page_id) = letter_page();
        let keep = Rectangle::new(200.0, 300.0, 300.0, 400.0);
        let centered = trim_and_center_page(&mut doc, page_id, &keep).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        let media = Rectangle::from_array(media_box).unwrap();
        assert_eq!(media, centered);

        let content = page_content(&doc, page_id).unwrap();
        let operators: Vec<String> = decode_operations(&content)
            .unwrap()
            .into_iter()
            .map(|o| o.operator)
            .collect();
        assert_eq!(operators, vec!["q", "m", "Q", "g", "re", "re", "f*"]);
    }

    #[test]
    fn test_clipped_image_overwrites_content() {
        let (mut doc, page_id) = letter_page();
        let image = ImageXObject::from_bytes(&mut doc, &jpeg_header(90, 60, 1), "pic").unwrap();
        add_clipped_image(&mut doc, page_id, &image, (25, 200, 25), 4.0).unwrap();
        let content = page_content(&doc, page_id).unwrap();
        let operators: Vec<String> = decode_operations(&content)
            .unwrap()
            .into_iter()
            .map(|o| o.operator)
            .collect();
        assert_eq!(operators[..3], ["RG", "w", "m"]);
        assert!(operators.contains(&"W".to_string()));
        assert_eq!(operators.last().map(String::as_str), Some("Q"));
    }
}
