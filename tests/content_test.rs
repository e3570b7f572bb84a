//! Content rewriting recipes applied to whole documents.

mod common;

use common::{
    calibrated_text_document, first_page, image_document, line, operators, png_image, save,
    text_document,
};
use lopdf::Document;
use pdfrecipe::{
    add_centered_image, make_text_black, trim_and_center_page, trim_page, ImageXObject, PdfDocument,
    Rectangle, TextOptions, TextStripper,
};

#[test]
fn test_black_text_survives_save() {
    let mut doc = text_document(&[line(72.0, 700.0, "Colored")]);
    make_text_black(&mut doc).unwrap();

    let bytes = save(&mut doc);
    let reloaded = Document::load_mem(&bytes).unwrap();
    let ops = operators(&reloaded);

    let tj = ops.iter().position(|op| op.operator == "Tj").unwrap();
    let gray = ops[..tj]
        .iter()
        .rposition(|op| op.operator == "g")
        .expect("black fill before text");
    assert_eq!(ops[gray].operands[0].as_float().unwrap(), 0.0);

    let text = TextStripper::new(TextOptions::default()).get_text(&reloaded).unwrap();
    assert!(text.contains("Colored"));
}

#[test]
fn test_calibrated_colour_blackened_without_restore() {
    // CalRGB is never black and has no restoring operator
    for rgb in [[0.05, 0.05, 0.05], [0.9, 0.1, 0.1]] {
        let mut doc = calibrated_text_document("Calibrated", rgb);
        make_text_black(&mut doc).unwrap();

        let ops = operators(&doc);
        let names: Vec<&str> = ops.iter().map(|op| op.operator.as_str()).collect();
        let tj = names.iter().position(|&op| op == "Tj").unwrap();
        assert_eq!(names[tj - 1], "g");
        assert_eq!(ops[tj - 1].operands[0].as_float().unwrap(), 0.0);
        assert_eq!(names.iter().filter(|&&op| op == "g").count(), 1);
        assert!(!names.contains(&"rg"));
        assert_eq!(names.iter().filter(|&&op| op == "sc").count(), 1);
    }
}

#[test]
fn test_blacken_text_file() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("colored.pdf");
    let output = dir.path().join("black.pdf");
    std::fs::write(&input, save(&mut text_document(&[line(72.0, 700.0, "Text")]))).unwrap();

    pdfrecipe::blacken_text(&input, &output).unwrap();

    let doc = PdfDocument::open(&output).unwrap();
    assert!(operators(doc.inner()).iter().any(|op| op.operator == "g"));
}

#[test]
fn test_trim_page_covers_outside() {
    let mut doc = text_document(&[line(72.0, 700.0, "Kept")]);
    let page = first_page(&doc);
    trim_page(&mut doc, page, &Rectangle::new(50.0, 650.0, 200.0, 100.0)).unwrap();

    let ops = operators(&doc);
    assert!(ops.iter().any(|op| op.operator == "f*"));
    assert_eq!(ops.iter().filter(|op| op.operator == "re").count(), 2);
    // existing content runs in its own graphics state
    assert_eq!(ops.first().unwrap().operator, "q");
}

#[test]
fn test_trim_and_center_moves_boxes() {
    let mut doc = text_document(&[line(72.0, 700.0, "Kept")]);
    let page = first_page(&doc);
    let keep = Rectangle::new(100.0, 100.0, 100.0, 100.0);
    let centered = trim_and_center_page(&mut doc, page, &keep).unwrap();

    assert_eq!(centered.width(), 612.0);
    assert_eq!(centered.height(), 792.0);
    assert_eq!(centered.llx + centered.width() / 2.0, 150.0);
    assert_eq!(centered.lly + centered.height() / 2.0, 150.0);

    let wrapped = PdfDocument::from_lopdf(doc);
    assert_eq!(wrapped.crop_box(1).unwrap(), centered);
    assert_eq!(wrapped.media_box(1).unwrap(), centered);
}

#[test]
fn test_add_centered_png() {
    let mut doc = image_document();
    let page = first_page(&doc);
    let image = ImageXObject::from_bytes(&mut doc, &png_image(40, 20), "stamp").unwrap();
    add_centered_image(&mut doc, page, &image).unwrap();

    let ops = operators(&doc);
    let cm = ops
        .iter()
        .rev()
        .find(|op| op.operator == "cm")
        .expect("placement matrix");
    let values: Vec<f32> = cm.operands.iter().map(|o| o.as_float().unwrap()).collect();
    assert_eq!(values, vec![40.0, 0.0, 0.0, 20.0, 286.0, 386.0]);
    assert_eq!(ops.iter().filter(|op| op.operator == "Do").count(), 2);

    let placed = pdfrecipe::extract_page_images(&doc).unwrap();
    assert_eq!(placed.len(), 2);
    assert_eq!((placed[1].image.width, placed[1].image.height), (40, 20));
}
