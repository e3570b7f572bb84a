//! Text and image extraction from generated documents.

mod common;

use common::{first_page, image_document, line, save, text_document};
use lopdf::Object;
use pdfrecipe::{
    extract_page_images, extract_resource_images, Error, FontHeightMode, PdfDocument, Region,
    TextOptions, TextStripper, TextStripperByArea,
};

#[test]
fn test_broken_page_reported_or_skipped() {
    let mut doc = text_document(&[line(72.0, 700.0, "Lost")]);
    let page = first_page(&doc);
    doc.get_dictionary_mut(page).unwrap().set("Contents", Object::Integer(5));

    let strict = TextStripper::new(TextOptions::default()).get_text(&doc);
    assert!(matches!(
        strict,
        Err(Error::TextExtract(ref message)) if message.starts_with("page 1")
    ));

    let lenient = TextStripper::new(TextOptions::default().lenient().with_page_end("<end>"))
        .get_text(&doc)
        .unwrap();
    assert_eq!(lenient, "<end>");
}

#[test]
fn test_text_in_content_order() {
    let doc = text_document(&[
        line(72.0, 680.0, "Second line"),
        line(72.0, 700.0, "Hello World"),
    ]);
    let text = TextStripper::new(TextOptions::default()).get_text(&doc).unwrap();
    let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["Second line", "Hello World"]);
}

#[test]
fn test_text_sorted_by_position() {
    let doc = text_document(&[
        line(72.0, 680.0, "Second line"),
        line(72.0, 700.0, "Hello World"),
    ]);
    let text = TextStripper::new(TextOptions::default().sorted())
        .get_text(&doc)
        .unwrap();
    let lines: Vec<&str> = text.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(lines, vec!["Hello World", "Second line"]);
}

#[test]
fn test_positions_use_top_left_origin() {
    let doc = text_document(&[line(72.0, 700.0, "Hi")]);
    let options = TextOptions::default().with_font_height(FontHeightMode::FontSize);
    let stripper = TextStripper::new(options);
    let positions = stripper.text_positions(&doc, first_page(&doc)).unwrap();

    assert_eq!(positions.len(), 2);
    assert_eq!(positions[0].unicode, "H");
    assert_eq!(positions[0].x, 72.0);
    assert_eq!(positions[0].y, 92.0);
    assert_eq!(positions[0].font_size, 12.0);
    assert_eq!(positions[0].height, 12.0);
    assert!(positions[1].x > positions[0].x);
}

#[test]
fn test_region_extraction() {
    let doc = text_document(&[
        line(72.0, 700.0, "Inside"),
        line(72.0, 400.0, "Outside"),
    ]);
    let mut stripper = TextStripperByArea::new(TextOptions::default().sorted());
    stripper.add_region("class1", Region::new(50.0, 80.0, 300.0, 30.0));
    stripper.extract_regions(&doc, first_page(&doc)).unwrap();

    let text = stripper.text_for_region("class1");
    assert!(text.contains("Inside"));
    assert!(!text.contains("Outside"));
    assert_eq!(stripper.text_for_region("unknown"), "");
}

#[test]
fn test_extract_text_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("text.pdf");
    std::fs::write(&path, save(&mut text_document(&[line(72.0, 700.0, "From disk")]))).unwrap();

    let text = pdfrecipe::extract_text(&path, TextOptions::default()).unwrap();
    assert!(text.contains("From disk"));
}

#[test]
fn test_drawn_image_reported_once() {
    let doc = image_document();
    let images = extract_page_images(&doc).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0].page, 1);
    assert_eq!(images[0].flips, "");
    assert_eq!((images[0].image.width, images[0].image.height), (2, 2));

    let resources = extract_resource_images(&doc).unwrap();
    assert_eq!(resources.len(), 1);
}

#[test]
fn test_images_written_as_png() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("images.pdf");
    std::fs::write(&input, save(&mut image_document())).unwrap();

    let out = dir.path().join("out");
    let written = pdfrecipe::extract_images(&input, &out, "images").unwrap();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0], out.join("images-1-0.png"));

    let decoder = png::Decoder::new(std::fs::File::open(&written[0]).unwrap());
    let reader = decoder.read_info().unwrap();
    assert_eq!((reader.info().width, reader.info().height), (2, 2));
}

#[test]
fn test_missing_file() {
    assert!(PdfDocument::open("/nonexistent/document.pdf").is_err());
}
