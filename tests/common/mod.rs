//! Documents, images and keystores built on the fly for integration tests.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use openssl::asn1::Asn1Time;
use openssl::bn::{BigNum, MsbOption};
use openssl::hash::MessageDigest;
use openssl::pkcs12::Pkcs12;
use openssl::pkey::PKey;
use openssl::rsa::Rsa;
use openssl::x509::{X509NameBuilder, X509};

pub const PAGE_WIDTH: i64 = 612;
pub const PAGE_HEIGHT: i64 = 792;

/// A line of text shown with Helvetica 12 at a baseline position.
pub struct Line<'a> {
    pub x: f32,
    pub y: f32,
    pub text: &'a str,
}

pub fn line(x: f32, y: f32, text: &str) -> Line<'_> {
    Line { x, y, text }
}

/// A single letter-size page drawing `lines` in red.
pub fn text_document(lines: &[Line]) -> Document {
    let mut operations = vec![Operation::new(
        "rg",
        vec![1.into(), 0.into(), 0.into()],
    )];
    for line in lines {
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("Tf", vec!["F1".into(), 12.into()]));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new("Tj", vec![Object::string_literal(line.text)]));
        operations.push(Operation::new("ET", vec![]));
    }
    single_page(operations, |doc| {
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        dictionary! { "Font" => dictionary! { "F1" => font } }
    })
}

/// A page showing `text` filled with `rgb` in a `/CalRGB` colour space.
pub fn calibrated_text_document(text: &str, rgb: [f32; 3]) -> Document {
    let operations = vec![
        Operation::new("cs", vec!["CS0".into()]),
        Operation::new("sc", rgb.iter().map(|&v| v.into()).collect()),
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("Td", vec![72.into(), 700.into()]),
        Operation::new("Tj", vec![Object::string_literal(text)]),
        Operation::new("ET", vec![]),
    ];
    single_page(operations, |doc| {
        let font = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let calibrated = vec![
            Object::Name(b"CalRGB".to_vec()),
            Object::Dictionary(dictionary! {
                "WhitePoint" => vec![0.9505f32.into(), 1.into(), 1.089f32.into()],
            }),
        ];
        dictionary! {
            "Font" => dictionary! { "F1" => font },
            "ColorSpace" => dictionary! { "CS0" => calibrated },
        }
    })
}

/// A page drawing a 2x2 RGB image scaled to 100x50 at (50, 600).
pub fn image_document() -> Document {
    let operations = vec![
        Operation::new("q", vec![]),
        Operation::new(
            "cm",
            vec![100.into(), 0.into(), 0.into(), 50.into(), 50.into(), 600.into()],
        ),
        Operation::new("Do", vec!["Im0".into()]),
        Operation::new("Q", vec![]),
    ];
    single_page(operations, |doc| {
        let image = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 2,
                "Height" => 2,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            vec![255, 0, 0, 0, 255, 0, 0, 0, 255, 255, 255, 255],
        ));
        dictionary! { "XObject" => dictionary! { "Im0" => image } }
    })
}

fn single_page<F>(operations: Vec<Operation>, resources: F) -> Document
where
    F: FnOnce(&mut Document) -> lopdf::Dictionary,
{
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let resources = resources(&mut doc);
    let content = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
        "Resources" => resources,
        "Contents" => content_id,
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
    doc
}

pub fn first_page(doc: &Document) -> ObjectId {
    doc.get_pages()[&1]
}

pub fn save(doc: &mut Document) -> Vec<u8> {
    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).unwrap();
    bytes
}

/// Decoded operators of the first page.
pub fn operators(doc: &Document) -> Vec<Operation> {
    let content = doc.get_page_content(first_page(doc)).unwrap();
    Content::decode(&content).unwrap().operations
}

/// An opaque RGB PNG of the given size.
pub fn png_image(width: u32, height: u32) -> Vec<u8> {
    let pixels = vec![0x40; (width * height * 3) as usize];
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, width, height);
        encoder.set_color(png::ColorType::Rgb);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header().unwrap();
        writer.write_image_data(&pixels).unwrap();
    }
    out
}

/// A PKCS#12 keystore holding a fresh key and self-signed certificate.
pub fn keystore(pin: &str) -> (Vec<u8>, X509) {
    let key = PKey::from_rsa(Rsa::generate(2048).unwrap()).unwrap();

    let mut name = X509NameBuilder::new().unwrap();
    name.append_entry_by_text("CN", "pdfrecipe integration").unwrap();
    let name = name.build();

    let mut builder = X509::builder().unwrap();
    builder.set_version(2).unwrap();
    let mut serial = BigNum::new().unwrap();
    serial.rand(64, MsbOption::MAYBE_ZERO, false).unwrap();
    builder
        .set_serial_number(&serial.to_asn1_integer().unwrap())
        .unwrap();
    builder.set_subject_name(&name).unwrap();
    builder.set_issuer_name(&name).unwrap();
    builder.set_pubkey(&key).unwrap();
    builder
        .set_not_before(&Asn1Time::days_from_now(0).unwrap())
        .unwrap();
    builder
        .set_not_after(&Asn1Time::days_from_now(30).unwrap())
        .unwrap();
    builder.sign(&key, MessageDigest::sha256()).unwrap();
    let cert = builder.build();

    let der = Pkcs12::builder()
        .name("client")
        .pkey(&key)
        .cert(&cert)
        .build2(pin)
        .unwrap()
        .to_der()
        .unwrap();
    (der, cert)
}
