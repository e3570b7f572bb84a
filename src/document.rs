//! Loaded PDF document and page-level accessors.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::detect::strip_leading_garbage;
use crate::error::{Error, Result};
use crate::model::Rectangle;
use crate::options::LoadOptions;

/// Reference-chasing limit, guards against cyclic references.
const MAX_REFERENCE_DEPTH: usize = 32;

/// A PDF document opened for reading or rewriting.
pub struct PdfDocument {
    doc: LopdfDocument,
    options: LoadOptions,
}

impl PdfDocument {
    /// Open a PDF file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with_options(path, LoadOptions::default())
    }

    /// Open a PDF file with custom options.
    pub fn open_with_options<P: AsRef<Path>>(path: P, options: LoadOptions) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::DocumentNotFound(path.to_path_buf()));
        }
        let data = std::fs::read(path)?;
        Self::from_bytes_with_options(&data, options)
    }

    /// Load a PDF from bytes.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        Self::from_bytes_with_options(data, LoadOptions::default())
    }

    /// Load a PDF from bytes with custom options.
    pub fn from_bytes_with_options(data: &[u8], options: LoadOptions) -> Result<Self> {
        let data = if options.repair_header {
            strip_leading_garbage(data)
        } else {
            data
        };

        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Encrypted,
            _ => Error::from(e),
        })?;

        // lopdf 0.34 has no password API
        if options.password.is_some() && doc.is_encrypted() {
            log::warn!("Password was provided but decryption is not supported");
        }

        Ok(Self { doc, options })
    }

    /// Load a PDF from a reader.
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self> {
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        Self::from_bytes(&data)
    }

    /// Wrap an already built document.
    pub fn from_lopdf(doc: LopdfDocument) -> Self {
        Self {
            doc,
            options: LoadOptions::default(),
        }
    }

    /// The underlying `lopdf::Document`.
    pub fn inner(&self) -> &LopdfDocument {
        &self.doc
    }

    pub fn inner_mut(&mut self) -> &mut LopdfDocument {
        &mut self.doc
    }

    pub fn into_inner(self) -> LopdfDocument {
        self.doc
    }

    pub fn options(&self) -> &LoadOptions {
        &self.options
    }

    /// Get the number of pages.
    pub fn page_count(&self) -> u32 {
        self.doc.get_pages().len() as u32
    }

    /// All pages as 1-based page number to object id.
    pub fn page_ids(&self) -> BTreeMap<u32, ObjectId> {
        self.doc.get_pages()
    }

    /// Object id of the 1-based page `page_num`.
    pub fn page_id(&self, page_num: u32) -> Result<ObjectId> {
        let pages = self.doc.get_pages();
        pages
            .get(&page_num)
            .copied()
            .ok_or(Error::PageOutOfRange(page_num, pages.len() as u32))
    }

    /// Page number of a page object.
    pub fn page_number(&self, page_id: ObjectId) -> Option<u32> {
        self.doc
            .get_pages()
            .into_iter()
            .find(|(_, id)| *id == page_id)
            .map(|(num, _)| num)
    }

    /// PDF version as a number (1.4 when unparsable).
    pub fn version(&self) -> f32 {
        self.doc.version.trim().parse().unwrap_or(1.4)
    }

    pub fn version_string(&self) -> &str {
        &self.doc.version
    }

    /// Check if the document is encrypted.
    pub fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    /// Media box, inherited through the page tree, Letter when absent.
    pub fn media_box(&self, page_num: u32) -> Result<Rectangle> {
        let page_id = self.page_id(page_num)?;
        Ok(page_box(&self.doc, page_id, b"MediaBox").unwrap_or_default())
    }

    /// Crop box, inherited through the page tree, media box when absent.
    pub fn crop_box(&self, page_num: u32) -> Result<Rectangle> {
        let page_id = self.page_id(page_num)?;
        Ok(crop_box_of(&self.doc, page_id))
    }

    pub fn set_media_box(&mut self, page_num: u32, rect: Rectangle) -> Result<()> {
        let page_id = self.page_id(page_num)?;
        self.doc
            .get_dictionary_mut(page_id)?
            .set("MediaBox", Object::Array(rect.to_array()));
        Ok(())
    }

    pub fn set_crop_box(&mut self, page_num: u32, rect: Rectangle) -> Result<()> {
        let page_id = self.page_id(page_num)?;
        self.doc
            .get_dictionary_mut(page_id)?
            .set("CropBox", Object::Array(rect.to_array()));
        Ok(())
    }

    /// Page rotation normalised to 0, 90, 180 or 270.
    pub fn rotation(&self, page_num: u32) -> Result<i64> {
        let page_id = self.page_id(page_num)?;
        let rotate = inherited_attribute(&self.doc, page_id, b"Rotate")
            .and_then(|o| o.as_i64().ok())
            .unwrap_or(0);
        Ok(rotate.rem_euclid(360) / 90 * 90)
    }

    /// Effective resource dictionary of a page.
    pub fn page_resources(&self, page_num: u32) -> Result<Option<&Dictionary>> {
        let page_id = self.page_id(page_num)?;
        Ok(page_resources(&self.doc, page_id))
    }

    /// Decoded content of a page, streams joined with whitespace.
    pub fn page_content(&self, page_num: u32) -> Result<Vec<u8>> {
        let page_id = self.page_id(page_num)?;
        page_content(&self.doc, page_id)
    }

    /// Annotation dictionaries of a page in `/Annots` order.
    pub fn annotations(&self, page_num: u32) -> Result<Vec<(Option<ObjectId>, &Dictionary)>> {
        let page_id = self.page_id(page_num)?;
        Ok(annotations_of(&self.doc, page_id))
    }

    /// Remove the annotations for which `predicate(index, annotation)` holds.
    ///
    /// Returns the rectangles of the removed annotations.
    pub fn remove_annotations<F>(
        &mut self,
        page_num: u32,
        mut predicate: F,
    ) -> Result<Vec<Rectangle>>
    where
        F: FnMut(usize, &Dictionary) -> bool,
    {
        let page_id = self.page_id(page_num)?;
        let entries: Vec<Object> = match self.doc.get_dictionary(page_id)?.get(b"Annots") {
            Ok(annots) => resolve(&self.doc, annots)
                .and_then(|o| o.as_array().ok())
                .cloned()
                .unwrap_or_default(),
            Err(_) => return Ok(Vec::new()),
        };

        let mut kept = Vec::with_capacity(entries.len());
        let mut removed = Vec::new();
        for (index, entry) in entries.into_iter().enumerate() {
            let verdict = resolve(&self.doc, &entry)
                .and_then(|o| o.as_dict().ok())
                .filter(|dict| predicate(index, dict))
                .map(|dict| {
                    dict.get(b"Rect")
                        .ok()
                        .and_then(|r| resolve(&self.doc, r))
                        .and_then(|r| r.as_array().ok())
                        .and_then(|r| Rectangle::from_array(r))
                });
            match verdict {
                Some(rect) => removed.extend(rect),
                None => kept.push(entry),
            }
        }

        self.doc
            .get_dictionary_mut(page_id)?
            .set("Annots", Object::Array(kept));
        Ok(removed)
    }

    /// Replace the page content with a single new stream.
    pub fn set_page_content(&mut self, page_num: u32, content: Vec<u8>) -> Result<()> {
        let page_id = self.page_id(page_num)?;
        set_page_content(&mut self.doc, page_id, content, true)
    }

    /// Write the document to a file.
    pub fn save<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let mut file = std::fs::File::create(path)?;
        self.doc.save_to(&mut file)?;
        Ok(())
    }

    /// Serialise the document to memory.
    pub fn save_to_bytes(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Document information entry as text.
    pub fn info_string(&self, key: &[u8]) -> Option<String> {
        let info = self.doc.trailer.get(b"Info").ok()?;
        let info = resolve(&self.doc, info)?.as_dict().ok()?;
        get_string_from_dict(info, key)
    }
}

/// Follow references until a direct object is reached.
pub fn resolve<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Object> {
    let mut current = obj;
    for _ in 0..MAX_REFERENCE_DEPTH {
        match current {
            Object::Reference(id) => current = doc.get_object(*id).ok()?,
            _ => return Some(current),
        }
    }
    None
}

/// Resolve an object to a dictionary (the dictionary of a stream counts).
pub fn resolve_dict<'a>(doc: &'a LopdfDocument, obj: &'a Object) -> Option<&'a Dictionary> {
    match resolve(doc, obj)? {
        Object::Dictionary(d) => Some(d),
        Object::Stream(s) => Some(&s.dict),
        _ => None,
    }
}

/// Look up `key` on a page or its ancestors.
pub fn inherited_attribute<'a>(
    doc: &'a LopdfDocument,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut node = doc.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_REFERENCE_DEPTH {
        if let Ok(value) = node.get(key) {
            return resolve(doc, value);
        }
        let parent = node.get(b"Parent").ok()?;
        node = resolve_dict(doc, parent)?;
    }
    None
}

pub(crate) fn page_box(doc: &LopdfDocument, page_id: ObjectId, key: &[u8]) -> Option<Rectangle> {
    inherited_attribute(doc, page_id, key)
        .and_then(|o| o.as_array().ok())
        .and_then(|a| Rectangle::from_array(a))
}

pub(crate) fn crop_box_of(doc: &LopdfDocument, page_id: ObjectId) -> Rectangle {
    page_box(doc, page_id, b"CropBox")
        .or_else(|| page_box(doc, page_id, b"MediaBox"))
        .unwrap_or_default()
}

/// Effective (possibly inherited) resource dictionary of a page.
pub fn page_resources(doc: &LopdfDocument, page_id: ObjectId) -> Option<&Dictionary> {
    match inherited_attribute(doc, page_id, b"Resources")? {
        Object::Dictionary(d) => Some(d),
        _ => None,
    }
}

/// Decoded page content; multiple streams are joined with a space.
pub fn page_content(doc: &LopdfDocument, page_id: ObjectId) -> Result<Vec<u8>> {
    let page_dict = doc.get_dictionary(page_id)?;
    let contents = match page_dict.get(b"Contents") {
        Ok(c) => c,
        Err(_) => return Ok(Vec::new()),
    };

    let decode = |obj: &Object| -> Result<Vec<u8>> {
        match resolve(doc, obj) {
            Some(Object::Stream(s)) => Ok(s
                .decompressed_content()
                .unwrap_or_else(|_| s.content.clone())),
            _ => Err(Error::ContentStream("Invalid content stream".to_string())),
        }
    };

    match resolve(doc, contents) {
        Some(Object::Array(arr)) => {
            let mut content = Vec::new();
            for obj in arr {
                content.extend_from_slice(&decode(obj)?);
                content.push(b' ');
            }
            Ok(content)
        }
        Some(_) => decode(contents),
        None => Err(Error::ContentStream("Invalid content stream".to_string())),
    }
}

/// Store `content` as the page's only content stream.
pub(crate) fn set_page_content(
    doc: &mut LopdfDocument,
    page_id: ObjectId,
    content: Vec<u8>,
    compress: bool,
) -> Result<()> {
    let mut stream = Stream::new(Dictionary::new(), content);
    if compress {
        if let Err(e) = stream.compress() {
            log::warn!("Keeping content stream uncompressed: {}", e);
        }
    }
    let stream_id = doc.add_object(stream);
    doc.get_dictionary_mut(page_id)?
        .set("Contents", Object::Reference(stream_id));
    Ok(())
}

/// Copy the effective resources onto the page itself so they can be edited.
pub(crate) fn ensure_page_resources(doc: &mut LopdfDocument, page_id: ObjectId) -> Result<()> {
    let resources = page_resources(doc, page_id).cloned().unwrap_or_default();
    let mut materialised = Dictionary::new();
    for (key, value) in resources.iter() {
        let value = match resolve(doc, value) {
            Some(Object::Dictionary(d)) => Object::Dictionary(d.clone()),
            _ => value.clone(),
        };
        materialised.set(key.clone(), value);
    }
    doc.get_dictionary_mut(page_id)?
        .set("Resources", Object::Dictionary(materialised));
    Ok(())
}

/// Annotation dictionaries of a page with their object ids.
pub(crate) fn annotations_of(
    doc: &LopdfDocument,
    page_id: ObjectId,
) -> Vec<(Option<ObjectId>, &Dictionary)> {
    let annots = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|p| p.get(b"Annots").ok())
        .and_then(|a| resolve(doc, a))
        .and_then(|a| a.as_array().ok());

    let mut result = Vec::new();
    if let Some(annots) = annots {
        for entry in annots {
            let id = entry.as_reference().ok();
            if let Some(dict) = resolve(doc, entry).and_then(|o| o.as_dict().ok()) {
                result.push((id, dict));
            }
        }
    }
    result
}

/// Object id of the document catalog.
pub(crate) fn catalog_id(doc: &LopdfDocument) -> Result<ObjectId> {
    doc.trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| Error::MissingObject("Root".to_string()))
}

/// Helper to get a string from a PDF dictionary.
pub fn get_string_from_dict(dict: &Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        Object::Name(bytes) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    })
}

/// Decode a text string: UTF-16BE with BOM, UTF-8, else Latin-1.
pub fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16_lossy(&utf16);
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    bytes.iter().map(|&b| b as char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn two_page_doc() -> LopdfDocument {
        let mut doc = LopdfDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(Stream::new(dictionary! {}, b"BT ET".to_vec()));
        let annot_a = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => vec![10.into(), 10.into(), 20.into(), 20.into()],
        });
        let annot_b = doc.add_object(dictionary! {
            "Type" => "Annot",
            "Subtype" => "Square",
            "Rect" => vec![30.into(), 30.into(), 40.into(), 40.into()],
        });
        let page1 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Annots" => vec![annot_a.into(), annot_b.into()],
        });
        let page2 = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "CropBox" => vec![10.into(), 10.into(), 100.into(), 200.into()],
            "Rotate" => -90,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page1.into(), page2.into()],
                "Count" => 2,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
                "Resources" => dictionary! { "Font" => dictionary! {} },
            }),
        );
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog);
        doc
    }

    #[test]
    fn test_inherited_boxes() {
        let doc = PdfDocument::from_lopdf(two_page_doc());
        assert_eq!(doc.page_count(), 2);
        let media = doc.media_box(1).unwrap();
        assert_eq!(media, Rectangle::from_corners(0.0, 0.0, 300.0, 400.0));
        assert_eq!(doc.crop_box(1).unwrap(), media);
        assert_eq!(
            doc.crop_box(2).unwrap(),
            Rectangle::from_corners(10.0, 10.0, 100.0, 200.0)
        );
        assert!(doc.page_resources(1).unwrap().is_some());
    }

    #[test]
    fn test_rotation_normalised() {
        let doc = PdfDocument::from_lopdf(two_page_doc());
        assert_eq!(doc.rotation(1).unwrap(), 0);
        assert_eq!(doc.rotation(2).unwrap(), 270);
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = PdfDocument::from_lopdf(two_page_doc());
        assert!(matches!(doc.page_id(3), Err(Error::PageOutOfRange(3, 2))));
    }

    #[test]
    fn test_remove_annotations_returns_rects() {
        let mut doc = PdfDocument::from_lopdf(two_page_doc());
        let removed = doc.remove_annotations(1, |index, _| index % 2 == 0).unwrap();
        assert_eq!(removed, vec![Rectangle::from_corners(10.0, 10.0, 20.0, 20.0)]);
        assert_eq!(doc.annotations(1).unwrap().len(), 1);
    }

    #[test]
    fn test_page_content_and_replace() {
        let mut doc = PdfDocument::from_lopdf(two_page_doc());
        assert_eq!(doc.page_content(1).unwrap(), b"BT ET");
        assert!(doc.page_content(2).unwrap().is_empty());
        doc.set_page_content(2, b"0 g".to_vec()).unwrap();
        assert_eq!(doc.page_content(2).unwrap(), b"0 g");
    }

    #[test]
    fn test_compressed_page_content() {
        let mut doc = two_page_doc();
        let page_id = doc.get_pages()[&1];
        let content = b"0 g 0 0 10 10 re f\n".repeat(50);
        set_page_content(&mut doc, page_id, content.clone(), true).unwrap();

        let page = doc.get_dictionary(page_id).unwrap();
        let id = page.get(b"Contents").unwrap().as_reference().unwrap();
        let stream = doc.get_object(id).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"FlateDecode");
        assert!(stream.content.len() < content.len());
        assert_eq!(page_content(&doc, page_id).unwrap(), content);
    }

    #[test]
    fn test_decode_pdf_string() {
        assert_eq!(decode_pdf_string(b"Hello"), "Hello");
        assert_eq!(decode_pdf_string(&[0x48, 0xE9]), "H\u{e9}");
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69]), "Hi");
    }
}
