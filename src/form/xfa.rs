//! XFA form data retrieval.

use std::io::Read;

use lopdf::{Document as LopdfDocument, Object, Stream};
use quick_xml::events::Event;
use quick_xml::Reader;

use super::acroform::acro_form;
use crate::document::{decode_pdf_string, resolve, PdfDocument};
use crate::error::{Error, Result};
use crate::options::LoadOptions;

/// One XFA packet; `name` is `None` when the form is a single stream.
#[derive(Debug, Clone, PartialEq)]
pub struct XfaPacket {
    pub name: Option<String>,
    pub data: Vec<u8>,
}

/// The `/XFA` entry of an interactive form.
#[derive(Debug, Clone, PartialEq)]
pub struct XfaResource {
    packets: Vec<XfaPacket>,
}

fn stream_data(stream: &Stream) -> Vec<u8> {
    if stream.dict.has(b"Filter") {
        stream
            .decompressed_content()
            .unwrap_or_else(|_| stream.content.clone())
    } else {
        stream.content.clone()
    }
}

impl XfaResource {
    pub fn new(packets: Vec<XfaPacket>) -> Self {
        Self { packets }
    }

    /// Read `/AcroForm /XFA`, either a stream or an array of name/stream pairs.
    pub fn from_document(doc: &LopdfDocument) -> Result<Option<Self>> {
        let Some(xfa) = acro_form(doc).and_then(|form| form.get(b"XFA").ok()) else {
            return Ok(None);
        };
        match resolve(doc, xfa) {
            Some(Object::Stream(stream)) => Ok(Some(Self::new(vec![XfaPacket {
                name: None,
                data: stream_data(stream),
            }]))),
            Some(Object::Array(items)) => {
                let mut packets = Vec::with_capacity(items.len() / 2);
                for pair in items.chunks(2) {
                    let [name, value] = pair else {
                        return Err(Error::Xfa("Odd number of entries in XFA array".to_string()));
                    };
                    let name = match resolve(doc, name) {
                        Some(Object::String(bytes, _)) => decode_pdf_string(bytes),
                        _ => return Err(Error::Xfa("XFA packet name is not a string".to_string())),
                    };
                    match resolve(doc, value) {
                        Some(Object::Stream(stream)) => packets.push(XfaPacket {
                            name: Some(name),
                            data: stream_data(stream),
                        }),
                        _ => log::warn!("XFA packet {} is not a stream, skipped", name),
                    }
                }
                Ok(Some(Self::new(packets)))
            }
            _ => Err(Error::Xfa("XFA entry is neither stream nor array".to_string())),
        }
    }

    pub fn packets(&self) -> &[XfaPacket] {
        &self.packets
    }

    /// All packet data concatenated in document order.
    pub fn bytes(&self) -> Vec<u8> {
        self.packets.iter().flat_map(|p| p.data.iter().copied()).collect()
    }

    /// Parse the XML and return the name of its root element.
    pub fn root_element(&self) -> Result<String> {
        let bytes = self.bytes();
        let mut reader = Reader::from_reader(bytes.as_slice());
        reader.trim_text(true);

        let mut buf = Vec::new();
        let mut root = None;
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(e) | Event::Empty(e) if root.is_none() => {
                    root = Some(String::from_utf8_lossy(e.name().as_ref()).into_owned());
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        root.ok_or_else(|| Error::Xfa("XFA data contains no element".to_string()))
    }
}

/// Shorthand for [`XfaResource::from_document`].
pub fn get_xfa(doc: &LopdfDocument) -> Result<Option<XfaResource>> {
    XfaResource::from_document(doc)
}

/// XFA bytes of the PDF read from `reader`.
///
/// Leading garbage before the header is tolerated. Any failure is logged
/// and yields `None`.
pub fn get_parsable_xfa_form<R: Read>(reader: R) -> Option<Vec<u8>> {
    let mut data = Vec::new();
    let mut reader = reader;
    if let Err(e) = reader.read_to_end(&mut data) {
        log::error!("Failed to read PDF: {}", e);
        return None;
    }
    let options = LoadOptions::default().with_header_repair(true);
    let doc = match PdfDocument::from_bytes_with_options(&data, options) {
        Ok(doc) => doc,
        Err(e) => {
            log::error!("Failed to load PDF for XFA retrieval: {}", e);
            return None;
        }
    };
    match get_xfa(doc.inner()) {
        Ok(xfa) => xfa.map(|x| x.bytes()),
        Err(e) => {
            log::error!("Failed to read XFA: {}", e);
            None
        }
    }
}
