//! Serialising a document with a signature placeholder and filling it in.

use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::path::Path;

use lopdf::{Document as LopdfDocument, Object, ObjectId, StringFormat};

use crate::error::{Error, Result};

/// Wide enough for any offset lopdf can write.
const BYTE_RANGE_PLACEHOLDER: i64 = 9_999_999_999;

/// A serialised document whose `/Contents` hex string awaits the signature.
///
/// `content()` yields the bytes covered by `/ByteRange`, which exclude the
/// hex string together with its angle brackets.
#[derive(Debug, Clone)]
pub struct ExternalSigningSupport {
    bytes: Vec<u8>,
    byte_range: [usize; 4],
    reserved: usize,
}

impl ExternalSigningSupport {
    /// Save `doc` with `reserved` zero bytes as the signature of `signature`.
    pub(crate) fn prepare(
        doc: &mut LopdfDocument,
        signature: ObjectId,
        reserved: usize,
    ) -> Result<Self> {
        let sig = doc.get_dictionary_mut(signature)?;
        sig.set(
            "Contents",
            Object::String(vec![0; reserved], StringFormat::Hexadecimal),
        );
        sig.set(
            "ByteRange",
            vec![
                Object::Integer(0),
                Object::Integer(BYTE_RANGE_PLACEHOLDER),
                Object::Integer(BYTE_RANGE_PLACEHOLDER),
                Object::Integer(BYTE_RANGE_PLACEHOLDER),
            ],
        );

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes)?;

        let start = find_contents(&bytes, reserved)
            .ok_or_else(|| Error::Signing("signature placeholder not found".to_string()))?;
        let end = start + reserved * 2 + 2;
        let byte_range = [0, start, end, bytes.len() - end];
        patch_byte_range(&mut bytes, &byte_range)?;

        log::debug!("Signature placeholder at {:?}", byte_range);
        Ok(Self {
            bytes,
            byte_range,
            reserved,
        })
    }

    pub fn byte_range(&self) -> [usize; 4] {
        self.byte_range
    }

    /// Offset of the first hex digit of the signature.
    pub fn signature_offset(&self) -> usize {
        self.byte_range[1] + 1
    }

    /// The bytes to be signed.
    pub fn content(&self) -> Vec<u8> {
        let [_, first_len, second_start, second_len] = self.byte_range;
        let mut content = Vec::with_capacity(first_len + second_len);
        content.extend_from_slice(&self.bytes[..first_len]);
        content.extend_from_slice(&self.bytes[second_start..second_start + second_len]);
        content
    }

    /// Fail when `cms` does not fit the reserved space.
    pub fn check_fits(&self, cms: &[u8]) -> Result<()> {
        if cms.len() > self.reserved {
            return Err(Error::SignatureTooLarge {
                needed: cms.len(),
                available: self.reserved,
            });
        }
        Ok(())
    }

    /// Write `cms` into the placeholder; an empty signature leaves it zeroed.
    pub fn set_signature(&mut self, cms: &[u8]) -> Result<()> {
        self.check_fits(cms)?;
        let hex = hex::encode_upper(cms);
        let offset = self.signature_offset();
        self.bytes[offset..offset + hex.len()].copy_from_slice(hex.as_bytes());
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// Write `cms` as hex at `offset` of an already saved file.
pub fn write_signature_at<P: AsRef<Path>>(path: P, offset: u64, cms: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new().write(true).open(path)?;
    file.seek(SeekFrom::Start(offset))?;
    file.write_all(hex::encode_upper(cms).as_bytes())?;
    Ok(())
}

/// Offset of the `<` opening a hex string of `reserved` zero bytes.
fn find_contents(bytes: &[u8], reserved: usize) -> Option<usize> {
    let digits = reserved * 2;
    let mut pos = 0;
    while let Some(found) = bytes[pos..].iter().position(|b| *b == b'<') {
        let start = pos + found;
        let run = bytes
            .get(start + 1..start + 1 + digits)
            .map_or(false, |run| run.iter().all(|b| *b == b'0'));
        if run && bytes.get(start + 1 + digits) == Some(&b'>') {
            return Some(start);
        }
        pos = start + 1;
    }
    None
}

/// Overwrite the placeholder `/ByteRange` array, padding with spaces.
fn patch_byte_range(bytes: &mut [u8], byte_range: &[usize; 4]) -> Result<()> {
    let placeholder = BYTE_RANGE_PLACEHOLDER.to_string();
    let missing = || Error::Signing("ByteRange placeholder not found".to_string());

    let value = bytes
        .windows(placeholder.len())
        .position(|w| w == placeholder.as_bytes())
        .ok_or_else(missing)?;
    let open = bytes[..value].iter().rposition(|b| *b == b'[').ok_or_else(missing)?;
    let close = value + bytes[value..].iter().position(|b| *b == b']').ok_or_else(missing)?;

    let replacement = format!(
        "[{} {} {} {}]",
        byte_range[0], byte_range[1], byte_range[2], byte_range[3]
    );
    let slot = &mut bytes[open..=close];
    if replacement.len() > slot.len() {
        return Err(Error::Signing("ByteRange does not fit its placeholder".to_string()));
    }
    slot.fill(b' ');
    slot[..replacement.len()].copy_from_slice(replacement.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::dictionary;

    fn signable() -> (LopdfDocument, ObjectId) {
        let mut doc = LopdfDocument::with_version("1.7");
        let sig = doc.add_object(dictionary! { "Type" => "Sig" });
        let catalog = doc.add_object(dictionary! { "Type" => "Catalog", "Sig" => sig });
        doc.trailer.set("Root", catalog);
        (doc, sig)
    }

    #[test]
    fn test_byte_range_excludes_hex_string() {
        let (mut doc, sig) = signable();
        let support = ExternalSigningSupport::prepare(&mut doc, sig, 16).unwrap();
        let [a, b, c, d] = support.byte_range();
        let bytes = support.bytes();

        assert_eq!(a, 0);
        assert_eq!(bytes[b], b'<');
        assert_eq!(bytes[c - 1], b'>');
        assert_eq!(c - b, 34);
        assert_eq!(c + d, bytes.len());
        assert_eq!(support.content().len(), bytes.len() - 34);

        let text = String::from_utf8_lossy(bytes);
        assert!(text.contains(&format!("[0 {} {} {}]", b, c, d)));
        assert!(!text.contains("9999999999"));
    }

    #[test]
    fn test_set_signature_writes_hex() {
        let (mut doc, sig) = signable();
        let mut support = ExternalSigningSupport::prepare(&mut doc, sig, 8).unwrap();
        let before = support.content();
        support.set_signature(&[0xAB, 0x01]).unwrap();
        let offset = support.signature_offset();
        assert_eq!(&support.bytes()[offset..offset + 6], b"AB0100");
        // covered bytes are unaffected
        assert_eq!(support.content(), before);
    }

    #[test]
    fn test_signature_too_large() {
        let (mut doc, sig) = signable();
        let mut support = ExternalSigningSupport::prepare(&mut doc, sig, 2).unwrap();
        assert!(matches!(
            support.set_signature(&[1, 2, 3]),
            Err(Error::SignatureTooLarge { needed: 3, available: 2 })
        ));
    }

    #[test]
    fn test_write_signature_at() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("late.pdf");
        std::fs::write(&path, b"<0000>").unwrap();
        write_signature_at(&path, 1, &[0xCA, 0xFE]).unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"<CAFE>");
    }
}
