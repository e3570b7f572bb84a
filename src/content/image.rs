//! Image XObjects created from JPEG or PNG files.

use std::io::{Cursor, Write};
use std::path::Path;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::{dictionary, Document as LopdfDocument, Object, ObjectId, Stream};

use crate::error::{Error, Result};

/// An image stored in a document, ready to be drawn with `Do`.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageXObject {
    id: ObjectId,
    width: u32,
    height: u32,
    name: String,
}

impl ImageXObject {
    /// Embed JPEG or PNG bytes into `doc`.
    pub fn from_bytes(doc: &mut LopdfDocument, bytes: &[u8], name: &str) -> Result<Self> {
        let stream = if bytes.starts_with(&[0xFF, 0xD8]) {
            jpeg_stream(bytes)?
        } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
            png_stream(doc, bytes)?
        } else {
            return Err(Error::ImageEmbed(format!(
                "{}: only JPEG and PNG images can be embedded",
                name
            )));
        };

        let width = dimension(&stream, b"Width");
        let height = dimension(&stream, b"Height");
        let id = doc.add_object(stream);
        log::debug!("Embedded image {} ({}x{}) as {:?}", name, width, height, id);
        Ok(Self {
            id,
            width,
            height,
            name: name.to_string(),
        })
    }

    /// Read and embed an image file.
    pub fn from_file<P: AsRef<Path>>(doc: &mut LopdfDocument, path: P) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        Self::from_bytes(doc, &bytes, &name)
    }

    pub fn object_id(&self) -> ObjectId {
        self.id
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Pixel size of JPEG or PNG bytes without decoding them.
pub fn image_dimensions(bytes: &[u8]) -> Result<(u32, u32)> {
    if bytes.starts_with(&[0xFF, 0xD8]) {
        let info = parse_jpeg(bytes)
            .ok_or_else(|| Error::ImageEmbed("JPEG frame header not found".to_string()))?;
        return Ok((info.width, info.height));
    }
    // the IHDR chunk always follows the 8 byte signature
    match bytes.get(16..24) {
        Some(ihdr) if bytes.starts_with(&[0x89, b'P', b'N', b'G']) => Ok((
            u32::from_be_bytes([ihdr[0], ihdr[1], ihdr[2], ihdr[3]]),
            u32::from_be_bytes([ihdr[4], ihdr[5], ihdr[6], ihdr[7]]),
        )),
        _ => Err(Error::ImageEmbed(
            "only JPEG and PNG images can be embedded".to_string(),
        )),
    }
}

fn dimension(stream: &Stream, key: &[u8]) -> u32 {
    stream
        .dict
        .get(key)
        .ok()
        .and_then(|o| o.as_i64().ok())
        .unwrap_or(0) as u32
}

/// Frame header of a baseline or progressive JPEG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct JpegInfo {
    pub width: u32,
    pub height: u32,
    pub components: u8,
    pub precision: u8,
    /// An Adobe APP14 segment is present
    pub adobe: bool,
}

/// Scan JPEG markers up to the first start-of-frame.
pub(crate) fn parse_jpeg(bytes: &[u8]) -> Option<JpegInfo> {
    let mut pos = 2;
    let mut adobe = false;
    while pos + 4 <= bytes.len() {
        if bytes[pos] != 0xFF {
            return None;
        }
        let marker = bytes[pos + 1];
        // fill bytes and standalone markers
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            pos += 2;
            continue;
        }
        let length = u16::from_be_bytes([bytes[pos + 2], bytes[pos + 3]]) as usize;
        let segment = bytes.get(pos + 4..pos + 2 + length)?;
        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            0xC0..=0xC3 | 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF => {
                if segment.len() < 6 {
                    return None;
                }
                return Some(JpegInfo {
                    precision: segment[0],
                    height: u16::from_be_bytes([segment[1], segment[2]]) as u32,
                    width: u16::from_be_bytes([segment[3], segment[4]]) as u32,
                    components: segment[5],
                    adobe,
                });
            }
            0xDA => return None,
            _ => {}
        }
        pos += 2 + length;
    }
    None
}

fn jpeg_stream(bytes: &[u8]) -> Result<Stream> {
    let info = parse_jpeg(bytes)
        .ok_or_else(|| Error::ImageEmbed("JPEG frame header not found".to_string()))?;
    let color_space = match info.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        n => {
            return Err(Error::ImageEmbed(format!(
                "Unsupported JPEG component count {}",
                n
            )))
        }
    };

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => info.width as i64,
        "Height" => info.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => info.precision as i64,
        "Filter" => "DCTDecode",
    };
    if info.components == 4 {
        // Adobe CMYK JPEGs store inverted samples
        let decode: Vec<Object> = [1, 0, 1, 0, 1, 0, 1, 0]
            .iter()
            .map(|&v| Object::Integer(v))
            .collect();
        dict.set("Decode", decode);
    }
    // DCT data is stored as-is; lopdf must not recompress it
    let mut stream = Stream::new(dict, bytes.to_vec());
    stream.allows_compression = false;
    Ok(stream)
}

fn png_stream(doc: &mut LopdfDocument, bytes: &[u8]) -> Result<Stream> {
    let mut decoder = png::Decoder::new(Cursor::new(bytes));
    decoder.set_transformations(png::Transformations::normalize_to_color8());
    let mut reader = decoder.read_info()?;
    let mut buffer = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut buffer)?;
    let pixels = &buffer[..frame.buffer_size()];

    let (channels, color_space) = match frame.color_type {
        png::ColorType::Grayscale => (1, "DeviceGray"),
        png::ColorType::GrayscaleAlpha => (2, "DeviceGray"),
        png::ColorType::Rgb => (3, "DeviceRGB"),
        png::ColorType::Rgba => (4, "DeviceRGB"),
        other => {
            return Err(Error::ImageEmbed(format!(
                "Unsupported PNG colour type {:?}",
                other
            )))
        }
    };
    let has_alpha = channels == 2 || channels == 4;
    let color_channels = if has_alpha { channels - 1 } else { channels };

    let mut color = Vec::with_capacity(pixels.len());
    let mut alpha = Vec::new();
    for pixel in pixels.chunks(channels) {
        color.extend_from_slice(&pixel[..color_channels]);
        if has_alpha {
            alpha.push(pixel[color_channels]);
        }
    }

    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => frame.width as i64,
        "Height" => frame.height as i64,
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if has_alpha && alpha.iter().any(|&a| a != 0xFF) {
        let mask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => frame.width as i64,
                "Height" => frame.height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate(&alpha)?,
        );
        let mask_id = doc.add_object(mask);
        dict.set("SMask", mask_id);
    }

    Ok(Stream::new(dict, deflate(&color)?))
}

fn deflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Read;

    use flate2::read::ZlibDecoder;

    fn inflate(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        ZlibDecoder::new(data).read_to_end(&mut out).unwrap();
        out
    }

    /// A minimal JPEG header: SOI, APP14 Adobe, SOF0 for `w`x`h` with `n` components.
    pub(crate) fn jpeg_header(w: u16, h: u16, n: u8) -> Vec<u8> {
        let mut bytes = vec![0xFF, 0xD8];
        bytes.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
        bytes.extend_from_slice(b"Adobe\x00\x64\x00\x00\x00\x00\x02");
        let sof_len = 8 + 3 * n as u16;
        bytes.extend_from_slice(&[0xFF, 0xC0]);
        bytes.extend_from_slice(&sof_len.to_be_bytes());
        bytes.push(8);
        bytes.extend_from_slice(&h.to_be_bytes());
        bytes.extend_from_slice(&w.to_be_bytes());
        bytes.push(n);
        for i in 0..n {
            bytes.extend_from_slice(&[i + 1, 0x11, 0]);
        }
        bytes.extend_from_slice(&[0xFF, 0xD9]);
        bytes
    }

    pub(crate) fn png_bytes(
        width: u32,
        height: u32,
        color: png::ColorType,
        pixels: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut out, width, height);
            encoder.set_color(color);
            encoder.set_depth(png::BitDepth::Eight);
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(pixels).unwrap();
        }
        out
    }

    #[test]
    fn test_parse_jpeg_header() {
        let info = parse_jpeg(&jpeg_header(120, 80, 3)).unwrap();
        assert_eq!((info.width, info.height, info.components), (120, 80, 3));
        assert!(info.adobe);
        assert!(parse_jpeg(&[0xFF, 0xD8, 0x00]).is_none());
    }

    #[test]
    fn test_cmyk_jpeg_gets_decode() {
        let mut doc = LopdfDocument::with_version("1.5");
        let image = ImageXObject::from_bytes(&mut doc, &jpeg_header(10, 20, 4), "cmyk").unwrap();
        assert_eq!((image.width(), image.height()), (10, 20));
        let stream = doc.get_object(image.object_id()).unwrap().as_stream().unwrap();
        assert_eq!(stream.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(stream.dict.get(b"Decode").unwrap().as_array().unwrap().len(), 8);
    }

    #[test]
    fn test_png_alpha_becomes_smask() {
        let mut doc = LopdfDocument::with_version("1.5");
        let pixels = [255, 0, 0, 128, 0, 255, 0, 255];
        let bytes = png_bytes(2, 1, png::ColorType::Rgba, &pixels);
        let image = ImageXObject::from_bytes(&mut doc, &bytes, "alpha").unwrap();

        let stream = doc.get_object(image.object_id()).unwrap().as_stream().unwrap();
        assert_eq!(inflate(&stream.content), vec![255, 0, 0, 0, 255, 0]);
        let mask_id = stream.dict.get(b"SMask").unwrap().as_reference().unwrap();
        let mask = doc.get_object(mask_id).unwrap().as_stream().unwrap();
        assert_eq!(mask.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        assert_eq!(inflate(&mask.content), vec![128, 255]);
    }

    #[test]
    fn test_opaque_png_has_no_smask() {
        let mut doc = LopdfDocument::with_version("1.5");
        let bytes = png_bytes(1, 1, png::ColorType::Rgba, &[1, 2, 3, 255]);
        let image = ImageXObject::from_bytes(&mut doc, &bytes, "opaque").unwrap();
        let stream = doc.get_object(image.object_id()).unwrap().as_stream().unwrap();
        assert!(stream.dict.get(b"SMask").is_err());
    }

    #[test]
    fn test_unknown_format_rejected() {
        let mut doc = LopdfDocument::with_version("1.5");
        assert!(matches!(
            ImageXObject::from_bytes(&mut doc, b"GIF89a", "gif"),
            Err(Error::ImageEmbed(_))
        ));
    }

    #[test]
    fn test_image_dimensions() {
        assert_eq!(image_dimensions(&jpeg_header(64, 32, 3)).unwrap(), (64, 32));
        let bytes = png_bytes(3, 5, png::ColorType::Rgb, &[0; 45]);
        assert_eq!(image_dimensions(&bytes).unwrap(), (3, 5));
        assert!(image_dimensions(b"GIF89a").is_err());
    }
}
