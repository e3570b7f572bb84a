//! Image extraction.
//!
//! Three strategies are offered. [`extract_resource_images`] lists the image
//! XObjects a page declares directly, which misses images wrapped in form
//! XObjects. [`extract_page_images`] runs the content engine and reports
//! every image actually drawn, with flip markers derived from the CTM.
//! [`extract_annotation_images`] does the same for annotation appearances.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::ZlibDecoder;
use lopdf::{Dictionary, Document as LopdfDocument, Object, ObjectId, Stream};
use serde::Serialize;

use crate::content::{parse_jpeg, ContentHandler, ImageDraw, StreamEngine};
use crate::document::{annotations_of, page_resources, resolve, resolve_dict};
use crate::error::{Error, Result};
use crate::model::{ExtractedImage, ImageColorSpace, ImageFormat, Matrix};

/// Largest accepted `/Width` or `/Height`.
const MAX_IMAGE_SIDE: i64 = 1 << 16;

/// Largest sample buffer built for PNG conversion.
const MAX_SAMPLES: usize = 1 << 28;

/// An image found on a page.
#[derive(Debug, Clone, Serialize)]
pub struct PageImage {
    /// 1-based page number
    pub page: u32,
    /// Position among the images of the page, from 0
    pub index: usize,
    /// `""`, `"-h"`, `"-v"` or `"-hv"`
    pub flips: String,
    pub image: ExtractedImage,
}

impl PageImage {
    /// `"{prefix}-{page}-{index}{flips}.{suffix}"`
    pub fn file_name(&self, prefix: &str) -> String {
        file_name(prefix, self.page, &self.index.to_string(), &self.flips, self.image.suffix())
    }
}

/// An image drawn by an annotation appearance stream.
#[derive(Debug, Clone, Serialize)]
pub struct AnnotationImage {
    pub page: u32,
    /// `"{annotation}-{Down|Normal|Rollover}"`, with `.{state}` for
    /// appearance sub-dictionaries; annotations count from 1
    pub key: String,
    pub flips: String,
    pub image: ExtractedImage,
}

impl AnnotationImage {
    /// `"{prefix}-{page}-{key}{flips}.{suffix}"`
    pub fn file_name(&self, prefix: &str) -> String {
        file_name(prefix, self.page, &self.key, &self.flips, self.image.suffix())
    }
}

/// Format an output file name as `"{prefix}-{page}-{index}{flips}.{suffix}"`.
pub fn file_name(prefix: &str, page: u32, index: &str, flips: &str, suffix: &str) -> String {
    format!("{}-{}-{}{}.{}", prefix, page, index, flips, suffix)
}

/// Flip marker for an image drawn with `ctm`.
pub fn flip_marker(ctm: &Matrix) -> String {
    let mut flips = String::new();
    if ctm.scale_x() < 0.0 {
        flips.push('h');
    }
    if ctm.scale_y() < 0.0 {
        flips.push('v');
    }
    if flips.is_empty() {
        flips
    } else {
        format!("-{}", flips)
    }
}

/// Images declared directly in each page's `/XObject` resources.
pub fn extract_resource_images(doc: &LopdfDocument) -> Result<Vec<PageImage>> {
    let mut images = Vec::new();
    for (page, page_id) in doc.get_pages() {
        let Some(xobjects) = page_resources(doc, page_id)
            .and_then(|r| r.get(b"XObject").ok())
            .and_then(|x| resolve_dict(doc, x))
        else {
            continue;
        };

        let mut index = 0;
        for (name, value) in xobjects.iter() {
            let Some(Object::Stream(stream)) = resolve(doc, value) else {
                continue;
            };
            if !is_image(stream) {
                continue;
            }
            let name = String::from_utf8_lossy(name).to_string();
            match image_from_stream(doc, stream, &name) {
                Ok(image) => {
                    images.push(PageImage {
                        page,
                        index,
                        flips: String::new(),
                        image,
                    });
                    index += 1;
                }
                Err(e) => log::warn!("Skipping image {} on page {}: {}", name, page, e),
            }
        }
    }
    Ok(images)
}

/// Collects images reported by the engine.
struct ImageCollector {
    found: Vec<(String, ExtractedImage)>,
}

impl ContentHandler for ImageCollector {
    fn draw_image(&mut self, doc: &LopdfDocument, image: &ImageDraw<'_>) {
        let name = String::from_utf8_lossy(image.name).to_string();
        match image_from_stream(doc, image.stream, &name) {
            Ok(extracted) => self.found.push((flip_marker(&image.ctm), extracted)),
            Err(e) => log::warn!("Skipping image {}: {}", name, e),
        }
    }
}

/// Every image drawn by the page contents, including inside form XObjects.
pub fn extract_page_images(doc: &LopdfDocument) -> Result<Vec<PageImage>> {
    let mut images = Vec::new();
    for (page, page_id) in doc.get_pages() {
        let mut collector = ImageCollector { found: Vec::new() };
        StreamEngine::new(doc).process_page(page_id, &mut collector)?;
        images.extend(
            collector
                .found
                .into_iter()
                .enumerate()
                .map(|(index, (flips, image))| PageImage {
                    page,
                    index,
                    flips,
                    image,
                }),
        );
    }
    log::debug!("Found {} drawn images", images.len());
    Ok(images)
}

/// Appearance streams of the annotations of a page, keyed as in
/// [`AnnotationImage::key`].
pub fn annotation_appearances(doc: &LopdfDocument, page_id: ObjectId) -> BTreeMap<String, &Stream> {
    const ENTRIES: [(&[u8], &str); 3] = [
        (b"D".as_slice(), "Down"),
        (b"N".as_slice(), "Normal"),
        (b"R".as_slice(), "Rollover"),
    ];

    let mut streams = BTreeMap::new();
    for (number, (_, annotation)) in annotations_of(doc, page_id).into_iter().enumerate() {
        let number = number + 1;
        let Some(appearance) = annotation
            .get(b"AP")
            .ok()
            .and_then(|ap| resolve_dict(doc, ap))
        else {
            continue;
        };
        for (key, label) in ENTRIES {
            match appearance.get(key).ok().and_then(|e| resolve(doc, e)) {
                Some(Object::Stream(stream)) => {
                    streams.insert(format!("{}-{}", number, label), stream);
                }
                Some(Object::Dictionary(states)) => {
                    for (state, value) in states.iter() {
                        if let Some(Object::Stream(stream)) = resolve(doc, value) {
                            let state = String::from_utf8_lossy(state);
                            streams.insert(format!("{}-{}.{}", number, label, state), stream);
                        }
                    }
                }
                _ => {}
            }
        }
    }
    streams
}

/// Images drawn by annotation appearance streams (for example signature
/// stamps).
pub fn extract_annotation_images(doc: &LopdfDocument) -> Result<Vec<AnnotationImage>> {
    let mut images = Vec::new();
    for (page, page_id) in doc.get_pages() {
        for (key, stream) in annotation_appearances(doc, page_id) {
            let mut collector = ImageCollector { found: Vec::new() };
            StreamEngine::new(doc).process_form_stream(stream, page_id, &mut collector)?;
            for (flips, image) in collector.found {
                images.push(AnnotationImage {
                    page,
                    key: key.clone(),
                    flips,
                    image,
                });
            }
        }
    }
    Ok(images)
}

fn is_image(stream: &Stream) -> bool {
    matches!(
        stream.dict.get(b"Subtype").and_then(|s| s.as_name()),
        Ok(b"Image")
    )
}

fn filters(doc: &LopdfDocument, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").ok().and_then(|f| resolve(doc, f)) {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(names)) => names
            .iter()
            .filter_map(|n| n.as_name().ok())
            .map(|n| n.to_vec())
            .collect(),
        _ => Vec::new(),
    }
}

fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    ZlibDecoder::new(data)
        .read_to_end(&mut out)
        .map_err(|e| Error::ImageExtract(format!("FlateDecode: {}", e)))?;
    Ok(out)
}

fn decode_hex(data: &[u8]) -> Vec<u8> {
    let digits: Vec<u8> = data
        .iter()
        .take_while(|&&b| b != b'>')
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    digits
        .chunks(2)
        .map(|pair| (pair[0] << 4) | pair.get(1).copied().unwrap_or(0))
        .collect()
}

/// `/DecodeParms` entry belonging to the filter at `index`.
fn decode_parms<'a>(
    doc: &'a LopdfDocument,
    stream: &'a Stream,
    index: usize,
) -> Option<&'a Dictionary> {
    match stream.dict.get(b"DecodeParms").ok().and_then(|p| resolve(doc, p))? {
        Object::Dictionary(parms) if index == 0 => Some(parms),
        Object::Array(items) => items.get(index).and_then(|p| resolve_dict(doc, p)),
        _ => None,
    }
}

/// Undo a PNG (10-15) or TIFF (2) predictor.
fn unpredict(data: Vec<u8>, parms: &Dictionary) -> Result<Vec<u8>> {
    let int = |key: &[u8], default: i64| parms.get(key).and_then(Object::as_i64).unwrap_or(default);
    let predictor = int(b"Predictor", 1);
    let colors = int(b"Colors", 1).clamp(1, 32) as usize;
    let bits = int(b"BitsPerComponent", 8).clamp(1, 16) as usize;
    let columns = int(b"Columns", 1).max(1) as usize;
    let pixel_bytes = (colors * bits + 7) / 8;
    let row_bytes = columns
        .checked_mul(colors * bits)
        .map(|row_bits| (row_bits + 7) / 8)
        .ok_or_else(|| Error::ImageExtract(format!("predictor row of {} columns", columns)))?;

    match predictor {
        1 => Ok(data),
        2 if bits == 8 => {
            let mut out = data;
            for row in out.chunks_mut(row_bytes) {
                for i in pixel_bytes..row.len() {
                    row[i] = row[i].wrapping_add(row[i - pixel_bytes]);
                }
            }
            Ok(out)
        }
        10..=15 => {
            let mut out = Vec::with_capacity(data.len());
            let mut prev = vec![0u8; row_bytes];
            for encoded in data.chunks(row_bytes + 1) {
                let Some((&kind, row)) = encoded.split_first() else { continue };
                let start = out.len();
                for i in 0..row_bytes {
                    let raw = row.get(i).copied().unwrap_or(0);
                    let left = if i >= pixel_bytes { out[start + i - pixel_bytes] } else { 0 };
                    let up = prev[i];
                    let up_left = if i >= pixel_bytes { prev[i - pixel_bytes] } else { 0 };
                    let value = match kind {
                        0 => raw,
                        1 => raw.wrapping_add(left),
                        2 => raw.wrapping_add(up),
                        3 => raw.wrapping_add(((left as u16 + up as u16) / 2) as u8),
                        4 => raw.wrapping_add(paeth(left, up, up_left)),
                        other => {
                            return Err(Error::ImageExtract(format!(
                                "unknown PNG row filter {}",
                                other
                            )))
                        }
                    };
                    out.push(value);
                }
                prev.copy_from_slice(&out[start..]);
            }
            Ok(out)
        }
        other => Err(Error::ImageExtract(format!("unsupported predictor {}", other))),
    }
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let (pa, pb, pc) = ((p - a as i16).abs(), (p - b as i16).abs(), (p - c as i16).abs());
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Apply the general-purpose filters `chain` to `data`, in order.
fn decode_filters(
    doc: &LopdfDocument,
    stream: &Stream,
    chain: &[Vec<u8>],
    name: &str,
) -> Result<Vec<u8>> {
    let mut data = stream.content.clone();
    for (index, filter) in chain.iter().enumerate() {
        data = match filter.as_slice() {
            b"FlateDecode" | b"Fl" => {
                let inflated = inflate(&data)?;
                match decode_parms(doc, stream, index) {
                    Some(parms) => unpredict(inflated, parms)?,
                    None => inflated,
                }
            }
            b"ASCIIHexDecode" | b"AHx" => decode_hex(&data),
            other => {
                return Err(Error::ImageExtract(format!(
                    "{}: unsupported filter {}",
                    name,
                    String::from_utf8_lossy(other)
                )))
            }
        };
    }
    Ok(data)
}

/// Read a positive `/Width` or `/Height`.
fn dimension(value: Option<i64>, key: &str, name: &str) -> Result<u32> {
    match value {
        Some(v) if v > 0 && v <= MAX_IMAGE_SIDE => Ok(v as u32),
        Some(v) => Err(Error::ImageExtract(format!("{}: invalid /{} {}", name, key, v))),
        None => Err(Error::ImageExtract(format!("{}: missing /{}", name, key))),
    }
}

/// Turn an image XObject into an [`ExtractedImage`].
///
/// Streams ending in an image codec filter keep their encoded bytes;
/// everything else is decoded to raw samples.
pub fn image_from_stream(
    doc: &LopdfDocument,
    stream: &Stream,
    name: &str,
) -> Result<ExtractedImage> {
    let dict = &stream.dict;
    let int = |key: &[u8]| {
        dict.get(key)
            .ok()
            .and_then(|o| resolve(doc, o))
            .and_then(|o| o.as_i64().ok())
    };
    let width = dimension(int(b"Width"), "Width", name)?;
    let height = dimension(int(b"Height"), "Height", name)?;
    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));

    let chain = filters(doc, stream);
    let codec = chain.last().and_then(|f| match f.as_slice() {
        b"DCTDecode" | b"DCT" => Some(ImageFormat::Jpeg),
        b"JPXDecode" => Some(ImageFormat::Jpx),
        b"JBIG2Decode" => Some(ImageFormat::Jbig2),
        b"CCITTFaxDecode" | b"CCF" => Some(ImageFormat::Ccitt),
        _ => None,
    });

    let (format, data) = match codec {
        // undo any general-purpose filters in front of the codec
        Some(format) => (format, decode_filters(doc, stream, &chain[..chain.len() - 1], name)?),
        None => (ImageFormat::Raw, decode_filters(doc, stream, &chain, name)?),
    };

    let color_space = if is_mask {
        ImageColorSpace::Gray
    } else {
        match dict.get(b"ColorSpace").ok() {
            Some(cs) => image_color_space(doc, cs),
            None if format == ImageFormat::Jpeg => jpeg_color_space(&data),
            None => ImageColorSpace::Gray,
        }
    };
    let bits = if is_mask { 1 } else { int(b"BitsPerComponent").unwrap_or(8) as u8 };

    let decode_inverted = dict
        .get(b"Decode")
        .ok()
        .and_then(|d| resolve(doc, d))
        .and_then(|d| d.as_array().ok())
        .and_then(|d| d.first())
        .and_then(|v| v.as_float().ok())
        .map_or(false, |first| first == 1.0);

    let mut image = ExtractedImage::new(data, format, width, height)
        .with_name(name)
        .with_color_space(color_space)
        .with_bits_per_component(bits);
    image.is_mask = is_mask;
    image.inverted = decode_inverted;
    Ok(image)
}

fn jpeg_color_space(data: &[u8]) -> ImageColorSpace {
    match parse_jpeg(data).map(|info| info.components) {
        Some(1) => ImageColorSpace::Gray,
        Some(4) => ImageColorSpace::Cmyk,
        _ => ImageColorSpace::Rgb,
    }
}

/// Map an image `/ColorSpace` entry.
pub fn image_color_space(doc: &LopdfDocument, cs: &Object) -> ImageColorSpace {
    let Some(cs) = resolve(doc, cs) else {
        return ImageColorSpace::Unknown("unresolvable".to_string());
    };
    match cs {
        Object::Name(name) => family_color_space(name),
        Object::Array(items) => {
            let family = items.first().and_then(|f| f.as_name().ok()).unwrap_or(b"");
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|s| resolve(doc, s))
                        .and_then(|s| s.as_stream().ok())
                        .and_then(|s| s.dict.get(b"N").ok())
                        .and_then(|n| n.as_i64().ok());
                    match n {
                        Some(1) => ImageColorSpace::Gray,
                        Some(3) => ImageColorSpace::Rgb,
                        Some(4) => ImageColorSpace::Cmyk,
                        _ => ImageColorSpace::Unknown("ICCBased".to_string()),
                    }
                }
                b"Indexed" | b"I" => {
                    let base = items
                        .get(1)
                        .map(|b| image_color_space(doc, b))
                        .unwrap_or(ImageColorSpace::Rgb);
                    let hival = items
                        .get(2)
                        .and_then(|h| resolve(doc, h))
                        .and_then(|h| h.as_i64().ok())
                        .unwrap_or(255)
                        .clamp(0, 255) as u8;
                    let palette = match items.get(3).and_then(|l| resolve(doc, l)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(s)) => s
                            .decompressed_content()
                            .unwrap_or_else(|_| s.content.clone()),
                        _ => Vec::new(),
                    };
                    ImageColorSpace::Indexed {
                        base: Box::new(base),
                        hival,
                        palette,
                    }
                }
                other => family_color_space(other),
            }
        }
        _ => ImageColorSpace::Unknown("invalid".to_string()),
    }
}

fn family_color_space(name: &[u8]) -> ImageColorSpace {
    match name {
        b"DeviceGray" | b"G" | b"CalGray" => ImageColorSpace::Gray,
        b"DeviceRGB" | b"RGB" | b"CalRGB" => ImageColorSpace::Rgb,
        b"DeviceCMYK" | b"CMYK" => ImageColorSpace::Cmyk,
        other => ImageColorSpace::Unknown(String::from_utf8_lossy(other).to_string()),
    }
}

/// Unpack `bits`-wide samples, each row starting on a byte boundary.
fn unpack_samples(
    data: &[u8],
    width: usize,
    height: usize,
    components: usize,
    bits: u8,
) -> Result<Vec<u8>> {
    let per_row = width
        .checked_mul(components)
        .filter(|&n| n.checked_mul(height).map_or(false, |total| total <= MAX_SAMPLES))
        .ok_or_else(|| {
            Error::ImageExtract(format!("{}x{} image is too large to convert", width, height))
        })?;
    let bits = bits as usize;
    let row_bytes = (per_row * bits + 7) / 8;
    let needed = row_bytes * height;
    if data.len() < needed {
        return Err(Error::ImageExtract(format!(
            "expected {} bytes of samples, found {}",
            needed,
            data.len()
        )));
    }

    let data = &data[..needed];
    match bits {
        8 => Ok(data.to_vec()),
        16 => Ok(data.chunks_exact(2).map(|c| c[0]).collect()),
        _ => {
            let mask = (1u16 << bits) - 1;
            let mut samples = Vec::with_capacity(per_row * height);
            for row in data.chunks_exact(row_bytes) {
                for i in 0..per_row {
                    let bit = i * bits;
                    let shift = 8 - bits - (bit % 8);
                    samples.push(((row[bit / 8] as u16 >> shift) & mask) as u8);
                }
            }
            Ok(samples)
        }
    }
}

fn scale_to_8bit(samples: &mut [u8], bits: u8) {
    if bits < 8 {
        let max = ((1u16 << bits) - 1) as u16;
        for s in samples.iter_mut() {
            *s = (*s as u16 * 255 / max) as u8;
        }
    }
}

fn cmyk_to_rgb(cmyk: &[u8], inverted: bool) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(cmyk.len() / 4 * 3);
    for px in cmyk.chunks_exact(4) {
        let v = |i: usize| {
            let s = px[i] as f32 / 255.0;
            if inverted {
                1.0 - s
            } else {
                s
            }
        };
        let k = v(3);
        for i in 0..3 {
            rgb.push((255.0 * (1.0 - v(i)) * (1.0 - k)).round() as u8);
        }
    }
    rgb
}

/// Expand raw samples into 8-bit gray or RGB pixels for PNG output.
fn to_pixels(image: &ExtractedImage) -> Result<(png::ColorType, Vec<u8>)> {
    let (w, h) = (image.width as usize, image.height as usize);
    let bits = image.bits_per_component;
    if !matches!(bits, 1 | 2 | 4 | 8 | 16) {
        return Err(Error::ImageExtract(format!(
            "{}: unsupported {} bits per component",
            image.name, bits
        )));
    }

    match &image.color_space {
        ImageColorSpace::Indexed {
            base,
            hival,
            palette,
        } => {
            let indices = unpack_samples(&image.data, w, h, 1, bits)
                .map_err(|e| Error::ImageExtract(format!("{}: {}", image.name, e)))?;
            let n = base.components();
            let mut expanded = Vec::with_capacity(indices.len() * n);
            for index in indices {
                let index = index.min(*hival) as usize;
                for c in 0..n {
                    expanded.push(palette.get(index * n + c).copied().unwrap_or(0));
                }
            }
            let base_image = ExtractedImage {
                data: expanded,
                bits_per_component: 8,
                color_space: (**base).clone(),
                ..image.clone()
            };
            to_pixels(&base_image)
        }
        ImageColorSpace::Gray | ImageColorSpace::Rgb | ImageColorSpace::Cmyk => {
            let n = image.color_space.components();
            let mut samples = unpack_samples(&image.data, w, h, n, bits)
                .map_err(|e| Error::ImageExtract(format!("{}: {}", image.name, e)))?;
            scale_to_8bit(&mut samples, bits);
            match image.color_space {
                ImageColorSpace::Gray => {
                    if image.inverted {
                        samples.iter_mut().for_each(|s| *s = 255 - *s);
                    }
                    Ok((png::ColorType::Grayscale, samples))
                }
                ImageColorSpace::Rgb => Ok((png::ColorType::Rgb, samples)),
                _ => Ok((png::ColorType::Rgb, cmyk_to_rgb(&samples, image.inverted))),
            }
        }
        ImageColorSpace::Unknown(name) => Err(Error::ImageExtract(format!(
            "{}: cannot convert colour space {}",
            image.name, name
        ))),
    }
}

/// Encode raw samples as PNG.
pub fn encode_png(image: &ExtractedImage) -> Result<Vec<u8>> {
    let (color, pixels) = to_pixels(image)?;
    let mut out = Vec::new();
    {
        let mut encoder = png::Encoder::new(&mut out, image.width, image.height);
        encoder.set_color(color);
        encoder.set_depth(png::BitDepth::Eight);
        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;
    }
    Ok(out)
}

/// Writes extracted images into a directory.
#[derive(Debug, Clone)]
pub struct ImageWriter {
    dir: PathBuf,
}

impl ImageWriter {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    /// Write `image` as `file_name` and return the written path.
    ///
    /// Codec streams are copied verbatim, raw samples are encoded as PNG.
    /// Samples that cannot be converted are written unchanged with a `.bin`
    /// extension instead.
    pub fn write(&self, image: &ExtractedImage, file_name: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(file_name);
        if image.format != ImageFormat::Raw {
            std::fs::write(&path, &image.data)?;
            return Ok(path);
        }
        match encode_png(image) {
            Ok(png) => {
                std::fs::write(&path, png)?;
                Ok(path)
            }
            Err(e) => {
                log::warn!("Writing {} unconverted: {}", file_name, e);
                let path = path.with_extension("bin");
                std::fs::write(&path, &image.data)?;
                Ok(path)
            }
        }
    }
}
