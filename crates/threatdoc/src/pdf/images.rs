//! Page image extraction for the OCR fallback.

use std::io::Cursor;

use image::{DynamicImage, GrayImage, ImageFormat, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use super::error::{PdfError, Result};

const MAX_PARENT_DEPTH: usize = 32;

/// An image ready for OCR, encoded as JPEG or PNG.
#[derive(Debug, Clone)]
pub struct PageImage {
    pub object_id: ObjectId,
    pub bytes: Vec<u8>,
}

/// Images found on one page plus the ones that had to be skipped.
#[derive(Debug, Default)]
pub struct PageImages {
    pub images: Vec<PageImage>,
    pub skipped: Vec<String>,
}

fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    match object {
        Object::Reference(id) => document.get_object(*id).ok(),
        other => Some(other),
    }
}

fn as_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}

fn name_of(document: &Document, object: &Object) -> Option<Vec<u8>> {
    match resolve(document, object)? {
        Object::Name(name) => Some(name.clone()),
        _ => None,
    }
}

/// Resources of a page, following `Parent` links for inherited entries.
fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    let mut node = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_PARENT_DEPTH {
        if let Some(resources) = node.get(b"Resources").ok().and_then(|r| as_dict(document, r)) {
            return Some(resources);
        }
        let parent = node.get(b"Parent").ok()?;
        node = as_dict(document, parent)?;
    }
    None
}

fn filters(document: &Document, stream: &Stream) -> Vec<Vec<u8>> {
    match stream.dict.get(b"Filter").ok().and_then(|f| resolve(document, f)) {
        Some(Object::Name(name)) => vec![name.clone()],
        Some(Object::Array(items)) => items.iter().filter_map(|item| name_of(document, item)).collect(),
        _ => Vec::new(),
    }
}

fn integer(document: &Document, dict: &Dictionary, key: &[u8]) -> Option<u32> {
    match resolve(document, dict.get(key).ok()?)? {
        Object::Integer(value) => u32::try_from(*value).ok(),
        _ => None,
    }
}

fn encode_png(image: DynamicImage) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image
        .write_to(&mut buffer, ImageFormat::Png)
        .map_err(|e| PdfError::ImageExtractionFailed(e.to_string()))?;
    Ok(buffer.into_inner())
}

fn raster_to_png(document: &Document, stream: &Stream, samples: Vec<u8>) -> std::result::Result<Vec<u8>, String> {
    let width = integer(document, &stream.dict, b"Width").ok_or("missing Width")?;
    let height = integer(document, &stream.dict, b"Height").ok_or("missing Height")?;
    let bits = integer(document, &stream.dict, b"BitsPerComponent").unwrap_or(8);
    if bits != 8 {
        return Err(format!("{} bits per component", bits));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .and_then(|cs| name_of(document, cs))
        .unwrap_or_default();

    let image = match color_space.as_slice() {
        b"DeviceGray" => GrayImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageLuma8)
            .ok_or("sample buffer does not match dimensions")?,
        b"DeviceRGB" => RgbImage::from_raw(width, height, samples)
            .map(DynamicImage::ImageRgb8)
            .ok_or("sample buffer does not match dimensions")?,
        other => return Err(format!("color space {}", String::from_utf8_lossy(other))),
    };

    encode_png(image).map_err(|e| e.to_string())
}

fn image_bytes(document: &Document, stream: &Stream) -> std::result::Result<Vec<u8>, String> {
    let filters = filters(document, stream);
    match filters.iter().map(Vec::as_slice).collect::<Vec<_>>().as_slice() {
        [b"DCTDecode"] => Ok(stream.content.clone()),
        [b"FlateDecode"] => {
            let samples = stream.decompressed_content().map_err(|e| e.to_string())?;
            raster_to_png(document, stream, samples)
        }
        [] => raster_to_png(document, stream, stream.content.clone()),
        other => Err(format!(
            "unsupported filter chain {:?}",
            other.iter().map(|f| String::from_utf8_lossy(f)).collect::<Vec<_>>()
        )),
    }
}

/// Collect the image XObjects drawn on `page_id`.
pub fn page_images(document: &Document, page_id: ObjectId) -> PageImages {
    let mut result = PageImages::default();

    let Some(xobjects) = page_resources(document, page_id)
        .and_then(|resources| resources.get(b"XObject").ok())
        .and_then(|x| as_dict(document, x))
    else {
        return result;
    };

    for (name, object) in xobjects.iter() {
        let Object::Reference(object_id) = object else {
            continue;
        };
        let Ok(Object::Stream(stream)) = document.get_object(*object_id) else {
            continue;
        };
        let is_image = stream
            .dict
            .get(b"Subtype")
            .ok()
            .and_then(|s| name_of(document, s))
            .is_some_and(|subtype| subtype == b"Image");
        if !is_image {
            continue;
        }

        match image_bytes(document, stream) {
            Ok(bytes) => result.images.push(PageImage {
                object_id: *object_id,
                bytes,
            }),
            Err(reason) => {
                let name = String::from_utf8_lossy(name);
                tracing::debug!(image = %name, "Skipping PDF image: {}", reason);
                result.skipped.push(format!("{}: {}", name, reason));
            }
        }
    }

    result
}
