//! Object-store access: XObject resolution, font descriptors, metadata.
//!
//! Image bytes are recovered by trying, in order: the raw compressed
//! stream (DCT/JPX streams are already JPEG/PNG container bytes), the
//! decompressed stream, and finally a raw RGB/RGBA pixel interpretation
//! re-encoded as PNG. Anything that fails all three is dropped by the
//! caller.

use super::{resolve, RawImageRef};
use crate::model::{FontDescriptor, ImageFormat};
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;
use std::io::Cursor;
use tracing::debug;

/// A fully resolved image paint: encoded bytes plus placement matrix.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub ctm: [f32; 6],
}

/// Resolve an image reference to encoded bytes. `None` means the image
/// is dropped (missing object, undecodable bytes, pixel-length mismatch).
pub(crate) fn resolve_image(doc: &Document, image_ref: &RawImageRef) -> Option<ResolvedImage> {
    match image_ref {
        RawImageRef::XObject { id, ctm } => {
            let Ok(Object::Stream(stream)) = doc.get_object(*id) else {
                debug!("image object {:?} missing or not a stream", id);
                return None;
            };

            // Raw stream bytes: DCTDecode streams are JPEG files as-is.
            if let Some(format) = ImageFormat::detect(&stream.content) {
                return Some(ResolvedImage {
                    bytes: stream.content.clone(),
                    format,
                    ctm: *ctm,
                });
            }

            let px_width = dict_i64(&stream.dict, b"Width").unwrap_or(0);
            let px_height = dict_i64(&stream.dict, b"Height").unwrap_or(0);

            if let Ok(data) = stream.decompressed_content() {
                if let Some(format) = ImageFormat::detect(&data) {
                    return Some(ResolvedImage {
                        bytes: data,
                        format,
                        ctm: *ctm,
                    });
                }
                if px_width > 0 && px_height > 0 {
                    if let Some(png) =
                        png_from_raw(&data, px_width as u32, px_height as u32)
                    {
                        return Some(ResolvedImage {
                            bytes: png,
                            format: ImageFormat::Png,
                            ctm: *ctm,
                        });
                    }
                }
            }
            debug!("image object {:?}: no usable byte representation", id);
            None
        }
        RawImageRef::Inline {
            data,
            px_width,
            px_height,
            ctm,
        } => {
            if let Some(format) = ImageFormat::detect(data) {
                return Some(ResolvedImage {
                    bytes: data.clone(),
                    format,
                    ctm: *ctm,
                });
            }
            if *px_width > 0 && *px_height > 0 {
                if let Some(png) = png_from_raw(data, *px_width as u32, *px_height as u32) {
                    return Some(ResolvedImage {
                        bytes: png,
                        format: ImageFormat::Png,
                        ctm: *ctm,
                    });
                }
            }
            None
        }
    }
}

/// Interpret a buffer as packed 8-bit RGB or RGBA pixels and re-encode as
/// PNG. Returns `None` when neither interpretation fits the dimensions.
fn png_from_raw(data: &[u8], width: u32, height: u32) -> Option<Vec<u8>> {
    let pixels = (width as usize).checked_mul(height as usize)?;
    let dynamic = if data.len() == pixels * 3 {
        image::RgbImage::from_raw(width, height, data.to_vec()).map(image::DynamicImage::ImageRgb8)
    } else if data.len() == pixels * 4 {
        image::RgbaImage::from_raw(width, height, data.to_vec())
            .map(image::DynamicImage::ImageRgba8)
    } else {
        None
    }?;

    let mut buf = Vec::new();
    dynamic
        .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
        .ok()?;
    Some(buf)
}

// ── Page dictionaries ────────────────────────────────────────────────────

fn dict_i64(dict: &Dictionary, key: &[u8]) -> Option<i64> {
    dict.get(key).ok().and_then(|o| o.as_i64().ok())
}

/// Walk the page's Parent chain for an (inheritable) key.
fn inherited<'a>(doc: &'a Document, page_id: ObjectId, key: &[u8]) -> Option<&'a Object> {
    let mut current = Some(page_id);
    while let Some(id) = current {
        let dict = match doc.get_dictionary(id) {
            Ok(d) => d,
            Err(_) => return None,
        };
        if let Ok(obj) = dict.get(key) {
            return Some(resolve(doc, obj));
        }
        current = dict.get(b"Parent").ok().and_then(|o| o.as_reference().ok());
    }
    None
}

/// MediaBox width/height in PDF units, defaulting to US Letter.
pub(crate) fn page_media_box(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    if let Some(Object::Array(rect)) = inherited(doc, page_id, b"MediaBox") {
        let nums: Vec<f32> = rect
            .iter()
            .map(|o| super::get_number(resolve(doc, o)).unwrap_or(0.0))
            .collect();
        if nums.len() == 4 {
            return ((nums[2] - nums[0]).abs(), (nums[3] - nums[1]).abs());
        }
    }
    (612.0, 792.0)
}

/// Resource name → image XObject id map for one page.
pub(crate) fn xobject_map(doc: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, ObjectId> {
    let mut map = HashMap::new();
    let Some(Object::Dictionary(resources)) = inherited(doc, page_id, b"Resources") else {
        return map;
    };
    let Ok(xobjects) = resources.get(b"XObject") else {
        return map;
    };
    if let Object::Dictionary(xobjects) = resolve(doc, xobjects) {
        for (name, obj) in xobjects.iter() {
            if let Ok(id) = obj.as_reference() {
                map.insert(name.clone(), id);
            }
        }
    }
    map
}

/// Whether the XObject is an image (forms are skipped).
pub(crate) fn is_image_xobject(doc: &Document, id: ObjectId) -> bool {
    let Ok(Object::Stream(stream)) = doc.get_object(id) else {
        return false;
    };
    stream
        .dict
        .get(b"Subtype")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| n == b"Image")
        .unwrap_or(false)
}

// ── Fonts ────────────────────────────────────────────────────────────────

/// Stable font id: the BaseFont name with any subset prefix
/// (`ABCDEF+`) stripped, falling back to the resource name.
pub(crate) fn base_font_id(dict: &Dictionary, fallback: &str) -> String {
    let base = dict
        .get(b"BaseFont")
        .ok()
        .and_then(|o| o.as_name().ok())
        .map(|n| String::from_utf8_lossy(n).to_string());
    match base {
        Some(name) => match name.split_once('+') {
            Some((_, rest)) if !rest.is_empty() => rest.to_string(),
            _ => name,
        },
        None => fallback.to_string(),
    }
}

/// Build a [`FontDescriptor`] for a page font. Descriptor fetch failures
/// degrade to name-only heuristics (weight and angle stay `None`).
pub(crate) fn font_descriptor(
    doc: &Document,
    dict: &Dictionary,
    resource_name: &str,
) -> FontDescriptor {
    let id = base_font_id(dict, resource_name);
    let name = id.clone();

    let mut weight = None;
    let mut italic_angle = None;
    if let Some(desc) = descriptor_dict(doc, dict) {
        weight = dict_i64(desc, b"FontWeight");
        italic_angle = desc
            .get(b"ItalicAngle")
            .ok()
            .and_then(|o| super::get_number(resolve(doc, o)));
    }

    FontDescriptor {
        id,
        name,
        weight,
        italic_angle,
    }
}

/// The font's descriptor dictionary, looking through Type0 descendant
/// fonts when needed.
fn descriptor_dict<'a>(doc: &'a Document, font: &'a Dictionary) -> Option<&'a Dictionary> {
    if let Ok(obj) = font.get(b"FontDescriptor") {
        if let Object::Dictionary(d) = resolve(doc, obj) {
            return Some(d);
        }
    }
    // Type0: the descriptor lives on the first descendant font.
    if let Ok(obj) = font.get(b"DescendantFonts") {
        if let Object::Array(arr) = resolve(doc, obj) {
            if let Some(first) = arr.first() {
                if let Object::Dictionary(descendant) = resolve(doc, first) {
                    if let Ok(obj) = descendant.get(b"FontDescriptor") {
                        if let Object::Dictionary(d) = resolve(doc, obj) {
                            return Some(d);
                        }
                    }
                }
            }
        }
    }
    None
}

// ── Metadata ─────────────────────────────────────────────────────────────

/// Title from the info dictionary, when present and non-empty.
pub(crate) fn info_title(doc: &Document) -> Option<String> {
    let info = doc.trailer.get(b"Info").ok()?;
    let Object::Dictionary(info) = resolve(doc, info) else {
        return None;
    };
    let title = info.get(b"Title").ok()?;
    if let Object::String(bytes, _) = resolve(doc, title) {
        let text = decode_pdf_string(bytes);
        let trimmed = text.trim();
        if !trimmed.is_empty() {
            return Some(trimmed.to_string());
        }
    }
    None
}

/// PDF text-string decoding: UTF-16BE with BOM, else PDFDocEncoding
/// approximated as Latin-1.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    bytes.iter().map(|&b| b as char).collect()
}
