//! Content-stream walker: operator list → positioned text and image refs.
//!
//! Tracks the text matrix (`BT`/`ET`, `Tf`, `Td`/`TD`, `Tm`, `T*`,
//! `Tj`/`TJ`/`'`/`"`) and a CTM stack (`q`/`Q`/`cm`) so image paint sites
//! carry the matrix in effect at `Do` time. Run widths are estimated from
//! em-fraction classes and the matrix is advanced accordingly, so
//! successive runs on one line carry ascending X positions.

use super::{get_number, RawImageRef, RawPage, RawTextItem};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;
use tracing::{debug, warn};

type Mat = [f32; 6];

const IDENTITY: Mat = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

/// `T(tx, ty) × m` — the translation applied in text space.
fn translated(m: Mat, tx: f32, ty: f32) -> Mat {
    [
        m[0],
        m[1],
        m[2],
        m[3],
        tx * m[0] + ty * m[2] + m[4],
        tx * m[1] + ty * m[3] + m[5],
    ]
}

/// `op × m` — matrix concatenation as performed by `cm`.
fn concat(op: Mat, m: Mat) -> Mat {
    [
        op[0] * m[0] + op[1] * m[2],
        op[0] * m[1] + op[1] * m[3],
        op[2] * m[0] + op[3] * m[2],
        op[2] * m[1] + op[3] * m[3],
        op[4] * m[0] + op[5] * m[2] + m[4],
        op[4] * m[1] + op[5] * m[3] + m[5],
    ]
}

/// Horizontal scale of a text matrix.
fn scale_of(m: Mat) -> f32 {
    let s = (m[0] * m[0] + m[1] * m[1]).sqrt();
    if s > 0.0 {
        s
    } else {
        1.0
    }
}

/// Scripts written without inter-word spaces (advance a full em).
fn is_cjk(c: char) -> bool {
    let code = c as u32;
    (0x4E00..=0x9FFF).contains(&code)
        || (0x3400..=0x4DBF).contains(&code)
        || (0x20000..=0x2EBEF).contains(&code)
        || (0x3040..=0x30FF).contains(&code)
        || (0x3000..=0x303F).contains(&code)
        || (0xFF00..=0xFFEF).contains(&code)
}

/// Estimated advance of one glyph in em units. Without parsing the font's
/// width table the best stable estimate is a class-based one: a full em
/// for CJK and full-width forms, half an em otherwise.
fn char_em(c: char) -> f32 {
    if is_cjk(c) {
        1.0
    } else {
        0.5
    }
}

fn text_em_width(s: &str) -> f32 {
    s.chars().map(char_em).sum()
}

/// Fallback decoding when the font carries no usable encoding.
fn decode_text_simple(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|c| u16::from_be_bytes([c[0], c[1]]))
            .collect();
        return String::from_utf16_lossy(&utf16);
    }
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }
    bytes.iter().map(|&b| b as char).collect()
}

/// Decode a show-operand string through the current font's encoding.
fn decode_bytes(doc: &Document, font_dict: Option<&&Dictionary>, bytes: &[u8]) -> String {
    if let Some(fd) = font_dict {
        if let Ok(encoding) = fd.get_font_encoding(doc) {
            if let Ok(text) = Document::decode_text(&encoding, bytes) {
                return text;
            }
        }
    }
    decode_text_simple(bytes)
}

/// Walk one page's content streams. Content defects yield an empty page.
pub(crate) fn walk_page(doc: &Document, page_id: ObjectId, index: usize) -> RawPage {
    let (page_width, page_height) = super::objects::page_media_box(doc, page_id);
    let mut page = RawPage {
        index,
        width: page_width,
        height: page_height,
        ..Default::default()
    };

    let content_data = match doc.get_page_content(page_id) {
        Ok(data) => data,
        Err(e) => {
            warn!("page {}: unreadable content stream: {}", index + 1, e);
            return page;
        }
    };
    let content = match Content::decode(&content_data) {
        Ok(c) => c,
        Err(e) => {
            warn!("page {}: content decode failed: {}", index + 1, e);
            return page;
        }
    };

    let lopdf_fonts: BTreeMap<Vec<u8>, &Dictionary> =
        doc.get_page_fonts(page_id).unwrap_or_default();
    for (resource_name, font_dict) in &lopdf_fonts {
        page.fonts.push(super::objects::font_descriptor(
            doc,
            font_dict,
            &String::from_utf8_lossy(resource_name),
        ));
    }
    let xobjects = super::objects::xobject_map(doc, page_id);

    let mut ctm: Mat = IDENTITY;
    let mut ctm_stack: Vec<Mat> = Vec::new();
    let mut tm: Mat = IDENTITY;
    let mut lm: Mat = IDENTITY;
    let mut in_text = false;
    let mut leading: f32 = 0.0;
    let mut font_size: f32 = 12.0;
    let mut font_resource: Vec<u8> = Vec::new();
    let mut font_id = String::from("unknown");

    // Kerning gaps beyond this many 1/1000 em are treated as word spaces.
    const TJ_SPACE_THRESHOLD: f32 = 200.0;

    let show = |tm: &mut Mat,
                    texts: &mut Vec<RawTextItem>,
                    text: String,
                    advance: f32,
                    size: f32,
                    font_id: &str| {
        let scale = scale_of(*tm);
        if !text.trim().is_empty() {
            texts.push(RawTextItem {
                transform: *tm,
                width: advance * scale,
                height: size * scale,
                text,
                font_id: font_id.to_string(),
            });
        }
        *tm = translated(*tm, advance, 0.0);
    };

    for op in &content.operations {
        match op.operator.as_str() {
            "BT" => {
                in_text = true;
                tm = IDENTITY;
                lm = IDENTITY;
            }
            "ET" => in_text = false,
            "Tf" => {
                if op.operands.len() >= 2 {
                    if let Ok(name) = op.operands[0].as_name() {
                        font_resource = name.to_vec();
                        font_id = lopdf_fonts
                            .get(name)
                            .map(|d| super::objects::base_font_id(d, &String::from_utf8_lossy(name)))
                            .unwrap_or_else(|| String::from_utf8_lossy(name).to_string());
                    }
                    font_size = get_number(&op.operands[1]).unwrap_or(12.0);
                }
            }
            "TL" => {
                if let Some(l) = op.operands.first().and_then(get_number) {
                    leading = l;
                }
            }
            "Td" | "TD" => {
                if op.operands.len() >= 2 {
                    let tx = get_number(&op.operands[0]).unwrap_or(0.0);
                    let ty = get_number(&op.operands[1]).unwrap_or(0.0);
                    if op.operator == "TD" {
                        leading = -ty;
                    }
                    lm = translated(lm, tx, ty);
                    tm = lm;
                }
            }
            "Tm" => {
                if op.operands.len() >= 6 {
                    let mut m = IDENTITY;
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        m[i] = get_number(operand)
                            .unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    tm = m;
                    lm = m;
                }
            }
            "T*" => {
                let l = if leading != 0.0 { leading } else { font_size * 1.2 };
                lm = translated(lm, 0.0, -l);
                tm = lm;
            }
            "Tj" => {
                if in_text {
                    if let Some(Object::String(bytes, _)) = op.operands.first() {
                        let text = decode_bytes(doc, lopdf_fonts.get(&font_resource), bytes);
                        let advance = text_em_width(&text) * font_size;
                        show(&mut tm, &mut page.texts, text, advance, font_size, &font_id);
                    }
                }
            }
            "TJ" => {
                if in_text {
                    if let Some(Object::Array(arr)) = op.operands.first() {
                        let mut combined = String::new();
                        let mut advance = 0.0f32;
                        for item in arr {
                            match item {
                                Object::String(bytes, _) => {
                                    let part =
                                        decode_bytes(doc, lopdf_fonts.get(&font_resource), bytes);
                                    advance += text_em_width(&part) * font_size;
                                    combined.push_str(&part);
                                }
                                Object::Integer(_) | Object::Real(_) => {
                                    let n = get_number(item).unwrap_or(0.0);
                                    advance += -n / 1000.0 * font_size;
                                    if -n > TJ_SPACE_THRESHOLD
                                        && !combined.is_empty()
                                        && !combined.ends_with(' ')
                                    {
                                        // CJK scripts carry no word spaces.
                                        if let Some(c) = combined.chars().last() {
                                            if !is_cjk(c) {
                                                combined.push(' ');
                                                advance += 0.5 * font_size;
                                            }
                                        }
                                    }
                                }
                                _ => {}
                            }
                        }
                        show(&mut tm, &mut page.texts, combined, advance, font_size, &font_id);
                    }
                }
            }
            "'" | "\"" => {
                let l = if leading != 0.0 { leading } else { font_size * 1.2 };
                lm = translated(lm, 0.0, -l);
                tm = lm;
                if in_text {
                    let text_idx = if op.operator == "\"" { 2 } else { 0 };
                    if let Some(Object::String(bytes, _)) = op.operands.get(text_idx) {
                        let text = decode_bytes(doc, lopdf_fonts.get(&font_resource), bytes);
                        let advance = text_em_width(&text) * font_size;
                        show(&mut tm, &mut page.texts, text, advance, font_size, &font_id);
                    }
                }
            }
            "q" => ctm_stack.push(ctm),
            "Q" => {
                if let Some(m) = ctm_stack.pop() {
                    ctm = m;
                }
            }
            "cm" => {
                if op.operands.len() >= 6 {
                    let mut m = IDENTITY;
                    for (i, operand) in op.operands.iter().take(6).enumerate() {
                        m[i] = get_number(operand)
                            .unwrap_or(if i == 0 || i == 3 { 1.0 } else { 0.0 });
                    }
                    ctm = concat(m, ctm);
                }
            }
            "Do" => {
                if let Some(Ok(name)) = op.operands.first().map(|o| o.as_name()) {
                    if let Some(&id) = xobjects.get(name) {
                        if super::objects::is_image_xobject(doc, id) {
                            page.images.push(RawImageRef::XObject { id, ctm });
                        }
                    }
                }
            }
            "BI" => {
                // Inline images surface as a dict + data operand pair when
                // the content parser supports them.
                let dict = op.operands.iter().find_map(|o| match o {
                    Object::Dictionary(d) => Some(d),
                    _ => None,
                });
                let data = op.operands.iter().find_map(|o| match o {
                    Object::String(bytes, _) => Some(bytes.clone()),
                    _ => None,
                });
                if let (Some(d), Some(data)) = (dict, data) {
                    let px = |short: &[u8], long: &[u8]| {
                        d.get(short)
                            .or_else(|_| d.get(long))
                            .ok()
                            .and_then(|o| o.as_i64().ok())
                            .unwrap_or(0)
                    };
                    page.images.push(RawImageRef::Inline {
                        data,
                        px_width: px(b"W", b"Width"),
                        px_height: px(b"H", b"Height"),
                        ctm,
                    });
                }
            }
            _ => {}
        }
    }

    debug!(
        "page {}: {} text runs, {} image refs",
        index + 1,
        page.texts.len(),
        page.images.len()
    );
    page
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::PdfReader;
    use lopdf::content::Operation;
    use lopdf::{dictionary, Stream};

    #[test]
    fn matrix_translation_composes() {
        let m = translated(IDENTITY, 100.0, 600.0);
        assert_eq!(m[4], 100.0);
        assert_eq!(m[5], 600.0);

        // Scale then translate: the translation is scaled.
        let scaled: Mat = [2.0, 0.0, 0.0, 2.0, 0.0, 0.0];
        let m = translated(scaled, 10.0, 0.0);
        assert_eq!(m[4], 20.0);
    }

    #[test]
    fn matrix_concat_applies_left_operand() {
        let translate: Mat = [1.0, 0.0, 0.0, 1.0, 5.0, 7.0];
        let m = concat(translate, IDENTITY);
        assert_eq!(m[4], 5.0);
        assert_eq!(m[5], 7.0);
    }

    #[test]
    fn em_width_distinguishes_cjk() {
        assert_eq!(text_em_width("ab"), 1.0);
        assert_eq!(text_em_width("标题"), 2.0);
    }

    #[test]
    fn simple_decode_handles_utf16_bom() {
        let bytes = [0xFE, 0xFF, 0x00, 0x41, 0x00, 0x42];
        assert_eq!(decode_text_simple(&bytes), "AB");
        assert_eq!(decode_text_simple(b"plain"), "plain");
    }

    /// Build a one-page document with the given content operations.
    fn make_doc(operations: Vec<Operation>) -> lopdf::Document {
        let mut doc = lopdf::Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content { operations };
        let content_id =
            doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        };
        doc.objects.insert(pages_id, lopdf::Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc
    }

    #[test]
    fn walker_extracts_positioned_text() {
        let doc = make_doc(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![lopdf::Object::string_literal("Hello")]),
            Operation::new("ET", vec![]),
        ]);
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = walk_page(&doc, page_id, 0);

        assert_eq!(page.texts.len(), 1);
        let run = &page.texts[0];
        assert_eq!(run.text, "Hello");
        assert_eq!(run.transform[4], 72.0);
        assert_eq!(run.transform[5], 700.0);
        assert_eq!(run.height, 12.0);
        assert!(run.width > 0.0);
        assert_eq!(run.font_id, "Helvetica");
        assert_eq!(page.width, 612.0);
        assert_eq!(page.height, 792.0);
    }

    #[test]
    fn walker_advances_x_between_runs() {
        let doc = make_doc(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![lopdf::Object::string_literal("Hello")]),
            Operation::new("Tj", vec![lopdf::Object::string_literal("World")]),
            Operation::new("ET", vec![]),
        ]);
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = walk_page(&doc, page_id, 0);

        assert_eq!(page.texts.len(), 2);
        assert!(
            page.texts[1].transform[4] > page.texts[0].transform[4],
            "second run starts right of the first"
        );
        assert_eq!(page.texts[0].transform[5], page.texts[1].transform[5]);
    }

    #[test]
    fn walker_reports_scaled_height_via_tm() {
        let doc = make_doc(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new(
                "Tm",
                vec![
                    2.into(),
                    0.into(),
                    0.into(),
                    2.into(),
                    72.into(),
                    700.into(),
                ],
            ),
            Operation::new("Tj", vec![lopdf::Object::string_literal("Big")]),
            Operation::new("ET", vec![]),
        ]);
        let page_id = *doc.get_pages().get(&1).unwrap();
        let page = walk_page(&doc, page_id, 0);

        assert_eq!(page.texts.len(), 1);
        assert_eq!(page.texts[0].height, 24.0);
        assert_eq!(page.texts[0].transform[0], 2.0);
    }

    #[test]
    fn reader_loads_saved_document() {
        let mut doc = make_doc(vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![lopdf::Object::string_literal("Hi")]),
            Operation::new("ET", vec![]),
        ]);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let reader = PdfReader::load(&bytes).unwrap();
        assert_eq!(reader.page_count(), 1);
        let page = reader.read_page(0).unwrap();
        assert_eq!(page.texts.len(), 1);
        assert_eq!(page.texts[0].text, "Hi");
    }
}
