//! Thin wrapper around the `lopdf` object store.
//!
//! This module is the boundary to the external PDF library: it loads the
//! document, walks per-page content streams into positioned
//! [`RawTextItem`]s and unresolved [`RawImageRef`]s, and resolves image
//! XObjects on demand. Everything semantic (line grouping, heading
//! detection, Markdown) lives in [`crate::pipeline`] and consumes only the
//! types defined here.
//!
//! The walker is deliberately approximate where full fidelity would mean
//! re-implementing a font engine: run widths are estimated from
//! em-fraction classes and the CTM is tracked for image placement only.
//! The structural pipeline consumes relative comparisons (gap thresholds,
//! width ratios), which survive the approximation.

mod content;
mod objects;

pub(crate) use content::walk_page;
pub(crate) use objects::resolve_image;
pub use objects::ResolvedImage;

use crate::error::DocmarkError;
use crate::model::{FontDescriptor, FontId};
use crate::output::DocumentMetadata;
use lopdf::{Document, Object, ObjectId};
use std::sync::Arc;
use tracing::debug;

/// A positioned glyph run as reported by the content-stream walker.
///
/// `transform` is the text matrix at show time; `height` is the effective
/// font size (nominal size × matrix scale). The ingestion stage applies
/// the scale correction and rounding.
#[derive(Debug, Clone)]
pub struct RawTextItem {
    pub transform: [f32; 6],
    pub width: f32,
    pub height: f32,
    pub text: String,
    pub font_id: FontId,
}

/// An image paint site recorded during the walk, not yet resolved.
#[derive(Debug, Clone)]
pub enum RawImageRef {
    /// `Do` on an image XObject; `ctm` is the matrix at paint time.
    XObject { id: ObjectId, ctm: [f32; 6] },
    /// Inline image (`BI … EI`) with its raw data and parameter dict
    /// entries (width, height), when the content parser surfaces them.
    Inline {
        data: Vec<u8>,
        px_width: i64,
        px_height: i64,
        ctm: [f32; 6],
    },
}

/// Everything the walker extracted from one page.
#[derive(Debug, Clone, Default)]
pub struct RawPage {
    pub index: usize,
    pub width: f32,
    pub height: f32,
    pub texts: Vec<RawTextItem>,
    pub images: Vec<RawImageRef>,
    /// Fonts first referenced on this page.
    pub fonts: Vec<FontDescriptor>,
}

/// Loaded document handle shared across blocking tasks.
#[derive(Debug)]
pub struct PdfReader {
    doc: Arc<Document>,
    /// (page number, page object id) in page order.
    pages: Vec<(u32, ObjectId)>,
}

impl PdfReader {
    /// Load a document from raw bytes, validating the `%PDF` magic first
    /// so callers get a targeted error rather than a parser failure.
    pub fn load(bytes: &[u8]) -> Result<Self, DocmarkError> {
        if bytes.len() < 4 || &bytes[..4] != b"%PDF" {
            let mut magic = [0u8; 4];
            for (i, b) in bytes.iter().take(4).enumerate() {
                magic[i] = *b;
            }
            return Err(DocmarkError::NotAPdf { magic });
        }

        let doc = Document::load_mem(bytes).map_err(|e| DocmarkError::CorruptPdf {
            detail: e.to_string(),
        })?;

        let pages: Vec<(u32, ObjectId)> = doc.get_pages().into_iter().collect();
        debug!("PDF loaded: {} pages", pages.len());

        Ok(PdfReader {
            doc: Arc::new(doc),
            pages,
        })
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Shared handle for image resolution on blocking tasks.
    pub fn document(&self) -> Arc<Document> {
        Arc::clone(&self.doc)
    }

    /// Document metadata from the info dictionary.
    pub fn metadata(&self) -> DocumentMetadata {
        DocumentMetadata {
            title: objects::info_title(&self.doc),
            page_count: self.pages.len(),
        }
    }

    /// Walk one page's content streams. Content defects produce an empty
    /// page, never an error.
    pub fn read_page(&self, index: usize) -> Result<RawPage, DocmarkError> {
        let &(_, page_id) = self
            .pages
            .get(index)
            .ok_or(DocmarkError::PageOutOfRange {
                page: index,
                total: self.pages.len(),
            })?;
        Ok(walk_page(&self.doc, page_id, index))
    }
}

/// Follow a reference to its target object; non-references pass through.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    if let Ok(id) = obj.as_reference() {
        doc.get_object(id).unwrap_or(obj)
    } else {
        obj
    }
}

/// Numeric coercion for Integer/Real operands.
pub(crate) fn get_number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_rejects_non_pdf_bytes() {
        let err = PdfReader::load(b"PK\x03\x04zipzip").unwrap_err();
        assert!(matches!(err, DocmarkError::NotAPdf { .. }));
    }

    #[test]
    fn load_rejects_short_input() {
        let err = PdfReader::load(b"%P").unwrap_err();
        assert!(matches!(err, DocmarkError::NotAPdf { .. }));
    }

    #[test]
    fn load_rejects_garbage_with_pdf_magic() {
        // Magic passes but the parser must fail on the body.
        let err = PdfReader::load(b"%PDF-1.7 this is not a document").unwrap_err();
        assert!(matches!(err, DocmarkError::CorruptPdf { .. }));
    }

    #[test]
    fn get_number_coerces_integers_and_reals() {
        assert_eq!(get_number(&Object::Integer(3)), Some(3.0));
        assert_eq!(get_number(&Object::Real(2.5)), Some(2.5));
        assert_eq!(get_number(&Object::Null), None);
    }
}
