//! Progress-callback trait for conversion observability.
//!
//! Inject an [`Arc<dyn ConversionProgressCallback>`] via
//! [`crate::config::ConversionConfigBuilder::progress_callback`] to
//! receive events as the document is parsed. Callbacks are fired for
//! observability only; they have no effect on the produced Markdown.
//!
//! The trait is `Send + Sync` so it keeps working if callers forward
//! events into spawned tasks; all methods have default no-op bodies so
//! implementations only override what they care about.

use std::sync::Arc;

/// Events fired while a document is ingested and converted.
pub trait ConversionProgressCallback: Send + Sync {
    /// Called once after the document metadata has been read.
    ///
    /// # Arguments
    /// * `title` — metadata title, if the document carries one
    /// * `page_count` — number of pages in the document
    fn on_metadata(&self, title: Option<&str>, page_count: usize) {
        let _ = (title, page_count);
    }

    /// Called the first time a font is encountered during ingestion.
    ///
    /// # Arguments
    /// * `font_id` — the stable identifier used throughout the pipeline
    /// * `name` — the font's base name as recorded in the PDF
    fn on_font(&self, font_id: &str, name: &str) {
        let _ = (font_id, name);
    }

    /// Called after a page has been ingested (text runs and images
    /// extracted, before structural analysis).
    ///
    /// # Arguments
    /// * `page_index` — 0-indexed page number
    /// * `total_pages` — total pages in the document
    fn on_page(&self, page_index: usize, total_pages: usize) {
        let _ = (page_index, total_pages);
    }

    /// Called once after every pipeline stage has run, just before
    /// Markdown emission.
    fn on_document_parsed(&self, total_pages: usize) {
        let _ = total_pages;
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ConversionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in
/// [`crate::config::ConversionConfig`].
pub type ProgressCallback = Arc<dyn ConversionProgressCallback>;
