//! Output types returned by the conversion entry points.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The result of a full document conversion.
#[derive(Debug, Clone, Default)]
pub struct ConversionOutput {
    /// One Markdown string per page, in page order. Empty pages yield
    /// empty strings.
    pub pages: Vec<String>,

    /// Image name → encoded bytes. `Some` only when
    /// [`crate::ImageMode::Relative`] was requested; the key set equals
    /// the set of image names referenced in `pages`.
    pub images: Option<HashMap<String, Vec<u8>>>,

    /// Document metadata as read from the PDF.
    pub metadata: DocumentMetadata,

    /// Counters describing what the pipeline saw and produced.
    pub stats: ConversionStats,
}

/// Document metadata extracted from the PDF info dictionary.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Metadata title, if present and non-empty.
    pub title: Option<String>,
    /// Number of pages in the document.
    pub page_count: usize,
}

/// Counters describing a finished conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Pages in the document (always equals `pages.len()` in the output).
    pub total_pages: usize,
    /// Text runs ingested across all pages.
    pub text_runs: usize,
    /// Images retained (passed magic-number validation).
    pub images_retained: usize,
    /// Images dropped (timeout, missing object, bad bytes).
    pub images_dropped: usize,
    /// Total wall-clock duration in milliseconds.
    pub total_duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_output_is_empty() {
        let out = ConversionOutput::default();
        assert!(out.pages.is_empty());
        assert!(out.images.is_none());
        assert_eq!(out.stats.total_pages, 0);
    }

    #[test]
    fn stats_clone_preserves_counters() {
        let stats = ConversionStats {
            total_pages: 3,
            text_runs: 120,
            images_retained: 2,
            images_dropped: 1,
            total_duration_ms: 42,
        };
        let cloned = stats.clone();
        assert_eq!(cloned.text_runs, 120);
        assert_eq!(cloned.images_retained, 2);
    }
}
