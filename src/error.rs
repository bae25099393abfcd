//! Error types for the docmark library.
//!
//! Two failure classes exist and they are deliberately kept apart:
//!
//! * [`DocmarkError`] — **Fatal**: the conversion cannot proceed at all
//!   (bytes are not a PDF, the cross-reference table is unreadable, the
//!   caller passed an invalid configuration). Returned as
//!   `Err(DocmarkError)` from the top-level `convert*` functions.
//!
//! * Everything else is **absorbed**: a single image that times out, a
//!   stream whose bytes fail the magic-number check, a font whose
//!   descriptor cannot be fetched. These degrade the output of one item
//!   and are reported through `tracing` only; the pipeline never aborts
//!   mid-document on a content defect.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the docmark library.
#[derive(Debug, Error)]
pub enum DocmarkError {
    /// The input bytes do not start with the `%PDF` magic.
    #[error("input is not a PDF (first bytes: {magic:?})")]
    NotAPdf { magic: [u8; 4] },

    /// The PDF library failed to load the document.
    #[error("failed to load PDF document: {detail}")]
    CorruptPdf { detail: String },

    /// Builder or pre-flight validation failed.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Could not create the image output directory in `save` mode.
    ///
    /// Per-image write failures are absorbed; failing to create the
    /// directory itself is a pre-flight error because every image of the
    /// document would be lost.
    #[error("failed to create image directory '{path}': {source}")]
    ImageDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A requested page index does not exist.
    #[error("page {page} is out of range (document has {total} pages)")]
    PageOutOfRange { page: usize, total: usize },

    /// Unexpected internal error (task join failure and the like).
    #[error("internal error: {0}")]
    Internal(String),
}
