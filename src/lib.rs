//! # docmark
//!
//! Convert PDF documents to Markdown by reconstructing document structure
//! from positioned glyph runs.
//!
//! ## Why this crate?
//!
//! PDF has no notion of "heading", "list", or "table" — only glyphs
//! painted at coordinates. Plain text extractors flatten that into an
//! unstructured stream. This crate instead runs a statistics-driven
//! pipeline over the positioned runs: it learns the document's body font,
//! size, and line spacing, then classifies everything that deviates —
//! oversized isolated lines become headings, bullet glyphs become list
//! entries, indented blocks become code fences, aligned columns become
//! pipe tables, displaced numerals become footnotes.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Read      lopdf content-stream walk (text runs, image paints)
//!  ├─ 2. Ingest    NFKC, magic checks, page-number stripping
//!  ├─ 3. Stats     body font/height/spacing, per-font style confidence
//!  ├─ 4. Lines     baseline grouping, words, links, footnotes
//!  ├─ 5. Classify  vertical text, lists, headings, blocks, code, tables
//!  └─ 6. Emit      per-page Markdown + image sink (none/base64/map/disk)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docmark::{convert, ConversionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bytes = std::fs::read("document.pdf")?;
//!     let output = convert(&bytes, &ConversionConfig::default()).await?;
//!     for (i, page) in output.pages.iter().enumerate() {
//!         println!("--- page {} ---\n{}", i + 1, page);
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docmark` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! docmark = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod error;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod reader;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, ImageMode};
pub use convert::{convert, convert_sync, inspect};
pub use error::DocmarkError;
pub use output::{ConversionOutput, ConversionStats, DocumentMetadata};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, PageOutput, PageStream};
