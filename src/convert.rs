//! Conversion entry points.
//!
//! The pipeline is single-threaded cooperative: ingestion walks pages in
//! order, the structural stages run over the whole document, and emission
//! serializes page by page. Only ingestion suspends: each image object is
//! resolved on a blocking task with a timeout, and a slow or missing
//! object costs that image, never the page. Dropping the returned future
//! between pages cancels the conversion; nothing persists but the task
//! that was already running.

use crate::config::ConversionConfig;
use crate::error::DocmarkError;
use crate::model::{PageItem, ParseResult};
use crate::output::{ConversionOutput, ConversionStats, DocumentMetadata};
use crate::pipeline::images::{resolve_title_prefix, ImageSink};
use crate::pipeline::{emit, ingest, run_stages};
use crate::reader::{resolve_image, PdfReader, ResolvedImage};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Convert PDF bytes to per-page Markdown.
///
/// This is the primary entry point for the library.
///
/// # Errors
/// Returns `Err(DocmarkError)` only for fatal conditions: the bytes are
/// not a loadable PDF, the configuration is invalid, or the image save
/// directory cannot be created. Content defects (undecodable images,
/// missing fonts, empty pages) degrade the affected item and continue.
pub async fn convert(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocmarkError> {
    let total_start = Instant::now();
    config.validate()?;

    // ── Step 1: Load the document ────────────────────────────────────────
    let owned = bytes.to_vec();
    let reader = tokio::task::spawn_blocking(move || PdfReader::load(&owned))
        .await
        .map_err(|e| DocmarkError::Internal(format!("load task panicked: {e}")))??;
    let reader = Arc::new(reader);

    // ── Step 2: Metadata and naming ──────────────────────────────────────
    let metadata = reader.metadata();
    let total_pages = metadata.page_count;
    info!("PDF loaded: {} pages", total_pages);
    if let Some(cb) = &config.progress_callback {
        cb.on_metadata(metadata.title.as_deref(), total_pages);
    }
    let prefix = resolve_title_prefix(config, &metadata);

    // ── Step 3: Image sink pre-flight (creates the save directory) ───────
    let mut sink = ImageSink::new(config)?;

    // ── Step 4: Ingest pages ─────────────────────────────────────────────
    let mut parsed = ParseResult::default();
    let mut image_counter = 0usize;
    let mut images_dropped = 0usize;
    let mut text_runs = 0usize;

    for index in 0..total_pages {
        let walker = Arc::clone(&reader);
        let raw = tokio::task::spawn_blocking(move || walker.read_page(index))
            .await
            .map_err(|e| DocmarkError::Internal(format!("page task panicked: {e}")))??;

        for descriptor in &raw.fonts {
            if !parsed.globals.fonts.contains_key(&descriptor.id) {
                if let Some(cb) = &config.progress_callback {
                    cb.on_font(&descriptor.id, &descriptor.name);
                }
                parsed
                    .globals
                    .fonts
                    .insert(descriptor.id.clone(), descriptor.clone());
            }
        }

        let resolved = resolve_page_images(&reader, &raw.images, config, &mut images_dropped).await;
        let resolved_count = resolved.len();

        let page = ingest::ingest_page(raw, resolved, &mut image_counter, &prefix);
        let kept = page
            .items
            .iter()
            .filter(|i| matches!(i, PageItem::Image(_)))
            .count();
        images_dropped += resolved_count - kept;
        text_runs += page
            .items
            .iter()
            .filter(|i| matches!(i, PageItem::Run(_)))
            .count();

        if let Some(cb) = &config.progress_callback {
            cb.on_page(index, total_pages);
        }
        parsed.pages.push(page);
    }

    if config.strip_page_numbers {
        ingest::strip_page_numbers(&mut parsed.pages);
    }

    // ── Step 5: Structural stages (CPU only) ─────────────────────────────
    let stage_config = config.clone();
    let parsed = tokio::task::spawn_blocking(move || {
        run_stages(&mut parsed, &stage_config);
        parsed
    })
    .await
    .map_err(|e| DocmarkError::Internal(format!("stage task panicked: {e}")))?;
    if let Some(cb) = &config.progress_callback {
        cb.on_document_parsed(total_pages);
    }

    // ── Step 6: Emit Markdown, draining images into the sink ─────────────
    let pages = emit::emit_document(parsed, &mut sink);
    let images_retained = sink.retained;
    images_dropped += sink.dropped;
    let images = sink.into_map();

    let stats = ConversionStats {
        total_pages,
        text_runs,
        images_retained,
        images_dropped,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    debug!(?stats, "conversion finished");

    Ok(ConversionOutput {
        pages,
        images,
        metadata,
        stats,
    })
}

/// Resolve one page's image references, each on a blocking task under
/// the configured timeout. Timeouts and failures drop the image only.
async fn resolve_page_images(
    reader: &Arc<PdfReader>,
    refs: &[crate::reader::RawImageRef],
    config: &ConversionConfig,
    dropped: &mut usize,
) -> Vec<ResolvedImage> {
    let timeout = Duration::from_secs(config.image_fetch_timeout_secs);
    let mut resolved = Vec::with_capacity(refs.len());

    for image_ref in refs {
        let doc = reader.document();
        let image_ref = image_ref.clone();
        let task = tokio::task::spawn_blocking(move || resolve_image(&doc, &image_ref));

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Some(image))) => resolved.push(image),
            Ok(Ok(None)) => *dropped += 1,
            Ok(Err(e)) => {
                warn!("image resolution task failed: {e}");
                *dropped += 1;
            }
            Err(_) => {
                warn!(
                    "image resolution timed out after {}s; skipping",
                    config.image_fetch_timeout_secs
                );
                *dropped += 1;
            }
        }
    }
    resolved
}

/// Synchronous wrapper around [`convert`].
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<ConversionOutput, DocmarkError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocmarkError::Internal(format!("failed to create tokio runtime: {e}")))?
        .block_on(convert(bytes, config))
}

/// Read document metadata without converting content.
pub async fn inspect(bytes: &[u8]) -> Result<DocumentMetadata, DocmarkError> {
    let owned = bytes.to_vec();
    let reader = tokio::task::spawn_blocking(move || PdfReader::load(&owned))
        .await
        .map_err(|e| DocmarkError::Internal(format!("load task panicked: {e}")))??;
    Ok(reader.metadata())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ImageMode;

    #[tokio::test]
    async fn convert_rejects_non_pdf() {
        let err = convert(b"not a pdf at all", &ConversionConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DocmarkError::NotAPdf { .. }));
    }

    #[tokio::test]
    async fn convert_rejects_save_mode_without_path() {
        let config = ConversionConfig {
            image_mode: ImageMode::Save,
            ..Default::default()
        };
        let err = convert(b"%PDF-1.5 irrelevant", &config).await.unwrap_err();
        assert!(matches!(err, DocmarkError::InvalidConfig(_)));
    }

    #[test]
    fn convert_sync_matches_async_error_behavior() {
        let err = convert_sync(b"nope", &ConversionConfig::default()).unwrap_err();
        assert!(matches!(err, DocmarkError::NotAPdf { .. }));
    }
}
