//! Streaming conversion API: yield pages one at a time.
//!
//! Structural reconstruction is document-global (body statistics and
//! heading clusters need every page), so the parse itself cannot stream.
//! What can stream is delivery: [`convert_stream`] runs the full pipeline
//! and then yields pages in order, which keeps caller code uniform with
//! incremental sources and avoids holding the joined document string when
//! only per-page output is needed.

use crate::config::ConversionConfig;
use crate::convert::convert;
use crate::error::DocmarkError;
use futures::stream;
use std::pin::Pin;
use tokio_stream::Stream;

/// One page of streamed output.
#[derive(Debug, Clone)]
pub struct PageOutput {
    /// 0-indexed page number.
    pub index: usize,
    pub markdown: String,
}

/// A boxed stream of page outputs.
pub type PageStream = Pin<Box<dyn Stream<Item = PageOutput> + Send>>;

/// Convert PDF bytes to Markdown, yielding pages in page order.
///
/// # Errors
/// Fatal errors (unloadable PDF, invalid config) surface immediately;
/// the returned stream itself never fails.
pub async fn convert_stream(
    bytes: &[u8],
    config: &ConversionConfig,
) -> Result<PageStream, DocmarkError> {
    let output = convert(bytes, config).await?;
    let s = stream::iter(
        output
            .pages
            .into_iter()
            .enumerate()
            .map(|(index, markdown)| PageOutput { index, markdown }),
    );
    Ok(Box::pin(s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stream_propagates_fatal_errors() {
        let result = convert_stream(b"garbage", &ConversionConfig::default()).await;
        match result {
            Err(err) => assert!(matches!(err, DocmarkError::NotAPdf { .. })),
            Ok(_) => panic!("expected convert_stream to return an error"),
        }
    }
}
