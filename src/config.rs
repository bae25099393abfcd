//! Configuration types for PDF-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`],
//! built via its [`ConversionConfigBuilder`]. Keeping every knob in one
//! struct makes it trivial to share configs across threads and to diff two
//! runs to understand why their outputs differ.

use crate::error::DocmarkError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// What to do with raster images encountered in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageMode {
    /// Discard images; the Markdown contains no image references. (default)
    #[default]
    None,
    /// Inline each image as a `data:image/...;base64,...` URI.
    Base64,
    /// Reference images as `./name` and return their bytes in the output
    /// image map.
    Relative,
    /// Write each image to `image_save_path` and reference it by file name.
    Save,
}

/// Configuration for a PDF-to-Markdown conversion.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use docmark::{ConversionConfig, ImageMode};
///
/// let config = ConversionConfig::builder()
///     .image_mode(ImageMode::Relative)
///     .title_prefix("report")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// How images are represented in the output. Default: [`ImageMode::None`].
    pub image_mode: ImageMode,

    /// Target directory for [`ImageMode::Save`]. Created if absent.
    /// Required when `image_mode == Save`; ignored otherwise.
    pub image_save_path: Option<PathBuf>,

    /// Prefix for generated image names. When `None`, the document's
    /// metadata title (sanitized, truncated to 50 chars) is used, falling
    /// back to `"pdf"`.
    pub title_prefix: Option<String>,

    /// Strip repeated bare-integer page-number artifacts. Default: true.
    ///
    /// The detector samples the first ten pages; documents whose
    /// pagination starts later can disable this to keep real integer-only
    /// lines.
    pub strip_page_numbers: bool,

    /// Timeout for resolving a single image object, in seconds. Default: 10.
    ///
    /// On expiry the image is skipped; the page is kept.
    pub image_fetch_timeout_secs: u64,

    /// Minimum weighted feature score for a line to be retained as a
    /// heading candidate. Range 0–1. Default: 0.4.
    pub header_score_threshold: f32,

    /// Font-size clustering tolerance for heading level assignment.
    /// Default: 0.5, tuned for PDF fontSize quantization.
    pub header_cluster_tolerance: f32,

    /// Keywords that mark a token as a table-header cell.
    ///
    /// The default list targets CJK documentation tables; replace it for
    /// other corpora. The geometric table rules are unaffected by this
    /// list.
    pub table_keywords: Vec<String>,

    /// Observability callbacks; no effect on output.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            image_mode: ImageMode::None,
            image_save_path: None,
            title_prefix: None,
            strip_page_numbers: true,
            image_fetch_timeout_secs: 10,
            header_score_threshold: 0.4,
            header_cluster_tolerance: 0.5,
            table_keywords: default_table_keywords(),
            progress_callback: None,
        }
    }
}

/// Default table-header keywords (CJK documentation corpora).
pub fn default_table_keywords() -> Vec<String> {
    ["名称", "类型", "支持", "备注", "标题", "说明", "参数", "默认值"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("image_mode", &self.image_mode)
            .field("image_save_path", &self.image_save_path)
            .field("title_prefix", &self.title_prefix)
            .field("strip_page_numbers", &self.strip_page_numbers)
            .field("image_fetch_timeout_secs", &self.image_fetch_timeout_secs)
            .field("header_score_threshold", &self.header_score_threshold)
            .field("header_cluster_tolerance", &self.header_cluster_tolerance)
            .field("table_keywords", &self.table_keywords.len())
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn callback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Pre-flight validation shared by the builder and the `convert*`
    /// entry points (callers may construct the struct directly).
    pub(crate) fn validate(&self) -> Result<(), DocmarkError> {
        if self.image_mode == ImageMode::Save && self.image_save_path.is_none() {
            return Err(DocmarkError::InvalidConfig(
                "image_save_path is required when image_mode is Save".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.header_score_threshold) {
            return Err(DocmarkError::InvalidConfig(format!(
                "header_score_threshold must be within 0–1, got {}",
                self.header_score_threshold
            )));
        }
        Ok(())
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn image_mode(mut self, mode: ImageMode) -> Self {
        self.config.image_mode = mode;
        self
    }

    pub fn image_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.image_save_path = Some(path.into());
        self
    }

    pub fn title_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.title_prefix = Some(prefix.into());
        self
    }

    pub fn strip_page_numbers(mut self, v: bool) -> Self {
        self.config.strip_page_numbers = v;
        self
    }

    pub fn image_fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.image_fetch_timeout_secs = secs.max(1);
        self
    }

    pub fn header_score_threshold(mut self, t: f32) -> Self {
        self.config.header_score_threshold = t.clamp(0.0, 1.0);
        self
    }

    pub fn header_cluster_tolerance(mut self, t: f32) -> Self {
        self.config.header_cluster_tolerance = t.max(0.0);
        self
    }

    pub fn table_keywords(mut self, keywords: Vec<String>) -> Self {
        self.config.table_keywords = keywords;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, DocmarkError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(ConversionConfig::default().validate().is_ok());
    }

    #[test]
    fn save_mode_requires_path() {
        let err = ConversionConfig::builder()
            .image_mode(ImageMode::Save)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("image_save_path"));
    }

    #[test]
    fn save_mode_with_path_builds() {
        let config = ConversionConfig::builder()
            .image_mode(ImageMode::Save)
            .image_save_path("/tmp/images")
            .build()
            .unwrap();
        assert_eq!(config.image_mode, ImageMode::Save);
    }

    #[test]
    fn threshold_setter_clamps() {
        let config = ConversionConfig::builder()
            .header_score_threshold(7.0)
            .build()
            .unwrap();
        assert_eq!(config.header_score_threshold, 1.0);
    }
}
