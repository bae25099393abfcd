//! Image sink: the only stage with side effects.
//!
//! The emitter hands each [`ImageRecord`] to the sink, which decides the
//! Markdown representation per the configured [`ImageMode`] and takes
//! ownership of the bytes: discarded (`None`), inlined as a base64 data
//! URI, collected into the returned map (`Relative`), or written to disk
//! (`Save`, best effort: a failed write drops that image only).

use crate::config::{ConversionConfig, ImageMode};
use crate::error::DocmarkError;
use crate::model::{is_cjk_char, ImageRecord};
use crate::output::DocumentMetadata;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::warn;

/// Maximum length of a metadata-derived image name prefix.
const MAX_PREFIX_LEN: usize = 50;

/// Resolve the prefix used in generated image names: the caller-supplied
/// string, else the metadata title sanitized to letters, digits, spaces
/// and CJK and truncated, else `"pdf"`.
pub(crate) fn resolve_title_prefix(
    config: &ConversionConfig,
    metadata: &DocumentMetadata,
) -> String {
    if let Some(prefix) = &config.title_prefix {
        return prefix.clone();
    }
    if let Some(title) = &metadata.title {
        let sanitized: String = title
            .chars()
            .filter(|&c| c.is_ascii_alphanumeric() || c == ' ' || is_cjk_char(c))
            .take(MAX_PREFIX_LEN)
            .collect();
        let trimmed = sanitized.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }
    "pdf".to_string()
}

/// Per-conversion image sink.
pub struct ImageSink {
    mode: ImageMode,
    save_dir: Option<PathBuf>,
    map: HashMap<String, Vec<u8>>,
    pub retained: usize,
    pub dropped: usize,
}

impl ImageSink {
    /// Build the sink, creating the save directory up front so a
    /// misconfigured path fails the conversion before any work is done.
    pub fn new(config: &ConversionConfig) -> Result<Self, DocmarkError> {
        let save_dir = if config.image_mode == ImageMode::Save {
            let dir = config.image_save_path.clone().ok_or_else(|| {
                DocmarkError::InvalidConfig(
                    "image_save_path is required when image_mode is Save".into(),
                )
            })?;
            std::fs::create_dir_all(&dir).map_err(|source| DocmarkError::ImageDirFailed {
                path: dir.clone(),
                source,
            })?;
            Some(dir)
        } else {
            None
        };

        Ok(ImageSink {
            mode: config.image_mode,
            save_dir,
            map: HashMap::new(),
            retained: 0,
            dropped: 0,
        })
    }

    /// Consume one image record, returning its Markdown reference (or
    /// `None` when the image produces no output).
    pub fn render(&mut self, record: ImageRecord) -> Option<String> {
        match self.mode {
            ImageMode::None => None,
            ImageMode::Base64 => {
                let encoded = STANDARD.encode(&record.bytes);
                self.retained += 1;
                Some(format!(
                    "![{}](data:{};base64,{})",
                    record.name,
                    record.format.mime(),
                    encoded
                ))
            }
            ImageMode::Relative => {
                let markdown = format!("![{}](./{})", record.name, record.name);
                self.map.insert(record.name, record.bytes);
                self.retained += 1;
                Some(markdown)
            }
            ImageMode::Save => {
                let dir = self.save_dir.as_ref()?;
                let path = dir.join(&record.name);
                match std::fs::write(&path, &record.bytes) {
                    Ok(()) => {
                        self.retained += 1;
                        Some(format!("![{}]({})", record.name, record.name))
                    }
                    Err(e) => {
                        warn!("failed to write image '{}': {}", path.display(), e);
                        self.dropped += 1;
                        None
                    }
                }
            }
        }
    }

    /// The collected image map; `Some` only in `Relative` mode.
    pub fn into_map(self) -> Option<HashMap<String, Vec<u8>>> {
        match self.mode {
            ImageMode::Relative => Some(self.map),
            _ => None,
        }
    }
}
