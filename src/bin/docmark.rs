//! CLI binary for docmark.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use docmark::{convert, ConversionConfig, ConversionProgressCallback, ImageMode, ProgressCallback};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliImageMode {
    /// Discard images.
    None,
    /// Inline images as base64 data URIs.
    Base64,
    /// Write images to --image-dir and reference them by name.
    Save,
}

#[derive(Parser, Debug)]
#[command(
    name = "docmark",
    version,
    about = "Convert a PDF to Markdown by reconstructing its structure"
)]
struct Cli {
    /// Input PDF file.
    input: PathBuf,

    /// Output Markdown file (stdout when omitted).
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// How to handle raster images.
    #[arg(long, value_enum, default_value = "none")]
    image_mode: CliImageMode,

    /// Directory for extracted images (required with --image-mode save).
    #[arg(long)]
    image_dir: Option<PathBuf>,

    /// Prefix for generated image names (defaults to the PDF title).
    #[arg(long)]
    title_prefix: Option<String>,

    /// Keep repeated page-number lines instead of stripping them.
    #[arg(long)]
    no_page_numbers: bool,

    /// Suppress the progress bar.
    #[arg(short, long)]
    quiet: bool,
}

/// Terminal progress callback: one bar across the page walk.
struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold} [{bar:40.green/238}] {pos}/{len} pages",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl ConversionProgressCallback for CliProgress {
    fn on_metadata(&self, title: Option<&str>, page_count: usize) {
        self.bar.set_length(page_count as u64);
        if let Some(title) = title {
            self.bar.println(format!("◆ {title}"));
        }
    }

    fn on_page(&self, _page_index: usize, _total_pages: usize) {
        self.bar.inc(1);
    }

    fn on_document_parsed(&self, _total_pages: usize) {
        self.bar.set_prefix("Emitting");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let bytes = std::fs::read(&cli.input)
        .with_context(|| format!("failed to read '{}'", cli.input.display()))?;

    let mut builder = ConversionConfig::builder()
        .image_mode(match cli.image_mode {
            CliImageMode::None => ImageMode::None,
            CliImageMode::Base64 => ImageMode::Base64,
            CliImageMode::Save => ImageMode::Save,
        })
        .strip_page_numbers(!cli.no_page_numbers);

    if let Some(dir) = &cli.image_dir {
        builder = builder.image_save_path(dir);
    }
    if let Some(prefix) = &cli.title_prefix {
        builder = builder.title_prefix(prefix.clone());
    }

    let progress = if cli.quiet {
        None
    } else {
        Some(CliProgress::new())
    };
    if let Some(p) = &progress {
        builder = builder.progress_callback(Arc::clone(p) as ProgressCallback);
    }

    let config = builder.build()?;
    let output = convert(&bytes, &config).await?;

    if let Some(p) = &progress {
        p.bar.finish_and_clear();
    }

    let document = output.pages.join("\n\n");
    match &cli.output {
        Some(path) => {
            std::fs::write(path, &document)
                .with_context(|| format!("failed to write '{}'", path.display()))?;
            eprintln!(
                "✓ {} pages → {} ({} images, {}ms)",
                output.stats.total_pages,
                path.display(),
                output.stats.images_retained,
                output.stats.total_duration_ms
            );
        }
        None => {
            println!("{document}");
        }
    }

    Ok(())
}
